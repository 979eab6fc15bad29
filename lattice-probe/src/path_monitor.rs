//! Outgoing-interface classification and tunnel-interface snapshot (spec
//! §4.3 "Path monitoring", §9 "Path monitor").
//!
//! There is no portable, dependency-free interface-enumeration API
//! pulled in here (no `if-addrs`/`pnet`/`get_if_addrs` crate), so
//! classification is deliberately best-effort: on Linux it reads `/proc/net/dev` for
//! interface names and classifies by name prefix; elsewhere it degrades
//! to [`InterfaceClass::Other`]. Tests and callers that need exact
//! control inject a [`StaticPathObserver`] instead, matching the
//! `PathObserver` seam spelled out in SPEC_FULL §11.

use lattice_core::types::{InterfaceClass, TunnelSnapshot};
use std::net::IpAddr;

/// A single observer task produces classifications; readers take an
/// atomic snapshot and never hold a lock across a burst (spec §9).
pub trait PathObserver: Send + Sync {
    fn classify(&self, local_addr: Option<IpAddr>) -> InterfaceClass;
    fn tunnel_snapshot(&self) -> TunnelSnapshot;
}

/// Name prefixes treated as tunnel interfaces across the platforms the
/// teacher stack targets (Linux `tun`/`wg`/`ppp`, macOS `utun`).
const TUNNEL_PREFIXES: &[&str] = &["tun", "utun", "wg", "ppp", "tap"];

fn classify_name(name: &str) -> InterfaceClass {
    let n = name.to_ascii_lowercase();
    if n == "lo" || n.starts_with("loopback") {
        return InterfaceClass::Loopback;
    }
    if TUNNEL_PREFIXES.iter().any(|p| n.starts_with(p)) {
        return InterfaceClass::Other;
    }
    if n.starts_with("wl") || n.starts_with("wifi") || n.starts_with("ath") {
        return InterfaceClass::Wifi;
    }
    if n.starts_with("en") || n.starts_with("eth") {
        return InterfaceClass::Ethernet;
    }
    if n.starts_with("rmnet") || n.starts_with("wwan") || n.starts_with("ccmni") || n.starts_with("cellular") {
        return InterfaceClass::Cellular;
    }
    InterfaceClass::Other
}

/// Best-effort system observer. See module docs for its limitations.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPathObserver;

impl SystemPathObserver {
    fn interface_names() -> Vec<String> {
        std::fs::read_to_string("/proc/net/dev")
            .ok()
            .map(|contents| {
                contents
                    .lines()
                    .skip(2) // header rows
                    .filter_map(|line| line.split(':').next())
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl PathObserver for SystemPathObserver {
    fn classify(&self, local_addr: Option<IpAddr>) -> InterfaceClass {
        if local_addr.is_some_and(|a| a.is_loopback()) {
            return InterfaceClass::Loopback;
        }
        Self::interface_names()
            .iter()
            .map(|name| classify_name(name))
            .find(|class| !matches!(class, InterfaceClass::Loopback))
            .unwrap_or(InterfaceClass::Other)
    }

    fn tunnel_snapshot(&self) -> TunnelSnapshot {
        let names = Self::interface_names();
        let interfaces: Vec<String> = names
            .into_iter()
            .filter(|name| TUNNEL_PREFIXES.iter().any(|p| name.to_ascii_lowercase().starts_with(p)))
            .collect();
        let present = !interfaces.is_empty();
        // `/proc/net/dev` only lists interfaces the kernel has
        // instantiated, which is a reasonable proxy for "up" but cannot
        // confirm "running" or a non-loopback address the way a real
        // netlink query would; see SPEC_FULL §11.
        TunnelSnapshot {
            present,
            active: present,
            interfaces,
        }
    }
}

/// A fixed observer for tests and offline analysis, where the true
/// interface state is either irrelevant or must be pinned.
#[derive(Debug, Clone)]
pub struct StaticPathObserver {
    pub class: InterfaceClass,
    pub tunnel: TunnelSnapshot,
}

impl StaticPathObserver {
    pub fn new(class: InterfaceClass, tunnel: TunnelSnapshot) -> Self {
        Self { class, tunnel }
    }
}

impl PathObserver for StaticPathObserver {
    fn classify(&self, local_addr: Option<IpAddr>) -> InterfaceClass {
        if local_addr.is_some_and(|a| a.is_loopback()) {
            return InterfaceClass::Loopback;
        }
        self.class
    }

    fn tunnel_snapshot(&self) -> TunnelSnapshot {
        self.tunnel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_classification_heuristics() {
        assert_eq!(classify_name("lo"), InterfaceClass::Loopback);
        assert_eq!(classify_name("eth0"), InterfaceClass::Ethernet);
        assert_eq!(classify_name("en0"), InterfaceClass::Ethernet);
        assert_eq!(classify_name("wlan0"), InterfaceClass::Wifi);
        assert_eq!(classify_name("wlp2s0"), InterfaceClass::Wifi);
        assert_eq!(classify_name("rmnet0"), InterfaceClass::Cellular);
        assert_eq!(classify_name("utun3"), InterfaceClass::Other);
        assert_eq!(classify_name("somethingelse"), InterfaceClass::Other);
    }

    #[test]
    fn loopback_local_addr_always_classifies_loopback() {
        let observer = SystemPathObserver;
        let loopback: IpAddr = "127.0.0.1".parse().expect("parse");
        assert_eq!(observer.classify(Some(loopback)), InterfaceClass::Loopback);
    }

    #[test]
    fn static_observer_returns_fixed_values() {
        let tunnel = TunnelSnapshot {
            present: true,
            active: true,
            interfaces: vec!["utun4".to_string()],
        };
        let observer = StaticPathObserver::new(InterfaceClass::Wifi, tunnel.clone());
        let non_loopback: IpAddr = "10.0.0.5".parse().expect("parse");
        assert_eq!(observer.classify(Some(non_loopback)), InterfaceClass::Wifi);
        assert_eq!(observer.classify(Some("127.0.0.1".parse().expect("p"))), InterfaceClass::Loopback);
        assert_eq!(observer.tunnel_snapshot().interfaces, tunnel.interfaces);
    }
}
