//! Per-`(path, endpoint)` connected UDP socket setup (spec §4.3).
//!
//! Binding to a specific interface or local IP is done with `socket2`
//! before the socket is connected and handed to `tokio`: `std`'s
//! `UdpSocket` has no portable bind-to-interface API.

use lattice_core::error::{Error, Result};
use lattice_core::types::{path_endpoint_key, Endpoint, ProbePath};
use socket2::{Domain, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;

/// Resolve `endpoint`'s host:port, open a `socket2` datagram socket bound
/// per `path`'s `bindInterface`/`bindIp`, hand it to `tokio`, and connect
/// it to the resolved target. Failure anywhere in this sequence is
/// reported as [`Error::BindFailed`] keyed by `<endpointId>@<pathId>`,
/// per spec: "failing the whole path if binding fails but leaving other
/// paths intact".
pub async fn open_probe_socket(path: &ProbePath, endpoint: &Endpoint) -> Result<UdpSocket> {
    let key = path_endpoint_key(&endpoint.id, &path.id);

    let mut addrs = tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|e| Error::BindFailed(key.clone(), e))?;
    let target = addrs.next().ok_or_else(|| {
        Error::BindFailed(
            key.clone(),
            std::io::Error::new(std::io::ErrorKind::NotFound, "host resolved to no address"),
        )
    })?;

    let raw = build_socket2(path, target.is_ipv6()).map_err(|e| Error::BindFailed(key.clone(), e))?;
    let std_socket: std::net::UdpSocket = raw.into();
    std_socket
        .set_nonblocking(true)
        .map_err(|e| Error::BindFailed(key.clone(), e))?;
    let socket = UdpSocket::from_std(std_socket).map_err(|e| Error::BindFailed(key.clone(), e))?;
    socket
        .connect(target)
        .await
        .map_err(|e| Error::BindFailed(key.clone(), e))?;
    Ok(socket)
}

fn build_socket2(path: &ProbePath, target_is_v6: bool) -> std::io::Result<Socket> {
    let domain = if target_is_v6 { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::DGRAM, None)?;

    let bind_addr = match &path.bind_ip {
        Some(ip) => {
            let addr: IpAddr = ip
                .parse()
                .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid bindIp"))?;
            SocketAddr::new(addr, 0)
        }
        None => {
            let unspecified = if target_is_v6 {
                IpAddr::V6(Ipv6Addr::UNSPECIFIED)
            } else {
                IpAddr::V4(Ipv4Addr::UNSPECIFIED)
            };
            SocketAddr::new(unspecified, 0)
        }
    };
    socket.bind(&bind_addr.into())?;

    if let Some(iface) = &path.bind_interface {
        bind_device(&socket, iface)?;
    }

    Ok(socket)
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "fuchsia"))]
fn bind_device(socket: &Socket, iface: &str) -> std::io::Result<()> {
    socket.bind_device(Some(iface.as_bytes()))
}

/// `bind_device` has no portable meaning outside Linux-family kernels;
/// other platforms select the interface via `bindIp` instead, so a named
/// `bindInterface` there is a no-op rather than a hard failure.
#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "fuchsia")))]
fn bind_device(_socket: &Socket, _iface: &str) -> std::io::Result<()> {
    Ok(())
}
