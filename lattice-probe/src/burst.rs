//! The burst protocol (spec §4.3): `count` spin-paced sends, each
//! matched against its echo by exact byte equality, yielding a vector of
//! RTT samples in milliseconds. An empty result is a valid outcome (loss
//! or a send failure), never an error.

use crate::clock::now_ns;
use lattice_core::wire::{Packet, PACKET_LEN};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::trace;

/// Parameters for one burst to one `(path, endpoint)`.
#[derive(Debug, Clone, Copy)]
pub struct BurstParams {
    pub count: u32,
    pub spacing_ms: u64,
    pub timeout_ms: u64,
    pub pacing_spin_us: u64,
}

/// Run one burst over `socket` (already connected to the endpoint).
/// `stop`, if given, causes in-flight receives to return immediately
/// with no sample (spec §5: "a stop signal ... causes in-flight receives
/// to return 'no samples'").
pub async fn run_burst(
    socket: &UdpSocket,
    secret: &[u8],
    params: BurstParams,
    mut stop: Option<watch::Receiver<bool>>,
) -> Vec<f64> {
    let mut samples = Vec::with_capacity(params.count as usize);
    let t0 = Instant::now();

    for i in 0..params.count {
        if stopped(&stop) {
            break;
        }
        let target = t0 + Duration::from_millis(params.spacing_ms * i as u64);
        pace_until(target, params.pacing_spin_us, &mut stop).await;
        if stopped(&stop) {
            break;
        }

        let nonce: u64 = rand::random();
        let send_ns = now_ns();
        let pkt = Packet::new_probe(i, send_ns, nonce);
        let bytes = pkt.encode(secret);

        if let Err(e) = socket.send(&bytes).await {
            trace!("probe send failed: {e}");
            continue;
        }

        let deadline = Instant::now() + Duration::from_millis(params.timeout_ms);
        if let Some(rtt_ms) = recv_matching(socket, &bytes, send_ns, deadline, &mut stop).await {
            samples.push(rtt_ms);
        }
    }

    samples
}

fn stopped(stop: &Option<watch::Receiver<bool>>) -> bool {
    stop.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Sleep until `target`, coarsely via the async runtime and then (if
/// `spin_us > 0`) busy-spinning on the monotonic clock for the last
/// `spin_us` microseconds for low-jitter send timing.
async fn pace_until(target: Instant, spin_us: u64, stop: &mut Option<watch::Receiver<bool>>) {
    let now = Instant::now();
    if target <= now {
        return;
    }
    let coarse_until = if spin_us > 0 {
        target
            .checked_sub(Duration::from_micros(spin_us))
            .unwrap_or(now)
    } else {
        target
    };
    if coarse_until > now {
        let sleep = tokio::time::sleep_until(tokio::time::Instant::from_std(coarse_until));
        tokio::pin!(sleep);
        match stop {
            Some(rx) => {
                tokio::select! {
                    _ = &mut sleep => {}
                    _ = rx.changed() => return,
                }
            }
            None => sleep.await,
        }
    }
    if spin_us > 0 {
        while Instant::now() < target {
            if stopped(stop) {
                return;
            }
            std::hint::spin_loop();
        }
    }
}

/// Read datagrams until one matches `sent` byte-for-byte or `deadline`
/// elapses. Non-matching datagrams are discarded and reading continues
/// with the remaining budget, per spec §4.3.
async fn recv_matching(
    socket: &UdpSocket,
    sent: &[u8],
    send_ns: u64,
    deadline: Instant,
    stop: &mut Option<watch::Receiver<bool>>,
) -> Option<f64> {
    let mut buf = [0u8; PACKET_LEN + 64];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        let recv = socket.recv(&mut buf);
        let outcome = match stop {
            Some(rx) => {
                tokio::select! {
                    r = tokio::time::timeout(remaining, recv) => r,
                    _ = rx.changed() => return None,
                }
            }
            None => tokio::time::timeout(remaining, recv).await,
        };
        match outcome {
            Ok(Ok(n)) => {
                let recv_ns = now_ns();
                if n == sent.len() && &buf[..n] == sent {
                    return Some((recv_ns as i128 - send_ns as i128) as f64 / 1_000_000.0);
                }
                // Non-matching datagram: keep reading with the remaining budget.
            }
            Ok(Err(e)) => {
                trace!("probe recv error: {e}");
                return None;
            }
            Err(_) => return None, // timeout
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef";

    async fn loopback_echo_pair() -> (UdpSocket, tokio::task::JoinHandle<()>) {
        let server = UdpSocket::bind("127.0.0.1:0").await.expect("bind server");
        let server_addr = server.local_addr().expect("addr");
        let client = UdpSocket::bind("127.0.0.1:0").await.expect("bind client");
        client.connect(server_addr).await.expect("connect");

        let handle = tokio::spawn(async move {
            let mut buf = [0u8; PACKET_LEN];
            loop {
                match server.recv_from(&mut buf).await {
                    Ok((n, from)) => {
                        if server.send_to(&buf[..n], from).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });
        (client, handle)
    }

    #[tokio::test]
    async fn happy_burst_of_five_samples_all_finite_and_ordered() {
        let (client, handle) = loopback_echo_pair().await;
        let params = BurstParams {
            count: 5,
            spacing_ms: 10,
            timeout_ms: 200,
            pacing_spin_us: 0,
        };
        let samples = run_burst(&client, SECRET, params, None).await;
        assert_eq!(samples.len(), 5);
        for s in &samples {
            assert!(s.is_finite());
            assert!(*s >= 0.0);
        }
        handle.abort();
    }

    #[tokio::test]
    async fn no_responder_yields_empty_samples_not_an_error() {
        let client = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
        // Connect to an address nothing is listening on.
        let dead = UdpSocket::bind("127.0.0.1:0").await.expect("bind dead");
        let dead_addr = dead.local_addr().expect("addr");
        drop(dead);
        client.connect(dead_addr).await.expect("connect");

        let params = BurstParams {
            count: 2,
            spacing_ms: 5,
            timeout_ms: 30,
            pacing_spin_us: 0,
        };
        let samples = run_burst(&client, SECRET, params, None).await;
        assert!(samples.is_empty());
    }

    #[tokio::test]
    async fn stop_signal_aborts_in_flight_burst() {
        let client = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
        let dead = UdpSocket::bind("127.0.0.1:0").await.expect("bind dead");
        let dead_addr = dead.local_addr().expect("addr");
        drop(dead);
        client.connect(dead_addr).await.expect("connect");

        let (tx, rx) = watch::channel(false);
        let params = BurstParams {
            count: 10,
            spacing_ms: 5,
            timeout_ms: 5_000,
            pacing_spin_us: 0,
        };
        let burst = tokio::spawn(async move { run_burst(&client, SECRET, params, Some(rx)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).expect("send stop");
        let samples = tokio::time::timeout(Duration::from_secs(2), burst)
            .await
            .expect("burst returned promptly after stop")
            .expect("join");
        assert!(samples.is_empty());
    }
}
