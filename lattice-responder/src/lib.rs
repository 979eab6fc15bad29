#![forbid(unsafe_code)]

//! Stateless authenticated UDP echo responder (spec §4.2).
//!
//! A single socket, a single task, blocking reads are fine. Per-packet
//! errors never terminate the listener; the only shared mutable state is
//! the rate-limiter's bucket map.

pub mod rate_limit;

use lattice_core::wire::{validate, Validation, PACKET_LEN};
use rate_limit::{RateLimitConfig, TokenBucketMap, DEFAULT_SWEEP_INTERVAL};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

/// Default well-known responder port.
pub const DEFAULT_PORT: u16 = 9000;

/// Running counters, useful for tests and operational visibility. Not
/// part of the wire protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponderCounters {
    pub accepted: u64,
    pub rejected_length: u64,
    pub rejected_magic: u64,
    pub rejected_tag: u64,
    pub rate_limited: u64,
}

/// A bound, running responder. Call [`Responder::bind`] then
/// [`Responder::run`] (or [`Responder::run_until`] to stop on a signal).
pub struct Responder {
    socket: UdpSocket,
    secret: Vec<u8>,
    buckets: TokenBucketMap,
    counters: ResponderCounters,
}

impl Responder {
    pub async fn bind(addr: SocketAddr, secret: Vec<u8>) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket,
            secret,
            buckets: TokenBucketMap::new(RateLimitConfig::default()),
            counters: ResponderCounters::default(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn counters(&self) -> ResponderCounters {
        self.counters
    }

    /// Run the responder loop forever.
    pub async fn run(&mut self) -> std::io::Result<()> {
        let never = Arc::new(Notify::new());
        self.run_until(never).await
    }

    /// Run the responder loop until `stop` is notified.
    pub async fn run_until(&mut self, stop: Arc<Notify>) -> std::io::Result<()> {
        let mut buf = [0u8; PACKET_LEN + 64];
        loop {
            let recv = tokio::select! {
                r = self.socket.recv_from(&mut buf) => r,
                _ = stop.notified() => return Ok(()),
            };
            let (len, src) = match recv {
                Ok(v) => v,
                Err(e) => {
                    warn!("responder socket error: {e}");
                    continue;
                }
            };
            self.handle_datagram(&buf[..len], src).await;
            self.buckets
                .maybe_sweep(Instant::now(), DEFAULT_SWEEP_INTERVAL);
        }
    }

    async fn handle_datagram(&mut self, datagram: &[u8], src: SocketAddr) {
        if datagram.len() != PACKET_LEN {
            self.counters.rejected_length += 1;
            trace!(%src, "dropped: wrong length");
            return;
        }
        if &datagram[0..4] != b"LATO" {
            self.counters.rejected_magic += 1;
            trace!(%src, "dropped: bad magic");
            return;
        }

        // Rate limit before the (more expensive) HMAC check, per spec
        // §4.2's control-loop ordering.
        if !self.buckets.try_consume(src.ip(), Instant::now()) {
            self.counters.rate_limited += 1;
            trace!(%src, "dropped: rate limited");
            return;
        }

        match validate(datagram, &self.secret) {
            Validation::Accept(_) => {
                self.counters.accepted += 1;
            }
            Validation::RejectTag => {
                self.counters.rejected_tag += 1;
                debug!(%src, "dropped: tag mismatch");
                return;
            }
            // Length/magic were already checked above.
            Validation::RejectLength | Validation::RejectMagic => return,
        }

        if let Err(e) = self.socket.send_to(datagram, src).await {
            warn!(%src, "echo send failed: {e}");
        }
    }
}
