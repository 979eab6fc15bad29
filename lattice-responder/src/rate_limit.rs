//! Per-source-IP token bucket rate limiting. The bucket map is the only
//! shared mutable state in the responder (spec §9: "a single-threaded
//! responder avoids locks"); it lives behind one mutex held only for the
//! brief refill/consume/sweep critical sections.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Default refill rate, in tokens (packets) per second.
pub const DEFAULT_REFILL_PER_S: f64 = 30.0;
/// Default bucket capacity.
pub const DEFAULT_CAPACITY: f64 = 60.0;
/// Tokens consumed per accepted packet.
pub const DEFAULT_COST: f64 = 1.0;
/// Idle duration after which a bucket is eligible for sweeping.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(120);
/// Interval between opportunistic sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub refill_per_s: f64,
    pub capacity: f64,
    pub cost: f64,
    pub idle_ttl: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            refill_per_s: DEFAULT_REFILL_PER_S,
            capacity: DEFAULT_CAPACITY,
            cost: DEFAULT_COST,
            idle_ttl: DEFAULT_IDLE_TTL,
        }
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl Bucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    fn refill(&mut self, now: Instant, refill_per_s: f64, capacity: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * refill_per_s).min(capacity);
            self.last_refill = now;
        }
    }
}

/// A per-source-IP token bucket map, keyed by IP only (not port), per
/// spec §4.2.
pub struct TokenBucketMap {
    config: RateLimitConfig,
    buckets: HashMap<IpAddr, Bucket>,
    last_sweep: Instant,
}

impl TokenBucketMap {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: HashMap::new(),
            last_sweep: Instant::now(),
        }
    }

    /// Try to consume `cost` tokens for `ip` at `now`, creating the
    /// bucket on first use. Returns `true` if the packet should be
    /// accepted.
    pub fn try_consume(&mut self, ip: IpAddr, now: Instant) -> bool {
        let cfg = self.config;
        let bucket = self
            .buckets
            .entry(ip)
            .or_insert_with(|| Bucket::new(cfg.capacity, now));
        bucket.refill(now, cfg.refill_per_s, cfg.capacity);
        bucket.last_seen = now;
        if bucket.tokens >= cfg.cost {
            bucket.tokens -= cfg.cost;
            true
        } else {
            false
        }
    }

    /// Opportunistically sweep buckets idle longer than `idle_ttl`,
    /// bounding memory. Only does work if `sweep_interval` has elapsed
    /// since the last sweep.
    pub fn maybe_sweep(&mut self, now: Instant, sweep_interval: Duration) -> usize {
        if now.saturating_duration_since(self.last_sweep) < sweep_interval {
            return 0;
        }
        self.last_sweep = now;
        let ttl = self.config.idle_ttl;
        let before = self.buckets.len();
        self.buckets
            .retain(|_, b| now.saturating_duration_since(b.last_seen) < ttl);
        before - self.buckets.len()
    }

    #[cfg(test)]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn ip(n: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, n))
    }

    #[test]
    fn fresh_bucket_allows_burst_up_to_capacity() {
        let mut map = TokenBucketMap::new(RateLimitConfig {
            capacity: 3.0,
            ..Default::default()
        });
        let now = Instant::now();
        assert!(map.try_consume(ip(1), now));
        assert!(map.try_consume(ip(1), now));
        assert!(map.try_consume(ip(1), now));
        assert!(!map.try_consume(ip(1), now));
    }

    #[test]
    fn refill_over_time_restores_tokens() {
        let mut map = TokenBucketMap::new(RateLimitConfig {
            capacity: 1.0,
            refill_per_s: 10.0,
            ..Default::default()
        });
        let t0 = Instant::now();
        assert!(map.try_consume(ip(1), t0));
        assert!(!map.try_consume(ip(1), t0));
        let t1 = t0 + Duration::from_millis(200); // 2 tokens refilled, capped at 1
        assert!(map.try_consume(ip(1), t1));
    }

    #[test]
    fn sustained_rate_converges_to_refill_rate() {
        let mut map = TokenBucketMap::new(RateLimitConfig {
            capacity: 60.0,
            refill_per_s: 30.0,
            cost: 1.0,
            ..Default::default()
        });
        let t0 = Instant::now();
        // Drain the initial burst allowance.
        let mut accepted_in_burst = 0;
        for _ in 0..1000 {
            if map.try_consume(ip(1), t0) {
                accepted_in_burst += 1;
            } else {
                break;
            }
        }
        assert_eq!(accepted_in_burst, 60);

        // After the burst, a full second of sustained traffic at a much
        // higher attempt rate should accept roughly refill_per_s packets.
        let mut accepted = 0;
        for i in 0..10_000 {
            let t = t0 + Duration::from_micros(100) * i;
            if map.try_consume(ip(1), t) {
                accepted += 1;
            }
        }
        // 10_000 attempts spread over 1s; expect close to 30 accepted.
        assert!((accepted as f64 - 30.0).abs() < 5.0, "accepted={accepted}");
    }

    #[test]
    fn buckets_are_keyed_by_ip_not_port() {
        let mut map = TokenBucketMap::new(RateLimitConfig {
            capacity: 1.0,
            ..Default::default()
        });
        let now = Instant::now();
        assert!(map.try_consume(ip(1), now));
        // Same IP, different "port" is irrelevant here since the map key
        // is IpAddr alone — a second attempt from the same IP shares the
        // bucket and is rejected.
        assert!(!map.try_consume(ip(1), now));
    }

    #[test]
    fn sweep_evicts_idle_buckets_after_ttl() {
        let mut map = TokenBucketMap::new(RateLimitConfig {
            idle_ttl: Duration::from_secs(60),
            ..Default::default()
        });
        let t0 = Instant::now();
        map.try_consume(ip(1), t0);
        map.try_consume(ip(2), t0);
        assert_eq!(map.bucket_count(), 2);

        let t1 = t0 + Duration::from_secs(30);
        let swept = map.maybe_sweep(t1, Duration::from_secs(30));
        assert_eq!(swept, 0); // not idle long enough yet, and not due

        let t2 = t0 + Duration::from_secs(200);
        let swept = map.maybe_sweep(t2, Duration::from_secs(30));
        assert_eq!(swept, 2);
        assert_eq!(map.bucket_count(), 0);
    }
}
