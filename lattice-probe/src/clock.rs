//! Monotonic nanosecond clock shared by the burst scheduler and the
//! echo-matching receive loop. Wall-clock time is never used for RTT
//! measurement (spec §5): `send_ns`/`recv_ns` are both nanoseconds
//! elapsed since an arbitrary process-local epoch, fixed on first use.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds elapsed since this process's monotonic epoch. The epoch
/// itself is meaningless outside the process; only differences between
/// two calls (a send and its matching receive) are.
pub fn now_ns() -> u64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as u64
}
