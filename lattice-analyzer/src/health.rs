//! Endpoint sample-count expectation and loss accounting (spec §4.5).

use lattice_core::types::{BurstRecord, Endpoint, EndpointHealth};

/// Expected sample count over a window, per spec §4.5:
/// `ceil(windowMinutes*60/intervalSeconds) * samplesPerEndpoint`.
pub fn expected_sample_count(window_minutes: f64, interval_seconds: u64, samples_per_endpoint: u32) -> usize {
    if interval_seconds == 0 {
        return 0;
    }
    let intervals = (window_minutes * 60.0 / interval_seconds as f64).ceil().max(0.0);
    (intervals as usize) * samples_per_endpoint as usize
}

/// `1 - actual/expected` as a percentage, clamped to `[0, 100]`.
pub fn loss_percent(actual: usize, expected: usize) -> f64 {
    if expected == 0 {
        return 0.0;
    }
    let ratio = actual as f64 / expected as f64;
    ((1.0 - ratio) * 100.0).clamp(0.0, 100.0)
}

/// Health of every configured endpoint over `records` within the given
/// window. Endpoints with no matching records still get an entry with
/// zero sample count and 100% loss.
pub fn health(
    endpoints: &[Endpoint],
    records: &[BurstRecord],
    window_minutes: f64,
    interval_seconds: u64,
    samples_per_endpoint: u32,
) -> Vec<EndpointHealth> {
    let expected = expected_sample_count(window_minutes, interval_seconds, samples_per_endpoint);
    endpoints
        .iter()
        .map(|endpoint| {
            let matching: Vec<&BurstRecord> = records.iter().filter(|r| r.endpoint_id == endpoint.id).collect();
            let sample_count: usize = matching.iter().map(|r| r.samples_ms.len()).sum();
            let last_seen_ms = matching.iter().map(|r| r.ts_ms).max();
            EndpointHealth {
                endpoint_id: endpoint.id.clone(),
                sample_count,
                expected_sample_count: expected,
                loss_percent: loss_percent(sample_count, expected),
                last_seen_ms,
            }
        })
        .collect()
}
