//! Baseline/session comparison and auto-baseline capture (spec §4.4.6).

use lattice_core::stats::summarize;
use lattice_core::types::BurstRecord;
use serde::Serialize;
use std::collections::HashMap;

/// Default auto-baseline capture window in minutes.
pub const DEFAULT_AUTO_BASELINE_MINUTES: f64 = 5.0;

/// Per-endpoint p05 delta between a baseline window and the current
/// session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineDelta {
    pub endpoint_id: String,
    pub p05_baseline_ms: f64,
    pub p05_session_ms: f64,
    pub delta_p05_ms: f64,
}

/// Most recent (by `tsMs`) p05 per endpoint, recomputed from samples
/// rather than trusting a possibly-stale stored `p05Ms` field.
fn latest_p05_by_endpoint(records: &[BurstRecord]) -> HashMap<String, f64> {
    let mut latest: HashMap<String, (i64, f64)> = HashMap::new();
    for record in records {
        let Some(summary) = summarize(&record.samples_ms) else {
            continue;
        };
        latest
            .entry(record.endpoint_id.clone())
            .and_modify(|(ts, p05)| {
                if record.ts_ms >= *ts {
                    *ts = record.ts_ms;
                    *p05 = summary.p05_ms;
                }
            })
            .or_insert((record.ts_ms, summary.p05_ms));
    }
    latest.into_iter().map(|(id, (_, p05))| (id, p05)).collect()
}

/// Compare a baseline record set against the current session's records,
/// per endpoint present in both.
pub fn compare(baseline: &[BurstRecord], session: &[BurstRecord]) -> Vec<BaselineDelta> {
    let base = latest_p05_by_endpoint(baseline);
    let sess = latest_p05_by_endpoint(session);
    let mut out: Vec<BaselineDelta> = sess
        .into_iter()
        .filter_map(|(id, p05_session_ms)| {
            base.get(&id).map(|p05_baseline_ms| BaselineDelta {
                endpoint_id: id,
                p05_baseline_ms: *p05_baseline_ms,
                p05_session_ms,
                delta_p05_ms: p05_session_ms - p05_baseline_ms,
            })
        })
        .collect();
    out.sort_by(|a, b| a.endpoint_id.cmp(&b.endpoint_id));
    out
}

/// Result of capturing the auto-baseline window from the head of a
/// session's records.
#[derive(Debug)]
pub struct AutoBaseline<'a> {
    pub baseline_records: Vec<&'a BurstRecord>,
    pub minutes_captured: f64,
    pub complete: bool,
}

/// Capture the first `auto_baseline_minutes` of `session_records` as the
/// implicit baseline. Returns `None` for an empty session (nothing to
/// seed from yet).
pub fn auto_baseline(session_records: &[BurstRecord], auto_baseline_minutes: f64) -> Option<AutoBaseline<'_>> {
    let start_ms = session_records.iter().map(|r| r.ts_ms).min()?;
    let window_ms = (auto_baseline_minutes * 60_000.0) as i64;
    let baseline_records: Vec<&BurstRecord> = session_records
        .iter()
        .filter(|r| r.ts_ms - start_ms < window_ms)
        .collect();
    let latest_ts = session_records.iter().map(|r| r.ts_ms).max().unwrap_or(start_ms);
    let elapsed_ms = (latest_ts - start_ms).max(0);
    let minutes_captured = (elapsed_ms as f64 / 60_000.0).min(auto_baseline_minutes);
    let complete = elapsed_ms >= window_ms;
    Some(AutoBaseline {
        baseline_records,
        minutes_captured,
        complete,
    })
}
