//! Calibration generate/apply/drift (spec §4.4.5). Apply itself is just
//! `CalibrationPack::bias_for` subtracted from an observed quantile,
//! performed inline by [`crate::bounds`] and [`crate::estimate`]; this
//! module only builds and audits the pack.

use lattice_core::stats::summarize;
use lattice_core::types::{CalibrationEntry, CalibrationPack};
use serde::Serialize;

/// Default regression scale; reserved for future refinement (spec §9).
const DEFAULT_SCALE: f64 = 1.0;

/// Default drift-warn threshold in ms (spec §4.4.5).
pub const DEFAULT_DRIFT_THRESHOLD_MS: f64 = 5.0;

/// One endpoint's recent RTT window, used both to generate a pack and
/// to measure live drift against an existing one.
#[derive(Debug, Clone)]
pub struct CalibrationWindow {
    pub endpoint_id: String,
    pub lat: f64,
    pub lon: f64,
    pub rtt_samples_ms: Vec<f64>,
}

fn live_bias_ms(window: &CalibrationWindow, known_lat: f64, known_lon: f64, c_eff_km_s: f64) -> Option<f64> {
    let median = summarize(&window.rtt_samples_ms)?.median_ms;
    let d_km = lattice_core::geo::haversine_km(window.lat, window.lon, known_lat, known_lon);
    let predicted_rtt_ms = 2.0 * d_km / c_eff_km_s * 1000.0;
    Some(median - predicted_rtt_ms)
}

/// Generate a calibration pack from a known-origin burst (spec §4.4.5
/// "Generate"). Endpoints with no samples in `windows` are skipped.
pub fn generate(
    known_lat: f64,
    known_lon: f64,
    windows: &[CalibrationWindow],
    c_eff_km_s: f64,
    build_ms: i64,
) -> CalibrationPack {
    let mut entries = Vec::new();
    let mut total_samples = 0usize;
    for window in windows {
        let Some(bias_ms) = live_bias_ms(window, known_lat, known_lon, c_eff_km_s) else {
            continue;
        };
        total_samples += window.rtt_samples_ms.len();
        entries.push(CalibrationEntry {
            id: window.endpoint_id.clone(),
            bias_ms,
            scale: DEFAULT_SCALE,
            sample_count: window.rtt_samples_ms.len(),
        });
    }
    CalibrationPack {
        calibration_lat: known_lat,
        calibration_lon: known_lon,
        sample_count: total_samples,
        build_ms,
        entries,
    }
}

/// Drift of one endpoint between a stored pack and a live window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftEntry {
    pub endpoint_id: String,
    pub delta_ms: f64,
}

/// Drift summary comparing a stored calibration pack against live
/// samples re-measured at the same known location (spec §4.4.5
/// "Drift").
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub median_abs_delta_ms: f64,
    pub max_abs_delta_ms: f64,
    pub worst: Vec<DriftEntry>,
    pub warn: bool,
}

/// Compare `pack` against a freshly measured `windows` at the pack's own
/// calibration location, reporting per-endpoint drift (spec §4.4.5).
/// Endpoints absent from either side are skipped.
pub fn drift(
    pack: &CalibrationPack,
    windows: &[CalibrationWindow],
    c_eff_km_s: f64,
    threshold_ms: f64,
) -> DriftReport {
    let mut deltas = Vec::new();
    for window in windows {
        let Some(stored_bias) = pack.bias_for(&window.endpoint_id) else {
            continue;
        };
        let Some(live_bias) = live_bias_ms(window, pack.calibration_lat, pack.calibration_lon, c_eff_km_s) else {
            continue;
        };
        deltas.push(DriftEntry {
            endpoint_id: window.endpoint_id.clone(),
            delta_ms: live_bias - stored_bias,
        });
    }

    let mut abs_sorted: Vec<f64> = deltas.iter().map(|d| d.delta_ms.abs()).collect();
    abs_sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median_abs_delta_ms = if abs_sorted.is_empty() {
        0.0
    } else {
        abs_sorted[abs_sorted.len() / 2]
    };
    let max_abs_delta_ms = abs_sorted.last().copied().unwrap_or(0.0);

    let mut worst = deltas;
    worst.sort_by(|a, b| {
        b.delta_ms
            .abs()
            .partial_cmp(&a.delta_ms.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    worst.truncate(3);

    DriftReport {
        median_abs_delta_ms,
        max_abs_delta_ms,
        warn: max_abs_delta_ms > threshold_ms,
        worst,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::{physics_bounds, PhysicsParams};
    use lattice_core::geo::DEFAULT_C_EFF_KM_S;
    use lattice_core::types::{BurstRecord, InterfaceClass};

    fn window(id: &str, lat: f64, lon: f64, samples: Vec<f64>) -> CalibrationWindow {
        CalibrationWindow {
            endpoint_id: id.to_string(),
            lat,
            lon,
            rtt_samples_ms: samples,
        }
    }

    #[test]
    fn scenario_calibration_inversion() {
        let known = (5.0, 5.0);
        let d = lattice_core::geo::haversine_km(0.0, 0.0, known.0, known.1);
        let predicted_rtt = 2.0 * d / DEFAULT_C_EFF_KM_S * 1000.0;
        let samples: Vec<f64> = vec![predicted_rtt + 3.0; 21];
        let w = window("a", 0.0, 0.0, samples);
        let pack = generate(known.0, known.1, &[w.clone()], DEFAULT_C_EFF_KM_S, 0);
        assert_eq!(pack.entries.len(), 1);
        assert!((pack.bias_for("a").expect("entry") - 3.0).abs() < 1e-6);

        let report = drift(&pack, &[w], DEFAULT_C_EFF_KM_S, DEFAULT_DRIFT_THRESHOLD_MS);
        assert!(report.max_abs_delta_ms < 1e-6, "{report:?}");
        assert!(!report.warn);
    }

    #[test]
    fn drift_above_threshold_warns_and_ranks_worst() {
        let known = (0.0, 0.0);
        let w_a = window("a", 1.0, 1.0, vec![10.0; 10]);
        let w_b = window("b", 2.0, 2.0, vec![10.0; 10]);
        let pack = generate(known.0, known.1, &[w_a, w_b], DEFAULT_C_EFF_KM_S, 0);

        let w_a_live = window("a", 1.0, 1.0, vec![30.0; 10]);
        let w_b_live = window("b", 2.0, 2.0, vec![10.5; 10]);
        let report = drift(&pack, &[w_a_live, w_b_live], DEFAULT_C_EFF_KM_S, 5.0);
        assert!(report.warn);
        assert_eq!(report.worst[0].endpoint_id, "a");
    }

    #[test]
    fn scenario_calibration_apply_shrinks_tight_band() {
        let known = (5.0, 5.0);
        let d = lattice_core::geo::haversine_km(0.0, 0.0, known.0, known.1);
        let predicted_rtt = 2.0 * d / DEFAULT_C_EFF_KM_S * 1000.0;
        let bias = 4.0;
        let samples: Vec<f64> = vec![predicted_rtt + bias; 21];
        let pack = generate(known.0, known.1, &[window("a", 0.0, 0.0, samples.clone())], DEFAULT_C_EFF_KM_S, 0);

        let record = BurstRecord {
            ts_ms: 0,
            endpoint_id: "a".to_string(),
            host: "h".to_string(),
            port: 1,
            region_hint: None,
            samples_ms: samples,
            min_ms: None,
            p05_ms: None,
            median_ms: None,
            interface_class: InterfaceClass::Other,
            tunnel_present: false,
            tunnel_active: false,
            tunnel_interfaces: Vec::new(),
            local_addr: None,
            destination_is_loopback: false,
            claimed_egress_region: None,
            notes: Vec::new(),
        };

        let uncalibrated = physics_bounds(&record, None, PhysicsParams::default()).expect("budget");
        let calibrated = physics_bounds(&record, Some(&pack), PhysicsParams::default()).expect("budget");
        assert!(calibrated.max_dist_tight_km < uncalibrated.max_dist_tight_km);
    }
}
