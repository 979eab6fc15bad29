//! Physics bounds and claim falsification (spec §4.4.1, §4.4.2).

use lattice_core::geo::{haversine_km, max_dist_km, DEFAULT_C_EFF_KM_S, DEFAULT_PATH_STRETCH};
use lattice_core::stats::summarize;
use lattice_core::types::{BurstRecord, CalibrationPack, Endpoint};
use serde::Serialize;

/// Tunable physics parameters shared by bounds, falsification, and the
/// estimator.
#[derive(Debug, Clone, Copy)]
pub struct PhysicsParams {
    pub c_eff_km_s: f64,
    pub path_stretch: f64,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            c_eff_km_s: DEFAULT_C_EFF_KM_S,
            path_stretch: DEFAULT_PATH_STRETCH,
        }
    }
}

/// The tight/loose distance budget implied by one endpoint's latest
/// burst.
#[derive(Debug, Clone, Copy)]
pub struct EndpointBudget {
    pub tight_ms: f64,
    pub loose_ms: f64,
    pub max_dist_tight_km: f64,
    pub max_dist_loose_km: f64,
}

fn calibration_bias(calibration: Option<&CalibrationPack>, endpoint_id: &str) -> f64 {
    calibration.and_then(|c| c.bias_for(endpoint_id)).unwrap_or(0.0)
}

/// Compute the physics budget for one endpoint's burst record, or `None`
/// if it has no samples (spec §4.4.1 requires "≥ 1 sample").
pub fn physics_bounds(
    record: &BurstRecord,
    calibration: Option<&CalibrationPack>,
    params: PhysicsParams,
) -> Option<EndpointBudget> {
    let summary = summarize(&record.samples_ms)?;
    let bias = calibration_bias(calibration, &record.endpoint_id);
    let tight_ms = (summary.p05_ms - bias).max(0.0);
    let loose_ms = (summary.p95_ms - bias).max(0.0);
    Some(EndpointBudget {
        tight_ms,
        loose_ms,
        max_dist_tight_km: max_dist_km(tight_ms, params.c_eff_km_s, params.path_stretch),
        max_dist_loose_km: max_dist_km(loose_ms, params.c_eff_km_s, params.path_stretch),
    })
}

/// One endpoint's contribution to a claim-falsification pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointFalsification {
    pub endpoint_id: String,
    pub dist_km: f64,
    pub max_dist_tight_km: f64,
    pub max_dist_loose_km: f64,
    pub falsify_tight: bool,
    pub falsify_loose: bool,
}

/// Outcome of falsifying a claimed lat/lon against every endpoint with
/// coordinates and at least one sample.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FalsificationResult {
    pub endpoints: Vec<EndpointFalsification>,
    pub falsified: bool,
    pub strongly_falsified: bool,
}

/// Falsify a claimed `(lat, lon)` against `endpoints`' latest records.
/// `records` is looked up by endpoint id; endpoints lacking coordinates
/// or a record with samples are skipped entirely.
pub fn falsify(
    claim_lat: f64,
    claim_lon: f64,
    endpoints: &[Endpoint],
    records_by_endpoint: &std::collections::HashMap<String, &BurstRecord>,
    calibration: Option<&CalibrationPack>,
    params: PhysicsParams,
) -> FalsificationResult {
    let mut out = FalsificationResult::default();
    for endpoint in endpoints {
        let Some((lat, lon)) = endpoint.coords() else {
            continue;
        };
        let Some(record) = records_by_endpoint.get(&endpoint.id) else {
            continue;
        };
        let Some(budget) = physics_bounds(record, calibration, params) else {
            continue;
        };
        let dist_km = haversine_km(claim_lat, claim_lon, lat, lon);
        let falsify_tight = dist_km > budget.max_dist_tight_km;
        let falsify_loose = dist_km > budget.max_dist_loose_km;
        if falsify_tight {
            out.falsified = true;
        }
        out.endpoints.push(EndpointFalsification {
            endpoint_id: endpoint.id.clone(),
            dist_km,
            max_dist_tight_km: budget.max_dist_tight_km,
            max_dist_loose_km: budget.max_dist_loose_km,
            falsify_tight,
            falsify_loose,
        });
    }
    out.strongly_falsified = out.endpoints.iter().filter(|e| e.falsify_tight).count() > 1;
    out
}
