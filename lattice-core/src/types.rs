//! Data model shared by the probe engine, responder, and analyzer.

use serde::{Deserialize, Serialize};

/// A geographically-tagged UDP echo endpoint. Immutable once loaded; a
/// config reload produces an entirely new set rather than mutating an
/// existing one.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub region_hint: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl Endpoint {
    pub fn has_coords(&self) -> bool {
        self.lat.is_some() && self.lon.is_some()
    }

    pub fn coords(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// A local network binding used to duplicate probes across routes (e.g.
/// VPN vs. direct). Each endpoint is probed once per path; the combined
/// key is `<endpointId>@<pathId>`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbePath {
    pub id: String,
    #[serde(default)]
    pub bind_interface: Option<String>,
    #[serde(default)]
    pub bind_ip: Option<String>,
}

/// Combined key for a single probed (path, endpoint) pair.
pub fn path_endpoint_key(endpoint_id: &str, path_id: &str) -> String {
    format!("{endpoint_id}@{path_id}")
}

/// Coarse classification of the local outgoing network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceClass {
    Wifi,
    Ethernet,
    Cellular,
    Loopback,
    Other,
}

/// A point-in-time snapshot of tunnel-interface presence/activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TunnelSnapshot {
    pub present: bool,
    pub active: bool,
    pub interfaces: Vec<String>,
}

/// Summary statistics and context for one endpoint over one probe burst.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstRecord {
    pub ts_ms: i64,
    pub endpoint_id: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub region_hint: Option<String>,
    pub samples_ms: Vec<f64>,
    #[serde(default)]
    pub min_ms: Option<f64>,
    #[serde(default)]
    pub p05_ms: Option<f64>,
    #[serde(default)]
    pub median_ms: Option<f64>,
    pub interface_class: InterfaceClass,
    pub tunnel_present: bool,
    pub tunnel_active: bool,
    #[serde(default)]
    pub tunnel_interfaces: Vec<String>,
    #[serde(default)]
    pub local_addr: Option<String>,
    pub destination_is_loopback: bool,
    #[serde(default)]
    pub claimed_egress_region: Option<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// Per-endpoint calibration bias/scale derived from a known-origin burst.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationEntry {
    pub id: String,
    pub bias_ms: f64,
    /// Reserved multiplicative refinement; currently always 1.0. The load
    /// path must accept and ignore any stored value.
    pub scale: f64,
    pub sample_count: usize,
}

/// A calibration pack: bias/scale per endpoint plus the known location and
/// build metadata it was produced from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationPack {
    pub calibration_lat: f64,
    pub calibration_lon: f64,
    pub sample_count: usize,
    pub build_ms: i64,
    pub entries: Vec<CalibrationEntry>,
}

impl CalibrationPack {
    pub fn bias_for(&self, endpoint_id: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.id == endpoint_id)
            .map(|e| e.bias_ms)
    }
}

/// An uncertainty region around an [`Estimate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UncertaintyBand {
    pub radius_km: f64,
    #[serde(default)]
    pub ellipse: Option<Ellipse>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ellipse {
    pub major_km: f64,
    pub minor_km: f64,
    pub angle_deg: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Result of the grid-search origin estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    pub lat: f64,
    pub lon: f64,
    pub bias_ms: f64,
    pub sse: f64,
    pub points: usize,
    pub tight: UncertaintyBand,
    pub loose: UncertaintyBand,
}

/// Per-endpoint sample accounting over a health window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointHealth {
    pub endpoint_id: String,
    pub sample_count: usize,
    pub expected_sample_count: usize,
    pub loss_percent: f64,
    pub last_seen_ms: Option<i64>,
}

/// Hygiene findings over the configured endpoint set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hygiene {
    pub missing_coords: Vec<String>,
    pub missing_region_hint: Vec<String>,
    /// Groups of endpoint ids sharing the same host.
    pub host_duplicates: Vec<Vec<String>>,
}

/// Physics-mismatch annotation attached to a [`BurstRecord`] by the
/// detector when a claimed egress region is implausible given the
/// measured RTT.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicsMismatch {
    pub claimed_region: String,
    pub endpoint_id: String,
    pub min_ms: f64,
    pub threshold_ms: f64,
}

/// An optional marker recording when the operator requested a fresh
/// comparison session, plus the auto-baseline capture window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMarker {
    pub start_ms: Option<i64>,
    pub minutes_captured: f64,
    pub auto_baseline_complete: bool,
}

/// Background status of a calibration generate/load/clear task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CalibrationStatus {
    Idle,
    Running { kind: String },
    Done { result: String },
    Failed { error: String },
}
