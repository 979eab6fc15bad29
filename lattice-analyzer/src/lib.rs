#![forbid(unsafe_code)]

//! The LATTICE analyzer (spec §4.4, §4.5): physics bounds, claim
//! falsification, the grid-search origin estimator with elliptical
//! uncertainty bands, calibration generate/apply/drift, baseline/session
//! comparison, and endpoint health/hygiene checks. Pure and CPU-bound
//! over its inputs — see `log` for the only I/O this crate performs
//! (reading a record log off-line or on a refresh tick).

pub mod baseline;
pub mod bounds;
pub mod calibration;
pub mod dashboard;
pub mod estimate;
pub mod health;
pub mod hygiene;
pub mod log;
pub mod worker;

pub use baseline::{auto_baseline, compare as compare_baseline};
pub use bounds::{falsify, physics_bounds, EndpointBudget, FalsificationResult};
pub use calibration::{drift as calibration_drift, generate as generate_calibration, CalibrationWindow};
pub use dashboard::{DashboardApi, OfflineDashboard};
pub use estimate::estimate;
pub use health::health;
pub use hygiene::hygiene;
pub use log::{load_records, LogWatcher};
pub use worker::CalibrationWorker;
