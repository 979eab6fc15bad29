//! Dashboard API (spec §6): typed operations the UI would call against
//! whatever host process owns the client/server/analyzer. Transport is
//! deliberately unspecified (the UI and its native-window host are
//! Non-goals); this crate only models the operation surface as a trait
//! plus an offline default good enough to drive calibration polling
//! without a real host (spec §11).

use crate::calibration::CalibrationWindow;
use crate::log;
use crate::worker::CalibrationWorker;
use async_trait::async_trait;
use lattice_core::config::ClientConfig;
use lattice_core::error::Result;
use lattice_core::types::{BurstRecord, CalibrationPack, CalibrationStatus, SessionMarker};
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::watch;

/// Parts of a config document editable from the dashboard's text panes.
#[derive(Debug, Clone)]
pub struct ConfigParts {
    pub endpoints_text: String,
    pub probe_paths_text: String,
}

/// What to include in an export (spec §6 `export_state`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportRequest {
    pub include_state: bool,
    pub include_map_svg: bool,
}

/// A coarse snapshot of host-process state, enough for a dashboard to
/// render without needing its own polling loop over each subsystem.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub client_running: bool,
    pub server_running: bool,
    pub calibration_status: CalibrationStatus,
    pub session: SessionMarker,
}

/// The operation surface spec §6 lists for the dashboard UI. Transport
/// is intentionally unspecified; implementations expose it however the
/// host process chooses to (in-process, IPC, HTTP...).
#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn get_state(&self) -> Result<DashboardState>;
    async fn get_config(&self) -> Result<ClientConfig>;
    async fn set_config_parts(&self, parts: ConfigParts) -> Result<()>;
    async fn start_client(&self) -> Result<()>;
    async fn stop_client(&self) -> Result<()>;
    async fn start_server(&self) -> Result<()>;
    async fn stop_server(&self) -> Result<()>;
    async fn mark_session(&self) -> Result<()>;
    async fn clear_state(&self, truncate_log: bool) -> Result<()>;
    async fn export_state(&self, request: ExportRequest) -> Result<()>;
    async fn generate_calibration(&self, lat: f64, lon: f64, output_path: PathBuf) -> Result<()>;
    async fn load_calibration(&self, path: PathBuf) -> Result<()>;
    async fn clear_calibration(&self) -> Result<()>;
    async fn get_calibration_status(&self) -> CalibrationStatus;
}

/// A no-op/offline [`DashboardApi`] backed by a static config and the
/// session's record log — enough for the analyzer CLI to exercise
/// calibration generate/load/clear without a real dashboard host.
/// Process-lifecycle methods (`start_client`, etc.) are no-ops: process
/// supervision of child client/server binaries is a Non-goal (spec §1).
pub struct OfflineDashboard {
    config: ClientConfig,
    log_path: PathBuf,
    worker: CalibrationWorker,
    status_rx: watch::Receiver<CalibrationStatus>,
    pack_rx: watch::Receiver<Option<Arc<CalibrationPack>>>,
    session: StdMutex<SessionMarker>,
}

impl OfflineDashboard {
    pub fn new(config: ClientConfig, log_path: PathBuf) -> Self {
        let (worker, status_rx, pack_rx) = CalibrationWorker::new();
        Self {
            config,
            log_path,
            worker,
            status_rx,
            pack_rx,
            session: StdMutex::new(SessionMarker::default()),
        }
    }

    /// Subscribe to calibration status changes, e.g. to pause a refresh
    /// loop while a task is running (spec §5).
    pub fn calibration_status_receiver(&self) -> watch::Receiver<CalibrationStatus> {
        self.status_rx.clone()
    }

    /// Subscribe to the currently loaded calibration pack.
    pub fn calibration_pack_receiver(&self) -> watch::Receiver<Option<Arc<CalibrationPack>>> {
        self.pack_rx.clone()
    }

    fn windows_from_records(&self, records: &[BurstRecord]) -> Vec<CalibrationWindow> {
        self.config
            .endpoints
            .iter()
            .filter_map(|endpoint| {
                let (lat, lon) = endpoint.coords()?;
                let samples: Vec<f64> = records
                    .iter()
                    .filter(|r| r.endpoint_id == endpoint.id)
                    .flat_map(|r| r.samples_ms.iter().copied())
                    .collect();
                if samples.is_empty() {
                    return None;
                }
                Some(CalibrationWindow {
                    endpoint_id: endpoint.id.clone(),
                    lat,
                    lon,
                    rtt_samples_ms: samples,
                })
            })
            .collect()
    }
}

#[async_trait]
impl DashboardApi for OfflineDashboard {
    async fn get_state(&self) -> Result<DashboardState> {
        Ok(DashboardState {
            client_running: false,
            server_running: false,
            calibration_status: self.worker.status(),
            session: self.session.lock().expect("session mutex poisoned").clone(),
        })
    }

    async fn get_config(&self) -> Result<ClientConfig> {
        Ok(self.config.clone())
    }

    async fn set_config_parts(&self, _parts: ConfigParts) -> Result<()> {
        Ok(())
    }

    async fn start_client(&self) -> Result<()> {
        Ok(())
    }

    async fn stop_client(&self) -> Result<()> {
        Ok(())
    }

    async fn start_server(&self) -> Result<()> {
        Ok(())
    }

    async fn stop_server(&self) -> Result<()> {
        Ok(())
    }

    async fn mark_session(&self) -> Result<()> {
        let mut session = self.session.lock().expect("session mutex poisoned");
        session.start_ms = Some(chrono::Utc::now().timestamp_millis());
        session.minutes_captured = 0.0;
        session.auto_baseline_complete = false;
        Ok(())
    }

    async fn clear_state(&self, truncate_log: bool) -> Result<()> {
        *self.session.lock().expect("session mutex poisoned") = SessionMarker::default();
        if truncate_log {
            tokio::fs::write(&self.log_path, b"").await?;
        }
        Ok(())
    }

    async fn export_state(&self, _request: ExportRequest) -> Result<()> {
        Ok(())
    }

    async fn generate_calibration(&self, lat: f64, lon: f64, output_path: PathBuf) -> Result<()> {
        let records = log::load_records(&self.log_path)?;
        let windows = self.windows_from_records(&records);
        self.worker.spawn_generate(
            lat,
            lon,
            windows,
            lattice_core::geo::DEFAULT_C_EFF_KM_S,
            chrono::Utc::now().timestamp_millis(),
            output_path,
        )
    }

    async fn load_calibration(&self, path: PathBuf) -> Result<()> {
        self.worker.spawn_load(path)
    }

    async fn clear_calibration(&self) -> Result<()> {
        self.worker.clear()
    }

    async fn get_calibration_status(&self) -> CalibrationStatus {
        self.worker.status()
    }
}
