//! Calibration background worker (spec §5, §9 "Calibration sharing").
//! Generate/load/clear each run off the caller's task and publish their
//! outcome over a `watch` channel, the same idiom `lattice-core::config`
//! uses for hot-reload — callers poll or await a change rather than
//! blocking on a future.

use crate::calibration::{self, CalibrationWindow};
use lattice_core::error::{Error, Result};
use lattice_core::types::{CalibrationPack, CalibrationStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Owns the status/pack channels and spawns calibration tasks. Cheap to
/// clone-by-reference; callers typically hold one instance per session.
pub struct CalibrationWorker {
    status_tx: watch::Sender<CalibrationStatus>,
    pack_tx: watch::Sender<Option<Arc<CalibrationPack>>>,
}

impl CalibrationWorker {
    /// Create a worker in the `Idle` state with no loaded pack, plus the
    /// receivers other components subscribe to.
    pub fn new() -> (
        Self,
        watch::Receiver<CalibrationStatus>,
        watch::Receiver<Option<Arc<CalibrationPack>>>,
    ) {
        let (status_tx, status_rx) = watch::channel(CalibrationStatus::Idle);
        let (pack_tx, pack_rx) = watch::channel(None);
        (Self { status_tx, pack_tx }, status_rx, pack_rx)
    }

    /// Current status, for a one-shot poll without holding a receiver.
    pub fn status(&self) -> CalibrationStatus {
        self.status_tx.borrow().clone()
    }

    fn begin(&self, kind: &str) -> Result<()> {
        if matches!(*self.status_tx.borrow(), CalibrationStatus::Running { .. }) {
            return Err(Error::CalibrationRunning);
        }
        self.status_tx.send_replace(CalibrationStatus::Running { kind: kind.to_string() });
        Ok(())
    }

    /// Generate a calibration pack from `windows` at `(known_lat,
    /// known_lon)`, write it to `output_path`, and publish it as the
    /// loaded pack on success.
    pub fn spawn_generate(
        &self,
        known_lat: f64,
        known_lon: f64,
        windows: Vec<CalibrationWindow>,
        c_eff_km_s: f64,
        build_ms: i64,
        output_path: PathBuf,
    ) -> Result<()> {
        self.begin("generate")?;
        let status_tx = self.status_tx.clone();
        let pack_tx = self.pack_tx.clone();
        tokio::spawn(async move {
            let pack = calibration::generate(known_lat, known_lon, &windows, c_eff_km_s, build_ms);
            let bytes = match serde_json::to_vec_pretty(&pack) {
                Ok(bytes) => bytes,
                Err(e) => {
                    let _ = status_tx.send(CalibrationStatus::Failed { error: e.to_string() });
                    return;
                }
            };
            if let Err(e) = tokio::fs::write(&output_path, &bytes).await {
                let _ = status_tx.send(CalibrationStatus::Failed { error: e.to_string() });
                return;
            }
            let entries = pack.entries.len();
            pack_tx.send_replace(Some(Arc::new(pack)));
            let _ = status_tx.send(CalibrationStatus::Done {
                result: format!("generated calibration for {entries} endpoint(s)"),
            });
        });
        Ok(())
    }

    /// Load a previously generated pack from `path` and publish it.
    pub fn spawn_load(&self, path: PathBuf) -> Result<()> {
        self.begin("load")?;
        let status_tx = self.status_tx.clone();
        let pack_tx = self.pack_tx.clone();
        tokio::spawn(async move {
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) => {
                    let _ = status_tx.send(CalibrationStatus::Failed { error: e.to_string() });
                    return;
                }
            };
            match serde_json::from_str::<CalibrationPack>(&contents) {
                Ok(pack) => {
                    let entries = pack.entries.len();
                    pack_tx.send_replace(Some(Arc::new(pack)));
                    let _ = status_tx.send(CalibrationStatus::Done {
                        result: format!("loaded calibration with {entries} endpoint(s)"),
                    });
                }
                Err(e) => {
                    let _ = status_tx.send(CalibrationStatus::Failed {
                        error: format!("calibration invalid: {e}"),
                    });
                }
            }
        });
        Ok(())
    }

    /// Drop the loaded pack. Runs synchronously since there is no I/O.
    pub fn clear(&self) -> Result<()> {
        self.begin("clear")?;
        self.pack_tx.send_replace(None);
        self.status_tx.send_replace(CalibrationStatus::Done { result: "cleared".to_string() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generate_writes_pack_and_publishes_done() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("calibration.json");
        let (worker, mut status_rx, mut pack_rx) = CalibrationWorker::new();

        let windows = vec![CalibrationWindow {
            endpoint_id: "a".to_string(),
            lat: 0.0,
            lon: 0.0,
            rtt_samples_ms: vec![5.0; 10],
        }];
        worker
            .spawn_generate(1.0, 1.0, windows, lattice_core::geo::DEFAULT_C_EFF_KM_S, 0, out.clone())
            .expect("not already running");

        status_rx.changed().await.expect("running update");
        assert!(matches!(*status_rx.borrow(), CalibrationStatus::Running { .. }));
        status_rx.changed().await.expect("done update");
        assert!(matches!(*status_rx.borrow(), CalibrationStatus::Done { .. }));

        pack_rx.changed().await.expect("pack published");
        assert!(pack_rx.borrow().is_some());
        assert!(tokio::fs::metadata(&out).await.is_ok());
    }

    #[tokio::test]
    async fn second_generate_while_running_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("calibration.json");
        let (worker, _status_rx, _pack_rx) = CalibrationWorker::new();
        let windows = vec![CalibrationWindow {
            endpoint_id: "a".to_string(),
            lat: 0.0,
            lon: 0.0,
            rtt_samples_ms: vec![5.0; 10],
        }];
        worker
            .spawn_generate(1.0, 1.0, windows.clone(), lattice_core::geo::DEFAULT_C_EFF_KM_S, 0, out.clone())
            .expect("first call starts");
        let second = worker.spawn_generate(1.0, 1.0, windows, lattice_core::geo::DEFAULT_C_EFF_KM_S, 0, out);
        assert!(matches!(second, Err(Error::CalibrationRunning)));
    }

    #[tokio::test]
    async fn clear_resets_pack_to_none() {
        let (worker, mut status_rx, pack_rx) = CalibrationWorker::new();
        worker.clear().expect("clear");
        status_rx.changed().await.expect("status update");
        assert!(pack_rx.borrow().is_none());
    }
}
