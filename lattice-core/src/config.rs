//! LATTICE client configuration. Parses a TOML document into a strongly
//! typed structure and supports hot-reload via the `notify` crate,
//! mirroring the config-watch pattern used across the rest of the stack.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Result as NotifyResult, Watcher};
use serde::Deserialize;
use std::{fs, path::Path, sync::Arc};
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::types::{Endpoint, ProbePath};

fn default_samples_per_endpoint() -> u32 {
    5
}
fn default_spacing_ms() -> u64 {
    100
}
fn default_timeout_ms() -> u64 {
    500
}
fn default_interval_seconds() -> u64 {
    30
}
fn default_output_path() -> String {
    "lattice.jsonl".to_string()
}
fn default_physics_mismatch_threshold_ms() -> f64 {
    5.0
}

/// The LATTICE client config document (spec §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    pub secret_hex: Option<String>,
    pub endpoints: Vec<Endpoint>,
    pub probe_paths: Vec<ProbePath>,
    #[serde(default = "default_samples_per_endpoint")]
    pub samples_per_endpoint: u32,
    #[serde(default = "default_spacing_ms")]
    pub spacing_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default)]
    pub pacing_spin_us: u64,
    #[serde(default = "default_output_path")]
    pub output_path: String,
    pub claimed_egress_region: Option<String>,
    #[serde(default = "default_physics_mismatch_threshold_ms")]
    pub physics_mismatch_threshold_ms: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            secret_hex: None,
            endpoints: Vec::new(),
            probe_paths: Vec::new(),
            samples_per_endpoint: default_samples_per_endpoint(),
            spacing_ms: default_spacing_ms(),
            timeout_ms: default_timeout_ms(),
            interval_seconds: default_interval_seconds(),
            pacing_spin_us: 0,
            output_path: default_output_path(),
            claimed_egress_region: None,
            physics_mismatch_threshold_ms: default_physics_mismatch_threshold_ms(),
        }
    }
}

impl ClientConfig {
    /// Load and validate a config file, collecting every per-field error
    /// rather than failing on the first one (spec §7: `config-invalid`
    /// carries "a list of per-field errors").
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(&path)?;
        let cfg: ClientConfig = toml::from_str(&data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Alias kept for symmetry with callers that expect a `load` entry
    /// point rather than `from_file`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file(path)
    }

    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.endpoints.is_empty() {
            errors.push("endpoints: must contain at least one endpoint".to_string());
        }
        let mut seen_ids = std::collections::HashSet::new();
        for ep in &self.endpoints {
            if ep.id.is_empty() {
                errors.push("endpoints[].id: must not be empty".to_string());
            }
            if !seen_ids.insert(ep.id.clone()) {
                errors.push(format!("endpoints[].id: duplicate id '{}'", ep.id));
            }
            if ep.host.is_empty() {
                errors.push(format!("endpoints[{}].host: must not be empty", ep.id));
            }
            if ep.port == 0 {
                errors.push(format!("endpoints[{}].port: must be non-zero", ep.id));
            }
        }
        if self.samples_per_endpoint == 0 {
            errors.push("samplesPerEndpoint: must be > 0".to_string());
        }
        if self.timeout_ms == 0 {
            errors.push("timeoutMs: must be > 0".to_string());
        }
        if self.interval_seconds == 0 {
            errors.push("intervalSeconds: must be > 0".to_string());
        }
        if self.output_path.is_empty() {
            errors.push("outputPath: must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::config_fields(errors))
        }
    }

    /// Watch the configuration file for changes and receive updates
    /// through a `watch` channel. Each reload re-validates and, per spec
    /// §3's immutability invariant, publishes an entirely new
    /// `Arc<ClientConfig>` rather than mutating the previous one.
    pub fn watch_file<P: AsRef<Path>>(
        path: P,
    ) -> Result<(Arc<ClientConfig>, watch::Receiver<Arc<ClientConfig>>)> {
        let path_buf = path.as_ref().to_path_buf();
        let initial = Arc::new(Self::from_file(&path_buf)?);
        let path_in_closure = path_buf.clone();
        let (tx, rx) = watch::channel(initial.clone());

        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: NotifyResult<Event>| {
                if let Ok(event) = res {
                    if matches!(event.kind, EventKind::Modify(_)) {
                        match Self::from_file(&path_in_closure) {
                            Ok(updated) => {
                                let _ = tx.send(Arc::new(updated));
                            }
                            Err(e) => {
                                tracing::warn!("config reload rejected: {e}");
                            }
                        }
                    }
                }
            })
            .map_err(|e| Error::ConfigInvalid(e.to_string()))?;

        watcher
            .watch(&path_buf, RecursiveMode::NonRecursive)
            .map_err(|e| Error::ConfigInvalid(e.to_string()))?;
        // The watcher must outlive this call; leak it for the process
        // lifetime rather than threading a guard type through callers.
        std::mem::forget(watcher);

        Ok((initial, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().expect("tempfile");
        f.write_all(contents.as_bytes()).expect("write");
        f
    }

    #[test]
    fn minimal_valid_config_loads() {
        let f = write_config(
            r#"
            secretHex = "30313233343536373839616263646566"
            [[endpoints]]
            id = "a"
            host = "localhost"
            port = 9000
            "#,
        );
        let cfg = ClientConfig::from_file(f.path()).expect("should load");
        assert_eq!(cfg.endpoints.len(), 1);
        assert_eq!(cfg.samples_per_endpoint, 5);
    }

    #[test]
    fn empty_endpoints_rejected_with_field_error() {
        let f = write_config("outputPath = \"x.jsonl\"\n");
        match ClientConfig::from_file(f.path()) {
            Err(Error::ConfigFields { field_errors }) => {
                assert!(field_errors.iter().any(|e| e.contains("endpoints")));
            }
            other => panic!("expected ConfigFields error, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_endpoint_ids_rejected() {
        let f = write_config(
            r#"
            [[endpoints]]
            id = "a"
            host = "h1"
            port = 1
            [[endpoints]]
            id = "a"
            host = "h2"
            port = 2
            "#,
        );
        match ClientConfig::from_file(f.path()) {
            Err(Error::ConfigFields { field_errors }) => {
                assert!(field_errors.iter().any(|e| e.contains("duplicate")));
            }
            other => panic!("expected ConfigFields error, got {other:?}"),
        }
    }
}
