//! The `lattice-client` binary: loads a config document, spawns the
//! probe engine, and runs it until interrupted (spec §4.3, §6).

use anyhow::Context;
use clap::Parser;
use lattice_core::config::ClientConfig;
use lattice_core::error::Error;
use lattice_core::sink::{JsonlFileSink, RecordSink};
use lattice_probe::engine;
use lattice_probe::path_monitor::SystemPathObserver;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "LATTICE probe client", long_about = None)]
struct Cli {
    /// Path to the client config TOML document.
    #[arg(short, long, default_value = "lattice.toml")]
    config: String,
}

/// Prefer the environment (`LATTICE_SECRET_HEX`/`LATTICE_SECRET`) and
/// fall back to the config document's `secretHex` field.
fn load_secret(config: &ClientConfig) -> anyhow::Result<Vec<u8>> {
    match lattice_core::secret::load_from_env() {
        Ok(secret) => Ok(secret),
        Err(Error::SecretMissing) => config
            .secret_hex
            .as_deref()
            .and_then(|s| hex::decode(s.trim()).ok())
            .filter(|s| s.len() >= lattice_core::wire::MIN_SECRET_LEN)
            .context("no usable secret in environment or config"),
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lattice_cli::init_tracing();
    let cli = Cli::parse();

    let config = Arc::new(ClientConfig::from_file(&cli.config)?);
    let secret = load_secret(&config)?;
    let sink: Arc<dyn RecordSink> = Arc::new(JsonlFileSink::open(&config.output_path)?);
    let observer = Arc::new(SystemPathObserver);

    info!(
        endpoints = config.endpoints.len(),
        interval_seconds = config.interval_seconds,
        output = %config.output_path,
        "starting probe engine"
    );

    let handle = engine::spawn(config, secret, sink, observer);
    tokio::signal::ctrl_c().await?;
    info!("stop requested, finishing in-flight bursts");
    handle.stop().await;
    Ok(())
}
