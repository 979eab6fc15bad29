//! The `lattice-server` binary: runs the authenticated UDP echo
//! responder (spec §4.2, §6) until interrupted.

use clap::Parser;
use lattice_responder::{Responder, DEFAULT_PORT};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "LATTICE echo responder", long_about = None)]
struct Cli {
    /// Address to bind the UDP socket to.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lattice_cli::init_tracing();
    let cli = Cli::parse();

    let secret = lattice_core::secret::load_from_env()?;
    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;
    let mut responder = Responder::bind(addr, secret).await?;
    info!(addr = %responder.local_addr()?, "responder listening");

    let stop = Arc::new(Notify::new());
    let stop_signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop_signal.notify_one();
        }
    });

    responder.run_until(stop).await?;
    let counters = responder.counters();
    info!(
        accepted = counters.accepted,
        rejected_length = counters.rejected_length,
        rejected_magic = counters.rejected_magic,
        rejected_tag = counters.rejected_tag,
        rate_limited = counters.rate_limited,
        "responder stopped"
    );
    Ok(())
}
