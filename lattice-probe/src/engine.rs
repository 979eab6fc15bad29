//! The interval loop that fans bursts out to every `(path, endpoint)`,
//! builds one [`BurstRecord`] per burst, and writes it to the sink (spec
//! §4.3 "Interval loop", §2 control flow).

use crate::burst::{run_burst, BurstParams};
use crate::detector;
use crate::path_monitor::PathObserver;
use crate::socket::open_probe_socket;
use lattice_core::config::ClientConfig;
use lattice_core::sink::RecordSink;
use lattice_core::stats::summarize;
use lattice_core::types::{path_endpoint_key, BurstRecord, Endpoint, ProbePath};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{watch, Mutex};
use tracing::warn;

/// Handle to a spawned engine; dropping it does not stop the engine —
/// call [`EngineHandle::stop`] to request a clean shutdown.
pub struct EngineHandle {
    stop_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl EngineHandle {
    /// Signal the engine to stop and wait for it to finish its current
    /// bursts. In-flight receives return "no samples" immediately rather
    /// than waiting out their timeout (spec §5).
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}

/// Spawn the interval loop as a background task.
pub fn spawn(
    config: Arc<ClientConfig>,
    secret: Vec<u8>,
    sink: Arc<dyn RecordSink>,
    observer: Arc<dyn PathObserver>,
) -> EngineHandle {
    let (stop_tx, stop_rx) = watch::channel(false);
    let task = tokio::spawn(run(config, secret, sink, observer, stop_rx));
    EngineHandle { stop_tx, task }
}

/// A persistent cache of `(path, endpoint)` sockets. Per spec §4.3 a
/// socket is opened once and reused across intervals; §5 forbids sharing
/// a single socket across *different* endpoints, which the `(path,
/// endpoint)` key already guarantees.
struct SocketCache {
    sockets: Mutex<HashMap<String, Arc<UdpSocket>>>,
}

impl SocketCache {
    fn new() -> Self {
        Self {
            sockets: Mutex::new(HashMap::new()),
        }
    }

    async fn get_or_open(
        &self,
        path: &ProbePath,
        endpoint: &Endpoint,
    ) -> lattice_core::error::Result<Arc<UdpSocket>> {
        let key = path_endpoint_key(&endpoint.id, &path.id);
        {
            let map = self.sockets.lock().await;
            if let Some(socket) = map.get(&key) {
                return Ok(socket.clone());
            }
        }
        let socket = Arc::new(open_probe_socket(path, endpoint).await?);
        let mut map = self.sockets.lock().await;
        map.insert(key, socket.clone());
        Ok(socket)
    }
}

fn effective_paths(config: &ClientConfig) -> Vec<ProbePath> {
    if config.probe_paths.is_empty() {
        vec![ProbePath {
            id: "default".to_string(),
            bind_interface: None,
            bind_ip: None,
        }]
    } else {
        config.probe_paths.clone()
    }
}

fn is_loopback_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>().map(|a| a.is_loopback()).unwrap_or(false)
}

/// Run the fan-out interval loop until `stop` is set.
pub async fn run(
    config: Arc<ClientConfig>,
    secret: Vec<u8>,
    sink: Arc<dyn RecordSink>,
    observer: Arc<dyn PathObserver>,
    mut stop: watch::Receiver<bool>,
) {
    let cache = Arc::new(SocketCache::new());
    let paths = effective_paths(&config);
    let mut next_tick = Instant::now();

    loop {
        if *stop.borrow() {
            return;
        }
        let sleep = tokio::time::sleep_until(tokio::time::Instant::from_std(next_tick));
        tokio::select! {
            _ = sleep => {}
            _ = stop.changed() => {}
        }
        if *stop.borrow() {
            return;
        }

        let params = BurstParams {
            count: config.samples_per_endpoint,
            spacing_ms: config.spacing_ms,
            timeout_ms: config.timeout_ms,
            pacing_spin_us: config.pacing_spin_us,
        };

        let mut handles = Vec::new();
        for endpoint in &config.endpoints {
            for path in &paths {
                handles.push(tokio::spawn(probe_one(
                    cache.clone(),
                    path.clone(),
                    endpoint.clone(),
                    secret.clone(),
                    params,
                    observer.clone(),
                    sink.clone(),
                    config.claimed_egress_region.clone(),
                    config.physics_mismatch_threshold_ms,
                    stop.clone(),
                )));
            }
        }
        // Tasks were already spawned concurrently; awaiting them in
        // sequence here does not serialize their execution.
        for handle in handles {
            let _ = handle.await;
        }

        // Rebase to now + interval rather than drifting if a burst
        // overran the prior tick (spec §4.3).
        next_tick = Instant::now() + Duration::from_secs(config.interval_seconds);
    }
}

#[allow(clippy::too_many_arguments)]
async fn probe_one(
    cache: Arc<SocketCache>,
    path: ProbePath,
    endpoint: Endpoint,
    secret: Vec<u8>,
    params: BurstParams,
    observer: Arc<dyn PathObserver>,
    sink: Arc<dyn RecordSink>,
    claimed_egress_region: Option<String>,
    threshold_ms: f64,
    stop: watch::Receiver<bool>,
) {
    let key = path_endpoint_key(&endpoint.id, &path.id);

    let (samples, local_addr, bind_note) = match cache.get_or_open(&path, &endpoint).await {
        Ok(socket) => {
            let samples = run_burst(&socket, &secret, params, Some(stop)).await;
            let local_addr = socket.local_addr().ok().map(|a| a.to_string());
            (samples, local_addr, None)
        }
        Err(e) => {
            warn!("bind failed for {key}: {e}");
            (Vec::new(), None, Some(format!("bind failed: {e}")))
        }
    };

    let summary = summarize(&samples);
    let local_ip = local_addr
        .as_deref()
        .and_then(|s| s.parse::<std::net::SocketAddr>().ok())
        .map(|a| a.ip());
    let interface_class = observer.classify(local_ip);
    let tunnel = observer.tunnel_snapshot();
    let destination_is_loopback = is_loopback_host(&endpoint.host);

    let mut notes = Vec::new();
    if let Some(note) = bind_note {
        notes.push(note);
    }

    let mismatch = detector::detect(
        claimed_egress_region.as_deref(),
        &endpoint.id,
        endpoint.region_hint.as_deref(),
        summary.map(|s| s.min_ms),
        threshold_ms,
    );
    if let Some(m) = &mismatch {
        notes.push(format!(
            "physics_mismatch: claimed={} endpoint={} min_ms={:.3} threshold_ms={:.3}",
            m.claimed_region, m.endpoint_id, m.min_ms, m.threshold_ms
        ));
    }

    let record = BurstRecord {
        ts_ms: chrono::Utc::now().timestamp_millis(),
        endpoint_id: endpoint.id.clone(),
        host: endpoint.host.clone(),
        port: endpoint.port,
        region_hint: endpoint.region_hint.clone(),
        samples_ms: samples,
        min_ms: summary.map(|s| s.min_ms),
        p05_ms: summary.map(|s| s.p05_ms),
        median_ms: summary.map(|s| s.median_ms),
        interface_class,
        tunnel_present: tunnel.present,
        tunnel_active: tunnel.active,
        tunnel_interfaces: tunnel.interfaces,
        local_addr,
        destination_is_loopback,
        claimed_egress_region,
        notes,
    };

    if let Err(e) = sink.append(&record).await {
        warn!("sink append failed for {key}: {e}");
    }
}
