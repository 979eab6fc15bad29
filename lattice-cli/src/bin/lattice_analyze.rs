//! The `lattice-analyze` binary: the offline/on-demand analyzer over a
//! recorded session (spec §4.4, §4.5, §6). Loads a config and one or
//! more record logs, then runs whichever of falsification, estimation,
//! calibration, baseline comparison, health, and hygiene its flags ask
//! for, printing either a human summary or a single JSON document.

use anyhow::Context;
use clap::Parser;
use lattice_analyzer::bounds::PhysicsParams;
use lattice_analyzer::estimate::{EstimateParams, EstimateSample};
use lattice_analyzer::{
    calibration_drift, compare_baseline, falsify, generate_calibration, health, hygiene, load_records,
    CalibrationWindow, FalsificationResult,
};
use lattice_core::config::ClientConfig;
use lattice_core::geo::{DEFAULT_C_EFF_KM_S, DEFAULT_PATH_STRETCH};
use lattice_core::stats::summarize;
use lattice_core::types::{BurstRecord, CalibrationPack, Endpoint, Estimate};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "LATTICE offline analyzer", long_about = None)]
struct Cli {
    /// Path to the client config TOML document (supplies endpoints).
    #[arg(short, long, default_value = "lattice.toml")]
    config: String,

    /// Session record log to analyze. Defaults to the config's outputPath.
    #[arg(long)]
    session: Option<String>,

    /// Baseline record log to compare the session against.
    #[arg(long)]
    baseline: Option<String>,

    /// Existing calibration pack JSON to apply and audit for drift.
    #[arg(long)]
    calibration: Option<String>,

    /// Claimed latitude to falsify against the session's endpoints.
    #[arg(long, requires = "claim_lon")]
    claim_lat: Option<f64>,
    /// Claimed longitude to falsify against the session's endpoints.
    #[arg(long, requires = "claim_lat")]
    claim_lon: Option<f64>,

    /// Known latitude of the measurement point, to generate a fresh
    /// calibration pack from the session log.
    #[arg(long, requires = "generate_calibration_out")]
    calib_lat: Option<f64>,
    /// Known longitude of the measurement point.
    #[arg(long, requires = "generate_calibration_out")]
    calib_lon: Option<f64>,
    /// Where to write a freshly generated calibration pack.
    #[arg(long)]
    generate_calibration_out: Option<String>,

    /// Effective propagation speed, km/s.
    #[arg(long, default_value_t = DEFAULT_C_EFF_KM_S)]
    c_eff_km_s: f64,
    /// Path-stretch multiplier over the great-circle distance.
    #[arg(long, default_value_t = DEFAULT_PATH_STRETCH)]
    path_stretch: f64,
    /// SSE multiple defining the tight uncertainty band.
    #[arg(long, default_value_t = EstimateParams::default().band_factor_tight)]
    band_factor_tight: f64,
    /// SSE multiple defining the loose uncertainty band.
    #[arg(long, default_value_t = EstimateParams::default().band_factor_loose)]
    band_factor_loose: f64,
    /// Half-width in degrees of the fine grid search around the coarse best.
    #[arg(long, default_value_t = EstimateParams::default().band_window_deg)]
    band_window_deg: f64,

    /// Health window in minutes.
    #[arg(long, default_value_t = 60.0)]
    window_minutes: f64,

    /// Print the report as a single JSON document instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct AnalysisReport {
    session_records: usize,
    estimate: Option<Estimate>,
    estimate_error: Option<String>,
    falsification: Option<FalsificationResult>,
    calibration_drift: Option<lattice_analyzer::calibration::DriftReport>,
    baseline_deltas: Option<Vec<lattice_analyzer::baseline::BaselineDelta>>,
    health: Vec<lattice_core::types::EndpointHealth>,
    hygiene: lattice_core::types::Hygiene,
}

fn latest_record_by_endpoint(records: &[BurstRecord]) -> HashMap<String, &BurstRecord> {
    let mut latest: HashMap<String, &BurstRecord> = HashMap::new();
    for record in records {
        latest
            .entry(record.endpoint_id.clone())
            .and_modify(|existing| {
                if record.ts_ms >= existing.ts_ms {
                    *existing = record;
                }
            })
            .or_insert(record);
    }
    latest
}

fn estimate_samples(endpoints: &[Endpoint], records: &[BurstRecord]) -> Vec<EstimateSample> {
    endpoints
        .iter()
        .filter_map(|endpoint| {
            let (lat, lon) = endpoint.coords()?;
            let samples_ms: Vec<f64> = records
                .iter()
                .filter(|r| r.endpoint_id == endpoint.id)
                .flat_map(|r| r.samples_ms.iter().copied())
                .collect();
            let summary = summarize(&samples_ms)?;
            Some(EstimateSample {
                endpoint_id: endpoint.id.clone(),
                lat,
                lon,
                p05_ms: summary.p05_ms,
                p95_ms: summary.p95_ms,
            })
        })
        .collect()
}

fn calibration_windows(endpoints: &[Endpoint], records: &[BurstRecord]) -> Vec<CalibrationWindow> {
    endpoints
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

fn main() -> anyhow::Result<()> {
    lattice_cli::init_tracing();
    let cli = Cli::parse();

    let config = ClientConfig::from_file(&cli.config).context("loading config")?;
    let session_path = cli.session.clone().unwrap_or_else(|| config.output_path.clone());
    let records = load_records(&session_path).context("loading session log")?;

    let physics = PhysicsParams {
        c_eff_km_s: cli.c_eff_km_s,
        path_stretch: cli.path_stretch,
    };

    let calibration: Option<CalibrationPack> = match &cli.calibration {
        Some(path) => {
            let contents = std::fs::read_to_string(path).context("reading calibration pack")?;
            Some(serde_json::from_str(&contents).context("parsing calibration pack")?)
        }
        None => None,
    };

    if let (Some(lat), Some(lon), Some(out)) = (cli.calib_lat, cli.calib_lon, &cli.generate_calibration_out) {
        let windows = calibration_windows(&config.endpoints, &records);
        let pack = generate_calibration(lat, lon, &windows, cli.c_eff_km_s, chrono::Utc::now().timestamp_millis());
        let bytes = serde_json::to_vec_pretty(&pack)?;
        std::fs::write(out, bytes).context("writing generated calibration pack")?;
    }

    let samples = estimate_samples(&config.endpoints, &records);
    let estimate_params = EstimateParams {
        physics,
        band_factor_tight: cli.band_factor_tight,
        band_factor_loose: cli.band_factor_loose,
        band_window_deg: cli.band_window_deg,
    };
    let (estimate, estimate_error) = match lattice_analyzer::estimate::estimate(&samples, calibration.as_ref(), estimate_params) {
        Ok(est) => (Some(est), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let falsification = match (cli.claim_lat, cli.claim_lon) {
        (Some(lat), Some(lon)) => {
            let by_id = latest_record_by_endpoint(&records);
            Some(falsify(lat, lon, &config.endpoints, &by_id, calibration.as_ref(), physics))
        }
        _ => None,
    };

    let drift_report = calibration.as_ref().map(|pack| {
        let windows = calibration_windows(&config.endpoints, &records);
        calibration_drift(
            pack,
            &windows,
            cli.c_eff_km_s,
            lattice_analyzer::calibration::DEFAULT_DRIFT_THRESHOLD_MS,
        )
    });

    let baseline_deltas = match &cli.baseline {
        Some(path) => {
            let baseline_records = load_records(path).context("loading baseline log")?;
            Some(compare_baseline(&baseline_records, &records))
        }
        None => None,
    };

    let health_report = health(
        &config.endpoints,
        &records,
        cli.window_minutes,
        config.interval_seconds,
        config.samples_per_endpoint,
    );
    let hygiene_report = hygiene(&config.endpoints);

    let report = AnalysisReport {
        session_records: records.len(),
        estimate,
        estimate_error,
        falsification,
        calibration_drift: drift_report,
        baseline_deltas,
        health: health_report,
        hygiene: hygiene_report,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_human(&report);
    }

    Ok(())
}

fn print_human(report: &AnalysisReport) {
    println!("session records: {}", report.session_records);
    match &report.estimate {
        Some(est) => println!(
            "estimate: lat={:.4} lon={:.4} bias_ms={:.3} sse={:.3} points={} tight_radius_km={:.1} loose_radius_km={:.1}",
            est.lat, est.lon, est.bias_ms, est.sse, est.points, est.tight.radius_km, est.loose.radius_km
        ),
        None => println!("estimate: unavailable ({})", report.estimate_error.as_deref().unwrap_or("unknown")),
    }
    if let Some(f) = &report.falsification {
        println!(
            "falsification: falsified={} strongly_falsified={} endpoints={}",
            f.falsified,
            f.strongly_falsified,
            f.endpoints.len()
        );
        for e in &f.endpoints {
            println!(
                "  {} dist_km={:.1} max_tight_km={:.1} max_loose_km={:.1} falsify_tight={} falsify_loose={}",
                e.endpoint_id, e.dist_km, e.max_dist_tight_km, e.max_dist_loose_km, e.falsify_tight, e.falsify_loose
            );
        }
    }
    if let Some(drift) = &report.calibration_drift {
        println!(
            "calibration drift: median_abs_ms={:.3} max_abs_ms={:.3} warn={}",
            drift.median_abs_delta_ms, drift.max_abs_delta_ms, drift.warn
        );
        for w in &drift.worst {
            println!("  {} delta_ms={:.3}", w.endpoint_id, w.delta_ms);
        }
    }
    if let Some(deltas) = &report.baseline_deltas {
        println!("baseline deltas:");
        for d in deltas {
            println!(
                "  {} baseline_p05={:.3} session_p05={:.3} delta={:.3}",
                d.endpoint_id, d.p05_baseline_ms, d.p05_session_ms, d.delta_p05_ms
            );
        }
    }
    println!("health:");
    for h in &report.health {
        println!(
            "  {} samples={}/{} loss={:.1}% last_seen_ms={:?}",
            h.endpoint_id, h.sample_count, h.expected_sample_count, h.loss_percent, h.last_seen_ms
        );
    }
    if !report.hygiene.missing_coords.is_empty() {
        println!("missing coords: {:?}", report.hygiene.missing_coords);
    }
    if !report.hygiene.missing_region_hint.is_empty() {
        println!("missing region hint: {:?}", report.hygiene.missing_region_hint);
    }
    if !report.hygiene.host_duplicates.is_empty() {
        println!("host duplicates: {:?}", report.hygiene.host_duplicates);
    }
}
