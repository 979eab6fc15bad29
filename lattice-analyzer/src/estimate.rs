//! Grid-search origin estimator with an elliptical uncertainty band
//! (spec §4.4.3, §4.4.4). Two-pass coarse-then-refine search; no global
//! fine grid is ever materialized (spec §9 "Grid search").

use crate::bounds::PhysicsParams;
use lattice_core::error::{Error, Result};
use lattice_core::geo::haversine_km;
use lattice_core::types::{BoundingBox, CalibrationPack, Ellipse, Estimate, UncertaintyBand};

const MIN_ELIGIBLE_ENDPOINTS: usize = 3;
const JITTER_EPS_MS: f64 = 1.0;
const BAND_WEIGHT_EPS: f64 = 1e-6;
const COARSE_STEP_DEG: f64 = 1.0;
const FINE_STEP_DEG: f64 = 0.1;
const KM_PER_DEG_LAT: f64 = 111.32;
const KM_PER_DEG_LON_AT_EQUATOR: f64 = 111.32;
const FALLBACK_MARGIN_DEG: f64 = 10.0;

/// One endpoint's inputs to the estimator: coordinates and the RTT
/// quantiles from its latest burst.
#[derive(Debug, Clone)]
pub struct EstimateSample {
    pub endpoint_id: String,
    pub lat: f64,
    pub lon: f64,
    pub p05_ms: f64,
    pub p95_ms: f64,
}

/// Tunable estimator parameters.
#[derive(Debug, Clone, Copy)]
pub struct EstimateParams {
    pub physics: PhysicsParams,
    pub band_factor_tight: f64,
    pub band_factor_loose: f64,
    pub band_window_deg: f64,
}

impl Default for EstimateParams {
    fn default() -> Self {
        Self {
            physics: PhysicsParams::default(),
            band_factor_tight: 1.5,
            band_factor_loose: 4.0,
            band_window_deg: 3.0,
        }
    }
}

struct Eligible {
    lat: f64,
    lon: f64,
    obs_ms: f64,
    weight: f64,
}

/// A single evaluated grid cell, kept around for uncertainty-band
/// construction after the best cell is known.
#[derive(Debug, Clone, Copy)]
struct Cell {
    lat: f64,
    lon: f64,
    sse: f64,
    bias_ms: f64,
}

fn grid_points(min: f64, max: f64, step: f64) -> Vec<f64> {
    if min >= max {
        return vec![min];
    }
    let n = ((max - min) / step).round().max(0.0) as i64;
    (0..=n).map(|i| min + (i as f64) * step).collect()
}

fn one_way_ms(dist_km: f64, physics: PhysicsParams) -> f64 {
    dist_km * 1000.0 / (physics.c_eff_km_s * physics.path_stretch)
}

/// Evaluate the closed-form-bias SSE at one candidate (lat, lon).
fn evaluate(lat: f64, lon: f64, eligible: &[Eligible], physics: PhysicsParams) -> Cell {
    let mut weighted_residual_sum = 0.0;
    let mut weight_sum = 0.0;
    let taus: Vec<f64> = eligible
        .iter()
        .map(|e| one_way_ms(haversine_km(lat, lon, e.lat, e.lon), physics))
        .collect();
    for (e, tau) in eligible.iter().zip(taus.iter()) {
        weighted_residual_sum += e.weight * (e.obs_ms - 2.0 * tau);
        weight_sum += e.weight;
    }
    let bias_ms = if weight_sum > 0.0 {
        weighted_residual_sum / weight_sum
    } else {
        0.0
    };
    let sse = eligible
        .iter()
        .zip(taus.iter())
        .map(|(e, tau)| {
            let r = (e.obs_ms - 2.0 * tau) - bias_ms;
            e.weight * r * r
        })
        .sum();
    Cell {
        lat,
        lon,
        sse,
        bias_ms,
    }
}

fn search_bbox(eligible: &[Eligible], physics: PhysicsParams, loose_radii_km: &[f64]) -> (f64, f64, f64, f64) {
    // Intersection of per-endpoint loose disks, expressed as a bounding
    // box in degrees. Falls back to a fixed margin around the endpoint
    // spread when the disks don't overlap (widely separated endpoints
    // with tight budgets) so the search never degenerates to empty.
    let mut min_lat = -90.0f64;
    let mut max_lat = 90.0f64;
    let mut min_lon = -180.0f64;
    let mut max_lon = 180.0f64;
    for (e, radius_km) in eligible.iter().zip(loose_radii_km.iter()) {
        let lat_margin = radius_km / KM_PER_DEG_LAT;
        let cos_lat = e.lat.to_radians().cos().abs().max(0.05);
        let lon_margin = radius_km / (KM_PER_DEG_LON_AT_EQUATOR * cos_lat);
        min_lat = min_lat.max(e.lat - lat_margin);
        max_lat = max_lat.min(e.lat + lat_margin);
        min_lon = min_lon.max(e.lon - lon_margin);
        max_lon = max_lon.min(e.lon + lon_margin);
    }
    let _ = physics;
    if min_lat <= max_lat && min_lon <= max_lon {
        return (min_lat, max_lat, min_lon, max_lon);
    }
    let lats: Vec<f64> = eligible.iter().map(|e| e.lat).collect();
    let lons: Vec<f64> = eligible.iter().map(|e| e.lon).collect();
    let min_lat = lats.iter().cloned().fold(f64::INFINITY, f64::min) - FALLBACK_MARGIN_DEG;
    let max_lat = lats.iter().cloned().fold(f64::NEG_INFINITY, f64::max) + FALLBACK_MARGIN_DEG;
    let min_lon = lons.iter().cloned().fold(f64::INFINITY, f64::min) - FALLBACK_MARGIN_DEG;
    let max_lon = lons.iter().cloned().fold(f64::NEG_INFINITY, f64::max) + FALLBACK_MARGIN_DEG;
    (min_lat.max(-90.0), max_lat.min(90.0), min_lon.max(-180.0), max_lon.min(180.0))
}

fn qualifying<'a>(cells: &'a [Cell], sse_min: f64, band_factor: f64) -> Vec<&'a Cell> {
    let threshold = sse_min * band_factor;
    cells.iter().filter(|c| c.sse <= threshold).collect()
}

fn bbox_of(cells: &[&Cell]) -> BoundingBox {
    let min_lat = cells.iter().map(|c| c.lat).fold(f64::INFINITY, f64::min);
    let max_lat = cells.iter().map(|c| c.lat).fold(f64::NEG_INFINITY, f64::max);
    let min_lon = cells.iter().map(|c| c.lon).fold(f64::INFINITY, f64::min);
    let max_lon = cells.iter().map(|c| c.lon).fold(f64::NEG_INFINITY, f64::max);
    BoundingBox {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    }
}

/// Radius/ellipse for one band given its qualifying cells. Degrades to a
/// circle when fewer than three cells qualify (spec §4.4.4).
fn band_shape(cells: &[&Cell], best: (f64, f64), sse_min: f64) -> (f64, Option<Ellipse>) {
    if cells.len() < 3 {
        let radius_km = cells
            .iter()
            .map(|c| haversine_km(best.0, best.1, c.lat, c.lon))
            .fold(0.0, f64::max);
        return (radius_km, None);
    }
    let cos_lat = best.0.to_radians().cos().abs().max(0.05);
    let points: Vec<(f64, f64, f64)> = cells
        .iter()
        .map(|c| {
            let x_km = (c.lon - best.1) * KM_PER_DEG_LON_AT_EQUATOR * cos_lat;
            let y_km = (c.lat - best.0) * KM_PER_DEG_LAT;
            let w = 1.0 / (c.sse - sse_min + BAND_WEIGHT_EPS);
            (x_km, y_km, w)
        })
        .collect();
    let weight_sum: f64 = points.iter().map(|(_, _, w)| w).sum();
    let mean_x: f64 = points.iter().map(|(x, _, w)| x * w).sum::<f64>() / weight_sum;
    let mean_y: f64 = points.iter().map(|(_, y, w)| y * w).sum::<f64>() / weight_sum;
    let sxx: f64 = points
        .iter()
        .map(|(x, _, w)| w * (x - mean_x).powi(2))
        .sum::<f64>()
        / weight_sum;
    let syy: f64 = points
        .iter()
        .map(|(_, y, w)| w * (y - mean_y).powi(2))
        .sum::<f64>()
        / weight_sum;
    let sxy: f64 = points
        .iter()
        .map(|(x, y, w)| w * (x - mean_x) * (y - mean_y))
        .sum::<f64>()
        / weight_sum;

    let trace = sxx + syy;
    let diff = sxx - syy;
    let discriminant = (diff * diff + 4.0 * sxy * sxy).sqrt();
    let eig_major = ((trace + discriminant) / 2.0).max(0.0);
    let eig_minor = ((trace - discriminant) / 2.0).max(0.0);
    let major_km = eig_major.sqrt();
    let minor_km = eig_minor.sqrt();
    let angle_deg = if diff == 0.0 && sxy == 0.0 {
        0.0
    } else {
        let mut angle = 0.5 * (2.0 * sxy).atan2(diff).to_degrees();
        if angle < 0.0 {
            angle += 180.0;
        }
        angle
    };
    (
        major_km,
        Some(Ellipse {
            major_km,
            minor_km,
            angle_deg,
        }),
    )
}

/// Estimate the probable origin from the latest per-endpoint RTT
/// quantiles. Returns `Error::InsufficientData` when fewer than three
/// endpoints have both coordinates and a valid sample (spec §7).
pub fn estimate(
    samples: &[EstimateSample],
    calibration: Option<&CalibrationPack>,
    params: EstimateParams,
) -> Result<Estimate> {
    let eligible: Vec<Eligible> = samples
        .iter()
        .filter(|s| s.p05_ms.is_finite() && s.p95_ms.is_finite())
        .map(|s| {
            let bias = calibration.and_then(|c| c.bias_for(&s.endpoint_id)).unwrap_or(0.0);
            let obs_ms = s.p05_ms - bias;
            let jitter = (s.p95_ms - bias - (s.p05_ms - bias)).max(JITTER_EPS_MS);
            Eligible {
                lat: s.lat,
                lon: s.lon,
                obs_ms,
                weight: 1.0 / jitter,
            }
        })
        .collect();

    if eligible.len() < MIN_ELIGIBLE_ENDPOINTS {
        return Err(Error::InsufficientData(format!(
            "need >= {MIN_ELIGIBLE_ENDPOINTS} endpoints with coordinates and samples, have {}",
            eligible.len()
        )));
    }

    let loose_radii_km: Vec<f64> = eligible
        .iter()
        .map(|e| {
            let budget_ms = (e.obs_ms).max(0.0) * 3.0; // generous loose envelope for the search box only
            budget_ms / 2.0 / 1000.0 * params.physics.c_eff_km_s * params.physics.path_stretch
        })
        .collect();
    let (min_lat, max_lat, min_lon, max_lon) = search_bbox(&eligible, params.physics, &loose_radii_km);

    let mut coarse_best: Option<Cell> = None;
    for lat in grid_points(min_lat, max_lat, COARSE_STEP_DEG) {
        for lon in grid_points(min_lon, max_lon, COARSE_STEP_DEG) {
            let cell = evaluate(lat, lon, &eligible, params.physics);
            if coarse_best.map(|b| cell.sse < b.sse).unwrap_or(true) {
                coarse_best = Some(cell);
            }
        }
    }
    let coarse_best = coarse_best.expect("grid_points always yields at least one point");

    let half_window = params.band_window_deg;
    let fine_min_lat = (coarse_best.lat - half_window).max(-90.0);
    let fine_max_lat = (coarse_best.lat + half_window).min(90.0);
    let fine_min_lon = (coarse_best.lon - half_window).max(-180.0);
    let fine_max_lon = (coarse_best.lon + half_window).min(180.0);

    let mut fine_cells = Vec::new();
    let mut best = coarse_best;
    for lat in grid_points(fine_min_lat, fine_max_lat, FINE_STEP_DEG) {
        for lon in grid_points(fine_min_lon, fine_max_lon, FINE_STEP_DEG) {
            let cell = evaluate(lat, lon, &eligible, params.physics);
            if cell.sse < best.sse {
                best = cell;
            }
            fine_cells.push(cell);
        }
    }

    let sse_min = best.sse;
    let tight_cells = qualifying(&fine_cells, sse_min, params.band_factor_tight);
    let loose_cells = qualifying(&fine_cells, sse_min, params.band_factor_loose);

    let (tight_radius_km, tight_ellipse) = band_shape(&tight_cells, (best.lat, best.lon), sse_min);
    let (loose_radius_km, loose_ellipse) = band_shape(&loose_cells, (best.lat, best.lon), sse_min);
    let loose_bbox = bbox_of(&loose_cells);

    Ok(Estimate {
        lat: best.lat,
        lon: best.lon,
        bias_ms: best.bias_ms,
        sse: best.sse,
        points: eligible.len(),
        tight: UncertaintyBand {
            radius_km: tight_radius_km,
            ellipse: tight_ellipse,
            bbox: None,
        },
        loose: UncertaintyBand {
            radius_km: loose_radius_km,
            ellipse: loose_ellipse,
            bbox: Some(loose_bbox),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_at(id: &str, lat: f64, lon: f64, origin: (f64, f64), bias_ms: f64) -> EstimateSample {
        let d = haversine_km(lat, lon, origin.0, origin.1);
        let physics = PhysicsParams::default();
        let tau = one_way_ms(d, physics);
        let p05 = 2.0 * tau + bias_ms;
        EstimateSample {
            endpoint_id: id.to_string(),
            lat,
            lon,
            p05_ms: p05,
            p95_ms: p05 + 2.0,
        }
    }

    #[test]
    fn fewer_than_three_endpoints_is_insufficient_data() {
        let samples = vec![
            sample_at("a", 0.0, 0.0, (5.0, 5.0), 1.0),
            sample_at("b", 0.0, 10.0, (5.0, 5.0), 1.0),
        ];
        let result = estimate(&samples, None, EstimateParams::default());
        assert!(matches!(result, Err(Error::InsufficientData(_))));
    }

    #[test]
    fn scenario_estimation_around_a_known_point() {
        let origin = (5.0, 5.0);
        let samples = vec![
            sample_at("a", 0.0, 0.0, origin, 1.0),
            sample_at("b", 0.0, 10.0, origin, 1.0),
            sample_at("c", 10.0, 0.0, origin, 1.0),
            sample_at("d", 10.0, 10.0, origin, 1.0),
        ];
        let est = estimate(&samples, None, EstimateParams::default()).expect("estimate");
        assert!((est.lat - origin.0).abs() < 0.3, "lat={}", est.lat);
        assert!((est.lon - origin.1).abs() < 0.3, "lon={}", est.lon);
        assert!((est.bias_ms - 1.0).abs() < 0.6, "bias_ms={}", est.bias_ms);
        assert_eq!(est.points, 4);
        assert!(est.tight.radius_km <= est.loose.radius_km + 1e-9);
    }
}
