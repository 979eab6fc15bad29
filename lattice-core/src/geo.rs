//! Great-circle distance and physics-bound helpers shared by the probe
//! engine's detector and the analyzer.

/// Mean earth radius in kilometers, per spec.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default effective signal propagation speed in fiber (km/s), roughly
/// two-thirds of vacuum light speed.
pub const DEFAULT_C_EFF_KM_S: f64 = 200_000.0;

/// Default routing-stretch multiplier widening physics bounds to account
/// for real-world path indirection. `1.0` yields the most conservative
/// (least forgiving) falsification.
pub const DEFAULT_PATH_STRETCH: f64 = 1.1;

/// Great-circle distance between two lat/lon points in decimal degrees,
/// in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Maximum physically plausible one-way distance given an RTT `budget_ms`
/// (already bias-corrected), under `c_eff`/`path_stretch`. The factor of
/// two converts the RTT budget into a one-way travel time.
pub fn max_dist_km(budget_ms: f64, c_eff_km_s: f64, path_stretch: f64) -> f64 {
    let budget_ms = budget_ms.max(0.0);
    (budget_ms / 2.0 / 1000.0) * c_eff_km_s * path_stretch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(haversine_km(51.5, -0.1, 51.5, -0.1), 0.0);
    }

    #[test]
    fn antipodal_distance_is_half_circumference() {
        // Antipode of (10, 20) is (-10, -160).
        let d = haversine_km(10.0, 20.0, -10.0, -160.0);
        let expected = std::f64::consts::PI * EARTH_RADIUS_KM;
        assert!((d - expected).abs() < 1.0, "got {d}, expected ~{expected}");
    }

    #[test]
    fn budget_non_negativity() {
        assert_eq!(max_dist_km(0.0, DEFAULT_C_EFF_KM_S, DEFAULT_PATH_STRETCH), 0.0);
        assert!(max_dist_km(5.0, DEFAULT_C_EFF_KM_S, DEFAULT_PATH_STRETCH) > 0.0);
        // Negative budgets clamp to zero rather than going negative.
        assert_eq!(max_dist_km(-5.0, DEFAULT_C_EFF_KM_S, DEFAULT_PATH_STRETCH), 0.0);
    }

    #[test]
    fn scenario_physics_falsification_stockholm_vs_sf() {
        // Stockholm claim, San Francisco endpoint with p05 = 2ms.
        let dist = haversine_km(59.3293, 18.0686, 37.77, -122.42);
        assert!((dist - 8614.0).abs() < 50.0, "dist={dist}");
        let budget = (2.0f64 - 0.0).max(0.0); // no calibration bias
        let max_dist = max_dist_km(budget, DEFAULT_C_EFF_KM_S, DEFAULT_PATH_STRETCH);
        assert!((max_dist - 220.0).abs() < 5.0, "max_dist={max_dist}");
        assert!(max_dist < dist);
    }
}
