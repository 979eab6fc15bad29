//! Physics-mismatch detector (spec §4.3 "Detector"): flags a burst whose
//! minimum RTT is implausibly high for an endpoint whose region hint
//! loosely matches a claimed egress region.

use lattice_core::types::PhysicsMismatch;

/// Case-insensitive substring match in either direction — intentionally
/// forgiving per spec §9's open question on region-name canonicalization.
fn loosely_matches(a: &str, b: &str) -> bool {
    let a = a.to_ascii_lowercase();
    let b = b.to_ascii_lowercase();
    a.contains(&b) || b.contains(&a)
}

/// Evaluate one endpoint's burst against the configured claim. Returns
/// `None` unless a claim is configured, the endpoint has a region hint
/// that loosely matches it, the burst produced a finite minimum RTT, and
/// that minimum exceeds `threshold_ms`.
pub fn detect(
    claimed_egress_region: Option<&str>,
    endpoint_id: &str,
    region_hint: Option<&str>,
    min_ms: Option<f64>,
    threshold_ms: f64,
) -> Option<PhysicsMismatch> {
    let claim = claimed_egress_region?;
    let hint = region_hint?;
    if !loosely_matches(claim, hint) {
        return None;
    }
    let min_ms = min_ms?;
    if !min_ms.is_finite() || min_ms <= threshold_ms {
        return None;
    }
    Some(PhysicsMismatch {
        claimed_region: claim.to_string(),
        endpoint_id: endpoint_id.to_string(),
        min_ms,
        threshold_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_claim_never_fires() {
        assert!(detect(None, "e", Some("us-east"), Some(100.0), 5.0).is_none());
    }

    #[test]
    fn no_region_hint_never_fires() {
        assert!(detect(Some("us-east"), "e", None, Some(100.0), 5.0).is_none());
    }

    #[test]
    fn mismatched_region_never_fires() {
        assert!(detect(Some("us-east"), "e", Some("eu-west"), Some(100.0), 5.0).is_none());
    }

    #[test]
    fn matching_region_under_threshold_does_not_fire() {
        assert!(detect(Some("us-east"), "e", Some("US-EAST-1"), Some(2.0), 5.0).is_none());
    }

    #[test]
    fn matching_region_over_threshold_fires_with_numbers() {
        let m = detect(Some("us-east"), "ep1", Some("US-EAST-1"), Some(40.0), 5.0)
            .expect("should fire");
        assert_eq!(m.claimed_region, "us-east");
        assert_eq!(m.endpoint_id, "ep1");
        assert_eq!(m.min_ms, 40.0);
        assert_eq!(m.threshold_ms, 5.0);
    }

    #[test]
    fn substring_match_is_bidirectional() {
        // hint is a substring of claim
        assert!(detect(Some("us-east-1"), "e", Some("us-east"), Some(40.0), 5.0).is_some());
        // claim is a substring of hint
        assert!(detect(Some("east"), "e", Some("us-east-1"), Some(40.0), 5.0).is_some());
    }

    #[test]
    fn non_finite_min_never_fires() {
        assert!(detect(Some("us-east"), "e", Some("us-east"), Some(f64::INFINITY), 5.0).is_none());
        assert!(detect(Some("us-east"), "e", Some("us-east"), Some(f64::NAN), 5.0).is_none());
    }
}
