//! Configuration hygiene checks (spec §4.5): endpoints missing
//! coordinates or a region hint, and host-duplicate clusters.

use lattice_core::types::{Endpoint, Hygiene};
use std::collections::BTreeMap;

/// Compute hygiene findings over a configured endpoint set. Ordering is
/// deterministic (endpoint declaration order for the missing-* lists,
/// host-sorted for duplicate clusters) so CLI/dashboard output is
/// stable across runs.
pub fn hygiene(endpoints: &[Endpoint]) -> Hygiene {
    let missing_coords = endpoints
        .iter()
        .filter(|e| !e.has_coords())
        .map(|e| e.id.clone())
        .collect();
    let missing_region_hint = endpoints
        .iter()
        .filter(|e| e.region_hint.is_none())
        .map(|e| e.id.clone())
        .collect();

    let mut by_host: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for endpoint in endpoints {
        by_host.entry(endpoint.host.as_str()).or_default().push(endpoint.id.clone());
    }
    let host_duplicates = by_host.into_values().filter(|ids| ids.len() > 1).collect();

    Hygiene {
        missing_coords,
        missing_region_hint,
        host_duplicates,
    }
}
