//! Burst sample summary statistics, shared by the probe engine (which
//! produces them) and the analyzer (which consumes them).

/// Summary of one burst's round-trip samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub min_ms: f64,
    pub p05_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
}

/// Compute [`Summary`] over `samples_ms`, sorting a copy internally.
/// Returns `None` if `samples_ms` is empty — callers must mark the burst
/// as having no samples rather than fabricating a summary.
pub fn summarize(samples_ms: &[f64]) -> Option<Summary> {
    if samples_ms.is_empty() {
        return None;
    }
    let mut sorted = samples_ms.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let min_ms = sorted[0];
    let p05_ms = sorted[percentile_index(n, 0.05)];
    let median_ms = sorted[n / 2];
    let p95_ms = sorted[percentile_index_ceil(n, 0.95)];
    Some(Summary {
        min_ms,
        p05_ms,
        median_ms,
        p95_ms,
    })
}

fn percentile_index(n: usize, q: f64) -> usize {
    ((q * (n as f64 - 1.0)).floor() as usize).min(n - 1)
}

fn percentile_index_ceil(n: usize, q: f64) -> usize {
    ((q * (n as f64 - 1.0)).ceil() as usize).min(n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_samples_yield_no_summary() {
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn monotonic_for_odd_and_even_counts() {
        let odd = [5.0, 1.0, 3.0, 2.0, 4.0];
        let s = summarize(&odd).expect("non-empty");
        assert!(s.min_ms <= s.p05_ms);
        assert!(s.p05_ms <= s.median_ms);
        assert!(s.median_ms <= s.p95_ms);
        assert_eq!(s.min_ms, 1.0);
        assert_eq!(s.median_ms, 3.0);

        let even = [10.0, 20.0, 30.0, 40.0];
        let s = summarize(&even).expect("non-empty");
        assert!(s.min_ms <= s.p05_ms);
        assert!(s.p05_ms <= s.median_ms);
        assert!(s.median_ms <= s.p95_ms);
        // upper median for even n: index n/2 = 2 -> 30.0
        assert_eq!(s.median_ms, 30.0);
    }

    #[test]
    fn single_sample_is_degenerate_but_monotonic() {
        let s = summarize(&[42.0]).expect("non-empty");
        assert_eq!(s.min_ms, 42.0);
        assert_eq!(s.p05_ms, 42.0);
        assert_eq!(s.median_ms, 42.0);
        assert_eq!(s.p95_ms, 42.0);
    }

    #[test]
    fn monotonicity_holds_over_many_random_like_sizes() {
        for n in 1..50 {
            let samples: Vec<f64> = (0..n).map(|i| ((i * 37 + 3) % 97) as f64).collect();
            let s = summarize(&samples).expect("non-empty");
            assert!(s.min_ms <= s.p05_ms, "n={n}");
            assert!(s.p05_ms <= s.median_ms, "n={n}");
            assert!(s.median_ms <= s.p95_ms, "n={n}");
        }
    }
}
