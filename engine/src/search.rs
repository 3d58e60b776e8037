//! Window search kernels.
//!
//! Once a model has narrowed a lookup to a window of a sorted run, one of
//! these kernels finds the exact slot. The kernel is a configuration choice;
//! all variants return the same result on the same input.

use serde::{Deserialize, Serialize};

/// Search kernel used inside model-predicted windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchKernel {
    /// Binary search over the window.
    #[default]
    Binary,
    /// Left-to-right scan; wins on very small windows.
    Linear,
    /// Interpolated probe, then widening scan.
    Interpolation,
    /// Galloping search from the window start.
    Exponential,
    /// Vectorized linear scan. Runs as the scalar scan on this build; kept as
    /// a distinct variant because workload applicability excludes it.
    LinearAvx,
}

impl SearchKernel {
    pub fn name(&self) -> &'static str {
        match self {
            SearchKernel::Binary => "binary",
            SearchKernel::Linear => "linear",
            SearchKernel::Interpolation => "interpolation",
            SearchKernel::Exponential => "exponential",
            SearchKernel::LinearAvx => "linear_avx",
        }
    }

    /// AVX variants are excluded from benchmark applicability checks.
    pub fn is_avx(&self) -> bool {
        matches!(self, SearchKernel::LinearAvx)
    }
}

/// Find `key` in `run[lo..hi]` (a sorted slice window) with the chosen
/// kernel. Returns the absolute position in `run`.
pub fn find_in_window(
    kernel: SearchKernel,
    run: &[(u64, u64)],
    lo: usize,
    hi: usize,
    key: u64,
) -> Option<usize> {
    let hi = hi.min(run.len());
    if lo >= hi {
        return None;
    }
    let window = &run[lo..hi];

    let rel = match kernel {
        SearchKernel::Binary => window.binary_search_by_key(&key, |(k, _)| *k).ok(),
        SearchKernel::Linear | SearchKernel::LinearAvx => linear_scan(window, key),
        SearchKernel::Interpolation => interpolation_search(window, key),
        SearchKernel::Exponential => exponential_search(window, key),
    };

    rel.map(|r| lo + r)
}

fn linear_scan(window: &[(u64, u64)], key: u64) -> Option<usize> {
    for (i, (k, _)) in window.iter().enumerate() {
        if *k == key {
            return Some(i);
        }
        if *k > key {
            return None;
        }
    }
    None
}

fn interpolation_search(window: &[(u64, u64)], key: u64) -> Option<usize> {
    let first = window[0].0;
    let last = window[window.len() - 1].0;
    if key < first || key > last {
        return None;
    }
    if first == last {
        return window.iter().position(|(k, _)| *k == key);
    }

    // Single interpolated probe, then bisect the half the probe points at.
    let span = (last - first) as f64;
    let probe =
        (((key - first) as f64 / span) * (window.len() - 1) as f64) as usize;
    let probe = probe.min(window.len() - 1);

    match window[probe].0.cmp(&key) {
        std::cmp::Ordering::Equal => Some(probe),
        std::cmp::Ordering::Less => window[probe + 1..]
            .binary_search_by_key(&key, |(k, _)| *k)
            .ok()
            .map(|r| probe + 1 + r),
        std::cmp::Ordering::Greater => {
            window[..probe].binary_search_by_key(&key, |(k, _)| *k).ok()
        }
    }
}

fn exponential_search(window: &[(u64, u64)], key: u64) -> Option<usize> {
    if window[0].0 == key {
        return Some(0);
    }
    let mut bound = 1usize;
    while bound < window.len() && window[bound].0 < key {
        bound *= 2;
    }
    let lo = bound / 2;
    let hi = (bound + 1).min(window.len());
    window[lo..hi]
        .binary_search_by_key(&key, |(k, _)| *k)
        .ok()
        .map(|r| lo + r)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KERNELS: [SearchKernel; 5] = [
        SearchKernel::Binary,
        SearchKernel::Linear,
        SearchKernel::Interpolation,
        SearchKernel::Exponential,
        SearchKernel::LinearAvx,
    ];

    fn run() -> Vec<(u64, u64)> {
        (0..64u64).map(|i| (i * 3, i)).collect()
    }

    #[test]
    fn test_all_kernels_agree_on_hits() {
        let run = run();
        for kernel in KERNELS {
            for (i, (k, _)) in run.iter().enumerate() {
                assert_eq!(
                    find_in_window(kernel, &run, 0, run.len(), *k),
                    Some(i),
                    "kernel {} missed key {}",
                    kernel.name(),
                    k
                );
            }
        }
    }

    #[test]
    fn test_all_kernels_agree_on_misses() {
        let run = run();
        for kernel in KERNELS {
            assert_eq!(find_in_window(kernel, &run, 0, run.len(), 1), None);
            assert_eq!(find_in_window(kernel, &run, 0, run.len(), 1000), None);
        }
    }

    #[test]
    fn test_windowed_search_respects_bounds() {
        let run = run();
        for kernel in KERNELS {
            // Key 30 sits at index 10; a window that excludes it must miss.
            assert_eq!(find_in_window(kernel, &run, 0, 10, 30), None);
            assert_eq!(find_in_window(kernel, &run, 8, 12, 30), Some(10));
        }
    }

    #[test]
    fn test_empty_window() {
        let run = run();
        for kernel in KERNELS {
            assert_eq!(find_in_window(kernel, &run, 5, 5, 15), None);
            assert_eq!(find_in_window(kernel, &[], 0, 0, 15), None);
        }
    }

    #[test]
    fn test_kernel_names() {
        assert_eq!(SearchKernel::Binary.name(), "binary");
        assert_eq!(SearchKernel::LinearAvx.name(), "linear_avx");
        assert!(SearchKernel::LinearAvx.is_avx());
        assert!(!SearchKernel::Interpolation.is_avx());
    }
}
