//! Linear position models shared by both index tiers.
//!
//! Both the write-optimized tier (segments over a sorted base) and the
//! read-optimized tier (root router + leaves) predict positions with a
//! single linear regression per run and correct the prediction inside a
//! measured error window.

/// Linear model over a sorted run of keys.
///
/// Predicts `position = slope * key + intercept`, clamped to the run, with a
/// measured maximum error so callers can search a bounded window instead of
/// the whole run.
#[derive(Debug, Clone)]
pub struct LinearModel {
    slope: f64,
    intercept: f64,
    key_min: u64,
    key_max: u64,
    max_error: usize,
    len: usize,
}

impl LinearModel {
    /// Fit a model to the keys of a sorted run.
    ///
    /// The error bound is measured, not estimated: after fitting, every key is
    /// predicted once and the worst absolute error is kept.
    pub fn fit<T>(run: &[(u64, T)]) -> Self {
        if run.is_empty() {
            return Self {
                slope: 0.0,
                intercept: 0.0,
                key_min: 0,
                key_max: 0,
                max_error: 0,
                len: 0,
            };
        }

        let len = run.len();
        let key_min = run[0].0;
        let key_max = run[len - 1].0;

        if len == 1 || key_min == key_max {
            // Degenerate run: prediction is pinned to 0, so the window must
            // cover the whole run.
            return Self {
                slope: 0.0,
                intercept: 0.0,
                key_min,
                key_max,
                max_error: len - 1,
                len,
            };
        }

        let slope = (len - 1) as f64 / (key_max - key_min) as f64;
        let intercept = -(key_min as f64) * slope;

        let mut max_error = 0usize;
        for (i, (key, _)) in run.iter().enumerate() {
            let predicted = ((slope * *key as f64 + intercept).max(0.0) as usize).min(len - 1);
            max_error = max_error.max(predicted.abs_diff(i));
        }

        Self {
            slope,
            intercept,
            key_min,
            key_max,
            max_error,
            len,
        }
    }

    /// Predict the position of `key`, clamped into the run.
    #[inline(always)]
    pub fn predict(&self, key: u64) -> usize {
        if self.len == 0 {
            return 0;
        }
        let raw = (self.slope * key as f64 + self.intercept).max(0.0) as usize;
        raw.min(self.len - 1)
    }

    /// Window `[lo, hi)` guaranteed to contain `key` if it is in the run.
    #[inline]
    pub fn window(&self, key: u64, bound: usize) -> (usize, usize) {
        let predicted = self.predict(key);
        let slack = self.max_error.max(bound);
        let lo = predicted.saturating_sub(slack);
        let hi = (predicted + slack + 1).min(self.len);
        (lo, hi)
    }

    /// Measured maximum prediction error.
    #[inline]
    pub fn max_error(&self) -> usize {
        self.max_error
    }

    #[inline]
    pub fn contains(&self, key: u64) -> bool {
        self.len > 0 && key >= self.key_min && key <= self.key_max
    }
}
