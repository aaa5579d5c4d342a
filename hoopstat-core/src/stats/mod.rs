//! Statistical analyzer: pure functions over numeric samples.
//!
//! No I/O and no shared state: every function depends only on its arguments,
//! so results are identical regardless of calling order or thread.
//!
//! - Descriptive: mean/stddev, z-score, percentiles, percentile rank,
//!   confidence interval, consistency metrics
//! - Hypothesis: Welch's two-sample t-test
//! - Correlation: Pearson and Spearman with two-tailed p-values
//! - Outliers: Tukey IQR fences and leave-one-out z-scores
//! - Distributions: ln Gamma, incomplete beta, Student's t CDF and quantile

pub mod correlation;
pub mod descriptive;
pub mod distributions;
pub mod hypothesis;
pub mod outliers;

use thiserror::Error;

pub use correlation::{pearson_correlation, spearman_correlation, Correlation};
pub use descriptive::{
    confidence_interval, consistency_metrics, mean, percentile_rank, percentiles,
    population_std_dev, sample_std_dev, z_score, ConfidenceInterval, ConsistencyMetrics, ZScore,
};
pub use distributions::{t_cdf, t_quantile, t_two_tailed_p};
pub use hypothesis::{independent_t_test, WelchTest};
pub use outliers::{
    detect_outliers_iqr, detect_outliers_zscore, Outlier, OutlierMethod, OutlierReport,
    DEFAULT_Z_THRESHOLD,
};

/// Errors raised by the analyzer. Always surfaced to the immediate caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    /// Malformed input: out-of-range percentile, mismatched lengths, non-finite values.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("insufficient data for {what}: need at least {needed} observations, got {got}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        got: usize,
    },

    /// The statistic divides by a spread that is exactly zero.
    #[error("insufficient data for {what}: sample has zero variance")]
    ZeroVariance { what: &'static str },
}

impl StatsError {
    pub(crate) fn too_few(what: &'static str, needed: usize, got: usize) -> Self {
        StatsError::InsufficientData { what, needed, got }
    }

    /// Both `InsufficientData` and `ZeroVariance` mean "not computable from this sample".
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self,
            StatsError::InsufficientData { .. } | StatsError::ZeroVariance { .. }
        )
    }
}

/// Reject NaN and infinities up front; every routine below assumes finite input.
pub(crate) fn require_finite(sample: &[f64], what: &str) -> Result<(), StatsError> {
    match sample.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(StatsError::InvalidArgument(format!(
            "{what}: non-finite observation at index {i}"
        ))),
        None => Ok(()),
    }
}

/// Ascending copy using IEEE total order (inputs are already known finite).
pub(crate) fn sorted_copy(sample: &[f64]) -> Vec<f64> {
    let mut sorted = sample.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}
