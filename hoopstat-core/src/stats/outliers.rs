//! Outlier detection: Tukey IQR fences and leave-one-out z-scores.

use serde::{Deserialize, Serialize};

use super::descriptive::{is_negligible_spread, mean, percentile_of_sorted, sample_std_dev};
use super::{require_finite, sorted_copy, StatsError};

pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;
const IQR_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    Iqr,
    ZScore,
}

/// A flagged observation and its position in the input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    pub index: usize,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub method: OutlierMethod,
    /// Fences (IQR method only).
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    /// |z| cutoff (z-score method only).
    pub threshold: Option<f64>,
    /// In input order.
    pub outliers: Vec<Outlier>,
}

impl OutlierReport {
    pub fn count(&self) -> usize {
        self.outliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outliers.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.outliers.iter().map(|o| o.value).collect()
    }
}

/// Tukey fences: [Q1 - 1.5·IQR, Q3 + 1.5·IQR] with linear-interpolated quartiles.
pub fn tukey_fences(sample: &[f64]) -> Result<(f64, f64), StatsError> {
    require_finite(sample, "IQR outliers")?;
    if sample.is_empty() {
        return Err(StatsError::too_few("IQR outliers", 1, 0));
    }
    let sorted = sorted_copy(sample);
    let q1 = percentile_of_sorted(&sorted, 25.0);
    let q3 = percentile_of_sorted(&sorted, 75.0);
    let iqr = q3 - q1;
    Ok((q1 - IQR_MULTIPLIER * iqr, q3 + IQR_MULTIPLIER * iqr))
}

/// Values strictly outside the Tukey fences, original order preserved.
pub fn detect_outliers_iqr(sample: &[f64]) -> Result<OutlierReport, StatsError> {
    let (lower, upper) = tukey_fences(sample)?;
    let outliers = sample
        .iter()
        .enumerate()
        .filter(|(_, &v)| v < lower || v > upper)
        .map(|(index, &value)| Outlier { index, value })
        .collect();

    Ok(OutlierReport {
        method: OutlierMethod::Iqr,
        lower_bound: Some(lower),
        upper_bound: Some(upper),
        threshold: None,
        outliers,
    })
}

/// Values whose |z| exceeds `threshold`, each scored against the rest of the sample.
///
/// Scoring an observation against a mean and spread it contributes to caps
/// the attainable |z| at (n-1)/√n, so one extreme game among a handful can
/// never cross 3.0. Excluding the observation from its own baseline removes
/// that ceiling. Needs at least 3 observations so the remainder has a spread.
/// A constant remainder flags any differing value.
pub fn detect_outliers_zscore(sample: &[f64], threshold: f64) -> Result<OutlierReport, StatsError> {
    if !(threshold.is_finite() && threshold > 0.0) {
        return Err(StatsError::InvalidArgument(format!(
            "z-score outliers: threshold {threshold} must be positive and finite"
        )));
    }
    require_finite(sample, "z-score outliers")?;
    if sample.len() < 3 {
        return Err(StatsError::too_few("z-score outliers", 3, sample.len()));
    }

    let mut rest = Vec::with_capacity(sample.len() - 1);
    let mut outliers = Vec::new();
    for (index, &value) in sample.iter().enumerate() {
        rest.clear();
        rest.extend(
            sample
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != index)
                .map(|(_, &v)| v),
        );
        let m = mean(&rest);
        let sd = sample_std_dev(&rest);
        let flagged = if is_negligible_spread(sd, m) {
            // rounding in the mean must not flag a value equal to the rest
            !is_negligible_spread((value - m).abs(), m)
        } else {
            ((value - m) / sd).abs() > threshold
        };
        if flagged {
            outliers.push(Outlier { index, value });
        }
    }

    Ok(OutlierReport {
        method: OutlierMethod::ZScore,
        lower_bound: None,
        upper_bound: None,
        threshold: Some(threshold),
        outliers,
    })
}
