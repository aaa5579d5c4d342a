//! Descriptive statistics: location, spread, z-scores, percentiles, intervals.

use serde::{Deserialize, Serialize};

use super::distributions::t_quantile;
use super::{require_finite, sorted_copy, StatsError};

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator). NaN for fewer than 2 values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (n as f64 - 1.0)).sqrt()
}

/// Population standard deviation (n denominator). NaN for an empty slice.
pub fn population_std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / values.len() as f64).sqrt()
}

/// Spread small enough relative to the location that dividing by it is noise.
pub(crate) fn is_negligible_spread(std_dev: f64, location: f64) -> bool {
    std_dev <= 1e-12 * location.abs().max(1.0)
}

/// Linear-interpolated percentile `p` in [0, 100] of an ascending, non-empty slice.
pub(crate) fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    let pos = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Standardized distance of a value from a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZScore {
    pub value: f64,
    /// The sample had no spread. `value` is reported as 0.0 rather than dividing by zero.
    pub no_variance: bool,
}

/// `(reference_value - mean(sample)) / sample_std_dev(sample)`.
///
/// Fewer than 2 observations is `InsufficientData`. A sample with zero variance
/// yields `ZScore { value: 0.0, no_variance: true }`.
pub fn z_score(sample: &[f64], reference_value: f64) -> Result<ZScore, StatsError> {
    require_finite(sample, "z-score")?;
    if !reference_value.is_finite() {
        return Err(StatsError::InvalidArgument(
            "z-score: reference value is not finite".into(),
        ));
    }
    if sample.len() < 2 {
        return Err(StatsError::too_few("z-score", 2, sample.len()));
    }

    let m = mean(sample);
    let sd = sample_std_dev(sample);
    if is_negligible_spread(sd, m) {
        return Ok(ZScore {
            value: 0.0,
            no_variance: true,
        });
    }
    Ok(ZScore {
        value: (reference_value - m) / sd,
        no_variance: false,
    })
}

/// Linear-interpolated percentiles, one per target, in target order.
///
/// Targets must lie in [0, 100] and the sample must be non-empty.
pub fn percentiles(sample: &[f64], targets: &[f64]) -> Result<Vec<f64>, StatsError> {
    if sample.is_empty() {
        return Err(StatsError::InvalidArgument(
            "percentiles: sample is empty".into(),
        ));
    }
    require_finite(sample, "percentiles")?;
    if let Some(bad) = targets.iter().find(|t| !(0.0..=100.0).contains(*t)) {
        return Err(StatsError::InvalidArgument(format!(
            "percentiles: target {bad} is outside [0, 100]"
        )));
    }

    let sorted = sorted_copy(sample);
    Ok(targets
        .iter()
        .map(|&p| percentile_of_sorted(&sorted, p))
        .collect())
}

/// Percentile rank of `value` within `population`, in [0, 100].
///
/// Ties count half: `(below + 0.5 * equal) / n * 100`.
pub fn percentile_rank(population: &[f64], value: f64) -> Result<f64, StatsError> {
    require_finite(population, "percentile rank")?;
    if !value.is_finite() {
        return Err(StatsError::InvalidArgument(
            "percentile rank: value is not finite".into(),
        ));
    }
    if population.is_empty() {
        return Err(StatsError::too_few("percentile rank", 1, 0));
    }

    let below = population.iter().filter(|&&v| v < value).count() as f64;
    let equal = population.iter().filter(|&&v| v == value).count() as f64;
    Ok((below + 0.5 * equal) / population.len() as f64 * 100.0)
}

/// Two-sided interval for the mean using Student's t critical value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub mean: f64,
    pub std_error: f64,
    pub critical_value: f64,
    pub level: f64,
}

/// `mean ± t_{(1+level)/2, n-1} · s/√n`. `level` must be in (0, 1).
pub fn confidence_interval(sample: &[f64], level: f64) -> Result<ConfidenceInterval, StatsError> {
    if !(level > 0.0 && level < 1.0) {
        return Err(StatsError::InvalidArgument(format!(
            "confidence interval: level {level} is outside (0, 1)"
        )));
    }
    require_finite(sample, "confidence interval")?;
    let n = sample.len();
    if n < 2 {
        return Err(StatsError::too_few("confidence interval", 2, n));
    }

    let m = mean(sample);
    let std_error = sample_std_dev(sample) / (n as f64).sqrt();
    let critical_value = t_quantile((1.0 + level) / 2.0, n as f64 - 1.0);
    let half_width = critical_value * std_error;

    Ok(ConfidenceInterval {
        lower: m - half_width,
        upper: m + half_width,
        mean: m,
        std_error,
        critical_value,
        level,
    })
}

/// How steady a player's output is across observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyMetrics {
    pub mean: f64,
    /// Population standard deviation.
    pub stddev: f64,
    /// `stddev / mean`; `None` when the mean is zero.
    pub coefficient_of_variation: Option<f64>,
}

pub fn consistency_metrics(sample: &[f64]) -> Result<ConsistencyMetrics, StatsError> {
    require_finite(sample, "consistency")?;
    if sample.is_empty() {
        return Err(StatsError::too_few("consistency", 1, 0));
    }

    let m = mean(sample);
    let sd = population_std_dev(sample);
    Ok(ConsistencyMetrics {
        mean: m,
        stddev: sd,
        coefficient_of_variation: if m == 0.0 { None } else { Some(sd / m) },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEBRON: [f64; 7] = [25.3, 27.1, 26.8, 24.6, 28.2, 26.5, 25.9];

    #[test]
    fn z_score_of_mean_is_zero() {
        let z = z_score(&LEBRON, mean(&LEBRON)).unwrap();
        assert!(z.value.abs() < 1e-12);
        assert!(!z.no_variance);
    }

    #[test]
    fn z_score_known_value() {
        // mean 3, sample sd 1.5811
        let z = z_score(&[1.0, 2.0, 3.0, 4.0, 5.0], 6.0).unwrap();
        assert!((z.value - 3.0 / 2.5_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn z_score_requires_two_observations() {
        let err = z_score(&[4.0], 4.0).unwrap_err();
        assert!(err.is_insufficient_data());
        assert!(z_score(&[], 4.0).unwrap_err().is_insufficient_data());
    }

    #[test]
    fn z_score_zero_variance_is_flagged() {
        let z = z_score(&[0.1, 0.1, 0.1], 5.0).unwrap();
        assert_eq!(z.value, 0.0);
        assert!(z.no_variance);
    }

    #[test]
    fn z_score_rejects_nan() {
        let err = z_score(&[1.0, f64::NAN], 1.0).unwrap_err();
        assert!(matches!(err, StatsError::InvalidArgument(_)));
    }

    #[test]
    fn percentiles_interpolate_linearly() {
        let p = percentiles(&[10.0, 12.0, 11.0, 13.0, 12.0, 100.0], &[25.0, 50.0, 75.0]).unwrap();
        assert!((p[0] - 11.25).abs() < 1e-12);
        assert!((p[1] - 12.0).abs() < 1e-12);
        assert!((p[2] - 12.75).abs() < 1e-12);
    }

    #[test]
    fn percentiles_extremes_are_min_and_max() {
        let p = percentiles(&LEBRON, &[0.0, 100.0]).unwrap();
        assert_eq!(p, vec![24.6, 28.2]);
        assert_eq!(percentiles(&[7.0], &[0.0, 37.0, 100.0]).unwrap(), vec![7.0; 3]);
    }

    #[test]
    fn percentiles_reject_bad_input() {
        assert!(matches!(
            percentiles(&[], &[50.0]),
            Err(StatsError::InvalidArgument(_))
        ));
        assert!(matches!(
            percentiles(&LEBRON, &[101.0]),
            Err(StatsError::InvalidArgument(_))
        ));
        assert!(matches!(
            percentiles(&LEBRON, &[-0.5]),
            Err(StatsError::InvalidArgument(_))
        ));
        assert!(matches!(
            percentiles(&LEBRON, &[f64::NAN]),
            Err(StatsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn percentile_rank_counts_ties_half() {
        let pop = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile_rank(&pop, 0.0).unwrap(), 0.0);
        assert_eq!(percentile_rank(&pop, 5.0).unwrap(), 100.0);
        assert_eq!(percentile_rank(&pop, 3.0).unwrap(), 62.5);
        assert!(percentile_rank(&[], 3.0).unwrap_err().is_insufficient_data());
    }

    #[test]
    fn confidence_interval_matches_reference() {
        let ci = confidence_interval(&LEBRON, 0.95).unwrap();
        let m = mean(&LEBRON);
        assert!((ci.mean - m).abs() < 1e-12);
        assert!((ci.critical_value - 2.446912).abs() < 1e-5);
        assert!(ci.lower < m && m < ci.upper);
        assert!(((ci.upper - m) - (m - ci.lower)).abs() < 1e-12);
        let expected_half = 2.446912 * sample_std_dev(&LEBRON) / 7.0_f64.sqrt();
        assert!((ci.upper - m - expected_half).abs() < 1e-4);
    }

    #[test]
    fn confidence_interval_validates_level_and_size() {
        assert!(matches!(
            confidence_interval(&LEBRON, 1.0),
            Err(StatsError::InvalidArgument(_))
        ));
        assert!(matches!(
            confidence_interval(&LEBRON, 0.0),
            Err(StatsError::InvalidArgument(_))
        ));
        assert!(confidence_interval(&[3.0], 0.9)
            .unwrap_err()
            .is_insufficient_data());
    }

    #[test]
    fn wider_level_gives_wider_interval() {
        let narrow = confidence_interval(&LEBRON, 0.80).unwrap();
        let wide = confidence_interval(&LEBRON, 0.99).unwrap();
        assert!(wide.upper - wide.lower > narrow.upper - narrow.lower);
    }

    #[test]
    fn consistency_metrics_population_spread() {
        let c = consistency_metrics(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(c.mean, 5.0);
        assert_eq!(c.stddev, 2.0);
        assert_eq!(c.coefficient_of_variation, Some(0.4));
    }

    #[test]
    fn consistency_cv_undefined_for_zero_mean() {
        let c = consistency_metrics(&[-1.0, 1.0]).unwrap();
        assert_eq!(c.mean, 0.0);
        assert_eq!(c.coefficient_of_variation, None);
        assert!(consistency_metrics(&[]).unwrap_err().is_insufficient_data());
    }
}
