//! Two-sample significance testing.

use serde::{Deserialize, Serialize};

use super::descriptive::{is_negligible_spread, mean};
use super::distributions::t_two_tailed_p;
use super::{require_finite, StatsError};

/// Result of Welch's unequal-variance t-test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WelchTest {
    /// `(mean_a - mean_b) / sqrt(var_a/n_a + var_b/n_b)`.
    /// `None` when the standard error is zero and the means differ (t is unbounded).
    pub t_statistic: Option<f64>,
    /// Welch–Satterthwaite degrees of freedom.
    pub df: f64,
    /// Two-tailed p-value in [0, 1].
    pub p_value: f64,
    pub mean_a: f64,
    pub mean_b: f64,
}

impl WelchTest {
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

fn variance(values: &[f64], m: f64) -> f64 {
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0)
}

/// Welch's two-sided t-test. Does not assume equal variances or sizes.
///
/// Both samples need at least 2 observations. When both samples are constant
/// the statistic degenerates: equal means give t = 0, p = 1; different means
/// give no t statistic and p = 0.
pub fn independent_t_test(sample_a: &[f64], sample_b: &[f64]) -> Result<WelchTest, StatsError> {
    require_finite(sample_a, "t-test (first sample)")?;
    require_finite(sample_b, "t-test (second sample)")?;
    if sample_a.len() < 2 {
        return Err(StatsError::too_few("t-test", 2, sample_a.len()));
    }
    if sample_b.len() < 2 {
        return Err(StatsError::too_few("t-test", 2, sample_b.len()));
    }

    let (na, nb) = (sample_a.len() as f64, sample_b.len() as f64);
    let (mean_a, mean_b) = (mean(sample_a), mean(sample_b));
    let se_a = variance(sample_a, mean_a) / na;
    let se_b = variance(sample_b, mean_b) / nb;
    let se = (se_a + se_b).sqrt();

    if is_negligible_spread(se, mean_a.abs().max(mean_b.abs())) {
        let diff = mean_a - mean_b;
        let (t_statistic, p_value) = if diff == 0.0 {
            (Some(0.0), 1.0)
        } else {
            (None, 0.0)
        };
        return Ok(WelchTest {
            t_statistic,
            df: na + nb - 2.0,
            p_value,
            mean_a,
            mean_b,
        });
    }

    let t_statistic = (mean_a - mean_b) / se;
    let df = (se_a + se_b).powi(2) / (se_a.powi(2) / (na - 1.0) + se_b.powi(2) / (nb - 1.0));
    let p_value = t_two_tailed_p(t_statistic, df);

    Ok(WelchTest {
        t_statistic: Some(t_statistic),
        df,
        p_value,
        mean_a,
        mean_b,
    })
}
