//! Pearson and Spearman correlation with two-tailed significance.

use serde::{Deserialize, Serialize};

use super::descriptive::{is_negligible_spread, mean};
use super::distributions::t_two_tailed_p;
use super::{require_finite, StatsError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    /// Coefficient in [-1, 1].
    pub coefficient: f64,
    /// Two-tailed p-value for H0: no correlation.
    pub p_value: f64,
    /// Number of pairs.
    pub n: usize,
}

fn validate_pairs(x: &[f64], y: &[f64], what: &'static str) -> Result<(), StatsError> {
    if x.len() != y.len() {
        return Err(StatsError::InvalidArgument(format!(
            "{what}: sequences differ in length ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    require_finite(x, what)?;
    require_finite(y, what)?;
    if x.len() < 3 {
        return Err(StatsError::too_few(what, 3, x.len()));
    }
    Ok(())
}

fn pearson_unchecked(x: &[f64], y: &[f64], what: &'static str) -> Result<Correlation, StatsError> {
    let (mx, my) = (mean(x), mean(y));
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let n = x.len();
    let nf = n as f64;
    if is_negligible_spread((sxx / nf).sqrt(), mx) || is_negligible_spread((syy / nf).sqrt(), my)
    {
        return Err(StatsError::ZeroVariance { what });
    }

    let r = (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0);
    let df = nf - 2.0;
    let p_value = if (1.0 - r.abs()) <= f64::EPSILON {
        0.0
    } else {
        t_two_tailed_p(r * (df / (1.0 - r * r)).sqrt(), df)
    };

    Ok(Correlation {
        coefficient: r,
        p_value,
        n,
    })
}

/// Pearson product-moment correlation.
///
/// Lengths must match (`InvalidArgument`); at least 3 pairs and non-constant
/// sequences are required (`InsufficientData` / `ZeroVariance`).
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> Result<Correlation, StatsError> {
    validate_pairs(x, y, "pearson correlation")?;
    pearson_unchecked(x, y, "pearson correlation")
}

/// Spearman rank correlation: Pearson on average ranks (ties share their mean rank).
pub fn spearman_correlation(x: &[f64], y: &[f64]) -> Result<Correlation, StatsError> {
    validate_pairs(x, y, "spearman correlation")?;
    pearson_unchecked(&average_ranks(x), &average_ranks(y), "spearman correlation")
}

/// 1-based ranks in input order; tied values receive the average of their positions.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // positions i..=j (0-based) share rank mean(i+1 ..= j+1)
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}
