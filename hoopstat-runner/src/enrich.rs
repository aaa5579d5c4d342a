//! Enrichment: score each season figure of a raw record against the reference population.

use std::collections::BTreeMap;

use hoopstat_core::domain::{Computed, EnrichedRecord, MetricDerivation, RawRecord};
use hoopstat_core::stats::{self, outliers::tukey_fences};

use crate::reference::ReferencePopulation;

/// Derive z-score, percentile rank and reference-outlier flag for every metric
/// in `raw`. Metrics the population does not cover are `excluded`.
pub fn enrich(raw: RawRecord, reference: &ReferencePopulation) -> EnrichedRecord {
    let derived: BTreeMap<String, MetricDerivation> = raw
        .metrics
        .iter()
        .map(|(metric, &value)| (metric.clone(), derive(metric, value, reference)))
        .collect();
    EnrichedRecord::new(raw, derived)
}

fn derive(metric: &str, value: f64, reference: &ReferencePopulation) -> MetricDerivation {
    let Some(population) = reference.metric(metric) else {
        let reason = format!("'{metric}' is not in the reference population");
        return MetricDerivation {
            value,
            z_score: Computed::excluded(reason.clone()),
            percentile_rank: Computed::excluded(reason.clone()),
            reference_outlier: Computed::excluded(reason),
        };
    };

    MetricDerivation {
        value,
        z_score: Computed::from_stats(stats::z_score(population, value)),
        percentile_rank: Computed::from_stats(stats::percentile_rank(population, value)),
        reference_outlier: Computed::from_stats(
            tukey_fences(population).map(|(lower, upper)| value < lower || value > upper),
        ),
    }
}
