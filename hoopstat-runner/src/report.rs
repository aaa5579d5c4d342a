//! Comparison and performance reports.
//!
//! Reports are plain serde structs with stable field names; every map is a
//! `BTreeMap` and every list follows caller order, so two reports built from
//! the same cached records serialize identically (apart from `generated_at`).
//! Derived numbers are `Computed<T>`: a value, insufficient data, or excluded
//! with a reason.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use hoopstat_core::data::FailureKind;
use hoopstat_core::domain::{Computed, DataSource, EnrichedRecord, MetricDerivation, SubjectId};
use hoopstat_core::stats::{
    self, ConfidenceInterval, ConsistencyMetrics, Correlation, OutlierReport, WelchTest, ZScore,
};

use crate::lifecycle::SubjectFailure;

/// A player that could not be included, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportError {
    pub subject_id: SubjectId,
    pub kind: FailureKind,
    pub message: String,
}

impl ReportError {
    pub fn from_failure(subject_id: SubjectId, failure: &SubjectFailure) -> Self {
        Self {
            subject_id,
            kind: failure.kind,
            message: failure.message.clone(),
        }
    }
}

/// Knobs the report builders need from the pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisSettings {
    pub significance_alpha: f64,
    pub confidence_level: f64,
    pub outlier_z_threshold: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            significance_alpha: 0.05,
            confidence_level: 0.95,
            outlier_z_threshold: stats::DEFAULT_Z_THRESHOLD,
        }
    }
}

fn series<'a>(record: &'a EnrichedRecord, metric: &str) -> &'a [f64] {
    record
        .raw
        .series
        .get(metric)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

// ─── Comparison ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub requested: Vec<SubjectId>,
    /// Players with data, in request order.
    pub included: Vec<SubjectId>,
    pub metrics: Vec<String>,
    pub covariate: Option<String>,
    pub significance_alpha: f64,
    /// One entry per requested metric, in request order.
    pub comparisons: Vec<MetricComparison>,
    pub errors: Vec<ReportError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: String,
    pub values: Vec<SubjectMetric>,
    /// Welch t-test for every pair of included players, in request order.
    pub pairwise: Vec<PairwiseTest>,
    /// Per-player correlation of this metric against the covariate.
    pub correlations: Vec<SubjectCorrelation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectMetric {
    pub subject_id: SubjectId,
    pub season_value: Computed<f64>,
    pub z_score: Computed<ZScore>,
    pub percentile_rank: Computed<f64>,
    pub observations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseTest {
    pub subject_a: SubjectId,
    pub subject_b: SubjectId,
    pub test: Computed<WelchTest>,
    /// `p < alpha`; absent when the test could not be run.
    pub significant: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectCorrelation {
    pub subject_id: SubjectId,
    pub covariate: String,
    pub pearson: Computed<Correlation>,
    pub spearman: Computed<Correlation>,
}

/// Why a record has no season figure for `metric`: the plausibility rejection
/// when there was one, otherwise `fallback`.
fn missing_season(record: &EnrichedRecord, metric: &str, fallback: impl FnOnce() -> String) -> String {
    match record.raw.rejected.get(metric) {
        Some(reason) => format!("{metric} rejected: {reason}"),
        None => fallback(),
    }
}

fn subject_metric(record: &EnrichedRecord, metric: &str) -> SubjectMetric {
    let not_reported = || {
        missing_season(record, metric, || {
            format!("{} has no season value for '{metric}'", record.subject_id())
        })
    };
    let (season_value, z_score, percentile_rank) = match record.derivation(metric) {
        Some(MetricDerivation {
            value,
            z_score,
            percentile_rank,
            ..
        }) => (Computed::present(*value), z_score.clone(), percentile_rank.clone()),
        None => (
            Computed::excluded(not_reported()),
            Computed::excluded(not_reported()),
            Computed::excluded(not_reported()),
        ),
    };
    SubjectMetric {
        subject_id: record.subject_id().clone(),
        season_value,
        z_score,
        percentile_rank,
        observations: series(record, metric).len(),
    }
}

/// Build the comparison from enriched records (already in request order).
pub fn build_comparison(
    requested: Vec<SubjectId>,
    records: &[EnrichedRecord],
    errors: Vec<ReportError>,
    metrics: &[String],
    covariate: Option<&str>,
    settings: &AnalysisSettings,
) -> ComparisonReport {
    let comparisons = metrics
        .iter()
        .map(|metric| {
            let values = records.iter().map(|r| subject_metric(r, metric)).collect();

            let mut pairwise = Vec::new();
            for (i, a) in records.iter().enumerate() {
                for b in &records[i + 1..] {
                    let test = Computed::from_stats(stats::independent_t_test(
                        series(a, metric),
                        series(b, metric),
                    ));
                    let significant = test.value().map(|t| t.is_significant(settings.significance_alpha));
                    pairwise.push(PairwiseTest {
                        subject_a: a.subject_id().clone(),
                        subject_b: b.subject_id().clone(),
                        test,
                        significant,
                    });
                }
            }

            let correlations = covariate
                .map(|cov| {
                    records
                        .iter()
                        .map(|r| {
                            let (x, y) = (series(r, metric), series(r, cov));
                            SubjectCorrelation {
                                subject_id: r.subject_id().clone(),
                                covariate: cov.to_string(),
                                pearson: Computed::from_stats(stats::pearson_correlation(x, y)),
                                spearman: Computed::from_stats(stats::spearman_correlation(x, y)),
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();

            MetricComparison {
                metric: metric.clone(),
                values,
                pairwise,
                correlations,
            }
        })
        .collect();

    ComparisonReport {
        requested,
        included: records.iter().map(|r| r.subject_id().clone()).collect(),
        metrics: metrics.to_vec(),
        covariate: covariate.map(str::to_owned),
        significance_alpha: settings.significance_alpha,
        comparisons,
        errors,
    }
}

// ─── Performance ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub requested: Vec<SubjectId>,
    /// In request order.
    pub players: Vec<PlayerPerformance>,
    pub errors: Vec<ReportError>,
}

impl PerformanceReport {
    pub fn player(&self, id: &SubjectId) -> Option<&PlayerPerformance> {
        self.players.iter().find(|p| &p.subject_id == id)
    }

    /// BLAKE3 over everything except `generated_at`. Equal inputs give equal digests.
    pub fn content_digest(&self) -> String {
        let body = (&self.requested, &self.players, &self.errors);
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerPerformance {
    pub subject_id: SubjectId,
    pub retrieved_at: DateTime<Utc>,
    pub source: DataSource,
    pub record_fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    pub metrics: BTreeMap<String, MetricPerformance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPerformance {
    /// Season figure scored against the reference population. Excluded for
    /// metrics that only have per-game observations.
    pub season: Computed<MetricDerivation>,
    pub observations: usize,
    pub consistency: Computed<ConsistencyMetrics>,
    pub confidence_interval: Computed<ConfidenceInterval>,
    pub iqr_outliers: Computed<OutlierReport>,
    pub zscore_outliers: Computed<OutlierReport>,
}

fn metric_performance(record: &EnrichedRecord, metric: &str, settings: &AnalysisSettings) -> MetricPerformance {
    let obs = series(record, metric);
    MetricPerformance {
        season: match record.derivation(metric) {
            Some(d) => Computed::present(d.clone()),
            None => Computed::excluded(missing_season(record, metric, || {
                "no season figure".to_string()
            })),
        },
        observations: obs.len(),
        consistency: Computed::from_stats(stats::consistency_metrics(obs)),
        confidence_interval: Computed::from_stats(stats::confidence_interval(
            obs,
            settings.confidence_level,
        )),
        iqr_outliers: Computed::from_stats(stats::detect_outliers_iqr(obs)),
        zscore_outliers: Computed::from_stats(stats::detect_outliers_zscore(
            obs,
            settings.outlier_z_threshold,
        )),
    }
}

pub fn build_performance(
    generated_at: DateTime<Utc>,
    requested: Vec<SubjectId>,
    records: &[EnrichedRecord],
    errors: Vec<ReportError>,
    settings: &AnalysisSettings,
) -> PerformanceReport {
    let players = records
        .iter()
        .map(|record| {
            let names: BTreeSet<&str> = record
                .raw
                .metrics
                .keys()
                .chain(record.raw.series.keys())
                .chain(record.raw.rejected.keys())
                .map(String::as_str)
                .collect();
            PlayerPerformance {
                subject_id: record.subject_id().clone(),
                retrieved_at: record.raw.retrieved_at,
                source: record.raw.source,
                record_fingerprint: record.raw.fingerprint(),
                team: record.raw.team.clone(),
                metrics: names
                    .into_iter()
                    .map(|m| (m.to_string(), metric_performance(record, m, settings)))
                    .collect(),
            }
        })
        .collect();

    PerformanceReport {
        generated_at,
        requested,
        players,
        errors,
    }
}
