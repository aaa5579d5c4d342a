//! Raw and enriched per-player records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::computed::Computed;
use super::ids::SubjectId;
use crate::stats::ZScore;

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    RapidApi,
    Fixture,
}

/// One player's statistics as retrieved from the provider.
///
/// `metrics` holds season-level figures (one value per metric). `series` holds
/// the ordered per-game or per-season observations behind them, used for
/// significance tests, consistency and correlation. Season figures that failed
/// plausibility checks are kept out of `metrics` and listed in `rejected`
/// with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub subject_id: SubjectId,
    #[serde(default)]
    pub team: Option<String>,
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub series: BTreeMap<String, Vec<f64>>,
    #[serde(default)]
    pub rejected: BTreeMap<String, String>,
    pub retrieved_at: DateTime<Utc>,
    pub source: DataSource,
}

impl RawRecord {
    pub fn new(subject_id: SubjectId, retrieved_at: DateTime<Utc>, source: DataSource) -> Self {
        Self {
            subject_id,
            team: None,
            metrics: BTreeMap::new(),
            series: BTreeMap::new(),
            rejected: BTreeMap::new(),
            retrieved_at,
            source,
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn with_rejected(mut self, name: impl Into<String>, reason: impl Into<String>) -> Self {
        self.rejected.insert(name.into(), reason.into());
        self
    }

    pub fn with_series(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.series.insert(name.into(), values);
        self
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn series(&self, name: &str) -> Option<MetricSeries> {
        self.series.get(name).map(|values| MetricSeries {
            metric: name.to_string(),
            values: values.clone(),
        })
    }

    /// Content hash (BLAKE3 over the canonical JSON form).
    ///
    /// `BTreeMap` keeps key order stable, so equal records hash equally.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }
}

/// Ordered observations for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub metric: String,
    pub values: Vec<f64>,
}

impl MetricSeries {
    pub fn new(metric: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            metric: metric.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Statistics derived for one metric of a record, relative to the reference population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDerivation {
    pub value: f64,
    pub z_score: Computed<ZScore>,
    pub percentile_rank: Computed<f64>,
    /// Outside the reference population's Tukey fences.
    pub reference_outlier: Computed<bool>,
}

/// A raw record plus its derived statistics. Built once; re-enrichment makes a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub raw: RawRecord,
    pub derived: BTreeMap<String, MetricDerivation>,
}

impl EnrichedRecord {
    pub fn new(raw: RawRecord, derived: BTreeMap<String, MetricDerivation>) -> Self {
        Self { raw, derived }
    }

    pub fn subject_id(&self) -> &SubjectId {
        &self.raw.subject_id
    }

    pub fn derivation(&self, metric: &str) -> Option<&MetricDerivation> {
        self.derived.get(metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> RawRecord {
        RawRecord::new(
            SubjectId::new("Stephen Curry"),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            DataSource::Fixture,
        )
        .with_metric("points_per_game", 29.4)
        .with_series("points_per_game", vec![30.1, 29.5, 32.3])
    }

    #[test]
    fn accessors() {
        let r = sample();
        assert_eq!(r.metric("points_per_game"), Some(29.4));
        assert_eq!(r.metric("steals"), None);
        let s = r.series("points_per_game").unwrap();
        assert_eq!(s.len(), 3);
        assert!(r.series("assists_per_game").is_none());
    }

    #[test]
    fn fingerprint_is_content_addressed() {
        let a = sample();
        let b = sample();
        assert_eq!(a.fingerprint(), b.fingerprint());
        let c = sample().with_metric("points_per_game", 30.0);
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn json_roundtrip_without_series_field() {
        let json = r#"{
            "subject_id": "Kevin Durant",
            "metrics": {"points_per_game": 27.1},
            "retrieved_at": "2024-03-01T12:00:00Z",
            "source": "rapid_api"
        }"#;
        let r: RawRecord = serde_json::from_str(json).unwrap();
        assert!(r.series.is_empty());
        assert!(r.rejected.is_empty());
        assert_eq!(r.team, None);
        assert_eq!(r.source, DataSource::RapidApi);
    }
}
