//! Provider JSON payload and its adaptation to the canonical [`RawRecord`].
//!
//! Season figures arrive under short keys (`ppg`, `fg_pct`, ...) and are
//! renamed to canonical metric names. An optional `game_log` array of per-game
//! objects becomes the record's `series`, game order preserved. Absent figures
//! are omitted rather than defaulted to zero.
//!
//! Counting and shooting figures are checked against plausible season ranges.
//! A negative value is impossible and fails the payload as malformed. A value
//! above the range (a percentage sent as 45.0 instead of 0.45, say) is kept
//! out of the record's metrics and listed under `rejected` with the reason.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use super::provider::RetrievalError;
use crate::domain::{DataSource, RawRecord, SubjectId};

/// Short payload key → canonical metric name.
const METRIC_ALIASES: &[(&str, &str)] = &[
    ("ppg", "points_per_game"),
    ("pts", "points_per_game"),
    ("rpg", "rebounds_per_game"),
    ("reb", "rebounds_per_game"),
    ("apg", "assists_per_game"),
    ("ast", "assists_per_game"),
    ("fg_pct", "field_goal_percentage"),
    ("three_pct", "three_point_percentage"),
    ("fg3_pct", "three_point_percentage"),
    ("per", "player_efficiency_rating"),
    ("ts_pct", "true_shooting_percentage"),
];

/// Plausible season range per canonical metric.
const PLAUSIBLE_RANGES: &[(&str, f64, f64)] = &[
    ("points_per_game", 0.0, 50.0),
    ("rebounds_per_game", 0.0, 20.0),
    ("assists_per_game", 0.0, 15.0),
    ("field_goal_percentage", 0.0, 1.0),
    ("three_point_percentage", 0.0, 1.0),
    ("true_shooting_percentage", 0.0, 1.5),
];

/// `(min, max)` a season figure must fall in; `None` for unbounded metrics.
pub fn plausible_range(metric: &str) -> Option<(f64, f64)> {
    PLAUSIBLE_RANGES
        .iter()
        .find(|(name, _, _)| *name == metric)
        .map(|&(_, lo, hi)| (lo, hi))
}

/// Canonical name for a payload key; unknown keys pass through unchanged.
pub fn canonical_metric(key: &str) -> &str {
    METRIC_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(key)
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerPayload {
    #[serde(default)]
    pub team: Option<String>,
    pub ppg: Option<f64>,
    pub rpg: Option<f64>,
    pub apg: Option<f64>,
    pub fg_pct: Option<f64>,
    pub three_pct: Option<f64>,
    pub per: Option<f64>,
    pub ts_pct: Option<f64>,
    #[serde(default)]
    pub game_log: Vec<BTreeMap<String, Value>>,
}

impl PlayerPayload {
    /// Parse a response body. Accepts a bare player object, an array of them
    /// (first entry wins) or either wrapped in `{"body": ...}`.
    pub fn from_slice(bytes: &[u8], subject: &SubjectId) -> Result<Self, RetrievalError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| RetrievalError::MalformedResponse(format!("invalid JSON: {e}")))?;
        Self::from_value(value, subject)
    }

    pub fn from_value(value: Value, subject: &SubjectId) -> Result<Self, RetrievalError> {
        let not_found = || RetrievalError::NotFound {
            subject: subject.to_string(),
        };

        let player = match value {
            Value::Object(mut map) if map.contains_key("body") => {
                let body = map.remove("body").unwrap_or(Value::Null);
                return Self::from_value(body, subject);
            }
            Value::Array(items) => items.into_iter().next().ok_or_else(not_found)?,
            Value::Null => return Err(not_found()),
            other => other,
        };

        if !player.is_object() {
            return Err(RetrievalError::MalformedResponse(
                "expected a player object".into(),
            ));
        }
        serde_json::from_value(player)
            .map_err(|e| RetrievalError::MalformedResponse(format!("player payload: {e}")))
    }

    fn season_metrics(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        [
            ("ppg", self.ppg),
            ("rpg", self.rpg),
            ("apg", self.apg),
            ("fg_pct", self.fg_pct),
            ("three_pct", self.three_pct),
            ("per", self.per),
            ("ts_pct", self.ts_pct),
        ]
        .into_iter()
        .filter_map(|(key, v)| v.map(|v| (canonical_metric(key), v)))
    }

    /// Canonical record for `subject`. A payload with no usable figures is malformed.
    pub fn into_record(
        self,
        subject: &SubjectId,
        retrieved_at: DateTime<Utc>,
        source: DataSource,
    ) -> Result<RawRecord, RetrievalError> {
        let mut record = RawRecord::new(subject.clone(), retrieved_at, source);
        if let Some(team) = self.team.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            record = record.with_team(team);
        }
        for (metric, value) in self.season_metrics() {
            if !value.is_finite() {
                return Err(RetrievalError::MalformedResponse(format!(
                    "{metric} is not a finite number"
                )));
            }
            match plausible_range(metric) {
                Some((lo, _)) if value < lo => {
                    return Err(RetrievalError::MalformedResponse(format!(
                        "{metric} = {value} is below {lo}"
                    )));
                }
                Some((_, hi)) if value > hi => {
                    warn!(subject = %subject, metric, value, "implausible season figure rejected");
                    record = record.with_rejected(
                        metric,
                        format!("{value} is above the plausible maximum {hi}"),
                    );
                }
                _ => record = record.with_metric(metric, value),
            }
        }

        let mut series: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for game in &self.game_log {
            for (key, value) in game {
                if let Some(v) = value.as_f64().filter(|v| v.is_finite()) {
                    let metric = canonical_metric(key);
                    if v < 0.0 && plausible_range(metric).is_some() {
                        return Err(RetrievalError::MalformedResponse(format!(
                            "negative {metric} in game log"
                        )));
                    }
                    series.entry(metric.to_string()).or_default().push(v);
                }
            }
        }
        for (metric, values) in series {
            record = record.with_series(metric, values);
        }

        if record.metrics.is_empty() && record.series.is_empty() && record.rejected.is_empty() {
            return Err(RetrievalError::MalformedResponse(format!(
                "no statistics in payload for {subject}"
            )));
        }
        Ok(record)
    }
}
