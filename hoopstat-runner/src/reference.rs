//! Reference population: the league-wide baseline players are scored against.
//!
//! Two file formats:
//! - CSV: header of metric names, one row per player. Columns that are not
//!   entirely numeric (`player`, `team`) are ignored; blank cells are skipped.
//! - TOML: `[metrics]` table of metric name → array of values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("failed to read reference population {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse reference CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to parse reference TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported reference file extension: {0} (expected .csv or .toml)")]
    UnsupportedFormat(String),

    #[error("reference metric '{metric}' contains a non-finite value")]
    NonFinite { metric: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferencePopulation {
    metrics: BTreeMap<String, Vec<f64>>,
}

impl ReferencePopulation {
    pub fn new(metrics: BTreeMap<String, Vec<f64>>) -> Result<Self, ReferenceError> {
        for (metric, values) in &metrics {
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ReferenceError::NonFinite {
                    metric: metric.clone(),
                });
            }
        }
        let metrics = metrics.into_iter().filter(|(_, v)| !v.is_empty()).collect();
        Ok(Self { metrics })
    }

    /// Load by extension (`.csv` or `.toml`).
    pub fn from_path(path: &Path) -> Result<Self, ReferenceError> {
        let content = std::fs::read_to_string(path).map_err(|source| ReferenceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::from_csv_str(&content),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml_str(&content),
            other => Err(ReferenceError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    pub fn from_csv_str(content: &str) -> Result<Self, ReferenceError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();

        let mut columns: Vec<Option<Vec<f64>>> = vec![Some(Vec::new()); headers.len()];
        for row in reader.records() {
            let row = row?;
            for (col, cell) in row.iter().enumerate() {
                let Some(Some(values)) = columns.get_mut(col) else {
                    continue;
                };
                if cell.is_empty() {
                    continue;
                }
                match cell.parse::<f64>() {
                    Ok(v) => values.push(v),
                    // a single non-numeric cell marks an identifier column
                    Err(_) => columns[col] = None,
                }
            }
        }

        Self::new(
            headers
                .into_iter()
                .zip(columns)
                .filter_map(|(name, values)| values.map(|v| (name, v)))
                .collect(),
        )
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ReferenceError> {
        #[derive(Deserialize)]
        struct File {
            #[serde(default)]
            metrics: BTreeMap<String, Vec<f64>>,
        }
        let file: File = toml::from_str(content)?;
        Self::new(file.metrics)
    }

    /// Population values for `metric`, if it has any.
    pub fn metric(&self, metric: &str) -> Option<&[f64]> {
        self.metrics.get(metric).map(Vec::as_slice)
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    /// True when no metric has any values.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }
}
