//! Tri-state result for every derived value that ends up in a report.
//!
//! A consumer must always be able to tell "here is the number" apart from
//! "not enough observations" and "deliberately left out". Nothing is dropped
//! silently.

use serde::{Deserialize, Serialize};

use crate::stats::StatsError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Computed<T> {
    Present { value: T },
    InsufficientData { reason: String },
    Excluded { reason: String },
}

impl<T> Computed<T> {
    pub fn present(value: T) -> Self {
        Computed::Present { value }
    }

    pub fn insufficient(reason: impl Into<String>) -> Self {
        Computed::InsufficientData {
            reason: reason.into(),
        }
    }

    pub fn excluded(reason: impl Into<String>) -> Self {
        Computed::Excluded {
            reason: reason.into(),
        }
    }

    /// Map an analyzer result: insufficient data stays insufficient data,
    /// invalid arguments become exclusions.
    pub fn from_stats(result: Result<T, StatsError>) -> Self {
        match result {
            Ok(value) => Computed::Present { value },
            Err(e) if e.is_insufficient_data() => Computed::insufficient(e.to_string()),
            Err(e) => Computed::excluded(e.to_string()),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Computed::Present { value } => Some(value),
            _ => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Computed::Present { .. })
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Computed<U> {
        match self {
            Computed::Present { value } => Computed::Present { value: f(value) },
            Computed::InsufficientData { reason } => Computed::InsufficientData { reason },
            Computed::Excluded { reason } => Computed::Excluded { reason },
        }
    }
}
