use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the player a statistic is computed about.
///
/// Leading/trailing whitespace is stripped on construction. Equality is exact;
/// [`SubjectId::cache_key`] folds case so "LeBron James" and "lebron james"
/// share a cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    /// Stable storage key: BLAKE3 hex of the lowercased identifier.
    pub fn cache_key(&self) -> String {
        blake3::hash(self.0.to_lowercase().as_bytes())
            .to_hex()
            .to_string()
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SubjectId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}
