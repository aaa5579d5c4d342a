//! Per-player lifecycle through the pipeline.
//!
//! ```text
//! REQUESTED → CACHE_HIT ───────────────────────────→ ENRICHED
//!           → CACHE_MISS → FETCHING → FETCHED ─────→ ENRICHED
//!                                   → FAILED ──────→ EXCLUDED
//! ```
//!
//! Every result carries the full trace so a report can show why a player is
//! missing without re-reading logs.

use serde::{Deserialize, Serialize};

use hoopstat_core::data::{FailureKind, RetrievalError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectState {
    Requested,
    CacheHit,
    CacheMiss,
    Fetching,
    Fetched,
    Failed,
    Enriched,
    Excluded,
}

impl SubjectState {
    pub fn can_transition_to(self, next: SubjectState) -> bool {
        use SubjectState::*;
        matches!(
            (self, next),
            (Requested, CacheHit)
                | (Requested, CacheMiss)
                | (CacheMiss, Fetching)
                | (Fetching, Fetched)
                | (Fetching, Failed)
                | (CacheHit, Enriched)
                | (Fetched, Enriched)
                | (Failed, Excluded)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SubjectState::Enriched | SubjectState::Excluded)
    }
}

/// Ordered trace of states, always starting at `Requested`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle {
    states: Vec<SubjectState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            states: vec![SubjectState::Requested],
        }
    }

    pub fn current(&self) -> SubjectState {
        // never empty: constructed with Requested
        self.states
            .last()
            .copied()
            .unwrap_or(SubjectState::Requested)
    }

    /// Append `next`. Illegal transitions are a pipeline bug.
    pub fn advance(&mut self, next: SubjectState) {
        debug_assert!(
            self.current().can_transition_to(next),
            "illegal lifecycle transition {:?} -> {:?}",
            self.current(),
            next
        );
        self.states.push(next);
    }

    pub fn into_states(self) -> Vec<SubjectState> {
        self.states
    }
}

/// Why a player was excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectFailure {
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
}

impl SubjectFailure {
    pub fn from_retrieval(err: &RetrievalError, attempts: u32) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            attempts,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == FailureKind::Timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SubjectState::*;

    #[test]
    fn legal_paths() {
        for path in [
            vec![Requested, CacheHit, Enriched],
            vec![Requested, CacheMiss, Fetching, Fetched, Enriched],
            vec![Requested, CacheMiss, Fetching, Failed, Excluded],
        ] {
            for w in path.windows(2) {
                assert!(w[0].can_transition_to(w[1]), "{:?} -> {:?}", w[0], w[1]);
            }
            assert!(path.last().unwrap().is_terminal());
        }
    }

    #[test]
    fn illegal_shortcuts() {
        assert!(!Requested.can_transition_to(Enriched));
        assert!(!CacheHit.can_transition_to(Fetching));
        assert!(!Failed.can_transition_to(Enriched));
        assert!(!Enriched.can_transition_to(Excluded));
    }

    #[test]
    fn lifecycle_records_trace() {
        let mut lc = Lifecycle::new();
        lc.advance(CacheMiss);
        lc.advance(Fetching);
        lc.advance(Failed);
        lc.advance(Excluded);
        assert_eq!(lc.current(), Excluded);
        assert_eq!(
            lc.into_states(),
            vec![Requested, CacheMiss, Fetching, Failed, Excluded]
        );
    }

    #[test]
    fn serializes_screaming_case() {
        assert_eq!(serde_json::to_string(&CacheMiss).unwrap(), "\"CACHE_MISS\"");
    }

    #[test]
    fn timeout_failure() {
        let f = SubjectFailure::from_retrieval(&RetrievalError::DeadlineExceeded, 0);
        assert!(f.is_timeout());
        let f = SubjectFailure::from_retrieval(&RetrievalError::ServerError { status: 500 }, 3);
        assert!(!f.is_timeout());
        assert_eq!(f.attempts, 3);
    }
}
