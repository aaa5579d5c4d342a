//! Statistics provider trait and structured retrieval errors.
//!
//! The StatsProvider trait abstracts over data sources (RapidAPI, local
//! fixtures) so we can swap implementations and mock for tests. Providers make
//! exactly one attempt; retry and backoff live in the client above them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{RawRecord, SubjectId};

/// Whether retrying can help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Timeouts, 5xx, rate limiting, connectivity. Retried with backoff.
    Transient,
    /// Not found, malformed response, authentication, internal. Never retried.
    Permanent,
    /// The caller's deadline passed before this subject completed.
    Timeout,
}

/// Retrieval failures, classifiable as transient or permanent.
///
/// Designed to be displayable in both CLI output and report error lists.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetrievalError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("provider returned HTTP {status}")]
    ServerError { status: u16 },

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("circuit breaker open: provider is cooling down")]
    CircuitOpen,

    #[error("player not found: {subject}")]
    NotFound { subject: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("request deadline exceeded before retrieval completed")]
    DeadlineExceeded,

    #[error("internal retrieval failure: {0}")]
    Internal(String),
}

impl RetrievalError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RetrievalError::Timeout(_)
            | RetrievalError::ServerError { .. }
            | RetrievalError::RateLimited { .. }
            | RetrievalError::NetworkUnreachable(_)
            | RetrievalError::CircuitOpen => FailureKind::Transient,
            RetrievalError::NotFound { .. }
            | RetrievalError::MalformedResponse(_)
            | RetrievalError::AuthenticationFailed(_)
            | RetrievalError::Internal(_) => FailureKind::Permanent,
            RetrievalError::DeadlineExceeded => FailureKind::Timeout,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }
}

/// A source of per-player statistics.
pub trait StatsProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// One attempt at fetching a player's record.
    fn fetch(&self, subject: &SubjectId) -> Result<RawRecord, RetrievalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(RetrievalError::Timeout("30s".into()).is_transient());
        assert!(RetrievalError::ServerError { status: 503 }.is_transient());
        assert!(RetrievalError::RateLimited { retry_after_secs: 5 }.is_transient());
        assert!(RetrievalError::NetworkUnreachable("dns".into()).is_transient());
        assert!(RetrievalError::CircuitOpen.is_transient());

        for permanent in [
            RetrievalError::NotFound {
                subject: "Nobody".into(),
            },
            RetrievalError::MalformedResponse("eof".into()),
            RetrievalError::AuthenticationFailed("bad key".into()),
            RetrievalError::Internal("worker panicked".into()),
        ] {
            assert_eq!(permanent.kind(), FailureKind::Permanent);
        }

        assert_eq!(RetrievalError::DeadlineExceeded.kind(), FailureKind::Timeout);
    }

    #[test]
    fn messages_name_the_subject() {
        let e = RetrievalError::NotFound {
            subject: "Jimmy Butler".into(),
        };
        assert_eq!(e.to_string(), "player not found: Jimmy Butler");
    }
}
