//! Retrieval client: retry, backoff and circuit breaking over a [`StatsProvider`],
//! plus concurrent multi-player fetch.
//!
//! `fetch_many` fans out over a rayon pool built for that call and sized
//! `min(max_concurrency, n)`. Workers abandoned at a deadline only hold threads
//! of a pool that is already dropped, never ones a later call needs. Each job sends
//! `(index, outcome)` over an mpsc channel and the caller writes it into the
//! slot for that index, so output order always equals input order no matter
//! which fetch finishes first. With a timeout the caller waits with
//! `recv_timeout` until the deadline, then raises the cancel flag: queued jobs
//! and jobs sleeping between retries stop, and unfilled slots become
//! `DeadlineExceeded`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{FailureKind, RetrievalError, StatsProvider};
use super::retry::RetryPolicy;
use crate::domain::{RawRecord, SubjectId};

/// Granularity of cancellable backoff sleeps.
const CANCEL_POLL: Duration = Duration::from_millis(10);

/// Result of retrieving one player.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub subject_id: SubjectId,
    pub result: Result<RawRecord, RetrievalError>,
    /// Provider calls made (0 when the fetch never started).
    pub attempts: u32,
}

impl FetchOutcome {
    fn deadline_exceeded(subject_id: SubjectId) -> Self {
        Self {
            subject_id,
            result: Err(RetrievalError::DeadlineExceeded),
            attempts: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Clone)]
pub struct RetrievalClient {
    provider: Arc<dyn StatsProvider>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    max_concurrency: usize,
}

impl RetrievalClient {
    /// `max_concurrency` caps the workers of each `fetch_many` call (at least 1).
    pub fn new(
        provider: Arc<dyn StatsProvider>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
        max_concurrency: usize,
    ) -> Self {
        Self {
            provider,
            breaker,
            retry,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Fetch one player, retrying transient failures.
    pub fn fetch_one(&self, subject: &SubjectId) -> Result<RawRecord, RetrievalError> {
        let never = AtomicBool::new(false);
        self.fetch_with_retry(subject, &never).result
    }

    /// Fetch many players concurrently. One outcome per input, in input order.
    ///
    /// A failure for one player never affects the others. With `timeout`,
    /// players not finished by the deadline get `DeadlineExceeded`.
    pub fn fetch_many(&self, subjects: &[SubjectId], timeout: Option<Duration>) -> Vec<FetchOutcome> {
        let n = subjects.len();
        if n == 0 {
            return Vec::new();
        }

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_concurrency.min(n))
            .thread_name(|i| format!("hoopstat-fetch-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "failed to build fetch pool");
                return subjects
                    .iter()
                    .map(|subject| FetchOutcome {
                        subject_id: subject.clone(),
                        result: Err(RetrievalError::Internal(format!("failed to build fetch pool: {e}"))),
                        attempts: 0,
                    })
                    .collect();
            }
        };

        let deadline = timeout.map(|t| Instant::now() + t);
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<(usize, FetchOutcome)>();

        for (index, subject) in subjects.iter().enumerate() {
            let tx = tx.clone();
            let client = self.clone();
            let cancel = Arc::clone(&cancel);
            let subject = subject.clone();

            pool.spawn(move || {
                let outcome = if cancel.load(Ordering::Relaxed) {
                    FetchOutcome::deadline_exceeded(subject)
                } else {
                    catch_unwind(AssertUnwindSafe(|| client.fetch_with_retry(&subject, &cancel)))
                        .unwrap_or_else(|_| FetchOutcome {
                            subject_id: subject.clone(),
                            result: Err(RetrievalError::Internal("provider panicked".into())),
                            attempts: 0,
                        })
                };
                // Receiver is gone once the caller's deadline passed
                let _ = tx.send((index, outcome));
            });
        }
        drop(tx);

        let mut slots: Vec<Option<FetchOutcome>> = (0..n).map(|_| None).collect();
        let mut filled = 0;
        while filled < n {
            let received = match deadline {
                Some(d) => match d.checked_duration_since(Instant::now()) {
                    Some(left) if !left.is_zero() => rx.recv_timeout(left),
                    _ => Err(RecvTimeoutError::Timeout),
                },
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok((index, outcome)) => {
                    if slots[index].replace(outcome).is_none() {
                        filled += 1;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(pending = n - filled, "fetch deadline reached, cancelling outstanding requests");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        cancel.store(true, Ordering::Relaxed);

        let outcomes: Vec<FetchOutcome> = slots
            .into_iter()
            .zip(subjects)
            .map(|(slot, subject)| {
                slot.unwrap_or_else(|| FetchOutcome::deadline_exceeded(subject.clone()))
            })
            .collect();

        let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
        info!(
            requested = n,
            succeeded,
            failed = n - succeeded,
            provider = self.provider.name(),
            "fetch batch complete"
        );
        outcomes
    }

    /// Explicit retry loop. Transient errors are retried up to
    /// `max_attempts` with exponential backoff; permanent errors return at once.
    fn fetch_with_retry(&self, subject: &SubjectId, cancel: &AtomicBool) -> FetchOutcome {
        let mut attempts = 0u32;
        let result = loop {
            if cancel.load(Ordering::Relaxed) {
                break Err(RetrievalError::DeadlineExceeded);
            }
            if !self.breaker.is_allowed() {
                break Err(RetrievalError::CircuitOpen);
            }

            attempts += 1;
            let err = match self.provider.fetch(subject) {
                Ok(record) => {
                    self.breaker.record_success();
                    debug!(subject = %subject, attempts, "fetched");
                    break Ok(record);
                }
                Err(e) => e,
            };

            match err.kind() {
                FailureKind::Permanent => {
                    if matches!(err, RetrievalError::AuthenticationFailed(_)) {
                        warn!(subject = %subject, "authentication failed, tripping circuit breaker");
                        self.breaker.trip();
                    }
                    break Err(err);
                }
                FailureKind::Timeout => break Err(err),
                FailureKind::Transient => self.breaker.record_failure(),
            }

            if attempts >= self.retry.max_attempts {
                warn!(subject = %subject, attempts, error = %err, "giving up after retries");
                break Err(err);
            }

            let delay = self.retry.delay_after(&err, attempts);
            warn!(
                subject = %subject,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient failure, backing off"
            );
            if !sleep_unless_cancelled(delay, cancel) {
                break Err(RetrievalError::DeadlineExceeded);
            }
        };

        FetchOutcome {
            subject_id: subject.clone(),
            result,
            attempts,
        }
    }
}

/// Sleep for `delay` in short steps. Returns false if cancelled first.
fn sleep_unless_cancelled(delay: Duration, cancel: &AtomicBool) -> bool {
    let until = Instant::now() + delay;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= until {
            return true;
        }
        std::thread::sleep((until - now).min(CANCEL_POLL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DataSource;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    /// Plays back a per-player script of results, then succeeds.
    struct ScriptedProvider {
        scripts: Mutex<HashMap<String, Vec<RetrievalError>>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(scripts: &[(&str, Vec<RetrievalError>)]) -> Self {
            Self {
                scripts: Mutex::new(
                    scripts
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.iter().rev().cloned().collect()))
                        .collect(),
                ),
                calls: AtomicU32::new(0),
            }
        }
    }

    impl StatsProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fetch(&self, subject: &SubjectId) -> Result<RawRecord, RetrievalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(script) = self.scripts.lock().unwrap().get_mut(subject.as_str()) {
                if let Some(err) = script.pop() {
                    return Err(err);
                }
            }
            Ok(RawRecord::new(subject.clone(), Utc::now(), DataSource::Fixture)
                .with_metric("points_per_game", 20.0))
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(5))
    }

    fn client(provider: Arc<ScriptedProvider>, max_attempts: u32) -> RetrievalClient {
        RetrievalClient::new(
            provider,
            Arc::new(CircuitBreaker::new(100, Duration::from_secs(60))),
            fast_retry(max_attempts),
            4,
        )
    }

    #[test]
    fn retries_transient_then_succeeds() {
        let provider = Arc::new(ScriptedProvider::new(&[(
            "A",
            vec![
                RetrievalError::ServerError { status: 503 },
                RetrievalError::Timeout("slow".into()),
            ],
        )]));
        let c = client(provider.clone(), 3);
        let out = c.fetch_many(&["A".into()], None);
        assert!(out[0].is_ok());
        assert_eq!(out[0].attempts, 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let provider = Arc::new(ScriptedProvider::new(&[(
            "A",
            vec![RetrievalError::ServerError { status: 500 }; 5],
        )]));
        let c = client(provider.clone(), 2);
        assert_eq!(
            c.fetch_one(&"A".into()),
            Err(RetrievalError::ServerError { status: 500 })
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn permanent_error_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::new(&[(
            "Ghost",
            vec![RetrievalError::NotFound {
                subject: "Ghost".into(),
            }],
        )]));
        let c = client(provider.clone(), 5);
        assert!(matches!(
            c.fetch_one(&"Ghost".into()),
            Err(RetrievalError::NotFound { .. })
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn auth_failure_trips_breaker() {
        let provider = Arc::new(ScriptedProvider::new(&[(
            "A",
            vec![RetrievalError::AuthenticationFailed("401".into())],
        )]));
        let c = client(provider.clone(), 3);
        assert!(c.fetch_one(&"A".into()).is_err());
        assert_eq!(c.fetch_one(&"B".into()), Err(RetrievalError::CircuitOpen));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn outcomes_follow_input_order_with_partial_failure() {
        let provider = Arc::new(ScriptedProvider::new(&[(
            "bad",
            vec![RetrievalError::MalformedResponse("eof".into())],
        )]));
        let c = client(provider, 3);
        let ids: Vec<SubjectId> = ["c", "bad", "a", "b"].iter().map(|s| SubjectId::new(*s)).collect();
        let out = c.fetch_many(&ids, Some(Duration::from_secs(5)));

        let order: Vec<&str> = out.iter().map(|o| o.subject_id.as_str()).collect();
        assert_eq!(order, vec!["c", "bad", "a", "b"]);
        assert!(out[0].is_ok() && out[2].is_ok() && out[3].is_ok());
        assert!(matches!(out[1].result, Err(RetrievalError::MalformedResponse(_))));
    }

    #[test]
    fn empty_request_returns_empty() {
        let c = client(Arc::new(ScriptedProvider::new(&[])), 1);
        assert!(c.fetch_many(&[], None).is_empty());
    }

    #[test]
    fn cancelled_sleep_returns_early() {
        let cancel = AtomicBool::new(true);
        let start = Instant::now();
        assert!(!sleep_unless_cancelled(Duration::from_secs(5), &cancel));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(sleep_unless_cancelled(Duration::ZERO, &AtomicBool::new(false)));
    }
}
