//! Retrieval, caching and provider adapters.

pub mod cache;
pub mod circuit_breaker;
pub mod client;
pub mod clock;
pub mod file_cache;
pub mod fixture;
pub mod payload;
pub mod provider;
pub mod rapidapi;
pub mod retry;

pub use cache::{CacheEntry, CacheError, CacheStore, MemoryCache};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use client::{FetchOutcome, RetrievalClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use file_cache::FileCache;
pub use fixture::FixtureProvider;
pub use payload::{canonical_metric, plausible_range, PlayerPayload};
pub use provider::{FailureKind, RetrievalError, StatsProvider};
pub use rapidapi::{RapidApiProvider, RapidApiSettings};
pub use retry::RetryPolicy;
