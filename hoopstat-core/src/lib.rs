//! HoopStat Core: domain types, statistical analyzer, caching and retrieval.
//!
//! This crate contains everything below the pipeline:
//! - Domain types (player ids, raw and enriched records, tri-state results)
//! - Statistical analyzer (z-scores, Welch t-test, percentiles, correlation,
//!   confidence intervals, consistency, outlier detection)
//! - Time-expiring cache store (in-memory and on-disk)
//! - Retrieval client with retry, backoff, circuit breaking and concurrent fetch
//! - Provider adapters (RapidAPI, local fixtures)

pub mod data;
pub mod domain;
pub mod stats;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: shared types are Send + Sync.
    ///
    /// The pipeline moves records and the client across worker threads. If any
    /// of these stops being thread-safe the build breaks here first.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::SubjectId>();
        require_sync::<domain::SubjectId>();
        require_send::<domain::RawRecord>();
        require_sync::<domain::RawRecord>();
        require_send::<domain::EnrichedRecord>();
        require_sync::<domain::EnrichedRecord>();
        require_send::<domain::Computed<f64>>();
        require_sync::<domain::Computed<f64>>();

        // Data layer
        require_send::<data::MemoryCache>();
        require_sync::<data::MemoryCache>();
        require_send::<data::FileCache>();
        require_sync::<data::FileCache>();
        require_send::<data::RetrievalClient>();
        require_sync::<data::RetrievalClient>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();
        require_send::<data::RetrievalError>();
        require_sync::<data::RetrievalError>();
        require_send::<data::FetchOutcome>();

        // Analyzer outputs
        require_send::<stats::WelchTest>();
        require_sync::<stats::WelchTest>();
        require_send::<stats::OutlierReport>();
        require_sync::<stats::OutlierReport>();
    }

    /// Architecture contract: the pipeline depends on the cache only through
    /// `dyn CacheStore`, so both backings must be usable as trait objects.
    #[test]
    fn cache_backings_are_object_safe() {
        use std::sync::Arc;
        let stores: Vec<Arc<dyn data::CacheStore>> = vec![Arc::new(data::MemoryCache::new())];
        assert_eq!(stores.len(), 1);
        fn _file(c: data::FileCache) -> Arc<dyn data::CacheStore> {
            Arc::new(c)
        }
    }

    /// Architecture contract: providers are swappable behind `dyn StatsProvider`.
    #[test]
    fn providers_are_object_safe() {
        let p: Box<dyn data::StatsProvider> = Box::new(data::FixtureProvider::new("."));
        assert_eq!(p.name(), "fixture");
    }
}
