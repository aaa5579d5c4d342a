//! Integration tests for the data pipeline against recorded player fixtures.
//!
//! Covers partial failure, report and comparison ordering under uneven latency, deadline
//! exclusion, cache reuse across pipeline instances and report determinism.

use chrono::{TimeZone, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hoopstat_core::data::{
    CacheStore, CircuitBreaker, FailureKind, FileCache, FixtureProvider, ManualClock, MemoryCache,
    RetrievalClient, RetrievalError, RetryPolicy, StatsProvider,
};
use hoopstat_core::domain::{Computed, RawRecord, SubjectId};
use hoopstat_runner::{
    DataPipeline, PipelineSettings, ReferencePopulation, SubjectState,
};

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn reference() -> Arc<ReferencePopulation> {
    Arc::new(ReferencePopulation::from_path(&fixture_dir().join("league_averages.csv")).unwrap())
}

/// Fixture provider with per-player latency and a call counter.
struct SlowFixtures {
    inner: FixtureProvider,
    delays: Vec<(&'static str, Duration)>,
    calls: AtomicU32,
}

impl SlowFixtures {
    fn new(delays: Vec<(&'static str, Duration)>) -> Self {
        Self {
            inner: FixtureProvider::new(fixture_dir().join("players")),
            delays,
            calls: AtomicU32::new(0),
        }
    }
}

impl StatsProvider for SlowFixtures {
    fn name(&self) -> &str {
        "slow_fixtures"
    }

    fn fetch(&self, subject: &SubjectId) -> Result<RawRecord, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((_, d)) = self.delays.iter().find(|(id, _)| *id == subject.as_str()) {
            std::thread::sleep(*d);
        }
        self.inner.fetch(subject)
    }
}

fn pipeline_with(
    provider: Arc<SlowFixtures>,
    cache: Arc<dyn CacheStore>,
    timeout: Option<Duration>,
) -> DataPipeline {
    let client = RetrievalClient::new(
        provider,
        Arc::new(CircuitBreaker::new(5, Duration::from_secs(60))),
        RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(5)),
        4,
    );
    let settings = PipelineSettings {
        request_timeout: timeout,
        ..PipelineSettings::default()
    };
    DataPipeline::new(cache, client, reference(), settings)
}

fn ids(names: &[&str]) -> Vec<SubjectId> {
    names.iter().map(|n| SubjectId::new(*n)).collect()
}

#[test]
fn partial_failure_keeps_the_rest() {
    let provider = Arc::new(SlowFixtures::new(vec![]));
    let p = pipeline_with(provider, Arc::new(MemoryCache::new()), Some(Duration::from_secs(10)));

    let results = p
        .fetch_player_data(&ids(&["LeBron James", "Nobody Special", "Stephen Curry"]))
        .unwrap();

    assert!(results[0].is_included());
    assert!(results[2].is_included());
    let failed = results[1].outcome.as_ref().unwrap_err();
    assert_eq!(failed.kind, FailureKind::Permanent);
    assert_eq!(failed.attempts, 1, "not-found is never retried");
    assert_eq!(results[1].trace.last(), Some(&SubjectState::Excluded));

    let lebron = results[0].outcome.as_ref().unwrap();
    let ppg = lebron.derivation("points_per_game").unwrap();
    assert_eq!(ppg.percentile_rank, Computed::present(100.0));
    assert_eq!(ppg.reference_outlier, Computed::present(true));
}

#[test]
fn report_order_follows_request_order() {
    // "a" (LeBron) completes well after "b" (Curry)
    let provider = Arc::new(SlowFixtures::new(vec![
        ("LeBron James", Duration::from_millis(200)),
        ("Stephen Curry", Duration::from_millis(5)),
    ]));
    let p = pipeline_with(provider, Arc::new(MemoryCache::new()), None);

    let report = p
        .generate_performance_report(&ids(&["Stephen Curry", "LeBron James"]))
        .unwrap();
    let order: Vec<&str> = report.players.iter().map(|p| p.subject_id.as_str()).collect();
    assert_eq!(order, vec!["Stephen Curry", "LeBron James"]);
}

#[test]
fn comparison_order_follows_request_order() {
    let provider = Arc::new(SlowFixtures::new(vec![
        ("LeBron James", Duration::from_millis(200)),
        ("Stephen Curry", Duration::from_millis(5)),
    ]));
    let p = pipeline_with(provider, Arc::new(MemoryCache::new()), None);
    let requested = ids(&["LeBron James", "Stephen Curry"]);

    let report = p
        .compare_subjects(
            &requested,
            &["points_per_game".to_string(), "assists_per_game".to_string()],
            None,
        )
        .unwrap();

    assert_eq!(report.included, requested);
    for cmp in &report.comparisons {
        let order: Vec<&SubjectId> = cmp.values.iter().map(|v| &v.subject_id).collect();
        assert_eq!(order, requested.iter().collect::<Vec<_>>(), "{}", cmp.metric);
        assert_eq!(cmp.pairwise[0].subject_a.as_str(), "LeBron James");
    }
}

#[test]
fn deadline_excludes_only_the_slow_player() {
    let provider = Arc::new(SlowFixtures::new(vec![(
        "Nikola Jokic",
        Duration::from_millis(1_500),
    )]));
    let p = pipeline_with(provider, Arc::new(MemoryCache::new()), Some(Duration::from_millis(300)));

    let results = p
        .fetch_player_data(&ids(&["LeBron James", "Nikola Jokic", "Stephen Curry"]))
        .unwrap();
    assert!(results[0].is_included());
    assert!(results[2].is_included());

    let jokic = results[1].outcome.as_ref().unwrap_err();
    assert!(jokic.is_timeout());
    assert_eq!(
        results[1].trace,
        vec![
            SubjectState::Requested,
            SubjectState::CacheMiss,
            SubjectState::Fetching,
            SubjectState::Failed,
            SubjectState::Excluded,
        ]
    );
}

#[test]
fn file_cache_is_reused_across_pipelines() {
    let dir = tempfile::tempdir().unwrap();
    let players = ids(&["LeBron James", "Nikola Jokic"]);

    let first = Arc::new(SlowFixtures::new(vec![]));
    let cache: Arc<dyn CacheStore> = Arc::new(FileCache::open(dir.path()).unwrap());
    pipeline_with(first.clone(), cache, None)
        .fetch_player_data(&players)
        .unwrap();
    assert_eq!(first.calls.load(Ordering::SeqCst), 2);

    let second = Arc::new(SlowFixtures::new(vec![]));
    let cache: Arc<dyn CacheStore> = Arc::new(FileCache::open(dir.path()).unwrap());
    let results = pipeline_with(second.clone(), cache, None)
        .fetch_player_data(&players)
        .unwrap();
    assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    assert!(results
        .iter()
        .all(|r| r.trace[1] == SubjectState::CacheHit));
}

#[test]
fn performance_report_is_deterministic() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap(),
    ));
    let provider = Arc::new(SlowFixtures::new(vec![]));
    let p = pipeline_with(provider, Arc::new(MemoryCache::new()), None).with_clock(clock.clone());
    let players = ids(&["Stephen Curry", "LeBron James", "Nikola Jokic"]);

    let first = p.generate_performance_report(&players).unwrap();
    clock.advance(chrono::Duration::minutes(5));
    let second = p.generate_performance_report(&players).unwrap();

    assert_ne!(first.generated_at, second.generated_at);
    assert_eq!(first.players, second.players);
    assert_eq!(first.content_digest(), second.content_digest());

    let curry = first.player(&SubjectId::new("Stephen Curry")).unwrap();
    let pts = &curry.metrics["points_per_game"];
    assert_eq!(pts.observations, 7);
    assert!(pts.consistency.value().unwrap().coefficient_of_variation.unwrap() > 0.2);
    assert!(pts.confidence_interval.is_present());
}

#[test]
fn comparison_with_covariate() {
    let provider = Arc::new(SlowFixtures::new(vec![]));
    let p = pipeline_with(provider, Arc::new(MemoryCache::new()), None);

    let report = p
        .compare_subjects(
            &ids(&["LeBron James", "Stephen Curry", "Ghost"]),
            &["points_per_game".to_string(), "rebounds_per_game".to_string()],
            Some("minutes"),
        )
        .unwrap();

    assert_eq!(report.included, ids(&["LeBron James", "Stephen Curry"]));
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].subject_id.as_str(), "Ghost");

    let reb = &report.comparisons[1];
    assert_eq!(reb.metric, "rebounds_per_game");
    // LeBron ~7.1 vs Curry ~4.4 rebounds over seven games
    let test = &reb.pairwise[0];
    assert_eq!(test.significant, Some(true));

    // scoring tracks minutes for both players
    for c in &report.comparisons[0].correlations {
        let r = c.pearson.value().unwrap().coefficient;
        assert!(r > 0.5, "{}: r = {r}", c.subject_id);
    }
}
