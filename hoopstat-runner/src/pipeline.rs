//! Data pipeline: cache lookup, concurrent retrieval, enrichment, reports.
//!
//! For N requested players:
//! 1. Validate the request (non-empty, no blank ids, usable reference population)
//! 2. Consult the cache for each; cache errors degrade to a miss
//! 3. Fetch all misses concurrently under the request deadline
//! 4. Write fresh records back to the cache
//! 5. Enrich every record and assemble results in request order
//!
//! One player's failure never fails the request; it is reported per player.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use hoopstat_core::data::{CacheStore, Clock, RetrievalClient, SystemClock};
use hoopstat_core::domain::{EnrichedRecord, RawRecord, SubjectId};

use crate::config::HoopstatConfig;
use crate::enrich::enrich;
use crate::lifecycle::{Lifecycle, SubjectFailure, SubjectState};
use crate::reference::ReferencePopulation;
use crate::report::{
    build_comparison, build_performance, AnalysisSettings, ComparisonReport, PerformanceReport,
    ReportError,
};

/// Whole-request failures. Per-player problems never surface here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("reference population is empty")]
    EmptyReferencePopulation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub cache_ttl: Duration,
    /// Deadline for the concurrent fetch; `None` waits for every player.
    pub request_timeout: Option<Duration>,
    pub analysis: AnalysisSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(3600),
            request_timeout: Some(Duration::from_secs(30)),
            analysis: AnalysisSettings::default(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &HoopstatConfig) -> Self {
        Self {
            cache_ttl: config.cache_ttl(),
            request_timeout: config.request_timeout(),
            analysis: AnalysisSettings {
                significance_alpha: config.pipeline.significance_alpha,
                confidence_level: config.pipeline.confidence_level,
                outlier_z_threshold: config.pipeline.outlier_z_threshold,
            },
        }
    }
}

/// One player's path through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectResult {
    pub subject_id: SubjectId,
    pub trace: Vec<SubjectState>,
    pub outcome: Result<EnrichedRecord, SubjectFailure>,
}

impl SubjectResult {
    pub fn is_included(&self) -> bool {
        self.outcome.is_ok()
    }
}

pub struct DataPipeline {
    cache: Arc<dyn CacheStore>,
    client: RetrievalClient,
    reference: Arc<ReferencePopulation>,
    settings: PipelineSettings,
    clock: Arc<dyn Clock>,
}

/// Players that need a fetch, with their position in the request.
struct Pending {
    index: usize,
    lifecycle: Lifecycle,
}

impl DataPipeline {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        client: RetrievalClient,
        reference: Arc<ReferencePopulation>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            cache,
            client,
            reference,
            settings,
            clock: Arc::new(SystemClock),
        }
    }

    /// Clock used for report timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Validate and de-duplicate (first occurrence wins, case-insensitive).
    fn validate(&self, ids: &[SubjectId]) -> Result<Vec<SubjectId>, PipelineError> {
        if ids.is_empty() {
            return Err(PipelineError::InvalidArgument("no players requested".into()));
        }
        if let Some(pos) = ids.iter().position(SubjectId::is_blank) {
            return Err(PipelineError::InvalidArgument(format!(
                "player id at position {pos} is blank"
            )));
        }
        if self.reference.is_empty() {
            return Err(PipelineError::EmptyReferencePopulation);
        }

        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(id.cache_key()))
            .cloned()
            .collect())
    }

    fn cached(&self, id: &SubjectId) -> Option<RawRecord> {
        match self.cache.get(id) {
            Ok(hit) => hit,
            Err(e) => {
                warn!(subject = %id, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    fn store(&self, id: &SubjectId, record: &RawRecord) {
        if let Err(e) = self.cache.put(id, record.clone(), self.settings.cache_ttl) {
            warn!(subject = %id, error = %e, "cache write failed");
        }
    }

    fn collect(&self, ids: &[SubjectId]) -> Vec<SubjectResult> {
        let mut slots: Vec<Option<SubjectResult>> = (0..ids.len()).map(|_| None).collect();
        let mut pending: Vec<Pending> = Vec::new();

        for (index, id) in ids.iter().enumerate() {
            let mut lifecycle = Lifecycle::new();
            match self.cached(id) {
                Some(record) => {
                    debug!(subject = %id, "cache hit");
                    lifecycle.advance(SubjectState::CacheHit);
                    lifecycle.advance(SubjectState::Enriched);
                    slots[index] = Some(SubjectResult {
                        subject_id: id.clone(),
                        trace: lifecycle.into_states(),
                        outcome: Ok(enrich(record, &self.reference)),
                    });
                }
                None => {
                    lifecycle.advance(SubjectState::CacheMiss);
                    pending.push(Pending { index, lifecycle });
                }
            }
        }

        if !pending.is_empty() {
            let to_fetch: Vec<SubjectId> = pending.iter().map(|p| ids[p.index].clone()).collect();
            let outcomes = self
                .client
                .fetch_many(&to_fetch, self.settings.request_timeout);

            for (Pending { index, mut lifecycle }, fetched) in pending.into_iter().zip(outcomes) {
                let id = &ids[index];
                lifecycle.advance(SubjectState::Fetching);
                let outcome = match fetched.result {
                    Ok(record) => {
                        lifecycle.advance(SubjectState::Fetched);
                        self.store(id, &record);
                        lifecycle.advance(SubjectState::Enriched);
                        Ok(enrich(record, &self.reference))
                    }
                    Err(err) => {
                        warn!(subject = %id, error = %err, attempts = fetched.attempts, "excluding player");
                        lifecycle.advance(SubjectState::Failed);
                        lifecycle.advance(SubjectState::Excluded);
                        Err(SubjectFailure::from_retrieval(&err, fetched.attempts))
                    }
                };
                slots[index] = Some(SubjectResult {
                    subject_id: id.clone(),
                    trace: lifecycle.into_states(),
                    outcome,
                });
            }
        }

        slots.into_iter().flatten().collect()
    }

    /// Retrieve and enrich every requested player, in request order.
    pub fn fetch_player_data(&self, ids: &[SubjectId]) -> Result<Vec<SubjectResult>, PipelineError> {
        let ids = self.validate(ids)?;
        info!(players = ids.len(), provider = self.client.provider_name(), "fetching player data");
        let results = self.collect(&ids);
        let included = results.iter().filter(|r| r.is_included()).count();
        info!(
            included,
            excluded = results.len() - included,
            "player data ready"
        );
        Ok(results)
    }

    fn split(results: Vec<SubjectResult>) -> (Vec<EnrichedRecord>, Vec<ReportError>) {
        let mut records = Vec::new();
        let mut errors = Vec::new();
        for r in results {
            match r.outcome {
                Ok(record) => records.push(record),
                Err(failure) => errors.push(ReportError::from_failure(r.subject_id, &failure)),
            }
        }
        (records, errors)
    }

    /// Compare players on `metrics`, optionally correlating each against `covariate`.
    pub fn compare_subjects(
        &self,
        ids: &[SubjectId],
        metrics: &[String],
        covariate: Option<&str>,
    ) -> Result<ComparisonReport, PipelineError> {
        if metrics.is_empty() {
            return Err(PipelineError::InvalidArgument("no metrics requested".into()));
        }
        if metrics.iter().any(|m| m.trim().is_empty()) || covariate.is_some_and(|c| c.trim().is_empty()) {
            return Err(PipelineError::InvalidArgument("metric name is blank".into()));
        }
        let mut seen = HashSet::new();
        let metrics: Vec<String> = metrics
            .iter()
            .map(|m| m.trim().to_string())
            .filter(|m| seen.insert(m.clone()))
            .collect();

        let requested = self.validate(ids)?;
        let (records, errors) = Self::split(self.collect(&requested));
        Ok(build_comparison(
            requested,
            &records,
            errors,
            &metrics,
            covariate.map(str::trim),
            &self.settings.analysis,
        ))
    }

    /// Full per-player report: enrichment, consistency, confidence intervals, outliers.
    pub fn generate_performance_report(&self, ids: &[SubjectId]) -> Result<PerformanceReport, PipelineError> {
        let requested = self.validate(ids)?;
        let (records, errors) = Self::split(self.collect(&requested));
        Ok(build_performance(
            self.clock.now(),
            requested,
            &records,
            errors,
            &self.settings.analysis,
        ))
    }
}
