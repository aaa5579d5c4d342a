//! HoopStat Runner: pipeline orchestration, enrichment, reports.
//!
//! This crate builds on `hoopstat-core` to provide:
//! - TOML configuration with validated defaults
//! - Reference population loading (CSV or TOML)
//! - Enrichment of raw records against the reference population
//! - The data pipeline: cache, concurrent retrieval, per-player lifecycle
//! - Comparison and performance reports, and their JSON export

pub mod config;
pub mod enrich;
pub mod export;
pub mod lifecycle;
pub mod pipeline;
pub mod reference;
pub mod report;

pub use config::{ConfigError, HoopstatConfig};
pub use enrich::enrich;
pub use export::{read_report, write_comparison, write_report};
pub use lifecycle::{Lifecycle, SubjectFailure, SubjectState};
pub use pipeline::{DataPipeline, PipelineError, PipelineSettings, SubjectResult};
pub use reference::{ReferenceError, ReferencePopulation};
pub use report::{
    AnalysisSettings, ComparisonReport, MetricComparison, MetricPerformance, PairwiseTest,
    PerformanceReport, PlayerPerformance, ReportError, SubjectCorrelation, SubjectMetric,
};
