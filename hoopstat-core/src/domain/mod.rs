//! Domain types for player statistics.

pub mod computed;
pub mod ids;
pub mod record;

pub use computed::Computed;
pub use ids::SubjectId;
pub use record::{DataSource, EnrichedRecord, MetricDerivation, MetricSeries, RawRecord};
