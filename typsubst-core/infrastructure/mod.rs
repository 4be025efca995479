pub mod cache;
pub mod logging;
pub mod metrics;
pub mod parallel;

pub use cache::{CacheKey, CachedResult, SubstitutionCache};
pub use logging::*;
pub use metrics::{MetricsSummary, SubstitutionMetrics, TimingStats};
pub use parallel::BatchSubstitutor;
