//! Parallel batch substitution
//!
//! One substitutor applied to many types across rayon workers. The
//! substitutor is read-only, so workers share it without locking.

use crate::compiler::analysis::{Substitutor, Variance};
use crate::compiler::types::Type;
use crate::infrastructure::cache::{CachedResult, SubstitutionCache};
use crate::infrastructure::metrics::{self, SubstitutionMetrics};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, instrument};

pub struct BatchSubstitutor {
    substitutor: Arc<Substitutor>,
    ambient: Variance,

    /// Dedicated pool; `None` runs on the global rayon pool.
    pool: Option<rayon::ThreadPool>,

    cache: Option<Arc<SubstitutionCache>>,
    metrics: Arc<SubstitutionMetrics>,
}

impl BatchSubstitutor {
    pub fn new(substitutor: Substitutor) -> Self {
        Self {
            substitutor: Arc::new(substitutor),
            ambient: Variance::Invariant,
            pool: None,
            cache: None,
            metrics: Arc::new(SubstitutionMetrics::new()),
        }
    }

    /// Run on a pool of `workers` threads. Zero keeps the global pool.
    pub fn with_workers(mut self, workers: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        if workers > 0 {
            self.pool = Some(rayon::ThreadPoolBuilder::new().num_threads(workers).build()?);
        }
        Ok(self)
    }

    pub fn with_ambient(mut self, ambient: Variance) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn with_cache(mut self, cache: Arc<SubstitutionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<SubstitutionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn substitutor(&self) -> &Substitutor {
        &self.substitutor
    }

    pub fn metrics(&self) -> &Arc<SubstitutionMetrics> {
        &self.metrics
    }

    /// Substitute every type. `results[i]` belongs to `types[i]`.
    #[instrument(skip_all, fields(count = types.len(), ambient = %self.ambient))]
    pub fn substitute_all(&self, types: &[Type]) -> Vec<CachedResult> {
        let run = || -> Vec<CachedResult> {
            types.par_iter().map(|ty| self.substitute_one(ty)).collect()
        };

        let results = self.metrics.time("batch", || match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        });

        let conflicts = results.iter().filter(|r| r.is_err()).count() as u64;
        self.metrics.add(metrics::SUBSTITUTED, results.len() as u64 - conflicts);
        self.metrics.add(metrics::CONFLICTS, conflicts);
        debug!(conflicts, "batch finished");
        results
    }

    fn substitute_one(&self, ty: &Type) -> CachedResult {
        match &self.cache {
            Some(cache) => {
                let (result, hit) = cache.lookup(&self.substitutor, ty, self.ambient);
                if hit {
                    self.metrics.increment(metrics::CACHE_HITS);
                } else {
                    self.metrics.increment(metrics::CACHE_MISSES);
                }
                result
            }
            None => self.substitutor.substitute(ty, self.ambient),
        }
    }
}
