//! Memo table for substitution results
//!
//! The substitutor keeps no state of its own; callers that apply the same map
//! to the same types repeatedly can route through this cache instead.

use crate::compiler::analysis::{MapId, Substitutor, Variance};
use crate::compiler::errors::VarianceConflict;
use crate::compiler::types::Type;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub map: MapId,
    pub ambient: Variance,
    pub ty: Type,
}

pub type CachedResult = Result<Type, VarianceConflict>;

pub struct SubstitutionCache {
    entries: DashMap<CacheKey, CachedResult>,
    hits: AtomicU64,
    misses: AtomicU64,
    /// Cleared wholesale once this many entries are held.
    max_entries: usize,
}

impl SubstitutionCache {
    pub fn new() -> Self {
        Self::with_capacity(65_536)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            max_entries: max_entries.max(1),
        }
    }

    /// Substitute through the cache. Conflicts are cached too.
    pub fn substitute(&self, substitutor: &Substitutor, ty: &Type, ambient: Variance) -> CachedResult {
        self.lookup(substitutor, ty, ambient).0
    }

    /// Like [`substitute`](Self::substitute), also reporting whether the
    /// result came from the cache.
    pub fn lookup(&self, substitutor: &Substitutor, ty: &Type, ambient: Variance) -> (CachedResult, bool) {
        let key = CacheKey {
            map: substitutor.map().id(),
            ambient,
            ty: ty.clone(),
        };

        if let Some(cached) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return (cached.value().clone(), true);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let result = substitutor.substitute(ty, ambient);

        if self.entries.len() >= self.max_entries {
            tracing::debug!(entries = self.entries.len(), "substitution cache full, clearing");
            self.entries.clear();
        }
        self.entries.insert(key, result.clone());
        (result, false)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for SubstitutionCache {
    fn default() -> Self {
        Self::new()
    }
}
