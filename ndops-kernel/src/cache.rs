//! Per-operator specialization cache.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::signature::SignatureKey;
use crate::specialize::Specialization;

/// How many specializations an operator may keep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Keep every specialization ever built.
    #[default]
    Unbounded,
    /// Keep at most `capacity` entries, evicting the least recently used.
    Lru { capacity: usize },
}

/// Counters reported by [`SpecializationCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub builds: u64,
    pub hits: u64,
    pub evictions: u64,
    pub entries: usize,
}

#[derive(Debug)]
struct Entry {
    spec: Rc<Specialization>,
    last_used: u64,
}

/// Maps signature keys to compiled specializations.
///
/// At most one specialization exists per key at any time. Lookups take
/// `&self`; the map lives behind a `RefCell`, so the cache is confined to one
/// thread like the views it serves.
#[derive(Debug)]
pub struct SpecializationCache {
    label: String,
    policy: CachePolicy,
    entries: RefCell<FxHashMap<SignatureKey, Entry>>,
    clock: Cell<u64>,
    stats: Cell<CacheStats>,
}

impl SpecializationCache {
    /// `label` names the owning operator in log events.
    pub fn new(label: &str, policy: CachePolicy) -> Self {
        Self {
            label: label.to_string(),
            policy,
            entries: RefCell::new(FxHashMap::default()),
            clock: Cell::new(0),
            stats: Cell::new(CacheStats::default()),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Return the cached specialization for `key`, building and inserting it
    /// on a miss. A failed build leaves the cache unchanged.
    pub fn lookup_or_build(
        &self,
        key: &SignatureKey,
        build: impl FnOnce() -> crate::Result<Specialization>,
    ) -> crate::Result<Rc<Specialization>> {
        let now = self.clock.get() + 1;
        self.clock.set(now);

        if let Some(entry) = self.entries.borrow_mut().get_mut(key) {
            entry.last_used = now;
            self.update(|s| s.hits += 1);
            tracing::trace!(operator = %self.label, "specialization cache hit");
            return Ok(Rc::clone(&entry.spec));
        }

        let spec = Rc::new(build()?);
        let mut entries = self.entries.borrow_mut();
        if let CachePolicy::Lru { capacity } = self.policy {
            while entries.len() >= capacity.max(1) {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_used)
                    .map(|(k, _)| k.clone());
                let Some(oldest) = oldest else { break };
                entries.remove(&oldest);
                self.update(|s| s.evictions += 1);
                tracing::debug!(
                    operator = %self.label,
                    builds = self.stats.get().builds,
                    "evicted specialization"
                );
            }
        }
        entries.insert(
            key.clone(),
            Entry {
                spec: Rc::clone(&spec),
                last_used: now,
            },
        );
        let size = entries.len();
        self.update(|s| {
            s.builds += 1;
            s.entries = size;
        });
        tracing::debug!(
            operator = %self.label,
            rank = spec.rank(),
            params = key.params().len(),
            entries = size,
            "built specialization"
        );
        Ok(spec)
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.get();
        stats.entries = self.entries.borrow().len();
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
        self.update(|s| s.entries = 0);
    }

    fn update(&self, f: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}
