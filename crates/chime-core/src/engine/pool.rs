//! Resource pool
//!
//! Bounded, type-keyed cache of reusable synthesis resources. Acquire
//! prefers an idle tracked entry, then creates a tracked one while under
//! capacity, then falls back to an untracked transient resource so callers
//! always get something usable. Release resets the resource to its baseline
//! state; a periodic sweep evicts idle entries past the max age.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

use crate::config::PoolConfig;
use crate::synth::Resettable;

/// A tracked pool slot
///
/// `resource` is `None` while the entry is leased out.
#[derive(Debug)]
struct PoolEntry<R> {
    id: u64,
    resource: Option<R>,
    in_use: bool,
    created_at: Instant,
}

/// A leased resource
///
/// `entry_id` is `None` for transient resources handed out past capacity;
/// releasing those is a no-op and simply drops them.
#[derive(Debug)]
pub struct Lease<R> {
    pub resource: R,
    entry_id: Option<u64>,
}

impl<R> Lease<R> {
    /// Whether this lease is backed by a tracked pool entry
    pub fn is_tracked(&self) -> bool {
        self.entry_id.is_some()
    }
}

/// Pool observability counters for one resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub total: usize,
    pub in_use: usize,
    pub available: usize,
}

/// Type-keyed bounded resource pool
#[derive(Debug)]
pub struct ResourcePool<K, R> {
    pools: HashMap<K, Vec<PoolEntry<R>>>,
    config: PoolConfig,
    next_id: u64,
}

impl<K, R> ResourcePool<K, R>
where
    K: Eq + Hash + Copy + std::fmt::Debug,
    R: Resettable,
{
    pub fn new(config: PoolConfig) -> Self {
        Self {
            pools: HashMap::new(),
            config,
            next_id: 0,
        }
    }

    /// Acquire a resource of the given type
    ///
    /// `factory` is invoked only when no idle tracked entry exists.
    pub fn acquire(&mut self, key: K, factory: impl FnOnce() -> R) -> Lease<R> {
        let pool = self.pools.entry(key).or_default();

        if let Some(entry) = pool.iter_mut().find(|e| !e.in_use) {
            entry.in_use = true;
            // Idle entries always hold their resource
            let resource = entry.resource.take().unwrap_or_else(|| factory());
            return Lease {
                resource,
                entry_id: Some(entry.id),
            };
        }

        if pool.len() < self.config.max_size {
            let id = self.next_id;
            self.next_id += 1;
            pool.push(PoolEntry {
                id,
                resource: None,
                in_use: true,
                created_at: Instant::now(),
            });
            return Lease {
                resource: factory(),
                entry_id: Some(id),
            };
        }

        // Pool at capacity: hand out an untracked transient resource
        log::debug!("pool for {key:?} at capacity, creating transient resource");
        Lease {
            resource: factory(),
            entry_id: None,
        }
    }

    /// Return a leased resource
    ///
    /// Tracked resources are reset to baseline and marked idle. Transient
    /// resources are dropped.
    pub fn release(&mut self, key: K, mut lease: Lease<R>) {
        let Some(entry_id) = lease.entry_id else {
            return;
        };
        let Some(entry) = self
            .pools
            .get_mut(&key)
            .and_then(|pool| pool.iter_mut().find(|e| e.id == entry_id))
        else {
            // Entry disappeared (dispose_all while leased); drop the resource
            return;
        };
        lease.resource.reset();
        entry.resource = Some(lease.resource);
        entry.in_use = false;
    }

    /// Counters for one resource type
    pub fn stats(&self, key: K) -> PoolStats {
        match self.pools.get(&key) {
            Some(pool) => {
                let in_use = pool.iter().filter(|e| e.in_use).count();
                PoolStats {
                    total: pool.len(),
                    in_use,
                    available: pool.len() - in_use,
                }
            }
            None => PoolStats::default(),
        }
    }

    /// Evict idle entries older than the configured max age
    pub fn sweep(&mut self, now: Instant) {
        let max_age = self.config.max_age();
        for (key, pool) in self.pools.iter_mut() {
            let before = pool.len();
            pool.retain(|e| e.in_use || now.duration_since(e.created_at) <= max_age);
            let evicted = before - pool.len();
            if evicted > 0 {
                log::debug!("pool sweep evicted {evicted} idle {key:?} entries");
            }
        }
    }

    /// Drop every tracked entry across all types
    pub fn dispose_all(&mut self) {
        self.pools.clear();
    }
}
