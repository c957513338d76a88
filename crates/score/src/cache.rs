//! Memoization of scoring contexts per dataset version.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use landrisk_model::{Component, RiskComponents};
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::ScoringContext;

/// Content identifier of a dataset snapshot.
///
/// SHA-256 over the weighting key and every component value. Two snapshots
/// with the same version produce the same `ScoringContext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetVersion([u8; 32]);

impl DatasetVersion {
    pub fn of(components: &[RiskComponents], weighting: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((weighting.len() as u64).to_le_bytes());
        hasher.update(weighting.as_bytes());
        hasher.update((components.len() as u64).to_le_bytes());

        for row in components {
            for component in Component::ALL {
                match row.get(component) {
                    Some(value) => {
                        hasher.update([1u8]);
                        hasher.update(value.to_bits().to_le_bytes());
                    }
                    None => hasher.update([0u8]),
                }
            }
        }

        Self(hasher.finalize().into())
    }

    /// First 8 bytes as hex, for logs.
    pub fn short(&self) -> String {
        hex(&self.0[..8])
    }
}

impl fmt::Display for DatasetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex(&self.0))
    }
}

impl Serialize for DatasetVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Number of contexts a cache keeps unless told otherwise.
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Shared cache of built contexts, keyed by `DatasetVersion`.
///
/// A context is built at most once per version while it stays cached.
/// Builds happen under the write lock, so concurrent callers never see a
/// half-built context. Once `capacity` versions are held, the oldest
/// inserted one is evicted.
#[derive(Debug)]
pub struct ContextCache {
    capacity: usize,
    entries: RwLock<Entries>,
}

#[derive(Debug, Default)]
struct Entries {
    contexts: HashMap<DatasetVersion, Arc<ScoringContext>>,
    order: VecDeque<DatasetVersion>,
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl ContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache holding at most `capacity` contexts (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(Entries::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, version: &DatasetVersion) -> Option<Arc<ScoringContext>> {
        self.entries.read().contexts.get(version).cloned()
    }

    /// Return the cached context for `version`, building it if absent.
    pub fn get_or_build<F>(&self, version: DatasetVersion, build: F) -> Arc<ScoringContext>
    where
        F: FnOnce() -> ScoringContext,
    {
        if let Some(hit) = self.get(&version) {
            tracing::debug!(version = %version.short(), "Scoring context cache hit");
            return hit;
        }

        let mut entries = self.entries.write();
        // Another caller may have built it while we waited for the lock.
        if let Some(hit) = entries.contexts.get(&version) {
            return Arc::clone(hit);
        }

        while entries.order.len() >= self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.contexts.remove(&oldest);
            tracing::debug!(version = %oldest.short(), "Scoring context evicted");
        }

        let context = Arc::new(build());
        tracing::debug!(version = %version.short(), "Scoring context built");
        entries.contexts.insert(version, Arc::clone(&context));
        entries.order.push_back(version);
        context
    }

    /// Drop one version. Returns whether it was cached.
    pub fn invalidate(&self, version: &DatasetVersion) -> bool {
        let mut entries = self.entries.write();
        entries.order.retain(|v| v != version);
        entries.contexts.remove(version).is_some()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.contexts.clear();
        entries.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().contexts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use landrisk_model::WeightVector;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample() -> Vec<RiskComponents> {
        vec![
            RiskComponents {
                legal: Some(1.0),
                fake: Some(0.2),
                ..Default::default()
            },
            RiskComponents {
                legal: Some(0.0),
                price: Some(0.7),
                ..Default::default()
            },
        ]
    }

    fn build(components: &[RiskComponents]) -> ScoringContext {
        ScoringContext::with_weights(components, WeightVector::equal(), "equal")
    }

    #[test]
    fn test_version_depends_on_content_and_weighting() {
        let a = sample();
        let mut b = sample();
        b[1].fake = Some(0.0);

        assert_eq!(DatasetVersion::of(&a, "critic"), DatasetVersion::of(&a, "critic"));
        assert_ne!(DatasetVersion::of(&a, "critic"), DatasetVersion::of(&b, "critic"));
        assert_ne!(DatasetVersion::of(&a, "critic"), DatasetVersion::of(&a, "equal"));
    }

    #[test]
    fn test_version_distinguishes_unknown_from_zero() {
        let unknown = vec![RiskComponents::default()];
        let zero = vec![RiskComponents {
            legal: Some(0.0),
            ..Default::default()
        }];
        assert_ne!(DatasetVersion::of(&unknown, "x"), DatasetVersion::of(&zero, "x"));
    }

    #[test]
    fn test_version_hex_format() {
        let version = DatasetVersion::of(&sample(), "critic");
        assert_eq!(version.to_string().len(), 64);
        assert_eq!(version.short().len(), 16);
        assert!(version.to_string().starts_with(&version.short()));
    }

    #[test]
    fn test_get_or_build_memoizes() {
        let cache = ContextCache::new();
        let components = sample();
        let version = DatasetVersion::of(&components, "equal");
        let builds = AtomicUsize::new(0);

        let first = cache.get_or_build(version, || {
            builds.fetch_add(1, Ordering::SeqCst);
            build(&components)
        });
        let second = cache.get_or_build(version, || {
            builds.fetch_add(1, Ordering::SeqCst);
            build(&components)
        });

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_forces_rebuild() {
        let cache = ContextCache::new();
        let components = sample();
        let version = DatasetVersion::of(&components, "equal");

        cache.get_or_build(version, || build(&components));
        assert!(cache.invalidate(&version));
        assert!(!cache.invalidate(&version));
        assert!(cache.get(&version).is_none());

        cache.get_or_build(version, || build(&components));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_oldest_version_is_evicted_at_capacity() {
        let cache = ContextCache::with_capacity(2);
        let snapshots: Vec<Vec<RiskComponents>> = (0..3)
            .map(|i| {
                let mut components = sample();
                components[0].plan = Some(i as f64 / 10.0);
                components
            })
            .collect();
        let versions: Vec<DatasetVersion> = snapshots
            .iter()
            .map(|c| DatasetVersion::of(c, "equal"))
            .collect();

        for (version, components) in versions.iter().zip(&snapshots) {
            cache.get_or_build(*version, || build(components));
        }

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&versions[0]).is_none());
        assert!(cache.get(&versions[1]).is_some());
        assert!(cache.get(&versions[2]).is_some());
    }

    #[test]
    fn test_invalidated_slot_is_reused() {
        let cache = ContextCache::with_capacity(2);
        let a = sample();
        let mut b = sample();
        b[0].plan = Some(0.9);
        let (va, vb) = (DatasetVersion::of(&a, "equal"), DatasetVersion::of(&b, "equal"));

        cache.get_or_build(va, || build(&a));
        assert!(cache.invalidate(&va));
        cache.get_or_build(vb, || build(&b));
        cache.get_or_build(va, || build(&a));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&vb).is_some());
        assert_eq!(ContextCache::with_capacity(0).capacity(), 1);
    }

    #[test]
    fn test_empty_snapshot_is_cached_without_thresholds() {
        let cache = ContextCache::new();
        let version = DatasetVersion::of(&[], "equal");
        let context = cache.get_or_build(version, || build(&[]));
        assert_eq!(context.thresholds(), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_callers_share_one_build() {
        let cache = ContextCache::new();
        let components = sample();
        let version = DatasetVersion::of(&components, "equal");
        let builds = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    cache.get_or_build(version, || {
                        builds.fetch_add(1, Ordering::SeqCst);
                        build(&components)
                    });
                });
            }
        });

        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }
}
