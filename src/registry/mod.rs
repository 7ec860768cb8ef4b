//! In-memory registry of known embeddings.
//!
//! The cache is a derived, rebuildable mirror of the content store: it is
//! populated from [`crate::storage::ContentStore::load_all`] at startup and
//! updated on every successful mutation. It is never the source of truth —
//! enrollment writes to disk first and appends here second, so nothing
//! unpersisted is ever served to a match.

pub mod matcher;

pub use matcher::MatchSnapshot;

use crate::models::{EmbeddingRecord, IdentityName};
use crate::{Error, Result};
use indexmap::IndexMap;
use std::sync::{Arc, RwLock};

/// Identity name → embedding vectors, insertion-ordered.
type RegistryMap = IndexMap<IdentityName, Vec<Arc<[f32]>>>;

/// Shared in-memory embedding registry.
///
/// Concurrency discipline: reads (matching, listing) take the read lock and
/// run in parallel; writes (append, remove, rebuild) take the write lock and
/// are mutually exclusive. Rebuild swaps the whole map under the write lock,
/// so concurrent readers observe either the old or the new snapshot, never
/// a partial mix.
pub struct RegistryCache {
    identities: Arc<RwLock<RegistryMap>>,
}

impl RegistryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            identities: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    /// Atomically replaces the entire mapping with a disk snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn rebuild(&self, snapshot: IndexMap<IdentityName, Vec<EmbeddingRecord>>) -> Result<()> {
        let fresh: RegistryMap = snapshot
            .into_iter()
            .map(|(identity, records)| {
                let vectors = records
                    .into_iter()
                    .map(|r| Arc::from(r.vector.into_boxed_slice()))
                    .collect();
                (identity, vectors)
            })
            .collect();

        let mut guard = self
            .identities
            .write()
            .map_err(|_| Error::storage("rebuild_cache", "lock poisoned"))?;
        *guard = fresh;

        tracing::info!(identities = guard.len(), "registry cache rebuilt");
        Ok(())
    }

    /// Adds one vector for an identity, creating the entry if absent.
    ///
    /// Call only after the corresponding content store write has durably
    /// succeeded. Returns the identity's vector count after the append.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn append(&self, identity: &IdentityName, vector: Vec<f32>) -> Result<usize> {
        let mut guard = self
            .identities
            .write()
            .map_err(|_| Error::storage("append_cache", "lock poisoned"))?;

        let vectors = guard.entry(identity.clone()).or_default();
        vectors.push(Arc::from(vector.into_boxed_slice()));
        Ok(vectors.len())
    }

    /// Deletes an identity's entry; call only after content store deletion
    /// succeeds. Returns whether the entry existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn remove(&self, identity: &IdentityName) -> Result<bool> {
        let mut guard = self
            .identities
            .write()
            .map_err(|_| Error::storage("remove_cache", "lock poisoned"))?;

        // shift_remove keeps the insertion order of the surviving entries.
        Ok(guard.shift_remove(identity).is_some())
    }

    /// Lists identity names (display casing) in insertion order of first
    /// appearance. Deterministic within a process run.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn list_identities(&self) -> Result<Vec<String>> {
        let guard = self
            .identities
            .read()
            .map_err(|_| Error::storage("list_identities", "lock poisoned"))?;

        Ok(guard.keys().map(|name| name.as_str().to_string()).collect())
    }

    /// Returns a flattened read-only view for the matcher.
    ///
    /// Vectors are `Arc`-shared with the cache, not copied; the snapshot
    /// stays valid and immutable while concurrent writes proceed.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn snapshot_for_match(&self) -> Result<MatchSnapshot> {
        let guard = self
            .identities
            .read()
            .map_err(|_| Error::storage("snapshot_cache", "lock poisoned"))?;

        let mut entries = Vec::new();
        for (identity, vectors) in guard.iter() {
            let shared_name: Arc<str> = Arc::from(identity.as_str());
            for vector in vectors {
                entries.push((Arc::clone(&shared_name), Arc::clone(vector)));
            }
        }
        Ok(MatchSnapshot::new(entries))
    }

    /// Number of identities in the cache.
    #[must_use]
    pub fn identity_count(&self) -> usize {
        self.identities.read().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Number of vectors stored for one identity (0 if absent).
    #[must_use]
    pub fn vector_count(&self, identity: &IdentityName) -> usize {
        self.identities
            .read()
            .map(|guard| guard.get(identity).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl Default for RegistryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentHash;

    fn name(s: &str) -> IdentityName {
        IdentityName::new(s).unwrap()
    }

    fn record(vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            content_hash: ContentHash::of(&vector.iter().map(|v| *v as u8).collect::<Vec<_>>()),
            vector,
            created_at: 0,
        }
    }

    #[test]
    fn test_append_creates_identity() {
        let cache = RegistryCache::new();
        assert_eq!(cache.append(&name("Alice"), vec![1.0, 0.0]).unwrap(), 1);
        assert_eq!(cache.append(&name("Alice"), vec![0.0, 1.0]).unwrap(), 2);

        assert_eq!(cache.identity_count(), 1);
        assert_eq!(cache.vector_count(&name("alice")), 2);
    }

    #[test]
    fn test_list_identities_insertion_order() {
        let cache = RegistryCache::new();
        cache.append(&name("Carol"), vec![1.0]).unwrap();
        cache.append(&name("Alice"), vec![1.0]).unwrap();
        cache.append(&name("Bob"), vec![1.0]).unwrap();
        cache.append(&name("Alice"), vec![2.0]).unwrap();

        assert_eq!(cache.list_identities().unwrap(), vec!["Carol", "Alice", "Bob"]);
    }

    #[test]
    fn test_rebuild_replaces_contents() {
        let cache = RegistryCache::new();
        cache.append(&name("Old"), vec![9.0]).unwrap();

        let mut snapshot = IndexMap::new();
        snapshot.insert(name("Alice"), vec![record(vec![1.0]), record(vec![2.0])]);
        snapshot.insert(name("Bob"), vec![record(vec![3.0])]);
        cache.rebuild(snapshot).unwrap();

        assert_eq!(cache.list_identities().unwrap(), vec!["Alice", "Bob"]);
        assert_eq!(cache.vector_count(&name("Old")), 0);
        assert_eq!(cache.vector_count(&name("Alice")), 2);
    }

    #[test]
    fn test_remove() {
        let cache = RegistryCache::new();
        cache.append(&name("Alice"), vec![1.0]).unwrap();

        assert!(cache.remove(&name("ALICE")).unwrap());
        assert!(!cache.remove(&name("Alice")).unwrap());
        assert_eq!(cache.identity_count(), 0);
    }

    #[test]
    fn test_snapshot_flattens_in_order() {
        let cache = RegistryCache::new();
        cache.append(&name("Alice"), vec![1.0]).unwrap();
        cache.append(&name("Alice"), vec![2.0]).unwrap();
        cache.append(&name("Bob"), vec![3.0]).unwrap();

        let snapshot = cache.snapshot_for_match().unwrap();
        let entries: Vec<_> = snapshot
            .iter()
            .map(|(identity, vector)| (identity.to_string(), vector[0]))
            .collect();
        assert_eq!(
            entries,
            vec![
                ("Alice".to_string(), 1.0),
                ("Alice".to_string(), 2.0),
                ("Bob".to_string(), 3.0)
            ]
        );
    }

    #[test]
    fn test_snapshot_survives_concurrent_mutation() {
        let cache = RegistryCache::new();
        cache.append(&name("Alice"), vec![1.0]).unwrap();

        let snapshot = cache.snapshot_for_match().unwrap();
        cache.remove(&name("Alice")).unwrap();

        // The flattened view taken before the removal is still intact.
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let cache = Arc::new(RegistryCache::new());

        let writers: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        cache
                            .append(&name(&format!("person{i}")), vec![j as f32])
                            .unwrap();
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        let snapshot = cache.snapshot_for_match().unwrap();
                        // Never observe a torn entry.
                        for (identity, _) in snapshot.iter() {
                            assert!(identity.starts_with("person"));
                        }
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }
        assert_eq!(cache.identity_count(), 4);
        assert_eq!(cache.vector_count(&name("person0")), 25);
    }
}
