//! File-backed content store.
//!
//! Durable storage is one directory per identity under a common root:
//!
//! ```text
//! registry/
//!   Alice/
//!     face_0001.png    image crop artifact
//!     face_0001.json   vector artifact (embedding + content hash)
//!     hashes.json      content hash ledger, written last on commit
//!   Bob/
//!     ...
//! ```
//!
//! The store exclusively owns durable state; the registry cache is derived
//! from it and never the other way around. Commit order is image, vector,
//! ledger — a crash before the ledger append leaves an orphaned artifact
//! pair that [`ContentStore::load_all`] skips with a warning.
//!
//! Directory resolution is case-insensitive and case-preserving: the first
//! enrollment fixes the on-disk casing, later operations find it under any
//! casing of the same name.

use crate::models::{ContentHash, EmbeddingRecord, IdentityName, RecordRef};
use crate::storage::ledger::{HashLedger, LEDGER_FILE};
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Base name prefix for record artifacts.
const ARTIFACT_PREFIX: &str = "face_";

/// Maximum vector artifact size (1MB).
/// Prevents memory exhaustion from maliciously large files.
const MAX_VECTOR_FILE_SIZE: u64 = 1024 * 1024;

/// Serializable record format for vector artifacts.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    embedding: Vec<f32>,
    content_hash: String,
    #[serde(default)]
    created_at: u64,
}

/// File-backed per-identity record storage.
pub struct ContentStore {
    /// Root directory holding one subdirectory per identity.
    root: PathBuf,
    /// Identity-scoped write locks, keyed by folded name.
    ///
    /// Sequence-number allocation and the artifact/ledger write pair must
    /// not race for the same identity; distinct identities proceed
    /// concurrently.
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ContentStore {
    /// Creates a store rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let _ = fs::create_dir_all(&root);
        Self {
            root,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a store with checked root directory creation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the directory cannot be created.
    pub fn with_create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| Error::storage("create_store_root", e))?;
        Ok(Self {
            root,
            write_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Commits one record: image artifact, vector artifact, then ledger.
    ///
    /// The identity's storage directory is created on first commit. Artifact
    /// base names carry a monotonically increasing sequence number derived
    /// from the current artifact count (bumped past any survivor of an
    /// earlier removal).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if any filesystem write fails. A failure
    /// after the image write leaves an unledgered orphan that the next
    /// [`ContentStore::load_all`] ignores.
    pub fn put_record(
        &self,
        identity: &IdentityName,
        canonical_image: &[u8],
        vector: &[f32],
        content_hash: &ContentHash,
    ) -> Result<RecordRef> {
        let lock = self.identity_lock(identity)?;
        let _guard = lock
            .lock()
            .map_err(|_| Error::storage("put_record", "lock poisoned"))?;

        let dir = match self.resolve_dir(identity) {
            Some(existing) => existing,
            None => {
                let dir = self.root.join(identity.as_str());
                fs::create_dir_all(&dir)
                    .map_err(|e| Error::storage("create_identity_dir", e))?;
                dir
            },
        };

        let base_name = next_base_name(&dir)?;
        let image_path = dir.join(format!("{base_name}.png"));
        let vector_path = dir.join(format!("{base_name}.json"));

        fs::write(&image_path, canonical_image)
            .map_err(|e| Error::storage("write_image_artifact", e))?;

        let stored = StoredRecord {
            embedding: vector.to_vec(),
            content_hash: content_hash.as_str().to_string(),
            created_at: unix_now(),
        };
        let json = serde_json::to_string(&stored)
            .map_err(|e| Error::storage("serialize_vector_artifact", e))?;
        fs::write(&vector_path, json)
            .map_err(|e| Error::storage("write_vector_artifact", e))?;

        // Ledger last: only a fully written artifact pair ever becomes visible.
        let mut ledger = HashLedger::load(&dir);
        ledger.insert(content_hash.clone());
        ledger.save(&dir)?;

        tracing::debug!(identity = %identity, base = %base_name, "record committed");

        Ok(RecordRef {
            identity: identity.as_str().to_string(),
            base_name,
        })
    }

    /// Scans durable storage and returns every identity's records.
    ///
    /// Used at startup and on explicit reload. Unreadable or malformed
    /// artifacts, artifacts missing from their ledger, and directories that
    /// are not valid identity names are skipped with a warning; one corrupt
    /// identity never blocks loading the rest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] only if the root directory itself cannot
    /// be scanned.
    pub fn load_all(&self) -> Result<IndexMap<IdentityName, Vec<EmbeddingRecord>>> {
        let mut registry = IndexMap::new();

        if !self.root.exists() {
            return Ok(registry);
        }

        let mut dirs: Vec<PathBuf> = fs::read_dir(&self.root)
            .map_err(|e| Error::storage("scan_store_root", e))?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();

        for dir in dirs {
            let Some(dir_name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let identity = match IdentityName::new(dir_name) {
                Ok(name) => name,
                Err(_) => {
                    tracing::warn!(dir = %dir.display(), "skipping non-identity directory");
                    continue;
                },
            };

            let records = load_identity_records(&dir);
            if records.is_empty() {
                tracing::debug!(identity = %identity, "no loadable records, skipping");
                continue;
            }
            registry.insert(identity, records);
        }

        Ok(registry)
    }

    /// Whether the given content hash is already committed for an identity.
    #[must_use]
    pub fn has_hash(&self, identity: &IdentityName, hash: &ContentHash) -> bool {
        self.resolve_dir(identity)
            .is_some_and(|dir| HashLedger::load(&dir).contains(hash))
    }

    /// Removes an identity's directory, artifacts, and ledger.
    ///
    /// Returns whether the identity existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the removal fails partway.
    pub fn delete_identity(&self, identity: &IdentityName) -> Result<bool> {
        let lock = self.identity_lock(identity)?;
        let _guard = lock
            .lock()
            .map_err(|_| Error::storage("delete_identity", "lock poisoned"))?;

        let Some(dir) = self.resolve_dir(identity) else {
            return Ok(false);
        };

        fs::remove_dir_all(&dir).map_err(|e| Error::storage("delete_identity_dir", e))?;
        tracing::info!(identity = %identity, "identity deleted");
        Ok(true)
    }

    /// Removes one record's artifact pair and its ledger entry.
    ///
    /// The ledger entry is removed first, mirroring the commit order: a
    /// failure between ledger write and file removal leaves unledgered
    /// artifacts that the next load ignores.
    ///
    /// Returns whether the record existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unsafe base name and
    /// [`Error::Storage`] if removal fails.
    pub fn remove_record(&self, identity: &IdentityName, base_name: &str) -> Result<bool> {
        if !is_safe_base_name(base_name) {
            return Err(Error::InvalidInput(format!(
                "artifact base name contains invalid characters: {base_name}",
            )));
        }

        let lock = self.identity_lock(identity)?;
        let _guard = lock
            .lock()
            .map_err(|_| Error::storage("remove_record", "lock poisoned"))?;

        let Some(dir) = self.resolve_dir(identity) else {
            return Ok(false);
        };

        let vector_path = dir.join(format!("{base_name}.json"));
        if !vector_path.exists() {
            return Ok(false);
        }

        if let Some(stored) = read_stored_record(&vector_path) {
            let mut ledger = HashLedger::load(&dir);
            if ledger.remove(&ContentHash::from_hex(stored.content_hash)) {
                ledger.save(&dir)?;
            }
        }

        fs::remove_file(&vector_path)
            .map_err(|e| Error::storage("remove_vector_artifact", e))?;

        let image_path = dir.join(format!("{base_name}.png"));
        if image_path.exists() {
            fs::remove_file(&image_path)
                .map_err(|e| Error::storage("remove_image_artifact", e))?;
        }

        Ok(true)
    }

    /// Lists an identity's artifact file names (ledger excluded), sorted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdentityNotFound`] if the identity has no storage
    /// directory and [`Error::Storage`] if the scan fails.
    pub fn list_artifacts(&self, identity: &IdentityName) -> Result<Vec<String>> {
        let dir = self
            .resolve_dir(identity)
            .ok_or_else(|| Error::IdentityNotFound(identity.as_str().to_string()))?;

        let mut names: Vec<String> = fs::read_dir(&dir)
            .map_err(|e| Error::storage("scan_identity_dir", e))?
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| name != LEDGER_FILE)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Finds the on-disk directory for an identity, case-insensitively.
    fn resolve_dir(&self, identity: &IdentityName) -> Option<PathBuf> {
        let entries = fs::read_dir(&self.root).ok()?;
        for entry in entries.filter_map(std::result::Result::ok) {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.to_lowercase() == identity.key() && entry.path().is_dir() {
                return Some(entry.path());
            }
        }
        None
    }

    /// Returns (creating if needed) the write lock for an identity.
    fn identity_lock(&self, identity: &IdentityName) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .write_locks
            .lock()
            .map_err(|_| Error::storage("identity_lock", "lock poisoned"))?;
        Ok(locks
            .entry(identity.key().to_string())
            .or_default()
            .clone())
    }
}

/// Loads the records of one identity directory, skipping whatever fails.
fn load_identity_records(dir: &Path) -> Vec<EmbeddingRecord> {
    let ledger = HashLedger::load(dir);

    let Ok(entries) = fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "unreadable identity directory");
        return Vec::new();
    };

    let mut vector_files: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension().is_some_and(|ext| ext == "json")
                && path.file_name().is_some_and(|name| name != LEDGER_FILE)
        })
        .collect();
    vector_files.sort();

    let mut records = Vec::new();
    for path in vector_files {
        let Some(stored) = read_stored_record(&path) else {
            continue;
        };

        let hash = ContentHash::from_hex(stored.content_hash);
        if !ledger.contains(&hash) {
            tracing::warn!(
                path = %path.display(),
                "artifact not in ledger (orphan from interrupted commit), skipping"
            );
            continue;
        }

        records.push(EmbeddingRecord {
            vector: stored.embedding,
            content_hash: hash,
            created_at: stored.created_at,
        });
    }
    records
}

/// Reads and parses one vector artifact, logging and returning `None` on
/// any failure.
fn read_stored_record(path: &Path) -> Option<StoredRecord> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > MAX_VECTOR_FILE_SIZE => {
            tracing::warn!(path = %path.display(), "vector artifact exceeds size limit, skipping");
            return None;
        },
        Ok(_) => {},
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable vector artifact");
            return None;
        },
    }

    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable vector artifact");
            return None;
        },
    };

    match serde_json::from_str(&contents) {
        Ok(stored) => Some(stored),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "malformed vector artifact, skipping");
            None
        },
    }
}

/// Allocates the next free artifact base name in an identity directory.
fn next_base_name(dir: &Path) -> Result<String> {
    let count = fs::read_dir(dir)
        .map_err(|e| Error::storage("scan_identity_dir", e))?
        .filter_map(std::result::Result::ok)
        .filter(|entry| {
            let path = entry.path();
            path.extension().is_some_and(|ext| ext == "json")
                && path.file_name().is_some_and(|name| name != LEDGER_FILE)
        })
        .count();

    // Count-derived sequence; bump past survivors of earlier removals.
    let mut seq = count + 1;
    loop {
        let base = format!("{ARTIFACT_PREFIX}{seq:04}");
        if !dir.join(format!("{base}.json")).exists() && !dir.join(format!("{base}.png")).exists()
        {
            return Ok(base);
        }
        seq += 1;
    }
}

/// Checks if an artifact base name is safe (no path traversal).
fn is_safe_base_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

/// Current time as Unix epoch seconds.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn name(s: &str) -> IdentityName {
        IdentityName::new(s).unwrap()
    }

    fn put(store: &ContentStore, identity: &str, content: &[u8], vector: Vec<f32>) -> RecordRef {
        let hash = ContentHash::of(content);
        store
            .put_record(&name(identity), content, &vector, &hash)
            .unwrap()
    }

    #[test]
    fn test_put_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());

        put(&store, "Alice", b"image-a", vec![1.0, 0.0]);
        put(&store, "Alice", b"image-b", vec![0.5, 0.5]);
        put(&store, "Bob", b"image-c", vec![0.0, 1.0]);

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[&name("alice")].len(), 2);
        assert_eq!(loaded[&name("bob")].len(), 1);
        assert_eq!(loaded[&name("bob")][0].vector, vec![0.0, 1.0]);
    }

    #[test]
    fn test_sequence_numbering() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());

        let first = put(&store, "Alice", b"one", vec![1.0]);
        let second = put(&store, "Alice", b"two", vec![2.0]);
        assert_eq!(first.base_name, "face_0001");
        assert_eq!(second.base_name, "face_0002");
    }

    #[test]
    fn test_sequence_skips_survivors_after_removal() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());

        put(&store, "Alice", b"one", vec![1.0]);
        put(&store, "Alice", b"two", vec![2.0]);
        store.remove_record(&name("Alice"), "face_0001").unwrap();

        // One artifact remains, so the count-derived candidate (face_0002)
        // collides and must be bumped.
        let third = put(&store, "Alice", b"three", vec![3.0]);
        assert_eq!(third.base_name, "face_0003");
    }

    #[test]
    fn test_has_hash() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());

        let hash = ContentHash::of(b"the-content");
        assert!(!store.has_hash(&name("Alice"), &hash));

        store
            .put_record(&name("Alice"), b"the-content", &[1.0], &hash)
            .unwrap();
        assert!(store.has_hash(&name("Alice"), &hash));
        // Case-insensitive resolution
        assert!(store.has_hash(&name("ALICE"), &hash));
        // Scoped per identity
        assert!(!store.has_hash(&name("Bob"), &hash));
    }

    #[test]
    fn test_delete_identity() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());

        put(&store, "Alice", b"img", vec![1.0]);
        assert!(store.delete_identity(&name("alice")).unwrap());
        assert!(!store.delete_identity(&name("alice")).unwrap());
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_remove_record_updates_ledger() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());

        let hash = ContentHash::of(b"img");
        store
            .put_record(&name("Alice"), b"img", &[1.0], &hash)
            .unwrap();

        assert!(store.remove_record(&name("Alice"), "face_0001").unwrap());
        assert!(!store.has_hash(&name("Alice"), &hash));
        assert!(!store.remove_record(&name("Alice"), "face_0001").unwrap());
    }

    #[test]
    fn test_remove_record_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());

        let result = store.remove_record(&name("Alice"), "../hashes");
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_load_skips_unledgered_orphan() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());

        put(&store, "Alice", b"good", vec![1.0]);

        // Simulate a crash between artifact write and ledger append.
        let identity_dir = dir.path().join("Alice");
        fs::write(
            identity_dir.join("face_0002.json"),
            r#"{"embedding": [9.0], "content_hash": "deadbeef", "created_at": 0}"#,
        )
        .unwrap();
        fs::write(identity_dir.join("face_0002.png"), b"orphan").unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded[&name("alice")].len(), 1);
        assert_eq!(loaded[&name("alice")][0].vector, vec![1.0]);
    }

    #[test]
    fn test_load_skips_malformed_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());

        put(&store, "Alice", b"good", vec![1.0]);
        fs::write(dir.path().join("Alice/face_0099.json"), "{broken").unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded[&name("alice")].len(), 1);
    }

    #[test]
    fn test_load_tolerates_corrupt_identity_among_good_ones() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());

        put(&store, "Alice", b"img-a", vec![1.0]);
        put(&store, "Bob", b"img-b", vec![2.0]);

        // Corrupt everything about Bob's records.
        fs::write(dir.path().join("Bob/face_0001.json"), "not json").unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(&name("alice")));
    }

    #[test]
    fn test_list_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());

        put(&store, "Alice", b"one", vec![1.0]);
        put(&store, "Alice", b"two", vec![2.0]);

        let artifacts = store.list_artifacts(&name("alice")).unwrap();
        assert_eq!(
            artifacts,
            vec![
                "face_0001.json",
                "face_0001.png",
                "face_0002.json",
                "face_0002.png"
            ]
        );

        let missing = store.list_artifacts(&name("Nobody"));
        assert!(matches!(missing, Err(Error::IdentityNotFound(_))));
    }

    #[test]
    fn test_case_preserving_directory() {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path());

        put(&store, "McGregor", b"img", vec![1.0]);
        // Later enrollment under different casing lands in the same directory.
        put(&store, "mcgregor", b"img2", vec![2.0]);

        assert!(dir.path().join("McGregor").exists());
        assert!(!dir.path().join("mcgregor").exists());

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded[&name("mcgregor")].len(), 2);
    }

    #[test]
    fn test_concurrent_enrollments_distinct_identities() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ContentStore::new(dir.path()));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let identity = format!("person{i}");
                    for j in 0..5 {
                        let content = format!("{identity}-{j}").into_bytes();
                        let hash = ContentHash::of(&content);
                        store
                            .put_record(
                                &IdentityName::new(&identity).unwrap(),
                                &content,
                                &[j as f32],
                                &hash,
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 4);
        for records in loaded.values() {
            assert_eq!(records.len(), 5);
        }
    }

    #[test]
    fn test_concurrent_enrollments_same_identity_serialize() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ContentStore::new(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let content = format!("unique-{i}").into_bytes();
                    let hash = ContentHash::of(&content);
                    store
                        .put_record(&IdentityName::new("Alice").unwrap(), &content, &[i as f32], &hash)
                        .unwrap()
                })
            })
            .collect();

        let mut bases: Vec<String> = handles
            .into_iter()
            .map(|h| h.join().unwrap().base_name)
            .collect();
        bases.sort();
        bases.dedup();
        // Sequence allocation under the identity lock never collides.
        assert_eq!(bases.len(), 8);

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded[&name("alice")].len(), 8);
    }
}
