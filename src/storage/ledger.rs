//! Per-identity content hash ledger.
//!
//! Each identity directory carries one `hashes.json` file listing the
//! content hashes already committed for that identity. The ledger is the
//! authority for duplicate detection and is written *last* during a commit:
//! an artifact whose hash never made it into the ledger is an ignorable
//! orphan, never a phantom entry.
//!
//! A missing ledger is treated as empty. A malformed ledger is treated as
//! empty with a warning — a corrupt file for one identity must not abort
//! startup for the rest.

use crate::models::ContentHash;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Ledger file name within an identity directory.
pub const LEDGER_FILE: &str = "hashes.json";

/// In-memory view of one identity's committed content hashes.
#[derive(Debug, Default)]
pub struct HashLedger {
    hashes: Vec<ContentHash>,
}

impl HashLedger {
    /// Loads the ledger for an identity directory.
    ///
    /// Absent and malformed files both yield an empty ledger; malformed
    /// files additionally log a warning.
    #[must_use]
    pub fn load(identity_dir: &Path) -> Self {
        let path = Self::path_for(identity_dir);
        let Ok(contents) = fs::read_to_string(&path) else {
            return Self::default();
        };

        match serde_json::from_str::<Vec<String>>(&contents) {
            Ok(raw) => Self {
                hashes: raw.into_iter().map(ContentHash::from_hex).collect(),
            },
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "malformed hash ledger, treating as empty"
                );
                Self::default()
            },
        }
    }

    /// Persists the ledger into its identity directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the write fails.
    pub fn save(&self, identity_dir: &Path) -> Result<()> {
        let raw: Vec<&str> = self.hashes.iter().map(ContentHash::as_str).collect();
        let json = serde_json::to_string(&raw)
            .map_err(|e| Error::storage("serialize_ledger", e))?;

        fs::write(Self::path_for(identity_dir), json)
            .map_err(|e| Error::storage("write_ledger", e))
    }

    /// Whether the given hash is already committed.
    #[must_use]
    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.hashes.contains(hash)
    }

    /// Records a hash. Returns `false` if it was already present.
    pub fn insert(&mut self, hash: ContentHash) -> bool {
        if self.contains(&hash) {
            return false;
        }
        self.hashes.push(hash);
        true
    }

    /// Removes a hash. Returns whether it was present.
    pub fn remove(&mut self, hash: &ContentHash) -> bool {
        let before = self.hashes.len();
        self.hashes.retain(|h| h != hash);
        self.hashes.len() != before
    }

    /// Number of committed hashes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Whether the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Ledger file path for an identity directory.
    #[must_use]
    pub fn path_for(identity_dir: &Path) -> PathBuf {
        identity_dir.join(LEDGER_FILE)
    }
}
