//! Embedding record types and content hashing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest of canonical stored image content.
///
/// Hashes are computed over the *canonical* face content — the deterministic
/// PNG re-encode of the region being stored — never over raw upload bytes.
/// Two uploads of the same face cropped from different surrounding images
/// therefore produce the same hash and deduplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Computes the SHA-256 hash of the given content.
    ///
    /// # Example
    ///
    /// ```rust
    /// use visage::ContentHash;
    ///
    /// let hash = ContentHash::of(b"canonical bytes");
    /// assert_eq!(hash.as_str().len(), 64); // SHA-256 produces 64 hex chars
    /// ```
    #[must_use]
    pub fn of(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(hex::encode(hasher.finalize()))
    }

    /// Wraps an already-computed lowercase hex digest.
    #[must_use]
    pub fn from_hex(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// Returns the lowercase hex digest (64 characters).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rectangular face location within an image.
///
/// Uses the `(top, right, bottom, left)` edge convention of the upstream
/// face detection model. All values are pixel offsets from the image origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    /// Top edge (y of upper boundary).
    pub top: u32,
    /// Right edge (x of right boundary, exclusive).
    pub right: u32,
    /// Bottom edge (y of lower boundary, exclusive).
    pub bottom: u32,
    /// Left edge (x of left boundary).
    pub left: u32,
}

impl FaceBox {
    /// Box width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    /// Box height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Whether the box encloses a non-empty region.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// A face found by the embedding provider: where it is and what it encodes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedFace {
    /// Location of the face within the queried image.
    pub location: FaceBox,
    /// Fixed-length embedding vector.
    pub embedding: Vec<f32>,
}

/// One stored embedding with its provenance.
///
/// Immutable once created; removed only through identity deletion or
/// explicit per-record removal.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    /// The embedding vector.
    pub vector: Vec<f32>,
    /// Hash of the canonical image content this vector was derived from.
    pub content_hash: ContentHash,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
}

/// Reference to a committed record's artifact pair on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    /// Identity that owns the record (display casing).
    pub identity: String,
    /// Shared base name of the image and vector artifacts (e.g. `face_0003`).
    pub base_name: String,
}

impl RecordRef {
    /// File name of the image artifact.
    #[must_use]
    pub fn image_file(&self) -> String {
        format!("{}.png", self.base_name)
    }

    /// File name of the vector artifact.
    #[must_use]
    pub fn vector_file(&self) -> String {
        format!("{}.json", self.base_name)
    }
}
