//! Face embedding provider boundary.
//!
//! Embedding extraction is an external capability: given image bytes, a
//! provider returns zero or more fixed-length vectors with their locations.
//! The registry core never implements detection itself; it talks to a
//! [`FaceEncoder`] implementation.

mod remote;

pub use remote::RemoteEncoder;

use crate::Result;
use crate::models::{DetectedFace, FaceBox};

/// Trait for face detection and embedding extraction.
///
/// Implementations are expected to be deterministic per model version and
/// may return an empty sequence (no faces is a valid outcome, not an error).
pub trait FaceEncoder: Send + Sync {
    /// Returns the embedding dimensions this encoder produces.
    fn dimensions(&self) -> usize;

    /// Detects faces in the image and returns their locations and embeddings.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider transport fails or the image cannot
    /// be processed upstream.
    fn detect_and_encode(&self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>>;

    /// Detects face locations without returning embeddings.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider transport fails.
    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<FaceBox>> {
        Ok(self
            .detect_and_encode(image_bytes)?
            .into_iter()
            .map(|f| f.location)
            .collect())
    }
}
