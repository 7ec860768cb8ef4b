//! Identification pipeline.
//!
//! The read path: decode an image, hand it to the embedding provider, and
//! match every returned embedding against a registry snapshot. Matching is
//! pure in-memory computation; the only I/O is the provider call.

use crate::codec::DecodedImage;
use crate::models::{FaceBox, IdentifiedFace, MatchResult};
use crate::provider::FaceEncoder;
use crate::registry::{RegistryCache, matcher};
use crate::Result;
use std::sync::Arc;

/// Service for identification and detection queries.
pub struct IdentificationService {
    cache: Arc<RegistryCache>,
    encoder: Arc<dyn FaceEncoder>,
    default_threshold: f32,
}

impl IdentificationService {
    /// Creates a new identification service.
    #[must_use]
    pub fn new(
        cache: Arc<RegistryCache>,
        encoder: Arc<dyn FaceEncoder>,
        default_threshold: f32,
    ) -> Self {
        Self {
            cache,
            encoder,
            default_threshold,
        }
    }

    /// Identifies every face in an image.
    ///
    /// Returns one entry per detected face with its location and match
    /// outcome. An image with no detectable faces yields an empty vec —
    /// distinct from an empty registry, which yields `Unknown` entries with
    /// infinite distance.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Decode`] for unreadable images and
    /// [`crate::Error::Provider`] if the encoder transport fails.
    pub fn identify_image(
        &self,
        image_bytes: &[u8],
        threshold: Option<f32>,
    ) -> Result<Vec<IdentifiedFace>> {
        // Validate decodability locally so corrupt uploads surface as
        // Decode, not as a provider failure.
        DecodedImage::from_bytes(image_bytes)?;

        let faces = self.encoder.detect_and_encode(image_bytes)?;
        if faces.is_empty() {
            tracing::debug!("no faces detected in query image");
            return Ok(Vec::new());
        }

        let threshold = threshold.unwrap_or(self.default_threshold);
        let queries: Vec<Vec<f32>> = faces.iter().map(|f| f.embedding.clone()).collect();
        let results = self.identify_vectors(&queries, threshold)?;

        Ok(faces
            .into_iter()
            .zip(results)
            .map(|(face, result)| IdentifiedFace {
                location: face.location,
                outcome: result.outcome,
            })
            .collect())
    }

    /// Matches raw query vectors against the registry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if the cache lock is poisoned.
    pub fn identify_vectors(
        &self,
        queries: &[Vec<f32>],
        threshold: f32,
    ) -> Result<Vec<MatchResult>> {
        let snapshot = self.cache.snapshot_for_match()?;
        Ok(matcher::identify(&snapshot, queries, threshold))
    }

    /// Detects face locations in an image without matching.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Decode`] for unreadable images and
    /// [`crate::Error::Provider`] if the encoder transport fails.
    pub fn detect(&self, image_bytes: &[u8]) -> Result<Vec<FaceBox>> {
        DecodedImage::from_bytes(image_bytes)?;
        self.encoder.detect(image_bytes)
    }

    /// The threshold used when a query does not supply one.
    #[must_use]
    pub const fn default_threshold(&self) -> f32 {
        self.default_threshold
    }
}
