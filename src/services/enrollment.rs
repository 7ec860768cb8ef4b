//! Enrollment pipeline.
//!
//! Commits a new (image, embedding) pair for an identity:
//! canonicalize → hash → duplicate check → encode (if no embedding was
//! supplied) → durable write → cache append. The cache is only ever
//! touched after the content store write succeeds, so a crash can lose an
//! enrollment but never serve one that was not persisted.

use crate::codec;
use crate::models::{ContentHash, EnrollOutcome, FaceBox, IdentityName};
use crate::provider::FaceEncoder;
use crate::registry::RegistryCache;
use crate::storage::ContentStore;
use crate::{Error, Result};
use std::sync::Arc;

/// One enrollment request.
#[derive(Debug, Clone)]
pub struct EnrollRequest {
    /// Identity to enroll under.
    pub identity: IdentityName,
    /// Raw uploaded image bytes (png or jpeg).
    pub image_bytes: Vec<u8>,
    /// Externally computed embedding, if the caller already ran detection.
    pub embedding: Option<Vec<f32>>,
    /// Face location within the image, if the caller already ran detection.
    pub face_box: Option<FaceBox>,
}

/// Service for the registry write path: enrollment and deletion.
pub struct EnrollmentService {
    store: Arc<ContentStore>,
    cache: Arc<RegistryCache>,
    encoder: Arc<dyn FaceEncoder>,
}

impl EnrollmentService {
    /// Creates a new enrollment service.
    #[must_use]
    pub fn new(
        store: Arc<ContentStore>,
        cache: Arc<RegistryCache>,
        encoder: Arc<dyn FaceEncoder>,
    ) -> Self {
        Self {
            store,
            cache,
            encoder,
        }
    }

    /// Enrolls a face for an identity.
    ///
    /// Duplicate detection hashes the canonical face content — the crop at
    /// `face_box` when one is supplied, the whole image otherwise, both as
    /// a deterministic PNG re-encode. Re-uploading the same face inside a
    /// different surrounding image is therefore still a duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for unreadable images or out-of-bounds
    /// boxes, [`Error::InvalidInput`] for an embedding of the wrong
    /// dimensions, [`Error::Provider`] if the encoder transport fails, and
    /// [`Error::Storage`] if the durable write fails.
    pub fn enroll(&self, request: EnrollRequest) -> Result<EnrollOutcome> {
        let canonical = codec::canonical_content(&request.image_bytes, request.face_box)?;
        let content_hash = ContentHash::of(&canonical);

        if self.store.has_hash(&request.identity, &content_hash) {
            tracing::debug!(identity = %request.identity, hash = %content_hash, "duplicate enrollment rejected");
            return Ok(EnrollOutcome::duplicate(request.identity.as_str()));
        }

        let vector = match request.embedding {
            Some(vector) => vector,
            None => {
                let mut faces = self.encoder.detect_and_encode(&canonical)?;
                if faces.is_empty() {
                    return Ok(EnrollOutcome::NoFaceFound);
                }
                // Enrollment images should contain one face; take the first.
                faces.swap_remove(0).embedding
            },
        };

        if vector.len() != self.encoder.dimensions() {
            return Err(Error::InvalidInput(format!(
                "embedding has {} dimensions, expected {}",
                vector.len(),
                self.encoder.dimensions()
            )));
        }

        self.store
            .put_record(&request.identity, &canonical, &vector, &content_hash)?;
        let record_count = self.cache.append(&request.identity, vector)?;

        tracing::info!(
            identity = %request.identity,
            record_count,
            "enrollment committed"
        );
        Ok(EnrollOutcome::enrolled(request.identity.as_str(), record_count))
    }

    /// Deletes an identity and all its records from disk and cache.
    ///
    /// Returns whether the identity existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the disk removal fails; the cache
    /// entry is only dropped after the disk removal succeeds.
    pub fn delete_identity(&self, identity: &IdentityName) -> Result<bool> {
        let existed = self.store.delete_identity(identity)?;
        if existed {
            self.cache.remove(identity)?;
        }
        Ok(existed)
    }

    /// Removes one record by artifact base name.
    ///
    /// Returns whether the record existed. The cache is rebuilt from disk
    /// afterwards — the cache holds bare vectors with no record identity,
    /// so a rebuild is the simplest way to keep it exact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if removal or the rebuild fails.
    pub fn remove_record(&self, identity: &IdentityName, base_name: &str) -> Result<bool> {
        let removed = self.store.remove_record(identity, base_name)?;
        if removed {
            self.cache.rebuild(self.store.load_all()?)?;
        }
        Ok(removed)
    }
}
