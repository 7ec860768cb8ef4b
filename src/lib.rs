//! # Visage
//!
//! A face identity registry and matching engine.
//!
//! Visage maintains a registry of named identities, each represented by one
//! or more face embeddings, and answers "who is this?" queries against the
//! embeddings extracted from a supplied image.
//!
//! ## Features
//!
//! - File-backed content store (one directory per identity, artifact pair
//!   per record, per-identity hash ledger)
//! - SHA-256 duplicate detection over canonical face content
//! - In-memory registry cache rebuilt from disk at startup
//! - Exhaustive Euclidean nearest-neighbor matching with a distance
//!   threshold and deterministic tie-breaking
//! - HTTP request layer mapping outcomes to status codes
//!
//! ## Example
//!
//! ```rust,ignore
//! use visage::{EnrollmentService, EnrollRequest, VisageConfig};
//!
//! let service = EnrollmentService::new(store, cache, encoder, config);
//! let outcome = service.enroll(EnrollRequest {
//!     identity: "alice".parse()?,
//!     image_bytes: std::fs::read("alice.png")?,
//!     ..Default::default()
//! })?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod codec;
pub mod config;
pub mod models;
pub mod observability;
pub mod provider;
pub mod registry;
pub mod server;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::VisageConfig;
pub use models::{
    ContentHash, DetectedFace, EmbeddingRecord, EnrollOutcome, FaceBox, IdentifiedFace,
    IdentityName, MatchOutcome, MatchResult, RecordRef,
};
pub use provider::FaceEncoder;
pub use registry::RegistryCache;
pub use services::{EnrollRequest, EnrollmentService, IdentificationService};
pub use storage::ContentStore;

/// Error type for visage operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Bad identity name, wrong embedding dimensions, malformed request |
/// | `Decode` | Image bytes cannot be decoded or the crop box is out of bounds |
/// | `Storage` | Filesystem I/O fails, a lock is poisoned, server bind fails |
/// | `Provider` | The face encoder sidecar is unreachable or returns garbage |
/// | `IdentityNotFound` | Delete or list targeting an identity that does not exist |
///
/// "No face found" and "duplicate" are *outcomes*, not errors — see
/// [`models::EnrollOutcome`].
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - An identity name is empty, too long, or contains path separators
    /// - A supplied embedding does not match the configured dimensions
    /// - A request body fails validation before any side effect
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Image content could not be decoded.
    ///
    /// Fails the single request; no state changes. Raised when the upload is
    /// not a readable png/jpeg or the supplied face box falls outside the
    /// image bounds.
    #[error("image decode failed: {0}")]
    Decode(String),

    /// A persistence operation failed.
    ///
    /// Raised when:
    /// - Artifact or ledger writes fail partway
    /// - The storage directory cannot be scanned
    /// - A registry cache lock is poisoned
    #[error("storage operation '{operation}' failed: {cause}")]
    Storage {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The embedding provider failed.
    ///
    /// Transport-level failure talking to the face encoder; a provider that
    /// finds zero faces is a valid outcome, not this error.
    #[error("face encoder request failed: {0}")]
    Provider(String),

    /// The named identity does not exist.
    #[error("identity '{0}' not found")]
    IdentityNotFound(String),
}

impl Error {
    /// Shorthand for an [`Error::Storage`] with an operation name.
    pub fn storage(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Storage {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for visage operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("empty name".to_string());
        assert_eq!(err.to_string(), "invalid input: empty name");

        let err = Error::storage("write_artifact", "disk full");
        assert_eq!(
            err.to_string(),
            "storage operation 'write_artifact' failed: disk full"
        );

        let err = Error::IdentityNotFound("alice".to_string());
        assert!(err.to_string().contains("alice"));
    }
}
