//! Operation outcome types.
//!
//! Every operation returns one discriminated outcome type. Negative results
//! that are part of normal operation — a duplicate enrollment, an image with
//! no detectable face, a query that matches nobody — are outcome variants,
//! not errors.

use super::FaceBox;
use serde::{Deserialize, Serialize};

/// Result of an enrollment attempt.
///
/// # Example
///
/// ```rust
/// use visage::EnrollOutcome;
///
/// let outcome = EnrollOutcome::enrolled("Alice", 3);
/// assert!(matches!(outcome, EnrollOutcome::Enrolled { .. }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnrollOutcome {
    /// The record was committed to the content store and registry cache.
    Enrolled {
        /// Identity the record was enrolled under (display casing).
        identity: String,
        /// Total records for this identity after the commit.
        record_count: usize,
    },
    /// Identical canonical content is already enrolled; nothing was stored.
    Duplicate {
        /// Identity that already holds the content.
        identity: String,
    },
    /// The embedding provider found no face; nothing was stored.
    NoFaceFound,
}

impl EnrollOutcome {
    /// Creates an [`EnrollOutcome::Enrolled`] outcome.
    #[must_use]
    pub fn enrolled(identity: impl Into<String>, record_count: usize) -> Self {
        Self::Enrolled {
            identity: identity.into(),
            record_count,
        }
    }

    /// Creates an [`EnrollOutcome::Duplicate`] outcome.
    #[must_use]
    pub fn duplicate(identity: impl Into<String>) -> Self {
        Self::Duplicate {
            identity: identity.into(),
        }
    }

    /// Whether the enrollment committed a new record.
    #[must_use]
    pub const fn is_enrolled(&self) -> bool {
        matches!(self, Self::Enrolled { .. })
    }
}

/// Result of matching one query embedding against the registry.
///
/// Note: `distance` serializes to `null` in JSON when it is `+∞` (the
/// empty-registry case), since JSON has no infinity literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum MatchOutcome {
    /// A known identity was within the distance threshold.
    Found {
        /// The matched identity (display casing).
        identity: String,
        /// Euclidean distance to the closest stored vector.
        distance: f32,
    },
    /// No stored vector was within the threshold.
    Unknown {
        /// Distance to the closest stored vector, or `+∞` if the registry
        /// is empty.
        distance: f32,
    },
}

impl MatchOutcome {
    /// Distance to the nearest stored vector regardless of variant.
    #[must_use]
    pub const fn distance(&self) -> f32 {
        match self {
            Self::Found { distance, .. } | Self::Unknown { distance } => *distance,
        }
    }

    /// The matched identity name, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        match self {
            Self::Found { identity, .. } => Some(identity),
            Self::Unknown { .. } => None,
        }
    }
}

/// Match outcome for one query vector, tagged with its position in the
/// query sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Index of the query vector this result answers.
    pub query_index: usize,
    /// The match outcome.
    pub outcome: MatchOutcome,
}

/// Identification result for one face found in an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiedFace {
    /// Where the face was found in the queried image.
    pub location: FaceBox,
    /// Who it matched, if anyone.
    pub outcome: MatchOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enroll_outcome_constructors() {
        let outcome = EnrollOutcome::enrolled("Alice", 2);
        assert!(outcome.is_enrolled());

        let outcome = EnrollOutcome::duplicate("Alice");
        assert!(!outcome.is_enrolled());

        assert!(!EnrollOutcome::NoFaceFound.is_enrolled());
    }

    #[test]
    fn test_enroll_outcome_serialization() {
        let json = serde_json::to_string(&EnrollOutcome::enrolled("Bob", 1)).unwrap();
        assert!(json.contains("\"outcome\":\"enrolled\""));
        assert!(json.contains("\"record_count\":1"));

        let json = serde_json::to_string(&EnrollOutcome::NoFaceFound).unwrap();
        assert!(json.contains("no_face_found"));
    }

    #[test]
    fn test_match_outcome_accessors() {
        let found = MatchOutcome::Found {
            identity: "Carol".to_string(),
            distance: 0.42,
        };
        assert_eq!(found.identity(), Some("Carol"));
        assert!((found.distance() - 0.42).abs() < f32::EPSILON);

        let unknown = MatchOutcome::Unknown {
            distance: f32::INFINITY,
        };
        assert_eq!(unknown.identity(), None);
        assert!(unknown.distance().is_infinite());
    }

    #[test]
    fn test_infinite_distance_serializes_as_null() {
        let unknown = MatchOutcome::Unknown {
            distance: f32::INFINITY,
        };
        let json = serde_json::to_string(&unknown).unwrap();
        assert!(json.contains("\"distance\":null"));
    }
}
