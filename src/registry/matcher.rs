//! Nearest-neighbor matching over a registry snapshot.
//!
//! Matching is an exhaustive scan: every query vector is compared against
//! every stored vector of every identity, and the winner is the identity
//! holding the globally closest vector (no per-identity centroids). This is
//! O(|queries| × |stored vectors|) — entirely adequate for a personal
//! registry of hundreds of vectors, and the snapshot interface leaves room
//! for an index structure later without touching callers.

use crate::models::{MatchOutcome, MatchResult};
use std::sync::Arc;

/// Flattened read-only view of the registry for matching.
///
/// Entries preserve cache iteration order (identity insertion order, then
/// per-identity vector order), which makes tie-breaking deterministic.
pub struct MatchSnapshot {
    entries: Vec<(Arc<str>, Arc<[f32]>)>,
}

impl MatchSnapshot {
    /// Wraps a flattened entry list.
    #[must_use]
    pub const fn new(entries: Vec<(Arc<str>, Arc<[f32]>)>) -> Self {
        Self { entries }
    }

    /// Number of stored vectors in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot holds no vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(identity, vector)` pairs in cache order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.entries
            .iter()
            .map(|(identity, vector)| (identity.as_ref(), vector.as_ref()))
    }
}

/// Matches each query vector against the snapshot.
///
/// The threshold is inclusive: a candidate at exactly `threshold` distance
/// still matches. Ties at exact float equality resolve to the identity
/// encountered first in snapshot iteration order (the strict `<` in the
/// minimum scan keeps the earliest winner). An empty snapshot yields
/// `Unknown` with infinite distance for every query; an empty query slice
/// yields an empty result — both are valid outcomes, not errors.
#[must_use]
pub fn identify(snapshot: &MatchSnapshot, queries: &[Vec<f32>], threshold: f32) -> Vec<MatchResult> {
    queries
        .iter()
        .enumerate()
        .map(|(query_index, query)| MatchResult {
            query_index,
            outcome: best_match(snapshot, query, threshold),
        })
        .collect()
}

/// Finds the globally closest stored vector for one query.
fn best_match(snapshot: &MatchSnapshot, query: &[f32], threshold: f32) -> MatchOutcome {
    let mut best_identity: Option<&str> = None;
    let mut best_distance = f32::INFINITY;

    for (identity, vector) in snapshot.iter() {
        let distance = euclidean(query, vector);
        if distance < best_distance {
            best_distance = distance;
            best_identity = Some(identity);
        }
    }

    match best_identity {
        Some(identity) if best_distance <= threshold => MatchOutcome::Found {
            identity: identity.to_string(),
            distance: best_distance,
        },
        _ => MatchOutcome::Unknown {
            distance: best_distance,
        },
    }
}

/// Euclidean distance between two vectors.
fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}
