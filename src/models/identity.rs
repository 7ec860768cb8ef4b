//! Identity name type.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum identity name length.
const MAX_NAME_LENGTH: usize = 255;

/// A validated identity name.
///
/// Names are case-preserving but compare and hash case-insensitively: the
/// registry treats `"Alice"` and `"alice"` as the same identity, displaying
/// whichever casing was enrolled first.
///
/// Because the name doubles as a storage directory name, it is restricted to
/// alphanumeric characters, dashes, and underscores. This rejects path
/// traversal (`..`, `/`, `\`) at the type boundary.
///
/// # Example
///
/// ```rust
/// use visage::IdentityName;
///
/// let a: IdentityName = "Alice".parse().unwrap();
/// let b: IdentityName = "alice".parse().unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "Alice");
///
/// assert!("../etc/passwd".parse::<IdentityName>().is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityName {
    /// Name as originally supplied.
    raw: String,
    /// Lowercase key used for comparison and hashing.
    folded: String,
}

impl IdentityName {
    /// Creates a validated identity name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the name is empty, longer than 255
    /// characters, or contains anything other than alphanumerics, dashes,
    /// and underscores.
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let raw = name.into();
        if !is_safe_name(&raw) {
            return Err(Error::InvalidInput(format!(
                "identity name must be 1-{MAX_NAME_LENGTH} alphanumeric/dash/underscore characters, got: {raw:?}",
            )));
        }
        let folded = raw.to_lowercase();
        Ok(Self { raw, folded })
    }

    /// Returns the name as originally supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the lowercase lookup key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.folded
    }
}

impl PartialEq for IdentityName {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for IdentityName {}

impl std::hash::Hash for IdentityName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl fmt::Display for IdentityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for IdentityName {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for IdentityName {
    type Error = Error;

    fn try_from(s: String) -> crate::Result<Self> {
        Self::new(s)
    }
}

impl From<IdentityName> for String {
    fn from(name: IdentityName) -> Self {
        name.raw
    }
}

/// Checks if a name is safe to use as a directory name (no path traversal).
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}
