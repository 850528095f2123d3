// Cache key derivation
// Author: kelexine (https://github.com/kelexine)

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque cache key built from query-path segments.
///
/// The segments are serialized as a JSON array, so `["meals", "2026-10-16"]`
/// always produces the same key. Segment order is significant; named
/// parameters added with [`CacheKey::with_params`] are not. Two logically distinct requests must use
/// distinct segments; collisions are not detected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from path segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let owned: Vec<S> = segments.into_iter().collect();
        let parts: Vec<&str> = owned.iter().map(AsRef::as_ref).collect();
        // Serializing a slice of &str cannot fail
        Self(serde_json::to_string(&parts).unwrap_or_default())
    }

    /// Build a key from path segments plus named query parameters.
    ///
    /// Parameters are sorted by name and appended as one final segment, so
    /// the order they are given in never changes the key.
    pub fn with_params<I, S, P, K, V>(segments: I, params: P) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        P: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let params: BTreeMap<String, String> = params
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        let mut parts: Vec<String> = segments.into_iter().map(|s| s.as_ref().to_string()).collect();
        parts.push(serde_json::to_string(&params).unwrap_or_default());
        Self::from_segments(parts)
    }

    /// Wrap an already-serialized key.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The segments this key was built from, if it was built with
    /// [`CacheKey::from_segments`].
    pub fn segments(&self) -> Option<Vec<String>> {
        serde_json::from_str(&self.0).ok()
    }

    /// Whether this key's segments start with `prefix`.
    pub fn starts_with_segments(&self, prefix: &[&str]) -> bool {
        match self.segments() {
            Some(segments) => {
                segments.len() >= prefix.len()
                    && segments.iter().zip(prefix).all(|(a, b)| a == b)
            }
            None => false,
        }
    }

    /// SHA256 digest of the key, hex encoded. Safe to use in file names and logs.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&[&str]> for CacheKey {
    fn from(segments: &[&str]) -> Self {
        Self::from_segments(segments.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for CacheKey {
    fn from(segments: [&str; N]) -> Self {
        Self::from_segments(segments)
    }
}

impl From<Vec<String>> for CacheKey {
    fn from(segments: Vec<String>) -> Self {
        Self::from_segments(segments)
    }
}
