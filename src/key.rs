//! Cache Key Module
//!
//! An ordered sequence of string parts joined into a single identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

// == Public Constants ==
/// Reserved delimiter joining key parts; no part may contain it.
pub const KEY_DELIMITER: &str = "::";

// == Cache Key ==
/// A validated cache key.
///
/// Built from an ordered sequence of string parts joined by [`KEY_DELIMITER`].
/// Order is significant; two keys are equal iff their joined strings are
/// equal. Because no part may contain the delimiter, the joined form is
/// unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    // == Constructor ==
    /// Creates a key from an ordered sequence of parts.
    ///
    /// Validation happens here, at the boundary, so the engine never sees a
    /// malformed key.
    ///
    /// # Errors
    /// - [`CacheError::EmptyKey`] if no parts are supplied
    /// - [`CacheError::EmptyKeyPart`] if any part is an empty string
    /// - [`CacheError::ReservedDelimiter`] if any part contains `"::"`
    pub fn new<I, S>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts: Vec<String> = parts.into_iter().map(Into::into).collect();

        if parts.is_empty() {
            return Err(CacheError::EmptyKey);
        }
        for part in &parts {
            if part.is_empty() {
                return Err(CacheError::EmptyKeyPart);
            }
            if part.contains(KEY_DELIMITER) {
                return Err(CacheError::ReservedDelimiter(part.clone()));
            }
        }

        Ok(Self(parts.join(KEY_DELIMITER)))
    }

    /// Creates a key from a single part.
    pub fn single(part: impl Into<String>) -> Result<Self> {
        Self::new([part.into()])
    }

    /// The joined string form of the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
