//! Domain newtypes with validation
//!
//! Identifiers coming from the source collection end up inside object keys,
//! so they are validated once at construction time and trusted afterwards.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Returns true if `id` only contains characters that are safe inside an
/// object key segment (Drive IDs are URL-safe base64-ish strings).
fn is_key_safe(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ============================================================================
// Source identifiers
// ============================================================================

/// Stable identifier of an album (a folder in the source collection)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AlbumId(String);

impl AlbumId {
    /// Create a new AlbumId
    ///
    /// # Errors
    /// Returns error if the ID is empty or contains characters that are not
    /// allowed in an object key
    pub fn new(id: String) -> Result<Self, DomainError> {
        if !is_key_safe(&id) {
            return Err(DomainError::InvalidAlbumId(id));
        }
        Ok(Self(id))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AlbumId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AlbumId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for AlbumId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<AlbumId> for String {
    fn from(id: AlbumId) -> Self {
        id.0
    }
}

/// Stable identifier of an item (an image inside an album)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(String);

impl ItemId {
    /// Create a new ItemId
    ///
    /// # Errors
    /// Returns error if the ID is empty or contains characters that are not
    /// allowed in an object key
    pub fn new(id: String) -> Result<Self, DomainError> {
        if !is_key_safe(&id) {
            return Err(DomainError::InvalidItemId(id));
        }
        Ok(Self(id))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ItemId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

// ============================================================================
// CollectionName
// ============================================================================

/// Name of a synced collection (e.g. `gallery`, `calendar`)
///
/// Used as the key in the version marker and as a prefix for checkpoint
/// store keys and run log object names. Lowercase ASCII, digits, `-`, `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionName(String);

impl CollectionName {
    /// Create a new CollectionName
    ///
    /// # Errors
    /// Returns error if the name is empty or not lowercase key-safe
    pub fn new(name: String) -> Result<Self, DomainError> {
        if !is_key_safe(&name) || name.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(DomainError::InvalidCollection(name));
        }
        Ok(Self(name))
    }

    /// The default collection synced by the engine
    #[must_use]
    pub fn gallery() -> Self {
        Self("gallery".to_string())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checkpoint store key holding the resume cursor
    #[must_use]
    pub fn checkpoint_key(&self) -> String {
        format!("checkpoint:{}", self.0)
    }

    /// Checkpoint store key holding the failure counter
    #[must_use]
    pub fn failures_key(&self) -> String {
        format!("failures:{}", self.0)
    }

    /// Checkpoint store key holding the change-detection watermark
    #[must_use]
    pub fn watermark_key(&self) -> String {
        format!("watermark:{}", self.0)
    }

    /// Lease name guarding sync runs of this collection
    #[must_use]
    pub fn lease_name(&self) -> String {
        format!("sync:{}", self.0)
    }
}

impl Display for CollectionName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CollectionName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for CollectionName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<CollectionName> for String {
    fn from(name: CollectionName) -> Self {
        name.0
    }
}
