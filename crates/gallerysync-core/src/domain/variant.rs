//! Size variants and the object key layout
//!
//! Every item is published as one object per variant. The key of each object
//! is derived from the item ID and the variant alone, so the engine can probe
//! for an object without consulting any manifest.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::album::SourceItem;
use super::errors::DomainError;
use super::newtypes::{AlbumId, CollectionName};

/// A rendition of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Variant {
    /// Resized rendition at the given width in pixels (always JPEG)
    Width(u32),
    /// The source bytes, untouched
    Original,
}

impl Variant {
    /// Name used as the key in manifest URL maps (`"800"`, `"original"`)
    pub fn name(&self) -> String {
        match self {
            Variant::Width(px) => px.to_string(),
            Variant::Original => "original".to_string(),
        }
    }

    /// Content type of the stored object
    pub fn content_type<'a>(&self, item: &'a SourceItem) -> &'a str {
        match self {
            Variant::Width(_) => "image/jpeg",
            Variant::Original => {
                if item.media_type().is_empty() {
                    "application/octet-stream"
                } else {
                    item.media_type()
                }
            }
        }
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Variant {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "original" {
            return Ok(Variant::Original);
        }
        match s.parse::<u32>() {
            Ok(px) if px > 0 => Ok(Variant::Width(px)),
            _ => Err(DomainError::InvalidVariant(s.to_string())),
        }
    }
}

impl TryFrom<String> for Variant {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Variant> for String {
    fn from(v: Variant) -> Self {
        v.name()
    }
}

/// Picks the file extension for an original rendition
///
/// The media type wins; the item name's extension is the fallback, then `bin`.
fn original_extension(item: &SourceItem) -> String {
    let from_media = match item.media_type() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "image/heif" => Some("heif"),
        "image/tiff" => Some("tiff"),
        "image/bmp" => Some("bmp"),
        "image/svg+xml" => Some("svg"),
        _ => None,
    };
    if let Some(ext) = from_media {
        return ext.to_string();
    }

    item.name()
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

// ============================================================================
// ObjectLayout
// ============================================================================

/// Deterministic object keys for everything the engine writes
pub struct ObjectLayout;

impl ObjectLayout {
    /// Key of one rendition of an item
    pub fn variant_key(item: &SourceItem, variant: Variant) -> String {
        match variant {
            Variant::Width(px) => format!("images/{}-{}.jpg", item.id(), px),
            Variant::Original => {
                format!("images/{}-original.{}", item.id(), original_extension(item))
            }
        }
    }

    /// Key of the per-album manifest
    pub fn album_manifest_key(album: &AlbumId) -> String {
        format!("gallery/albums/{}.json", album)
    }

    /// Key of the top-level gallery index
    pub fn gallery_manifest_key() -> &'static str {
        "gallery/albums.json"
    }

    /// Key of the shared version marker
    pub fn version_marker_key() -> &'static str {
        "metadata/version.json"
    }

    /// Key of the run log for a collection on a given day
    pub fn run_log_key(collection: &CollectionName, date: NaiveDate) -> String {
        format!("logs/{}-sync-{}.json", collection, date.format("%Y-%m-%d"))
    }
}
