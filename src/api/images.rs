//! Image resource descriptions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An alias attached to an image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAlias {
    /// Alias name.
    #[serde(default)]
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

/// Description of an image as returned by the images endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Content fingerprint identifying the image.
    #[serde(default)]
    pub fingerprint: String,
    /// Whether the image may be fetched without authentication.
    #[serde(default)]
    pub public: bool,
    /// Original filename of the image tarball.
    #[serde(default)]
    pub filename: Option<String>,
    /// Image size in bytes.
    #[serde(default)]
    pub size: i64,
    /// CPU architecture the image targets.
    #[serde(default)]
    pub architecture: Option<String>,
    /// Aliases pointing at this image.
    #[serde(default)]
    pub aliases: Vec<ImageAlias>,
    /// Free-form image properties.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Upload timestamp as reported by the daemon.
    #[serde(default)]
    pub uploaded_at: Option<String>,
}

/// A named alias entry resolving to an image fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAliasesEntry {
    /// Alias name.
    #[serde(default)]
    pub name: String,
    /// The image fingerprint the alias points at.
    #[serde(default)]
    pub target: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}
