//! Core type definitions shared between sources, the transform pipeline, and
//! the acquisition layer.
//!
//! Enums serialize in lowercase so they read naturally in TOML config files.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Geometric flip applied before any other transform stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlipMode {
    /// Leave the raster as-is.
    #[default]
    None,
    /// Mirror left to right.
    Horizontal,
    /// Mirror top to bottom.
    Vertical,
    /// Both mirrors, equivalent to a 180 degree rotation.
    Both,
}

impl FlipMode {
    /// Whether this mode changes the raster at all.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for FlipMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Horizontal => write!(f, "horizontal"),
            Self::Vertical => write!(f, "vertical"),
            Self::Both => write!(f, "both"),
        }
    }
}

impl std::str::FromStr for FlipMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "horizontal" => Ok(Self::Horizontal),
            "vertical" => Ok(Self::Vertical),
            "both" => Ok(Self::Both),
            _ => Err(format!("Invalid flip mode: {}", s)),
        }
    }
}

/// The renditions a source offers for one image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrls {
    /// Full-size original.
    pub original: String,
    /// Pre-sized smaller rendition, when the source has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regular: Option<String>,
}

impl ImageUrls {
    /// Whether the source supplied a pre-sized "regular" variant.
    pub fn has_regular(&self) -> bool {
        self.regular.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// Provider-reported metadata for one work, normalized across sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralImageData {
    /// Source-specific identifier (Pixiv pid, booru post id, ...).
    pub id: String,
    /// Title, empty when the source has none.
    pub title: String,
    /// Artist or uploader.
    pub author: String,
    /// Whether the source flags the work as adult-only.
    pub r18: bool,
    /// Tags as reported by the source.
    pub tags: Vec<String>,
    /// File extension of the original, without the dot.
    pub extension: String,
    /// Source's AI-generation marker (0 = unknown / not AI).
    pub ai_type: u8,
    /// Upload time in milliseconds since the Unix epoch, 0 when unknown.
    pub upload_date: i64,
    /// Known renditions.
    pub urls: ImageUrls,
}

/// What a provider returns for one request: the URL to download plus the
/// metadata describing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// The rendition chosen for download.
    pub url: String,
    /// All renditions the source offered.
    pub urls: ImageUrls,
    /// Normalized metadata.
    pub raw: GeneralImageData,
}

/// Extension of a URL path (lowercased, query string stripped).
pub fn url_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_mode_serialization() {
        let json = serde_json::to_string(&FlipMode::Horizontal).unwrap();
        assert_eq!(json, r#""horizontal""#);

        let mode: FlipMode = serde_json::from_str(r#""both""#).unwrap();
        assert_eq!(mode, FlipMode::Both);
    }

    #[test]
    fn test_flip_mode_from_str() {
        assert_eq!("none".parse::<FlipMode>().unwrap(), FlipMode::None);
        assert_eq!("vertical".parse::<FlipMode>().unwrap(), FlipMode::Vertical);
        assert!("sideways".parse::<FlipMode>().is_err());
    }

    #[test]
    fn test_flip_mode_active() {
        assert!(!FlipMode::None.is_active());
        assert!(FlipMode::Both.is_active());
        assert_eq!(FlipMode::default(), FlipMode::None);
    }

    #[test]
    fn test_has_regular() {
        let mut urls = ImageUrls {
            original: "https://example.com/a.png".into(),
            regular: None,
        };
        assert!(!urls.has_regular());
        urls.regular = Some(String::new());
        assert!(!urls.has_regular());
        urls.regular = Some("https://example.com/a_small.jpg".into());
        assert!(urls.has_regular());
    }

    #[test]
    fn test_url_extension() {
        assert_eq!(url_extension("https://i.pximg.net/img/1_p0.PNG"), "png");
        assert_eq!(
            url_extension("https://safebooru.org/images/1/abc.jpg?123"),
            "jpg"
        );
        assert_eq!(url_extension("https://example.com/noext"), "");
    }
}
