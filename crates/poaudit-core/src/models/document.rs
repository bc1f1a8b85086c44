//! Source documents submitted for extraction.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifier of a source document, unique within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Declared media type of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Pdf,
    Png,
    Jpeg,
    Tiff,
    Webp,
    /// A recognition payload that was already produced elsewhere.
    Json,
    /// Anything else, kept verbatim for error reporting.
    Other(String),
}

impl MediaType {
    /// Parse a MIME type string.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_lowercase();
        let essence = mime.split(';').next().unwrap_or("").trim();

        match essence {
            "application/pdf" => MediaType::Pdf,
            "image/png" => MediaType::Png,
            "image/jpeg" | "image/jpg" => MediaType::Jpeg,
            "image/tiff" => MediaType::Tiff,
            "image/webp" => MediaType::Webp,
            "application/json" | "text/json" => MediaType::Json,
            other => MediaType::Other(other.to_string()),
        }
    }

    /// Map a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim().to_lowercase().as_str() {
            "pdf" => MediaType::Pdf,
            "png" => MediaType::Png,
            "jpg" | "jpeg" => MediaType::Jpeg,
            "tif" | "tiff" => MediaType::Tiff,
            "webp" => MediaType::Webp,
            "json" => MediaType::Json,
            other => MediaType::Other(other.to_string()),
        }
    }

    /// Guess the media type from magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF-") {
            return Some(MediaType::Pdf);
        }

        if let Ok(format) = image::guess_format(bytes) {
            return match format {
                image::ImageFormat::Png => Some(MediaType::Png),
                image::ImageFormat::Jpeg => Some(MediaType::Jpeg),
                image::ImageFormat::Tiff => Some(MediaType::Tiff),
                image::ImageFormat::WebP => Some(MediaType::Webp),
                _ => None,
            };
        }

        let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
        match first {
            Some(b'{') | Some(b'[') => Some(MediaType::Json),
            _ => None,
        }
    }

    pub fn as_mime(&self) -> &str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Tiff => "image/tiff",
            MediaType::Webp => "image/webp",
            MediaType::Json => "application/json",
            MediaType::Other(s) => s,
        }
    }

    /// Whether documents of this type can be handed to recognition at all.
    pub fn is_supported(&self) -> bool {
        !matches!(self, MediaType::Other(_))
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}

/// An ingested document. Immutable once created.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    id: DocumentId,
    name: String,
    media_type: MediaType,
    bytes: Arc<[u8]>,
}

impl SourceDocument {
    pub fn new(
        id: impl Into<DocumentId>,
        name: impl Into<String>,
        media_type: MediaType,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            media_type,
            bytes: Arc::from(bytes.into()),
        }
    }

    /// Load a document from disk. The id is the path as given; the media
    /// type comes from the extension, falling back to content sniffing.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;

        let by_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(MediaType::from_extension);

        let media_type = match by_extension {
            Some(mt) if mt.is_supported() => mt,
            other => MediaType::sniff(&bytes)
                .or(other)
                .unwrap_or_else(|| MediaType::Other("application/octet-stream".to_string())),
        };

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();

        Ok(Self::new(
            path.display().to_string(),
            name,
            media_type,
            bytes,
        ))
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_from_mime() {
        assert_eq!(MediaType::from_mime("application/pdf"), MediaType::Pdf);
        assert_eq!(MediaType::from_mime("IMAGE/JPEG"), MediaType::Jpeg);
        assert_eq!(
            MediaType::from_mime("application/json; charset=utf-8"),
            MediaType::Json
        );
        assert!(!MediaType::from_mime("text/plain").is_supported());
    }

    #[test]
    fn test_media_type_sniff() {
        assert_eq!(MediaType::sniff(b"%PDF-1.7\n..."), Some(MediaType::Pdf));
        assert_eq!(
            MediaType::sniff(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"),
            Some(MediaType::Png)
        );
        assert_eq!(MediaType::sniff(b"  {\"items\": []}"), Some(MediaType::Json));
        assert_eq!(MediaType::sniff(b"hello"), None);
    }

    #[test]
    fn test_from_path_uses_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("po-7.json");
        std::fs::write(&path, b"{\"items\": []}").unwrap();

        let doc = SourceDocument::from_path(&path).unwrap();
        assert_eq!(doc.name(), "po-7.json");
        assert_eq!(doc.media_type(), &MediaType::Json);
        assert_eq!(doc.bytes(), b"{\"items\": []}");
    }

    #[test]
    fn test_from_path_sniffs_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.bin");
        std::fs::write(&path, b"%PDF-1.4 body").unwrap();

        let doc = SourceDocument::from_path(&path).unwrap();
        assert_eq!(doc.media_type(), &MediaType::Pdf);
    }
}
