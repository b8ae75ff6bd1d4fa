//! Input documents and their media kinds.
//!
//! A document is a byte buffer plus a declared MIME type. The MIME type alone
//! decides how the rasteriser treats it; the name is carried only for progress
//! reporting and error messages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_JPEG: &str = "image/jpeg";

/// Raster image encodings accepted as single-frame documents.
pub const SUPPORTED_IMAGE_TYPES: [&str; 8] = [
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/heic",
    "image/heif",
    "image/gif",
    "image/bmp",
    "image/tiff",
];

/// How the rasteriser handles a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    /// A photo or scan of one page, forwarded unchanged as one frame.
    Image,
    /// A paginated PDF, rendered page by page.
    Pdf,
}

impl MediaKind {
    /// Classify a MIME type; `None` means unsupported.
    ///
    /// Parameters (`; charset=…`) and case are ignored.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let essence = essence(mime_type);
        if essence == MIME_PDF {
            Some(MediaKind::Pdf)
        } else if SUPPORTED_IMAGE_TYPES.contains(&essence.as_str()) {
            Some(MediaKind::Image)
        } else {
            None
        }
    }
}

/// Lower-cased MIME type without parameters; `image/jpg` is folded into
/// `image/jpeg`.
pub fn essence(mime_type: &str) -> String {
    let base = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if base == "image/jpg" {
        MIME_JPEG.to_string()
    } else {
        base
    }
}

/// Detect a MIME type from leading magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF") {
        Some(MIME_PDF)
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(MIME_JPEG)
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if is_bmp_header(bytes) {
        Some("image/bmp")
    } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        Some("image/tiff")
    } else if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        match &bytes[8..12] {
            b"heic" | b"heix" => Some("image/heic"),
            b"mif1" | b"msf1" => Some("image/heif"),
            _ => None,
        }
    } else {
        None
    }
}

/// `BM` alone matches plain text, so the reserved bytes and the DIB header
/// size must also look like a real bitmap.
fn is_bmp_header(bytes: &[u8]) -> bool {
    if bytes.len() < 26 || !bytes.starts_with(b"BM") || bytes[6..10] != [0, 0, 0, 0] {
        return false;
    }
    let dib_size = u32::from_le_bytes([bytes[14], bytes[15], bytes[16], bytes[17]]);
    matches!(dib_size, 12 | 40 | 52 | 56 | 108 | 124)
}

/// Guess a MIME type from a file extension.
pub fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some(MIME_JPEG),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "txt" => Some("text/plain"),
        "csv" => Some("text/csv"),
        _ => None,
    }
}

/// One input document: bytes plus declared media type.
#[derive(Clone)]
pub struct InputDocument {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl InputDocument {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Build a document whose type is detected from its content.
    ///
    /// Falls back to `application/octet-stream`, which the rasteriser rejects.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mime = sniff_mime(&bytes).unwrap_or("application/octet-stream");
        Self::new(name, mime, bytes)
    }

    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_mime(&self.mime_type)
    }
}

impl fmt::Debug for InputDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputDocument")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}
