//! Rasteriser: one input document → an ordered, non-empty sequence of frames.
//!
//! | Media kind | Frames |
//! |------------|--------|
//! | raster image | exactly one, bytes and MIME type unchanged |
//! | PDF | one JPEG per page, in page order, rendered at `render_scale` |
//! | anything else | `DocumentError::UnsupportedMedia` |

use crate::config::ExtractionConfig;
use crate::error::DocumentError;
use crate::media::{InputDocument, MediaKind};
use crate::pipeline::encode;
use crate::pipeline::render::{self, RenderOptions};
use image::DynamicImage;
use std::fmt;
use tracing::debug;

/// One raster image payload prepared for the Extraction Service.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Turn `document` into frames according to its declared media kind.
pub async fn rasterize(
    document: &InputDocument,
    config: &ExtractionConfig,
) -> Result<Vec<Frame>, DocumentError> {
    match document.kind() {
        Some(MediaKind::Image) => {
            if document.bytes.is_empty() {
                return Err(DocumentError::ReadFailed {
                    detail: format!("'{}' is empty", document.name),
                });
            }
            debug!("'{}': single image frame ({})", document.name, document.mime_type);
            Ok(vec![Frame::new(
                document.mime_type.clone(),
                document.bytes.clone(),
            )])
        }
        Some(MediaKind::Pdf) => {
            let options = RenderOptions {
                scale: config.render_scale,
                max_pixels: config.max_rendered_pixels,
                password: config.password.clone(),
            };
            let pages = render::render_pdf(document.bytes.clone(), options).await?;
            let frames = frames_from_pages(&pages, config.jpeg_quality)?;
            debug!("'{}': {} page frames", document.name, frames.len());
            Ok(frames)
        }
        None => Err(DocumentError::UnsupportedMedia {
            mime_type: document.mime_type.clone(),
        }),
    }
}

/// Encode rendered pages one-to-one into JPEG frames, preserving order.
pub fn frames_from_pages(
    pages: &[DynamicImage],
    quality: u8,
) -> Result<Vec<Frame>, DocumentError> {
    if pages.is_empty() {
        return Err(DocumentError::RenderFailed {
            detail: "document has no pages".into(),
        });
    }
    pages
        .iter()
        .enumerate()
        .map(|(idx, page)| {
            encode::encode_jpeg_frame(page, quality).map_err(|e| DocumentError::RenderFailed {
                detail: format!("page {}: JPEG encoding failed: {e}", idx + 1),
            })
        })
        .collect()
}
