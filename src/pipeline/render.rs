//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and blocks for the whole render. The work runs on Tokio's blocking
//! pool so async worker threads stay free.
//!
//! ## Scale, then cap
//!
//! Pages are rendered at a fixed scale factor (2.0 by default) relative to
//! their natural size. `max_rendered_pixels` is a second, independent bound
//! on either edge so an oversized page cannot exhaust memory.

use crate::error::DocumentError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Render options derived from [`crate::config::ExtractionConfig`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub scale: f32,
    pub max_pixels: u32,
    pub password: Option<String>,
}

/// Rasterise every page of an in-memory PDF, in page order.
pub async fn render_pdf(
    bytes: Vec<u8>,
    options: RenderOptions,
) -> Result<Vec<DynamicImage>, DocumentError> {
    tokio::task::spawn_blocking(move || render_pdf_blocking(&bytes, &options))
        .await
        .map_err(|e| DocumentError::RenderFailed {
            detail: format!("render task panicked: {e}"),
        })?
}

/// Saturating conversion of the pixel cap to pdfium's signed bound.
fn pixel_limit(px: u32) -> i32 {
    i32::try_from(px).unwrap_or(i32::MAX)
}

/// Bind to a pdfium library.
///
/// `PDFIUM_LIB_PATH` (a path to the library file) wins; otherwise a library
/// next to the executable's working directory, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, DocumentError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| DocumentError::RenderFailed {
        detail: format!(
            "pdfium library unavailable ({e:?}); set PDFIUM_LIB_PATH=/path/to/libpdfium"
        ),
    })?;
    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of page rendering.
fn render_pdf_blocking(
    bytes: &[u8],
    options: &RenderOptions,
) -> Result<Vec<DynamicImage>, DocumentError> {
    let pdfium = bind_pdfium()?;

    let password = options.password.as_deref();
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| {
            let err_str = format!("{e:?}");
            let detail = if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    "wrong password".to_string()
                } else {
                    "document is encrypted and requires a password".to_string()
                }
            } else {
                format!("corrupt PDF: {err_str}")
            };
            DocumentError::RenderFailed { detail }
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);
    if total_pages == 0 {
        return Err(DocumentError::RenderFailed {
            detail: "document has no pages".into(),
        });
    }

    let max_side = pixel_limit(options.max_pixels);
    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(options.scale)
        .set_maximum_width(max_side)
        .set_maximum_height(max_side);

    let mut images = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| DocumentError::RenderFailed {
                detail: format!("page {}: {e:?}", idx + 1),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    Ok(images)
}
