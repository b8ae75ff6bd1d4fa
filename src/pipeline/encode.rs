//! Frame encoding: rendered pages → JPEG frames, frames → base64 `ImageData`.
//!
//! Rendered PDF pages are re-encoded as JPEG regardless of how the page was
//! produced, so every frame of a paginated document has the same type and a
//! predictable size. Statement pages are mostly flat text on white, where
//! quality 92 keeps glyph edges clean at a fraction of the PNG size.

use crate::media::MIME_JPEG;
use crate::pipeline::rasterize::Frame;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// Encode a rendered page as a JPEG frame.
///
/// JPEG has no alpha channel, so the page is flattened to RGB first.
pub fn encode_jpeg_frame(img: &DynamicImage, quality: u8) -> Result<Frame, image::ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(&rgb)?;
    debug!(
        "Encoded {}x{} page → {} bytes JPEG",
        rgb.width(),
        rgb.height(),
        buf.len()
    );
    Ok(Frame::new(MIME_JPEG, buf))
}

/// Wrap a frame as base64 image data for a multimodal chat message.
///
/// `detail: "high"` keeps fine print readable on providers that tile images.
pub fn to_image_data(frame: &Frame) -> ImageData {
    ImageData::new(STANDARD.encode(&frame.data), frame.mime_type.as_str()).with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn page(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn rgba_page_becomes_jpeg() {
        let frame = encode_jpeg_frame(&page(16, 24), 92).expect("encode should succeed");
        assert_eq!(frame.mime_type, "image/jpeg");
        assert_eq!(&frame.data[..3], &[0xFF, 0xD8, 0xFF]);

        let decoded = image::load_from_memory(&frame.data).expect("valid jpeg");
        assert_eq!((decoded.width(), decoded.height()), (16, 24));
    }

    #[test]
    fn image_data_is_base64_of_frame() {
        let frame = Frame::new("image/png", vec![1, 2, 3, 4]);
        let data = to_image_data(&frame);
        assert_eq!(data.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&data.data).unwrap(), vec![1, 2, 3, 4]);
    }
}
