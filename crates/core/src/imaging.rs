//! Image inspection, resizing and OG card composition.
//!
//! Everything here works on in-memory byte buffers; callers fetch and store
//! the bytes through an object store.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};

use crate::error::CoreError;

/// Default upload size limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Smallest accepted edge of an uploaded photo.
pub const MIN_UPLOAD_EDGE: u32 = 128;

/// Largest accepted edge of an uploaded photo.
pub const MAX_UPLOAD_EDGE: u32 = 8192;

/// Longest edge of the medium rendition.
pub const MEDIUM_EDGE: u32 = 768;

/// Longest edge of the thumbnail rendition.
pub const THUMBNAIL_EDGE: u32 = 256;

/// JPEG quality for renditions.
pub const JPEG_QUALITY: u8 = 85;

/// Open Graph card size.
pub const OG_WIDTH: u32 = 1200;
pub const OG_HEIGHT: u32 = 630;

const OG_PANEL: u32 = 560;
const OG_BACKGROUND: Rgba<u8> = Rgba([24, 24, 27, 255]);

/// Format and size of an inspected image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMeta {
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
}

/// MIME type for the formats this service accepts.
fn accepted_mime(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

/// Sniff the format of `bytes` and read its dimensions without decoding
/// the pixel data.
pub fn inspect(bytes: &[u8]) -> Result<ImageMeta, CoreError> {
    let format = image::guess_format(bytes)
        .map_err(|_| CoreError::Validation("Unsupported image: unrecognised format".into()))?;
    let mime = accepted_mime(format).ok_or_else(|| {
        CoreError::Validation(format!(
            "Unsupported image format {format:?}. Upload a JPEG, PNG or WebP photo"
        ))
    })?;

    let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| CoreError::Validation(format!("Invalid image: {e}")))?;

    Ok(ImageMeta {
        mime,
        width,
        height,
    })
}

/// Validate an uploaded photo's size, format and dimensions.
pub fn validate_upload(bytes: &[u8], max_bytes: usize) -> Result<ImageMeta, CoreError> {
    if bytes.is_empty() {
        return Err(CoreError::Validation("Uploaded file is empty".into()));
    }
    if bytes.len() > max_bytes {
        return Err(CoreError::Validation(format!(
            "File too large: {} bytes (limit {max_bytes})",
            bytes.len()
        )));
    }

    let meta = inspect(bytes)?;
    let shortest = meta.width.min(meta.height);
    let longest = meta.width.max(meta.height);
    if shortest < MIN_UPLOAD_EDGE {
        return Err(CoreError::Validation(format!(
            "Image too small: {}x{} (minimum edge {MIN_UPLOAD_EDGE}px)",
            meta.width, meta.height
        )));
    }
    if longest > MAX_UPLOAD_EDGE {
        return Err(CoreError::Validation(format!(
            "Image too large: {}x{} (maximum edge {MAX_UPLOAD_EDGE}px)",
            meta.width, meta.height
        )));
    }
    Ok(meta)
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, CoreError> {
    image::load_from_memory(bytes).map_err(|e| CoreError::Validation(format!("Invalid image: {e}")))
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, CoreError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| CoreError::Internal(format!("JPEG encoding failed: {e}")))?;
    Ok(buf)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| CoreError::Internal(format!("PNG encoding failed: {e}")))?;
    Ok(buf)
}

/// Produce a JPEG whose longest edge is at most `max_edge`.
///
/// Smaller images are re-encoded without upscaling.
pub fn render_jpeg(bytes: &[u8], max_edge: u32) -> Result<Vec<u8>, CoreError> {
    let img = decode(bytes)?;
    let img = if img.width().max(img.height()) > max_edge {
        img.thumbnail(max_edge, max_edge)
    } else {
        img
    };
    encode_jpeg(&img)
}

/// Compose the 1200x630 social preview: the original photo on the left and
/// the generated character on the right, each letterboxed into its panel.
pub fn compose_og_image(original: &[u8], generated: &[u8]) -> Result<Vec<u8>, CoreError> {
    let original = decode(original)?;
    let generated = decode(generated)?;

    let mut canvas = RgbaImage::from_pixel(OG_WIDTH, OG_HEIGHT, OG_BACKGROUND);
    let margin_x = (OG_WIDTH - 2 * OG_PANEL) / 3;
    let margin_y = (OG_HEIGHT - OG_PANEL) / 2;

    for (slot, img) in [original, generated].into_iter().enumerate() {
        let panel = img.resize(OG_PANEL, OG_PANEL, FilterType::Lanczos3).to_rgba8();
        let slot_x = margin_x + slot as u32 * (OG_PANEL + margin_x);
        let x = slot_x + (OG_PANEL - panel.width()) / 2;
        let y = margin_y + (OG_PANEL - panel.height()) / 2;
        imageops::overlay(&mut canvas, &panel, i64::from(x), i64::from(y));
    }

    encode_png(&DynamicImage::ImageRgba8(canvas))
}
