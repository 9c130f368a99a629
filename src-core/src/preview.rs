//! Canvas preview generation.
//!
//! Scales the current canvas contents down and encodes them as a JPEG
//! data URI for UI preview hand-off.

use crate::surface::CanvasSurface;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageBuffer, Rgba};

/// Maximum preview width in pixels.
pub const PREVIEW_MAX_WIDTH: u32 = 480;

/// Maximum preview height in pixels.
pub const PREVIEW_MAX_HEIGHT: u32 = 270;

/// JPEG quality for previews (0-100).
const JPEG_QUALITY: u8 = 75;

/// Encode the canvas as a bounded-size JPEG data URI.
pub fn canvas_preview_data_uri(surface: &CanvasSurface) -> Result<String, String> {
    let geometry = surface.geometry();
    let data = surface.pixels();
    if data.len() < (geometry.width * geometry.height * 4) as usize {
        return Err(format!(
            "Buffer too small: expected {} bytes, got {}",
            geometry.width * geometry.height * 4,
            data.len()
        ));
    }

    // Convert BGRA to RGBA (swap B and R channels)
    let mut rgba_data = Vec::with_capacity(data.len());
    for px in data.chunks_exact(4) {
        rgba_data.push(px[2]);
        rgba_data.push(px[1]);
        rgba_data.push(px[0]);
        rgba_data.push(px[3]);
    }

    let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_raw(geometry.width, geometry.height, rgba_data)
            .ok_or_else(|| "Failed to create image buffer".to_string())?;

    let (scaled_width, scaled_height) = scaled_dimensions(
        geometry.width,
        geometry.height,
        PREVIEW_MAX_WIDTH,
        PREVIEW_MAX_HEIGHT,
    );

    let resized = image::imageops::resize(
        &img,
        scaled_width,
        scaled_height,
        image::imageops::FilterType::Triangle,
    );
    let rgb_img = image::DynamicImage::ImageRgba8(resized).to_rgb8();

    let mut jpeg_bytes: Vec<u8> = Vec::new();
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg_bytes, JPEG_QUALITY);
    encoder
        .encode_image(&rgb_img)
        .map_err(|e| format!("JPEG encoding failed: {}", e))?;

    Ok(format!(
        "data:image/jpeg;base64,{}",
        STANDARD.encode(&jpeg_bytes)
    ))
}

/// Scale dimensions to fit within a bounding box, preserving aspect
/// ratio. Never upscales.
fn scaled_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let width_ratio = max_width as f64 / width as f64;
    let height_ratio = max_height as f64 / height as f64;
    let ratio = width_ratio.min(height_ratio);
    (
        ((width as f64 * ratio) as u32).max(1),
        ((height as f64 * ratio) as u32).max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::CanvasGeometry;

    #[test]
    fn preview_is_a_jpeg_data_uri() {
        let surface = CanvasSurface::new(CanvasGeometry::new(64, 64));
        let uri = canvas_preview_data_uri(&surface).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        assert!(uri.len() > "data:image/jpeg;base64,".len());
    }

    #[test]
    fn scaling_preserves_aspect_ratio_and_never_upscales() {
        assert_eq!(scaled_dimensions(100, 50, 480, 270), (100, 50));
        assert_eq!(scaled_dimensions(960, 540, 480, 270), (480, 270));
        assert_eq!(scaled_dimensions(1920, 540, 480, 270), (480, 135));
    }
}
