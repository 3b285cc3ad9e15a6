//! Image Compressor Module
//!
//! Re-encodes images before they enter the cache. Compression is a
//! best-effort optimization: any failure hands back the original payload.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, warn};

/// Quality at or above which the lossless, larger-cap mode is used.
pub const HIGH_FIDELITY_THRESHOLD: f32 = 0.95;

const STANDARD_CAP: (u32, u32) = (1600, 1200);
const HIGH_FIDELITY_CAP: (u32, u32) = (2048, 1536);

// == Compressed ==
/// Result of a successful re-encode.
#[derive(Debug, Clone)]
pub struct Compressed {
    /// `data:` URL of the re-encoded image
    pub data_url: String,
    pub width: u32,
    pub height: u32,
}

/// Clamps a caller-supplied quality into `[0.1, 1.0]`.
pub fn clamp_quality(quality: f32) -> f32 {
    if quality.is_nan() {
        return 1.0;
    }
    quality.clamp(0.1, 1.0)
}

/// Target dimensions for an image of `width` x `height` at `quality`.
///
/// A single ratio is applied to both axes so the aspect ratio is kept.
pub fn target_dimensions(width: u32, height: u32, quality: f32) -> (u32, u32) {
    let (max_w, max_h) = if quality >= HIGH_FIDELITY_THRESHOLD {
        HIGH_FIDELITY_CAP
    } else {
        STANDARD_CAP
    };

    if width <= max_w && height <= max_h {
        return (width, height);
    }

    let ratio = f64::min(
        f64::from(max_w) / f64::from(width),
        f64::from(max_h) / f64::from(height),
    );
    let w = ((f64::from(width) * ratio) as u32).max(1);
    let h = ((f64::from(height) * ratio) as u32).max(1);
    (w, h)
}

/// Extracts the raw image bytes from a `data:` URL or a bare base64 string.
pub fn decode_payload(payload: &str) -> Option<Vec<u8>> {
    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest.split_once(',')?;
            if !meta.ends_with(";base64") {
                return None;
            }
            data
        }
        None if payload.starts_with("http://") || payload.starts_with("https://") => {
            return None;
        }
        None => payload,
    };
    BASE64.decode(encoded.trim()).ok()
}

fn reencode(payload: &str, quality: f32) -> Result<Compressed, String> {
    let bytes = decode_payload(payload).ok_or_else(|| "payload is not inline image data".to_string())?;
    let img = image::load_from_memory(&bytes).map_err(|e| e.to_string())?;

    let (width, height) = target_dimensions(img.width(), img.height(), quality);
    let resized = if (width, height) != (img.width(), img.height()) {
        img.resize_exact(width, height, FilterType::Lanczos3)
    } else {
        img
    };

    let mut out = Cursor::new(Vec::new());
    let mime = if quality >= HIGH_FIDELITY_THRESHOLD {
        resized
            .write_with_encoder(PngEncoder::new(&mut out))
            .map_err(|e| e.to_string())?;
        "image/png"
    } else {
        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
        let q = (quality * 100.0).round() as u8;
        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, q))
            .map_err(|e| e.to_string())?;
        "image/jpeg"
    };

    Ok(Compressed {
        data_url: format!("data:{};base64,{}", mime, BASE64.encode(out.into_inner())),
        width,
        height,
    })
}

// == Compress ==
/// Re-encodes `payload` at `quality`, returning a `data:` URL.
///
/// Decode or encode failures return the original payload unchanged.
pub fn compress(payload: &str, quality: f32) -> String {
    let quality = clamp_quality(quality);
    match reencode(payload, quality) {
        Ok(compressed) => {
            debug!(
                "Image compressed: {} -> {} bytes, quality: {}, {}x{}",
                payload.len(),
                compressed.data_url.len(),
                quality,
                compressed.width,
                compressed.height
            );
            compressed.data_url
        }
        Err(reason) => {
            warn!("Image compression failed, using original: {}", reason);
            payload.to_string()
        }
    }
}

/// Runs [`compress`] on the blocking thread pool.
pub async fn compress_async(payload: String, quality: f32) -> String {
    let fallback = payload.clone();
    match tokio::task::spawn_blocking(move || compress(&payload, quality)).await {
        Ok(compressed) => compressed,
        Err(e) => {
            warn!("Compression task failed: {}", e);
            fallback
        }
    }
}
