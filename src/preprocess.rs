//! Local image preparation before anything is sent to the Ark service.
//!
//! Photos are bounded to a safe resolution, flattened onto white and
//! re-encoded as JPEG data URLs, lowering quality until the payload fits.

use crate::error::{MagicError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{codecs::jpeg::JpegEncoder, imageops, DynamicImage, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// Longest side after scaling; well under the service's 6000px hard limit.
pub const MAX_DIMENSION: u32 = 4096;
/// The service needs sides strictly greater than 14px.
pub const MIN_DIMENSION: u32 = 15;
pub const INITIAL_QUALITY: u8 = 80;
pub const QUALITY_STEP: u8 = 10;
pub const MIN_QUALITY: u8 = 10;
/// ~10MB of JPEG once base64 inflation (~33%) is accounted for.
pub const MAX_DATA_URL_LEN: usize = 13_000_000;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Clone)]
pub struct PrepareOptions {
    pub max_dimension: u32,
    pub min_dimension: u32,
    pub initial_quality: u8,
    pub quality_step: u8,
    pub min_quality: u8,
    pub max_data_url_len: usize,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            min_dimension: MIN_DIMENSION,
            initial_quality: INITIAL_QUALITY,
            quality_step: QUALITY_STEP,
            min_quality: MIN_QUALITY,
            max_data_url_len: MAX_DATA_URL_LEN,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

/// Prepare raw image bytes with the default limits and return the data URL.
pub fn prepare(bytes: &[u8]) -> Result<String> {
    prepare_with_options(bytes, &PrepareOptions::default()).map(|p| p.data_url)
}

pub fn prepare_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| MagicError::ImageLoad(format!("{}: {}", path.display(), e)))?;
    prepare(&bytes)
}

pub fn prepare_with_options(bytes: &[u8], options: &PrepareOptions) -> Result<PreparedImage> {
    let source =
        image::load_from_memory(bytes).map_err(|e| MagicError::ImageLoad(e.to_string()))?;

    let (width, height) = target_dimensions(source.width(), source.height(), options);
    log::debug!(
        "Preparing image {}x{} -> {}x{}",
        source.width(),
        source.height(),
        width,
        height
    );

    let flattened = flatten_on_white(&source, width, height)?;

    let mut quality = options.initial_quality;
    let mut data_url = encode_data_url(&flattened, quality)?;
    while data_url.len() > options.max_data_url_len && quality > options.min_quality {
        quality = quality
            .saturating_sub(options.quality_step)
            .max(options.min_quality);
        data_url = encode_data_url(&flattened, quality)?;
    }

    if data_url.len() > options.max_data_url_len {
        log::warn!(
            "Prepared image still {} bytes at quality {}, sending anyway",
            data_url.len(),
            quality
        );
    }

    Ok(PreparedImage {
        data_url,
        width,
        height,
        quality,
    })
}

/// Scale so the longer side fits the ceiling, then lift each side to the floor.
pub fn target_dimensions(width: u32, height: u32, options: &PrepareOptions) -> (u32, u32) {
    let (mut w, mut h) = (width, height);
    let max = options.max_dimension;

    if w > max || h > max {
        let ratio = width as f64 / height as f64;
        if w > h {
            w = max;
            h = (max as f64 / ratio).round() as u32;
        } else {
            h = max;
            w = (max as f64 * ratio).round() as u32;
        }
    }

    (w.max(options.min_dimension), h.max(options.min_dimension))
}

// The service handles transparent regions unpredictably, so alpha is
// composited over an opaque white canvas.
fn flatten_on_white(source: &DynamicImage, width: u32, height: u32) -> Result<DynamicImage> {
    let mut canvas = white_canvas(width, height)?;

    let resized = source.resize_exact(width, height, imageops::FilterType::Lanczos3);
    imageops::overlay(&mut canvas, &resized.to_rgba8(), 0, 0);

    Ok(DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8()))
}

/// Opaque white RGBA surface; a size that cannot be allocated is reported
/// instead of aborting.
fn white_canvas(width: u32, height: u32) -> Result<RgbaImage> {
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(4))
        .ok_or(MagicError::NoRenderingContext)?;

    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| MagicError::NoRenderingContext)?;
    buffer.resize(len, 255u8);

    RgbaImage::from_raw(width, height, buffer).ok_or(MagicError::NoRenderingContext)
}

fn encode_data_url(img: &DynamicImage, quality: u8) -> Result<String> {
    let mut output = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut output, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| MagicError::ImageLoad(format!("jpeg encode failed: {}", e)))?;

    let encoded = STANDARD.encode(output.into_inner());
    let mut data_url = String::with_capacity(DATA_URL_PREFIX.len() + encoded.len());
    data_url.push_str(DATA_URL_PREFIX);
    data_url.push_str(&encoded);
    Ok(data_url)
}

/// Split a `data:<mime>;base64,<payload>` URL and decode the payload.
pub fn decode_data_url(data_url: &str) -> Option<Vec<u8>> {
    let rest = data_url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    if !meta.ends_with(";base64") {
        return None;
    }
    STANDARD.decode(payload).ok()
}
