use crate::{
    error::{MagicError, Result},
    models::NormalizedSize,
};

pub const DEFAULT_SIZE: &str = "2048x2048";

pub const MIN_SIDE_EXCLUSIVE: u64 = 14;
pub const MIN_PIXELS: u64 = 3_686_400;
pub const MAX_PIXELS: u64 = 16_777_216;
pub const MAX_RATIO: f64 = 16.0;

/// Preset labels understood by the Ark service. The table is part of the
/// service contract, so labels are looked up verbatim and never parsed.
const PRESETS: &[(&str, &str)] = &[
    ("1K", "2048x2048"),
    ("2K", "2048x2048"),
    ("3K", "3072x3072"),
    ("4K", "4096x4096"),
];

/// Map a user supplied size token to a canonical `WxH`.
///
/// `None` and the empty string fall back to [`DEFAULT_SIZE`].
pub fn normalize(raw: Option<&str>) -> Result<NormalizedSize> {
    let raw = match raw {
        None | Some("") => return Ok(NormalizedSize(DEFAULT_SIZE.to_string())),
        Some(raw) => raw,
    };

    if let Some((_, canonical)) = PRESETS.iter().find(|(label, _)| *label == raw) {
        return Ok(NormalizedSize((*canonical).to_string()));
    }

    if validate_pixel_size(raw) {
        return Ok(NormalizedSize(raw.to_string()));
    }

    Err(MagicError::InvalidSize(raw.to_string()))
}

/// True when `size` is an explicit `WxH` the service will accept.
pub fn validate_pixel_size(size: &str) -> bool {
    let (w, h) = match parse_dimensions(size) {
        Some(dims) => dims,
        None => return false,
    };

    if !(w > MIN_SIDE_EXCLUSIVE && h > MIN_SIDE_EXCLUSIVE) {
        return false;
    }

    let pixels = w * h;
    if !(MIN_PIXELS..=MAX_PIXELS).contains(&pixels) {
        return false;
    }

    let ratio = w as f64 / h as f64;
    ratio >= 1.0 / MAX_RATIO && ratio <= MAX_RATIO
}

// Two groups of 2-5 ASCII digits joined by a lowercase `x`.
fn parse_dimensions(size: &str) -> Option<(u64, u64)> {
    let (w, h) = size.split_once('x')?;
    Some((parse_group(w)?, parse_group(h)?))
}

fn parse_group(group: &str) -> Option<u64> {
    if !(2..=5).contains(&group.len()) || !group.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    group.parse().ok()
}
