//! Identity token generation.
//!
//! A pet's public code combines a millisecond timestamp (base36) with a short
//! random suffix, which keeps the collision probability negligible without
//! any coordination. The visual token is a QR code of the public lookup URL,
//! rendered as an SVG data URI so callers can persist or embed it directly.
//!
//! Everything here is pure computation; persistence belongs to the caller.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};
use rand::Rng;

use crate::error::{Error, Result};

/// Prefix stamped on every public code.
const CODE_PREFIX: &str = "PET";

/// Number of random characters appended after the timestamp component.
const RANDOM_SUFFIX_LEN: usize = 4;

/// Rendered token edge length in SVG units; large enough to stay scannable
/// when printed on a small tag.
const TOKEN_DIMENSIONS: u32 = 300;

/// Generate a fresh public code: `PET_{base36 millis}{random suffix}`.
///
/// Codes are uppercase, URL-safe and short enough to transcribe by hand.
pub fn issue_code<R: Rng>(rng: &mut R) -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let suffix: String = (0..RANDOM_SUFFIX_LEN)
        .map(|_| {
            let c = rng.sample(rand::distributions::Alphanumeric) as char;
            c.to_ascii_uppercase()
        })
        .collect();

    format!("{}_{}{}", CODE_PREFIX, to_base36(millis), suffix)
}

/// The canonical public lookup URL for a code.
pub fn lookup_url(base_url: &str, code: &str) -> String {
    format!("{}/pet/{}", base_url.trim_end_matches('/'), code)
}

/// Issue a new identity: a public code plus its visual token.
///
/// Fails with [`Error::Generation`] only if QR encoding fails. Uniqueness is
/// the persistence layer's to enforce; on a duplicate the caller retries with
/// a fresh draw from `rng`.
pub fn issue<R: Rng>(base_url: &str, rng: &mut R) -> Result<(String, String)> {
    let code = issue_code(rng);
    let token = regenerate(base_url, &code)?;
    Ok((code, token))
}

/// Rebuild the visual token for an existing code.
///
/// Deterministic for a fixed `(base_url, code)` pair and never touches the
/// code itself.
pub fn regenerate(base_url: &str, code: &str) -> Result<String> {
    let url = lookup_url(base_url, code);

    // Error-correction level H survives partial occlusion on a worn tag.
    let qr = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::H)
        .map_err(|e| Error::Generation(e.to_string()))?;

    let image = qr
        .render::<svg::Color>()
        .min_dimensions(TOKEN_DIMENSIONS, TOKEN_DIMENSIONS)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();

    Ok(format!("data:image/svg+xml;base64,{}", BASE64.encode(image)))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

    if value == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}
