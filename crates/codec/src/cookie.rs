//! Text forms of a session blob.
//!
//! Blobs travel as URL-safe base64 inside cookies and headers. A session
//! cookie value has the shape `<base64 blob>|<timestamp>|<signature>`; only
//! the first segment is the blob this crate decodes. The timestamp and
//! signature belong to the cookie layer and are not checked here.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use thiserror::Error;

/// Cookie name used by the session layer unless configured otherwise.
pub const DEFAULT_COOKIE_NAME: &str = "_oauth2_proxy";

/// Errors turning text into blob bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CookieError {
    /// The `Cookie` header has no cookie with the requested name.
    #[error("cookie {0:?} not found")]
    MissingCookie(String),

    /// The text is not valid URL-safe base64.
    #[error("invalid base64: {0}")]
    InvalidBase64(String),
}

/// Encode blob bytes as unpadded URL-safe base64.
pub fn encode_text(blob: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(blob)
}

/// Decode URL-safe base64 text, with or without `=` padding.
///
/// # Errors
///
/// Returns [`CookieError::InvalidBase64`] if the text is not URL-safe base64.
pub fn decode_text(text: &str) -> Result<Vec<u8>, CookieError> {
    let trimmed = text.trim().trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .map_err(|e| CookieError::InvalidBase64(e.to_string()))
}

/// Return the blob segment of cookie `name` from a `Cookie` request header.
///
/// The header may carry several `name=value` pairs separated by `;`.
///
/// # Errors
///
/// Returns [`CookieError::MissingCookie`] if no pair has the given name.
pub fn extract_cookie_value<'a>(header: &'a str, name: &str) -> Result<&'a str, CookieError> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.split_once('|').map_or(value, |(blob, _)| blob))
        .ok_or_else(|| CookieError::MissingCookie(name.to_owned()))
}
