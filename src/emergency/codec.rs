//! Past-medical-history token codec.
//!
//! Text is taken as UTF-8 bytes, base64-encoded with the standard alphabet,
//! then percent-encoded so `+`, `/` and `=` survive inside a query string.
//! Decoding reverses the same three steps.

use base64::Engine as _;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Token is not valid percent-encoded UTF-8")]
    Percent,

    #[error("Token is not valid base64: {0}")]
    Base64(String),

    #[error("Decoded history is not valid UTF-8")]
    Utf8,
}

/// Encode free text into a query-safe token.
pub fn encode_history(text: &str) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
    utf8_percent_encode(&b64, NON_ALPHANUMERIC).to_string()
}

/// Decode a token back into the original text.
///
/// Accepts the token as it appears in a URL (percent-encoded) or already
/// unescaped. Form-style decoders turn a raw `+` into a space; the base64
/// alphabet has no spaces, so spaces are mapped back before trimming.
pub fn decode_history(token: &str) -> Result<String, DecodeError> {
    let unescaped = percent_decode_str(token)
        .decode_utf8()
        .map_err(|_| DecodeError::Percent)?;
    let b64 = unescaped.replace(' ', "+");

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim().as_bytes())
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    String::from_utf8(bytes).map_err(|_| DecodeError::Utf8)
}
