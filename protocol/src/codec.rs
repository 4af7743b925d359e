//! Base64 transcoding shared by every layer.
//!
//! Envelope fields travel as standard padded base64 (what `btoa` produces in a browser).
//! Key tokens travel as unpadded base64url so they can sit in a URL fragment
//! without escaping. The url-safe decoder also accepts padded input.

use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    prelude::BASE64_STANDARD,
};

pub use base64::DecodeError;

const URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[must_use]
#[inline]
pub fn to_base64(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

#[inline]
pub fn from_base64(text: &str) -> Result<Vec<u8>, DecodeError> {
    BASE64_STANDARD.decode(text)
}

/// Encodes with the `-`/`_` alphabet and strips padding.
#[must_use]
#[inline]
pub fn to_base64_url(bytes: &[u8]) -> String {
    URL_SAFE.encode(bytes)
}

#[inline]
pub fn from_base64_url(text: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE.decode(text)
}
