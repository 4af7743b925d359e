//! Size bounds enforced on both sides of the wire.

use {
    crate::EncryptedEnvelope,
    anyhow::{Result, ensure},
    std::ops::RangeInclusive,
};

/// Max length of the base64 ciphertext text accepted by the server.
pub const MAX_CIPHERTEXT_LEN: usize = 4_000_000;

/// Allowed length of the base64 nonce text. A 12-byte nonce encodes to 16 chars.
pub const NONCE_TEXT_LEN: RangeInclusive<usize> = 16..=24;

/// Max size of a request body the server is willing to read.
pub const MAX_REQUEST_BODY: usize = MAX_CIPHERTEXT_LEN + 1024;

#[inline]
pub fn check_envelope(envelope: &EncryptedEnvelope) -> Result<()> {
    ensure!(!envelope.ciphertext.is_empty(), "ciphertext cannot be empty");
    ensure!(
        envelope.ciphertext.len() <= MAX_CIPHERTEXT_LEN,
        "ciphertext is too large; got {} chars, max {MAX_CIPHERTEXT_LEN}",
        envelope.ciphertext.len(),
    );
    ensure!(
        NONCE_TEXT_LEN.contains(&envelope.nonce.len()),
        "invalid nonce length; got {} chars, expected {}..={}",
        envelope.nonce.len(),
        NONCE_TEXT_LEN.start(),
        NONCE_TEXT_LEN.end(),
    );
    Ok(())
}
