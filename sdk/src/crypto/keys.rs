use {
    super::EntropySource,
    crate::error::Result,
    keepsake_protocol::{KEY_LENGTH, KeyToken, SymmetricKey},
    zeroize::Zeroize,
};

/// Draws a fresh 256-bit key from `entropy`.
#[inline]
pub fn generate_key(entropy: &dyn EntropySource) -> Result<SymmetricKey> {
    let mut bytes = [0_u8; KEY_LENGTH];
    entropy.fill(&mut bytes)?;
    let key = SymmetricKey::from_bytes(bytes);
    bytes.zeroize();
    Ok(key)
}

#[must_use]
#[inline]
pub fn export_key(key: &SymmetricKey) -> KeyToken {
    key.to_token()
}

/// Fails with [`Error::InvalidKeyFormat`](crate::Error::InvalidKeyFormat)
/// unless `token` decodes to exactly 32 bytes.
#[inline]
pub fn import_key(token: &KeyToken) -> Result<SymmetricKey> {
    Ok(SymmetricKey::from_token(token)?)
}
