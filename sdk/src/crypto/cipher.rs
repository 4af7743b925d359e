use {
    super::EntropySource,
    crate::error::{Error, Result},
    aes_gcm::{
        Aes256Gcm, Key, KeyInit,
        aead::{self, Aead},
    },
    keepsake_protocol::{EncryptedEnvelope, NONCE_LENGTH, SymmetricKey, codec},
    std::fmt::{self, Debug},
    tracing::debug,
};

/// AES-256-GCM bound to a single page key.
pub struct Cipher {
    inner: Aes256Gcm,
}

impl Cipher {
    #[must_use]
    #[inline]
    pub fn new(key: &SymmetricKey) -> Self {
        Self {
            inner: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
        }
    }

    #[inline]
    pub fn encrypt_bytes(&self, nonce: &[u8; NONCE_LENGTH], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .encrypt(aead::Nonce::<Aes256Gcm>::from_slice(nonce), plaintext)
            .map_err(|_err| Error::Encryption)
    }

    #[inline]
    pub fn decrypt_bytes(&self, nonce: &[u8; NONCE_LENGTH], ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .decrypt(aead::Nonce::<Aes256Gcm>::from_slice(nonce), ciphertext)
            .map_err(|_err| Error::AuthenticationFailed)
    }

    /// Seals `plaintext` under a fresh random nonce.
    #[inline]
    pub fn encrypt(
        &self,
        entropy: &dyn EntropySource,
        plaintext: &[u8],
    ) -> Result<EncryptedEnvelope> {
        let mut nonce = [0_u8; NONCE_LENGTH];
        entropy.fill(&mut nonce)?;
        let ciphertext = self.encrypt_bytes(&nonce, plaintext)?;
        Ok(EncryptedEnvelope {
            ciphertext: codec::to_base64(&ciphertext),
            nonce: codec::to_base64(&nonce),
        })
    }

    /// Opens an envelope. Anything that does not authenticate, including a
    /// malformed envelope, is reported as [`Error::AuthenticationFailed`].
    #[inline]
    pub fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
        let nonce = codec::from_base64(&envelope.nonce)
            .ok()
            .and_then(|bytes| <[u8; NONCE_LENGTH]>::try_from(bytes).ok())
            .ok_or_else(|| {
                debug!("malformed envelope nonce");
                Error::AuthenticationFailed
            })?;
        let ciphertext = codec::from_base64(&envelope.ciphertext).map_err(|err| {
            debug!(%err, "malformed envelope ciphertext");
            Error::AuthenticationFailed
        })?;
        self.decrypt_bytes(&nonce, &ciphertext)
    }
}

impl Debug for Cipher {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

/// Encrypts `plaintext` under `key` with a nonce drawn from `entropy`.
#[inline]
pub fn encrypt(
    key: &SymmetricKey,
    entropy: &dyn EntropySource,
    plaintext: &[u8],
) -> Result<EncryptedEnvelope> {
    Cipher::new(key).encrypt(entropy, plaintext)
}

#[inline]
pub fn decrypt(key: &SymmetricKey, envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
    Cipher::new(key).decrypt(envelope)
}
