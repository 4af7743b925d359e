use {
    crate::codec::{self, DecodeError},
    std::fmt::{self, Debug},
    thiserror::Error,
    zeroize::{Zeroize, ZeroizeOnDrop},
};

/// Length of a [`SymmetricKey`] in bytes.
pub const KEY_LENGTH: usize = 32;

/// Secret used to encrypt exactly one page.
///
/// Lives only in client memory and in the fragment of the shareable link.
/// It must never be part of a request sent to the server.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LENGTH]);

impl SymmetricKey {
    #[must_use]
    #[inline]
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// Raw export of the key material as an unpadded base64url token.
    #[must_use]
    #[inline]
    pub fn to_token(&self) -> KeyToken {
        KeyToken(codec::to_base64_url(&self.0))
    }

    #[inline]
    pub fn from_token(token: &KeyToken) -> Result<Self, KeyFormatError> {
        let mut bytes = codec::from_base64_url(token.as_unmasked_str())?;
        let array = <[u8; KEY_LENGTH]>::try_from(bytes.as_slice()).map_err(|_err| {
            KeyFormatError::Length {
                actual: bytes.len(),
            }
        });
        bytes.zeroize();
        Ok(Self(array?))
    }
}

impl Debug for SymmetricKey {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKey").finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum KeyFormatError {
    #[error("key token is not base64url: {0}")]
    Encoding(#[from] DecodeError),
    #[error("invalid key length; got {actual} bytes, expected 32")]
    Length { actual: usize },
}

/// Textual form of a [`SymmetricKey`], carried in the link fragment.
///
/// Constructing a token does not validate it; validation happens when the
/// key is imported with [`SymmetricKey::from_token`].
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyToken(String);

impl KeyToken {
    #[must_use]
    #[inline]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    #[must_use]
    #[inline]
    pub fn as_unmasked_str(&self) -> &str {
        &self.0
    }
}

impl Debug for KeyToken {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyToken").finish_non_exhaustive()
    }
}
