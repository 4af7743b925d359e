pub mod codec;
pub mod endpoints;
mod key;
pub mod limits;

pub use crate::key::{KEY_LENGTH, KeyFormatError, KeyToken, SymmetricKey};
use {
    anyhow::{Error, bail, ensure},
    chrono::Utc,
    derive_more::Display,
    serde::{Deserialize, Deserializer, Serialize, de},
    std::str::FromStr,
};

pub type DateTimeUtc = chrono::DateTime<Utc>;

/// Length of the nonce used for each envelope, in bytes.
pub const NONCE_LENGTH: usize = 12;

/// Opaque identifier the server assigns to a stored page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize)]
pub struct SiteId(String);

impl SiteId {
    pub const MAX_LENGTH: usize = 64;

    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SiteId {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ensure!(!s.is_empty(), "site id cannot be empty");
        ensure!(
            s.len() <= Self::MAX_LENGTH,
            "site id is too long; got {}, max {}",
            s.len(),
            Self::MAX_LENGTH,
        );
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            bail!("site id contains invalid character `{c}`");
        }
        Ok(Self(s.to_owned()))
    }
}

impl<'de> Deserialize<'de> for SiteId {
    #[inline]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

/// Wire and storage form of an encrypted page.
///
/// Both fields are standard base64. `ciphertext` carries the AEAD tag at its end.
/// The `encrypted_data`/`iv` names of older servers are accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    #[serde(alias = "encrypted_data")]
    pub ciphertext: String,
    #[serde(alias = "iv")]
    pub nonce: String,
}
