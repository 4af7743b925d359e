//! Failure taxonomy of the sealed page protocol.

use {keepsake_protocol::KeyFormatError, thiserror::Error};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The key token is malformed or does not decode to 256 bits.
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(#[from] KeyFormatError),

    /// The AEAD tag did not verify: wrong key, corrupted or tampered data.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The AEAD refused to seal the plaintext.
    #[error("encryption failed")]
    Encryption,

    /// The server reported that the page is past its expiry.
    #[error("page has expired")]
    Expired,

    /// The page is absent, or the server answered with another failure.
    #[error("page not found")]
    NotFound,

    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("accept failed: {0}")]
    AcceptFailed(String),

    /// The link carries no key fragment.
    #[error("link has no key")]
    NoKey,

    #[error("creation failed: {0}")]
    CreationFailed(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("invalid link: {0}")]
    InvalidLink(String),

    #[error("secure random source unavailable: {0}")]
    Entropy(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
