//! All page encryption uses AES-256-GCM.
//!
//! Each page gets its own 256-bit key, generated when the page is created and
//! never reused. The key is exported as an unpadded base64url token and travels
//! only in the fragment of the shareable link (the part after `#`), which HTTP
//! clients do not send to the server.
//!
//! The serialized record is encrypted once with a random 96-bit nonce. The
//! resulting envelope holds two standard base64 strings:
//!
//! - `nonce` - the 12 random nonce bytes
//! - `ciphertext` - the encrypted record followed by the 16-byte GCM tag
//!
//! Integrity is enforced by the tag: a wrong key or any modified bit of the
//! nonce or ciphertext fails decryption instead of producing altered plaintext.
//!
//! Random bytes come from an [`EntropySource`], so tests can replace the OS
//! generator with a seeded one.

mod cipher;
mod entropy;
mod keys;

pub use {
    cipher::{Cipher, decrypt, encrypt},
    entropy::{EntropySource, OsEntropy, SeededEntropy},
    keys::{export_key, generate_key, import_key},
};
