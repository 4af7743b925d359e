//! The creator's private content, as it exists before encryption and after decryption.
//!
//! The record is serialized to JSON with camelCase field names; the server only
//! ever sees the encrypted bytes of that JSON.

use {
    crate::error::{Error, Result},
    keepsake_protocol::codec,
    serde::{Deserialize, Serialize},
    url::Url,
};

pub const MAX_NAME_CHARS: usize = 50;
pub const MAX_LOVE_MESSAGE_CHARS: usize = 2000;
pub const MAX_PHOTO_CAPTION_CHARS: usize = 200;
pub const MAX_STORY_CHARS: usize = 1000;
pub const MAX_PET_NAME_CHARS: usize = 30;
pub const MAX_SECRET_MESSAGE_CHARS: usize = 500;
pub const MAX_REASONS: usize = 6;
pub const MAX_REASON_CHARS: usize = 200;
pub const MAX_PHOTO_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaintextRecord {
    pub creator_name: String,
    pub partner_name: String,
    pub love_message: String,
    /// `data:image/...;base64,...` URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub how_we_met: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite_memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasons: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_message: Option<String>,
}

fn check_required(field: &str, value: &str, max_chars: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidRecord(format!("`{field}` is required")));
    }
    check_length(field, value, max_chars)
}

fn check_length(field: &str, value: &str, max_chars: usize) -> Result<()> {
    let chars = value.chars().count();
    if chars > max_chars {
        return Err(Error::InvalidRecord(format!(
            "`{field}` is too long; got {chars} chars, max {max_chars}"
        )));
    }
    Ok(())
}

fn check_optional(field: &str, value: Option<&String>, max_chars: usize) -> Result<()> {
    value.map_or(Ok(()), |value| check_length(field, value, max_chars))
}

fn check_photo(uri: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidRecord(format!("`photoBase64` {reason}"));
    let rest = uri
        .strip_prefix("data:image/")
        .ok_or_else(|| invalid("must be an image data URI"))?;
    let (_media_type, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| invalid("must be base64 encoded"))?;
    // Reject early without decoding anything that cannot fit.
    if payload.len() / 4 * 3 > MAX_PHOTO_BYTES + 3 {
        return Err(invalid("is larger than 2 MiB"));
    }
    let decoded = codec::from_base64(payload).map_err(|_err| invalid("is not valid base64"))?;
    if decoded.len() > MAX_PHOTO_BYTES {
        return Err(invalid("is larger than 2 MiB"));
    }
    Ok(())
}

fn check_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|err| Error::InvalidRecord(format!("`{field}` is not a valid URL: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidRecord(format!(
            "`{field}` must be an http or https URL"
        )));
    }
    Ok(())
}

impl PlaintextRecord {
    /// Checks the bounds the create flow enforces before encryption.
    #[inline]
    pub fn validate(&self) -> Result<()> {
        check_required("creatorName", &self.creator_name, MAX_NAME_CHARS)?;
        check_required("partnerName", &self.partner_name, MAX_NAME_CHARS)?;
        check_required("loveMessage", &self.love_message, MAX_LOVE_MESSAGE_CHARS)?;
        check_optional(
            "photoCaption",
            self.photo_caption.as_ref(),
            MAX_PHOTO_CAPTION_CHARS,
        )?;
        check_optional("howWeMet", self.how_we_met.as_ref(), MAX_STORY_CHARS)?;
        check_optional(
            "favoriteMemory",
            self.favorite_memory.as_ref(),
            MAX_STORY_CHARS,
        )?;
        check_optional("petName", self.pet_name.as_ref(), MAX_PET_NAME_CHARS)?;
        check_optional(
            "secretMessage",
            self.secret_message.as_ref(),
            MAX_SECRET_MESSAGE_CHARS,
        )?;
        if let Some(reasons) = &self.reasons {
            if reasons.len() > MAX_REASONS {
                return Err(Error::InvalidRecord(format!(
                    "too many reasons; got {}, max {MAX_REASONS}",
                    reasons.len()
                )));
            }
            for reason in reasons {
                check_required("reasons", reason, MAX_REASON_CHARS)?;
            }
        }
        if let Some(photo) = &self.photo_base64 {
            check_photo(photo)?;
        }
        if let Some(song_url) = &self.song_url {
            check_url("songUrl", song_url)?;
        }
        Ok(())
    }

    #[inline]
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    #[inline]
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Name shown on the envelope: the pet name when present.
    #[must_use]
    #[inline]
    pub fn display_name(&self) -> &str {
        self.pet_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.partner_name)
    }
}
