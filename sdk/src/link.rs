//! Shareable addresses: `<base address>#<key token>`.
//!
//! The fragment is a client-only convention. [`ShareableLink::page_url`] strips it,
//! and the repository client only ever receives the [`SiteId`].

use {
    crate::error::{Error, Result},
    keepsake_protocol::{KeyToken, SiteId},
    std::{
        fmt::{self, Debug, Display},
        str::FromStr,
    },
    url::Url,
};

#[derive(Clone, PartialEq, Eq)]
pub struct ShareableLink {
    page: Url,
    id: SiteId,
    key: Option<KeyToken>,
}

impl ShareableLink {
    /// Attaches `key` to the base address the server returned for `id`.
    #[inline]
    pub fn new(base_address: &str, id: SiteId, key: KeyToken) -> Result<Self> {
        let mut page = Url::parse(base_address)
            .map_err(|err| Error::InvalidLink(format!("invalid base address: {err}")))?;
        page.set_fragment(None);
        Ok(Self {
            page,
            id,
            key: Some(key),
        })
    }

    /// Parses a full link. The site id is the last path segment.
    /// A missing or empty fragment yields a link without key.
    #[inline]
    pub fn parse(link: &str) -> Result<Self> {
        let mut page = Url::parse(link.trim())
            .map_err(|err| Error::InvalidLink(format!("not a URL: {err}")))?;
        let key = page
            .fragment()
            .filter(|fragment| !fragment.is_empty())
            .map(KeyToken::new);
        page.set_fragment(None);
        let id = page
            .path_segments()
            .and_then(|mut segments| segments.rfind(|segment| !segment.is_empty()))
            .ok_or_else(|| Error::InvalidLink("no site id in path".into()))?
            .parse()
            .map_err(|err| Error::InvalidLink(format!("invalid site id: {err}")))?;
        Ok(Self { page, id, key })
    }

    #[must_use]
    #[inline]
    pub fn id(&self) -> &SiteId {
        &self.id
    }

    #[must_use]
    #[inline]
    pub fn key(&self) -> Option<&KeyToken> {
        self.key.as_ref()
    }

    /// Page address without fragment.
    #[must_use]
    #[inline]
    pub fn page_url(&self) -> &Url {
        &self.page
    }

    /// Full link including the key fragment. Treat the result as a secret.
    #[must_use]
    #[inline]
    pub fn to_unmasked_string(&self) -> String {
        match &self.key {
            Some(key) => format!("{}#{}", self.page, key.as_unmasked_str()),
            None => self.page.to_string(),
        }
    }
}

impl FromStr for ShareableLink {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Shows the page address only; the key is never displayed or logged.
impl Display for ShareableLink {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.page)
    }
}

impl Debug for ShareableLink {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareableLink")
            .field("page", &self.page.as_str())
            .field("id", &self.id)
            .field("has_key", &self.key.is_some())
            .finish()
    }
}
