//! HTTP routes and JSON bodies of the storage API.
//!
//! All routes live under `/api`. The server sees only the site id and the
//! envelope; the key token never appears in any route or body.

use {
    crate::{EncryptedEnvelope, SiteId},
    serde::{Deserialize, Serialize},
};

pub const API_ROOT: &str = "api";
pub const SITES: &str = "sites";
pub const VIEW: &str = "view";
pub const ACCEPT: &str = "accept";
pub const HEALTH: &str = "health";

/// First path segment of a shareable page address: `<public base>/v/<id>`.
pub const PAGE_SEGMENT: &str = "v";

/// Status returned for a record whose expiry has passed.
pub const STATUS_EXPIRED: u16 = 410;
/// Status returned for an absent record.
pub const STATUS_NOT_FOUND: u16 = 404;
/// Status returned when the per-client creation budget is exhausted.
pub const STATUS_RATE_LIMITED: u16 = 429;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    #[must_use]
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `POST /api/sites` with a [`CreateSite`] body, answers [`SiteCreated`].
    CreateSite,
    /// `GET /api/sites/{id}`, answers [`SiteResponse`].
    GetSite(SiteId),
    /// `POST /api/sites/{id}/view`, answers [`Acknowledged`].
    RecordView(SiteId),
    /// `POST /api/sites/{id}/accept`, answers [`Acknowledged`].
    AcceptSite(SiteId),
    /// `GET /api/health`, answers [`HealthStatus`].
    Health,
}

impl Route {
    #[must_use]
    #[inline]
    pub fn method(&self) -> Method {
        match self {
            Self::GetSite(_) | Self::Health => Method::Get,
            Self::CreateSite | Self::RecordView(_) | Self::AcceptSite(_) => Method::Post,
        }
    }

    /// Path segments relative to the server root.
    #[must_use]
    #[inline]
    pub fn segments(&self) -> Vec<&str> {
        match self {
            Self::CreateSite => vec![API_ROOT, SITES],
            Self::GetSite(id) => vec![API_ROOT, SITES, id.as_str()],
            Self::RecordView(id) => vec![API_ROOT, SITES, id.as_str(), VIEW],
            Self::AcceptSite(id) => vec![API_ROOT, SITES, id.as_str(), ACCEPT],
            Self::Health => vec![API_ROOT, HEALTH],
        }
    }

    /// Matches a request line against the known routes.
    ///
    /// Returns `None` for unknown paths, wrong methods and malformed ids.
    #[must_use]
    #[inline]
    pub fn parse(method: &str, path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.trim_end_matches('/').split('/').skip(1).collect();
        let route = match segments.as_slice() {
            [API_ROOT, SITES] => Self::CreateSite,
            [API_ROOT, SITES, id] => Self::GetSite(id.parse().ok()?),
            [API_ROOT, SITES, id, VIEW] => Self::RecordView(id.parse().ok()?),
            [API_ROOT, SITES, id, ACCEPT] => Self::AcceptSite(id.parse().ok()?),
            [API_ROOT, HEALTH] => Self::Health,
            _ => return None,
        };
        (route.method().as_str() == method).then_some(route)
    }
}

/// Request body of [`Route::CreateSite`]. Nothing but the envelope is sent.
pub type CreateSite = EncryptedEnvelope;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteCreated {
    pub id: SiteId,
    /// Page address without fragment. The client appends `#<key token>`.
    #[serde(alias = "url")]
    pub base_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteResponse {
    pub id: SiteId,
    #[serde(flatten)]
    pub envelope: EncryptedEnvelope,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub accepted: bool,
}

/// Body of every non-success response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledged {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub storage: bool,
}
