use {
    crate::error::{Error, Result},
    keepsake_protocol::{
        EncryptedEnvelope, SiteId,
        endpoints::{ErrorDetail, Route, STATUS_EXPIRED, SiteCreated, SiteResponse},
        limits::check_envelope,
    },
    reqwest::{Response, StatusCode, Url},
    std::time::Duration,
    tracing::{debug, instrument, warn},
};

/// Client of the storage API.
///
/// Requests carry a site id or an envelope, never key material.
/// Reuse created client or clone it in order to reuse a connection pool.
#[derive(Debug, Clone)]
pub struct Client {
    reqwest: reqwest::Client,
    server_url: Url,
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

impl Client {
    /// `server_url` is the server root; routes are appended below it.
    #[inline]
    pub fn new(server_url: Url) -> Result<Self> {
        Self::with_timeout(server_url, DEFAULT_TIMEOUT)
    }

    #[inline]
    pub fn with_timeout(server_url: Url, timeout: Duration) -> Result<Self> {
        if server_url.cannot_be_a_base() {
            return Err(Error::InvalidLink(format!(
                "server URL cannot be a base: {server_url}"
            )));
        }
        Ok(Self {
            server_url,
            reqwest: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    #[must_use]
    #[inline]
    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    fn url(&self, route: &Route) -> Result<Url> {
        let mut url = self.server_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidLink("server URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(route.segments());
        Ok(url)
    }

    /// Submits an envelope and returns the assigned id and base address.
    #[instrument(skip_all)]
    #[inline]
    pub async fn create_site(&self, envelope: &EncryptedEnvelope) -> Result<SiteCreated> {
        check_envelope(envelope).map_err(|err| Error::SubmissionRejected(err.to_string()))?;
        let url = self.url(&Route::CreateSite)?;
        let response = self
            .reqwest
            .post(url)
            .json(envelope)
            .send()
            .await
            .map_err(|err| Error::SubmissionRejected(err.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::SubmissionRejected(error_detail(response).await));
        }
        let created = response
            .json::<SiteCreated>()
            .await
            .map_err(|err| Error::SubmissionRejected(format!("invalid response: {err}")))?;
        debug!(id = %created.id, "site created");
        Ok(created)
    }

    /// Fetches the stored envelope. [`Error::Expired`] is kept distinct;
    /// every other failure is [`Error::NotFound`].
    #[instrument(skip_all, fields(%id))]
    #[inline]
    pub async fn fetch_site(&self, id: &SiteId) -> Result<SiteResponse> {
        let url = self.url(&Route::GetSite(id.clone()))?;
        let response = self.reqwest.get(url).send().await.map_err(|err| {
            warn!(%err, "fetch failed");
            Error::NotFound
        })?;
        match response.status() {
            status if status.is_success() => {}
            status if status.as_u16() == STATUS_EXPIRED => return Err(Error::Expired),
            status => {
                debug!(%status, "fetch rejected");
                return Err(Error::NotFound);
            }
        }
        let site = response.json::<SiteResponse>().await.map_err(|err| {
            warn!(%err, "invalid fetch response");
            Error::NotFound
        })?;
        if site.id != *id {
            warn!(returned = %site.id, "server returned a different site");
            return Err(Error::NotFound);
        }
        Ok(site)
    }

    /// Best-effort view bookkeeping. Failures are logged and dropped.
    #[instrument(skip_all, fields(%id))]
    #[inline]
    pub async fn record_view(&self, id: &SiteId) {
        let result = match self.url(&Route::RecordView(id.clone())) {
            Ok(url) => self
                .reqwest
                .post(url)
                .send()
                .await
                .map(|response| response.status()),
            Err(err) => {
                debug!(%err, "view not recorded");
                return;
            }
        };
        match result {
            Ok(status) if status.is_success() => debug!("view recorded"),
            Ok(status) => debug!(%status, "view not recorded"),
            Err(err) => debug!(%err, "view not recorded"),
        }
    }

    /// Reports acceptance. Setting it again is harmless.
    #[instrument(skip_all, fields(%id))]
    #[inline]
    pub async fn accept_site(&self, id: &SiteId) -> Result<()> {
        let url = self.url(&Route::AcceptSite(id.clone()))?;
        let response = self
            .reqwest
            .post(url)
            .send()
            .await
            .map_err(|err| Error::AcceptFailed(err.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::AcceptFailed(error_detail(response).await));
        }
        Ok(())
    }
}

/// Server-provided `detail` message, or the status line if there is none.
async fn error_detail(response: Response) -> String {
    let status = response.status();
    match response.json::<ErrorDetail>().await {
        Ok(ErrorDetail { detail }) if !detail.is_empty() => detail,
        _ => status_message(status),
    }
}

fn status_message(status: StatusCode) -> String {
    format!("server responded with {status}")
}
