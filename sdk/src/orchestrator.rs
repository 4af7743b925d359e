//! The two end-to-end flows built on top of the key manager, cipher and client.
//!
//! Create: validate → generate key → serialize → encrypt → submit → attach the
//! key token to the returned base address as a fragment.
//!
//! Retrieve, with terminal states in brackets:
//!
//! ```text
//! Loading ─┬─ no key in link ──────────────────────────────── [NoKey]
//!          └─ fetch ─┬─ expired ───────────────────────────── [Expired]
//!                    ├─ any other failure ─────────────────── [NotFound]
//!                    └─ Downloading ─ import key + decrypt ─┬ [NotFound]
//!                                                           └ Opened ─ [Displaying]
//! ```
//!
//! A bad key and a missing record both end in `NotFound`, so a caller cannot
//! tell which half of (id, key) was wrong.

use {
    crate::{
        client::Client,
        crypto::{Cipher, EntropySource, OsEntropy, export_key, generate_key, import_key},
        error::{Error, Result},
        link::ShareableLink,
        record::PlaintextRecord,
    },
    keepsake_protocol::SiteId,
    std::sync::Arc,
    tokio::runtime::Handle,
    tracing::{debug, info, instrument, warn},
};

/// Non-terminal states of the retrieve flow, reported in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Downloading,
    Opened,
}

/// Terminal state of the retrieve flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieval {
    Displaying(OpenedSite),
    Expired,
    NotFound,
    NoKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedSite {
    pub id: SiteId,
    pub record: PlaintextRecord,
    pub view_count: u64,
    pub accepted: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RetrieveOptions {
    /// The creator looking at their own page: no view is recorded.
    pub preview: bool,
}

/// Outcome of [`Orchestrator::accept`]. The page counts as accepted locally either way.
#[derive(Debug)]
pub enum Acceptance {
    Confirmed,
    Unconfirmed(Error),
}

pub struct Orchestrator {
    client: Client,
    entropy: Arc<dyn EntropySource>,
}

impl Orchestrator {
    #[must_use]
    #[inline]
    pub fn new(client: Client) -> Self {
        Self::with_entropy(client, Arc::new(OsEntropy))
    }

    #[must_use]
    #[inline]
    pub fn with_entropy(client: Client, entropy: Arc<dyn EntropySource>) -> Self {
        Self { client, entropy }
    }

    #[must_use]
    #[inline]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Encrypts `record` under a fresh key, stores it and returns the link.
    ///
    /// Any failure is reported as [`Error::CreationFailed`].
    #[instrument(skip_all)]
    #[inline]
    pub async fn create(&self, record: &PlaintextRecord) -> Result<ShareableLink> {
        self.try_create(record).await.map_err(|err| match err {
            Error::CreationFailed(_) => err,
            err => {
                warn!(%err, "creation failed");
                Error::CreationFailed(err.to_string())
            }
        })
    }

    async fn try_create(&self, record: &PlaintextRecord) -> Result<ShareableLink> {
        record.validate()?;
        let key = generate_key(&*self.entropy)?;
        let plaintext = record.to_json_bytes()?;
        let envelope = Cipher::new(&key).encrypt(&*self.entropy, &plaintext)?;
        let created = self.client.create_site(&envelope).await?;
        let link = ShareableLink::new(&created.base_address, created.id, export_key(&key))?;
        info!(page = %link, "page created");
        Ok(link)
    }

    #[inline]
    pub async fn retrieve(&self, link: &ShareableLink) -> Retrieval {
        self.retrieve_with(link, RetrieveOptions::default(), |_| {})
            .await
    }

    /// Runs the retrieve flow, calling `on_phase` on every non-terminal transition.
    #[instrument(skip_all, fields(id = %link.id()))]
    #[inline]
    pub async fn retrieve_with(
        &self,
        link: &ShareableLink,
        options: RetrieveOptions,
        mut on_phase: impl FnMut(Phase) + Send,
    ) -> Retrieval {
        on_phase(Phase::Loading);
        let Some(token) = link.key() else {
            debug!("link has no key");
            return Retrieval::NoKey;
        };
        let site = match self.client.fetch_site(link.id()).await {
            Ok(site) => site,
            Err(Error::Expired) => return Retrieval::Expired,
            Err(err) => {
                debug!(%err, "fetch failed");
                return Retrieval::NotFound;
            }
        };
        on_phase(Phase::Downloading);

        let record = import_key(token)
            .and_then(|key| Cipher::new(&key).decrypt(&site.envelope))
            .and_then(|plaintext| PlaintextRecord::from_json_bytes(&plaintext));
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                debug!(%err, "failed to open page");
                return Retrieval::NotFound;
            }
        };
        on_phase(Phase::Opened);

        if !options.preview {
            self.spawn_record_view(site.id.clone());
        }
        Retrieval::Displaying(OpenedSite {
            id: site.id,
            record,
            view_count: site.view_count,
            accepted: site.accepted,
        })
    }

    /// Fires the view bookkeeping call without waiting for it.
    fn spawn_record_view(&self, id: SiteId) {
        let Ok(runtime) = Handle::try_current() else {
            debug!("no runtime, view not recorded");
            return;
        };
        let client = self.client.clone();
        drop(runtime.spawn(async move {
            client.record_view(&id).await;
        }));
    }

    /// Reports acceptance to the server and waits for the answer.
    #[instrument(skip_all, fields(%id))]
    #[inline]
    pub async fn accept(&self, id: &SiteId) -> Acceptance {
        match self.client.accept_site(id).await {
            Ok(()) => Acceptance::Confirmed,
            Err(err) => {
                warn!(%err, "acceptance not confirmed by server");
                Acceptance::Unconfirmed(err)
            }
        }
    }
}
