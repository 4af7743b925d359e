mod connection;
pub mod handler;
pub mod rate_limit;
pub mod signal;
pub mod storage;
pub mod util;

use {
    crate::{handler::Context, rate_limit::RateLimiter, storage::Storage},
    anyhow::{Context as _, Result, anyhow, bail},
    chrono::Utc,
    hyper_util::server::graceful::GracefulShutdown,
    keepsake_protocol::{DateTimeUtc, SiteId, endpoints::PAGE_SEGMENT},
    serde::{Deserialize, Serialize},
    std::{
        future::Future,
        net::SocketAddr,
        path::{Path, PathBuf},
        pin::pin,
        sync::Arc,
        time::{Duration, Instant},
    },
    tokio::{net::TcpListener, select, task::JoinHandle, time::MissedTickBehavior},
    tracing::{info, warn},
    url::Url,
};

/// How long shutdown waits for in-flight requests.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub storage_path: PathBuf,
    /// Prefix of returned page addresses: `<public_base_url>/v/<id>`.
    pub public_base_url: Url,
    #[serde(default = "default_rate_limit_per_hour")]
    pub rate_limit_per_hour: usize,
    /// Pages expire this long after creation.
    #[serde(default, with = "humantime_serde")]
    pub site_lifetime: Option<Duration>,
    /// Fixed expiry for every page, used when `site_lifetime` is not set.
    #[serde(default)]
    pub expires_at: Option<DateTimeUtc>,
    #[serde(default = "default_cleanup_interval", with = "humantime_serde")]
    pub cleanup_interval: Duration,
    /// Origins allowed to call the API from a browser. `"*"` allows any.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_rate_limit_per_hour() -> usize {
    10
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_log_filter() -> String {
    "info".into()
}

impl Config {
    pub fn parse(path: &Path) -> Result<Self> {
        let config: Self = json5::from_str(&fs_err::read_to_string(path)?)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.public_base_url.cannot_be_a_base() {
            bail!("`public_base_url` cannot be a base: {}", self.public_base_url);
        }
        if self.cleanup_interval.is_zero() {
            bail!("`cleanup_interval` cannot be zero");
        }
        Ok(())
    }

    /// Expiry of a page created at `created_at`, if pages expire at all.
    pub fn expiry_for(&self, created_at: DateTimeUtc) -> Result<Option<DateTimeUtc>> {
        let Some(lifetime) = self.site_lifetime else {
            return Ok(self.expires_at);
        };
        let lifetime = chrono::Duration::from_std(lifetime)?;
        let expires_at = created_at
            .checked_add_signed(lifetime)
            .context("site lifetime is out of range")?;
        Ok(Some(expires_at))
    }

    /// Page address for `id`, without fragment.
    pub fn page_address(&self, id: &SiteId) -> Result<String> {
        let mut url = self.public_base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("`public_base_url` cannot be a base"))?
            .pop_if_empty()
            .extend([PAGE_SEGMENT, id.as_str()]);
        Ok(url.into())
    }
}

/// Deletes expired pages every `cleanup_interval`.
fn spawn_sweeper(ctx: Context) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ctx.config.cleanup_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let storage = Arc::clone(&ctx.storage);
            match tokio::task::spawn_blocking(move || storage.remove_expired(Utc::now())).await {
                Ok(Ok(0)) => {}
                Ok(Ok(removed)) => info!(removed, "removed expired sites"),
                Ok(Err(err)) => warn!(?err, "failed to remove expired sites"),
                Err(err) => warn!(?err, "cleanup task failed"),
            }
            ctx.rate_limiter.prune(Instant::now());
        }
    })
}

/// Serves the API on `listener` until `shutdown` resolves.
pub async fn serve(
    config: Config,
    listener: TcpListener,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    config.validate()?;
    let ctx = Context {
        storage: Arc::new(Storage::new(config.storage_path.clone())?),
        rate_limiter: Arc::new(RateLimiter::new(
            config.rate_limit_per_hour,
            rate_limit::WINDOW,
        )),
        config: Arc::new(config),
    };
    let sweeper = spawn_sweeper(ctx.clone());
    let graceful = GracefulShutdown::new();
    let mut shutdown = pin!(shutdown);
    info!("listening on {}", listener.local_addr()?);

    loop {
        select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let ctx = ctx.clone();
                    connection::spawn_connection(
                        stream,
                        move |request| handler::handle(ctx.clone(), peer.ip(), request),
                        &graceful,
                    );
                }
                Err(err) => warn!(?err, "failed to accept"),
            },
            () = &mut shutdown => break,
        }
    }

    sweeper.abort();
    drop(listener);
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, graceful.shutdown())
        .await
        .is_err()
    {
        warn!("timed out waiting for connections to close");
    }
    info!("server stopped");
    Ok(())
}

pub async fn run(config: Config, shutdown: impl Future<Output = ()>) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    serve(config, listener, shutdown).await
}
