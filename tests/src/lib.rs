//! A real server on a free local port, with its storage in a temporary directory.

use {
    anyhow::{Context as _, Result},
    keepsake_sdk::{client::Client, orchestrator::Orchestrator},
    keepsake_server::{Config, storage::Storage},
    portpicker::pick_unused_port,
    std::{
        net::{Ipv4Addr, SocketAddr},
        path::Path,
        sync::Once,
    },
    tempfile::TempDir,
    tokio::{net::TcpListener, sync::oneshot, task::JoinHandle},
    tracing_subscriber::EnvFilter,
    url::Url,
};

pub const PUBLIC_BASE_URL: &str = "https://keepsake.example/";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("info,keepsake_server=debug,keepsake_sdk=debug"))
            .with_test_writer()
            .init();
    });
}

pub struct TestServer {
    dir: TempDir,
    config: Config,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(|_| {}).await
    }

    /// Starts a server after letting `configure` adjust the default test config.
    pub async fn start_with(configure: impl FnOnce(&mut Config)) -> Result<Self> {
        init_logging();
        let dir = TempDir::new()?;
        let port = pick_unused_port().context("no free port")?;
        let mut config: Config = json5::from_str(&format!(
            r#"{{
                bind_addr: "127.0.0.1:{port}",
                storage_path: {storage_path},
                public_base_url: "{PUBLIC_BASE_URL}",
            }}"#,
            storage_path = serde_json::to_string(dir.path())?,
        ))?;
        configure(&mut config);

        let listener = TcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port)).await?;
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(keepsake_server::serve(config.clone(), listener, async move {
            drop(shutdown_rx.await);
        }));
        Ok(Self {
            dir,
            config,
            shutdown,
            task,
        })
    }

    #[must_use]
    pub fn storage_path(&self) -> &Path {
        self.dir.path()
    }

    pub fn url(&self) -> Result<Url> {
        Ok(format!("http://{}/", self.config.bind_addr).parse()?)
    }

    pub fn client(&self) -> Result<Client> {
        Ok(Client::new(self.url()?)?)
    }

    pub fn orchestrator(&self) -> Result<Orchestrator> {
        Ok(Orchestrator::new(self.client()?))
    }

    /// Direct access to the files the server writes.
    pub fn storage(&self) -> Result<Storage> {
        Storage::new(self.dir.path().to_path_buf())
    }

    pub async fn stop(self) -> Result<()> {
        drop(self.shutdown.send(()));
        self.task.await??;
        Ok(())
    }
}
