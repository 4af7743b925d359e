//! Process signals that stop the server.

use {
    anyhow::Result,
    derive_more::Display,
    futures::{
        FutureExt,
        future::{BoxFuture, Either, select},
    },
    std::future::pending,
    tracing::{info, warn},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ShutdownSignal {
    #[display("SIGINT")]
    Sigint,
    #[display("SIGTERM")]
    Sigterm,
}

impl ShutdownSignal {
    /// Installs both handlers, then waits for whichever signal arrives first.
    pub async fn recv() -> Result<Self> {
        let sigint = Self::Sigint.listen()?;
        let sigterm = Self::Sigterm.listen()?;
        Ok(match select(sigint, sigterm).await {
            Either::Left(((), _)) => Self::Sigint,
            Either::Right(((), _)) => Self::Sigterm,
        })
    }

    #[cfg(target_family = "unix")]
    fn listen(self) -> Result<BoxFuture<'static, ()>> {
        use {
            anyhow::Context as _,
            tokio::signal::unix::{SignalKind, signal},
        };

        let kind = match self {
            Self::Sigint => SignalKind::interrupt(),
            Self::Sigterm => SignalKind::terminate(),
        };
        let mut stream =
            signal(kind).with_context(|| format!("failed to install {self} handler"))?;
        Ok(async move {
            stream.recv().await;
        }
        .boxed())
    }

    #[cfg(not(target_family = "unix"))]
    #[expect(clippy::unnecessary_wraps, reason = "same signature as on unix")]
    fn listen(self) -> Result<BoxFuture<'static, ()>> {
        Ok(match self {
            Self::Sigint => async {
                if tokio::signal::ctrl_c().await.is_err() {
                    pending::<()>().await;
                }
            }
            .boxed(),
            Self::Sigterm => pending().boxed(),
        })
    }
}

/// Resolves once the process is asked to stop.
///
/// Never resolves if the handlers cannot be installed.
pub async fn shutdown() {
    match ShutdownSignal::recv().await {
        Ok(signal) => info!(%signal, "shutting down"),
        Err(err) => {
            warn!(?err, "cannot listen for shutdown signals");
            pending::<()>().await;
        }
    }
}
