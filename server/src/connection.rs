use {
    hyper::{
        Request, Response,
        body::{Body, Incoming},
        server::conn::http1,
        service::service_fn,
    },
    hyper_util::{rt::TokioIo, server::graceful::GracefulShutdown},
    std::{convert::Infallible, error::Error, future::Future, io},
    tokio::io::{AsyncRead, AsyncWrite},
    tracing::{debug, warn},
};

/// Serves one HTTP/1 connection on a background task.
///
/// The connection is registered with `graceful`, so shutdown waits for
/// in-flight requests before returning.
pub fn spawn_connection<C, H, Fut, B>(io: C, handler: H, graceful: &GracefulShutdown)
where
    C: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    H: Fn(Request<Incoming>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Response<B>, Infallible>> + Send + 'static,
    B: Body + Send + 'static,
    <B as Body>::Data: Send,
    <B as Body>::Error: Error + Send + Sync,
{
    let connection = http1::Builder::new()
        .keep_alive(true)
        .serve_connection(TokioIo::new(io), service_fn(handler));
    let connection = graceful.watch(connection);
    drop(tokio::spawn(async move {
        if let Err(err) = connection.await {
            log_serve_error(&err);
        }
    }));
}

fn log_serve_error(err: &hyper::Error) {
    if let Some(err) = err.source().and_then(|err| err.downcast_ref::<io::Error>()) {
        match err.kind() {
            io::ErrorKind::NotConnected | io::ErrorKind::ConnectionReset => {
                debug!(error = ?err, "canceled request");
            }
            _ => warn!(error = ?err, "error while serving"),
        }
    } else if err.is_incomplete_message() {
        debug!(error = ?err, "interrupted request");
    } else {
        warn!(error = ?err, "failed to serve HTTP");
    }
}
