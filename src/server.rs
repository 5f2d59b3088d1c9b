//! Server and client defaults.
//!
//! [`serve`] installs the peer address as `ConnectInfo<SocketAddr>` on every
//! request. The rate limiter keys clients on it and fails closed without it,
//! so routers carrying the admission pipeline must be served through here.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// Upper bound for producing a response on application routes.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long an idle pooled client connection is kept open.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Total request timeout for the outbound HTTP client.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Serve `router` on `listener` until `shutdown` resolves.
///
/// In-flight requests are allowed to finish after the shutdown signal.
///
/// # Errors
///
/// Returns the underlying I/O error if the accept loop fails.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Server listening on http://{addr}");
    }

    let app = router.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
///
/// If a handler cannot be installed that source is ignored and the error is
/// logged; the other source still triggers shutdown.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

/// Outbound HTTP client with the default timeouts.
///
/// # Errors
///
/// Returns an error if the TLS backend or resolver cannot be initialized.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_CLIENT_TIMEOUT)
        .pool_idle_timeout(DEFAULT_IDLE_TIMEOUT)
        .build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use axum::extract::ConnectInfo;
    use axum::routing::get;
    use tokio::sync::oneshot;

    use super::*;

    #[test]
    fn test_default_timeouts() {
        assert_eq!(DEFAULT_WRITE_TIMEOUT, Duration::from_secs(10));
        assert_eq!(DEFAULT_IDLE_TIMEOUT, Duration::from_secs(120));
        assert_eq!(DEFAULT_CLIENT_TIMEOUT, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_serve_exposes_peer_address_and_shuts_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Router::new().route(
            "/peer",
            get(|ConnectInfo(peer): ConnectInfo<SocketAddr>| async move { peer.ip().to_string() }),
        );

        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, router, async {
            let _ = rx.await;
        }));

        let body = http_client()
            .unwrap()
            .get(format!("http://{addr}/peer"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "127.0.0.1");

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
