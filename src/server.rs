//! Auxiliary HTTP listeners: the status page served next to the update loop,
//! and an echo service reporting the caller's address.

use crate::detector::PeerAddress;
use crate::error::Result;
use axum::{extract::ConnectInfo, routing::get, Json, Router};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Default listen address of the status page.
pub const DEFAULT_STATUS_ADDR: &str = "127.0.0.1:8080";

/// Default listen address of the echo service.
pub const DEFAULT_ECHO_ADDR: &str = "0.0.0.0:9999";

/// Body of the status page.
pub const STATUS_BODY: &str = "service running";

/// Router answering `GET /` with a plain-text liveness message.
pub fn status_router() -> Router {
    Router::new().route("/", get(status_handler))
}

/// Router answering `GET /` with the caller's address as JSON.
pub fn echo_router() -> Router {
    Router::new().route("/", get(echo_handler))
}

async fn status_handler() -> &'static str {
    STATUS_BODY
}

async fn echo_handler(ConnectInfo(peer): ConnectInfo<SocketAddr>) -> Json<PeerAddress> {
    Json(PeerAddress {
        ip: peer.ip().to_canonical().to_string(),
        port: peer.port(),
    })
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Listening on http://{}", addr);
    }

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    Ok(())
}

/// Start the status page next to the update loop; it stops once `shutdown`
/// turns true. A bind failure is logged and leaves the page disabled.
pub async fn spawn_status_page(
    addr: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::warn!("Status page disabled, cannot bind {}: {}", addr, e);
            return None;
        }
    };

    let handle = tokio::spawn(async move {
        let stop = async move {
            let _ = shutdown.wait_for(|stopped| *stopped).await;
        };
        if let Err(e) = serve(listener, status_router(), stop).await {
            tracing::error!("Status page stopped: {}", e);
        }
    });

    Some(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn(router: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, router, std::future::pending()));
        addr
    }

    #[tokio::test]
    async fn test_status_page() {
        let addr = spawn(status_router()).await;

        let response = reqwest::get(format!("http://{}/", addr)).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), STATUS_BODY);
    }

    #[tokio::test]
    async fn test_status_page_bind_failure_is_not_fatal() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let (_tx, rx) = watch::channel(false);

        assert!(spawn_status_page(addr, rx).await.is_none());
    }

    #[tokio::test]
    async fn test_status_page_stops_on_shutdown() {
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let (tx, rx) = watch::channel(false);

        let handle = spawn_status_page(addr, rx).await.expect("status page bound");
        let body = reqwest::get(format!("http://{}/", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, STATUS_BODY);

        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("status page did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_echo_reports_peer_address() {
        let addr = spawn(echo_router()).await;

        let address: PeerAddress = reqwest::get(format!("http://{}/", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(address.ip, "127.0.0.1");
        assert_ne!(address.port, 0);
    }

    #[tokio::test]
    async fn test_echo_feeds_detector() {
        use crate::detector::{CurrentIp, IpDetector, IpSource};

        let addr = spawn(echo_router()).await;
        let detector = IpDetector::new(IpSource::Http(format!("http://{}/", addr))).unwrap();

        assert_eq!(detector.current_ip().await.unwrap(), "127.0.0.1");
    }
}
