//! HTTP listener
//!
//! Serves the subscription endpoint and the stored media, and keeps track of
//! every connection pump so shutdown can wait for them.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, State, WebSocketUpgrade};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::io::ReaderStream;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;

use super::config::ServerConfig;
use super::connection::Connection;
use crate::error::{Error, Result};
use crate::fetch::storage::validate_key;
use crate::fetch::Storage;
use crate::hub::Hub;
use crate::record::key::escape;
use crate::relay::ControlRelay;
use crate::stats::ServerStats;

/// Subscription endpoint
pub const STREAM_PATH: &str = "/di/stream";

/// Prefix of the media endpoint
pub const IMAGES_PATH: &str = "/di/images";

/// Feed server
pub struct DisServer {
    config: ServerConfig,
    hub: Arc<Hub>,
    relay: ControlRelay,
    storage: Arc<dyn Storage>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    tracker: TaskTracker,
    stats: ServerStats,
}

impl DisServer {
    /// Create a new server around the shared hub, relay and storage
    pub fn new(
        config: ServerConfig,
        hub: Arc<Hub>,
        relay: ControlRelay,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            hub,
            relay,
            storage,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            tracker: TaskTracker::new(),
            stats: ServerStats::new(),
        }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get a reference to the hub
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Tracker holding every connection pump
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Connection counters
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Routes served by this server
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route(STREAM_PATH, get(stream_handler))
            .route(&format!("{}/:key", IMAGES_PATH), get(image_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(self))
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(Error::Listener)
    }

    /// Serve on `listener` until `shutdown` resolves
    ///
    /// Upgraded connections are not waited for here; close the hub and wait
    /// on [`tracker`](Self::tracker) for that.
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr().map_err(Error::Listener)?;
        tracing::info!(addr = %addr, "Feed server listening");

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(Error::Listener)?;

        tracing::info!(
            addr = %addr,
            total_connections = self.stats.total_connections(),
            "Feed server stopped accepting"
        );
        Ok(())
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn run_until<F>(self: Arc<Self>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    fn try_admit(&self) -> std::result::Result<Option<OwnedSemaphorePermit>, ()> {
        match self.connection_semaphore {
            Some(ref sem) => sem.clone().try_acquire_owned().map(Some).map_err(|_| ()),
            None => Ok(None),
        }
    }
}

async fn stream_handler(
    State(server): State<Arc<DisServer>>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    // Check connection limit
    let permit = match server.try_admit() {
        Ok(permit) => permit,
        Err(()) => {
            server.stats.connection_rejected();
            tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
            return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
        }
    };

    let session_id = server.next_session_id.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(session_id = session_id, peer = %peer_addr, "New connection");

    let tracker = server.tracker.clone();
    ws.max_message_size(server.config.max_message_size)
        .on_upgrade(move |socket| {
            tracker.track_future(async move {
                let _permit = permit;
                server.stats.connection_opened();

                let connection = Connection::new(
                    session_id,
                    peer_addr,
                    server.config.clone(),
                    Arc::clone(&server.hub),
                    server.relay.clone(),
                );
                if let Err(e) = connection.run(socket).await {
                    tracing::debug!(session_id = session_id, error = %e, "Connection error");
                }

                server.stats.connection_closed();
                tracing::debug!(session_id = session_id, "Connection closed");
            })
        })
}

async fn image_handler(
    State(server): State<Arc<DisServer>>,
    Path(key): Path<String>,
) -> Response {
    if validate_key(&key).is_err() {
        return (StatusCode::BAD_REQUEST, "invalid key").into_response();
    }

    // Keys are stored escaped; accept both the literal and the decoded form
    let escaped = escape(&key);
    let candidates = if escaped == key {
        vec![key]
    } else {
        vec![key, escaped]
    };

    for candidate in candidates {
        match server.storage.open(&candidate).await {
            Ok(Some(source)) => {
                let body = Body::from_stream(ReaderStream::new(source));
                return ([(header::CONTENT_TYPE, content_type(&candidate))], body).into_response();
            }
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(key = %candidate, error = %e, "Failed to open stored media");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    StatusCode::NOT_FOUND.into_response()
}

/// Content type from a key's extension
pub fn content_type(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}
