//! HTTP server for the read path.
//!
//! Routes:
//! - `GET /health`: liveness.
//! - `GET /ready`: readiness, i.e. the active range table resolves.
//! - `GET /v1/ip/{address}`: the range owning the address, or 404.
//!
//! TLS termination is an external concern.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, Instrument};

use ipdex_core::observability::lookup_span;
use ipdex_core::{IpRangeRecord, RangeCache, RangeStore};

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::service::LookupService;

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ReadyResponse {
    /// Whether the active range table resolves.
    pub ready: bool,
    /// Optional message about readiness state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One resolved range, shaped for clients.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct IpRangeResponse {
    /// The queried address.
    pub ip_address: String,
    /// Owning registry tag.
    pub registry: String,
    /// `ipv4` or `ipv6`.
    pub ip_version: String,
    /// ISO-2 country code, possibly empty.
    pub country_code: String,
    /// First address of the range.
    pub range_start: String,
    /// Last address of the range (inclusive).
    pub range_end: String,
    /// Number of addresses in the range.
    pub quantity: u64,
    /// Allocation status token.
    pub status: String,
    /// `YYYY-MM-DD` date of the last status change, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_changed_at: Option<String>,
}

impl IpRangeResponse {
    fn new(address: IpAddr, record: &IpRangeRecord) -> Self {
        Self {
            ip_address: address.to_string(),
            registry: record.registry.tag().to_string(),
            ip_version: record.ip_version.as_str().to_string(),
            country_code: record.country_code.clone(),
            range_start: record.start.to_string(),
            range_end: record.end.to_string(),
            quantity: record.quantity,
            status: record.status.as_str().to_string(),
            status_changed_at: record
                .status_changed_at
                .map(|date| date.format("%Y-%m-%d").to_string()),
        }
    }
}

/// Shared application state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    service: LookupService,
    store: Arc<dyn RangeStore>,
}

impl AppState {
    /// Creates application state over the given backends.
    #[must_use]
    pub fn new(store: Arc<dyn RangeStore>, cache: Arc<dyn RangeCache>) -> Self {
        let service = LookupService::new(Arc::clone(&store), cache);
        Self { service, store }
    }
}

/// The API server.
pub struct Server {
    config: Config,
    state: AppState,
}

impl Server {
    /// Creates a server over the given backends.
    #[must_use]
    pub fn new(config: Config, store: Arc<dyn RangeStore>, cache: Arc<dyn RangeCache>) -> Self {
        let state = AppState::new(store, cache);
        Self { config, state }
    }

    /// Builds the router.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/ready", get(ready))
            .route("/v1/ip/{address}", get(lookup))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serves until SIGINT.
    ///
    /// # Errors
    ///
    /// Returns an error when the listener cannot bind or the server fails.
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(addr = %addr, "api listening");
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("received termination signal");
            })
            .await?;
        Ok(())
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.resolve_active_table().await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some(err.to_string()),
            }),
        ),
    }
}

async fn lookup(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<IpRangeResponse>> {
    let parsed: IpAddr = address
        .parse()
        .map_err(|_| ApiError::bad_request(format!("not an IP address: {address}")))?;

    let record = state
        .service
        .resolve(parsed)
        .instrument(lookup_span(&address))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no delegated range owns {address}")))?;

    Ok(Json(IpRangeResponse::new(parsed, &record)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use ipdex_core::{
        end_of_range_v4, find_by_tag, BufferTable, IpVersion, MemoryCache, MemoryStore,
        RangeStatus,
    };

    async fn test_server() -> Result<Server> {
        let store = Arc::new(MemoryStore::new());
        let apnic = find_by_tag("apnic").context("apnic")?.id;
        let start: std::net::Ipv4Addr = "1.0.0.0".parse().context("addr")?;
        store
            .load_snapshot(
                BufferTable::B,
                apnic,
                vec![IpRangeRecord {
                    registry: apnic,
                    country_code: "JP".to_string(),
                    ip_version: IpVersion::V4,
                    start: start.into(),
                    end: end_of_range_v4(start, 256).context("in range")?.into(),
                    quantity: 256,
                    status: RangeStatus::Allocated,
                    status_changed_at: chrono::NaiveDate::from_ymd_opt(2011, 8, 11),
                }],
            )
            .await
            .context("seed")?;
        Ok(Server::new(
            Config::default(),
            store,
            Arc::new(MemoryCache::new()),
        ))
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() -> Result<()> {
        let router = test_server().await?.router();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .context("build request")?;
        let response = router.oneshot(request).await.expect("router service is infallible");
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .context("read body")?;
        let health: HealthResponse = serde_json::from_slice(&body).context("parse body")?;
        assert_eq!(health.status, "ok");
        Ok(())
    }

    #[tokio::test]
    async fn ready_endpoint_reflects_active_table() -> Result<()> {
        let router = test_server().await?.router();
        let request = Request::builder()
            .uri("/ready")
            .body(Body::empty())
            .context("build request")?;
        let response = router.oneshot(request).await.expect("router service is infallible");
        assert_eq!(response.status(), StatusCode::OK);

        // A store with both tables present is not ready.
        let broken = Server::new(
            Config::default(),
            Arc::new(MemoryStore::with_tables(&[BufferTable::A, BufferTable::B])),
            Arc::new(MemoryCache::new()),
        );
        let request = Request::builder()
            .uri("/ready")
            .body(Body::empty())
            .context("build request")?;
        let response = broken
            .router()
            .oneshot(request)
            .await
            .expect("router service is infallible");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        Ok(())
    }

    #[tokio::test]
    async fn lookup_returns_the_owning_range() -> Result<()> {
        let router = test_server().await?.router();
        let request = Request::builder()
            .uri("/v1/ip/1.0.0.42")
            .body(Body::empty())
            .context("build request")?;
        let response = router.oneshot(request).await.expect("router service is infallible");
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 4096)
            .await
            .context("read body")?;
        let range: IpRangeResponse = serde_json::from_slice(&body).context("parse body")?;
        assert_eq!(range.ip_address, "1.0.0.42");
        assert_eq!(range.registry, "apnic");
        assert_eq!(range.range_start, "1.0.0.0");
        assert_eq!(range.range_end, "1.0.0.255");
        assert_eq!(range.quantity, 256);
        assert_eq!(range.status, "allocated");
        assert_eq!(range.status_changed_at.as_deref(), Some("2011-08-11"));
        Ok(())
    }

    #[tokio::test]
    async fn lookup_miss_is_404() -> Result<()> {
        let router = test_server().await?.router();
        let request = Request::builder()
            .uri("/v1/ip/9.9.9.9")
            .body(Body::empty())
            .context("build request")?;
        let response = router.oneshot(request).await.expect("router service is infallible");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn lookup_rejects_bad_literals() -> Result<()> {
        let router = test_server().await?.router();
        let request = Request::builder()
            .uri("/v1/ip/not-an-address")
            .body(Body::empty())
            .context("build request")?;
        let response = router.oneshot(request).await.expect("router service is infallible");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
