//! HTTP surface: router, shared state and the access-control pipeline
//!
//! Requests flow through body-size limiting, CORS, identity extraction
//! and per-identity rate limiting before reaching a handler. The stream
//! session and the call mediator never talk to each other directly;
//! they meet only through the broker, which is what lets them run in
//! different replicas.

use axum::extract::{DefaultBodyLimit, Query, Request, State};
use axum::http::{header, HeaderName, Method};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::broker::Broker;
use crate::config::Config;
use crate::error::HubError;
use crate::identity::Identity;
use crate::limit::RateLimiter;
use crate::{mediate, stream};

/// Shared state cloned into every handler
#[derive(Clone)]
pub(crate) struct HubState {
    pub(crate) broker: Arc<dyn Broker>,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) config: Arc<Config>,
}

/// Signed query parameters carried by every protected route.
///
/// Presence requirements differ per route, so everything is optional
/// here and enforced where it is consumed.
#[derive(Debug, Deserialize)]
pub(crate) struct AuthQuery {
    pub(crate) pubkey: Option<String>,
    pub(crate) signature: Option<String>,
    pub(crate) timestamp: Option<String>,
    pub(crate) peer: Option<String>,
}

/// The rendezvous hub: one base path, three verbs.
pub struct Hub {
    state: HubState,
}

impl Hub {
    pub fn new(broker: Arc<dyn Broker>, config: Config) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            config.rate,
            config.burst,
            config.idle_expiry,
        ));
        Self {
            state: HubState {
                broker,
                limiter,
                config: Arc::new(config),
            },
        }
    }

    /// Build the router with the full middleware pipeline
    pub fn router(&self) -> Router {
        let protected = Router::new()
            .route(
                "/",
                get(stream::subscribe)
                    .post(mediate::handle_call)
                    .delete(mediate::finish_call),
            )
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                rate_limit,
            ))
            .layer(middleware::from_fn(extract_identity))
            .with_state(self.state.clone());

        Router::new()
            .route("/health", get(health))
            .merge(protected)
            .layer(
                tower::ServiceBuilder::new()
                    .layer(tower_http::trace::TraceLayer::new_for_http())
                    .layer(DefaultBodyLimit::max(self.state.config.body_limit))
                    .layer(cors_layer()),
            )
    }

    /// Serve until the listener fails or the process is shut down
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, self.router()).await
    }
}

/// Decode the claimed public key and attach it for downstream layers
async fn extract_identity(
    Query(query): Query<AuthQuery>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match query
        .pubkey
        .as_deref()
        .ok_or(HubError::BadIdentity)
        .and_then(Identity::from_base64)
    {
        Ok(identity) => identity,
        Err(err) => return err.into_response(),
    };
    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// One token per request, keyed by the verified identity
async fn rate_limit(
    State(state): State<HubState>,
    Extension(identity): Extension<Identity>,
    request: Request,
    next: Next,
) -> Response {
    if !state.limiter.allow(&identity.to_string()) {
        return HubError::RateLimited.into_response();
    }
    next.run(request).await
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            HeaderName::from_static("x-event-id"),
            header::CACHE_CONTROL,
            HeaderName::from_static("last-event-id"),
            header::CONTENT_TYPE,
        ])
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}
