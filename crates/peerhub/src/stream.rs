//! Stream session: one long-lived server-push connection per identity
//!
//! On open, the session authenticates, subscribes the identity's peer
//! topic and starts emitting SSE bytes: an immediate inert comment (so
//! buffering proxies release the response), a comment heartbeat, and
//! every broker message verbatim plus the terminating newline. There is
//! no buffering and no replay; messages published while nobody is
//! subscribed are lost by design, which is why callers check presence
//! first.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use bytes::Bytes;
use std::convert::Infallible;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt as _;

use crate::broker;
use crate::error::HubError;
use crate::identity::{self, Identity};
use crate::server::{AuthQuery, HubState};

/// Comment frame: ignored by SSE parsers, defeats intermediaries that
/// withhold the first bytes, and doubles as the keep-alive.
fn comment_frame() -> Bytes {
    Bytes::from_static(b": keep-alive\n\n")
}

/// GET / — open a stream session for the verified identity
pub(crate) async fn subscribe(
    State(state): State<HubState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<AuthQuery>,
) -> Response {
    let signature = query.signature.unwrap_or_default();
    let timestamp = query.timestamp.unwrap_or_default();
    if let Err(err) = identity::verify_subscription(
        &identity,
        &timestamp,
        &signature,
        state.config.subscription_max_age,
    ) {
        // a failed signature on a stream open is an auth failure rather
        // than a malformed request
        let status = match err {
            HubError::BadSignature => StatusCode::UNAUTHORIZED,
            _ => err.status(),
        };
        return err.respond(status);
    }

    let topic = broker::peer_topic(&identity);
    let subscription = match state.broker.subscribe(&topic).await {
        Ok(subscription) => subscription,
        Err(err) => return err.into_response(),
    };
    tracing::debug!(peer = %identity, "stream session opened");

    let hello = tokio_stream::once(comment_frame());
    let heartbeat = IntervalStream::new(tokio::time::interval_at(
        tokio::time::Instant::now() + state.config.heartbeat,
        state.config.heartbeat,
    ))
    .map(|_| comment_frame());
    let frames = subscription.into_stream().map(|payload| {
        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.extend_from_slice(&payload);
        frame.push(b'\n');
        Bytes::from(frame)
    });

    // The subscription lives inside the body stream: client disconnect
    // or shutdown drops the body and releases it on every exit path.
    let body = Body::from_stream(
        hello
            .chain(frames.merge(heartbeat))
            .map(Ok::<_, Infallible>),
    );
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}
