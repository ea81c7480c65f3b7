//! Call mediation: a synchronous call/response over fan-out topics
//!
//! The broker only offers fire-and-forget fan-out, so each call gets a
//! fresh single-use topic as its rendezvous point: subscribe first,
//! publish the call, block on the reply with a timeout. Presence is
//! checked before publishing so callers get a clean 404 instead of
//! publishing into the void, and responders get a distinguishable 410
//! when nobody is waiting anymore. The check-then-publish race is
//! inherent and bounded by the caller-visible timeout.

use axum::extract::rejection::BytesRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use bytes::Bytes;
use uuid::Uuid;

use crate::broker;
use crate::error::HubError;
use crate::event::Event;
use crate::identity::{self, Identity};
use crate::server::{AuthQuery, HubState};

/// Header naming the call a DELETE fulfills
pub const EVENT_ID_HEADER: &str = "x-event-id";

/// POST / — relay a call to `peer` and block for its response
pub(crate) async fn handle_call(
    State(state): State<HubState>,
    Extension(caller): Extension<Identity>,
    Query(query): Query<AuthQuery>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let Ok(body) = body else {
        return HubError::PayloadTooLarge.into_response();
    };
    let signature = query.signature.unwrap_or_default();
    if let Err(err) = identity::verify_payload(&caller, &body, &signature) {
        return err.into_response();
    }
    let peer = match query
        .peer
        .as_deref()
        .ok_or(HubError::BadIdentity)
        .and_then(Identity::from_base64)
    {
        Ok(peer) => peer,
        Err(err) => return err.into_response(),
    };

    // best-effort liveness check; the peer can still vanish before the
    // publish, in which case the caller sees the timeout
    let peer_topic = broker::peer_topic(&peer);
    match state.broker.subscriber_count(&peer_topic).await {
        Ok(0) => return HubError::NotFound.into_response(),
        Ok(_) => {}
        Err(err) => return err.into_response(),
    }

    let call_id = Uuid::new_v4().to_string();
    // subscribe before publishing so a fast responder cannot reply into
    // a topic nobody watches yet
    let mut reply = match state.broker.subscribe(&broker::call_topic(&call_id)).await {
        Ok(subscription) => subscription,
        Err(err) => return err.into_response(),
    };

    let event = Event::new(call_id.clone(), body);
    if let Err(err) = state.broker.publish(&peer_topic, event.encode()).await {
        return err.into_response();
    }
    tracing::debug!(caller = %caller, peer = %peer, call = %call_id, "call published");

    // every exit below drops `reply`, releasing the call topic
    match tokio::time::timeout(state.config.call_timeout, reply.recv()).await {
        Ok(Some(payload)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            payload,
        )
            .into_response(),
        Ok(None) => HubError::Broker("reply subscription closed".to_string()).into_response(),
        Err(_) => {
            tracing::debug!(call = %call_id, "call timed out");
            HubError::Timeout.into_response()
        }
    }
}

/// DELETE / — fulfill the call named by `X-Event-Id`
pub(crate) async fn finish_call(
    State(state): State<HubState>,
    Extension(responder): Extension<Identity>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let Ok(body) = body else {
        return HubError::PayloadTooLarge.into_response();
    };
    let signature = query.signature.unwrap_or_default();
    if let Err(err) = identity::verify_payload(&responder, &body, &signature) {
        return err.into_response();
    }

    let call_id = headers
        .get(EVENT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let topic = broker::call_topic(call_id);
    match state.broker.subscriber_count(&topic).await {
        Ok(0) => return HubError::Gone.into_response(),
        Ok(_) => {}
        Err(err) => return err.into_response(),
    }

    if let Err(err) = state.broker.publish(&topic, body).await {
        return err.into_response();
    }
    tracing::debug!(responder = %responder, call = %call_id, "call finished");
    StatusCode::NO_CONTENT.into_response()
}
