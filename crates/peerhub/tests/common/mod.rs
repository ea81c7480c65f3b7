//! Shared helpers for hub integration tests: key generation, request
//! signing and a minimal SSE client.
#![allow(dead_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey};
use peerhub::{Config, Hub, Identity, MemoryBroker};
use rand::rngs::OsRng;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub struct Peer {
    pub key: SigningKey,
    pub identity: Identity,
}

pub fn peer() -> Peer {
    let key = SigningKey::generate(&mut OsRng);
    let identity = Identity::from_bytes(key.verifying_key().to_bytes());
    Peer { key, identity }
}

pub fn sign(key: &SigningKey, message: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(key.sign(message).to_bytes())
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs()
}

/// Bind an ephemeral port and run the hub on it
pub async fn spawn_hub(config: Config) -> SocketAddr {
    let hub = Hub::new(Arc::new(MemoryBroker::new()), config);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(hub.serve(listener));
    addr
}

/// Open an authenticated stream session; panics on non-200
pub async fn open_stream(addr: SocketAddr, peer: &Peer) -> SseReader {
    let timestamp = now_secs().to_string();
    let signature = sign(&peer.key, timestamp.as_bytes());
    let url = format!(
        "http://{addr}/?pubkey={}&signature={}&timestamp={}",
        peer.identity.to_base64(),
        signature,
        timestamp
    );
    let response = reqwest::get(&url).await.expect("open stream");
    assert_eq!(response.status(), 200, "stream open failed");
    SseReader {
        response,
        buffer: Vec::new(),
    }
}

/// POST a signed call to `target` and return the pending response
pub async fn post_call(
    addr: SocketAddr,
    caller: &Peer,
    target: &Identity,
    body: &[u8],
) -> reqwest::Response {
    let url = format!(
        "http://{addr}/?pubkey={}&signature={}&peer={}",
        caller.identity.to_base64(),
        sign(&caller.key, body),
        target.to_base64()
    );
    reqwest::Client::new()
        .post(url)
        .body(body.to_vec())
        .send()
        .await
        .expect("post call")
}

/// DELETE with a signed response payload for `call_id`
pub async fn finish_call(
    addr: SocketAddr,
    responder: &Peer,
    call_id: &str,
    body: &[u8],
) -> reqwest::Response {
    let url = format!(
        "http://{addr}/?pubkey={}&signature={}",
        responder.identity.to_base64(),
        sign(&responder.key, body)
    );
    reqwest::Client::new()
        .delete(url)
        .header("X-Event-Id", call_id)
        .body(body.to_vec())
        .send()
        .await
        .expect("finish call")
}

#[derive(Debug)]
pub struct SseEvent {
    pub id: String,
    pub data: Vec<u8>,
}

/// Just enough of an SSE parser to reconstruct id/data fields the way a
/// compliant EventSource client would. Comment frames are skipped.
pub struct SseReader {
    response: reqwest::Response,
    buffer: Vec<u8>,
}

impl SseReader {
    pub async fn next_event(&mut self) -> SseEvent {
        loop {
            if let Some(event) = self.take_event() {
                return event;
            }
            let chunk = tokio::time::timeout(Duration::from_secs(5), self.response.chunk())
                .await
                .expect("stream stalled")
                .expect("stream error")
                .expect("stream closed");
            self.buffer.extend_from_slice(&chunk);
        }
    }

    fn take_event(&mut self) -> Option<SseEvent> {
        while let Some(end) = find(&self.buffer, b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&block[..end]).into_owned();
            let mut id = String::new();
            let mut data_lines: Vec<String> = Vec::new();
            let mut has_data = false;
            for line in text.lines() {
                if let Some(rest) = line.strip_prefix("id:") {
                    id = rest.to_string();
                } else if let Some(rest) = line.strip_prefix("data:") {
                    has_data = true;
                    data_lines.push(rest.to_string());
                }
            }
            if has_data || !id.is_empty() {
                let data = data_lines.join("\n").replace("\\r", "\r").into_bytes();
                return Some(SseEvent { id, data });
            }
        }
        None
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
