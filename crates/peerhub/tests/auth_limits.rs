//! Authentication and rate-limit behavior over a live hub

mod common;

use common::*;
use peerhub::Config;

async fn get_stream_status(
    addr: std::net::SocketAddr,
    pubkey: &str,
    signature: &str,
    timestamp: &str,
) -> reqwest::StatusCode {
    let url =
        format!("http://{addr}/?pubkey={pubkey}&signature={signature}&timestamp={timestamp}");
    reqwest::get(&url).await.expect("request").status()
}

#[tokio::test]
async fn stale_timestamp_is_rejected_even_with_valid_signature() {
    let addr = spawn_hub(Config::default()).await;
    let subscriber = peer();

    let timestamp = (now_secs() - 120).to_string();
    let signature = sign(&subscriber.key, timestamp.as_bytes());
    let status = get_stream_status(
        addr,
        &subscriber.identity.to_base64(),
        &signature,
        &timestamp,
    )
    .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn future_timestamp_is_rejected() {
    let addr = spawn_hub(Config::default()).await;
    let subscriber = peer();

    let timestamp = (now_secs() + 120).to_string();
    let signature = sign(&subscriber.key, timestamp.as_bytes());
    let status = get_stream_status(
        addr,
        &subscriber.identity.to_base64(),
        &signature,
        &timestamp,
    )
    .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn wrong_key_signature_is_unauthorized() {
    let addr = spawn_hub(Config::default()).await;
    let subscriber = peer();
    let impostor = peer();

    let timestamp = now_secs().to_string();
    let signature = sign(&impostor.key, timestamp.as_bytes());
    let status = get_stream_status(
        addr,
        &subscriber.identity.to_base64(),
        &signature,
        &timestamp,
    )
    .await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn call_with_mismatched_body_signature_is_rejected() {
    let addr = spawn_hub(Config::default()).await;
    let callee = peer();
    let caller = peer();

    let _stream = open_stream(addr, &callee).await;

    // signature over different bytes than the body sent
    let url = format!(
        "http://{addr}/?pubkey={}&signature={}&peer={}",
        caller.identity.to_base64(),
        sign(&caller.key, b"signed this"),
        callee.identity.to_base64()
    );
    let response = reqwest::Client::new()
        .post(url)
        .body(&b"sent that"[..])
        .send()
        .await
        .expect("post");
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn flooding_identity_is_limited_while_others_pass() {
    let config = Config {
        rate: 0.0,
        burst: 3.0,
        ..Config::default()
    };
    let addr = spawn_hub(config).await;
    let flooder = peer();
    let bystander = peer();

    // burn the flooder's burst; auth fails with 401 but each request
    // spends a token first
    let timestamp = now_secs().to_string();
    for _ in 0..3 {
        let status =
            get_stream_status(addr, &flooder.identity.to_base64(), "bogus", &timestamp).await;
        assert_eq!(status, 401);
    }
    let status = get_stream_status(addr, &flooder.identity.to_base64(), "bogus", &timestamp).await;
    assert_eq!(status, 429);

    // a different identity is unaffected
    let status =
        get_stream_status(addr, &bystander.identity.to_base64(), "bogus", &timestamp).await;
    assert_eq!(status, 401);
}
