//! Identity and detached signature verification
//!
//! An identity is a raw 32-byte Ed25519 public key. On the wire it is
//! URL-safe unpadded base64; in broker topic names it is lowercase hex.
//! Two verification modes share the same signature primitive:
//!
//! - subscription mode signs the ASCII decimal timestamp string and is
//!   bound to a freshness window (replay defense);
//! - payload mode signs the exact request body bytes with no window,
//!   one-shot calls carry no replay state to protect.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signature, VerifyingKey};
use std::fmt;
use std::time::{Duration, SystemTime};

use crate::error::{HubError, Result};
use crate::event::parse_unix_timestamp;

/// Raw length of a public key
pub const KEY_LEN: usize = 32;

/// A peer identity: a 32-byte Ed25519 public key.
///
/// Exists only for the duration of a request or stream; never persisted.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity([u8; KEY_LEN]);

impl Identity {
    /// Parse the canonical transport encoding (URL-safe base64, no padding)
    pub fn from_base64(s: &str) -> Result<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|_| HubError::BadIdentity)?;
        let key: [u8; KEY_LEN] = raw.try_into().map_err(|_| HubError::BadIdentity)?;
        Ok(Self(key))
    }

    pub fn from_bytes(key: [u8; KEY_LEN]) -> Self {
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Transport encoding, as carried in the `pubkey` and `peer` params
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }
}

/// Lowercase hex, used in broker topic names and rate-limit keys
impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({self})")
    }
}

/// Verify a detached signature (URL-safe base64) over `message`.
///
/// Fails closed: any decode error is a verification failure.
fn verify(identity: &Identity, message: &[u8], signature: &str) -> Result<()> {
    let key =
        VerifyingKey::from_bytes(identity.as_bytes()).map_err(|_| HubError::BadSignature)?;
    let raw = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| HubError::BadSignature)?;
    let sig = Signature::from_slice(&raw).map_err(|_| HubError::BadSignature)?;
    key.verify_strict(message, &sig)
        .map_err(|_| HubError::BadSignature)
}

/// Verify a streaming subscription: signature over the timestamp string,
/// then a freshness check. Stale and grossly-future timestamps are both
/// rejected.
pub fn verify_subscription(
    identity: &Identity,
    timestamp: &str,
    signature: &str,
    max_age: Duration,
) -> Result<()> {
    verify(identity, timestamp.as_bytes(), signature)?;
    let issued = parse_unix_timestamp(timestamp);
    let now = SystemTime::now();
    let skew = match now.duration_since(issued) {
        Ok(past) => past,
        Err(future) => future.duration(),
    };
    if skew > max_age {
        return Err(HubError::Expired);
    }
    Ok(())
}

/// Verify a one-shot call: signature over the exact body bytes.
pub fn verify_payload(identity: &Identity, body: &[u8], signature: &str) -> Result<()> {
    verify(identity, body, signature)
}
