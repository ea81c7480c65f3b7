//! Peerhub: a rendezvous relay for cryptographically-identified peers
//!
//! Two peers exchange a single request/response pair without either
//! needing a public address: the callee holds a long-lived server-push
//! stream open, the caller POSTs a signed payload, and the hub
//! correlates the two sides over an ephemeral broker topic. Signaling
//! only — no persistence, no routing, no delivery guarantees beyond
//! best-effort fan-out.
//!
//! The HTTP surface is one base path:
//!
//! - `GET /` opens a stream session (`pubkey`, `signature`, `timestamp`)
//! - `POST /` calls a connected `peer` and blocks for the reply
//! - `DELETE /` fulfills a call named by the `X-Event-Id` header

pub mod broker;
pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod limit;
mod mediate;
pub mod server;
mod stream;

pub use broker::{Broker, MemoryBroker, Subscription};
pub use config::Config;
pub use error::{HubError, Result};
pub use event::Event;
pub use identity::Identity;
pub use limit::RateLimiter;
pub use mediate::EVENT_ID_HEADER;
pub use server::Hub;
