//! # Flotilla
//!
//! Client core for the Flotilla battleship server.
//!
//! The server speaks a fixed-size binary protocol over WebSocket; this crate
//! owns everything between "call connect" and "a typed message reaches your
//! handler":
//!
//! 1. **Connection lifecycle** — dial, keepalive pings, bounded reconnect
//!    with re-authentication, logout ([`Client`])
//! 2. **Dispatch** — typed handlers per message type, registered and removed
//!    at runtime ([`DispatchBus`])
//! 3. **Auth flows** — login/register request-reply with timeout, token
//!    persistence via `flotilla-session`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flotilla::{Client, ClientConfig};
//! use flotilla::protocol::{Message, MsgType};
//! use flotilla::session::MemoryTokenStore;
//!
//! # async fn run() -> Result<(), flotilla::ClientError> {
//! let client = Client::new(
//!     ClientConfig::new("ws://localhost:8080"),
//!     Arc::new(MemoryTokenStore::new()),
//! );
//! client.on(MsgType::MoveResult, |msg| {
//!     if let Message::MoveResult(result) = msg {
//!         println!("shot at ({}, {}): hit={}", result.row, result.col, result.is_hit);
//!     }
//! });
//! client.connect().await?;
//! client.login("captain", "hunter2").await?;
//! client.join_queue()?;
//! # Ok(())
//! # }
//! ```

mod bus;
mod client;
mod config;
mod error;
mod state;

pub use bus::{DispatchBus, HandlerId};
pub use client::Client;
pub use config::ClientConfig;
pub use error::ClientError;
pub use state::ConnectionState;

pub use flotilla_protocol as protocol;
pub use flotilla_session as session;
pub use flotilla_transport as transport;
