//! Session persistence for Flotilla.
//!
//! This crate handles the client side of staying logged in:
//!
//! 1. **Token storage** — keeping the issued JWT between runs
//!    ([`TokenStore`] trait)
//! 2. **Session metadata** — who is logged in and until when
//!    ([`StoredSession`])
//!
//! The server issues the token; this crate never creates or validates one.
//! It only decides where the token lives ([`FileTokenStore`] on disk,
//! [`MemoryTokenStore`] in tests) and whether it is still worth presenting
//! to the server at all.

mod error;
mod store;

pub use error::SessionError;
pub use store::{FileTokenStore, MemoryTokenStore, StoredSession, TokenStore};
