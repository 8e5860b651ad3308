//! Session persistence for Cardlink.
//!
//! A client needs to remember exactly one thing between runs: the session
//! token the server handed out, so a restarted client can resume its game.
//!
//! 1. **Persistence capability**: [`KeyValueStore`] trait, with
//!    [`FileStore`] (survives restarts) and [`MemoryStore`] (tests).
//! 2. **Session token**: [`SessionStore`] reads and writes the token under
//!    a fixed key.
//!
//! # How it fits in the stack
//!
//! ```text
//! Client (above)  ← loads the token on connect, saves it on openSession reply
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Disk / memory (below)
//! ```

mod error;
mod session;
mod store;

pub use error::SessionError;
pub use session::{DEFAULT_SESSION_KEY, SessionStore};
pub use store::{FileStore, KeyValueStore, MemoryStore};
