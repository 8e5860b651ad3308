//! # Cardlink
//!
//! Session and protocol client for multiplayer card games.
//!
//! Cardlink keeps one long-lived WebSocket connection to an authoritative
//! game server and gives a UI four things on top of it:
//!
//! - **Request correlation**: every action is a request with its own id,
//!   settled exactly once by a reply, an error reply, or a timeout.
//! - **Reconnection**: a dropped connection is reopened and the session
//!   resumed with the persisted token, before any other command goes out.
//! - **State replacement**: server pushes replace the game snapshot
//!   wholesale, and subscribers see one consistent snapshot per push.
//! - **Rules advice**: [`rules`] answers "can this card be played?" for UI
//!   affordances. The server stays authoritative.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cardlink::prelude::*;
//!
//! # async fn demo() -> Result<(), ClientError> {
//! let client = GameClient::builder()
//!     .url("ws://127.0.0.1:8080/ws")
//!     .store(FileStore::new("session.json"))
//!     .connect()
//!     .await?;
//!
//! let _sub = client.subscribe(|state| println!("phase: {:?}", state.phase()));
//! client.join_game("ann", "abcd").await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod connection;
mod correlator;
mod error;
mod state;

pub use client::{GameClient, GameClientBuilder};
pub use config::{ClientConfig, DEFAULT_RECONNECT_DELAY, DEFAULT_REQUEST_TIMEOUT, DEFAULT_URL};
pub use correlator::{ReplyHandle, RequestCorrelator};
pub use error::ClientError;
pub use state::{ClientState, Phase, Subscription};

pub use cardlink_protocol as protocol;
pub use cardlink_rules as rules;
pub use cardlink_session as session;
pub use cardlink_transport as transport;

pub mod prelude {
    pub use crate::{ClientConfig, ClientError, ClientState, GameClient, GameClientBuilder, Phase, Subscription};

    pub use cardlink_protocol::{Card, Color, Command, GameSnapshot, GameStatus, InboundEnvelope, Rank, Verb};
    pub use cardlink_rules::{NextLegal, ScanDirection, Selection, is_legal_play, next_legal_index};
    pub use cardlink_session::{FileStore, KeyValueStore, MemoryStore};
}
