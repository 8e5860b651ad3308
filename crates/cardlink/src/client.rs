//! `GameClient` builder and the public action API.
//!
//! This is the entry point for a UI. It ties the layers together:
//! transport → protocol → correlator → state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cardlink_protocol::{Codec, Color, Command, Envelope, InboundEnvelope, Verb};
use cardlink_session::{KeyValueStore, MemoryStore, SessionStore};
use cardlink_transport::{Connector, WebSocketConnector};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::connection::{self, Shared};
use crate::state::{ClientState, Subscription};
use crate::{ClientConfig, ClientError};

/// Builder for configuring and starting a [`GameClient`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use cardlink::prelude::*;
///
/// # async fn demo() -> Result<(), ClientError> {
/// let client = GameClient::builder()
///     .url("ws://127.0.0.1:8080/ws")
///     .request_timeout(Duration::from_secs(5))
///     .store(FileStore::new("session.json"))
///     .connect()
///     .await?;
///
/// client.create_game("ann").await?;
/// # Ok(())
/// # }
/// ```
pub struct GameClientBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl GameClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            store: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    pub fn session_key(mut self, key: impl Into<String>) -> Self {
        self.config.session_key = key.into();
        self
    }

    /// Where the session token is persisted. Without one the token lives
    /// in memory and a restarted client starts a new session.
    pub fn store(mut self, store: impl KeyValueStore) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Same as [`store`](Self::store) for a store the caller keeps a handle to.
    pub fn shared_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Starts the connection loop against the configured WebSocket URL and
    /// returns immediately. Must be called inside a Tokio runtime.
    pub fn spawn(self) -> GameClient {
        let connector = WebSocketConnector::new(self.config.url.clone());
        self.spawn_with(connector)
    }

    /// Starts the connection loop over any [`Connector`].
    pub fn spawn_with<C: Connector>(self, connector: C) -> GameClient {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);
        let sessions = SessionStore::with_key(store, self.config.session_key.clone());
        let shared = Arc::new(Shared::new(self.config, sessions));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let driver = tokio::spawn(connection::run(Arc::clone(&shared), connector, shutdown_rx));

        GameClient {
            shared,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            driver: Mutex::new(Some(driver)),
            closed: AtomicBool::new(false),
        }
    }

    /// Like [`spawn`](Self::spawn), then waits (up to the request timeout)
    /// for the first session to open.
    ///
    /// # Errors
    /// [`ClientError::NotConnected`] if no session opened in time. The
    /// connection loop is stopped before returning.
    pub async fn connect(self) -> Result<GameClient, ClientError> {
        let client = self.spawn();
        client.opened().await?;
        Ok(client)
    }

    /// [`connect`](Self::connect) over any [`Connector`].
    pub async fn connect_with<C: Connector>(self, connector: C) -> Result<GameClient, ClientError> {
        let client = self.spawn_with(connector);
        client.opened().await?;
        Ok(client)
    }
}

impl Default for GameClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A connected game client.
///
/// Owns a background task that keeps the connection alive. Dropping the
/// client stops that task; [`shutdown`](Self::shutdown) does the same and
/// waits for it to finish.
pub struct GameClient {
    shared: Arc<Shared>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl GameClient {
    /// Creates a new builder.
    pub fn builder() -> GameClientBuilder {
        GameClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    // -----------------------------------------------------------------------
    // State observation
    // -----------------------------------------------------------------------

    /// The latest state snapshot.
    pub fn current_state(&self) -> Arc<ClientState> {
        self.shared.state.current()
    }

    /// Calls `callback` with the new state after every mutation, until the
    /// returned [`Subscription`] is dropped.
    ///
    /// Callbacks run on the connection task, one mutation at a time. They
    /// must not block.
    pub fn subscribe(
        &self,
        callback: impl Fn(&ClientState) + Send + Sync + 'static,
    ) -> Subscription {
        self.shared.state.subscribe(callback)
    }

    /// Resolves when a session is open (immediately if one already is).
    pub async fn wait_for_connection(&self) -> Result<(), ClientError> {
        self.ensure_open()?;
        self.shared.state.wait_for_connection().await
    }

    /// Resolves with the state right after the next game update is applied.
    pub async fn wait_for_state(&self) -> Result<Arc<ClientState>, ClientError> {
        self.ensure_open()?;
        self.shared.state.wait_for_state().await
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.shared.correlator.pending_count()
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Creates a new game hosted by `player_name`.
    pub async fn create_game(&self, player_name: &str) -> Result<InboundEnvelope, ClientError> {
        self.opened_for(Verb::CreateGame).await?;
        self.shared.state.set_player_name(player_name);
        self.request(Command::CreateGame {
            player_name: player_name.to_string(),
        })
        .await
    }

    /// Joins the game identified by `game_code`. The code is trimmed and
    /// upper-cased before sending.
    pub async fn join_game(
        &self,
        player_name: &str,
        game_code: &str,
    ) -> Result<InboundEnvelope, ClientError> {
        self.opened_for(Verb::JoinGame).await?;
        self.shared.state.set_player_name(player_name);
        self.request(Command::join_game(game_code, player_name)).await
    }

    /// Leaves the current game.
    ///
    /// # Errors
    /// [`ClientError::NotInGame`] without contacting the server when no game
    /// is held.
    pub async fn leave_game(&self) -> Result<InboundEnvelope, ClientError> {
        let state = self.current_state();
        let (Some(_), Some(game_id)) = (&state.game, &state.game_id) else {
            return Err(ClientError::NotInGame);
        };
        self.request(Command::LeaveGame {
            game_id: game_id.clone(),
            player_name: state.player_name.clone().unwrap_or_default(),
        })
        .await
    }

    pub async fn start_game(&self) -> Result<InboundEnvelope, ClientError> {
        self.request(Command::StartGame).await
    }

    pub async fn end_game(&self) -> Result<InboundEnvelope, ClientError> {
        self.request(Command::EndGame).await
    }

    /// Plays the card at `card_index` in your hand. `wild_color` is the
    /// color chosen for a wild card and ignored by the server otherwise.
    pub async fn play_card(
        &self,
        card_index: usize,
        wild_color: Option<Color>,
    ) -> Result<InboundEnvelope, ClientError> {
        self.request(Command::PlayCard {
            card_index,
            wild_color: wild_color.map(|c| c.to_string()).unwrap_or_default(),
        })
        .await
    }

    pub async fn draw_card(&self) -> Result<InboundEnvelope, ClientError> {
        self.request(Command::DrawCard).await
    }

    pub async fn done_drawing(&self) -> Result<InboundEnvelope, ClientError> {
        self.request(Command::DoneDrawing).await
    }

    /// Sends any command and waits for its reply.
    ///
    /// Waits (up to the request timeout) for a session to be open, then
    /// registers the request and queues the frame. A game status carried by
    /// the reply has already been applied when this returns.
    pub async fn request(&self, command: Command) -> Result<InboundEnvelope, ClientError> {
        let (verb, data) = command.into_parts();
        self.opened_for(verb.clone()).await?;

        let handle = self.shared.correlator.register(verb.clone(), data.clone());
        let request_id = handle.request_id().clone();
        let envelope = Envelope {
            verb,
            data,
            request_id: request_id.clone(),
        };

        match self.shared.codec.encode_text(&envelope) {
            Ok(frame) => {
                if !self.shared.send_frame(frame) {
                    tracing::debug!(%request_id, "no open session; request left to time out");
                }
            }
            Err(e) => {
                self.shared.correlator.reject(&request_id, e.into());
            }
        }

        handle.wait().await
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Stops the connection loop and waits for it to exit. Pending requests
    /// and waiters fail with [`ClientError::Closed`]; so does every later
    /// action. Calling it twice is harmless.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("client shutdown requested");

        let tx = self.shutdown_tx.lock().ok().and_then(|mut tx| tx.take());
        if let Some(tx) = tx {
            let _ = tx.send(());
        }
        let driver = self.driver.lock().ok().and_then(|mut driver| driver.take());
        if let Some(driver) = driver {
            if let Err(e) = driver.await {
                tracing::warn!(error = %e, "connection task ended abnormally");
            }
        }

        self.shared.correlator.close_all();
        self.shared.state.close_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.is_closed() {
            Err(ClientError::Closed)
        } else {
            Ok(())
        }
    }

    async fn opened(&self) -> Result<(), ClientError> {
        if let Err(e) = self.opened_for(Verb::OpenSession).await {
            self.shutdown().await;
            return Err(e);
        }
        Ok(())
    }

    async fn opened_for(&self, verb: Verb) -> Result<(), ClientError> {
        self.ensure_open()?;
        let wait = self.shared.state.wait_for_connection();
        match tokio::time::timeout(self.shared.config.request_timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::NotConnected { verb }),
        }
    }
}

impl std::fmt::Debug for GameClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameClient")
            .field("url", &self.shared.config.url)
            .field("closed", &self.is_closed())
            .field("pending", &self.pending_requests())
            .finish()
    }
}
