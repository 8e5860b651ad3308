//! The client state machine: the single source of truth the UI renders.
//!
//! State is held as an `Arc<ClientState>` and never patched in place. Every
//! mutation builds a complete new value, swaps it in, and only then
//! notifies subscribers, so no observer can see half of one server snapshot
//! and half of another.
//!
//! Alongside the persistent subscriber list sit one-shot waiters, for
//! callers that want "the next time the session opens" or "the next game
//! state" as a future instead of a callback.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use cardlink_protocol::{GameSnapshot, GameStatus, GameUpdate};
use tokio::sync::oneshot;

use crate::ClientError;

// ---------------------------------------------------------------------------
// ClientState
// ---------------------------------------------------------------------------

/// An immutable snapshot of everything the client knows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientState {
    /// `true` once the server has answered `openSession` on the current
    /// connection; `false` again as soon as the connection drops.
    pub connected: bool,
    pub session_id: Option<String>,
    pub player_name: Option<String>,
    pub is_host: bool,
    pub game_id: Option<String>,
    /// Human-friendly spelling of the game code.
    pub game_pneumonic: Option<String>,
    pub game: Option<GameSnapshot>,
}

impl ClientState {
    /// Which screen the UI should be showing.
    pub fn phase(&self) -> Phase {
        if !self.connected {
            return Phase::Disconnected;
        }
        match self.game.as_ref().map(|game| game.status) {
            None => Phase::Welcome,
            Some(GameStatus::Created) => Phase::Lobby,
            Some(GameStatus::Playing) => Phase::Playing,
            Some(GameStatus::Complete | GameStatus::Abandoned) => Phase::Summary,
        }
    }

    pub fn in_game(&self) -> bool {
        self.game.is_some()
    }
}

/// Coarse UI phase derived from [`ClientState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Disconnected,
    /// Connected, no game: create or join one.
    Welcome,
    Lobby,
    Playing,
    Summary,
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

type Callback = Arc<dyn Fn(&ClientState) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<(u64, Callback)>,
}

/// Keeps a subscriber registered. Dropping it unsubscribes.
///
/// Unsubscribing during a notification round doesn't disturb that round;
/// the callback simply isn't called on the next one.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    subscribers: Weak<Mutex<Subscribers>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            lock(&subscribers).entries.retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ---------------------------------------------------------------------------
// StateMachine
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Waiters {
    connection: Vec<oneshot::Sender<()>>,
    state: Vec<oneshot::Sender<Arc<ClientState>>>,
}

/// Owns the current [`ClientState`] and everyone watching it.
///
/// Lock order: `apply` → `current` / `subscribers` / `waiters`. The inner
/// locks are only ever held for a clone or a swap; `apply` is held for a
/// whole mutation including notification, which is what makes each
/// mutation atomic with respect to every other.
pub(crate) struct StateMachine {
    apply: Mutex<()>,
    current: Mutex<Arc<ClientState>>,
    subscribers: Arc<Mutex<Subscribers>>,
    waiters: Mutex<Waiters>,
}

impl StateMachine {
    pub(crate) fn new() -> Self {
        Self {
            apply: Mutex::new(()),
            current: Mutex::new(Arc::new(ClientState::default())),
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
            waiters: Mutex::new(Waiters::default()),
        }
    }

    pub(crate) fn current(&self) -> Arc<ClientState> {
        Arc::clone(&lock(&self.current))
    }

    pub(crate) fn subscribe(&self, callback: impl Fn(&ClientState) + Send + Sync + 'static) -> Subscription {
        let mut subscribers = lock(&self.subscribers);
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        let callback: Callback = Arc::new(callback);
        subscribers.entries.push((id, callback));
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).entries.len()
    }

    /// Session opened on the current connection.
    pub(crate) fn mark_open(&self, session_id: Option<String>) {
        let _apply = lock(&self.apply);
        self.replace(|state| {
            state.connected = true;
            if session_id.is_some() {
                state.session_id = session_id;
            }
        });
        let waiters = std::mem::take(&mut lock(&self.waiters).connection);
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }

    /// Connection dropped. The game is left as it was until the next
    /// session open says otherwise.
    pub(crate) fn mark_closed(&self) {
        let _apply = lock(&self.apply);
        if !self.current().connected {
            return;
        }
        self.replace(|state| state.connected = false);
    }

    pub(crate) fn set_player_name(&self, name: &str) {
        let _apply = lock(&self.apply);
        self.replace(|state| state.player_name = Some(name.to_string()));
    }

    /// State Replacement: an abandoned game clears `game` and keeps the
    /// identity fields; anything else swaps identity and snapshot together.
    pub(crate) fn apply_update(&self, update: GameUpdate) {
        let _apply = lock(&self.apply);
        let next = self.replace(|state| match update {
            GameUpdate::Abandoned => state.game = None,
            GameUpdate::Replace(replacement) => {
                state.game_id = replacement.game_id;
                state.game_pneumonic = replacement.game_pneumonic;
                state.game = Some(replacement.game);
                state.is_host = replacement.is_host;
            }
        });
        let waiters = std::mem::take(&mut lock(&self.waiters).state);
        for waiter in waiters {
            let _ = waiter.send(Arc::clone(&next));
        }
    }

    /// Resolves at the next session open, or immediately if one is open.
    pub(crate) fn wait_for_connection(&self) -> impl Future<Output = Result<(), ClientError>> + Send + use<> {
        let rx = {
            let _apply = lock(&self.apply);
            if self.current().connected {
                None
            } else {
                let (tx, rx) = oneshot::channel();
                lock(&self.waiters).connection.push(tx);
                Some(rx)
            }
        };
        async move {
            match rx {
                None => Ok(()),
                Some(rx) => rx.await.map_err(|_| ClientError::Closed),
            }
        }
    }

    /// Resolves with the state right after the next applied game update.
    pub(crate) fn wait_for_state(&self) -> impl Future<Output = Result<Arc<ClientState>, ClientError>> + Send + use<> {
        let (tx, rx) = oneshot::channel();
        {
            let _apply = lock(&self.apply);
            lock(&self.waiters).state.push(tx);
        }
        async move { rx.await.map_err(|_| ClientError::Closed) }
    }

    /// Drops every waiter so their futures fail with `Closed`.
    pub(crate) fn close_waiters(&self) {
        let _apply = lock(&self.apply);
        *lock(&self.waiters) = Waiters::default();
    }

    // Caller holds `apply`.
    fn replace(&self, mutate: impl FnOnce(&mut ClientState)) -> Arc<ClientState> {
        let next = {
            let mut current = lock(&self.current);
            let mut next = ClientState::clone(&current);
            mutate(&mut next);
            let next = Arc::new(next);
            *current = Arc::clone(&next);
            next
        };
        self.notify(&next);
        next
    }

    fn notify(&self, state: &ClientState) {
        let callbacks: Vec<Callback> = lock(&self.subscribers)
            .entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(state);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use cardlink_protocol::{Direction, GameReplacement, OtherPlayer, PlayerHand};

    fn snapshot(status: GameStatus, you: &[&str], others: &[(&str, usize)]) -> GameSnapshot {
        GameSnapshot {
            status,
            active_player: 0,
            direction: Direction::Clockwise,
            discard_top: Some("R5".parse().unwrap()),
            discard_pile_count: 1,
            draw_pile_count: 90,
            must_draw: 0,
            other_players: others
                .iter()
                .map(|(name, num_cards)| OtherPlayer {
                    name: name.to_string(),
                    num_cards: *num_cards,
                })
                .collect(),
            you: PlayerHand {
                name: "ann".into(),
                cards: you.iter().map(|c| c.parse().unwrap()).collect(),
            },
            wild_color: None,
        }
    }

    fn replace(game: GameSnapshot, is_host: bool) -> GameUpdate {
        GameUpdate::Replace(GameReplacement {
            game_id: Some("ABCD".into()),
            game_pneumonic: Some("able-baker".into()),
            game,
            is_host,
        })
    }

    #[test]
    fn test_initial_state_is_empty_and_disconnected() {
        let machine = StateMachine::new();
        let state = machine.current();
        assert_eq!(*state, ClientState::default());
        assert_eq!(state.phase(), Phase::Disconnected);
    }

    #[test]
    fn test_mark_open_sets_connected_and_session() {
        let machine = StateMachine::new();
        machine.mark_open(Some("s1".into()));
        let state = machine.current();
        assert!(state.connected);
        assert_eq!(state.session_id.as_deref(), Some("s1"));
        assert_eq!(state.phase(), Phase::Welcome);
    }

    #[test]
    fn test_mark_open_without_id_keeps_previous_session() {
        let machine = StateMachine::new();
        machine.mark_open(Some("s1".into()));
        machine.mark_closed();
        machine.mark_open(None);
        assert_eq!(machine.current().session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_mark_closed_keeps_game() {
        let machine = StateMachine::new();
        machine.mark_open(Some("s1".into()));
        machine.apply_update(replace(snapshot(GameStatus::Playing, &["R1"], &[("ann", 1)]), true));
        machine.mark_closed();

        let state = machine.current();
        assert!(!state.connected);
        assert!(state.game.is_some());
        assert_eq!(state.phase(), Phase::Disconnected);
    }

    #[test]
    fn test_replace_sets_identity_and_snapshot_together() {
        let machine = StateMachine::new();
        machine.apply_update(replace(snapshot(GameStatus::Created, &[], &[("ann", 0)]), true));

        let state = machine.current();
        assert_eq!(state.game_id.as_deref(), Some("ABCD"));
        assert_eq!(state.game_pneumonic.as_deref(), Some("able-baker"));
        assert!(state.is_host);
        assert_eq!(state.game.as_ref().unwrap().status, GameStatus::Created);
    }

    #[test]
    fn test_abandoned_clears_game_and_keeps_identity() {
        let machine = StateMachine::new();
        machine.mark_open(Some("s1".into()));
        machine.apply_update(replace(snapshot(GameStatus::Playing, &["R1"], &[("ann", 1)]), true));
        machine.apply_update(GameUpdate::Abandoned);

        let state = machine.current();
        assert!(state.game.is_none());
        assert_eq!(state.session_id.as_deref(), Some("s1"));
        assert_eq!(state.game_id.as_deref(), Some("ABCD"));
        assert!(state.is_host);
        assert_eq!(state.phase(), Phase::Welcome);
    }

    #[test]
    fn test_one_notification_per_update_with_consistent_snapshot() {
        let machine = StateMachine::new();
        machine.apply_update(replace(
            snapshot(GameStatus::Playing, &["R1", "G2"], &[("ann", 2), ("bob", 7)]),
            false,
        ));

        let seen: Arc<Mutex<Vec<ClientState>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let _sub = machine.subscribe(move |state| sink.lock().unwrap().push(state.clone()));

        machine.apply_update(replace(
            snapshot(GameStatus::Playing, &["Y9"], &[("ann", 1), ("bob", 6), ("cy", 3)]),
            false,
        ));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let game = seen[0].game.as_ref().unwrap();
        assert_eq!(game.you.cards.len(), 1);
        assert_eq!(game.other_players.len(), 3);
    }

    #[test]
    fn test_every_mutation_notifies() {
        let machine = StateMachine::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let _sub = machine.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        machine.mark_open(Some("s1".into()));
        machine.set_player_name("ann");
        machine.apply_update(GameUpdate::Abandoned);
        machine.mark_closed();
        // Already closed: nothing changes, nothing fires.
        machine.mark_closed();

        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_subscription_drop_unsubscribes() {
        let machine = StateMachine::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let sub = machine.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(machine.subscriber_count(), 1);

        machine.set_player_name("a");
        sub.unsubscribe();
        machine.set_player_name("b");

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(machine.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_during_notification_does_not_disturb_round() {
        let machine = StateMachine::new();
        let count = Arc::new(AtomicUsize::new(0));

        // The first subscriber drops the second one's handle mid-round.
        let second: Arc<Mutex<Option<Subscription>>> = Arc::default();
        let victim = Arc::clone(&second);
        let _first = machine.subscribe(move |_| {
            victim.lock().unwrap().take();
        });
        let counter = Arc::clone(&count);
        *second.lock().unwrap() = Some(machine.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        machine.set_player_name("a");
        assert_eq!(count.load(Ordering::SeqCst), 1);

        machine.set_player_name("b");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_for_connection_resolves_every_waiter() {
        let machine = StateMachine::new();
        let a = machine.wait_for_connection();
        let b = machine.wait_for_connection();
        machine.mark_open(Some("s1".into()));
        assert!(a.await.is_ok());
        assert!(b.await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_connection_is_immediate_when_open() {
        let machine = StateMachine::new();
        machine.mark_open(None);
        assert!(machine.wait_for_connection().await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_state_gets_applied_state() {
        let machine = StateMachine::new();
        let waiter = machine.wait_for_state();
        machine.apply_update(replace(snapshot(GameStatus::Created, &[], &[("ann", 0)]), true));

        let state = waiter.await.unwrap();
        assert_eq!(state.game_id.as_deref(), Some("ABCD"));
    }

    #[tokio::test]
    async fn test_close_waiters_fails_them_with_closed() {
        let machine = StateMachine::new();
        let conn = machine.wait_for_connection();
        let state = machine.wait_for_state();
        machine.close_waiters();
        assert!(matches!(conn.await, Err(ClientError::Closed)));
        assert!(matches!(state.await, Err(ClientError::Closed)));
    }

    #[test]
    fn test_phase_follows_game_status() {
        let mut state = ClientState {
            connected: true,
            ..ClientState::default()
        };
        for (status, phase) in [
            (GameStatus::Created, Phase::Lobby),
            (GameStatus::Playing, Phase::Playing),
            (GameStatus::Complete, Phase::Summary),
            (GameStatus::Abandoned, Phase::Summary),
        ] {
            state.game = Some(snapshot(status, &[], &[("ann", 0)]));
            assert_eq!(state.phase(), phase);
        }
    }
}
