//! Session/message store — single source of truth for one chat "tab".
//!
//! DESIGN
//! ======
//! `ChatStore` is a cheap `Clone` handle over shared state. It owns the
//! live session, the ordered message log, and the loading/error flags, and
//! mirrors session + history into tab-scoped storage. Every mutation goes
//! through a store method; the dispatcher and views never write storage.
//!
//! State is guarded by a plain mutex. Mutations collect the events they
//! produce and broadcast them only after the lock is released, so listeners
//! are free to read the store from inside their callback.
//!
//! ERROR HANDLING
//! ==============
//! Mutations never fail. Storage read/write problems are logged and the
//! in-memory state stays authoritative.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::{PersistenceMode, StoreConfig};
use crate::error::ChatError;
use crate::events::{Subscription, SyncHub};
use crate::storage::{MESSAGES_KEY, MemoryStorage, SESSION_KEY, SessionStorage, StorageError};
use crate::types::{ChatHistory, Message, NewMessage, Session, SharedChatState, SyncEvent};

/// Session id reported by exports when no session is live.
pub const UNKNOWN_SESSION_ID: &str = "unknown";

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

// =============================================================================
// STATE
// =============================================================================

struct StoreState {
    session: Option<Session>,
    /// Set once the live session completed a round trip; gates sending
    /// `session_id` to the endpoint.
    session_confirmed: bool,
    messages: VecDeque<Message>,
    is_loading: bool,
    error: Option<String>,
    last_sync: DateTime<Utc>,
}

struct StoreShared {
    state: Mutex<StoreState>,
    hub: SyncHub,
    storage: Arc<dyn SessionStorage>,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Clone)]
pub struct ChatStore {
    inner: Arc<StoreShared>,
}

impl ChatStore {
    /// Build a store over `storage`. In [`PersistenceMode::Fresh`] the
    /// storage keys are wiped; in [`PersistenceMode::Restore`] a still-valid
    /// session and its history are loaded back.
    #[must_use]
    pub fn new(config: StoreConfig, storage: Arc<dyn SessionStorage>, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let mut state = StoreState {
            session: None,
            session_confirmed: false,
            messages: VecDeque::new(),
            is_loading: false,
            error: None,
            last_sync: now,
        };

        match config.persistence {
            PersistenceMode::Fresh => remove_keys(storage.as_ref()),
            PersistenceMode::Restore => restore(&mut state, storage.as_ref(), &config, now),
        }

        Self {
            inner: Arc::new(StoreShared { state: Mutex::new(state), hub: SyncHub::new(), storage, clock, config }),
        }
    }

    /// Store backed by process memory and the system clock.
    #[must_use]
    pub fn in_memory(config: StoreConfig) -> Self {
        Self::new(config, Arc::new(MemoryStorage::new()), Arc::new(SystemClock))
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    /// Return the live session, creating one if none exists or it expired.
    pub fn current_session(&self) -> Session {
        let mut state = self.lock();
        let now = self.inner.clock.now();
        if let Some(session) = state.session.as_ref() {
            if session.is_valid_at(now, self.session_timeout()) {
                return session.clone();
            }
            debug!(session_id = %session.session_id, "chat session expired");
        }
        self.create_session_locked(&mut state, now)
    }

    /// Discard the session and history, then start a fresh session.
    pub fn start_new_session(&self) -> Session {
        let session = {
            let mut state = self.lock();
            self.reset_locked(&mut state);
            let now = self.inner.clock.now();
            self.create_session_locked(&mut state, now)
        };
        self.emit(&SyncEvent::MessagesCleared);
        self.emit(&SyncEvent::SessionChanged(Some(session.clone())));
        session
    }

    /// Invalidate the session and clear history without a replacement.
    pub fn end_session(&self) {
        let ended = {
            let mut state = self.lock();
            let ended = state.session.as_ref().map(|s| s.session_id.clone());
            self.reset_locked(&mut state);
            ended
        };
        if let Some(session_id) = ended {
            info!(%session_id, "chat session ended");
        }
        self.emit(&SyncEvent::MessagesCleared);
        self.emit(&SyncEvent::SessionChanged(None));
    }

    /// The live session if it is still valid. Never creates one.
    #[must_use]
    pub fn session_info(&self) -> Option<Session> {
        let state = self.lock();
        let now = self.inner.clock.now();
        state
            .session
            .as_ref()
            .filter(|s| s.is_valid_at(now, self.session_timeout()))
            .cloned()
    }

    #[must_use]
    pub fn has_active_session(&self) -> bool {
        self.session_info().is_some()
    }

    /// Refresh `last_activity` after a successful round trip.
    pub fn touch_session(&self) {
        let mut state = self.lock();
        let now = self.inner.clock.now();
        if let Some(session) = state.session.as_mut() {
            session.last_activity = now;
            let snapshot = session.clone();
            self.persist_session(&snapshot);
        }
    }

    /// Adopt an id the endpoint assigned. Returns `true` when it differed.
    pub fn adopt_session_id(&self, session_id: &str) -> bool {
        let changed = {
            let mut state = self.lock();
            match state.session.as_mut() {
                Some(session) if session.session_id != session_id => {
                    debug!(from = %session.session_id, to = %session_id, "adopting server session id");
                    session.session_id = session_id.to_string();
                    let snapshot = session.clone();
                    self.persist_session(&snapshot);
                    Some(snapshot)
                }
                _ => None,
            }
        };
        match changed {
            Some(session) => {
                self.emit(&SyncEvent::SessionChanged(Some(session)));
                true
            }
            None => false,
        }
    }

    pub fn mark_session_confirmed(&self) {
        self.lock().session_confirmed = true;
    }

    /// Whether the live session has completed at least one round trip.
    #[must_use]
    pub fn session_confirmed(&self) -> bool {
        self.lock().session_confirmed
    }

    // -------------------------------------------------------------------------
    // Messages
    // -------------------------------------------------------------------------

    /// Append a message stamped with the live session id, evicting the
    /// oldest entries beyond the history cap.
    pub fn add_message(&self, new: NewMessage) -> Message {
        let (message, count) = {
            let mut state = self.lock();
            self.append_locked(&mut state, new)
        };
        self.emit_appended(message.clone(), count);
        message
    }

    /// Append only when the log is empty. Used for greeting seeds so that
    /// several views reacting to the same reset add a single message.
    pub fn add_message_if_empty(&self, new: NewMessage) -> Option<Message> {
        let (message, count) = {
            let mut state = self.lock();
            if !state.messages.is_empty() {
                return None;
            }
            self.append_locked(&mut state, new)
        };
        self.emit_appended(message.clone(), count);
        Some(message)
    }

    /// Apply a reply to the session it was sent under. Refreshes activity,
    /// marks the session confirmed, adopts `server_session_id` when it
    /// differs, and appends the bot message.
    ///
    /// Returns `None` without touching anything if the live session is no
    /// longer `sent_session_id` (reset or ended while the request was out).
    pub fn reconcile_reply(
        &self,
        sent_session_id: &str,
        server_session_id: Option<&str>,
        text: String,
    ) -> Option<Message> {
        let (adopted, message, count) = {
            let mut state = self.lock();
            let now = self.inner.clock.now();
            let session = state
                .session
                .as_mut()
                .filter(|s| s.session_id == sent_session_id)?;

            session.last_activity = now;
            let adopted = match server_session_id {
                Some(server_id) if server_id != session.session_id => {
                    debug!(from = %session.session_id, to = %server_id, "adopting server session id");
                    session.session_id = server_id.to_string();
                    true
                }
                _ => false,
            };
            let snapshot = session.clone();
            self.persist_session(&snapshot);
            state.session_confirmed = true;

            let (message, count) = self.append_locked(&mut state, NewMessage::bot(text));
            (adopted.then_some(snapshot), message, count)
        };
        if let Some(session) = adopted {
            self.emit(&SyncEvent::SessionChanged(Some(session)));
        }
        self.emit_appended(message.clone(), count);
        Some(message)
    }

    pub fn clear_message_history(&self) {
        {
            let mut state = self.lock();
            state.messages.clear();
            let now = self.inner.clock.now();
            self.persist_history_locked(&mut state, now);
        }
        self.emit(&SyncEvent::StateUpdated { message_count: 0 });
        self.emit(&SyncEvent::MessagesCleared);
    }

    #[must_use]
    pub fn message_history(&self) -> Vec<Message> {
        self.lock().messages.iter().cloned().collect()
    }

    #[must_use]
    pub fn message_count(&self) -> usize {
        self.lock().messages.len()
    }

    #[must_use]
    pub fn has_messages(&self) -> bool {
        !self.lock().messages.is_empty()
    }

    /// Snapshot for download/export.
    #[must_use]
    pub fn export_message_history(&self) -> ChatHistory {
        let state = self.lock();
        ChatHistory {
            messages: state.messages.iter().cloned().collect(),
            last_updated: self.inner.clock.now(),
            session_id: state
                .session
                .as_ref()
                .map_or_else(|| UNKNOWN_SESSION_ID.to_string(), |s| s.session_id.clone()),
        }
    }

    // -------------------------------------------------------------------------
    // Loading / errors / sync
    // -------------------------------------------------------------------------

    /// Flip the loading flag and announce it. Starting a load clears any
    /// previous error.
    pub fn set_loading(&self, loading: bool) {
        {
            let mut state = self.lock();
            state.is_loading = loading;
            if loading {
                state.error = None;
            }
        }
        let event = if loading { SyncEvent::LoadingStarted } else { SyncEvent::LoadingStopped };
        self.emit(&event);
    }

    pub fn report_error(&self, error: &ChatError) {
        let message = error.to_string();
        self.lock().error = Some(message.clone());
        self.emit(&SyncEvent::ErrorOccurred { message, kind: error.kind() });
    }

    #[must_use]
    pub fn get_shared_chat_state(&self) -> SharedChatState {
        let state = self.lock();
        SharedChatState {
            current_session: state.session.clone(),
            message_history: state.messages.iter().cloned().collect(),
            is_loading: state.is_loading,
            error: state.error.clone(),
            last_sync_timestamp: state.last_sync,
        }
    }

    /// Register a change listener; the returned handle deregisters it.
    pub fn add_sync_listener(&self, listener: impl Fn(&SyncEvent) + Send + Sync + 'static) -> Subscription {
        self.inner.hub.subscribe(listener)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.hub.listener_count()
    }

    /// Ask every view to resync from the current snapshot.
    pub fn force_sync(&self) {
        let count = self.message_count();
        self.emit(&SyncEvent::StateUpdated { message_count: count });
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn emit(&self, event: &SyncEvent) {
        self.inner.hub.emit(event);
    }

    fn append_locked(&self, state: &mut StoreState, new: NewMessage) -> (Message, usize) {
        let now = self.inner.clock.now();
        let message = Message {
            id: format!("msg_{}", Uuid::new_v4().simple()),
            text: new.text,
            is_bot: new.is_bot,
            timestamp: new.timestamp.unwrap_or(now),
            session_id: state.session.as_ref().map(|s| s.session_id.clone()),
        };
        state.messages.push_back(message.clone());
        while state.messages.len() > self.inner.config.max_history {
            state.messages.pop_front();
        }
        self.persist_history_locked(state, now);
        (message, state.messages.len())
    }

    fn emit_appended(&self, message: Message, count: usize) {
        self.emit(&SyncEvent::StateUpdated { message_count: count });
        self.emit(&SyncEvent::MessageAdded(message));
    }

    fn session_timeout(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.inner.config.session_timeout).unwrap_or(chrono::Duration::MAX)
    }

    fn create_session_locked(&self, state: &mut StoreState, now: DateTime<Utc>) -> Session {
        let session = Session { session_id: generate_session_id(now), created_at: now, last_activity: now, is_active: true };
        info!(session_id = %session.session_id, "chat session created");
        state.session = Some(session.clone());
        state.session_confirmed = false;
        self.persist_session(&session);
        session
    }

    fn reset_locked(&self, state: &mut StoreState) {
        state.session = None;
        state.session_confirmed = false;
        state.messages.clear();
        remove_keys(self.inner.storage.as_ref());
    }

    fn persist_session(&self, session: &Session) {
        write_json(self.inner.storage.as_ref(), SESSION_KEY, session);
    }

    fn persist_history_locked(&self, state: &mut StoreState, now: DateTime<Utc>) {
        let record = ChatHistory {
            messages: state.messages.iter().cloned().collect(),
            last_updated: now,
            session_id: state
                .session
                .as_ref()
                .map(|s| s.session_id.clone())
                .unwrap_or_default(),
        };
        write_json(self.inner.storage.as_ref(), MESSAGES_KEY, &record);
        state.last_sync = now;
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// `session_<unix-millis>_<9 base36 chars>`.
pub(crate) fn generate_session_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect();
    format!("session_{}_{suffix}", now.timestamp_millis())
}

fn write_json<T: Serialize>(storage: &dyn SessionStorage, key: &str, value: &T) {
    let result = serde_json::to_string(value)
        .map_err(StorageError::from)
        .and_then(|json| storage.set(key, json));
    if let Err(e) = result {
        warn!(error = %e, key, "failed to persist chat state");
    }
}

fn remove_keys(storage: &dyn SessionStorage) {
    for key in [SESSION_KEY, MESSAGES_KEY] {
        if let Err(e) = storage.remove(key) {
            warn!(error = %e, key, "failed to clear chat storage");
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(storage: &dyn SessionStorage, key: &str) -> Option<T> {
    let raw = match storage.get(key) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(error = %e, key, "failed to read chat storage");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, key, "discarding unreadable chat storage record");
            None
        }
    }
}

fn restore(state: &mut StoreState, storage: &dyn SessionStorage, config: &StoreConfig, now: DateTime<Utc>) {
    let timeout = chrono::Duration::from_std(config.session_timeout).unwrap_or(chrono::Duration::MAX);

    match read_json::<Session>(storage, SESSION_KEY) {
        Some(session) if session.is_valid_at(now, timeout) => {
            info!(session_id = %session.session_id, "restored chat session");
            state.session = Some(session);
        }
        Some(session) => {
            debug!(session_id = %session.session_id, "stored chat session expired");
            remove_keys(storage);
            return;
        }
        None => {}
    }

    let Some(history) = read_json::<ChatHistory>(storage, MESSAGES_KEY) else {
        return;
    };
    let same_session = state
        .session
        .as_ref()
        .is_none_or(|s| s.session_id == history.session_id);
    if !same_session {
        debug!(stored = %history.session_id, "stored history belongs to another session");
        return;
    }

    let skip = history.messages.len().saturating_sub(config.max_history);
    state.messages = history.messages.into_iter().skip(skip).collect();
    state.last_sync = now;
    state.session_confirmed = state.session.as_ref().is_some_and(|s| {
        state
            .messages
            .iter()
            .any(|m| m.is_bot && m.session_id.as_deref() == Some(s.session_id.as_str()))
    });
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
