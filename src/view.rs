//! Chat views — independent surfaces (full page, sidebar, floating widget)
//! mirroring one shared store.
//!
//! DESIGN
//! ======
//! Each view subscribes to the store and keeps a private copy of
//! `SharedChatState`, refreshed on every notification. Views never share
//! render state with each other; they converge because they all mirror the
//! same store. Detaching (or dropping) a view deregisters its listener.
//!
//! Error display is a per-view banner that hides itself once it is older
//! than the configured TTL. Whether a failed send also leaves an apology in
//! the transcript is decided on the typed error kind.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::clock::Clock;
use crate::config::DEFAULT_ERROR_BANNER_SECS;
use crate::dispatcher::ChatDispatcher;
use crate::error::{ChatError, ErrorKind};
use crate::events::Subscription;
use crate::export;
use crate::store::ChatStore;
use crate::types::{ChatHistory, NewMessage, SendOutcome, SharedChatState, SyncEvent};

pub const WELCOME_MESSAGE: &str = "Hi! I'm your AI assistant for Setu's PFM API Suite. I can help you with API \
questions, configuration settings, and product information. What would you like to know?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewOptions {
    /// Seeded as a bot message when the shared log is empty at attach time.
    pub welcome_message: Option<String>,
    pub error_banner_ttl: Duration,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            welcome_message: Some(WELCOME_MESSAGE.to_string()),
            error_banner_ttl: Duration::from_secs(DEFAULT_ERROR_BANNER_SECS),
        }
    }
}

struct Mirror {
    shared: SharedChatState,
    error_at: Option<DateTime<Utc>>,
    events_seen: u64,
}

pub struct ChatView {
    name: String,
    store: ChatStore,
    dispatcher: ChatDispatcher,
    clock: Arc<dyn Clock>,
    mirror: Arc<Mutex<Mirror>>,
    banner_ttl: chrono::Duration,
    welcome_message: Option<String>,
    subscription: Option<Subscription>,
}

impl ChatView {
    /// Subscribe a new view to the dispatcher's store.
    pub fn attach(name: impl Into<String>, dispatcher: &ChatDispatcher, options: ViewOptions) -> Self {
        let name = name.into();
        let store = dispatcher.store().clone();
        let clock = store.clock();
        let mirror = Arc::new(Mutex::new(Mirror {
            shared: store.get_shared_chat_state(),
            error_at: None,
            events_seen: 0,
        }));

        let subscription = {
            let mirror = Arc::clone(&mirror);
            let source = store.clone();
            let clock = Arc::clone(&clock);
            store.add_sync_listener(move |event| {
                let mut view = lock(&mirror);
                view.events_seen += 1;
                match event {
                    SyncEvent::LoadingStarted => {
                        view.shared.is_loading = true;
                        view.shared.error = None;
                        view.error_at = None;
                    }
                    SyncEvent::LoadingStopped => view.shared.is_loading = false,
                    SyncEvent::ErrorOccurred { message, .. } => {
                        view.shared.is_loading = false;
                        view.shared.error = Some(message.clone());
                        view.error_at = Some(clock.now());
                    }
                    SyncEvent::MessageAdded(_)
                    | SyncEvent::MessagesCleared
                    | SyncEvent::SessionChanged(_)
                    | SyncEvent::StateUpdated { .. } => {
                        let banner = view.shared.error.take();
                        view.shared = source.get_shared_chat_state();
                        view.shared.error = banner;
                    }
                }
            })
        };
        debug!(view = %name, "chat view attached");

        let view = Self {
            name,
            store,
            dispatcher: dispatcher.clone(),
            clock,
            mirror,
            banner_ttl: chrono::Duration::from_std(options.error_banner_ttl).unwrap_or(chrono::Duration::MAX),
            welcome_message: options.welcome_message,
            subscription: Some(subscription),
        };
        view.seed_welcome();
        view
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This view's render state. An error older than the banner TTL is
    /// cleared on read.
    #[must_use]
    pub fn snapshot(&self) -> SharedChatState {
        let now = self.clock.now();
        let mut view = lock(&self.mirror);
        if view
            .error_at
            .is_some_and(|at| now.signed_duration_since(at) >= self.banner_ttl)
        {
            view.shared.error = None;
            view.error_at = None;
        }
        view.shared.clone()
    }

    /// Notifications this view has processed since attaching.
    #[must_use]
    pub fn events_seen(&self) -> u64 {
        lock(&self.mirror).events_seen
    }

    /// Send through the shared dispatcher.
    ///
    /// Failures other than validation, duplicates, and transient transport
    /// errors also leave an apology from the assistant in the transcript.
    ///
    /// # Errors
    ///
    /// Propagates the dispatcher's [`ChatError`].
    pub async fn submit(&self, text: &str, force_new_session: bool) -> Result<SendOutcome, ChatError> {
        match self.dispatcher.send_message(text, force_new_session).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                if !matches!(error.kind(), ErrorKind::Duplicate | ErrorKind::Superseded) {
                    self.show_error(&error);
                }
                if wants_apology(&error) {
                    self.store.add_message(NewMessage::bot(apology_text(&error)));
                }
                Err(error)
            }
        }
    }

    pub fn new_session(&self) {
        self.store.start_new_session();
        self.clear_banner();
        self.seed_welcome();
    }

    pub fn clear(&self) {
        self.store.clear_message_history();
        self.clear_banner();
        self.seed_welcome();
    }

    pub fn end_session(&self) {
        self.store.end_session();
        self.clear_banner();
        self.seed_welcome();
    }

    #[must_use]
    pub fn export(&self) -> ChatHistory {
        self.store.export_message_history()
    }

    /// Plain-text transcript in local time.
    #[must_use]
    pub fn transcript(&self) -> String {
        export::render_transcript_local(&self.export())
    }

    /// Deregister from the store. Dropping the view does the same.
    pub fn detach(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        debug!(view = %self.name, "chat view detached");
    }

    fn show_error(&self, error: &ChatError) {
        let now = self.clock.now();
        let mut view = lock(&self.mirror);
        view.shared.error = Some(error.to_string());
        view.error_at = Some(now);
    }

    /// Greet again whenever the shared log is empty. The store's
    /// empty-check keeps it to one greeting no matter how many views react.
    fn seed_welcome(&self) {
        if let Some(welcome) = &self.welcome_message {
            self.store.add_message_if_empty(NewMessage::bot(welcome.clone()));
        }
    }

    fn clear_banner(&self) {
        let mut view = lock(&self.mirror);
        view.shared.error = None;
        view.error_at = None;
    }
}

fn lock(mirror: &Mutex<Mirror>) -> MutexGuard<'_, Mirror> {
    mirror
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Transient failures were already signalled by the spinner; validation and
/// duplicate rejections never reached the endpoint; a superseded reply
/// belongs to a conversation the user already left.
#[must_use]
pub fn wants_apology(error: &ChatError) -> bool {
    !error.is_transient()
        && !matches!(error.kind(), ErrorKind::Validation | ErrorKind::Duplicate | ErrorKind::Superseded)
}

#[must_use]
pub fn apology_text(error: &ChatError) -> String {
    format!("I'm sorry, I encountered an error: {error}. Please try again.")
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;
