//! Request dispatcher — one user message, one round trip, reconciled into
//! the store.
//!
//! DESIGN
//! ======
//! `send_message` is guarded by a single in-flight flag: a second call while
//! one is outstanding is rejected, never queued. The guard also owns the
//! "loading stopped" notification, so every exit path (success, exhausted
//! retries, validation failure, or the future being dropped) clears the
//! spinner exactly once.
//!
//! Per send: optimistic user append, then up to `max_attempts` attempts,
//! each bounded by `request_timeout`, with `backoff_base * 2^attempt`
//! sleeps in between. Only the final failure is reported to the store.
//!
//! A reply is applied to the session it was sent under. If that session was
//! reset or ended while the request was out, the reply is dropped and the
//! caller gets `SessionReset`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::error::ChatError;
use crate::store::ChatStore;
use crate::transport::{ChatTransport, HttpTransport, TransportReply};
use crate::types::{ChatReply, ChatRequest, Message, NewMessage, ReplyStatus, SendOutcome, Session};

struct DispatcherInner {
    store: ChatStore,
    transport: Arc<dyn ChatTransport>,
    config: DispatchConfig,
    in_flight: AtomicBool,
}

#[derive(Clone)]
pub struct ChatDispatcher {
    inner: Arc<DispatcherInner>,
}

impl ChatDispatcher {
    #[must_use]
    pub fn new(store: ChatStore, transport: Arc<dyn ChatTransport>, config: DispatchConfig) -> Self {
        Self { inner: Arc::new(DispatcherInner { store, transport, config, in_flight: AtomicBool::new(false) }) }
    }

    /// Dispatcher over the real HTTP endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn http(store: ChatStore, config: DispatchConfig) -> Result<Self, ChatError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::new(store, Arc::new(transport), config))
    }

    #[must_use]
    pub fn store(&self) -> &ChatStore {
        &self.inner.store
    }

    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Send `text` and append both sides of the exchange to the store.
    ///
    /// # Errors
    ///
    /// - [`ChatError::DuplicateRequest`] if a send is already outstanding
    /// - [`ChatError::Validation`] if `text` is blank
    /// - the classified failure of the last attempt once retries run out
    pub async fn send_message(&self, text: &str, force_new_session: bool) -> Result<SendOutcome, ChatError> {
        let _flight = InFlight::acquire(&self.inner)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::Validation);
        }

        let store = &self.inner.store;
        store.set_loading(true);

        if force_new_session {
            store.start_new_session();
        }
        let session = store.current_session();
        let user_message = store.add_message(NewMessage::user(text));

        let request = ChatRequest {
            message: text.to_string(),
            session_id: store
                .session_confirmed()
                .then(|| session.session_id.clone()),
        };

        let max = self.inner.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let error = match self.attempt_once(&request, attempt, max).await {
                Ok(reply) => {
                    let bot_message = self.reconcile(&session, reply)?;
                    info!(session_id = %session.session_id, attempt, "chat reply received");
                    return Ok(SendOutcome { user_message, bot_message });
                }
                Err(error) => error,
            };

            if attempt >= max || !error.is_retryable() {
                warn!(error = %error, attempts = attempt, "chat request failed");
                store.report_error(&error);
                return Err(error);
            }

            let delay = self.backoff(attempt);
            warn!(
                error = %error,
                attempt,
                total = max,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "chat request failed; retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Probe the endpoint's health route.
    pub async fn health_check(&self) -> bool {
        self.inner.transport.health().await
    }

    async fn attempt_once(&self, request: &ChatRequest, attempt: u32, max: u32) -> Result<ParsedReply, ChatError> {
        let timeout = self.inner.config.request_timeout;
        let reply = match tokio::time::timeout(timeout, self.inner.transport.post_chat(request)).await {
            Err(_) => return Err(ChatError::Timeout { attempt, max }),
            Ok(result) => result.map_err(|e| e.classify(attempt, max))?,
        };
        let TransportReply { status, body } = reply;
        if status != 200 || body.trim().is_empty() {
            return Err(ChatError::UnexpectedResponse { status, attempt, max });
        }
        parse_reply(&body).ok_or(ChatError::UnexpectedResponse { status, attempt, max })
    }

    /// Apply the reply to the session it was sent under. A reply that
    /// outlived its session is dropped.
    fn reconcile(&self, sent_with: &Session, reply: ParsedReply) -> Result<Message, ChatError> {
        self.inner
            .store
            .reconcile_reply(&sent_with.session_id, reply.session_id.as_deref(), reply.text)
            .ok_or_else(|| {
                warn!(session_id = %sent_with.session_id, "session changed while request was in flight; dropping reply");
                ChatError::SessionReset
            })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.inner
            .config
            .backoff_base
            .saturating_mul(2_u32.saturating_pow(attempt))
    }
}

// =============================================================================
// IN-FLIGHT GUARD
// =============================================================================

struct InFlight<'a> {
    inner: &'a DispatcherInner,
}

impl<'a> InFlight<'a> {
    fn acquire(inner: &'a DispatcherInner) -> Result<Self, ChatError> {
        if inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("message already being sent, ignoring duplicate request");
            return Err(ChatError::DuplicateRequest);
        }
        Ok(Self { inner })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.inner.in_flight.store(false, Ordering::Release);
        self.inner.store.set_loading(false);
    }
}

// =============================================================================
// REPLY PARSING
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedReply {
    pub(crate) text: String,
    pub(crate) session_id: Option<String>,
}

/// Reply text is, in order of preference: a JSON string body, the
/// `response` field of an object body, the whole JSON body re-serialized,
/// or the raw body when it is not JSON at all.
///
/// `None` for an empty JSON body (`null`, `false`, `0`, `""`).
pub(crate) fn parse_reply(body: &str) -> Option<ParsedReply> {
    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(_) => return Some(ParsedReply { text: body.to_string(), session_id: None }),
    };

    let parsed = match value {
        Value::Null | Value::Bool(false) => return None,
        Value::Number(n) if n.as_u64() == Some(0) => return None,
        Value::String(text) if text.is_empty() => return None,
        Value::String(text) => ParsedReply { text, session_id: None },
        other => match serde_json::from_value::<ChatReply>(other.clone()) {
            Ok(reply) if !reply.response.is_empty() => {
                if reply.status == Some(ReplyStatus::Error) {
                    debug!("chat endpoint flagged its reply as an error");
                }
                ParsedReply { text: reply.response, session_id: reply.session_id.filter(|s| !s.is_empty()) }
            }
            _ => ParsedReply {
                session_id: other
                    .get("session_id")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned),
                text: other.to_string(),
            },
        },
    };
    Some(parsed)
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod tests;
