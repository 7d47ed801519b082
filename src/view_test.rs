use super::*;
use crate::clock::ManualClock;
use crate::config::{DispatchConfig, StoreConfig};
use crate::storage::MemoryStorage;
use crate::transport::{ChatTransport, TransportError, TransportReply};
use crate::types::ChatRequest;
use std::collections::VecDeque;

// =========================================================================
// Helpers
// =========================================================================

struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<TransportReply, TransportError>>>,
}

#[async_trait::async_trait]
impl ChatTransport for ScriptedTransport {
    async fn post_chat(&self, _request: &ChatRequest) -> Result<TransportReply, TransportError> {
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(TransportReply { status: 200, body: r#"{"response":"sure"}"#.into() }))
    }

    async fn health(&self) -> bool {
        true
    }
}

fn setup(replies: Vec<Result<TransportReply, TransportError>>) -> (ChatDispatcher, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let store = ChatStore::new(StoreConfig::default(), Arc::new(MemoryStorage::new()), clock.clone());
    let transport = Arc::new(ScriptedTransport { replies: Mutex::new(replies.into()) });
    let config = DispatchConfig { max_attempts: 1, ..DispatchConfig::default() };
    (ChatDispatcher::new(store, transport, config), clock)
}

fn quiet() -> ViewOptions {
    ViewOptions { welcome_message: None, ..ViewOptions::default() }
}

fn server_error() -> Result<TransportReply, TransportError> {
    Err(TransportError::Status { status: 500, reason: "Internal Server Error".into() })
}

// =========================================================================
// attach / detach
// =========================================================================

#[test]
fn first_view_seeds_welcome_once() {
    let (dispatcher, _) = setup(vec![]);
    let page = ChatView::attach("page", &dispatcher, ViewOptions::default());
    let widget = ChatView::attach("widget", &dispatcher, ViewOptions::default());

    let history = page.snapshot().message_history;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].text, WELCOME_MESSAGE);
    assert!(history[0].is_bot);
    assert_eq!(widget.snapshot().message_history, history);
}

#[test]
fn detach_and_drop_deregister() {
    let (dispatcher, _) = setup(vec![]);
    let page = ChatView::attach("page", &dispatcher, quiet());
    let sidebar = ChatView::attach("sidebar", &dispatcher, quiet());
    assert_eq!(dispatcher.store().listener_count(), 2);

    page.detach();
    assert_eq!(dispatcher.store().listener_count(), 1);
    drop(sidebar);
    assert_eq!(dispatcher.store().listener_count(), 0);
}

#[test]
fn detached_view_stops_mirroring() {
    let (dispatcher, _) = setup(vec![]);
    let page = ChatView::attach("page", &dispatcher, quiet());
    let widget = ChatView::attach("widget", &dispatcher, quiet());
    widget.detach();

    dispatcher.store().add_message(NewMessage::user("only the page sees this"));
    assert_eq!(page.snapshot().message_history.len(), 1);
    assert!(page.events_seen() > 0);
}

// =========================================================================
// submit
// =========================================================================

#[tokio::test]
async fn views_converge_after_submit() {
    let (dispatcher, _) = setup(vec![]);
    let page = ChatView::attach("page", &dispatcher, quiet());
    let sidebar = ChatView::attach("sidebar", &dispatcher, quiet());

    page.submit("Which APIs are in the suite?", false).await.unwrap();

    let a = page.snapshot();
    let b = sidebar.snapshot();
    assert_eq!(a.message_history.len(), 2);
    assert_eq!(a.message_history, b.message_history);
    assert_eq!(a.current_session, b.current_session);
    assert!(!a.is_loading && !b.is_loading);
}

#[tokio::test]
async fn server_failure_adds_apology_and_banner_everywhere() {
    let (dispatcher, _) = setup(vec![server_error()]);
    let page = ChatView::attach("page", &dispatcher, quiet());
    let widget = ChatView::attach("widget", &dispatcher, quiet());

    let err = page.submit("hello", false).await.unwrap_err();

    let history = page.snapshot().message_history;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].text, apology_text(&err));
    assert!(history[1].is_bot);
    assert_eq!(page.snapshot().error, Some(err.to_string()));
    assert_eq!(widget.snapshot().error, Some(err.to_string()));
    assert_eq!(widget.snapshot().message_history, history);
}

#[tokio::test]
async fn transient_failure_shows_banner_without_apology() {
    let (dispatcher, _) = setup(vec![Err(TransportError::Network("reset".into()))]);
    let page = ChatView::attach("page", &dispatcher, quiet());

    let err = page.submit("hello", false).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(page.snapshot().message_history.len(), 1);
    assert_eq!(
        page.snapshot().error.as_deref(),
        Some("Network error (attempt 1/1). Please check your connection.")
    );
}

#[tokio::test]
async fn blank_submit_shows_validation_banner_locally() {
    let (dispatcher, _) = setup(vec![]);
    let page = ChatView::attach("page", &dispatcher, quiet());
    let widget = ChatView::attach("widget", &dispatcher, quiet());

    assert_eq!(page.submit("   ", false).await, Err(ChatError::Validation));

    assert_eq!(page.snapshot().error.as_deref(), Some("Message cannot be empty"));
    assert_eq!(widget.snapshot().error, None);
    assert!(page.snapshot().message_history.is_empty());
}

#[tokio::test]
async fn error_banner_expires_after_ttl() {
    let (dispatcher, clock) = setup(vec![server_error()]);
    let page = ChatView::attach("page", &dispatcher, quiet());

    page.submit("hello", false).await.unwrap_err();
    clock.advance(chrono::Duration::seconds(4));
    assert!(page.snapshot().error.is_some());
    clock.advance(chrono::Duration::seconds(1));
    assert_eq!(page.snapshot().error, None);
}

#[tokio::test]
async fn next_send_clears_banner() {
    let (dispatcher, _) = setup(vec![server_error()]);
    let page = ChatView::attach("page", &dispatcher, quiet());

    page.submit("first", false).await.unwrap_err();
    page.submit("second", false).await.unwrap();

    assert_eq!(page.snapshot().error, None);
}

// =========================================================================
// session controls
// =========================================================================

#[tokio::test]
async fn new_session_and_end_session_reset_every_view() {
    let (dispatcher, _) = setup(vec![]);
    let page = ChatView::attach("page", &dispatcher, ViewOptions::default());
    let widget = ChatView::attach("widget", &dispatcher, ViewOptions::default());
    page.submit("hello", false).await.unwrap();
    let old = page.snapshot().current_session.unwrap();

    widget.new_session();
    let fresh = page.snapshot().current_session.unwrap();
    assert_ne!(fresh.session_id, old.session_id);
    let history = page.snapshot().message_history;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].text, WELCOME_MESSAGE);
    assert_eq!(history[0].session_id.as_deref(), Some(fresh.session_id.as_str()));
    assert_eq!(widget.snapshot().message_history, history);

    page.end_session();
    assert_eq!(widget.snapshot().current_session, None);
    let history = widget.snapshot().message_history;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].text, WELCOME_MESSAGE);
}

#[tokio::test]
async fn clear_reseeds_single_welcome() {
    let (dispatcher, _) = setup(vec![]);
    let page = ChatView::attach("page", &dispatcher, ViewOptions::default());
    let sidebar = ChatView::attach("sidebar", &dispatcher, ViewOptions::default());
    page.submit("hello", false).await.unwrap();

    sidebar.clear();
    page.clear();

    let history = page.snapshot().message_history;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].text, WELCOME_MESSAGE);
    assert_eq!(dispatcher.store().message_count(), 1);
}

#[test]
fn quiet_views_leave_cleared_log_empty() {
    let (dispatcher, _) = setup(vec![]);
    let page = ChatView::attach("page", &dispatcher, quiet());
    dispatcher.store().add_message(NewMessage::user("hello"));
    page.clear();
    assert!(page.snapshot().message_history.is_empty());
}

#[tokio::test]
async fn export_and_transcript_follow_the_log() {
    let (dispatcher, _) = setup(vec![]);
    let page = ChatView::attach("page", &dispatcher, quiet());
    page.submit("question", false).await.unwrap();

    let history = page.export();
    assert_eq!(history.messages.len(), 2);
    assert_eq!(history.session_id, dispatcher.store().current_session().session_id);

    let transcript = page.transcript();
    assert!(transcript.starts_with("You ("));
    assert!(transcript.contains("): question\n\nAI ("));
    assert!(transcript.ends_with("): sure"));
}

// =========================================================================
// apology policy
// =========================================================================

#[test]
fn apology_policy_by_kind() {
    assert!(!wants_apology(&ChatError::Validation));
    assert!(!wants_apology(&ChatError::DuplicateRequest));
    assert!(!wants_apology(&ChatError::SessionReset));
    assert!(!wants_apology(&ChatError::Timeout { attempt: 3, max: 3 }));
    assert!(!wants_apology(&ChatError::Network { attempt: 3, max: 3, detail: String::new() }));
    assert!(wants_apology(&ChatError::HttpStatus { status: 404, reason: "Not Found".into(), attempt: 3, max: 3 }));
    assert!(wants_apology(&ChatError::UnexpectedResponse { status: 204, attempt: 3, max: 3 }));
    assert!(wants_apology(&ChatError::Unknown { detail: "boom".into(), attempt: 3, max: 3 }));
}

#[test]
fn apology_text_embeds_error() {
    assert_eq!(
        apology_text(&ChatError::UnexpectedResponse { status: 204, attempt: 1, max: 3 }),
        "I'm sorry, I encountered an error: Unexpected response status: 204 (attempt 1/3). Please try again."
    );
}
