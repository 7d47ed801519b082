use super::*;
use std::collections::HashMap;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn empty_environment_gives_defaults() {
    let config = ChatConfig::from_lookup(lookup_from(&[])).unwrap();
    assert_eq!(config, ChatConfig::default());
    assert_eq!(config.dispatch.api_url, DEFAULT_API_URL);
    assert_eq!(config.dispatch.max_attempts, 3);
    assert_eq!(config.dispatch.backoff_base, Duration::from_secs(1));
    assert_eq!(config.store.session_timeout, Duration::from_secs(1800));
    assert_eq!(config.store.max_history, 100);
    assert_eq!(config.store.persistence, PersistenceMode::Fresh);
    assert_eq!(config.error_banner_ttl, Duration::from_secs(5));
}

#[test]
fn overrides_are_parsed() {
    let config = ChatConfig::from_lookup(lookup_from(&[
        ("CHAT_API_URL", " http://localhost:9000/chat "),
        ("CHAT_MAX_ATTEMPTS", "5"),
        ("CHAT_BACKOFF_BASE_MS", "250"),
        ("CHAT_SESSION_TIMEOUT_SECS", "60"),
        ("CHAT_MAX_HISTORY", "10"),
        ("CHAT_PERSISTENCE", "restore"),
        ("CHAT_ERROR_BANNER_SECS", "2"),
    ]))
    .unwrap();
    assert_eq!(config.dispatch.api_url, "http://localhost:9000/chat");
    assert_eq!(config.dispatch.max_attempts, 5);
    assert_eq!(config.dispatch.backoff_base, Duration::from_millis(250));
    assert_eq!(config.store.session_timeout, Duration::from_secs(60));
    assert_eq!(config.store.max_history, 10);
    assert_eq!(config.store.persistence, PersistenceMode::Restore);
    assert_eq!(config.error_banner_ttl, Duration::from_secs(2));
}

#[test]
fn blank_api_url_falls_back_to_default() {
    let config = ChatConfig::from_lookup(lookup_from(&[("CHAT_API_URL", "   ")])).unwrap();
    assert_eq!(config.dispatch.api_url, DEFAULT_API_URL);
}

#[test]
fn unparsable_number_is_rejected() {
    let err = ChatConfig::from_lookup(lookup_from(&[("CHAT_REQUEST_TIMEOUT_SECS", "soon")])).unwrap_err();
    assert_eq!(err, ChatError::Config("invalid CHAT_REQUEST_TIMEOUT_SECS: 'soon'".into()));
}

#[test]
fn zero_attempts_is_rejected() {
    let err = ChatConfig::from_lookup(lookup_from(&[("CHAT_MAX_ATTEMPTS", "0")])).unwrap_err();
    assert!(matches!(err, ChatError::Config(msg) if msg.contains("CHAT_MAX_ATTEMPTS")));
}

#[test]
fn zero_history_is_rejected() {
    let err = ChatConfig::from_lookup(lookup_from(&[("CHAT_MAX_HISTORY", "0")])).unwrap_err();
    assert!(matches!(err, ChatError::Config(msg) if msg.contains("CHAT_MAX_HISTORY")));
}

#[test]
fn unknown_persistence_mode_is_rejected() {
    let err = ChatConfig::from_lookup(lookup_from(&[("CHAT_PERSISTENCE", "forever")])).unwrap_err();
    assert!(matches!(err, ChatError::Config(msg) if msg.contains("forever")));
}
