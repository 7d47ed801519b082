use super::*;
use crate::types::Message;
use chrono::{FixedOffset, Utc};

fn message(text: &str, is_bot: bool, rfc3339: &str) -> Message {
    Message {
        id: format!("msg_{text}"),
        text: text.into(),
        is_bot,
        timestamp: chrono::DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc),
        session_id: Some("session_1_abc".into()),
    }
}

fn history(messages: Vec<Message>) -> ChatHistory {
    ChatHistory { messages, last_updated: Utc::now(), session_id: "session_1700000000000_k3j9x2m1q".into() }
}

#[test]
fn transcript_labels_and_separates_messages() {
    let history = history(vec![
        message("Hi! How can I help?", true, "2024-05-01T09:05:03Z"),
        message("What is the Insights API?", false, "2024-05-01T14:30:00Z"),
    ]);
    assert_eq!(
        render_transcript(&history, &Utc),
        "AI (9:05:03 AM): Hi! How can I help?\n\nYou (2:30:00 PM): What is the Insights API?"
    );
}

#[test]
fn transcript_uses_requested_zone() {
    let ist = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();
    let history = history(vec![message("hello", false, "2024-05-01T06:30:00Z")]);
    assert_eq!(render_transcript(&history, &ist), "You (12:00:00 PM): hello");
}

#[test]
fn empty_history_renders_empty() {
    assert_eq!(render_transcript(&history(vec![]), &Utc), "");
}

#[test]
fn file_name_embeds_session_id() {
    let history = history(vec![]);
    assert_eq!(export_file_name(&history), "setu-pfm-api-chat-session_1700000000000_k3j9x2m1q.txt");
}

#[test]
fn file_name_sanitizes_path_characters() {
    let mut history = history(vec![]);
    history.session_id = "../evil/id".into();
    assert_eq!(export_file_name(&history), "setu-pfm-api-chat-___evil_id.txt");
}

#[test]
fn write_transcript_creates_file() {
    let dir = std::env::temp_dir().join(format!("pfm-chat-export-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let history = history(vec![message("saved", false, "2024-05-01T06:30:00Z")]);

    let path = write_transcript(&history, &dir).unwrap();

    assert_eq!(path.file_name().unwrap(), export_file_name(&history).as_str());
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("You ("));
    assert!(contents.ends_with("): saved"));
    std::fs::remove_dir_all(&dir).unwrap();
}
