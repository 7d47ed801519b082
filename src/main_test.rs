use super::*;
use pfm_chat::config::DispatchConfig;

fn terminal_view() -> (ChatDispatcher, ChatView) {
    let store = ChatStore::in_memory(pfm_chat::config::StoreConfig::default());
    let dispatcher = ChatDispatcher::http(store, DispatchConfig::default()).unwrap();
    let view = ChatView::attach("terminal", &dispatcher, ViewOptions::default());
    (dispatcher, view)
}

#[test]
fn export_into_missing_directory_reports_and_keeps_session() {
    let (_dispatcher, view) = terminal_view();
    let missing = std::env::temp_dir().join(format!("pfm-chat-missing-{}", uuid::Uuid::new_v4()));

    let status = export_status(&view, missing.to_str());

    assert!(status.starts_with("export failed:"), "{status}");
    assert_eq!(view.snapshot().message_history.len(), 1);
}

#[test]
fn export_into_existing_directory_reports_path() {
    let (_dispatcher, view) = terminal_view();
    let dir = std::env::temp_dir().join(format!("pfm-chat-export-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();

    let status = export_status(&view, dir.to_str());

    assert!(status.starts_with("transcript written to "), "{status}");
    std::fs::remove_dir_all(&dir).unwrap();
}
