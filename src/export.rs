//! Transcript export — plain text, one paragraph per message.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::{Local, TimeZone};

use crate::types::ChatHistory;

/// Render `history` as `<AI|You> (<h:mm:ss AM>): <text>` paragraphs
/// separated by blank lines, with times shown in `tz`.
#[must_use]
pub fn render_transcript<Tz>(history: &ChatHistory, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    history
        .messages
        .iter()
        .map(|m| {
            let author = if m.is_bot { "AI" } else { "You" };
            let time = m.timestamp.with_timezone(tz).format("%-I:%M:%S %p");
            format!("{author} ({time}): {}", m.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[must_use]
pub fn render_transcript_local(history: &ChatHistory) -> String {
    render_transcript(history, &Local)
}

/// `setu-pfm-api-chat-<session id>.txt`, with path-hostile characters in
/// the id replaced.
#[must_use]
pub fn export_file_name(history: &ChatHistory) -> String {
    let session: String = history
        .session_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("setu-pfm-api-chat-{session}.txt")
}

/// Write the local-time transcript into `dir`, returning the file path.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be written.
pub fn write_transcript(history: &ChatHistory, dir: &Path) -> std::io::Result<PathBuf> {
    let path = dir.join(export_file_name(history));
    std::fs::write(&path, render_transcript_local(history))?;
    Ok(path)
}

#[cfg(test)]
#[path = "export_test.rs"]
mod tests;
