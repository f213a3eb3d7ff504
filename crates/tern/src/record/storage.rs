use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use serde_json::Value;

use super::{ConversationMetadata, SavedConversation};
use crate::errors::{RecordError, RecordResult};

// Keep alphanumerics, spaces, underscores and hyphens; everything else
// becomes an underscore, then spaces collapse to underscores too.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .replace(' ', "_")
}

/// Save a conversation timeline with metadata under `save_dir`.
///
/// The grade must be between 1 and 10. The file is named from a sanitized
/// version of `name` plus a `%Y%m%d_%H%M%S` timestamp; the directory is
/// created if it does not exist. The timeline can be any serializable
/// sequence, so new entry shapes need no change here.
pub fn save_conversation<T: Serialize>(
    timeline: &[T],
    name: &str,
    grade: u8,
    notes: Option<String>,
    save_dir: &Path,
) -> RecordResult<PathBuf> {
    if !(1..=10).contains(&grade) {
        return Err(RecordError::InvalidGrade(grade));
    }

    fs::create_dir_all(save_dir)?;

    let now = Local::now();
    let saved_at = now.format("%Y%m%d_%H%M%S").to_string();
    let file_path = save_dir.join(format!("{}_{}.json", sanitize_name(name), saved_at));

    let document = SavedConversation {
        metadata: ConversationMetadata {
            name: name.to_string(),
            grade,
            notes: notes.unwrap_or_default(),
            timestamp: now,
            saved_at,
        },
        conversation_timeline: serde_json::to_value(timeline)?,
    };

    fs::write(&file_path, serde_json::to_string_pretty(&document)?)?;

    Ok(file_path)
}

/// Load a saved conversation as raw JSON.
///
/// No schema enforcement beyond JSON syntax; the document comes back
/// exactly as stored.
pub fn load_conversation(file_path: &Path) -> RecordResult<Value> {
    if !file_path.is_file() {
        return Err(RecordError::NotFound(file_path.to_path_buf()));
    }

    let text = fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Load a saved conversation through the typed document shape.
pub fn load_conversation_record(file_path: &Path) -> RecordResult<SavedConversation> {
    if !file_path.is_file() {
        return Err(RecordError::NotFound(file_path.to_path_buf()));
    }

    let text = fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&text)?)
}

/// List saved conversation files, most recently modified first.
///
/// A missing directory yields an empty list rather than an error.
pub fn list_saved_conversations(save_dir: &Path) -> RecordResult<Vec<PathBuf>> {
    if !save_dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries = fs::read_dir(save_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
        .collect::<Vec<_>>();

    // Sort by modification time, most recent first
    entries.sort_by(|a, b| {
        b.metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
            .cmp(
                &a.metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
            )
    });

    Ok(entries.into_iter().map(|entry| entry.path()).collect())
}
