use std::path::Path;

use anyhow::Result;
use console::style;

use tern::record::{list_saved_conversations, load_conversation_record};

/// Print one line per saved conversation, newest first. A file whose
/// metadata does not parse is listed by file name instead of being an
/// error.
pub fn handle_conversations_list(dir: &Path) -> Result<()> {
    let paths = list_saved_conversations(dir)?;
    if paths.is_empty() {
        println!("No saved conversations in {}", dir.display());
        return Ok(());
    }

    for path in paths {
        match load_conversation_record(&path) {
            Ok(record) => {
                println!(
                    "{} (grade {}/10) saved {}",
                    style(record.metadata.name).bold(),
                    record.metadata.grade,
                    record.metadata.saved_at
                );
            }
            Err(_) => {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                println!("{}", name);
            }
        }
    }

    Ok(())
}
