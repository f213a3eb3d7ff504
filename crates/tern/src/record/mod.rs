mod storage;

pub use storage::{
    list_saved_conversations, load_conversation, load_conversation_record, save_conversation,
};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Message;

fn default_displayed() -> bool {
    true
}

/// One step of a conversation timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "entry_type", rename_all = "snake_case")]
pub enum TimelineEntry {
    Message {
        message: Message,
        #[serde(default = "default_displayed")]
        displayed: bool,
    },
    AgentRun {
        run: AgentRun,
        #[serde(default = "default_displayed")]
        displayed: bool,
    },
}

impl TimelineEntry {
    pub fn message(message: Message) -> Self {
        TimelineEntry::Message {
            message,
            displayed: true,
        }
    }

    pub fn agent_run(run: AgentRun) -> Self {
        TimelineEntry::AgentRun {
            run,
            displayed: true,
        }
    }
}

/// Record of a task delegated to a named agent during a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    pub agent_name: String,
    pub task: String,
    pub response: String,
    #[serde(default)]
    pub new_messages: Vec<Message>,
}

/// Metadata block written alongside every saved conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub name: String,
    pub grade: u8,
    #[serde(default)]
    pub notes: String,
    pub timestamp: DateTime<Local>,
    pub saved_at: String,
}

/// A conversation document as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedConversation {
    pub metadata: ConversationMetadata,
    pub conversation_timeline: Value,
}
