pub mod errors;
pub mod message;
pub mod record;

pub use errors::{RecordError, RecordResult};
pub use message::{Message, MessageContent, Role, ToolCall};
