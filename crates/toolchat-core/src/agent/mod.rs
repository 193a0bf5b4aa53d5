pub mod conversation;
pub mod error;
pub mod types;

pub use conversation::Conversation;
pub use error::{AgentError, HistoryError};
pub use types::{Message, MessageContent, Role};
