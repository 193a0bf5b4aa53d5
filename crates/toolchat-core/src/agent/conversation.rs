use super::error::HistoryError;
use super::types::{Message, Role};
use crate::tools::{ToolCall, ToolInvocationResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Ordered, append-only chat history.
///
/// Nothing appended is ever removed or rewritten. While a tool round is open
/// (the model asked for tools and their results are not all in), only tool
/// results answering one of the outstanding calls may be appended.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    id: String,
    messages: Vec<Message>,
    #[serde(skip)]
    outstanding: Vec<ToolCall>,
    #[serde(skip)]
    round: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            outstanding: Vec::new(),
            round: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_generated_id() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn push_system(&mut self, content: impl Into<String>) -> Result<(), HistoryError> {
        if !self.messages.is_empty() {
            return Err(HistoryError::SystemNotFirst);
        }
        self.append(Message::system(content));
        Ok(())
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> Result<(), HistoryError> {
        self.ensure_no_pending_results()?;
        self.append(Message::user(content));
        Ok(())
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) -> Result<(), HistoryError> {
        self.ensure_no_pending_results()?;
        self.append(Message::assistant(content));
        Ok(())
    }

    /// Opens a tool round for the calls the model just requested.
    pub fn expect_tool_results(&mut self, calls: &[ToolCall]) -> Result<(), HistoryError> {
        self.ensure_no_pending_results()?;
        self.outstanding = calls.to_vec();
        self.round = Some(Uuid::new_v4().to_string());
        Ok(())
    }

    /// Appends the result for an outstanding call. Results for unknown or
    /// already-answered ids are discarded.
    pub fn push_tool_result(
        &mut self,
        call_id: &str,
        result: &ToolInvocationResult,
    ) -> Result<(), HistoryError> {
        let position = self
            .outstanding
            .iter()
            .position(|call| call.id == call_id)
            .ok_or_else(|| HistoryError::UnmatchedToolResult(call_id.to_string()))?;

        let call = self.outstanding.remove(position);
        let mut message = Message::tool_result(&call, result);
        message.tool_round = self.round.clone();
        self.append(message);
        Ok(())
    }

    pub fn has_outstanding_tool_calls(&self) -> bool {
        !self.outstanding.is_empty()
    }

    pub fn outstanding_tool_calls(&self) -> &[ToolCall] {
        &self.outstanding
    }

    /// Closes an unfinished tool round after a fault or cancellation. Results
    /// already appended stay in place.
    pub fn abandon_tool_round(&mut self) -> usize {
        let dropped = self.outstanding.len();
        self.outstanding.clear();
        dropped
    }

    pub fn count_by_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }

    fn ensure_no_pending_results(&self) -> Result<(), HistoryError> {
        if self.outstanding.is_empty() {
            Ok(())
        } else {
            Err(HistoryError::ToolResultsPending(self.outstanding.len()))
        }
    }

    fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }
}
