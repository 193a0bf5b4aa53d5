use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TurnState {
    Idle,
    AwaitingModel,
    StreamingText,
    HandlingToolCalls,
    Complete,
    Failed,
    Aborted,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnState::Complete | TurnState::Failed | TurnState::Aborted
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    PromptAccepted,
    StreamOpened,
    ToolCallsSurfaced,
    ToolResultsAppended,
    CleanCompletion,
    Fault,
    Cancelled,
}

/// Tracks one prompt's progress through the tool loop.
#[derive(Debug)]
pub struct TurnMachine {
    session_id: String,
    state: TurnState,
}

impl TurnMachine {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: TurnState::Idle,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Applies an event. Transitions not in the table leave the state as is.
    pub fn handle(&mut self, event: TurnEvent) -> TurnState {
        let next = match (self.state, event) {
            (TurnState::Idle, TurnEvent::PromptAccepted) => TurnState::AwaitingModel,
            (TurnState::AwaitingModel, TurnEvent::StreamOpened) => TurnState::StreamingText,
            (TurnState::StreamingText, TurnEvent::ToolCallsSurfaced) => {
                TurnState::HandlingToolCalls
            }
            (TurnState::StreamingText, TurnEvent::CleanCompletion) => TurnState::Complete,
            (TurnState::HandlingToolCalls, TurnEvent::ToolResultsAppended) => {
                TurnState::AwaitingModel
            }
            (state, TurnEvent::Fault) if !state.is_terminal() => TurnState::Failed,
            (state, TurnEvent::Cancelled) if !state.is_terminal() => TurnState::Aborted,
            (state, event) => {
                log::warn!(
                    "[{}] ignoring {:?} in state {:?}",
                    self.session_id,
                    event,
                    state
                );
                state
            }
        };

        if next != self.state {
            log::debug!("[{}] {:?} -> {:?}", self.session_id, self.state, next);
        }
        self.state = next;
        next
    }
}
