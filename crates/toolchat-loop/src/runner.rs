use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use toolchat_core::{AgentError, Conversation, ToolDispatcher, ToolProvider};
use toolchat_llm::{CompletionOptions, LLMProvider};

use crate::config::OrchestratorConfig;
use crate::discovery::{discover, Catalog};
use crate::state::{TurnEvent, TurnMachine, TurnState};
use crate::stream::{assemble, AssembleError};

/// Outcome of one prompt with counters for callers that want them.
#[derive(Debug)]
pub struct TurnReport {
    pub state: TurnState,
    /// Model invocations made.
    pub rounds: usize,
    pub tool_calls_dispatched: usize,
    pub outcome: Result<String, AgentError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnSummary {
    pub state: TurnState,
    pub rounds: usize,
    pub tool_calls_dispatched: usize,
}

impl TurnReport {
    pub fn summary(&self) -> TurnSummary {
        TurnSummary {
            state: self.state,
            rounds: self.rounds,
            tool_calls_dispatched: self.tool_calls_dispatched,
        }
    }
}

/// Drives the prompt, model, tools, model cycle for a conversation.
pub struct Orchestrator {
    llm: Arc<dyn LLMProvider>,
    providers: Arc<[Arc<dyn ToolProvider>]>,
    config: OrchestratorConfig,
}

struct Turn<'a> {
    session_id: String,
    machine: TurnMachine,
    conversation: &'a mut Conversation,
    rounds: usize,
    dispatched: usize,
}

impl Turn<'_> {
    fn finish(self, outcome: Result<String, AgentError>) -> TurnReport {
        TurnReport {
            state: self.machine.state(),
            rounds: self.rounds,
            tool_calls_dispatched: self.dispatched,
            outcome,
        }
    }

    fn fail(mut self, error: AgentError) -> TurnReport {
        let dropped = self.conversation.abandon_tool_round();
        if dropped > 0 {
            log::debug!(
                "[{}] abandoned {} unanswered tool call(s)",
                self.session_id,
                dropped
            );
        }
        let event = match error {
            AgentError::Cancelled => TurnEvent::Cancelled,
            _ => TurnEvent::Fault,
        };
        self.machine.handle(event);
        log::warn!("[{}] turn ended: {}", self.session_id, error);
        self.finish(Err(error))
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        // Also reached when the caller drops the turn future mid-round.
        let dropped = self.conversation.abandon_tool_round();
        if dropped > 0 {
            log::warn!(
                "[{}] turn dropped with {} unanswered tool call(s)",
                self.session_id,
                dropped
            );
        }
    }
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        providers: Vec<Arc<dyn ToolProvider>>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            llm,
            providers: providers.into(),
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn providers(&self) -> &[Arc<dyn ToolProvider>] {
        &self.providers
    }

    /// Runs one discovery cycle outside of a turn.
    pub async fn discover_tools(&self) -> Catalog {
        discover(&self.providers, self.config.discovery_timeout, "catalog").await
    }

    /// Answers `prompt`, running tool rounds until the model replies with
    /// plain text. On success the reply is the last message of the history.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<String, AgentError> {
        self.run_turn_with_report(conversation, prompt, cancel)
            .await
            .outcome
    }

    pub async fn run_turn_with_report(
        &self,
        conversation: &mut Conversation,
        prompt: &str,
        cancel: CancellationToken,
    ) -> TurnReport {
        let session_id = conversation.id().to_string();
        let mut turn = Turn {
            machine: TurnMachine::new(session_id.clone()),
            session_id,
            conversation,
            rounds: 0,
            dispatched: 0,
        };

        if cancel.is_cancelled() {
            return turn.fail(AgentError::Cancelled);
        }

        if turn.conversation.is_empty() && !self.config.system_prompt.is_empty() {
            if let Err(e) = turn.conversation.push_system(self.config.system_prompt.as_str()) {
                return turn.fail(e.into());
            }
        }
        if let Err(e) = turn.conversation.push_user(prompt) {
            return turn.fail(e.into());
        }
        turn.machine.handle(TurnEvent::PromptAccepted);
        log::info!("[{}] prompt accepted", turn.session_id);

        let catalog = tokio::select! {
            biased;
            _ = cancel.cancelled() => return turn.fail(AgentError::Cancelled),
            catalog = discover(&self.providers, self.config.discovery_timeout, &turn.session_id) => catalog,
        };
        let schemas = catalog.index.schemas();
        let dispatcher = ToolDispatcher::new(
            Arc::clone(&catalog.index),
            self.config.invocation_timeout,
        );
        let options = CompletionOptions::new(
            self.config.model.clone(),
            Some(self.config.max_output_tokens),
        );

        let max_rounds = self.config.max_rounds;
        while turn.rounds < max_rounds {
            turn.rounds += 1;
            log::debug!(
                "[{}] model round {}/{} with {} tool(s)",
                turn.session_id,
                turn.rounds,
                max_rounds,
                schemas.len()
            );

            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => return turn.fail(AgentError::Cancelled),
                opened = self.llm.chat_stream(turn.conversation.messages(), &schemas, &options) => opened,
            };
            let stream = match opened {
                Ok(stream) => stream,
                Err(e) => return turn.fail(AgentError::LLM(e.to_string())),
            };
            turn.machine.handle(TurnEvent::StreamOpened);

            let response = match assemble(stream, &cancel, &turn.session_id).await {
                Ok(response) => response,
                Err(AssembleError::Cancelled) => return turn.fail(AgentError::Cancelled),
                Err(AssembleError::Partial(partial)) => {
                    return turn.fail(AgentError::PartialResponse(partial.reason))
                }
            };

            if response.tool_calls.is_empty() {
                if let Err(e) = turn.conversation.push_assistant(response.text.as_str()) {
                    return turn.fail(e.into());
                }
                turn.machine.handle(TurnEvent::CleanCompletion);
                log::info!(
                    "[{}] turn complete after {} round(s)",
                    turn.session_id,
                    turn.rounds
                );
                return turn.finish(Ok(response.text));
            }

            if turn.rounds == max_rounds {
                break;
            }

            turn.machine.handle(TurnEvent::ToolCallsSurfaced);
            if let Err(e) = turn.conversation.expect_tool_results(&response.tool_calls) {
                return turn.fail(e.into());
            }

            for call in &response.tool_calls {
                log::debug!(
                    "[{}] dispatching '{}' ({})",
                    turn.session_id,
                    call.function.name,
                    call.id
                );
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return turn.fail(AgentError::Cancelled),
                    result = dispatcher.dispatch(call) => result,
                };
                turn.dispatched += 1;
                if let Some(code) = result.error_code() {
                    log::warn!(
                        "[{}] tool '{}' failed with {}",
                        turn.session_id,
                        call.function.name,
                        code
                    );
                }
                if let Err(e) = turn.conversation.push_tool_result(&call.id, &result) {
                    return turn.fail(e.into());
                }
            }
            turn.machine.handle(TurnEvent::ToolResultsAppended);
        }

        turn.fail(AgentError::ToolLoopExceeded(max_rounds))
    }
}
