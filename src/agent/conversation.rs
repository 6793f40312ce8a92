//! Round-bounded exchange between the model and the toolbox.

use super::prompt::system_prompt;
use super::provider::ModelProvider;
use super::types::{ContentBlock, Message, MessageRequest, Role, ToolCall};
use crate::error::{OpsError, Result};
use crate::tools::{catalogue, ToolDeclaration, Toolbox};
use tracing::{debug, info, warn};

/// Where the driver is between rounds.
#[derive(Debug, Clone, PartialEq)]
enum State {
    AwaitingResponse,
    DispatchingTools(Vec<ToolCall>),
    Done(String),
    AbortedBudget,
}

pub struct Conversation<'a> {
    provider: &'a dyn ModelProvider,
    toolbox: &'a Toolbox,
    tools: Vec<ToolDeclaration>,
    system: String,
    messages: Vec<Message>,
    rounds: usize,
}

impl<'a> Conversation<'a> {
    pub fn new(provider: &'a dyn ModelProvider, toolbox: &'a Toolbox) -> Self {
        Self {
            provider,
            toolbox,
            tools: catalogue(),
            system: system_prompt(toolbox.config()),
            messages: Vec::new(),
            rounds: 0,
        }
    }

    /// Full history, oldest first. Entries are only ever appended.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Drives the exchange to a final answer, a fatal provider error, or the round cap.
    pub async fn run(&mut self, instruction: &str) -> Result<String> {
        let max_rounds = self.toolbox.config().max_rounds;
        self.messages.push(Message::user_text(instruction));

        let mut state = State::AwaitingResponse;
        loop {
            state = match state {
                State::AwaitingResponse if self.rounds >= max_rounds => State::AbortedBudget,
                State::AwaitingResponse => self.request_round().await?,
                State::DispatchingTools(calls) => {
                    self.dispatch(calls).await;
                    State::AwaitingResponse
                }
                State::Done(answer) => return Ok(answer),
                State::AbortedBudget => return Err(OpsError::RoundBudgetExhausted(max_rounds)),
            };
        }
    }

    async fn request_round(&mut self) -> Result<State> {
        self.rounds += 1;
        info!(round = self.rounds, "requesting model response");

        let cfg = self.toolbox.config();
        let request = MessageRequest {
            model: cfg.model.clone(),
            system: self.system.clone(),
            max_tokens: cfg.max_tokens,
            tools: self.tools.clone(),
            messages: self.messages.clone(),
        };
        let response = self.provider.send(&request).await?;
        debug!(stop_reason = ?response.stop_reason, blocks = response.content.len(), "model responded");

        let calls = response.tool_calls();
        let content: Vec<ContentBlock> = response
            .content
            .iter()
            .filter(|b| !matches!(b, ContentBlock::Unsupported))
            .cloned()
            .collect();
        self.messages.push(Message {
            role: Role::Assistant,
            content,
        });

        if calls.is_empty() {
            Ok(State::Done(response.text()))
        } else {
            Ok(State::DispatchingTools(calls))
        }
    }

    /// One call at a time, in the order the model listed them; all results go back together.
    async fn dispatch(&mut self, calls: Vec<ToolCall>) {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let result = self.toolbox.invoke(&call.name, call.input).await;
            if let Some(err) = result.error.as_ref().filter(|e| e.is_terminal()) {
                warn!(tool = %call.name, error = %err, "tool hit an unrecoverable condition");
            }
            results.push(ContentBlock::ToolResult {
                tool_use_id: call.id,
                content: result.content,
                is_error: result.is_error,
            });
        }
        self.messages.push(Message {
            role: Role::User,
            content: results,
        });
    }
}
