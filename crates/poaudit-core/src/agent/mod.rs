//! Conversational agent loop.
//!
//! The loop alternates between the language model and the tool dispatcher:
//! 1. The model reads the conversation and the tool schemas
//! 2. It answers with text, or asks for one tool call
//! 3. The tool result (or a structured error) is appended and the model runs again
//!
//! The ledger is only ever reached through tools, so answering a question
//! never re-runs recognition.

mod prompt;

pub use prompt::{SYSTEM_PROMPT, system_prompt_with_documents};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::models::config::AgentConfig;
use crate::tools::{ToolCall, ToolDispatcher};

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Message in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Tool call requested by an assistant turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant turn asking for a tool.
    pub fn tool_request(call: ToolCall) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_call: Some(call),
        }
    }

    /// Tool output fed back to the model, serialized as JSON.
    pub fn tool_result(call: &ToolCall, result: &Value) -> Self {
        Self {
            role: Role::Tool,
            content: result.to_string(),
            tool_call: Some(call.clone()),
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call: None,
        }
    }
}

/// One answer from the language model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    ToolCall(ToolCall),
}

/// Language model capability.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Continue the conversation, optionally requesting one of `tools`.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<ModelReply, AgentError>;
}

/// One tool call made while answering, with what it returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub call: ToolCall,
    pub result: Value,
    /// False when the dispatcher rejected the call.
    pub succeeded: bool,
}

/// Final answer of one agent turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAnswer {
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
}

/// Bounded reason-and-act loop over a [`LanguageModel`].
#[derive(Debug, Clone)]
pub struct AgentLoop {
    max_tool_rounds: usize,
    model_timeout: Duration,
    system_prompt: String,
}

impl Default for AgentLoop {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

impl AgentLoop {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_tool_rounds: config.max_tool_rounds,
            model_timeout: Duration::from_secs(config.model_timeout_seconds),
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn max_tool_rounds(&self) -> usize {
        self.max_tool_rounds
    }

    /// Answer one user message.
    ///
    /// `history` holds earlier user and assistant turns; the system prompt is
    /// prepended here and must not be part of it.
    pub async fn run(
        &self,
        model: &dyn LanguageModel,
        dispatcher: &ToolDispatcher<'_>,
        history: &[ChatMessage],
        user_message: &str,
    ) -> Result<AgentAnswer, AgentError> {
        let tools = dispatcher.definitions();

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(history.iter().filter(|m| m.role != Role::System).cloned());
        messages.push(ChatMessage::user(user_message));

        let mut tool_calls: Vec<ToolInvocation> = Vec::new();

        loop {
            debug!(
                "Agent round {}/{}",
                tool_calls.len() + 1,
                self.max_tool_rounds
            );

            match self.complete(model, &messages, &tools).await? {
                ModelReply::Text(text) => {
                    info!("Agent answered after {} tool calls", tool_calls.len());
                    return Ok(AgentAnswer { text, tool_calls });
                }
                ModelReply::ToolCall(call) => {
                    if tool_calls.len() >= self.max_tool_rounds {
                        warn!(
                            "Agent requested {} after {} tool rounds, giving up",
                            call.name, self.max_tool_rounds
                        );
                        return Err(AgentError::ToolRoundsExhausted(self.max_tool_rounds));
                    }

                    let (result, succeeded) = match dispatcher.dispatch(&call) {
                        Ok(value) => (value, true),
                        Err(e) => {
                            warn!("Tool call rejected: {}", e);
                            (e.to_json(), false)
                        }
                    };

                    messages.push(ChatMessage::tool_request(call.clone()));
                    messages.push(ChatMessage::tool_result(&call, &result));
                    tool_calls.push(ToolInvocation {
                        call,
                        result,
                        succeeded,
                    });
                }
            }
        }
    }

    async fn complete(
        &self,
        model: &dyn LanguageModel,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<ModelReply, AgentError> {
        match tokio::time::timeout(self.model_timeout, model.complete(messages, tools)).await {
            Ok(reply) => reply,
            Err(_) => Err(AgentError::ModelTimeout(self.model_timeout.as_secs())),
        }
    }
}
