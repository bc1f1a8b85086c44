//! HTTP client for a chat model endpoint.
//!
//! The endpoint receives `{"messages": [...], "tools": [...]}` and answers
//! with either `{"text": "..."}` or `{"tool_call": {"name": ..., "arguments": {...}}}`.

use std::time::Duration;

use async_trait::async_trait;
use poaudit_core::error::AgentError;
use poaudit_core::tools::ToolCall;
use poaudit_core::{ChatMessage, LanguageModel, ModelReply};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    tool_call: Option<ToolCall>,
}

pub struct HttpLanguageModel {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpLanguageModel {
    pub fn new(endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<ModelReply, AgentError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "messages": messages, "tools": tools }))
            .send()
            .await
            .map_err(|e| AgentError::Model(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AgentError::Model(format!("API error {}: {}", status, error_text)));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Model(format!("Failed to parse response: {}", e)))?;

        match reply {
            ChatResponse {
                tool_call: Some(call),
                ..
            } => Ok(ModelReply::ToolCall(call)),
            ChatResponse {
                text: Some(text), ..
            } => Ok(ModelReply::Text(text)),
            _ => Err(AgentError::Model(
                "response has neither text nor tool_call".to_string(),
            )),
        }
    }
}
