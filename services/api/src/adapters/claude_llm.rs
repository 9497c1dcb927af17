//! services/api/src/adapters/claude_llm.rs
//!
//! This module contains the adapter for the hosted Anthropic messages API.
//! It implements the `QaGenerator` port from the `core` crate.

use crate::adapters::prompt::{build_prompt, parse_qa_array};
use async_trait::async_trait;
use pdfqa_core::domain::GeneratedQa;
use pdfqa_core::ports::{PortError, PortResult, QaGenerator};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `QaGenerator` against the Anthropic messages API.
#[derive(Clone)]
pub struct ClaudeQaAdapter {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl ClaudeQaAdapter {
    /// Creates a new `ClaudeQaAdapter`.
    pub fn new(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }
}

//=========================================================================================
// Response Envelope
//=========================================================================================

/// The messages API wraps generated text in a list of typed content blocks;
/// the Q&A array lives in the first `text` block.
#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

//=========================================================================================
// `QaGenerator` Trait Implementation
//=========================================================================================

#[async_trait]
impl QaGenerator for ClaudeQaAdapter {
    async fn generate(&self, heading: &str, content: &str) -> PortResult<Vec<GeneratedQa>> {
        let prompt = build_prompt(heading, content);

        let response = self
            .client
            .post(MESSAGES_URL)
            .timeout(REQUEST_TIMEOUT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&json!({
                "model": self.model,
                "max_tokens": 1000,
                "messages": [{ "role": "user", "content": prompt }],
            }))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Claude API request failed: {e}")))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(format!("Claude API returned an error: {e}")))?;

        let envelope: MessagesResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Invalid Claude API response: {e}")))?;

        let text = envelope
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| {
                PortError::Unexpected("Claude API response contained no text block".to_string())
            })?;

        parse_qa_array(&text)
    }
}
