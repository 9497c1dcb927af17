//! services/api/src/adapters/ollama_llm.rs
//!
//! This module contains the adapter for a locally hosted Ollama model server.
//! It implements the `QaGenerator` port from the `core` crate.

use crate::adapters::prompt::{build_prompt, extract_json_array, parse_qa_array};
use async_trait::async_trait;
use pdfqa_core::domain::GeneratedQa;
use pdfqa_core::ports::{PortError, PortResult, QaGenerator};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `QaGenerator` against an Ollama generate endpoint.
#[derive(Clone)]
pub struct OllamaQaAdapter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaQaAdapter {
    /// Creates a new `OllamaQaAdapter`.
    pub fn new(client: reqwest::Client, endpoint: String, model: String) -> Self {
        Self {
            client,
            endpoint,
            model,
        }
    }
}

/// The non-streaming generate response is a raw string that may carry
/// leading/trailing prose around the JSON array.
#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

//=========================================================================================
// `QaGenerator` Trait Implementation
//=========================================================================================

#[async_trait]
impl QaGenerator for OllamaQaAdapter {
    async fn generate(&self, heading: &str, content: &str) -> PortResult<Vec<GeneratedQa>> {
        let prompt = build_prompt(heading, content);

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(REQUEST_TIMEOUT)
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
            }))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Ollama request failed: {e}")))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(format!("Ollama returned an error: {e}")))?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Invalid Ollama response: {e}")))?;

        parse_qa_array(extract_json_array(&body.response)?)
    }
}
