//! services/api/src/adapters/ocr.rs
//!
//! This module contains the adapter for the external OCR service used when a
//! PDF carries no usable text layer. It implements the `OcrEngine` port from
//! the `core` crate.
//!
//! Contract: POST the PDF (base64) to the configured endpoint, receive the
//! recognized text of every page in page order.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pdfqa_core::ports::{OcrEngine, PortError, PortResult};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// An adapter that implements the `OcrEngine` port against an HTTP OCR service.
#[derive(Clone)]
pub struct HttpOcrAdapter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpOcrAdapter {
    /// Creates a new `HttpOcrAdapter`.
    pub fn new(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

#[derive(Deserialize)]
struct OcrResponse {
    pages: Vec<String>,
}

#[async_trait]
impl OcrEngine for HttpOcrAdapter {
    async fn recognize(&self, pdf_bytes: &[u8]) -> PortResult<Vec<String>> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(REQUEST_TIMEOUT)
            .json(&json!({ "pdf_base64": STANDARD.encode(pdf_bytes) }))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("OCR request failed: {e}")))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(format!("OCR service returned an error: {e}")))?;

        let body: OcrResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Invalid OCR response: {e}")))?;

        Ok(body.pages)
    }
}
