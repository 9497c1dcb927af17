//! crates/pdfqa_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! pipeline to be independent of specific external implementations like the
//! database, the PDF tooling or the LLM backends.

use crate::domain::{Document, DocumentStatus, DocumentSummary, GeneratedQa, QaPair};
use async_trait::async_trait;
use std::path::Path;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services
/// (e.g., database, PDF parser, LLM endpoint).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Storage for documents and their Q&A pairs. Status writes double as the
/// synchronization points visible to polling readers, so the implementation
/// must enforce the state-machine guards described on each method.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // --- Document lifecycle ---
    async fn insert_document(&self, document: &Document) -> PortResult<()>;

    async fn get_document(&self, id: Uuid) -> PortResult<Document>;

    /// Summaries of all documents, newest first.
    async fn list_documents(&self) -> PortResult<Vec<DocumentSummary>>;

    /// Deletes a document and, by cascade, its Q&A pairs.
    async fn delete_document(&self, id: Uuid) -> PortResult<()>;

    // --- Status transitions ---

    /// Single-owner claim on the transition out of `uploaded`: moves the
    /// document to `processing` only if it is still `uploaded`, and reports
    /// whether this caller won the claim.
    async fn try_claim_processing(&self, id: Uuid) -> PortResult<bool>;

    /// Writes a new status unless the document already reached a terminal
    /// state. Returns `false` when the write was rejected; the pipeline uses
    /// that rejection as its cooperative cancellation checkpoint.
    async fn set_status(&self, id: Uuid, status: DocumentStatus) -> PortResult<bool>;

    async fn set_page_count(&self, id: Uuid, page_count: u32) -> PortResult<()>;

    /// Moves the document to the terminal `failed` state with the error text
    /// attached. A no-op if the document is already terminal.
    async fn mark_failed(&self, id: Uuid, error: &str) -> PortResult<()>;

    /// Moves the document to the terminal `canceled` state. Returns `false`
    /// if the document was already terminal (nothing left to cancel).
    async fn cancel(&self, id: Uuid) -> PortResult<bool>;

    // --- Q&A pairs ---

    /// Appends one chunk's worth of pairs in a single commit.
    async fn insert_qa_pairs(&self, pairs: &[QaPair]) -> PortResult<()>;

    /// All pairs for a document, ordered by creation.
    async fn qa_pairs_for_document(&self, document_id: Uuid) -> PortResult<Vec<QaPair>>;
}

/// The result of extracting a PDF's text layer.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub page_count: u32,
}

/// Converts a stored PDF into plain text plus a structural page count.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> PortResult<Extraction>;
}

/// Optical character recognition for scanned documents: receives the raw PDF
/// bytes and returns the recognized text of each page, in page order.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, pdf_bytes: &[u8]) -> PortResult<Vec<String>>;
}

/// A pluggable LLM backend that turns one chunk into a small set of
/// question-answer triples.
#[async_trait]
pub trait QaGenerator: Send + Sync {
    async fn generate(&self, heading: &str, content: &str) -> PortResult<Vec<GeneratedQa>>;
}
