//! services/api/src/pipeline/mod.rs
//!
//! The asynchronous processing pipeline: extraction, chunking settings and
//! the worker pool that drives documents from `uploaded` to a terminal state.

pub mod extract;
pub mod worker;

use pdfqa_core::chunk::{ChunkOptions, ChunkStrategy};
use std::path::PathBuf;

pub use extract::{ExtractError, PdfTextExtractor};
pub use worker::{process_document, spawn_workers, PipelineContext};

/// Pipeline tunables resolved from configuration at startup.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chunk_strategy: ChunkStrategy,
    pub chunk_options: ChunkOptions,
    /// Where extraction dumps are written for audit.
    pub results_dir: PathBuf,
}
