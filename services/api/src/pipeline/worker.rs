//! services/api/src/pipeline/worker.rs
//!
//! The background processing pipeline: a bounded pool of workers consumes a
//! queue of pending document ids and drives each document through
//! extract -> chunk -> generate -> persist, committing a status update after
//! every micro-step so a polling client sees fine-grained progress.
//!
//! Stage failures from the extractor or chunker are fatal and move the
//! document to `failed`. Generation failures are absorbed per chunk: the
//! chunk gets a single placeholder pair and the pipeline moves on.
//! Cancellation is cooperative; the guarded status write before each chunk is
//! the checkpoint, so an in-flight generation call finishes but no further
//! chunk is started.

use crate::pipeline::PipelineSettings;
use chrono::Utc;
use pdfqa_core::chunk::chunk_text;
use pdfqa_core::domain::{Chunk, DocumentStatus, GeneratedQa, QaPair};
use pdfqa_core::ports::{DocumentStore, PortResult, QaGenerator, TextExtractor};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Everything a worker needs to process one document. Dependencies are
/// explicit so tests can substitute any port with a stub.
pub struct PipelineContext {
    pub store: Arc<dyn DocumentStore>,
    pub extractor: Arc<dyn TextExtractor>,
    pub generator: Arc<dyn QaGenerator>,
    pub settings: PipelineSettings,
}

/// Spawns `worker_count` workers draining the shared queue of pending
/// document ids. Workers stop when the queue closes or the token fires;
/// a document already being processed runs to its next checkpoint.
pub fn spawn_workers(
    context: Arc<PipelineContext>,
    receiver: mpsc::Receiver<Uuid>,
    worker_count: usize,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let receiver = Arc::new(Mutex::new(receiver));
    (0..worker_count)
        .map(|worker| {
            let context = context.clone();
            let receiver = receiver.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(worker_loop(worker, context, receiver, shutdown))
        })
        .collect()
}

async fn worker_loop(
    worker: usize,
    context: Arc<PipelineContext>,
    receiver: Arc<Mutex<mpsc::Receiver<Uuid>>>,
    shutdown: CancellationToken,
) {
    info!("Pipeline worker {} started", worker);
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            id = async { receiver.lock().await.recv().await } => id,
        };
        let Some(id) = next else { break };

        if let Err(e) = process_document(&context, id).await {
            // A pipeline-internal failure (e.g. the store itself); record it
            // on the document so it does not linger in a non-terminal state.
            error!("Pipeline failed for document {}: {}", id, e);
            if let Err(mark_err) = context.store.mark_failed(id, &e.to_string()).await {
                error!("Could not mark document {} as failed: {}", id, mark_err);
            }
        }
    }
    info!("Pipeline worker {} stopped", worker);
}

/// Runs the full pipeline for one document.
///
/// Returns `Ok(())` for every externally-visible outcome (completed, failed,
/// canceled, lost claim); an `Err` means the pipeline itself could not make
/// progress and the caller should record the failure.
pub async fn process_document(context: &PipelineContext, id: Uuid) -> PortResult<()> {
    // Single-owner claim on the transition out of `uploaded`.
    if !context.store.try_claim_processing(id).await? {
        warn!("Document {} is not awaiting processing; skipping", id);
        return Ok(());
    }

    let document = context.store.get_document(id).await?;
    info!(
        "Processing document {} ({})",
        id, document.original_name
    );

    // --- Stage 1: Extraction (fatal on error) ---
    let extraction = match context
        .extractor
        .extract(Path::new(&document.file_path))
        .await
    {
        Ok(extraction) => extraction,
        Err(e) => {
            error!("Extraction failed for document {}: {}", id, e);
            context.store.mark_failed(id, &e.to_string()).await?;
            return Ok(());
        }
    };
    context
        .store
        .set_page_count(id, extraction.page_count)
        .await?;

    // Audit dump of the raw extraction, keyed by document id.
    if let Err(e) = dump_extracted_text(&context.settings.results_dir, id, &extraction.text).await {
        error!("Failed to store extraction dump for document {}: {}", id, e);
        context
            .store
            .mark_failed(id, &format!("Failed to store extraction result: {e}"))
            .await?;
        return Ok(());
    }

    // --- Stage 2: Chunking (fatal on error) ---
    let chunks = match chunk_text(
        &extraction.text,
        context.settings.chunk_strategy,
        &context.settings.chunk_options,
    ) {
        Ok(chunks) => chunks,
        Err(e) => {
            error!("Chunking failed for document {}: {}", id, e);
            context.store.mark_failed(id, &e.to_string()).await?;
            return Ok(());
        }
    };

    // --- Stage 3: Per-chunk generation (errors absorbed) ---
    let total = chunks.len() as u32;
    for (index, chunk) in chunks.iter().enumerate() {
        let current = index as u32 + 1;
        let status = DocumentStatus::GeneratingChunk { current, total };

        // The guarded write is the cancellation checkpoint: a rejected write
        // means the document reached a terminal state underneath us.
        if !context.store.set_status(id, status).await? {
            info!(
                "Document {} reached a terminal state; halting before chunk {}/{}",
                id, current, total
            );
            return Ok(());
        }

        let generated = match context
            .generator
            .generate(&chunk.heading, &chunk.content)
            .await
        {
            Ok(generated) => generated,
            Err(e) => {
                warn!(
                    "Generation failed for chunk {}/{} of document {}: {}",
                    current, total, id, e
                );
                vec![placeholder_pair(&e.to_string())]
            }
        };

        let pairs = to_qa_pairs(id, chunk, generated);
        context.store.insert_qa_pairs(&pairs).await?;
    }

    if context
        .store
        .set_status(id, DocumentStatus::Completed)
        .await?
    {
        info!("Document {} completed ({} chunks)", id, total);
    }
    Ok(())
}

/// The degrade-not-abort policy: a failed generation call becomes one
/// synthetic pair so the pipeline can continue with the next chunk.
fn placeholder_pair(detail: &str) -> GeneratedQa {
    GeneratedQa {
        question: "Error generating Q&A".to_string(),
        answer: format!("API error: {detail}"),
        kind: "error".to_string(),
    }
}

fn to_qa_pairs(document_id: Uuid, chunk: &Chunk, generated: Vec<GeneratedQa>) -> Vec<QaPair> {
    generated
        .into_iter()
        .map(|qa| QaPair {
            id: Uuid::new_v4(),
            document_id,
            question: qa.question,
            answer: qa.answer,
            section: Some(chunk.heading.clone()),
            page_number: None,
            confidence: None,
            metadata: Some(serde_json::json!({ "type": qa.kind })),
            created_at: Utc::now(),
        })
        .collect()
}

async fn dump_extracted_text(
    results_dir: &Path,
    id: Uuid,
    text: &str,
) -> Result<(), std::io::Error> {
    tokio::fs::create_dir_all(results_dir).await?;
    let path = results_dir.join(format!("{id}_text.txt"));
    tokio::fs::write(path, text).await
}
