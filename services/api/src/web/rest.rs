//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use pdfqa_core::domain::{Document, DocumentStatus, QaPair};
use pdfqa_core::ports::PortError;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        upload_pdf_handler,
        get_status_handler,
        cancel_handler,
        list_pdfs_handler,
        get_pdf_handler,
        get_qa_pairs_handler,
        delete_pdf_handler,
    ),
    components(
        schemas(PdfStatusResponse, PdfSummaryResponse, PdfDetailResponse, QaPairResponse)
    ),
    tags(
        (name = "PDF Q&A API", description = "Endpoints for uploading PDFs and retrieving generated Q&A pairs.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

/// The status payload returned to the polling client.
#[derive(Serialize, ToSchema)]
pub struct PdfStatusResponse {
    pub id: Uuid,
    pub status: String,
    /// 0-100, derived from the status rather than stored.
    pub progress: u8,
    pub message: String,
}

impl PdfStatusResponse {
    fn from_document(document: &Document) -> Self {
        Self {
            id: document.id,
            status: document.status.to_string(),
            progress: document.status.progress(),
            message: document.status.message(document.error.as_deref()),
        }
    }
}

/// One row of the document listing.
#[derive(Serialize, ToSchema)]
pub struct PdfSummaryResponse {
    pub id: Uuid,
    pub original_name: String,
    pub status: String,
    pub page_count: Option<u32>,
    pub qa_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Full document detail.
#[derive(Serialize, ToSchema)]
pub struct PdfDetailResponse {
    pub id: Uuid,
    pub original_name: String,
    pub status: String,
    pub progress: u8,
    pub page_count: Option<u32>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One generated question-answer pair.
#[derive(Serialize, ToSchema)]
pub struct QaPairResponse {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub section: Option<String>,
    pub page_number: Option<u32>,
    pub confidence: Option<f64>,
    #[schema(value_type = Object)]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl QaPairResponse {
    fn from_domain(pair: QaPair) -> Self {
        Self {
            id: pair.id,
            question: pair.question,
            answer: pair.answer,
            section: pair.section,
            page_number: pair.page_number,
            confidence: pair.confidence,
            metadata: pair.metadata,
            created_at: pair.created_at,
        }
    }
}

/// Best-effort removal of an uploaded file that no Document row references.
async fn remove_stored_file(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Could not remove stored file {}: {}", path.display(), e);
    }
}

fn port_error_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Unexpected(msg) => {
            error!("Request failed: {}", msg);
            (StatusCode::INTERNAL_SERVER_ERROR, msg)
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Upload a PDF file and start background processing.
///
/// Accepts a multipart/form-data request with a single PDF file part. The
/// request returns immediately with status `uploaded`; progress is reported
/// through the status endpoint.
#[utoipa::path(
    post,
    path = "/api/pdf/upload",
    request_body(content_type = "multipart/form-data", description = "The PDF to upload."),
    responses(
        (status = 201, description = "PDF stored and queued for processing", body = PdfStatusResponse),
        (status = 400, description = "Bad request (missing file or not a PDF)"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_pdf_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read multipart data: {}", e),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "Multipart form must include a file".to_string(),
            )
        })?;

    let original_name = field.file_name().unwrap_or("untitled.pdf").to_string();
    if !original_name.to_lowercase().ends_with(".pdf") {
        return Err((StatusCode::BAD_REQUEST, "File must be a PDF".to_string()));
    }

    let data = field.bytes().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read file bytes: {}", e),
        )
    })?;

    let id = Uuid::new_v4();
    let pdf_dir = app_state.config.pdf_dir();
    let file_path = pdf_dir.join(format!("{id}.pdf"));
    let stored = async {
        tokio::fs::create_dir_all(&pdf_dir).await?;
        tokio::fs::write(&file_path, &data).await
    }
    .await;
    if let Err(e) = stored {
        error!("Failed to store uploaded PDF: {}", e);
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to store uploaded PDF".to_string(),
        ));
    }

    let document = Document::new(id, &original_name, &file_path.to_string_lossy());
    if let Err(e) = app_state.store.insert_document(&document).await {
        // Nothing references the stored file yet; do not orphan it.
        remove_stored_file(&file_path).await;
        return Err(port_error_response(e));
    }

    if app_state.queue.send(id).await.is_err() {
        // Workers are gone (shutdown); surface it rather than strand the row.
        error!("Pipeline queue is closed; cannot process document {}", id);
        remove_stored_file(&file_path).await;
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Processing queue is unavailable".to_string(),
        ));
    }

    Ok((
        StatusCode::CREATED,
        Json(PdfStatusResponse {
            id,
            status: DocumentStatus::Uploaded.to_string(),
            progress: 0,
            message: "PDF uploaded successfully. Processing will begin shortly.".to_string(),
        }),
    ))
}

/// Get the processing status of a PDF.
#[utoipa::path(
    get,
    path = "/api/pdf/status/{id}",
    responses(
        (status = 200, description = "Current processing status", body = PdfStatusResponse),
        (status = 404, description = "Unknown document id")
    ),
    params(("id" = Uuid, Path, description = "The document id."))
)]
pub async fn get_status_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let document = app_state
        .store
        .get_document(id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(PdfStatusResponse::from_document(&document)))
}

/// Cancel the processing of a PDF.
///
/// Cancellation is cooperative: the pipeline checks at each chunk boundary,
/// so an in-flight generation call is not interrupted mid-call.
#[utoipa::path(
    post,
    path = "/api/pdf/cancel/{id}",
    responses(
        (status = 200, description = "Processing canceled", body = PdfStatusResponse),
        (status = 400, description = "Document already reached a terminal state"),
        (status = 404, description = "Unknown document id")
    ),
    params(("id" = Uuid, Path, description = "The document id."))
)]
pub async fn cancel_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Distinguish "unknown id" from "nothing left to cancel".
    app_state
        .store
        .get_document(id)
        .await
        .map_err(port_error_response)?;

    let canceled = app_state.store.cancel(id).await.map_err(port_error_response)?;
    if !canceled {
        return Err((
            StatusCode::BAD_REQUEST,
            "PDF is not being processed".to_string(),
        ));
    }

    Ok(Json(PdfStatusResponse {
        id,
        status: DocumentStatus::Canceled.to_string(),
        progress: 0,
        message: "PDF processing has been canceled".to_string(),
    }))
}

/// List all uploaded PDFs, newest first.
#[utoipa::path(
    get,
    path = "/api/pdf/list",
    responses(
        (status = 200, description = "All documents with their Q&A counts", body = [PdfSummaryResponse])
    )
)]
pub async fn list_pdfs_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let summaries = app_state
        .store
        .list_documents()
        .await
        .map_err(port_error_response)?;

    let response: Vec<PdfSummaryResponse> = summaries
        .into_iter()
        .map(|s| PdfSummaryResponse {
            id: s.id,
            original_name: s.original_name,
            status: s.status.to_string(),
            page_count: s.page_count,
            qa_count: s.qa_count,
            created_at: s.created_at,
        })
        .collect();
    Ok(Json(response))
}

/// Get the details of one PDF.
#[utoipa::path(
    get,
    path = "/api/pdf/{id}",
    responses(
        (status = 200, description = "Document detail", body = PdfDetailResponse),
        (status = 404, description = "Unknown document id")
    ),
    params(("id" = Uuid, Path, description = "The document id."))
)]
pub async fn get_pdf_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let document = app_state
        .store
        .get_document(id)
        .await
        .map_err(port_error_response)?;

    Ok(Json(PdfDetailResponse {
        id: document.id,
        original_name: document.original_name,
        status: document.status.to_string(),
        progress: document.status.progress(),
        page_count: document.page_count,
        error: document.error,
        created_at: document.created_at,
        updated_at: document.updated_at,
    }))
}

/// Get the generated Q&A pairs for a PDF, ordered by creation.
#[utoipa::path(
    get,
    path = "/api/pdf/{id}/qa",
    responses(
        (status = 200, description = "Generated Q&A pairs", body = [QaPairResponse]),
        (status = 404, description = "Unknown document id")
    ),
    params(("id" = Uuid, Path, description = "The document id."))
)]
pub async fn get_qa_pairs_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 404 for unknown ids rather than an empty list.
    app_state
        .store
        .get_document(id)
        .await
        .map_err(port_error_response)?;

    let pairs = app_state
        .store
        .qa_pairs_for_document(id)
        .await
        .map_err(port_error_response)?;

    let response: Vec<QaPairResponse> =
        pairs.into_iter().map(QaPairResponse::from_domain).collect();
    Ok(Json(response))
}

/// Delete a PDF, its stored file and all of its Q&A pairs.
#[utoipa::path(
    delete,
    path = "/api/pdf/{id}",
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "Unknown document id")
    ),
    params(("id" = Uuid, Path, description = "The document id."))
)]
pub async fn delete_pdf_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let document = app_state
        .store
        .get_document(id)
        .await
        .map_err(port_error_response)?;

    app_state
        .store
        .delete_document(id)
        .await
        .map_err(port_error_response)?;

    remove_stored_file(std::path::Path::new(&document.file_path)).await;

    Ok(StatusCode::NO_CONTENT)
}
