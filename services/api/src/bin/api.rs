//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{ClaudeQaAdapter, DbAdapter, HttpOcrAdapter, OllamaQaAdapter},
    config::{Config, LlmBackend},
    error::ApiError,
    pipeline::{spawn_workers, PdfTextExtractor, PipelineContext, PipelineSettings},
    web::{
        cancel_handler, delete_pdf_handler, get_pdf_handler, get_qa_pairs_handler,
        get_status_handler, list_pdfs_handler, upload_pdf_handler, state::AppState, ApiDoc,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use pdfqa_core::chunk::ChunkOptions;
use pdfqa_core::ports::{OcrEngine, QaGenerator};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    std::fs::create_dir_all(config.pdf_dir())?;
    std::fs::create_dir_all(config.results_dir())?;

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| ApiError::Internal(format!("Invalid DATABASE_URL: {e}")))?
        .create_if_missing(true)
        .foreign_keys(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;
    let store = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let http_client = reqwest::Client::builder()
        .build()
        .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {e}")))?;

    let generator: Arc<dyn QaGenerator> = match config.llm_backend {
        LlmBackend::Claude => {
            let api_key = config.anthropic_api_key.clone().ok_or_else(|| {
                ApiError::Internal(
                    "ANTHROPIC_API_KEY is required for the claude backend".to_string(),
                )
            })?;
            Arc::new(ClaudeQaAdapter::new(
                http_client.clone(),
                api_key,
                config.claude_model.clone(),
            ))
        }
        LlmBackend::Ollama => Arc::new(OllamaQaAdapter::new(
            http_client.clone(),
            config.ollama_endpoint.clone(),
            config.ollama_model.clone(),
        )),
    };

    let ocr: Option<Arc<dyn OcrEngine>> = config
        .ocr_endpoint
        .clone()
        .map(|endpoint| Arc::new(HttpOcrAdapter::new(http_client, endpoint)) as Arc<dyn OcrEngine>);
    let extractor = Arc::new(PdfTextExtractor::new(ocr, config.min_text_threshold));

    // --- 4. Start the Pipeline Worker Pool ---
    let (queue_tx, queue_rx) = mpsc::channel(64);
    let shutdown = CancellationToken::new();
    let pipeline_context = Arc::new(PipelineContext {
        store: store.clone(),
        extractor,
        generator,
        settings: PipelineSettings {
            chunk_strategy: config.chunk_strategy,
            chunk_options: ChunkOptions {
                max_tokens: config.chunk_max_tokens,
                overlap: config.chunk_overlap,
                ..ChunkOptions::default()
            },
            results_dir: config.results_dir(),
        },
    });
    let workers = spawn_workers(
        pipeline_context,
        queue_rx,
        config.worker_count,
        shutdown.clone(),
    );
    info!("Started {} pipeline workers", workers.len());

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        store,
        config: config.clone(),
        queue: queue_tx,
    });

    // --- 6. Create the Web Router ---
    let api_router = Router::new()
        .route("/api/pdf/upload", post(upload_pdf_handler))
        .route("/api/pdf/status/{id}", get(get_status_handler))
        .route("/api/pdf/cancel/{id}", post(cancel_handler))
        .route("/api/pdf/list", get(list_pdfs_handler))
        .route(
            "/api/pdf/{id}",
            get(get_pdf_handler).delete(delete_pdf_handler),
        )
        .route("/api/pdf/{id}/qa", get(get_qa_pairs_handler))
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    // Let in-flight documents reach their next checkpoint, then stop the pool.
    shutdown.cancel();
    for worker in workers {
        worker.await.ok();
    }

    Ok(())
}
