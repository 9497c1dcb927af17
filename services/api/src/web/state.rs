//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use pdfqa_core::ports::DocumentStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<Config>,
    /// Producer side of the pipeline queue; the upload handler enqueues
    /// freshly created document ids here.
    pub queue: mpsc::Sender<Uuid>,
}
