//! crates/pdfqa_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Represents one uploaded PDF and its processing state.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub original_name: String,
    pub file_path: String,
    pub page_count: Option<u32>,
    pub status: DocumentStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Creates a freshly uploaded document with `Uploaded` status.
    pub fn new(id: Uuid, original_name: &str, file_path: &str) -> Self {
        let now = Utc::now();
        Self {
            id,
            original_name: original_name.to_string(),
            file_path: file_path.to_string(),
            page_count: None,
            status: DocumentStatus::Uploaded,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A condensed view of a document for listings, including its Q&A pair count.
#[derive(Debug, Clone)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub original_name: String,
    pub status: DocumentStatus,
    pub page_count: Option<u32>,
    pub qa_count: u32,
    pub created_at: DateTime<Utc>,
}

/// The processing phase of a document, modelled as a tagged variant rather
/// than the free-form status string it is stored as.
///
/// The phase ordering is `Uploaded -> Processing -> GeneratingChunk{1..n} ->
/// Completed`. `Failed` is reachable from any non-terminal state; `Failed`,
/// `Canceled` and `Completed` are terminal. The storage layer enforces
/// terminality, this type only describes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Uploaded,
    /// Text extraction and chunking are underway.
    Processing,
    /// Q&A generation is running for chunk `current` of `total` (1-based).
    GeneratingChunk { current: u32, total: u32 },
    Completed,
    Failed,
    Canceled,
}

impl DocumentStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DocumentStatus::Completed | DocumentStatus::Failed | DocumentStatus::Canceled
        )
    }

    /// The externally reported progress percentage for this phase.
    pub fn progress(&self) -> u8 {
        match self {
            DocumentStatus::Uploaded => 0,
            DocumentStatus::Processing => 25,
            DocumentStatus::GeneratingChunk { current, total } => {
                let total = (*total).max(1) as u64;
                let current = (*current).min(total as u32) as u64;
                (25 + 70 * current / total) as u8
            }
            DocumentStatus::Completed => 100,
            DocumentStatus::Failed | DocumentStatus::Canceled => 0,
        }
    }

    /// A human-readable description of this phase for the polling client.
    pub fn message(&self, error: Option<&str>) -> String {
        match self {
            DocumentStatus::Uploaded => "PDF uploaded. Waiting for processing.".to_string(),
            DocumentStatus::Processing => "Extracting text from PDF...".to_string(),
            DocumentStatus::GeneratingChunk { current, total } => {
                format!("Generating Q&A pairs ({current}/{total} chunks)...")
            }
            DocumentStatus::Completed => "Processing completed successfully.".to_string(),
            DocumentStatus::Failed => {
                format!("Processing failed: {}", error.unwrap_or("unknown error"))
            }
            DocumentStatus::Canceled => "Processing was canceled by the user".to_string(),
        }
    }
}

/// The wire/storage form. `GeneratingChunk { 2, 5 }` renders as
/// `processing_chunk_2_of_5`; everything else is a bare keyword.
impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentStatus::Uploaded => write!(f, "uploaded"),
            DocumentStatus::Processing => write!(f, "processing"),
            DocumentStatus::GeneratingChunk { current, total } => {
                write!(f, "processing_chunk_{current}_of_{total}")
            }
            DocumentStatus::Completed => write!(f, "completed"),
            DocumentStatus::Failed => write!(f, "failed"),
            DocumentStatus::Canceled => write!(f, "canceled"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not a valid document status")]
pub struct ParseStatusError(String);

impl FromStr for DocumentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(DocumentStatus::Uploaded),
            "processing" => Ok(DocumentStatus::Processing),
            "completed" => Ok(DocumentStatus::Completed),
            "failed" => Ok(DocumentStatus::Failed),
            "canceled" => Ok(DocumentStatus::Canceled),
            other => {
                // processing_chunk_{i}_of_{n}
                let parts: Vec<&str> = other.split('_').collect();
                if let ["processing", "chunk", current, "of", total] = parts.as_slice() {
                    let current = current
                        .parse::<u32>()
                        .map_err(|_| ParseStatusError(other.to_string()))?;
                    let total = total
                        .parse::<u32>()
                        .map_err(|_| ParseStatusError(other.to_string()))?;
                    Ok(DocumentStatus::GeneratingChunk { current, total })
                } else {
                    Err(ParseStatusError(other.to_string()))
                }
            }
        }
    }
}

/// A labeled, ordered slice of extracted text used as one generation unit.
/// Chunks are transient; their position in the produced sequence determines
/// generation order and they are never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub heading: String,
    pub content: String,
}

/// One question/answer triple as returned by a generation backend, before it
/// is attached to a document.
#[derive(Debug, Clone)]
pub struct GeneratedQa {
    pub question: String,
    pub answer: String,
    /// Open tag set: factual / conceptual / procedural / error / unknown.
    pub kind: String,
}

/// One generated question/answer record tied to a document and a chunk's
/// heading. Immutable once created; cascade-deleted with its document.
#[derive(Debug, Clone)]
pub struct QaPair {
    pub id: Uuid,
    pub document_id: Uuid,
    pub question: String,
    pub answer: String,
    pub section: Option<String>,
    pub page_number: Option<u32>,
    pub confidence: Option<f64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_display_and_from_str() {
        let statuses = [
            DocumentStatus::Uploaded,
            DocumentStatus::Processing,
            DocumentStatus::GeneratingChunk {
                current: 2,
                total: 5,
            },
            DocumentStatus::Completed,
            DocumentStatus::Failed,
            DocumentStatus::Canceled,
        ];
        for status in statuses {
            let parsed: DocumentStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn malformed_status_strings_are_rejected() {
        assert!("processing_chunk_x_of_5".parse::<DocumentStatus>().is_err());
        assert!("processing_chunk_2_of".parse::<DocumentStatus>().is_err());
        assert!("queued".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn progress_mapping_matches_the_reported_contract() {
        assert_eq!(DocumentStatus::Uploaded.progress(), 0);
        assert_eq!(DocumentStatus::Processing.progress(), 25);
        assert_eq!(
            DocumentStatus::GeneratingChunk {
                current: 2,
                total: 5
            }
            .progress(),
            53
        );
        assert_eq!(
            DocumentStatus::GeneratingChunk {
                current: 5,
                total: 5
            }
            .progress(),
            95
        );
        assert_eq!(DocumentStatus::Completed.progress(), 100);
        assert_eq!(DocumentStatus::Failed.progress(), 0);
    }

    #[test]
    fn terminal_states_are_flagged() {
        assert!(DocumentStatus::Completed.is_terminal());
        assert!(DocumentStatus::Failed.is_terminal());
        assert!(DocumentStatus::Canceled.is_terminal());
        assert!(!DocumentStatus::Processing.is_terminal());
        assert!(!DocumentStatus::GeneratingChunk {
            current: 1,
            total: 2
        }
        .is_terminal());
    }
}
