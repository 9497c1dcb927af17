//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DocumentStore` port from the `core` crate. It handles all interactions
//! with the SQLite database using `sqlx`.
//!
//! Status writes are guarded UPDATEs: a transition is only applied while the
//! row is still in a non-terminal state, which is how the pipeline observes
//! cancellation and how terminal states stay terminal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pdfqa_core::domain::{Document, DocumentStatus, DocumentSummary, QaPair};
use pdfqa_core::ports::{DocumentStore, PortError, PortResult};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

const TERMINAL_GUARD: &str = "status NOT IN ('completed', 'failed', 'canceled')";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DocumentStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: impl std::fmt::Display) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRecord {
    id: String,
    original_name: String,
    file_path: String,
    page_count: Option<i64>,
    status: String,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    fn to_domain(self) -> PortResult<Document> {
        Ok(Document {
            id: Uuid::parse_str(&self.id).map_err(unexpected)?,
            original_name: self.original_name,
            file_path: self.file_path,
            page_count: self.page_count.map(|n| n as u32),
            status: self.status.parse::<DocumentStatus>().map_err(unexpected)?,
            error: self.error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct DocumentSummaryRecord {
    id: String,
    original_name: String,
    status: String,
    page_count: Option<i64>,
    qa_count: i64,
    created_at: DateTime<Utc>,
}

impl DocumentSummaryRecord {
    fn to_domain(self) -> PortResult<DocumentSummary> {
        Ok(DocumentSummary {
            id: Uuid::parse_str(&self.id).map_err(unexpected)?,
            original_name: self.original_name,
            status: self.status.parse::<DocumentStatus>().map_err(unexpected)?,
            page_count: self.page_count.map(|n| n as u32),
            qa_count: self.qa_count as u32,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct QaPairRecord {
    id: String,
    document_id: String,
    question: String,
    answer: String,
    section: Option<String>,
    page_number: Option<i64>,
    confidence: Option<f64>,
    metadata: Option<String>,
    created_at: DateTime<Utc>,
}

impl QaPairRecord {
    fn to_domain(self) -> PortResult<QaPair> {
        let metadata = match self.metadata {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(unexpected)?),
            None => None,
        };
        Ok(QaPair {
            id: Uuid::parse_str(&self.id).map_err(unexpected)?,
            document_id: Uuid::parse_str(&self.document_id).map_err(unexpected)?,
            question: self.question,
            answer: self.answer,
            section: self.section,
            page_number: self.page_number.map(|n| n as u32),
            confidence: self.confidence,
            metadata,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for DbAdapter {
    async fn insert_document(&self, document: &Document) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO documents (id, original_name, file_path, page_count, status, error, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(document.id.to_string())
        .bind(&document.original_name)
        .bind(&document.file_path)
        .bind(document.page_count.map(|n| n as i64))
        .bind(document.status.to_string())
        .bind(&document.error)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_document(&self, id: Uuid) -> PortResult<Document> {
        let record = sqlx::query_as::<_, DocumentRecord>(
            "SELECT id, original_name, file_path, page_count, status, error, created_at, updated_at \
             FROM documents WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Document {} not found", id)),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn list_documents(&self) -> PortResult<Vec<DocumentSummary>> {
        let records = sqlx::query_as::<_, DocumentSummaryRecord>(
            "SELECT d.id, d.original_name, d.status, d.page_count, d.created_at, \
             (SELECT COUNT(*) FROM qa_pairs q WHERE q.document_id = d.id) AS qa_count \
             FROM documents d ORDER BY d.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn delete_document(&self, id: Uuid) -> PortResult<()> {
        // Cascade is enforced here rather than left to the schema pragma.
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query("DELETE FROM qa_pairs WHERE document_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Document {} not found", id)));
        }
        Ok(())
    }

    async fn try_claim_processing(&self, id: Uuid) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE documents SET status = 'processing', updated_at = ? \
             WHERE id = ? AND status = 'uploaded'",
        )
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_status(&self, id: Uuid, status: DocumentStatus) -> PortResult<bool> {
        let sql = format!(
            "UPDATE documents SET status = ?, updated_at = ? WHERE id = ? AND {TERMINAL_GUARD}"
        );
        let result = sqlx::query(&sql)
            .bind(status.to_string())
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_page_count(&self, id: Uuid, page_count: u32) -> PortResult<()> {
        sqlx::query("UPDATE documents SET page_count = ?, updated_at = ? WHERE id = ?")
            .bind(page_count as i64)
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> PortResult<()> {
        let sql = format!(
            "UPDATE documents SET status = 'failed', error = ?, updated_at = ? \
             WHERE id = ? AND {TERMINAL_GUARD}"
        );
        sqlx::query(&sql)
            .bind(error)
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn cancel(&self, id: Uuid) -> PortResult<bool> {
        let sql = format!(
            "UPDATE documents SET status = 'canceled', error = ?, updated_at = ? \
             WHERE id = ? AND {TERMINAL_GUARD}"
        );
        let result = sqlx::query(&sql)
            .bind("Processing was canceled by the user")
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_qa_pairs(&self, pairs: &[QaPair]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for pair in pairs {
            let metadata = pair
                .metadata
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(unexpected)?;
            sqlx::query(
                "INSERT INTO qa_pairs (id, document_id, question, answer, section, page_number, confidence, metadata, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(pair.id.to_string())
            .bind(pair.document_id.to_string())
            .bind(&pair.question)
            .bind(&pair.answer)
            .bind(&pair.section)
            .bind(pair.page_number.map(|n| n as i64))
            .bind(pair.confidence)
            .bind(metadata)
            .bind(pair.created_at)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn qa_pairs_for_document(&self, document_id: Uuid) -> PortResult<Vec<QaPair>> {
        let records = sqlx::query_as::<_, QaPairRecord>(
            "SELECT id, document_id, question, answer, section, page_number, confidence, metadata, created_at \
             FROM qa_pairs WHERE document_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(document_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    async fn test_adapter() -> DbAdapter {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        // A single connection keeps the in-memory database alive for the test.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        let adapter = DbAdapter::new(pool);
        adapter.run_migrations().await.unwrap();
        adapter
    }

    fn sample_document() -> Document {
        Document::new(Uuid::new_v4(), "report.pdf", "storage/pdfs/report.pdf")
    }

    fn sample_pair(document_id: Uuid, question: &str) -> QaPair {
        QaPair {
            id: Uuid::new_v4(),
            document_id,
            question: question.to_string(),
            answer: "Because the text says so.".to_string(),
            section: Some("Introduction".to_string()),
            page_number: None,
            confidence: None,
            metadata: Some(serde_json::json!({"type": "factual"})),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn document_round_trip() {
        let db = test_adapter().await;
        let doc = sample_document();
        db.insert_document(&doc).await.unwrap();

        let loaded = db.get_document(doc.id).await.unwrap();
        assert_eq!(loaded.original_name, "report.pdf");
        assert_eq!(loaded.status, DocumentStatus::Uploaded);
        assert_eq!(loaded.page_count, None);
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let db = test_adapter().await;
        let err = db.get_document(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn processing_claim_is_single_owner() {
        let db = test_adapter().await;
        let doc = sample_document();
        db.insert_document(&doc).await.unwrap();

        assert!(db.try_claim_processing(doc.id).await.unwrap());
        // A second worker loses the claim.
        assert!(!db.try_claim_processing(doc.id).await.unwrap());
    }

    #[tokio::test]
    async fn terminal_states_reject_further_writes() {
        let db = test_adapter().await;
        let doc = sample_document();
        db.insert_document(&doc).await.unwrap();

        assert!(db.cancel(doc.id).await.unwrap());
        // Canceled is terminal: no more transitions, no second cancel.
        assert!(!db
            .set_status(doc.id, DocumentStatus::Processing)
            .await
            .unwrap());
        assert!(!db.cancel(doc.id).await.unwrap());

        db.mark_failed(doc.id, "late failure").await.unwrap();
        let loaded = db.get_document(doc.id).await.unwrap();
        assert_eq!(loaded.status, DocumentStatus::Canceled);
    }

    #[tokio::test]
    async fn chunk_status_is_persisted_and_parsed_back() {
        let db = test_adapter().await;
        let doc = sample_document();
        db.insert_document(&doc).await.unwrap();

        let status = DocumentStatus::GeneratingChunk {
            current: 3,
            total: 7,
        };
        assert!(db.set_status(doc.id, status).await.unwrap());
        let loaded = db.get_document(doc.id).await.unwrap();
        assert_eq!(loaded.status, status);
    }

    #[tokio::test]
    async fn qa_pairs_are_ordered_by_creation_and_cascade_deleted() {
        let db = test_adapter().await;
        let doc = sample_document();
        db.insert_document(&doc).await.unwrap();

        let pairs: Vec<QaPair> = (0..3)
            .map(|i| sample_pair(doc.id, &format!("Question {i}?")))
            .collect();
        db.insert_qa_pairs(&pairs).await.unwrap();

        let loaded = db.qa_pairs_for_document(doc.id).await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].question, "Question 0?");
        assert_eq!(loaded[2].question, "Question 2?");
        assert_eq!(
            loaded[0].metadata.as_ref().unwrap()["type"],
            serde_json::json!("factual")
        );

        db.delete_document(doc.id).await.unwrap();
        assert!(matches!(
            db.get_document(doc.id).await.unwrap_err(),
            PortError::NotFound(_)
        ));
        assert!(db.qa_pairs_for_document(doc.id).await.unwrap().is_empty());

        let summaries = db.list_documents().await.unwrap();
        assert!(summaries.is_empty());
    }

    #[tokio::test]
    async fn list_documents_includes_qa_counts() {
        let db = test_adapter().await;
        let doc = sample_document();
        db.insert_document(&doc).await.unwrap();
        db.insert_qa_pairs(&[sample_pair(doc.id, "Only one?")])
            .await
            .unwrap();

        let summaries = db.list_documents().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].qa_count, 1);
        assert_eq!(summaries[0].id, doc.id);
    }
}
