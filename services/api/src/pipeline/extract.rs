//! services/api/src/pipeline/extract.rs
//!
//! Converts a stored PDF into plain text. Direct text-layer extraction runs
//! first; when it yields too little text the document is treated as scanned
//! and re-extracted through the `OcrEngine` port, one page at a time, with an
//! explicit per-page separator header. The page count always comes from the
//! PDF structure, never from the OCR output.

use async_trait::async_trait;
use pdfqa_core::ports::{Extraction, OcrEngine, PortError, PortResult, TextExtractor};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Errors fatal to the extraction stage; the pipeline converts them into the
/// document's terminal `failed` state.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Failed to read PDF file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse PDF: {0}")]
    Unreadable(String),
    #[error("Document appears to be scanned but no OCR endpoint is configured")]
    OcrUnavailable,
    #[error("OCR extraction failed: {0}")]
    Ocr(PortError),
}

impl From<ExtractError> for PortError {
    fn from(err: ExtractError) -> Self {
        PortError::Unexpected(err.to_string())
    }
}

/// The production `TextExtractor`: lopdf text layer with OCR fallback.
#[derive(Clone)]
pub struct PdfTextExtractor {
    ocr: Option<Arc<dyn OcrEngine>>,
    /// Below this many extracted characters the text layer is considered unusable.
    min_text_threshold: usize,
}

impl PdfTextExtractor {
    pub fn new(ocr: Option<Arc<dyn OcrEngine>>, min_text_threshold: usize) -> Self {
        Self {
            ocr,
            min_text_threshold,
        }
    }

    async fn run(&self, path: &Path) -> Result<Extraction, ExtractError> {
        let bytes = tokio::fs::read(path).await?;

        let document = lopdf::Document::load_mem(&bytes)
            .map_err(|e| ExtractError::Unreadable(e.to_string()))?;
        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        let page_count = page_numbers.len() as u32;

        let mut text = String::new();
        for page_number in &page_numbers {
            match document.extract_text(&[*page_number]) {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    text.push('\n');
                }
                Err(e) => {
                    debug!("No text layer on page {}: {}", page_number, e);
                }
            }
        }

        if text.trim().len() < self.min_text_threshold {
            info!(
                "Text layer too small ({} chars); falling back to OCR",
                text.trim().len()
            );
            text = self.extract_with_ocr(&bytes).await?;
        }

        Ok(Extraction { text, page_count })
    }

    async fn extract_with_ocr(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let ocr = self.ocr.as_ref().ok_or(ExtractError::OcrUnavailable)?;
        let pages = ocr.recognize(bytes).await.map_err(ExtractError::Ocr)?;

        let mut text = String::new();
        for (i, page_text) in pages.iter().enumerate() {
            text.push_str(&format!("\n\n--- Page {} ---\n\n", i + 1));
            text.push_str(page_text);
        }
        Ok(text)
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, path: &Path) -> PortResult<Extraction> {
        Ok(self.run(path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use std::io::Write;

    /// Builds a minimal text-layer PDF with one line of text per page.
    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![50.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    struct StubOcr {
        pages: Vec<String>,
    }

    #[async_trait]
    impl OcrEngine for StubOcr {
        async fn recognize(&self, _pdf_bytes: &[u8]) -> PortResult<Vec<String>> {
            Ok(self.pages.clone())
        }
    }

    #[tokio::test]
    async fn text_bearing_pdf_yields_text_and_structural_page_count() {
        let pdf = build_pdf(&[
            "This report describes the measurement campaign in detail and at length.",
            "The second page continues the discussion with further observations made.",
            "The third page concludes the report and summarizes every key result found.",
        ]);
        let file = write_temp(&pdf);
        let extractor = PdfTextExtractor::new(None, 100);

        let extraction = extractor.extract(file.path()).await.unwrap();
        assert_eq!(extraction.page_count, 3);
        assert!(extraction.text.contains("measurement campaign"));
        assert!(extraction.text.contains("concludes the report"));
    }

    #[tokio::test]
    async fn short_text_layer_falls_back_to_ocr_with_page_separators() {
        let pdf = build_pdf(&["x", "y"]);
        let file = write_temp(&pdf);
        let ocr = Arc::new(StubOcr {
            pages: vec![
                "Recognized text of the first page.".to_string(),
                "Recognized text of the second page.".to_string(),
            ],
        });
        let extractor = PdfTextExtractor::new(Some(ocr), 100);

        let extraction = extractor.extract(file.path()).await.unwrap();
        assert_eq!(extraction.page_count, 2);
        assert!(extraction.text.contains("--- Page 1 ---"));
        assert!(extraction.text.contains("--- Page 2 ---"));
        assert!(extraction.text.contains("Recognized text of the first page."));
        // The text layer result is discarded entirely.
        assert!(!extraction.text.contains("x\n"));
    }

    #[tokio::test]
    async fn scanned_pdf_without_ocr_configured_is_an_error() {
        let pdf = build_pdf(&["x"]);
        let file = write_temp(&pdf);
        let extractor = PdfTextExtractor::new(None, 100);

        let err = extractor.extract(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("no OCR endpoint"));
    }

    #[tokio::test]
    async fn invalid_pdf_bytes_are_rejected() {
        let file = write_temp(b"this is not a pdf at all");
        let extractor = PdfTextExtractor::new(None, 100);

        let err = extractor.extract(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse PDF"));
    }
}
