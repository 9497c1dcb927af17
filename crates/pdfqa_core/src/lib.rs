pub mod chunk;
pub mod domain;
pub mod ports;

pub use chunk::{chunk_text, ChunkError, ChunkOptions, ChunkStrategy};
pub use domain::{Chunk, Document, DocumentStatus, DocumentSummary, GeneratedQa, QaPair};
pub use ports::{
    DocumentStore, Extraction, OcrEngine, PortError, PortResult, QaGenerator, TextExtractor,
};
