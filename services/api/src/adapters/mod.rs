pub mod claude_llm;
pub mod db;
pub mod ocr;
pub mod ollama_llm;
pub mod prompt;

pub use claude_llm::ClaudeQaAdapter;
pub use db::DbAdapter;
pub use ocr::HttpOcrAdapter;
pub use ollama_llm::OllamaQaAdapter;
