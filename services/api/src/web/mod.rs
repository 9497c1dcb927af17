pub mod rest;
pub mod state;

// Re-export the handlers so the binary can build the web server router.
pub use rest::{
    cancel_handler, delete_pdf_handler, get_pdf_handler, get_qa_pairs_handler,
    get_status_handler, list_pdfs_handler, upload_pdf_handler, ApiDoc,
};
