pub mod evaluation;
pub mod extractor;

pub use extractor::{ReceiptExtractor, RECEIPT_MIME_TYPE, RECEIPT_SYSTEM_PROMPT};
