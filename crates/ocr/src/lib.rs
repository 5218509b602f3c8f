pub mod extract;
pub mod hash;
pub mod preprocess;
pub mod quality;
pub mod recognizer;

pub use extract::Extractor;
pub use hash::{attachment_path, sha256_bytes, to_hex};
pub use preprocess::{prepare_for_ocr_from_bytes, PreprocessError};
pub use quality::{assess_text_quality, clean_ocr_text};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError};
