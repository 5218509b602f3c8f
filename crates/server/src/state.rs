use std::sync::Arc;

use ledgerlens_engine::ReceiptPipeline;
use ledgerlens_ocr::OcrBackend;
use ledgerlens_storage::DbPool;

/// The pipeline as the router holds it: OCR backend chosen at startup.
pub type SharedPipeline = Arc<ReceiptPipeline<Box<dyn OcrBackend>>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub pipeline: SharedPipeline,
}
