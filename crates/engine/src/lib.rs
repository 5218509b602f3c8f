pub mod intake;
pub mod pipeline;

pub use intake::{process_folder, spawn_intake_watcher};
pub use pipeline::{
    mime_for_extension, PipelineError, PipelineResult, ReceiptPipeline, OCR_ONLY_MODEL,
    SUPPORTED_EXTENSIONS,
};
