pub mod csv_export;
pub mod json_export;
pub mod row;
pub mod summary;

pub use csv_export::{receipts_to_csv, write_receipts_csv};
pub use json_export::receipts_to_json;
pub use row::ReceiptRow;
pub use summary::ExpenseSummary;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
