use serde::Serialize;

use ledgerlens_core::{Money, ProcessedReceipt};

/// Flat, spreadsheet-friendly projection of one processed receipt.
/// Shared by the CSV and JSON export surfaces so the two agree column-for-column.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptRow {
    pub date: String,
    pub vendor: String,
    pub amount: String,
    pub category: String,
    pub description: String,
    pub tax_amount: String,
    pub status: String,
    pub requires_review: String,
    pub confidence_score: String,
    pub notes: String,
    pub processed_at: String,
    pub source_file: String,
}

impl From<&ProcessedReceipt> for ReceiptRow {
    fn from(p: &ProcessedReceipt) -> Self {
        let money = |cents: Option<i64>| {
            cents.map(|c| Money::from_cents(c).to_string()).unwrap_or_default()
        };
        Self {
            date: p.receipt.date.as_ref().map(|d| d.value.to_string()).unwrap_or_default(),
            vendor: p
                .receipt
                .vendor
                .as_ref()
                .map(|v| v.value.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            amount: money(p.receipt.total_cents.as_ref().map(|t| t.value)),
            category: p.category.clone(),
            description: p.description.clone(),
            tax_amount: money(p.receipt.tax_cents.as_ref().map(|t| t.value)),
            status: p.status.to_string(),
            requires_review: if p.requires_review { "Yes" } else { "No" }.to_string(),
            confidence_score: format!("{:.2}", p.receipt.confidence),
            notes: p.notes.clone(),
            processed_at: p.processed_at.format("%Y-%m-%d %H:%M").to_string(),
            source_file: p.receipt.source_filename.clone(),
        }
    }
}
