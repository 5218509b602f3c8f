use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;

/// A single extracted value with an associated confidence score (0.0–1.0).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedField<T> {
    pub value: T,
    /// Confidence in this extraction (0.0 = guessed, 1.0 = certain).
    pub confidence: f32,
}

impl<T> ExtractedField<T> {
    pub fn new(value: T, confidence: f32) -> Self {
        Self { value, confidence: confidence.clamp(0.0, 1.0) }
    }

}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Cash,
    Debit,
    Check,
    Other(String),
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Visa => write!(f, "Visa"),
            PaymentMethod::Mastercard => write!(f, "Mastercard"),
            PaymentMethod::Amex => write!(f, "Amex"),
            PaymentMethod::Discover => write!(f, "Discover"),
            PaymentMethod::Cash => write!(f, "Cash"),
            PaymentMethod::Debit => write!(f, "Debit"),
            PaymentMethod::Check => write!(f, "Check"),
            PaymentMethod::Other(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    PendingReview,
    Approved,
    Rejected,
    Synced,
    Duplicate,
}

impl std::fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReceiptStatus::PendingReview => "pending_review",
            ReceiptStatus::Approved => "approved",
            ReceiptStatus::Rejected => "rejected",
            ReceiptStatus::Synced => "synced",
            ReceiptStatus::Duplicate => "duplicate",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ReceiptStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_review" => Ok(ReceiptStatus::PendingReview),
            "approved" => Ok(ReceiptStatus::Approved),
            "rejected" => Ok(ReceiptStatus::Rejected),
            "synced" => Ok(ReceiptStatus::Synced),
            "duplicate" => Ok(ReceiptStatus::Duplicate),
            other => Err(format!("unknown receipt status: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub description: String,
    pub amount_cents: Option<i64>,
    pub quantity: Option<f32>,
}

impl LineItem {
    pub fn named(description: impl Into<String>) -> Self {
        Self { description: description.into(), amount_cents: None, quantity: None }
    }
}

/// Raw extraction output for one receipt image, before categorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: Uuid,
    /// Original upload filename, for display only.
    pub source_filename: String,
    /// Where the original bytes live in the content-addressed store.
    pub attachment_path: Option<String>,
    /// SHA-256 hex digest of the original bytes; the dedup key.
    pub sha256_hex: Option<String>,

    pub vendor: Option<ExtractedField<String>>,
    pub date: Option<ExtractedField<NaiveDate>>,
    pub subtotal_cents: Option<ExtractedField<i64>>,
    pub tax_cents: Option<ExtractedField<i64>>,
    /// Grand total — the primary extracted field.
    pub total_cents: Option<ExtractedField<i64>>,
    pub payment_method: Option<ExtractedField<PaymentMethod>>,
    pub line_items: Vec<LineItem>,

    pub ocr_text: String,
    /// Aggregate confidence across all extracted fields (0.0–1.0).
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
}

impl Receipt {
    pub fn new(source_filename: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_filename: source_filename.into(),
            attachment_path: None,
            sha256_hex: None,
            vendor: None,
            date: None,
            subtotal_cents: None,
            tax_cents: None,
            total_cents: None,
            payment_method: None,
            line_items: Vec::new(),
            ocr_text: String::new(),
            confidence: 0.0,
            created_at: Utc::now(),
        }
    }

    /// Minimum viable extraction: a vendor and a positive total.
    pub fn is_complete(&self) -> bool {
        self.vendor.is_some()
            && self.total_cents.as_ref().map(|t| t.value > 0).unwrap_or(false)
    }

    pub fn total(&self) -> Option<Money> {
        self.total_cents.as_ref().map(|t| Money::from_cents(t.value))
    }

    /// Trim vendor whitespace, normalize negative amounts, drop empty items.
    pub fn normalize(&mut self) {
        if let Some(vendor) = &mut self.vendor {
            vendor.value = vendor.value.trim().to_string();
        }
        for field in [&mut self.subtotal_cents, &mut self.tax_cents, &mut self.total_cents] {
            if let Some(f) = field {
                f.value = f.value.abs();
            }
        }
        self.line_items.retain(|item| !item.description.trim().is_empty());
        for item in &mut self.line_items {
            item.description = item.description.trim().to_string();
        }
    }
}

/// Receipts above this total always require a human look.
pub const REVIEW_AMOUNT_CENTS: i64 = 100_000;
/// Extractions below this aggregate confidence require a human look.
pub const REVIEW_CONFIDENCE_THRESHOLD: f32 = 0.7;

/// A receipt after categorization and validation, ready for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedReceipt {
    pub receipt: Receipt,
    pub category: String,
    pub description: String,
    pub status: ReceiptStatus,
    pub requires_review: bool,
    pub notes: String,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedReceipt {
    pub fn new(receipt: Receipt, category: impl Into<String>) -> Self {
        let category = category.into();
        let description = match &receipt.vendor {
            Some(v) => format!("{} - {category}", v.value),
            None => format!("Receipt from unknown vendor - {category}"),
        };

        let mut requires_review = receipt.confidence < REVIEW_CONFIDENCE_THRESHOLD;
        let mut notes = String::new();
        if let Some(total) = &receipt.total_cents {
            if total.value > REVIEW_AMOUNT_CENTS {
                requires_review = true;
                notes.push_str("High amount expense - requires approval. ");
            }
        }

        Self {
            receipt,
            category,
            description,
            status: ReceiptStatus::PendingReview,
            requires_review,
            notes,
            processed_at: Utc::now(),
        }
    }

    pub fn approve(&mut self, approved_by: &str) {
        self.status = ReceiptStatus::Approved;
        self.requires_review = false;
        self.notes.push_str(&format!("Approved by {approved_by}. "));
    }

    pub fn reject(&mut self, reason: &str) {
        self.status = ReceiptStatus::Rejected;
        self.requires_review = false;
        self.notes.push_str(&format!("Rejected: {reason}. "));
    }

    pub fn mark_synced(&mut self, system: &str) {
        self.status = ReceiptStatus::Synced;
        self.notes.push_str(&format!("Synced to {system}. "));
    }
}
