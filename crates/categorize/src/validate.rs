use std::collections::HashMap;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ledgerlens_core::ProcessedReceipt;

use crate::table::CategoryTable;

/// Outcome of validating one processed receipt.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Starts at 1.0; each suspicious finding shaves some off.
    pub confidence: f32,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self { errors: Vec::new(), warnings: Vec::new(), confidence: 1.0 }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn reduce_confidence(&mut self, amount: f32) {
        self.confidence = (self.confidence - amount).max(0.0);
    }
}

/// Quality control over processed receipts: mandatory fields, plausibility
/// ranges, and cross-receipt consistency.
pub struct Validator {
    table: CategoryTable,
    /// Extractions below this confidence draw a warning.
    pub min_confidence: f32,
}

/// Vendor strings that mean the extractor gave up.
const PLACEHOLDER_VENDORS: [&str; 5] = ["unknown", "n/a", "na", "none", "test"];

/// Plausible cents range per category; outliers draw a warning.
fn category_range(category: &str) -> Option<(i64, i64)> {
    let (min, max) = match category {
        "Office Supplies" => (100, 50_000),
        "Meals & Entertainment" => (500, 20_000),
        "Travel" => (1_000, 200_000),
        "Technology" => (2_500, 500_000),
        "Groceries" => (100, 50_000),
        "Marketing" => (5_000, 1_000_000),
        "Utilities" => (2_500, 100_000),
        "Professional Services" => (10_000, 5_000_000),
        "Miscellaneous" => (100, 100_000),
        _ => return None,
    };
    Some((min, max))
}

impl Validator {
    pub fn new(table: CategoryTable, min_confidence: f32) -> Self {
        Self { table, min_confidence }
    }

    /// Validate one receipt. `ocr_quality` is the recognizer text-quality
    /// score when OCR ran, or `None` for vision-only processing.
    pub fn validate(&self, p: &ProcessedReceipt, ocr_quality: Option<f32>) -> ValidationReport {
        let mut report = ValidationReport::new();

        self.check_vendor(p, &mut report);
        self.check_amount(p, &mut report);
        self.check_date(p, &mut report);
        self.check_category(p, &mut report);
        self.check_quality(p, ocr_quality, &mut report);
        self.check_confidence(p, &mut report);

        report
    }

    /// Validate a batch, then layer on cross-receipt findings (duplicates,
    /// amounts far above the batch average).
    pub fn validate_batch(
        &self,
        receipts: &[ProcessedReceipt],
    ) -> HashMap<Uuid, ValidationReport> {
        let mut reports: HashMap<Uuid, ValidationReport> =
            receipts.iter().map(|p| (p.receipt.id, self.validate(p, None))).collect();

        self.check_duplicates(receipts, &mut reports);
        self.check_outlier_amounts(receipts, &mut reports);

        reports
    }

    fn check_vendor(&self, p: &ProcessedReceipt, report: &mut ValidationReport) {
        let Some(vendor) = p.receipt.vendor.as_ref().map(|v| v.value.as_str()) else {
            report.error("vendor name is missing");
            return;
        };

        if vendor.trim().len() < 2 {
            report.error("vendor name too short");
        }
        if vendor.len() > 100 {
            report.warn("vendor name unusually long");
        }
        if PLACEHOLDER_VENDORS.contains(&vendor.to_lowercase().as_str()) {
            report.warn("vendor name appears to be a placeholder");
            report.reduce_confidence(0.3);
        }

        // A pile of special characters usually means OCR mangling.
        let special = vendor.chars().filter(|c| !c.is_alphanumeric() && !" -&.'".contains(*c)).count();
        if special * 5 > vendor.len() {
            report.warn("vendor name contains many special characters");
            report.reduce_confidence(0.2);
        }
    }

    fn check_amount(&self, p: &ProcessedReceipt, report: &mut ValidationReport) {
        let Some(total) = p.receipt.total_cents.as_ref() else {
            report.error("amount is missing");
            return;
        };

        if total.value <= 0 {
            report.error("amount must be positive");
        }
        if total.value > 5_000_000 {
            report.warn("amount is unusually high");
            report.reduce_confidence(0.1);
        }
        // Whole-dollar totals of $100+ smell like an estimate, not a register.
        if total.value % 100 == 0 && total.value >= 10_000 {
            report.warn("amount is a round number - verify accuracy");
            report.reduce_confidence(0.1);
        }
    }

    fn check_date(&self, p: &ProcessedReceipt, report: &mut ValidationReport) {
        let Some(date) = p.receipt.date.as_ref().map(|d| d.value) else {
            report.warn("date is missing");
            return;
        };

        let today = Utc::now().date_naive();
        if date < today - Duration::days(365) {
            report.warn("date is more than one year old");
        }
        if date > today + Duration::days(30) {
            report.warn("date is in the future");
            report.reduce_confidence(0.2);
        }
    }

    fn check_category(&self, p: &ProcessedReceipt, report: &mut ValidationReport) {
        if p.category.is_empty() {
            report.error("category is missing");
            return;
        }
        if !self.table.contains(&p.category) && p.category != crate::FALLBACK_CATEGORY {
            report.warn(format!("unknown category: {}", p.category));
        }

        if let (Some(total), Some((min, max))) =
            (p.receipt.total_cents.as_ref(), category_range(&p.category))
        {
            if total.value < min {
                report.warn(format!("amount is low for category '{}'", p.category));
            } else if total.value > max {
                report.warn(format!("amount is high for category '{}'", p.category));
            }
        }
    }

    fn check_quality(
        &self,
        p: &ProcessedReceipt,
        ocr_quality: Option<f32>,
        report: &mut ValidationReport,
    ) {
        if let Some(q) = ocr_quality {
            if q < 0.5 {
                report.warn("poor OCR text quality detected");
                report.reduce_confidence(0.2);
            }
        }

        if completeness(p) < 0.7 {
            report.warn("incomplete data - manual review recommended");
            report.reduce_confidence(0.3);
        }
    }

    fn check_confidence(&self, p: &ProcessedReceipt, report: &mut ValidationReport) {
        let confidence = p.receipt.confidence;
        if confidence < self.min_confidence {
            report.warn(format!("low confidence score: {confidence:.2}"));
            report.reduce_confidence(0.2);
        }
        if confidence < 0.5 {
            report.error("very low confidence - manual review required");
        }
    }

    fn check_duplicates(
        &self,
        receipts: &[ProcessedReceipt],
        reports: &mut HashMap<Uuid, ValidationReport>,
    ) {
        for (i, a) in receipts.iter().enumerate() {
            for b in receipts.iter().skip(i + 1) {
                let same_vendor = match (&a.receipt.vendor, &b.receipt.vendor) {
                    (Some(x), Some(y)) => x.value == y.value,
                    _ => false,
                };
                let same_total = match (&a.receipt.total_cents, &b.receipt.total_cents) {
                    (Some(x), Some(y)) => x.value == y.value,
                    _ => false,
                };
                let same_date = match (&a.receipt.date, &b.receipt.date) {
                    (Some(x), Some(y)) => x.value == y.value,
                    (None, None) => true,
                    _ => false,
                };
                if same_vendor && same_total && same_date {
                    for id in [a.receipt.id, b.receipt.id] {
                        if let Some(r) = reports.get_mut(&id) {
                            r.warn("potential duplicate receipt detected");
                        }
                    }
                }
            }
        }
    }

    fn check_outlier_amounts(
        &self,
        receipts: &[ProcessedReceipt],
        reports: &mut HashMap<Uuid, ValidationReport>,
    ) {
        // Too few data points for a meaningful average.
        if receipts.len() < 5 {
            return;
        }
        let amounts: Vec<i64> = receipts
            .iter()
            .filter_map(|p| p.receipt.total_cents.as_ref().map(|t| t.value))
            .collect();
        if amounts.is_empty() {
            return;
        }
        let avg = amounts.iter().sum::<i64>() / amounts.len() as i64;

        for p in receipts {
            if let Some(total) = p.receipt.total_cents.as_ref() {
                if total.value > avg * 5 {
                    if let Some(r) = reports.get_mut(&p.receipt.id) {
                        r.warn("amount significantly higher than batch average");
                    }
                }
            }
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(CategoryTable::default(), 0.8)
    }
}

fn completeness(p: &ProcessedReceipt) -> f32 {
    let present = [
        p.receipt.vendor.is_some(),
        p.receipt.total_cents.is_some(),
        p.receipt.date.is_some(),
        !p.category.is_empty(),
        !p.description.is_empty(),
    ]
    .iter()
    .filter(|b| **b)
    .count();
    present as f32 / 5.0
}
