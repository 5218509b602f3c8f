use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ledgerlens_core::{Money, ProcessedReceipt};

/// How many vendors the "top vendors" list keeps.
const TOP_VENDOR_LIMIT: usize = 10;

/// Aggregated view over a set of processed receipts — the analytics shape
/// served by the dashboard endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExpenseSummary {
    pub total_processed: usize,
    pub total_amount_cents: i64,
    pub avg_confidence: f32,
    pub requires_review: usize,
    /// Per-category spend in cents.
    pub categories: BTreeMap<String, i64>,
    /// Per-category share of total spend, 0–100.
    pub category_percentages: BTreeMap<String, f64>,
    /// Highest-spend vendors, descending.
    pub top_vendors: Vec<(String, i64)>,
}

impl ExpenseSummary {
    pub fn build(receipts: &[ProcessedReceipt]) -> Self {
        let total_processed = receipts.len();
        if total_processed == 0 {
            return Self::default();
        }

        let mut categories: BTreeMap<String, i64> = BTreeMap::new();
        let mut vendors: BTreeMap<String, i64> = BTreeMap::new();
        let mut total_amount_cents = 0i64;
        let mut confidence_sum = 0f32;
        let mut requires_review = 0usize;

        for p in receipts {
            let cents = p.receipt.total_cents.as_ref().map(|t| t.value).unwrap_or(0);
            total_amount_cents += cents;
            confidence_sum += p.receipt.confidence;
            if p.requires_review {
                requires_review += 1;
            }

            *categories.entry(p.category.clone()).or_default() += cents;
            let vendor = p
                .receipt
                .vendor
                .as_ref()
                .map(|v| v.value.clone())
                .unwrap_or_else(|| "Unknown".to_string());
            *vendors.entry(vendor).or_default() += cents;
        }

        let category_percentages = categories
            .iter()
            .map(|(cat, cents)| {
                let pct = if total_amount_cents > 0 {
                    *cents as f64 / total_amount_cents as f64 * 100.0
                } else {
                    0.0
                };
                (cat.clone(), pct)
            })
            .collect();

        let mut top_vendors: Vec<(String, i64)> = vendors.into_iter().collect();
        top_vendors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_vendors.truncate(TOP_VENDOR_LIMIT);

        Self {
            total_processed,
            total_amount_cents,
            avg_confidence: confidence_sum / total_processed as f32,
            requires_review,
            categories,
            category_percentages,
            top_vendors,
        }
    }

    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerlens_core::{ExtractedField, Receipt};

    fn sample(vendor: &str, cents: i64, category: &str, confidence: f32) -> ProcessedReceipt {
        let mut r = Receipt::new("r.jpg");
        r.vendor = Some(ExtractedField::new(vendor.to_string(), confidence));
        r.total_cents = Some(ExtractedField::new(cents, confidence));
        r.confidence = confidence;
        ProcessedReceipt::new(r, category)
    }

    #[test]
    fn empty_batch_is_all_zero() {
        let s = ExpenseSummary::build(&[]);
        assert_eq!(s.total_processed, 0);
        assert_eq!(s.total_amount_cents, 0);
        assert_eq!(s.avg_confidence, 0.0);
        assert!(s.categories.is_empty());
    }

    #[test]
    fn totals_and_category_breakdown() {
        let s = ExpenseSummary::build(&[
            sample("SHELL", 4500, "Travel", 0.9),
            sample("HILTON", 18000, "Travel", 0.8),
            sample("STAPLES", 2500, "Office Supplies", 1.0),
        ]);
        assert_eq!(s.total_processed, 3);
        assert_eq!(s.total_amount_cents, 25_000);
        assert_eq!(s.categories["Travel"], 22_500);
        assert_eq!(s.categories["Office Supplies"], 2_500);
        assert!((s.avg_confidence - 0.9).abs() < 1e-6);
        assert_eq!(s.total_amount().to_string(), "$250.00");
    }

    #[test]
    fn percentages_sum_to_hundred() {
        let s = ExpenseSummary::build(&[
            sample("A", 7500, "Travel", 0.9),
            sample("B", 2500, "Groceries", 0.9),
        ]);
        assert!((s.category_percentages["Travel"] - 75.0).abs() < 1e-9);
        assert!((s.category_percentages["Groceries"] - 25.0).abs() < 1e-9);
    }

    #[test]
    fn top_vendors_descending_and_capped() {
        let receipts: Vec<ProcessedReceipt> = (0..15)
            .map(|i| sample(&format!("VENDOR{i:02}"), (i as i64 + 1) * 100, "Miscellaneous", 0.9))
            .collect();
        let s = ExpenseSummary::build(&receipts);
        assert_eq!(s.top_vendors.len(), 10);
        assert_eq!(s.top_vendors[0].0, "VENDOR14");
        assert!(s.top_vendors[0].1 >= s.top_vendors[1].1);
    }

    #[test]
    fn review_counter() {
        // Confidence 0.5 is under the review threshold.
        let s = ExpenseSummary::build(&[
            sample("A", 1000, "Travel", 0.5),
            sample("B", 1000, "Travel", 0.95),
        ]);
        assert_eq!(s.requires_review, 1);
    }
}
