use std::collections::BTreeMap;

use regex::Regex;
use tracing::debug;

use ledgerlens_core::Receipt;

use crate::table::CategoryTable;

/// Assigned when no stage produces a match.
pub const DEFAULT_CATEGORY: &str = "Miscellaneous";
/// Assigned when categorization itself cannot run (no usable signal).
pub const FALLBACK_CATEGORY: &str = "Uncategorized";

/// Minimum normalized text-analysis score for a category to win stage three.
const TEXT_SCORE_THRESHOLD: f32 = 0.1;

/// Amounts under this suggest small consumable purchases.
const SMALL_PURCHASE_CENTS: i64 = 1_000;
/// Amounts over this suggest equipment.
const LARGE_PURCHASE_CENTS: i64 = 50_000;

/// Keyword/vendor-driven expense categorizer.
///
/// Stages, in order: vendor alias match, line-item keyword scoring, combined
/// text analysis, amount heuristics, then [`DEFAULT_CATEGORY`].
pub struct Categorizer {
    table: CategoryTable,
    vendor_mappings: BTreeMap<String, String>,
    keyword_patterns: BTreeMap<String, Vec<Regex>>,
}

impl Categorizer {
    pub fn new(table: CategoryTable) -> Self {
        let vendor_mappings = table.vendor_mappings();
        let keyword_patterns = table
            .categories
            .iter()
            .map(|(category, def)| {
                let patterns = def
                    .keywords
                    .iter()
                    .filter_map(|kw| {
                        Regex::new(&format!(r"(?i)\b{}\b", regex::escape(kw))).ok()
                    })
                    .collect();
                (category.clone(), patterns)
            })
            .collect();
        Self { table, vendor_mappings, keyword_patterns }
    }

    pub fn table(&self) -> &CategoryTable {
        &self.table
    }

    pub fn categorize(&self, receipt: &Receipt) -> String {
        let no_signal = receipt.vendor.is_none()
            && receipt.line_items.is_empty()
            && receipt.ocr_text.trim().is_empty()
            && receipt.total_cents.is_none();
        if no_signal {
            debug!("nothing to categorize on");
            return FALLBACK_CATEGORY.to_string();
        }

        if let Some(vendor) = receipt.vendor.as_ref().map(|v| v.value.as_str()) {
            if let Some(category) = self.by_vendor(vendor) {
                debug!(category, "categorized by vendor alias");
                return category;
            }
        }

        if !receipt.line_items.is_empty() {
            if let Some(category) = self.by_items(receipt) {
                debug!(category, "categorized by line items");
                return category;
            }
        }

        if let Some(category) = self.by_text_analysis(receipt) {
            debug!(category, "categorized by text analysis");
            return category;
        }

        if let Some(category) = self.by_amount(receipt) {
            debug!(category, "categorized by amount heuristic");
            return category;
        }

        debug!("no categorization signal, using default");
        DEFAULT_CATEGORY.to_string()
    }

    /// Confidence that `category` is right for this receipt, in [0,1].
    /// Mean of the vendor, item, and text signals that apply.
    pub fn category_confidence(&self, receipt: &Receipt, category: &str) -> f32 {
        let mut factors = Vec::new();

        if let Some(vendor) = receipt.vendor.as_ref().map(|v| v.value.as_str()) {
            factors.push(self.vendor_confidence(vendor, category));
        }
        if !receipt.line_items.is_empty() {
            factors.push(self.items_confidence(receipt, category));
        }
        factors.push(self.text_confidence(receipt, category));

        if factors.is_empty() {
            0.5
        } else {
            factors.iter().sum::<f32>() / factors.len() as f32
        }
    }

    /// Top-N category suggestions, best first.
    pub fn suggest(&self, receipt: &Receipt, top_n: usize) -> Vec<(String, f32)> {
        let mut scored: Vec<(String, f32)> = self
            .table
            .names()
            .map(|name| (name.to_string(), self.category_confidence(receipt, name)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_n);
        scored
    }

    // ── Stage 1: vendor alias ────────────────────────────────────────────────

    fn by_vendor(&self, vendor: &str) -> Option<String> {
        let vendor_lower = vendor.to_lowercase();

        if let Some(category) = self.vendor_mappings.get(&vendor_lower) {
            return Some(category.clone());
        }
        // Substring match in either direction covers "WALMART SUPERCENTER #1234".
        self.vendor_mappings
            .iter()
            .find(|(alias, _)| vendor_lower.contains(*alias) || alias.contains(&vendor_lower))
            .map(|(_, category)| category.clone())
    }

    // ── Stage 2: line-item keywords ──────────────────────────────────────────

    fn by_items(&self, receipt: &Receipt) -> Option<String> {
        let item_text = receipt
            .line_items
            .iter()
            .map(|i| i.description.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        self.keyword_patterns
            .iter()
            .map(|(category, patterns)| {
                let hits: usize = patterns.iter().map(|p| p.find_iter(&item_text).count()).sum();
                (category, hits)
            })
            .filter(|(_, hits)| *hits > 0)
            .max_by_key(|(_, hits)| *hits)
            .map(|(category, _)| category.clone())
    }

    // ── Stage 3: combined text analysis ──────────────────────────────────────

    fn by_text_analysis(&self, receipt: &Receipt) -> Option<String> {
        let combined = combined_text(receipt);
        if combined.trim().is_empty() {
            return None;
        }
        let word_count = combined.split_whitespace().count().max(1) as f32;

        self.keyword_patterns
            .iter()
            .map(|(category, patterns)| {
                let hits: usize = patterns.iter().map(|p| p.find_iter(&combined).count()).sum();
                // Normalize by text length so long OCR dumps don't dominate.
                (category, hits as f32 / word_count * 100.0)
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .filter(|(_, score)| *score > TEXT_SCORE_THRESHOLD)
            .map(|(category, _)| category.clone())
    }

    // ── Stage 4: amount heuristics ───────────────────────────────────────────

    fn by_amount(&self, receipt: &Receipt) -> Option<String> {
        let cents = receipt.total_cents.as_ref()?.value;
        if cents < SMALL_PURCHASE_CENTS {
            Some("Office Supplies".to_string())
        } else if cents > LARGE_PURCHASE_CENTS {
            Some("Technology".to_string())
        } else {
            None
        }
    }

    // ── Confidence signals ───────────────────────────────────────────────────

    fn vendor_confidence(&self, vendor: &str, category: &str) -> f32 {
        let vendor_lower = vendor.to_lowercase();
        let Some(def) = self.table.categories.get(category) else {
            return 0.0;
        };
        let aliases: Vec<String> = def.vendors.iter().map(|v| v.to_lowercase()).collect();

        if aliases.iter().any(|a| *a == vendor_lower) {
            0.9
        } else if aliases.iter().any(|a| vendor_lower.contains(a) || a.contains(&vendor_lower)) {
            0.7
        } else {
            0.1
        }
    }

    fn items_confidence(&self, receipt: &Receipt, category: &str) -> f32 {
        let Some(patterns) = self.keyword_patterns.get(category) else {
            return 0.0;
        };
        let item_text = receipt
            .line_items
            .iter()
            .map(|i| i.description.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let hits: usize = patterns.iter().map(|p| p.find_iter(&item_text).count()).sum();
        (hits as f32 / receipt.line_items.len().max(1) as f32).min(1.0)
    }

    fn text_confidence(&self, receipt: &Receipt, category: &str) -> f32 {
        let Some(patterns) = self.keyword_patterns.get(category) else {
            return 0.0;
        };
        let combined = combined_text(receipt);
        let hits: usize = patterns.iter().map(|p| p.find_iter(&combined).count()).sum();
        (hits as f32 * 0.2).min(1.0)
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new(CategoryTable::default())
    }
}

fn combined_text(receipt: &Receipt) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(v) = &receipt.vendor {
        parts.push(&v.value);
    }
    for item in &receipt.line_items {
        parts.push(&item.description);
    }
    if !receipt.ocr_text.is_empty() {
        parts.push(&receipt.ocr_text);
    }
    parts.join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerlens_core::{ExtractedField, LineItem};

    fn receipt(vendor: Option<&str>, items: &[&str], ocr: &str, total: Option<i64>) -> Receipt {
        let mut r = Receipt::new("t.jpg");
        r.vendor = vendor.map(|v| ExtractedField::new(v.to_string(), 0.8));
        r.line_items = items.iter().map(|i| LineItem::named(*i)).collect();
        r.ocr_text = ocr.to_string();
        r.total_cents = total.map(|c| ExtractedField::new(c, 0.9));
        r
    }

    #[test]
    fn vendor_alias_direct_match() {
        let c = Categorizer::default();
        let r = receipt(Some("Starbucks"), &[], "", Some(550));
        assert_eq!(c.categorize(&r), "Meals & Entertainment");
    }

    #[test]
    fn vendor_alias_substring_match() {
        let c = Categorizer::default();
        let r = receipt(Some("WALMART SUPERCENTER #1234"), &[], "", Some(2163));
        assert_eq!(c.categorize(&r), "Groceries");
    }

    #[test]
    fn items_drive_category_when_vendor_unknown() {
        let c = Categorizer::default();
        let r = receipt(
            Some("CORNER SHOP"),
            &["ballpoint pen", "legal paper ream", "stapler"],
            "",
            Some(3200),
        );
        assert_eq!(c.categorize(&r), "Office Supplies");
    }

    #[test]
    fn ocr_text_drives_category() {
        let c = Categorizer::default();
        let r = receipt(None, &[], "hotel stay parking fee airline change", Some(24000));
        assert_eq!(c.categorize(&r), "Travel");
    }

    #[test]
    fn small_amount_heuristic() {
        let c = Categorizer::default();
        let r = receipt(None, &[], "", Some(450));
        assert_eq!(c.categorize(&r), "Office Supplies");
    }

    #[test]
    fn large_amount_heuristic() {
        let c = Categorizer::default();
        let r = receipt(None, &[], "", Some(125_000));
        assert_eq!(c.categorize(&r), "Technology");
    }

    #[test]
    fn default_when_nothing_matches() {
        let c = Categorizer::default();
        let r = receipt(None, &[], "", Some(5_000));
        assert_eq!(c.categorize(&r), DEFAULT_CATEGORY);
    }

    #[test]
    fn vendor_confidence_tiers() {
        let c = Categorizer::default();
        let exact = receipt(Some("starbucks"), &[], "", None);
        let partial = receipt(Some("Starbucks Reserve Roastery"), &[], "", None);
        let unrelated = receipt(Some("Joe's Hardware"), &[], "", None);
        assert!(c.category_confidence(&exact, "Meals & Entertainment") >= 0.3);
        assert!(
            c.category_confidence(&partial, "Meals & Entertainment")
                > c.category_confidence(&unrelated, "Meals & Entertainment")
        );
    }

    #[test]
    fn suggest_orders_by_confidence() {
        let c = Categorizer::default();
        let r = receipt(Some("Starbucks"), &["coffee", "lunch sandwich"], "", Some(1500));
        let suggestions = c.suggest(&r, 3);
        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0].0, "Meals & Entertainment");
        assert!(suggestions[0].1 >= suggestions[1].1);
        assert!(suggestions[1].1 >= suggestions[2].1);
    }

    #[test]
    fn empty_receipt_cannot_be_categorized() {
        let c = Categorizer::default();
        let r = receipt(None, &[], "", None);
        assert_eq!(c.categorize(&r), FALLBACK_CATEGORY);
    }
}
