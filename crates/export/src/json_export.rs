use ledgerlens_core::ProcessedReceipt;

use crate::ExportError;

/// Full-fidelity JSON export: the processed receipts as stored, pretty-printed.
pub fn receipts_to_json(receipts: &[ProcessedReceipt]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(receipts)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerlens_core::{ExtractedField, Receipt};

    #[test]
    fn round_trips_through_serde() {
        let mut r = Receipt::new("r.jpg");
        r.vendor = Some(ExtractedField::new("WALMART".to_string(), 0.95));
        r.total_cents = Some(ExtractedField::new(2163, 0.95));
        r.confidence = 0.95;
        let p = ProcessedReceipt::new(r, "Groceries");

        let json = receipts_to_json(&[p]).unwrap();
        let parsed: Vec<ProcessedReceipt> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].category, "Groceries");
        assert_eq!(parsed[0].receipt.total_cents.as_ref().unwrap().value, 2163);
    }

    #[test]
    fn empty_list_is_empty_array() {
        assert_eq!(receipts_to_json(&[]).unwrap(), "[]");
    }
}
