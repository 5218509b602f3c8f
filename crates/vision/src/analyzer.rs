use chrono::NaiveDate;
use serde_json::Value;
use tracing::warn;

use ledgerlens_core::{ExtractedField, LineItem, Money, PaymentMethod};

use crate::provider::{VisionError, VisionProvider};

/// Confidence assigned when the model's reply had to be scraped line-by-line
/// instead of parsed as JSON.
const FALLBACK_CONFIDENCE: f32 = 0.3;

const ANALYSIS_PROMPT: &str = r#"Analyze this receipt image and extract the following information in JSON format:

{
    "vendor": "Name of the business/vendor",
    "amount": 0.00,
    "date": "YYYY-MM-DD",
    "items": ["item1", "item2"],
    "tax_amount": 0.00,
    "payment_method": "cash/card/other",
    "confidence": 0.95,
    "notes": "Any additional relevant information"
}

Guidelines:
- Be precise with monetary amounts
- Use standard date format (YYYY-MM-DD)
- Include all line items you can clearly read
- If information is unclear or missing, use null
- Provide a realistic confidence score
- Focus on business expense data"#;

/// Structured output of one vision call.
#[derive(Debug, Clone, Default)]
pub struct VisionAnalysis {
    pub vendor: Option<String>,
    pub amount_cents: Option<i64>,
    pub date: Option<NaiveDate>,
    pub tax_cents: Option<i64>,
    pub items: Vec<LineItem>,
    pub payment_method: Option<PaymentMethod>,
    pub confidence: f32,
    pub notes: Option<String>,
    /// The parsed JSON payload, kept for storage/debugging.
    pub raw: Value,
}

impl VisionAnalysis {
    pub fn vendor_field(&self) -> Option<ExtractedField<String>> {
        self.vendor.clone().map(|v| ExtractedField::new(v, self.confidence))
    }

    pub fn total_field(&self) -> Option<ExtractedField<i64>> {
        self.amount_cents.map(|c| ExtractedField::new(c, self.confidence))
    }

    pub fn tax_field(&self) -> Option<ExtractedField<i64>> {
        self.tax_cents.map(|c| ExtractedField::new(c, self.confidence))
    }

    pub fn date_field(&self) -> Option<ExtractedField<NaiveDate>> {
        self.date.map(|d| ExtractedField::new(d, self.confidence))
    }
}

/// Drives a [`VisionProvider`] with the extraction prompt and parses the reply.
pub struct VisionAnalyzer<P: VisionProvider> {
    provider: P,
}

impl<P: VisionProvider> VisionAnalyzer<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Analyze a receipt image; `ocr_text` supplements the visual pass when
    /// non-empty.
    pub async fn analyze(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        ocr_text: &str,
    ) -> Result<VisionAnalysis, VisionError> {
        let prompt = build_prompt(ocr_text);
        let reply = self.provider.generate(image_bytes, mime_type, &prompt).await?;
        Ok(parse_reply(&reply))
    }
}

fn build_prompt(ocr_text: &str) -> String {
    if ocr_text.trim().is_empty() {
        ANALYSIS_PROMPT.to_string()
    } else {
        format!(
            "{ANALYSIS_PROMPT}\n\nAdditional OCR Text Context:\n{ocr_text}\n\
             Use this OCR text to supplement your visual analysis, \
             but prioritize what you can see in the image."
        )
    }
}

/// Parse the model reply. Models often wrap the JSON in prose or code fences,
/// so take the widest `{...}` slice before deserializing. A reply with no
/// usable JSON drops to the line-oriented fallback.
pub fn parse_reply(reply: &str) -> VisionAnalysis {
    let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) else {
        warn!("vision reply contained no JSON object, using fallback parser");
        return fallback_parse(reply);
    };
    let Ok(data) = serde_json::from_str::<Value>(&reply[start..=end]) else {
        warn!("vision reply JSON failed to parse, using fallback parser");
        return fallback_parse(reply);
    };

    let items = data["items"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(LineItem::named)
                .collect()
        })
        .unwrap_or_default();

    VisionAnalysis {
        vendor: data["vendor"].as_str().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        amount_cents: value_to_cents(&data["amount"]),
        date: data["date"].as_str().and_then(parse_iso_date),
        tax_cents: value_to_cents(&data["tax_amount"]),
        items,
        payment_method: data["payment_method"].as_str().map(parse_payment),
        confidence: (data["confidence"].as_f64().unwrap_or(0.5) as f32).clamp(0.0, 1.0),
        notes: data["notes"].as_str().map(str::to_string),
        raw: data,
    }
}

/// Last-resort scrape: look for a `vendor:` line and any dollar figure.
fn fallback_parse(reply: &str) -> VisionAnalysis {
    let mut vendor = None;
    let mut amount_cents = None;

    for line in reply.lines() {
        let lower = line.trim().to_lowercase();
        if lower.starts_with("vendor") || lower.starts_with("business") {
            if let Some((_, value)) = line.split_once(':') {
                let v = value.trim().trim_matches('"').to_string();
                if !v.is_empty() {
                    vendor = Some(v);
                }
            }
        } else if line.contains('$') {
            if let Some(cents) = line
                .split_whitespace()
                .filter_map(|tok| Money::parse(tok).ok())
                .map(Money::to_cents)
                .find(|c| *c > 0)
            {
                amount_cents.get_or_insert(cents);
            }
        }
    }

    VisionAnalysis {
        vendor,
        amount_cents,
        confidence: FALLBACK_CONFIDENCE,
        raw: serde_json::json!({ "fallback_parse": true, "raw_text": reply }),
        ..Default::default()
    }
}

fn value_to_cents(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_f64().map(|f| (f * 100.0).round() as i64),
        Value::String(s) => Money::parse(s).ok().map(Money::to_cents),
        _ => None,
    }
}

fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

fn parse_payment(s: &str) -> PaymentMethod {
    match s.trim().to_lowercase().as_str() {
        "visa" => PaymentMethod::Visa,
        "mastercard" => PaymentMethod::Mastercard,
        "amex" => PaymentMethod::Amex,
        "discover" => PaymentMethod::Discover,
        "cash" => PaymentMethod::Cash,
        "debit" | "card" | "credit" => PaymentMethod::Debit,
        "check" | "cheque" => PaymentMethod::Check,
        other => PaymentMethod::Other(other.to_string()),
    }
}
