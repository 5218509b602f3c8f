use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use ledgerlens_core::{ExtractedField, LineItem, Money, PaymentMethod};

/// Everything the regex pass could pull out of one receipt's text.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub vendor: Option<ExtractedField<String>>,
    pub date: Option<ExtractedField<NaiveDate>>,
    pub subtotal_cents: Option<ExtractedField<i64>>,
    pub tax_cents: Option<ExtractedField<i64>>,
    pub total_cents: Option<ExtractedField<i64>>,
    pub payment_method: Option<ExtractedField<PaymentMethod>>,
    pub line_items: Vec<LineItem>,
    /// Weighted aggregate over the key fields (0.0–1.0).
    pub confidence: f32,
}

/// Compiled pattern set, built once per process.
struct Patterns {
    total_labeled: Regex,
    subtotal: Regex,
    tax: Regex,
    any_amount: Regex,
    line_item: Regex,
    item_label_skip: Regex,
    date_month_name: Regex,
    date_day_abbr: Regex,
    date_iso: Regex,
    date_numeric: Regex,
    payment: Regex,
    phone: Regex,
    url: Regex,
}

fn patterns() -> &'static Patterns {
    static P: OnceLock<Patterns> = OnceLock::new();
    P.get_or_init(|| {
        let build = |pat: &str| Regex::new(pat).expect("invalid built-in regex");
        Patterns {
            total_labeled: build(
                r"(?i)\b(?:grand\s+total|total\s+due|amount\s+due|balance\s+due|total)\s*[:\$]?\s*\$?\s*([\d,]+\.\d{2})\b",
            ),
            subtotal: build(r"(?i)\bsub\s?total\b\s*[:\$]?\s*\$?\s*([\d,]+\.\d{2})\b"),
            tax: build(
                r"(?i)\b(?:sales\s*tax|tax|hst|gst|pst|vat)\b\s*[:\$]?\s*\$?\s*([\d,]+\.\d{2})\b",
            ),
            any_amount: build(r"\$\s*([\d,]+\.\d{2})"),
            line_item: build(r"^\s*(?:(\d{1,2})\s*[xX@]\s+)?([A-Za-z][\w '&\./-]{2,40}?)\s+\$?\s*([\d,]+\.\d{2})\s*$"),
            item_label_skip: build(
                r"(?i)\b(total|subtotal|tax|change|cash|tender|balance|due|visa|debit|credit)\b",
            ),
            date_month_name: build(
                r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{1,2}),?\s+(\d{4})\b",
            ),
            date_day_abbr: build(
                r"(?i)\b(\d{1,2})\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\.?\s+(\d{4})\b",
            ),
            date_iso: build(r"\b(\d{4})-(\d{2})-(\d{2})\b"),
            date_numeric: build(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})\b"),
            payment: build(
                r"(?i)\b(visa|master\s*card|amex|american\s+express|discover|cash|debit|check|cheque)\b",
            ),
            phone: build(r"\(?\d{3}\)?[\s\-]\d{3}[\s\-]\d{4}"),
            url: build(r"(?i)(https?://|www\.)\S+"),
        }
    })
}

pub struct Extractor;

impl Extractor {
    /// Extract structured fields from cleaned OCR text.
    pub fn extract(text: &str) -> Extraction {
        let mut out = Extraction {
            vendor: extract_vendor(text),
            date: extract_date(text),
            subtotal_cents: extract_labeled_amount(&patterns().subtotal, text, 0.88),
            tax_cents: extract_labeled_amount(&patterns().tax, text, 0.88),
            total_cents: extract_total(text),
            payment_method: extract_payment_method(text),
            line_items: extract_line_items(text),
            confidence: 0.0,
        };
        out.confidence = aggregate_confidence(&out);
        out
    }
}

/// Weighted mean over the key fields; absent fields score zero.
fn aggregate_confidence(e: &Extraction) -> f32 {
    let weighted = [
        (e.vendor.as_ref().map(|f| f.confidence), 0.25f32),
        (e.date.as_ref().map(|f| f.confidence), 0.30),
        (e.total_cents.as_ref().map(|f| f.confidence), 0.35),
        (e.payment_method.as_ref().map(|f| f.confidence), 0.10),
    ];
    let (score, weight) = weighted
        .iter()
        .fold((0.0f32, 0.0f32), |(s, w), (conf, fw)| (s + conf.unwrap_or(0.0) * fw, w + fw));
    if weight > 0.0 {
        score / weight
    } else {
        0.0
    }
}

/// The vendor is usually an early line in shouting caps. Skip lines that
/// look like phone numbers, URLs, dates, or street addresses.
fn extract_vendor(text: &str) -> Option<ExtractedField<String>> {
    let p = patterns();
    let candidate = text
        .lines()
        .take(10)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| (3..=50).contains(&l.len()))
        .filter(|l| !p.phone.is_match(l) && !p.url.is_match(l))
        .filter(|l| !p.date_numeric.is_match(l) && !p.date_iso.is_match(l))
        .filter(|l| !p.date_month_name.is_match(l) && !p.date_day_abbr.is_match(l))
        .filter(|l| !p.any_amount.is_match(l))
        .filter(|l| !l.starts_with(|c: char| c.is_ascii_digit()))
        .max_by_key(|l| {
            let all_caps = l.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase());
            (if all_caps { 2i32 } else { 0 }) + (l.len() as i32).min(20)
        })?;

    Some(ExtractedField::new(candidate.to_string(), 0.60))
}

fn extract_date(text: &str) -> Option<ExtractedField<NaiveDate>> {
    let p = patterns();

    if let Some(c) = p.date_iso.captures(text) {
        let d = NaiveDate::from_ymd_opt(
            c[1].parse().ok()?,
            c[2].parse().ok()?,
            c[3].parse().ok()?,
        );
        if let Some(d) = d {
            return Some(ExtractedField::new(d, 0.95));
        }
    }
    if let Some(c) = p.date_month_name.captures(text) {
        let month = month_number(&c[1])?;
        let d = NaiveDate::from_ymd_opt(c[3].parse().ok()?, month, c[2].parse().ok()?);
        if let Some(d) = d {
            return Some(ExtractedField::new(d, 0.90));
        }
    }
    if let Some(c) = p.date_day_abbr.captures(text) {
        let month = month_number(&c[2])?;
        let d = NaiveDate::from_ymd_opt(c[3].parse().ok()?, month, c[1].parse().ok()?);
        if let Some(d) = d {
            return Some(ExtractedField::new(d, 0.90));
        }
    }
    // Numeric forms are ambiguous; assume US MM/DD/YYYY and score lower.
    if let Some(c) = p.date_numeric.captures(text) {
        let year = expand_year(c[3].parse().ok()?);
        let d = NaiveDate::from_ymd_opt(year, c[1].parse().ok()?, c[2].parse().ok()?);
        if let Some(d) = d {
            return Some(ExtractedField::new(d, 0.75));
        }
    }
    None
}

fn extract_total(text: &str) -> Option<ExtractedField<i64>> {
    let p = patterns();
    // A labeled total beats any raw dollar figure on the page.
    if let Some(field) = extract_labeled_amount(&p.total_labeled, text, 0.92) {
        return Some(field);
    }
    // Otherwise the largest amount is the best guess.
    p.any_amount
        .captures_iter(text)
        .filter_map(|c| parse_cents(&c[1]))
        .max()
        .map(|cents| ExtractedField::new(cents, 0.55))
}

fn extract_labeled_amount(re: &Regex, text: &str, confidence: f32) -> Option<ExtractedField<i64>> {
    let c = re.captures(text)?;
    parse_cents(&c[1]).map(|cents| ExtractedField::new(cents, confidence))
}

fn extract_payment_method(text: &str) -> Option<ExtractedField<PaymentMethod>> {
    let c = patterns().payment.captures(text)?;
    let method = match c[1].to_lowercase().replace(' ', "").as_str() {
        "visa" => PaymentMethod::Visa,
        "mastercard" => PaymentMethod::Mastercard,
        "amex" | "americanexpress" => PaymentMethod::Amex,
        "discover" => PaymentMethod::Discover,
        "cash" => PaymentMethod::Cash,
        "debit" => PaymentMethod::Debit,
        "check" | "cheque" => PaymentMethod::Check,
        other => PaymentMethod::Other(other.to_string()),
    };
    Some(ExtractedField::new(method, 0.90))
}

/// Body lines shaped like `DESCRIPTION   $9.99`, optionally with a
/// `2 x` quantity prefix. Summary lines (total, tax, tender) are skipped.
fn extract_line_items(text: &str) -> Vec<LineItem> {
    let p = patterns();
    text.lines()
        .filter(|l| !p.item_label_skip.is_match(l))
        .filter_map(|l| p.line_item.captures(l))
        .map(|c| LineItem {
            quantity: c.get(1).and_then(|q| q.as_str().parse().ok()),
            description: c[2].trim().to_string(),
            amount_cents: parse_cents(&c[3]),
        })
        .collect()
}

fn parse_cents(s: &str) -> Option<i64> {
    Money::parse(s).ok().map(Money::to_cents)
}

fn expand_year(y: i32) -> i32 {
    if y < 100 {
        2000 + y
    } else {
        y
    }
}

fn month_number(name: &str) -> Option<u32> {
    let n = match name.to_lowercase().as_str() {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(n)
}
