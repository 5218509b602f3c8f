use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use ledgerlens_categorize::{Categorizer, ValidationReport, Validator};
use ledgerlens_core::{ExtractedField, ProcessedReceipt, Receipt, ReceiptStatus};
use ledgerlens_ocr::extract::Extraction;
use ledgerlens_ocr::recognizer::{OcrBackend, OcrError};
use ledgerlens_ocr::{self as ocr, Extractor};
use ledgerlens_storage::{find_by_hash, insert_receipt, DbPool, StorageError};
use ledgerlens_vision::analyzer::VisionAnalysis;
use ledgerlens_vision::{VisionAnalyzer, VisionProvider};

/// File extensions the intake accepts, lowercased.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tiff", "tif"];

/// Reported as the model name when no vision provider is configured.
pub const OCR_ONLY_MODEL: &str = "ocr-only";

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("file is {size} bytes, above the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("image preprocessing failed: {0}")]
    Preprocess(#[from] ocr::PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Everything one processing run produced.
#[derive(Debug)]
pub struct PipelineResult {
    pub processed: ProcessedReceipt,
    pub report: ValidationReport,
    pub ocr_quality: f32,
    /// True when the upload's hash matched an already stored receipt.
    pub duplicate: bool,
    /// The vision model consulted, or [`OCR_ONLY_MODEL`].
    pub model: String,
}

/// Orchestrates: hash → dedup → content-store → preprocess → OCR →
/// vision → fusion → categorize → validate → persist.
pub struct ReceiptPipeline<R: OcrBackend> {
    recognizer: R,
    vision: Option<VisionAnalyzer<Box<dyn VisionProvider>>>,
    categorizer: Categorizer,
    validator: Validator,
    attachments_dir: PathBuf,
    max_upload_bytes: usize,
}

impl<R: OcrBackend> ReceiptPipeline<R> {
    pub fn new(recognizer: R, attachments_dir: PathBuf) -> Self {
        Self {
            recognizer,
            vision: None,
            categorizer: Categorizer::default(),
            validator: Validator::default(),
            attachments_dir,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_vision(mut self, provider: Box<dyn VisionProvider>) -> Self {
        self.vision = Some(VisionAnalyzer::new(provider));
        self
    }

    pub fn with_categorizer(mut self, categorizer: Categorizer) -> Self {
        self.categorizer = categorizer;
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn model_name(&self) -> &str {
        self.vision.as_ref().map(|v| v.model_name()).unwrap_or(OCR_ONLY_MODEL)
    }

    /// Process a file on disk.
    pub async fn process_file(
        &self,
        pool: &DbPool,
        path: &Path,
    ) -> Result<PipelineResult, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();
        self.process_bytes(pool, &bytes, &filename).await
    }

    /// Process raw upload bytes. `filename` supplies the extension and is kept
    /// for display.
    pub async fn process_bytes(
        &self,
        pool: &DbPool,
        data: &[u8],
        filename: &str,
    ) -> Result<PipelineResult, PipelineError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(PipelineError::UnsupportedType(filename.to_string()));
        }
        if data.len() > self.max_upload_bytes {
            return Err(PipelineError::TooLarge {
                size: data.len(),
                limit: self.max_upload_bytes,
            });
        }

        // Content hash is the dedup key: a byte-identical upload short-circuits.
        let hash_hex = ocr::to_hex(&ocr::sha256_bytes(data));
        if let Some(mut existing) = find_by_hash(pool, &hash_hex).await? {
            info!(%hash_hex, "upload matches an already processed receipt");
            existing.status = ReceiptStatus::Duplicate;
            return Ok(PipelineResult {
                processed: existing,
                report: ValidationReport::new(),
                ocr_quality: 0.0,
                duplicate: true,
                model: self.model_name().to_string(),
            });
        }

        // Preprocess before storing so a corrupt upload never leaves an
        // orphaned attachment behind.
        let image_bytes = ocr::prepare_for_ocr_from_bytes(data)?;

        let dest = ocr::attachment_path(&self.attachments_dir, &hash_hex, &ext);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&dest, data).await?;

        let raw_text = self.recognizer.recognize(&image_bytes)?;
        let ocr_text = ocr::clean_ocr_text(&raw_text);
        let ocr_quality = ocr::assess_text_quality(&ocr_text);
        let extraction = Extractor::extract(&ocr_text);

        // The vision model gets the original upload; grayscale contrast
        // stretching only helps the OCR pass.
        let analysis = match &self.vision {
            Some(analyzer) => {
                match analyzer.analyze(data, mime_for_extension(&ext), &ocr_text).await {
                    Ok(a) => Some(a),
                    Err(err) => {
                        warn!(%err, "vision analysis failed, continuing with OCR fields");
                        None
                    }
                }
            }
            None => None,
        };

        let mut receipt = fuse(filename, extraction, analysis.as_ref());
        receipt.sha256_hex = Some(hash_hex);
        receipt.attachment_path = Some(dest.to_string_lossy().into_owned());
        receipt.ocr_text = ocr_text;
        receipt.normalize();
        if !receipt.is_complete() {
            warn!(filename, "extraction is missing a vendor or a usable total");
        }

        let category = self.categorizer.categorize(&receipt);
        let mut processed = ProcessedReceipt::new(receipt, category);
        if let Some(notes) = analysis.as_ref().and_then(|a| a.notes.as_deref()) {
            if !notes.trim().is_empty() {
                processed.notes.push_str(notes.trim());
                processed.notes.push_str(". ");
            }
        }

        let report = self.validator.validate(&processed, Some(ocr_quality));
        if !report.is_valid() {
            processed.requires_review = true;
            for error in &report.errors {
                processed.notes.push_str(error);
                processed.notes.push_str(". ");
            }
        }

        insert_receipt(pool, &processed).await?;
        info!(
            id = %processed.receipt.id,
            vendor = processed.receipt.vendor.as_ref().map(|v| v.value.as_str()),
            category = %processed.category,
            confidence = processed.receipt.confidence,
            "receipt processed"
        );

        Ok(PipelineResult {
            processed,
            report,
            ocr_quality,
            duplicate: false,
            model: self.model_name().to_string(),
        })
    }
}

/// Merge the two extraction passes. Vision fields win where both produced a
/// value; the regex pass fills whatever vision left blank.
fn fuse(filename: &str, extraction: Extraction, analysis: Option<&VisionAnalysis>) -> Receipt {
    let mut receipt = Receipt::new(filename);

    match analysis {
        Some(a) => {
            receipt.vendor = a.vendor_field().or(extraction.vendor);
            receipt.date = a.date_field().or(extraction.date);
            receipt.total_cents = a.total_field().or(extraction.total_cents);
            receipt.tax_cents = a.tax_field().or(extraction.tax_cents);
            receipt.subtotal_cents = extraction.subtotal_cents;
            receipt.payment_method = a
                .payment_method
                .clone()
                .map(|pm| ExtractedField::new(pm, a.confidence))
                .or(extraction.payment_method);
            receipt.line_items = if a.items.is_empty() {
                extraction.line_items
            } else {
                a.items.clone()
            };
        }
        None => {
            receipt.vendor = extraction.vendor;
            receipt.date = extraction.date;
            receipt.total_cents = extraction.total_cents;
            receipt.tax_cents = extraction.tax_cents;
            receipt.subtotal_cents = extraction.subtotal_cents;
            receipt.payment_method = extraction.payment_method;
            receipt.line_items = extraction.line_items;
        }
    }

    receipt.confidence = receipt_confidence(&receipt);
    receipt
}

/// Weighted mean over the key fields; absent fields score zero.
fn receipt_confidence(r: &Receipt) -> f32 {
    let weighted = [
        (r.vendor.as_ref().map(|f| f.confidence), 0.25f32),
        (r.date.as_ref().map(|f| f.confidence), 0.30),
        (r.total_cents.as_ref().map(|f| f.confidence), 0.35),
        (r.payment_method.as_ref().map(|f| f.confidence), 0.10),
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

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use ledgerlens_ocr::MockRecognizer;
    use ledgerlens_storage::create_db;
    use ledgerlens_vision::MockProvider;
    use std::io::Cursor;

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(16, 16, |x, _| Luma([(x * 16) as u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    async fn test_pool(dir: &tempfile::TempDir) -> DbPool {
        create_db(&dir.path().join("receipts.db")).await.unwrap()
    }

    const RECEIPT_TEXT: &str = "STARBUCKS\nJanuary 15, 2024\nLatte  $5.50\nTotal: $5.50\nVISA";

    #[tokio::test]
    async fn ocr_only_run_extracts_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        let pipeline = ReceiptPipeline::new(
            MockRecognizer::new(RECEIPT_TEXT),
            dir.path().join("attachments"),
        );

        let result = pipeline.process_bytes(&pool, &tiny_png(), "coffee.jpg").await.unwrap();

        assert!(!result.duplicate);
        assert_eq!(result.model, OCR_ONLY_MODEL);
        let r = &result.processed.receipt;
        assert_eq!(r.vendor.as_ref().unwrap().value, "STARBUCKS");
        assert_eq!(r.total_cents.as_ref().unwrap().value, 550);
        assert_eq!(result.processed.category, "Meals & Entertainment");

        // Attachment landed in the content-addressed tree.
        let stored = r.attachment_path.as_ref().unwrap();
        assert!(std::path::Path::new(stored).exists());

        // And the record is queryable by hash.
        let found = find_by_hash(&pool, r.sha256_hex.as_ref().unwrap()).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn second_upload_of_same_bytes_is_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        let pipeline = ReceiptPipeline::new(
            MockRecognizer::new(RECEIPT_TEXT),
            dir.path().join("attachments"),
        );
        let png = tiny_png();

        let first = pipeline.process_bytes(&pool, &png, "a.jpg").await.unwrap();
        let second = pipeline.process_bytes(&pool, &png, "b.jpg").await.unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(second.processed.status, ReceiptStatus::Duplicate);
        assert_eq!(second.processed.receipt.id, first.processed.receipt.id);
    }

    #[tokio::test]
    async fn vision_fields_win_over_ocr_fields() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        let reply = r#"{
            "vendor": "Starbucks Coffee",
            "amount": 6.05,
            "date": "2024-01-15",
            "tax_amount": 0.55,
            "items": [],
            "payment_method": "visa",
            "confidence": 0.95
        }"#;
        let pipeline = ReceiptPipeline::new(
            MockRecognizer::new(RECEIPT_TEXT),
            dir.path().join("attachments"),
        )
        .with_vision(Box::new(MockProvider::new(reply)));

        let result = pipeline.process_bytes(&pool, &tiny_png(), "coffee.jpg").await.unwrap();

        assert_eq!(result.model, "mock-vision");
        let r = &result.processed.receipt;
        assert_eq!(r.vendor.as_ref().unwrap().value, "Starbucks Coffee");
        assert_eq!(r.total_cents.as_ref().unwrap().value, 605);
        assert_eq!(r.tax_cents.as_ref().unwrap().value, 55);
        assert!(r.confidence > 0.8);
        assert!(!result.processed.requires_review);
    }

    #[tokio::test]
    async fn garbage_vision_reply_falls_back_to_ocr() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        let pipeline = ReceiptPipeline::new(
            MockRecognizer::new(RECEIPT_TEXT),
            dir.path().join("attachments"),
        )
        .with_vision(Box::new(MockProvider::new("I could not read this image.")));

        let result = pipeline.process_bytes(&pool, &tiny_png(), "coffee.jpg").await.unwrap();

        // Fallback parse found nothing, so the regex pass supplies the fields.
        let r = &result.processed.receipt;
        assert_eq!(r.total_cents.as_ref().unwrap().value, 550);
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        let pipeline =
            ReceiptPipeline::new(MockRecognizer::empty(), dir.path().join("attachments"));

        let err = pipeline.process_bytes(&pool, &tiny_png(), "receipt.pdf").await;
        assert!(matches!(err, Err(PipelineError::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn corrupt_upload_stores_no_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        let attachments = dir.path().join("attachments");
        let pipeline = ReceiptPipeline::new(MockRecognizer::empty(), attachments.clone());

        let err = pipeline.process_bytes(&pool, b"not an image at all", "broken.png").await;
        assert!(matches!(err, Err(PipelineError::Preprocess(_))));
        assert!(!attachments.exists());
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        let pipeline =
            ReceiptPipeline::new(MockRecognizer::empty(), dir.path().join("attachments"))
                .with_max_upload_bytes(16);

        let err = pipeline.process_bytes(&pool, &tiny_png(), "big.png").await;
        assert!(matches!(err, Err(PipelineError::TooLarge { .. })));
    }

    #[tokio::test]
    async fn empty_scan_requires_review() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        let pipeline =
            ReceiptPipeline::new(MockRecognizer::empty(), dir.path().join("attachments"));

        let result = pipeline.process_bytes(&pool, &tiny_png(), "blank.png").await.unwrap();

        assert!(result.processed.requires_review);
        assert!(!result.report.is_valid());
    }

    #[test]
    fn mime_mapping_covers_supported_extensions() {
        for ext in SUPPORTED_EXTENSIONS {
            assert_ne!(mime_for_extension(ext), "application/octet-stream");
        }
        assert_eq!(mime_for_extension("jpg"), "image/jpeg");
    }
}
