//! OCR output cleanup and quality scoring.
//!
//! Tesseract output on crumpled receipts carries plenty of noise: stray
//! punctuation runs, one-character lines, artifact sequences. Downstream
//! extraction and the validator both work better on cleaned text, and the
//! quality score feeds into review flagging.

/// Artifact sequences that indicate the recognizer was hallucinating texture.
const ARTIFACTS: [&str; 4] = ["|||", "~~~", "###", "***"];

/// Collapse whitespace and drop noise lines from raw OCR output.
///
/// A line is noise when it is shorter than two characters or when more than
/// half of it is neither alphanumeric nor a space.
pub fn clean_ocr_text(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| line.len() >= 2)
        .filter(|line| {
            let junk = line.chars().filter(|c| !c.is_alphanumeric() && *c != ' ').count();
            junk * 2 <= line.len()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Score OCR text readability in [0,1].
///
/// Readable-character ratio, minus a penalty per artifact occurrence.
pub fn assess_text_quality(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    let total = text.chars().count();
    let readable = text.chars().filter(|c| c.is_alphanumeric() || c.is_whitespace()).count();
    let readability = readable as f32 / total as f32;

    let artifact_count: usize = ARTIFACTS.iter().map(|a| text.matches(a).count()).sum();
    let penalty = (artifact_count as f32 * 0.1).min(0.5);

    (readability - penalty).clamp(0.0, 1.0)
}
