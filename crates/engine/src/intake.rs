//! Bulk and watch-folder intake on top of the pipeline.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{error, info};

use ledgerlens_ocr::recognizer::OcrBackend;
use ledgerlens_storage::DbPool;

use crate::pipeline::{PipelineResult, ReceiptPipeline, SUPPORTED_EXTENSIONS};

/// Process every supported image in `dir`, skipping files that fail and
/// logging why. Returns the results for the files that went through.
pub async fn process_folder<R: OcrBackend>(
    pipeline: &ReceiptPipeline<R>,
    pool: &DbPool,
    dir: &Path,
) -> std::io::Result<Vec<PipelineResult>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if supported {
            paths.push(path);
        }
    }
    paths.sort();

    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        match pipeline.process_file(pool, &path).await {
            Ok(result) => results.push(result),
            Err(err) => error!(path = %path.display(), %err, "skipping file"),
        }
    }
    info!(count = results.len(), dir = %dir.display(), "folder intake finished");
    Ok(results)
}

/// Spawn a notify watcher on `watch_dir` that sends new file paths to `tx`.
/// Returns the watcher, which must be kept alive for watching to continue.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{EventKind, RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        if let Ok(ev) = event {
            if matches!(ev.kind, EventKind::Create(_)) {
                for path in ev.paths {
                    let _ = tx.try_send(path);
                }
            }
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use ledgerlens_ocr::MockRecognizer;
    use ledgerlens_storage::{create_db, list_all};
    use std::io::Cursor;

    fn png_with_seed(seed: u8) -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(8, 8, |x, y| Luma([seed ^ (x + y * 8) as u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn folder_intake_processes_supported_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path().join("inbox");
        tokio::fs::create_dir_all(&inbox).await.unwrap();
        tokio::fs::write(inbox.join("a.png"), png_with_seed(1)).await.unwrap();
        tokio::fs::write(inbox.join("b.jpg"), png_with_seed(2)).await.unwrap();
        tokio::fs::write(inbox.join("notes.txt"), b"not an image").await.unwrap();

        let pool = create_db(&dir.path().join("receipts.db")).await.unwrap();
        let pipeline = ReceiptPipeline::new(
            MockRecognizer::new("SHELL\n2024-02-01\nTotal $45.00\nVISA"),
            dir.path().join("attachments"),
        );

        let results = process_folder(&pipeline, &pool, &inbox).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(list_all(&pool).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn folder_intake_keeps_going_past_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path().join("inbox");
        tokio::fs::create_dir_all(&inbox).await.unwrap();
        tokio::fs::write(inbox.join("good.png"), png_with_seed(7)).await.unwrap();
        tokio::fs::write(inbox.join("broken.png"), b"not a real png").await.unwrap();

        let pool = create_db(&dir.path().join("receipts.db")).await.unwrap();
        let pipeline = ReceiptPipeline::new(
            MockRecognizer::new("SHELL\nTotal $45.00"),
            dir.path().join("attachments"),
        );

        let results = process_folder(&pipeline, &pool, &inbox).await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
