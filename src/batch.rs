//! Batch image translation
//!
//! Every image in a directory goes through the OCR service, the translator
//! and back, with the rendered result written to `TRANSLATED/` next to the
//! originals. Progress and log lines are reported over a channel so a
//! caller can drive a progress bar.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{PapagoError, PapagoResult};
use crate::ocr::OcrClient;
use crate::translator::MachineTranslator;

pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpeg", "jpg", "png", "webp"];
pub const OUTPUT_DIR: &str = "TRANSLATED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// Percentage of files processed, 0..=100
    Progress(u8),
    Log(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub written: Vec<PathBuf>,
    /// Files the service declined to render
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub cancelled: bool,
}

/// Translate one image.
///
/// Returns `Ok(None)` when the service does not report the rendering as
/// successful.
pub async fn translate_image<T: MachineTranslator + ?Sized>(
    ocr: &OcrClient,
    translator: &mut T,
    image: &Path,
    output: &Path,
    target: &str,
) -> PapagoResult<Option<PathBuf>> {
    let mut payload = ocr.manual_translate(image).await?;
    let source = payload.source_texts().join("\n");

    let translated = translator.translate_text(&source, None, target).await?;
    let mut lines = translated.split('\n');
    for segment in payload.trans_result.iter_mut() {
        segment.t = Some(lines.next().unwrap_or_default().to_string());
    }

    let result = ocr.post_translation_result(&payload).await?;
    let Some(task_id) = result.ready_task() else {
        warn!("OCR service reported '{}' for {}", result.status, image.display());
        return Ok(None);
    };

    let bytes = ocr.fetch_result(task_id).await?;
    tokio::fs::write(output, &bytes).await?;
    Ok(Some(output.to_path_buf()))
}

/// Images directly inside `dir`, sorted by path
pub fn collect_images(dir: &Path) -> PapagoResult<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if matches {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn emit(events: &UnboundedSender<BatchEvent>, event: BatchEvent) {
    // A dropped receiver only means nobody is watching
    let _ = events.send(event);
}

/// Translate every image in `dir`.
///
/// A failing file is logged and skipped. Cancellation stops the batch
/// between files and abandons the file in flight; finished outputs stay.
pub async fn run_batch<T: MachineTranslator + ?Sized>(
    ocr: &OcrClient,
    translator: &mut T,
    dir: &Path,
    target: &str,
    events: UnboundedSender<BatchEvent>,
    cancel: CancellationToken,
) -> PapagoResult<BatchSummary> {
    let images = collect_images(dir)?;
    let mut summary = BatchSummary {
        total: images.len(),
        ..Default::default()
    };

    emit(&events, BatchEvent::Progress(0));
    if images.is_empty() {
        emit(&events, BatchEvent::Log(format!("No images found in {}", dir.display())));
        return Ok(summary);
    }

    let output_dir = dir.join(OUTPUT_DIR);
    tokio::fs::create_dir_all(&output_dir).await?;
    info!(
        "Translating {} images from {} with {}",
        images.len(),
        dir.display(),
        translator.provider_name()
    );

    for (i, image) in images.iter().enumerate() {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }

        let Some(name) = image.file_name() else {
            continue;
        };
        let output = output_dir.join(name);

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(PapagoError::Cancelled),
            outcome = translate_image(ocr, &mut *translator, image, &output, target) => outcome,
        };

        match outcome {
            Ok(Some(path)) => {
                emit(&events, BatchEvent::Log(format!("Saved {}", path.display())));
                summary.written.push(path);
            }
            Ok(None) => {
                emit(&events, BatchEvent::Log(format!("Not rendered: {}", image.display())));
                summary.skipped.push(image.clone());
            }
            Err(PapagoError::Cancelled) => {
                summary.cancelled = true;
                break;
            }
            Err(e) => {
                warn!("Failed to translate {}: {}", image.display(), e);
                emit(&events, BatchEvent::Log(format!("Failed {}: {}", image.display(), e)));
                summary.failed.push((image.clone(), e.to_string()));
            }
        }

        let percent = (100 * (i + 1) / images.len()) as u8;
        emit(&events, BatchEvent::Progress(percent));
    }

    if summary.cancelled {
        info!("Batch cancelled after {} images", summary.written.len());
        emit(&events, BatchEvent::Log("Cancelled".to_string()));
    } else {
        emit(&events, BatchEvent::Log("Translation complete".to_string()));
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_images_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.JPG", "c.webp", "notes.txt", "d.jpeg", "e.gif"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();

        let names: Vec<_> = collect_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.png", "c.webp", "d.jpeg"]);
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut mock = crate::mock::MockTranslator::new(crate::mock::MockMode::Suffix);
        let ocr = OcrClient::new("http://127.0.0.1:9");

        let summary = run_batch(&ocr, &mut mock, dir.path(), "ko", tx, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(rx.recv().await, Some(BatchEvent::Progress(0)));
        assert!(matches!(rx.recv().await, Some(BatchEvent::Log(_))));
        assert!(!dir.path().join(OUTPUT_DIR).exists());
        assert_eq!(mock.calls(), 0);
    }
}
