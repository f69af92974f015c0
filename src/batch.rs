//! Sequential batch export with per-item failure isolation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::capture_date::{CaptureDateSource, ExifCaptureDate};
use crate::compose::Compositor;
use crate::config::Settings;
use crate::discover::ImageItem;
use crate::error::{Result, WatermarkError};
use crate::{export, output};

/// Where the watermark text comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextSource {
    /// `settings.watermark.text`.
    #[default]
    Literal,
    /// The capture date of each image.
    CaptureDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    Written { output: PathBuf },
    Failed { error: String },
}

/// Outcome for one input item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub input: PathBuf,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub success: bool,
}

impl BatchResult {
    fn written(input: &Path, output: PathBuf) -> Self {
        Self { input: input.to_path_buf(), outcome: Outcome::Written { output }, success: true }
    }

    fn failed(input: &Path, error: &WatermarkError) -> Self {
        Self {
            input: input.to_path_buf(),
            outcome: Outcome::Failed { error: error.to_string() },
            success: false,
        }
    }

    /// Record for an item processed outside [`BatchProcessor::run`].
    pub fn from_result(input: &Path, result: &Result<PathBuf>) -> Self {
        match result {
            Ok(dest) => Self::written(input, dest.clone()),
            Err(e) => Self::failed(input, e),
        }
    }

    pub fn output(&self) -> Option<&Path> {
        match &self.outcome {
            Outcome::Written { output } => Some(output),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed { error } => Some(error),
            Outcome::Written { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn of(results: &[BatchResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self { succeeded, failed: results.len() - succeeded }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Progress callback argument.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    /// 1-based position of the finished item.
    pub index: usize,
    pub total: usize,
    pub path: &'a Path,
    pub success: bool,
}

pub struct BatchProcessor {
    compositor: Arc<Compositor>,
    dates: Arc<dyn CaptureDateSource>,
}

impl BatchProcessor {
    pub fn new(compositor: Arc<Compositor>, dates: Arc<dyn CaptureDateSource>) -> Self {
        Self { compositor, dates }
    }

    /// Capture dates come from EXIF.
    pub fn with_exif_dates(compositor: Arc<Compositor>) -> Self {
        Self::new(compositor, Arc::new(ExifCaptureDate))
    }

    /// Opens, watermarks and saves one image, returning the written path.
    pub fn process_one(&self, item: &ImageItem, settings: &Settings, text: TextSource) -> Result<PathBuf> {
        let path = &item.path;
        let img = image::open(path).map_err(|source| WatermarkError::UnreadableImage {
            path: path.clone(),
            source,
        })?;

        let text = match text {
            TextSource::Literal => settings.watermark.text.clone(),
            TextSource::CaptureDate => self.dates.capture_date(path),
        };
        let marked = self.compositor.compose_text(&img, &settings.watermark, &text);

        let dest = output::resolve(path, &settings.export)?;
        export::save(&marked, &dest, settings.export.output_format, settings.export.jpeg_quality)?;
        Ok(dest)
    }

    /// Processes `items` in order. Always returns one result per item;
    /// `on_progress` runs once after each item, success or not.
    pub fn run<F>(&self, items: &[ImageItem], settings: &Settings, text: TextSource, mut on_progress: F) -> Vec<BatchResult>
    where
        F: FnMut(Progress<'_>),
    {
        let total = items.len();
        let mut results = Vec::with_capacity(total);
        for (i, item) in items.iter().enumerate() {
            let outcome = self.process_one(item, settings, text);
            match &outcome {
                Ok(dest) => info!("watermarked {} -> {}", item.path.display(), dest.display()),
                Err(e) => warn!("{e}"),
            }
            let result = BatchResult::from_result(&item.path, &outcome);
            on_progress(Progress { index: i + 1, total, path: &item.path, success: result.success });
            results.push(result);
        }
        let summary = BatchSummary::of(&results);
        info!(succeeded = summary.succeeded, failed = summary.failed, "batch finished");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_outcomes() {
        let results = vec![
            BatchResult::written(Path::new("a.jpg"), PathBuf::from("out/a.jpg")),
            BatchResult::failed(Path::new("b.jpg"), &WatermarkError::invalid("boom")),
            BatchResult::written(Path::new("c.jpg"), PathBuf::from("out/c.jpg")),
        ];
        let s = BatchSummary::of(&results);
        assert_eq!((s.succeeded, s.failed, s.total()), (2, 1, 3));
        assert_eq!(results[1].error(), Some("invalid settings: boom"));
        assert_eq!(results[0].output(), Some(Path::new("out/a.jpg")));
    }

    #[test]
    fn from_result_mirrors_outcome() {
        let ok = BatchResult::from_result(Path::new("a.jpg"), &Ok(PathBuf::from("out/a.jpg")));
        assert!(ok.success);
        assert_eq!(ok.output(), Some(Path::new("out/a.jpg")));

        let bad = BatchResult::from_result(Path::new("b.jpg"), &Err(WatermarkError::NoImages("b.jpg".into())));
        assert!(!bad.success);
        assert_eq!(bad.error(), Some("no supported images found under b.jpg"));
    }

    #[test]
    fn results_serialize_flat() {
        let ok = BatchResult::written(Path::new("a.jpg"), PathBuf::from("out/a.jpg"));
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["input"], "a.jpg");
        assert_eq!(v["output"], "out/a.jpg");
        assert_eq!(v["success"], true);

        let bad = BatchResult::failed(Path::new("b.jpg"), &WatermarkError::invalid("x"));
        let v = serde_json::to_value(&bad).unwrap();
        assert_eq!(v["error"], "invalid settings: x");
        assert_eq!(v["success"], false);
    }
}
