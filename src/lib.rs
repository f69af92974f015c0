//! Stamp a text watermark (literal text or an image's capture date) onto
//! raster images and export the results, one at a time or in batches.

pub mod batch;
pub mod capture_date;
pub mod compose;
pub mod config;
pub mod discover;
pub mod error;
pub mod events;
pub mod export;
pub mod font;
pub mod output;
pub mod position;
pub mod report;
pub mod task;
pub mod template;

pub use batch::{BatchProcessor, BatchResult, BatchSummary, Outcome, Progress, TextSource};
pub use capture_date::{CaptureDateSource, ExifCaptureDate, FixedDate};
pub use compose::{Compositor, Layering};
pub use config::{Anchor, Color, ExportSpec, NamingOption, OutputFormat, Settings, WatermarkSpec};
pub use discover::{discover, ImageItem};
pub use error::{Result, WatermarkError};
pub use events::ProgressEvent;
pub use font::{Face, FontResolver};
pub use position::position;
pub use task::{spawn_batch, BatchTask};
pub use template::{TemplateEntry, TemplateStore};
