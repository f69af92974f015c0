use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Batch progress, as streamed from a background batch task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { total: usize },
    /// One item finished; `index` is 1-based.
    Item { index: usize, total: usize, path: PathBuf, success: bool },
    Finished { succeeded: usize, failed: usize },
}
