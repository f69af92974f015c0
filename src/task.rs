//! Running a batch off the caller's thread.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::{JoinError, JoinHandle};

use crate::batch::{BatchProcessor, BatchResult, BatchSummary, TextSource};
use crate::config::Settings;
use crate::discover::ImageItem;
use crate::events::ProgressEvent;

/// A batch running on a blocking worker. Progress arrives over a channel;
/// the results arrive through [`BatchTask::join`].
pub struct BatchTask {
    events: UnboundedReceiver<ProgressEvent>,
    handle: JoinHandle<Vec<BatchResult>>,
}

impl BatchTask {
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    pub async fn join(self) -> Result<Vec<BatchResult>, JoinError> {
        self.handle.await
    }
}

/// Starts `items` on a tokio blocking thread with a snapshot of `settings`.
/// Must be called from within a tokio runtime.
pub fn spawn_batch(
    processor: Arc<BatchProcessor>,
    items: Vec<ImageItem>,
    settings: Settings,
    text: TextSource,
) -> BatchTask {
    let (tx, events) = mpsc::unbounded_channel();
    let handle = tokio::task::spawn_blocking(move || {
        let _ = tx.send(ProgressEvent::Started { total: items.len() });
        let results = processor.run(&items, &settings, text, |p| {
            let _ = tx.send(ProgressEvent::Item {
                index: p.index,
                total: p.total,
                path: p.path.to_path_buf(),
                success: p.success,
            });
        });
        let summary = BatchSummary::of(&results);
        let _ = tx.send(ProgressEvent::Finished { succeeded: summary.succeeded, failed: summary.failed });
        results
    });
    BatchTask { events, handle }
}
