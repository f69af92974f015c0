use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

use crate::batch::BatchResult;

#[derive(Debug, Serialize)]
struct ReportRecord<'a> {
    #[serde(flatten)]
    result: &'a BatchResult,
    recorded_at: String,
}

/// Appends batch results to a JSON Lines file.
pub struct ReportWriter {
    file: fs::File,
    path: PathBuf,
}

impl ReportWriter {
    pub async fn open(path: PathBuf) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;
        Ok(Self { file, path })
    }

    pub async fn append(&mut self, result: &BatchResult) -> anyhow::Result<()> {
        let rec = ReportRecord { result, recorded_at: Utc::now().to_rfc3339() };
        let line = serde_json::to_vec(&rec)?;
        self.file.write_all(&line).await?;
        self.file.write_all(b"\n").await?;
        Ok(())
    }

    pub async fn append_all(&mut self, results: &[BatchResult]) -> anyhow::Result<()> {
        for r in results {
            self.append(r).await?;
        }
        self.file.flush().await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Number of records in a report; a missing file counts as empty.
pub async fn count_records(path: &Path) -> anyhow::Result<u64> {
    let file = match fs::File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let mut lines = tokio::io::BufReader::new(file).lines();
    let mut count: u64 = 0;
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_report_counts_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(count_records(&tmp.path().join("none.jsonl")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unopenable_report_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        // a regular file used as a directory is not "missing"
        assert!(count_records(&file.join("report.jsonl")).await.is_err());
    }
}
