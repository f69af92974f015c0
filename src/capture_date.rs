//! Capture-date lookup from EXIF metadata.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::Local;
use exif::{In, Tag, Value};
use tracing::debug;

/// Supplies the watermark text in auto-date mode.
pub trait CaptureDateSource: Send + Sync {
    /// `YYYY-MM-DD`; never fails.
    fn capture_date(&self, path: &Path) -> String;
}

/// Reads `DateTimeOriginal`, falling back to today's local date.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifCaptureDate;

impl CaptureDateSource for ExifCaptureDate {
    fn capture_date(&self, path: &Path) -> String {
        match read_date_time_original(path) {
            Some(date) => date,
            None => {
                debug!("no capture date in {}, using today", path.display());
                today()
            }
        }
    }
}

/// Always returns the same string; for callers that already know the date.
#[derive(Debug, Clone)]
pub struct FixedDate(pub String);

impl CaptureDateSource for FixedDate {
    fn capture_date(&self, _path: &Path) -> String {
        self.0.clone()
    }
}

pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

fn read_date_time_original(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;
    let field = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(parts) => parts.first().and_then(|raw| exif_date(raw)),
        _ => None,
    }
}

/// `"2023:07:14 18:02:11"` -> `"2023-07-14"`.
fn exif_date(raw: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(raw).ok()?;
    let date = text.split(' ').next()?.trim();
    let parts: Vec<&str> = date.split(':').collect();
    let valid = parts.len() == 3
        && [4, 2, 2].iter().zip(&parts).all(|(n, p)| p.len() == *n && p.chars().all(|c| c.is_ascii_digit()));
    valid.then(|| parts.join("-"))
}
