//! Finding images on disk and probing their headers.

use std::path::{Path, PathBuf};

use image::{ImageFormat, ImageReader};
use tracing::{debug, warn};

use crate::error::{Result, WatermarkError};

/// Extensions accepted for import, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif"];

/// An input image. Header fields are read once when the item is probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageItem {
    pub path: PathBuf,
    pub file_name: String,
    /// `None` when the header could not be read.
    pub dimensions: Option<(u32, u32)>,
    pub format: Option<ImageFormat>,
}

impl ImageItem {
    /// An item with no header information.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, file_name, dimensions: None, format: None }
    }

    /// Reads dimensions and format without decoding pixels. An unreadable
    /// header leaves both unset; the failure surfaces when the item is processed.
    pub fn probe(path: impl Into<PathBuf>) -> Self {
        let mut item = Self::new(path);
        match read_header(&item.path) {
            Ok((format, dims)) => {
                item.format = format;
                item.dimensions = Some(dims);
            }
            Err(e) => warn!("cannot probe {}: {e}", item.path.display()),
        }
        item
    }

    pub fn width(&self) -> Option<u32> {
        self.dimensions.map(|(w, _)| w)
    }

    pub fn height(&self) -> Option<u32> {
        self.dimensions.map(|(_, h)| h)
    }
}

fn read_header(path: &Path) -> image::ImageResult<(Option<ImageFormat>, (u32, u32))> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader.format();
    Ok((format, reader.into_dimensions()?))
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}

/// Supported images at `path`: the file itself, or every supported file
/// below a directory, sorted by path.
pub fn discover(path: &Path) -> Result<Vec<ImageItem>> {
    if !path.exists() {
        return Err(WatermarkError::InputNotFound(path.to_path_buf()));
    }
    let mut files = Vec::new();
    if path.is_file() {
        if is_supported_image(path) {
            files.push(path.to_path_buf());
        }
    } else {
        collect_from_dir(path, &mut files);
    }
    files.sort();
    debug!("found {} image files under {}", files.len(), path.display());
    if files.is_empty() {
        return Err(WatermarkError::NoImages(path.to_path_buf()));
    }
    Ok(files.into_iter().map(ImageItem::probe).collect())
}

fn collect_from_dir(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("failed to read directory {}: {e}", dir.display());
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_from_dir(&path, files);
        } else if path.is_file() && is_supported_image(&path) {
            files.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn extension_match_is_case_insensitive() {
        assert!(is_supported_image(Path::new("a.JPG")));
        assert!(is_supported_image(Path::new("a.tif")));
        assert!(is_supported_image(Path::new("a.Bmp")));
        assert!(!is_supported_image(Path::new("a.webp")));
        assert!(!is_supported_image(Path::new("README")));
    }

    #[test]
    fn discover_walks_directories_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("sub");
        std::fs::create_dir(&nested).unwrap();
        let img = RgbImage::from_pixel(4, 3, Rgb([1, 2, 3]));
        img.save(tmp.path().join("b.png")).unwrap();
        img.save(nested.join("a.PNG")).unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        let items = discover(tmp.path()).unwrap();
        let names: Vec<_> = items.iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, ["b.png", "a.PNG"]);
        assert_eq!(items[0].dimensions, Some((4, 3)));
        assert_eq!(items[0].format, Some(ImageFormat::Png));
    }

    #[test]
    fn discover_reports_top_level_failures() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover(&tmp.path().join("nope")),
            Err(WatermarkError::InputNotFound(_))
        ));
        assert!(matches!(discover(tmp.path()), Err(WatermarkError::NoImages(_))));
    }

    #[test]
    fn probe_keeps_unreadable_items() {
        let item = ImageItem::probe("/no/such/photo.jpg");
        assert_eq!(item.file_name, "photo.jpg");
        assert_eq!(item.dimensions, None);
        assert_eq!(item.width(), None);
    }
}
