use std::path::{Path, PathBuf};

use crate::config::{ExportSpec, NamingOption};
use crate::error::{Result, WatermarkError};

const DIR_SUFFIX: &str = "_watermark";

/// Output directory used when `output_dir` is unset: a sibling of the
/// input's parent named `<parent>_watermark`.
pub fn default_output_dir(input: &Path) -> PathBuf {
    let parent = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match parent.file_name() {
        Some(name) => {
            let mut sibling = name.to_os_string();
            sibling.push(DIR_SUFFIX);
            parent.with_file_name(sibling)
        }
        // "/" or "." have no name to suffix
        None => parent.join("watermarked"),
    }
}

/// Output file name for `input` under the naming policy and output format.
pub fn output_file_name(input: &Path, export: &ExportSpec) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match export.naming_option {
        NamingOption::Original => stem,
        NamingOption::Prefix => format!("{}{stem}", export.custom_prefix),
        NamingOption::Suffix => format!("{stem}{}", export.custom_suffix),
    };
    format!("{stem}.{}", export.output_format.extension())
}

/// Destination path for `input`. Creates the destination directory
/// (and parents) if needed; never touches existing files.
pub fn resolve(input: &Path, export: &ExportSpec) -> Result<PathBuf> {
    let dir = match &export.output_dir {
        Some(dir) => dir.clone(),
        None => default_output_dir(input),
    };
    std::fs::create_dir_all(&dir).map_err(|source| WatermarkError::OutputDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir.join(output_file_name(input, export)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;

    #[test]
    fn default_dir_is_suffixed_sibling_of_parent() {
        assert_eq!(
            default_output_dir(Path::new("/a/b/photo.jpg")),
            PathBuf::from("/a/b_watermark")
        );
        assert_eq!(
            default_output_dir(Path::new("photo.jpg")),
            PathBuf::from("./watermarked")
        );
        assert_eq!(
            default_output_dir(Path::new("/photo.jpg")),
            PathBuf::from("/watermarked")
        );
    }

    #[test]
    fn naming_policies() {
        let input = Path::new("/a/b/photo.jpg");
        let mut export = ExportSpec {
            naming_option: NamingOption::Suffix,
            custom_suffix: "_wm".into(),
            output_format: OutputFormat::Png,
            ..Default::default()
        };
        assert_eq!(output_file_name(input, &export), "photo_wm.png");

        export.naming_option = NamingOption::Prefix;
        export.custom_prefix = "x_".into();
        assert_eq!(output_file_name(input, &export), "x_photo.png");

        export.naming_option = NamingOption::Original;
        export.output_format = OutputFormat::Jpeg;
        assert_eq!(output_file_name(Path::new("scan.TIFF"), &export), "scan.jpg");
    }

    #[test]
    fn resolve_creates_directory_idempotently() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("nested/out");
        let export = ExportSpec {
            output_dir: Some(out.clone()),
            naming_option: NamingOption::Suffix,
            custom_suffix: "_wm".into(),
            output_format: OutputFormat::Png,
            ..Default::default()
        };
        let first = resolve(Path::new("/a/b/photo.jpg"), &export).unwrap();
        let second = resolve(Path::new("/a/b/photo.jpg"), &export).unwrap();
        assert_eq!(first, out.join("photo_wm.png"));
        assert_eq!(first, second);
        assert!(out.is_dir());
    }

    #[test]
    fn resolve_without_output_dir_uses_sibling() {
        let tmp = tempfile::tempdir().unwrap();
        let album = tmp.path().join("album");
        std::fs::create_dir(&album).unwrap();
        let export = ExportSpec { naming_option: NamingOption::Original, ..Default::default() };
        let path = resolve(&album.join("img.png"), &export).unwrap();
        assert_eq!(path, tmp.path().join("album_watermark").join("img.jpg"));
    }
}
