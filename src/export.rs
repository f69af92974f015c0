use std::io::{Cursor, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError, ImageFormat};

use crate::config::OutputFormat;
use crate::error::{Result, WatermarkError};

/// Encodes `img` in memory. JPEG drops any alpha channel.
pub fn encode(img: &DynamicImage, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut out = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let rgb = img.to_rgb8();
            let mut enc = JpegEncoder::new_with_quality(&mut out, jpeg_quality.clamp(1, 100));
            enc.encode_image(&rgb)?;
        }
        OutputFormat::Png => {
            let img = match img {
                DynamicImage::ImageRgb32F(_) => DynamicImage::ImageRgb8(img.to_rgb8()),
                DynamicImage::ImageRgba32F(_) => DynamicImage::ImageRgba8(img.to_rgba8()),
                other => other.clone(),
            };
            img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
        }
    }
    Ok(out)
}

/// Encodes and writes `img` to `path` via a temporary file and rename.
pub fn save(img: &DynamicImage, path: &Path, format: OutputFormat, jpeg_quality: u8) -> Result<()> {
    let encoding_err = |source: ImageError| WatermarkError::Encoding { path: path.to_path_buf(), source };

    let bytes = encode(img, format, jpeg_quality).map_err(encoding_err)?;

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = Path::new(&tmp_name);
    let write = || -> std::io::Result<()> {
        let mut f = std::fs::File::create(tmp)?;
        f.write_all(&bytes)?;
        f.sync_all()?;
        std::fs::rename(tmp, path)
    };
    if let Err(e) = write() {
        let _ = std::fs::remove_file(tmp);
        return Err(encoding_err(ImageError::IoError(e)));
    }
    Ok(())
}
