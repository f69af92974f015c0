use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("cannot read image {}: {source}", path.display())]
    UnreadableImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot write {}: {source}", path.display())]
    Encoding {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template {} is corrupt: {source}", path.display())]
    TemplateCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("template {}: {source}", path.display())]
    TemplateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    InvalidSpec(String),

    #[error("input path does not exist: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("no supported images found under {}", .0.display())]
    NoImages(PathBuf),

    #[error("could not determine a home directory for templates")]
    NoHomeDir,
}

impl WatermarkError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidSpec(msg.into())
    }
}

pub type Result<T, E = WatermarkError> = std::result::Result<T, E>;
