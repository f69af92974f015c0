//! Named setting bundles stored as JSON files, one per template.
//!
//! Document layout:
//!
//! ```json
//! { "watermark": { ... }, "export": { ... }, "created_at": "2024-05-01T09:30:00+00:00" }
//! ```
//!
//! Loading merges stored keys over the caller's current settings, so
//! documents written by older versions (missing fields, or a bare
//! watermark object) still load.

use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::{ExportSpec, Settings, WatermarkSpec};
use crate::error::{Result, WatermarkError};

const EXTENSION: &str = "json";

#[derive(Debug, Serialize)]
struct TemplateDocument<'a> {
    watermark: &'a WatermarkSpec,
    export: &'a ExportSpec,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct TemplateHeader {
    created_at: Option<String>,
}

/// One entry of [`TemplateStore::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateEntry {
    pub name: String,
    pub path: PathBuf,
    /// As stored; absent in some legacy documents.
    pub created_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$PHOTOMARK_TEMPLATE_DIR`, else `<user config dir>/photomark/templates`.
    pub fn user_default() -> Result<Self> {
        if let Ok(dir) = std::env::var("PHOTOMARK_TEMPLATE_DIR") {
            return Ok(Self::new(dir));
        }
        let dirs = ProjectDirs::from("", "", "photomark").ok_or(WatermarkError::NoHomeDir)?;
        Ok(Self::new(dirs.config_dir().join("templates")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing the template called `name`.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(format!("{name}.{EXTENSION}")))
    }

    /// Writes `settings` under `name`, replacing any template of that name.
    pub fn save(&self, name: &str, settings: &Settings) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        let io_err = |source| WatermarkError::TemplateIo { path: path.clone(), source };

        std::fs::create_dir_all(&self.root).map_err(io_err)?;
        let doc = TemplateDocument {
            watermark: &settings.watermark,
            export: &settings.export,
            created_at: Utc::now().to_rfc3339(),
        };
        let bytes = serde_json::to_vec_pretty(&doc)
            .map_err(|source| WatermarkError::TemplateCorrupt { path: path.clone(), source })?;
        std::fs::write(&path, bytes).map_err(io_err)?;
        debug!("saved template {}", path.display());
        Ok(path)
    }

    /// Merges the template at `path` over `current`.
    pub fn load(&self, path: &Path, current: &Settings) -> Result<Settings> {
        let raw = std::fs::read(path)
            .map_err(|source| WatermarkError::TemplateIo { path: path.to_path_buf(), source })?;
        let corrupt = |source| WatermarkError::TemplateCorrupt { path: path.to_path_buf(), source };
        let doc: Value = serde_json::from_slice(&raw).map_err(corrupt)?;
        merge_document(&doc, current).map_err(corrupt)?.validated()
    }

    pub fn load_named(&self, name: &str, current: &Settings) -> Result<Settings> {
        self.load(&self.path_for(name)?, current)
    }

    /// Templates sorted by name. Unparseable files are skipped.
    pub fn list(&self) -> Result<Vec<TemplateEntry>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(WatermarkError::TemplateIo { path: self.root.clone(), source }),
        };

        let mut out = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            match read_header(&path) {
                Some(h) => out.push(TemplateEntry { name, path, created_at: h.created_at }),
                None => warn!("skipping unreadable template {}", path.display()),
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        std::fs::remove_file(&path).map_err(|source| WatermarkError::TemplateIo { path, source })
    }
}

/// Header of a template that would also load cleanly.
fn read_header(path: &Path) -> Option<TemplateHeader> {
    let bytes = std::fs::read(path).ok()?;
    let doc: Value = serde_json::from_slice(&bytes).ok()?;
    merge_document(&doc, &Settings::default()).ok()?.validated().ok()?;
    serde_json::from_value(doc).ok()
}

/// Template names become file stems, so they must be a single plain component.
fn validate_name(name: &str) -> Result<()> {
    let mut comps = Path::new(name).components();
    let plain = matches!((comps.next(), comps.next()), (Some(Component::Normal(_)), None));
    if name.trim().is_empty() || !plain || name.contains(['/', '\\']) {
        return Err(WatermarkError::invalid(format!("{name:?} is not a valid template name")));
    }
    Ok(())
}

fn merge_document(doc: &Value, current: &Settings) -> serde_json::Result<Settings> {
    let Value::Object(obj) = doc else {
        return Err(serde::de::Error::custom("template is not a JSON object"));
    };
    let (watermark, export) = if obj.contains_key("watermark") || obj.contains_key("export") {
        (obj.get("watermark"), obj.get("export"))
    } else {
        // bare watermark object
        (Some(doc), None)
    };
    Ok(Settings {
        watermark: merge_section(&current.watermark, watermark)?,
        export: merge_section(&current.export, export)?,
    })
}

/// Stored keys overwrite `current`'s; everything else is left alone.
fn merge_section<T>(current: &T, stored: Option<&Value>) -> serde_json::Result<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let mut base = match serde_json::to_value(current)? {
        Value::Object(m) => m,
        _ => Map::new(),
    };
    match stored {
        Some(Value::Object(fields)) => {
            for (k, v) in fields {
                base.insert(k.clone(), v.clone());
            }
        }
        Some(Value::Null) | None => {}
        Some(_) => return Err(serde::de::Error::custom("template section is not an object")),
    }
    serde_json::from_value(Value::Object(base))
}
