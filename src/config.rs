//! Watermark and export settings.
//!
//! A [`Settings`] value is built once per run (defaults, then an optional
//! YAML file, then a template merge, then CLI flags) and passed by reference
//! into every composition and export call. Edits produce a new value; nothing
//! here is shared mutably.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WatermarkError};

/// The nine image-relative placements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(from = "String", into = "String")]
#[value(rename_all = "snake_case")]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    Center,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    #[default]
    BottomRight,
}

impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Anchor::TopLeft,
        Anchor::TopCenter,
        Anchor::TopRight,
        Anchor::MiddleLeft,
        Anchor::Center,
        Anchor::MiddleRight,
        Anchor::BottomLeft,
        Anchor::BottomCenter,
        Anchor::BottomRight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Anchor::TopLeft => "top_left",
            Anchor::TopCenter => "top_center",
            Anchor::TopRight => "top_right",
            Anchor::MiddleLeft => "middle_left",
            Anchor::Center => "center",
            Anchor::MiddleRight => "middle_right",
            Anchor::BottomLeft => "bottom_left",
            Anchor::BottomCenter => "bottom_center",
            Anchor::BottomRight => "bottom_right",
        }
    }

    /// Unknown names fall back to `bottom_right`.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == name.trim())
            .unwrap_or_default()
    }
}

impl From<String> for Anchor {
    fn from(name: String) -> Self {
        Anchor::from_name(&name)
    }
}

impl From<Anchor> for String {
    fn from(a: Anchor) -> Self {
        a.as_str().to_string()
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedColor {
    White,
    Black,
    Gray,
    Red,
    Green,
    Blue,
    Yellow,
    Cyan,
    Magenta,
    Orange,
}

impl NamedColor {
    const TABLE: [(&'static str, NamedColor); 11] = [
        ("white", NamedColor::White),
        ("black", NamedColor::Black),
        ("gray", NamedColor::Gray),
        ("grey", NamedColor::Gray),
        ("red", NamedColor::Red),
        ("green", NamedColor::Green),
        ("blue", NamedColor::Blue),
        ("yellow", NamedColor::Yellow),
        ("cyan", NamedColor::Cyan),
        ("magenta", NamedColor::Magenta),
        ("orange", NamedColor::Orange),
    ];

    fn lookup(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::TABLE.iter().find(|(n, _)| *n == name).map(|(_, c)| *c)
    }

    fn name(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(_, c)| *c == self)
            .map(|(n, _)| *n)
            .unwrap_or("white")
    }

    pub fn rgb(self) -> [u8; 3] {
        match self {
            NamedColor::White => [255, 255, 255],
            NamedColor::Black => [0, 0, 0],
            NamedColor::Gray => [128, 128, 128],
            NamedColor::Red => [255, 0, 0],
            NamedColor::Green => [0, 128, 0],
            NamedColor::Blue => [0, 0, 255],
            NamedColor::Yellow => [255, 255, 0],
            NamedColor::Cyan => [0, 255, 255],
            NamedColor::Magenta => [255, 0, 255],
            NamedColor::Orange => [255, 165, 0],
        }
    }
}

/// Watermark ink color, parsed once at the settings boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Color {
    Rgb([u8; 3]),
    Named(NamedColor),
}

impl Color {
    pub const WHITE: Color = Color::Rgb([255, 255, 255]);

    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if let Some(hex) = raw.strip_prefix('#') {
            if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(WatermarkError::invalid(format!(
                    "color {raw:?} is not a #RRGGBB value"
                )));
            }
            let channel = |i: usize| {
                u8::from_str_radix(&hex[i..i + 2], 16)
                    .map_err(|e| WatermarkError::invalid(format!("color {raw:?}: {e}")))
            };
            return Ok(Color::Rgb([channel(0)?, channel(2)?, channel(4)?]));
        }
        NamedColor::lookup(raw)
            .map(Color::Named)
            .ok_or_else(|| WatermarkError::invalid(format!("unknown color {raw:?}")))
    }

    pub fn rgb(self) -> [u8; 3] {
        match self {
            Color::Rgb(c) => c,
            Color::Named(n) => n.rgb(),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl TryFrom<String> for Color {
    type Error = WatermarkError;

    fn try_from(raw: String) -> Result<Self> {
        Color::parse(&raw)
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Rgb([r, g, b]) => write!(f, "#{r:02X}{g:02X}{b:02X}"),
            Color::Named(n) => f.write_str(n.name()),
        }
    }
}

/// Largest accepted `font_size`, in pixels.
pub const MAX_FONT_SIZE: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkSpec {
    pub text: String,
    pub font_size: u32,
    pub font_family: String,
    pub color: Color,
    pub opacity: u8,
    pub position: Anchor,
    pub x_offset: i32,
    pub y_offset: i32,
    /// Persisted but not applied when rendering.
    pub rotation: i32,
    pub bold: bool,
    pub italic: bool,
    pub shadow: bool,
    pub outline: bool,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: 36,
            font_family: "Arial".into(),
            color: Color::WHITE,
            opacity: 100,
            position: Anchor::BottomRight,
            x_offset: 10,
            y_offset: 10,
            rotation: 0,
            bold: false,
            italic: false,
            shadow: false,
            outline: false,
        }
    }
}

impl WatermarkSpec {
    pub fn validate(&self) -> Result<()> {
        if self.opacity > 100 {
            return Err(WatermarkError::invalid(format!(
                "opacity {} is not in 0..=100",
                self.opacity
            )));
        }
        if !(1..=MAX_FONT_SIZE).contains(&self.font_size) {
            return Err(WatermarkError::invalid(format!(
                "font_size {} is not in 1..={MAX_FONT_SIZE}",
                self.font_size
            )));
        }
        Ok(())
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        Self { text: text.into(), ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NamingOption {
    Original,
    Prefix,
    #[default]
    Suffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum OutputFormat {
    #[default]
    #[serde(rename = "JPEG", alias = "jpeg", alias = "JPG", alias = "jpg")]
    #[value(alias = "jpg")]
    Jpeg,
    #[serde(rename = "PNG", alias = "png")]
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSpec {
    /// Unset means "derive a sibling directory from the input".
    #[serde(with = "optional_dir")]
    pub output_dir: Option<PathBuf>,
    pub naming_option: NamingOption,
    pub custom_prefix: String,
    pub custom_suffix: String,
    pub output_format: OutputFormat,
    pub jpeg_quality: u8,
}

impl Default for ExportSpec {
    fn default() -> Self {
        Self {
            output_dir: None,
            naming_option: NamingOption::Suffix,
            custom_prefix: "wm_".into(),
            custom_suffix: "_watermarked".into(),
            output_format: OutputFormat::Jpeg,
            jpeg_quality: 95,
        }
    }
}

impl ExportSpec {
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(WatermarkError::invalid(format!(
                "jpeg_quality {} is not in 1..=100",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub watermark: WatermarkSpec,
    pub export: ExportSpec,
}

impl Settings {
    pub fn new(watermark: WatermarkSpec, export: ExportSpec) -> Result<Self> {
        Self { watermark, export }.validated()
    }

    pub fn validated(self) -> Result<Self> {
        self.watermark.validate()?;
        self.export.validate()?;
        Ok(self)
    }

    /// Reads a YAML settings file; missing keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let txt = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Settings =
            serde_yaml::from_str(&txt).context("Failed to parse settings YAML")?;
        Ok(settings.validated()?)
    }
}

mod optional_dir {
    use std::path::PathBuf;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(dir: &Option<PathBuf>, s: S) -> Result<S::Ok, S::Error> {
        match dir {
            Some(p) => p.serialize(s),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<PathBuf>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        Ok(raw.filter(|s| !s.trim().is_empty()).map(PathBuf::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_color_parses_to_channels() {
        assert_eq!(Color::parse("#FF8000").unwrap(), Color::Rgb([255, 128, 0]));
        assert_eq!(Color::parse("#ff8000").unwrap().rgb(), [255, 128, 0]);
        assert!(Color::parse("#FF80").is_err());
        assert!(Color::parse("#GG0000").is_err());
    }

    #[test]
    fn named_colors_resolve_once() {
        assert_eq!(Color::parse("White").unwrap(), Color::Named(NamedColor::White));
        assert_eq!(Color::parse("grey").unwrap().rgb(), [128, 128, 128]);
        assert!(matches!(
            Color::parse("chartreuse-ish"),
            Err(WatermarkError::InvalidSpec(_))
        ));
    }

    #[test]
    fn unknown_anchor_falls_back_to_bottom_right() {
        assert_eq!(Anchor::from_name("center"), Anchor::Center);
        assert_eq!(Anchor::from_name("somewhere"), Anchor::BottomRight);
        let a: Anchor = serde_json::from_str("\"upper_left\"").unwrap();
        assert_eq!(a, Anchor::BottomRight);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let wm = WatermarkSpec { opacity: 101, ..Default::default() };
        assert!(Settings::new(wm, ExportSpec::default()).is_err());

        let export = ExportSpec { jpeg_quality: 0, ..Default::default() };
        assert!(Settings::new(WatermarkSpec::default(), export).is_err());

        let wm = WatermarkSpec { font_size: 0, ..Default::default() };
        assert!(wm.validate().is_err());
    }

    #[test]
    fn oversized_font_is_rejected() {
        let wm = WatermarkSpec { font_size: 4_000_000_000, ..Default::default() };
        assert!(matches!(
            Settings::new(wm, ExportSpec::default()),
            Err(WatermarkError::InvalidSpec(_))
        ));
        let wm = WatermarkSpec { font_size: MAX_FONT_SIZE, ..Default::default() };
        assert!(wm.validate().is_ok());
    }

    #[test]
    fn export_spec_reads_legacy_strings() {
        let json = r#"{"output_dir": "", "output_format": "PNG", "naming_option": "prefix",
                       "resize_enabled": false}"#;
        let export: ExportSpec = serde_json::from_str(json).unwrap();
        assert_eq!(export.output_dir, None);
        assert_eq!(export.output_format, OutputFormat::Png);
        assert_eq!(export.naming_option, NamingOption::Prefix);
        assert_eq!(export.jpeg_quality, 95);

        let out = serde_json::to_value(&export).unwrap();
        assert_eq!(out["output_dir"], "");
        assert_eq!(out["output_format"], "PNG");
    }

    #[test]
    fn settings_yaml_keeps_defaults_for_missing_keys() {
        let yaml = "watermark:\n  text: hello\n  color: '#00FF00'\nexport:\n  jpeg_quality: 80\n";
        let s: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(s.watermark.text, "hello");
        assert_eq!(s.watermark.color, Color::Rgb([0, 255, 0]));
        assert_eq!(s.watermark.font_size, 36);
        assert_eq!(s.export.jpeg_quality, 80);
        assert_eq!(s.export.custom_suffix, "_watermarked");
    }
}
