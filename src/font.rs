//! Font resolution and text rasterization.
//!
//! Text is rasterized into a coverage mask (`GrayImage`, 0 = no ink,
//! 255 = full ink). The mask's size is the measured text box.

use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};
use rusttype::{point, Font, Rect, Scale};
use tracing::{debug, info, warn};

/// Tried after any explicit font, in order.
const SYSTEM_FONTS: &[&str] = &[
    "/System/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "/Library/Fonts/Arial.ttf",
    "C:/Windows/Fonts/arial.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
];

pub enum Face {
    TrueType { font: Font<'static>, source: PathBuf },
    /// 5x7 bitmap ASCII face, always available.
    Builtin,
}

impl Face {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)?;
        let font = Font::try_from_vec(bytes)
            .ok_or_else(|| anyhow::anyhow!("{} is not a usable font", path.display()))?;
        Ok(Face::TrueType { font, source: path.to_path_buf() })
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Face::Builtin)
    }

    pub fn describe(&self) -> String {
        match self {
            Face::TrueType { source, .. } => source.display().to_string(),
            Face::Builtin => "built-in bitmap".into(),
        }
    }

    pub fn rasterize(&self, text: &str, px: f32) -> GrayImage {
        match self {
            Face::TrueType { font, .. } => rasterize_truetype(font, text, px),
            Face::Builtin => rasterize_builtin(text, px),
        }
    }
}

/// Ordered font candidates; the first one that loads wins.
#[derive(Debug, Clone, Default)]
pub struct FontResolver {
    candidates: Vec<PathBuf>,
}

impl FontResolver {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    /// No candidates: always resolves to [`Face::Builtin`].
    pub fn builtin_only() -> Self {
        Self::default()
    }

    /// `family` is tried first when it names a font file, then
    /// `PHOTOMARK_FONT`, then well-known system locations.
    pub fn system(family: &str) -> Self {
        let mut candidates = Vec::new();
        let family_path = Path::new(family);
        let is_font_file = family_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .is_some_and(|e| matches!(e.as_str(), "ttf" | "otf" | "ttc"));
        if is_font_file {
            candidates.push(family_path.to_path_buf());
        }
        if let Ok(p) = std::env::var("PHOTOMARK_FONT") {
            candidates.push(PathBuf::from(p));
        }
        candidates.extend(SYSTEM_FONTS.iter().map(PathBuf::from));
        Self { candidates }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    pub fn resolve(&self) -> Face {
        for path in &self.candidates {
            match Face::load(path) {
                Ok(face) => {
                    debug!("using font {}", path.display());
                    return face;
                }
                Err(e) => debug!("skipping font {}: {e}", path.display()),
            }
        }
        info!("no font file found, using built-in bitmap face");
        Face::Builtin
    }
}

fn rasterize_truetype(font: &Font<'static>, text: &str, px: f32) -> GrayImage {
    let scale = Scale::uniform(px);
    let v = font.v_metrics(scale);
    let glyphs: Vec<_> = font.layout(text, scale, point(0.0, v.ascent)).collect();

    let bounds = glyphs
        .iter()
        .filter_map(|g| g.pixel_bounding_box())
        .fold(None::<Rect<i32>>, |acc, bb| {
            Some(match acc {
                None => bb,
                Some(a) => Rect {
                    min: point(a.min.x.min(bb.min.x), a.min.y.min(bb.min.y)),
                    max: point(a.max.x.max(bb.max.x), a.max.y.max(bb.max.y)),
                },
            })
        });
    let Some(b) = bounds else {
        return GrayImage::new(0, 0);
    };

    let (w, h) = ((b.max.x - b.min.x) as u32, (b.max.y - b.min.y) as u32);
    let mut mask = GrayImage::new(w, h);
    for g in &glyphs {
        let Some(bb) = g.pixel_bounding_box() else { continue };
        g.draw(|gx, gy, v| {
            let x = gx as i32 + bb.min.x - b.min.x;
            let y = gy as i32 + bb.min.y - b.min.y;
            if x < 0 || y < 0 || x as u32 >= w || y as u32 >= h {
                return;
            }
            let cov = (v * 255.0).round().clamp(0.0, 255.0) as u8;
            let p = mask.get_pixel_mut(x as u32, y as u32);
            if cov > p[0] {
                p[0] = cov;
            }
        });
    }
    mask
}

const GLYPH_W: u32 = 5;
/// Upper bound on coverage mask area.
const MAX_MASK_PIXELS: u64 = 1 << 28;
const GLYPH_H: u32 = 7;
const ADVANCE: u32 = GLYPH_W + 1;

/// Pixel scale of the bitmap face so the cell height tracks `px`.
pub fn builtin_scale(px: f32) -> u32 {
    ((px / GLYPH_H as f32).floor() as u32).max(1)
}

fn rasterize_builtin(text: &str, px: f32) -> GrayImage {
    let n = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
    if n == 0 {
        return GrayImage::new(0, 0);
    }
    let s = builtin_scale(px);
    let size = n
        .checked_mul(ADVANCE)
        .and_then(|cells| (cells - 1).checked_mul(s))
        .zip(GLYPH_H.checked_mul(s))
        .filter(|(w, h)| u64::from(*w) * u64::from(*h) <= MAX_MASK_PIXELS);
    let Some((w, h)) = size else {
        warn!(chars = n, px, "text too large to rasterize, skipping");
        return GrayImage::new(0, 0);
    };
    let mut mask = GrayImage::new(w, h);

    for (i, ch) in text.chars().enumerate() {
        let columns = glyph(ch);
        let origin = i as u32 * ADVANCE * s;
        for (col, bits) in columns.iter().enumerate() {
            for row in 0..GLYPH_H {
                if bits & (1 << row) == 0 {
                    continue;
                }
                let x0 = origin + col as u32 * s;
                let y0 = row * s;
                for dy in 0..s {
                    for dx in 0..s {
                        mask.put_pixel(x0 + dx, y0 + dy, Luma([255]));
                    }
                }
            }
        }
    }
    mask
}

/// Widens strokes by `radius` pixels to the right.
pub fn embolden(mask: &GrayImage, radius: u32) -> GrayImage {
    if mask.width() == 0 || radius == 0 {
        return mask.clone();
    }
    let mut out = GrayImage::new(mask.width() + radius, mask.height());
    for (x, y, p) in mask.enumerate_pixels() {
        for dx in 0..=radius {
            let q = out.get_pixel_mut(x + dx, y);
            q[0] = q[0].max(p[0]);
        }
    }
    out
}

/// Shears rows to the right, bottom row unshifted.
pub fn slant(mask: &GrayImage) -> GrayImage {
    const SHEAR: f32 = 0.2;
    if mask.width() == 0 || mask.height() == 0 {
        return mask.clone();
    }
    let h = mask.height();
    let shift = |y: u32| ((h - 1 - y) as f32 * SHEAR).round() as u32;
    let mut out = GrayImage::new(mask.width() + shift(0), h);
    for (x, y, p) in mask.enumerate_pixels() {
        out.put_pixel(x + shift(y), y, *p);
    }
    out
}

// Column-major 5x7 glyphs for ASCII 0x20..=0x7E; bit 0 is the top row.
const FONT_5X7: [[u8; 5]; 95] = [
    [0x00, 0x00, 0x00, 0x00, 0x00], // ' '
    [0x00, 0x00, 0x5F, 0x00, 0x00], // !
    [0x00, 0x07, 0x00, 0x07, 0x00], // "
    [0x14, 0x7F, 0x14, 0x7F, 0x14], // #
    [0x24, 0x2A, 0x7F, 0x2A, 0x12], // $
    [0x23, 0x13, 0x08, 0x64, 0x62], // %
    [0x36, 0x49, 0x55, 0x22, 0x50], // &
    [0x00, 0x05, 0x03, 0x00, 0x00], // '
    [0x00, 0x1C, 0x22, 0x41, 0x00], // (
    [0x00, 0x41, 0x22, 0x1C, 0x00], // )
    [0x08, 0x2A, 0x1C, 0x2A, 0x08], // *
    [0x08, 0x08, 0x3E, 0x08, 0x08], // +
    [0x00, 0x50, 0x30, 0x00, 0x00], // ,
    [0x08, 0x08, 0x08, 0x08, 0x08], // -
    [0x00, 0x60, 0x60, 0x00, 0x00], // .
    [0x20, 0x10, 0x08, 0x04, 0x02], // /
    [0x3E, 0x51, 0x49, 0x45, 0x3E], // 0
    [0x00, 0x42, 0x7F, 0x40, 0x00], // 1
    [0x42, 0x61, 0x51, 0x49, 0x46], // 2
    [0x21, 0x41, 0x45, 0x4B, 0x31], // 3
    [0x18, 0x14, 0x12, 0x7F, 0x10], // 4
    [0x27, 0x45, 0x45, 0x45, 0x39], // 5
    [0x3C, 0x4A, 0x49, 0x49, 0x30], // 6
    [0x01, 0x71, 0x09, 0x05, 0x03], // 7
    [0x36, 0x49, 0x49, 0x49, 0x36], // 8
    [0x06, 0x49, 0x49, 0x29, 0x1E], // 9
    [0x00, 0x36, 0x36, 0x00, 0x00], // :
    [0x00, 0x56, 0x36, 0x00, 0x00], // ;
    [0x08, 0x14, 0x22, 0x41, 0x00], // <
    [0x14, 0x14, 0x14, 0x14, 0x14], // =
    [0x00, 0x41, 0x22, 0x14, 0x08], // >
    [0x02, 0x01, 0x51, 0x09, 0x06], // ?
    [0x32, 0x49, 0x79, 0x41, 0x3E], // @
    [0x7E, 0x11, 0x11, 0x11, 0x7E], // A
    [0x7F, 0x49, 0x49, 0x49, 0x36], // B
    [0x3E, 0x41, 0x41, 0x41, 0x22], // C
    [0x7F, 0x41, 0x41, 0x22, 0x1C], // D
    [0x7F, 0x49, 0x49, 0x49, 0x41], // E
    [0x7F, 0x09, 0x09, 0x09, 0x01], // F
    [0x3E, 0x41, 0x49, 0x49, 0x7A], // G
    [0x7F, 0x08, 0x08, 0x08, 0x7F], // H
    [0x00, 0x41, 0x7F, 0x41, 0x00], // I
    [0x20, 0x40, 0x41, 0x3F, 0x01], // J
    [0x7F, 0x08, 0x14, 0x22, 0x41], // K
    [0x7F, 0x40, 0x40, 0x40, 0x40], // L
    [0x7F, 0x02, 0x0C, 0x02, 0x7F], // M
    [0x7F, 0x04, 0x08, 0x10, 0x7F], // N
    [0x3E, 0x41, 0x41, 0x41, 0x3E], // O
    [0x7F, 0x09, 0x09, 0x09, 0x06], // P
    [0x3E, 0x41, 0x51, 0x21, 0x5E], // Q
    [0x7F, 0x09, 0x19, 0x29, 0x46], // R
    [0x46, 0x49, 0x49, 0x49, 0x31], // S
    [0x01, 0x01, 0x7F, 0x01, 0x01], // T
    [0x3F, 0x40, 0x40, 0x40, 0x3F], // U
    [0x1F, 0x20, 0x40, 0x20, 0x1F], // V
    [0x3F, 0x40, 0x38, 0x40, 0x3F], // W
    [0x63, 0x14, 0x08, 0x14, 0x63], // X
    [0x07, 0x08, 0x70, 0x08, 0x07], // Y
    [0x61, 0x51, 0x49, 0x45, 0x43], // Z
    [0x00, 0x7F, 0x41, 0x41, 0x00], // [
    [0x02, 0x04, 0x08, 0x10, 0x20], // backslash
    [0x00, 0x41, 0x41, 0x7F, 0x00], // ]
    [0x04, 0x02, 0x01, 0x02, 0x04], // ^
    [0x40, 0x40, 0x40, 0x40, 0x40], // _
    [0x00, 0x01, 0x02, 0x04, 0x00], // `
    [0x20, 0x54, 0x54, 0x54, 0x78], // a
    [0x7F, 0x48, 0x44, 0x44, 0x38], // b
    [0x38, 0x44, 0x44, 0x44, 0x20], // c
    [0x38, 0x44, 0x44, 0x48, 0x7F], // d
    [0x38, 0x54, 0x54, 0x54, 0x18], // e
    [0x08, 0x7E, 0x09, 0x01, 0x02], // f
    [0x0C, 0x52, 0x52, 0x52, 0x3E], // g
    [0x7F, 0x08, 0x04, 0x04, 0x78], // h
    [0x00, 0x44, 0x7D, 0x40, 0x00], // i
    [0x20, 0x40, 0x44, 0x3D, 0x00], // j
    [0x7F, 0x10, 0x28, 0x44, 0x00], // k
    [0x00, 0x41, 0x7F, 0x40, 0x00], // l
    [0x7C, 0x04, 0x18, 0x04, 0x78], // m
    [0x7C, 0x08, 0x04, 0x04, 0x78], // n
    [0x38, 0x44, 0x44, 0x44, 0x38], // o
    [0x7C, 0x14, 0x14, 0x14, 0x08], // p
    [0x08, 0x14, 0x14, 0x18, 0x7C], // q
    [0x7C, 0x08, 0x04, 0x04, 0x08], // r
    [0x48, 0x54, 0x54, 0x54, 0x20], // s
    [0x04, 0x3F, 0x44, 0x40, 0x20], // t
    [0x3C, 0x40, 0x40, 0x20, 0x7C], // u
    [0x1C, 0x20, 0x40, 0x20, 0x1C], // v
    [0x3C, 0x40, 0x30, 0x40, 0x3C], // w
    [0x44, 0x28, 0x10, 0x28, 0x44], // x
    [0x0C, 0x50, 0x50, 0x50, 0x3C], // y
    [0x44, 0x64, 0x54, 0x4C, 0x44], // z
    [0x00, 0x08, 0x36, 0x41, 0x00], // {
    [0x00, 0x00, 0x7F, 0x00, 0x00], // |
    [0x00, 0x41, 0x36, 0x08, 0x00], // }
    [0x08, 0x04, 0x08, 0x10, 0x08], // ~
];

fn glyph(ch: char) -> &'static [u8; 5] {
    let code = ch as u32;
    if (0x20..=0x7E).contains(&code) {
        &FONT_5X7[(code - 0x20) as usize]
    } else {
        &FONT_5X7[('?' as u32 - 0x20) as usize]
    }
}
