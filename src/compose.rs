//! Text watermark composition.

use image::{imageops, ColorType, DynamicImage, GenericImage, GrayImage, Rgba, RgbaImage};
use imageproc::pixelops::weighted_sum;
use tracing::debug;

use crate::config::WatermarkSpec;
use crate::font::{embolden, slant, Face, FontResolver};
use crate::position::position;

const OUTLINE_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];
const SHADOW_OFFSET: (i32, i32) = (2, 2);

/// Where ink is drawn for a given opacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layering {
    /// Straight onto a copy of the image, in its own channel layout.
    Direct,
    /// Onto a transparent RGBA layer that is then blended over the image.
    Overlay { alpha: u8 },
}

impl Layering {
    pub fn for_opacity(opacity: u8) -> Self {
        if opacity >= 100 {
            Layering::Direct
        } else {
            let alpha = (255.0 * f32::from(opacity) / 100.0).round() as u8;
            Layering::Overlay { alpha }
        }
    }
}

struct Inks {
    fill: Rgba<u8>,
    outline: Rgba<u8>,
    shadow: Rgba<u8>,
}

impl Inks {
    fn new(spec: &WatermarkSpec, layering: Layering) -> Self {
        let [r, g, b] = spec.color.rgb();
        match layering {
            Layering::Direct => Self {
                fill: Rgba([r, g, b, 255]),
                outline: Rgba([0, 0, 0, 255]),
                shadow: Rgba([128, 128, 128, 255]),
            },
            Layering::Overlay { alpha } => Self {
                fill: Rgba([r, g, b, alpha]),
                outline: Rgba([0, 0, 0, alpha]),
                shadow: Rgba([0, 0, 0, alpha / 2]),
            },
        }
    }
}

pub struct Compositor {
    face: Face,
}

impl Compositor {
    pub fn new(face: Face) -> Self {
        Self { face }
    }

    /// Resolves a face for `spec.font_family` from the system candidates.
    pub fn for_spec(spec: &WatermarkSpec) -> Self {
        Self::new(FontResolver::system(&spec.font_family).resolve())
    }

    pub fn face(&self) -> &Face {
        &self.face
    }

    pub fn compose(&self, image: &DynamicImage, spec: &WatermarkSpec) -> DynamicImage {
        self.compose_text(image, spec, &spec.text)
    }

    /// Like [`compose`](Self::compose) with `text` in place of `spec.text`.
    /// The input image is never modified.
    pub fn compose_text(&self, image: &DynamicImage, spec: &WatermarkSpec, text: &str) -> DynamicImage {
        if text.is_empty() {
            return image.clone();
        }
        if spec.rotation != 0 {
            debug!(rotation = spec.rotation, "rotation is not applied");
        }

        let mask = self.measure(text, spec);
        if mask.width() == 0 || mask.height() == 0 {
            return image.clone();
        }

        let (x, y) = position(
            spec.position,
            image.width() as i32,
            image.height() as i32,
            mask.width() as i32,
            mask.height() as i32,
            spec.x_offset,
            spec.y_offset,
        );

        let layering = Layering::for_opacity(spec.opacity);
        let inks = Inks::new(spec, layering);
        match layering {
            Layering::Direct => {
                let mut out = image.clone();
                draw_passes(&mut out, &mask, x, y, spec, &inks);
                out
            }
            Layering::Overlay { .. } => {
                let mut base = image.to_rgba8();
                let mut overlay = RgbaImage::new(base.width(), base.height());
                draw_passes(&mut overlay, &mask, x, y, spec, &inks);
                imageops::overlay(&mut base, &overlay, 0, 0);
                restore_layout(base, image.color())
            }
        }
    }

    /// Coverage mask for `text`; its dimensions are the text box.
    pub fn measure(&self, text: &str, spec: &WatermarkSpec) -> GrayImage {
        let px = spec.font_size as f32;
        let mut mask = self.face.rasterize(text, px);
        if spec.bold {
            mask = embolden(&mask, ((px / 24.0).round() as u32).max(1));
        }
        if spec.italic {
            mask = slant(&mask);
        }
        mask
    }
}

fn draw_passes<C>(canvas: &mut C, mask: &GrayImage, x: i32, y: i32, spec: &WatermarkSpec, inks: &Inks)
where
    C: GenericImage<Pixel = Rgba<u8>>,
{
    if spec.outline {
        for (dx, dy) in OUTLINE_OFFSETS {
            stamp(canvas, mask, x + dx, y + dy, inks.outline);
        }
    }
    if spec.shadow {
        stamp(canvas, mask, x + SHADOW_OFFSET.0, y + SHADOW_OFFSET.1, inks.shadow);
    }
    stamp(canvas, mask, x, y, inks.fill);
}

/// Paints `ink` through `mask` with its top-left at (`x`, `y`), clipping to the canvas.
fn stamp<C>(canvas: &mut C, mask: &GrayImage, x: i32, y: i32, ink: Rgba<u8>)
where
    C: GenericImage<Pixel = Rgba<u8>>,
{
    let (w, h) = (canvas.width() as i32, canvas.height() as i32);
    for (mx, my, cov) in mask.enumerate_pixels() {
        if cov[0] == 0 {
            continue;
        }
        let (cx, cy) = (x + mx as i32, y + my as i32);
        if cx < 0 || cy < 0 || cx >= w || cy >= h {
            continue;
        }
        let (cx, cy) = (cx as u32, cy as u32);
        let dst = canvas.get_pixel(cx, cy);
        canvas.put_pixel(cx, cy, paint(dst, ink, f32::from(cov[0]) / 255.0));
    }
}

/// Coverage-weighted replacement of `dst` by `ink` on all four channels.
/// Later passes overwrite earlier ones instead of stacking on them.
fn paint(dst: Rgba<u8>, ink: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let mut out = weighted_sum(dst, ink, 1.0 - coverage, coverage);
    if dst[3] == 0 {
        // nothing underneath: keep the ink's color, only alpha is partial
        out.0[..3].copy_from_slice(&ink.0[..3]);
    }
    out
}

/// Converts the composited RGBA buffer back to the source layout.
fn restore_layout(rgba: RgbaImage, color: ColorType) -> DynamicImage {
    let img = DynamicImage::ImageRgba8(rgba);
    match color {
        ColorType::L8 => DynamicImage::ImageLuma8(img.to_luma8()),
        ColorType::La8 => DynamicImage::ImageLumaA8(img.to_luma_alpha8()),
        ColorType::Rgb8 => DynamicImage::ImageRgb8(img.to_rgb8()),
        ColorType::L16 => DynamicImage::ImageLuma16(img.to_luma16()),
        ColorType::La16 => DynamicImage::ImageLumaA16(img.to_luma_alpha16()),
        ColorType::Rgb16 => DynamicImage::ImageRgb16(img.to_rgb16()),
        ColorType::Rgba16 => DynamicImage::ImageRgba16(img.to_rgba16()),
        ColorType::Rgb32F => DynamicImage::ImageRgb32F(img.to_rgb32f()),
        ColorType::Rgba32F => DynamicImage::ImageRgba32F(img.to_rgba32f()),
        _ => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Anchor, Color};
    use image::{GenericImageView, Rgb, RgbImage};

    fn builtin() -> Compositor {
        Compositor::new(Face::Builtin)
    }

    fn spec(text: &str) -> WatermarkSpec {
        WatermarkSpec {
            text: text.into(),
            font_size: 14,
            color: Color::WHITE,
            position: Anchor::TopLeft,
            x_offset: 10,
            y_offset: 10,
            ..Default::default()
        }
    }

    fn black(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([0, 0, 0])))
    }

    #[test]
    fn layering_follows_opacity() {
        assert_eq!(Layering::for_opacity(100), Layering::Direct);
        assert_eq!(Layering::for_opacity(50), Layering::Overlay { alpha: 128 });
        assert_eq!(Layering::for_opacity(0), Layering::Overlay { alpha: 0 });
    }

    #[test]
    fn empty_text_is_a_no_op() {
        let img = black(40, 30);
        let out = builtin().compose(&img, &spec(""));
        assert_eq!(out.as_bytes(), img.as_bytes());
        assert_eq!(out.color(), img.color());
    }

    #[test]
    fn opaque_fill_lands_at_anchor() {
        let img = black(100, 60);
        let out = builtin().compose(&img, &spec("T"));
        assert_eq!(out.color(), ColorType::Rgb8);
        assert_eq!(out.to_rgb8().get_pixel(10, 10), &Rgb([255, 255, 255]));
        assert_eq!(out.to_rgb8().get_pixel(9, 9), &Rgb([0, 0, 0]));
        // input untouched
        assert_eq!(img.to_rgb8().get_pixel(10, 10), &Rgb([0, 0, 0]));
    }

    #[test]
    fn half_opacity_blends_between_base_and_fill() {
        let img = black(100, 60);
        let s = WatermarkSpec { opacity: 50, ..spec("T") };
        let out = builtin().compose(&img, &s);
        assert_eq!(out.color(), ColorType::Rgb8);
        let p = out.to_rgb8().get_pixel(10, 10).0;
        for c in p {
            assert!(c > 0 && c < 255, "channel {c} not strictly between base and fill");
        }
    }

    #[test]
    fn rgba_input_keeps_alpha_channel() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(60, 40, Rgba([0, 0, 255, 255])));
        let s = WatermarkSpec { opacity: 40, ..spec("T") };
        let out = builtin().compose(&img, &s);
        assert_eq!(out.color(), ColorType::Rgba8);
        assert_eq!(out.to_rgba8().get_pixel(10, 10)[3], 255);
    }

    #[test]
    fn shadow_is_offset_and_gray() {
        let img = black(100, 60);
        let s = WatermarkSpec { shadow: true, ..spec("T") };
        let out = builtin().compose(&img, &s).to_rgb8();
        // the stem of 'T' spans x 14..=15, y 10..=23 at scale 2
        let stem_x = 10 + 2 * 2;
        assert_eq!(out.get_pixel(stem_x, 10 + 13), &Rgb([255, 255, 255]));
        assert_eq!(out.get_pixel(stem_x + 2, 10 + 13 + 2), &Rgb([128, 128, 128]));
    }

    #[test]
    fn outline_surrounds_fill() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 60, Rgb([200, 0, 0])));
        let s = WatermarkSpec { outline: true, ..spec("T") };
        let out = builtin().compose(&img, &s).to_rgb8();
        assert_eq!(out.get_pixel(10, 10), &Rgb([255, 255, 255]));
        assert_eq!(out.get_pixel(9, 9), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(30, 40), &Rgb([200, 0, 0]));
    }

    #[test]
    fn translucent_outline_does_not_stack_or_tint_fill() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 60, Rgb([255, 255, 255])));
        let s = WatermarkSpec { opacity: 50, outline: true, ..spec("T") };
        let out = builtin().compose(&img, &s).to_rgb8();
        // fill over its own outline stays white
        assert_eq!(out.get_pixel(14, 10), &Rgb([255, 255, 255]));
        // outline-only pixels sit at half strength however many copies overlap
        for (x, y) in [(9, 9), (9, 10), (13, 12), (16, 13)] {
            let c = out.get_pixel(x, y)[0];
            assert!((120..=135).contains(&c), "outline at ({x},{y}) is {c}");
        }
    }

    #[test]
    fn paint_replaces_instead_of_blending() {
        let half_black = Rgba([0, 0, 0, 128]);
        let white = Rgba([255, 255, 255, 128]);
        let once = paint(Rgba([0, 0, 0, 0]), half_black, 1.0);
        assert_eq!(paint(once, half_black, 1.0), half_black);
        assert_eq!(paint(once, white, 1.0), white);
        // partial coverage on an empty layer keeps the ink color
        let edge = paint(Rgba([0, 0, 0, 0]), white, 0.5);
        assert_eq!(&edge.0[..3], &[255, 255, 255]);
        assert!(edge[3] < 128);
    }

    #[test]
    fn oversized_text_leaves_image_unchanged() {
        let img = black(40, 30);
        let s = WatermarkSpec { font_size: 4_000_000_000, ..spec("WWW") };
        let out = builtin().compose(&img, &s);
        assert_eq!(out.as_bytes(), img.as_bytes());
    }

    #[test]
    fn off_canvas_text_is_clipped() {
        let img = black(8, 8);
        let s = WatermarkSpec { position: Anchor::Center, font_size: 70, ..spec("WWW") };
        let out = builtin().compose(&img, &s);
        assert_eq!(out.dimensions(), (8, 8));
    }

    #[test]
    fn grayscale_layout_survives_overlay() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::new(50, 30));
        let s = WatermarkSpec { opacity: 70, ..spec("T") };
        let out = builtin().compose(&img, &s);
        assert_eq!(out.color(), ColorType::L8);
        assert!(out.to_luma8().get_pixel(10, 10)[0] > 0);
    }
}
