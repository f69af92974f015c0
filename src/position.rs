use crate::config::Anchor;

/// Top-left draw coordinate for a `text_w` x `text_h` box on a `width` x `height` image.
///
/// Margins apply only on the edges an anchor touches; centered axes ignore
/// them. Nothing is clamped, so oversized text yields negative coordinates.
pub fn position(
    anchor: Anchor,
    width: i32,
    height: i32,
    text_w: i32,
    text_h: i32,
    margin_x: i32,
    margin_y: i32,
) -> (i32, i32) {
    let left = margin_x;
    let center_x = (width - text_w) / 2;
    let right = width - text_w - margin_x;
    let top = margin_y;
    let middle_y = (height - text_h) / 2;
    let bottom = height - text_h - margin_y;

    match anchor {
        Anchor::TopLeft => (left, top),
        Anchor::TopCenter => (center_x, top),
        Anchor::TopRight => (right, top),
        Anchor::MiddleLeft => (left, middle_y),
        Anchor::Center => (center_x, middle_y),
        Anchor::MiddleRight => (right, middle_y),
        Anchor::BottomLeft => (left, bottom),
        Anchor::BottomCenter => (center_x, bottom),
        Anchor::BottomRight => (right, bottom),
    }
}
