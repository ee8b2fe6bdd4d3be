//! Software canvas primitives on `RgbaImage`.
//!
//! Everything clips against the image bounds, so callers may pass geometry
//! that is partially or completely off the canvas.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgba, RgbaImage};

use crate::region::Rect;

/// Smallest font size the OCR overlay shrinks to.
pub const MIN_FONT_SIZE: f32 = 4.0;
/// Subtracted from the per-line height before shrinking to fit.
pub const FONT_SIZE_PADDING: f32 = 4.0;
/// Horizontal room kept free on each side of fitted text.
pub const TEXT_MARGIN: f32 = 2.0;

/// CSS-style color with fractional alpha.
pub fn rgba(r: u8, g: u8, b: u8, a: f32) -> Rgba<u8> {
    Rgba([r, g, b, (a * 255.0).round() as u8])
}

pub fn rgb(r: u8, g: u8, b: u8) -> Rgba<u8> {
    Rgba([r, g, b, 255])
}

pub fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a = f64::from(src[3]) / 255.0;
    if a <= 0.0 {
        return dst;
    }
    let inv = 1.0 - a;
    let mix = |d: u8, s: u8| {
        (f64::from(d) * inv + f64::from(s) * a)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    let out_a = (f64::from(dst[3]) + f64::from(src[3]) * inv)
        .round()
        .clamp(0.0, 255.0) as u8;
    Rgba([mix(dst[0], src[0]), mix(dst[1], src[1]), mix(dst[2], src[2]), out_a])
}

pub fn blend_at(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
        return;
    }
    let dst = *img.get_pixel(x as u32, y as u32);
    img.put_pixel(x as u32, y as u32, blend_pixel(dst, color));
}

pub fn clear(img: &mut RgbaImage, color: Rgba<u8>) {
    for px in img.pixels_mut() {
        *px = color;
    }
}

pub fn fill_rect(img: &mut RgbaImage, rect: Rect, color: Rgba<u8>) {
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = rect.right().min(img.width() as i32);
    let y1 = rect.bottom().min(img.height() as i32);
    for y in y0..y1 {
        for x in x0..x1 {
            blend_at(img, x, y, color);
        }
    }
}

pub fn hline(img: &mut RgbaImage, x0: i32, x1: i32, y: i32, color: Rgba<u8>) {
    for x in x0.min(x1)..=x0.max(x1) {
        blend_at(img, x, y, color);
    }
}

pub fn vline(img: &mut RgbaImage, x: i32, y0: i32, y1: i32, color: Rgba<u8>) {
    for y in y0.min(y1)..=y0.max(y1) {
        blend_at(img, x, y, color);
    }
}

/// Closed frame through the corners `(x0, y0)` and `(x1, y1)`.
pub fn frame(img: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    hline(img, x0, x1, y0, color);
    hline(img, x0, x1, y1, color);
    vline(img, x0, y0 + 1, y1 - 1, color);
    vline(img, x1, y0 + 1, y1 - 1, color);
}

/// Outline of `rect`, `width` pixels thick, growing outwards.
pub fn stroke_rect(img: &mut RgbaImage, rect: Rect, color: Rgba<u8>, width: i32) {
    for t in 0..width.max(1) {
        frame(img, rect.x - t, rect.y - t, rect.right() + t, rect.bottom() + t, color);
    }
}

/// Dashed outline: `on` pixels drawn, `off` pixels skipped, continuing around the corners.
pub fn stroke_dashed_rect(img: &mut RgbaImage, rect: Rect, color: Rgba<u8>, on: i32, off: i32) {
    let period = (on + off).max(1);
    let mut step = 0;
    let mut plot = |img: &mut RgbaImage, x: i32, y: i32| {
        if step % period < on {
            blend_at(img, x, y, color);
        }
        step += 1;
    };
    let (x0, y0, x1, y1) = (rect.x, rect.y, rect.right(), rect.bottom());
    for x in x0..x1 {
        plot(img, x, y0);
    }
    for y in y0..y1 {
        plot(img, x1, y);
    }
    for x in (x0 + 1..=x1).rev() {
        plot(img, x, y1);
    }
    for y in (y0 + 1..=y1).rev() {
        plot(img, x0, y);
    }
}

pub fn fill_disc(img: &mut RgbaImage, cx: f64, cy: f64, radius: f64, color: Rgba<u8>) {
    let r2 = radius * radius;
    let x0 = (cx - radius).floor() as i32;
    let x1 = (cx + radius).ceil() as i32;
    let y0 = (cy - radius).floor() as i32;
    let y1 = (cy + radius).ceil() as i32;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = f64::from(x) - cx;
            let dy = f64::from(y) - cy;
            if dx * dx + dy * dy <= r2 {
                blend_at(img, x, y, color);
            }
        }
    }
}

pub fn stroke_circle(img: &mut RgbaImage, cx: f64, cy: f64, radius: f64, color: Rgba<u8>) {
    let steps = (radius * 8.0).ceil().max(16.0) as i32;
    let mut last = None;
    for i in 0..steps {
        let t = f64::from(i) / f64::from(steps) * std::f64::consts::TAU;
        let p = (
            (cx + radius * t.cos()).round() as i32,
            (cy + radius * t.sin()).round() as i32,
        );
        if last != Some(p) {
            blend_at(img, p.0, p.1, color);
            last = Some(p);
        }
    }
}

/// Copy `src_rect` of `src` to `(dst_x, dst_y)` on `dst`, honouring source alpha.
pub fn blit(dst: &mut RgbaImage, src: &RgbaImage, src_rect: Rect, dst_x: i32, dst_y: i32) {
    for dy in 0..src_rect.h.max(0) {
        let sy = src_rect.y + dy;
        if sy < 0 || sy >= src.height() as i32 {
            continue;
        }
        for dx in 0..src_rect.w.max(0) {
            let sx = src_rect.x + dx;
            if sx < 0 || sx >= src.width() as i32 {
                continue;
            }
            blend_at(dst, dst_x + dx, dst_y + dy, *src.get_pixel(sx as u32, sy as u32));
        }
    }
}

/// Grayscale, dimmed copy used as the diff background:
/// `0.6 * (0.34 R + 0.5 G + 0.16 B)` written to all three channels.
pub fn dimmed_grayscale(src: &RgbaImage) -> RgbaImage {
    let mut out = src.clone();
    for px in out.pixels_mut() {
        let brightness = 0.6
            * (0.34 * f64::from(px[0]) + 0.5 * f64::from(px[1]) + 0.16 * f64::from(px[2]));
        let v = brightness.round().clamp(0.0, 255.0) as u8;
        px[0] = v;
        px[1] = v;
        px[2] = v;
    }
    out
}

// ── Text ────────────────────────────────────────────────────────────────────

/// Width of a single line drawn at `size` pixels per glyph cell.
pub fn text_width(line: &str, size: f32) -> f32 {
    line.chars().count() as f32 * size.round()
}

/// Draw one line with its top-left corner at `(x, y)`. Glyph cells are
/// `size` x `size` pixels, sampled nearest-neighbour from the 8x8 font.
pub fn draw_text(img: &mut RgbaImage, x: i32, y: i32, line: &str, size: f32, color: Rgba<u8>) {
    let cell = size.round().max(1.0) as i32;
    let mut cursor_x = x;
    for ch in line.chars() {
        let glyph = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?'));
        if let Some(glyph) = glyph {
            for py in 0..cell {
                let row = glyph[(py * 8 / cell) as usize];
                for px in 0..cell {
                    if (row >> (px * 8 / cell)) & 1 == 1 {
                        blend_at(img, cursor_x + px, y + py, color);
                    }
                }
            }
        }
        cursor_x += cell;
    }
}

/// Text with an outline drawn underneath, `outline` pixels wide.
#[allow(clippy::too_many_arguments)]
pub fn draw_outlined_text(
    img: &mut RgbaImage,
    x: i32,
    y: i32,
    line: &str,
    size: f32,
    fill: Rgba<u8>,
    stroke: Rgba<u8>,
    outline: i32,
) {
    for oy in -outline..=outline {
        for ox in -outline..=outline {
            if ox != 0 || oy != 0 {
                draw_text(img, x + ox, y + oy, line, size, stroke);
            }
        }
    }
    draw_text(img, x, y, line, size, fill);
}

/// Largest font size at which every line of `text` fits a `width` x `height` box.
///
/// Starts at `height / lines - FONT_SIZE_PADDING` and shrinks by bisection until
/// the widest line leaves `TEXT_MARGIN` free on both sides.
pub fn calc_font_size(text: &str, width: i32, height: i32) -> f32 {
    let lines: Vec<&str> = text.lines().collect();
    let count = lines.len().max(1) as f32;
    let start = (height as f32 / count - FONT_SIZE_PADDING).floor();
    if start <= MIN_FONT_SIZE {
        return MIN_FONT_SIZE;
    }
    let available = width as f32 - 2.0 * TEXT_MARGIN;
    let fits = |size: f32| {
        lines
            .iter()
            .map(|l| text_width(l, size))
            .fold(0.0f32, f32::max)
            <= available
    };
    if fits(start) {
        return start;
    }
    let (mut lo, mut hi) = (MIN_FONT_SIZE, start);
    while hi - lo > 1.0 {
        let mid = ((lo + hi) / 2.0).floor();
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Draw multi-line text centered in `rect`, sized with [`calc_font_size`].
pub fn draw_centered_text(img: &mut RgbaImage, rect: Rect, text: &str, color: Rgba<u8>) {
    let size = calc_font_size(text, rect.w, rect.h);
    let lines: Vec<&str> = text.lines().collect();
    let line_h = size.round() as i32;
    let block_h = line_h * lines.len() as i32;
    let mut y = rect.y + (rect.h - block_h) / 2;
    for line in lines {
        let w = text_width(line, size) as i32;
        draw_text(img, rect.x + (rect.w - w) / 2, y, line, size, color);
        y += line_h;
    }
}
