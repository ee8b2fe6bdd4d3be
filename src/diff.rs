//! Split view comparing a needle against a live screenshot.
//!
//! Left of the divider the reference needle is shown inside each matched
//! area, right of it the screenshot. Everything outside the matches is a
//! dimmed grayscale version of the screenshot.

use image::{Rgba, RgbaImage};
use serde::Deserialize;

use crate::config::DiffConfig;
use crate::raster;
use crate::region::{Rect, Region, RegionKind};
use crate::shapes::Cursor;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOutcome {
    Ok,
    Fail,
}

/// Area found by the matcher, with its similarity in percent.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "MatchRecord")]
pub struct MatchArea {
    pub rect: Rect,
    pub similarity: f64,
    pub outcome: MatchOutcome,
}

#[derive(Deserialize)]
struct MatchRecord {
    xpos: i32,
    ypos: i32,
    width: i32,
    height: i32,
    #[serde(default)]
    similarity: f64,
    #[serde(rename = "type")]
    outcome: MatchOutcome,
}

impl From<MatchRecord> for MatchArea {
    fn from(rec: MatchRecord) -> Self {
        Self {
            rect: Rect::new(rec.xpos, rec.ypos, rec.width, rec.height),
            similarity: rec.similarity,
            outcome: rec.outcome,
        }
    }
}

/// How the needle image is shown left of the divider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DiffMode {
    /// Only the matched areas show the needle.
    #[default]
    AreaOnly,
    /// The whole needle image fills the left side.
    Full,
}

/// Frame around the needle part of a match, for both outcomes.
fn needle_stroke() -> Rgba<u8> {
    raster::rgb(64, 224, 208)
}

fn shape_color(outcome: MatchOutcome) -> Rgba<u8> {
    match outcome {
        MatchOutcome::Ok => raster::rgba(0, 255, 0, 0.9),
        MatchOutcome::Fail => raster::rgba(255, 0, 0, 0.9),
    }
}

fn exclude_fill() -> Rgba<u8> {
    raster::rgba(225, 215, 215, 0.7)
}

fn exclude_stroke() -> Rgba<u8> {
    raster::rgb(100, 100, 100)
}

fn original_area_stroke() -> Rgba<u8> {
    raster::rgb(200, 200, 200)
}

fn handle_color() -> Rgba<u8> {
    raster::rgb(255, 145, 75)
}

pub struct NeedleDiff {
    config: DiffConfig,
    width: i32,
    height: i32,
    divide: f64,
    screenshot: Option<RgbaImage>,
    gray: Option<RgbaImage>,
    needle: Option<RgbaImage>,
    mode: DiffMode,
    areas: Vec<Region>,
    matches: Vec<MatchArea>,
    dragging: bool,
    frame: RgbaImage,
}

impl NeedleDiff {
    pub fn new(width: u32, height: u32, config: DiffConfig) -> Self {
        Self {
            divide: config.initial_divide,
            config,
            width: width as i32,
            height: height as i32,
            screenshot: None,
            gray: None,
            needle: None,
            mode: DiffMode::AreaOnly,
            areas: Vec::new(),
            matches: Vec::new(),
            dragging: false,
            frame: RgbaImage::new(width, height),
        }
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    pub fn mode(&self) -> DiffMode {
        self.mode
    }

    pub fn has_needle(&self) -> bool {
        self.needle.is_some()
    }

    /// Assign the "after" image and repaint.
    pub fn set_screenshot(&mut self, image: RgbaImage) {
        self.gray = Some(raster::dimmed_grayscale(&image));
        self.screenshot = Some(image);
        self.draw();
    }

    /// Assign the "before" image with the needle's areas and the match results.
    /// `matches[i]` was found for `areas[i]`.
    pub fn set_needle(
        &mut self,
        image: Option<RgbaImage>,
        areas: Vec<Region>,
        matches: Vec<MatchArea>,
        mode: DiffMode,
    ) {
        self.needle = image;
        self.areas = areas;
        self.matches = matches;
        self.mode = mode;
        self.draw();
    }

    pub fn set_mode(&mut self, mode: DiffMode) {
        self.mode = mode;
        self.draw();
    }

    pub fn divide(&self) -> f64 {
        self.divide
    }

    /// Values above 1 are percentages.
    pub fn set_divide(&mut self, value: f64) {
        self.divide = if value > 1.0 { value / 100.0 } else { value };
        self.draw();
    }

    /// Divider position in canvas pixels, at least 1.
    pub fn split(&self) -> f64 {
        (self.divide * f64::from(self.width)).max(1.0)
    }

    // ── Pointer ─────────────────────────────────────────────────────────────

    /// Canvas x for a pointer at `display_x` on a view `display_width` wide.
    pub fn to_canvas_x(&self, display_x: f64, display_width: f64) -> f64 {
        if display_width <= 0.0 {
            return display_x;
        }
        display_x * f64::from(self.width) / display_width
    }

    fn near_handle(&self, x: f64) -> bool {
        (self.divide - x / f64::from(self.width)).abs() < self.config.handle_threshold
    }

    pub fn pointer_down(&mut self, x: f64) {
        if self.near_handle(x) {
            self.dragging = true;
        }
    }

    /// Follow the pointer while dragging and report the cursor to show.
    pub fn pointer_move(&mut self, x: f64) -> Cursor {
        if self.dragging {
            self.set_divide((x / f64::from(self.width)).clamp(0.0, 1.0));
        }
        self.cursor_at(x)
    }

    pub fn pointer_up(&mut self) {
        self.dragging = false;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn cursor_at(&self, x: f64) -> Cursor {
        if self.near_handle(x) {
            Cursor::ColResize
        } else {
            Cursor::Default
        }
    }

    // ── Rendering ───────────────────────────────────────────────────────────

    /// Full repaint. Does nothing until a screenshot is set.
    pub fn draw(&mut self) -> bool {
        // Without a needle everything counts as "right of the divider".
        let split = if self.needle.is_some() { self.split() } else { 0.0 };
        let (Some(screenshot), Some(gray)) = (&self.screenshot, &self.gray) else {
            return false;
        };
        let frame = &mut self.frame;
        let (width, height) = (self.width, self.height);
        let whole = Rect::new(0, 0, width, height);

        raster::clear(frame, Rgba([0, 0, 0, 255]));
        let background = if self.matches.is_empty() { screenshot } else { gray };
        raster::blit(frame, background, whole, 0, 0);

        let needle = self.needle.as_ref();
        let split_px = split.floor() as i32;
        let full = self.mode == DiffMode::Full;

        if let (Some(needle), true) = (needle, full) {
            raster::blit(frame, needle, Rect::new(0, 0, split_px, height), 0, 0);
        }

        for (idx, m) in self.matches.iter().enumerate() {
            let r = m.rect;
            let orig = self.areas.get(idx).map(|a| a.rect).unwrap_or(r);
            let y_start = (r.y - 1).max(0);
            let y_end = (r.bottom() + 1).min(height);

            if let Some(needle) = needle {
                if split_px > r.x && !full {
                    let used = if split_px - r.x < r.w { split_px - r.x } else { r.w + 1 };
                    raster::blit(frame, needle, Rect::new(orig.x, orig.y, used, r.h), r.x, r.y);
                    raster::frame(frame, r.x, y_start, r.x + used, y_end, needle_stroke());
                }
                if split_px > orig.x && full {
                    let used = if split_px - orig.x < r.w { split_px - orig.x } else { r.w + 1 };
                    raster::frame(
                        frame,
                        orig.x,
                        orig.y - 1,
                        orig.x + used,
                        orig.bottom() + 1,
                        original_area_stroke(),
                    );
                }
            }

            if split_px < r.right() {
                let start = split_px.max(r.x);
                let rwidth = r.right() - start;
                raster::blit(frame, screenshot, Rect::new(start, r.y, rwidth, r.h), start, r.y);
                raster::frame(frame, start, y_start, r.right() + 1, y_end, shape_color(m.outcome));
            }
        }

        for area in self.areas.iter().filter(|a| a.kind.is_exclude()) {
            raster::fill_rect(frame, area.rect, exclude_fill());
            raster::frame(
                frame,
                area.rect.x,
                area.rect.y,
                area.rect.right(),
                area.rect.bottom(),
                exclude_stroke(),
            );
        }

        if needle.is_none() {
            for area in self.areas.iter().filter(|a| !a.kind.is_exclude()) {
                let r = area.rect;
                raster::frame(frame, r.x, r.y, r.right(), r.bottom(), original_area_stroke());
                if let (RegionKind::Ocr, Some(text)) = (area.kind, area.ocr_text()) {
                    raster::draw_centered_text(frame, r, text, raster::rgb(255, 255, 0));
                }
            }
            tracing::trace!(divide = self.divide, "diff frame drawn");
            return true;
        }

        let size = self.config.label_size;
        for m in &self.matches {
            let r = m.rect;
            if !(split > f64::from(r.x) && split < f64::from(r.right())) {
                continue;
            }
            let top = label_baseline(r, height, size as i32) - size as i32;

            let text = format!("{}%", m.similarity.round() as i64);
            let tw = raster::text_width(&text, size) as i32;
            if split_px + tw < r.right() {
                let tx = r.right() - tw - 1;
                let black = raster::rgb(0, 0, 0);
                raster::draw_outlined_text(frame, tx, top, &text, size, shape_color(m.outcome), black, 1);
            }

            if !full {
                let tw = raster::text_width("Needle", size) as i32;
                if r.x + tw < split_px {
                    let black = raster::rgb(0, 0, 0);
                    raster::draw_outlined_text(frame, r.x + 1, top, "Needle", size, needle_stroke(), black, 1);
                }
            }
        }

        raster::fill_rect(frame, Rect::new(split_px - 1, 0, 2, height), handle_color());
        tracing::trace!(divide = self.divide, "diff frame drawn");
        true
    }
}

/// Text baseline for the labels of a match: below the area, above it when that
/// runs off the bottom, inside it when that runs off the top.
fn label_baseline(r: Rect, height: i32, size: i32) -> i32 {
    let mut baseline = r.bottom() + 19;
    if baseline > height {
        baseline = r.y - 10;
    }
    if baseline < size {
        baseline = r.bottom() - 10;
    }
    baseline
}
