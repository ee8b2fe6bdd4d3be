use serde::{Deserialize, Serialize, Serializer};

use crate::error::NeedleError;

// ── Geometry ────────────────────────────────────────────────────────────────

/// Axis-aligned rectangle in image pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    /// Edges are inclusive on both sides.
    pub fn contains(&self, px: i32, py: i32) -> bool {
        self.x <= px && self.right() >= px && self.y <= py && self.bottom() >= py
    }

    /// True when no pixel of the rectangle lies on a `width` x `height` canvas.
    pub fn is_off_canvas(&self, width: i32, height: i32) -> bool {
        self.x > width || self.y > height || self.right() < 0 || self.bottom() < 0
    }
}

/// Click position relative to the top-left corner of its region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClickPoint {
    pub x: f64,
    pub y: f64,
}

impl ClickPoint {
    /// Geometric center of `rect`, relative to its corner.
    pub fn center_of(rect: &Rect) -> Self {
        Self {
            x: f64::from(rect.w) / 2.0,
            y: f64::from(rect.h) / 2.0,
        }
    }

    /// Keep the point inside a `w` x `h` region.
    pub fn clamped(self, w: i32, h: i32) -> Self {
        Self {
            x: self.x.clamp(0.0, f64::from(w.max(0))),
            y: self.y.clamp(0.0, f64::from(h.max(0))),
        }
    }
}

// ── Region kinds ────────────────────────────────────────────────────────────

/// What a region means to the matcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionKind {
    /// Pixel-compared area.
    Match,
    /// Ignored area.
    Exclude,
    /// Area compared by recognized text instead of pixels.
    Ocr,
}

impl RegionKind {
    pub fn name(&self) -> &'static str {
        match self {
            RegionKind::Match => "match",
            RegionKind::Exclude => "exclude",
            RegionKind::Ocr => "ocr",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "match" => Some(RegionKind::Match),
            "exclude" => Some(RegionKind::Exclude),
            "ocr" => Some(RegionKind::Ocr),
            _ => None,
        }
    }

    /// Deterministic cycle used by the double-click toggle: match → exclude → ocr → match.
    pub fn next(&self) -> Self {
        match self {
            RegionKind::Match => RegionKind::Exclude,
            RegionKind::Exclude => RegionKind::Ocr,
            RegionKind::Ocr => RegionKind::Match,
        }
    }

    pub fn is_exclude(&self) -> bool {
        matches!(self, RegionKind::Exclude)
    }
}

// ── Region ──────────────────────────────────────────────────────────────────

/// One needle area. Threshold and OCR text are kept whatever the kind is,
/// so toggling the kind never loses them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AreaRecord", into = "AreaRecord")]
pub struct Region {
    pub rect: Rect,
    pub kind: RegionKind,
    pub margin: Option<i32>,
    pub click_point: Option<ClickPoint>,
    threshold: Option<f64>,
    text: Option<String>,
}

impl Region {
    pub fn new(rect: Rect, kind: RegionKind) -> Self {
        Self {
            rect,
            kind,
            margin: None,
            click_point: None,
            threshold: None,
            text: None,
        }
    }

    /// Required similarity in percent.
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn set_threshold(&mut self, value: f64) {
        self.threshold = Some(value.clamp(0.0, 100.0));
    }

    pub fn ocr_text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn with_ocr_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Absolute canvas position of the click point.
    pub fn absolute_click_point(&self) -> Option<(f64, f64)> {
        self.click_point
            .map(|cp| (f64::from(self.rect.x) + cp.x, f64::from(self.rect.y) + cp.y))
    }
}

// ── Wire format ─────────────────────────────────────────────────────────────

/// Whole numbers are written without a fraction so `80` stays `80`.
fn number<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        s.serialize_i64(*value as i64)
    } else {
        s.serialize_f64(*value)
    }
}

fn optional_number<S: Serializer>(value: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => number(v, s),
        None => s.serialize_none(),
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct ClickRecord {
    #[serde(serialize_with = "number")]
    xpos: f64,
    #[serde(serialize_with = "number")]
    ypos: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct AreaRecord {
    xpos: i32,
    ypos: i32,
    width: i32,
    height: i32,
    #[serde(rename = "type")]
    kind: String,
    #[serde(
        rename = "match",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "optional_number"
    )]
    threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    margin: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    click_point: Option<ClickRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refstr: Option<String>,
}

impl TryFrom<AreaRecord> for Region {
    type Error = NeedleError;

    fn try_from(rec: AreaRecord) -> Result<Self, Self::Error> {
        if rec.width < 0 || rec.height < 0 {
            return Err(NeedleError::InvalidRegion(format!(
                "negative size {}x{}",
                rec.width, rec.height
            )));
        }
        let kind = RegionKind::parse(&rec.kind).ok_or_else(|| {
            NeedleError::InvalidRegion(format!("unknown area type '{}'", rec.kind))
        })?;
        Ok(Region {
            rect: Rect::new(rec.xpos, rec.ypos, rec.width, rec.height),
            kind,
            margin: rec.margin,
            click_point: rec.click_point.map(|c| ClickPoint {
                x: c.xpos,
                y: c.ypos,
            }),
            threshold: rec.threshold,
            text: rec.refstr,
        })
    }
}

impl From<Region> for AreaRecord {
    fn from(region: Region) -> Self {
        AreaRecord {
            xpos: region.rect.x,
            ypos: region.rect.y,
            width: region.rect.w,
            height: region.rect.h,
            kind: region.kind.name().to_string(),
            threshold: region.threshold,
            margin: region.margin,
            click_point: region.click_point.map(|c| ClickRecord {
                xpos: c.x,
                ypos: c.y,
            }),
            refstr: region.text,
        }
    }
}
