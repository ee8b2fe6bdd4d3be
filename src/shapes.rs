//! Region shape model and the pointer interaction engine.
//!
//! `ShapeCanvas` owns the ordered shapes of one needle together with the
//! select / drag / resize / create state machine. Coordinates are image
//! pixels. Every geometry mutation is reported through [`CanvasEvent`]s that
//! the owner drains with [`ShapeCanvas::take_events`], and repainting into the
//! frame buffer only happens when something marked the canvas dirty.

use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::config::{EditorConfig, SelectionFallback};
use crate::raster;
use crate::region::{ClickPoint, Rect, Region, RegionKind};

/// Stable identifier of a shape, independent of its position in the list.
pub type ShapeId = u64;

#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub id: ShapeId,
    pub region: Region,
}

// ── Resize zones ────────────────────────────────────────────────────────────

/// Nine-zone split of a shape used to pick the resize direction.
///
/// ```text
/// NW  N  NE
///  W  C  E
/// SW  S  SE
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeZone {
    NorthWest,
    North,
    NorthEast,
    West,
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
}

impl ResizeZone {
    /// Zone of `(px, py)` inside `rect`, `margin` pixels from each edge.
    pub fn classify(rect: &Rect, px: i32, py: i32, margin: i32) -> Self {
        let top = py - rect.y <= margin;
        let bottom = py >= rect.bottom() - margin;
        if px - rect.x <= margin {
            if top {
                ResizeZone::NorthWest
            } else if bottom {
                ResizeZone::SouthWest
            } else {
                ResizeZone::West
            }
        } else if px >= rect.right() - margin {
            if top {
                ResizeZone::NorthEast
            } else if bottom {
                ResizeZone::SouthEast
            } else {
                ResizeZone::East
            }
        } else if top {
            ResizeZone::North
        } else if bottom {
            ResizeZone::South
        } else {
            ResizeZone::Center
        }
    }

    fn west(self) -> bool {
        matches!(self, ResizeZone::NorthWest | ResizeZone::West | ResizeZone::SouthWest)
    }

    fn east(self) -> bool {
        matches!(self, ResizeZone::NorthEast | ResizeZone::East | ResizeZone::SouthEast)
    }

    fn north(self) -> bool {
        matches!(self, ResizeZone::NorthWest | ResizeZone::North | ResizeZone::NorthEast)
    }

    fn south(self) -> bool {
        matches!(self, ResizeZone::SouthWest | ResizeZone::South | ResizeZone::SouthEast)
    }

    /// Corner to grow a freshly created shape from, given where the pointer went.
    fn from_direction(rect: &Rect, px: i32, py: i32) -> Self {
        match (px < rect.x, py < rect.y) {
            (true, true) => ResizeZone::NorthWest,
            (true, false) => ResizeZone::SouthWest,
            (false, true) => ResizeZone::NorthEast,
            (false, false) => ResizeZone::SouthEast,
        }
    }
}

/// Pointer affordance for the current hover position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cursor {
    Default,
    Move,
    Resize(ResizeZone),
    ColResize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditKey {
    Delete,
    Insert,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CanvasEvent {
    Selected(ShapeId),
    Unselected,
    Created(ShapeId),
    Changed(ShapeId),
    KindChanged(ShapeId),
    Deleted(ShapeId),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Gesture {
    Idle,
    /// Pointer went down on empty canvas; a move turns this into a new shape.
    Pressed { x: i32, y: i32 },
    Dragging { off_x: i32, off_y: i32 },
    DraggingClickPoint { off_x: f64, off_y: f64 },
    Resizing(ResizeZone),
    /// New shape: the first move decides which corner follows the pointer.
    ResizingAuto,
}

pub type ShapeFactory = Box<dyn FnMut(i32, i32) -> Region>;

/// Fill color of a region on the editor canvas.
pub fn area_color(kind: &RegionKind) -> Rgba<u8> {
    match kind {
        RegionKind::Match => raster::rgba(0, 255, 0, 0.5),
        RegionKind::Exclude => raster::rgba(255, 0, 0, 0.5),
        RegionKind::Ocr => raster::rgba(255, 255, 0, 0.5),
    }
}

// ── Redraw ticker ───────────────────────────────────────────────────────────

/// Fixed-interval gate for repaint attempts.
#[derive(Clone, Debug)]
pub struct RedrawTicker {
    interval: Duration,
    last: Option<Instant>,
}

impl RedrawTicker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn due(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

// ── Canvas state ────────────────────────────────────────────────────────────

pub struct ShapeCanvas {
    config: EditorConfig,
    width: i32,
    height: i32,
    background: Option<RgbaImage>,
    message: Option<String>,
    shapes: Vec<Shape>,
    selection: Option<ShapeId>,
    gesture: Gesture,
    next_id: ShapeId,
    dirty: bool,
    frame: RgbaImage,
    ticker: RedrawTicker,
    events: Vec<CanvasEvent>,
    new_shape: Option<ShapeFactory>,
}

impl ShapeCanvas {
    pub fn new(width: u32, height: u32, config: EditorConfig) -> Self {
        let min = config.min_size;
        let ticker = RedrawTicker::new(config.redraw_interval);
        Self {
            config,
            width: width as i32,
            height: height as i32,
            background: None,
            message: None,
            shapes: Vec::new(),
            selection: None,
            gesture: Gesture::Idle,
            next_id: 1,
            dirty: true,
            frame: RgbaImage::new(width, height),
            ticker,
            events: Vec::new(),
            new_shape: Some(Box::new(move |x, y| {
                Region::new(Rect::new(x, y, min, min), RegionKind::Match)
            })),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    /// Replace the hook that builds a region for a drag on empty canvas.
    /// `None` disables creating shapes by dragging.
    pub fn set_new_shape_factory(&mut self, factory: Option<ShapeFactory>) {
        self.new_shape = factory;
    }

    pub fn background(&self) -> Option<&RgbaImage> {
        self.background.as_ref()
    }

    /// Swap the background; the canvas takes the image's size. Shapes are kept.
    pub fn set_background(&mut self, image: Option<RgbaImage>) {
        if let Some(img) = &image {
            if (img.width() as i32, img.height() as i32) != (self.width, self.height) {
                self.width = img.width() as i32;
                self.height = img.height() as i32;
                self.frame = RgbaImage::new(img.width(), img.height());
            }
        }
        self.background = image;
        self.message = None;
        self.dirty = true;
    }

    /// Text painted over the canvas, used for load failures.
    pub fn set_message(&mut self, message: Option<String>) {
        self.message = message;
        self.dirty = true;
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    // ── Shape list ──────────────────────────────────────────────────────────

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.shapes.iter().map(|s| &s.region)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn shape(&self, index: usize) -> Option<&Shape> {
        self.shapes.get(index)
    }

    pub fn index_of(&self, id: ShapeId) -> Option<usize> {
        self.shapes.iter().position(|s| s.id == id)
    }

    /// Mutable access to a region; the canvas is marked dirty.
    pub fn region_mut(&mut self, index: usize) -> Option<&mut Region> {
        self.dirty = true;
        self.shapes.get_mut(index).map(|s| &mut s.region)
    }

    /// Append a shape and return its index.
    pub fn add_shape(&mut self, region: Region) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.shapes.push(Shape { id, region });
        self.dirty = true;
        self.events.push(CanvasEvent::Created(id));
        debug!(id, index = self.shapes.len() - 1, "shape added");
        self.shapes.len() - 1
    }

    pub fn delete_shape_at(&mut self, index: usize) -> Option<Shape> {
        if index >= self.shapes.len() {
            return None;
        }
        let shape = self.shapes.remove(index);
        if self.selection == Some(shape.id) {
            self.selection = None;
            self.gesture = Gesture::Idle;
            self.events.push(CanvasEvent::Unselected);
        }
        self.events.push(CanvasEvent::Deleted(shape.id));
        self.dirty = true;
        debug!(id = shape.id, index, "shape deleted");
        Some(shape)
    }

    /// Remove every shape and drop the selection.
    pub fn delete_shapes(&mut self) {
        self.shapes.clear();
        self.selection = None;
        self.gesture = Gesture::Idle;
        self.events.push(CanvasEvent::Unselected);
        self.dirty = true;
    }

    pub fn selection(&self) -> Option<ShapeId> {
        self.selection
    }

    pub fn selection_index(&self) -> Option<usize> {
        self.selection.and_then(|id| self.index_of(id))
    }

    /// Index region-specific edits apply to, honouring the fallback policy.
    pub fn target_index(&self) -> Option<usize> {
        match (self.selection_index(), self.config.selection_fallback) {
            (Some(idx), _) => Some(idx),
            (None, SelectionFallback::FirstRegion) if !self.shapes.is_empty() => Some(0),
            _ => None,
        }
    }

    pub fn select(&mut self, index: usize) {
        if let Some(shape) = self.shapes.get(index) {
            self.selection = Some(shape.id);
            self.events.push(CanvasEvent::Selected(shape.id));
            self.dirty = true;
        }
    }

    pub fn redraw(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn take_events(&mut self) -> Vec<CanvasEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_busy(&self) -> bool {
        !matches!(self.gesture, Gesture::Idle)
    }

    // ── Hit testing ─────────────────────────────────────────────────────────

    /// Topmost shape containing the point.
    pub fn shape_at(&self, x: i32, y: i32) -> Option<usize> {
        self.shapes.iter().rposition(|s| s.region.rect.contains(x, y))
    }

    fn click_point_contains(&self, region: &Region, x: i32, y: i32) -> bool {
        let Some((cx, cy)) = region.absolute_click_point() else {
            return false;
        };
        let dx = cx - f64::from(x);
        let dy = cy - f64::from(y);
        (dx * dx + dy * dy).sqrt() < self.config.click_point_radius + self.config.click_point_slack
    }

    pub fn cursor_at(&self, x: i32, y: i32) -> Cursor {
        match self.shape_at(x, y) {
            Some(idx) => {
                let rect = self.shapes[idx].region.rect;
                match ResizeZone::classify(&rect, x, y, self.config.resize_margin) {
                    ResizeZone::Center => Cursor::Move,
                    zone => Cursor::Resize(zone),
                }
            }
            None => Cursor::Default,
        }
    }

    // ── Pointer and keyboard ────────────────────────────────────────────────

    pub fn pointer_down(&mut self, x: i32, y: i32) {
        if let Some(idx) = self.shape_at(x, y) {
            let shape = &self.shapes[idx];
            let (id, rect) = (shape.id, shape.region.rect);
            let off_x = x - rect.x;
            let off_y = y - rect.y;
            self.gesture = match ResizeZone::classify(&rect, x, y, self.config.resize_margin) {
                ResizeZone::Center => match shape.region.click_point {
                    Some(cp) if self.click_point_contains(&shape.region, x, y) => {
                        Gesture::DraggingClickPoint {
                            off_x: f64::from(off_x) - cp.x,
                            off_y: f64::from(off_y) - cp.y,
                        }
                    }
                    _ => Gesture::Dragging { off_x, off_y },
                },
                zone => Gesture::Resizing(zone),
            };
            self.selection = Some(id);
            self.events.push(CanvasEvent::Selected(id));
            self.dirty = true;
            return;
        }
        if self.selection.take().is_some() {
            self.events.push(CanvasEvent::Unselected);
            self.dirty = true;
        }
        self.gesture = Gesture::Pressed { x, y };
    }

    pub fn pointer_move(&mut self, x: i32, y: i32) {
        match self.gesture {
            Gesture::Idle => {}
            Gesture::Pressed { x: down_x, y: down_y } => self.create_at(down_x, down_y, x, y),
            Gesture::Dragging { off_x, off_y } => self.drag_to(x - off_x, y - off_y),
            Gesture::DraggingClickPoint { off_x, off_y } => {
                self.drag_click_point_to(f64::from(x) - off_x, f64::from(y) - off_y)
            }
            Gesture::Resizing(zone) => self.resize_to(zone, x, y),
            Gesture::ResizingAuto => {
                let Some(idx) = self.selection_index() else {
                    self.gesture = Gesture::Idle;
                    return;
                };
                let zone = ResizeZone::from_direction(&self.shapes[idx].region.rect, x, y);
                self.gesture = Gesture::Resizing(zone);
                self.resize_to(zone, x, y);
            }
        }
    }

    pub fn pointer_up(&mut self) {
        self.gesture = Gesture::Idle;
    }

    pub fn key(&mut self, key: EditKey) {
        match key {
            EditKey::Delete => {
                if let Some(idx) = self.selection_index() {
                    self.delete_shape_at(idx);
                }
            }
            EditKey::Insert => {
                let min = self.config.min_size;
                self.add_shape(Region::new(Rect::new(0, 0, min, min), RegionKind::Match));
            }
        }
    }

    /// Advance the kind of the targeted shape along match → exclude → ocr.
    pub fn double_click(&mut self) -> bool {
        let Some(idx) = self.target_index() else {
            return false;
        };
        let shape = &mut self.shapes[idx];
        shape.region.kind = shape.region.kind.next();
        self.events.push(CanvasEvent::KindChanged(shape.id));
        self.dirty = true;
        true
    }

    fn create_at(&mut self, down_x: i32, down_y: i32, x: i32, y: i32) {
        let Some(factory) = self.new_shape.as_mut() else {
            return;
        };
        let mut region = factory(down_x, down_y);
        region.rect.x = region.rect.x.clamp(0, (self.width - region.rect.w).max(0));
        region.rect.y = region.rect.y.clamp(0, (self.height - region.rect.h).max(0));
        let idx = self.add_shape(region);
        self.select(idx);
        self.gesture = Gesture::ResizingAuto;
        self.pointer_move(x, y);
    }

    fn drag_to(&mut self, x: i32, y: i32) {
        let Some(idx) = self.selection_index() else {
            return;
        };
        let (width, height) = (self.width, self.height);
        let shape = &mut self.shapes[idx];
        let rect = &mut shape.region.rect;
        rect.x = x.clamp(0, (width - rect.w).max(0));
        rect.y = y.clamp(0, (height - rect.h).max(0));
        self.events.push(CanvasEvent::Changed(shape.id));
        self.dirty = true;
    }

    fn drag_click_point_to(&mut self, abs_x: f64, abs_y: f64) {
        let Some(idx) = self.selection_index() else {
            return;
        };
        let shape = &mut self.shapes[idx];
        let rect = shape.region.rect;
        if shape.region.click_point.is_none() {
            return;
        }
        let point = ClickPoint {
            x: abs_x - f64::from(rect.x),
            y: abs_y - f64::from(rect.y),
        };
        shape.region.click_point = Some(point.clamped(rect.w, rect.h));
        self.events.push(CanvasEvent::Changed(shape.id));
        self.dirty = true;
    }

    fn resize_to(&mut self, zone: ResizeZone, x: i32, y: i32) {
        let Some(idx) = self.selection_index() else {
            return;
        };
        let min = self.config.min_size;
        let (width, height) = (self.width, self.height);
        let mx = x.clamp(0, width);
        let my = y.clamp(0, height);
        let shape = &mut self.shapes[idx];
        let r = &mut shape.region.rect;

        if zone.west() {
            let right = r.right();
            r.x = mx.min(right - min).max(0);
            r.w = right - r.x;
        }
        if zone.north() {
            let bottom = r.bottom();
            r.y = my.min(bottom - min).max(0);
            r.h = bottom - r.y;
        }
        if zone.east() {
            r.w = mx.max(r.x + min) - r.x;
        }
        if zone.south() {
            r.h = my.max(r.y + min) - r.y;
        }

        // Undersized regions grow to the minimum, then the whole rect is kept on the canvas.
        r.w = r.w.max(min).min(width);
        r.h = r.h.max(min).min(height);
        r.x = r.x.clamp(0, width - r.w);
        r.y = r.y.clamp(0, height - r.h);

        let (w, h) = (r.w, r.h);
        if let Some(cp) = shape.region.click_point {
            shape.region.click_point = Some(cp.clamped(w, h));
        }
        self.events.push(CanvasEvent::Changed(shape.id));
        self.dirty = true;
    }

    // ── Rendering ───────────────────────────────────────────────────────────

    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    /// Repaint if the ticker interval elapsed and something changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.ticker.due(now) && self.draw()
    }

    pub fn redraw_interval(&self) -> Duration {
        self.ticker.interval()
    }

    /// Repaint the frame buffer when dirty. Returns whether anything was drawn.
    pub fn draw(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        let selected = self.selection_index().map(|idx| self.shapes[idx].region.rect);
        let frame = &mut self.frame;
        raster::clear(frame, Rgba([0, 0, 0, 0]));
        if let Some(bg) = &self.background {
            raster::blit(frame, bg, Rect::new(0, 0, self.width, self.height), 0, 0);
        }

        for shape in &self.shapes {
            let region = &shape.region;
            if region.rect.is_off_canvas(self.width, self.height) {
                continue;
            }
            raster::fill_rect(frame, region.rect, area_color(&region.kind));
            if let Some((cx, cy)) = region.absolute_click_point() {
                let radius = self.config.click_point_radius;
                raster::fill_disc(frame, cx, cy, radius, raster::rgba(255, 255, 255, 0.8));
                raster::stroke_circle(frame, cx, cy, radius, raster::rgb(0, 0, 0));
            }
        }

        if let Some(r) = selected {
            let outline = Rect::new(r.x - 1, r.y - 1, r.w + 2, r.h + 2);
            raster::stroke_dashed_rect(frame, outline, raster::rgb(255, 255, 255), 10, 15);
        }

        if let Some(message) = &self.message {
            raster::draw_text(frame, 10, 30, message, 20.0, raster::rgb(0, 0, 0));
        }

        self.dirty = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> ShapeCanvas {
        ShapeCanvas::new(100, 100, EditorConfig::default())
    }

    fn with_region(x: i32, y: i32, w: i32, h: i32) -> ShapeCanvas {
        let mut cv = canvas();
        cv.add_shape(Region::new(Rect::new(x, y, w, h), RegionKind::Match));
        cv.take_events();
        cv
    }

    fn rect(cv: &ShapeCanvas, idx: usize) -> Rect {
        cv.shape(idx).unwrap().region.rect
    }

    #[test]
    fn add_shape_returns_its_index() {
        let mut cv = canvas();
        let r = Region::new(Rect::new(0, 0, 10, 10), RegionKind::Exclude);
        assert_eq!(cv.add_shape(r.clone()), 0);
        assert_eq!(cv.add_shape(r), 1);
        assert_ne!(cv.shape(0).unwrap().id, cv.shape(1).unwrap().id);
    }

    #[test]
    fn zones_cover_corners_edges_and_center() {
        let r = Rect::new(10, 10, 50, 50);
        assert_eq!(ResizeZone::classify(&r, 11, 12, 5), ResizeZone::NorthWest);
        assert_eq!(ResizeZone::classify(&r, 35, 10, 5), ResizeZone::North);
        assert_eq!(ResizeZone::classify(&r, 58, 11, 5), ResizeZone::NorthEast);
        assert_eq!(ResizeZone::classify(&r, 10, 35, 5), ResizeZone::West);
        assert_eq!(ResizeZone::classify(&r, 35, 35, 5), ResizeZone::Center);
        assert_eq!(ResizeZone::classify(&r, 60, 35, 5), ResizeZone::East);
        assert_eq!(ResizeZone::classify(&r, 12, 59, 5), ResizeZone::SouthWest);
        assert_eq!(ResizeZone::classify(&r, 35, 57, 5), ResizeZone::South);
        assert_eq!(ResizeZone::classify(&r, 60, 60, 5), ResizeZone::SouthEast);
    }

    #[test]
    fn cursor_reflects_zone_under_pointer() {
        let cv = with_region(10, 10, 50, 50);
        assert_eq!(cv.cursor_at(35, 35), Cursor::Move);
        assert_eq!(cv.cursor_at(10, 10), Cursor::Resize(ResizeZone::NorthWest));
        assert_eq!(cv.cursor_at(60, 35), Cursor::Resize(ResizeZone::East));
        assert_eq!(cv.cursor_at(90, 90), Cursor::Default);
    }

    #[test]
    fn topmost_shape_wins_hit_test() {
        let mut cv = with_region(0, 0, 50, 50);
        cv.add_shape(Region::new(Rect::new(20, 20, 50, 50), RegionKind::Exclude));
        assert_eq!(cv.shape_at(30, 30), Some(1));
        assert_eq!(cv.shape_at(5, 5), Some(0));
        assert_eq!(cv.shape_at(-5, 200), None);
        cv.pointer_down(30, 30);
        assert_eq!(cv.selection_index(), Some(1));
    }

    #[test]
    fn north_west_resize_grows_and_clamps_at_canvas_origin() {
        let mut cv = with_region(10, 10, 20, 20);
        cv.pointer_down(10, 10);
        cv.pointer_move(5, 5);
        assert_eq!(rect(&cv, 0), Rect::new(5, 5, 25, 25));
        cv.pointer_move(-50, -50);
        assert_eq!(rect(&cv, 0), Rect::new(0, 0, 30, 30));
        cv.pointer_up();
    }

    #[test]
    fn resize_never_goes_below_minimum_size() {
        let mut cv = with_region(10, 10, 40, 40);
        cv.pointer_down(10, 10);
        cv.pointer_move(90, 90);
        assert_eq!(rect(&cv, 0), Rect::new(40, 40, 10, 10));
        cv.pointer_up();

        cv.pointer_down(50, 50);
        cv.pointer_move(0, 0);
        assert_eq!(rect(&cv, 0), Rect::new(40, 40, 10, 10));
        cv.pointer_move(200, 200);
        assert_eq!(rect(&cv, 0), Rect::new(40, 40, 60, 60));
    }

    #[test]
    fn undersized_region_grows_inside_canvas_on_resize() {
        let mut cv = with_region(0, 0, 5, 5);
        cv.pointer_down(0, 0);
        cv.pointer_move(0, 0);
        assert_eq!(rect(&cv, 0), Rect::new(0, 0, 10, 10));
        cv.pointer_up();

        let mut cv = with_region(95, 95, 5, 5);
        cv.pointer_down(99, 99);
        cv.pointer_move(100, 100);
        assert_eq!(rect(&cv, 0), Rect::new(90, 90, 10, 10));
        cv.pointer_up();

        let mut cv = with_region(92, 40, 8, 20);
        cv.pointer_down(99, 50);
        cv.pointer_move(100, 50);
        assert_eq!(rect(&cv, 0), Rect::new(90, 40, 10, 20));
    }

    #[test]
    fn drag_keeps_shape_inside_canvas() {
        let mut cv = with_region(40, 40, 20, 20);
        cv.pointer_down(50, 50);
        for (x, y) in [(0, 0), (-100, 300), (500, -20), (70, 70)] {
            cv.pointer_move(x, y);
            let r = rect(&cv, 0);
            assert!(r.x >= 0 && r.y >= 0 && r.right() <= 100 && r.bottom() <= 100);
        }
        assert_eq!(rect(&cv, 0), Rect::new(60, 60, 20, 20));
    }

    #[test]
    fn every_move_reports_a_change() {
        let mut cv = with_region(40, 40, 20, 20);
        cv.pointer_down(50, 50);
        cv.pointer_move(51, 50);
        cv.pointer_move(52, 50);
        let id = cv.shape(0).unwrap().id;
        let changes = cv
            .take_events()
            .into_iter()
            .filter(|e| *e == CanvasEvent::Changed(id))
            .count();
        assert_eq!(changes, 2);
    }

    #[test]
    fn dragging_on_empty_canvas_creates_a_shape() {
        let mut cv = canvas();
        cv.pointer_down(20, 20);
        assert!(cv.is_empty());
        cv.pointer_move(50, 40);
        assert_eq!(cv.len(), 1);
        assert_eq!(cv.selection_index(), Some(0));
        assert_eq!(rect(&cv, 0), Rect::new(20, 20, 30, 20));
        cv.pointer_move(10, 10);
        assert_eq!(rect(&cv, 0), Rect::new(20, 20, 10, 10));
        cv.pointer_up();
        assert_eq!(cv.shape(0).unwrap().region.kind.name(), "match");
    }

    #[test]
    fn new_shape_grows_towards_pointer_direction() {
        let mut cv = canvas();
        cv.pointer_down(50, 50);
        cv.pointer_move(30, 70);
        assert_eq!(rect(&cv, 0), Rect::new(30, 50, 30, 20));
    }

    #[test]
    fn click_on_empty_canvas_without_move_creates_nothing() {
        let mut cv = with_region(0, 0, 10, 10);
        cv.pointer_down(5, 5);
        cv.pointer_up();
        cv.take_events();
        cv.pointer_down(50, 50);
        cv.pointer_up();
        assert_eq!(cv.len(), 1);
        assert_eq!(cv.selection_index(), None);
        assert_eq!(cv.take_events(), vec![CanvasEvent::Unselected]);
    }

    #[test]
    fn disabled_factory_prevents_creation() {
        let mut cv = canvas();
        cv.set_new_shape_factory(None);
        cv.pointer_down(20, 20);
        cv.pointer_move(40, 40);
        assert!(cv.is_empty());
    }

    #[test]
    fn click_point_drag_moves_only_the_point() {
        let mut cv = with_region(20, 20, 40, 40);
        cv.region_mut(0).unwrap().click_point = Some(ClickPoint { x: 20.0, y: 20.0 });
        cv.pointer_down(42, 41);
        cv.pointer_move(47, 51);
        let region = &cv.shape(0).unwrap().region;
        assert_eq!(region.rect, Rect::new(20, 20, 40, 40));
        assert_eq!(region.click_point, Some(ClickPoint { x: 25.0, y: 30.0 }));
        cv.pointer_move(500, -500);
        let region = &cv.shape(0).unwrap().region;
        assert_eq!(region.click_point, Some(ClickPoint { x: 40.0, y: 0.0 }));
    }

    #[test]
    fn delete_key_removes_selection_and_unselects() {
        let mut cv = with_region(0, 0, 20, 20);
        cv.add_shape(Region::new(Rect::new(50, 50, 20, 20), RegionKind::Exclude));
        cv.pointer_down(60, 60);
        cv.pointer_up();
        cv.take_events();
        cv.key(EditKey::Delete);
        assert_eq!(cv.len(), 1);
        assert_eq!(cv.selection_index(), None);
        assert_eq!(cv.take_events()[0], CanvasEvent::Unselected);
        cv.key(EditKey::Delete);
        assert_eq!(cv.len(), 1);
    }

    #[test]
    fn insert_key_adds_minimum_region_at_origin() {
        let mut cv = canvas();
        cv.key(EditKey::Insert);
        assert_eq!(rect(&cv, 0), Rect::new(0, 0, 10, 10));
    }

    #[test]
    fn deleting_keeps_selection_pointing_at_same_shape() {
        let mut cv = with_region(0, 0, 20, 20);
        cv.add_shape(Region::new(Rect::new(50, 50, 20, 20), RegionKind::Exclude));
        cv.select(1);
        cv.delete_shape_at(0);
        assert_eq!(cv.selection_index(), Some(0));
        assert!(cv.shape(0).unwrap().region.kind.is_exclude());
    }

    #[test]
    fn double_click_cycles_kind() {
        let mut cv = with_region(0, 0, 20, 20);
        cv.select(0);
        let names: Vec<_> = (0..3)
            .map(|_| {
                cv.double_click();
                cv.shape(0).unwrap().region.kind.name()
            })
            .collect();
        assert_eq!(names, vec!["exclude", "ocr", "match"]);
    }

    #[test]
    fn fallback_policy_targets_first_region() {
        let cv = with_region(0, 0, 20, 20);
        assert_eq!(cv.target_index(), Some(0));
        let config = EditorConfig {
            selection_fallback: SelectionFallback::None,
            ..EditorConfig::default()
        };
        let mut strict = ShapeCanvas::new(100, 100, config);
        strict.add_shape(Region::new(Rect::new(0, 0, 20, 20), RegionKind::Match));
        assert_eq!(strict.target_index(), None);
        assert!(!strict.double_click());
    }

    #[test]
    fn draw_only_repaints_when_dirty() {
        let mut cv = with_region(0, 0, 20, 20);
        assert!(cv.draw());
        assert!(!cv.draw());
        cv.pointer_down(10, 10);
        cv.pointer_move(11, 11);
        cv.pointer_move(12, 12);
        assert!(cv.draw());
        assert!(!cv.draw());
        cv.redraw();
        assert!(cv.draw());
    }

    #[test]
    fn tick_respects_interval() {
        let mut cv = with_region(0, 0, 20, 20);
        let start = Instant::now();
        assert!(cv.tick(start));
        cv.redraw();
        assert!(!cv.tick(start + Duration::from_millis(5)));
        assert!(cv.tick(start + Duration::from_millis(40)));
    }

    #[test]
    fn draw_fills_regions_with_kind_color() {
        let mut cv = with_region(0, 0, 20, 20);
        cv.draw();
        let px = cv.frame().get_pixel(5, 5);
        assert!(px[1] > 100 && px[0] == 0);
    }

    #[test]
    fn background_swap_keeps_shapes_and_adopts_size() {
        let mut cv = with_region(0, 0, 20, 20);
        cv.set_background(Some(RgbaImage::new(200, 150)));
        assert_eq!(cv.size(), (200, 150));
        assert_eq!(cv.len(), 1);
        assert_eq!(cv.frame().dimensions(), (200, 150));
    }
}
