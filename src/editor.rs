//! Needle editing session.
//!
//! [`NeedleEditor`] owns the live needle: regions (inside the shape canvas),
//! tags, properties and the suggested name. Every mutation re-serializes the
//! needle so [`NeedleEditor::serialized`] is always what a save would send.

use std::time::Instant;

use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::config::EditorConfig;
use crate::error::{NeedleError, Result};
use crate::loader::{Completed, LoadKind, LoadToken, LoadTracker, Loaded};
use crate::needle::{self, Candidate, Needle, Property};
use crate::region::{ClickPoint, Region};
use crate::shapes::{CanvasEvent, Cursor, EditKey, ShapeCanvas, ShapeId};

/// Canvas size used to show a load failure before any background arrived.
const MESSAGE_CANVAS: (u32, u32) = (1024, 768);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorState {
    Uninitialized,
    Loading,
    Ready,
    /// Ready with a pointer gesture in progress.
    Editing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionChange {
    Selected(ShapeId),
    Unselected,
}

pub struct NeedleEditor {
    config: EditorConfig,
    canvas: Option<ShapeCanvas>,
    /// Regions received before the first background created the canvas.
    pending_areas: Vec<Region>,
    tags: Vec<String>,
    properties: Vec<Property>,
    name: String,
    serialized: String,
    loads: LoadTracker,
    background_pending: bool,
    needle_pending: bool,
    selection_changes: Vec<SelectionChange>,
}

impl NeedleEditor {
    pub fn new(config: EditorConfig) -> Self {
        let mut editor = Self {
            config,
            canvas: None,
            pending_areas: Vec::new(),
            tags: Vec::new(),
            properties: Vec::new(),
            name: String::new(),
            serialized: String::new(),
            loads: LoadTracker::default(),
            background_pending: false,
            needle_pending: false,
            selection_changes: Vec::new(),
        };
        editor.serialize();
        editor
    }

    pub fn state(&self) -> EditorState {
        if self.background_pending || self.needle_pending {
            return EditorState::Loading;
        }
        match &self.canvas {
            None => EditorState::Uninitialized,
            Some(canvas) if canvas.is_busy() => EditorState::Editing,
            Some(_) => EditorState::Ready,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn canvas(&self) -> Option<&ShapeCanvas> {
        self.canvas.as_ref()
    }

    /// Pretty-printed needle document, always current.
    pub fn serialized(&self) -> &str {
        &self.serialized
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn regions(&self) -> Vec<Region> {
        match &self.canvas {
            Some(canvas) => canvas.regions().cloned().collect(),
            None => self.pending_areas.clone(),
        }
    }

    // ── Loading ─────────────────────────────────────────────────────────────

    /// Register a new load request; earlier requests of the same kind go stale.
    pub fn begin_load(&mut self, kind: LoadKind) -> LoadToken {
        match kind {
            LoadKind::Background => self.background_pending = true,
            LoadKind::Needle => self.needle_pending = true,
        }
        let token = self.loads.begin(kind);
        debug!(?token, "load requested");
        token
    }

    /// Apply a finished worker load. Returns false when it was superseded.
    pub fn apply(&mut self, completed: Completed) -> bool {
        match completed.loaded {
            Loaded::Background(result) => self.apply_background(completed.token, result),
            Loaded::Needle(result) => self.apply_needle(completed.token, result),
        }
    }

    fn check_current(&self, token: LoadToken) -> Result<()> {
        if self.loads.is_current(token) {
            Ok(())
        } else {
            Err(NeedleError::Superseded)
        }
    }

    /// First background creates the canvas; later ones swap the image and
    /// keep the regions.
    pub fn apply_background(&mut self, token: LoadToken, result: Result<RgbaImage>) -> bool {
        if let Err(err) = self.check_current(token) {
            debug!(?token, %err, "stale background discarded");
            return false;
        }
        self.background_pending = false;
        match result {
            Ok(image) => {
                let swap = self.canvas.is_some();
                let (width, height) = image.dimensions();
                info!(width, height, swap, "background loaded");
                self.ensure_canvas(width, height).set_background(Some(image));
            }
            Err(err) => self.show_error(&err),
        }
        self.settle();
        true
    }

    pub fn apply_needle(&mut self, token: LoadToken, result: Result<Needle>) -> bool {
        if let Err(err) = self.check_current(token) {
            debug!(?token, %err, "stale needle discarded");
            return false;
        }
        self.needle_pending = false;
        match result {
            Ok(needle) => self.replace_needle(needle),
            Err(err) => {
                self.show_error(&err);
                self.settle();
            }
        }
        true
    }

    /// Synchronous background swap, e.g. for an image already in memory.
    pub fn set_background(&mut self, image: RgbaImage) {
        let token = self.begin_load(LoadKind::Background);
        self.apply_background(token, Ok(image));
    }

    /// Replace the whole needle with already resolved data. Pending needle
    /// fetches are invalidated.
    pub fn load_needle(&mut self, needle: Needle) {
        self.loads.begin(LoadKind::Needle);
        self.needle_pending = false;
        self.replace_needle(needle);
    }

    fn replace_needle(&mut self, needle: Needle) {
        info!(areas = needle.area.len(), tags = needle.tags.len(), "needle loaded");
        self.tags = needle.tags;
        self.properties = needle.properties;
        if !needle.name.is_empty() {
            self.name = needle.name;
        }
        self.load_areas(needle.area);
    }

    fn ensure_canvas(&mut self, width: u32, height: u32) -> &mut ShapeCanvas {
        let config = &self.config;
        let pending = &mut self.pending_areas;
        self.canvas.get_or_insert_with(|| {
            let mut canvas = ShapeCanvas::new(width, height, config.clone());
            for region in pending.drain(..) {
                canvas.add_shape(region);
            }
            canvas.take_events();
            canvas
        })
    }

    fn show_error(&mut self, err: &NeedleError) {
        warn!(error = %err, "load failed");
        let (width, height) = MESSAGE_CANVAS;
        self.ensure_canvas(width, height)
            .set_message(Some(err.canvas_message()));
    }

    // ── Needle content ──────────────────────────────────────────────────────

    /// Replace only the regions, e.g. when switching to the match results.
    pub fn load_areas(&mut self, regions: Vec<Region>) {
        match self.canvas.as_mut() {
            Some(canvas) => {
                canvas.delete_shapes();
                for region in regions {
                    canvas.add_shape(region);
                }
            }
            None => self.pending_areas = regions,
        }
        self.settle();
    }

    pub fn load_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
        self.serialize();
    }

    pub fn load_property(&mut self, properties: Vec<Property>) {
        self.properties = properties;
        self.serialize();
    }

    /// Take tags, properties and suggested name from a selection entry.
    pub fn load_candidate_tags(&mut self, candidate: &Candidate) {
        self.tags = candidate.tags.clone();
        self.properties = candidate.properties.clone();
        self.name = if candidate.suggested_name.is_empty() {
            candidate.name.clone()
        } else {
            candidate.suggested_name.clone()
        };
        self.serialize();
    }

    pub fn load_candidate(&mut self, candidate: &Candidate, take_matches: bool) {
        self.load_candidate_tags(candidate);
        self.load_areas(candidate.display_areas(take_matches));
    }

    pub fn change_tag(&mut self, name: &str, enabled: bool) {
        if needle::change_tag(&mut self.tags, name, enabled) {
            self.serialize();
        }
    }

    pub fn change_property(&mut self, name: &str, enabled: bool) {
        if needle::change_property(&mut self.properties, name, enabled) {
            self.serialize();
        }
    }

    pub fn change_workaround_desc(&mut self, value: &str) -> bool {
        let changed = needle::set_workaround_desc(&mut self.properties, value);
        if changed {
            self.serialize();
        }
        changed
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Placeholder of the commit message field: `"<name> for <target>"`.
    pub fn commit_message_placeholder(&self, target: &str) -> String {
        format!("{} for {}", self.name, target)
    }

    // ── Region edits ────────────────────────────────────────────────────────

    fn target(&self) -> Option<&Region> {
        let canvas = self.canvas.as_ref()?;
        canvas.shape(canvas.target_index()?).map(|s| &s.region)
    }

    fn edit_target(&mut self, edit: impl FnOnce(&mut Region) -> bool) -> bool {
        let Some(canvas) = self.canvas.as_mut() else {
            return false;
        };
        let Some(idx) = canvas.target_index() else {
            return false;
        };
        let changed = canvas.region_mut(idx).map(edit).unwrap_or(false);
        if changed {
            self.serialize();
        }
        changed
    }

    pub fn has_target(&self) -> bool {
        self.target().is_some()
    }

    pub fn set_margin(&mut self, value: i32) -> bool {
        self.edit_target(|region| {
            region.margin = Some(value);
            true
        })
    }

    pub fn set_match(&mut self, value: f64) -> bool {
        self.edit_target(|region| {
            region.set_threshold(value);
            true
        })
    }

    pub fn margin_or_default(&self) -> i32 {
        self.target()
            .and_then(|r| r.margin)
            .unwrap_or(self.config.default_margin)
    }

    pub fn match_or_default(&self) -> f64 {
        self.target()
            .and_then(Region::threshold)
            .unwrap_or(self.config.default_match)
    }

    /// Remove the targeted region's click point, or put one at its center and
    /// clear every other region's. Returns the resulting click point.
    pub fn toggle_click_coordinates(&mut self) -> Option<ClickPoint> {
        let canvas = self.canvas.as_mut()?;
        let idx = canvas.target_index()?;
        let result = if canvas.shape(idx)?.region.click_point.is_some() {
            canvas.region_mut(idx)?.click_point = None;
            None
        } else {
            for other in (0..canvas.len()).filter(|&i| i != idx) {
                if let Some(region) = canvas.region_mut(other) {
                    region.click_point = None;
                }
            }
            let region = canvas.region_mut(idx)?;
            let point = ClickPoint::center_of(&region.rect);
            region.click_point = Some(point);
            Some(point)
        };
        self.serialize();
        result
    }

    pub fn current_click_coordinates(&self) -> Option<ClickPoint> {
        self.target().and_then(|r| r.click_point)
    }

    /// Label of the click point toggle.
    pub fn click_point_action(&self) -> &'static str {
        if self.current_click_coordinates().is_some() {
            "Remove"
        } else {
            "Add"
        }
    }

    // ── Canvas passthrough ──────────────────────────────────────────────────

    pub fn pointer_down(&mut self, x: i32, y: i32) {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.pointer_down(x, y);
        }
        self.sync();
    }

    pub fn pointer_move(&mut self, x: i32, y: i32) {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.pointer_move(x, y);
        }
        self.sync();
    }

    pub fn pointer_up(&mut self) {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.pointer_up();
        }
    }

    pub fn key(&mut self, key: EditKey) {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.key(key);
        }
        self.sync();
    }

    pub fn select(&mut self, index: usize) {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.select(index);
        }
        self.sync();
    }

    pub fn double_click(&mut self) -> bool {
        let toggled = self.canvas.as_mut().is_some_and(|c| c.double_click());
        self.sync();
        toggled
    }

    pub fn cursor_at(&self, x: i32, y: i32) -> Cursor {
        self.canvas
            .as_ref()
            .map_or(Cursor::Default, |c| c.cursor_at(x, y))
    }

    pub fn tick(&mut self, now: Instant) -> bool {
        self.canvas.as_mut().is_some_and(|c| c.tick(now))
    }

    pub fn draw(&mut self) -> bool {
        self.canvas.as_mut().is_some_and(|c| c.draw())
    }

    pub fn take_selection_changes(&mut self) -> Vec<SelectionChange> {
        std::mem::take(&mut self.selection_changes)
    }

    // ── Serialization ───────────────────────────────────────────────────────

    /// Drain canvas events; re-serialize when geometry or kinds changed.
    fn sync(&mut self) -> bool {
        let Some(canvas) = self.canvas.as_mut() else {
            return false;
        };
        let mut changed = false;
        for event in canvas.take_events() {
            match event {
                CanvasEvent::Selected(id) => self.selection_changes.push(SelectionChange::Selected(id)),
                CanvasEvent::Unselected => self.selection_changes.push(SelectionChange::Unselected),
                CanvasEvent::Created(_)
                | CanvasEvent::Changed(_)
                | CanvasEvent::KindChanged(_)
                | CanvasEvent::Deleted(_) => changed = true,
            }
        }
        if changed {
            self.serialize();
        }
        changed
    }

    fn settle(&mut self) {
        if !self.sync() {
            self.serialize();
        }
    }

    fn serialize(&mut self) {
        let text = match &self.canvas {
            Some(canvas) => needle::to_pretty_json(canvas.regions(), &self.tags, &self.properties),
            None => needle::to_pretty_json(&self.pending_areas, &self.tags, &self.properties),
        };
        match text {
            Ok(text) => self.serialized = text,
            Err(err) => warn!(error = %err, "needle serialization failed"),
        }
    }
}
