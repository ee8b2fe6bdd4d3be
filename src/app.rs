//! eframe windows for the editor and the diff viewer.

use std::time::Instant;

use eframe::egui;
use egui_extras::{Column, TableBuilder};
use image::RgbaImage;
use tracing::{info, warn};

use crate::diff::{DiffMode, NeedleDiff};
use crate::editor::{EditorState, NeedleEditor, SelectionChange};
use crate::loader::{LoadKind, Loader, Source};
use crate::needle::{Candidate, WORKAROUND_PROPERTY};
use crate::save::{FollowUp, SaveForm, SaveOutcome, WORKAROUND_CONFIRMATION};
use crate::shapes::{Cursor, EditKey, ResizeZone};

const TITLE: &str = "needle-edit";

fn cursor_icon(cursor: Cursor) -> egui::CursorIcon {
    match cursor {
        Cursor::Default => egui::CursorIcon::Default,
        Cursor::Move => egui::CursorIcon::Move,
        Cursor::ColResize => egui::CursorIcon::ResizeColumn,
        Cursor::Resize(zone) => match zone {
            ResizeZone::NorthWest => egui::CursorIcon::ResizeNorthWest,
            ResizeZone::North => egui::CursorIcon::ResizeNorth,
            ResizeZone::NorthEast => egui::CursorIcon::ResizeNorthEast,
            ResizeZone::West => egui::CursorIcon::ResizeWest,
            ResizeZone::Center => egui::CursorIcon::Move,
            ResizeZone::East => egui::CursorIcon::ResizeEast,
            ResizeZone::SouthWest => egui::CursorIcon::ResizeSouthWest,
            ResizeZone::South => egui::CursorIcon::ResizeSouth,
            ResizeZone::SouthEast => egui::CursorIcon::ResizeSouthEast,
        },
    }
}

fn upload(ctx: &egui::Context, texture: &mut Option<egui::TextureHandle>, name: &str, image: &RgbaImage) {
    let size = [image.width() as usize, image.height() as usize];
    let pixels = image.as_flat_samples();
    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
    match texture {
        Some(tex) => tex.set(color_image, egui::TextureOptions::NEAREST),
        None => *texture = Some(ctx.load_texture(name, color_image, egui::TextureOptions::NEAREST)),
    }
}

fn confirm(text: &str) -> bool {
    rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Warning)
        .set_title(TITLE)
        .set_description(text)
        .set_buttons(rfd::MessageButtons::YesNo)
        .show()
        == rfd::MessageDialogResult::Yes
}

// ── Pan & zoom ──────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
struct View {
    pan: egui::Vec2,
    zoom: f32,
}

impl Default for View {
    fn default() -> Self {
        Self {
            pan: egui::Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl View {
    fn image_to_screen(&self, canvas_rect: egui::Rect, image_size: egui::Vec2, img_pos: egui::Pos2) -> egui::Pos2 {
        canvas_rect.center() + self.pan + (img_pos.to_vec2() - image_size * 0.5) * self.zoom
    }

    fn screen_to_image(&self, canvas_rect: egui::Rect, image_size: egui::Vec2, screen_pos: egui::Pos2) -> egui::Pos2 {
        let rel = screen_pos - canvas_rect.center() - self.pan;
        (rel / self.zoom + image_size * 0.5).to_pos2()
    }

    fn image_rect(&self, canvas_rect: egui::Rect, image_size: egui::Vec2) -> egui::Rect {
        egui::Rect::from_min_max(
            self.image_to_screen(canvas_rect, image_size, egui::Pos2::ZERO),
            self.image_to_screen(canvas_rect, image_size, image_size.to_pos2()),
        )
    }

    /// Middle mouse pans, scroll zooms around the pointer. Returns true while panning.
    fn handle_input(&mut self, ctx: &egui::Context, response: &egui::Response, canvas_rect: egui::Rect) -> bool {
        let (middle_down, delta, scroll) = ctx.input(|i| {
            (i.pointer.middle_down(), i.pointer.delta(), i.smooth_scroll_delta.y)
        });
        if middle_down {
            self.pan += delta;
        }
        if scroll != 0.0 && response.hovered() {
            let new_zoom = (self.zoom * (1.0 + scroll * 0.002)).clamp(0.1, 10.0);
            if let Some(cursor) = response.hover_pos() {
                let cursor_rel = cursor - canvas_rect.center() - self.pan;
                self.pan -= cursor_rel * (new_zoom / self.zoom - 1.0);
            }
            self.zoom = new_zoom;
        }
        middle_down
    }
}

// ── Editor window ───────────────────────────────────────────────────────────

pub struct EditorOptions {
    pub background: Source,
    pub needle: Option<Source>,
    pub candidates: Vec<Candidate>,
    pub save_url: Option<String>,
    /// What the needle is created for, shown in the commit message placeholder.
    pub target: String,
}

pub struct EditorApp {
    editor: NeedleEditor,
    loader: Loader,
    candidates: Vec<Candidate>,
    candidate: usize,
    take_matches: bool,
    save_url: Option<String>,
    target: String,
    texture: Option<egui::TextureHandle>,
    view: View,
    new_tag: String,
    margin: i32,
    threshold: f64,
    workaround_desc: String,
    overwrite: bool,
    status: Option<String>,
}

impl EditorApp {
    pub fn new(editor: NeedleEditor, loader: Loader, options: EditorOptions) -> Self {
        let margin = editor.config().default_margin;
        let threshold = editor.config().default_match;
        let mut app = Self {
            editor,
            loader,
            candidates: options.candidates,
            candidate: 0,
            take_matches: false,
            save_url: options.save_url,
            target: options.target,
            texture: None,
            view: View::default(),
            new_tag: String::new(),
            margin,
            threshold,
            workaround_desc: String::new(),
            overwrite: false,
            status: None,
        };
        app.load_background(options.background);
        match options.needle {
            Some(needle) => app.load_needle(needle),
            None if !app.candidates.is_empty() => app.apply_candidate(),
            None => {}
        }
        app
    }

    fn load_background(&mut self, source: Source) {
        let token = self.editor.begin_load(LoadKind::Background);
        self.loader.spawn_background(token, source);
    }

    fn load_needle(&mut self, source: Source) {
        let token = self.editor.begin_load(LoadKind::Needle);
        self.loader.spawn_needle(token, source);
    }

    fn apply_candidate(&mut self) {
        let Some(candidate) = self.candidates.get(self.candidate).cloned() else {
            return;
        };
        self.editor.load_candidate(&candidate, self.take_matches);
        self.workaround_desc = candidate
            .workaround()
            .and_then(|p| p.value.clone())
            .unwrap_or_default();
        if !candidate.image_url.is_empty() {
            self.load_background(Source::parse(&candidate.image_url));
        }
    }

    fn save_json_dialog(&mut self) {
        let file_name = match self.editor.name() {
            "" => "needle.json".to_string(),
            name => format!("{}.json", name),
        };
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .set_file_name(file_name)
            .save_file()
        else {
            return;
        };
        let form = SaveForm::from_editor(&self.editor, self.overwrite);
        self.status = Some(match form.write_json(&path) {
            Ok(()) => format!("Saved {}", path.display()),
            Err(err) => {
                warn!(error = %err, "writing needle JSON failed");
                format!("Unable to save: {}", err)
            }
        });
    }

    fn submit(&mut self) {
        let Some(url) = self.save_url.clone() else {
            return;
        };
        let mut form = SaveForm::from_editor(&self.editor, self.overwrite);
        if let Err(err) = form.validate() {
            self.status = Some(err.to_string());
            return;
        }
        if form.needs_workaround_confirmation() && !confirm(WORKAROUND_CONFIRMATION) {
            return;
        }
        loop {
            let outcome = match form.submit(&url) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(error = %err, "save request failed");
                    self.status = Some(err.to_string());
                    return;
                }
            };
            match outcome {
                SaveOutcome::Saved { message, follow_up } => {
                    info!(name = %form.name, "needle saved");
                    self.status = Some(match follow_up {
                        Some(FollowUp::LiveView { job_id }) => format!("{} - back to live view of job {}", message, job_id),
                        Some(FollowUp::Restart { url }) => format!("{} - restart job: {}", message, url),
                        None => message,
                    });
                }
                SaveOutcome::Failed { message } => self.status = Some(message),
                SaveOutcome::NeedsOverwrite { name } => {
                    if !form.overwrite && confirm(&format!("Sure to overwrite {}?", name)) {
                        form.overwrite = true;
                        continue;
                    }
                }
            }
            return;
        }
    }

    fn state_label(&self) -> &'static str {
        match self.editor.state() {
            EditorState::Uninitialized => "No image",
            EditorState::Loading => "Loading…",
            EditorState::Ready => "Ready",
            EditorState::Editing => "Editing",
        }
    }

    fn toolbar_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(self.state_label());
            ui.separator();
            ui.label("Name:");
            let mut name = self.editor.name().to_string();
            if ui.text_edit_singleline(&mut name).changed() {
                self.editor.set_name(&name);
            }

            if !self.candidates.is_empty() {
                ui.separator();
                let before = (self.candidate, self.take_matches);
                let selected = self.candidates[self.candidate].name.clone();
                egui::ComboBox::from_label("Areas")
                    .selected_text(if selected.is_empty() { "screenshot".to_string() } else { selected })
                    .show_ui(ui, |ui| {
                        for (idx, candidate) in self.candidates.iter().enumerate() {
                            let label = if candidate.name.is_empty() { "screenshot" } else { candidate.name.as_str() };
                            ui.selectable_value(&mut self.candidate, idx, label);
                        }
                    });
                ui.checkbox(&mut self.take_matches, "Take matches");
                if before != (self.candidate, self.take_matches) {
                    self.apply_candidate();
                }
            }

            ui.separator();
            if ui.button("Save JSON…").clicked() {
                self.save_json_dialog();
            }
            if self.save_url.is_some() {
                ui.checkbox(&mut self.overwrite, "Overwrite");
                if ui.button("Save").clicked() {
                    self.submit();
                }
            }
            ui.separator();
            ui.label(format!("Zoom: {:.0}%", self.view.zoom * 100.0));
        });
        let placeholder = self.editor.commit_message_placeholder(&self.target);
        ui.label(egui::RichText::new(placeholder).weak());
        if let Some(status) = &self.status {
            ui.label(status);
        }
    }

    fn tags_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Tags");
        let mut removed = None;
        for tag in self.editor.tags() {
            let mut enabled = true;
            if ui.checkbox(&mut enabled, tag.as_str()).changed() {
                removed = Some(tag.clone());
            }
        }
        if let Some(tag) = removed {
            self.editor.change_tag(&tag, false);
        }
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut self.new_tag);
            if ui.button("Add").clicked() && !self.new_tag.trim().is_empty() {
                let tag = self.new_tag.trim().to_string();
                self.editor.change_tag(&tag, true);
                self.new_tag.clear();
            }
        });
    }

    fn properties_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Properties");
        let mut workaround = self
            .editor
            .properties()
            .iter()
            .any(|p| p.name == WORKAROUND_PROPERTY);
        if ui.checkbox(&mut workaround, "Workaround").changed() {
            self.editor.change_property(WORKAROUND_PROPERTY, workaround);
            if workaround && !self.workaround_desc.is_empty() {
                self.editor.change_workaround_desc(&self.workaround_desc);
            }
        }
        if workaround {
            ui.label("Reason:");
            if ui.text_edit_singleline(&mut self.workaround_desc).lost_focus() {
                self.editor.change_workaround_desc(&self.workaround_desc);
            }
        }
    }

    fn region_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Region");
        ui.add_enabled_ui(self.editor.has_target(), |ui| {
            ui.horizontal(|ui| {
                ui.label("Margin");
                ui.add(egui::DragValue::new(&mut self.margin).range(0..=500));
                if ui.button("Set").clicked() {
                    self.editor.set_margin(self.margin);
                }
            });
            ui.horizontal(|ui| {
                ui.label("Match");
                ui.add(egui::DragValue::new(&mut self.threshold).range(0.0..=100.0).suffix("%"));
                if ui.button("Set").clicked() {
                    self.editor.set_match(self.threshold);
                }
            });
            let label = format!("{} click point", self.editor.click_point_action());
            if ui.button(label).clicked() {
                self.editor.toggle_click_coordinates();
            }
            if let Some(cp) = self.editor.current_click_coordinates() {
                ui.label(format!("Click point: {:.1}, {:.1}", cp.x, cp.y));
            }
        });
    }

    fn table_ui(&mut self, ui: &mut egui::Ui) {
        let regions = self.editor.regions();
        let selected = self.editor.canvas().and_then(|c| c.selection_index());
        let mut clicked = None;
        TableBuilder::new(ui)
            .striped(true)
            .sense(egui::Sense::click())
            .column(Column::auto())
            .column(Column::auto())
            .column(Column::remainder())
            .column(Column::auto())
            .column(Column::auto())
            .header(18.0, |mut header| {
                for title in ["#", "Type", "Geometry", "Match", "Margin"] {
                    header.col(|ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|mut body| {
                for (idx, region) in regions.iter().enumerate() {
                    body.row(18.0, |mut row| {
                        row.set_selected(selected == Some(idx));
                        row.col(|ui| {
                            ui.label(idx.to_string());
                        });
                        row.col(|ui| {
                            ui.label(region.kind.name());
                        });
                        row.col(|ui| {
                            let r = region.rect;
                            ui.label(format!("{}x{}+{}+{}", r.w, r.h, r.x, r.y));
                        });
                        row.col(|ui| {
                            ui.label(region.threshold().map(|t| format!("{:.0}%", t)).unwrap_or_default());
                        });
                        row.col(|ui| {
                            ui.label(region.margin.map(|m| m.to_string()).unwrap_or_default());
                        });
                        if row.response().clicked() {
                            clicked = Some(idx);
                        }
                    });
                }
            });
        if let Some(idx) = clicked {
            self.editor.select(idx);
        }
    }

    fn canvas_ui(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let canvas_rect = response.rect;
        painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));

        let Some((width, height)) = self.editor.canvas().map(|c| c.size()) else {
            painter.text(
                canvas_rect.center(),
                egui::Align2::CENTER_CENTER,
                self.state_label(),
                egui::FontId::proportional(18.0),
                egui::Color32::LIGHT_GRAY,
            );
            return;
        };
        let image_size = egui::vec2(width as f32, height as f32);
        if let Some(tex) = &self.texture {
            painter.image(
                tex.id(),
                self.view.image_rect(canvas_rect, image_size),
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }

        if self.view.handle_input(ctx, &response, canvas_rect) {
            return;
        }

        let (pressed, down, released, pos) = ctx.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_down(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
            )
        });
        if let Some(pos) = pos {
            let img = self.view.screen_to_image(canvas_rect, image_size, pos);
            let (x, y) = (img.x.floor() as i32, img.y.floor() as i32);
            if pressed && response.hovered() {
                self.editor.pointer_down(x, y);
            } else if down {
                self.editor.pointer_move(x, y);
            }
            if response.hovered() {
                ctx.set_cursor_icon(cursor_icon(self.editor.cursor_at(x, y)));
            }
        }
        if released {
            self.editor.pointer_up();
        }
        if response.double_clicked() {
            self.editor.double_click();
        }
    }
}

impl eframe::App for EditorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Some(done) = self.loader.try_recv() {
            self.editor.apply(done);
        }
        for change in self.editor.take_selection_changes() {
            if let SelectionChange::Selected(_) = change {
                self.margin = self.editor.margin_or_default();
                self.threshold = self.editor.match_or_default();
            }
        }

        let typing = ctx.memory(|m| m.focused().is_some());
        if !typing {
            let (delete, insert) = ctx.input(|i| (i.key_pressed(egui::Key::Delete), i.key_pressed(egui::Key::Insert)));
            if delete {
                self.editor.key(EditKey::Delete);
            }
            if insert {
                self.editor.key(EditKey::Insert);
            }
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar_ui(ui));

        egui::SidePanel::right("needle").min_width(280.0).show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.tags_ui(ui);
                ui.separator();
                self.properties_ui(ui);
                ui.separator();
                self.region_ui(ui);
                ui.separator();
                self.table_ui(ui);
                ui.separator();
                ui.collapsing("JSON", |ui| {
                    let mut text = self.editor.serialized();
                    ui.add(
                        egui::TextEdit::multiline(&mut text)
                            .code_editor()
                            .desired_width(f32::INFINITY),
                    );
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| self.canvas_ui(ctx, ui));

        if self.editor.tick(Instant::now()) {
            if let Some(canvas) = self.editor.canvas() {
                upload(ctx, &mut self.texture, "needle-canvas", canvas.frame());
            }
        }
        ctx.request_repaint_after(self.editor.config().redraw_interval);
    }
}

// ── Diff window ─────────────────────────────────────────────────────────────

pub struct DiffApp {
    diff: NeedleDiff,
    texture: Option<egui::TextureHandle>,
    dirty: bool,
}

impl DiffApp {
    pub fn new(diff: NeedleDiff) -> Self {
        Self {
            diff,
            texture: None,
            dirty: true,
        }
    }

    fn toolbar_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let mut divide = self.diff.divide();
            if ui
                .add(egui::Slider::new(&mut divide, 0.0..=1.0).text("Divide"))
                .changed()
            {
                self.diff.set_divide(divide);
                self.dirty = true;
            }
            ui.separator();
            let mut mode = self.diff.mode();
            ui.radio_value(&mut mode, DiffMode::AreaOnly, "Areas");
            ui.add_enabled_ui(self.diff.has_needle(), |ui| {
                ui.radio_value(&mut mode, DiffMode::Full, "Full needle");
            });
            if mode != self.diff.mode() {
                self.diff.set_mode(mode);
                self.dirty = true;
            }
        });
    }

    fn canvas_ui(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let (width, height) = self.diff.size();
        let available = ui.available_size();
        let scale = (available.x / width as f32).min(available.y / height as f32);
        let display = egui::vec2(width as f32, height as f32) * scale;
        let (rect, response) = ui.allocate_exact_size(display, egui::Sense::click_and_drag());
        if let Some(tex) = &self.texture {
            ui.painter().image(
                tex.id(),
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }

        let (pressed, down, released, pos) = ctx.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_down(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
            )
        });
        if let Some(pos) = pos {
            let x = self
                .diff
                .to_canvas_x(f64::from(pos.x - rect.min.x), f64::from(rect.width()));
            if pressed && response.hovered() {
                self.diff.pointer_down(x);
            }
            let cursor = if down && self.diff.is_dragging() {
                self.dirty = true;
                self.diff.pointer_move(x)
            } else {
                self.diff.cursor_at(x)
            };
            if response.hovered() || self.diff.is_dragging() {
                ctx.set_cursor_icon(cursor_icon(cursor));
            }
        }
        if released {
            self.diff.pointer_up();
        }
    }
}

impl eframe::App for DiffApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar_ui(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.canvas_ui(ctx, ui));
        if self.dirty {
            upload(ctx, &mut self.texture, "needle-diff", self.diff.frame());
            self.dirty = false;
        }
    }
}
