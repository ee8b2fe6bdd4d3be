use std::time::Duration;

use image::{Rgba, RgbaImage};

use needle_edit::config::EditorConfig;
use needle_edit::editor::{EditorState, NeedleEditor};
use needle_edit::loader::{LoadKind, Loader, Source};
use needle_edit::needle::Needle;
use needle_edit::region::{ClickPoint, Rect, RegionKind};
use needle_edit::save::SaveForm;
use needle_edit::shapes::EditKey;

fn write_background(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("screen.png");
    RgbaImage::from_pixel(100, 100, Rgba([30, 60, 90, 255]))
        .save(&path)
        .unwrap();
    path
}

fn load(editor: &mut NeedleEditor, loader: &Loader) {
    while editor.state() == EditorState::Loading {
        let done = loader
            .recv_timeout(Duration::from_secs(5))
            .expect("load did not finish");
        editor.apply(done);
    }
}

#[test]
fn full_editing_session_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let background = write_background(dir.path());
    let loader = Loader::new();
    let mut editor = NeedleEditor::new(EditorConfig::default());

    let bg = editor.begin_load(LoadKind::Background);
    loader.spawn_background(bg, Source::Path(background));
    let nd = editor.begin_load(LoadKind::Needle);
    loader.spawn_needle(nd, Source::Path(dir.path().join("new-needle.json")));
    load(&mut editor, &loader);

    assert_eq!(editor.state(), EditorState::Ready);
    assert_eq!(editor.serialized(), Needle::default().to_pretty_json().unwrap());

    // Create a region by dragging on empty canvas.
    editor.pointer_down(20, 20);
    editor.pointer_move(50, 45);
    editor.pointer_up();
    let needle = Needle::parse(editor.serialized()).unwrap();
    assert_eq!(needle.area.len(), 1);
    assert_eq!(needle.area[0].rect, Rect::new(20, 20, 30, 25));

    // Resize from the north-west corner beyond the canvas.
    editor.pointer_down(20, 20);
    editor.pointer_move(-50, -50);
    editor.pointer_up();
    let needle = Needle::parse(editor.serialized()).unwrap();
    assert_eq!(needle.area[0].rect, Rect::new(0, 0, 50, 45));

    // Second region through the keyboard, made an exclude area.
    editor.key(EditKey::Insert);
    editor.select(1);
    editor.double_click();

    editor.select(0);
    assert!(editor.set_match(91.0));
    assert!(editor.set_margin(30));
    assert_eq!(editor.toggle_click_coordinates(), Some(ClickPoint { x: 25.0, y: 22.5 }));
    editor.change_tag("installer", true);

    let needle = Needle::parse(editor.serialized()).unwrap();
    assert_eq!(needle.area.len(), 2);
    assert_eq!(needle.area[0].threshold(), Some(91.0));
    assert_eq!(needle.area[0].margin, Some(30));
    assert_eq!(needle.area[1].kind, RegionKind::Exclude);
    assert_eq!(needle.tags, vec!["installer".to_string()]);

    // The serialized text survives a save and loads back unchanged.
    let form = SaveForm::from_editor(&editor, false);
    assert!(form.validate().is_ok());
    let saved = dir.path().join("installer.json");
    form.write_json(&saved).unwrap();

    let mut reopened = NeedleEditor::new(EditorConfig::default());
    let nd = reopened.begin_load(LoadKind::Needle);
    loader.spawn_needle(nd, Source::Path(saved));
    load(&mut reopened, &loader);
    assert_eq!(reopened.serialized(), editor.serialized());
}

#[test]
fn click_point_stays_unique_across_toggles() {
    let mut editor = NeedleEditor::new(EditorConfig::default());
    editor.set_background(RgbaImage::new(200, 200));
    editor.load_needle(
        Needle::parse(
            r#"{"area": [
                {"xpos": 0, "ypos": 0, "width": 40, "height": 40, "type": "match"},
                {"xpos": 60, "ypos": 0, "width": 40, "height": 40, "type": "match"},
                {"xpos": 120, "ypos": 0, "width": 40, "height": 40, "type": "ocr"}
            ], "tags": ["a"]}"#,
        )
        .unwrap(),
    );

    for idx in [0, 1, 2, 1, 0, 0, 2] {
        editor.select(idx);
        editor.toggle_click_coordinates();
        let needle = Needle::parse(editor.serialized()).unwrap();
        let with_point = needle.area.iter().filter(|a| a.click_point.is_some()).count();
        assert!(with_point <= 1);
    }
}

#[test]
fn three_double_clicks_restore_match() {
    let mut editor = NeedleEditor::new(EditorConfig::default());
    editor.set_background(RgbaImage::new(50, 50));
    editor.key(EditKey::Insert);
    let kinds: Vec<&str> = (0..3)
        .map(|_| {
            editor.double_click();
            let needle = Needle::parse(editor.serialized()).unwrap();
            needle.area[0].kind.name()
        })
        .collect();
    assert_eq!(kinds, vec!["exclude", "ocr", "match"]);
}
