use std::io::Cursor;

use inkdeck::fonts::FontFace;
use inkdeck::scene::surface::{HeadlessSurface, SurfaceChange};
use inkdeck::selection::clipboard::MemoryClipboard;
use inkdeck::{
    Command, Editor, EditorConfig, ElementKind, Element, FileAttachment, FileId, FileStore, Rect,
    Snapshot,
};

type TestEditor = Editor<HeadlessSurface, MemoryClipboard>;

fn editor() -> TestEditor {
    Editor::new(
        EditorConfig::default(),
        HeadlessSurface::default(),
        MemoryClipboard::new(),
    )
}

fn png(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Drop an image placeholder on the live slide and attach `png` to it.
fn attach_picture(ed: &mut TestEditor) {
    let mut els = ed.surface().elements.clone();
    els.push(Element::image("pic", Rect::new(0.0, 0.0, 1.0, 1.0), None));
    let mut files = FileStore::new();
    let id = FileId::new("f-pic");
    files.insert(id.clone(), FileAttachment::from_bytes(id, "image/png", &png(7, 5), 10));
    let outcome = ed
        .on_surface_change(SurfaceChange::new(els).with_files(files))
        .unwrap();
    assert_eq!(outcome.bound, Some(FileId::new("f-pic")));
}

#[test]
fn bound_image_is_probed_and_survives_a_round_trip() {
    let mut ed = editor();
    attach_picture(&mut ed);
    assert_eq!(ed.wait_probes(), 1);

    let pic = ed
        .document()
        .current_slide()
        .elements
        .iter()
        .find(|e| e.id == "pic")
        .unwrap()
        .clone();
    assert_eq!((pic.width, pic.height), (7.0, 5.0));
    assert_eq!(
        pic.kind,
        ElementKind::Image {
            file_id: Some(FileId::new("f-pic"))
        }
    );

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pictures.inkdeck");
    ed.dispatch(Command::Save(path.clone())).unwrap();

    let mut other = editor();
    other.dispatch(Command::Open(path)).unwrap();
    assert_eq!(other.document().slides(), ed.document().slides());
    assert!(other.document().files().contains_key(&FileId::new("f-pic")));
    assert_eq!(other.surface().elements, other.document().current_slide().elements);
}

#[test]
fn export_drops_unused_files_and_fonts() {
    let mut ed = editor();
    let used = ed
        .fonts_mut()
        .add_face("Caveat", FontFace::new("data:font/woff2;base64,AAAA"))
        .unwrap();
    ed.fonts_mut()
        .add_face("Unused Sans", FontFace::new("https://fonts.example/unused.woff2"))
        .unwrap();

    let mut els = ed.surface().elements.clone();
    els.push(Element::text("t", Rect::new(10.0, 10.0, 200.0, 40.0), "hello", used));
    let mut files = FileStore::new();
    let orphan = FileId::new("orphan");
    files.insert(
        orphan.clone(),
        FileAttachment::from_bytes(orphan.clone(), "image/png", &png(1, 1), 1),
    );
    ed.on_surface_change(SurfaceChange::new(els).with_files(files).with_selection(["t"]))
        .unwrap();
    assert!(ed.document().files().contains_key(&orphan));

    let snap: Snapshot = ed.snapshot();
    assert!(snap.document.files.is_empty());
    let families: Vec<_> = snap.fonts.custom_fonts.keys().cloned().collect();
    assert_eq!(families, vec!["Caveat".to_owned()]);
}

#[test]
fn corrupt_snapshot_leaves_the_session_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.inkdeck");
    std::fs::write(&path, r#"{"name":"x","document":{"slides":[]}}"#).unwrap();

    let mut ed = editor();
    ed.dispatch(Command::AddSlide).unwrap();
    let before = ed.snapshot();
    assert!(ed.dispatch(Command::Open(path)).is_err());
    assert_eq!(ed.snapshot(), before);
}

#[test]
fn repeated_ids_from_the_surface_keep_the_snapshot_importable() {
    let mut ed = editor();
    let mut els = ed.surface().elements.clone();
    let rect = Element::rectangle("r1", Rect::new(10.0, 10.0, 50.0, 40.0));
    els.push(rect.clone());
    els.push(rect);
    let outcome = ed
        .on_surface_change(SurfaceChange::new(els).with_selection(["r1"]))
        .unwrap();
    assert!(outcome.rejected);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dupes.inkdeck");
    ed.dispatch(Command::Save(path.clone())).unwrap();
    let mut other = editor();
    other.dispatch(Command::Open(path)).unwrap();
    assert_eq!(other.document().slides(), ed.document().slides());
}
