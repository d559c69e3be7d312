//! Metadata accessors, EXIF editing, and the rename/metadata interplay.

use std::path::Path;

use graphix::{
    Interpreter,
    backend::{
        DynamicCodec, ExifIfd, ExifMetadataBackend, ImageCodec, MetadataBackend, NoMetadataBackend, OsFileSystem,
        tags,
    },
    io::CollectDiag,
};
use image::{Rgb, RgbImage};
use serde_json::{Value as Json, json};

fn interpreter() -> Interpreter<DynamicCodec, ExifMetadataBackend, OsFileSystem, CollectDiag> {
    Interpreter::new(DynamicCodec, ExifMetadataBackend, OsFileSystem, CollectDiag::new())
}

fn program(statements: Vec<Json>) -> Json {
    json!({"Type": "ProgramNode", "Statements": statements})
}

fn write_jpg(path: &Path, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, Rgb([50, 60, 70])).save(path).unwrap();
}

fn declare(identifier: &str, path: &Path) -> Json {
    json!({"Type": "ImageDeclaration", "Identifier": identifier, "Path": path.to_str().unwrap()})
}

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

#[test]
fn metadata_reads_width_height_name_size() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("a.png");
    RgbImage::from_pixel(32, 20, Rgb([1, 2, 3])).save(&input).unwrap();

    let mut interp = interpreter();
    let meta = |kind: &str| {
        json!({
            "Type": "Assignment",
            "Identifier": kind.to_lowercase(),
            "Value": {"Type": "Metadata", "ImageIdentifier": "img", "MetadataType": kind},
        })
    };
    let doc = program(vec![
        declare("img", &input),
        meta("FWIDTH"),
        meta("FHEIGHT"),
        meta("FNAME"),
        meta("FSIZE"),
    ]);
    interp.interpret(&doc).unwrap();

    let value = |name: &str| interp.env().get(name).unwrap().value.clone().unwrap();
    assert_eq!(value("fwidth").as_int(), Some(32));
    assert_eq!(value("fheight").as_int(), Some(20));
    assert_eq!(value("fname").as_str(), Some("a.png"));
    assert!(value("fsize").as_int().unwrap() > 0);
}

#[test]
fn fsize_is_zero_after_source_deletion() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("gone.png");
    write_jpg(&input, 4, 4);

    let mut interp = interpreter();
    interp.interpret(&program(vec![declare("img", &input)])).unwrap();
    std::fs::remove_file(&input).unwrap();
    let doc = program(vec![json!({
        "Type": "Assignment",
        "Identifier": "size",
        "Value": {"Type": "Metadata", "ImageIdentifier": "img", "MetadataType": "FSIZE"},
    })]);
    interp.interpret(&doc).unwrap();
    assert_eq!(interp.env().get("size").unwrap().value.as_ref().unwrap().as_int(), Some(0));
}

#[test]
fn add_metadata_survives_export_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("m.jpg");
    write_jpg(&input, 10, 10);
    let out = dir.path().join("out");

    let mut interp = interpreter();
    let doc = program(vec![
        declare("img", &input),
        json!({"Type": "AddMetadata", "ImageIdentifier": "img", "MetadataType": "TITLE", "Value": "Holiday"}),
        json!({"Type": "AddMetadata", "ImageIdentifier": "img", "MetadataType": "COPYRIGHT", "Value": "me 2026"}),
        json!({"Type": "Export", "ImageIdentifier": "img", "DestinationPath": format!("{}/", out.display())}),
    ]);
    interp.interpret(&doc).unwrap();

    let exported = out.join("m.jpg");
    let reloaded = DynamicCodec.open(&exported).unwrap();
    let blob = reloaded.exif.expect("exported JPEG carries EXIF");
    let dict = ExifMetadataBackend.load(&blob).unwrap();
    assert_eq!(
        dict.get(ExifIfd::Tiff, tags::XP_TITLE),
        Some(&graphix::backend::ExifValue::Byte(utf16le("Holiday")))
    );
    assert!(dict.get(ExifIfd::Tiff, tags::COPYRIGHT).is_some());

    // the edits are recorded on the binding as well
    let log = &interp.env().image("img").unwrap().metadata_log;
    assert_eq!(log.get("TITLE").map(String::as_str), Some("Holiday"));
}

#[test]
fn strip_all_round_trip_leaves_no_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("s.jpg");
    write_jpg(&input, 10, 10);
    let staged = dir.path().join("staged");
    let cleaned = dir.path().join("cleaned");

    // first pass: produce a JPEG that actually has EXIF
    let mut interp = interpreter();
    let doc = program(vec![
        declare("img", &input),
        json!({"Type": "AddMetadata", "ImageIdentifier": "img", "MetadataType": "TITLE", "Value": "secret"}),
        json!({"Type": "Export", "ImageIdentifier": "img", "DestinationPath": format!("{}/", staged.display())}),
    ]);
    interp.interpret(&doc).unwrap();
    let staged_file = staged.join("s.jpg");
    assert!(DynamicCodec.open(&staged_file).unwrap().exif.is_some());

    // second pass: strip everything and re-export
    let mut interp = interpreter();
    let doc = program(vec![
        declare("img", &staged_file),
        json!({"Type": "StripMetadata", "ImageIdentifier": "img", "StripAll": true}),
        json!({"Type": "Export", "ImageIdentifier": "img", "DestinationPath": format!("{}/", cleaned.display())}),
    ]);
    interp.interpret(&doc).unwrap();

    let reloaded = DynamicCodec.open(&cleaned.join("s.jpg")).unwrap();
    assert_eq!(reloaded.exif, None);
}

#[test]
fn selective_strip_drops_gps_but_keeps_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("g.jpg");
    write_jpg(&input, 8, 8);

    // stage a file carrying both GPS and a title
    let backend = ExifMetadataBackend;
    let mut dict = graphix::backend::ExifDict::new();
    dict.set(ExifIfd::Tiff, tags::XP_TITLE, graphix::backend::ExifValue::Byte(utf16le("T")));
    dict.set(ExifIfd::Gps, 0x0001, graphix::backend::ExifValue::ascii("N"));
    let mut handle = DynamicCodec.open(&input).unwrap();
    handle.exif = Some(backend.dump(&dict).unwrap());
    DynamicCodec
        .save(&handle, &input, graphix::ast::ImageFormat::Jpg)
        .unwrap();

    let mut interp = interpreter();
    let doc = program(vec![
        declare("img", &input),
        json!({
            "Type": "StripMetadata",
            "ImageIdentifier": "img",
            "StripAll": false,
            "MetadataTypes": ["GPS"],
        }),
    ]);
    interp.interpret(&doc).unwrap();

    let image = interp.env().image("img").unwrap();
    let dict = backend.load(image.handle.exif.as_deref().unwrap()).unwrap();
    assert!(dict.get(ExifIfd::Gps, 0x0001).is_none());
    assert!(dict.get(ExifIfd::Tiff, tags::XP_TITLE).is_some());
    assert_eq!(
        image.metadata_log.get("stripped_GPS").map(String::as_str),
        Some("true")
    );
}

#[test]
fn degraded_backend_still_strips_by_reencoding() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("d.jpg");
    write_jpg(&input, 8, 8);

    let mut interp = Interpreter::new(DynamicCodec, NoMetadataBackend, OsFileSystem, CollectDiag::new());
    let doc = program(vec![
        declare("img", &input),
        json!({"Type": "AddMetadata", "ImageIdentifier": "img", "MetadataType": "TAGS", "Value": "x"}),
        json!({"Type": "StripMetadata", "ImageIdentifier": "img", "StripAll": true}),
    ]);
    interp.interpret(&doc).unwrap();

    assert!(interp.diagnostics().contains("metadata backend unavailable"));
    let image = interp.env().image("img").unwrap();
    assert_eq!(image.handle.exif, None);
    // the log records the requested edit even without a backend
    assert_eq!(image.metadata_log.get("TAGS").map(String::as_str), Some("x"));
}

#[test]
fn rename_with_metadata_term_uses_the_image_width() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("r.png");
    RgbImage::from_pixel(77, 10, Rgb([1, 1, 1])).save(&input).unwrap();

    let mut interp = interpreter();
    let doc = program(vec![
        declare("img", &input),
        json!({
            "Type": "Rename",
            "ImageIdentifier": "img",
            "Terms": [
                {"Type": "STRING", "StringValue": "w"},
                {"MetadataValue": {"ImageIdentifier": "img", "MetadataType": "FWIDTH"}},
            ],
        }),
    ]);
    interp.interpret(&doc).unwrap();
    assert_eq!(
        interp.env().image("img").unwrap().filename.as_deref(),
        Some("w77.png")
    );
}

#[test]
fn rename_counters_continue_across_statements() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("one.png");
    let second = dir.path().join("two.png");
    write_jpg(&first, 4, 4);
    write_jpg(&second, 4, 4);

    let mut interp = interpreter();
    let rename = |id: &str| {
        json!({
            "Type": "Rename",
            "ImageIdentifier": id,
            "Terms": [{"Type": "STRING", "StringValue": "n"}, {"Type": "COUNTER"}],
        })
    };
    let doc = program(vec![
        declare("a", &first),
        declare("b", &second),
        rename("a"),
        rename("b"),
        rename("a"),
    ]);
    interp.interpret(&doc).unwrap();

    // strictly increasing counter values in evaluation order
    assert_eq!(interp.env().image("b").unwrap().filename.as_deref(), Some("n1.png"));
    assert_eq!(interp.env().image("a").unwrap().filename.as_deref(), Some("n2.png"));
}
