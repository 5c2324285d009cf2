//! Stylesheet discovery and loading.
//!
//! Covers `<link>` and `@import` resolution, cross-origin sheets and the
//! filesystem loader.

use std::fs;

use csspipe::{Engine, FsLoader, MemoryLoader, RenderOptions, StylesheetLoader};
use tempfile::TempDir;

fn body_of(engine: &Engine) -> String {
    let dom = engine.dom();
    let body = dom.find_by_tag("body").expect("document has a body");
    csspipe::dom::serialize_children(dom, body)
}

#[test]
fn test_imports_run_before_importing_sheet() {
    let loader = MemoryLoader::new()
        .with("css/base.css", "@import 'parts/item.css'; .list { --body: (<i class=\"item\"></i>) }")
        .with("css/parts/item.css", ".item { --body: (${el.parentElement.className}) }");
    let mut engine = Engine::new(
        r#"<link rel="stylesheet" href="css/base.css">
        <style>.list { --script: (el.setAttribute("data-last", "inline")) }</style>
        <div class="list"></div>"#,
    )
    .with_loader(loader);

    let report = engine.render().unwrap();

    let selectors: Vec<&str> = engine.rules().iter().map(|r| r.selector_text()).collect();
    assert_eq!(selectors, [".item", ".list", ".list"]);
    assert_eq!(report.rules, 3);
    assert_eq!(
        body_of(&engine).trim(),
        r#"<div class="list" data-last="inline"><i class="item">list</i></div>"#
    );
}

#[test]
fn test_cross_origin_sheets_contribute_no_rules() {
    let mut loader = MemoryLoader::new();
    loader
        .insert("local.css", "@import 'https://cdn.example/theme.css'; p { --body: (local) }")
        .insert_cross_origin("https://cdn.example/theme.css")
        .insert_cross_origin("https://cdn.example/app.css");
    let mut engine = Engine::new(
        r#"<link rel="stylesheet" href="https://cdn.example/app.css">
        <link rel="stylesheet" href="local.css">
        <p></p>"#,
    )
    .with_loader(loader);

    let report = engine.render().unwrap();

    assert_eq!(report.rules, 1);
    assert!(!report.has_errors());
    assert_eq!(body_of(&engine).trim(), "<p>local</p>");

    let sheets = engine.stylesheets();
    assert_eq!(sheets.len(), 2);
    assert!(sheets[0].is_restricted());
}

#[test]
fn test_missing_and_circular_imports_are_skipped() {
    let loader = MemoryLoader::new()
        .with("a.css", "@import 'b.css'; @import 'gone.css'; .a { --body: (a) }")
        .with("b.css", "@import 'a.css'; .b { --body: (b) }");
    let mut engine = Engine::new(
        r#"<link rel="stylesheet" href="a.css"><p class="a"></p><p class="b"></p>"#,
    )
    .with_loader(loader);

    engine.render().unwrap();

    let selectors: Vec<&str> = engine.rules().iter().map(|r| r.selector_text()).collect();
    assert_eq!(selectors, [".b", ".a"]);
}

#[test]
fn test_fs_loader_reads_relative_to_root() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::create_dir_all(dir.path().join("css")).unwrap();
    fs::write(dir.path().join("css/site.css"), "@import '../shared.css';").unwrap();
    fs::write(dir.path().join("shared.css"), "h1 { --body: (shared) }").unwrap();

    let loader = FsLoader::new(dir.path());

    assert_eq!(loader.load("shared.css").unwrap(), "h1 { --body: (shared) }");
    assert!(loader.load("../outside.css").is_err());
    assert!(matches!(
        loader.load("https://example.com/x.css"),
        Err(csspipe::LoadError::CrossOrigin(_))
    ));
}

#[test]
fn test_open_renders_file_with_linked_sheets() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::create_dir_all(dir.path().join("css")).unwrap();
    fs::write(dir.path().join("css/site.css"), "@import '../shared.css';").unwrap();
    fs::write(
        dir.path().join("shared.css"),
        "h1 { --data: json({\"t\": \"café\"}); --body: (${data.t}) }",
    )
    .unwrap();
    fs::write(
        dir.path().join("index.html"),
        r#"<html><head><link rel="stylesheet" href="css/site.css"></head><body><h1></h1></body></html>"#,
    )
    .unwrap();

    let mut engine = Engine::open(dir.path().join("index.html"), RenderOptions::default()).unwrap();
    engine.render().unwrap();

    assert_eq!(body_of(&engine), "<h1>café</h1>");
}

#[test]
fn test_open_decodes_declared_charset() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut bytes = b"<meta charset=\"windows-1252\"><style>p { --body: (${el.textContent.length}) }</style><p>".to_vec();
    bytes.push(0xE9);
    bytes.extend_from_slice(b"</p>");
    fs::write(dir.path().join("latin.html"), bytes).unwrap();

    let mut engine = Engine::open(dir.path().join("latin.html"), RenderOptions::default()).unwrap();
    engine.render().unwrap();

    assert!(engine.html().contains("<p>1</p>"));
}

#[test]
fn test_open_missing_file_is_io_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let err = Engine::open(dir.path().join("nope.html"), RenderOptions::default()).unwrap_err();
    assert!(matches!(err, csspipe::Error::Io(_)));
}
