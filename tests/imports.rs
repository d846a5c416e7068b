// Module loading from disk and from memory

mod common;

use common::{lines, Harness};
use pretty_assertions::assert_eq;
use sable_core::{BufferSink, Config, ErrorKind, FileImportResolver, Interpreter};
use std::fs;
use std::sync::Arc;

#[test]
fn test_file_modules_resolve_under_the_import_root() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("geo")).unwrap();
    fs::write(
        root.path().join("geo").join("shapes.sbl"),
        "class Circle { var r = 0; Circle(r) { this.r = r; } fun diameter() { return this.r * 2; } }",
    )
    .unwrap();

    let sink = Arc::new(BufferSink::new());
    let config = Config {
        import_root: root.path().to_path_buf(),
        ..Config::default()
    };
    let mut interp = Interpreter::builder()
        .importer(Arc::new(FileImportResolver::new(root.path(), "sbl")))
        .config(config)
        .sink(sink.clone())
        .build();
    interp
        .run_source("import * from geo.shapes; print(new Circle(4).diameter());", "main.sbl")
        .unwrap();
    assert_eq!(sink.lines(), lines(&["8"]));
}

#[test]
fn test_default_importer_follows_config_root() {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("util.sbl"), "class Util { static fun twice(n) { return n * 2; } }").unwrap();

    let config = Config {
        import_root: root.path().to_path_buf(),
        ..Config::default()
    };
    let mut harness = Harness::with_config(config);
    let value = harness.run("import Util from util; Util.twice(21);").unwrap();
    assert_eq!(value.as_number(), Some(42.0));
}

#[test]
fn test_module_body_runs_once() {
    let mut harness = Harness::with_modules(&[("lib", "print(\"loading\"); class Lib { }")]);
    harness
        .run("import Lib from lib; import * from lib; print(typeOf(new Lib()));")
        .unwrap();
    assert_eq!(harness.output(), lines(&["loading", "Lib"]));
}

#[test]
fn test_import_failure_is_catchable() {
    let mut harness = Harness::with_modules(&[]);
    let value = harness
        .run("local kind = \"\"; try { import * from missing.module; } catch (e: ImportError) { kind = typeOf(e); } kind;")
        .unwrap();
    assert_eq!(value.as_str(), Some("ImportError"));
}

#[test]
fn test_module_globals_stay_private() {
    let mut harness = Harness::with_modules(&[("lib", "local hidden = 5; class Shown { fun get() { return hidden; } }")]);
    let value = harness.run("import Shown from lib; new Shown().get();").unwrap();
    assert_eq!(value.as_number(), Some(5.0));

    let error = harness.run("hidden;").unwrap_err();
    assert_eq!(error.kind, ErrorKind::NameError);
}
