//! End-to-end scans of a small GObject library.
//!
//! Each test writes a minimal `GObject-2.0.gir` and a runtime dump into a
//! scratch directory, builds the scan unit in code, and inspects the GIR.

use girscan_core::annotation::RawComment;
use girscan_core::ast::Include;
use girscan_core::dump::DumpSource;
use girscan_core::scanner::{CTypeKind, SourceType, Symbol, SymbolKind};
use girscan_core::{Pipeline, ScanError, ScanOptions, ScanUnit, WarningCode, WarningConfig};
use std::path::Path;
use tempfile::TempDir;

const GOBJECT_GIR: &str = r#"<?xml version="1.0"?>
<repository version="1.2" xmlns="http://www.gtk.org/introspection/core/1.0" xmlns:c="http://www.gtk.org/introspection/c/1.0" xmlns:glib="http://www.gtk.org/introspection/glib/1.0">
  <namespace name="GObject" version="2.0" shared-library="libgobject-2.0.so.0" c:identifier-prefixes="G" c:symbol-prefixes="g">
    <class name="Object" c:symbol-prefix="object" c:type="GObject" glib:type-name="GObject" glib:get-type="g_object_get_type"/>
    <class name="InitiallyUnowned" c:symbol-prefix="initially_unowned" c:type="GInitiallyUnowned" parent="Object" glib:type-name="GInitiallyUnowned" glib:get-type="g_initially_unowned_get_type"/>
  </namespace>
</repository>
"#;

fn dump(parents: &str) -> String {
    format!(
        "<dump>\n  <class name=\"FooWidget\" get-type=\"foo_widget_get_type\" parents=\"{}\"/>\n</dump>\n",
        parents
    )
}

fn member(name: &str, source: SourceType) -> Symbol {
    Symbol::new(SymbolKind::Member, name).with_type(source)
}

fn function(ident: &str, ret: SourceType, params: Vec<Symbol>, line: u32) -> Symbol {
    Symbol::new(SymbolKind::Function, ident)
        .with_type(SourceType::function(ret, params))
        .at("foo-widget.h", line)
}

fn widget_ptr() -> SourceType {
    SourceType::pointer(SourceType::typedef("FooWidget"))
}

fn comment(text: &str, line: u32) -> RawComment {
    RawComment {
        text: text.to_string(),
        filename: "foo-widget.c".to_string(),
        line,
    }
}

fn widget_unit() -> ScanUnit {
    let mut instance = SourceType::new(CTypeKind::Struct, Some("_FooWidget"));
    instance.child_list = vec![member("parent_instance", SourceType::typedef("GObject"))];
    ScanUnit {
        symbols: vec![
            Symbol::new(SymbolKind::Typedef, "FooWidget")
                .with_type(SourceType::new(CTypeKind::Struct, Some("_FooWidget")))
                .at("foo-widget.h", 5),
            Symbol::new(SymbolKind::Struct, "_FooWidget")
                .with_type(instance)
                .at("foo-widget.h", 7),
            function("foo_widget_get_type", SourceType::typedef("GType"), Vec::new(), 12),
            function("foo_widget_new", widget_ptr(), Vec::new(), 14),
            function(
                "foo_widget_set_name",
                SourceType::void(),
                vec![
                    member("widget", widget_ptr()),
                    member("name", SourceType::pointer(SourceType::basic("char").constant())),
                ],
                16,
            ),
        ],
        comments: vec![
            comment("/**\n * foo_widget_new:\n *\n * Creates a widget.\n *\n * Returns: a new #FooWidget\n */", 20),
            comment(
                "/**\n * foo_widget_set_name:\n * @widget: a #FooWidget\n * @name: the new name\n *\n * Sets the name.\n *\n * Since: 1.2\n */",
                40,
            ),
        ],
    }
}

fn write_fixtures(dir: &Path, parents: &str) {
    std::fs::write(dir.join("GObject-2.0.gir"), GOBJECT_GIR).unwrap();
    std::fs::write(dir.join("dump.xml"), dump(parents)).unwrap();
}

fn options(dir: &Path) -> ScanOptions {
    let mut options = ScanOptions::new("Foo", "1.0");
    options.includes = vec![Include::new("GObject", "2.0")];
    options.include_paths = vec![dir.to_path_buf()];
    options.dump = Some(DumpSource::File(dir.join("dump.xml")));
    options.warnings = WarningConfig::all();
    options
}

fn scan(parents: &str) -> String {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path(), parents);
    Pipeline::new(options(dir.path()))
        .run(&widget_unit())
        .expect("scan failed")
        .gir
}

/// The `<return-value>` line of the element starting with `open`
fn return_value_of<'a>(gir: &'a str, open: &str) -> &'a str {
    let start = gir.find(open).unwrap_or_else(|| panic!("{} not found", open));
    let rest = &gir[start..];
    let ret = rest.find("<return-value").unwrap();
    rest[ret..].lines().next().unwrap()
}

// ────────────────────────────────────────────────────────────────────────────
// Constructors and methods
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_widget_becomes_class() {
    let gir = scan("GObject");
    assert!(gir.contains("<include name=\"GObject\" version=\"2.0\"/>"));
    assert!(gir.contains("<class name=\"Widget\""));
    assert!(gir.contains("parent=\"GObject.Object\""));
    assert!(gir.contains("glib:get-type=\"foo_widget_get_type\""));
    assert!(!gir.contains("c:identifier=\"foo_widget_get_type\""));
}

#[test]
fn test_constructor_of_object_subclass_transfers_full() {
    let gir = scan("GObject");
    assert!(gir.contains("<constructor name=\"new\" c:identifier=\"foo_widget_new\">"));
    let ret = return_value_of(&gir, "<constructor name=\"new\"");
    assert!(ret.contains("transfer-ownership=\"full\""), "{}", ret);
}

#[test]
fn test_constructor_of_initially_unowned_subclass_transfers_none() {
    let gir = scan("GInitiallyUnowned,GObject");
    assert!(gir.contains("parent=\"GObject.InitiallyUnowned\""));
    let ret = return_value_of(&gir, "<constructor name=\"new\"");
    assert!(ret.contains("transfer-ownership=\"none\""), "{}", ret);
}

#[test]
fn test_set_name_becomes_method() {
    let gir = scan("GObject");
    let start = gir
        .find("<method name=\"set_name\" c:identifier=\"foo_widget_set_name\" version=\"1.2\">")
        .expect("method element");
    let method = &gir[start..start + gir[start..].find("</method>").unwrap()];
    assert!(method.contains("<instance-parameter name=\"widget\""));
    assert!(method.contains("<parameter name=\"name\""));
    assert!(method.contains("<doc xml:space=\"preserve\">Sets the name.</doc>"));
    assert!(!gir.contains("<function name=\"widget_set_name\""));
}

// ────────────────────────────────────────────────────────────────────────────
// Options and failures
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_reparse_validate_on_class_output() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path(), "GObject");
    let mut options = options(dir.path());
    options.reparse_validate = true;
    let output = Pipeline::new(options).run(&widget_unit()).unwrap();
    assert!(output.gir.contains("<class name=\"Widget\""));
}

#[test]
fn test_missing_dump_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("GObject-2.0.gir"), GOBJECT_GIR).unwrap();
    let err = Pipeline::new(options(dir.path()))
        .run(&widget_unit())
        .unwrap_err();
    assert!(matches!(err, ScanError::Dump(_)));
}

#[test]
fn test_warn_error_fails_the_run() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path(), "GObject");
    let mut options = options(dir.path());
    options.warnings.warn_error = true;

    let mut unit = widget_unit();
    unit.comments.push(comment("/**\n * foo_widget_new (skip)\n */", 60));
    let mut pipeline = Pipeline::new(options);
    let err = pipeline.run(&unit).unwrap_err();
    assert!(matches!(err, ScanError::WarningsAsErrors { .. }));
    assert!(pipeline.diagnostics().has_code(WarningCode::MissingColon));
}
