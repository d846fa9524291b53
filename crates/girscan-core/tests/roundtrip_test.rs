//! Write, read and write again: the two documents must be byte-identical.

use girscan_core::annotation::RawComment;
use girscan_core::gir::{self, GirReader, GirWriter};
use girscan_core::scanner::{CTypeKind, SourceType, Symbol, SymbolKind};
use girscan_core::{passthrough, Pipeline, ScanError, ScanOptions, ScanUnit};
use std::path::PathBuf;

fn member(name: &str, source: SourceType) -> Symbol {
    Symbol::new(SymbolKind::Member, name).with_type(source)
}

fn enum_value(ident: &str, value: i64) -> Symbol {
    Symbol {
        const_int: Some(value),
        ..Symbol::new(SymbolKind::Member, ident)
    }
}

fn comment(text: &str, line: u32) -> RawComment {
    RawComment {
        text: text.to_string(),
        filename: "/src/foo/foo.c".to_string(),
        line,
    }
}

/// Enum, record, callback, alias, constant and functions
fn library_unit() -> ScanUnit {
    let mut color = SourceType::new(CTypeKind::Enum, None);
    color.child_list = vec![
        enum_value("FOO_COLOR_RED", 0),
        enum_value("FOO_COLOR_DARK_BLUE", 1),
    ];

    let mut rect = SourceType::new(CTypeKind::Struct, Some("_FooRect"));
    rect.child_list = vec![
        member("x", SourceType::basic("int")),
        member("y", SourceType::basic("int")),
    ];

    let callback = SourceType::pointer(SourceType::function(
        SourceType::basic("gboolean"),
        vec![
            member("rect", SourceType::pointer(SourceType::typedef("FooRect"))),
            member("user_data", SourceType::typedef("gpointer")),
        ],
    ));

    ScanUnit {
        symbols: vec![
            Symbol::new(SymbolKind::Typedef, "FooColor").with_type(color).at("/src/foo/foo.h", 3),
            Symbol::new(SymbolKind::Typedef, "FooRect")
                .with_type(SourceType::new(CTypeKind::Struct, Some("_FooRect")))
                .at("/src/foo/foo.h", 8),
            Symbol::new(SymbolKind::Struct, "_FooRect").with_type(rect).at("/src/foo/foo.h", 9),
            Symbol::new(SymbolKind::Typedef, "FooRectFunc")
                .with_type(callback)
                .at("/src/foo/foo.h", 14),
            Symbol::new(SymbolKind::Typedef, "FooSize")
                .with_type(SourceType::basic("int"))
                .at("/src/foo/foo.h", 16),
            Symbol {
                const_int: Some(42),
                ..Symbol::new(SymbolKind::Const, "FOO_ANSWER").at("/src/foo/foo.h", 18)
            },
            Symbol::new(SymbolKind::Function, "foo_rect_area")
                .with_type(SourceType::function(
                    SourceType::basic("int"),
                    vec![member("rect", SourceType::pointer(SourceType::typedef("FooRect")))],
                ))
                .at("/src/foo/foo.h", 20),
            Symbol::new(SymbolKind::Function, "foo_rect_foreach")
                .with_type(SourceType::function(
                    SourceType::void(),
                    vec![
                        member("func", SourceType::typedef("FooRectFunc")),
                        member("user_data", SourceType::typedef("gpointer")),
                    ],
                ))
                .at("/src/foo/foo.h", 22),
            Symbol::new(SymbolKind::Function, "foo_describe")
                .with_type(SourceType::function(
                    SourceType::pointer(SourceType::basic("char")),
                    vec![member("color", SourceType::typedef("FooColor"))],
                ))
                .at("/src/foo/foo.h", 24),
        ],
        comments: vec![
            comment(
                "/**\n * FooRect:\n * @x: left edge\n * @y: top edge\n *\n * A rectangle & its corner.\n */",
                5,
            ),
            comment(
                "/**\n * foo_describe:\n * @color: a color\n *\n * Describes @color.\n *\n * Returns: (transfer full): a description\n * Since: 1.2\n * Deprecated: 1.4: Use nothing.\n */",
                30,
            ),
        ],
    }
}

fn scanned() -> String {
    let mut options = ScanOptions::new("Foo", "1.0");
    options.sources_top_dirs = vec![PathBuf::from("/src/foo")];
    options.c_includes = vec!["foo.h".to_string()];
    options.shared_libraries = vec!["libfoo.so.1".to_string()];
    Pipeline::new(options).run(&library_unit()).unwrap().gir
}

#[test]
fn test_scanned_output_survives_passthrough() {
    let gir = scanned();
    assert_eq!(passthrough(&gir).unwrap(), gir);
}

#[test]
fn test_reader_writer_fixpoint() {
    let gir = scanned();
    let model = GirReader::new().read_model(&gir).unwrap();
    let again = GirWriter::new(&model).write().unwrap();
    let model = GirReader::new().read_model(&again).unwrap();
    assert_eq!(GirWriter::new(&model).write().unwrap(), again);
}

#[test]
fn test_scanned_output_content() {
    let gir = scanned();
    assert!(gir.contains("<enumeration name=\"Color\""));
    assert!(gir.contains("<member name=\"dark_blue\" value=\"1\" c:identifier=\"FOO_COLOR_DARK_BLUE\""));
    assert!(gir.contains("<record name=\"Rect\""));
    assert!(gir.contains("<callback name=\"RectFunc\""));
    assert!(gir.contains("<alias name=\"Size\""));
    assert!(gir.contains("<constant name=\"ANSWER\" value=\"42\""));
    assert!(gir.contains("A rectangle &amp; its corner."));
    assert!(gir.contains("filename=\"foo.c\""));
    assert!(gir.contains("deprecated-version=\"1.4\""));
}

#[test]
fn test_compare_reports_first_difference() {
    let gir = scanned();
    let altered = gir.replacen("Color", "Colour", 1);
    let err = gir::compare_documents(&gir, &altered).unwrap_err();
    match err {
        ScanError::RoundTripMismatch { line, scanned, passthrough } => {
            assert!(line > 1);
            assert!(scanned.contains("Color"));
            assert!(passthrough.contains("Colour"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_round_trip_helper_matches_plain_write() {
    let unit = library_unit();
    let output = Pipeline::new(ScanOptions::new("Foo", "1.0")).run(&unit).unwrap();
    let checked = gir::round_trip(&output.model, &[]).unwrap();
    assert_eq!(checked, output.gir);
}
