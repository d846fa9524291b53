//! Declaration and comment order must not change the output.

use girscan_core::annotation::RawComment;
use girscan_core::scanner::{CTypeKind, SourceType, Symbol, SymbolKind};
use girscan_core::{Pipeline, ScanOptions, ScanUnit};

fn member(name: &str, source: SourceType) -> Symbol {
    Symbol::new(SymbolKind::Member, name).with_type(source)
}

fn rect_ptr() -> SourceType {
    SourceType::pointer(SourceType::typedef("FooRect"))
}

fn types_unit() -> ScanUnit {
    let mut rect = SourceType::new(CTypeKind::Struct, Some("_FooRect"));
    rect.child_list = vec![
        member("width", SourceType::basic("int")),
        member("height", SourceType::basic("int")),
    ];
    ScanUnit {
        symbols: vec![
            Symbol::new(SymbolKind::Typedef, "FooRect")
                .with_type(SourceType::new(CTypeKind::Struct, Some("_FooRect")))
                .at("foo-types.h", 3),
            Symbol::new(SymbolKind::Struct, "_FooRect").with_type(rect).at("foo-types.h", 4),
        ],
        comments: Vec::new(),
    }
}

/// Functions of `foo-rect.h` with their comments
fn functions_unit() -> ScanUnit {
    let function = |ident: &str, ret: SourceType, params: Vec<Symbol>, line: u32| {
        Symbol::new(SymbolKind::Function, ident)
            .with_type(SourceType::function(ret, params))
            .at("foo-rect.h", line)
    };
    let comment = |text: &str, line: u32| RawComment {
        text: text.to_string(),
        filename: "foo-rect.c".to_string(),
        line,
    };
    ScanUnit {
        symbols: vec![
            function("foo_rect_new", rect_ptr(), Vec::new(), 3),
            function("foo_rect_free", SourceType::void(), vec![member("rect", rect_ptr())], 4),
            function(
                "foo_rect_get_width",
                SourceType::basic("int"),
                vec![member("rect", rect_ptr())],
                5,
            ),
            function(
                "foo_rect_set_width",
                SourceType::void(),
                vec![member("rect", rect_ptr()), member("width", SourceType::basic("int"))],
                6,
            ),
            function("foo_rect_zero", SourceType::void(), Vec::new(), 7),
        ],
        comments: vec![
            comment("/**\n * foo_rect_new:\n *\n * Returns: (transfer full): a rectangle\n */", 10),
            comment("/**\n * foo_rect_get_width:\n * @rect: a #FooRect\n *\n * Returns: the width\n */", 20),
            comment("/**\n * foo_rect_set_width:\n * @rect: a #FooRect\n * @width: new width\n */", 30),
        ],
    }
}

fn reversed(mut unit: ScanUnit) -> ScanUnit {
    unit.symbols.reverse();
    unit.comments.reverse();
    unit
}

fn scan(unit: ScanUnit) -> String {
    Pipeline::new(ScanOptions::new("Foo", "1.0")).run(&unit).unwrap().gir
}

#[test]
fn test_function_order_does_not_matter() {
    let forward = scan(ScanUnit::merge(vec![types_unit(), functions_unit()]));
    let backward = scan(ScanUnit::merge(vec![types_unit(), reversed(functions_unit())]));
    assert_eq!(forward, backward);
}

#[test]
fn test_header_order_does_not_matter() {
    let first = scan(ScanUnit::merge(vec![types_unit(), functions_unit()]));
    let second = scan(ScanUnit::merge(vec![functions_unit(), types_unit()]));
    assert_eq!(first, second);
}

#[test]
fn test_methods_are_paired() {
    let gir = scan(ScanUnit::merge(vec![types_unit(), functions_unit()]));
    // a record without a GType has no constructors
    assert!(gir.contains("<function name=\"rect_new\" c:identifier=\"foo_rect_new\">"));
    assert!(gir.contains("<method name=\"get_width\" c:identifier=\"foo_rect_get_width\">"));
    assert!(gir.contains("<method name=\"set_width\" c:identifier=\"foo_rect_set_width\">"));
    assert!(gir.contains("<function name=\"zero\" c:identifier=\"foo_rect_zero\""));
}
