//! Type strings written in annotations: `utf8`, `GLib.List<Gtk.Widget>`,
//! `GLib.HashTable(utf8,gint)`

use super::SemanticTransformer;
use crate::ast::{Type, TypeKind};
use crate::diagnostic::WarningCode;
use crate::position::SourcePosition;

/// Where a type string came from, for diagnostics
pub(super) struct TypeSite<'s> {
    /// Symbol prefixed to unknown-type warnings
    pub label: &'s str,
    pub position: Option<&'s SourcePosition>,
}

fn split_first(input: &str) -> (&str, Option<char>, &str) {
    match input.find([',', '<', '>', '(', ')']) {
        Some(i) => {
            let sep = input[i..].chars().next();
            (&input[..i], sep, &input[i + 1..])
        }
        None => (input, None, ""),
    }
}

impl SemanticTransformer<'_> {
    /// Parse a type string; the top-level result keeps the `const` flag of
    /// `original`
    pub(super) fn resolve_type_spec(&mut self, spec: &str, original: Option<&Type>, site: &TypeSite<'_>) -> Type {
        let (mut result, rest) = self.grab_type(spec, spec, site);
        if let Some(original) = original {
            result.is_const = original.is_const;
        }
        if !rest.is_empty() {
            self.diagnostics.warn(
                WarningCode::InvalidTypeSpec,
                format!("Trailing components in type specification '{}'", spec),
                site.position,
            );
        }
        if !result.is_resolved() {
            self.diagnostics.warn(
                WarningCode::UnknownType,
                format!("{}: Unknown type: '{}'", site.label, spec),
                site.position,
            );
        }
        result
    }

    /// Parse a `(type ...)` override, keeping the C types of `original`
    pub(super) fn resolve_toplevel(&mut self, spec: &str, original: &Type, site: &TypeSite<'_>) -> Type {
        let mut result = self.resolve_type_spec(spec, Some(original), site);
        result.ctype = original.ctype.clone();
        result.complete_ctype = original.complete_ctype.clone();
        result
    }

    fn grab_type<'i>(&mut self, input: &'i str, spec: &str, site: &TypeSite<'_>) -> (Type, &'i str) {
        let (first, sep, mut rest) = split_first(input);
        let base = self.model.create_type_from_user_string(first.trim());
        let closing = match sep {
            Some('<') => '>',
            Some('(') => ')',
            _ => return (base, &input[first.len()..]),
        };

        let mut args = Vec::new();
        loop {
            let (arg, remaining) = self.grab_type(rest, spec, site);
            args.push(arg);
            let mut chars = remaining.chars();
            let Some(next) = chars.next() else {
                rest = remaining;
                break;
            };
            rest = chars.as_str();
            if next == closing {
                break;
            }
        }
        (self.combine_type(base, args, spec, site), rest)
    }

    fn combine_type(&mut self, mut base: Type, mut args: Vec<Type>, spec: &str, site: &TypeSite<'_>) -> Type {
        if args.is_empty() {
            return base;
        }
        match &mut base.kind {
            TypeKind::List { name, .. } if args.len() == 1 => {
                let name = name.clone();
                return Type::list(name, args.remove(0));
            }
            TypeKind::Array { element, .. } if args.len() == 1 => {
                *element = Box::new(args.remove(0));
            }
            TypeKind::Map { .. } if args.len() == 2 => {
                let value = args.remove(1);
                return Type::map(args.remove(0), value);
            }
            _ => {
                self.diagnostics.warn(
                    WarningCode::InvalidTypeSpec,
                    format!("Too many parameters in type specification '{}'", spec),
                    site.position,
                );
            }
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::annotation::CommentBlocks;
    use crate::ast::types::{INT, STRING};
    use crate::ast::ArrayType;

    fn parse(model: &mut crate::ast::Model, spec: &str) -> (Type, usize) {
        let mut diagnostics = diagnostics();
        let mut blocks = CommentBlocks::new();
        let mut transformer = SemanticTransformer::new(model, &mut diagnostics, &mut blocks);
        let site = TypeSite {
            label: "foo_test",
            position: None,
        };
        let typ = transformer.resolve_type_spec(spec, None, &site);
        (typ, diagnostics.warning_count())
    }

    #[test]
    fn test_split_first() {
        assert_eq!(split_first("GLib.List<utf8>"), ("GLib.List", Some('<'), "utf8>"));
        assert_eq!(split_first("utf8"), ("utf8", None, ""));
    }

    #[test]
    fn test_plain_and_container_specs() {
        let mut model = model();
        let (typ, warnings) = parse(&mut model, "utf8");
        assert!(typ.is_fundamental(STRING));
        assert_eq!(warnings, 0);

        let (typ, warnings) = parse(&mut model, "GLib.List<utf8>");
        assert_eq!(warnings, 0);
        let TypeKind::List { name, element } = &typ.kind else {
            panic!("expected a list, got {:?}", typ);
        };
        assert_eq!(name, "GLib.List");
        assert!(element.is_fundamental(STRING));

        let (typ, _) = parse(&mut model, "GLib.HashTable<utf8,gint>");
        let TypeKind::Map { key, value } = &typ.kind else {
            panic!("expected a map, got {:?}", typ);
        };
        assert!(key.is_fundamental(STRING));
        assert!(value.is_fundamental(INT));

        let (typ, _) = parse(&mut model, "GLib.PtrArray(utf8)");
        let TypeKind::Array { array_type, element, .. } = &typ.kind else {
            panic!("expected an array, got {:?}", typ);
        };
        assert_eq!(*array_type, ArrayType::PtrArray);
        assert!(element.is_fundamental(STRING));
    }

    #[test]
    fn test_local_type_names() {
        let mut model = model();
        add_rect(&mut model);
        for spec in ["FooRect", "Foo.Rect", "FooRect*"] {
            let (typ, warnings) = parse(&mut model, spec);
            assert_eq!(warnings, 0, "{}", spec);
            assert_eq!(typ.target_giname(), Some("Foo.Rect"));
        }
    }

    #[test]
    fn test_malformed_specs_warn() {
        let mut model = model();
        let (_, warnings) = parse(&mut model, "GLib.List<utf8,gint>");
        assert_eq!(warnings, 1);
        let (typ, warnings) = parse(&mut model, "NoSuchType");
        assert!(!typ.is_resolved());
        assert_eq!(warnings, 1);
    }
}
