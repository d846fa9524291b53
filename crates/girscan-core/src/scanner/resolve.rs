//! Building types from C spellings and resolving them against the model

use super::symbol::{CTypeKind, SourceType};
use crate::ast::types::{fundamental_name, ArrayType, Type, TypeKind, TypeTarget, ANY, BOOLEAN, UINT8};
use crate::ast::Model;

/// How a type string is being used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeUse {
    /// The type is const qualified
    pub is_const: bool,
    /// Outermost array decays to a pointer
    pub is_parameter: bool,
    /// `char**` becomes a string array
    pub is_return: bool,
}

/// C type spelling of a source type, without qualifiers
pub fn source_ctype(source: &SourceType, is_parameter: bool) -> String {
    match source.kind {
        CTypeKind::Void => "void".to_string(),
        CTypeKind::Basic | CTypeKind::Typedef => source.name.clone().unwrap_or_default(),
        CTypeKind::Pointer => format!("{}*", base_ctype(source)),
        CTypeKind::Array if is_parameter => format!("{}*", base_ctype(source)),
        CTypeKind::Array => source
            .base_type
            .as_deref()
            .map(|b| source_ctype(b, false))
            .unwrap_or_else(|| ANY.to_string()),
        _ => ANY.to_string(),
    }
}

fn base_ctype(source: &SourceType) -> String {
    source
        .base_type
        .as_deref()
        .map(|b| source_ctype(b, false))
        .unwrap_or_else(|| "void".to_string())
}

/// C type spelling including `const` and `volatile`
pub fn complete_source_ctype(source: &SourceType, is_parameter: bool) -> String {
    let complete_base = |source: &SourceType| {
        source
            .base_type
            .as_deref()
            .map(|b| complete_source_ctype(b, false))
            .unwrap_or_else(|| "void".to_string())
    };
    match source.kind {
        CTypeKind::Void => "void".to_string(),
        CTypeKind::Basic
        | CTypeKind::Typedef
        | CTypeKind::Struct
        | CTypeKind::Union
        | CTypeKind::Enum => {
            let mut value = source.name.clone().unwrap_or_default();
            if source.is_const {
                value = format!("const {}", value);
            }
            if source.is_volatile {
                value = format!("volatile {}", value);
            }
            value
        }
        CTypeKind::Pointer => pointer_complete(source, complete_base(source)),
        CTypeKind::Array if is_parameter => pointer_complete(source, complete_base(source)),
        CTypeKind::Array => complete_base(source),
        _ => {
            let mut value = if source.is_const {
                "gconstpointer".to_string()
            } else {
                "gpointer".to_string()
            };
            if source.is_volatile {
                value = format!("volatile {}", value);
            }
            value
        }
    }
}

fn pointer_complete(source: &SourceType, base: String) -> String {
    let mut value = format!("{}*", base);
    if source.is_const {
        value.push_str(" const");
    }
    if source.is_volatile {
        value.push_str(" volatile");
    }
    value
}

/// Map a C spelling to its fundamental, keeping pointer levels that have no
/// alias of their own
fn canonicalize_ctype(ctype: &str) -> String {
    if let Some(fundamental) = fundamental_name(ctype) {
        return fundamental.to_string();
    }
    match ctype.strip_suffix('*') {
        Some(base) => format!("{}*", canonicalize_ctype(base)),
        None => ctype.to_string(),
    }
}

/// Container types recognised by bare name
pub fn bare_container_type(base: &str) -> Option<Type> {
    match base {
        "GList" | "GSList" => Some(Type::list(format!("GLib.{}", &base[1..]), Type::any())),
        "GLib.List" | "GLib.SList" => Some(Type::list(base, Type::any())),
        "GByteArray" | "GLib.ByteArray" | "GObject.ByteArray" => Some(Type::array(
            ArrayType::ByteArray,
            Type::fundamental(UINT8),
        )),
        "GArray" | "GLib.Array" | "GObject.Array" => {
            Some(Type::array(ArrayType::GArray, Type::any()))
        }
        "GPtrArray" | "GLib.PtrArray" | "GObject.PtrArray" => {
            Some(Type::array(ArrayType::PtrArray, Type::any()))
        }
        "GHashTable" | "GLib.HashTable" | "GObject.HashTable" => {
            Some(Type::map(Type::any(), Type::any()))
        }
        _ => None,
    }
}

fn set_c_spelling(mut typ: Type, ctype: &str, complete: Option<&str>, is_const: bool) -> Type {
    typ.ctype = Some(ctype.to_string());
    typ.complete_ctype = complete.map(str::to_string);
    typ.is_const = is_const;
    typ
}

/// Build an unresolved (or fundamental) type from a C type string
pub fn type_from_ctype_string(ctype: &str, usage: TypeUse, complete_ctype: Option<&str>) -> Type {
    let mut canonical = canonicalize_ctype(ctype);
    let mut base = canonical.replace('*', "");

    if canonical == "_Bool" || canonical == "bool" {
        canonical = BOOLEAN.to_string();
        base = canonical.clone();
    }

    if (usage.is_return && canonical == "utf8*") || base == "GStrv" {
        let mut bare_utf8 = Type::string();
        bare_utf8.ctype = None;
        let array = Type::array(ArrayType::C, bare_utf8);
        return set_c_spelling(array, ctype, complete_ctype, usage.is_const);
    }

    if let Some(fundamental) = fundamental_name(&base) {
        return set_c_spelling(Type::fundamental(fundamental), ctype, complete_ctype, usage.is_const);
    }
    if let Some(container) = bare_container_type(&base) {
        return set_c_spelling(container, ctype, complete_ctype, usage.is_const);
    }
    set_c_spelling(Type::from_ctype(ctype), ctype, complete_ctype, usage.is_const)
}

/// Build a type for a declared source type
pub fn type_from_source(source: &SourceType, is_parameter: bool, is_return: bool) -> Type {
    let ctype = source_ctype(source, is_parameter);
    let complete = complete_source_ctype(source, is_parameter);
    let is_const = source.kind == CTypeKind::Pointer
        && source.base_type.as_ref().is_some_and(|b| b.is_const);
    type_from_ctype_string(
        &ctype,
        TypeUse {
            is_const,
            is_parameter,
            is_return,
        },
        Some(&complete),
    )
}

impl Model {
    /// Resolve a type in place; returns whether it now has a live target
    ///
    /// Containers resolve through their element types. Plain types try the
    /// C type first and the runtime type name second. A `Namespace.Name`
    /// target that does not name a live node is reverted.
    pub fn resolve_type(&self, typ: &mut Type) -> bool {
        match &mut typ.kind {
            TypeKind::Array { element, .. } | TypeKind::List { element, .. } => {
                return self.resolve_type(element);
            }
            TypeKind::Map { key, value } => {
                let key_resolved = self.resolve_type(key);
                let value_resolved = self.resolve_type(value);
                return key_resolved && value_resolved;
            }
            TypeKind::Varargs => return true,
            TypeKind::Plain => {}
        }

        if !typ.is_resolved() {
            let found = if typ.ctype.as_deref().is_some_and(|c| !c.is_empty()) {
                self.resolve_from_ctype(typ)
            } else if typ.gtype_name.is_some() {
                self.resolve_from_gtype_name(typ)
            } else {
                false
            };
            if !found {
                return false;
            }
        }

        match &typ.target {
            TypeTarget::GiName(name) => {
                if self.lookup_giname(name).is_none() {
                    typ.target = TypeTarget::Unresolved;
                    return false;
                }
                true
            }
            TypeTarget::Unresolved => false,
            _ => true,
        }
    }

    fn resolve_from_ctype(&self, typ: &mut Type) -> bool {
        let stripped = typ.ctype.as_deref().unwrap_or("").replace('*', "");
        let Ok(matches) = self.split_ctype_namespaces(&stripped) else {
            for ns_id in self.included_ids() {
                let ns = self.namespace(ns_id);
                if let Some(target) = ns.get_by_ctype(&stripped) {
                    typ.target =
                        TypeTarget::GiName(format!("{}.{}", ns.name, self.node(target).name));
                    return true;
                }
            }
            return false;
        };
        for (ns_id, name) in matches {
            let ns = self.namespace(ns_id);
            if let Some(target) = ns.get(&name).or_else(|| ns.get_by_ctype(&stripped)) {
                typ.target = TypeTarget::GiName(format!("{}.{}", ns.name, self.node(target).name));
                return true;
            }
        }
        false
    }

    fn resolve_from_gtype_name(&self, typ: &mut Type) -> bool {
        let Some(gtype_name) = typ.gtype_name.as_deref() else {
            return false;
        };
        for ns_id in self.namespace_ids() {
            let ns = self.namespace(ns_id);
            if let Some(target) = ns.get_by_gtype_name(gtype_name) {
                typ.target = TypeTarget::GiName(format!("{}.{}", ns.name, self.node(target).name));
                return true;
            }
        }
        false
    }

    /// Parse and resolve a type written in an annotation
    ///
    /// Accepts both GIR spellings (`utf8`, `Gtk.Widget`) and C spellings
    /// (`char*`, `GtkWidget`). A resolved type loses its C type.
    pub fn create_type_from_user_string(&self, typestr: &str) -> Type {
        let mut typ = if typestr.contains('.') {
            bare_container_type(typestr).unwrap_or_else(|| self.main().type_from_name(typestr, None))
        } else {
            type_from_ctype_string(typestr, TypeUse::default(), None)
        };
        if self.resolve_type(&mut typ) {
            typ.ctype = None;
        }
        typ
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Compound, Namespace, Node, NodeKind};

    fn model_with_widget() -> Model {
        let mut model = Model::new(Namespace::new("Foo", "1.0", None, None));
        let widget = model.alloc(Node::new(
            "Widget",
            NodeKind::Record(Compound::new(Some("FooWidget".into()))),
        ));
        let main = model.main_id();
        model.append(main, widget, false).unwrap();
        model
    }

    #[test]
    fn test_canonicalize_keeps_pointer_aliases() {
        assert_eq!(canonicalize_ctype("char*"), "utf8");
        assert_eq!(canonicalize_ctype("gchar**"), "utf8*");
        assert_eq!(canonicalize_ctype("int*"), "gint*");
        assert_eq!(canonicalize_ctype("FooWidget*"), "FooWidget*");
    }

    #[test]
    fn test_fundamentals_and_containers() {
        let typ = type_from_ctype_string("const gchar*", TypeUse::default(), None);
        assert!(typ.target_fundamental().is_none());
        let typ = type_from_ctype_string("gchar*", TypeUse::default(), None);
        assert!(typ.is_fundamental("utf8"));
        assert_eq!(typ.ctype.as_deref(), Some("gchar*"));

        let typ = type_from_ctype_string("GList*", TypeUse::default(), None);
        assert!(matches!(typ.kind, TypeKind::List { ref name, .. } if name == "GLib.List"));

        let ret = TypeUse {
            is_return: true,
            ..TypeUse::default()
        };
        let typ = type_from_ctype_string("gchar**", ret, None);
        assert!(matches!(typ.kind, TypeKind::Array { array_type: ArrayType::C, .. }));
        let typ = type_from_ctype_string("gchar**", TypeUse::default(), None);
        assert!(typ.is_fundamental("utf8"));

        assert!(type_from_ctype_string("_Bool", TypeUse::default(), None).is_fundamental("gboolean"));
    }

    #[test]
    fn test_source_type_spellings() {
        let source = SourceType::pointer(SourceType::basic("char").constant());
        assert_eq!(source_ctype(&source, false), "char*");
        assert_eq!(complete_source_ctype(&source, false), "const char*");
        let typ = type_from_source(&source, true, false);
        assert!(typ.is_const);
        assert!(typ.is_fundamental("utf8"));
    }

    #[test]
    fn test_resolve_type_is_idempotent() {
        let model = model_with_widget();
        let mut typ = Type::from_ctype("FooWidget*");
        assert!(model.resolve_type(&mut typ));
        assert_eq!(typ.target_giname(), Some("Foo.Widget"));
        let snapshot = typ.clone();
        assert!(model.resolve_type(&mut typ));
        assert_eq!(typ, snapshot);
    }

    #[test]
    fn test_resolve_reverts_dead_target() {
        let model = model_with_widget();
        let mut typ = Type::giname("Foo.Missing");
        assert!(!model.resolve_type(&mut typ));
        assert!(!typ.is_resolved());
    }

    #[test]
    fn test_user_string_clears_ctype() {
        let model = model_with_widget();
        let typ = model.create_type_from_user_string("FooWidget");
        assert_eq!(typ.target_giname(), Some("Foo.Widget"));
        assert!(typ.ctype.is_none());
        let typ = model.create_type_from_user_string("Foo.Widget");
        assert_eq!(typ.target_giname(), Some("Foo.Widget"));
        let typ = model.create_type_from_user_string("GLib.HashTable");
        assert!(matches!(typ.kind, TypeKind::Map { .. }));
    }
}
