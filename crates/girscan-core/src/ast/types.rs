//! Type references
//!
//! A [`Type`] starts out unresolved, carrying only what the C declaration or
//! the runtime dump told us (a C type string and/or a runtime type name), and
//! is later resolved to exactly one target: a fundamental, a qualified
//! `Namespace.Name`, or a foreign marker.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::fmt;

/// What a resolved type points at
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTarget {
    /// Not resolved yet
    Unresolved,
    /// One of the fundamental type names (`utf8`, `gint`, ...)
    Fundamental(String),
    /// A node in some namespace, `Namespace.Name`
    GiName(String),
    /// A foreign type identified by its C type
    Foreign(String),
    /// Placeholder for types that can never be resolved
    Unknown,
}

/// Array flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArrayType {
    /// Plain C array
    C,
    /// `GArray`
    GArray,
    /// `GByteArray`
    ByteArray,
    /// `GPtrArray`
    PtrArray,
}

impl ArrayType {
    /// GIR name, `None` for C arrays
    pub fn gir_name(&self) -> Option<&'static str> {
        match self {
            ArrayType::C => None,
            ArrayType::GArray => Some("GLib.Array"),
            ArrayType::ByteArray => Some("GLib.ByteArray"),
            ArrayType::PtrArray => Some("GLib.PtrArray"),
        }
    }

    /// Parse a GIR array name
    pub fn from_gir_name(name: &str) -> Option<Self> {
        match name {
            "GLib.Array" => Some(ArrayType::GArray),
            "GLib.ByteArray" => Some(ArrayType::ByteArray),
            "GLib.PtrArray" => Some(ArrayType::PtrArray),
            _ => None,
        }
    }
}

/// Shape of a type
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// A plain type reference
    Plain,
    /// Array of `element`
    Array {
        /// Array flavour
        array_type: ArrayType,
        /// Element type
        element: Box<Type>,
        /// Whether the array is terminated by a zero element
        zero_terminated: bool,
        /// Fixed size, if any
        size: Option<u32>,
        /// Name of the parameter (or field) holding the length
        length_param: Option<String>,
    },
    /// `GList` / `GSList`
    List {
        /// `GLib.List` or `GLib.SList`
        name: String,
        /// Element type
        element: Box<Type>,
    },
    /// `GHashTable`
    Map {
        /// Key type
        key: Box<Type>,
        /// Value type
        value: Box<Type>,
    },
    /// C varargs
    Varargs,
}

/// A type reference held by parameters, fields, properties, aliases, ...
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    /// C type as written (`GtkWidget*`)
    pub ctype: Option<String>,
    /// C type with qualifiers (`const GtkWidget*`)
    pub complete_ctype: Option<String>,
    /// Runtime type name from the dump
    pub gtype_name: Option<String>,
    /// Symbol the type was declared for, for diagnostics
    pub origin_symbol: Option<String>,
    /// Whether the C type was const-qualified
    pub is_const: bool,
    /// Resolution state
    pub target: TypeTarget,
    /// Plain or container shape
    pub kind: TypeKind,
}

// ========================================================================
// Fundamental vocabulary
// ========================================================================

/// `none`
pub const NONE: &str = "none";
/// `gpointer`
pub const ANY: &str = "gpointer";
/// `gboolean`
pub const BOOLEAN: &str = "gboolean";
/// `utf8`
pub const STRING: &str = "utf8";
/// `filename`
pub const FILENAME: &str = "filename";
/// `va_list`
pub const VALIST: &str = "va_list";
/// `GType`
pub const GTYPE: &str = "GType";
/// `gint8`
pub const INT8: &str = "gint8";
/// `guint8`
pub const UINT8: &str = "guint8";
/// `gchar`
pub const CHAR: &str = "gchar";
/// `gint`
pub const INT: &str = "gint";
/// `long long`
pub const LONG_LONG: &str = "long long";
/// `unsigned long long`
pub const LONG_ULONG: &str = "unsigned long long";
/// `long double`
pub const LONG_DOUBLE: &str = "long double";
/// `gintptr`
pub const INTPTR: &str = "gintptr";
/// `guintptr`
pub const UINTPTR: &str = "guintptr";

/// Basic (non-pointer) fundamental types
pub const BASIC_TYPES: &[&str] = &[
    "gboolean", "gint8", "guint8", "gint16", "guint16", "gint32", "guint32", "gint64",
    "guint64", "gchar", "gshort", "gushort", "gint", "guint", "glong", "gulong", "gsize",
    "gssize", "long long", "unsigned long long", "time_t", "off_t", "gfloat", "gdouble",
    "long double", "gunichar", "GType", "dev_t", "gid_t", "pid_t", "socklen_t", "uid_t",
];

/// Basic types plus the pointer-sized integers
pub static BASIC_GIR_TYPES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let mut all = vec![INTPTR, UINTPTR];
    all.extend_from_slice(BASIC_TYPES);
    all
});

/// Every fundamental a GIR file may name
pub static GIR_TYPES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let mut all = vec![NONE, ANY];
    all.extend(BASIC_GIR_TYPES.iter().copied());
    all.extend([STRING, FILENAME, VALIST]);
    all
});

/// Basic types guaranteed to be pointer sized
pub const POINTER_TYPES: &[&str] = &[ANY, INTPTR, UINTPTR];

/// Fundamental name and the C type it is written with
fn fundamental_ctype(name: &str) -> &str {
    match name {
        NONE => "void",
        STRING | FILENAME => "gchar*",
        other => other,
    }
}

/// Map from C or fundamental spelling to the fundamental name
static TYPE_NAMES: Lazy<FxHashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut names: FxHashMap<&'static str, &'static str> = FxHashMap::default();
    for name in GIR_TYPES.iter() {
        names.insert(name, name);
    }
    let aliases: &[(&str, &str)] = &[
        ("char", "gchar"),
        ("signed char", "gint8"),
        ("unsigned char", "guint8"),
        ("short", "gshort"),
        ("signed short", "gshort"),
        ("unsigned short", "gushort"),
        ("int", "gint"),
        ("signed int", "gint"),
        ("unsigned short int", "gushort"),
        ("signed", "gint"),
        ("unsigned int", "guint"),
        ("unsigned", "guint"),
        ("long", "glong"),
        ("signed long", "glong"),
        ("unsigned long", "gulong"),
        ("unsigned long int", "gulong"),
        ("float", "gfloat"),
        ("double", "gdouble"),
        ("char*", "utf8"),
        ("void*", "gpointer"),
        ("void", "none"),
        ("signed long long", "long long"),
        ("int8_t", "gint8"),
        ("uint8_t", "guint8"),
        ("int16_t", "gint16"),
        ("uint16_t", "guint16"),
        ("int32_t", "gint32"),
        ("uint32_t", "guint32"),
        ("int64_t", "gint64"),
        ("uint64_t", "guint64"),
        ("guchar", "guint8"),
        ("gchararray", "utf8"),
        ("gchar*", "utf8"),
        ("goffset", "gint64"),
        ("gunichar2", "guint16"),
        ("gconstpointer", "gpointer"),
        ("grefcount", "gint"),
        ("gatomicrefcount", "gint"),
        ("any", "gpointer"),
        ("boolean", "gboolean"),
        ("uint", "guint"),
        ("ulong", "gulong"),
        ("FILE*", "gpointer"),
        ("size_t", "gsize"),
        ("ssize_t", "gssize"),
        ("uintptr_t", "guintptr"),
        ("intptr_t", "gintptr"),
        ("id", "gpointer"),
    ];
    for (alias, target) in aliases {
        names.insert(alias, target);
    }
    names
});

/// Look up a C or GIR spelling in the fundamental table
pub fn fundamental_name(name: &str) -> Option<&'static str> {
    TYPE_NAMES.get(name).copied()
}

/// Whether `name` is one of the fundamental GIR type names
pub fn is_gir_type(name: &str) -> bool {
    GIR_TYPES.contains(&name)
}

/// Whether `name` is a basic fundamental (includes pointer-sized ints)
pub fn is_basic_gir_type(name: &str) -> bool {
    BASIC_GIR_TYPES.contains(&name)
}

impl Type {
    /// An unresolved type from a C type string
    pub fn from_ctype(ctype: impl Into<String>) -> Self {
        Type {
            ctype: Some(ctype.into()),
            complete_ctype: None,
            gtype_name: None,
            origin_symbol: None,
            is_const: false,
            target: TypeTarget::Unresolved,
            kind: TypeKind::Plain,
        }
    }

    /// An unresolved type from a runtime type name
    pub fn from_gtype_name_unresolved(gtype_name: impl Into<String>) -> Self {
        Type {
            ctype: None,
            gtype_name: Some(gtype_name.into()),
            ..Type::from_ctype("")
        }
        .without_ctype()
    }

    fn without_ctype(mut self) -> Self {
        self.ctype = None;
        self
    }

    /// A resolved fundamental with its canonical C type
    pub fn fundamental(name: &str) -> Self {
        let mut ty = Type::from_ctype(fundamental_ctype(name));
        ty.target = TypeTarget::Fundamental(name.to_string());
        ty
    }

    /// A resolved reference to `Namespace.Name`
    pub fn giname(giname: impl Into<String>) -> Self {
        Type {
            target: TypeTarget::GiName(giname.into()),
            ..Type::from_ctype("")
        }
        .without_ctype()
    }

    /// A foreign type
    pub fn foreign(ctype: impl Into<String>) -> Self {
        let ctype = ctype.into();
        let mut ty = Type::from_ctype(ctype.clone());
        ty.target = TypeTarget::Foreign(ctype);
        ty
    }

    /// A type that can never be resolved
    pub fn unknown() -> Self {
        Type {
            target: TypeTarget::Unknown,
            ..Type::from_ctype("")
        }
        .without_ctype()
    }

    /// `gpointer`
    pub fn any() -> Self {
        Type::fundamental(ANY)
    }

    /// `none`
    pub fn none() -> Self {
        Type::fundamental(NONE)
    }

    /// `utf8`
    pub fn string() -> Self {
        Type::fundamental(STRING)
    }

    /// Varargs marker
    pub fn varargs() -> Self {
        Type {
            kind: TypeKind::Varargs,
            ..Type::from_ctype("")
        }
        .without_ctype()
    }

    /// An array of `element`
    pub fn array(array_type: ArrayType, element: Type) -> Self {
        Type {
            kind: TypeKind::Array {
                array_type,
                element: Box::new(element),
                zero_terminated: true,
                size: None,
                length_param: None,
            },
            ..Type::from_ctype("")
        }
        .without_ctype()
    }

    /// A `GLib.List` or `GLib.SList` of `element`
    pub fn list(name: impl Into<String>, element: Type) -> Self {
        Type {
            kind: TypeKind::List {
                name: name.into(),
                element: Box::new(element),
            },
            ..Type::from_ctype("")
        }
        .without_ctype()
    }

    /// A `GLib.HashTable`
    pub fn map(key: Type, value: Type) -> Self {
        Type {
            kind: TypeKind::Map {
                key: Box::new(key),
                value: Box::new(value),
            },
            ..Type::from_ctype("")
        }
        .without_ctype()
    }

    /// Builder: set the C type
    pub fn with_ctype(mut self, ctype: impl Into<String>) -> Self {
        self.ctype = Some(ctype.into());
        self
    }

    /// Builder: set the runtime type name
    pub fn with_gtype_name(mut self, gtype_name: impl Into<String>) -> Self {
        self.gtype_name = Some(gtype_name.into());
        self
    }

    /// Parse a runtime type name, mapping the well-known containers
    pub fn from_gtype_name(gtype_name: &str) -> Self {
        if let Some(fundamental) = fundamental_name(gtype_name) {
            return Type::fundamental(fundamental);
        }
        match gtype_name {
            "GHashTable" => Type::map(Type::any(), Type::any()).with_gtype_name(gtype_name),
            "GByteArray" => Type::array(ArrayType::ByteArray, Type::fundamental(UINT8))
                .with_gtype_name(gtype_name),
            "GArray" => Type::array(ArrayType::GArray, Type::any()).with_gtype_name(gtype_name),
            "GPtrArray" => {
                Type::array(ArrayType::PtrArray, Type::any()).with_gtype_name(gtype_name)
            }
            "GStrv" => {
                let mut bare_utf8 = Type::string();
                bare_utf8.ctype = None;
                Type::array(ArrayType::C, bare_utf8).with_gtype_name(gtype_name)
            }
            _ => Type::from_gtype_name_unresolved(gtype_name),
        }
    }

    /// Whether the type has a target (containers and varargs always do)
    pub fn is_resolved(&self) -> bool {
        match self.kind {
            TypeKind::Plain => !matches!(self.target, TypeTarget::Unresolved),
            _ => true,
        }
    }

    /// Fundamental name, if this is a plain fundamental
    pub fn target_fundamental(&self) -> Option<&str> {
        match (&self.kind, &self.target) {
            (TypeKind::Plain, TypeTarget::Fundamental(name)) => Some(name),
            _ => None,
        }
    }

    /// `Namespace.Name` target, if any
    pub fn target_giname(&self) -> Option<&str> {
        match (&self.kind, &self.target) {
            (TypeKind::Plain, TypeTarget::GiName(name)) => Some(name),
            _ => None,
        }
    }

    /// Whether the type resolved to a foreign marker
    pub fn is_foreign(&self) -> bool {
        matches!(self.target, TypeTarget::Foreign(_))
    }

    /// The `Name` part of a `Namespace.Name` target
    pub fn giname_short(&self) -> Option<&str> {
        self.target_giname()
            .map(|name| name.split_once('.').map(|(_, short)| short).unwrap_or(name))
    }

    /// String used to describe an unresolved type in diagnostics
    pub fn unresolved_string(&self) -> String {
        if let Some(ctype) = &self.ctype {
            return ctype.clone();
        }
        if let Some(gtype_name) = &self.gtype_name {
            return gtype_name.clone();
        }
        self.to_string()
    }

    /// Comparison key; containers compare equal by shape only
    fn identity(&self) -> (u8, Option<&str>) {
        match &self.kind {
            TypeKind::Array { .. } => (1, Some("<array>")),
            TypeKind::List { .. } => (1, Some("<list>")),
            TypeKind::Map { .. } => (1, Some("<map>")),
            TypeKind::Varargs => (1, Some("<varargs>")),
            TypeKind::Plain => match &self.target {
                TypeTarget::Fundamental(name) => (1, Some(name)),
                TypeTarget::GiName(name) => (2, Some(name)),
                TypeTarget::Foreign(name) => (3, Some(name)),
                TypeTarget::Unknown => (4, None),
                TypeTarget::Unresolved => (0, self.ctype.as_deref()),
            },
        }
    }

    /// Introspection-level equality, disregarding C types
    pub fn is_equiv(&self, other: &Type) -> bool {
        self.identity() == other.identity()
    }

    /// Whether this type is the fundamental `name`
    pub fn is_fundamental(&self, name: &str) -> bool {
        self.target_fundamental() == Some(name)
    }

    /// Whether this type is any of the given fundamentals
    pub fn is_any_fundamental(&self, names: &[&str]) -> bool {
        self.target_fundamental().is_some_and(|f| names.contains(&f))
    }

    /// Element type of arrays and lists
    pub fn element_type(&self) -> Option<&Type> {
        match &self.kind {
            TypeKind::Array { element, .. } | TypeKind::List { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Whether the type is an array, list or map
    pub fn is_container(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Array { .. } | TypeKind::List { .. } | TypeKind::Map { .. }
        )
    }

    /// Whether the type is varargs
    pub fn is_varargs(&self) -> bool {
        matches!(self.kind, TypeKind::Varargs)
    }

    /// Plain copy of the target, keeping the C type
    pub fn clone_plain(&self) -> Type {
        Type {
            ctype: self.ctype.clone(),
            complete_ctype: None,
            gtype_name: None,
            origin_symbol: None,
            is_const: self.is_const,
            target: self.target.clone(),
            kind: self.kind.clone(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Array { element, .. } => write!(f, "array<{}>", element),
            TypeKind::List { name, element } => write!(f, "{}<{}>", name, element),
            TypeKind::Map { key, value } => write!(f, "GLib.HashTable<{},{}>", key, value),
            TypeKind::Varargs => f.write_str("..."),
            TypeKind::Plain => match &self.target {
                TypeTarget::Fundamental(name)
                | TypeTarget::GiName(name)
                | TypeTarget::Foreign(name) => f.write_str(name),
                TypeTarget::Unknown | TypeTarget::Unresolved => f.write_str("<undefined>"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fundamental_aliases() {
        assert_eq!(fundamental_name("char*"), Some("utf8"));
        assert_eq!(fundamental_name("unsigned char"), Some("guint8"));
        assert_eq!(fundamental_name("size_t"), Some("gsize"));
        assert_eq!(fundamental_name("gint"), Some("gint"));
        assert_eq!(fundamental_name("GtkWidget"), None);
    }

    #[test]
    fn test_fundamental_ctypes() {
        assert_eq!(Type::string().ctype.as_deref(), Some("gchar*"));
        assert_eq!(Type::none().ctype.as_deref(), Some("void"));
        assert_eq!(Type::any().ctype.as_deref(), Some("gpointer"));
    }

    #[test]
    fn test_from_gtype_name_containers() {
        let map = Type::from_gtype_name("GHashTable");
        assert!(matches!(map.kind, TypeKind::Map { .. }));

        let bytes = Type::from_gtype_name("GByteArray");
        match &bytes.kind {
            TypeKind::Array { array_type, element, .. } => {
                assert_eq!(*array_type, ArrayType::ByteArray);
                assert!(element.is_fundamental(UINT8));
            }
            other => panic!("expected array, got {:?}", other),
        }

        let strv = Type::from_gtype_name("GStrv");
        let element = strv.element_type().unwrap();
        assert!(element.is_fundamental(STRING));
        assert!(element.ctype.is_none());

        let widget = Type::from_gtype_name("GtkWidget");
        assert!(!widget.is_resolved());
        assert_eq!(widget.unresolved_string(), "GtkWidget");
    }

    #[test]
    fn test_equivalence_ignores_ctype() {
        let a = Type::string().with_ctype("const char*");
        assert!(a.is_equiv(&Type::string()));
        assert!(!a.is_equiv(&Type::fundamental(FILENAME)));
        assert!(Type::giname("Gtk.Widget").is_equiv(&Type::giname("Gtk.Widget")));
        assert!(!Type::giname("Gtk.Widget").is_equiv(&Type::giname("Gtk.Window")));
    }

    #[test]
    fn test_containers_are_resolved() {
        let list = Type::list("GLib.List", Type::from_ctype("Foo*"));
        assert!(list.is_resolved());
        assert!(!list.element_type().unwrap().is_resolved());
        assert!(Type::varargs().is_resolved());
    }

    #[test]
    fn test_giname_short() {
        assert_eq!(Type::giname("GObject.Object").giname_short(), Some("Object"));
    }
}
