//! Namespaces: the root containers of the model

use super::node::NodeId;
use super::types::{fundamental_name, Type};
use crate::error::ScanError;
use crate::utils::to_underscores;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Handle to a namespace in the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(pub u32);

impl NamespaceId {
    /// Index into the model's namespace list
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// A `Name-Version` dependency
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Include {
    /// Namespace name
    pub name: String,
    /// Namespace version
    pub version: String,
}

impl Include {
    /// Create an include
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Include {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parse `Name-Version`
    pub fn from_string(value: &str) -> Result<Self, ScanError> {
        match value.split_once('-') {
            Some((name, version)) if !name.is_empty() && !version.is_empty() => {
                Ok(Include::new(name, version))
            }
            _ => Err(ScanError::MalformedInclude(value.to_string())),
        }
    }

    /// File name of the GIR for this include
    pub fn gir_filename(&self) -> String {
        format!("{}-{}.gir", self.name, self.version)
    }
}

impl fmt::Display for Include {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

/// A namespace and its lookup indexes
///
/// The indexes are maintained by [`super::Model`]; a node appears in them
/// exactly while it is tracked by this namespace.
#[derive(Debug, Clone)]
pub struct Namespace {
    /// Namespace name, e.g. `Gtk`
    pub name: String,
    /// Namespace version, e.g. `4.0`
    pub version: String,
    /// C identifier prefixes (`Gtk`)
    pub identifier_prefixes: Vec<String>,
    /// C symbol prefixes (`gtk`)
    pub symbol_prefixes: Vec<String>,
    /// Immediate includes
    pub includes: BTreeSet<Include>,
    /// Shared libraries to load
    pub shared_libraries: Vec<String>,
    /// C headers
    pub c_includes: Vec<String>,
    /// pkg-config packages
    pub exported_packages: Vec<String>,
    /// Documentation format
    pub doc_format: String,
    pub(crate) names: BTreeMap<String, NodeId>,
    pub(crate) aliases: BTreeMap<String, NodeId>,
    pub(crate) type_names: BTreeMap<String, NodeId>,
    pub(crate) ctypes: BTreeMap<String, NodeId>,
    pub(crate) symbols: BTreeMap<String, NodeId>,
}

impl Namespace {
    /// Create a namespace; prefixes default to the name
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        identifier_prefixes: Option<Vec<String>>,
        symbol_prefixes: Option<Vec<String>>,
    ) -> Self {
        let name = name.into();
        let identifier_prefixes = identifier_prefixes.unwrap_or_else(|| vec![name.clone()]);
        let symbol_prefixes = symbol_prefixes.unwrap_or_else(|| {
            identifier_prefixes
                .iter()
                .map(|p| to_underscores(p).to_lowercase())
                .collect()
        });
        Namespace {
            name,
            version: version.into(),
            identifier_prefixes,
            symbol_prefixes,
            includes: BTreeSet::new(),
            shared_libraries: Vec::new(),
            c_includes: Vec::new(),
            exported_packages: Vec::new(),
            doc_format: "unknown".to_string(),
            names: BTreeMap::new(),
            aliases: BTreeMap::new(),
            type_names: BTreeMap::new(),
            ctypes: BTreeMap::new(),
            symbols: BTreeMap::new(),
        }
    }

    /// Upper-cased symbol prefixes, for constants
    pub fn ucase_symbol_prefixes(&self) -> Vec<String> {
        self.symbol_prefixes.iter().map(|p| p.to_uppercase()).collect()
    }

    /// Member by name
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Whether a member with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Node by C type
    pub fn get_by_ctype(&self, ctype: &str) -> Option<NodeId> {
        self.ctypes.get(ctype).copied()
    }

    /// Function (or enum member) by C symbol
    pub fn get_by_symbol(&self, symbol: &str) -> Option<NodeId> {
        self.symbols.get(symbol).copied()
    }

    /// Registered type by runtime name
    pub fn get_by_gtype_name(&self, gtype_name: &str) -> Option<NodeId> {
        self.type_names.get(gtype_name).copied()
    }

    /// Whether a C type is known
    pub fn has_ctype(&self, ctype: &str) -> bool {
        self.ctypes.contains_key(ctype)
    }

    /// Members in deterministic (name) order
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.names.values().copied()
    }

    /// Member names and ids in name order
    pub fn entries(&self) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.names.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing was appended
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Build a type from a bare or dotted GIR name, fundamentals first
    pub fn type_from_name(&self, name: &str, ctype: Option<&str>) -> Type {
        let mut typ = match fundamental_name(name) {
            Some(fundamental) => Type::fundamental(fundamental),
            None if name.contains('.') => Type::giname(name),
            None => Type::giname(format!("{}.{}", self.name, name)),
        };
        typ.ctype = ctype.map(str::to_string);
        typ
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefixes() {
        let ns = Namespace::new("GObject", "2.0", None, None);
        assert_eq!(ns.identifier_prefixes, vec!["GObject"]);
        assert_eq!(ns.symbol_prefixes, vec!["g_object"]);
        assert_eq!(ns.ucase_symbol_prefixes(), vec!["G_OBJECT"]);
        assert_eq!(ns.doc_format, "unknown");
    }

    #[test]
    fn test_explicit_prefixes() {
        let ns = Namespace::new(
            "Gtk",
            "4.0",
            Some(vec!["Gtk".into(), "Gdk".into()]),
            Some(vec!["gtk".into()]),
        );
        assert_eq!(ns.identifier_prefixes.len(), 2);
        assert_eq!(ns.symbol_prefixes, vec!["gtk"]);
    }

    #[test]
    fn test_include_parsing() {
        let include = Include::from_string("GLib-2.0").unwrap();
        assert_eq!(include.name, "GLib");
        assert_eq!(include.version, "2.0");
        assert_eq!(include.to_string(), "GLib-2.0");
        assert_eq!(include.gir_filename(), "GLib-2.0.gir");
        assert!(Include::from_string("GLib").is_err());
    }

    #[test]
    fn test_type_from_name() {
        let ns = Namespace::new("Foo", "1.0", None, None);
        assert!(ns.type_from_name("utf8", None).is_fundamental("utf8"));
        assert_eq!(ns.type_from_name("Bar", None).target_giname(), Some("Foo.Bar"));
        assert_eq!(
            ns.type_from_name("GObject.Object", Some("GObject*")).target_giname(),
            Some("GObject.Object")
        );
    }
}
