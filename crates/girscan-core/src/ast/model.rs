//! The node arena and namespace bookkeeping
//!
//! All nodes of every namespace live in one arena. The namespace scanned in
//! this run is the main namespace (always id 0); included dependency
//! namespaces follow in load order.

use super::namespace::{Namespace, NamespaceId};
use super::node::{Node, NodeId, NodeKind};
use super::types::Type;
use crate::error::ScanError;

/// Callback used by [`Model::walk`]
///
/// Receives the model, the visited node and its ancestor chain. Returning
/// `Ok(false)` skips the node's children.
pub type WalkFn<'a> = dyn FnMut(&mut Model, NodeId, &[NodeId]) -> Result<bool, ScanError> + 'a;

/// Arena of nodes plus the namespaces that index them
#[derive(Debug, Clone)]
pub struct Model {
    nodes: Vec<Node>,
    namespaces: Vec<Namespace>,
    /// Accept identifiers and symbols without a known prefix
    pub accept_unprefixed: bool,
}

impl Model {
    /// Create a model around the main namespace
    pub fn new(main: Namespace) -> Self {
        Model {
            nodes: Vec::new(),
            namespaces: vec![main],
            accept_unprefixed: false,
        }
    }

    // ====================================================================
    // Namespaces
    // ====================================================================

    /// Id of the namespace being scanned
    pub fn main_id(&self) -> NamespaceId {
        NamespaceId(0)
    }

    /// The namespace being scanned
    pub fn main(&self) -> &Namespace {
        &self.namespaces[0]
    }

    /// Mutable access to the namespace being scanned
    pub fn main_mut(&mut self) -> &mut Namespace {
        &mut self.namespaces[0]
    }

    /// Namespace by id
    pub fn namespace(&self, id: NamespaceId) -> &Namespace {
        &self.namespaces[id.index()]
    }

    /// Mutable namespace by id
    pub fn namespace_mut(&mut self, id: NamespaceId) -> &mut Namespace {
        &mut self.namespaces[id.index()]
    }

    /// Register a dependency namespace
    pub fn add_namespace(&mut self, namespace: Namespace) -> NamespaceId {
        let id = NamespaceId(self.namespaces.len() as u32);
        self.namespaces.push(namespace);
        id
    }

    /// Namespace by name
    pub fn namespace_by_name(&self, name: &str) -> Option<NamespaceId> {
        self.namespaces
            .iter()
            .position(|ns| ns.name == name)
            .map(|i| NamespaceId(i as u32))
    }

    /// Ids of included namespaces, in load order
    pub fn included_ids(&self) -> impl Iterator<Item = NamespaceId> {
        (1..self.namespaces.len()).map(|i| NamespaceId(i as u32))
    }

    /// All namespace ids, the main namespace first
    pub fn namespace_ids(&self) -> impl Iterator<Item = NamespaceId> {
        (0..self.namespaces.len()).map(|i| NamespaceId(i as u32))
    }

    /// Whether a namespace with this name was loaded as a dependency
    pub fn is_included(&self, name: &str) -> bool {
        self.namespaces.iter().skip(1).any(|ns| ns.name == name)
    }

    // ====================================================================
    // Nodes
    // ====================================================================

    /// Allocate a detached node
    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Node by id
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Mutable node by id
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Copy a node into a fresh, detached arena slot
    pub fn clone_node(&mut self, id: NodeId) -> NodeId {
        let copy = self.node(id).clone();
        self.alloc(copy)
    }

    /// `Namespace.Name` of a tracked node
    pub fn giname(&self, id: NodeId) -> String {
        let node = self.node(id);
        match node.namespace {
            Some(ns) => format!("{}.{}", self.namespace(ns).name, node.name),
            None => node.name.clone(),
        }
    }

    /// Namespace name concatenated with the node name
    pub fn c_name(&self, id: NodeId) -> String {
        let node = self.node(id);
        match node.namespace {
            Some(ns) => format!("{}{}", self.namespace(ns).name, node.name),
            None => node.name.clone(),
        }
    }

    /// A resolved type pointing at a tracked node
    pub fn create_type(&self, id: NodeId) -> Type {
        Type::giname(self.giname(id))
    }

    /// Direct children in walk order
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let node = self.node(id);
        let anonymous = |fields: &[NodeId]| -> Vec<NodeId> {
            fields
                .iter()
                .filter_map(|f| match &self.node(*f).kind {
                    NodeKind::Field(field) => field.anonymous_node,
                    _ => None,
                })
                .collect()
        };
        let mut out = Vec::new();
        match &node.kind {
            NodeKind::Enum(e) | NodeKind::Bitfield(e) => {
                out.extend(&e.contents.static_methods);
            }
            NodeKind::Record(c) | NodeKind::Union(c) => {
                let c = &c.contents;
                out.extend(&c.constructors);
                out.extend(&c.methods);
                out.extend(&c.static_methods);
                out.extend(anonymous(&c.fields));
            }
            NodeKind::Boxed(b) | NodeKind::Pointer(b) => {
                let c = &b.contents;
                out.extend(&c.constructors);
                out.extend(&c.methods);
                out.extend(&c.static_methods);
            }
            NodeKind::Class(class) => {
                let c = &class.contents;
                out.extend(&c.methods);
                out.extend(&c.virtual_methods);
                out.extend(&c.static_methods);
                out.extend(&c.constructors);
                out.extend(anonymous(&c.fields));
                out.extend(&c.signals);
                out.extend(&c.properties);
            }
            NodeKind::Interface(iface) => {
                let c = &iface.contents;
                out.extend(&c.methods);
                out.extend(&c.static_methods);
                out.extend(&c.virtual_methods);
                out.extend(anonymous(&c.fields));
                out.extend(&c.signals);
                out.extend(&c.properties);
            }
            _ => {}
        }
        out
    }

    /// Visit every node of a namespace and its children, depth first
    ///
    /// Top-level nodes are visited in name order; the set is snapshotted
    /// before the walk starts.
    pub fn walk(&mut self, ns: NamespaceId, callback: &mut WalkFn<'_>) -> Result<(), ScanError> {
        let roots: Vec<NodeId> = self.namespace(ns).nodes().collect();
        let mut chain = Vec::new();
        for root in roots {
            self.walk_node(root, &mut chain, callback)?;
        }
        Ok(())
    }

    /// Visit one node and its children
    pub fn walk_node(
        &mut self,
        id: NodeId,
        chain: &mut Vec<NodeId>,
        callback: &mut WalkFn<'_>,
    ) -> Result<(), ScanError> {
        if !callback(self, id, chain)? {
            return Ok(());
        }
        chain.push(id);
        for child in self.children(id) {
            self.walk_node(child, chain, callback)?;
        }
        chain.pop();
        Ok(())
    }

    // ====================================================================
    // Namespace membership
    // ====================================================================

    /// Add a node's derived index entries without making it a member
    pub fn track(&mut self, ns: NamespaceId, id: NodeId) {
        if self.node(id).namespace == Some(ns) {
            return;
        }
        self.set_namespace_recursive(id, Some(ns));

        let node = self.node(id);
        let symbols = self.indexed_symbols(id);
        let mut alias = None;
        let mut gtype = None;
        match &node.kind {
            NodeKind::Alias(_) => alias = Some(node.name.clone()),
            NodeKind::Function(_) => {}
            _ => {
                if let Some(gtype_name) = node.gtype_name() {
                    gtype = Some(gtype_name.to_string());
                }
            }
        }
        let ctype = node.ctype().map(str::to_string);

        let namespace = self.namespace_mut(ns);
        if let Some(name) = alias {
            namespace.aliases.insert(name, id);
        }
        if let Some(gtype_name) = gtype {
            namespace.type_names.insert(gtype_name, id);
        }
        for (symbol, target) in symbols {
            namespace.symbols.insert(symbol, target);
        }
        if let Some(ctype) = ctype {
            namespace.ctypes.insert(ctype, id);
        }
    }

    /// C symbols a node contributes to the symbol index: its own for a
    /// function, those of paired functions and of enum members otherwise
    fn indexed_symbols(&self, id: NodeId) -> Vec<(String, NodeId)> {
        let node = self.node(id);
        let mut symbols = Vec::new();
        if let NodeKind::Function(f) = &node.kind {
            symbols.push((f.symbol.clone(), id));
        }
        if let Some(contents) = node.contents() {
            for fid in contents
                .methods
                .iter()
                .chain(&contents.static_methods)
                .chain(&contents.constructors)
            {
                if let NodeKind::Function(f) = &self.node(*fid).kind {
                    symbols.push((f.symbol.clone(), *fid));
                }
            }
        }
        if let Some(e) = node.enumeration() {
            for mid in &e.members {
                if let NodeKind::Member(m) = &self.node(*mid).kind {
                    symbols.push((m.symbol.clone(), *mid));
                }
            }
        }
        symbols
    }

    fn set_namespace_recursive(&mut self, id: NodeId, ns: Option<NamespaceId>) {
        self.node_mut(id).namespace = ns;
        let mut children = self.children(id);
        let node = self.node(id);
        if let Some(contents) = node.contents() {
            children.extend(&contents.fields);
        }
        if let Some(e) = node.enumeration() {
            children.extend(&e.members);
        }
        for child in children {
            if self.node(child).namespace != ns {
                self.set_namespace_recursive(child, ns);
            }
        }
    }

    /// Make a node a member of a namespace
    ///
    /// A distinct node already holding the name is a fatal conflict unless
    /// `replace` is set, in which case the previous occupant is removed first.
    pub fn append(&mut self, ns: NamespaceId, id: NodeId, replace: bool) -> Result<(), ScanError> {
        let name = self.node(id).name.clone();
        if let Some(previous) = self.namespace(ns).get(&name) {
            if previous != id {
                if !replace {
                    return Err(ScanError::NamespaceConflict { name });
                }
                self.remove(ns, previous);
            }
        }
        self.track(ns, id);
        self.namespace_mut(ns).names.insert(name, id);
        Ok(())
    }

    /// Undo every effect of [`Model::append`]
    pub fn remove(&mut self, ns: NamespaceId, id: NodeId) {
        let node = self.node(id);
        let name = node.name.clone();
        let is_alias = matches!(node.kind, NodeKind::Alias(_));
        let gtype_name = node.gtype_name().map(str::to_string);
        let ctype = node.ctype().map(str::to_string);
        let symbols = self.indexed_symbols(id);

        let namespace = self.namespace_mut(ns);
        if is_alias {
            namespace.aliases.remove(&name);
        } else if let Some(gtype_name) = gtype_name {
            if namespace.type_names.get(&gtype_name) == Some(&id) {
                namespace.type_names.remove(&gtype_name);
            }
        }
        if let Some(ctype) = ctype {
            if namespace.ctypes.get(&ctype) == Some(&id) {
                namespace.ctypes.remove(&ctype);
            }
        }
        for (symbol, target) in symbols {
            if namespace.symbols.get(&symbol) == Some(&target) {
                namespace.symbols.remove(&symbol);
            }
        }
        if namespace.names.get(&name) == Some(&id) {
            namespace.names.remove(&name);
        }
        self.set_namespace_recursive(id, None);
    }

    /// Like [`Model::remove`], but the function stays reachable by symbol
    /// and keeps its namespace back-reference
    pub fn float(&mut self, ns: NamespaceId, id: NodeId) {
        let symbol = self.node(id).function().map(|f| f.symbol.clone());
        self.remove(ns, id);
        if let Some(symbol) = symbol {
            self.namespace_mut(ns).symbols.insert(symbol, id);
        }
        self.node_mut(id).namespace = Some(ns);
    }

    /// Register a runtime type name for a record or union after the fact
    pub fn add_gtype(&mut self, id: NodeId, gtype_name: &str, get_type: &str) {
        if let Some(registration) = self.node_mut(id).registration_mut() {
            registration.gtype_name = Some(gtype_name.to_string());
            registration.get_type = Some(get_type.to_string());
        }
        if let Some(ns) = self.node(id).namespace {
            self.namespace_mut(ns)
                .type_names
                .insert(gtype_name.to_string(), id);
        }
    }

    /// Attach `child` to `parent`, inheriting the parent's namespace
    pub fn adopt(&mut self, parent: NodeId, child: NodeId) {
        let ns = self.node(parent).namespace;
        let node = self.node_mut(child);
        node.parent = Some(parent);
        if ns.is_some() {
            node.namespace = ns;
        }
    }

    // ====================================================================
    // Lookup
    // ====================================================================

    /// Resolve `Name` or `Ns.Name`
    ///
    /// References through an identifier prefix of the main namespace that is
    /// not itself a loaded namespace fall back to the main namespace.
    pub fn lookup_giname(&self, name: &str) -> Option<NodeId> {
        let main = self.main();
        match name.split_once('.') {
            None => main.get(name),
            Some((ns, short)) if ns == main.name => main.get(short),
            Some((ns, short)) => match self.namespace_by_name(ns) {
                Some(id) => self.namespace(id).get(short),
                None if main.identifier_prefixes.iter().any(|p| p == ns) => main.get(short),
                None => None,
            },
        }
    }

    /// Whether resolving `name` goes through a deprecated prefix fallback
    pub fn is_deprecated_prefix_reference(&self, name: &str) -> bool {
        match name.split_once('.') {
            Some((ns, _)) => {
                ns != self.main().name
                    && self.namespace_by_name(ns).is_none()
                    && self.main().identifier_prefixes.iter().any(|p| p == ns)
            }
            None => false,
        }
    }

    /// Node targeted by a type, if it names one
    pub fn lookup_typenode(&self, typ: &Type) -> Option<NodeId> {
        typ.target_giname().and_then(|name| self.lookup_giname(name))
    }

    /// Follow alias chains to the first non-alias
    ///
    /// Returns `Err` with the final fundamental type when the chain ends in
    /// one rather than a node.
    pub fn resolve_aliases(&self, id: NodeId) -> Result<NodeId, Type> {
        let mut current = id;
        let mut seen = 0usize;
        loop {
            match &self.node(current).kind {
                NodeKind::Alias(alias) => {
                    if let Some(name) = alias.target.target_giname() {
                        match self.lookup_giname(name) {
                            Some(next) => current = next,
                            None => return Ok(current),
                        }
                    } else if alias.target.target_fundamental().is_some() {
                        return Err(alias.target.clone());
                    } else {
                        return Ok(current);
                    }
                }
                _ => return Ok(current),
            }
            seen += 1;
            if seen > self.nodes.len() {
                return Ok(current);
            }
        }
    }

    /// Namespace id owning a node, if tracked
    pub fn namespace_of(&self, id: NodeId) -> Option<NamespaceId> {
        self.node(id).namespace
    }

    /// Whether a `Ns.Name` target exists and is a live node
    pub fn target_exists(&self, typ: &Type) -> bool {
        self.lookup_typenode(typ).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::callable::{Callable, Return};
    use crate::ast::node::{Alias, Compound, Function, Registration};

    fn function(model: &mut Model, name: &str, symbol: &str) -> NodeId {
        model.alloc(Node::new(
            name,
            NodeKind::Function(Function::new(
                Callable::new(Return::new(Type::none()), Vec::new(), false),
                symbol,
            )),
        ))
    }

    fn record(model: &mut Model, name: &str, ctype: &str, gtype: Option<&str>) -> NodeId {
        let mut compound = Compound::new(Some(ctype.to_string()));
        if let Some(g) = gtype {
            compound.registration = Registration {
                gtype_name: Some(g.to_string()),
                get_type: Some("foo_get_type".to_string()),
                c_symbol_prefix: None,
            };
        }
        model.alloc(Node::new(name, NodeKind::Record(compound)))
    }

    #[test]
    fn test_append_tracks_indexes() {
        let mut model = Model::new(Namespace::new("Foo", "1.0", None, None));
        let ns = model.main_id();
        let rect = record(&mut model, "Rect", "FooRect", Some("FooRect"));
        let func = function(&mut model, "rect_new", "foo_rect_new");
        model.append(ns, rect, false).unwrap();
        model.append(ns, func, false).unwrap();

        let main = model.main();
        assert_eq!(main.get("Rect"), Some(rect));
        assert_eq!(main.get_by_ctype("FooRect"), Some(rect));
        assert_eq!(main.get_by_gtype_name("FooRect"), Some(rect));
        assert_eq!(main.get_by_symbol("foo_rect_new"), Some(func));
        assert_eq!(model.giname(rect), "Foo.Rect");
    }

    #[test]
    fn test_append_conflict_is_fatal_unless_replace() {
        let mut model = Model::new(Namespace::new("Foo", "1.0", None, None));
        let ns = model.main_id();
        let a = record(&mut model, "Rect", "FooRect", None);
        let b = record(&mut model, "Rect", "FooRect2", None);
        model.append(ns, a, false).unwrap();
        model.append(ns, a, false).unwrap();
        assert!(matches!(
            model.append(ns, b, false),
            Err(ScanError::NamespaceConflict { .. })
        ));

        model.append(ns, b, true).unwrap();
        assert_eq!(model.main().get("Rect"), Some(b));
        assert_eq!(model.main().get_by_ctype("FooRect"), None);
        assert_eq!(model.node(a).namespace, None);
    }

    #[test]
    fn test_remove_inverts_append() {
        let mut model = Model::new(Namespace::new("Foo", "1.0", None, None));
        let ns = model.main_id();
        let rect = record(&mut model, "Rect", "FooRect", Some("FooRect"));
        model.append(ns, rect, false).unwrap();
        model.remove(ns, rect);
        let main = model.main();
        assert!(main.is_empty());
        assert_eq!(main.get_by_ctype("FooRect"), None);
        assert_eq!(main.get_by_gtype_name("FooRect"), None);
        assert_eq!(model.node(rect).namespace, None);
    }

    #[test]
    fn test_remove_clears_member_symbols() {
        let mut model = Model::new(Namespace::new("Foo", "1.0", None, None));
        let ns = model.main_id();
        let rect = record(&mut model, "Rect", "FooRect", None);
        let area = function(&mut model, "area", "foo_rect_area");
        model.adopt(rect, area);
        model.node_mut(rect).contents_mut().unwrap().methods.push(area);
        model.append(ns, rect, false).unwrap();
        assert_eq!(model.main().get_by_symbol("foo_rect_area"), Some(area));
        assert_eq!(model.node(area).namespace, Some(ns));

        model.remove(ns, rect);
        assert_eq!(model.main().get_by_symbol("foo_rect_area"), None);
        assert_eq!(model.node(area).namespace, None);
    }

    #[test]
    fn test_float_keeps_symbol_lookup() {
        let mut model = Model::new(Namespace::new("Foo", "1.0", None, None));
        let ns = model.main_id();
        let func = function(&mut model, "rect_new", "foo_rect_new");
        model.append(ns, func, false).unwrap();
        model.float(ns, func);
        assert_eq!(model.main().get("rect_new"), None);
        assert_eq!(model.main().get_by_symbol("foo_rect_new"), Some(func));
        assert_eq!(model.node(func).namespace, Some(ns));
    }

    #[test]
    fn test_walk_visits_children_with_chain() {
        let mut model = Model::new(Namespace::new("Foo", "1.0", None, None));
        let ns = model.main_id();
        let rect = record(&mut model, "Rect", "FooRect", None);
        let method = function(&mut model, "area", "foo_rect_area");
        model
            .node_mut(rect)
            .contents_mut()
            .unwrap()
            .methods
            .push(method);
        model.adopt(rect, method);
        model.append(ns, rect, false).unwrap();

        let mut seen = Vec::new();
        model
            .walk(ns, &mut |model, id, chain| {
                seen.push((model.node(id).name.clone(), chain.len()));
                Ok(true)
            })
            .unwrap();
        assert_eq!(seen, vec![("Rect".to_string(), 0), ("area".to_string(), 1)]);
        assert_eq!(model.main().get_by_symbol("foo_rect_area"), Some(method));

        let mut count = 0;
        model
            .walk(ns, &mut |_, _, _| {
                count += 1;
                Ok(false)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_resolve_aliases() {
        let mut model = Model::new(Namespace::new("Foo", "1.0", None, None));
        let ns = model.main_id();
        let rect = record(&mut model, "Rect", "FooRect", None);
        let alias = model.alloc(Node::new(
            "Box",
            NodeKind::Alias(Alias {
                target: Type::giname("Foo.Rect"),
                ctype: Some("FooBox".into()),
            }),
        ));
        let int_alias = model.alloc(Node::new(
            "Size",
            NodeKind::Alias(Alias {
                target: Type::fundamental("gint"),
                ctype: Some("FooSize".into()),
            }),
        ));
        model.append(ns, rect, false).unwrap();
        model.append(ns, alias, false).unwrap();
        model.append(ns, int_alias, false).unwrap();
        assert_eq!(model.resolve_aliases(alias), Ok(rect));
        assert!(model.resolve_aliases(int_alias).unwrap_err().is_fundamental("gint"));
    }

    #[test]
    fn test_lookup_giname_prefix_fallback() {
        let mut model = Model::new(Namespace::new(
            "Meta",
            "1.0",
            Some(vec!["Meta".into(), "Mutter".into()]),
            None,
        ));
        let ns = model.main_id();
        let rect = record(&mut model, "Rect", "MetaRect", None);
        model.append(ns, rect, false).unwrap();
        assert_eq!(model.lookup_giname("Rect"), Some(rect));
        assert_eq!(model.lookup_giname("Meta.Rect"), Some(rect));
        assert_eq!(model.lookup_giname("Mutter.Rect"), Some(rect));
        assert!(model.is_deprecated_prefix_reference("Mutter.Rect"));
        assert_eq!(model.lookup_giname("Gtk.Rect"), None);
    }
}
