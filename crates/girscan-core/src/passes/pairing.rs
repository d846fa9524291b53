//! Re-homing free functions as constructors, methods and static methods, and
//! linking property accessors

use super::SemanticTransformer;
use crate::ast::types::{BOOLEAN, GTYPE};
use crate::ast::{NodeId, NodeKind, Type};
use crate::diagnostic::WarningCode;
use crate::utils::to_underscores_noprefix;
use tracing::trace;

/// Explicit `(getter)` beats every heuristic
const GETTER_EXPLICIT: u8 = 99;
const GETTER_GET: u8 = 50;
const GETTER_IS: u8 = 25;
const GETTER_BARE: u8 = 10;

fn guess_constructor_by_name(symbol: &str) -> bool {
    symbol.ends_with("_new") || symbol.contains("_new_") || symbol.ends_with("_newv")
}

/// `foo_get_type (void)` returning a `GType`
fn is_type_meta_function(name: &str, params: usize, retval: &Type) -> bool {
    (name.ends_with("_get_type") || name.ends_with("_get_gtype"))
        && params == 0
        && (retval.is_fundamental(GTYPE) || retval.target_giname() == Some("Gtk.Type"))
}

/// Everything after `prefix_` in `symbol`, where `subsymbol` is the part of
/// the symbol without the namespace prefix
fn name_after_prefix(symbol: &str, subsymbol: &str, prefix: &str) -> String {
    let start = symbol.find(subsymbol).unwrap_or(0) + prefix.len() + 1;
    symbol.get(start..).unwrap_or_default().to_string()
}

impl SemanticTransformer<'_> {
    /// `bar_baz` -> `BarBaz` for every registered type and every record
    pub(super) fn build_uscore_type_names(&mut self) {
        let ids: Vec<NodeId> = self.model.main().nodes().collect();
        for id in ids {
            let node = self.model.node(id);
            let key = if node.registration().is_some() && node.get_type().is_some() {
                node.c_symbol_prefix().map(str::to_string)
            } else if matches!(node.kind, NodeKind::Record(_) | NodeKind::Union(_)) {
                Some(to_underscores_noprefix(&node.name).to_lowercase())
            } else {
                None
            };
            if let Some(key) = key {
                self.uscore_type_names.insert(key, id);
            }
        }
    }

    /// Longest known type prefixing an unprefixed underscored symbol
    ///
    /// `text_buffer_try_new` gives `(TextBuffer, "try_new")`.
    pub(super) fn split_uscored_by_type(&self, uscored: &str) -> Option<(NodeId, String)> {
        if let Some(&id) = self.uscore_type_names.get(uscored) {
            return Some((id, String::new()));
        }
        for (pos, _) in uscored.rmatch_indices('_') {
            if let Some(&id) = self.uscore_type_names.get(&uscored[..pos]) {
                return Some((id, uscored[pos + 1..].to_string()));
            }
        }
        None
    }

    fn uscored_identifier_for_type(typ: &Type) -> String {
        to_underscores_noprefix(typ.giname_short().unwrap_or_default()).to_lowercase()
    }

    // ====================================================================
    // Functions
    // ====================================================================

    /// Pair every top-level function with the type it belongs to
    pub(super) fn pair_functions(&mut self) {
        let functions: Vec<NodeId> = self
            .model
            .main()
            .nodes()
            .filter(|id| matches!(self.model.node(*id).kind, NodeKind::Function(_)))
            .collect();
        for id in functions {
            self.pair_function(id);
        }
    }

    fn pair_function(&mut self, id: NodeId) {
        let node = self.model.node(id);
        let Some(func) = node.function() else {
            return;
        };
        let symbol = func.symbol.clone();
        if symbol.starts_with('_')
            || is_type_meta_function(&node.name, func.callable.parameters.len(), &func.callable.retval.typ)
        {
            return;
        }
        let Ok((ns, subsymbol)) = self.model.split_csymbol(&symbol) else {
            return;
        };
        if ns != self.model.main_id() {
            return;
        }

        if self.is_constructor(id, &subsymbol) {
            self.set_up_constructor(id, &subsymbol);
        } else if self.is_method(id, &subsymbol) {
            self.set_up_method(id, &subsymbol);
        } else {
            self.pair_static_method(id, &subsymbol);
        }
    }

    fn is_instantiable(&self, id: NodeId) -> bool {
        let node = self.model.node(id);
        match &node.kind {
            NodeKind::Class(_) => true,
            NodeKind::Record(_) | NodeKind::Union(_) | NodeKind::Boxed(_) => {
                node.get_type().is_some() || node.foreign || node.compound().is_some_and(|c| c.foreign)
            }
            _ => false,
        }
    }

    fn constructor_class(&self, id: NodeId, subsymbol: &str) -> Option<NodeId> {
        match self.split_uscored_by_type(subsymbol) {
            Some((origin, _)) => Some(origin),
            None => {
                let func = self.model.node(id).function()?;
                if func.is_constructor {
                    self.model.lookup_typenode(&func.callable.retval.typ)
                } else {
                    None
                }
            }
        }
    }

    fn is_constructor(&mut self, id: NodeId, subsymbol: &str) -> bool {
        let Some(func) = self.model.node(id).function() else {
            return false;
        };
        let annotated = func.is_constructor;
        let symbol = func.symbol.clone();
        let retval = func.callable.retval.typ.clone();
        let first_param = func.callable.parameters.first().map(|p| p.typ().clone());
        if !annotated && !guess_constructor_by_name(&symbol) {
            return false;
        }

        let target = self.model.lookup_typenode(&retval);
        if !target.is_some_and(|t| self.is_instantiable(t)) {
            if annotated {
                self.warn_node(
                    id,
                    WarningCode::PairingMismatch,
                    format!("{}: Constructors must return an instance of their class", symbol),
                );
            }
            return false;
        }
        let Some(target) = target else {
            return false;
        };

        let Some(origin) = self.constructor_class(id, subsymbol) else {
            if annotated {
                self.warn_node(
                    id,
                    WarningCode::PairingMismatch,
                    format!("Can't find matching type for constructor; symbol='{}'", symbol),
                );
            }
            return false;
        };
        if !self.is_instantiable(origin) {
            return false;
        }
        if self.model.node(origin).namespace != Some(self.model.main_id()) {
            if annotated {
                self.warn_node(
                    id,
                    WarningCode::PairingMismatch,
                    format!(
                        "{}: Constructors must belong to the same namespace as the class they belong to",
                        symbol
                    ),
                );
            }
            return false;
        }
        // taking the object as first argument makes it something else
        if !annotated {
            if let Some(first) = first_param.and_then(|t| self.model.lookup_typenode(&t)) {
                if self.model.giname(first) == self.model.giname(origin) {
                    return false;
                }
            }
        }

        let mismatch = if matches!(self.model.node(target).kind, NodeKind::Class(_)) {
            !self.constructs_subclass_of(origin, target)
        } else {
            origin != target
        };
        if mismatch {
            let message = if matches!(self.model.node(target).kind, NodeKind::Class(_)) {
                "Return value is not superclass for constructor"
            } else {
                "Constructor return type mismatch"
            };
            let constructed = self.model.create_type(origin);
            self.warn_node(
                id,
                WarningCode::PairingMismatch,
                format!(
                    "{}; symbol='{}' constructed='{}' return='{}'",
                    message, symbol, constructed, retval
                ),
            );
            return false;
        }
        true
    }

    /// Whether `target` is `origin` or one of its ancestors
    fn constructs_subclass_of(&self, origin: NodeId, target: NodeId) -> bool {
        let mut current = Some(origin);
        for _ in 0..64 {
            let Some(id) = current else {
                return false;
            };
            if self.model.giname(id) == "GObject.Object" || id == target {
                return true;
            }
            current = self
                .model
                .node(id)
                .class()
                .and_then(|c| c.parent_type.as_ref())
                .and_then(|t| self.model.lookup_typenode(t));
        }
        false
    }

    fn constructor_name(&self, id: NodeId, subsymbol: &str) -> String {
        if let Some((_, name)) = self.split_uscored_by_type(subsymbol) {
            return name;
        }
        let node = self.model.node(id);
        let Some(func) = node.function() else {
            return node.name.clone();
        };
        let retval = &func.callable.retval.typ;
        let prefix = self
            .model
            .lookup_typenode(retval)
            .and_then(|t| self.model.node(t).c_symbol_prefix())
            .filter(|p| subsymbol.starts_with(p))
            .map(str::to_string)
            .unwrap_or_else(|| Self::uscored_identifier_for_type(retval));
        if func.symbol.contains(&prefix) {
            name_after_prefix(&func.symbol, subsymbol, &prefix)
        } else {
            node.name.clone()
        }
    }

    fn set_up_constructor(&mut self, id: NodeId, subsymbol: &str) {
        let Some(origin) = self.constructor_class(id, subsymbol) else {
            return;
        };
        let name = self.constructor_name(id, subsymbol);
        let ns = self.model.main_id();
        self.model.float(ns, id);
        self.model.node_mut(id).name = name;
        if let Some(contents) = self.model.node_mut(origin).contents_mut() {
            contents.constructors.push(id);
        }
        self.model.adopt(origin, id);

        let Some(mut callable) = self.callable_of(id) else {
            return;
        };
        if let Some(func) = self.model.node_mut(id).function_mut() {
            func.is_constructor = true;
        }
        if callable.retval.transfer.is_none() {
            callable.retval.transfer = self.transfer_default(true, &callable.retval);
        }
        trace!(constructor = %self.model.node(id).name, origin = %self.model.node(origin).name, "paired");
        self.store_callable(id, callable);
    }

    fn uscored_prefix(&self, first: &Type, subsymbol: &str) -> String {
        self.model
            .lookup_typenode(first)
            .and_then(|t| self.model.node(t).c_symbol_prefix())
            .filter(|p| subsymbol.starts_with(p))
            .map(str::to_string)
            .unwrap_or_else(|| Self::uscored_identifier_for_type(first))
    }

    fn is_method(&mut self, id: NodeId, subsymbol: &str) -> bool {
        let Some(func) = self.model.node(id).function() else {
            return false;
        };
        let annotated = func.is_method;
        let symbol = func.symbol.clone();
        let Some(first) = func.callable.parameters.first().cloned() else {
            if annotated {
                self.warn_node(
                    id,
                    WarningCode::PairingMismatch,
                    format!("{}: Methods must have parameters", symbol),
                );
            }
            return false;
        };

        let target = self.model.lookup_typenode(first.typ()).filter(|t| {
            matches!(
                self.model.node(*t).kind,
                NodeKind::Class(_)
                    | NodeKind::Interface(_)
                    | NodeKind::Record(_)
                    | NodeKind::Union(_)
                    | NodeKind::Boxed(_)
            )
        });
        let Some(target) = target else {
            if annotated {
                self.warn_node(
                    id,
                    WarningCode::PairingMismatch,
                    format!("{}: Methods must have a pointer as their first parameter", symbol),
                );
            }
            return false;
        };
        if self.model.node(target).namespace != Some(self.model.main_id()) {
            if annotated {
                self.warn_node(
                    id,
                    WarningCode::PairingMismatch,
                    format!(
                        "{}: Methods must belong to the same namespace as the class they belong to",
                        symbol
                    ),
                );
            }
            return false;
        }
        if first.direction.is_out() {
            if annotated {
                let position = self.model.node(id).main_position().cloned();
                self.diagnostics.error(
                    format!(
                        "{}: The first argument of a method cannot be an {}-argument",
                        symbol,
                        first.direction.as_str()
                    ),
                    position.as_ref(),
                );
            }
            return false;
        }
        if first.typ().ctype.as_deref().is_some_and(|c| c.matches('*').count() > 1) {
            return false;
        }
        annotated || subsymbol.starts_with(&self.uscored_prefix(first.typ(), subsymbol))
    }

    fn set_up_method(&mut self, id: NodeId, subsymbol: &str) {
        let Some(func) = self.model.node(id).function() else {
            return;
        };
        let Some(first) = func.callable.parameters.first() else {
            return;
        };
        let prefix = self.uscored_prefix(first.typ(), subsymbol);
        let Some(target) = self.model.lookup_typenode(first.typ()) else {
            return;
        };
        let annotated = func.is_method;
        let symbol = func.symbol.clone();
        let old_name = self.model.node(id).name.clone();

        // `g_resources_register` splits as `g_resource` + `s_register`: keep
        // the free function and add a method pointing at it
        let method = if !annotated && !subsymbol.starts_with(&format!("{}_", prefix)) {
            let copy = self.model.clone_node(id);
            if let Some(func) = self.model.node_mut(copy).function_mut() {
                func.moved_to = Some(old_name);
            }
            copy
        } else {
            let ns = self.model.main_id();
            self.model.float(ns, id);
            id
        };

        let node = self.model.node_mut(method);
        if !annotated {
            node.name = name_after_prefix(&symbol, subsymbol, &prefix);
        }
        if let Some(func) = node.function_mut() {
            func.is_method = true;
            let callable = &mut func.callable;
            if !callable.parameters.is_empty() {
                callable.instance_parameter = Some(callable.parameters.remove(0));
            }
        }
        if let Some(contents) = self.model.node_mut(target).contents_mut() {
            contents.methods.push(method);
        }
        self.model.adopt(target, method);
        trace!(method = %symbol, "paired");
    }

    fn pair_static_method(&mut self, id: NodeId, subsymbol: &str) -> bool {
        let Some((owner, name)) = self.split_uscored_by_type(subsymbol) else {
            return false;
        };
        if name.is_empty() {
            return false;
        }
        let owner_kind = &self.model.node(owner).kind;
        let is_class = matches!(owner_kind, NodeKind::Class(_));
        let keeps_free_function = matches!(
            owner_kind,
            NodeKind::Interface(_)
                | NodeKind::Record(_)
                | NodeKind::Union(_)
                | NodeKind::Boxed(_)
                | NodeKind::Enum(_)
                | NodeKind::Bitfield(_)
        );
        if is_class {
            let ns = self.model.main_id();
            self.model.float(ns, id);
            self.model.node_mut(id).name = name;
            if let Some(contents) = self.model.node_mut(owner).contents_mut() {
                contents.static_methods.push(id);
            }
            self.model.adopt(owner, id);
            true
        } else if keeps_free_function {
            // the free function stays for compatibility and points at its
            // static copy
            let copy = self.model.clone_node(id);
            self.model.node_mut(copy).name = name.clone();
            if let Some(contents) = self.model.node_mut(owner).contents_mut() {
                contents.static_methods.push(copy);
            }
            self.model.adopt(owner, copy);
            let moved_to = format!("{}.{}", self.model.node(owner).name, name);
            if let Some(func) = self.model.node_mut(id).function_mut() {
                func.moved_to = Some(moved_to);
            }
            true
        } else {
            false
        }
    }

    // ====================================================================
    // Property accessors
    // ====================================================================

    /// Link properties with their `set_`/`get_`/`is_` methods
    pub(super) fn pair_property_accessors(&mut self) {
        let types: Vec<NodeId> = self
            .model
            .main()
            .nodes()
            .filter(|id| matches!(self.model.node(*id).kind, NodeKind::Class(_) | NodeKind::Interface(_)))
            .collect();
        for id in types {
            let Some(contents) = self.model.node(id).contents().cloned() else {
                continue;
            };
            for prop in contents.properties {
                self.pair_accessors_of(id, prop, &contents.methods);
            }
        }
    }

    fn pair_accessors_of(&mut self, owner: NodeId, prop: NodeId, methods: &[NodeId]) {
        let prop_node = self.model.node(prop);
        let NodeKind::Property(property) = &prop_node.kind else {
            return;
        };
        if !prop_node.meta.introspectable {
            return;
        }
        let prop_name = prop_node.name.clone();
        let normalized = prop_name.replace('-', "_");
        let is_boolean = property.typ.is_fundamental(BOOLEAN);

        let setter = match &property.setter {
            Some(setter) => Some(setter.clone()),
            None if property.writable && !property.construct_only => Some(format!("set_{}", normalized)),
            None => None,
        };
        let mut candidates: Vec<(String, u8)> = Vec::new();
        match &property.getter {
            Some(getter) => candidates.push((getter.clone(), GETTER_EXPLICIT)),
            None if property.readable => {
                candidates.push((format!("get_{}", normalized), GETTER_GET));
                if is_boolean && !normalized.starts_with("is_") {
                    candidates.push((format!("is_{}", normalized), GETTER_IS));
                }
                if is_boolean && !property.writable {
                    candidates.push((normalized.clone(), GETTER_BARE));
                }
            }
            None => {}
        }
        let priority = |name: &str| candidates.iter().find(|(n, _)| n == name).map(|(_, p)| *p);

        let mut chosen_setter = None;
        let mut chosen_getter: Option<String> = None;
        let mut found = Vec::new();
        for &method in methods {
            let node = self.model.node(method);
            if !node.meta.introspectable {
                continue;
            }
            let Some(func) = node.function() else {
                continue;
            };
            let method_name = node.name.clone();
            let symbol = func.symbol.clone();

            if setter.as_deref() == Some(method_name.as_str()) {
                if let Some(other) = func.set_property.as_deref().filter(|p| *p != prop_name) {
                    let message = format!(
                        "Setter method '{}' for property '{}' has a mismatched '(set-property {})' annotation",
                        symbol, prop_name, other
                    );
                    self.warn_node(method, WarningCode::AccessorConflict, message);
                }
                if let Some(func) = self.model.node_mut(method).function_mut() {
                    func.set_property = Some(prop_name.clone());
                }
                chosen_setter = Some(method_name);
                continue;
            }

            let Some(candidate_priority) = priority(&method_name) else {
                continue;
            };
            found.push(method_name.clone());
            if let Some(other) = func.get_property.as_deref().filter(|p| *p != prop_name) {
                let message = format!(
                    "Getter method '{}' for property '{}' has a mismatched '(get-property {})' annotation",
                    symbol, prop_name, other
                );
                self.warn_node(method, WarningCode::AccessorConflict, message);
            }
            if let Some(func) = self.model.node_mut(method).function_mut() {
                func.get_property = Some(prop_name.clone());
            }
            let current = chosen_getter.as_deref().and_then(priority);
            if current.map_or(true, |current| candidate_priority >= current) {
                chosen_getter = Some(method_name);
            }
        }

        if let NodeKind::Property(property) = &mut self.model.node_mut(prop).kind {
            if chosen_setter.is_some() {
                property.setter = chosen_setter;
            }
            if chosen_getter.is_some() {
                property.getter = chosen_getter.clone();
            }
        }
        if found.len() > 1 {
            let owner_name = self.model.node(owner).name.clone();
            let options: Vec<String> = found.iter().map(|c| format!("- '(getter {})'", c)).collect();
            self.warn_node(
                owner,
                WarningCode::AccessorConflict,
                format!(
                    "Multiple getter candidates for property '{}:{}' found, '{}' was chosen by a heuristic. \
                     Please annotate the property with one of the following to ensure it is consistent:\n{}",
                    owner_name,
                    prop_name,
                    chosen_getter.unwrap_or_default(),
                    options.join("\n")
                ),
            );
        }
    }

    // ====================================================================
    // Enumeration members
    // ====================================================================

    pub(super) fn check_member_names(&mut self) {
        let enums: Vec<NodeId> = self
            .model
            .main()
            .nodes()
            .filter(|id| matches!(self.model.node(*id).kind, NodeKind::Enum(_) | NodeKind::Bitfield(_)))
            .collect();
        for id in enums {
            let Some(enumeration) = self.model.node(id).enumeration() else {
                continue;
            };
            let ctype = enumeration.ctype.clone().unwrap_or_default();
            let numeric: Vec<String> = enumeration
                .members
                .iter()
                .map(|m| self.model.node(*m))
                .filter(|m| m.name.starts_with(|c: char| c.is_ascii_digit()))
                .map(|m| m.symbol().unwrap_or(&m.name).to_string())
                .collect();
            for symbol in numeric {
                self.strict_node(
                    id,
                    WarningCode::NumericMemberName,
                    format!("Member {} for enumeration {} starts with a number", symbol, ctype),
                );
            }
        }
    }
}
