//! Introspectability decisions
//!
//! Runs after the semantic passes. A node that cannot be called or read
//! safely from a binding loses its `introspectable` flag; the flag only ever
//! goes from true to false, and spreads from types to the fields,
//! parameters and callables that use them.

use crate::annotation::{CommentBlocks, Tag};
use crate::ast::types::{ANY, LONG_DOUBLE, LONG_LONG, LONG_ULONG, VALIST};
use crate::ast::{Model, NodeId, NodeKind, Transfer, Type, TypeContainer, TypeKind, TypeTarget};
use crate::diagnostic::{Diagnostics, WarningCode};
use crate::error::ScanError;
use tracing::debug;

type VisitFn<'a> =
    fn(&mut IntrospectabilityValidator<'a>, NodeId, &[NodeId]) -> Result<bool, ScanError>;

/// Callback types whose parameters never need a `(scope)` annotation
const SCOPED_CALLBACKS: &[&str] = &["GLib.DestroyNotify", "Gio.AsyncReadyCallback"];

/// Marks nodes of the main namespace that bindings cannot use
pub struct IntrospectabilityValidator<'a> {
    model: &'a mut Model,
    diagnostics: &'a mut Diagnostics,
    blocks: &'a CommentBlocks,
}

fn collision_key(name: &str) -> String {
    name.to_lowercase().replace('-', "_")
}

impl<'a> IntrospectabilityValidator<'a> {
    pub fn new(model: &'a mut Model, diagnostics: &'a mut Diagnostics, blocks: &'a CommentBlocks) -> Self {
        IntrospectabilityValidator {
            model,
            diagnostics,
            blocks,
        }
    }

    /// Run every walk in order
    pub fn validate(&mut self) -> Result<(), ScanError> {
        self.run("alias analysis", Self::visit_alias)?;
        self.run("skip propagation", Self::visit_propagate_skips)?;
        self.run("parameter analysis", Self::visit_analyze)?;
        // twice, so callables see what the first round decided
        self.run("callable analysis", Self::visit_callable)?;
        self.run("callable analysis", Self::visit_callable)?;
        self.run("property analysis", Self::visit_properties)?;
        self.run("field propagation", Self::visit_fields_and_signals)?;
        self.run("back-compat copies", Self::visit_backcompat)?;
        self.run("name collisions", Self::visit_collisions)?;
        Ok(())
    }

    fn run(&mut self, name: &'static str, pass: VisitFn<'a>) -> Result<(), ScanError> {
        debug!(pass = name, "running validator pass");
        let roots: Vec<NodeId> = self.model.main().nodes().collect();
        let mut chain = Vec::new();
        for root in roots {
            self.visit(root, &mut chain, pass)?;
        }
        Ok(())
    }

    fn visit(&mut self, id: NodeId, chain: &mut Vec<NodeId>, pass: VisitFn<'a>) -> Result<(), ScanError> {
        if !pass(self, id, chain)? {
            return Ok(());
        }
        chain.push(id);
        for child in self.model.children(id) {
            self.visit(child, chain, pass)?;
        }
        chain.pop();
        Ok(())
    }

    fn mark(&mut self, id: NodeId) {
        self.model.node_mut(id).meta.introspectable = false;
    }

    fn is_skipped(&self, id: NodeId) -> bool {
        self.model.node(id).meta.skip
    }

    fn type_is_introspectable(&self, typ: &Type) -> bool {
        match &typ.kind {
            TypeKind::Array { element, .. } | TypeKind::List { element, .. } => {
                return self.type_is_introspectable(element);
            }
            TypeKind::Map { key, value } => {
                return self.type_is_introspectable(key) && self.type_is_introspectable(value);
            }
            TypeKind::Varargs => return true,
            TypeKind::Plain => {}
        }
        match &typ.target {
            TypeTarget::Unresolved | TypeTarget::Unknown => false,
            TypeTarget::Foreign(_) => true,
            // no typelib tags wide enough for these
            TypeTarget::Fundamental(name) => {
                ![VALIST, LONG_LONG, LONG_ULONG, LONG_DOUBLE].contains(&name.as_str())
            }
            TypeTarget::GiName(_) => self.model.lookup_typenode(typ).is_some_and(|target| {
                let meta = &self.model.node(target).meta;
                meta.introspectable && !meta.skip
            }),
        }
    }

    /// Resolved node behind a type, aliases followed
    fn target_of(&self, typ: &Type) -> Option<NodeId> {
        self.model
            .lookup_typenode(typ)
            .and_then(|id| self.model.resolve_aliases(id).ok())
    }

    /// Warn about a parameter or return value of `parent`
    ///
    /// Callbacks and virtual methods stay quiet: their signatures come from
    /// struct fields that are rarely annotated.
    fn slot_warning(&mut self, parent: NodeId, slot: &TypeContainer<'_>, code: WarningCode, text: &str) {
        let node = self.model.node(parent);
        if matches!(node.kind, NodeKind::VFunction(_) | NodeKind::Callback(_)) {
            return;
        }
        let mut position = node.main_position().cloned();
        let mut prefix = String::new();
        let mut block = None;
        if let Some(symbol) = node.symbol() {
            prefix = format!("{}: ", symbol);
            block = self.blocks.get(symbol);
            if let Some(block) = block {
                position = Some(block.position.clone());
            }
        }
        let context = match slot {
            TypeContainer::Param(param) => format!("argument {}: ", param.argname),
            TypeContainer::Return(_) => {
                if let Some(tag) = block.and_then(|b| b.tag(Tag::Returns.as_str())) {
                    position = Some(tag.position.clone());
                }
                "return value: ".to_string()
            }
        };
        self.diagnostics
            .warn(code, format!("{}{}{}", prefix, context, text), position.as_ref());
    }

    /// Whether a parameter or return value is usable; warns when it is not
    fn check_slot(&mut self, parent: NodeId, slot: &TypeContainer<'_>) -> bool {
        if slot.meta().skip {
            return true;
        }
        let typ = slot.typ();
        if !typ.is_resolved() {
            let text = format!("Unresolved type: '{}'", typ.unresolved_string());
            self.slot_warning(parent, slot, WarningCode::UnresolvedType, &text);
            return false;
        }
        if typ.is_varargs() {
            return false;
        }
        if matches!(typ.kind, TypeKind::Array { .. } | TypeKind::List { .. })
            && typ.element_type().is_some_and(|e| e.is_fundamental(ANY))
        {
            self.slot_warning(parent, slot, WarningCode::MissingElementType, "Missing (element-type) annotation");
            return false;
        }

        let target = self.target_of(typ);
        let callback = target.filter(|t| matches!(self.model.node(*t).kind, NodeKind::Callback(_)));
        match slot {
            TypeContainer::Param(param) => {
                if let Some(callback) = callback {
                    let giname = self.model.giname(callback);
                    if !SCOPED_CALLBACKS.contains(&giname.as_str()) && param.scope.is_none() {
                        self.slot_warning(
                            parent,
                            slot,
                            WarningCode::MissingScope,
                            "Missing (scope) annotation for callback without GDestroyNotify (valid: call, async, forever)",
                        );
                        return false;
                    }
                }
            }
            TypeContainer::Return(_) => {
                if callback.is_some() {
                    self.slot_warning(
                        parent,
                        slot,
                        WarningCode::CallbackReturn,
                        "Callbacks cannot be return values; use (skip)",
                    );
                    return false;
                }
                if let Some(target) = target {
                    let node = self.model.node(target);
                    if let NodeKind::Record(c) | NodeKind::Union(c) = &node.kind {
                        let bare = c.registration.get_type.is_none()
                            && (c.copy_func.is_none() || c.free_func.is_none())
                            && !c.foreign
                            && !node.foreign;
                        if bare {
                            if slot.transfer() == Some(Transfer::None) {
                                return true;
                            }
                            self.slot_warning(
                                parent,
                                slot,
                                WarningCode::BareStructReturn,
                                "Invalid non-constant return of bare structure or union; register as boxed type, add (copy-func) and (free-func), or (skip)",
                            );
                            return false;
                        }
                    }
                }
            }
        }

        if slot.transfer().is_none() {
            self.slot_warning(parent, slot, WarningCode::MissingTransfer, "Missing (transfer) annotation");
            return false;
        }
        true
    }

    fn compound_fields(&self, id: NodeId) -> Option<Vec<NodeId>> {
        match &self.model.node(id).kind {
            NodeKind::Class(_) | NodeKind::Interface(_) | NodeKind::Record(_) | NodeKind::Union(_) => {
                self.model.node(id).contents().map(|c| c.fields.clone())
            }
            _ => None,
        }
    }

    // ====================================================================
    // Walks
    // ====================================================================

    fn visit_alias(&mut self, id: NodeId, _chain: &[NodeId]) -> Result<bool, ScanError> {
        if let NodeKind::Alias(alias) = &self.model.node(id).kind {
            if !self.type_is_introspectable(&alias.target) {
                self.mark(id);
            }
        }
        Ok(true)
    }

    /// Callables touching a skipped type are skipped too
    fn visit_propagate_skips(&mut self, id: NodeId, _chain: &[NodeId]) -> Result<bool, ScanError> {
        let Some(callable) = self.model.node(id).callable() else {
            return Ok(true);
        };
        let skipped = callable
            .parameters
            .iter()
            .map(|p| p.typ())
            .chain(std::iter::once(&callable.retval.typ))
            .filter(|t| t.target_giname().is_some())
            .filter_map(|t| self.model.lookup_typenode(t))
            .any(|target| self.is_skipped(target));
        if skipped {
            self.model.node_mut(id).meta.skip = true;
        }
        Ok(true)
    }

    fn visit_analyze(&mut self, id: NodeId, _chain: &[NodeId]) -> Result<bool, ScanError> {
        if self.is_skipped(id) {
            return Ok(false);
        }
        if let Some(callable) = self.model.node(id).callable().cloned() {
            // every slot is checked so each one gets its warning
            let mut usable = true;
            for param in &callable.parameters {
                usable &= self.check_slot(id, &TypeContainer::Param(param));
            }
            usable &= self.check_slot(id, &TypeContainer::Return(&callable.retval));
            if !usable {
                self.mark(id);
            }
        }
        for field in self.compound_fields(id).unwrap_or_default() {
            let hidden = match &self.model.node(field).kind {
                NodeKind::Field(f) => f.typ.as_ref().is_some_and(|t| !self.type_is_introspectable(t)),
                _ => false,
            };
            if hidden {
                self.mark(field);
            }
        }
        Ok(true)
    }

    fn visit_callable(&mut self, id: NodeId, chain: &[NodeId]) -> Result<bool, ScanError> {
        if self.is_skipped(id) {
            return Ok(false);
        }
        let node = self.model.node(id);
        if let Some(callable) = node.callable() {
            let unusable = callable
                .parameters
                .iter()
                .map(|p| p.typ())
                .chain(std::iter::once(&callable.retval.typ))
                .any(|t| !self.type_is_introspectable(t));
            if unusable {
                self.mark(id);
                return Ok(true);
            }
        }
        let is_inline = node.function().is_some_and(|f| f.is_inline);
        let is_signal = matches!(node.kind, NodeKind::Signal(_));
        if is_inline {
            self.mark(id);
        }
        if is_signal {
            if let Some(&owner) = chain.last() {
                self.check_emitter(owner, id);
            }
            return Ok(false);
        }
        Ok(true)
    }

    /// An emitter method must take the signal's arguments and return its type
    fn check_emitter(&mut self, owner: NodeId, signal: NodeId) {
        let NodeKind::Signal(sig) = &self.model.node(signal).kind else {
            return;
        };
        let Some(emitter) = sig.emitter.clone() else {
            return;
        };
        let sig_call = sig.callable.clone();
        let methods = self
            .model
            .node(owner)
            .contents()
            .map(|c| c.methods.clone())
            .unwrap_or_default();
        let Some(method) = methods.into_iter().find(|m| self.model.node(*m).name == emitter) else {
            return;
        };
        let Some(method_call) = self.model.node(method).callable() else {
            return;
        };

        let problem = if !method_call.retval.typ.is_equiv(&sig_call.retval.typ) {
            Some("does not have the same return value type".to_string())
        } else if method_call.parameters.len() != sig_call.parameters.len() {
            Some(format!(
                "does not have the same number of arguments (expected: {})",
                sig_call.parameters.len()
            ))
        } else if method_call
            .parameters
            .iter()
            .zip(&sig_call.parameters)
            .any(|(m, s)| !m.typ().is_equiv(s.typ()))
        {
            Some("does not have the same type of arguments".to_string())
        } else {
            None
        };
        let Some(problem) = problem else {
            return;
        };

        let symbol = self.model.node(method).symbol().unwrap_or_default().to_string();
        let message = format!(
            "Emitter method {} for signal {}::{} {}",
            symbol,
            self.model.node(owner).name,
            self.model.node(signal).name,
            problem
        );
        let position = self.model.node(owner).main_position().cloned();
        self.diagnostics
            .warn(WarningCode::EmitterMismatch, message, position.as_ref());
        if let NodeKind::Signal(sig) = &mut self.model.node_mut(signal).kind {
            sig.emitter = None;
        }
    }

    /// Properties of unusable types lose their accessors, and accessors
    /// lose their link to them
    fn visit_properties(&mut self, id: NodeId, _chain: &[NodeId]) -> Result<bool, ScanError> {
        if self.is_skipped(id) {
            return Ok(false);
        }
        if !matches!(self.model.node(id).kind, NodeKind::Class(_) | NodeKind::Interface(_)) {
            return Ok(true);
        }
        let Some(contents) = self.model.node(id).contents().cloned() else {
            return Ok(true);
        };
        for &prop in &contents.properties {
            let unusable = match &self.model.node(prop).kind {
                NodeKind::Property(p) => !self.type_is_introspectable(&p.typ),
                _ => false,
            };
            if unusable {
                let node = self.model.node_mut(prop);
                node.meta.introspectable = false;
                if let NodeKind::Property(p) = &mut node.kind {
                    p.setter = None;
                    p.getter = None;
                }
            }
        }

        let dead: Vec<String> = contents
            .properties
            .iter()
            .map(|p| self.model.node(*p))
            .filter(|p| !p.meta.introspectable)
            .map(|p| p.name.clone())
            .collect();
        for method in contents.methods {
            if let Some(func) = self.model.node_mut(method).function_mut() {
                if func.set_property.as_ref().is_some_and(|p| dead.contains(p)) {
                    func.set_property = None;
                }
                if func.get_property.as_ref().is_some_and(|p| dead.contains(p)) {
                    func.get_property = None;
                }
            }
        }
        Ok(true)
    }

    fn visit_fields_and_signals(&mut self, id: NodeId, _chain: &[NodeId]) -> Result<bool, ScanError> {
        if self.is_skipped(id) {
            return Ok(false);
        }
        for field in self.compound_fields(id).unwrap_or_default() {
            let unusable = match &self.model.node(field).kind {
                NodeKind::Field(f) => match (f.anonymous_node, &f.typ) {
                    (Some(anonymous), _) => !self.model.node(anonymous).meta.introspectable,
                    (None, Some(typ)) => !self.type_is_introspectable(typ),
                    (None, None) => false,
                },
                _ => false,
            };
            if unusable {
                self.mark(field);
            }
        }
        if matches!(self.model.node(id).kind, NodeKind::Class(_) | NodeKind::Interface(_)) {
            let signals = self
                .model
                .node(id)
                .contents()
                .map(|c| c.signals.clone())
                .unwrap_or_default();
            for signal in signals {
                self.visit_callable(signal, &[id])?;
            }
        }
        Ok(true)
    }

    /// Back-compat copies that cannot be used are not written at all
    fn visit_backcompat(&mut self, id: NodeId, _chain: &[NodeId]) -> Result<bool, ScanError> {
        if self.is_skipped(id) {
            return Ok(false);
        }
        let introspectable = self.model.node(id).meta.introspectable;
        if let Some(func) = self.model.node_mut(id).function_mut() {
            if func.moved_to.is_some() && !introspectable {
                func.internal_skipped = true;
            }
        }
        Ok(true)
    }

    fn visit_collisions(&mut self, id: NodeId, _chain: &[NodeId]) -> Result<bool, ScanError> {
        if self.is_skipped(id) {
            return Ok(false);
        }
        if !matches!(self.model.node(id).kind, NodeKind::Class(_) | NodeKind::Interface(_)) {
            return Ok(true);
        }
        let Some(contents) = self.model.node(id).contents().cloned() else {
            return Ok(true);
        };
        let live_names = |ids: &[NodeId]| -> Vec<String> {
            ids.iter()
                .map(|i| self.model.node(*i))
                .filter(|n| !n.meta.skip && n.meta.introspectable)
                .map(|n| collision_key(&n.name))
                .collect()
        };
        let signals = live_names(&contents.signals);
        let methods = live_names(&contents.methods);
        let vfuncs = live_names(&contents.virtual_methods);

        let owner = self.model.node(id).name.clone();
        let position = self.model.node(id).main_position().cloned();
        let mut report = |kind: &str, label: &str, name: &str, against: &[(&Vec<String>, &str)]| {
            let key = collision_key(name);
            for (names, what) in against {
                for _ in names.iter().filter(|n| **n == key) {
                    self.diagnostics.strict(
                        WarningCode::NameCollision,
                        format!(
                            "{} {}:{}: {} cannot have the same name as {}",
                            kind, owner, name, label, what
                        ),
                        position.as_ref(),
                    );
                }
            }
        };

        for prop in &contents.properties {
            let node = self.model.node(*prop);
            if node.meta.skip || !node.meta.introspectable {
                continue;
            }
            report(
                "property",
                "Properties",
                &node.name,
                &[(&signals, "signals"), (&methods, "methods"), (&vfuncs, "virtual methods")],
            );
        }
        for signal in &contents.signals {
            let node = self.model.node(*signal);
            if node.meta.skip || !node.meta.introspectable {
                continue;
            }
            // an emitter method shares its signal's name
            let emitter = match &node.kind {
                NodeKind::Signal(sig) => sig.emitter.as_deref().map(collision_key),
                _ => None,
            };
            let methods: Vec<String> = methods
                .iter()
                .filter(|m| emitter.as_ref() != Some(*m))
                .cloned()
                .collect();
            report(
                "signal",
                "Signals",
                &node.name,
                &[(&methods, "methods"), (&vfuncs, "virtual methods")],
            );
        }
        Ok(true)
    }
}
