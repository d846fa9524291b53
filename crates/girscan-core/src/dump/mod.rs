//! Merging runtime type information into the scanned namespace
//!
//! The static scan only sees C declarations. Class hierarchies, properties,
//! signals and enum nicknames come from the object system at runtime, through
//! a probe binary that answers for every collected get-type function.
//!
//! Merging happens in two halves:
//! - [`DumpMerger::init_parse`] runs before the probe and collects the
//!   functions to ask about;
//! - [`DumpMerger::parse`] folds the dump into the namespace, pairs boxed
//!   types with their structs, finds class structs and drops the get-type
//!   functions that are now carried by the types themselves.

pub mod probe;
pub mod xml;

pub use probe::{request_lines, DumpSource, IntrospectionBinary};
pub use xml::{DumpDocument, DumpEntry, DumpKind, DumpMember, DumpProperty, DumpSignal, DumpType};

use crate::ast::types::GTYPE;
use crate::ast::{
    Boxed, Callable, Class, Enumeration, Interface, Member, Model, Node, NodeId, NodeKind,
    Parameter, Property, Registration, Return, Signal, Transfer, Type,
};
use crate::diagnostic::{Diagnostics, WarningCode};
use crate::error::{NameError, ScanError};
use crate::scanner::name_error_code;
use crate::utils::to_underscores;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// `GParamFlags` bits reported for properties
const PARAM_READABLE: u32 = 1 << 0;
const PARAM_WRITABLE: u32 = 1 << 1;
const PARAM_CONSTRUCT: u32 = 1 << 2;
const PARAM_CONSTRUCT_ONLY: u32 = 1 << 3;

/// Folds a runtime type dump into the main namespace
pub struct DumpMerger<'a> {
    model: &'a mut Model,
    diagnostics: &'a mut Diagnostics,
    get_type_functions: Vec<String>,
    error_quark_functions: Vec<String>,
    boxed_types: BTreeMap<String, NodeId>,
    pointer_types: BTreeMap<String, NodeId>,
}

impl<'a> DumpMerger<'a> {
    /// Create a merger over the model's main namespace
    pub fn new(model: &'a mut Model, diagnostics: &'a mut Diagnostics) -> Self {
        DumpMerger {
            model,
            diagnostics,
            get_type_functions: Vec::new(),
            error_quark_functions: Vec::new(),
            boxed_types: BTreeMap::new(),
            pointer_types: BTreeMap::new(),
        }
    }

    /// Get-type functions collected by [`DumpMerger::init_parse`]
    pub fn get_type_functions(&self) -> &[String] {
        &self.get_type_functions
    }

    /// Error-quark functions collected by [`DumpMerger::init_parse`]
    pub fn error_quark_functions(&self) -> &[String] {
        &self.error_quark_functions
    }

    // ====================================================================
    // Before the probe
    // ====================================================================

    /// Collect probe requests; synthesize the built-in GObject/GLib types
    pub fn init_parse(&mut self) -> Result<(), ScanError> {
        let ids: Vec<NodeId> = self.model.main().nodes().collect();
        for &id in &ids {
            self.initparse_function(id);
        }

        let name = self.model.main().name.clone();
        if name == "GObject" || name == "GLib" {
            for &id in &ids {
                if matches!(self.model.node(id).kind, NodeKind::Record(_)) {
                    self.initparse_gobject_record(id)?;
                }
            }
        }
        debug!(
            get_types = self.get_type_functions.len(),
            error_quarks = self.error_quark_functions.len(),
            "collected probe requests"
        );
        Ok(())
    }

    fn initparse_function(&mut self, id: NodeId) {
        let Some(func) = self.model.node(id).function() else {
            return;
        };
        let symbol = func.symbol.clone();
        if symbol.starts_with('_') {
            return;
        }
        if symbol.ends_with("_get_type") || symbol.ends_with("_get_gtype") {
            // variants are registered internally
            if symbol != "g_variant_get_gtype" && self.is_type_meta_function(id) {
                self.get_type_functions.push(symbol);
            }
        } else if symbol.ends_with("_error_quark")
            && func.callable.retval.typ.ctype.as_deref() == Some("GQuark")
        {
            self.error_quark_functions.push(symbol);
        }
    }

    /// A parameterless `*_get_type` returning `GType`
    fn is_type_meta_function(&mut self, id: NodeId) -> bool {
        let node = self.model.node(id);
        let Some(func) = node.function() else {
            return false;
        };
        if !(node.name.ends_with("_get_type") || node.name.ends_with("_get_gtype")) {
            return false;
        }
        if !func.callable.parameters.is_empty() {
            return false;
        }
        let rettype = &func.callable.retval.typ;
        if !rettype.is_fundamental(GTYPE) && rettype.target_giname() != Some("Gtk.Type") {
            let message = format!("function '{}' returns '{}', not a GType", node.name, rettype);
            let position = node.main_position().cloned();
            self.diagnostics
                .warn(WarningCode::DumpMismatch, message, position.as_ref());
            return false;
        }
        true
    }

    fn initparse_gobject_record(&mut self, id: NodeId) -> Result<(), ScanError> {
        let ns = self.model.main_id();
        let name = self.model.node(id).name.clone();
        if name.starts_with("ParamSpec")
            && !matches!(name.as_str(), "ParamSpecPool" | "ParamSpecClass" | "ParamSpecTypeInfo")
        {
            let ctype = self.model.node(id).ctype().unwrap_or_default().to_string();
            let class = Class {
                ctype: Some(ctype.clone()),
                registration: Registration {
                    // GParamSpecXxx registers as GParamXxx
                    gtype_name: Some(ctype.replace("Spec", "")),
                    get_type: Some("intern".to_string()),
                    c_symbol_prefix: Some(to_underscores(&name).to_lowercase()),
                },
                parent_type: (name != "ParamSpec").then(|| Type::giname("GObject.ParamSpec")),
                fundamental: true,
                is_abstract: name == "ParamSpec",
                ..Default::default()
            };
            let class_id = self.model.alloc(Node::new(name, NodeKind::Class(class)));
            self.add_record_fields(class_id);
            self.model.append(ns, class_id, true)?;
        } else if name == "Variant" {
            let boxed = Boxed {
                registration: Registration {
                    gtype_name: Some("GVariant".to_string()),
                    get_type: Some("intern".to_string()),
                    c_symbol_prefix: Some("variant".to_string()),
                },
                ..Default::default()
            };
            let boxed_id = self.model.alloc(Node::new("Variant", NodeKind::Boxed(boxed)));
            self.boxed_types.insert("GVariant".to_string(), boxed_id);
        } else if name == "InitiallyUnownedClass" {
            // InitiallyUnowned shares the layout of Object
            let Some(object_class) = self.model.main().get("ObjectClass") else {
                return Ok(());
            };
            let source_fields = self
                .model
                .node(object_class)
                .compound()
                .map(|c| c.contents.fields.clone())
                .unwrap_or_default();
            let mut fields = Vec::with_capacity(source_fields.len());
            for field in source_fields {
                let copy = self.model.clone_node(field);
                self.model.adopt(id, copy);
                fields.push(copy);
            }
            if let Some(record) = self.model.node_mut(id).compound_mut() {
                record.contents.fields = fields;
                record.opaque = false;
                record.disguised = false;
            }
        }
        Ok(())
    }

    // ====================================================================
    // After the probe
    // ====================================================================

    /// Obtain the dump from `source` and merge it
    pub fn merge(&mut self, source: &DumpSource) -> Result<(), ScanError> {
        let document = source.load(&self.get_type_functions, &self.error_quark_functions)?;
        self.parse(&document)
    }

    /// Merge a parsed dump into the namespace
    pub fn parse(&mut self, document: &DumpDocument) -> Result<(), ScanError> {
        for entry in &document.entries {
            match entry {
                DumpEntry::ErrorQuark { function, domain } => {
                    self.introspect_error_quark(function, domain)
                }
                DumpEntry::Type(dump) => match self.introspect_type(dump) {
                    Err(ScanError::Name(err)) => self.diagnostics.warn(
                        WarningCode::DumpMismatch,
                        format!("dropping runtime type '{}': {}", dump.name, err),
                        None,
                    ),
                    result => result?,
                },
            }
        }

        for (gtype_name, boxed) in std::mem::take(&mut self.boxed_types) {
            self.pair_boxed_type(&gtype_name, boxed)?;
        }
        for (gtype_name, pointer) in std::mem::take(&mut self.pointer_types) {
            self.pair_pointer_type(&gtype_name, pointer)?;
        }
        let ids: Vec<NodeId> = self.model.main().nodes().collect();
        for id in ids {
            if matches!(
                self.model.node(id).kind,
                NodeKind::Class(_) | NodeKind::Interface(_)
            ) {
                self.find_class_record(id);
            }
        }
        self.remove_get_type_functions();
        debug!(entries = document.entries.len(), "merged runtime type dump");
        Ok(())
    }

    fn introspect_type(&mut self, dump: &DumpType) -> Result<(), ScanError> {
        match dump.kind {
            DumpKind::Enum | DumpKind::Flags => self.introspect_enum(dump),
            DumpKind::Class => self.introspect_class(dump, false),
            DumpKind::Fundamental => self.introspect_class(dump, true),
            DumpKind::Interface => self.introspect_interface(dump),
            DumpKind::Boxed => self.introspect_boxed(dump),
            DumpKind::Pointer => self.introspect_pointer(dump),
        }
    }

    /// Symbol prefix implied by the get-type function
    fn symbol_prefix(&self, dump: &DumpType) -> Result<String, ScanError> {
        let (ns, name) = self
            .model
            .split_csymbol(dump.get_type.trim_start_matches('_'))?;
        if ns != self.model.main_id() {
            return Err(NameError::ForeignSymbol(self.model.namespace(ns).name.clone()).into());
        }
        if name == "get_type" || name == "get_gtype" {
            return Err(ScanError::IncompatibleTypeName {
                type_name: dump.name.clone(),
                prefixes: self.model.main().identifier_prefixes.clone(),
            });
        }
        let prefix = name
            .strip_suffix("_get_type")
            .or_else(|| name.strip_suffix("_get_gtype"))
            .unwrap_or(&name);
        Ok(prefix.to_string())
    }

    fn registration(dump: &DumpType, c_symbol_prefix: String) -> Registration {
        Registration {
            gtype_name: Some(dump.name.clone()),
            get_type: Some(dump.get_type.clone()),
            c_symbol_prefix: Some(c_symbol_prefix),
        }
    }

    fn introspect_enum(&mut self, dump: &DumpType) -> Result<(), ScanError> {
        let prefix = self.symbol_prefix(dump)?;
        let enum_name = self.model.strip_identifier(&dump.name)?;

        // runtime values win; the scanned member only contributes its symbol
        let mut previous: BTreeMap<String, String> = BTreeMap::new();
        let mut positions = BTreeSet::new();
        if let Some(prev) = self.model.main().get(&enum_name) {
            let prev_node = self.model.node(prev);
            if let Some(e) = prev_node.enumeration() {
                positions = prev_node.file_positions.clone();
                for member_id in &e.members {
                    let member = self.model.node(*member_id);
                    if let NodeKind::Member(m) = &member.kind {
                        previous.insert(member.name.clone(), m.symbol.clone());
                    }
                }
            }
        }

        let enumeration = Enumeration {
            ctype: Some(dump.name.clone()),
            registration: Self::registration(dump, prefix),
            ..Default::default()
        };
        let kind = if dump.kind == DumpKind::Flags {
            NodeKind::Bitfield(enumeration)
        } else {
            NodeKind::Enum(enumeration)
        };
        let mut node = Node::new(enum_name, kind);
        node.file_positions = positions;
        let id = self.model.alloc(node);

        let mut members = Vec::with_capacity(dump.members.len());
        for member in &dump.members {
            let name = member.nick.replace('-', "_");
            let value = member.value;
            let symbol = previous
                .get(&name)
                .cloned()
                .unwrap_or_else(|| member.name.clone());
            let member_id = self.model.alloc(Node::new(
                name,
                NodeKind::Member(Member {
                    value,
                    symbol,
                    nick: Some(member.nick.clone()),
                    dump_name: Some(member.name.clone()),
                }),
            ));
            self.model.adopt(id, member_id);
            members.push(member_id);
        }
        if let NodeKind::Enum(e) | NodeKind::Bitfield(e) = &mut self.model.node_mut(id).kind {
            e.members = members;
        }
        let ns = self.model.main_id();
        self.model.append(ns, id, true)
    }

    fn introspect_class(&mut self, dump: &DumpType, fundamental: bool) -> Result<(), ScanError> {
        let prefix = self.symbol_prefix(dump)?;
        let name = match self.model.strip_identifier(&dump.name) {
            Ok(name) => name,
            Err(err) if fundamental => {
                self.diagnostics
                    .warn(name_error_code(&err), err.to_string(), None);
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let class = Class {
            registration: Self::registration(dump, prefix),
            parent_chain: dump.parents.iter().map(|p| Type::from_gtype_name(p)).collect(),
            fundamental,
            is_abstract: dump.is_abstract,
            is_final: dump.is_final,
            interfaces: dump
                .implements
                .iter()
                .map(|i| Type::from_gtype_name(i))
                .collect(),
            ..Default::default()
        };
        let id = self.model.alloc(Node::new(name, NodeKind::Class(class)));
        if !fundamental {
            self.introspect_properties(id, dump);
            self.introspect_signals(id, dump);
        }
        self.add_record_fields(id);
        let ns = self.model.main_id();
        self.model.append(ns, id, true)
    }

    fn introspect_interface(&mut self, dump: &DumpType) -> Result<(), ScanError> {
        let prefix = self.symbol_prefix(dump)?;
        let name = self.model.strip_identifier(&dump.name)?;
        let interface = Interface {
            registration: Self::registration(dump, prefix),
            prerequisites: dump
                .prerequisites
                .iter()
                .map(|p| Type::from_gtype_name(p))
                .collect(),
            ..Default::default()
        };
        let id = self.model.alloc(Node::new(name.clone(), NodeKind::Interface(interface)));
        self.introspect_properties(id, dump);
        self.introspect_signals(id, dump);

        let record = self
            .model
            .main()
            .get(&name)
            .filter(|r| matches!(self.model.node(*r).kind, NodeKind::Record(_)));
        match record {
            Some(record) => {
                let ctype = self.model.node(record).ctype().map(str::to_string);
                let positions = self.model.node(record).file_positions.clone();
                let node = self.model.node_mut(id);
                node.file_positions.extend(positions);
                if let NodeKind::Interface(iface) = &mut node.kind {
                    iface.ctype = ctype;
                }
            }
            None => self.diagnostics.warn(
                WarningCode::DumpMismatch,
                format!("Couldn't find associated structure for '{}'", name),
                None,
            ),
        }

        // private interfaces such as GtkFileChooserEmbed
        if dump.get_type.starts_with('_') {
            debug!(interface = %dump.name, "skipping private interface");
            return Ok(());
        }
        let ns = self.model.main_id();
        self.model.append(ns, id, true)
    }

    fn introspect_boxed(&mut self, dump: &DumpType) -> Result<(), ScanError> {
        // legacy GStreamer name that clashes with the ParamSpec classes
        if dump.name == "GParamSpecMiniObject" {
            let boxed = Boxed {
                registration: Registration {
                    gtype_name: Some(dump.name.clone()),
                    get_type: Some("gst_param_spec_mini_object_get_type".to_string()),
                    c_symbol_prefix: Some("param_spec_mini_object".to_string()),
                },
                ..Default::default()
            };
            let id = self
                .model
                .alloc(Node::new("ParamSpecMiniObject", NodeKind::Boxed(boxed)));
            self.boxed_types.insert(dump.name.clone(), id);
            return Ok(());
        }
        let name = self.model.strip_identifier(&dump.name)?;
        let prefix = self.symbol_prefix(dump)?;
        let boxed = Boxed {
            registration: Self::registration(dump, prefix),
            ..Default::default()
        };
        let id = self.model.alloc(Node::new(name, NodeKind::Boxed(boxed)));
        self.boxed_types.insert(dump.name.clone(), id);
        Ok(())
    }

    fn introspect_pointer(&mut self, dump: &DumpType) -> Result<(), ScanError> {
        let name = self.model.strip_identifier(&dump.name)?;
        let prefix = self.symbol_prefix(dump)?;
        let pointer = Boxed {
            registration: Self::registration(dump, prefix),
            ..Default::default()
        };
        let id = self.model.alloc(Node::new(name, NodeKind::Pointer(pointer)));
        self.pointer_types.insert(dump.name.clone(), id);
        Ok(())
    }

    fn introspect_properties(&mut self, owner: NodeId, dump: &DumpType) {
        for pspec in &dump.properties {
            let property = Property {
                typ: Type::from_gtype_name(&pspec.type_name),
                readable: pspec.flags & PARAM_READABLE != 0,
                writable: pspec.flags & PARAM_WRITABLE != 0,
                construct: pspec.flags & PARAM_CONSTRUCT != 0,
                construct_only: pspec.flags & PARAM_CONSTRUCT_ONLY != 0,
                transfer: Transfer::None,
                setter: None,
                getter: None,
                default_value: pspec.default_value.clone(),
            };
            let id = self
                .model
                .alloc(Node::new(pspec.name.clone(), NodeKind::Property(property)));
            self.model.adopt(owner, id);
            if let Some(contents) = self.model.node_mut(owner).contents_mut() {
                contents.properties.push(id);
            }
        }
    }

    fn introspect_signals(&mut self, owner: NodeId, dump: &DumpType) {
        for info in &dump.signals {
            let parameters = info
                .params
                .iter()
                .enumerate()
                .map(|(i, type_name)| {
                    let argname = if i == 0 {
                        "object".to_string()
                    } else {
                        format!("p{}", i - 1)
                    };
                    let mut param = Parameter::new(argname, Some(Type::from_gtype_name(type_name)));
                    param.transfer = Some(Transfer::None);
                    param
                })
                .collect();
            let signal = Signal {
                callable: Callable::new(
                    Return::new(Type::from_gtype_name(&info.return_type)),
                    parameters,
                    false,
                ),
                when: info.when.clone(),
                no_recurse: info.no_recurse,
                detailed: info.detailed,
                action: info.action,
                no_hooks: info.no_hooks,
                emitter: None,
            };
            let id = self
                .model
                .alloc(Node::new(info.name.clone(), NodeKind::Signal(signal)));
            self.model.adopt(owner, id);
            if let Some(contents) = self.model.node_mut(owner).contents_mut() {
                contents.signals.push(id);
            }
        }
    }

    /// Move the fields of the same-named instance struct onto a class
    ///
    /// Instance fields are read-only.
    fn add_record_fields(&mut self, class_id: NodeId) {
        let name = self.model.node(class_id).name.clone();
        let Some(record) = self.model.main().get(&name) else {
            return;
        };
        let record_node = self.model.node(record);
        let NodeKind::Record(compound) = &record_node.kind else {
            return;
        };
        let ctype = compound.ctype.clone();
        let fields = compound.contents.fields.clone();
        let positions = record_node.file_positions.clone();

        for &field in &fields {
            self.model.adopt(class_id, field);
            if let NodeKind::Field(f) = &mut self.model.node_mut(field).kind {
                f.writable = false;
            }
        }
        let node = self.model.node_mut(class_id);
        node.file_positions.extend(positions);
        if let NodeKind::Class(class) = &mut node.kind {
            class.ctype = ctype;
            class.contents.fields = fields;
        }
    }

    fn introspect_error_quark(&mut self, function: &str, domain: &str) {
        let Some(id) = self.model.main().get_by_symbol(function) else {
            return;
        };
        if let Some(func) = self.model.node_mut(id).function_mut() {
            func.error_domain = Some(domain.to_string());
        }
    }

    /// A boxed type either registers a same-named struct or stays bare
    fn pair_boxed_type(&mut self, gtype_name: &str, boxed: NodeId) -> Result<(), ScanError> {
        let ns = self.model.main_id();
        let name = self.model.node(boxed).name.clone();
        match self.model.main().get(&name) {
            None => self.model.append(ns, boxed, false)?,
            Some(pair) => self.register_compound(pair, boxed, true),
        }
        Ok(())
    }

    /// A pointer type only ever registers a same-named struct
    fn pair_pointer_type(&mut self, gtype_name: &str, pointer: NodeId) -> Result<(), ScanError> {
        let name = self.model.node(pointer).name.clone();
        match self.model.main().get(&name) {
            Some(pair) => self.register_compound(pair, pointer, false),
            None => debug!(pointer = gtype_name, "dropping bare pointer type"),
        }
        Ok(())
    }

    fn register_compound(&mut self, pair: NodeId, registered: NodeId, clear_disguised: bool) {
        if !matches!(
            self.model.node(pair).kind,
            NodeKind::Record(_) | NodeKind::Union(_)
        ) {
            return;
        }
        let registration = self
            .model
            .node(registered)
            .registration()
            .cloned()
            .unwrap_or_default();
        let (Some(gtype_name), Some(get_type)) = (registration.gtype_name, registration.get_type)
        else {
            return;
        };
        self.model.add_gtype(pair, &gtype_name, &get_type);
        if let Some(compound) = self.model.node_mut(pair).compound_mut() {
            compound.registration.c_symbol_prefix = registration.c_symbol_prefix;
            if clear_disguised {
                compound.disguised = false;
            }
        }
    }

    /// Link a class or interface with its `Class`/`Iface`/`Interface` struct
    fn find_class_record(&mut self, id: NodeId) {
        let node = self.model.node(id);
        let suffixes: &[&str] = match node.kind {
            NodeKind::Class(_) => &["Class"],
            _ => &["Iface", "Interface"],
        };
        let name = node.name.clone();
        let Some(pair) = suffixes
            .iter()
            .find_map(|suffix| self.model.main().get(&format!("{}{}", name, suffix)))
        else {
            return;
        };
        if !matches!(self.model.node(pair).kind, NodeKind::Record(_)) {
            return;
        }

        let struct_type = self.model.create_type(pair);
        let class_type = self.model.create_type(id);
        let positions = self.model.node(pair).file_positions.clone();
        let node = self.model.node_mut(id);
        node.file_positions.extend(positions);
        match &mut node.kind {
            NodeKind::Class(class) => class.glib_type_struct = Some(struct_type),
            NodeKind::Interface(iface) => iface.glib_type_struct = Some(struct_type),
            _ => {}
        }

        let mut fields = Vec::new();
        if let Some(record) = self.model.node_mut(pair).compound_mut() {
            record.is_gtype_struct_for = Some(class_type);
            fields = record.contents.fields.clone();
        }
        for field in fields {
            if let NodeKind::Field(f) = &mut self.model.node_mut(field).kind {
                f.writable = false;
            }
        }
    }

    /// Drop get-type functions now carried by their types
    fn remove_get_type_functions(&mut self) {
        let ns = self.model.main_id();
        let mut to_remove = BTreeSet::new();
        let mut consumed = BTreeSet::new();
        let ids: Vec<NodeId> = self.model.main().nodes().collect();
        for id in ids {
            let node = self.model.node(id);
            if !node.is_registered_type() {
                continue;
            }
            let Some(get_type) = node.get_type() else {
                continue;
            };
            if get_type == "intern" {
                continue;
            }
            let function = match self.model.split_csymbol(get_type) {
                Ok((owner, name)) if owner == ns => self.model.main().get(&name),
                _ => None,
            };
            match function {
                Some(function) => {
                    to_remove.insert(function);
                    consumed.insert(get_type.to_string());
                }
                None => {
                    let message = format!(
                        "dropping '{}': get-type function '{}' is not in the namespace",
                        node.name, get_type
                    );
                    let position = node.main_position().cloned();
                    self.diagnostics
                        .warn(WarningCode::DumpMismatch, message, position.as_ref());
                    to_remove.insert(id);
                }
            }
        }

        for symbol in &self.get_type_functions {
            if consumed.contains(symbol) {
                continue;
            }
            let Some(function) = self.model.main().get_by_symbol(symbol) else {
                continue;
            };
            let node = self.model.node(function);
            if self.model.main().get(&node.name) != Some(function) {
                continue;
            }
            let message = format!("no runtime type matches get-type function '{}'", symbol);
            let position = node.main_position().cloned();
            self.diagnostics
                .warn(WarningCode::DumpMismatch, message, position.as_ref());
            to_remove.insert(function);
        }

        for id in to_remove {
            self.model.remove(ns, id);
        }
    }
}
