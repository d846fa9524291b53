//! Converting declarations into model nodes
//!
//! Structs and unions live in C's tag namespace until a typedef names them.
//! The traversal keeps that namespace on the side and promotes the
//! compounds that never got a typedef under their stripped tag name.

use super::resolve::{complete_source_ctype, source_ctype, type_from_ctype_string, type_from_source, TypeUse};
use super::symbol::{CTypeKind, SourceType, Symbol, SymbolKind};
use crate::ast::types::{fundamental_name, ArrayType, Type, TypeKind, ANY, BOOLEAN, INT};
use crate::ast::{
    Alias, Callable, Callback, Compound, Constant, Enumeration, Field, Function, FunctionMacro,
    Member, Model, Node, NodeId, NodeKind, Parameter, Registration, Return,
};
use crate::diagnostic::{Diagnostics, WarningCode};
use crate::error::{NameError, ScanError};
use std::collections::BTreeMap;
use tracing::debug;

/// Warning code for a declaration that could not be mapped onto a namespace
pub fn name_error_code(err: &NameError) -> WarningCode {
    match err {
        NameError::UnknownIdentifierNamespace(_) | NameError::UnknownSymbolNamespace(_) => {
            WarningCode::UnknownNamespace
        }
        NameError::ForeignIdentifier { .. } | NameError::ForeignSymbol(_) => {
            WarningCode::SymbolConversion
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompoundKind {
    Record,
    Union,
}

impl CompoundKind {
    fn wrap(self, compound: Compound) -> NodeKind {
        match self {
            CompoundKind::Record => NodeKind::Record(compound),
            CompoundKind::Union => NodeKind::Union(compound),
        }
    }
}

/// Builds the main namespace from a symbol stream
pub struct Transformer<'a> {
    model: &'a mut Model,
    diagnostics: &'a mut Diagnostics,
    tag_ns: BTreeMap<String, NodeId>,
}

impl<'a> Transformer<'a> {
    /// Create a transformer appending into the model's main namespace
    pub fn new(model: &'a mut Model, diagnostics: &'a mut Diagnostics) -> Self {
        Transformer {
            model,
            diagnostics,
            tag_ns: BTreeMap::new(),
        }
    }

    /// Convert every symbol and append the results
    ///
    /// Symbols outside the namespace prefixes are warned about and skipped;
    /// a name claimed by two unrelated nodes is fatal.
    pub fn parse(&mut self, symbols: &[Symbol]) -> Result<(), ScanError> {
        for symbol in symbols {
            if symbol.ident() == "gst_g_error_get_type" {
                continue;
            }
            let node = match self.traverse_one(symbol, None) {
                Ok(Some(node)) => node,
                Ok(None) => continue,
                Err(ScanError::Name(err)) => {
                    self.diagnostics.warn(
                        name_error_code(&err),
                        format!("{}: {}", symbol.ident(), err),
                        symbol.position().as_ref(),
                    );
                    continue;
                }
                Err(err) => return Err(err),
            };

            if !self.model.node(node).name.is_empty() {
                self.append_new_node(node)?;
            }
            if let Some(tag) = self.model.node(node).compound().and_then(|c| c.tag_name.clone()) {
                self.tag_ns.entry(tag).or_insert(node);
            }
        }

        let pending: Vec<(String, NodeId)> = self
            .tag_ns
            .iter()
            .filter(|(_, id)| self.model.node(**id).name.is_empty())
            .map(|(tag, id)| (tag.clone(), *id))
            .collect();
        for (tag, id) in pending {
            match self.model.strip_identifier(&tag) {
                Ok(name) => {
                    self.model.node_mut(id).name = name;
                    self.append_new_node(id)?;
                }
                Err(err) => {
                    let position = self.model.node(id).main_position().cloned();
                    self.diagnostics
                        .warn(name_error_code(&err), err.to_string(), position.as_ref());
                }
            }
        }

        debug!(
            namespace = %self.model.main().name,
            nodes = self.model.main().len(),
            "traversed symbols"
        );
        Ok(())
    }

    fn append_new_node(&mut self, id: NodeId) -> Result<(), ScanError> {
        let name = self.model.node(id).name.clone();
        let main = self.model.main_id();
        let Some(original) = self.model.main().get(&name) else {
            return self.model.append(main, id, false);
        };
        if original == id {
            return Ok(());
        }
        let is_macro = |n: &Node| matches!(n.kind, NodeKind::FunctionMacro(_));
        let is_const = |n: &Node| matches!(n.kind, NodeKind::Constant(_));
        let (old, new) = (self.model.node(original), self.model.node(id));
        if is_macro(old) || is_macro(new) || (is_const(old) && is_const(new)) {
            return Ok(());
        }
        debug!(
            name = %name,
            first = ?old.main_position(),
            second = ?new.main_position(),
            "namespace conflict"
        );
        Err(ScanError::NamespaceConflict { name })
    }

    fn alloc(&mut self, name: impl Into<String>, kind: NodeKind, symbol: &Symbol) -> NodeId {
        let mut node = Node::new(name, kind);
        if let Some(position) = symbol.position() {
            node.add_file_position(position);
        }
        self.model.alloc(node)
    }

    fn traverse_one(
        &mut self,
        symbol: &Symbol,
        parent: Option<&Symbol>,
    ) -> Result<Option<NodeId>, ScanError> {
        match symbol.kind {
            SymbolKind::Function => self.create_function(symbol),
            SymbolKind::FunctionMacro => self.create_function_macro(symbol),
            SymbolKind::Typedef => self.create_typedef(symbol),
            SymbolKind::Struct => self.create_tag_ns_compound(CompoundKind::Record, symbol).map(Some),
            SymbolKind::Union => self.create_tag_ns_compound(CompoundKind::Union, symbol).map(Some),
            SymbolKind::Enum => self.create_enum(symbol).map(Some),
            SymbolKind::Member => self.create_member(symbol, parent),
            SymbolKind::Const => self.create_const(symbol),
            SymbolKind::Object => Ok(None),
            SymbolKind::Invalid | SymbolKind::Ellipsis => {
                self.diagnostics.warn(
                    WarningCode::SymbolConversion,
                    format!("unhandled symbol '{}' of kind {}", symbol.ident(), symbol.kind.as_str()),
                    symbol.position().as_ref(),
                );
                Ok(None)
            }
        }
    }

    // ====================================================================
    // Enumerations
    // ====================================================================

    fn create_enum(&mut self, symbol: &Symbol) -> Result<NodeId, ScanError> {
        let prefix_len = enum_common_prefix(symbol.children()).map_or(0, |p| p.len());
        let mut members = Vec::new();
        for child in symbol.children().iter().filter(|c| !c.private) {
            let name = if prefix_len > 0 {
                child.ident().get(prefix_len..).unwrap_or("").to_string()
            } else {
                self.model.strip_symbol(child.ident())?
            };
            let member = Member {
                value: child.const_int.unwrap_or(0),
                symbol: child.ident().to_string(),
                nick: None,
                dump_name: None,
            };
            members.push(self.alloc(name.to_lowercase(), NodeKind::Member(member), child));
        }

        let name = self.model.strip_identifier(symbol.ident())?;
        let enumeration = Enumeration {
            ctype: Some(symbol.ident().to_string()),
            registration: Registration::default(),
            members: members.clone(),
            error_domain: None,
            contents: Default::default(),
        };
        let is_bitfield = symbol.base_type.as_ref().is_some_and(|t| t.is_bitfield);
        let kind = if is_bitfield {
            NodeKind::Bitfield(enumeration)
        } else {
            NodeKind::Enum(enumeration)
        };
        let id = self.alloc(name, kind, symbol);
        for member in members {
            self.model.adopt(id, member);
        }
        Ok(id)
    }

    // ====================================================================
    // Functions and callbacks
    // ====================================================================

    fn create_parameters(&mut self, parent: &Symbol, function: &SourceType) -> Vec<Parameter> {
        let mut parameters = Vec::new();
        for (index, child) in function.child_list.iter().enumerate() {
            if child.kind == SymbolKind::Ellipsis {
                parameters.push(Parameter::new("...", Some(Type::varargs())));
                continue;
            }
            let typ = child.base_type.as_ref().map(|t| type_from_source(t, true, false));
            let is_void = child.base_type.as_ref().is_some_and(|t| t.kind == CTypeKind::Void);
            let name = match &child.ident {
                Some(ident) => ident.clone(),
                None if is_void => continue,
                None => {
                    if child.base_type.is_some() {
                        self.diagnostics.warn(
                            WarningCode::SymbolConversion,
                            format!("{}: missing parameter name; undocumentable", parent.ident()),
                            parent.position().as_ref(),
                        );
                    }
                    format!("arg{}", index)
                }
            };
            parameters.push(Parameter::new(name, typ));
        }
        parameters
    }

    fn create_return(source: Option<&SourceType>) -> Return {
        let typ = match source {
            Some(source) => type_from_source(source, false, true),
            None => Type::none(),
        };
        Return::new(typ)
    }

    fn create_function(&mut self, symbol: &Symbol) -> Result<Option<NodeId>, ScanError> {
        if symbol.ident().starts_with('_') {
            return Ok(None);
        }
        let Some(ftype) = symbol.base_type.as_ref() else {
            return Ok(None);
        };
        let parameters = self.create_parameters(symbol, ftype);
        let retval = Self::create_return(ftype.base_type.as_deref());
        let name = self.model.strip_symbol(symbol.ident())?;

        let mut function = Function::new(Callable::new(retval, parameters, false), symbol.ident());
        function.is_inline =
            ftype.is_inline || ftype.base_type.as_ref().is_some_and(|r| r.is_inline);
        Ok(Some(self.alloc(name, NodeKind::Function(function), symbol)))
    }

    fn create_function_macro(&mut self, symbol: &Symbol) -> Result<Option<NodeId>, ScanError> {
        if symbol.ident().starts_with('_') || !symbol.in_header() {
            return Ok(None);
        }
        let parameters = match symbol.base_type.as_ref() {
            Some(ftype) => self.create_parameters(symbol, ftype),
            None => Vec::new(),
        };
        let name = self.model.strip_symbol(symbol.ident())?;
        let mac = FunctionMacro {
            parameters,
            symbol: symbol.ident().to_string(),
        };
        Ok(Some(self.alloc(name, NodeKind::FunctionMacro(mac), symbol)))
    }

    fn create_callback(&mut self, symbol: &Symbol, member: bool) -> Result<NodeId, ScanError> {
        let base = symbol.base_type.as_ref();
        let function = match base.map(|b| b.kind) {
            Some(CTypeKind::Function) => base,
            _ => base.and_then(|b| b.base_type.as_deref()),
        };
        let (mut parameters, retval) = match function {
            Some(f) => (
                self.create_parameters(symbol, f),
                Self::create_return(f.base_type.as_deref()),
            ),
            None => (Vec::new(), Return::new(Type::none())),
        };
        for param in parameters.iter_mut() {
            if param.argname == "user_data" && param.typ().is_fundamental(ANY) {
                param.closure_name = Some(param.argname.clone());
            }
        }

        let ident = symbol.ident();
        let name = if member {
            ident.to_string()
        } else if ident.find('_').is_some_and(|i| i > 0) {
            self.model.strip_symbol(ident)?
        } else {
            self.model.strip_identifier(ident)?
        };
        let callback = Callback {
            callable: Callable::new(retval, parameters, false),
            ctype: Some(ident.to_string()),
        };
        Ok(self.alloc(name, NodeKind::Callback(callback), symbol))
    }

    // ====================================================================
    // Constants
    // ====================================================================

    fn create_const(&mut self, symbol: &Symbol) -> Result<Option<NodeId>, ScanError> {
        if symbol.ident().starts_with('_') || !symbol.in_header() {
            return Ok(None);
        }
        let name = self.model.strip_symbol(symbol.ident())?;
        let (value_type, value) = if let Some(text) = &symbol.const_string {
            (Type::string(), text.clone())
        } else if let Some(int) = symbol.const_int {
            let mut typ = match &symbol.base_type {
                Some(source) => type_from_source(source, false, false),
                None => Type::fundamental(INT),
            };
            self.model.resolve_type(&mut typ);
            let mut unaliased = typ.clone();
            if typ.ctype.is_some() {
                if let Some(target) = self.model.lookup_typenode(&typ) {
                    if let Err(fundamental) = self.model.resolve_aliases(target) {
                        unaliased = fundamental;
                    }
                }
            }
            let value = match unaliased.target_fundamental() {
                Some("guint64") => (int as u64).to_string(),
                Some("guint32") => (int as u32).to_string(),
                Some("guint16") => (int as u16).to_string(),
                Some("guint8") => (int as u8).to_string(),
                _ => int.to_string(),
            };
            (typ, value)
        } else if let Some(flag) = symbol.const_boolean {
            (Type::fundamental(BOOLEAN), flag.to_string())
        } else if let Some(double) = symbol.const_double {
            (Type::fundamental("gdouble"), format!("{:.6}", double))
        } else {
            return Ok(None);
        };

        let constant = Constant {
            value_type,
            value,
            ctype: Some(symbol.ident().to_string()),
        };
        Ok(Some(self.alloc(name, NodeKind::Constant(constant), symbol)))
    }

    // ====================================================================
    // Typedefs and compounds
    // ====================================================================

    fn create_typedef(&mut self, symbol: &Symbol) -> Result<Option<NodeId>, ScanError> {
        let Some(base) = symbol.base_type.as_ref() else {
            return Ok(None);
        };
        let node = match (base.kind, base.base_kind()) {
            (CTypeKind::Pointer, Some(CTypeKind::Function)) | (CTypeKind::Function, _) => {
                self.create_callback(symbol, false)?
            }
            (CTypeKind::Pointer, Some(CTypeKind::Struct)) => {
                self.create_typedef_compound(CompoundKind::Record, symbol, true, true)?
            }
            (CTypeKind::Struct, _) => {
                self.create_typedef_compound(CompoundKind::Record, symbol, false, false)?
            }
            (CTypeKind::Union, _) => {
                self.create_typedef_compound(CompoundKind::Union, symbol, false, false)?
            }
            (CTypeKind::Enum, _) => self.create_enum(symbol)?,
            (CTypeKind::Typedef | CTypeKind::Pointer | CTypeKind::Basic | CTypeKind::Void, _) => {
                let name = self.model.strip_identifier(symbol.ident())?;
                if fundamental_name(&name).is_some() || name.ends_with("_autoptr") {
                    return Ok(None);
                }
                let alias = Alias {
                    target: type_from_source(base, false, false),
                    ctype: Some(symbol.ident().to_string()),
                };
                self.alloc(name, NodeKind::Alias(alias), symbol)
            }
            (kind, _) => {
                self.diagnostics.warn(
                    WarningCode::SymbolConversion,
                    format!("typedef '{}' of type {} is not supported", symbol.ident(), kind.as_str()),
                    symbol.position().as_ref(),
                );
                return Ok(None);
            }
        };
        Ok(Some(node))
    }

    fn create_typedef_compound(
        &mut self,
        kind: CompoundKind,
        symbol: &Symbol,
        disguised: bool,
        pointer: bool,
    ) -> Result<NodeId, ScanError> {
        let name = self.model.strip_identifier(symbol.ident())?;
        let tag_name = symbol.base_type.as_ref().and_then(|t| t.name.clone());

        if let Some(existing) = tag_name.as_ref().and_then(|t| self.tag_ns.get(t).copied()) {
            if !self.model.node(existing).name.is_empty() {
                // A second typedef of an already promoted struct gets its
                // own record sharing the field layout
                let mut compound = Compound::new(Some(symbol.ident().to_string()));
                compound.tag_name = tag_name;
                let id = self.alloc(name, kind.wrap(compound), symbol);
                let fields = self
                    .model
                    .node(existing)
                    .contents()
                    .map(|c| c.fields.clone())
                    .unwrap_or_default();
                for field in fields {
                    let copy = self.model.clone_node(field);
                    self.push_field(id, copy);
                }
                return Ok(id);
            }
            let node = self.model.node_mut(existing);
            node.name = name;
            if let Some(compound) = node.compound_mut() {
                compound.ctype = Some(symbol.ident().to_string());
            }
            if let Some(position) = symbol.position() {
                node.add_file_position(position);
            }
            return Ok(existing);
        }

        let mut compound = Compound::new(Some(symbol.ident().to_string()));
        compound.disguised = disguised;
        compound.pointer = pointer;
        let has_tag = tag_name.is_some();
        compound.tag_name = tag_name;
        if has_tag {
            // Fields are unknown until the struct definition shows up
            compound.opaque = true;
            compound.disguised = true;
        }
        let id = self.alloc(name, kind.wrap(compound), symbol);
        if !has_tag {
            self.parse_fields(symbol.children(), symbol, id)?;
        }
        Ok(id)
    }

    fn create_tag_ns_compound(&mut self, kind: CompoundKind, symbol: &Symbol) -> Result<NodeId, ScanError> {
        let id = match self.tag_ns.get(symbol.ident()).copied() {
            Some(id) => id,
            None => {
                let mut compound = Compound::new(Some(symbol.ident().to_string()));
                compound.tag_name = Some(symbol.ident().to_string());
                let node = Node::new("", kind.wrap(compound));
                self.model.alloc(node)
            }
        };

        self.parse_fields(symbol.children(), symbol, id)?;

        let node = self.model.node_mut(id);
        if let Some(position) = symbol.position() {
            node.add_file_position(position);
        }
        let has_fields = node.contents().is_some_and(|c| !c.fields.is_empty());
        if let Some(compound) = node.compound_mut() {
            compound.opaque = !has_fields;
            compound.disguised = false;
        }
        Ok(id)
    }

    fn create_member_compound(&mut self, kind: CompoundKind, symbol: &Symbol) -> Result<NodeId, ScanError> {
        let compound = Compound::new(Some(symbol.ident().to_string()));
        let id = self.alloc(symbol.ident(), kind.wrap(compound), symbol);
        self.parse_fields(symbol.children(), symbol, id)?;
        Ok(id)
    }

    fn push_field(&mut self, compound: NodeId, field: NodeId) {
        if let Some(contents) = self.model.node_mut(compound).contents_mut() {
            contents.fields.push(field);
        }
        self.model.adopt(compound, field);
        if let NodeKind::Field(f) = &self.model.node(field).kind {
            if let Some(anonymous) = f.anonymous_node {
                self.model.adopt(compound, anonymous);
            }
        }
    }

    fn parse_fields(&mut self, children: &[Symbol], parent: &Symbol, compound: NodeId) -> Result<(), ScanError> {
        for child in children {
            let Some(node) = self.traverse_one(child, Some(parent))? else {
                continue;
            };
            let field = if matches!(self.model.node(node).kind, NodeKind::Field(_)) {
                node
            } else {
                let field = Field {
                    typ: None,
                    readable: true,
                    writable: false,
                    bits: None,
                    private: false,
                    anonymous_node: Some(node),
                };
                self.alloc(child.ident(), NodeKind::Field(field), child)
            };
            self.push_field(compound, field);
        }
        Ok(())
    }

    fn create_member(&mut self, symbol: &Symbol, parent: Option<&Symbol>) -> Result<Option<NodeId>, ScanError> {
        let Some(source) = symbol.base_type.as_ref() else {
            return Ok(None);
        };
        match (source.kind, source.base_kind()) {
            (CTypeKind::Pointer, Some(CTypeKind::Function)) => {
                return self.create_callback(symbol, true).map(Some);
            }
            (CTypeKind::Struct, _) if source.name.is_none() => {
                return self.create_member_compound(CompoundKind::Record, symbol).map(Some);
            }
            (CTypeKind::Union, _) if source.name.is_none() => {
                return self.create_member_compound(CompoundKind::Union, symbol).map(Some);
            }
            _ => {}
        }

        let typ = if source.kind == CTypeKind::Array {
            let mut size = Some(1u32);
            let mut element = source;
            while element.kind == CTypeKind::Array {
                size = match (size, element.child_list.first()) {
                    (Some(total), Some(dim)) => dim
                        .const_int
                        .and_then(|n| u32::try_from(n).ok())
                        .map(|n| total.saturating_mul(n)),
                    _ => None,
                };
                match element.base_type.as_deref() {
                    Some(next) => element = next,
                    None => break,
                }
            }
            let element_type = if element.kind == CTypeKind::Union && element.name.is_none() {
                self.synthesize_union_type(symbol, element, parent)?
            } else {
                let complete = complete_source_ctype(element, false);
                type_from_ctype_string(&source_ctype(element, false), TypeUse::default(), Some(&complete))
            };
            let mut array = Type::array(ArrayType::C, element_type);
            if let TypeKind::Array {
                zero_terminated,
                size: array_size,
                ..
            } = &mut array.kind
            {
                *zero_terminated = false;
                *array_size = size;
            }
            array
        } else {
            type_from_source(source, false, false)
        };

        let mut field = Field {
            typ: Some(typ),
            readable: true,
            writable: true,
            bits: symbol.const_int.and_then(|n| u32::try_from(n).ok()),
            private: false,
            anonymous_node: None,
        };
        if symbol.private {
            field.readable = false;
            field.writable = false;
            field.private = true;
        }
        Ok(Some(self.alloc(symbol.ident(), NodeKind::Field(field), symbol)))
    }

    /// Name an anonymous union used as an array element so it can be
    /// referenced
    fn synthesize_union_type(
        &mut self,
        symbol: &Symbol,
        union: &SourceType,
        parent: Option<&Symbol>,
    ) -> Result<Type, ScanError> {
        let parent_ident = parent.map(Symbol::ident).unwrap_or("");
        let (hidden, bare) = match parent_ident.strip_prefix('_') {
            Some(rest) => (true, rest),
            None => (false, parent_ident),
        };
        let (ns, parent_name) = self
            .model
            .split_ctype_namespaces(bare)?
            .pop()
            .ok_or_else(|| NameError::UnknownIdentifierNamespace(bare.to_string()))?;
        let parent_name = if hidden {
            format!("_{}", parent_name)
        } else {
            parent_name
        };
        let name = format!("{}__{}__union", parent_name, symbol.ident());
        let id = self.alloc(name.clone(), NodeKind::Union(Compound::new(None)), symbol);
        self.parse_fields(&union.child_list, symbol, id)?;
        self.append_new_node(id)?;
        Ok(Type::giname(format!("{}.{}", self.model.namespace(ns).name, name)))
    }
}

/// Longest `_`-separated prefix shared by every member
fn enum_common_prefix(children: &[Symbol]) -> Option<String> {
    fn common(a: &str, b: &str) -> String {
        let mut parts = Vec::new();
        for (aword, bword) in a.split('_').zip(b.split('_')) {
            if aword != bword {
                if parts.is_empty() {
                    return String::new();
                }
                return format!("{}_", parts.join("_"));
            }
            parts.push(aword);
        }
        a.min(b).to_string()
    }

    if children.len() < 2 {
        return None;
    }
    let mut prefix: Option<String> = None;
    for child in children {
        prefix = Some(match prefix {
            None => child.ident().to_string(),
            Some(p) => {
                let next = common(&p, child.ident());
                if next.is_empty() {
                    return None;
                }
                next
            }
        });
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Namespace;
    use crate::diagnostic::WarningConfig;

    fn model() -> Model {
        Model::new(Namespace::new("Foo", "1.0", None, None))
    }

    fn widget_ptr() -> SourceType {
        SourceType::pointer(SourceType::typedef("FooWidget"))
    }

    fn param(name: &str, source: SourceType) -> Symbol {
        Symbol::new(SymbolKind::Member, name).with_type(source)
    }

    fn function(ident: &str, ret: SourceType, params: Vec<Symbol>) -> Symbol {
        Symbol::new(SymbolKind::Function, ident)
            .with_type(SourceType::function(ret, params))
            .at("foo.h", 10)
    }

    fn run(model: &mut Model, symbols: &[Symbol]) -> Diagnostics {
        let mut diag = Diagnostics::new(WarningConfig::all());
        Transformer::new(model, &mut diag).parse(symbols).unwrap();
        diag
    }

    fn struct_with_field(tag: &str) -> Symbol {
        let mut def = SourceType::new(CTypeKind::Struct, Some(tag));
        def.child_list = vec![param("parent", SourceType::typedef("GObject"))];
        Symbol::new(SymbolKind::Struct, tag).with_type(def).at("foo.h", 3)
    }

    #[test]
    fn test_function_becomes_stripped_node() {
        let mut model = model();
        let symbols = vec![function(
            "foo_widget_set_name",
            SourceType::void(),
            vec![
                param("widget", widget_ptr()),
                param("name", SourceType::pointer(SourceType::basic("char").constant())),
            ],
        )];
        run(&mut model, &symbols);
        let id = model.main().get("widget_set_name").unwrap();
        let func = model.node(id).function().unwrap();
        assert_eq!(func.symbol, "foo_widget_set_name");
        assert_eq!(func.callable.parameters.len(), 2);
        assert!(func.callable.parameters[1].typ().is_fundamental("utf8"));
        assert!(func.callable.retval.typ.is_fundamental("none"));
        assert_eq!(model.main().get_by_symbol("foo_widget_set_name"), Some(id));
    }

    #[test]
    fn test_private_and_foreign_functions_are_skipped() {
        let mut model = model();
        let symbols = vec![
            function("_foo_private", SourceType::void(), vec![]),
            function("bar_thing", SourceType::void(), vec![]),
        ];
        let diag = run(&mut model, &symbols);
        assert!(model.main().is_empty());
        assert!(diag.has_code(WarningCode::UnknownNamespace));
    }

    #[test]
    fn test_typedef_then_struct_promotes_once() {
        let mut model = model();
        let typedef = Symbol::new(SymbolKind::Typedef, "FooWidget")
            .with_type(SourceType::new(CTypeKind::Struct, Some("_FooWidget")))
            .at("foo.h", 1);
        run(&mut model, &[typedef, struct_with_field("_FooWidget")]);
        let id = model.main().get("Widget").unwrap();
        let compound = model.node(id).compound().unwrap();
        assert!(!compound.opaque);
        assert!(!compound.disguised);
        assert_eq!(compound.contents.fields.len(), 1);
        assert_eq!(model.main().len(), 1);
    }

    #[test]
    fn test_untypedefed_struct_is_promoted_by_tag() {
        let mut model = model();
        run(&mut model, &[struct_with_field("_FooPrivateThing")]);
        assert!(model.main().get("_PrivateThing").is_some());
    }

    #[test]
    fn test_enum_members_strip_common_prefix() {
        let mut model = model();
        let mut def = SourceType::new(CTypeKind::Enum, None);
        def.child_list = vec![
            Symbol {
                const_int: Some(0),
                ..Symbol::new(SymbolKind::Member, "FOO_COLOR_RED")
            },
            Symbol {
                const_int: Some(1),
                ..Symbol::new(SymbolKind::Member, "FOO_COLOR_DARK_BLUE")
            },
        ];
        let typedef = Symbol::new(SymbolKind::Typedef, "FooColor").with_type(def).at("foo.h", 5);
        run(&mut model, &[typedef]);
        let id = model.main().get("Color").unwrap();
        let members = &model.node(id).enumeration().unwrap().members;
        let names: Vec<_> = members.iter().map(|m| model.node(*m).name.clone()).collect();
        assert_eq!(names, vec!["red", "dark_blue"]);
        assert_eq!(model.node(members[0]).parent, Some(id));
    }

    #[test]
    fn test_common_prefix() {
        let syms = |names: &[&str]| -> Vec<Symbol> {
            names.iter().map(|n| Symbol::new(SymbolKind::Member, n)).collect()
        };
        assert_eq!(enum_common_prefix(&syms(&["A_B_C", "A_B_D"])), Some("A_B_".into()));
        assert_eq!(enum_common_prefix(&syms(&["A_B_C"])), None);
        assert_eq!(enum_common_prefix(&syms(&["X_ONE", "Y_TWO"])), None);
    }

    #[test]
    fn test_constants() {
        let mut model = model();
        let symbols = vec![
            Symbol {
                const_int: Some(-1),
                ..Symbol::new(SymbolKind::Const, "FOO_MAX").with_type(SourceType::basic("guint32")).at("foo.h", 2)
            },
            Symbol {
                const_string: Some("1.0".into()),
                ..Symbol::new(SymbolKind::Const, "FOO_VERSION").at("foo.h", 3)
            },
            Symbol {
                const_int: Some(3),
                ..Symbol::new(SymbolKind::Const, "FOO_SOURCE_ONLY").at("foo.c", 3)
            },
        ];
        run(&mut model, &symbols);
        let max = model.node(model.main().get("MAX").unwrap());
        match &max.kind {
            NodeKind::Constant(c) => assert_eq!(c.value, "4294967295"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(model.main().get("VERSION").is_some());
        assert!(model.main().get("SOURCE_ONLY").is_none());
    }

    #[test]
    fn test_conflicting_names_are_fatal() {
        let mut model = model();
        let alias = |line| {
            Symbol::new(SymbolKind::Typedef, "FooThing")
                .with_type(SourceType::basic("int"))
                .at("foo.h", line)
        };
        let callback = Symbol::new(SymbolKind::Typedef, "FooThing")
            .with_type(SourceType::pointer(SourceType::function(SourceType::void(), vec![])))
            .at("foo.h", 9);
        let mut diag = Diagnostics::new(WarningConfig::all());
        let err = Transformer::new(&mut model, &mut diag)
            .parse(&[alias(1), callback])
            .unwrap_err();
        assert!(matches!(err, ScanError::NamespaceConflict { ref name } if name == "Thing"));
    }

    #[test]
    fn test_callback_marks_user_data_closure() {
        let mut model = model();
        let cb_type = SourceType::pointer(SourceType::function(
            SourceType::basic("gboolean"),
            vec![
                param("widget", widget_ptr()),
                param("user_data", SourceType::typedef("gpointer")),
            ],
        ));
        let symbols = vec![Symbol::new(SymbolKind::Typedef, "FooWidgetFunc")
            .with_type(cb_type)
            .at("foo.h", 4)];
        run(&mut model, &symbols);
        let id = model.main().get("WidgetFunc").unwrap();
        let callable = model.node(id).callable().unwrap();
        assert_eq!(callable.parameters[1].closure_name.as_deref(), Some("user_data"));
    }

    #[test]
    fn test_fixed_array_field() {
        let mut model = model();
        let mut array = SourceType::new(CTypeKind::Array, None);
        array.base_type = Some(Box::new(SourceType::basic("int")));
        array.child_list = vec![Symbol {
            const_int: Some(4),
            ..Symbol::new(SymbolKind::Const, "4")
        }];
        let mut def = SourceType::new(CTypeKind::Struct, None);
        def.child_list = vec![param("values", array)];
        let typedef = Symbol::new(SymbolKind::Typedef, "FooQuad").with_type(def).at("foo.h", 1);
        run(&mut model, &[typedef]);
        let id = model.main().get("Quad").unwrap();
        let field_id = model.node(id).contents().unwrap().fields[0];
        let NodeKind::Field(field) = &model.node(field_id).kind else {
            panic!("not a field");
        };
        match &field.typ.as_ref().unwrap().kind {
            TypeKind::Array {
                size,
                zero_terminated,
                ..
            } => {
                assert_eq!(*size, Some(4));
                assert!(!zero_terminated);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
