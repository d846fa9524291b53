//! GIR parsing into the model
//!
//! Used for two things: loading the namespaces a scan depends on (types
//! only) and the `passthrough` self-check, which needs every detail the
//! writer emits.

use super::xml::{parse_document, XmlElement};
use super::COMPATIBLE_GIR_VERSION;
use crate::ast::{
    Alias, ArrayType, Boxed, Callable, Callback, Class, Compound, Constant, Contents, Direction,
    Enumeration, Field, Function, FunctionMacro, Include, Interface, Member, Metadata, Model,
    Namespace, NamespaceId, Node, NodeId, NodeKind, Parameter, Property, Registration, Return,
    Scope, Signal, Transfer, Type, TypeKind, VFunction,
};
use crate::error::GirError;
use crate::position::SourcePosition;
use tracing::debug;

/// Reads GIR documents
#[derive(Debug, Clone, Copy, Default)]
pub struct GirReader {
    types_only: bool,
}

impl GirReader {
    /// A reader keeping everything
    pub fn new() -> Self {
        GirReader { types_only: false }
    }

    /// A reader for dependencies: no functions, constants or docs
    pub fn types_only() -> Self {
        GirReader { types_only: true }
    }

    /// Parse a document into a fresh model whose main namespace it defines
    pub fn read_model(&self, text: &str) -> Result<Model, GirError> {
        let root = load_repository(text)?;
        let (namespace, element) = namespace_from(&root)?;
        let mut model = Model::new(namespace);
        let ns = model.main_id();
        NamespaceParser::new(&mut model, ns, self.types_only).parse(element)?;
        Ok(model)
    }

    /// Parse a document as an extra namespace of `model`
    ///
    /// A namespace that is already loaded is left alone.
    pub fn read_into(&self, model: &mut Model, text: &str) -> Result<NamespaceId, GirError> {
        let root = load_repository(text)?;
        let (namespace, element) = namespace_from(&root)?;
        if let Some(existing) = model.namespace_by_name(&namespace.name) {
            return Ok(existing);
        }
        let ns = model.add_namespace(namespace);
        NamespaceParser::new(model, ns, self.types_only).parse(element)?;
        Ok(ns)
    }
}

fn load_repository(text: &str) -> Result<XmlElement, GirError> {
    let root = parse_document::<GirError>(text)?
        .ok_or_else(|| GirError::Invalid("empty document".to_string()))?;
    if root.name != "repository" {
        return Err(GirError::Invalid(format!(
            "expected <repository>, found <{}>",
            root.name
        )));
    }
    let version = required(&root, "version")?;
    if version != COMPATIBLE_GIR_VERSION {
        return Err(GirError::IncompatibleVersion {
            found: version.to_string(),
            expected: COMPATIBLE_GIR_VERSION,
        });
    }
    Ok(root)
}

fn namespace_from(root: &XmlElement) -> Result<(Namespace, &XmlElement), GirError> {
    let element = root.child("namespace").ok_or(GirError::MissingNamespace)?;
    let split = |value: &str| value.split(',').map(str::to_string).collect::<Vec<_>>();
    let mut namespace = Namespace::new(
        required(element, "name")?,
        required(element, "version")?,
        element.attr("c:identifier-prefixes").map(split),
        element.attr("c:symbol-prefixes").map(split),
    );
    if let Some(libraries) = element.attr("shared-library").filter(|l| !l.is_empty()) {
        namespace.shared_libraries = split(libraries);
    }

    for child in &root.children {
        match child.name.as_str() {
            "include" => {
                namespace.includes.insert(Include::new(
                    required(child, "name")?,
                    required(child, "version")?,
                ));
            }
            "package" => namespace
                .exported_packages
                .push(required(child, "name")?.to_string()),
            "c:include" => namespace.c_includes.push(required(child, "name")?.to_string()),
            "doc:format" => namespace.doc_format = required(child, "name")?.to_string(),
            _ => {}
        }
    }
    Ok((namespace, element))
}

fn required<'e>(element: &'e XmlElement, attribute: &'static str) -> Result<&'e str, GirError> {
    element.attr(attribute).ok_or_else(|| GirError::MissingAttribute {
        element: element.name.clone(),
        attribute,
    })
}

fn owned(element: &XmlElement, attribute: &str) -> Option<String> {
    element.attr(attribute).map(str::to_string)
}

/// `introspectable` and `skip` are integers in old documents
fn int_flag(value: &str) -> bool {
    value.parse::<i64>().map(|v| v > 0).unwrap_or(false)
}

fn number<T: std::str::FromStr>(element: &XmlElement, attribute: &str) -> Result<Option<T>, GirError> {
    match element.attr(attribute) {
        None => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| {
            GirError::Invalid(format!(
                "<{}> attribute '{}' is not a number: {}",
                element.name, attribute, value
            ))
        }),
    }
}

/// `filename`/`line`/`column` attributes of `<doc>` and `<source-position>`
fn position(element: &XmlElement) -> Option<SourcePosition> {
    let line = number::<u32>(element, "line").ok().flatten()?;
    let mut position = SourcePosition::new(element.attr("filename")?, line);
    position.column = number::<u32>(element, "column").ok().flatten();
    Some(position)
}

/// Parameter name an index attribute points at
fn sibling(element: &XmlElement, attribute: &str, siblings: &[String]) -> Result<Option<String>, GirError> {
    match number::<usize>(element, attribute)? {
        Some(index) => siblings.get(index).cloned().map(Some).ok_or_else(|| {
            GirError::Invalid(format!("{} index {} out of range", attribute, index))
        }),
        None => Ok(None),
    }
}

fn is_type_element(element: &XmlElement) -> bool {
    matches!(element.name.as_str(), "type" | "array" | "varargs")
}

fn registration(element: &XmlElement) -> Registration {
    Registration {
        gtype_name: owned(element, "glib:type-name"),
        get_type: owned(element, "glib:get-type"),
        c_symbol_prefix: owned(element, "c:symbol-prefix"),
    }
}

/// Where a member node goes in its parent
#[derive(Debug, Clone, Copy)]
enum Slot {
    Constructor,
    Method,
    StaticMethod,
    VirtualMethod,
    Field,
    Property,
    Signal,
}

impl Slot {
    fn of(self, contents: &mut Contents) -> &mut Vec<NodeId> {
        match self {
            Slot::Constructor => &mut contents.constructors,
            Slot::Method => &mut contents.methods,
            Slot::StaticMethod => &mut contents.static_methods,
            Slot::VirtualMethod => &mut contents.virtual_methods,
            Slot::Field => &mut contents.fields,
            Slot::Property => &mut contents.properties,
            Slot::Signal => &mut contents.signals,
        }
    }
}

struct NamespaceParser<'m> {
    model: &'m mut Model,
    ns: NamespaceId,
    types_only: bool,
}

impl<'m> NamespaceParser<'m> {
    fn new(model: &'m mut Model, ns: NamespaceId, types_only: bool) -> Self {
        NamespaceParser {
            model,
            ns,
            types_only,
        }
    }

    fn parse(&mut self, element: &XmlElement) -> Result<(), GirError> {
        for child in &element.children {
            let id = match child.name.as_str() {
                "alias" => self.parse_alias(child)?,
                "enumeration" | "bitfield" => self.parse_enumeration(child)?,
                "callback" => self.parse_callback(child)?,
                "class" => self.parse_class(child)?,
                "interface" => self.parse_interface(child)?,
                "record" | "union" => self.parse_compound(child)?,
                "glib:boxed" => self.parse_boxed(child)?,
                "docsection" => self.alloc_named(child, NodeKind::DocSection)?,
                "constant" if !self.types_only => self.parse_constant(child)?,
                "function" | "function-inline" if !self.types_only => {
                    self.parse_function(child)?
                }
                "function-macro" if !self.types_only => self.parse_function_macro(child)?,
                _ => continue,
            };
            self.model
                .append(self.ns, id, false)
                .map_err(|e| GirError::Invalid(e.to_string()))?;
        }
        debug!(
            namespace = %self.model.namespace(self.ns).name,
            nodes = self.model.namespace(self.ns).len(),
            types_only = self.types_only,
            "parsed GIR namespace"
        );
        Ok(())
    }

    fn link(&mut self, parent: NodeId, child: NodeId, slot: Slot) {
        if let Some(contents) = self.model.node_mut(parent).contents_mut() {
            slot.of(contents).push(child);
        }
        self.model.adopt(parent, child);
    }

    /// Allocate a node named by the element's `name` attribute
    fn alloc_named(&mut self, element: &XmlElement, kind: NodeKind) -> Result<NodeId, GirError> {
        let mut node = Node::new(required(element, "name")?, kind);
        self.parse_generic(&mut node, element);
        Ok(self.model.alloc(node))
    }

    // ====================================================================
    // Generic metadata
    // ====================================================================

    fn parse_meta(&self, meta: &mut Metadata, element: &XmlElement) {
        if let Some(value) = element.attr("introspectable") {
            meta.introspectable = int_flag(value);
        }
        if let Some(value) = element.attr("skip") {
            meta.skip = int_flag(value);
        }
        if self.types_only {
            return;
        }

        if let Some(doc) = element.child("doc") {
            meta.doc = Some(doc.text.clone());
            meta.doc_position = position(doc);
        }
        meta.version = owned(element, "version");
        meta.version_doc = element.child("doc-version").map(|d| d.text.clone());
        meta.deprecated = owned(element, "deprecated-version");
        meta.deprecated_doc = element.child("doc-deprecated").map(|d| d.text.clone());
        if meta.deprecated.is_none() && meta.deprecated_doc.is_none() && element.flag("deprecated") {
            meta.deprecated = Some(String::new());
        }
        meta.stability = owned(element, "stability");
        meta.stability_doc = element.child("doc-stability").map(|d| d.text.clone());
        for attribute in element.children_named("attribute") {
            if let (Some(name), Some(value)) = (attribute.attr("name"), attribute.attr("value")) {
                meta.attributes.push((name.to_string(), value.to_string()));
            }
        }
    }

    fn parse_generic(&self, node: &mut Node, element: &XmlElement) {
        self.parse_meta(&mut node.meta, element);
        if self.types_only {
            return;
        }
        for found in element.children_named("source-position").filter_map(position) {
            node.add_file_position(found);
        }
    }

    // ====================================================================
    // Types
    // ====================================================================

    /// The type held by `element`, if any; `siblings` maps array length
    /// indexes back to names
    fn parse_type_child(&self, element: &XmlElement, siblings: &[String]) -> Result<Option<Type>, GirError> {
        match element.children.iter().find(|c| is_type_element(c)) {
            Some(child) => self.parse_type(child, siblings).map(Some),
            None => Ok(None),
        }
    }

    fn parse_type(&self, element: &XmlElement, siblings: &[String]) -> Result<Type, GirError> {
        let ctype = element.attr("c:type");
        match element.name.as_str() {
            "varargs" => Ok(Type::varargs()),
            "array" => {
                let array_type = element
                    .attr("name")
                    .and_then(ArrayType::from_gir_name)
                    .unwrap_or(ArrayType::C);
                let elem = self.parse_type_child(element, &[])?.unwrap_or_else(Type::any);
                let mut typ = Type::array(array_type, elem);
                typ.ctype = ctype.map(str::to_string);
                let length = sibling(element, "length", siblings)?;
                let fixed_size = number::<u32>(element, "fixed-size")?;
                if let TypeKind::Array {
                    zero_terminated,
                    size,
                    length_param,
                    ..
                } = &mut typ.kind
                {
                    *zero_terminated = element.attr("zero-terminated") != Some("0");
                    *size = fixed_size;
                    *length_param = length;
                }
                Ok(typ)
            }
            _ => {
                let Some(name) = element.attr("name") else {
                    return Ok(match ctype {
                        None => Type::unknown(),
                        Some(ctype) if element.flag("foreign") => Type::foreign(ctype),
                        Some(ctype) => Type::from_ctype(ctype),
                    });
                };
                let contained = element
                    .children
                    .iter()
                    .filter(|c| is_type_element(c))
                    .map(|c| self.parse_type(c, &[]))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut contained = contained.into_iter();
                let mut typ = match name {
                    "GLib.List" | "GLib.SList" => {
                        Type::list(name, contained.next().unwrap_or_else(Type::any))
                    }
                    "GLib.HashTable" => {
                        let key = contained.next().unwrap_or_else(Type::any);
                        let value = contained.next().unwrap_or_else(Type::any);
                        Type::map(key, value)
                    }
                    _ => return Ok(self.model.namespace(self.ns).type_from_name(name, ctype)),
                };
                typ.ctype = ctype.map(str::to_string);
                Ok(typ)
            }
        }
    }

    fn type_attr(&self, element: &XmlElement, attribute: &str) -> Option<Type> {
        element
            .attr(attribute)
            .map(|name| self.model.namespace(self.ns).type_from_name(name, None))
    }

    // ====================================================================
    // Callables
    // ====================================================================

    fn parse_parameter(&self, element: &XmlElement, siblings: &[String]) -> Result<Parameter, GirError> {
        let typ = self.parse_type_child(element, siblings)?;
        let mut param = Parameter::new(required(element, "name")?, typ);
        param.direction = element
            .attr("direction")
            .and_then(Direction::parse)
            .unwrap_or(Direction::In);
        param.caller_allocates = element.flag("caller-allocates");
        param.transfer = element.attr("transfer-ownership").and_then(Transfer::parse);
        param.nullable = element.flag("nullable");
        param.optional = element.flag("optional");
        if element.flag("allow-none") && !param.nullable && !param.optional {
            if param.direction == Direction::Out {
                param.optional = true;
            } else {
                param.nullable = true;
            }
        }
        param.scope = element.attr("scope").and_then(Scope::parse);
        param.closure_name = sibling(element, "closure", siblings)?;
        param.destroy_name = sibling(element, "destroy", siblings)?;
        self.parse_meta(&mut param.meta, element);
        Ok(param)
    }

    fn parse_callable(&self, element: &XmlElement) -> Result<Callable, GirError> {
        let parameters = element.child("parameters");
        let names: Vec<String> = parameters
            .map(|p| {
                p.children_named("parameter")
                    .filter_map(|c| owned(c, "name"))
                    .collect()
            })
            .unwrap_or_default();

        let return_element = element.child("return-value").ok_or_else(|| {
            GirError::Invalid(format!(
                "<{} name=\"{}\"> has no return-value",
                element.name,
                element.attr("name").unwrap_or_default()
            ))
        })?;
        let mut retval = Return::new(
            self.parse_type_child(return_element, &names)?
                .unwrap_or_else(Type::none),
        );
        retval.transfer = return_element
            .attr("transfer-ownership")
            .and_then(Transfer::parse);
        retval.nullable = return_element.flag("nullable") || return_element.flag("allow-none");
        self.parse_meta(&mut retval.meta, return_element);

        let mut params = Vec::new();
        let mut instance = None;
        if let Some(parameters) = parameters {
            if let Some(element) = parameters.child("instance-parameter") {
                instance = Some(self.parse_parameter(element, &names)?);
            }
            for element in parameters.children_named("parameter") {
                params.push(self.parse_parameter(element, &names)?);
            }
        }

        let mut callable = Callable::new(retval, params, element.flag("throws"));
        callable.instance_parameter = instance;
        callable.finish_func = owned(element, "glib:finish-func");
        callable.sync_func = owned(element, "glib:sync-func");
        callable.async_func = owned(element, "glib:async-func");
        Ok(callable)
    }

    fn parse_function(&mut self, element: &XmlElement) -> Result<NodeId, GirError> {
        let callable = self.parse_callable(element)?;
        let mut func = Function::new(callable, element.attr("c:identifier").unwrap_or_default());
        func.is_inline = element.name.ends_with("-inline");
        func.is_method = element.name.starts_with("method");
        func.is_constructor = element.name == "constructor";
        func.shadowed_by = owned(element, "shadowed-by");
        func.shadows = owned(element, "shadows");
        func.moved_to = owned(element, "moved-to");
        func.set_property = owned(element, "glib:set-property");
        func.get_property = owned(element, "glib:get-property");

        self.alloc_named(element, NodeKind::Function(func))
    }

    fn parse_function_macro(&mut self, element: &XmlElement) -> Result<NodeId, GirError> {
        let mut parameters = Vec::new();
        if let Some(list) = element.child("parameters") {
            for param_element in list.children_named("parameter") {
                let mut param = Parameter::new(required(param_element, "name")?, None);
                self.parse_meta(&mut param.meta, param_element);
                parameters.push(param);
            }
        }
        self.alloc_named(
            element,
            NodeKind::FunctionMacro(FunctionMacro {
                parameters,
                symbol: element.attr("c:identifier").unwrap_or_default().to_string(),
            }),
        )
    }

    fn parse_callback(&mut self, element: &XmlElement) -> Result<NodeId, GirError> {
        let callable = self.parse_callable(element)?;
        self.alloc_named(
            element,
            NodeKind::Callback(Callback {
                callable,
                ctype: owned(element, "c:type"),
            }),
        )
    }

    fn parse_vfunc(&mut self, element: &XmlElement) -> Result<NodeId, GirError> {
        let callable = self.parse_callable(element)?;
        self.alloc_named(
            element,
            NodeKind::VFunction(VFunction {
                callable,
                invoker: owned(element, "invoker"),
            }),
        )
    }

    fn parse_signal(&mut self, element: &XmlElement) -> Result<NodeId, GirError> {
        let callable = self.parse_callable(element)?;
        self.alloc_named(
            element,
            NodeKind::Signal(Signal {
                callable,
                when: owned(element, "when"),
                no_recurse: element.flag("no-recurse"),
                detailed: element.flag("detailed"),
                action: element.flag("action"),
                no_hooks: element.flag("no-hooks"),
                emitter: owned(element, "emitter"),
            }),
        )
    }

    // ====================================================================
    // Simple nodes
    // ====================================================================

    fn parse_alias(&mut self, element: &XmlElement) -> Result<NodeId, GirError> {
        let target = self
            .parse_type_child(element, &[])?
            .unwrap_or_else(Type::unknown);
        self.alloc_named(
            element,
            NodeKind::Alias(Alias {
                target,
                ctype: owned(element, "c:type"),
            }),
        )
    }

    fn parse_constant(&mut self, element: &XmlElement) -> Result<NodeId, GirError> {
        let value_type = self
            .parse_type_child(element, &[])?
            .unwrap_or_else(Type::unknown);
        self.alloc_named(
            element,
            NodeKind::Constant(Constant {
                value_type,
                value: required(element, "value")?.to_string(),
                ctype: owned(element, "c:type"),
            }),
        )
    }

    fn parse_enumeration(&mut self, element: &XmlElement) -> Result<NodeId, GirError> {
        let mut members = Vec::new();
        for member_element in element.children_named("member") {
            let mut member = Node::new(
                required(member_element, "name")?,
                NodeKind::Member(Member {
                    value: number::<i64>(member_element, "value")?.unwrap_or(0),
                    symbol: member_element
                        .attr("c:identifier")
                        .unwrap_or_default()
                        .to_string(),
                    nick: owned(member_element, "glib:nick"),
                    dump_name: owned(member_element, "glib:name"),
                }),
            );
            self.parse_generic(&mut member, member_element);
            members.push(self.model.alloc(member));
        }

        let enumeration = Enumeration {
            ctype: owned(element, "c:type"),
            registration: registration(element),
            members: members.clone(),
            error_domain: owned(element, "glib:error-domain"),
            contents: Contents::default(),
        };
        let kind = if element.name == "bitfield" {
            NodeKind::Bitfield(enumeration)
        } else {
            NodeKind::Enum(enumeration)
        };
        let id = self.alloc_named(element, kind)?;
        for member in members {
            self.model.adopt(id, member);
        }
        if !self.types_only {
            for function in element.children_named("function") {
                let func = self.parse_function(function)?;
                self.link(id, func, Slot::StaticMethod);
            }
        }
        Ok(id)
    }

    fn parse_property(&mut self, element: &XmlElement) -> Result<NodeId, GirError> {
        let typ = self
            .parse_type_child(element, &[])?
            .unwrap_or_else(Type::unknown);
        self.alloc_named(
            element,
            NodeKind::Property(Property {
                typ,
                readable: element.attr("readable") != Some("0"),
                writable: element.flag("writable"),
                construct: element.flag("construct"),
                construct_only: element.flag("construct-only"),
                transfer: element
                    .attr("transfer-ownership")
                    .and_then(Transfer::parse)
                    .unwrap_or(Transfer::None),
                setter: owned(element, "setter"),
                getter: owned(element, "getter"),
                default_value: owned(element, "default-value"),
            }),
        )
    }

    // ====================================================================
    // Compounds and their members
    // ====================================================================

    /// Functions shared by every type holding methods
    fn parse_functions(&mut self, parent: NodeId, element: &XmlElement) -> Result<(), GirError> {
        if self.types_only {
            return Ok(());
        }
        for child in &element.children {
            let slot = match child.name.as_str() {
                "constructor" => Slot::Constructor,
                "method" | "method-inline" => Slot::Method,
                "function" | "function-inline" => Slot::StaticMethod,
                _ => continue,
            };
            let id = self.parse_function(child)?;
            self.link(parent, id, slot);
        }
        Ok(())
    }

    fn parse_fields(&mut self, parent: NodeId, element: &XmlElement) -> Result<(), GirError> {
        let is_field = |c: &&XmlElement| matches!(c.name.as_str(), "field" | "record" | "union");
        let names: Vec<String> = element
            .children
            .iter()
            .filter(is_field)
            .filter_map(|c| owned(c, "name"))
            .collect();

        for child in element.children.iter().filter(is_field) {
            let name = required(child, "name")?;
            let mut field = Field {
                typ: None,
                readable: child.attr("readable") != Some("0"),
                writable: child.flag("writable"),
                bits: number::<u32>(child, "bits")?,
                private: child.flag("private"),
                anonymous_node: None,
            };
            let anonymous = match child.name.as_str() {
                "record" | "union" => Some(self.parse_compound(child)?),
                _ => match child.child("callback") {
                    Some(callback) => Some(self.parse_callback(callback)?),
                    None => {
                        field.typ = self.parse_type_child(child, &names)?;
                        None
                    }
                },
            };
            field.anonymous_node = anonymous;
            if anonymous.is_some() {
                field.readable = true;
                field.writable = false;
            }

            let mut node = Node::new(name, NodeKind::Field(field));
            if child.name == "field" {
                self.parse_generic(&mut node, child);
            }
            let id = self.model.alloc(node);
            if let Some(anonymous) = anonymous {
                self.model.adopt(id, anonymous);
            }
            self.link(parent, id, Slot::Field);
        }
        Ok(())
    }

    fn parse_compound(&mut self, element: &XmlElement) -> Result<NodeId, GirError> {
        let mut compound = Compound::new(owned(element, "c:type"));
        compound.registration = registration(element);
        compound.disguised = element.flag("disguised");
        compound.opaque = element.flag("opaque");
        compound.pointer = element.flag("pointer");
        compound.foreign = element.flag("foreign");
        compound.is_gtype_struct_for = self.type_attr(element, "glib:is-gtype-struct-for");
        compound.copy_func = owned(element, "copy-function");
        compound.free_func = owned(element, "free-function");
        let kind = if element.name == "union" {
            NodeKind::Union(compound)
        } else {
            NodeKind::Record(compound)
        };

        let id = self.alloc_named(element, kind)?;
        self.parse_fields(id, element)?;
        self.parse_functions(id, element)?;
        Ok(id)
    }

    fn parse_boxed(&mut self, element: &XmlElement) -> Result<NodeId, GirError> {
        let mut node = Node::new(
            required(element, "glib:name")?,
            NodeKind::Boxed(Boxed {
                registration: registration(element),
                contents: Contents::default(),
            }),
        );
        self.parse_generic(&mut node, element);
        let id = self.model.alloc(node);
        self.parse_functions(id, element)?;
        Ok(id)
    }

    /// Members classes and interfaces share
    fn parse_object_members(&mut self, parent: NodeId, element: &XmlElement) -> Result<(), GirError> {
        self.parse_fields(parent, element)?;
        if self.types_only {
            return Ok(());
        }
        self.parse_functions(parent, element)?;
        for child in &element.children {
            let (id, slot) = match child.name.as_str() {
                "virtual-method" => (self.parse_vfunc(child)?, Slot::VirtualMethod),
                "property" => (self.parse_property(child)?, Slot::Property),
                "glib:signal" => (self.parse_signal(child)?, Slot::Signal),
                _ => continue,
            };
            self.link(parent, id, slot);
        }
        Ok(())
    }

    fn named_types(&self, element: &XmlElement, tag: &str) -> Result<Vec<Type>, GirError> {
        element
            .children_named(tag)
            .map(|c| {
                required(c, "name").map(|name| self.model.namespace(self.ns).type_from_name(name, None))
            })
            .collect()
    }

    fn parse_class(&mut self, element: &XmlElement) -> Result<NodeId, GirError> {
        let class = Class {
            ctype: owned(element, "c:type"),
            registration: registration(element),
            parent_type: self.type_attr(element, "parent"),
            fundamental: element.flag("glib:fundamental"),
            is_abstract: element.flag("abstract"),
            is_final: element.flag("final"),
            ref_func: owned(element, "glib:ref-func"),
            unref_func: owned(element, "glib:unref-func"),
            set_value_func: owned(element, "glib:set-value-func"),
            get_value_func: owned(element, "glib:get-value-func"),
            glib_type_struct: self.type_attr(element, "glib:type-struct"),
            interfaces: self.named_types(element, "implements")?,
            ..Class::default()
        };
        let id = self.alloc_named(element, NodeKind::Class(class))?;
        self.parse_object_members(id, element)?;
        Ok(id)
    }

    fn parse_interface(&mut self, element: &XmlElement) -> Result<NodeId, GirError> {
        let iface = Interface {
            ctype: owned(element, "c:type"),
            registration: registration(element),
            prerequisites: self.named_types(element, "prerequisite")?,
            glib_type_struct: self.type_attr(element, "glib:type-struct"),
            contents: Contents::default(),
        };
        let id = self.alloc_named(element, NodeKind::Interface(iface))?;
        self.parse_object_members(id, element)?;
        Ok(id)
    }
}
