//! GIR serialization
//!
//! Output is deterministic: namespace members are written aliases first and
//! then by name, methods and properties by name, fields and enum members in
//! declaration order. Reading the output back with [`super::GirReader`] and
//! writing it again gives the same bytes.

use super::xml::XmlWriter;
use super::COMPATIBLE_GIR_VERSION;
use crate::ast::{
    Boxed, Callable, Class, Compound, Constant, Contents, Direction, Enumeration, Field, Function, FunctionMacro,
    Interface, Metadata, Model, Namespace, NamespaceId, Node, NodeId, NodeKind, Parameter,
    Property, Return, Signal, Type, TypeKind, TypeTarget,
};
use crate::error::GirError;
use crate::position::SourcePosition;
use std::path::{Path, PathBuf};
use tracing::debug;

type Attrs = Vec<(&'static str, String)>;

const HEADER: &str = "This file was automatically generated from C sources - DO NOT EDIT!\n\
To affect the contents of this file, edit the original C definitions,\n\
and/or use gtk-doc annotations.";

/// Writes one namespace of a model as a GIR document
pub struct GirWriter<'a> {
    model: &'a Model,
    ns: NamespaceId,
    sources_roots: Vec<PathBuf>,
    xml: XmlWriter,
}

impl<'a> GirWriter<'a> {
    /// A writer for the model's main namespace
    pub fn new(model: &'a Model) -> Self {
        GirWriter {
            model,
            ns: model.main_id(),
            sources_roots: Vec::new(),
            xml: XmlWriter::new(),
        }
    }

    /// Write source file names relative to the closest of these roots
    pub fn with_sources_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.sources_roots = roots;
        self
    }

    /// Serialize the namespace
    pub fn write(mut self) -> Result<String, GirError> {
        let model = self.model;
        let namespace = model.namespace(self.ns);
        debug!(namespace = %namespace.name, nodes = namespace.len(), "writing GIR");

        self.xml.comment(HEADER);
        self.xml.start(
            "repository",
            &[
                ("version", COMPATIBLE_GIR_VERSION.to_string()),
                ("xmlns", "http://www.gtk.org/introspection/core/1.0".to_string()),
                ("xmlns:c", "http://www.gtk.org/introspection/c/1.0".to_string()),
                ("xmlns:doc", "http://www.gtk.org/introspection/doc/1.0".to_string()),
                ("xmlns:glib", "http://www.gtk.org/introspection/glib/1.0".to_string()),
            ],
        );
        for include in &namespace.includes {
            self.xml.empty(
                "include",
                &[("name", include.name.clone()), ("version", include.version.clone())],
            );
        }
        for package in sorted_unique(&namespace.exported_packages) {
            self.xml.empty("package", &[("name", package)]);
        }
        for c_include in sorted_unique(&namespace.c_includes) {
            self.xml.empty("c:include", &[("name", c_include)]);
        }
        self.xml
            .empty("doc:format", &[("name", namespace.doc_format.clone())]);
        self.write_namespace(namespace)?;
        self.xml.end();
        self.xml.finish()
    }

    fn write_namespace(&mut self, namespace: &Namespace) -> Result<(), GirError> {
        self.xml.start(
            "namespace",
            &[
                ("name", namespace.name.clone()),
                ("version", namespace.version.clone()),
                ("shared-library", namespace.shared_libraries.join(",")),
                ("c:identifier-prefixes", namespace.identifier_prefixes.join(",")),
                ("c:symbol-prefixes", namespace.symbol_prefixes.join(",")),
            ],
        );
        // aliases first, the typelib compiler expands them
        let mut nodes: Vec<NodeId> = namespace.nodes().collect();
        nodes.sort_by_key(|id| !matches!(self.model.node(*id).kind, NodeKind::Alias(_)));
        for id in nodes {
            self.write_node(id)?;
        }
        self.xml.end();
        Ok(())
    }

    fn write_node(&mut self, id: NodeId) -> Result<(), GirError> {
        let model = self.model;
        let node = model.node(id);
        match &node.kind {
            NodeKind::Function(func) => {
                let tag = if func.is_inline { "function-inline" } else { "function" };
                self.write_function(node, func, tag)
            }
            NodeKind::FunctionMacro(macro_) => self.write_function_macro(node, macro_),
            NodeKind::Enum(e) => self.write_enum(node, e, "enumeration"),
            NodeKind::Bitfield(e) => self.write_enum(node, e, "bitfield"),
            NodeKind::Class(class) => self.write_class(node, class),
            NodeKind::Interface(iface) => self.write_interface(node, iface),
            NodeKind::Callback(_) => self.write_callback(node),
            NodeKind::Record(compound) => self.write_compound(node, compound, "record"),
            NodeKind::Union(compound) => self.write_compound(node, compound, "union"),
            NodeKind::Boxed(boxed) => self.write_boxed(node, boxed),
            NodeKind::Alias(alias) => {
                let mut attrs: Attrs = vec![("name", node.name.clone())];
                push_opt(&mut attrs, "c:type", alias.ctype.as_ref());
                append_node_generic(&node.meta, &mut attrs);
                self.xml.start("alias", &attrs);
                self.write_generic(node)?;
                self.write_type_ref(&alias.target)?;
                self.xml.end();
                Ok(())
            }
            NodeKind::Constant(constant) => self.write_constant(node, constant),
            NodeKind::DocSection => {
                self.xml.start("docsection", &[("name", node.name.clone())]);
                self.write_generic(node)?;
                self.xml.end();
                Ok(())
            }
            NodeKind::Pointer(_) => {
                debug!(name = %node.name, "pointer types have no GIR element");
                Ok(())
            }
            NodeKind::Member(_)
            | NodeKind::Field(_)
            | NodeKind::Property(_)
            | NodeKind::Signal(_)
            | NodeKind::VFunction(_) => Ok(()),
        }
    }

    // ====================================================================
    // Generic metadata
    // ====================================================================

    fn relative_path(&self, filename: &str) -> String {
        let mut best = filename.to_string();
        for root in &self.sources_roots {
            if let Ok(relative) = Path::new(filename).strip_prefix(root) {
                let relative = relative.to_string_lossy();
                if relative.len() < best.len() {
                    best = relative.into_owned();
                }
            }
        }
        best
    }

    fn position_attrs(&self, attrs: &mut Attrs, position: &SourcePosition) {
        attrs.push(("filename", self.relative_path(&position.filename)));
        attrs.push(("line", position.line.to_string()));
        if let Some(column) = position.column {
            attrs.push(("column", column.to_string()));
        }
    }

    fn write_meta(
        &mut self,
        meta: &Metadata,
        position: Option<&SourcePosition>,
    ) -> Result<(), GirError> {
        for (name, value) in &meta.attributes {
            self.xml
                .empty("attribute", &[("name", name.clone()), ("value", value.clone())]);
        }
        if let Some(doc) = &meta.doc {
            let mut attrs: Attrs = vec![("xml:space", "preserve".to_string())];
            if let Some(position) = &meta.doc_position {
                self.position_attrs(&mut attrs, position);
            }
            self.xml.text_element("doc", &attrs, doc);
        }
        let preserve = [("xml:space", "preserve".to_string())];
        if let Some(text) = &meta.version_doc {
            self.xml.text_element("doc-version", &preserve, text);
        }
        if let Some(text) = &meta.deprecated_doc {
            self.xml.text_element("doc-deprecated", &preserve, text);
        }
        if let Some(text) = &meta.stability_doc {
            self.xml.text_element("doc-stability", &preserve, text);
        }
        if let Some(position) = position {
            let mut attrs = Attrs::new();
            self.position_attrs(&mut attrs, position);
            self.xml.empty("source-position", &attrs);
        }
        Ok(())
    }

    fn write_generic(&mut self, node: &Node) -> Result<(), GirError> {
        self.write_meta(&node.meta, node.main_position())
    }

    // ====================================================================
    // Callables
    // ====================================================================

    fn write_callable(
        &mut self,
        node: &Node,
        callable: &Callable,
        tag: &str,
        extra: Attrs,
    ) -> Result<(), GirError> {
        let mut attrs: Attrs = vec![("name", node.name.clone())];
        attrs.extend(extra);
        append_version(&node.meta, &mut attrs);
        append_node_generic(&node.meta, &mut attrs);
        push_flag(&mut attrs, "throws", callable.throws);
        push_opt(&mut attrs, "glib:finish-func", callable.finish_func.as_ref());
        push_opt(&mut attrs, "glib:sync-func", callable.sync_func.as_ref());
        push_opt(&mut attrs, "glib:async-func", callable.async_func.as_ref());

        self.xml.start(tag, &attrs);
        self.write_generic(node)?;
        self.write_return(&callable.retval, callable)?;
        self.write_parameters(callable)?;
        self.xml.end();
        Ok(())
    }

    fn write_function(&mut self, node: &Node, func: &Function, tag: &str) -> Result<(), GirError> {
        if func.internal_skipped {
            return Ok(());
        }
        let mut attrs: Attrs = vec![("c:identifier", func.symbol.clone())];
        if let Some(shadowed_by) = &func.shadowed_by {
            attrs.push(("shadowed-by", shadowed_by.clone()));
        } else if let Some(shadows) = &func.shadows {
            attrs.push(("shadows", shadows.clone()));
        }
        push_opt(&mut attrs, "moved-to", func.moved_to.as_ref());
        push_opt(&mut attrs, "glib:set-property", func.set_property.as_ref());
        push_opt(&mut attrs, "glib:get-property", func.get_property.as_ref());
        self.write_callable(node, &func.callable, tag, attrs)
    }

    fn write_method(&mut self, id: NodeId, default_tag: &str) -> Result<(), GirError> {
        let model = self.model;
        let node = model.node(id);
        let Some(func) = node.function() else {
            return Ok(());
        };
        let tag = if default_tag == "method" && func.is_inline {
            "method-inline"
        } else {
            default_tag
        };
        self.write_function(node, func, tag)
    }

    fn write_function_macro(&mut self, node: &Node, macro_: &FunctionMacro) -> Result<(), GirError> {
        let mut attrs: Attrs = vec![
            ("name", node.name.clone()),
            ("c:identifier", macro_.symbol.clone()),
        ];
        append_version(&node.meta, &mut attrs);
        append_node_generic(&node.meta, &mut attrs);
        self.xml.start("function-macro", &attrs);
        self.write_generic(node)?;
        if !macro_.parameters.is_empty() {
            self.xml.start("parameters", &[]);
            for param in &macro_.parameters {
                self.xml.start("parameter", &[("name", param.argname.clone())]);
                self.write_meta(&param.meta, None)?;
                self.xml.end();
            }
            self.xml.end();
        }
        self.xml.end();
        Ok(())
    }

    fn write_return(&mut self, retval: &Return, callable: &Callable) -> Result<(), GirError> {
        let mut attrs = Attrs::new();
        if let Some(transfer) = retval.transfer {
            attrs.push(("transfer-ownership", transfer.as_str().to_string()));
        }
        push_flag(&mut attrs, "skip", retval.meta.skip);
        push_flag(&mut attrs, "nullable", retval.nullable && !retval.not_nullable);
        self.xml.start("return-value", &attrs);
        self.write_meta(&retval.meta, None)?;
        self.write_type(&retval.typ, &parameter_names(callable))?;
        self.xml.end();
        Ok(())
    }

    fn write_parameters(&mut self, callable: &Callable) -> Result<(), GirError> {
        if callable.parameters.is_empty() && callable.instance_parameter.is_none() {
            return Ok(());
        }
        self.xml.start("parameters", &[]);
        if let Some(instance) = &callable.instance_parameter {
            self.write_parameter(callable, instance, "instance-parameter")?;
        }
        for param in &callable.parameters {
            self.write_parameter(callable, param, "parameter")?;
        }
        self.xml.end();
        Ok(())
    }

    fn write_parameter(
        &mut self,
        callable: &Callable,
        param: &Parameter,
        tag: &str,
    ) -> Result<(), GirError> {
        let is_out = param.direction.is_out();
        let mut attrs: Attrs = vec![("name", param.argname.clone())];
        if is_out {
            attrs.push(("direction", param.direction.as_str().to_string()));
            attrs.push(("caller-allocates", flag(param.caller_allocates)));
        }
        if let Some(transfer) = param.transfer {
            attrs.push(("transfer-ownership", transfer.as_str().to_string()));
        }
        if param.nullable && !param.not_nullable {
            attrs.push(("nullable", "1".to_string()));
            push_flag(&mut attrs, "allow-none", param.direction != Direction::Out);
        }
        if param.optional {
            attrs.push(("optional", "1".to_string()));
            push_flag(&mut attrs, "allow-none", param.direction == Direction::Out);
        }
        if let Some(scope) = param.scope {
            attrs.push(("scope", scope.as_str().to_string()));
        }
        if let Some(closure) = &param.closure_name {
            attrs.push(("closure", sibling_index(callable, closure)?.to_string()));
        }
        if let Some(destroy) = &param.destroy_name {
            attrs.push(("destroy", sibling_index(callable, destroy)?.to_string()));
        }
        push_flag(&mut attrs, "skip", param.meta.skip);
        self.xml.start(tag, &attrs);
        self.write_meta(&param.meta, None)?;
        self.write_type(param.typ(), &parameter_names(callable))?;
        self.xml.end();
        Ok(())
    }

    fn write_callback(&mut self, node: &Node) -> Result<(), GirError> {
        let NodeKind::Callback(callback) = &node.kind else {
            return Ok(());
        };
        let mut attrs = Attrs::new();
        if let Some(ctype) = &callback.ctype {
            if *ctype != node.name {
                attrs.push(("c:type", ctype.clone()));
            }
        }
        self.write_callable(node, &callback.callable, "callback", attrs)
    }

    // ====================================================================
    // Types
    // ====================================================================

    fn type_to_name(&self, typ: &Type) -> Result<String, GirError> {
        let Some(giname) = typ.target_giname() else {
            return Err(GirError::UnresolvedType(typ.unresolved_string()));
        };
        let prefix = format!("{}.", self.model.namespace(self.ns).name);
        Ok(giname.strip_prefix(&prefix).unwrap_or(giname).to_string())
    }

    /// Only the name, for alias targets
    fn write_type_ref(&mut self, typ: &Type) -> Result<(), GirError> {
        let mut attrs = Attrs::new();
        if let Some(ctype) = typ.complete_ctype.as_ref().or(typ.ctype.as_ref()) {
            attrs.push(("c:type", ctype.clone()));
        }
        let name = match &typ.kind {
            TypeKind::Array { array_type, .. } => array_type.gir_name().map(str::to_string),
            TypeKind::List { name, .. } => Some(name.clone()),
            TypeKind::Map { .. } => Some("GLib.HashTable".to_string()),
            TypeKind::Varargs => None,
            TypeKind::Plain => match &typ.target {
                TypeTarget::GiName(_) => Some(self.type_to_name(typ)?),
                TypeTarget::Fundamental(name) => Some(name.clone()),
                _ => None,
            },
        };
        if let Some(name) = name {
            attrs.insert(0, ("name", name));
        }
        self.xml.empty("type", &attrs);
        Ok(())
    }

    /// Full type; `siblings` resolves array length references to indexes
    fn write_type(&mut self, typ: &Type, siblings: &[&str]) -> Result<(), GirError> {
        let mut attrs = Attrs::new();
        if let Some(ctype) = typ.complete_ctype.as_ref().or(typ.ctype.as_ref()) {
            attrs.push(("c:type", ctype.clone()));
        }
        match &typ.kind {
            TypeKind::Varargs => self.xml.empty("varargs", &[]),
            TypeKind::Array {
                array_type,
                element,
                zero_terminated,
                size,
                length_param,
            } => {
                if let Some(name) = array_type.gir_name() {
                    attrs.insert(0, ("name", name.to_string()));
                }
                // explicit only when the default would not be implied
                if !zero_terminated {
                    attrs.insert(0, ("zero-terminated", "0".to_string()));
                } else if size.is_some() || length_param.is_some() {
                    attrs.insert(0, ("zero-terminated", "1".to_string()));
                }
                if let Some(size) = size {
                    attrs.push(("fixed-size", size.to_string()));
                }
                if let Some(length) = length_param {
                    let index = siblings.iter().position(|s| *s == length.as_str()).ok_or_else(|| {
                        GirError::Invalid(format!("array length '{}' names no sibling", length))
                    })?;
                    attrs.insert(0, ("length", index.to_string()));
                }
                self.xml.start("array", &attrs);
                self.write_type(element, &[])?;
                self.xml.end();
            }
            TypeKind::List { name, element } => {
                attrs.insert(0, ("name", name.clone()));
                self.xml.start("type", &attrs);
                self.write_type(element, &[])?;
                self.xml.end();
            }
            TypeKind::Map { key, value } => {
                attrs.insert(0, ("name", "GLib.HashTable".to_string()));
                self.xml.start("type", &attrs);
                self.write_type(key, &[])?;
                self.write_type(value, &[])?;
                self.xml.end();
            }
            TypeKind::Plain => {
                match &typ.target {
                    TypeTarget::GiName(_) => attrs.insert(0, ("name", self.type_to_name(typ)?)),
                    TypeTarget::Fundamental(name) => attrs.insert(0, ("name", name.clone())),
                    TypeTarget::Foreign(_) => attrs.insert(0, ("foreign", "1".to_string())),
                    TypeTarget::Unresolved | TypeTarget::Unknown => {}
                }
                self.xml.empty("type", &attrs);
            }
        }
        Ok(())
    }

    // ====================================================================
    // Registered types
    // ====================================================================

    fn sorted(&self, ids: &[NodeId]) -> Vec<NodeId> {
        let mut ids = ids.to_vec();
        ids.sort_by(|a, b| self.model.node(*a).name.cmp(&self.model.node(*b).name));
        ids
    }

    fn sorted_type_names(&self, types: &[Type]) -> Result<Vec<String>, GirError> {
        let mut names = types
            .iter()
            .map(|t| self.type_to_name(t))
            .collect::<Result<Vec<_>, _>>()?;
        names.sort();
        Ok(names)
    }

    fn write_enum(&mut self, node: &Node, e: &Enumeration, tag: &str) -> Result<(), GirError> {
        let mut attrs: Attrs = vec![("name", node.name.clone())];
        append_version(&node.meta, &mut attrs);
        append_node_generic(&node.meta, &mut attrs);
        append_registered(node, &mut attrs);
        push_opt(&mut attrs, "c:type", e.ctype.as_ref());
        if tag == "enumeration" {
            push_opt(&mut attrs, "glib:error-domain", e.error_domain.as_ref());
        }
        self.xml.start(tag, &attrs);
        self.write_generic(node)?;
        let model = self.model;
        for &id in &e.members {
            let member = model.node(id);
            let NodeKind::Member(m) = &member.kind else {
                continue;
            };
            let mut attrs: Attrs = vec![
                ("name", member.name.clone()),
                ("value", m.value.to_string()),
                ("c:identifier", m.symbol.clone()),
            ];
            append_version(&member.meta, &mut attrs);
            append_node_generic(&member.meta, &mut attrs);
            push_opt(&mut attrs, "glib:nick", m.nick.as_ref());
            push_opt(&mut attrs, "glib:name", m.dump_name.as_ref());
            self.xml.start("member", &attrs);
            self.write_generic(member)?;
            self.xml.end();
        }
        for id in self.sorted(&e.contents.static_methods) {
            self.write_method(id, "function")?;
        }
        self.xml.end();
        Ok(())
    }

    fn write_constant(&mut self, node: &Node, constant: &Constant) -> Result<(), GirError> {
        let mut attrs: Attrs = vec![
            ("name", node.name.clone()),
            ("value", constant.value.clone()),
        ];
        push_opt(&mut attrs, "c:type", constant.ctype.as_ref());
        append_version(&node.meta, &mut attrs);
        append_node_generic(&node.meta, &mut attrs);
        self.xml.start("constant", &attrs);
        self.write_generic(node)?;
        self.write_type(&constant.value_type, &[])?;
        self.xml.end();
        Ok(())
    }

    fn write_class(&mut self, node: &Node, class: &Class) -> Result<(), GirError> {
        let mut attrs: Attrs = vec![("name", node.name.clone())];
        push_opt(&mut attrs, "c:symbol-prefix", class.registration.c_symbol_prefix.as_ref());
        push_opt(&mut attrs, "c:type", class.ctype.as_ref());
        append_version(&node.meta, &mut attrs);
        append_node_generic(&node.meta, &mut attrs);
        if let Some(parent) = &class.parent_type {
            attrs.push(("parent", self.type_to_name(parent)?));
        }
        push_flag(&mut attrs, "abstract", class.is_abstract);
        push_flag(&mut attrs, "final", class.is_final);
        push_opt(&mut attrs, "glib:type-name", class.registration.gtype_name.as_ref());
        push_opt(&mut attrs, "glib:get-type", class.registration.get_type.as_ref());
        if let Some(type_struct) = &class.glib_type_struct {
            attrs.push(("glib:type-struct", self.type_to_name(type_struct)?));
        }
        push_flag(&mut attrs, "glib:fundamental", class.fundamental);
        push_opt(&mut attrs, "glib:ref-func", class.ref_func.as_ref());
        push_opt(&mut attrs, "glib:unref-func", class.unref_func.as_ref());
        push_opt(&mut attrs, "glib:set-value-func", class.set_value_func.as_ref());
        push_opt(&mut attrs, "glib:get-value-func", class.get_value_func.as_ref());

        self.xml.start("class", &attrs);
        self.write_generic(node)?;
        for name in self.sorted_type_names(&class.interfaces)? {
            self.xml.empty("implements", &[("name", name)]);
        }
        for id in self.sorted(&class.contents.constructors) {
            self.write_method(id, "constructor")?;
        }
        self.write_object_members(node)?;
        self.xml.end();
        Ok(())
    }

    fn write_interface(&mut self, node: &Node, iface: &Interface) -> Result<(), GirError> {
        let mut attrs: Attrs = vec![("name", node.name.clone())];
        push_opt(&mut attrs, "c:symbol-prefix", iface.registration.c_symbol_prefix.as_ref());
        push_opt(&mut attrs, "c:type", iface.ctype.as_ref());
        append_version(&node.meta, &mut attrs);
        append_node_generic(&node.meta, &mut attrs);
        push_opt(&mut attrs, "glib:type-name", iface.registration.gtype_name.as_ref());
        push_opt(&mut attrs, "glib:get-type", iface.registration.get_type.as_ref());
        if let Some(type_struct) = &iface.glib_type_struct {
            attrs.push(("glib:type-struct", self.type_to_name(type_struct)?));
        }

        self.xml.start("interface", &attrs);
        self.write_generic(node)?;
        for name in self.sorted_type_names(&iface.prerequisites)? {
            self.xml.empty("prerequisite", &[("name", name)]);
        }
        self.write_object_members(node)?;
        self.xml.end();
        Ok(())
    }

    /// Everything classes and interfaces share after their constructors
    fn write_object_members(&mut self, node: &Node) -> Result<(), GirError> {
        let Some(contents) = node.contents() else {
            return Ok(());
        };
        for id in self.sorted(&contents.static_methods) {
            self.write_method(id, "function")?;
        }
        let model = self.model;
        for id in self.sorted(&contents.virtual_methods) {
            let vnode = model.node(id);
            if let NodeKind::VFunction(vfunc) = &vnode.kind {
                let mut attrs = Attrs::new();
                push_opt(&mut attrs, "invoker", vfunc.invoker.as_ref());
                self.write_callable(vnode, &vfunc.callable, "virtual-method", attrs)?;
            }
        }
        for id in self.sorted(&contents.methods) {
            self.write_method(id, "method")?;
        }
        for id in self.sorted(&contents.properties) {
            let pnode = model.node(id);
            if let NodeKind::Property(prop) = &pnode.kind {
                self.write_property(pnode, prop)?;
            }
        }
        self.write_fields(&contents.fields)?;
        for id in self.sorted(&contents.signals) {
            let snode = model.node(id);
            if let NodeKind::Signal(signal) = &snode.kind {
                self.write_signal(snode, signal)?;
            }
        }
        Ok(())
    }

    fn write_boxed(&mut self, node: &Node, boxed: &Boxed) -> Result<(), GirError> {
        let mut attrs: Attrs = vec![("glib:name", node.name.clone())];
        push_opt(&mut attrs, "c:symbol-prefix", boxed.registration.c_symbol_prefix.as_ref());
        append_registered(node, &mut attrs);
        self.xml.start("glib:boxed", &attrs);
        self.write_generic(node)?;
        self.write_compound_functions(&boxed.contents)?;
        self.xml.end();
        Ok(())
    }

    fn write_compound_functions(&mut self, contents: &Contents) -> Result<(), GirError> {
        for id in self.sorted(&contents.constructors) {
            self.write_method(id, "constructor")?;
        }
        for id in self.sorted(&contents.methods) {
            self.write_method(id, "method")?;
        }
        for id in self.sorted(&contents.static_methods) {
            self.write_method(id, "function")?;
        }
        Ok(())
    }

    fn write_compound(&mut self, node: &Node, compound: &Compound, tag: &str) -> Result<(), GirError> {
        let mut attrs: Attrs = vec![("name", node.name.clone())];
        push_opt(&mut attrs, "c:type", compound.ctype.as_ref());
        let registration = &compound.registration;
        if tag == "record" {
            push_flag(&mut attrs, "disguised", compound.disguised);
            push_flag(&mut attrs, "opaque", compound.opaque);
            push_flag(&mut attrs, "pointer", compound.pointer);
            push_flag(&mut attrs, "foreign", compound.foreign);
            if let Some(owner) = &compound.is_gtype_struct_for {
                attrs.push(("glib:is-gtype-struct-for", self.type_to_name(owner)?));
            }
            push_opt(&mut attrs, "copy-function", compound.copy_func.as_ref());
            push_opt(&mut attrs, "free-function", compound.free_func.as_ref());
            append_version(&node.meta, &mut attrs);
            append_node_generic(&node.meta, &mut attrs);
            append_registered(node, &mut attrs);
            push_opt(&mut attrs, "c:symbol-prefix", registration.c_symbol_prefix.as_ref());
        } else {
            append_version(&node.meta, &mut attrs);
            append_node_generic(&node.meta, &mut attrs);
            append_registered(node, &mut attrs);
            push_opt(&mut attrs, "c:symbol-prefix", registration.c_symbol_prefix.as_ref());
            push_opt(&mut attrs, "copy-function", compound.copy_func.as_ref());
            push_opt(&mut attrs, "free-function", compound.free_func.as_ref());
        }
        self.xml.start(tag, &attrs);
        self.write_generic(node)?;
        self.write_fields(&compound.contents.fields)?;
        self.write_compound_functions(&compound.contents)?;
        self.xml.end();
        Ok(())
    }

    fn write_fields(&mut self, fields: &[NodeId]) -> Result<(), GirError> {
        let model = self.model;
        let names: Vec<&str> = fields.iter().map(|id| model.node(*id).name.as_str()).collect();
        for &id in fields {
            let node = model.node(id);
            if let NodeKind::Field(field) = &node.kind {
                self.write_field(node, field, &names)?;
            }
        }
        Ok(())
    }

    fn write_field(&mut self, node: &Node, field: &Field, siblings: &[&str]) -> Result<(), GirError> {
        let model = self.model;
        if let Some(anonymous) = field.anonymous_node {
            let inner = model.node(anonymous);
            return match &inner.kind {
                NodeKind::Callback(_) => {
                    let mut attrs: Attrs = vec![("name", node.name.clone())];
                    append_node_generic(&node.meta, &mut attrs);
                    self.xml.start("field", &attrs);
                    self.write_generic(node)?;
                    self.write_callback(inner)?;
                    self.xml.end();
                    Ok(())
                }
                NodeKind::Record(compound) => self.write_compound(inner, compound, "record"),
                NodeKind::Union(compound) => self.write_compound(inner, compound, "union"),
                _ => Err(GirError::Invalid(format!(
                    "field '{}' holds an anonymous {}",
                    node.name,
                    inner.kind_name()
                ))),
            };
        }

        let typ = field
            .typ
            .as_ref()
            .ok_or_else(|| GirError::Invalid(format!("field '{}' has no type", node.name)))?;
        let mut attrs: Attrs = vec![("name", node.name.clone())];
        append_version(&node.meta, &mut attrs);
        append_node_generic(&node.meta, &mut attrs);
        // fields are assumed readable and read-only
        if !field.readable {
            attrs.push(("readable", "0".to_string()));
        }
        push_flag(&mut attrs, "writable", field.writable);
        if let Some(bits) = field.bits {
            attrs.push(("bits", bits.to_string()));
        }
        push_flag(&mut attrs, "private", field.private);
        self.xml.start("field", &attrs);
        self.write_generic(node)?;
        self.write_type(typ, siblings)?;
        self.xml.end();
        Ok(())
    }

    fn write_property(&mut self, node: &Node, prop: &Property) -> Result<(), GirError> {
        let mut attrs: Attrs = vec![("name", node.name.clone())];
        append_version(&node.meta, &mut attrs);
        append_node_generic(&node.meta, &mut attrs);
        if !prop.readable {
            attrs.push(("readable", "0".to_string()));
        }
        push_flag(&mut attrs, "writable", prop.writable);
        push_flag(&mut attrs, "construct", prop.construct);
        push_flag(&mut attrs, "construct-only", prop.construct_only);
        attrs.push(("transfer-ownership", prop.transfer.as_str().to_string()));
        push_opt(&mut attrs, "setter", prop.setter.as_ref());
        push_opt(&mut attrs, "getter", prop.getter.as_ref());
        push_opt(&mut attrs, "default-value", prop.default_value.as_ref());
        self.xml.start("property", &attrs);
        self.write_generic(node)?;
        self.write_type(&prop.typ, &[])?;
        self.xml.end();
        Ok(())
    }

    fn write_signal(&mut self, node: &Node, signal: &Signal) -> Result<(), GirError> {
        let mut attrs: Attrs = vec![("name", node.name.clone())];
        push_opt(&mut attrs, "when", signal.when.as_ref());
        push_flag(&mut attrs, "no-recurse", signal.no_recurse);
        push_flag(&mut attrs, "detailed", signal.detailed);
        push_flag(&mut attrs, "action", signal.action);
        push_flag(&mut attrs, "no-hooks", signal.no_hooks);
        push_opt(&mut attrs, "emitter", signal.emitter.as_ref());
        append_version(&node.meta, &mut attrs);
        append_node_generic(&node.meta, &mut attrs);
        self.xml.start("glib:signal", &attrs);
        self.write_generic(node)?;
        self.write_return(&signal.callable.retval, &signal.callable)?;
        self.write_parameters(&signal.callable)?;
        self.xml.end();
        Ok(())
    }
}

/// Write the model's main namespace
pub fn write_gir(model: &Model) -> Result<String, GirError> {
    GirWriter::new(model).write()
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

fn push_opt(attrs: &mut Attrs, key: &'static str, value: Option<&String>) {
    if let Some(value) = value {
        attrs.push((key, value.clone()));
    }
}

fn push_flag(attrs: &mut Attrs, key: &'static str, set: bool) {
    if set {
        attrs.push((key, "1".to_string()));
    }
}

fn sorted_unique(values: &[String]) -> Vec<String> {
    let mut values = values.to_vec();
    values.sort();
    values.dedup();
    values
}

fn append_version(meta: &Metadata, attrs: &mut Attrs) {
    push_opt(attrs, "version", meta.version.as_ref());
}

fn append_node_generic(meta: &Metadata, attrs: &mut Attrs) {
    if meta.skip || !meta.introspectable {
        attrs.push(("introspectable", "0".to_string()));
    }
    push_flag(attrs, "deprecated", meta.deprecated.is_some() || meta.deprecated_doc.is_some());
    push_opt(
        attrs,
        "deprecated-version",
        meta.deprecated.as_ref().filter(|v| !v.is_empty()),
    );
    push_opt(attrs, "stability", meta.stability.as_ref());
}

fn append_registered(node: &Node, attrs: &mut Attrs) {
    let Some(registration) = node.registration() else {
        return;
    };
    if let Some(get_type) = &registration.get_type {
        push_opt(attrs, "glib:type-name", registration.gtype_name.as_ref());
        attrs.push(("glib:get-type", get_type.clone()));
    }
}

fn parameter_names(callable: &Callable) -> Vec<&str> {
    callable.parameters.iter().map(|p| p.argname.as_str()).collect()
}

fn sibling_index(callable: &Callable, name: &str) -> Result<usize, GirError> {
    callable
        .parameter_index(name)
        .ok_or_else(|| GirError::Invalid(format!("parameter '{}' does not exist", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Alias, ArrayType, Include, Member, Registration, Scope, Transfer};
    use crate::passes::test_support::*;

    fn body(out: &str) -> Vec<&str> {
        out.lines().map(str::trim).collect()
    }

    #[test]
    fn test_repository_header() {
        let mut model = model();
        model.main_mut().includes.insert(Include::new("GObject", "2.0"));
        model.main_mut().c_includes = vec!["foo.h".into(), "foo.h".into(), "bar.h".into()];
        model.main_mut().shared_libraries = vec!["libfoo.so".into()];
        add_rect(&mut model);

        let out = write_gir(&model).unwrap();
        assert!(out.starts_with("<?xml version=\"1.0\"?>\n<!-- This file was automatically generated"));
        let lines = body(&out);
        assert!(lines.contains(&"<include name=\"GObject\" version=\"2.0\"/>"));
        let bar = lines.iter().position(|l| *l == "<c:include name=\"bar.h\"/>").unwrap();
        let foo = lines.iter().position(|l| *l == "<c:include name=\"foo.h\"/>").unwrap();
        assert!(bar < foo);
        assert_eq!(lines.iter().filter(|l| l.contains("foo.h")).count(), 1);
        assert!(lines.contains(&"<doc:format name=\"unknown\"/>"));
        assert!(lines.contains(
            &"<namespace name=\"Foo\" version=\"1.0\" shared-library=\"libfoo.so\" c:identifier-prefixes=\"Foo\" c:symbol-prefixes=\"foo\">"
        ));
    }

    #[test]
    fn test_aliases_come_first() {
        let mut model = model();
        add_rect(&mut model);
        let ns = model.main_id();
        let alias = model.alloc(Node::new(
            "Size",
            NodeKind::Alias(Alias {
                target: Type::fundamental("gint"),
                ctype: Some("FooSize".into()),
            }),
        ));
        model.append(ns, alias, false).unwrap();

        let out = write_gir(&model).unwrap();
        let alias_at = out.find("<alias name=\"Size\"").unwrap();
        let record_at = out.find("<record name=\"Rect\"").unwrap();
        assert!(alias_at < record_at);
        assert!(out.contains("<type name=\"gint\" c:type=\"gint\"/>"));
    }

    #[test]
    fn test_function_with_array_length_and_closure() {
        let mut model = model();
        let mut data = param("data", ptr("guint8"));
        let mut array = Type::array(ArrayType::C, Type::fundamental("guint8"));
        array.ctype = Some("guint8*".into());
        if let TypeKind::Array { length_param, zero_terminated, .. } = &mut array.kind {
            *length_param = Some("len".into());
            *zero_terminated = false;
        }
        data.typ = Some(array);
        data.transfer = Some(Transfer::None);
        let mut func_param = param("func", Type::giname("Foo.Callback"));
        func_param.scope = Some(Scope::Notified);
        func_param.closure_name = Some("user_data".into());
        func_param.destroy_name = Some("notify".into());
        let mut out_param = param("out", ptr("gint"));
        out_param.direction = Direction::Out;
        out_param.optional = true;
        let id = add_function(
            &mut model,
            "foo_feed",
            Type::none(),
            vec![
                data,
                param("len", Type::fundamental("gsize")),
                func_param,
                param("user_data", Type::any()),
                param("notify", Type::giname("GLib.DestroyNotify")),
                out_param,
            ],
        );
        model.node_mut(id).function_mut().unwrap().callable.throws = true;

        let out = write_gir(&model).unwrap();
        let lines = body(&out);
        assert!(lines.contains(&"<function name=\"feed\" c:identifier=\"foo_feed\" throws=\"1\">"));
        assert!(lines.contains(&"<array length=\"1\" zero-terminated=\"0\" c:type=\"guint8*\">"));
        assert!(lines.contains(
            &"<parameter name=\"func\" scope=\"notified\" closure=\"3\" destroy=\"4\">"
        ));
        assert!(lines.contains(&"<type name=\"Callback\"/>"));
        assert!(lines.contains(&"<type name=\"GLib.DestroyNotify\"/>"));
        assert!(lines.contains(
            &"<parameter name=\"out\" direction=\"out\" caller-allocates=\"0\" optional=\"1\" allow-none=\"1\">"
        ));
    }

    #[test]
    fn test_internal_skipped_function_is_not_written() {
        let mut model = model();
        let id = add_function(&mut model, "foo_hidden", Type::none(), Vec::new());
        model.node_mut(id).function_mut().unwrap().internal_skipped = true;
        let out = write_gir(&model).unwrap();
        assert!(!out.contains("foo_hidden"));
    }

    #[test]
    fn test_non_introspectable_and_deprecated() {
        let mut model = model();
        let id = add_function(&mut model, "foo_old", Type::none(), Vec::new());
        let meta = &mut model.node_mut(id).meta;
        meta.introspectable = false;
        meta.deprecated = Some("1.2".into());
        meta.deprecated_doc = Some("Use foo_new() instead.".into());
        meta.version = Some("1.0".into());

        let out = write_gir(&model).unwrap();
        assert!(out.contains(
            "<function name=\"old\" c:identifier=\"foo_old\" version=\"1.0\" introspectable=\"0\" deprecated=\"1\" deprecated-version=\"1.2\">"
        ));
        assert!(out.contains(
            "<doc-deprecated xml:space=\"preserve\">Use foo_new() instead.</doc-deprecated>"
        ));
    }

    #[test]
    fn test_doc_and_source_position() {
        let mut model = model();
        let rect = add_rect(&mut model);
        let node = model.node_mut(rect);
        node.meta.doc = Some("A rectangle & more.".into());
        node.meta.doc_position = Some(SourcePosition::new("/src/foo/foo.c", 10));
        node.add_file_position(SourcePosition::with_column("/src/foo/foo.h", 4, 2));

        let out = GirWriter::new(&model)
            .with_sources_roots(vec![PathBuf::from("/src/foo")])
            .write()
            .unwrap();
        assert!(out.contains(
            "<doc xml:space=\"preserve\" filename=\"foo.c\" line=\"10\">A rectangle &amp; more.</doc>"
        ));
        assert!(out.contains("<source-position filename=\"foo.h\" line=\"4\" column=\"2\"/>"));
    }

    #[test]
    fn test_class_members_sorted() {
        let mut model = model_with_gobject();
        let widget = add_widget(&mut model);
        for (symbol, name) in [("foo_widget_show", "show"), ("foo_widget_hide", "hide")] {
            let func = model.alloc(Node::new(
                name,
                NodeKind::Function(Function {
                    is_method: true,
                    ..Function::new(Callable::new(Return::new(Type::none()), Vec::new(), false), symbol)
                }),
            ));
            model.node_mut(widget).contents_mut().unwrap().methods.push(func);
            model.adopt(widget, func);
        }
        if let NodeKind::Class(class) = &mut model.node_mut(widget).kind {
            class.parent_type = Some(Type::giname("GObject.InitiallyUnowned"));
        }

        let out = write_gir(&model).unwrap();
        assert!(out.contains("<class name=\"Widget\" c:symbol-prefix=\"widget\" c:type=\"FooWidget\" parent=\"GObject.InitiallyUnowned\" glib:type-name=\"FooWidget\" glib:get-type=\"foo_widget_get_type\">"));
        let hide = out.find("name=\"hide\"").unwrap();
        let show = out.find("name=\"show\"").unwrap();
        assert!(hide < show);
    }

    #[test]
    fn test_unresolved_parent_is_an_error() {
        let mut model = model_with_gobject();
        let widget = add_widget(&mut model);
        if let NodeKind::Class(class) = &mut model.node_mut(widget).kind {
            class.parent_type = Some(Type::from_ctype("FooMissing"));
        }
        let err = write_gir(&model).unwrap_err();
        assert!(matches!(err, GirError::UnresolvedType(ref name) if name == "FooMissing"));
    }

    #[test]
    fn test_unresolved_plain_type_keeps_ctype_only() {
        let mut model = model();
        add_function(&mut model, "foo_take", Type::none(), vec![param("thing", ptr("FooThing"))]);
        let out = write_gir(&model).unwrap();
        assert!(out.contains("<type c:type=\"FooThing*\"/>"));
    }

    #[test]
    fn test_enum_members_in_order() {
        let mut model = model();
        let ns = model.main_id();
        let mut members = Vec::new();
        for (name, value) in [("zebra", 0), ("apple", 1)] {
            members.push(model.alloc(Node::new(
                name,
                NodeKind::Member(Member {
                    value,
                    symbol: format!("FOO_COLOR_{}", name.to_uppercase()),
                    nick: Some(name.to_string()),
                    dump_name: None,
                }),
            )));
        }
        let color = model.alloc(Node::new(
            "Color",
            NodeKind::Enum(Enumeration {
                ctype: Some("FooColor".into()),
                registration: Registration {
                    gtype_name: Some("FooColor".into()),
                    get_type: Some("foo_color_get_type".into()),
                    c_symbol_prefix: None,
                },
                members,
                error_domain: Some("foo-color-error".into()),
                contents: Default::default(),
            }),
        ));
        model.append(ns, color, false).unwrap();

        let out = write_gir(&model).unwrap();
        assert!(out.contains("<enumeration name=\"Color\" glib:type-name=\"FooColor\" glib:get-type=\"foo_color_get_type\" c:type=\"FooColor\" glib:error-domain=\"foo-color-error\">"));
        let zebra = out.find("FOO_COLOR_ZEBRA").unwrap();
        let apple = out.find("FOO_COLOR_APPLE").unwrap();
        assert!(zebra < apple);
        assert!(out.contains("<member name=\"zebra\" value=\"0\" c:identifier=\"FOO_COLOR_ZEBRA\" glib:nick=\"zebra\"/>"));
    }

    #[test]
    fn test_pointer_types_are_skipped() {
        let mut model = model();
        let ns = model.main_id();
        let pointer = model.alloc(Node::new("Handle", NodeKind::Pointer(Boxed::default())));
        model.append(ns, pointer, false).unwrap();
        let out = write_gir(&model).unwrap();
        assert!(!out.contains("Handle"));
    }
}
