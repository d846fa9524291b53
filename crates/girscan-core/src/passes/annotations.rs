//! Applying comment block annotations to the model

use super::transfer::TypedSlot;
use super::typespec::TypeSite;
use super::SemanticTransformer;
use crate::annotation::{
    Annotation, Annotations, CommentBlock, CommentParameter, CommentTag, Tag,
};
use crate::ast::types::{
    ANY, BASIC_GIR_TYPES, BASIC_TYPES, CHAR, FILENAME, INT8, POINTER_TYPES, STRING, UINT8,
};
use crate::ast::{
    ArrayType, Callable, Direction, Metadata, NodeId, NodeKind, Parameter, Scope, Transfer, Type,
    TypeKind,
};
use crate::diagnostic::WarningCode;
use crate::error::ScanError;
use crate::position::SourcePosition;
use once_cell::sync::Lazy;

static NO_ANNOTATIONS: Lazy<Annotations> = Lazy::new(Annotations::default);

/// A `@name:` or `Returns:` part of a block
#[derive(Clone, Copy)]
struct Part<'p> {
    annotations: &'p Annotations,
    description: Option<&'p str>,
    position: &'p SourcePosition,
}

impl<'p> From<&'p CommentParameter> for Part<'p> {
    fn from(param: &'p CommentParameter) -> Self {
        Part {
            annotations: &param.annotations,
            description: param.description.as_deref(),
            position: &param.position,
        }
    }
}

impl<'p> From<&'p CommentTag> for Part<'p> {
    fn from(tag: &'p CommentTag) -> Self {
        Part {
            annotations: &tag.annotations,
            description: tag.description.as_deref(),
            position: &tag.position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Function,
    VFunction,
    Callback,
    Signal,
}

/// The callable whose parts are being annotated
struct CallableSite {
    flavor: Flavor,
    name: String,
    /// C symbol of functions, the name otherwise
    label: String,
    is_constructor: bool,
    position: Option<SourcePosition>,
}

/// Where `length=` of an `(array)` annotation is looked up
enum LengthScope<'o> {
    Callable {
        site: &'o CallableSite,
        callable: &'o mut Callable,
    },
    Fields {
        parent: &'o str,
        names: &'o [String],
    },
}

impl LengthScope<'_> {
    /// Validate a referenced sibling; the referenced parameter takes over the
    /// direction of the array
    fn resolve(&mut self, name: &str, origin: &str, direction: Direction) -> Result<String, ScanError> {
        match self {
            LengthScope::Callable { site, callable } => {
                // a bare number is a 0-based index into the parameter list
                let by_index = match name.parse::<usize>() {
                    Ok(index) if callable.parameter(name).is_none() => {
                        callable.parameters.get(index).map(|p| p.argname.clone())
                    }
                    _ => None,
                };
                let lookup = by_index.as_deref().unwrap_or(name);
                let Some(param) = callable.parameter_mut(lookup) else {
                    return Err(ScanError::UnknownParameterReference {
                        param: name.to_string(),
                        origin: origin.to_string(),
                        callable: site.name.clone(),
                    });
                };
                param.direction = direction;
                if direction == Direction::Out {
                    param.transfer = Some(Transfer::Full);
                }
                Ok(param.argname.clone())
            }
            LengthScope::Fields { parent, names } => {
                if names.iter().any(|n| n == name) {
                    Ok(name.to_string())
                } else {
                    Err(ScanError::UnknownFieldReference {
                        field: name.to_string(),
                        origin: origin.to_string(),
                        parent: parent.to_string(),
                    })
                }
            }
        }
    }
}

fn slot_origin(slot: &dyn TypedSlot) -> String {
    match slot.argname() {
        Some(name) => format!("parameter {}", name),
        None => "return value".to_string(),
    }
}

fn apply_block_metadata(meta: &mut Metadata, block: &CommentBlock) {
    if let Some(doc) = block.description.as_deref().filter(|d| !d.is_empty()) {
        meta.doc = Some(doc.to_string());
        meta.doc_position = Some(block.position.clone());
    }
    copy_tag(block, Tag::Since, &mut meta.version, &mut meta.version_doc);
    copy_tag(block, Tag::Deprecated, &mut meta.deprecated, &mut meta.deprecated_doc);
    copy_tag(block, Tag::Stability, &mut meta.stability, &mut meta.stability_doc);
    apply_attributes(meta, &block.annotations);
    if block.annotations.has(Annotation::Skip) {
        meta.skip = true;
    }
}

/// Non-empty value and description of a version-like tag
fn copy_tag(block: &CommentBlock, tag: Tag, value: &mut Option<String>, doc: &mut Option<String>) {
    let Some(tag) = block.tag(tag.as_str()) else {
        return;
    };
    if let Some(v) = tag.value.as_deref().filter(|v| !v.is_empty()) {
        *value = Some(v.to_string());
    }
    if let Some(d) = tag.description.as_deref().filter(|d| !d.is_empty()) {
        *doc = Some(d.to_string());
    }
}

fn apply_attributes(meta: &mut Metadata, annotations: &Annotations) {
    if let Some(attributes) = annotations.get(Annotation::Attributes) {
        for (key, value) in attributes.pairs() {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                meta.set_attribute(key, value);
            }
        }
    }
}

impl SemanticTransformer<'_> {
    // ====================================================================
    // Pass 3: early record annotations
    // ====================================================================

    /// Records are annotated before transfer defaults so `(foreign)` counts
    pub(super) fn pass_read_annotations_early(&mut self, id: NodeId, _chain: &[NodeId]) -> Result<bool, ScanError> {
        if let NodeKind::Record(_) = self.model.node(id).kind {
            let name = self
                .model
                .node(id)
                .ctype()
                .map(str::to_string)
                .unwrap_or_else(|| self.model.c_name(id));
            let block = self.block(&name);
            self.apply_annotated(id, block.as_ref());
        }
        Ok(true)
    }

    // ====================================================================
    // Pass 5: main annotations
    // ====================================================================

    pub(super) fn pass_read_annotations(&mut self, id: NodeId, _chain: &[NodeId]) -> Result<bool, ScanError> {
        if self.model.node(id).namespace.is_none() {
            return Ok(false);
        }
        let kind = self.model.node(id).kind.clone();
        match &kind {
            NodeKind::Alias(_) | NodeKind::Constant(_) => {
                let block = self.block(&self.annotation_name(id));
                self.apply_annotated(id, block.as_ref());
                if let (NodeKind::Constant(_), Some(block)) = (&kind, &block) {
                    if let Some(value) = block.annotations.first(Annotation::Value) {
                        let value = value.to_string();
                        if let NodeKind::Constant(c) = &mut self.model.node_mut(id).kind {
                            c.value = value;
                        }
                    }
                }
            }
            NodeKind::Function(f) => {
                let block = self.block(&f.symbol);
                self.apply_callable(id, block.as_ref())?;
            }
            NodeKind::FunctionMacro(m) => {
                let block = self.block(&m.symbol);
                if let Some(block) = &block {
                    let mut macro_node = m.clone();
                    for param in macro_node.parameters.iter_mut() {
                        if let Some(doc) = block.param(&param.argname) {
                            param.meta.doc = doc.description.clone();
                            param.meta.doc_position = Some(doc.position.clone());
                        }
                    }
                    self.model.node_mut(id).kind = NodeKind::FunctionMacro(macro_node);
                }
                self.apply_annotated(id, block.as_ref());
            }
            NodeKind::Callback(_) => {
                let block = self.block(&self.annotation_name(id));
                self.apply_callable(id, block.as_ref())?;
            }
            NodeKind::Enum(e) | NodeKind::Bitfield(e) => {
                let block = self.block(&self.annotation_name(id));
                self.apply_annotated(id, block.as_ref());
                self.apply_member_annotations(&e.members, block.as_ref());
            }
            NodeKind::Class(_) | NodeKind::Interface(_) | NodeKind::Record(_) | NodeKind::Union(_) => {
                self.apply_compound_annotations(id)?;
            }
            _ => {}
        }
        Ok(true)
    }

    fn apply_compound_annotations(&mut self, id: NodeId) -> Result<(), ScanError> {
        let name = self.annotation_name(id);
        let block = self.block(&name);
        let kind = self.model.node(id).kind.clone();
        if !matches!(kind, NodeKind::Record(_)) {
            self.apply_annotated(id, block.as_ref());
        }

        let contents = self.model.node(id).contents().cloned().unwrap_or_default();
        for field in &contents.fields {
            self.apply_field_annotations(id, &name, block.as_ref(), *field)?;
        }
        let section = self.blocks.remove(&format!("SECTION:{}", name.to_lowercase()));
        self.apply_annotated(id, section.as_ref());

        if matches!(kind, NodeKind::Class(_) | NodeKind::Interface(_)) {
            for prop in &contents.properties {
                self.apply_property_annotations(&name, *prop);
            }
            for signal in &contents.signals {
                self.apply_signal_annotations(&name, *signal)?;
            }
        }

        let Some(block) = block else {
            return Ok(());
        };
        let first = |annotation| block.annotations.first(annotation).map(str::to_string);
        match &mut self.model.node_mut(id).kind {
            NodeKind::Class(class) => {
                class.unref_func = first(Annotation::UnrefFunc);
                class.ref_func = first(Annotation::RefFunc);
                class.set_value_func = first(Annotation::SetValueFunc);
                class.get_value_func = first(Annotation::GetValueFunc);
            }
            NodeKind::Record(compound) | NodeKind::Union(compound) => {
                compound.copy_func = first(Annotation::CopyFunc);
                compound.free_func = first(Annotation::FreeFunc);
            }
            _ => {}
        }
        Ok(())
    }

    fn apply_member_annotations(&mut self, members: &[NodeId], parent_block: Option<&CommentBlock>) {
        for &member in members {
            let symbol = self.model.node(member).symbol().unwrap_or_default().to_string();
            if let Some(block) = self.block(&symbol) {
                self.apply_annotated(member, Some(&block));
                continue;
            }
            let Some(param) = parent_block.and_then(|b| b.param(&symbol)) else {
                continue;
            };
            if let Some(doc) = param.description.as_deref().filter(|d| !d.is_empty()) {
                let node = self.model.node_mut(member);
                node.meta.doc = Some(doc.to_string());
                node.meta.doc_position = Some(param.position.clone());
            }
        }
    }

    fn apply_field_annotations(
        &mut self,
        parent: NodeId,
        parent_name: &str,
        parent_block: Option<&CommentBlock>,
        field: NodeId,
    ) -> Result<(), ScanError> {
        let field_name = self.model.node(field).name.clone();
        let annotations = match self.block(&format!("{}.{}", parent_name, field_name)) {
            Some(block) => {
                self.apply_annotated(field, Some(&block));
                block.annotations
            }
            None => {
                let Some(tag) = parent_block.and_then(|b| b.param(&field_name)) else {
                    return Ok(());
                };
                let node = self.model.node_mut(field);
                node.meta.doc = tag.description.clone();
                node.meta.doc_position = Some(tag.position.clone());
                tag.annotations.clone()
            }
        };

        let NodeKind::Field(mut payload) = self.model.node(field).kind.clone() else {
            return Ok(());
        };
        if let Some(spec) = annotations.first(Annotation::Type) {
            payload.typ = Some(self.model.create_type_from_user_string(spec));
        }
        if let Some(mut typ) = payload.typ.take() {
            let names: Vec<String> = self
                .model
                .node(parent)
                .contents()
                .map(|c| c.fields.iter().map(|f| self.model.node(*f).name.clone()).collect())
                .unwrap_or_default();
            let parent_label = self.model.node(parent).name.clone();
            let mut scope = LengthScope::Fields {
                parent: &parent_label,
                names: &names,
            };
            let origin = format!("field {}", field_name);
            let site = TypeSite {
                label: parent_name,
                position: annotations.position.as_ref(),
            };
            self.adjust_container_type(&mut scope, &mut typ, Direction::In, &annotations, &origin, &site)?;
            payload.typ = Some(typ);
        }
        self.model.node_mut(field).kind = NodeKind::Field(payload);
        Ok(())
    }

    fn apply_property_annotations(&mut self, parent_name: &str, prop: NodeId) {
        let block = self.block(&format!("{}:{}", parent_name, self.model.node(prop).name));
        self.apply_annotated(prop, block.as_ref());
        let Some(block) = block else {
            return;
        };
        let NodeKind::Property(mut payload) = self.model.node(prop).kind.clone() else {
            return;
        };
        let annotations = &block.annotations;
        payload.transfer = annotations
            .first(Annotation::Transfer)
            .and_then(Transfer::parse)
            .unwrap_or(Transfer::None);
        if let Some(spec) = annotations.first(Annotation::Type) {
            let site = TypeSite {
                label: spec,
                position: Some(&block.position),
            };
            payload.typ = self.resolve_toplevel(spec, &payload.typ, &site);
        }
        if let Some(setter) = annotations.first(Annotation::Setter) {
            payload.setter = Some(setter.to_string());
        }
        if let Some(getter) = annotations.first(Annotation::Getter) {
            payload.getter = Some(getter.to_string());
        }
        if let Some(value) = annotations.first(Annotation::DefaultValue) {
            payload.default_value = Some(value.to_string());
        }
        self.model.node_mut(prop).kind = NodeKind::Property(payload);
    }

    fn apply_signal_annotations(&mut self, parent_name: &str, signal: NodeId) -> Result<(), ScanError> {
        let block = self.block(&format!("{}::{}", parent_name, self.model.node(signal).name));
        let Some(mut callable) = self.callable_of(signal) else {
            return Ok(());
        };
        let mut named = false;
        if let Some(block) = &block {
            self.apply_annotated(signal, Some(block));
            if let Some(emitter) = block.annotations.first(Annotation::Emitter) {
                let emitter = emitter.to_string();
                if let NodeKind::Signal(s) = &mut self.model.node_mut(signal).kind {
                    s.emitter = Some(emitter);
                }
            }
            // the first documented parameter is the instance
            if block.params.len() > callable.parameters.len() {
                for (param, name) in callable.parameters.iter_mut().zip(block.params.keys().skip(1)) {
                    param.argname = name.to_string();
                }
                named = true;
            } else if !callable.parameters.is_empty() {
                self.diagnostics.warn(
                    WarningCode::UnknownDocParameter,
                    "incorrect number of parameters in comment block, parameter annotations will be ignored.",
                    Some(&block.position),
                );
            }
        }

        let site = self.callable_site(signal);
        for i in 0..callable.parameters.len() {
            let mut param = callable.parameters[i].clone();
            let tag = if named {
                block.as_ref().and_then(|b| b.params.nth(i + 1))
            } else {
                None
            };
            self.apply_param(&site, &mut callable, &mut param, tag.map(Part::from))?;
            callable.parameters[i] = param;
        }
        self.apply_return(&site, &mut callable, block.as_ref())?;
        self.store_callable(signal, callable);
        Ok(())
    }

    // ====================================================================
    // Shared appliers
    // ====================================================================

    /// Docs, versions, attributes and flags from an identifier block
    pub(super) fn apply_annotated(&mut self, id: NodeId, block: Option<&CommentBlock>) {
        let Some(block) = block else {
            return;
        };
        let annotations = &block.annotations;
        let node = self.model.node_mut(id);
        apply_block_metadata(&mut node.meta, block);
        if annotations.has(Annotation::Foreign) {
            node.foreign = true;
            if let Some(compound) = node.compound_mut() {
                compound.foreign = true;
            }
        }
        if let NodeKind::Function(function) = &mut node.kind {
            if annotations.has(Annotation::Constructor) {
                function.is_constructor = true;
            }
            if annotations.has(Annotation::Method) {
                function.is_method = true;
            }
            if let Some(name) = annotations.first(Annotation::SetProperty) {
                function.set_property = Some(name.to_string());
            }
            if let Some(name) = annotations.first(Annotation::GetProperty) {
                function.get_property = Some(name.to_string());
            }
        }
    }

    fn callable_site(&self, id: NodeId) -> CallableSite {
        let node = self.model.node(id);
        let flavor = match node.kind {
            NodeKind::Function(_) => Flavor::Function,
            NodeKind::VFunction(_) => Flavor::VFunction,
            NodeKind::Callback(_) => Flavor::Callback,
            _ => Flavor::Signal,
        };
        CallableSite {
            flavor,
            name: node.name.clone(),
            label: node.symbol().unwrap_or(&node.name).to_string(),
            is_constructor: node.function().is_some_and(|f| f.is_constructor),
            position: node.main_position().cloned(),
        }
    }

    /// Annotate a whole signature from its block
    pub(super) fn apply_callable(&mut self, id: NodeId, block: Option<&CommentBlock>) -> Result<(), ScanError> {
        if self.model.node(id).callable().is_none() {
            return Ok(());
        }
        if let Some(block) = block {
            let annotations = &block.annotations;
            if let Some(callable) = self.model.node_mut(id).callable_mut() {
                if let Some(name) = annotations.first(Annotation::FinishFunc) {
                    callable.finish_func = Some(name.to_string());
                }
                if let Some(name) = annotations.first(Annotation::SyncFunc) {
                    callable.sync_func = Some(name.to_string());
                }
                if let Some(name) = annotations.first(Annotation::AsyncFunc) {
                    callable.async_func = Some(name.to_string());
                }
            }
        }
        self.apply_annotated(id, block);

        let site = self.callable_site(id);
        let Some(mut callable) = self.callable_of(id) else {
            return Ok(());
        };
        self.apply_params(&site, &mut callable, block)?;
        self.apply_return(&site, &mut callable, block)?;
        self.store_callable(id, callable);
        Ok(())
    }

    fn apply_params(
        &mut self,
        site: &CallableSite,
        callable: &mut Callable,
        block: Option<&CommentBlock>,
    ) -> Result<(), ScanError> {
        let mut declared = Vec::new();
        if let Some(mut instance) = callable.instance_parameter.take() {
            let tag = block.and_then(|b| b.param(&instance.argname));
            let result = self.apply_param(site, callable, &mut instance, tag.map(Part::from));
            declared.push(instance.argname.clone());
            callable.instance_parameter = Some(instance);
            result?;
        }
        for i in 0..callable.parameters.len() {
            let mut param = callable.parameters[i].clone();
            let tag = block.and_then(|b| b.param(&param.argname));
            self.apply_param(site, callable, &mut param, tag.map(Part::from))?;
            declared.push(param.argname.clone());
            callable.parameters[i] = param;
        }

        let Some(block) = block else {
            return Ok(());
        };
        let mut unused: Vec<&String> = declared
            .iter()
            .filter(|name| !block.params.contains(name.as_str()))
            .collect();
        unused.sort();
        for (doc_name, doc_param) in block.params.keys().zip(block.params.values()) {
            if declared.iter().any(|d| d == doc_name) {
                continue;
            }
            let hint = match unused.as_slice() {
                [] => String::new(),
                [only] => format!(", should be '{}'", only),
                many => format!(
                    ", should be one of {}",
                    many.iter().map(|p| format!("'{}'", p)).collect::<Vec<_>>().join(", ")
                ),
            };
            self.diagnostics.warn(
                WarningCode::UnknownDocParameter,
                format!(
                    "{}: unknown parameter '{}' in documentation comment{}",
                    block.name, doc_name, hint
                ),
                Some(&doc_param.position),
            );
        }
        Ok(())
    }

    fn apply_param(
        &mut self,
        site: &CallableSite,
        callable: &mut Callable,
        param: &mut Parameter,
        part: Option<Part<'_>>,
    ) -> Result<(), ScanError> {
        match site.flavor {
            Flavor::Function | Flavor::VFunction => {
                self.apply_param_callback(site, callable, param, part)?;
            }
            Flavor::Callback => self.apply_param_closure(param, part),
            Flavor::Signal => {}
        }
        self.apply_slot_common(site, callable, param, part)
    }

    fn apply_return(
        &mut self,
        site: &CallableSite,
        callable: &mut Callable,
        block: Option<&CommentBlock>,
    ) -> Result<(), ScanError> {
        let mut tag = block.and_then(|b| b.tag(Tag::Returns.as_str()));
        if let (Some(returns), Some(block)) = (tag, block) {
            if callable.retval.typ.is_fundamental(crate::ast::types::NONE) {
                self.diagnostics.warn(
                    WarningCode::InvalidAnnotationTarget,
                    format!("{}: invalid return annotation", block.name),
                    Some(&returns.position),
                );
                tag = None;
            }
        }
        let mut retval = callable.retval.clone();
        self.apply_slot_common(site, callable, &mut retval, tag.map(Part::from))?;
        callable.retval = retval;
        Ok(())
    }

    fn resolves_to_any(&self, typ: &Type) -> bool {
        match self.model.lookup_typenode(typ).map(|id| self.model.resolve_aliases(id)) {
            Some(Err(fundamental)) => fundamental.is_fundamental(ANY),
            _ => typ.is_fundamental(ANY),
        }
    }

    fn apply_param_callback(
        &mut self,
        site: &CallableSite,
        callable: &mut Callable,
        param: &mut Parameter,
        part: Option<Part<'_>>,
    ) -> Result<(), ScanError> {
        let annotations = part.map(|p| p.annotations).unwrap_or(&NO_ANNOTATIONS);
        let position = annotations.position.as_ref();
        let is_callback = self
            .resolved_target(param.typ())
            .is_some_and(|t| matches!(self.model.node(t).kind, NodeKind::Callback(_)));
        if !is_callback {
            for annotation in [Annotation::Scope, Annotation::Destroy, Annotation::Closure] {
                if annotations.has(annotation) {
                    self.diagnostics.warn(
                        WarningCode::InvalidAnnotationTarget,
                        format!(
                            "invalid \"{}\" annotation: only valid on callback parameters",
                            annotation.as_str()
                        ),
                        position,
                    );
                }
            }
            return Ok(());
        }

        let origin = format!("parameter {}", param.argname);
        if let Some(options) = annotations.get(Annotation::Scope).filter(|o| o.len() == 1) {
            param.scope = options.first().and_then(Scope::parse);
        }
        if let Some(name) = annotations.get(Annotation::Destroy).filter(|o| o.len() == 1).and_then(|o| o.first()) {
            let Some(destroy) = callable.parameter_mut(name) else {
                return Err(ScanError::UnknownParameterReference {
                    param: name.to_string(),
                    origin,
                    callable: site.name.clone(),
                });
            };
            destroy.scope = Some(Scope::Notified);
            param.destroy_name = Some(destroy.argname.clone());
            param.scope = Some(Scope::Notified);
        }
        if let Some(name) = annotations.get(Annotation::Closure).filter(|o| o.len() == 1).and_then(|o| o.first()) {
            let Some(closure) = callable.parameter(name) else {
                return Err(ScanError::UnknownParameterReference {
                    param: name.to_string(),
                    origin,
                    callable: site.name.clone(),
                });
            };
            param.closure_name = Some(closure.argname.clone());
            let closure_type = closure.typ().clone();
            if !self.resolves_to_any(&closure_type) {
                self.diagnostics.warn(
                    WarningCode::InvalidAnnotationTarget,
                    "invalid \"closure\" annotation: only valid on gpointer parameters",
                    position,
                );
            }
        }
        Ok(())
    }

    /// In callback types a bare `(closure)` marks the user data parameter
    fn apply_param_closure(&mut self, param: &mut Parameter, part: Option<Part<'_>>) {
        let Some(annotations) = part.map(|p| p.annotations) else {
            return;
        };
        let Some(options) = annotations.get(Annotation::Closure) else {
            return;
        };
        let position = annotations.position.as_ref();
        if !options.is_empty() {
            self.diagnostics.warn(
                WarningCode::InvalidAnnotationOptions,
                "invalid \"closure\" annotation with argument on a callback type",
                position,
            );
            return;
        }
        param.closure_name = Some(param.argname.clone());
        if !self.resolves_to_any(param.typ()) {
            self.diagnostics.warn(
                WarningCode::InvalidAnnotationTarget,
                "invalid \"closure\" annotation: only valid on gpointer parameters",
                position,
            );
        }
    }

    fn is_pointer_type(&self, slot: &dyn TypedSlot) -> bool {
        if !slot.is_return() && slot.direction().is_out() {
            return true;
        }
        let resolved = match self.model.lookup_typenode(slot.typ()).map(|id| self.model.resolve_aliases(id)) {
            Some(Ok(_)) => return true,
            Some(Err(fundamental)) => fundamental,
            None => slot.typ().clone(),
        };
        !resolved.is_any_fundamental(BASIC_TYPES)
            || resolved.ctype.as_deref().is_some_and(|c| c.ends_with('*'))
    }

    fn caller_allocates_by_default(&self, typ: &Type) -> bool {
        let (Some(giname), Some(ctype)) = (typ.target_giname(), typ.ctype.as_deref()) else {
            return false;
        };
        let target = self
            .model
            .lookup_giname(giname)
            .and_then(|id| self.model.resolve_aliases(id).ok());
        !ctype.contains("**")
            && target.is_some_and(|t| matches!(self.model.node(t).kind, NodeKind::Record(_) | NodeKind::Union(_)))
    }

    fn apply_transfer_annotation(&mut self, slot: &mut dyn TypedSlot, annotations: &Annotations) {
        let Some(options) = annotations.get(Annotation::Transfer).filter(|o| o.len() == 1) else {
            return;
        };
        let Some(value) = options.first() else {
            return;
        };
        let position = annotations.position.as_ref();
        let target_node = self
            .model
            .lookup_typenode(slot.typ())
            .map(|id| self.model.resolve_aliases(id));
        let (target_kind, node_type) = match &target_node {
            Some(Ok(id)) => (Some(&self.model.node(*id).kind), slot.typ().clone()),
            Some(Err(fundamental)) => (None, fundamental.clone()),
            None => (None, slot.typ().clone()),
        };
        let described = match (&target_node, slot.typ()) {
            (Some(Ok(id)), _) => self.model.giname(*id),
            (_, typ) => typ.to_string(),
        };

        let warning = match value {
            "floating" => {
                let objectish = matches!(target_kind, Some(NodeKind::Class(_) | NodeKind::Interface(_)))
                    || matches!(node_type.target_giname(), Some("GLib.Variant" | "GObject.Closure"));
                (!objectish).then_some("only valid for object, GVariant and GClosure types")
            }
            "container" => {
                let container = annotations.has(Annotation::Array) || node_type.is_container();
                (!container).then_some("only valid for container types")
            }
            _ => {
                let pointer_like = self.is_pointer_type(&*slot)
                    || node_type.is_any_fundamental(&[STRING, FILENAME])
                    || node_type.is_container()
                    || matches!(
                        target_kind,
                        Some(
                            NodeKind::Record(_)
                                | NodeKind::Union(_)
                                | NodeKind::Boxed(_)
                                | NodeKind::Pointer(_)
                                | NodeKind::Class(_)
                                | NodeKind::Interface(_)
                        )
                    );
                (!pointer_like).then_some(
                    "only valid for array, struct, union, boxed, object and interface types",
                )
            }
        };
        if let Some(reason) = warning {
            self.diagnostics.warn(
                WarningCode::InvalidAnnotationTarget,
                format!("invalid \"transfer\" annotation for {}: {}", described, reason),
                position,
            );
            return;
        }
        slot.set_transfer(Transfer::parse(value));
    }

    fn apply_slot_common<S: TypedSlot>(
        &mut self,
        site: &CallableSite,
        callable: &mut Callable,
        slot: &mut S,
        part: Option<Part<'_>>,
    ) -> Result<(), ScanError> {
        let annotations = part.map(|p| p.annotations).unwrap_or(&NO_ANNOTATIONS);
        let position = part.map(|p| p.position).or(site.position.as_ref());
        let type_site = TypeSite {
            label: &site.label,
            position,
        };

        if let Some(spec) = annotations.first(Annotation::Type) {
            let typ = self.resolve_toplevel(spec, slot.typ(), &type_site);
            *slot.typ_mut() = typ;
        }

        let mut caller_allocates = false;
        let annotated = if annotations.has(Annotation::InOut) {
            Some(Direction::InOut)
        } else if let Some(options) = annotations.get(Annotation::Out) {
            caller_allocates = match options.first() {
                None => self.caller_allocates_by_default(slot.typ()),
                Some(option) => option == "caller-allocates",
            };
            Some(Direction::Out)
        } else if annotations.has(Annotation::In) {
            Some(Direction::In)
        } else {
            None
        };
        if let Some(direction) = annotated.filter(|d| *d != slot.direction()) {
            slot.set_direction(direction, caller_allocates);
            let transfer = self.transfer_default(site.is_constructor, &*slot);
            slot.set_transfer(transfer);
        }

        self.apply_transfer_annotation(slot, annotations);

        let origin = slot_origin(&*slot);
        let mut typ = slot.typ().clone();
        let mut scope = LengthScope::Callable { site, callable };
        self.adjust_container_type(&mut scope, &mut typ, slot.direction(), annotations, &origin, &type_site)?;
        *slot.typ_mut() = typ;

        if slot.typ().is_fundamental(ANY) {
            slot.set_nullable(true, slot.not_nullable());
        }
        let annotation_position = annotations.position.as_ref();
        if annotations.has(Annotation::Nullable) {
            if self.is_pointer_type(&*slot) {
                slot.set_nullable(true, false);
            } else {
                self.diagnostics.warn(
                    WarningCode::InvalidAnnotationTarget,
                    "invalid \"nullable\" annotation: only valid for pointer types and out parameters",
                    annotation_position,
                );
            }
        }
        if annotations.has(Annotation::Optional) {
            if !slot.is_return() && slot.direction().is_out() {
                slot.set_optional();
            } else {
                self.diagnostics.warn(
                    WarningCode::InvalidAnnotationTarget,
                    "invalid \"optional\" annotation: only valid for out and inout parameters",
                    annotation_position,
                );
            }
        }
        if annotations.has(Annotation::AllowNone) {
            if !slot.is_return() && slot.direction() == Direction::Out {
                slot.set_optional();
            } else if self.is_pointer_type(&*slot) {
                slot.set_nullable(true, slot.not_nullable());
            } else {
                self.diagnostics.warn(
                    WarningCode::InvalidAnnotationTarget,
                    "invalid \"allow-none\" annotation: only valid for pointer types and out parameters",
                    annotation_position,
                );
            }
        }
        if slot.direction() != Direction::Out
            && matches!(
                slot.typ().target_giname(),
                Some("Gio.AsyncReadyCallback" | "Gio.Cancellable")
            )
        {
            slot.set_nullable(true, slot.not_nullable());
        }
        if annotations.has(Annotation::Not) {
            slot.set_nullable(false, true);
        }

        if let Some(part) = part {
            if let Some(doc) = part.description.filter(|d| !d.is_empty()) {
                let meta = slot.meta_mut();
                meta.doc = Some(doc.to_string());
                meta.doc_position = Some(part.position.clone());
            }
        }
        if annotations.has(Annotation::Skip) {
            slot.meta_mut().skip = true;
        }
        apply_attributes(slot.meta_mut(), annotations);
        Ok(())
    }

    // ====================================================================
    // Containers
    // ====================================================================

    fn adjust_container_type(
        &mut self,
        scope: &mut LengthScope<'_>,
        typ: &mut Type,
        direction: Direction,
        annotations: &Annotations,
        origin: &str,
        site: &TypeSite<'_>,
    ) -> Result<(), ScanError> {
        if annotations.has(Annotation::Array) {
            self.apply_array_annotation(scope, typ, direction, annotations, origin, site)?;
        } else if annotations.has(Annotation::ElementType) {
            self.apply_element_type_annotation(typ, annotations, site);
        }
        if let TypeKind::Array { array_type, element, .. } = &typ.kind {
            self.check_array_element_type(*array_type, element, annotations);
        }
        Ok(())
    }

    fn apply_array_annotation(
        &mut self,
        scope: &mut LengthScope<'_>,
        typ: &mut Type,
        direction: Direction,
        annotations: &Annotations,
        origin: &str,
        site: &TypeSite<'_>,
    ) -> Result<(), ScanError> {
        let element = match annotations.first(Annotation::ElementType) {
            Some(spec) => {
                let original = typ.clone();
                self.resolve_type_spec(spec, Some(&original), site)
            }
            None => match &typ.kind {
                TypeKind::Array { element, .. } => (**element).clone(),
                _ => {
                    // `Foo*` with `(array)` is an array of `Foo`
                    let mut element = typ.clone_plain();
                    if let Some(ctype) = element.ctype.as_mut() {
                        if ctype.ends_with('*') {
                            ctype.pop();
                        }
                    }
                    element
                }
            },
        };
        let array_type = match &typ.kind {
            TypeKind::Array { array_type, .. } => *array_type,
            _ => ArrayType::C,
        };

        let Some(options) = annotations.get(Annotation::Array) else {
            return Ok(());
        };
        let zero_terminated = matches!(options.key("zero-terminated"), Some(value) if value != Some("0"));
        let mut length_param = None;
        if let Some(Some(name)) = options.key("length").filter(|v| v.is_some_and(|n| !n.is_empty())) {
            length_param = Some(scope.resolve(name, origin, direction)?);
        }
        let mut size = None;
        if let Some(Some(fixed)) = options.key("fixed-size") {
            match fixed.trim().parse::<u32>() {
                Ok(value) => size = Some(value),
                // the comment parser already warned
                Err(_) => return Ok(()),
            }
        }

        let mut container = Type::array(array_type, element);
        container.ctype = typ.ctype.clone();
        container.complete_ctype = typ.complete_ctype.clone();
        container.is_const = typ.is_const;
        if let TypeKind::Array {
            zero_terminated: zt,
            size: fixed,
            length_param: length,
            ..
        } = &mut container.kind
        {
            *zt = zero_terminated;
            *fixed = size;
            *length = length_param;
        }
        *typ = container;
        Ok(())
    }

    fn apply_element_type_annotation(&mut self, typ: &mut Type, annotations: &Annotations, site: &TypeSite<'_>) {
        let Some(options) = annotations.get(Annotation::ElementType) else {
            return;
        };
        let position = annotations.position.as_ref();
        let items: Vec<String> = options.items().to_vec();
        let original = typ.clone();
        let expected = match &typ.kind {
            TypeKind::List { .. } => (1, "a list", "one option"),
            TypeKind::Map { .. } => (2, "a hash table", "two options"),
            TypeKind::Array { .. } => (1, "an array", "one option"),
            _ => {
                self.diagnostics.warn(
                    WarningCode::InvalidAnnotationTarget,
                    format!("Unknown container {} for element-type annotation", typ),
                    position,
                );
                return;
            }
        };
        if items.len() != expected.0 {
            self.diagnostics.warn(
                WarningCode::InvalidAnnotationOptions,
                format!(
                    "\"element-type\" annotation for {} must have exactly {}, not {} option(s)",
                    expected.1,
                    expected.2,
                    items.len()
                ),
                position,
            );
            return;
        }
        let mut resolved: Vec<Type> = items
            .iter()
            .map(|spec| self.resolve_type_spec(spec, Some(&original), site))
            .collect();
        match &mut typ.kind {
            TypeKind::List { element, .. } | TypeKind::Array { element, .. } => {
                *element = Box::new(resolved.remove(0));
            }
            TypeKind::Map { key, value } => {
                *value = Box::new(resolved.remove(1));
                *key = Box::new(resolved.remove(0));
            }
            _ => {}
        }
    }

    fn check_array_element_type(&mut self, array_type: ArrayType, element: &Type, annotations: &Annotations) {
        let position = annotations.position.as_ref();
        if array_type == ArrayType::PtrArray
            && element.is_any_fundamental(&BASIC_GIR_TYPES)
            && !element.is_any_fundamental(POINTER_TYPES)
        {
            self.diagnostics.warn(
                WarningCode::InvalidAnnotationOptions,
                "invalid (element-type) for a GPtrArray, must be a pointer",
                position,
            );
        }
        if array_type == ArrayType::ByteArray && !element.is_any_fundamental(&[UINT8, INT8, CHAR]) {
            self.diagnostics.warn(
                WarningCode::InvalidAnnotationOptions,
                "invalid (element-type) for a GByteArray, must be one of guint8, gint8 or gchar",
                position,
            );
        }
    }

    // ====================================================================
    // Pass 11: annotations that need paired functions
    // ====================================================================

    pub(super) fn pass_read_annotations2(&mut self, id: NodeId, chain: &[NodeId]) -> Result<bool, ScanError> {
        let Some(function) = self.model.node(id).function().cloned() else {
            return Ok(true);
        };
        let block = self.block(&function.symbol);
        let Some(block) = block else {
            return Ok(true);
        };
        self.apply_rename_to(id, &block);
        self.check_instance_parameter(id, &block);

        let Some(&parent) = chain.last() else {
            return Ok(true);
        };
        let Some(slot) = block.annotations.first(Annotation::Virtual).map(str::to_string) else {
            return Ok(true);
        };
        let vfuncs = self
            .model
            .node(parent)
            .contents()
            .map(|c| c.virtual_methods.clone())
            .unwrap_or_default();
        let name = self.model.node(id).name.clone();
        match vfuncs.into_iter().find(|v| self.model.node(*v).name == slot) {
            Some(vfunc) => {
                if let NodeKind::VFunction(v) = &mut self.model.node_mut(vfunc).kind {
                    v.invoker = Some(name);
                }
                self.apply_callable(vfunc, Some(&block))?;
            }
            None => self.warn_node(
                id,
                WarningCode::VirtualSlotNotFound,
                format!("Virtual slot '{}' not found for 'virtual' annotation", slot),
            ),
        }
        Ok(true)
    }

    fn apply_rename_to(&mut self, id: NodeId, block: &CommentBlock) {
        let Some(rename_to) = block.annotations.first(Annotation::RenameTo) else {
            return;
        };
        let target = self
            .model
            .main()
            .get_by_symbol(rename_to)
            .filter(|t| self.model.node(*t).function().is_some());
        let Some(target) = target else {
            self.warn_node(
                id,
                WarningCode::InvalidRename,
                format!("Can't find symbol '{}' referenced by \"rename-to\" annotation", rename_to),
            );
            return;
        };
        let Some(target_fn) = self.model.node(target).function().cloned() else {
            return;
        };
        if let Some(shadowed_by) = &target_fn.shadowed_by {
            self.warn_node(
                id,
                WarningCode::InvalidRename,
                format!(
                    "Function '{}' already shadowed by '{}', can't overwrite with '{}'",
                    target_fn.symbol, shadowed_by, rename_to
                ),
            );
            return;
        }
        if let Some(shadows) = &target_fn.shadows {
            self.warn_node(
                id,
                WarningCode::InvalidRename,
                format!(
                    "Function '{}' already shadows '{}', can't multiply shadow with '{}'",
                    target_fn.symbol, shadows, rename_to
                ),
            );
            return;
        }
        let node_name = self.model.node(id).name.clone();
        let target_name = self.model.node(target).name.clone();
        if let Some(f) = self.model.node_mut(target).function_mut() {
            f.shadowed_by = Some(node_name);
        }
        if let Some(f) = self.model.node_mut(id).function_mut() {
            f.shadows = Some(target_name);
        }
    }

    fn check_instance_parameter(&mut self, id: NodeId, block: &CommentBlock) {
        let node = self.model.node(id);
        let Some(function) = node.function() else {
            return;
        };
        if !function.is_method {
            return;
        }
        let Some(instance) = &function.callable.instance_parameter else {
            return;
        };
        let annotations = block
            .param(&instance.argname)
            .map(|p| &p.annotations)
            .unwrap_or(&NO_ANNOTATIONS);
        let symbol = function.symbol.clone();
        let name = node.name.clone();
        if annotations.has(Annotation::Nullable) {
            self.strict_node(
                id,
                WarningCode::InstanceParameterAnnotation,
                format!(
                    "\"nullable\" annotation on instance parameter of {}: did you really intend that?",
                    symbol
                ),
            );
        }
        let transfer = annotations.first(Annotation::Transfer).unwrap_or("none");
        if transfer != "none" && !name.starts_with("free") && !name.starts_with("destroy") {
            self.strict_node(
                id,
                WarningCode::InstanceParameterAnnotation,
                format!(
                    "\"transfer\" annotation of \"{}\" on instance parameter of {}: should not be applied to a method's instance parameter unless this is a free() or destroy() method",
                    transfer, symbol
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::annotation::CommentBlocks;
    use crate::ast::{Model, Property};
    use crate::diagnostic::Diagnostics;

    fn transform(model: &mut Model, comments: &[&str]) -> Diagnostics {
        let mut diagnostics = diagnostics();
        let mut blocks: CommentBlocks = blocks(comments);
        SemanticTransformer::new(model, &mut diagnostics, &mut blocks)
            .transform()
            .unwrap();
        diagnostics
    }

    #[test]
    fn test_function_docs_and_versions() {
        let mut model = model();
        let func = add_function(&mut model, "foo_frob", ctype("int"), vec![param("x", ctype("int"))]);
        transform(
            &mut model,
            &["/**\n * foo_frob:\n * @x: the input\n *\n * Frobs.\n *\n * Returns: the result\n * Since: 1.2\n * Deprecated: 2.0: Use something else\n */"],
        );
        let node = model.node(func);
        assert_eq!(node.meta.doc.as_deref(), Some("Frobs."));
        assert_eq!(node.meta.version.as_deref(), Some("1.2"));
        assert_eq!(node.meta.deprecated.as_deref(), Some("2.0"));
        assert_eq!(node.meta.deprecated_doc.as_deref(), Some("Use something else"));
        let callable = node.callable().unwrap();
        assert_eq!(callable.parameters[0].meta.doc.as_deref(), Some("the input"));
        assert_eq!(callable.retval.meta.doc.as_deref(), Some("the result"));
    }

    #[test]
    fn test_out_transfer_and_nullable() {
        let mut model = model();
        let func = add_function(
            &mut model,
            "foo_get_name",
            ctype("void"),
            vec![param("out_name", ctype("char**"))],
        );
        let diagnostics = transform(
            &mut model,
            &["/**\n * foo_get_name:\n * @out_name: (out) (transfer none) (nullable): the name\n */"],
        );
        assert!(!diagnostics.has_code(WarningCode::InvalidAnnotationTarget));
        let param = &model.node(func).callable().unwrap().parameters[0];
        assert_eq!(param.direction, Direction::Out);
        assert_eq!(param.transfer, Some(Transfer::None));
        assert!(param.nullable);
    }

    #[test]
    fn test_array_length_parameter() {
        let mut model = model();
        let func = add_function(
            &mut model,
            "foo_sum",
            ctype("int"),
            vec![
                param("a", ctype("int")),
                param("b", ctype("int")),
                param("values", ptr("int")),
                param("n_values", ctype("int")),
            ],
        );
        transform(
            &mut model,
            &["/**\n * foo_sum:\n * @a: a\n * @b: b\n * @values: (array length=n_values): values\n * @n_values: count\n */"],
        );
        let callable = model.node(func).callable().unwrap();
        let TypeKind::Array { length_param, element, zero_terminated, .. } = &callable.parameters[2].typ().kind else {
            panic!("expected an array");
        };
        assert_eq!(length_param.as_deref(), Some("n_values"));
        assert!(!zero_terminated);
        assert!(element.is_fundamental(crate::ast::types::INT));
    }

    #[test]
    fn test_array_length_by_index() {
        let mut model = model();
        let func = add_function(
            &mut model,
            "foo_fill",
            ctype("void"),
            vec![
                param("values", ptr("int")),
                param("mode", ctype("int")),
                param("count", ctype("int")),
                param("flags", ctype("int")),
            ],
        );
        transform(&mut model, &["/**\n * foo_fill:\n * @values: (array length=2): values\n */"]);
        let callable = model.node(func).callable().unwrap();
        let TypeKind::Array { length_param, .. } = &callable.parameters[0].typ().kind else {
            panic!("expected an array");
        };
        assert_eq!(length_param.as_deref(), Some("count"));
    }

    #[test]
    fn test_unknown_length_parameter_is_fatal() {
        let mut model = model();
        add_function(&mut model, "foo_fill", ctype("void"), vec![param("values", ptr("int"))]);
        let mut diagnostics = diagnostics();
        let mut blocks = blocks(&["/**\n * foo_fill:\n * @values: (array length=count): values\n */"]);
        let err = SemanticTransformer::new(&mut model, &mut diagnostics, &mut blocks)
            .transform()
            .unwrap_err();
        assert!(matches!(
            err,
            ScanError::UnknownParameterReference { ref param, .. } if param == "count"
        ));
    }

    fn watch_with_comment(comment: &str) -> Result<(), ScanError> {
        use crate::ast::{Callable, Callback, Node, Parameter, Return};
        let mut model = model();
        let ns = model.main_id();
        let func = model.alloc(Node::new(
            "Func",
            NodeKind::Callback(Callback {
                callable: Callable::new(
                    Return::new(ctype("void")),
                    vec![Parameter::new("data", Some(ctype("gpointer")))],
                    false,
                ),
                ctype: Some("FooFunc".to_string()),
            }),
        ));
        model.append(ns, func, false).unwrap();
        add_function(
            &mut model,
            "foo_watch",
            ctype("void"),
            vec![param("func", ctype("FooFunc")), param("user_data", ctype("gpointer"))],
        );
        let mut diagnostics = diagnostics();
        let mut blocks = blocks(&[comment]);
        SemanticTransformer::new(&mut model, &mut diagnostics, &mut blocks).transform()
    }

    #[test]
    fn test_unknown_closure_parameter_is_fatal() {
        let err = watch_with_comment("/**\n * foo_watch:\n * @func: (closure nosuch): callback\n */").unwrap_err();
        assert!(matches!(
            err,
            ScanError::UnknownParameterReference { ref param, ref origin, .. }
                if param == "nosuch" && origin == "parameter func"
        ));
    }

    #[test]
    fn test_unknown_destroy_parameter_is_fatal() {
        let err = watch_with_comment("/**\n * foo_watch:\n * @func: (destroy nosuch): callback\n */").unwrap_err();
        assert!(matches!(
            err,
            ScanError::UnknownParameterReference { ref param, .. } if param == "nosuch"
        ));
    }

    #[test]
    fn test_known_closure_parameter_links() {
        assert!(watch_with_comment("/**\n * foo_watch:\n * @func: (closure user_data): callback\n */").is_ok());
    }

    #[test]
    fn test_unknown_doc_parameter_hint() {
        let mut model = model();
        add_function(&mut model, "foo_frob", ctype("void"), vec![param("widget", ptr("int"))]);
        let diagnostics = transform(&mut model, &["/**\n * foo_frob:\n * @wigdet: typo\n */"]);
        let warning = diagnostics
            .entries()
            .iter()
            .find(|d| d.code == Some(WarningCode::UnknownDocParameter))
            .expect("unknown parameter warning");
        assert!(warning.message.contains("should be 'widget'"), "{}", warning.message);
    }

    #[test]
    fn test_nullable_on_int_warns() {
        let mut model = model();
        add_function(&mut model, "foo_frob", ctype("void"), vec![param("count", ctype("int"))]);
        let diagnostics = transform(&mut model, &["/**\n * foo_frob:\n * @count: (nullable): count\n */"]);
        assert!(diagnostics.has_code(WarningCode::InvalidAnnotationTarget));
    }

    #[test]
    fn test_property_annotations() {
        let mut model = model_with_gobject();
        let widget = add_widget(&mut model);
        let prop = model.alloc(crate::ast::Node::new(
            "label",
            NodeKind::Property(Property {
                typ: ctype("gchar*"),
                readable: true,
                writable: true,
                construct: false,
                construct_only: false,
                transfer: Transfer::None,
                setter: None,
                getter: None,
                default_value: None,
            }),
        ));
        model.node_mut(widget).contents_mut().unwrap().properties.push(prop);
        model.adopt(widget, prop);
        transform(
            &mut model,
            &["/**\n * FooWidget:label: (setter set_text) (default-value \"x\")\n *\n * The label.\n */"],
        );
        let node = model.node(prop);
        assert_eq!(node.meta.doc.as_deref(), Some("The label."));
        let NodeKind::Property(p) = &node.kind else {
            panic!("expected property");
        };
        assert_eq!(p.setter.as_deref(), Some("set_text"));
        assert_eq!(p.default_value.as_deref(), Some("\"x\""));
    }

    #[test]
    fn test_rename_to_links_functions() {
        let mut model = model();
        let full = add_function(&mut model, "foo_open_full", ctype("void"), Vec::new());
        let plain = add_function(&mut model, "foo_open", ctype("void"), Vec::new());
        transform(&mut model, &["/**\n * foo_open_full: (rename-to foo_open)\n */"]);
        assert_eq!(model.node(full).function().unwrap().shadows.as_deref(), Some("open"));
        assert_eq!(model.node(plain).function().unwrap().shadowed_by.as_deref(), Some("open_full"));
    }

    #[test]
    fn test_rename_to_missing_target_warns() {
        let mut model = model();
        add_function(&mut model, "foo_open_full", ctype("void"), Vec::new());
        let diagnostics = transform(&mut model, &["/**\n * foo_open_full: (rename-to foo_nope)\n */"]);
        assert!(diagnostics.has_code(WarningCode::InvalidRename));
    }
}
