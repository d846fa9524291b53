//! Semantic passes over the scanned namespace
//!
//! The passes run in a fixed order; later passes rely on what earlier ones
//! resolved or paired:
//!
//! 1. hidden reserved callback fields
//! 2. type resolution
//! 3. early record annotations
//! 4. default ownership transfer
//! 5. main annotations, then standalone `SECTION:` docs
//! 6. type resolution
//! 7. constructor, method and static method pairing
//! 8. virtual methods from class structs
//! 9. property accessors
//! 10. numeric enum member names
//! 11. post-pairing annotations (`rename-to`, instance parameters, `virtual`)
//! 12. type resolution
//! 13. callback, `throws` and async heuristics
//! 14. error quarks to enums
//!
//! Every pairing step looks at the whole namespace before changing it, so
//! the result does not depend on declaration order.

mod annotations;
mod callables;
mod pairing;
mod quarks;
mod transfer;
mod typespec;
mod virtuals;

pub(crate) use transfer::TypedSlot;

use crate::annotation::{CommentBlock, CommentBlocks};
use crate::ast::{Callable, Model, Node, NodeId, NodeKind};
use crate::diagnostic::{Diagnostics, WarningCode};
use crate::error::ScanError;
use std::collections::BTreeMap;
use tracing::debug;

type VisitFn<'a> =
    fn(&mut SemanticTransformer<'a>, NodeId, &[NodeId]) -> Result<bool, ScanError>;

/// Runs the ordered semantic passes on the main namespace
pub struct SemanticTransformer<'a> {
    model: &'a mut Model,
    diagnostics: &'a mut Diagnostics,
    blocks: &'a mut CommentBlocks,
    /// `bar_baz` -> `BarBaz`, for symbol pairing
    uscore_type_names: BTreeMap<String, NodeId>,
}

impl<'a> SemanticTransformer<'a> {
    /// Create a transformer; `blocks` loses the `SECTION:` blocks it attaches
    pub fn new(
        model: &'a mut Model,
        diagnostics: &'a mut Diagnostics,
        blocks: &'a mut CommentBlocks,
    ) -> Self {
        SemanticTransformer {
            model,
            diagnostics,
            blocks,
            uscore_type_names: BTreeMap::new(),
        }
    }

    /// Run every pass in order
    pub fn transform(&mut self) -> Result<(), ScanError> {
        if self.model.main().is_empty() {
            return Err(ScanError::EmptyNamespace);
        }

        self.run("hidden fields", Self::pass_fixup_hidden_fields)?;
        self.run("type resolution", Self::pass_type_resolution)?;
        self.run("early annotations", Self::pass_read_annotations_early)?;
        self.run("transfer defaults", Self::pass_callable_defaults)?;
        self.run("annotations", Self::pass_read_annotations)?;
        self.add_standalone_doc_sections()?;
        self.run("type resolution", Self::pass_type_resolution)?;

        self.build_uscore_type_names();
        self.pair_functions();
        self.pair_virtuals()?;
        self.pair_property_accessors();
        self.check_member_names();
        debug!(types = self.uscore_type_names.len(), "paired symbols");

        self.run("post-pairing annotations", Self::pass_read_annotations2)?;
        self.run("type resolution", Self::pass_type_resolution)?;
        self.run("callable heuristics", Self::pass_callables)?;
        self.run("settled transfers", Self::pass_settle_transfers)?;
        self.pair_async_functions();
        self.pair_quarks_with_enums();
        Ok(())
    }

    fn run(&mut self, name: &'static str, pass: VisitFn<'a>) -> Result<(), ScanError> {
        debug!(pass = name, "running pass");
        let roots: Vec<NodeId> = self.model.main().nodes().collect();
        let mut chain = Vec::new();
        for root in roots {
            self.visit(root, &mut chain, pass)?;
        }
        Ok(())
    }

    fn visit(
        &mut self,
        id: NodeId,
        chain: &mut Vec<NodeId>,
        pass: VisitFn<'a>,
    ) -> Result<(), ScanError> {
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

    // ====================================================================
    // Shared helpers
    // ====================================================================

    fn block(&self, name: &str) -> Option<CommentBlock> {
        self.blocks.get(name).cloned()
    }

    /// Identifier documenting a type: its C type, runtime name or `NsName`
    fn annotation_name(&self, id: NodeId) -> String {
        let node = self.model.node(id);
        node.ctype()
            .or_else(|| node.gtype_name())
            .map(str::to_string)
            .unwrap_or_else(|| self.model.c_name(id))
    }

    fn warn_node(&mut self, id: NodeId, code: WarningCode, message: impl Into<String>) {
        let position = self.model.node(id).main_position().cloned();
        self.diagnostics.warn(code, message, position.as_ref());
    }

    fn strict_node(&mut self, id: NodeId, code: WarningCode, message: impl Into<String>) {
        let position = self.model.node(id).main_position().cloned();
        self.diagnostics.strict(code, message, position.as_ref());
    }

    fn callable_of(&self, id: NodeId) -> Option<Callable> {
        self.model.node(id).callable().cloned()
    }

    fn store_callable(&mut self, id: NodeId, callable: Callable) {
        if let Some(slot) = self.model.node_mut(id).callable_mut() {
            *slot = callable;
        }
    }

    /// Resolved node behind a type, aliases followed
    fn resolved_target(&self, typ: &crate::ast::Type) -> Option<NodeId> {
        self.model
            .lookup_typenode(typ)
            .and_then(|id| self.model.resolve_aliases(id).ok())
    }

    // ====================================================================
    // Passes 1, 2 and 6
    // ====================================================================

    /// Reserved padding callbacks such as `void (*_gtk_reserved1)(void)`
    fn pass_fixup_hidden_fields(&mut self, id: NodeId, _chain: &[NodeId]) -> Result<bool, ScanError> {
        let node = self.model.node(id);
        if !matches!(
            node.kind,
            NodeKind::Class(_) | NodeKind::Interface(_) | NodeKind::Record(_) | NodeKind::Union(_)
        ) {
            return Ok(true);
        }
        let fields = node.contents().map(|c| c.fields.clone()).unwrap_or_default();
        for field in fields {
            let hidden = {
                let field_node = self.model.node(field);
                let anonymous = match &field_node.kind {
                    NodeKind::Field(f) => f.anonymous_node,
                    _ => None,
                };
                field_node.name.starts_with('_')
                    && anonymous.is_some_and(|a| matches!(self.model.node(a).kind, NodeKind::Callback(_)))
            };
            if hidden {
                self.model.node_mut(field).meta.introspectable = false;
            }
        }
        Ok(true)
    }

    fn pass_type_resolution(&mut self, id: NodeId, _chain: &[NodeId]) -> Result<bool, ScanError> {
        let mut kind = self.model.node(id).kind.clone();
        let model = &*self.model;
        match &mut kind {
            NodeKind::Alias(alias) => {
                model.resolve_type(&mut alias.target);
            }
            NodeKind::Function(_) | NodeKind::Callback(_) | NodeKind::VFunction(_) | NodeKind::Signal(_) => {}
            NodeKind::Constant(constant) => {
                model.resolve_type(&mut constant.value_type);
            }
            NodeKind::Class(class) => {
                let mut parent_type = None;
                for parent in class.parent_chain.iter_mut() {
                    model.resolve_type(parent);
                    if model.lookup_typenode(parent).is_some() {
                        parent_type = Some(parent.clone());
                        break;
                    }
                }
                if parent_type.is_some() {
                    class.parent_type = parent_type;
                }
                class.interfaces.retain_mut(|t| model.resolve_type(t));
            }
            NodeKind::Interface(iface) => {
                iface.prerequisites.retain_mut(|t| model.resolve_type(t));
            }
            _ => {}
        }
        let mut node_kind = kind;
        if let Some(callable) = callable_in(&mut node_kind) {
            for param in callable.parameters.iter_mut() {
                if let Some(typ) = param.typ.as_mut() {
                    model.resolve_type(typ);
                }
            }
            model.resolve_type(&mut callable.retval.typ);
        }

        let (fields, properties) = match node_kind.clone() {
            NodeKind::Class(c) => (c.contents.fields, c.contents.properties),
            NodeKind::Interface(i) => (i.contents.fields, i.contents.properties),
            NodeKind::Record(c) | NodeKind::Union(c) => (c.contents.fields, Vec::new()),
            _ => (Vec::new(), Vec::new()),
        };
        self.model.node_mut(id).kind = node_kind;

        for field in fields {
            let mut resolved = match &self.model.node(field).kind {
                NodeKind::Field(f) if f.anonymous_node.is_none() => f.typ.clone(),
                _ => None,
            };
            if let Some(typ) = resolved.as_mut() {
                self.model.resolve_type(typ);
                if let NodeKind::Field(f) = &mut self.model.node_mut(field).kind {
                    f.typ = resolved;
                }
            }
        }
        for prop in properties {
            let NodeKind::Property(p) = &self.model.node(prop).kind else {
                continue;
            };
            let mut typ = p.typ.clone();
            self.model.resolve_type(&mut typ);
            if let NodeKind::Property(p) = &mut self.model.node_mut(prop).kind {
                p.typ = typ;
            }
        }
        Ok(true)
    }

    /// Leftover `SECTION:` blocks become standalone doc nodes
    fn add_standalone_doc_sections(&mut self) -> Result<(), ScanError> {
        let sections: Vec<(String, String, crate::position::SourcePosition)> = self
            .blocks
            .iter()
            .filter_map(|(name, block)| {
                let short = name.strip_prefix("SECTION:")?;
                let doc = block.description.as_deref().filter(|d| !d.is_empty())?;
                Some((short.to_string(), doc.to_string(), block.position.clone()))
            })
            .collect();
        let ns = self.model.main_id();
        for (name, doc, position) in sections {
            let mut node = Node::new(name, NodeKind::DocSection);
            node.meta.doc = Some(doc);
            node.meta.doc_position = Some(position);
            let id = self.model.alloc(node);
            self.model.append(ns, id, false)?;
        }
        Ok(())
    }
}

/// Signature inside a callable node kind
fn callable_in(kind: &mut NodeKind) -> Option<&mut Callable> {
    match kind {
        NodeKind::Function(f) => Some(&mut f.callable),
        NodeKind::Callback(c) => Some(&mut c.callable),
        NodeKind::VFunction(v) => Some(&mut v.callable),
        NodeKind::Signal(s) => Some(&mut s.callable),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::ast::{Alias, Compound, Field, Type};
    use crate::annotation::CommentBlocks;

    #[test]
    fn test_empty_namespace_is_fatal() {
        let mut model = model();
        let mut diagnostics = diagnostics();
        let mut blocks = CommentBlocks::new();
        let err = SemanticTransformer::new(&mut model, &mut diagnostics, &mut blocks)
            .transform()
            .unwrap_err();
        assert!(matches!(err, ScanError::EmptyNamespace));
    }

    #[test]
    fn test_type_resolution_sets_parent_type() {
        let mut model = model_with_gobject();
        let widget = add_widget(&mut model);
        let ns = model.main_id();
        let alias = model.alloc(Node::new(
            "Handle",
            NodeKind::Alias(Alias {
                target: ctype("FooWidget*"),
                ctype: Some("FooHandle".into()),
            }),
        ));
        model.append(ns, alias, false).unwrap();

        let mut diagnostics = diagnostics();
        let mut blocks = CommentBlocks::new();
        SemanticTransformer::new(&mut model, &mut diagnostics, &mut blocks)
            .transform()
            .unwrap();

        let class = model.node(widget).class().unwrap();
        assert_eq!(
            class.parent_type.as_ref().and_then(|t| t.target_giname()),
            Some("GObject.InitiallyUnowned")
        );
        let NodeKind::Alias(alias) = &model.node(alias).kind else {
            panic!("expected alias");
        };
        assert_eq!(alias.target.target_giname(), Some("Foo.Widget"));
    }

    #[test]
    fn test_reserved_callback_fields_are_hidden() {
        let mut model = model();
        let ns = model.main_id();
        let callback = model.alloc(Node::new(
            "_foo_reserved1",
            NodeKind::Callback(crate::ast::Callback {
                callable: Callable::new(crate::ast::Return::new(Type::none()), Vec::new(), false),
                ctype: None,
            }),
        ));
        let field = model.alloc(Node::new(
            "_foo_reserved1",
            NodeKind::Field(Field {
                typ: None,
                readable: true,
                writable: true,
                bits: None,
                private: false,
                anonymous_node: Some(callback),
            }),
        ));
        let mut compound = Compound::new(Some("FooThingClass".into()));
        compound.contents.fields.push(field);
        let record = model.alloc(Node::new("ThingClass", NodeKind::Record(compound)));
        model.adopt(record, field);
        model.append(ns, record, false).unwrap();

        let mut diagnostics = diagnostics();
        let mut blocks = CommentBlocks::new();
        SemanticTransformer::new(&mut model, &mut diagnostics, &mut blocks)
            .transform()
            .unwrap();
        assert!(!model.node(field).meta.introspectable);
    }

    #[test]
    fn test_unused_sections_become_doc_nodes() {
        let mut model = model();
        add_rect(&mut model);
        let mut diagnostics = diagnostics();
        let mut blocks = blocks(&[
            "/**\n * SECTION:foorect\n * @short_description: rectangles\n *\n * Rectangles.\n */",
            "/**\n * SECTION:utilities\n *\n * Assorted helpers.\n */",
        ]);
        SemanticTransformer::new(&mut model, &mut diagnostics, &mut blocks)
            .transform()
            .unwrap();

        let section = model.main().get("utilities").expect("standalone section");
        assert!(matches!(model.node(section).kind, NodeKind::DocSection));
        assert_eq!(model.node(section).meta.doc.as_deref(), Some("Assorted helpers."));
        // consumed by the record it documents
        assert!(model.main().get("foorect").is_none());
        let rect = model.main().get("Rect").unwrap();
        assert_eq!(model.node(rect).meta.doc.as_deref(), Some("Rectangles."));
    }
}
