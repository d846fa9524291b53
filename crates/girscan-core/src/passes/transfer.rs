//! Ownership transfer defaults

use super::SemanticTransformer;
use crate::ast::types::{ANY, BASIC_GIR_TYPES, NONE, STRING};
use crate::ast::{Direction, Metadata, NodeId, NodeKind, Parameter, Return, Transfer, Type};
use crate::error::ScanError;

/// A parameter or return value that annotations apply to
pub(crate) trait TypedSlot {
    /// Parameter name, `None` for return values
    fn argname(&self) -> Option<&str>;
    fn typ(&self) -> &Type;
    fn typ_mut(&mut self) -> &mut Type;
    fn direction(&self) -> Direction;
    fn set_direction(&mut self, direction: Direction, caller_allocates: bool);
    fn caller_allocates(&self) -> bool;
    fn is_return(&self) -> bool;
    fn transfer(&self) -> Option<Transfer>;
    fn set_transfer(&mut self, transfer: Option<Transfer>);
    fn set_nullable(&mut self, nullable: bool, not_nullable: bool);
    fn not_nullable(&self) -> bool;
    fn set_optional(&mut self);
    fn meta_mut(&mut self) -> &mut Metadata;
}

impl TypedSlot for Parameter {
    fn argname(&self) -> Option<&str> {
        Some(&self.argname)
    }

    fn typ(&self) -> &Type {
        Parameter::typ(self)
    }

    fn typ_mut(&mut self) -> &mut Type {
        self.typ.get_or_insert_with(Type::varargs)
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn set_direction(&mut self, direction: Direction, caller_allocates: bool) {
        self.direction = direction;
        self.caller_allocates = caller_allocates;
    }

    fn caller_allocates(&self) -> bool {
        self.caller_allocates
    }

    fn is_return(&self) -> bool {
        false
    }

    fn transfer(&self) -> Option<Transfer> {
        self.transfer
    }

    fn set_transfer(&mut self, transfer: Option<Transfer>) {
        self.transfer = transfer;
    }

    fn set_nullable(&mut self, nullable: bool, not_nullable: bool) {
        self.nullable = nullable;
        self.not_nullable = not_nullable;
    }

    fn not_nullable(&self) -> bool {
        self.not_nullable
    }

    fn set_optional(&mut self) {
        self.optional = true;
    }

    fn meta_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }
}

impl TypedSlot for Return {
    fn argname(&self) -> Option<&str> {
        None
    }

    fn typ(&self) -> &Type {
        &self.typ
    }

    fn typ_mut(&mut self) -> &mut Type {
        &mut self.typ
    }

    fn direction(&self) -> Direction {
        Direction::Out
    }

    fn set_direction(&mut self, _direction: Direction, _caller_allocates: bool) {}

    fn caller_allocates(&self) -> bool {
        false
    }

    fn is_return(&self) -> bool {
        true
    }

    fn transfer(&self) -> Option<Transfer> {
        self.transfer
    }

    fn set_transfer(&mut self, transfer: Option<Transfer>) {
        self.transfer = transfer;
    }

    fn set_nullable(&mut self, nullable: bool, not_nullable: bool) {
        self.nullable = nullable;
        self.not_nullable = not_nullable;
    }

    fn not_nullable(&self) -> bool {
        self.not_nullable
    }

    fn set_optional(&mut self) {}

    fn meta_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }
}

fn basic_return_transfer(typ: &Type) -> Option<Transfer> {
    if typ.is_any_fundamental(&BASIC_GIR_TYPES) || typ.is_const || typ.is_any_fundamental(&[ANY, NONE]) {
        Some(Transfer::None)
    } else if typ.is_fundamental(STRING) {
        Some(Transfer::Full)
    } else {
        None
    }
}

impl SemanticTransformer<'_> {
    /// Transfer a slot gets when nothing was annotated
    pub(super) fn transfer_default(&mut self, is_constructor: bool, slot: &dyn TypedSlot) -> Option<Transfer> {
        let typ = slot.typ();
        if typ.is_fundamental(NONE) || typ.is_varargs() {
            return Some(Transfer::None);
        }
        if !slot.is_return() {
            return Some(if slot.direction().is_out() && !slot.caller_allocates() {
                Transfer::Full
            } else {
                Transfer::None
            });
        }
        self.return_transfer_default(is_constructor, typ)
    }

    fn return_transfer_default(&mut self, is_constructor: bool, typ: &Type) -> Option<Transfer> {
        if let Some(transfer) = basic_return_transfer(typ) {
            return Some(transfer);
        }
        let target = self.model.lookup_typenode(typ)?;
        let node = self.model.node(target);
        match &node.kind {
            NodeKind::Alias(alias) => basic_return_transfer(&alias.target),
            NodeKind::Boxed(_) | NodeKind::Pointer(_) => Some(Transfer::Full),
            NodeKind::Record(c) | NodeKind::Union(c)
                if c.registration.gtype_name.is_some() || c.foreign || node.foreign =>
            {
                Some(Transfer::Full)
            }
            NodeKind::Enum(_) | NodeKind::Bitfield(_) => Some(Transfer::None),
            NodeKind::Class(_) if is_constructor => {
                let Some(gobject) = self.model.lookup_giname("GObject.Object") else {
                    self.diagnostics
                        .error("constructor found but GObject is not in includes", None);
                    return None;
                };
                let unowned = self.model.lookup_giname("GObject.InitiallyUnowned");
                if unowned.is_some_and(|u| self.is_subclass(target, u, gobject)) {
                    Some(Transfer::None)
                } else {
                    Some(Transfer::Full)
                }
            }
            NodeKind::Record(_) | NodeKind::Union(_) if is_constructor => Some(Transfer::Full),
            _ => None,
        }
    }

    /// Walk the parent chain of `class` up to `root`
    pub(super) fn is_subclass(&self, class: NodeId, ancestor: NodeId, root: NodeId) -> bool {
        let mut current = class;
        // guards against parent cycles in broken input
        for _ in 0..64 {
            if current == ancestor {
                return true;
            }
            if current == root {
                return false;
            }
            let parent = self
                .model
                .node(current)
                .class()
                .and_then(|c| c.parent_type.as_ref())
                .and_then(|t| self.model.lookup_typenode(t));
            match parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    /// Fill in missing transfers on every signature
    pub(super) fn pass_callable_defaults(&mut self, id: NodeId, _chain: &[NodeId]) -> Result<bool, ScanError> {
        let Some(mut callable) = self.callable_of(id) else {
            return Ok(true);
        };
        let is_constructor = self.model.node(id).function().is_some_and(|f| f.is_constructor);
        for param in callable.parameters.iter_mut() {
            if param.transfer.is_none() {
                param.transfer = self.transfer_default(is_constructor, &*param);
            }
        }
        if callable.retval.transfer.is_none() {
            callable.retval.transfer = self.transfer_default(is_constructor, &callable.retval);
        }
        self.store_callable(id, callable);
        Ok(true)
    }

    /// Settle returns still undecided once constructors are paired: a resolved
    /// object, callback or plain struct handed out by a non-constructor is
    /// borrowed from the callee
    pub(super) fn pass_settle_transfers(&mut self, id: NodeId, _chain: &[NodeId]) -> Result<bool, ScanError> {
        let Some(mut callable) = self.callable_of(id) else {
            return Ok(true);
        };
        if callable.retval.transfer.is_some() || self.model.lookup_typenode(&callable.retval.typ).is_none() {
            return Ok(true);
        }
        callable.retval.transfer = Some(Transfer::None);
        self.store_callable(id, callable);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::annotation::CommentBlocks;
    use crate::ast::types::{INT, STRING};

    fn transformer_defaults(model: &mut crate::ast::Model) {
        let mut diagnostics = diagnostics();
        let mut blocks = CommentBlocks::new();
        SemanticTransformer::new(model, &mut diagnostics, &mut blocks)
            .transform()
            .unwrap();
    }

    #[test]
    fn test_string_return_is_full_const_string_is_none() {
        let mut model = model();
        let dup = add_function(&mut model, "foo_dup_name", ptr("char"), Vec::new());
        let mut const_string = ptr("char");
        const_string.is_const = true;
        let peek = add_function(&mut model, "foo_peek_name", const_string, Vec::new());
        transformer_defaults(&mut model);

        let dup = model.node(dup).callable().unwrap();
        assert!(dup.retval.typ.is_fundamental(STRING));
        assert_eq!(dup.retval.transfer, Some(Transfer::Full));
        let peek = model.node(peek).callable().unwrap();
        assert_eq!(peek.retval.transfer, Some(Transfer::None));
    }

    #[test]
    fn test_out_params_default_to_full() {
        let mut model = model();
        let mut out = param("result", ptr("int"));
        out.direction = Direction::Out;
        let func = add_function(
            &mut model,
            "foo_compute",
            ctype("int"),
            vec![param("input", ctype("int")), out],
        );
        transformer_defaults(&mut model);

        let callable = model.node(func).callable().unwrap();
        assert!(callable.retval.typ.is_fundamental(INT));
        assert_eq!(callable.retval.transfer, Some(Transfer::None));
        assert_eq!(callable.parameters[0].transfer, Some(Transfer::None));
        assert_eq!(callable.parameters[1].transfer, Some(Transfer::Full));
    }

    #[test]
    fn test_boxed_return_is_full() {
        let mut model = model();
        add_rect(&mut model);
        let func = add_function(&mut model, "foo_get_default_rect", ptr("FooRect"), Vec::new());
        transformer_defaults(&mut model);
        let callable = model.node(func).callable().unwrap();
        assert_eq!(callable.retval.typ.target_giname(), Some("Foo.Rect"));
        assert_eq!(callable.retval.transfer, Some(Transfer::Full));
    }

    #[test]
    fn test_object_return_defaults_to_none() {
        let mut model = model_with_gobject();
        add_widget(&mut model);
        let lookup = add_function(&mut model, "foo_lookup_widget", ptr("FooWidget"), Vec::new());
        let ns = model.main_id();
        let point = crate::ast::Compound::new(Some("FooPoint".into()));
        let point = model.alloc(crate::ast::Node::new("Point", NodeKind::Record(point)));
        model.append(ns, point, false).unwrap();
        let peek = add_function(&mut model, "foo_peek_point", ptr("FooPoint"), Vec::new());
        transformer_defaults(&mut model);

        let lookup = model.node(lookup).callable().unwrap();
        assert_eq!(lookup.retval.typ.target_giname(), Some("Foo.Widget"));
        assert_eq!(lookup.retval.transfer, Some(Transfer::None));
        let peek = model.node(peek).callable().unwrap();
        assert_eq!(peek.retval.transfer, Some(Transfer::None));
    }

    #[test]
    fn test_unresolved_return_stays_undecided() {
        let mut model = model();
        let func = add_function(&mut model, "foo_get_mystery", ptr("FooMystery"), Vec::new());
        transformer_defaults(&mut model);
        assert_eq!(model.node(func).callable().unwrap().retval.transfer, None);
    }

    #[test]
    fn test_initially_unowned_subclass() {
        let mut model = model_with_gobject();
        let widget = add_widget(&mut model);
        let mut diagnostics = diagnostics();
        let mut blocks = CommentBlocks::new();
        let mut transformer = SemanticTransformer::new(&mut model, &mut diagnostics, &mut blocks);
        transformer.transform().unwrap();
        let gobject = transformer.model.lookup_giname("GObject.Object").unwrap();
        let unowned = transformer.model.lookup_giname("GObject.InitiallyUnowned").unwrap();
        assert!(transformer.is_subclass(widget, unowned, gobject));
        assert!(!transformer.is_subclass(unowned, widget, gobject));
    }
}
