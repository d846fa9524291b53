//! Virtual methods from class and interface structures

use super::SemanticTransformer;
use crate::ast::{Callable, NodeId, NodeKind, VFunction};
use crate::error::ScanError;
use tracing::trace;

impl SemanticTransformer<'_> {
    /// Turn class struct slots whose first parameter is the instance into
    /// virtual methods, and find the method that invokes each one
    pub(super) fn pair_virtuals(&mut self) -> Result<(), ScanError> {
        let types: Vec<NodeId> = self
            .model
            .main()
            .nodes()
            .filter(|id| matches!(self.model.node(*id).kind, NodeKind::Class(_) | NodeKind::Interface(_)))
            .collect();
        for id in types {
            self.collect_virtuals(id)?;
            self.match_invokers(id)?;
        }
        Ok(())
    }

    fn glib_type_struct(&self, id: NodeId) -> Option<NodeId> {
        let typ = match &self.model.node(id).kind {
            NodeKind::Class(class) => class.glib_type_struct.as_ref(),
            NodeKind::Interface(iface) => iface.glib_type_struct.as_ref(),
            _ => None,
        }?;
        self.model.lookup_typenode(typ)
    }

    fn collect_virtuals(&mut self, id: NodeId) -> Result<(), ScanError> {
        let Some(class_struct) = self.glib_type_struct(id) else {
            return Ok(());
        };
        let giname = self.model.giname(id);
        let fields = self
            .model
            .node(class_struct)
            .contents()
            .map(|c| c.fields.clone())
            .unwrap_or_default();

        // class structures are read-only
        for &field in &fields {
            if let NodeKind::Field(f) = &mut self.model.node_mut(field).kind {
                f.writable = false;
            }
        }

        let prefix = self.annotation_name(class_struct);
        for field in fields {
            let NodeKind::Field(payload) = &self.model.node(field).kind else {
                continue;
            };
            let callback = match payload.anonymous_node {
                Some(anonymous) => Some(anonymous),
                None => payload.typ.as_ref().and_then(|t| self.model.lookup_typenode(t)),
            };
            let Some(callback) = callback else {
                continue;
            };
            let NodeKind::Callback(cb) = &self.model.node(callback).kind else {
                continue;
            };
            let takes_instance = cb
                .callable
                .parameters
                .first()
                .is_some_and(|p| p.typ().target_giname() == Some(giname.as_str()));
            if !takes_instance {
                continue;
            }

            let mut callable: Callable = cb.callable.clone();
            callable.instance_parameter = Some(callable.parameters.remove(0));
            let field_node = self.model.node(field);
            let name = field_node.name.clone();
            let field_doc = (field_node.meta.doc.clone(), field_node.meta.doc_position.clone());
            let positions = self.model.node(callback).file_positions.clone();

            let mut vfunc = crate::ast::Node::new(
                name.clone(),
                NodeKind::VFunction(VFunction {
                    callable,
                    invoker: None,
                }),
            );
            vfunc.file_positions = positions;
            let vfunc = self.model.alloc(vfunc);
            if let Some(contents) = self.model.node_mut(id).contents_mut() {
                contents.virtual_methods.push(vfunc);
            }
            self.model.adopt(id, vfunc);

            // a full block wins over the field description
            let block = self.block(&format!("{}::{}", prefix, name));
            if block.is_none() {
                let node = self.model.node_mut(vfunc);
                node.meta.doc = field_doc.0;
                node.meta.doc_position = field_doc.1;
            }
            self.apply_callable(vfunc, block.as_ref())?;
            trace!(vfunc = %name, owner = %giname, "virtual method");
        }
        Ok(())
    }

    /// A method with the same name and signature invokes the virtual method
    fn match_invokers(&mut self, id: NodeId) -> Result<(), ScanError> {
        let Some(contents) = self.model.node(id).contents().cloned() else {
            return Ok(());
        };
        for vfunc in contents.virtual_methods {
            let Some(vcall) = self.callable_of(vfunc) else {
                continue;
            };
            let vname = self.model.node(vfunc).name.clone();
            let invoker = contents.methods.iter().copied().find(|m| {
                let node = self.model.node(*m);
                let Some(mcall) = node.callable() else {
                    return false;
                };
                node.name == vname
                    && mcall.retval.typ.is_equiv(&vcall.retval.typ)
                    && mcall.parameters.len() == vcall.parameters.len()
                    && mcall
                        .parameters
                        .iter()
                        .zip(&vcall.parameters)
                        .all(|(a, b)| a.typ().is_equiv(b.typ()))
            });
            let Some(invoker) = invoker else {
                continue;
            };
            let invoker_name = self.model.node(invoker).name.clone();
            if let NodeKind::VFunction(v) = &mut self.model.node_mut(vfunc).kind {
                v.invoker = Some(invoker_name);
            }
            let symbol = self.model.node(invoker).symbol().unwrap_or_default().to_string();
            let block = self.block(&symbol);
            self.apply_callable(vfunc, block.as_ref())?;
        }
        Ok(())
    }
}
