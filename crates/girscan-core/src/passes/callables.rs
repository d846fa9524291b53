//! Signature conventions: callback scopes, `GError**` and async pairs

use super::SemanticTransformer;
use crate::ast::types::ANY;
use crate::ast::{Callable, Direction, NodeId, NodeKind, Scope, Transfer};
use crate::diagnostic::WarningCode;
use crate::error::ScanError;
use tracing::trace;

const ASYNC_READY_CALLBACK: &str = "Gio.AsyncReadyCallback";
const DESTROY_NOTIFY: &str = "GLib.DestroyNotify";

fn finish_name(name: &str) -> String {
    format!("{}_finish", name.strip_suffix("_async").unwrap_or(name))
}

fn sync_name(name: &str) -> String {
    match name.strip_suffix("_async") {
        Some(stem) => stem.to_string(),
        None => format!("{}_sync", name),
    }
}

fn takes_ready_callback(callable: &Callable) -> bool {
    callable
        .parameters
        .iter()
        .any(|p| p.typ().ctype.as_deref() == Some("GAsyncReadyCallback"))
}

fn takes_async_result(callable: &Callable) -> bool {
    callable
        .parameters
        .iter()
        .any(|p| p.typ().ctype.as_deref() == Some("GAsyncResult*"))
}

/// Whether `candidate` is the blocking twin of an async/finish pair: same
/// return C type as the finish function, inputs named like the async
/// inputs and outputs named like the finish outputs
fn is_sync_twin(async_call: &Callable, finish: &Callable, candidate: &Callable) -> bool {
    if finish.retval.typ.ctype != candidate.retval.typ.ctype {
        return false;
    }
    candidate.parameters.iter().all(|param| {
        let source = match param.direction {
            Direction::In => async_call,
            Direction::Out => finish,
            Direction::InOut => return true,
        };
        source
            .parameters
            .iter()
            .any(|p| p.direction == param.direction && p.argname == param.argname)
    })
}

impl SemanticTransformer<'_> {
    pub(super) fn pass_callables(&mut self, id: NodeId, _chain: &[NodeId]) -> Result<bool, ScanError> {
        let Some(mut callable) = self.callable_of(id) else {
            return Ok(true);
        };
        self.apply_callback_conventions(&mut callable);
        if callable.parameters.last().and_then(|p| p.typ().ctype.as_deref()) == Some("GError**") {
            callable.parameters.pop();
            callable.throws = true;
        }
        self.store_callable(id, callable);
        Ok(true)
    }

    /// Link async functions to their finish and blocking counterparts; runs
    /// once every signature has lost its `GError**`
    pub(super) fn pair_async_functions(&mut self) {
        let nodes: Vec<NodeId> = self.model.main().nodes().collect();
        for &id in &nodes {
            if matches!(self.model.node(id).kind, NodeKind::Function(_)) {
                self.link_async_finish(id);
            }
        }
        for &id in &nodes {
            if matches!(self.model.node(id).kind, NodeKind::Function(_)) {
                self.link_async_sync(id);
            }
        }
        for id in nodes {
            if matches!(self.model.node(id).kind, NodeKind::Class(_) | NodeKind::Interface(_)) {
                self.pair_class_async_methods(id);
            }
        }
    }

    /// `Namespace.Name` of the callback a type resolves to
    fn callback_giname(&self, typ: &crate::ast::Type) -> Option<String> {
        let target = self.resolved_target(typ)?;
        match self.model.node(target).kind {
            NodeKind::Callback(_) => Some(self.model.giname(target)),
            _ => None,
        }
    }

    /// Callback, user data and destroy notify triples
    fn apply_callback_conventions(&self, callable: &mut Callable) {
        let callbacks: Vec<Option<String>> = callable
            .parameters
            .iter()
            .map(|p| self.callback_giname(p.typ()))
            .collect();

        for (param, callback) in callable.parameters.iter_mut().zip(&callbacks) {
            if matches!(callback.as_deref(), Some(ASYNC_READY_CALLBACK | DESTROY_NOTIFY)) {
                param.scope = Some(Scope::Async);
                param.transfer = Some(Transfer::None);
            }
        }

        let mut current: Option<usize> = None;
        for (i, callback) in callbacks.iter().enumerate() {
            match callback.as_deref() {
                Some(DESTROY_NOTIFY) => {
                    let Some(owner) = current else {
                        continue;
                    };
                    let notify = callable.parameters[i].argname.clone();
                    let param = &mut callable.parameters[owner];
                    param.destroy_name = Some(notify);
                    param.scope = Some(Scope::Notified);
                    param.transfer = Some(Transfer::None);
                }
                Some(_) => current = Some(i),
                None => {
                    let Some(owner) = current else {
                        continue;
                    };
                    let candidate = &callable.parameters[i];
                    if candidate.typ().is_fundamental(ANY) && candidate.argname.ends_with("data") {
                        let name = candidate.argname.clone();
                        callable.parameters[owner].closure_name = Some(name);
                    }
                }
            }
        }

        // user data is always nullable unless annotated otherwise
        let closures: Vec<String> = callable
            .parameters
            .iter()
            .filter_map(|p| p.closure_name.clone())
            .collect();
        for name in closures {
            if let Some(index) = callable.parameter_index(&name) {
                let data = &mut callable.parameters[index];
                if !data.not_nullable {
                    data.nullable = true;
                }
            }
        }
    }

    fn warn_missing_finish(&mut self, id: NodeId, finish: &str) {
        let name = self.model.node(id).name.clone();
        self.warn_node(
            id,
            WarningCode::AsyncFinishNotFound,
            format!(
                "Couldn't find '{}' for the corresponding async function: '{}'",
                finish, name
            ),
        );
    }

    /// Top-level async functions; only namespaces that define
    /// `GAsyncResult` have them
    fn link_async_finish(&mut self, id: NodeId) {
        let Some(callable) = self.callable_of(id) else {
            return;
        };
        if callable.finish_func.is_some() || !takes_ready_callback(&callable) {
            return;
        }
        if !self.model.main().has_ctype("GAsyncResult") {
            return;
        }
        let finish = finish_name(&self.model.node(id).name);
        if self.model.main().contains(&finish) {
            if let Some(callable) = self.model.node_mut(id).callable_mut() {
                callable.finish_func = Some(finish);
            }
        } else {
            self.warn_missing_finish(id, &finish);
        }
    }

    fn link_async_sync(&mut self, id: NodeId) {
        let Some(async_call) = self.callable_of(id) else {
            return;
        };
        if async_call.sync_func.is_some() {
            return;
        }
        let Some(finish) = async_call.finish_func.as_deref() else {
            return;
        };
        let name = self.model.node(id).name.clone();
        let ns = self.model.main();
        let Some(finish) = ns.get(finish).and_then(|f| self.callable_of(f)) else {
            return;
        };
        let candidate_name = sync_name(&name);
        let Some(candidate) = ns.get(&candidate_name) else {
            return;
        };
        let matched = self
            .callable_of(candidate)
            .is_some_and(|c| is_sync_twin(&async_call, &finish, &c));
        if matched {
            self.link_sync_pair(id, candidate);
        }
    }

    fn link_sync_pair(&mut self, async_id: NodeId, sync_id: NodeId) {
        let async_name = self.model.node(async_id).name.clone();
        let sync_name = self.model.node(sync_id).name.clone();
        trace!(async_func = %async_name, sync_func = %sync_name, "async pair");
        if let Some(callable) = self.model.node_mut(async_id).callable_mut() {
            callable.sync_func = Some(sync_name);
        }
        if let Some(callable) = self.model.node_mut(sync_id).callable_mut() {
            callable.async_func = Some(async_name);
        }
    }

    fn pair_class_async_methods(&mut self, id: NodeId) {
        let Some(contents) = self.model.node(id).contents().cloned() else {
            return;
        };
        let mut statics = contents.static_methods.clone();
        statics.extend(contents.constructors.iter().copied());

        for group in [&contents.methods, &contents.virtual_methods, &statics] {
            self.match_class_finish(group);
        }
        for group in [&contents.methods, &contents.virtual_methods, &contents.static_methods] {
            self.match_class_sync(group);
        }
    }

    fn member_named(&self, members: &[NodeId], name: &str) -> Option<(NodeId, Callable)> {
        members
            .iter()
            .copied()
            .filter(|m| self.model.node(*m).name == name)
            .find_map(|m| self.callable_of(m).map(|c| (m, c)))
    }

    fn match_class_finish(&mut self, members: &[NodeId]) {
        for &member in members {
            let Some(callable) = self.callable_of(member) else {
                continue;
            };
            if callable.finish_func.is_some() || !takes_ready_callback(&callable) {
                continue;
            }
            let finish = finish_name(&self.model.node(member).name);
            let found = members.iter().copied().any(|m| {
                self.model.node(m).name == finish
                    && self.callable_of(m).is_some_and(|c| takes_async_result(&c))
            });
            if found {
                if let Some(callable) = self.model.node_mut(member).callable_mut() {
                    callable.finish_func = Some(finish);
                }
            } else {
                self.warn_missing_finish(member, &finish);
            }
        }
    }

    fn match_class_sync(&mut self, members: &[NodeId]) {
        for &member in members {
            let Some(async_call) = self.callable_of(member) else {
                continue;
            };
            if async_call.sync_func.is_some() {
                continue;
            }
            let Some(finish) = async_call.finish_func.as_deref() else {
                continue;
            };
            let Some((_, finish)) = self.member_named(members, finish) else {
                continue;
            };
            let name = sync_name(&self.model.node(member).name);
            let Some((candidate, candidate_call)) = self.member_named(members, &name) else {
                continue;
            };
            if is_sync_twin(&async_call, &finish, &candidate_call) {
                self.link_sync_pair(member, candidate);
            }
        }
    }
}
