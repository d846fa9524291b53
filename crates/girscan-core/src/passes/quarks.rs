//! Error quark functions to the enumerations holding their codes

use super::SemanticTransformer;
use crate::ast::{NodeId, NodeKind};
use crate::diagnostic::WarningCode;
use crate::utils::to_underscores_noprefix;
use std::collections::BTreeMap;
use tracing::trace;

impl SemanticTransformer<'_> {
    pub(super) fn pair_quarks_with_enums(&mut self) {
        // registered enums are already in uscore_type_names; this covers the
        // plain C ones
        let mut uscore_enums: BTreeMap<String, NodeId> = BTreeMap::new();
        let nodes: Vec<NodeId> = self.model.main().nodes().collect();
        for &id in &nodes {
            let node = self.model.node(id);
            if matches!(node.kind, NodeKind::Enum(_)) {
                uscore_enums.insert(to_underscores_noprefix(&node.name).to_lowercase(), id);
                uscore_enums.insert(node.name.clone(), id);
            }
        }

        for id in nodes {
            let Some(func) = self.model.node(id).function() else {
                continue;
            };
            let Some(domain) = func.error_domain.clone() else {
                continue;
            };
            let symbol = func.symbol.clone();
            let Some(full) = symbol.strip_suffix("_quark") else {
                continue;
            };
            let short = match self.model.split_csymbol(full) {
                Ok((_, short)) => short,
                Err(_) => continue,
            };

            let is_enum = |id: &NodeId| matches!(self.model.node(*id).kind, NodeKind::Enum(_));
            // GIOError was taken before GIOErrorEnum existed
            let target = if full == "g_io_error" {
                self.model.main().get("IOErrorEnum")
            } else {
                self.uscore_type_names
                    .get(&short)
                    .filter(|id| is_enum(id))
                    .or_else(|| uscore_enums.get(&short))
                    .copied()
            };

            match target {
                Some(target) => {
                    trace!(quark = %symbol, domain = %domain, "error domain");
                    if let NodeKind::Enum(enumeration) = &mut self.model.node_mut(target).kind {
                        enumeration.error_domain = Some(domain);
                    }
                }
                None => self.warn_node(
                    id,
                    WarningCode::ErrorQuarkUnpaired,
                    format!("{}: Couldn't find corresponding enumeration", symbol),
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::annotation::CommentBlocks;
    use crate::ast::{Enumeration, Model, Node};

    fn add_quark(model: &mut Model, symbol: &str, domain: &str) {
        let func = add_function(model, symbol, ctype("GQuark"), Vec::new());
        if let Some(f) = model.node_mut(func).function_mut() {
            f.error_domain = Some(domain.to_string());
        }
    }

    fn add_enum(model: &mut Model, name: &str, ctype: &str) -> NodeId {
        let ns = model.main_id();
        let id = model.alloc(Node::new(
            name,
            NodeKind::Enum(Enumeration {
                ctype: Some(ctype.to_string()),
                ..Enumeration::default()
            }),
        ));
        model.append(ns, id, false).unwrap();
        id
    }

    #[test]
    fn test_quark_pairs_with_plain_enum() {
        let mut model = model();
        let error = add_enum(&mut model, "ParseError", "FooParseError");
        add_quark(&mut model, "foo_parse_error_quark", "foo-parse-error-quark");

        let mut diagnostics = diagnostics();
        let mut blocks = CommentBlocks::new();
        SemanticTransformer::new(&mut model, &mut diagnostics, &mut blocks)
            .transform()
            .unwrap();

        assert_eq!(
            model.node(error).enumeration().unwrap().error_domain.as_deref(),
            Some("foo-parse-error-quark")
        );
        assert!(!diagnostics.has_code(WarningCode::ErrorQuarkUnpaired));
    }

    #[test]
    fn test_io_error_quark_pairs_with_io_error_enum() {
        use crate::ast::Namespace;
        let mut model = Model::new(Namespace::new(
            "Gio",
            "2.0",
            Some(vec!["G".to_string()]),
            Some(vec!["g".to_string()]),
        ));
        let error = add_enum(&mut model, "IOErrorEnum", "GIOErrorEnum");
        add_quark(&mut model, "g_io_error_quark", "g-io-error-quark");

        let mut diagnostics = diagnostics();
        let mut blocks = CommentBlocks::new();
        SemanticTransformer::new(&mut model, &mut diagnostics, &mut blocks)
            .transform()
            .unwrap();

        assert_eq!(
            model.node(error).enumeration().unwrap().error_domain.as_deref(),
            Some("g-io-error-quark")
        );
        assert!(!diagnostics.has_code(WarningCode::ErrorQuarkUnpaired));
    }

    #[test]
    fn test_unpaired_quark_warns() {
        let mut model = model();
        add_enum(&mut model, "Color", "FooColor");
        add_quark(&mut model, "foo_socket_error_quark", "foo-socket-error");

        let mut diagnostics = diagnostics();
        let mut blocks = CommentBlocks::new();
        SemanticTransformer::new(&mut model, &mut diagnostics, &mut blocks)
            .transform()
            .unwrap();

        let warning = diagnostics
            .entries()
            .iter()
            .find(|d| d.code == Some(WarningCode::ErrorQuarkUnpaired))
            .expect("quark warning");
        assert_eq!(
            warning.message,
            "foo_socket_error_quark: Couldn't find corresponding enumeration"
        );
    }
}
