//! Mapping C identifiers and symbols onto namespaces

use crate::ast::{Model, NamespaceId};
use crate::error::NameError;

impl Model {
    /// Candidate `(namespace, stripped name)` splits, most probable last
    ///
    /// Every namespace contributes its first matching prefix. Matches in the
    /// main namespace sort after those of includes; within each group the
    /// longer prefix wins.
    fn split_c_string(
        &self,
        name: &str,
        is_identifier: bool,
    ) -> Result<Vec<(NamespaceId, String)>, NameError> {
        let mut matches: Vec<(NamespaceId, String, usize)> = Vec::new();
        let mut unprefixed = Vec::new();
        let uppercase = name.chars().next().is_some_and(char::is_uppercase);

        for ns_id in self.namespace_ids() {
            let ns = self.namespace(ns_id);
            let prefixes = if is_identifier {
                ns.identifier_prefixes.clone()
            } else if uppercase {
                ns.ucase_symbol_prefixes()
            } else {
                ns.symbol_prefixes.clone()
            };
            if prefixes.is_empty() {
                unprefixed.push(ns_id);
                continue;
            }
            for mut prefix in prefixes {
                if !is_identifier && !prefix.ends_with('_') {
                    prefix.push('_');
                }
                if let Some(rest) = name.strip_prefix(prefix.as_str()) {
                    matches.push((ns_id, rest.to_string(), prefix.len()));
                    break;
                }
            }
        }

        if !matches.is_empty() {
            let main = self.main_id();
            matches.sort_by_key(|(ns, _, len)| (*ns == main, *len));
            return Ok(matches.into_iter().map(|(ns, rest, _)| (ns, rest)).collect());
        }
        if self.accept_unprefixed {
            return Ok(vec![(self.main_id(), name.to_string())]);
        }
        for ns_id in unprefixed {
            if self.namespace(ns_id).contains(name) {
                return Ok(vec![(ns_id, name.to_string())]);
            }
        }
        Err(if is_identifier {
            NameError::UnknownIdentifierNamespace(name.to_string())
        } else {
            NameError::UnknownSymbolNamespace(name.to_string())
        })
    }

    /// Split a StudlyCaps identifier such as `FooBar`
    pub fn split_ctype_namespaces(
        &self,
        ident: &str,
    ) -> Result<Vec<(NamespaceId, String)>, NameError> {
        self.split_c_string(ident, true)
    }

    /// Split a C symbol such as `foo_bar_do_baz`
    pub fn split_csymbol_namespaces(
        &self,
        symbol: &str,
    ) -> Result<Vec<(NamespaceId, String)>, NameError> {
        self.split_c_string(symbol, false)
    }

    /// Most probable split of a C symbol
    pub fn split_csymbol(&self, symbol: &str) -> Result<(NamespaceId, String), NameError> {
        let mut matches = self.split_c_string(symbol, false)?;
        matches
            .pop()
            .ok_or_else(|| NameError::UnknownSymbolNamespace(symbol.to_string()))
    }

    /// Strip the main namespace prefix from a C type identifier
    ///
    /// A leading `_` is kept on the result. Identifiers that only match an
    /// included namespace are rejected.
    pub fn strip_identifier(&self, ident: &str) -> Result<String, NameError> {
        let (hidden, bare) = match ident.strip_prefix('_') {
            Some(rest) => (true, rest),
            None => (false, ident),
        };
        let matches = self.split_ctype_namespaces(bare)?;
        let main = self.main_id();
        if let Some((_, name)) = matches.iter().find(|(ns, _)| *ns == main) {
            return Ok(if hidden { format!("_{}", name) } else { name.clone() });
        }
        let namespace = matches
            .last()
            .map(|(ns, _)| self.namespace(*ns).name.clone())
            .unwrap_or_default();
        Err(NameError::ForeignIdentifier {
            identifier: bare.to_string(),
            namespace,
        })
    }

    /// Strip the main namespace prefix from a C symbol
    pub fn strip_symbol(&self, symbol: &str) -> Result<String, NameError> {
        let (hidden, bare) = match symbol.strip_prefix('_') {
            Some(rest) => (true, rest),
            None => (false, symbol),
        };
        let (ns, name) = self.split_csymbol(bare)?;
        if ns != self.main_id() {
            return Err(NameError::ForeignSymbol(self.namespace(ns).name.clone()));
        }
        Ok(if hidden { format!("_{}", name) } else { name })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Model, Namespace};
    use crate::error::NameError;

    fn model() -> Model {
        let mut model = Model::new(Namespace::new("Foo", "1.0", None, None));
        model.add_namespace(Namespace::new("GObject", "2.0", Some(vec!["G".into()]), None));
        model
    }

    #[test]
    fn test_strip_identifier() {
        let model = model();
        assert_eq!(model.strip_identifier("FooWidget").unwrap(), "Widget");
        assert_eq!(model.strip_identifier("_FooWidget").unwrap(), "_Widget");
        assert_eq!(
            model.strip_identifier("GObject"),
            Err(NameError::ForeignIdentifier {
                identifier: "GObject".into(),
                namespace: "GObject".into(),
            })
        );
        assert!(matches!(
            model.strip_identifier("BarThing"),
            Err(NameError::UnknownIdentifierNamespace(_))
        ));
    }

    #[test]
    fn test_strip_symbol() {
        let model = model();
        assert_eq!(model.strip_symbol("foo_widget_new").unwrap(), "widget_new");
        assert_eq!(model.strip_symbol("FOO_MAX_SIZE").unwrap(), "MAX_SIZE");
        assert_eq!(
            model.strip_symbol("g_object_ref"),
            Err(NameError::ForeignSymbol("GObject".into()))
        );
    }

    #[test]
    fn test_main_namespace_sorts_last() {
        let mut model = Model::new(Namespace::new(
            "Gtk",
            "4.0",
            Some(vec!["Gtk".into()]),
            Some(vec!["gtk".into()]),
        ));
        model.add_namespace(Namespace::new("Gsk", "4.0", Some(vec!["G".into()]), Some(vec!["g".into()])));
        let matches = model.split_ctype_namespaces("GtkWidget").unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches.last().unwrap().0, model.main_id());
        assert_eq!(matches.last().unwrap().1, "Widget");
    }

    #[test]
    fn test_accept_unprefixed() {
        let mut model = model();
        model.accept_unprefixed = true;
        let (ns, name) = model.split_csymbol("bare_function").unwrap();
        assert_eq!(ns, model.main_id());
        assert_eq!(name, "bare_function");
    }
}
