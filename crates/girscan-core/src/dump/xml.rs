//! Reading the runtime type dump produced by the probe

use crate::error::DumpError;
use crate::gir::xml::{parse_document, XmlElement};

/// Top-level entry flavour of a type dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpKind {
    /// `<enumeration>`, or `<enum>` from older probes
    Enum,
    /// `<flags>`
    Flags,
    /// `<class>`
    Class,
    /// `<interface>`
    Interface,
    /// `<boxed>`
    Boxed,
    /// `<pointer>`
    Pointer,
    /// `<fundamental>`
    Fundamental,
}

impl DumpKind {
    fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "enumeration" | "enum" => DumpKind::Enum,
            "flags" => DumpKind::Flags,
            "class" => DumpKind::Class,
            "interface" => DumpKind::Interface,
            "boxed" => DumpKind::Boxed,
            "pointer" => DumpKind::Pointer,
            "fundamental" => DumpKind::Fundamental,
            _ => return None,
        })
    }
}

/// `<member>` of an enum or flags type
#[derive(Debug, Clone, PartialEq)]
pub struct DumpMember {
    /// C identifier
    pub name: String,
    /// Nickname, `-` separated
    pub nick: String,
    /// Value as reported by the runtime (signed 32-bit)
    pub value: i64,
}

/// `<property>`
#[derive(Debug, Clone, PartialEq)]
pub struct DumpProperty {
    /// Property name
    pub name: String,
    /// Runtime type name of the value
    pub type_name: String,
    /// Parameter flags bitmask
    pub flags: u32,
    /// Stringified default, when the runtime has one
    pub default_value: Option<String>,
}

/// `<signal>`
#[derive(Debug, Clone, PartialEq)]
pub struct DumpSignal {
    /// Signal name
    pub name: String,
    /// Runtime type name of the return value
    pub return_type: String,
    /// Runtime type names of the parameters, the instance first
    pub params: Vec<String>,
    /// Emission stage (`first`, `last`, `cleanup`)
    pub when: Option<String>,
    /// `no-recurse="1"`
    pub no_recurse: bool,
    /// `detailed="1"`
    pub detailed: bool,
    /// `action="1"`
    pub action: bool,
    /// `no-hooks="1"`
    pub no_hooks: bool,
}

/// A registered type reported by the probe
#[derive(Debug, Clone, PartialEq)]
pub struct DumpType {
    /// Which top-level element this came from
    pub kind: DumpKind,
    /// Runtime type name
    pub name: String,
    /// Get-type symbol that produced the entry
    pub get_type: String,
    /// `abstract` present
    pub is_abstract: bool,
    /// `final` present
    pub is_final: bool,
    /// Ancestor runtime type names, nearest first
    pub parents: Vec<String>,
    /// `<implements>` runtime type names
    pub implements: Vec<String>,
    /// `<prerequisite>` runtime type names
    pub prerequisites: Vec<String>,
    /// Properties in dump order
    pub properties: Vec<DumpProperty>,
    /// Signals in dump order
    pub signals: Vec<DumpSignal>,
    /// Enum and flags members
    pub members: Vec<DumpMember>,
}

/// One top-level dump entry
#[derive(Debug, Clone, PartialEq)]
pub enum DumpEntry {
    /// A registered type
    Type(DumpType),
    /// `<error-quark function=".." domain=".."/>`
    ErrorQuark {
        /// Quark function symbol
        function: String,
        /// Error domain string
        domain: String,
    },
}

/// A parsed dump document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DumpDocument {
    /// Entries in document order
    pub entries: Vec<DumpEntry>,
}

fn required<'a>(element: &'a XmlElement, attribute: &'static str) -> Result<&'a str, DumpError> {
    element.attr(attribute).ok_or_else(|| DumpError::MissingAttribute {
        element: element.name.clone(),
        attribute,
    })
}

fn parse_int<T: std::str::FromStr>(
    element: &XmlElement,
    attribute: &'static str,
) -> Result<T, DumpError> {
    let raw = required(element, attribute)?;
    raw.trim().parse().map_err(|_| DumpError::InvalidValue {
        attribute,
        value: raw.to_string(),
    })
}

fn names_of(element: &XmlElement, tag: &str) -> Result<Vec<String>, DumpError> {
    element
        .children_named(tag)
        .map(|child| required(child, "name").map(str::to_string))
        .collect()
}

fn parse_property(element: &XmlElement) -> Result<DumpProperty, DumpError> {
    Ok(DumpProperty {
        name: required(element, "name")?.to_string(),
        type_name: required(element, "type")?.to_string(),
        flags: parse_int(element, "flags")?,
        default_value: element.attr("default-value").map(str::to_string),
    })
}

fn parse_signal(element: &XmlElement) -> Result<DumpSignal, DumpError> {
    let params = element
        .children_named("param")
        .map(|p| required(p, "type").map(str::to_string))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DumpSignal {
        name: required(element, "name")?.to_string(),
        return_type: required(element, "return")?.to_string(),
        params,
        when: element.attr("when").map(str::to_string),
        no_recurse: element.flag("no-recurse"),
        detailed: element.flag("detailed"),
        action: element.flag("action"),
        no_hooks: element.flag("no-hooks"),
    })
}

fn parse_type(kind: DumpKind, element: &XmlElement) -> Result<DumpType, DumpError> {
    let parents = match element.attr("parents") {
        Some(list) if !list.is_empty() => list.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    let members = element
        .children_named("member")
        .map(|m| {
            Ok(DumpMember {
                name: required(m, "name")?.to_string(),
                nick: required(m, "nick")?.to_string(),
                value: parse_int(m, "value")?,
            })
        })
        .collect::<Result<Vec<_>, DumpError>>()?;
    Ok(DumpType {
        kind,
        name: required(element, "name")?.to_string(),
        get_type: required(element, "get-type")?.to_string(),
        is_abstract: element.attr("abstract").is_some(),
        is_final: element.attr("final").is_some(),
        parents,
        implements: names_of(element, "implements")?,
        prerequisites: names_of(element, "prerequisite")?,
        properties: element
            .children_named("property")
            .map(parse_property)
            .collect::<Result<_, _>>()?,
        signals: element
            .children_named("signal")
            .map(parse_signal)
            .collect::<Result<_, _>>()?,
        members,
    })
}

impl DumpDocument {
    /// Parse dump XML text
    pub fn parse(text: &str) -> Result<Self, DumpError> {
        let Some(root) = parse_document::<DumpError>(text)? else {
            return Ok(DumpDocument::default());
        };
        let mut entries = Vec::with_capacity(root.children.len());
        for child in &root.children {
            if child.name == "error-quark" {
                entries.push(DumpEntry::ErrorQuark {
                    function: required(child, "function")?.to_string(),
                    domain: required(child, "domain")?.to_string(),
                });
                continue;
            }
            let kind = DumpKind::from_tag(&child.name)
                .ok_or_else(|| DumpError::UnknownElement(child.name.clone()))?;
            entries.push(DumpEntry::Type(parse_type(kind, child)?));
        }
        Ok(DumpDocument { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"<?xml version="1.0"?>
<dump>
  <class name="FooWidget" get-type="foo_widget_get_type" parents="GInitiallyUnowned,GObject" abstract="1">
    <implements name="FooBuildable"/>
    <property name="label" type="gchararray" flags="227" default-value="NULL"/>
    <signal name="clicked" return="void" when="last" action="1">
      <param type="FooWidget"/>
      <param type="gint"/>
    </signal>
  </class>
  <flags name="FooFlags" get-type="foo_flags_get_type">
    <member name="FOO_FLAGS_A" nick="a" value="1"/>
    <member name="FOO_FLAGS_BIG" nick="big" value="-2147483648"/>
  </flags>
  <error-quark function="foo_error_quark" domain="foo-error-quark"/>
</dump>"#;

    #[test]
    fn test_parse_dump() {
        let doc = DumpDocument::parse(DUMP).unwrap();
        assert_eq!(doc.entries.len(), 3);
        let DumpEntry::Type(class) = &doc.entries[0] else {
            panic!("expected a type entry");
        };
        assert_eq!(class.kind, DumpKind::Class);
        assert!(class.is_abstract);
        assert!(!class.is_final);
        assert_eq!(class.parents, vec!["GInitiallyUnowned", "GObject"]);
        assert_eq!(class.implements, vec!["FooBuildable"]);
        assert_eq!(class.properties[0].flags, 227);
        assert_eq!(class.properties[0].default_value.as_deref(), Some("NULL"));
        let signal = &class.signals[0];
        assert_eq!(signal.params, vec!["FooWidget", "gint"]);
        assert!(signal.action);
        assert!(!signal.detailed);
        assert_eq!(signal.when.as_deref(), Some("last"));

        let DumpEntry::Type(flags) = &doc.entries[1] else {
            panic!("expected a type entry");
        };
        assert_eq!(flags.kind, DumpKind::Flags);
        assert_eq!(flags.members[1].value, -2147483648);
        assert_eq!(
            doc.entries[2],
            DumpEntry::ErrorQuark {
                function: "foo_error_quark".into(),
                domain: "foo-error-quark".into(),
            }
        );
    }

    #[test]
    fn test_unknown_element_is_rejected() {
        let err = DumpDocument::parse("<dump><widget name=\"x\"/></dump>").unwrap_err();
        assert!(matches!(err, DumpError::UnknownElement(tag) if tag == "widget"));
    }

    #[test]
    fn test_missing_get_type() {
        let err = DumpDocument::parse("<dump><boxed name=\"FooBox\"/></dump>").unwrap_err();
        assert!(matches!(
            err,
            DumpError::MissingAttribute { attribute: "get-type", .. }
        ));
    }
}
