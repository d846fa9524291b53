//! Parsed comment block tree

use super::vocab::Annotation;
use crate::position::SourcePosition;

/// Options of a single annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationOptions {
    /// Space separated options: `(transfer full)`
    List(Vec<String>),
    /// `key[=value]` pairs: `(array length=n zero-terminated)`
    Dict(Vec<(String, Option<String>)>),
}

impl AnnotationOptions {
    /// Number of options
    pub fn len(&self) -> usize {
        match self {
            AnnotationOptions::List(items) => items.len(),
            AnnotationOptions::Dict(items) => items.len(),
        }
    }

    /// Whether there are no options
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First option of a list
    pub fn first(&self) -> Option<&str> {
        match self {
            AnnotationOptions::List(items) => items.first().map(String::as_str),
            AnnotationOptions::Dict(items) => items.first().map(|(k, _)| k.as_str()),
        }
    }

    /// List items, empty for dicts
    pub fn items(&self) -> &[String] {
        match self {
            AnnotationOptions::List(items) => items,
            AnnotationOptions::Dict(_) => &[],
        }
    }

    /// Whether a list contains an option, or a dict a key
    pub fn contains(&self, option: &str) -> bool {
        match self {
            AnnotationOptions::List(items) => items.iter().any(|i| i == option),
            AnnotationOptions::Dict(items) => items.iter().any(|(k, _)| k == option),
        }
    }

    /// Dict lookup; `Some(None)` for a key without value
    pub fn key(&self, key: &str) -> Option<Option<&str>> {
        match self {
            AnnotationOptions::Dict(items) => items
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_deref()),
            AnnotationOptions::List(_) => None,
        }
    }

    /// Dict entries, empty for lists
    pub fn pairs(&self) -> &[(String, Option<String>)] {
        match self {
            AnnotationOptions::Dict(items) => items,
            AnnotationOptions::List(_) => &[],
        }
    }
}

/// Ordered annotation map of one comment block part
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    entries: Vec<(String, AnnotationOptions)>,
    /// Where the annotations were first seen
    pub position: Option<SourcePosition>,
}

impl Annotations {
    /// Empty map tied to a position
    pub fn at(position: SourcePosition) -> Self {
        Annotations {
            entries: Vec::new(),
            position: Some(position),
        }
    }

    /// Insert or replace; a replaced entry keeps its place
    pub fn insert(&mut self, name: impl Into<String>, options: AnnotationOptions) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = options,
            None => self.entries.push((name, options)),
        }
    }

    /// Options by raw name
    pub fn get_raw(&self, name: &str) -> Option<&AnnotationOptions> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, o)| o)
    }

    /// Options of a known annotation
    pub fn get(&self, annotation: Annotation) -> Option<&AnnotationOptions> {
        self.get_raw(annotation.as_str())
    }

    /// Whether an annotation is present
    pub fn has(&self, annotation: Annotation) -> bool {
        self.get(annotation).is_some()
    }

    /// Whether a raw name is present
    pub fn contains_raw(&self, name: &str) -> bool {
        self.get_raw(name).is_some()
    }

    /// First option of a known annotation
    pub fn first(&self, annotation: Annotation) -> Option<&str> {
        self.get(annotation).and_then(|o| o.first())
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnnotationOptions)> {
        self.entries.iter().map(|(n, o)| (n.as_str(), o))
    }

    /// Number of annotations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An `@name:` part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentParameter {
    /// Parameter name (`...` for varargs)
    pub name: String,
    /// Annotations
    pub annotations: Annotations,
    /// Description; `Some("")` when explicitly empty
    pub description: Option<String>,
    /// Line of the part
    pub position: SourcePosition,
}

/// A `Tag:` part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentTag {
    /// Lowercase tag name
    pub name: String,
    /// Annotations
    pub annotations: Annotations,
    /// Version for since/deprecated, stability word for stability
    pub value: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Line of the part
    pub position: SourcePosition,
}

/// Insertion-ordered map keyed by part name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for PartMap<T> {
    fn default() -> Self {
        PartMap {
            entries: Vec::new(),
        }
    }
}

impl<T> PartMap<T> {
    /// Insert or replace in place
    pub fn insert(&mut self, name: impl Into<String>, value: T) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Lookup
    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Mutable lookup
    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Whether the name exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Values in order
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Mutable values in order
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|(_, v)| v)
    }

    /// Value at a position
    pub fn nth(&self, index: usize) -> Option<&T> {
        self.entries.get(index).map(|(_, v)| v)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rename keys positionally, dropping entries past `names`
    pub fn rekey(&mut self, names: &[String]) {
        for ((key, _), name) in self.entries.iter_mut().zip(names) {
            *key = name.clone();
        }
    }
}

/// A parsed documentation comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentBlock {
    /// Identifier (`symbol`, `Type:prop`, `Type::signal`, `SECTION:name`, ...)
    pub name: String,
    /// Identifier annotations
    pub annotations: Annotations,
    /// Parameters in order
    pub params: PartMap<CommentParameter>,
    /// Description part
    pub description: Option<String>,
    /// Tags in order
    pub tags: PartMap<CommentTag>,
    /// Code preceding `/**`
    pub code_before: Option<String>,
    /// Code following `*/`
    pub code_after: Option<String>,
    /// Whitespace before the `*` of every line
    pub indentation: Vec<String>,
    /// Where the comment starts
    pub position: SourcePosition,
}

impl CommentBlock {
    /// An empty block
    pub fn new(name: impl Into<String>, position: SourcePosition) -> Self {
        CommentBlock {
            name: name.into(),
            annotations: Annotations::default(),
            params: PartMap::default(),
            description: None,
            tags: PartMap::default(),
            code_before: None,
            code_after: None,
            indentation: Vec::new(),
            position,
        }
    }

    /// Tag by lowercase name
    pub fn tag(&self, name: &str) -> Option<&CommentTag> {
        self.tags.get(name)
    }

    /// Parameter by name
    pub fn param(&self, name: &str) -> Option<&CommentParameter> {
        self.params.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotations_keep_insertion_order() {
        let mut anns = Annotations::default();
        anns.insert("transfer", AnnotationOptions::List(vec!["full".into()]));
        anns.insert("nullable", AnnotationOptions::List(vec![]));
        anns.insert("transfer", AnnotationOptions::List(vec!["none".into()]));
        let names: Vec<_> = anns.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["transfer", "nullable"]);
        assert_eq!(anns.first(Annotation::Transfer), Some("none"));
        assert!(anns.has(Annotation::Nullable));
    }

    #[test]
    fn test_dict_options() {
        let opts = AnnotationOptions::Dict(vec![
            ("length".into(), Some("n".into())),
            ("zero-terminated".into(), None),
        ]);
        assert_eq!(opts.key("length"), Some(Some("n")));
        assert_eq!(opts.key("zero-terminated"), Some(None));
        assert_eq!(opts.key("fixed-size"), None);
        assert!(opts.contains("length"));
    }

    #[test]
    fn test_part_map_rekey() {
        let mut map: PartMap<u32> = PartMap::default();
        map.insert("a", 1);
        map.insert("b", 2);
        map.rekey(&["x".to_string(), "y".to_string()]);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(map.get("y"), Some(&2));
    }
}
