//! Minimal XML element tree and an indenting writer
//!
//! Both the GIR reader and the dump reader load the whole document into an
//! [`XmlElement`] tree first; documents are small enough for that.

use crate::error::GirError;
use quick_xml::escape::partial_escape;
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// One element with its attributes, children and text content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified tag name (`c:type`, `glib:signal`, ...)
    pub name: String,
    /// Attributes in document order, unescaped
    pub attributes: Vec<(String, String)>,
    /// Child elements
    pub children: Vec<XmlElement>,
    /// Concatenated text content, unescaped
    pub text: String,
}

impl XmlElement {
    /// Attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute parsed as a `0`/`1` flag
    pub fn flag(&self, name: &str) -> bool {
        self.attr(name) == Some("1")
    }

    /// Children with the given tag
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First child with the given tag
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }
}

fn start_element<E>(start: &BytesStart<'_>) -> Result<XmlElement, E>
where
    E: From<quick_xml::Error> + From<AttrError>,
{
    let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value()?.to_string();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

/// Parse a document into its root element; `None` for an empty document
pub fn parse_document<E>(text: &str) -> Result<Option<XmlElement>, E>
where
    E: From<quick_xml::Error> + From<AttrError>,
{
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;

    let mut finish = |element: XmlElement, stack: &mut Vec<XmlElement>| match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => root = Some(element),
    };

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => stack.push(start_element::<E>(e)?),
            Event::Empty(ref e) => {
                let element = start_element::<E>(e)?;
                finish(element, &mut stack);
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    finish(element, &mut stack);
                }
            }
            Event::Text(ref e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&e.unescape()?);
                }
            }
            Event::CData(ref e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(root)
}

/// Indenting GIR serializer on top of [`quick_xml::Writer`]
///
/// A started element stays pending until something is written inside it,
/// so elements without children or text collapse to `<tag/>`. The first
/// write failure is kept and returned by [`XmlWriter::finish`].
pub struct XmlWriter {
    writer: Writer<Vec<u8>>,
    pending: Option<BytesStart<'static>>,
    open: Vec<String>,
    error: Option<GirError>,
}

impl XmlWriter {
    /// A writer with the XML declaration already emitted
    pub fn new() -> Self {
        let mut xml = XmlWriter {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
            pending: None,
            open: Vec::new(),
            error: None,
        };
        xml.emit(Event::Decl(BytesDecl::new("1.0", None, None)));
        xml
    }

    fn emit(&mut self, event: Event<'_>) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.writer.write_event(event) {
            self.error = Some(GirError::from(err));
        }
    }

    fn flush_pending(&mut self) {
        if let Some(start) = self.pending.take() {
            self.emit(Event::Start(start));
        }
    }

    fn element(tag: &str, attrs: &[(&str, String)]) -> BytesStart<'static> {
        let mut start = BytesStart::new(tag.to_string());
        for (key, value) in attrs {
            start.push_attribute((*key, value.as_str()));
        }
        start
    }

    /// Write a comment; `--` is not allowed inside and gets spaced out
    pub fn comment(&mut self, text: &str) {
        self.flush_pending();
        let body = format!(" {} ", text.replace("--", "- -"));
        self.emit(Event::Comment(BytesText::from_escaped(body)));
    }

    /// Open an element that will get children
    pub fn start(&mut self, tag: &str, attrs: &[(&str, String)]) {
        self.flush_pending();
        self.pending = Some(Self::element(tag, attrs));
        self.open.push(tag.to_string());
    }

    /// Close the innermost element
    pub fn end(&mut self) {
        let Some(tag) = self.open.pop() else {
            return;
        };
        match self.pending.take() {
            Some(start) => self.emit(Event::Empty(start)),
            None => self.emit(Event::End(BytesEnd::new(tag))),
        }
    }

    /// Write a childless element
    pub fn empty(&mut self, tag: &str, attrs: &[(&str, String)]) {
        self.flush_pending();
        self.emit(Event::Empty(Self::element(tag, attrs)));
    }

    /// Write an element holding only text
    pub fn text_element(&mut self, tag: &str, attrs: &[(&str, String)], text: &str) {
        self.flush_pending();
        self.emit(Event::Start(Self::element(tag, attrs)));
        self.emit(Event::Text(BytesText::from_escaped(partial_escape(text))));
        self.emit(Event::End(BytesEnd::new(tag.to_string())));
    }

    /// Close what is still open and return the document
    pub fn finish(mut self) -> Result<String, GirError> {
        while !self.open.is_empty() {
            self.end();
        }
        if let Some(err) = self.error {
            return Err(err);
        }
        let mut out = String::from_utf8(self.writer.into_inner())
            .map_err(|err| GirError::Invalid(err.to_string()))?;
        out.push('\n');
        Ok(out)
    }
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tree_with_entities() {
        let text = r#"<?xml version="1.0"?>
<root a="x &amp; y">
  <child name="one"/>
  <doc>1 &lt; 2</doc>
</root>"#;
        let root = parse_document::<GirError>(text).unwrap().unwrap();
        assert_eq!(root.attr("a"), Some("x & y"));
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.child("doc").unwrap().text, "1 < 2");
        assert_eq!(root.children_named("child").count(), 1);
    }

    #[test]
    fn test_empty_document() {
        assert!(parse_document::<GirError>("").unwrap().is_none());
    }

    #[test]
    fn test_writer_collapses_empty_elements() {
        let mut w = XmlWriter::new();
        w.start("repository", &[("version", "1.2".to_string())]);
        w.start("namespace", &[("name", "Foo".to_string())]);
        w.end();
        w.text_element("doc", &[], "a < \"b\"");
        let out = w.finish().unwrap();
        assert_eq!(
            out,
            "<?xml version=\"1.0\"?>\n<repository version=\"1.2\">\n  <namespace name=\"Foo\"/>\n  <doc>a &lt; \"b\"</doc>\n</repository>\n"
        );
    }

    #[test]
    fn test_writer_output_parses_back() {
        let mut w = XmlWriter::new();
        w.start("a", &[("q", "say \"hi\" & <bye>".to_string())]);
        w.text_element("b", &[], "x & y");
        let out = w.finish().unwrap();
        let root = parse_document::<GirError>(&out).unwrap().unwrap();
        assert_eq!(root.attr("q"), Some("say \"hi\" & <bye>"));
        assert_eq!(root.child("b").unwrap().text, "x & y");
    }
}
