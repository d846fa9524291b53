//! Re-emits GTK-Doc text from a parsed comment block

use super::block::{AnnotationOptions, Annotations, CommentBlock, CommentParameter, CommentTag};
use crate::utils::capitalize;

/// Serializes comment blocks back to comment text
#[derive(Debug, Clone, Copy)]
pub struct CommentBlockWriter {
    /// Restore the original indentation before the `*`
    pub indent: bool,
}

impl Default for CommentBlockWriter {
    fn default() -> Self {
        CommentBlockWriter { indent: true }
    }
}

impl CommentBlockWriter {
    /// Writer that keeps the original indentation
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a complete comment, including code around the tokens
    pub fn write(&self, block: &CommentBlock) -> String {
        let mut lines: Vec<String> = Vec::new();

        if block.name.starts_with("SECTION") || block.name.starts_with("ACTION") {
            lines.push(block.name.clone());
        } else if block.annotations.is_empty() {
            lines.push(format!("{}:", block.name));
        } else {
            lines.push(format!(
                "{}: {}",
                block.name,
                serialize_annotations(&block.annotations)
            ));
        }

        for param in block.params.values() {
            lines.extend(serialize_parameter(param));
        }

        if let Some(description) = block.description.as_deref().filter(|d| !d.is_empty()) {
            lines.push(String::new());
            lines.extend(description.split('\n').map(str::to_string));
        }

        if !block.tags.is_empty() {
            lines.push(String::new());
            for tag in block.tags.values() {
                lines.extend(serialize_tag(tag));
            }
        }

        let (start_indent, line_indent) = if self.indent {
            let indent = most_common(&block.indentation)
                .filter(|i| !i.is_empty())
                .unwrap_or(" ");
            if indent.ends_with('\t') {
                (indent.to_string(), format!("{} ", indent))
            } else {
                let mut start = indent.to_string();
                start.pop();
                (start, indent.to_string())
            }
        } else {
            (String::new(), " ".to_string())
        };

        let mut out = String::new();
        if let Some(code) = block.code_before.as_deref().filter(|c| !c.is_empty()) {
            out.push_str(code);
            out.push('\n');
        }
        out.push_str(&format!("{}/**\n", start_indent));
        for line in &lines {
            if line.is_empty() {
                out.push_str(&format!("{}*\n", line_indent));
            } else {
                out.push_str(&format!("{}* {}\n", line_indent, line));
            }
        }
        out.push_str(&format!("{}*/\n", line_indent));
        if let Some(code) = block.code_after.as_deref().filter(|c| !c.is_empty()) {
            out.push_str(code);
            out.push('\n');
        }
        out
    }
}

/// `(name opt ...)` groups separated by spaces
pub fn serialize_annotations(annotations: &Annotations) -> String {
    annotations
        .iter()
        .map(|(name, options)| {
            if options.is_empty() {
                return format!("({})", name);
            }
            let rendered = match options {
                AnnotationOptions::List(items) => items.join(" "),
                AnnotationOptions::Dict(pairs) => pairs
                    .iter()
                    .map(|(key, value)| match value.as_deref() {
                        Some(v) if !v.is_empty() => format!("{}={}", key, v),
                        _ => key.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            };
            format!("({} {})", name, rendered)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn append_description(serialized: &mut String, description: &str) {
    if description.starts_with('\n') {
        serialized.push(':');
    } else {
        serialized.push_str(": ");
    }
    serialized.push_str(description);
}

fn serialize_parameter(param: &CommentParameter) -> Vec<String> {
    let mut serialized = format!("@{}", param.name);
    if !param.annotations.is_empty() {
        serialized.push_str(": ");
        serialized.push_str(&serialize_annotations(&param.annotations));
    }
    match param.description.as_deref().filter(|d| !d.is_empty()) {
        Some(description) => append_description(&mut serialized, description),
        None => serialized.push(':'),
    }
    serialized.split('\n').map(str::to_string).collect()
}

fn serialize_tag(tag: &CommentTag) -> Vec<String> {
    let mut serialized = capitalize(&tag.name);
    if !tag.annotations.is_empty() {
        serialized.push_str(": ");
        serialized.push_str(&serialize_annotations(&tag.annotations));
    }
    let value = tag.value.as_deref().filter(|v| !v.is_empty());
    let description = tag.description.as_deref().filter(|d| !d.is_empty());
    if let Some(value) = value {
        serialized.push_str(": ");
        serialized.push_str(value);
    }
    if let Some(description) = description {
        append_description(&mut serialized, description);
    }
    if value.is_none() && description.is_none() {
        serialized.push(':');
    }
    serialized.split('\n').map(str::to_string).collect()
}

/// Most frequent entry; ties go to the one seen first
fn most_common(items: &[String]) -> Option<&str> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(i, _)| *i == item.as_str()) {
            Some(entry) => entry.1 += 1,
            None => counts.push((item.as_str(), 1)),
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for (item, count) in counts {
        if best.map_or(true, |(_, n)| count > n) {
            best = Some((item, count));
        }
    }
    best.map(|(item, _)| item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::parser::CommentBlockParser;
    use crate::diagnostic::{Diagnostics, WarningConfig};

    fn reparse(text: &str) -> String {
        let mut diag = Diagnostics::new(WarningConfig::all());
        let block = CommentBlockParser::new(&mut diag)
            .parse_comment_block(text, "foo.c", 1)
            .unwrap();
        CommentBlockWriter::new().write(&block)
    }

    #[test]
    fn test_write_is_stable_for_canonical_input() {
        let text = "/**\n * foo_widget_new: (constructor)\n * @name: (nullable): the name\n * @count: (array length=n zero-terminated):\n *\n * Creates a widget.\n *\n * Returns: (transfer full): a new widget\n * Since: 1.2\n */";
        assert_eq!(reparse(text), format!("{}\n", text));
    }

    #[test]
    fn test_section_and_tab_indentation() {
        let text = "\t/**\n\t * SECTION:widget\n\t *\n\t * Widgets.\n\t */";
        let written = reparse(text);
        assert_eq!(written, "\t/**\n\t * SECTION:widget\n\t *\n\t * Widgets.\n\t */\n");
    }

    #[test]
    fn test_tag_without_value_or_description() {
        let tag = CommentTag {
            name: "deprecated".to_string(),
            annotations: Annotations::default(),
            value: None,
            description: None,
            position: crate::position::SourcePosition::new("foo.c", 1),
        };
        assert_eq!(serialize_tag(&tag), vec!["Deprecated:".to_string()]);
    }

    #[test]
    fn test_most_common_prefers_first_on_tie() {
        let items = vec![" ".to_string(), "\t".to_string(), "\t".to_string(), " ".to_string()];
        assert_eq!(most_common(&items), Some(" "));
    }
}
