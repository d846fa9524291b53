//! GTK-Doc comment block parser
//!
//! The parser is lenient: malformed input produces diagnostics and, where
//! possible, a block that can still be written back without losing
//! information. Only comments that do not start with `/**` followed by an
//! identifier line are dropped.

use super::block::{AnnotationOptions, Annotations, CommentBlock, CommentParameter, CommentTag};
use super::vocab::{option_rules, AnnotatedPart, Annotation, Arity, Tag, ALL_TAGS};
use crate::diagnostic::{Diagnostics, WarningCode};
use crate::position::SourcePosition;
use crate::utils::capitalize;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static SECTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*SECTION\s*(?P<delimiter>:?)\s*(?P<section_name>\w\S+?)\s*:?\s*$").unwrap()
});

static SYMBOL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<symbol_name>[\w-]*\w)\s*(?P<delimiter>:?)\s*(?P<fields>.*?)\s*:?\s*$")
        .unwrap()
});

static PROPERTY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?P<class_name>\w+)\s*:\s*(?P<property_name>[\w-]*\w)\s*(?P<delimiter>:?)\s*(?P<fields>.*?)\s*:?\s*$",
    )
    .unwrap()
});

static SIGNAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?P<class_name>\w+)\s*:{2}\s*(?P<signal_name>[\w-]*\w)\s*(?P<delimiter>:?)\s*(?P<fields>.*?)\s*:?\s*$",
    )
    .unwrap()
});

static ACTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?P<class_name>\w+)\s*\|\s*(?P<action_name>[\w-]+\.[\w-]+)\s*(?P<delimiter>:?)\s*(?P<fields>.*?)\s*:?\s*$",
    )
    .unwrap()
});

static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?P<class_name>\w+)\s*\.\s*(?P<field_name>[\w-]*\w)\s*(?P<delimiter>:?)\s*(?P<fields>.*?)\s*:?\s*$",
    )
    .unwrap()
});

static PARAMETER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*@(?P<parameter_name>[\w-]*\w|.*?\.\.\.)\s*:\s*(?P<fields>.*?)\s*$").unwrap()
});

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    let names = ALL_TAGS
        .iter()
        .map(|t| t.as_str().replace(' ', r"\s"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r"(?i)^\s*(?P<tag_name>{})\s*:\s*(?P<fields>.*?)\s*$",
        names
    ))
    .unwrap()
});

static TAG_VALUE_VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<value>[0-9.]*)\s*(?P<delimiter>:?)\s*(?P<description>.*?)\s*$").unwrap()
});

static TAG_VALUE_STABILITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?P<value>(stable|unstable|private|internal)?)\s*(?P<delimiter>:?)\s*(?P<description>.*?)\s*$",
    )
    .unwrap()
});

/// A raw comment as delivered by the symbol stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawComment {
    /// Full comment text including `/**` and `*/`
    pub text: String,
    /// File the comment was found in
    pub filename: String,
    /// Line the comment starts on
    pub line: u32,
}

/// Comment blocks keyed by identifier
pub type CommentBlocks = BTreeMap<String, CommentBlock>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartKind {
    Identifier,
    Parameters,
    Description,
    Tags,
}

#[derive(Debug, Clone)]
enum CurrentPart {
    Param(String),
    Tag(String),
}

struct ParsedAnnotations {
    annotations: Annotations,
    changed: bool,
    end_pos: usize,
}

struct ParsedFields {
    annotations: Annotations,
    changed: bool,
    description: String,
}

/// Position of the first `/**` not followed by `*` or `/`
fn find_start_token(line: &str) -> Option<usize> {
    line.match_indices("/**").map(|(i, _)| i).find(|&i| {
        !matches!(line.as_bytes().get(i + 3), Some(b'*') | Some(b'/'))
    })
}

/// Split a line at the first `*/`: (comment, comment end, code)
fn split_end_token(line: &str) -> Option<(&str, usize, &str)> {
    let slash = line.find("*/")?;
    let bytes = line.as_bytes();
    let mut token_start = slash;
    while token_start > 0 && bytes[token_start - 1] == b'*' {
        token_start -= 1;
    }
    let comment = line[..token_start].trim();
    let comment_end = line[..token_start].trim_end().len();
    let code = line[slash + 2..].trim_end();
    Some((comment, comment_end, code))
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

fn is_empty_line(line: &str) -> bool {
    line.trim().is_empty()
}

/// Parser for GTK-Doc comment blocks
pub struct CommentBlockParser<'a> {
    diagnostics: &'a mut Diagnostics,
}

impl<'a> CommentBlockParser<'a> {
    /// Create a parser reporting into `diagnostics`
    pub fn new(diagnostics: &'a mut Diagnostics) -> Self {
        CommentBlockParser { diagnostics }
    }

    /// Parse many comments; a later block for the same identifier wins
    pub fn parse_comment_blocks(&mut self, comments: &[RawComment]) -> CommentBlocks {
        let mut blocks = CommentBlocks::new();
        for comment in comments {
            let Some(block) =
                self.parse_comment_block(&comment.text, &comment.filename, comment.line)
            else {
                continue;
            };
            if let Some(first) = blocks.get(&block.name) {
                let message = format!(
                    "multiple comment blocks documenting '{}:' identifier (already seen at {}).",
                    block.name, first.position
                );
                self.diagnostics
                    .warn(WarningCode::DuplicateBlock, message, Some(&block.position));
            }
            blocks.insert(block.name.clone(), block);
        }
        tracing::debug!(comments = comments.len(), blocks = blocks.len(), "parsed comment blocks");
        blocks
    }

    /// Parse a single comment including its `/**` and `*/` tokens
    pub fn parse_comment_block(
        &mut self,
        comment: &str,
        filename: &str,
        lineno: u32,
    ) -> Option<CommentBlock> {
        let block_position = SourcePosition::new(filename, lineno);
        let normalized = comment.replace("\r\n", "\n").replace('\r', "\n");
        let mut lines: Vec<String> = normalized.split('\n').map(str::to_string).collect();
        let line_count = lines.len() as u32;
        let at = |line: u32, column: usize| {
            SourcePosition::with_column(filename, line, column as u32 + 1)
        };

        let first = lines[0].clone();
        let start = find_start_token(&first)?;
        let code_before = first[..start].trim_end().to_string();
        if line_count == 1 {
            self.diagnostics.error(
                "Skipping invalid GTK-Doc comment block:",
                Some(&at(lineno, code_before.len())),
            );
            return None;
        }
        let after_start = &first[start + 3..];
        let start_comment = after_start.trim();
        if !code_before.is_empty() {
            self.diagnostics.warn(
                WarningCode::CodeInComment,
                "GTK-Doc comment block start token \"/**\" should not be preceded by code:",
                Some(&at(lineno, code_before.len())),
            );
        }
        if !start_comment.is_empty() {
            let column = start + 3 + leading_whitespace(after_start).len();
            self.diagnostics.warn(
                WarningCode::InvalidCommentBlock,
                "GTK-Doc comment block start token \"/**\" should not be followed by comment text:",
                Some(&at(lineno, column)),
            );
            lines[0] = start_comment.to_string();
        } else {
            lines.remove(0);
        }

        let last = lines.last()?.clone();
        let end_line = lineno + line_count - 1;
        let Some((end_comment, end_comment_len, code_after)) = split_end_token(&last) else {
            self.diagnostics.error(
                "Skipping invalid GTK-Doc comment block: missing end token \"*/\"",
                Some(&at(end_line, last.trim_end().len())),
            );
            return None;
        };
        if !code_after.is_empty() {
            self.diagnostics.warn(
                WarningCode::CodeInComment,
                "GTK-Doc comment block end token \"*/\" should not be followed by code:",
                Some(&at(end_line, last.trim_end().len())),
            );
        }
        let code_after = code_after.to_string();
        if !end_comment.is_empty() {
            self.diagnostics.warn(
                WarningCode::InvalidCommentBlock,
                "GTK-Doc comment block end token \"*/\" should not be preceded by comment text:",
                Some(&at(end_line, end_comment_len)),
            );
            let replacement = end_comment.to_string();
            if let Some(slot) = lines.last_mut() {
                *slot = replacement;
            }
        } else {
            lines.pop();
        }

        let mut block: Option<CommentBlock> = None;
        let mut identifier_warned = false;
        let mut block_indent = Vec::with_capacity(lines.len());
        let mut part_indent = 0usize;
        let mut in_part: Option<PartKind> = None;
        let mut current: Option<CurrentPart> = None;
        let mut returns_seen = false;
        let mut lineno = lineno;

        for original_line in &lines {
            lineno += 1;
            let position = SourcePosition::new(filename, lineno);
            let mut line: &str = original_line;
            let mut column_offset = 0usize;

            block_indent.push(leading_whitespace(line).to_string());

            if let Some(star) = line.find('*') {
                let stray = line[..star].trim();
                if !stray.is_empty() {
                    let column = leading_whitespace(line).len();
                    self.diagnostics.coded_error(
                        WarningCode::InvalidCommentText,
                        "invalid comment text:",
                        Some(&at(lineno, column)),
                    );
                }
                let mut end = star + 1;
                if let Some(c) = line[end..].chars().next() {
                    if c.is_whitespace() {
                        end += c.len_utf8();
                    }
                }
                column_offset = end;
                line = &line[end..];
            }

            let line_indent = leading_whitespace(line).replace('\t', "  ").len();

            if block.is_none() {
                match self.parse_identifier(&position, column_offset, line, filename, lineno) {
                    Some(mut found) => {
                        found.position = block_position.clone();
                        found.code_before = Some(code_before.clone()).filter(|c| !c.is_empty());
                        found.code_after = Some(code_after.clone()).filter(|c| !c.is_empty());
                        block = Some(found);
                        in_part = Some(PartKind::Identifier);
                        part_indent = line_indent;
                    }
                    None => {
                        if !identifier_warned {
                            identifier_warned = true;
                            self.diagnostics.coded_error(
                                WarningCode::MissingIdentifier,
                                "identifier not found on the first line:",
                                Some(&at(lineno, column_offset)),
                            );
                        }
                    }
                }
                continue;
            }
            let Some(block) = block.as_mut() else {
                continue;
            };

            if let Some(caps) = PARAMETER_RE.captures(line) {
                part_indent = line_indent;
                let name_match = caps.name("parameter_name").map(|m| (m.as_str(), m.start()));
                let Some((raw_name, name_start)) = name_match else {
                    continue;
                };
                let fields_match = caps.name("fields").map(|m| (m.as_str(), m.start()));
                let (fields, fields_start) = fields_match.unwrap_or(("", 0));
                let marker = at(lineno, name_start + column_offset);
                let mut param_name = raw_name.to_string();

                if !matches!(in_part, Some(PartKind::Identifier) | Some(PartKind::Parameters)) {
                    self.diagnostics.warn(
                        WarningCode::InvalidCommentBlock,
                        format!("\"@{}\" parameter unexpected at this location:", param_name),
                        Some(&marker),
                    );
                }
                in_part = Some(PartKind::Parameters);

                if param_name.to_lowercase() == "returns" {
                    self.insert_returns(
                        block,
                        &mut returns_seen,
                        "\"Returns\" parameters or tags",
                        &position,
                        column_offset + fields_start,
                        fields,
                    );
                    current = Some(CurrentPart::Tag("returns".to_string()));
                    continue;
                } else if param_name == "Varargs"
                    || (param_name.ends_with("...") && param_name != "...")
                {
                    self.diagnostics.warn(
                        WarningCode::VarargsParameter,
                        format!(
                            "\"@{}\" parameter is deprecated, please use \"@...\" instead:",
                            param_name
                        ),
                        Some(&marker),
                    );
                    param_name = "...".to_string();
                }

                if block.params.contains(&param_name) {
                    self.diagnostics.coded_error(
                        WarningCode::DuplicateParameter,
                        format!(
                            "multiple \"@{}\" parameters for identifier \"{}\":",
                            param_name, block.name
                        ),
                        Some(&marker),
                    );
                }

                let mut parameter = CommentParameter {
                    name: param_name.clone(),
                    annotations: Annotations::default(),
                    description: None,
                    position: position.clone(),
                };
                if !fields.is_empty() {
                    if let Some(parsed) = self.parse_fields(
                        &position,
                        column_offset + fields_start,
                        fields,
                        None,
                        true,
                    ) {
                        parameter.annotations = parsed.annotations;
                        parameter.description = Some(parsed.description);
                    }
                }
                block.params.insert(param_name.clone(), parameter);
                current = Some(CurrentPart::Param(param_name));
                continue;
            }

            if is_empty_line(line)
                && matches!(in_part, Some(PartKind::Identifier) | Some(PartKind::Parameters))
            {
                in_part = Some(PartKind::Description);
                part_indent = line_indent;
                continue;
            }

            if let Some(caps) = TAG_RE.captures(line).filter(|_| line_indent <= part_indent) {
                part_indent = line_indent;
                let (tag_name, tag_start) = caps
                    .name("tag_name")
                    .map(|m| (m.as_str().to_string(), m.start()))
                    .unwrap_or_default();
                let (tag_fields, fields_start) = caps
                    .name("fields")
                    .map(|m| (m.as_str().to_string(), m.start()))
                    .unwrap_or_default();
                let marker = at(lineno, tag_start + column_offset);
                let Some(tag) = Tag::from_name(&tag_name) else {
                    continue;
                };

                if tag.is_annotation_tag() {
                    self.diagnostics.warn(
                        WarningCode::DeprecatedSyntax,
                        format!(
                            "GObject-Introspection specific GTK-Doc tag \"{}\" has been deprecated, \
                             please use annotations on the identifier instead:",
                            tag_name
                        ),
                        Some(&marker),
                    );
                    let ann_name = tag.as_str().replace(' ', "-");
                    if tag == Tag::Attributes {
                        self.convert_attributes_tag(
                            block,
                            &position,
                            &marker,
                            column_offset + fields_start,
                            &ann_name,
                            &tag_fields,
                        );
                    } else if let Some((name, options)) = self.parse_annotation(
                        &position,
                        column_offset + fields_start,
                        &format!("{} {}", ann_name, tag_fields),
                    ) {
                        block.annotations.insert(name, options);
                    }
                    continue;
                } else if tag == Tag::Description {
                    self.diagnostics.warn(
                        WarningCode::DeprecatedSyntax,
                        "GTK-Doc tag \"Description:\" has been deprecated:",
                        Some(&marker),
                    );
                    in_part = Some(PartKind::Description);
                    append_line(&mut block.description, &tag_fields);
                    continue;
                }

                let no_description = block.description.as_deref().map_or(true, str::is_empty);
                if in_part == Some(PartKind::Description)
                    || (in_part == Some(PartKind::Parameters) && no_description)
                    || (in_part == Some(PartKind::Identifier)
                        && block.params.is_empty()
                        && no_description)
                {
                    in_part = Some(PartKind::Tags);
                }
                if in_part != Some(PartKind::Tags) {
                    in_part = Some(PartKind::Tags);
                    self.diagnostics.warn(
                        WarningCode::InvalidCommentBlock,
                        format!("\"{}:\" tag unexpected at this location:", tag_name),
                        Some(&marker),
                    );
                }

                if tag.is_returns() {
                    self.insert_returns(
                        block,
                        &mut returns_seen,
                        "return value parameters or tags",
                        &position,
                        column_offset + fields_start,
                        &tag_fields,
                    );
                    current = Some(CurrentPart::Tag("returns".to_string()));
                    continue;
                }

                let key = tag.as_str().to_string();
                if block.tags.contains(&key) {
                    self.diagnostics.coded_error(
                        WarningCode::DuplicateTag,
                        format!(
                            "multiple \"{}:\" tags for identifier \"{}\":",
                            tag_name, block.name
                        ),
                        Some(&marker),
                    );
                }
                let mut part = CommentTag {
                    name: key.clone(),
                    annotations: Annotations::default(),
                    value: None,
                    description: None,
                    position: position.clone(),
                };
                if !tag_fields.is_empty() {
                    if let Some(parsed) = self.parse_fields(
                        &position,
                        column_offset + fields_start,
                        &tag_fields,
                        None,
                        true,
                    ) {
                        if !parsed.annotations.is_empty() {
                            self.diagnostics.coded_error(
                                WarningCode::UnexpectedAnnotation,
                                format!("annotations not supported for tag \"{}:\".", tag_name),
                                Some(&position),
                            );
                        }
                        self.fill_tag_value(&mut part, tag, parsed.description, &marker);
                    }
                }
                block.tags.insert(key.clone(), part);
                current = Some(CurrentPart::Tag(key));
                continue;
            }

            let line = if is_empty_line(line) { line } else { line.trim_end() };

            match in_part {
                Some(PartKind::Identifier) | Some(PartKind::Description) => {
                    if in_part == Some(PartKind::Identifier)
                        && block.description.as_deref().map_or(true, str::is_empty)
                    {
                        if let Some(parsed) = self.parse_annotations(
                            &position,
                            column_offset,
                            line,
                            Some(&block.annotations),
                        ) {
                            if parsed.changed {
                                block.annotations = parsed.annotations;
                                continue;
                            }
                        }
                    }
                    append_line(&mut block.description, line);
                }
                Some(PartKind::Parameters) | Some(PartKind::Tags) => {
                    let part = match &current {
                        Some(CurrentPart::Param(name)) => block
                            .params
                            .get_mut(name)
                            .map(|p| (&mut p.annotations, &mut p.description)),
                        Some(CurrentPart::Tag(name)) => block
                            .tags
                            .get_mut(name)
                            .map(|t| (&mut t.annotations, &mut t.description)),
                        None => None,
                    };
                    let Some((annotations, description)) = part else {
                        continue;
                    };
                    if description.as_deref().map_or(true, str::is_empty) {
                        let existing = annotations.clone();
                        if let Some(parsed) =
                            self.parse_fields(&position, column_offset, line, Some(&existing), true)
                        {
                            if parsed.changed {
                                *annotations = parsed.annotations;
                                *description = Some(parsed.description);
                                continue;
                            }
                        }
                    }
                    append_line(description, line);
                }
                None => {}
            }
        }

        let mut block = block?;
        if let Some(description) = block.description.as_mut() {
            *description = description.trim().to_string();
        }
        for tag in block.tags.values_mut() {
            clean_description(&mut tag.description);
        }
        for param in block.params.values_mut() {
            clean_description(&mut param.description);
        }
        block.indentation = block_indent;
        self.validate_block(&block);
        Some(block)
    }

    /// Record the `Returns` part, given as `@returns:` or `Returns:`
    fn insert_returns(
        &mut self,
        block: &mut CommentBlock,
        seen: &mut bool,
        duplicate: &str,
        position: &SourcePosition,
        column: usize,
        fields: &str,
    ) {
        if *seen {
            self.diagnostics.error(
                format!("encountered multiple {} for \"{}\".", duplicate, block.name),
                Some(position),
            );
        }
        *seen = true;
        let mut tag = CommentTag {
            name: "returns".to_string(),
            annotations: Annotations::default(),
            value: None,
            description: None,
            position: position.clone(),
        };
        if !fields.is_empty() {
            if let Some(parsed) = self.parse_fields(position, column, fields, None, true) {
                tag.annotations = parsed.annotations;
                tag.description = Some(parsed.description);
            }
        }
        block.tags.insert("returns", tag);
    }

    /// Match the identifier line in its fixed precedence
    fn parse_identifier(
        &mut self,
        position: &SourcePosition,
        column_offset: usize,
        line: &str,
        filename: &str,
        lineno: u32,
    ) -> Option<CommentBlock> {
        if let Some(caps) = SECTION_RE.captures(line) {
            let name = format!("SECTION:{}", &caps["section_name"]);
            return Some(CommentBlock::new(name, position.clone()));
        }

        let (name, caps) = if let Some(c) = PROPERTY_RE.captures(line) {
            (format!("{}:{}", &c["class_name"], &c["property_name"]), c)
        } else if let Some(c) = SIGNAL_RE.captures(line) {
            (format!("{}::{}", &c["class_name"], &c["signal_name"]), c)
        } else if let Some(c) = ACTION_RE.captures(line) {
            let name = format!("ACTION:{}:{}", &c["class_name"], &c["action_name"]);
            return Some(CommentBlock::new(name, position.clone()));
        } else if let Some(c) = FIELD_RE.captures(line) {
            (format!("{}.{}", &c["class_name"], &c["field_name"]), c)
        } else {
            let c = SYMBOL_RE.captures(line)?;
            (c["symbol_name"].to_string(), c)
        };

        let mut block = CommentBlock::new(name, position.clone());
        let fields = caps.name("fields").map(|m| (m.as_str(), m.start()));
        let delimiter = caps.name("delimiter").map(|m| (m.as_str(), m.start()));
        if let Some((fields, fields_start)) = fields.filter(|(f, _)| !f.is_empty()) {
            let Some(parsed) =
                self.parse_annotations(position, column_offset + fields_start, fields, None)
            else {
                return Some(block);
            };
            if !fields[parsed.end_pos..].trim().is_empty() {
                return None;
            }
            if let Some((delimiter, delimiter_start)) = delimiter {
                if delimiter.is_empty() && !parsed.annotations.is_empty() {
                    let marker = column_offset + delimiter_start;
                    self.diagnostics.warn(
                        WarningCode::MissingColon,
                        format!("missing \":\" at column {}:", marker + 1),
                        Some(&SourcePosition::with_column(
                            filename,
                            lineno,
                            marker as u32 + 1,
                        )),
                    );
                }
            }
            block.annotations = parsed.annotations;
        }
        Some(block)
    }

    /// Translate a deprecated `Attributes:` tag into an `(attributes)` annotation
    fn convert_attributes_tag(
        &mut self,
        block: &mut CommentBlock,
        position: &SourcePosition,
        marker: &SourcePosition,
        column: usize,
        ann_name: &str,
        fields: &str,
    ) {
        let Some((raw, _)) = self.scan_annotations(position, column, fields.trim()) else {
            return;
        };
        let mut transformed = String::new();
        for (_, annotation) in raw {
            let options = self.parse_options_list(position, column, Some(&annotation));
            match options.as_slice() {
                [key] => {
                    transformed.push(' ');
                    transformed.push_str(key);
                }
                [key, value] => {
                    transformed.push_str(&format!(" {}={}", key, value));
                }
                _ => {
                    self.diagnostics.error(
                        "malformed \"Attributes:\" tag will be ignored:",
                        Some(marker),
                    );
                    return;
                }
            }
        }
        if transformed.is_empty() {
            return;
        }
        let source = format!("{} {}", ann_name, transformed.trim());
        let Some((name, options)) = self.parse_annotation(position, column, &source) else {
            return;
        };
        if block
            .annotations
            .get(Annotation::Attributes)
            .map_or(false, |o| !o.is_empty())
        {
            self.diagnostics.error(
                "Duplicate \"Attributes:\" annotation will be ignored:",
                Some(marker),
            );
        } else {
            block.annotations.insert(name, options);
        }
    }

    /// Split `Since:`/`Deprecated:`/`Stability:` fields into value and description
    fn fill_tag_value(
        &mut self,
        part: &mut CommentTag,
        tag: Tag,
        fields: String,
        marker: &SourcePosition,
    ) {
        match tag {
            Tag::Deprecated | Tag::Since => {
                if let Some(caps) = TAG_VALUE_VERSION_RE.captures(&fields) {
                    part.value = Some(caps["value"].to_string());
                    part.description = Some(caps["description"].to_string());
                    return;
                }
            }
            Tag::Stability => {
                if let Some(caps) = TAG_VALUE_STABILITY_RE.captures(&fields) {
                    let value = capitalize(&caps["value"]);
                    if value.is_empty() && !fields.trim().is_empty() {
                        self.diagnostics.warn(
                            WarningCode::InvalidTagValue,
                            format!(
                                "invalid \"Stability:\" value \"{}\", expected one of Stable, Unstable, Private, Internal",
                                fields.trim()
                            ),
                            Some(marker),
                        );
                    }
                    part.value = Some(value);
                    part.description = Some(caps["description"].to_string());
                    return;
                }
            }
            _ => {}
        }
        part.description = Some(fields);
    }

    /// Collect the raw text of each top-level `( ... )` group
    ///
    /// Returns the groups with their start offsets and the offset just past
    /// the last closing parenthesis. Scanning stops at the first non-space
    /// character outside parentheses.
    fn scan_annotations(
        &mut self,
        position: &SourcePosition,
        column: usize,
        fields: &str,
    ) -> Option<(Vec<(usize, String)>, usize)> {
        let mut groups = Vec::new();
        let mut level = 0i32;
        let mut prev = '\0';
        let mut buffer = String::new();
        let mut start_pos = 0usize;
        let mut end_pos = 0usize;
        let mut last = 0usize;
        let error_at =
            |column: usize| SourcePosition::with_column(&position.filename, position.line, column as u32 + 1);

        for (i, c) in fields.char_indices() {
            last = i;
            if c == '(' {
                level += 1;
                if level == 1 {
                    start_pos = i;
                }
                if prev == '(' {
                    self.diagnostics.coded_error(
                        WarningCode::MalformedAnnotation,
                        "unexpected parentheses, annotations will be ignored:",
                        Some(&error_at(column + i)),
                    );
                    return None;
                } else if level > 1 {
                    buffer.push(c);
                }
            } else if c == ')' {
                level -= 1;
                if prev == '(' {
                    self.diagnostics.coded_error(
                        WarningCode::MalformedAnnotation,
                        "unexpected parentheses, annotations will be ignored:",
                        Some(&error_at(column + i)),
                    );
                    return None;
                } else if level < 0 {
                    self.diagnostics.coded_error(
                        WarningCode::MalformedAnnotation,
                        "unbalanced parentheses, annotations will be ignored:",
                        Some(&error_at(column + i)),
                    );
                    return None;
                } else if level == 0 {
                    end_pos = i + 1;
                    groups.push((start_pos, buffer.trim().to_string()));
                    buffer.clear();
                } else {
                    buffer.push(c);
                }
            } else if c.is_whitespace() {
                if level > 0 {
                    buffer.push(c);
                }
            } else if level == 0 {
                break;
            } else {
                buffer.push(c);
            }
            prev = c;
        }

        if level > 0 {
            self.diagnostics.coded_error(
                WarningCode::MalformedAnnotation,
                "unbalanced parentheses, annotations will be ignored:",
                Some(&error_at(column + last)),
            );
            return None;
        }
        Some((groups, end_pos))
    }

    /// Parse leading annotations of `fields`, extending `existing` if given
    fn parse_annotations(
        &mut self,
        position: &SourcePosition,
        column: usize,
        fields: &str,
        existing: Option<&Annotations>,
    ) -> Option<ParsedAnnotations> {
        let (groups, end_pos) = self.scan_annotations(position, column, fields)?;
        let mut annotations = existing
            .cloned()
            .unwrap_or_else(|| Annotations::at(position.clone()));
        let mut changed = false;
        for (start, raw) in groups {
            let Some((name, options)) = self.parse_annotation(position, column + start, &raw) else {
                continue;
            };
            if annotations.contains_raw(&name) {
                self.diagnostics.coded_error(
                    WarningCode::MalformedAnnotation,
                    format!("multiple \"{}\" annotations:", name),
                    Some(position),
                );
            }
            annotations.insert(name, options);
            changed = true;
        }
        Some(ParsedAnnotations {
            annotations,
            changed,
            end_pos,
        })
    }

    /// Parse annotations followed by `: description`
    fn parse_fields(
        &mut self,
        position: &SourcePosition,
        column: usize,
        fields: &str,
        existing: Option<&Annotations>,
        validate_description: bool,
    ) -> Option<ParsedFields> {
        let parsed = self.parse_annotations(position, column, fields, existing)?;
        let mut description = fields[parsed.end_pos..].trim().to_string();
        if !description.is_empty() && validate_description {
            if let Some(rest) = description.strip_prefix(':') {
                description = rest.to_string();
            } else if parsed.end_pos > 0 {
                let marker = column + parsed.end_pos;
                self.diagnostics.warn(
                    WarningCode::MissingColon,
                    format!("missing \":\" at column {}:", marker + 1),
                    Some(&SourcePosition::with_column(
                        &position.filename,
                        position.line,
                        marker as u32 + 1,
                    )),
                );
            }
        }
        Some(ParsedFields {
            annotations: parsed.annotations,
            changed: parsed.changed,
            description,
        })
    }

    /// Parse `name options...` into a name and its options
    fn parse_annotation(
        &mut self,
        position: &SourcePosition,
        column: usize,
        annotation: &str,
    ) -> Option<(String, AnnotationOptions)> {
        let annotation = annotation.replace('<', "(").replace('>', ")");
        let (name, options) = match annotation.split_once(' ') {
            Some((name, options)) => (name.to_lowercase(), Some(options.to_string())),
            None => (annotation.to_lowercase(), None),
        };
        let marker =
            SourcePosition::with_column(&position.filename, position.line, column as u32 + 1);
        let mut name = name;
        let mut options = options;

        if name == Annotation::InOutAlt.as_str() {
            self.diagnostics.warn(
                WarningCode::DeprecatedSyntax,
                format!(
                    "\"{}\" annotation has been deprecated, please use \"{}\" instead:",
                    Annotation::InOutAlt.as_str(),
                    Annotation::InOut.as_str()
                ),
                Some(&marker),
            );
            name = Annotation::InOut.as_str().to_string();
        } else if name == Annotation::Attribute.as_str() {
            self.diagnostics.warn(
                WarningCode::DeprecatedSyntax,
                format!(
                    "\"{}\" annotation has been deprecated, please use \"{}\" instead:",
                    Annotation::Attribute.as_str(),
                    Annotation::Attributes.as_str()
                ),
                Some(&marker),
            );
            name = Annotation::Attributes.as_str().to_string();
            let list = self.parse_options_list(position, column, options.as_deref());
            options = match list.as_slice() {
                [key] => Some(key.clone()),
                [key, value] => Some(format!("{}={}", key, value)),
                _ => {
                    self.diagnostics.error(
                        "malformed \"(attribute)\" annotation will be ignored:",
                        Some(&marker),
                    );
                    return None;
                }
            };
        }

        let column = column + name.len() + 2;
        let parsed = match Annotation::from_name(&name) {
            Some(known) if known.takes_dict() => parse_options_dict(options.as_deref()),
            Some(_) => AnnotationOptions::List(self.parse_options_list(
                position,
                column,
                options.as_deref(),
            )),
            None => AnnotationOptions::List(
                options
                    .as_deref()
                    .filter(|o| !o.is_empty())
                    .map(|o| vec![o.trim().to_string()])
                    .unwrap_or_default(),
            ),
        };
        Some((name, parsed))
    }

    /// Space separated options; `key=value` text is kept as one item
    fn parse_options_list(
        &mut self,
        position: &SourcePosition,
        column: usize,
        options: Option<&str>,
    ) -> Vec<String> {
        let Some(options) = options.filter(|o| !o.is_empty()) else {
            return Vec::new();
        };
        if let Some(eq) = options.find('=') {
            self.diagnostics.warn(
                WarningCode::InvalidAnnotationOptions,
                "invalid annotation options: expected a \"list\" but received \"key=value pairs\":",
                Some(&SourcePosition::with_column(
                    &position.filename,
                    position.line,
                    (column + eq) as u32 + 1,
                )),
            );
            return vec![options.trim().to_string()];
        }
        options.split(' ').map(str::to_string).collect()
    }

    fn validate_block(&mut self, block: &CommentBlock) {
        self.validate(&block.annotations, AnnotatedPart::Identifier);
        for param in block.params.values() {
            self.validate(&param.annotations, AnnotatedPart::Parameter);
        }
        for tag in block.tags.values() {
            self.validate(&tag.annotations, AnnotatedPart::Tag);
        }
    }

    /// Check annotation names, option counts, choices and conflicts
    fn validate(&mut self, annotations: &Annotations, part: AnnotatedPart) {
        let position = annotations.position.as_ref();
        for (name, options) in annotations.iter() {
            match Annotation::from_name(name) {
                Some(known) if part.valid_annotations().contains(&known) => {
                    self.validate_options(position, known, options);
                }
                Some(_) => self.diagnostics.warn(
                    WarningCode::UnexpectedAnnotation,
                    format!("unexpected annotation: {}", name),
                    position,
                ),
                None => self.diagnostics.warn(
                    WarningCode::UnknownAnnotation,
                    format!("unknown annotation: {}", name),
                    position,
                ),
            }

            if name != Annotation::Not.as_str() {
                continue;
            }
            if options.contains("nullable") {
                for other in [Annotation::Nullable, Annotation::AllowNone] {
                    if annotations.has(other) {
                        self.diagnostics.warn(
                            WarningCode::ConflictingAnnotations,
                            format!(
                                "cannot have both \"not nullable\" and \"{}\" present",
                                other.as_str()
                            ),
                            position,
                        );
                    }
                }
            }
            if options.contains("optional") && annotations.has(Annotation::Optional) {
                self.diagnostics.warn(
                    WarningCode::ConflictingAnnotations,
                    "cannot have both \"not optional\" and \"optional\" present",
                    position,
                );
            }
        }
    }

    fn validate_options(
        &mut self,
        position: Option<&SourcePosition>,
        annotation: Annotation,
        options: &AnnotationOptions,
    ) {
        let name = annotation.as_str();
        if annotation == Annotation::Array {
            for (key, value) in options.pairs() {
                let message = match key.as_str() {
                    "fixed-size" => match value {
                        None => Some(format!("\"{}\" annotation option \"{}\" needs a value", name, key)),
                        Some(v) if v.parse::<i64>().is_err() => Some(format!(
                            "invalid \"{}\" annotation option \"{}\" value \"{}\", must be an integer",
                            name, key, v
                        )),
                        Some(_) => None,
                    },
                    "zero-terminated" => value.as_ref().filter(|v| *v != "0" && *v != "1").map(|v| {
                        format!(
                            "invalid \"{}\" annotation option \"{}\" value \"{}\", must be 0 or 1",
                            name, key, v
                        )
                    }),
                    "length" => value
                        .is_none()
                        .then(|| format!("\"{}\" annotation option \"length\" needs a value", name)),
                    _ => Some(format!("invalid \"{}\" annotation option: \"{}\"", name, key)),
                };
                if let Some(message) = message {
                    self.diagnostics
                        .warn(WarningCode::InvalidAnnotationOptions, message, position);
                }
            }
            return;
        }

        let (arity, choices) = option_rules(annotation);
        let count = options.len();
        let given = if count == 0 {
            "none".to_string()
        } else {
            count.to_string()
        };
        let expected = |n: usize| match n {
            0 => "no options".to_string(),
            1 => "one option".to_string(),
            n => format!("{} options", n),
        };
        let mut failures = Vec::new();
        match arity {
            Arity::Exact(n) if count != n => failures.push(("needs", n)),
            Arity::AtMost(n) if count > n => failures.push(("takes at most", n)),
            Arity::Between(min, max) => {
                if count < min {
                    failures.push(("takes at least", min));
                }
                if count > max {
                    failures.push(("takes at most", max));
                }
            }
            _ => {}
        }
        for (verb, n) in failures {
            self.diagnostics.warn(
                WarningCode::InvalidAnnotationOptions,
                format!("\"{}\" annotation {} {}, {} given", name, verb, expected(n), given),
                position,
            );
        }
        if let (Some(choices), Some(first)) = (choices, options.first()) {
            if !choices.contains(&first) {
                self.diagnostics.warn(
                    WarningCode::InvalidAnnotationOptions,
                    format!("invalid \"{}\" annotation option: \"{}\"", name, first),
                    position,
                );
            }
        }
    }
}

/// `key[=value]` options split on single spaces
fn parse_options_dict(options: Option<&str>) -> AnnotationOptions {
    let mut parsed: Vec<(String, Option<String>)> = Vec::new();
    if let Some(options) = options.filter(|o| !o.is_empty()) {
        for item in options.split(' ') {
            let (key, value) = match item.split_once('=') {
                Some((key, value)) => (key.to_string(), Some(value.to_string())),
                None => (item.to_string(), None),
            };
            match parsed.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => parsed.push((key, value)),
            }
        }
    }
    AnnotationOptions::Dict(parsed)
}

fn append_line(description: &mut Option<String>, line: &str) {
    match description {
        None => *description = Some(line.to_string()),
        Some(text) => {
            text.push('\n');
            text.push_str(line);
        }
    }
}

/// Whitespace-only becomes `None`; a leading blank line keeps the layout
fn clean_description(description: &mut Option<String>) {
    let Some(text) = description.as_ref() else {
        return;
    };
    if text.is_empty() {
        return;
    }
    if text.trim().is_empty() {
        *description = None;
    } else if is_empty_line(text.split('\n').next().unwrap_or("")) {
        *description = Some(text.trim_end().to_string());
    } else {
        *description = Some(text.trim().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::WarningConfig;

    fn parse(text: &str) -> (Option<CommentBlock>, Diagnostics) {
        let mut diag = Diagnostics::new(WarningConfig::all());
        let block = CommentBlockParser::new(&mut diag).parse_comment_block(text, "foo.c", 10);
        (block, diag)
    }

    #[test]
    fn test_basic_function_block() {
        let (block, diag) = parse(
            "/**\n * foo_widget_new:\n * @name: (nullable): the name\n * @flags: flags\n *\n * Creates a widget.\n *\n * Returns: (transfer full): a new widget\n * Since: 1.2\n */",
        );
        let block = block.unwrap();
        assert_eq!(block.name, "foo_widget_new");
        assert_eq!(block.params.len(), 2);
        let name = block.param("name").unwrap();
        assert!(name.annotations.has(Annotation::Nullable));
        assert_eq!(name.description.as_deref(), Some("the name"));
        assert_eq!(block.description.as_deref(), Some("Creates a widget."));
        let returns = block.tag("returns").unwrap();
        assert_eq!(returns.annotations.first(Annotation::Transfer), Some("full"));
        assert_eq!(returns.description.as_deref(), Some("a new widget"));
        assert_eq!(block.tag("since").unwrap().value.as_deref(), Some("1.2"));
        assert_eq!(diag.warning_count(), 0);
        assert_eq!(diag.error_count(), 0);
    }

    #[test]
    fn test_identifier_kinds() {
        let cases = [
            ("SECTION:gtkwidget", "SECTION:gtkwidget"),
            ("GtkWidget:visible:", "GtkWidget:visible"),
            ("GtkWidget::destroy:", "GtkWidget::destroy"),
            ("GtkWidget|win.close:", "ACTION:GtkWidget:win.close"),
            ("GtkWidget.parent:", "GtkWidget.parent"),
            ("gtk_init:", "gtk_init"),
        ];
        for (line, expected) in cases {
            let (block, _) = parse(&format!("/**\n * {}\n */", line));
            assert_eq!(block.unwrap().name, expected, "identifier line {:?}", line);
        }
    }

    #[test]
    fn test_skip_with_empty_description() {
        let (block, _) = parse("/**\n * foo_bar:\n * @length: (skip):\n */");
        let block = block.unwrap();
        let length = block.param("length").unwrap();
        assert!(length.annotations.has(Annotation::Skip));
        assert_eq!(length.description.as_deref().unwrap_or(""), "");
    }

    #[test]
    fn test_single_line_comment_rejected() {
        let (block, diag) = parse("/** foo_bar: nope */");
        assert!(block.is_none());
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn test_missing_end_token_is_an_error() {
        let (block, diag) = parse("/**\n * foo_bar:\n * Bars.");
        assert!(block.is_none());
        assert_eq!(diag.error_count(), 1);
        let entry = diag.entries().iter().find(|d| d.message.contains("missing end token")).unwrap();
        assert_eq!(entry.position.as_ref().map(|p| p.line), Some(12));
    }

    #[test]
    fn test_start_token_must_not_close() {
        let (block, diag) = parse("/**/\n * foo_bar:\n */");
        assert!(block.is_none());
        assert_eq!(diag.error_count(), 0);
    }

    #[test]
    fn test_code_around_tokens_is_kept() {
        let (block, diag) = parse("int x; /**\n * foo_bar:\n */ int y;");
        let block = block.unwrap();
        assert_eq!(block.code_before.as_deref(), Some("int x;"));
        assert_eq!(block.code_after.as_deref(), Some(" int y;"));
        assert!(diag.has_code(WarningCode::CodeInComment));
    }

    #[test]
    fn test_varargs_and_returns_parameters() {
        let (block, diag) = parse(
            "/**\n * foo_printf:\n * @format: a format\n * @Varargs: the args\n * @returns: nothing\n */",
        );
        let block = block.unwrap();
        assert!(block.param("...").is_some());
        assert!(block.tag("returns").is_some());
        assert!(block.param("returns").is_none());
        assert!(diag.has_code(WarningCode::VarargsParameter));
    }

    #[test]
    fn test_returns_given_twice() {
        let (block, diag) = parse("/**\n * foo_bar:\n * @returns: first\n *\n * Returns: (transfer full): second\n */");
        let returns = block.unwrap().tag("returns").cloned().unwrap();
        assert_eq!(returns.description.as_deref(), Some("second"));
        assert_eq!(returns.annotations.first(Annotation::Transfer), Some("full"));
        assert_eq!(diag.error_count(), 1);
        assert!(diag
            .entries()
            .iter()
            .any(|d| d.message.contains("multiple return value parameters or tags")));
    }

    #[test]
    fn test_duplicate_parameters_and_tags() {
        let (block, diag) = parse(
            "/**\n * foo_bar:\n * @a: one\n * @a: two\n *\n * Since: 1.0\n * Since: 2.0\n */",
        );
        let block = block.unwrap();
        assert_eq!(block.param("a").unwrap().description.as_deref(), Some("two"));
        assert_eq!(block.tag("since").unwrap().value.as_deref(), Some("2.0"));
        assert!(diag.has_code(WarningCode::DuplicateParameter));
        assert!(diag.has_code(WarningCode::DuplicateTag));
    }

    #[test]
    fn test_deprecated_annotation_tags() {
        let (block, diag) = parse(
            "/**\n * foo_bar:\n *\n * Does things.\n *\n * Rename to: foo_baz\n * Attributes: (a b) (c)\n */",
        );
        let block = block.unwrap();
        assert_eq!(block.annotations.first(Annotation::RenameTo), Some("foo_baz"));
        let attributes = block.annotations.get(Annotation::Attributes).unwrap();
        assert_eq!(attributes.key("a"), Some(Some("b")));
        assert_eq!(attributes.key("c"), Some(None));
        assert!(diag.has_code(WarningCode::DeprecatedSyntax));
        assert!(block.tags.is_empty());
    }

    #[test]
    fn test_stability_value_is_capitalized() {
        let (block, _) = parse("/**\n * foo_bar:\n *\n * Stability: unstable: maybe later\n */");
        let block = block.unwrap();
        let tag = block.tag("stability").unwrap();
        assert_eq!(tag.value.as_deref(), Some("Unstable"));
        assert_eq!(tag.description.as_deref(), Some("maybe later"));
    }

    #[test]
    fn test_malformed_parentheses() {
        let (block, diag) = parse("/**\n * foo_bar:\n * @a: (transfer full: text\n */");
        let block = block.unwrap();
        assert!(block.param("a").unwrap().annotations.is_empty());
        assert!(diag.has_code(WarningCode::MalformedAnnotation));

        let (_, diag) = parse("/**\n * foo_bar:\n * @a: (()): text\n */");
        assert!(diag.has_code(WarningCode::MalformedAnnotation));
    }

    #[test]
    fn test_annotation_validation() {
        let (_, diag) = parse(
            "/**\n * foo_bar:\n * @a: (transfer sideways) (scope call) (frobnicate): text\n * @b: (not nullable) (nullable): text\n * @c: (array fixed-size=x): text\n */",
        );
        let messages: Vec<_> = diag.entries().iter().map(|d| d.message.as_str()).collect();
        assert!(messages.contains(&"invalid \"transfer\" annotation option: \"sideways\""));
        assert!(messages.contains(&"unknown annotation: frobnicate"));
        assert!(messages
            .contains(&"cannot have both \"not nullable\" and \"nullable\" present"));
        assert!(messages.contains(
            &"invalid \"array\" annotation option \"fixed-size\" value \"x\", must be an integer"
        ));
    }

    #[test]
    fn test_unexpected_annotation_on_identifier() {
        let (_, diag) = parse("/**\n * foo_bar: (scope call)\n */");
        assert!(diag.has_code(WarningCode::UnexpectedAnnotation));
        let (_, diag) = parse("/**\n * foo_bar: (transfer)\n */");
        let messages: Vec<_> = diag.entries().iter().map(|d| d.message.clone()).collect();
        assert!(messages.contains(&"\"transfer\" annotation needs one option, none given".to_string()));
    }

    #[test]
    fn test_deprecated_annotation_names() {
        let (block, diag) =
            parse("/**\n * foo_bar:\n * @a: (in-out) (attribute x y): text\n */");
        let block = block.unwrap();
        let a = block.param("a").unwrap();
        assert!(a.annotations.has(Annotation::InOut));
        assert_eq!(
            a.annotations.get(Annotation::Attributes).and_then(|o| o.key("x")),
            Some(Some("y"))
        );
        assert!(diag.has_code(WarningCode::DeprecatedSyntax));
    }

    #[test]
    fn test_multiline_identifier_annotations() {
        let (block, _) = parse("/**\n * FooBar: (ref-func foo_bar_ref)\n *     (unref-func foo_bar_unref)\n */");
        let block = block.unwrap();
        assert_eq!(block.annotations.first(Annotation::RefFunc), Some("foo_bar_ref"));
        assert_eq!(block.annotations.first(Annotation::UnrefFunc), Some("foo_bar_unref"));
        assert!(block.description.is_none());
    }

    #[test]
    fn test_last_block_wins() {
        let mut diag = Diagnostics::new(WarningConfig::all());
        let comments = vec![
            RawComment {
                text: "/**\n * foo_bar:\n *\n * First.\n */".into(),
                filename: "a.c".into(),
                line: 1,
            },
            RawComment {
                text: "/**\n * foo_bar:\n *\n * Second.\n */".into(),
                filename: "b.c".into(),
                line: 5,
            },
        ];
        let blocks = CommentBlockParser::new(&mut diag).parse_comment_blocks(&comments);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks["foo_bar"].description.as_deref(), Some("Second."));
        assert!(diag.has_code(WarningCode::DuplicateBlock));
    }

    #[test]
    fn test_invalid_comment_text() {
        let (block, diag) = parse("/**\n * foo_bar:\n stray * text\n */");
        assert!(block.is_some());
        assert!(diag.has_code(WarningCode::InvalidCommentText));
    }
}
