//! Document builder: macro-free WML text → [`Document`].
//!
//! An explicit stack machine over lines. Handles open tags, merge tags
//! (`[+name]`, which reopen the most recent node of that name instead of
//! creating a new one), close tags, `key=value` attributes, quoted and
//! translatable (`_ "..."`) values, and quoted strings spanning several
//! lines. Tag lines are recognized with `winnow`.

use crate::error::{Location, Result, WmlError};
use crate::id::TagName;
use crate::line::normalize;
use crate::model::{Document, Node};
use petgraph::graph::NodeIndex;
use std::collections::HashMap;
use winnow::combinator::{delimited, opt};
use winnow::prelude::*;
use winnow::token::take_while;

/// Parse macro-free text into a document.
pub fn build_document(file: &str, text: &str) -> Result<Document> {
    build_document_mapped(file, text, &[])
}

/// Parse expanded text, reporting positions through `line_map`.
///
/// `line_map[i]` is the source line that produced line `i + 1` of `text`,
/// as returned by [`Expander::expand_mapped`](crate::expand::Expander::expand_mapped).
/// Lines past the end of the map keep their own number.
pub fn build_document_mapped(file: &str, text: &str, line_map: &[usize]) -> Result<Document> {
    let mut builder = DocumentBuilder::new(file).with_line_map(line_map.to_vec());
    for raw in text.lines() {
        builder.push_line(raw)?;
    }
    builder.finish()
}

/// One entry of the write-target stack.
#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeIndex,
    line: usize,
}

/// A quoted value whose closing quote is on a later line.
#[derive(Debug)]
struct PendingString {
    key: String,
    text: String,
    translatable: bool,
    line: usize,
}

/// Line-at-a-time builder. Feed lines with [`push_line`](Self::push_line),
/// then call [`finish`](Self::finish).
#[derive(Debug)]
pub struct DocumentBuilder {
    file: String,
    doc: Document,
    stack: Vec<Frame>,
    /// Most recently opened node per tag name, at any depth.
    last_by_name: HashMap<TagName, NodeIndex>,
    pending: Option<PendingString>,
    /// Open `[+name]` blocks. While non-zero, closes skip the name check.
    merge_depth: usize,
    line_no: usize,
    line_map: Vec<usize>,
}

impl DocumentBuilder {
    pub fn new(file: impl Into<String>) -> Self {
        let doc = Document::new();
        let root = Frame {
            node: doc.root,
            line: 0,
        };
        Self {
            file: file.into(),
            doc,
            stack: vec![root],
            last_by_name: HashMap::new(),
            pending: None,
            merge_depth: 0,
            line_no: 0,
            line_map: Vec::new(),
        }
    }

    /// Translate input line numbers through `line_map` in every location
    /// this builder records.
    #[must_use]
    pub fn with_line_map(mut self, line_map: Vec<usize>) -> Self {
        self.line_map = line_map;
        self
    }

    /// Number of merge blocks currently open.
    pub fn merge_depth(&self) -> usize {
        self.merge_depth
    }

    /// Source line of the line being consumed.
    fn source_line(&self) -> usize {
        self.line_no
            .checked_sub(1)
            .and_then(|i| self.line_map.get(i))
            .copied()
            .unwrap_or(self.line_no)
    }

    fn here(&self) -> Location {
        Location::new(self.file.clone(), self.source_line())
    }

    fn top(&self) -> Frame {
        // The root frame is never popped.
        self.stack[self.stack.len() - 1]
    }

    /// Consume one physical line.
    pub fn push_line(&mut self, raw: &str) -> Result<()> {
        self.line_no += 1;

        if self.pending.is_some() {
            self.continue_string(raw.trim());
            return Ok(());
        }

        let line = normalize(raw);
        if line.is_skippable() {
            return Ok(());
        }
        let code = line.code;

        if let Ok((merge, name)) = parse_open_tag.parse(code) {
            if merge {
                self.open_merge(name)
            } else {
                self.open_tag(name);
                Ok(())
            }
        } else if let Ok(name) = parse_close_tag.parse(code) {
            self.close_tag(name)
        } else if code.starts_with('{') {
            Err(WmlError::structural(
                self.here(),
                format!("unexpanded macro invocation: {code}"),
            ))
        } else {
            self.attribute(code)
        }
    }

    /// Whether a quoted value is still waiting for its closing quote.
    pub fn in_string(&self) -> bool {
        self.pending.is_some()
    }

    /// Consume one line that stands for finished nodes and attach them under
    /// the current write target. They do not become merge targets.
    pub fn push_nodes(&mut self, nodes: impl IntoIterator<Item = Node>) {
        self.line_no += 1;
        let line = self.source_line();
        let parent = self.top().node;
        for node in nodes {
            self.doc.add_node(parent, node.at_line(line));
        }
    }

    /// Finish parsing; every tag must be closed and every string terminated.
    pub fn finish(self) -> Result<Document> {
        if let Some(pending) = &self.pending {
            return Err(WmlError::syntax(
                Location::new(self.file.clone(), pending.line),
                format!("missing closing quote for `{}`", pending.key),
            ));
        }
        if self.stack.len() > 1 {
            let open = self.top();
            return Err(WmlError::structural(
                Location::new(self.file.clone(), open.line),
                format!("tag [{}] is never closed", self.doc.node(open.node).name),
            ));
        }
        log::debug!(
            "{}: built document with {} node(s)",
            self.file,
            self.doc.node_count()
        );
        Ok(self.doc)
    }

    fn open_tag(&mut self, name: &str) {
        let name = TagName::intern(name);
        let line = self.source_line();
        let parent = self.top().node;
        let idx = self.doc.add_node(parent, Node::new(name).at_line(line));
        self.last_by_name.insert(name, idx);
        self.stack.push(Frame { node: idx, line });
    }

    fn open_merge(&mut self, name: &str) -> Result<()> {
        let Some(&target) = self.last_by_name.get(&TagName::intern(name)) else {
            return Err(WmlError::structural(
                self.here(),
                format!("no earlier [{name}] to merge [+{name}] into"),
            ));
        };
        log::debug!("{}: merging into [{name}]", self.here());
        self.merge_depth += 1;
        self.stack.push(Frame {
            node: target,
            line: self.source_line(),
        });
        Ok(())
    }

    fn close_tag(&mut self, name: &str) -> Result<()> {
        if self.stack.len() == 1 {
            return Err(WmlError::structural(
                self.here(),
                format!("closing tag [/{name}] with no open tag"),
            ));
        }
        if self.merge_depth > 0 {
            self.merge_depth -= 1;
        } else {
            let open = self.doc.node(self.top().node).name;
            if open.as_str() != name {
                return Err(WmlError::structural(
                    self.here(),
                    format!("tag name mismatch: [/{name}] closes [{open}]"),
                ));
            }
        }
        self.stack.pop();
        Ok(())
    }

    fn attribute(&mut self, code: &str) -> Result<()> {
        let Some((key, value)) = code.split_once('=') else {
            return Err(WmlError::syntax(
                self.here(),
                format!("no '=' in attribute line: {code}"),
            ));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(WmlError::syntax(
                self.here(),
                format!("empty attribute name: {code}"),
            ));
        }

        let value = value.trim();
        let translatable = value.starts_with('_');

        if value.matches('"').count() == 1
            && let Some(quote) = value.find('"')
        {
            self.pending = Some(PendingString {
                key: key.to_string(),
                text: value[quote + 1..].to_string(),
                translatable,
                line: self.source_line(),
            });
            return Ok(());
        }

        let unquoted = match (value.find('"'), value.rfind('"')) {
            (Some(start), Some(end)) if start < end => &value[start + 1..end],
            _ => value,
        };
        self.store(key, wrap_translatable(unquoted, translatable));
        Ok(())
    }

    fn continue_string(&mut self, line: &str) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        pending.text.push('\n');
        match line.find('"') {
            Some(quote) => {
                pending.text.push_str(&line[..quote]);
                if let Some(done) = self.pending.take() {
                    let value = wrap_translatable(&done.text, done.translatable);
                    self.store(&done.key, value);
                }
            }
            None => pending.text.push_str(line),
        }
    }

    /// Write an attribute to the current target. Same rule inside and
    /// outside merge blocks: the new value replaces any earlier one.
    fn store(&mut self, key: &str, value: String) {
        let top = self.top();
        let replaced = self.doc.node_mut(top.node).set_attr(key, value);
        if self.merge_depth > 0 && replaced.is_some() {
            log::debug!("{}: merge overwrote `{key}`", self.here());
        }
    }
}

/// Translatable strings are stored as `~text~`.
fn wrap_translatable(text: &str, translatable: bool) -> String {
    if translatable {
        format!("~{text}~")
    } else {
        text.to_string()
    }
}

// ─── Tag-line parsers ───────────────────────────────────────────────────

fn parse_identifier<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

/// `[name]` or `[+name]`; yields `(is_merge, name)`.
fn parse_open_tag<'a>(input: &mut &'a str) -> ModalResult<(bool, &'a str)> {
    delimited('[', (opt('+'), parse_identifier), ']')
        .map(|(plus, name)| (plus.is_some(), name))
        .parse_next(input)
}

/// `[/name]`.
fn parse_close_tag<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    delimited("[/", parse_identifier, ']').parse_next(input)
}
