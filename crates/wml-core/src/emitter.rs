//! Emitter: Document → canonical config text.
//!
//! Output re-parses to the same tree: tags keep their order, attributes come
//! out sorted by key, and values are quoted only when the builder could not
//! read them back bare.

use crate::model::{Document, Node, Visitor};
use petgraph::graph::NodeIndex;
use std::convert::Infallible;
use std::fmt::Write;

/// Emit a `Document` as config text.
#[must_use]
pub fn emit_document(doc: &Document) -> String {
    let mut emitter = Emitter {
        out: String::with_capacity(1024),
        depth: 0,
    };
    // Infallible: writing into a String cannot fail.
    let _ = doc.walk(&mut emitter);
    emitter.out
}

struct Emitter {
    out: String,
    depth: usize,
}

impl Emitter {
    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str("  ");
        }
    }

    fn emit_attributes(&mut self, node: &Node) {
        for (key, value) in &node.attributes {
            self.indent(self.depth);
            let _ = writeln!(self.out, "{key}={}", format_value(value));
        }
    }
}

impl Visitor for Emitter {
    type Error = Infallible;

    fn enter(&mut self, doc: &Document, idx: NodeIndex) -> Result<(), Infallible> {
        let node = doc.node(idx);
        if idx == doc.root {
            // Attributes set directly on the root have no enclosing tag.
            self.emit_attributes(node);
            return Ok(());
        }
        if self.depth == 0 && !self.out.is_empty() {
            self.out.push('\n');
        }
        self.indent(self.depth);
        let _ = writeln!(self.out, "[{}]", node.name);
        self.depth += 1;
        self.emit_attributes(node);
        Ok(())
    }

    fn exit(&mut self, doc: &Document, idx: NodeIndex) -> Result<(), Infallible> {
        if idx == doc.root {
            return Ok(());
        }
        self.depth -= 1;
        self.indent(self.depth);
        let _ = writeln!(self.out, "[/{}]", doc.node(idx).name);
        Ok(())
    }
}

/// Render a raw attribute value so the builder reads it back unchanged.
fn format_value(value: &str) -> String {
    if value.len() >= 2
        && let Some(text) = value.strip_prefix('~').and_then(|v| v.strip_suffix('~'))
    {
        return format!("_ \"{text}\"");
    }
    if needs_quotes(value) {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

fn needs_quotes(value: &str) -> bool {
    value != value.trim()
        || value.starts_with('_')
        || value
            .chars()
            .any(|c| matches!(c, ' ' | '\t' | '\n' | '=' | '#' | '"'))
}
