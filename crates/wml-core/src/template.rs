//! Macro templates: a definition read as a document instead of text to
//! paste.
//!
//! The body of `#define NAME A B` becomes a tree stored under
//! `@macro NAME`. An invocation standing on a line of its own becomes an
//! `@merge` node holding `@call` plus one binding per callee parameter,
//! keyed by the lower-cased parameter name. `{PARAM}` references left in a
//! value become `@eval` expressions, so `{STEM}-n.png` reads
//! `@eval stem + '-n.png'`.

use crate::builder::DocumentBuilder;
use crate::error::{Location, Result, WmlError};
use crate::expand::{split_invocation, unwrap_argument};
use crate::id::TagName;
use crate::line::normalize;
use crate::macros::{MacroDefinition, MacroTable};
use crate::model::{Document, Node, Visitor};
use crate::value::TypedValue;
use petgraph::graph::NodeIndex;
use std::collections::BTreeMap;
use std::convert::Infallible;

/// Tag of a node standing for an unexpanded invocation.
pub const MERGE_TAG: &str = "@merge";
/// Attribute naming the invoked macro.
pub const CALL_KEY: &str = "@call";
/// Lower-cased parameter list of a template.
pub const PARAMS_KEY: &str = "@params";
pub const EVAL_PREFIX: &str = "@eval";

/// Key of a template in the maps built here: `@macro NAME`.
pub fn template_key(name: &str) -> String {
    format!("@macro {name}")
}

/// Parse the body of `def` into a document, keeping invocations as
/// `@merge` nodes.
pub fn template_document(def: &MacroDefinition, table: &MacroTable) -> Result<Document> {
    let mut builder =
        DocumentBuilder::new(def.location.file.as_str()).with_line_map(def.body_lines.clone());

    for (n, raw) in def.body.lines().enumerate() {
        let calls = if builder.in_string() {
            None
        } else {
            line_invocations(normalize(raw).code)
        };
        let Some(calls) = calls else {
            builder.push_line(raw)?;
            continue;
        };
        let line = def
            .body_lines
            .get(n)
            .copied()
            .unwrap_or(def.location.line);
        let location = Location::new(def.location.file.as_str(), line);
        let nodes = calls
            .into_iter()
            .map(|call| call_node(call, def, table, &location))
            .collect::<Result<Vec<_>>>()?;
        builder.push_nodes(nodes);
    }

    builder.finish()
}

/// The template of one definition: `{"@macro NAME": {...}}`.
pub fn macro_template(def: &MacroDefinition, table: &MacroTable) -> Result<TypedValue> {
    let mut map = BTreeMap::new();
    map.insert(template_key(&def.name), template_body(def, table)?);
    Ok(TypedValue::Map(map))
}

/// Templates of every definition in `table`, keyed by [`template_key`].
/// Definitions whose body does not parse on its own are returned as errors
/// and left out of the map.
pub fn macro_templates(table: &MacroTable) -> (TypedValue, Vec<WmlError>) {
    let mut templates = BTreeMap::new();
    let mut failures = Vec::new();
    for def in table.iter() {
        match template_body(def, table) {
            Ok(body) => {
                templates.insert(template_key(&def.name), body);
            }
            Err(err) => failures.push(err),
        }
    }
    log::debug!(
        "{} template(s), {} skipped",
        templates.len(),
        failures.len()
    );
    (TypedValue::Map(templates), failures)
}

fn template_body(def: &MacroDefinition, table: &MacroTable) -> Result<TypedValue> {
    let doc = template_document(def, table)?;
    let mut collect = Collect::default();
    let Ok(()) = doc.walk(&mut collect);

    let mut body = collect.done;
    if let TypedValue::Map(map) = &mut body {
        let params = def.params.iter().map(|p| p.to_lowercase()).collect::<Vec<_>>();
        map.insert(PARAMS_KEY.to_string(), params.into());
    }
    Ok(body)
}

/// Rewrite `{PARAM}` references as an `@eval` expression. Text without
/// references comes back unchanged.
pub fn eval_expression(raw: &str) -> String {
    let mut terms = Vec::new();
    let mut rest = raw;
    while let Some(open) = rest.find('{') {
        let Some(len) = rest[open..].find('}') else {
            break;
        };
        let close = open + len;
        if open > 0 {
            terms.push(quote_literal(&rest[..open]));
        }
        terms.push(rest[open + 1..close].trim().to_lowercase());
        rest = &rest[close + 1..];
    }
    if terms.is_empty() {
        return raw.to_string();
    }
    if !rest.is_empty() {
        terms.push(quote_literal(rest));
    }
    format!("{EVAL_PREFIX} {}", terms.join(" + "))
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Inner text of each `{...}` when the line holds nothing but invocations.
fn line_invocations(code: &str) -> Option<Vec<&str>> {
    let mut calls = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in code.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = i + 1;
                }
                depth += 1;
            }
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    calls.push(&code[start..i]);
                }
            }
            c if depth == 0 && !c.is_whitespace() => return None,
            _ => {}
        }
    }
    (depth == 0 && !calls.is_empty()).then_some(calls)
}

fn call_node(
    call: &str,
    def: &MacroDefinition,
    table: &MacroTable,
    location: &Location,
) -> Result<Node> {
    let words = split_invocation(call);
    let Some((name, args)) = words.split_first() else {
        return Err(WmlError::syntax(
            location.clone(),
            "empty macro invocation `{}`",
        ));
    };

    let mut node = Node::new(TagName::intern(MERGE_TAG));
    if let Some(callee) = table.get(name) {
        if args.len() != callee.arity() {
            return Err(WmlError::semantic(
                location.clone(),
                format!(
                    "macro `{name}` given the wrong number of arguments: expected {}, given {}",
                    callee.arity(),
                    args.len()
                ),
            ));
        }
        node.set_attr(CALL_KEY, name.as_str());
        for (param, arg) in callee.params.iter().zip(args) {
            node.set_attr(param.to_lowercase(), binding(arg));
        }
    } else if args.is_empty() && def.params.iter().any(|p| p == name) {
        node.set_attr(CALL_KEY, format!("{EVAL_PREFIX} {}", name.to_lowercase()));
    } else {
        log::warn!(
            "{location}: template of `{}` calls undefined macro `{name}`",
            def.name
        );
        node.set_attr(CALL_KEY, name.as_str());
        for (i, arg) in args.iter().enumerate() {
            node.set_attr(format!("@{}", i + 1), binding(arg));
        }
    }
    Ok(node)
}

fn binding(arg: &str) -> String {
    match unwrap_argument(arg) {
        "()" => String::new(),
        value => value.to_string(),
    }
}

/// Post-order fold into nested maps. Attribute values pass through
/// [`eval_expression`]; children are listed under their tag name.
#[derive(Default)]
struct Collect {
    stack: Vec<Vec<(TagName, TypedValue)>>,
    done: TypedValue,
}

impl Visitor for Collect {
    type Error = Infallible;

    fn enter(&mut self, _doc: &Document, _idx: NodeIndex) -> std::result::Result<(), Infallible> {
        self.stack.push(Vec::new());
        Ok(())
    }

    fn exit(&mut self, doc: &Document, idx: NodeIndex) -> std::result::Result<(), Infallible> {
        let node = doc.node(idx);
        let mut value = TypedValue::Map(
            node.attributes
                .iter()
                .map(|(key, raw)| (key.clone(), TypedValue::from(eval_expression(raw))))
                .collect(),
        );
        for (name, child) in self.stack.pop().unwrap_or_default() {
            value.push_child(name.as_str(), child);
        }
        match self.stack.last_mut() {
            Some(siblings) => siblings.push((node.name, value)),
            None => self.done = value,
        }
        Ok(())
    }
}
