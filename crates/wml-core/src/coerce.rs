//! Attribute value coercion: raw strings → [`TypedValue`].
//!
//! Which conversion applies is decided by attribute name through a
//! [`CoercionRules`] table. The default table covers terrain-graphics
//! files; other corpora can override or extend it.

use crate::error::{Location, Result, WmlError};
use crate::id::TagName;
use crate::image::parse_image_expression;
use crate::model::{Document, Node, Visitor};
use crate::numeric::{is_fractional, parse_decimal, parse_integer};
use crate::value::TypedValue;
use petgraph::graph::NodeIndex;
use std::collections::{BTreeMap, HashMap};

// ─── Rules ───────────────────────────────────────────────────────────────

/// How one attribute is converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// A single integer.
    Integer,
    /// Numbers split on the separator; integers stay integers, fractions
    /// become floats.
    NumberList(char),
    /// Strings split on the separator.
    StringList { separator: char, keep_empty: bool },
    /// Like `StringList`, but an empty raw value drops the attribute.
    Flags(char),
    /// One string per line.
    Lines,
    /// Exactly two integers stored under the two halves of a `a,b` key.
    Pair,
    /// An image expression whose fields are merged into the node.
    Image,
    /// Boolean, number or string, whichever the text looks like.
    Scalar,
    /// The raw string.
    Text,
}

/// Attribute name → [`Rule`] table.
#[derive(Debug, Clone)]
pub struct CoercionRules {
    rules: HashMap<String, Rule>,
    /// Attributes without a rule get [`Rule::Scalar`] when set, [`Rule::Text`]
    /// otherwise.
    pub infer_scalars: bool,
}

impl Default for CoercionRules {
    fn default() -> Self {
        Self::empty()
            .with_rule("center", Rule::NumberList(','))
            .with_rule("base", Rule::NumberList(','))
            .with_rule("layer", Rule::Integer)
            .with_rule("pos", Rule::Integer)
            .with_rule("probability", Rule::Integer)
            .with_rule(
                "rotations",
                Rule::StringList {
                    separator: ',',
                    keep_empty: false,
                },
            )
            .with_rule(
                "type",
                Rule::StringList {
                    separator: ',',
                    keep_empty: false,
                },
            )
            .with_rule("set_flag", Rule::Flags(','))
            .with_rule("set_no_flag", Rule::Flags(','))
            .with_rule("has_flag", Rule::Flags(','))
            .with_rule("no_flag", Rule::Flags(','))
            .with_rule(
                "variations",
                Rule::StringList {
                    separator: ';',
                    keep_empty: true,
                },
            )
            .with_rule("map", Rule::Lines)
            .with_rule("x,y", Rule::Pair)
            .with_rule("name", Rule::Image)
    }
}

impl CoercionRules {
    /// No per-attribute rules; everything is inferred.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
            infer_scalars: true,
        }
    }

    /// Add or replace the rule for `key`.
    #[must_use]
    pub fn with_rule(mut self, key: impl Into<String>, rule: Rule) -> Self {
        self.rules.insert(key.into(), rule);
        self
    }

    #[must_use]
    pub fn without_rule(mut self, key: &str) -> Self {
        self.rules.remove(key);
        self
    }

    #[must_use]
    pub fn infer_scalars(mut self, infer: bool) -> Self {
        self.infer_scalars = infer;
        self
    }

    pub fn rule_for(&self, key: &str) -> Rule {
        match self.rules.get(key) {
            Some(rule) => *rule,
            None if self.infer_scalars => Rule::Scalar,
            None => Rule::Text,
        }
    }
}

// ─── Coercer ─────────────────────────────────────────────────────────────

/// Applies a rule table to nodes and documents.
#[derive(Debug, Clone)]
pub struct Coercer<'r> {
    rules: &'r CoercionRules,
    file: String,
}

impl<'r> Coercer<'r> {
    pub fn new(rules: &'r CoercionRules) -> Self {
        Self {
            rules,
            file: String::new(),
        }
    }

    /// File name used in error locations.
    #[must_use]
    pub fn for_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    /// Coerce one node's attributes into a `Map`. Children are not included.
    pub fn coerce_attributes(&self, node: &Node) -> Result<TypedValue> {
        let location = Location::new(self.file.clone(), node.line);
        let mut map = BTreeMap::new();
        for (key, raw) in &node.attributes {
            self.coerce_into(&mut map, key, raw)
                .map_err(|e| e.or_at(&location))?;
        }
        Ok(TypedValue::Map(map))
    }

    /// Coerce the whole document. The result is the root's map, where each
    /// child tag is appended to a list under its tag name.
    pub fn coerce_document(&self, doc: &Document) -> Result<TypedValue> {
        let mut collect = Collect {
            coercer: self,
            stack: Vec::new(),
            done: TypedValue::map(),
        };
        doc.walk(&mut collect)?;
        Ok(collect.done)
    }

    fn coerce_into(
        &self,
        map: &mut BTreeMap<String, TypedValue>,
        key: &str,
        raw: &str,
    ) -> Result<()> {
        match self.rules.rule_for(key) {
            Rule::Integer => {
                map.insert(key.to_string(), integer(key, raw)?);
            }
            Rule::NumberList(sep) => {
                let value = if is_invocation(raw) {
                    TypedValue::from(raw)
                } else {
                    number_list(key, raw, sep)?
                };
                map.insert(key.to_string(), value);
            }
            Rule::StringList {
                separator,
                keep_empty,
            } => {
                map.insert(key.to_string(), string_list(raw, separator, keep_empty));
            }
            Rule::Flags(sep) => {
                if !raw.is_empty() {
                    map.insert(key.to_string(), string_list(raw, sep, false));
                }
            }
            Rule::Lines => {
                map.insert(key.to_string(), string_list(raw, '\n', false));
            }
            Rule::Pair => {
                let (first_key, second_key) = key.split_once(',').unwrap_or((key, key));
                let (first, second) = pair(key, raw)?;
                map.insert(first_key.trim().to_string(), first);
                map.insert(second_key.trim().to_string(), second);
            }
            Rule::Image => {
                let expr = parse_image_expression(raw)?;
                map.extend(expr.to_fields());
            }
            Rule::Scalar => {
                map.insert(key.to_string(), infer_scalar(raw));
            }
            Rule::Text => {
                map.insert(key.to_string(), TypedValue::from(raw));
            }
        }
        Ok(())
    }
}

/// Post-order collector. `enter` opens a slot for the node's children;
/// `exit` coerces the node's attributes once every child is finished and
/// hands the result to the parent's slot.
struct Collect<'a, 'r> {
    coercer: &'a Coercer<'r>,
    stack: Vec<Vec<(TagName, TypedValue)>>,
    done: TypedValue,
}

impl Visitor for Collect<'_, '_> {
    type Error = WmlError;

    fn enter(&mut self, _doc: &Document, _idx: NodeIndex) -> Result<()> {
        self.stack.push(Vec::new());
        Ok(())
    }

    fn exit(&mut self, doc: &Document, idx: NodeIndex) -> Result<()> {
        let node = doc.node(idx);
        let mut value = self.coercer.coerce_attributes(node)?;
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

// ─── Conversions ─────────────────────────────────────────────────────────

/// A value that is still an unexpanded `{...}` invocation.
fn is_invocation(raw: &str) -> bool {
    let raw = raw.trim();
    raw.starts_with('{') && raw.ends_with('}')
}

fn not_numeric(key: &str, raw: &str) -> WmlError {
    WmlError::syntax(
        Location::unknown(),
        format!("`{key}` expects a number, found `{raw}`"),
    )
}

fn integer(key: &str, raw: &str) -> Result<TypedValue> {
    if is_invocation(raw) {
        return Ok(TypedValue::from(raw));
    }
    parse_integer(raw)
        .map(TypedValue::Int)
        .ok_or_else(|| not_numeric(key, raw))
}

/// Integer when the literal has no fraction, float otherwise.
fn number(key: &str, raw: &str) -> Result<TypedValue> {
    if is_fractional(raw) {
        parse_decimal(raw)
            .map(TypedValue::Float)
            .ok_or_else(|| not_numeric(key, raw))
    } else {
        parse_integer(raw)
            .map(TypedValue::Int)
            .ok_or_else(|| not_numeric(key, raw))
    }
}

fn number_list(key: &str, raw: &str, sep: char) -> Result<TypedValue> {
    raw.split(sep)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| number(key, item))
        .collect::<Result<Vec<_>>>()
        .map(TypedValue::List)
}

fn string_list(raw: &str, sep: char, keep_empty: bool) -> TypedValue {
    TypedValue::List(
        raw.split(sep)
            .map(str::trim)
            .filter(|item| keep_empty || !item.is_empty())
            .map(TypedValue::from)
            .collect(),
    )
}

fn pair(key: &str, raw: &str) -> Result<(TypedValue, TypedValue)> {
    let items: Vec<&str> = raw.split(',').map(str::trim).collect();
    let [first, second] = items.as_slice() else {
        return Err(WmlError::syntax(
            Location::unknown(),
            format!("`{key}` expects two values, found `{raw}`"),
        ));
    };
    Ok((integer(key, first)?, integer(key, second)?))
}

/// `yes`/`true`, `no`/`false`, numeric literal, else the string itself.
pub fn infer_scalar(raw: &str) -> TypedValue {
    match raw {
        "yes" | "true" => return TypedValue::Bool(true),
        "no" | "false" => return TypedValue::Bool(false),
        _ => {}
    }
    if is_fractional(raw) {
        if let Some(n) = parse_decimal(raw) {
            return TypedValue::Float(n);
        }
    } else if let Some(n) = parse_integer(raw) {
        return TypedValue::Int(n);
    }
    TypedValue::from(raw)
}
