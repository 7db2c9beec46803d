//! Image-path mini-language used by `name=` attributes.
//!
//! ```text
//! water/water[01~17].png~CROP(0,0,72,72):100
//! ^ base name  ^ frame range  ^ command      ^ timing
//! ```
//!
//! Parsed in one left-to-right pass with an explicit stack of open command
//! frames. Command names are not interpreted: `MASK`, `BLIT`, `CROP`, `O`
//! and anything else all become the same generic [`Command`] node.

use crate::error::{Location, Result, WmlError};
use crate::numeric::{integer, parse_decimal};
use crate::value::TypedValue;
use serde::Serialize;
use std::collections::BTreeMap;
use winnow::combinator::separated_pair;
use winnow::prelude::*;

/// Token left in the base name where a frame range stood.
pub const FRAME_PLACEHOLDER: &str = "@A";

/// Largest number of frames one `[a~b]` range may produce.
pub const MAX_ANIMATION_FRAMES: u64 = 10_000;

/// A parsed image expression.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ImageExpression {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "animation-frames", skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<i64>>,
    #[serde(rename = "animation_timing", skip_serializing_if = "Option::is_none")]
    pub timing: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,
}

/// `NAME(arg, arg, ...)`, or a bare `~NAME` with no arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub name: String,
    pub args: Vec<CommandArg>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandArg {
    Text(String),
    Command(Command),
}

impl Command {
    fn new(name: String) -> Self {
        Self {
            name,
            args: Vec::new(),
        }
    }

    /// Plain-text parameters, in order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|arg| match arg {
            CommandArg::Text(text) => Some(text.as_str()),
            CommandArg::Command(_) => None,
        })
    }

    /// Nested commands, in order.
    pub fn nested(&self) -> impl Iterator<Item = &Command> {
        self.args.iter().filter_map(|arg| match arg {
            CommandArg::Command(cmd) => Some(cmd),
            CommandArg::Text(_) => None,
        })
    }

    /// `{params: [...], NESTED: [{...}, ...]}`.
    fn to_value(&self) -> TypedValue {
        let mut map = BTreeMap::new();
        map.insert(
            "params".to_string(),
            TypedValue::List(self.params().map(TypedValue::from).collect()),
        );
        group_commands(&mut map, self.nested());
        TypedValue::Map(map)
    }
}

/// Collect invocations under their command name, one list per name.
fn group_commands<'a>(
    map: &mut BTreeMap<String, TypedValue>,
    commands: impl Iterator<Item = &'a Command>,
) {
    for cmd in commands {
        let entry = map
            .entry(cmd.name.clone())
            .or_insert_with(|| TypedValue::List(Vec::new()));
        if let TypedValue::List(items) = entry {
            items.push(cmd.to_value());
        }
    }
}

impl ImageExpression {
    /// Top-level commands named `name`.
    pub fn commands_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Command> {
        self.commands.iter().filter(move |cmd| cmd.name == name)
    }

    /// Fields merged into the owning node's map.
    pub fn to_fields(&self) -> BTreeMap<String, TypedValue> {
        let mut fields = BTreeMap::new();
        group_commands(&mut fields, self.commands.iter());
        if let Some(frames) = &self.frames {
            fields.insert(
                "animation-frames".to_string(),
                TypedValue::List(frames.iter().copied().map(TypedValue::Int).collect()),
            );
        }
        if let Some(timing) = self.timing {
            fields.insert("animation_timing".to_string(), TypedValue::Float(timing));
        }
        if let Some(name) = &self.name {
            fields.insert("name".to_string(), TypedValue::String(name.clone()));
        }
        fields
    }
}

fn syntax(message: String) -> WmlError {
    WmlError::syntax(Location::unknown(), message)
}

/// `a~b` with integer bounds.
fn frame_bounds(input: &mut &str) -> ModalResult<(i64, i64)> {
    separated_pair(integer, '~', integer).parse_next(input)
}

fn expand_range(range: &str, source: &str) -> Result<Vec<i64>> {
    let (mut lo, mut hi) = frame_bounds
        .parse(range)
        .map_err(|_| syntax(format!("malformed animation range `[{range}]` in `{source}`")))?;
    if lo > hi {
        std::mem::swap(&mut lo, &mut hi);
    }
    if hi.abs_diff(lo) >= MAX_ANIMATION_FRAMES {
        return Err(syntax(format!(
            "animation range `[{range}]` in `{source}` exceeds {MAX_ANIMATION_FRAMES} frames"
        )));
    }
    Ok((lo..=hi).collect())
}

/// Scanner state for one expression.
#[derive(Default)]
struct Scan {
    expr: ImageExpression,
    acc: String,
    /// Open command frames, innermost last.
    frames: Vec<Command>,
}

impl Scan {
    /// End the accumulator at depth 0: the base name if nothing precedes it,
    /// otherwise an argument-less command.
    fn finish_top_level(&mut self) {
        if self.acc.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.acc);
        if self.expr.name.is_none() && self.expr.commands.is_empty() {
            self.expr.name = Some(text);
        } else {
            self.expr.commands.push(Command::new(text));
        }
    }

    /// End the accumulator inside parentheses: one text parameter.
    fn finish_param(&mut self) {
        if self.acc.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.acc);
        if let Some(frame) = self.frames.last_mut() {
            frame.args.push(CommandArg::Text(text));
        }
    }
}

/// Parse an image expression.
///
/// Errors carry an unknown location; callers attach one with
/// [`WmlError::or_at`].
pub fn parse_image_expression(source: &str) -> Result<ImageExpression> {
    let mut scan = Scan::default();
    let mut range: Option<String> = None;

    for (i, c) in source.char_indices() {
        if let Some(r) = range.as_mut() {
            match c {
                ']' => {
                    let frames = expand_range(r, source)?;
                    scan.expr.frames = Some(frames);
                    scan.acc.push_str(FRAME_PLACEHOLDER);
                    range = None;
                }
                '[' => {
                    return Err(syntax(format!("nested `[` in `{source}`")));
                }
                _ => r.push(c),
            }
            continue;
        }

        let depth = scan.frames.len();
        match c {
            '[' => range = Some(String::new()),
            ']' => {
                return Err(syntax(format!("`]` without a matching `[` in `{source}`")));
            }
            '~' if depth == 0 => scan.finish_top_level(),
            '~' | ',' if depth > 0 => scan.finish_param(),
            '(' => {
                if scan.acc.is_empty() {
                    return Err(syntax(format!("`(` without a command name in `{source}`")));
                }
                let name = std::mem::take(&mut scan.acc);
                scan.frames.push(Command::new(name));
            }
            ')' => {
                scan.finish_param();
                let Some(done) = scan.frames.pop() else {
                    return Err(syntax(format!("`)` without a matching `(` in `{source}`")));
                };
                match scan.frames.last_mut() {
                    Some(parent) => parent.args.push(CommandArg::Command(done)),
                    None => scan.expr.commands.push(done),
                }
            }
            ':' if depth == 0 => {
                scan.finish_top_level();
                let text = &source[i + 1..];
                let Some(timing) = parse_decimal(text) else {
                    return Err(syntax(format!(
                        "bad animation timing `{text}` in `{source}`"
                    )));
                };
                scan.expr.timing = Some(timing);
                return Ok(scan.expr);
            }
            _ => scan.acc.push(c),
        }
    }

    if range.is_some() {
        return Err(syntax(format!("unterminated `[` in `{source}`")));
    }
    if let Some(open) = scan.frames.last() {
        return Err(syntax(format!(
            "unclosed `{}(` in `{source}`",
            open.name
        )));
    }
    scan.finish_top_level();
    Ok(scan.expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use pretty_assertions::assert_eq;

    fn parse(s: &str) -> ImageExpression {
        parse_image_expression(s).expect("image expression")
    }

    #[test]
    fn plain_path_is_just_a_name() {
        let expr = parse("off-map/border.png");
        assert_eq!(
            expr,
            ImageExpression {
                name: Some("off-map/border.png".into()),
                ..Default::default()
            }
        );
        let fields = expr.to_fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["name"], TypedValue::from("off-map/border.png"));
    }

    #[test]
    fn frame_range_becomes_placeholder_and_list() {
        let expr = parse("village/drake1-A[01~03].png");
        assert_eq!(expr.name.as_deref(), Some("village/drake1-A@A.png"));
        assert_eq!(expr.frames, Some(vec![1, 2, 3]));
        assert!(expr.commands.is_empty());
    }

    #[test]
    fn reversed_range_is_swapped() {
        assert_eq!(parse("a[03~01].png").frames, Some(vec![1, 2, 3]));
    }

    #[test]
    fn crop_with_timing() {
        let expr = parse("water/water[01~17].png~CROP(0,0,72,72):100");
        assert_eq!(expr.name.as_deref(), Some("water/water@A.png"));
        assert_eq!(expr.frames, Some((1..=17).collect()));
        assert_eq!(expr.timing, Some(100.0));

        let crop: Vec<&Command> = expr.commands_named("CROP").collect();
        assert_eq!(crop.len(), 1);
        assert_eq!(crop[0].params().collect::<Vec<_>>(), ["0", "0", "72", "72"]);

        let fields = expr.to_fields();
        assert_eq!(fields["animation_timing"], TypedValue::Float(100.0));
        assert_eq!(
            fields["CROP"].as_list().unwrap()[0].get("params"),
            Some(&TypedValue::from(vec!["0", "0", "72", "72"]))
        );
    }

    #[test]
    fn nested_commands_attach_to_their_parent() {
        let expr = parse(
            "off-map/border.png~MASK(masks/concave-@R0.png~BLIT(masks/concave-@R1.png)~BLIT(masks/concave-@R2.png))",
        );
        assert_eq!(expr.name.as_deref(), Some("off-map/border.png"));
        assert_eq!(expr.commands.len(), 1);

        let mask = &expr.commands[0];
        assert_eq!(mask.name, "MASK");
        assert_eq!(mask.params().collect::<Vec<_>>(), ["masks/concave-@R0.png"]);
        let blits: Vec<_> = mask
            .nested()
            .map(|b| (b.name.as_str(), b.params().collect::<Vec<_>>()))
            .collect();
        assert_eq!(
            blits,
            [
                ("BLIT", vec!["masks/concave-@R1.png"]),
                ("BLIT", vec!["masks/concave-@R2.png"]),
            ]
        );

        let fields = expr.to_fields();
        let mask_value = &fields["MASK"].as_list().unwrap()[0];
        assert_eq!(mask_value.get("BLIT").and_then(TypedValue::as_list).map(<[_]>::len), Some(2));
    }

    #[test]
    fn command_without_base_name() {
        let expr = parse("O(0.5)");
        assert_eq!(expr.name, None);
        let o = &expr.commands[0];
        assert_eq!(o.name, "O");
        assert_eq!(o.params().collect::<Vec<_>>(), ["0.5"]);
    }

    #[test]
    fn bare_command_after_name() {
        let expr = parse("units/drake.png~FL~GS()");
        assert_eq!(expr.name.as_deref(), Some("units/drake.png"));
        let names: Vec<_> = expr.commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["FL", "GS"]);
        assert!(expr.commands.iter().all(|c| c.args.is_empty()));
    }

    #[test]
    fn comma_outside_parens_is_literal() {
        assert_eq!(parse("a,b.png").name.as_deref(), Some("a,b.png"));
    }

    #[test]
    fn malformed_inputs_are_syntax_errors() {
        for bad in [
            "a[1-3].png",
            "a[x~3].png",
            "a[1~3.png",
            "a]1.png",
            "a[1[2~3]].png",
            "(x)",
            "a~CROP(1,2",
            "a.png)",
            "a.png:",
            "a.png:fast",
        ] {
            let err = parse_image_expression(bad).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Syntax, "input: {bad}");
            assert_eq!(err.location(), &Location::unknown());
        }
    }

    #[test]
    fn oversized_ranges_are_rejected() {
        let err = parse_image_expression("a[0~3000000000].png").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Syntax);
        assert!(err.message().contains("exceeds"));

        let last = (MAX_ANIMATION_FRAMES - 1).to_string();
        let expr = parse(&format!("a[0~{last}].png"));
        assert_eq!(expr.frames.map(|f| f.len() as u64), Some(MAX_ANIMATION_FRAMES));
    }
}
