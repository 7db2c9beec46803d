//! Macro expander: replaces `{NAME arg1 arg2 ...}` invocations with the
//! bound macro bodies until the text is macro-free.
//!
//! Braces are tracked with a flat open/closed flag. A `{` inside an open
//! invocation, a `}` with nothing open, or an invocation left open at the end
//! of its line are structural errors. Invocations of unknown macros expand to
//! nothing and are recorded as [`LookupWarning`]s.
//!
//! [`Expander::expand_mapped`] also returns a line map so that later stages
//! can report positions in the unexpanded file.

use crate::error::{Location, LookupWarning, Result, WmlError};
use crate::line::normalize;
use crate::macros::{MacroDefinition, MacroTable};

/// Default ceiling on nested expansions.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Stand-in for an empty `()` argument so positional text survives
/// substitution. Stripped from the final output.
const EMPTY_ARG: &str = "()";

/// Where the text being expanded came from.
#[derive(Clone, Copy)]
enum Origin<'a> {
    /// Top-level input: lines map to real file lines.
    File(&'a str),
    /// A substituted macro body: report the top-level call site.
    Body {
        site: &'a Location,
        macro_name: &'a str,
    },
}

impl Origin<'_> {
    fn location(&self, line_index: usize) -> Location {
        match self {
            Origin::File(file) => Location::new(*file, line_index + 1),
            Origin::Body { site, .. } => (*site).clone(),
        }
    }
}

/// Expands macro invocations against a read-only [`MacroTable`].
#[derive(Debug)]
pub struct Expander<'t> {
    table: &'t MacroTable,
    max_depth: usize,
    warnings: Vec<LookupWarning>,
    /// Source line of each output line written so far.
    line_map: Vec<usize>,
}

impl<'t> Expander<'t> {
    pub fn new(table: &'t MacroTable) -> Self {
        Self {
            table,
            max_depth: DEFAULT_MAX_DEPTH,
            warnings: Vec::new(),
            line_map: Vec::new(),
        }
    }

    /// Maximum number of nested expansion levels before giving up.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Invocations of undefined macros seen so far.
    pub fn warnings(&self) -> &[LookupWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<LookupWarning> {
        self.warnings
    }

    /// Expand every invocation in `text`. Comments and blank lines are
    /// dropped; every literal `()` is removed from the result.
    pub fn expand(&mut self, file: &str, text: &str) -> Result<String> {
        self.expand_mapped(file, text).map(|(out, _)| out)
    }

    /// Like [`expand`](Self::expand), also returning the line map: entry `i`
    /// is the line of `file` that produced output line `i + 1`. Lines coming
    /// from a macro body map to the top-level invocation.
    pub fn expand_mapped(&mut self, file: &str, text: &str) -> Result<(String, Vec<usize>)> {
        self.line_map.clear();
        let out = self.expand_text(text, 0, Origin::File(file))?;
        let line_map = std::mem::take(&mut self.line_map);
        debug_assert_eq!(line_map.len(), out.matches('\n').count());
        Ok((out.replace(EMPTY_ARG, ""), line_map))
    }

    fn expand_text(&mut self, text: &str, depth: usize, origin: Origin<'_>) -> Result<String> {
        let mut out = String::with_capacity(text.len());

        for (n, raw) in text.lines().enumerate() {
            let line = normalize(raw);
            if line.is_skippable() {
                continue;
            }

            let mut invocation: Option<String> = None;
            for c in line.code.chars() {
                match c {
                    '{' => {
                        if invocation.is_some() {
                            return Err(WmlError::structural(
                                origin.location(n),
                                format!("`{{` inside an open macro invocation: {}", line.code),
                            ));
                        }
                        invocation = Some(String::new());
                    }
                    '}' => {
                        let Some(call) = invocation.take() else {
                            return Err(WmlError::structural(
                                origin.location(n),
                                format!("`}}` without a matching `{{`: {}", line.code),
                            ));
                        };
                        let site = origin.location(n);
                        self.invoke(&call, &site, depth, &mut out)?;
                    }
                    _ => match &mut invocation {
                        Some(buf) => buf.push(c),
                        None => out.push(c),
                    },
                }
            }

            if invocation.is_some() {
                let message = match origin {
                    Origin::Body { macro_name, .. } => format!(
                        "unterminated macro invocation in the body of `{macro_name}`: {}",
                        line.code
                    ),
                    Origin::File(_) => format!("unterminated macro invocation: {}", line.code),
                };
                return Err(WmlError::structural(origin.location(n), message));
            }
            out.push('\n');
            self.line_map.push(origin.location(n).line);
        }

        Ok(out)
    }

    fn invoke(&mut self, call: &str, site: &Location, depth: usize, out: &mut String) -> Result<()> {
        let words = split_invocation(call);
        let Some((name, args)) = words.split_first() else {
            return Err(WmlError::syntax(site.clone(), "empty macro invocation `{}`"));
        };

        let table = self.table;
        let Some(def) = table.get(name) else {
            log::error!("{site}: no macro definition for `{name}`");
            self.warnings.push(LookupWarning {
                location: site.clone(),
                name: name.clone(),
            });
            return Ok(());
        };

        if args.len() != def.arity() {
            return Err(WmlError::semantic(
                site.clone(),
                format!(
                    "macro `{name}` given the wrong number of arguments: expected {}, given {}",
                    def.arity(),
                    args.len()
                ),
            ));
        }
        if depth >= self.max_depth {
            return Err(WmlError::semantic(
                site.clone(),
                format!(
                    "macro expansion exceeded {} nested levels while expanding `{name}`",
                    self.max_depth
                ),
            ));
        }

        let body = substitute(def, args);
        if body.contains('{') {
            let origin = Origin::Body {
                site,
                macro_name: &def.name,
            };
            out.push_str(&self.expand_text(&body, depth + 1, origin)?);
        } else {
            let lines = body.matches('\n').count();
            self.line_map.extend(std::iter::repeat_n(site.line, lines));
            out.push_str(&body);
        }
        Ok(())
    }
}

/// Bind `args` to the macro's parameters by literal `{PARAM}` replacement.
fn substitute(def: &MacroDefinition, args: &[String]) -> String {
    let mut body = def.body.clone();
    for (param, arg) in def.params.iter().zip(args) {
        body = body.replace(&format!("{{{param}}}"), unwrap_argument(arg));
    }
    body
}

/// `(x)` binds `x`, `()` binds the empty placeholder, `"x"` binds `x`.
pub(crate) fn unwrap_argument(arg: &str) -> &str {
    if let Some(inner) = arg.strip_prefix('(').and_then(|a| a.strip_suffix(')')) {
        return if inner.is_empty() { EMPTY_ARG } else { inner };
    }
    if arg.len() >= 2
        && let Some(inner) = arg.strip_prefix('"').and_then(|a| a.strip_suffix('"'))
    {
        return inner;
    }
    arg
}

/// Split an invocation into `[name, args...]` on whitespace outside
/// parentheses, braces and double quotes. Whitespace runs inside a word
/// collapse to one space.
pub(crate) fn split_invocation(call: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut nesting = 0usize;
    let mut in_quotes = false;
    let mut start: Option<usize> = None;

    for (i, c) in call.char_indices() {
        let splits = c.is_whitespace() && nesting == 0 && !in_quotes;
        match c {
            '"' => in_quotes = !in_quotes,
            '(' | '{' if !in_quotes => nesting += 1,
            ')' | '}' if !in_quotes => nesting = nesting.saturating_sub(1),
            _ => {}
        }
        if splits {
            if let Some(s) = start.take() {
                words.push(collapse_whitespace(&call[s..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        words.push(collapse_whitespace(&call[s..]));
    }
    words
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::macros::preprocess;
    use pretty_assertions::assert_eq;

    fn table(defs: &str) -> MacroTable {
        let mut table = MacroTable::new();
        preprocess("macros.cfg", defs, &mut table).expect("macros parse");
        table
    }

    #[test]
    fn text_without_invocations_is_unchanged() {
        let table = MacroTable::new();
        let text = "[terrain]\nsymbol_image=grass\n[/terrain]\n";
        let out = Expander::new(&table).expand("t.cfg", text).unwrap();
        assert_eq!(out, text);
    }

    #[test]
    fn substitutes_parameters() {
        let table = table("#define TILE X Y\n[tile]\nx,y={X},{Y}\n[/tile]\n#enddef\n");
        let out = Expander::new(&table).expand("t.cfg", "{TILE 1 2}\n").unwrap();
        assert_eq!(out, "[tile]\nx,y=1,2\n[/tile]\n\n");
    }

    #[test]
    fn unwraps_parenthesized_and_quoted_arguments() {
        let table = table("#define PAIR A B\na={A}\nb={B}\n#enddef\n");
        let out = Expander::new(&table)
            .expand("t.cfg", "{PAIR (Gg, Gs^Fp) \"Ww\"}")
            .unwrap();
        assert_eq!(out, "a=Gg, Gs^Fp\nb=Ww\n\n");
    }

    #[test]
    fn empty_parens_bind_empty_text() {
        let table = table("#define FLAGS F\nset_flag={F}\nafter=ok\n#enddef\n");
        let out = Expander::new(&table).expand("t.cfg", "{FLAGS ()}").unwrap();
        assert_eq!(out, "set_flag=\nafter=ok\n\n");
    }

    #[test]
    fn expands_recursively() {
        let defs = "\
#define INNER V
value={V}
#enddef
#define OUTER V
[wrap]
{INNER {V}}
[/wrap]
#enddef
";
        let table = table(defs);
        let out = Expander::new(&table).expand("t.cfg", "{OUTER 7}").unwrap();
        let lines: Vec<&str> = out.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, ["[wrap]", "value=7", "[/wrap]"]);
    }

    #[test]
    fn unknown_macro_is_a_recorded_no_op() {
        let table = MacroTable::new();
        let mut expander = Expander::new(&table);
        let out = expander.expand("t.cfg", "a=1\n{MISSING x}\nb=2\n").unwrap();
        assert_eq!(out, "a=1\n\nb=2\n");
        assert_eq!(expander.warnings().len(), 1);
        assert_eq!(expander.warnings()[0].name, "MISSING");
        assert_eq!(expander.warnings()[0].location, Location::new("t.cfg", 2));
    }

    #[test]
    fn arity_mismatch_is_semantic() {
        let table = table("#define TWO A B\n{A}{B}\n#enddef\n");
        let err = Expander::new(&table)
            .expand("t.cfg", "x=1\n{TWO a b c}")
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Semantic);
        assert_eq!(err.location().line, 2);
        assert!(err.message().contains("expected 2, given 3"));
    }

    #[test]
    fn unbalanced_braces_are_structural() {
        let table = table("#define A\nx=1\n#enddef\n");
        for text in ["{A", "A}", "{A {A}}"] {
            let err = Expander::new(&table).expand("t.cfg", text).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Structural, "input: {text}");
        }
    }

    #[test]
    fn self_recursion_hits_the_depth_ceiling() {
        let table = table("#define LOOP\n{LOOP}\n#enddef\n");
        let err = Expander::new(&table)
            .with_max_depth(8)
            .expand("t.cfg", "{LOOP}")
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Semantic);
        assert!(err.message().contains("LOOP"));
    }

    #[test]
    fn comments_are_stripped_before_scanning() {
        let table = MacroTable::new();
        let out = Expander::new(&table)
            .expand("t.cfg", "a=1 # {not a macro}\n# {nor this}\n")
            .unwrap();
        assert_eq!(out, "a=1\n");
    }

    #[test]
    fn line_map_points_at_source_lines() {
        let table = table("#define THREE\n[x]\ny=1\n[/x]\n#enddef\n");
        let (out, lines) = Expander::new(&table)
            .expand_mapped("t.cfg", "# header\n\n[a]\n{THREE}\n[/a]\n")
            .unwrap();
        assert_eq!(out, "[a]\n[x]\ny=1\n[/x]\n\n[/a]\n");
        assert_eq!(lines, [3, 4, 4, 4, 4, 5]);
    }

    #[test]
    fn nested_bodies_map_to_the_outer_call_site() {
        let defs = "#define INNER\nv=1\n#enddef\n#define OUTER\n[w]\n{INNER}\n[/w]\n#enddef\n";
        let table = table(defs);
        let (out, lines) = Expander::new(&table)
            .expand_mapped("t.cfg", "a=0\n{OUTER}\n")
            .unwrap();
        assert_eq!(lines.len(), out.lines().count());
        assert!(lines[1..].iter().all(|&l| l == 2));
    }

    #[test]
    fn split_keeps_grouped_arguments_together() {
        assert_eq!(
            split_invocation("NAME   (a   b)  \"c d\" e"),
            ["NAME", "(a b)", "\"c d\"", "e"]
        );
        assert_eq!(
            split_invocation("BORDER ({TERRAIN}) {LAYER} {IMAGE stem}"),
            ["BORDER", "({TERRAIN})", "{LAYER}", "{IMAGE stem}"]
        );
    }
}
