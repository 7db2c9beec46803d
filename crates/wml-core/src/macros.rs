//! Macro table and the `#define` / `#enddef` preprocessor.
//!
//! Preprocessing only collects definitions; it never emits document
//! content. Bodies are stored unexpanded, so a body may reference macros
//! that are defined later (or in another file). Resolution happens in
//! [`crate::expand`].

use crate::error::{Location, Result, WmlError};
use crate::line::{Directive, normalize};
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::HashMap;

/// One `#define NAME p1 p2 ... #enddef` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MacroDefinition {
    pub name: String,
    pub params: SmallVec<[String; 4]>,
    /// Body text, one normalized line per `\n`, not expanded.
    pub body: String,
    /// Source line of each body line.
    #[serde(skip)]
    pub body_lines: Vec<usize>,
    /// File and line where the body starts.
    pub location: Location,
}

impl MacroDefinition {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// All macros known to a run, keyed by case-sensitive name.
///
/// Filled by [`preprocess`] (through `&mut`), then only borrowed shared by
/// the expander. Duplicate names are always fatal, never shadowing.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: HashMap<String, MacroDefinition>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a finished definition. Fails if the name is taken.
    pub fn insert(&mut self, def: MacroDefinition) -> Result<()> {
        if let Some(existing) = self.macros.get(&def.name) {
            return Err(WmlError::semantic(
                def.location.clone(),
                format!(
                    "duplicate macro name `{}` (first defined at {})",
                    def.name, existing.location
                ),
            ));
        }
        self.macros.insert(def.name.clone(), def);
        Ok(())
    }

    /// Fold a separately built table into this one.
    ///
    /// Lets files be preprocessed independently and combined in a single
    /// writer step. Any name defined on both sides is a duplicate error.
    pub fn merge(&mut self, other: MacroTable) -> Result<()> {
        let mut incoming: Vec<MacroDefinition> = other.macros.into_values().collect();
        incoming.sort_by(|a, b| a.name.cmp(&b.name));
        for def in incoming {
            self.insert(def)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&MacroDefinition> {
        self.macros.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Definitions sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &MacroDefinition> {
        let mut defs: Vec<&MacroDefinition> = self.macros.values().collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs.into_iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|def| def.name.as_str()).collect()
    }
}

/// Definition being accumulated between `#define` and `#enddef`.
struct OpenMacro {
    name: String,
    params: SmallVec<[String; 4]>,
    body: String,
    body_lines: Vec<usize>,
    location: Location,
    /// Line of the `#define` itself, for error messages.
    define_line: usize,
}

impl OpenMacro {
    fn push_line(&mut self, code: &str, line_no: usize) {
        self.body.push_str(code);
        self.body.push('\n');
        self.body_lines.push(line_no);
    }

    fn finish(self) -> MacroDefinition {
        MacroDefinition {
            name: self.name,
            params: self.params,
            body: self.body,
            body_lines: self.body_lines,
            location: self.location,
        }
    }
}

/// Scan `contents` for macro definitions and register them in `table`.
///
/// Returns how many macros this file defined.
pub fn preprocess(file: &str, contents: &str, table: &mut MacroTable) -> Result<usize> {
    let mut open: Option<OpenMacro> = None;
    let mut registered = 0;

    for (n, raw) in contents.lines().enumerate() {
        let line_no = n + 1;
        let line = normalize(raw);

        match line.directive {
            Some(Directive { name: "define", args }) => {
                if let Some(current) = &open {
                    return Err(WmlError::semantic(
                        Location::new(file, line_no),
                        format!(
                            "#define inside the definition of `{}` (opened on line {})",
                            current.name, current.define_line
                        ),
                    ));
                }
                let mut words = args.split_whitespace();
                let Some(name) = words.next() else {
                    return Err(WmlError::syntax(
                        Location::new(file, line_no),
                        "#define without a macro name",
                    ));
                };
                if let Some(existing) = table.get(name) {
                    return Err(WmlError::semantic(
                        Location::new(file, line_no),
                        format!(
                            "duplicate macro name `{name}` (first defined at {})",
                            existing.location
                        ),
                    ));
                }
                open = Some(OpenMacro {
                    name: name.to_string(),
                    params: words.map(str::to_string).collect(),
                    body: String::new(),
                    body_lines: Vec::new(),
                    location: Location::new(file, line_no + 1),
                    define_line: line_no,
                });
                continue;
            }
            Some(Directive { name: "enddef", .. }) => {
                let Some(mut current) = open.take() else {
                    return Err(WmlError::structural(
                        Location::new(file, line_no),
                        "#enddef outside of a macro definition",
                    ));
                };
                if !line.code.is_empty() {
                    current.push_line(line.code, line_no);
                }
                log::trace!("{file}:{line_no}: defined macro `{}`", current.name);
                table.insert(current.finish())?;
                registered += 1;
                continue;
            }
            Some(other) => {
                log::trace!("{file}:{line_no}: ignoring directive #{}", other.name);
            }
            None => {}
        }

        if let Some(current) = &mut open
            && !line.code.is_empty()
        {
            current.push_line(line.code, line_no);
        }
    }

    if let Some(current) = open {
        return Err(WmlError::structural(
            Location::new(file, current.define_line),
            format!("unterminated #define `{}`", current.name),
        ));
    }

    log::debug!("{file}: {registered} macro(s) defined");
    Ok(registered)
}
