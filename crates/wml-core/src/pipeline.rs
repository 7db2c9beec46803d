//! End-to-end pipeline: preprocess → expand → build → coerce.
//!
//! Preprocessing must finish over the whole corpus before any file is
//! expanded. After that the [`MacroTable`] is only borrowed, so the later
//! stages can run per file in any order.

use crate::builder::build_document_mapped;
use crate::coerce::{Coercer, CoercionRules};
use crate::emitter::emit_document;
use crate::error::{LookupWarning, Result};
use crate::expand::{DEFAULT_MAX_DEPTH, Expander};
use crate::macros::{MacroTable, preprocess};
use crate::model::Document;
use crate::value::TypedValue;

// ─── Config ───────────────────────────────────────────────────────────────

/// Configuration for the pipeline entry points.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Nested macro expansions allowed before giving up. Default: **64**.
    pub max_expansion_depth: usize,

    /// Attribute coercion table. Default: the terrain-graphics rules.
    pub rules: CoercionRules,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_expansion_depth: DEFAULT_MAX_DEPTH,
            rules: CoercionRules::default(),
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn with_max_expansion_depth(mut self, depth: usize) -> Self {
        self.max_expansion_depth = depth;
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: CoercionRules) -> Self {
        self.rules = rules;
        self
    }
}

/// Macro-free text plus the lookups that failed along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Expanded {
    pub text: String,
    pub warnings: Vec<LookupWarning>,
    /// Source line of each line of `text`.
    pub line_map: Vec<usize>,
}

impl Expanded {
    /// Build the document, reporting positions in the unexpanded file.
    pub fn build(&self, file: &str) -> Result<Document> {
        build_document_mapped(file, &self.text, &self.line_map)
    }
}

// ─── Pipeline ─────────────────────────────────────────────────────────────

/// Collect the macro definitions of every `(name, text)` source into one
/// table. A name defined twice anywhere is fatal.
pub fn preprocess_sources<'a, I>(sources: I) -> Result<MacroTable>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut table = MacroTable::new();
    let mut files = 0usize;
    for (name, text) in sources {
        preprocess(name, text, &mut table)?;
        files += 1;
    }
    log::info!("{} macro(s) from {files} file(s)", table.len());
    Ok(table)
}

/// Expand every macro invocation in `text`.
pub fn expand_source(
    file: &str,
    text: &str,
    table: &MacroTable,
    config: &PipelineConfig,
) -> Result<Expanded> {
    let mut expander = Expander::new(table).with_max_depth(config.max_expansion_depth);
    let (text, line_map) = expander.expand_mapped(file, text)?;
    Ok(Expanded {
        text,
        warnings: expander.into_warnings(),
        line_map,
    })
}

/// Expand and build the document tree.
///
/// Lookup warnings are logged by the expander and otherwise dropped; use
/// [`expand_source`] and [`Expanded::build`] directly to keep them.
pub fn parse_source(
    file: &str,
    text: &str,
    table: &MacroTable,
    config: &PipelineConfig,
) -> Result<Document> {
    expand_source(file, text, table, config)?.build(file)
}

/// Expand, build and coerce into a typed tree.
pub fn convert_source(
    file: &str,
    text: &str,
    table: &MacroTable,
    config: &PipelineConfig,
) -> Result<TypedValue> {
    let doc = parse_source(file, text, table, config)?;
    Coercer::new(&config.rules).for_file(file).coerce_document(&doc)
}

/// Expand, build and re-emit canonical text.
///
/// Idempotent: normalizing the output again yields the same text.
pub fn normalize_source(
    file: &str,
    text: &str,
    table: &MacroTable,
    config: &PipelineConfig,
) -> Result<String> {
    let doc = parse_source(file, text, table, config)?;
    Ok(emit_document(&doc))
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCategory, Location};
    use pretty_assertions::assert_eq;

    const MACROS: &str = "\
#define TILE X Y TYPE
    [tile]
        x,y={X},{Y}
        type={TYPE}
    [/tile]
#enddef
";

    const TERRAIN: &str = "\
[terrain_graphics]
    {TILE 0 0 Gg}
    {TILE 1 0 (Gs, Gd)}
    probability=40
    [image]
        name=grass[1~2].png:150
    [/image]
[/terrain_graphics]
";

    fn table() -> MacroTable {
        preprocess_sources([("macros.cfg", MACROS)]).expect("macros")
    }

    #[test]
    fn convert_end_to_end() {
        let value = convert_source("terrain.cfg", TERRAIN, &table(), &PipelineConfig::default())
            .expect("convert failed");
        let tg = &value.get("terrain_graphics").and_then(TypedValue::as_list).unwrap()[0];
        assert_eq!(tg.get("probability"), Some(&TypedValue::Int(40)));

        let tiles = tg.get("tile").and_then(TypedValue::as_list).unwrap();
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[1].get("x"), Some(&TypedValue::Int(1)));
        assert_eq!(tiles[1].get("type"), Some(&vec!["Gs", "Gd"].into()));

        let image = &tg.get("image").and_then(TypedValue::as_list).unwrap()[0];
        assert_eq!(image.get("name"), Some(&TypedValue::from("grass@A.png")));
        assert_eq!(image.get("animation_timing"), Some(&TypedValue::Float(150.0)));
    }

    #[test]
    fn expand_reports_missing_macros() {
        let expanded = expand_source(
            "t.cfg",
            "[a]\n{NOPE}\n[/a]\n",
            &table(),
            &PipelineConfig::default(),
        )
        .unwrap();
        assert_eq!(expanded.warnings.len(), 1);
        assert_eq!(expanded.warnings[0].name, "NOPE");
        assert!(parse_source("t.cfg", "[a]\n{NOPE}\n[/a]\n", &table(), &PipelineConfig::default()).is_ok());
    }

    #[test]
    fn depth_limit_comes_from_config() {
        let table = preprocess_sources([(
            "m.cfg",
            "#define A\n{B}\n#enddef\n#define B\n{C}\n#enddef\n#define C\nx=1\n#enddef\n",
        )])
        .unwrap();
        let shallow = PipelineConfig::default().with_max_expansion_depth(1);
        let err = expand_source("t.cfg", "{A}", &table, &shallow).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Semantic);
        assert!(expand_source("t.cfg", "{A}", &table, &PipelineConfig::default()).is_ok());
    }

    #[test]
    fn normalize_is_idempotent() {
        let config = PipelineConfig::default();
        let table = table();
        let first = normalize_source("terrain.cfg", TERRAIN, &table, &config).unwrap();
        let second = normalize_source("terrain.cfg", &first, &table, &config).unwrap();
        assert_eq!(first, second);
        assert!(first.contains("x,y=1,0"));
    }

    #[test]
    fn build_errors_point_at_unexpanded_lines() {
        let config = PipelineConfig::default();
        let err = parse_source("t.cfg", "# header comment\n\n[a]\n[/b]\n", &table(), &config)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Structural);
        assert_eq!(err.location(), &Location::new("t.cfg", 4));

        let err = parse_source("t.cfg", "[a]\n{TILE 0 0 Gg}\n[/b]\n", &table(), &config)
            .unwrap_err();
        assert_eq!(err.location(), &Location::new("t.cfg", 3));

        let err = parse_source("t.cfg", "[a]\n{TILE 0 0 Gg}\nno equals\n[/a]\n", &table(), &config)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Syntax);
        assert_eq!(err.location().line, 3);
    }

    #[test]
    fn coercion_errors_point_at_unexpanded_lines() {
        let text = "# layer must be numeric\n{TILE 0 0 Gg}\n[a]\nlayer=top\n[/a]\n";
        let err = convert_source("t.cfg", text, &table(), &PipelineConfig::default()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Syntax);
        assert_eq!(err.location(), &Location::new("t.cfg", 3));
    }

    #[test]
    fn duplicates_across_sources_are_fatal() {
        let err = preprocess_sources([("a.cfg", MACROS), ("b.cfg", MACROS)]).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Semantic);
        assert_eq!(err.location().file, "b.cfg");
    }
}
