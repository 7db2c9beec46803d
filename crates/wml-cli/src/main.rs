//! `wml2json`: expand WML macro files and convert documents into typed JSON
//! or MessagePack.

mod output;
mod report;
mod sources;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use wml_core::{
    Coercer, CoercionRules, DEFAULT_MAX_DEPTH, Expanded, MacroTable, PipelineConfig, Rule,
    emit_document, expand_source, macro_templates, preprocess_sources,
};

use output::{Format, encode, write_output};
use report::render_error;
use sources::{Source, load_macro_sources, read_source};

#[derive(Parser)]
#[command(name = "wml2json", version, about = "WML macro expander and config converter")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a config file into a typed tree.
    Convert {
        #[command(flatten)]
        macros: MacroArgs,
        /// Config file to convert.
        file: PathBuf,
        /// Write the result here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
        /// Also write the macro-expanded text to this path.
        #[arg(long, value_name = "PATH")]
        expanded: Option<PathBuf>,
        /// Keep attributes without a rule as plain strings.
        #[arg(long)]
        no_infer: bool,
        /// Keep this attribute as a plain string (repeatable).
        #[arg(long = "raw", value_name = "KEY")]
        raw: Vec<String>,
    },
    /// Print the macro-expanded text of a config file.
    Expand {
        #[command(flatten)]
        macros: MacroArgs,
        file: PathBuf,
    },
    /// List the macros defined under the macro directories.
    Macros {
        #[command(flatten)]
        macros: MacroArgs,
        /// Print definitions as JSON, bodies included.
        #[arg(long, conflicts_with = "templates")]
        json: bool,
        /// Print each definition as a structured template with `@merge`
        /// calls and `@eval` parameter references.
        #[arg(long)]
        templates: bool,
    },
    /// Expand a config file and print it in canonical layout.
    Normalize {
        #[command(flatten)]
        macros: MacroArgs,
        file: PathBuf,
    },
}

#[derive(Args)]
struct MacroArgs {
    /// Directory searched recursively for `.cfg` macro files (repeatable).
    #[arg(long = "macros", value_name = "DIR")]
    dirs: Vec<PathBuf>,
    /// Nested macro expansions allowed before giving up.
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,
}

/// Everything loaded for one run: sources, the frozen macro table and the
/// pipeline settings.
struct Session {
    sources: Vec<Source>,
    table: MacroTable,
    config: PipelineConfig,
}

impl Session {
    /// Preprocess every macro directory plus `extra`.
    fn load(args: &MacroArgs, extra: &[&Path], rules: CoercionRules) -> Result<Self> {
        let sources = load_macro_sources(&args.dirs, extra)?;
        let table = preprocess_sources(sources.iter().map(|s| (s.name.as_str(), s.text.as_str())));
        let table = check(&sources, table)?;
        let config = PipelineConfig::default()
            .with_max_expansion_depth(args.max_depth)
            .with_rules(rules);
        Ok(Self {
            sources,
            table,
            config,
        })
    }

    fn check<T>(&self, result: wml_core::Result<T>) -> Result<T> {
        check(&self.sources, result)
    }

    fn source_text(&self, name: &str) -> Option<&str> {
        self.sources
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.text.as_str())
    }

    /// Expand `file`, logging a summary of failed lookups.
    fn expand(&self, file: &Path) -> Result<(String, Expanded)> {
        let name = file.display().to_string();
        let text = match self.source_text(&name) {
            Some(text) => text.to_string(),
            None => read_source(file)?,
        };
        let expanded = self.check(expand_source(&name, &text, &self.table, &self.config))?;
        if expanded.warnings.is_empty() {
            log::info!("{name}: expanded with no missing macros");
        } else {
            log::warn!(
                "{name}: {} invocation(s) of undefined macros",
                expanded.warnings.len()
            );
        }
        Ok((name, expanded))
    }
}

/// Turn a core error into a report that quotes the offending line.
fn check<T>(sources: &[Source], result: wml_core::Result<T>) -> Result<T> {
    result.map_err(|err| {
        let text = sources
            .iter()
            .find(|s| s.name == err.location().file)
            .map(|s| s.text.as_str());
        anyhow!(render_error(&err, text))
    })
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Convert {
            macros,
            file,
            output,
            format,
            expanded,
            no_infer,
            raw,
        } => {
            let rules = raw
                .iter()
                .fold(CoercionRules::default(), |rules, key| {
                    rules.with_rule(key.as_str(), Rule::Text)
                })
                .infer_scalars(!no_infer);
            let session = Session::load(&macros, &[file.as_path()], rules)?;
            let (name, source) = session.expand(&file)?;
            if let Some(path) = expanded {
                write_output(Some(&path), source.text.as_bytes())?;
            }
            let doc = session.check(source.build(&name))?;
            let value = session.check(
                Coercer::new(&session.config.rules)
                    .for_file(name.as_str())
                    .coerce_document(&doc),
            )?;
            let bytes = encode(&value, format)?;
            write_output(output.as_deref(), &bytes)?;
            log::info!("{name}: {} node(s) converted", doc.node_count() - 1);
        }
        Command::Expand { macros, file } => {
            let session = Session::load(&macros, &[file.as_path()], CoercionRules::default())?;
            let (_, expanded) = session.expand(&file)?;
            write_output(None, expanded.text.as_bytes())?;
        }
        Command::Macros {
            macros,
            json,
            templates,
        } => {
            let session = Session::load(&macros, &[], CoercionRules::default())?;
            if templates {
                let (value, failures) = macro_templates(&session.table);
                for err in &failures {
                    log::warn!("skipping template: {err}");
                }
                write_output(None, &encode(&value, Format::Json)?)?;
            } else if json {
                let defs: Vec<_> = session.table.iter().collect();
                write_output(None, &encode(&defs, Format::Json)?)?;
            } else {
                let mut listing = String::new();
                for def in session.table.iter() {
                    let mut signature = def.name.clone();
                    for param in &def.params {
                        signature.push(' ');
                        signature.push_str(param);
                    }
                    listing.push_str(&format!("{signature:<40} {}\n", def.location));
                }
                write_output(None, listing.as_bytes())?;
            }
            log::info!("{} macro(s)", session.table.len());
        }
        Command::Normalize { macros, file } => {
            let session = Session::load(&macros, &[file.as_path()], CoercionRules::default())?;
            let (name, expanded) = session.expand(&file)?;
            let doc = session.check(expanded.build(&name))?;
            write_output(None, emit_document(&doc).as_bytes())?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(cli).context("wml2json failed") {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
