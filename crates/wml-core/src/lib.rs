pub mod builder;
pub mod coerce;
pub mod emitter;
pub mod error;
pub mod expand;
pub mod id;
pub mod image;
pub mod line;
pub mod macros;
pub mod model;
mod numeric;
pub mod pipeline;
pub mod template;
pub mod value;

pub use builder::{DocumentBuilder, build_document, build_document_mapped};
pub use coerce::{Coercer, CoercionRules, Rule};
pub use emitter::emit_document;
pub use error::{ErrorCategory, Location, LookupWarning, Result, WmlError};
pub use expand::{DEFAULT_MAX_DEPTH, Expander};
pub use id::TagName;
pub use image::{
    Command, CommandArg, ImageExpression, MAX_ANIMATION_FRAMES, parse_image_expression,
};
pub use macros::{MacroDefinition, MacroTable, preprocess};
pub use model::{Document, Node, Visitor};
pub use pipeline::{
    Expanded, PipelineConfig, convert_source, expand_source, normalize_source, parse_source,
    preprocess_sources,
};
pub use template::{macro_template, macro_templates, template_document};
pub use value::TypedValue;

// Re-export petgraph types so downstream crates don't need a direct dependency
pub use petgraph::graph::NodeIndex;
