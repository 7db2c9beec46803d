//! Output writers for the typed tree.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// MessagePack with string map keys.
    Msgpack,
}

/// Serialize `value` in the requested format.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => {
            let mut bytes = serde_json::to_vec_pretty(value).context("JSON encoding failed")?;
            bytes.push(b'\n');
            Ok(bytes)
        }
        Format::Msgpack => rmp_serde::to_vec_named(value).context("MessagePack encoding failed"),
    }
}

/// Write to `path`, or stdout when `None`.
pub fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes).context("failed to write to stdout")?;
            stdout.flush().context("failed to write to stdout")
        }
    }
}
