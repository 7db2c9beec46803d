//! Source discovery and loading.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extension of config files picked up from macro directories.
pub const CONFIG_EXTENSION: &str = "cfg";

/// A loaded source file: display name plus text.
#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub text: String,
}

/// Read a file as UTF-8 text.
pub fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Every regular file under `root` with the given extension, as
/// `(relative, absolute)` pairs sorted by relative path.
pub fn discover(root: &Path, extension: &str) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry =
            entry.with_context(|| format!("failed to walk directory {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        files.push((relative, path.to_path_buf()));
    }
    files.sort();
    Ok(files)
}

/// Load every config file under each macro directory, then `extra` files
/// not already included. Order is directory order, then `extra`.
pub fn load_macro_sources(dirs: &[PathBuf], extra: &[&Path]) -> Result<Vec<Source>> {
    let mut seen = std::collections::HashSet::new();
    let mut sources = Vec::new();

    let discovered = dirs
        .iter()
        .map(|dir| discover(dir, CONFIG_EXTENSION))
        .collect::<Result<Vec<_>>>()?;
    let candidates = discovered
        .into_iter()
        .flatten()
        .map(|(_, absolute)| absolute)
        .chain(extra.iter().map(|p| p.to_path_buf()));

    for path in candidates {
        let key = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if !seen.insert(key) {
            continue;
        }
        let text = read_source(&path)?;
        sources.push(Source {
            name: path.display().to_string(),
            text,
        });
    }
    log::debug!("loaded {} macro source(s)", sources.len());
    Ok(sources)
}
