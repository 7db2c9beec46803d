//! Error taxonomy for the WML pipeline.
//!
//! Every fatal condition is one of three categories. Undefined macro
//! invocations are not errors: they surface as [`LookupWarning`]s and the
//! rest of the input keeps parsing.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Source position used in diagnostics: file name plus 1-based line.
///
/// A line of `0` means the position is unknown (for example a value parsed
/// out of an attribute after the document was built).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// A location with no file and no line.
    pub fn unknown() -> Self {
        Self::default()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.file.is_empty(), self.line) {
            (true, 0) => write!(f, "<input>"),
            (true, line) => write!(f, "<input>:{line}"),
            (false, 0) => write!(f, "{}", self.file),
            (false, line) => write!(f, "{}:{line}", self.file),
        }
    }
}

/// Broad class of a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Tag mismatches, unknown merge targets, unbalanced braces.
    Structural,
    /// Missing `=`, unterminated strings, malformed numbers and ranges.
    Syntax,
    /// Duplicate macros, arity mismatches, runaway expansion.
    Semantic,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WmlError {
    #[error("{location}: structural error: {message}")]
    Structural { location: Location, message: String },

    #[error("{location}: syntax error: {message}")]
    Syntax { location: Location, message: String },

    #[error("{location}: semantic error: {message}")]
    Semantic { location: Location, message: String },
}

impl WmlError {
    pub fn structural(location: Location, message: impl Into<String>) -> Self {
        Self::Structural {
            location,
            message: message.into(),
        }
    }

    pub fn syntax(location: Location, message: impl Into<String>) -> Self {
        Self::Syntax {
            location,
            message: message.into(),
        }
    }

    pub fn semantic(location: Location, message: impl Into<String>) -> Self {
        Self::Semantic {
            location,
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Structural { .. } => ErrorCategory::Structural,
            Self::Syntax { .. } => ErrorCategory::Syntax,
            Self::Semantic { .. } => ErrorCategory::Semantic,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            Self::Structural { location, .. }
            | Self::Syntax { location, .. }
            | Self::Semantic { location, .. } => location,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Structural { message, .. }
            | Self::Syntax { message, .. }
            | Self::Semantic { message, .. } => message,
        }
    }

    /// Replace an unknown location with `fallback`.
    ///
    /// Used when an error raised on a detached value (an image expression,
    /// a numeric list) bubbles up to a caller that knows where it came from.
    #[must_use]
    pub fn or_at(mut self, fallback: &Location) -> Self {
        let slot = match &mut self {
            Self::Structural { location, .. }
            | Self::Syntax { location, .. }
            | Self::Semantic { location, .. } => location,
        };
        if slot.file.is_empty() && slot.line == 0 {
            *slot = fallback.clone();
        }
        self
    }
}

/// A macro invocation that named no known macro. Recoverable: the invocation
/// expands to nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupWarning {
    pub location: Location,
    pub name: String,
}

impl fmt::Display for LookupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: no macro definition for `{}`", self.location, self.name)
    }
}

pub type Result<T> = std::result::Result<T, WmlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_file_and_line() {
        let err = WmlError::structural(Location::new("terrain.cfg", 12), "tag name mismatch");
        assert_eq!(
            err.to_string(),
            "terrain.cfg:12: structural error: tag name mismatch"
        );
        assert_eq!(err.category(), ErrorCategory::Structural);
    }

    #[test]
    fn or_at_fills_only_unknown_locations() {
        let here = Location::new("a.cfg", 3);
        let detached = WmlError::syntax(Location::unknown(), "bad range").or_at(&here);
        assert_eq!(detached.location(), &here);

        let placed = WmlError::syntax(Location::new("b.cfg", 9), "bad range").or_at(&here);
        assert_eq!(placed.location().file, "b.cfg");
    }
}
