//! Human-readable error reports: the error line plus the offending source
//! line, when it can be found.

use wml_core::WmlError;

/// Render `err` for stderr. `source` is the text of the file the error
/// points into, when available.
pub fn render_error(err: &WmlError, source: Option<&str>) -> String {
    let mut out = err.to_string();
    let line = err.location().line;
    if line == 0 {
        return out;
    }
    if let Some(text) = source.and_then(|s| s.lines().nth(line - 1)) {
        let gutter = line.to_string();
        out.push_str(&format!("\n {gutter} | {}", text.trim_end()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wml_core::Location;

    #[test]
    fn includes_source_line() {
        let err = WmlError::structural(Location::new("t.cfg", 2), "tag name mismatch");
        let out = render_error(&err, Some("[a]\n[/b]\n"));
        assert_eq!(out, "t.cfg:2: structural error: tag name mismatch\n 2 | [/b]");
    }

    #[test]
    fn unknown_line_is_bare() {
        let err = WmlError::syntax(Location::unknown(), "bad range");
        assert_eq!(render_error(&err, Some("x")), "<input>: syntax error: bad range");
        let err = WmlError::syntax(Location::new("t.cfg", 9), "bad range");
        assert_eq!(render_error(&err, Some("x")), "t.cfg:9: syntax error: bad range");
    }
}
