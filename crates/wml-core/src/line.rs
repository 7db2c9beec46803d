//! Line normalizer: splits a raw line into its code portion and an optional
//! preprocessor directive.
//!
//! `#` starts a comment unless it sits inside a double-quoted span on the
//! same line. The comment text is a directive (`#define`, `#enddef`,
//! `#textdomain`, ...) when it follows the `#` immediately; `# ...` and
//! `## ...` are plain comments.

/// A preprocessor statement found after `#`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive<'a> {
    /// First word after `#`, e.g. `define`.
    pub name: &'a str,
    /// Everything after the name, trimmed.
    pub args: &'a str,
}

/// One normalized source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// Code before the comment, trimmed. Empty for blank and comment lines.
    pub code: &'a str,
    pub directive: Option<Directive<'a>>,
}

impl Line<'_> {
    /// Callers emit nothing for this line (still counted for line numbers).
    pub fn is_skippable(&self) -> bool {
        self.code.is_empty()
    }
}

/// Normalize one raw line.
pub fn normalize(raw: &str) -> Line<'_> {
    let Some(pos) = comment_start(raw) else {
        return Line {
            code: raw.trim(),
            directive: None,
        };
    };

    let code = raw[..pos].trim();
    let stmt = raw[pos + 1..].trim_end();
    let directive = if stmt.is_empty() || stmt.starts_with(|c: char| c == '#' || c.is_whitespace())
    {
        None
    } else {
        let (name, args) = match stmt.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (stmt, ""),
        };
        Some(Directive { name, args })
    };

    Line { code, directive }
}

/// Byte offset of the first `#` outside a double-quoted span.
fn comment_start(raw: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (i, c) in raw.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_code_is_trimmed() {
        let line = normalize("   layer=-80  \r");
        assert_eq!(line.code, "layer=-80");
        assert!(line.directive.is_none());
        assert!(!line.is_skippable());
    }

    #[test]
    fn blank_and_comment_lines_are_skippable() {
        assert!(normalize("").is_skippable());
        assert!(normalize("    ").is_skippable());
        assert!(normalize("# just a comment").is_skippable());
        assert!(normalize("## wmllint: skip").is_skippable());
        assert!(normalize("#").is_skippable());
        assert!(normalize("# comment").directive.is_none());
        assert!(normalize("## double").directive.is_none());
    }

    #[test]
    fn trailing_comment_is_removed() {
        let line = normalize("probability=50 # rarely");
        assert_eq!(line.code, "probability=50");
        assert!(line.directive.is_none());
    }

    #[test]
    fn define_directive_is_split() {
        let line = normalize("#define OVERLAY_RANDOM_LF  TERRAIN IMAGESTEM");
        assert!(line.is_skippable());
        assert_eq!(
            line.directive,
            Some(Directive {
                name: "define",
                args: "OVERLAY_RANDOM_LF  TERRAIN IMAGESTEM"
            })
        );
        assert_eq!(normalize("  #enddef").directive.map(|d| d.name), Some("enddef"));
    }

    #[test]
    fn hash_inside_quotes_is_not_a_comment() {
        let line = normalize(r#"text="color #FF0000" # real comment"#);
        assert_eq!(line.code, r#"text="color #FF0000""#);
    }

    #[test]
    fn code_with_directive_keeps_both() {
        let line = normalize("[/terrain_graphics] #enddef");
        assert_eq!(line.code, "[/terrain_graphics]");
        assert_eq!(line.directive.map(|d| d.name), Some("enddef"));
    }
}
