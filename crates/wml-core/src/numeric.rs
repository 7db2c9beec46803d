//! Numeric literal recognizers shared by the coercer and the image parser.

use winnow::ascii::{digit0, digit1};
use winnow::combinator::opt;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::one_of;

/// `-12`, `+3`, `007`.
pub(crate) fn integer_literal<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (opt(one_of(['-', '+'])), digit1).take().parse_next(input)
}

/// `-80`, `0.5`, `100.` (an integer part is required).
pub(crate) fn decimal_literal<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (opt(one_of(['-', '+'])), digit1, opt(('.', digit0)))
        .take()
        .parse_next(input)
}

pub(crate) fn integer(input: &mut &str) -> ModalResult<i64> {
    integer_literal
        .parse_next(input)?
        .parse::<i64>()
        .map_err(|_| ErrMode::Backtrack(ContextError::new()))
}

/// The whole of `s` as an integer.
pub(crate) fn parse_integer(s: &str) -> Option<i64> {
    integer.parse(s.trim()).ok()
}

/// The whole of `s` as a decimal number.
pub(crate) fn parse_decimal(s: &str) -> Option<f64> {
    decimal_literal.parse(s.trim()).ok()?.parse().ok()
}

/// The whole of `s` is a numeric literal with a fractional part.
pub(crate) fn is_fractional(s: &str) -> bool {
    decimal_literal.parse(s.trim()).is_ok_and(|lit| lit.contains('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers() {
        assert_eq!(parse_integer("-80"), Some(-80));
        assert_eq!(parse_integer("007"), Some(7));
        assert_eq!(parse_integer(" 12 "), Some(12));
        assert_eq!(parse_integer("1.5"), None);
        assert_eq!(parse_integer("12a"), None);
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("99999999999999999999"), None);
    }

    #[test]
    fn decimals() {
        assert_eq!(parse_decimal("100"), Some(100.0));
        assert_eq!(parse_decimal("0.5"), Some(0.5));
        assert_eq!(parse_decimal("-2."), Some(-2.0));
        assert_eq!(parse_decimal(".5"), None);
        assert_eq!(parse_decimal("fast"), None);
        assert!(is_fractional("0.25"));
        assert!(!is_fractional("25"));
    }
}
