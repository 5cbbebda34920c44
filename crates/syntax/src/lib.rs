//! Syntax errors with an optional source position.
//!
//! Parsers raise a [`SyntaxError`] at the point where a rule is violated.
//! The rendered message is stable:
//!
//! - `"<message> at eof"` when no position is known
//! - `"<message> at <line>:<row>"` otherwise
//!
//! The raw message and the coordinates stay available through accessors so
//! callers can log them as separate fields instead of parsing the rendered
//! string back.
//!
//! ```
//! use kfktools_syntax::SyntaxError;
//!
//! let err = SyntaxError::new("unexpected token", 12, 5);
//! assert_eq!(err.to_string(), "unexpected token at 12:5");
//! assert_eq!(err.message(), "unexpected token");
//! assert_eq!(err.position(), Some((12, 5)));
//! ```

use std::fmt;
use thiserror::Error;

/// A syntax violation, optionally tied to a 1-based line and row.
///
/// A coordinate of `0` means "unset". When both are unset the error
/// refers to the end of the input.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
#[error("{message} at {}", location_of(.line, .row))]
pub struct SyntaxError {
    message: String,
    line: u64,
    row: u64,
}

impl SyntaxError {
    /// Error at a known position.
    pub fn new(message: impl Into<String>, line: u64, row: u64) -> Self {
        Self {
            message: message.into(),
            line,
            row,
        }
    }

    /// Error at the end of the input, where no position can be given.
    pub fn at_eof(message: impl Into<String>) -> Self {
        Self::new(message, 0, 0)
    }

    /// The message without the position suffix.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 1-based line, or `0` when unset.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// 1-based row within the line, or `0` when unset.
    pub fn row(&self) -> u64 {
        self.row
    }

    /// `(line, row)` unless the error is at the end of the input.
    pub fn position(&self) -> Option<(u64, u64)> {
        match self.location() {
            Location::Eof => None,
            Location::At { line, row } => Some((line, row)),
        }
    }

    pub fn location(&self) -> Location {
        Location::from_coordinates(self.line, self.row)
    }
}

/// Where a [`SyntaxError`] occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// End of input; rendered as `eof`.
    Eof,
    /// Rendered as `<line>:<row>`.
    At { line: u64, row: u64 },
}

impl Location {
    fn from_coordinates(line: u64, row: u64) -> Self {
        if line == 0 && row == 0 {
            Location::Eof
        } else {
            Location::At { line, row }
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Eof => f.write_str("eof"),
            Location::At { line, row } => write!(f, "{line}:{row}"),
        }
    }
}

fn location_of(line: &u64, row: &u64) -> Location {
    Location::from_coordinates(*line, *row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_eof_without_position() {
        let err = SyntaxError::at_eof("unterminated string");
        assert_eq!(err.to_string(), "unterminated string at eof");
        assert_eq!(err.line(), 0);
        assert_eq!(err.row(), 0);
        assert_eq!(err.position(), None);
        assert_eq!(err.location(), Location::Eof);
    }

    #[test]
    fn test_renders_line_and_row() {
        let err = SyntaxError::new("unexpected token", 12, 5);
        assert_eq!(err.to_string(), "unexpected token at 12:5");
        assert_eq!(err.message(), "unexpected token");
        assert_eq!(err.line(), 12);
        assert_eq!(err.row(), 5);
        assert_eq!(err.location(), Location::At { line: 12, row: 5 });
    }

    #[test]
    fn test_renders_decimal_coordinates() {
        for (line, row) in [(1, 1), (9, 10), (100, 7), (u64::MAX, 3)] {
            let err = SyntaxError::new("bad", line, row);
            assert_eq!(err.to_string(), format!("bad at {line}:{row}"));
        }
    }

    #[test]
    fn test_zero_coordinates_mean_eof() {
        assert_eq!(SyntaxError::new("x", 0, 0), SyntaxError::at_eof("x"));
        assert_eq!(SyntaxError::new("x", 0, 0).to_string(), "x at eof");
    }

    #[test]
    fn test_partial_position_is_kept() {
        let err = SyntaxError::new("missing value", 4, 0);
        assert_eq!(err.to_string(), "missing value at 4:0");
        assert_eq!(err.position(), Some((4, 0)));
    }

    #[test]
    fn test_is_std_error() {
        let err: Box<dyn std::error::Error + Send + Sync> =
            Box::new(SyntaxError::new("oops", 2, 3));
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "oops at 2:3");
    }
}
