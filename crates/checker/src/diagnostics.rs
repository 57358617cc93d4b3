//! User-facing rendering of type errors
//!
//! A diagnostic is three lines: the error kind and message, the offending
//! source line without trailing whitespace, and a caret under the column
//! the error was found at. Several diagnostics are separated by one blank line:
//!
//! ```text
//! UndefinedNameError: name 'frob' not previously defined (line 2, column 5)
//! 1 2 frob
//!     ^
//! ```

use crate::ast::Span;
use crate::error::{CheckError, InternalError, TypeError};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub label: &'static str,
    pub message: String,
    pub span: Option<Span>,
    /// The source line the span points into, if it exists
    pub source_line: Option<String>,
}

impl Diagnostic {
    pub fn from_error(error: &TypeError, source: &str) -> Self {
        let source_line = error
            .span
            .and_then(|span| span.line.checked_sub(1))
            .and_then(|index| source.lines().nth(index))
            .map(|line| line.trim_end().to_string());
        Diagnostic {
            label: error.label(),
            message: error.kind.to_string(),
            span: error.span,
            source_line,
        }
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.message)?;
        let Some(span) = self.span else {
            return Ok(());
        };
        write!(f, " ({})", span)?;
        if let Some(line) = &self.source_line {
            write!(f, "\n{}\n{}^", line, " ".repeat(span.column))?;
        }
        Ok(())
    }
}

/// Turn the outcome of checking a unit into a diagnostic
///
/// Internal errors are handed back untouched: they are defects in the
/// checker and must not be shown as if the program were at fault.
pub fn report(error: CheckError, source: &str) -> Result<Diagnostic, InternalError> {
    match error {
        CheckError::Type(err) => Ok(Diagnostic::from_error(&err, source)),
        CheckError::Internal(err) => Err(err),
    }
}

/// Render several diagnostics, one blank line between each
pub fn render_all(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(Diagnostic::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}
