//! Rendering of pipeline errors for the terminal.

use std::fmt;

use colored::Colorize;

use crate::error::BriskError;
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A message tied to a pipeline stage and, when known, a source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: &'static str,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn new(severity: Severity, stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            stage,
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn from_error(error: &BriskError) -> Self {
        let message = match error {
            BriskError::Lexer(e) => e.to_string(),
            BriskError::Parser(e) => e.to_string(),
            BriskError::Compile(e) => e.to_string(),
            BriskError::Runtime(e) => e.to_string(),
            BriskError::Io(e) => e.to_string(),
        };
        Self {
            severity: Severity::Error,
            stage: error.stage(),
            message,
            span: error.span(),
        }
    }

    /// Render as a header line, then the location and the offending source
    /// line with a caret underline when both are available.
    pub fn render(&self, source: Option<&str>, path: &str) -> String {
        let label = format!("{}[{}]", self.severity, self.stage);
        let label = match self.severity {
            Severity::Error => label.red().bold(),
            Severity::Warning => label.yellow().bold(),
            Severity::Info => label.cyan().bold(),
        };
        let mut output = format!("{}: {}\n", label, self.message.bold());

        let Some(span) = self.span else {
            output.push_str(&format!(" {} {}\n", "-->".blue().bold(), path));
            return output;
        };
        output.push_str(&format!(" {} {}:{}\n", "-->".blue().bold(), path, span));

        let line = source.and_then(|source| source.lines().nth(span.line.saturating_sub(1)));
        if let Some(text) = line {
            let gutter = "  |".blue().bold();
            let padding = " ".repeat(span.column.saturating_sub(1));
            let underline = "^".repeat(caret_len(span, text));
            output.push_str(&format!("{} {}\n", gutter, text));
            output.push_str(&format!("{} {}{}\n", gutter, padding, underline.red().bold()));
        }
        output
    }
}

/// Underline the span, clipped to the end of its line; at least one caret.
fn caret_len(span: Span, line: &str) -> usize {
    let remaining = line
        .chars()
        .count()
        .saturating_sub(span.column.saturating_sub(1));
    span.len().min(remaining).max(1)
}

impl From<&BriskError> for Diagnostic {
    fn from(error: &BriskError) -> Self {
        Diagnostic::from_error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompileError, ParserError, RuntimeError};
    use pretty_assertions::assert_eq;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_render_with_source_line() {
        plain();
        let source = "fun main() -> i32 begin\n    return missing()\nend";
        let error: BriskError =
            CompileError::undeclared("missing", Span::new(35, 42, 2, 12)).into();
        let rendered = Diagnostic::from_error(&error).render(Some(source), "demo.bk");
        let expected = format!(
            "error[compile]: {}\n --> demo.bk:2:12\n  |     return missing()\n  |            ^^^^^^^\n",
            CompileError::undeclared("missing", Span::default())
        );
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_render_without_span() {
        plain();
        let error: BriskError = RuntimeError::DivisionByZero(0x10).into();
        let diagnostic = Diagnostic::from_error(&error);
        assert_eq!(diagnostic.stage, "runtime");
        assert_eq!(diagnostic.span, None);
        assert_eq!(
            diagnostic.render(None, "demo.bk"),
            "error[runtime]: Division by zero at ip 0x10\n --> demo.bk\n"
        );
    }

    #[test]
    fn test_caret_clipped_to_line() {
        plain();
        let error: BriskError =
            ParserError::expected_expression("end of file", Span::new(3, 3, 1, 4)).into();
        let rendered = Diagnostic::from_error(&error).render(Some("x ="), "a.bk");
        assert!(rendered.starts_with("error[parse]: "));
        assert!(rendered.ends_with("  | x =\n  |    ^\n"));
    }

    #[test]
    fn test_missing_source_line() {
        plain();
        let diagnostic = Diagnostic::new(Severity::Warning, "lex", "odd input")
            .with_span(Span::new(0, 1, 9, 1));
        assert_eq!(
            diagnostic.render(Some("one line"), "a.bk"),
            "warning[lex]: odd input\n --> a.bk:9:1\n"
        );
    }
}
