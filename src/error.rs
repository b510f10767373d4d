//! Compilation error types

use std::path::PathBuf;

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Byte range in template text
pub type Span = std::ops::Range<usize>;

/// Errors reported by a compiler service
///
/// `Clone` because a failed compilation is shared by every caller awaiting
/// the same cache entry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("template syntax error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },

    #[error("cannot read template file {path}: {message}")]
    TemplateFile { path: PathBuf, message: String },

    #[error("compilation failed: {message}")]
    Failed { message: String },
}

impl CompileError {
    pub fn failed(message: impl Into<String>) -> Self {
        CompileError::Failed {
            message: message.into(),
        }
    }

    /// Format the error with template context using ariadne
    ///
    /// Errors without a span fall back to their display text.
    pub fn format(&self, source: &str, filename: &str) -> String {
        let CompileError::Syntax {
            span,
            message,
            expected,
        } = self
        else {
            return self.to_string();
        };

        let expected_str = if expected.is_empty() {
            String::new()
        } else {
            format!("\nExpected: {}", expected.join(", "))
        };

        let mut buf = Vec::new();
        let written = Report::build(ReportKind::Error, filename, span.start)
            .with_message(message)
            .with_label(
                Label::new((filename, span.clone()))
                    .with_message(format!("{}{}", message, expected_str))
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}
