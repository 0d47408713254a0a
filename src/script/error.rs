//! Error types for reading and parsing harness scripts.

use super::token::Span;
use thiserror::Error;

/// An error encountered while turning script text into commands.
///
/// All variants carry the span of the offending input so the driver can
/// report `line:column` before any test runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// Malformed token: unterminated string, bad escape, stray character.
    #[error("{span}: {message}")]
    Lex { message: String, span: Span },

    /// Unbalanced parentheses or trailing input.
    #[error("{message} at line {}, column {}", span.line, span.column)]
    Read { message: String, span: Span },

    /// Well-formed S-expressions that do not form a valid command.
    #[error("{span}: {message}")]
    Syntax { message: String, span: Span },
}

impl ScriptError {
    pub fn lex(message: impl Into<String>, span: Span) -> Self {
        Self::Lex {
            message: message.into(),
            span,
        }
    }

    pub fn read(message: impl Into<String>, span: Span) -> Self {
        Self::Read {
            message: message.into(),
            span,
        }
    }

    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::Syntax {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Lex { span, .. } | Self::Read { span, .. } | Self::Syntax { span, .. } => *span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Lex { message, .. } | Self::Read { message, .. } | Self::Syntax { message, .. } => message,
        }
    }
}
