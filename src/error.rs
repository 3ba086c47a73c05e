//! Error types for parsing and rendering.

use std::fmt;

use thiserror::Error;

/// A location inside template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Byte offset from the start of the source.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
}

impl Position {
    /// Compute the position of byte `offset` within `source`.
    pub fn locate(source: &str, offset: usize) -> Self {
        LineIndex::new(source).locate(offset)
    }
}

/// Line-start table for turning byte offsets into [`Position`]s.
#[derive(Debug, Clone)]
pub(crate) struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            line_starts,
        }
    }

    pub(crate) fn locate(&self, offset: usize) -> Position {
        let mut offset = offset.min(self.source.len());
        while !self.source.is_char_boundary(offset) {
            offset -= 1;
        }
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = self.line_starts[line];
        Position {
            offset,
            line: line + 1,
            column: self.source[line_start..offset].chars().count() + 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Errors detected while turning source text into a [`crate::Template`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// A `[%` with no matching `%]`.
    #[error("unterminated directive starting at {position}")]
    UnterminatedDirective { position: Position },

    /// An `END` with no open `IF`.
    #[error("END without matching IF at {position}")]
    UnmatchedEnd { position: Position },

    /// End of input reached while an `IF` was still open.
    #[error("IF opened at {position} is never closed with END")]
    UnterminatedIf { position: Position },

    /// Something other than a valid expression where one was expected.
    #[error("invalid expression at {position}: {message} (found `{found}`)")]
    InvalidExpression {
        found: String,
        message: String,
        position: Position,
    },

    /// A quoted string with no closing quote.
    #[error("unterminated string literal at {position}")]
    UnterminatedString { position: Position },

    /// `IF` blocks or expression operators nested deeper than the configured
    /// limit.
    #[error("nesting deeper than {max_depth} at {position}")]
    NestingTooDeep { max_depth: usize, position: Position },
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::UnterminatedDirective { position }
            | ParseError::UnmatchedEnd { position }
            | ParseError::UnterminatedIf { position }
            | ParseError::InvalidExpression { position, .. }
            | ParseError::UnterminatedString { position }
            | ParseError::NestingTooDeep { position, .. } => *position,
        }
    }
}

/// Errors raised while evaluating a parsed template against a context.
///
/// These are lazy: an expression on an untaken branch never produces one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// A method was applied to a value of the wrong kind.
    #[error("`{method}` cannot be applied to a {kind} value at {position}")]
    TypeMismatch {
        method: String,
        kind: &'static str,
        position: Position,
    },

    /// A sequence was emitted directly instead of through `join`.
    #[error("`{expr}` is a sequence and cannot be output directly at {position}; use .join()")]
    UnrenderableSequence { expr: String, position: Position },

    /// A mapping was emitted directly.
    #[error("`{expr}` is a mapping and cannot be output at {position}")]
    UnrenderableMapping { expr: String, position: Position },
}

impl RenderError {
    pub fn position(&self) -> Position {
        match self {
            RenderError::TypeMismatch { position, .. }
            | RenderError::UnrenderableSequence { position, .. }
            | RenderError::UnrenderableMapping { position, .. } => *position,
        }
    }
}

/// Any failure from the parse + render pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// The context root was not a JSON object, or the JSON was malformed.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("context root must be an object, got {0}")]
    NotAnObject(&'static str),

    #[error("invalid context JSON: {0}")]
    Json(#[from] serde_json::Error),
}
