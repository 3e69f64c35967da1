use std::fmt;

use crate::lexer::token::Token;

/// One source-located error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error in line {}: {}", self.line, self.message)
    }
}

/// Append-only collector threaded through parsing.
///
/// Nothing here touches the process: callers decide when to render and how
/// to exit. Rendering needs the source text, so diagnostics store positions
/// and messages only.
#[derive(Debug, Default)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unknown_token(&mut self, line: usize, column: usize) {
        self.push("unknown token".to_string(), line, column);
    }

    pub fn unexpected_token(&mut self, token: Token<'_>, expected: Option<&str>) {
        let message = match expected {
            Some(expected) => {
                format!("unexpected token \"{}\", expected {}", token.kind, expected)
            }
            None => format!("unexpected token \"{}\"", token.kind),
        };
        self.push(message, token.line, token.column);
    }

    pub fn error(&mut self, message: impl Into<String>, line: usize, column: usize) {
        self.push(message.into(), line, column);
    }

    pub fn is_error(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    fn push(&mut self, message: String, line: usize, column: usize) {
        self.diagnostics.push(Diagnostic {
            message,
            line,
            column,
        });
    }
}

pub fn underline(line: &str, column: usize) -> String {
    let mut marker = String::new();
    for _ in 1..column {
        marker.push('-');
    }
    marker.push('^');
    format!("{}\n{}", line, marker)
}

/// Render one diagnostic against its source text:
///
/// ```text
/// error in line L: MSG
/// <source line>
/// -----^
/// ```
pub fn render(source: &str, diagnostic: &Diagnostic) -> String {
    let line = source
        .lines()
        .nth(diagnostic.line.saturating_sub(1))
        .unwrap_or_default();
    format!("{}\n{}", diagnostic, underline(line, diagnostic.column))
}
