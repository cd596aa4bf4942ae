use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A source text the parser could not make sense of.
///
/// Lines and columns are 1-based; columns count bytes.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub struct SyntaxError {
    pub file: Option<PathBuf>,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        SyntaxError {
            file: None,
            line,
            column,
            message: message.into(),
        }
    }

    pub(crate) fn in_file(mut self, file: Option<PathBuf>) -> Self {
        self.file = file;
        self
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:", file.display())?;
        }
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}
