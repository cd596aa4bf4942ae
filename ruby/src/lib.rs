//! A parser for a subset of Ruby which produces [nodemarshal] graphs.
//!
//! The subset covers literals, variables, operators, the usual control
//! flow, method and class definitions, blocks and calls. Programs are
//! lowered the way the Ruby parser would: operators become method
//! calls, `unless` becomes a negated `if`, and compound assignments
//! expand into a read and a write which share their operands.

use std::path::Path;

use nodemarshal::Graph;
use tracing::instrument;

pub mod errors;
pub mod lexer;
mod parser;
pub mod token;

#[cfg(test)]
mod tests;

pub use errors::SyntaxError;
pub use parser::parse;

/// [nodemarshal::Parser] for Ruby source.
#[derive(Clone, Copy, Debug, Default)]
pub struct RubyParser;

impl nodemarshal::Parser for RubyParser {
    type Error = SyntaxError;

    #[instrument(level = "trace", skip_all, fields(len = src.len(), location = ?location), err)]
    fn parse(&self, src: &[u8], location: Option<&Path>) -> Result<Graph, SyntaxError> {
        parse(src).map_err(|e| e.in_file(location.map(Path::to_path_buf)))
    }
}
