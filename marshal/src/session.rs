//! Orchestration of parser, codec and evaluator.
//!
//! The parser and evaluator are collaborators supplied by the caller
//! through the [Parser] and [Evaluator] traits; this crate does not
//! know what language the graphs describe.

use std::error::Error;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument};

use crate::decoder::{decode_with, DecodeOptions};
use crate::errors::{DecodeError, EncodeError};
use crate::graph::Graph;
use crate::radix85::{self, Radix85Error};

type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Turns source text into a node graph.
pub trait Parser {
    type Error: Error + Send + Sync + 'static;

    /// Parse `src`. `location` names the file it was read from, if
    /// any, for use in diagnostics.
    fn parse(&self, src: &[u8], location: Option<&Path>) -> Result<Graph, Self::Error>;
}

/// Runs a node graph.
pub trait Evaluator {
    type Value;
    type Error: Error + Send + Sync + 'static;

    fn evaluate(&mut self, graph: &Graph) -> Result<Self::Value, Self::Error>;
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("syntax error: {0}")]
    Syntax(#[source] BoxError),

    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Text(#[from] Radix85Error),

    #[error("evaluation failed: {0}")]
    Eval(#[source] BoxError),
}

pub struct Session<P, E> {
    parser: P,
    evaluator: E,
    decode_options: DecodeOptions,
}

impl<P: Parser, E: Evaluator> Session<P, E> {
    pub fn new(parser: P, evaluator: E) -> Self {
        Session {
            parser,
            evaluator,
            decode_options: DecodeOptions::default(),
        }
    }

    pub fn with_decode_options(mut self, decode_options: DecodeOptions) -> Self {
        self.decode_options = decode_options;
        self
    }

    pub fn decode_options(&self) -> &DecodeOptions {
        &self.decode_options
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    pub fn evaluator(&mut self) -> &mut E {
        &mut self.evaluator
    }

    #[instrument(level = "trace", skip_all, fields(len = src.as_ref().len()), err)]
    pub fn graph_from_source(&self, src: impl AsRef<[u8]>) -> Result<Graph, SessionError> {
        self.parser
            .parse(src.as_ref(), None)
            .map_err(|e| SessionError::Syntax(Box::new(e)))
    }

    #[instrument(level = "trace", skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn graph_from_file(&self, path: impl AsRef<Path>) -> Result<Graph, SessionError> {
        let path = path.as_ref();
        let src = std::fs::read(path).map_err(|source| SessionError::Io {
            path: path.to_owned(),
            source,
        })?;
        debug!(len = src.len(), "read source file");

        self.parser
            .parse(&src, Some(path))
            .map_err(|e| SessionError::Syntax(Box::new(e)))
    }

    pub fn encode(&self, graph: &Graph) -> Result<Vec<u8>, SessionError> {
        Ok(crate::encode(graph)?)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Graph, SessionError> {
        Ok(decode_with(bytes, &self.decode_options)?)
    }

    /// [Session::encode], wrapped in radix-85 text.
    pub fn encode_text(&self, graph: &Graph) -> Result<String, SessionError> {
        Ok(radix85::encode(&self.encode(graph)?))
    }

    pub fn decode_text(&self, text: impl AsRef<[u8]>) -> Result<Graph, SessionError> {
        let bytes = radix85::decode(text)?;
        self.decode(&bytes)
    }

    /// Encode and immediately decode `graph`.
    pub fn round_trip(&self, graph: &Graph) -> Result<Graph, SessionError> {
        self.decode(&self.encode(graph)?)
    }

    pub fn evaluate(&mut self, graph: &Graph) -> Result<E::Value, SessionError> {
        self.evaluator
            .evaluate(graph)
            .map_err(|e| SessionError::Eval(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use thiserror::Error;

    use super::{Evaluator, Parser, Session, SessionError};
    use crate::graph::{Graph, GraphBuilder, NodeKind};

    #[derive(Debug, Error)]
    #[error("not a number")]
    struct NotANumber;

    /// Parses a decimal integer.
    struct Digits;

    impl Parser for Digits {
        type Error = NotANumber;

        fn parse(&self, src: &[u8], _: Option<&Path>) -> Result<Graph, NotANumber> {
            let n: i64 = std::str::from_utf8(src)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .ok_or(NotANumber)?;
            let mut b = GraphBuilder::new();
            let root = b.int(n);
            Ok(b.finish(root).unwrap())
        }
    }

    /// Counts the nodes it is handed.
    struct Count;

    impl Evaluator for Count {
        type Value = usize;
        type Error = NotANumber;

        fn evaluate(&mut self, graph: &Graph) -> Result<usize, NotANumber> {
            Ok(graph.reachable_len())
        }
    }

    #[test]
    fn text_round_trip() {
        let mut session = Session::new(Digits, Count);
        let graph = session.graph_from_source("12345").unwrap();
        let text = session.encode_text(&graph).unwrap();
        let back = session.decode_text(&text).unwrap();

        assert!(graph.is_isomorphic(&back));
        assert_eq!(NodeKind::Integer, back[back.root()].kind);
        assert_eq!(1, session.evaluate(&back).unwrap());
    }

    #[test]
    fn syntax_errors_surface() {
        let session = Session::new(Digits, Count);
        assert!(matches!(
            session.graph_from_source("twelve"),
            Err(SessionError::Syntax(_))
        ));
    }

    #[test]
    fn missing_file() {
        let session = Session::new(Digits, Count);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.rb");

        match session.graph_from_file(&path) {
            Err(SessionError::Io { path: p, .. }) => assert_eq!(path, p),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn source_file() {
        let session = Session::new(Digits, Count);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("number.txt");
        std::fs::write(&path, "42\n").unwrap();

        let graph = session.graph_from_file(&path).unwrap();
        let back = session.round_trip(&graph).unwrap();
        assert!(graph.is_isomorphic(&back));
    }
}
