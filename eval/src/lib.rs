//! A tree-walking interpreter for node graphs produced by the Ruby
//! front-end.
//!
//! The interpreter covers the subset of Ruby needed to tell whether a
//! graph survived a trip through the wire format intact: literals,
//! arbitrary precision integers, strings, arrays, hashes, ranges,
//! top-level methods, blocks and the common methods of the built-in
//! classes. Class definitions are recognised but not evaluated.
//!
//! ```
//! use nodemarshal::{Evaluator, GraphBuilder};
//! use nodemarshal_eval::{Interpreter, Value};
//!
//! let mut b = GraphBuilder::new();
//! let two = b.int(2);
//! let three = b.int(3);
//! let product = b.call(two, "*", vec![three], None);
//! let graph = b.finish(product).unwrap();
//!
//! let value = Interpreter::new().evaluate(&graph).unwrap();
//! assert_eq!(Value::int(6), value);
//! ```

use std::io::{self, Write};

use nodemarshal::{Evaluator, Graph};
use tracing::instrument;

pub mod errors;
pub mod scope;
pub mod value;

mod builtins;
mod interpreter;

#[cfg(test)]
mod tests;

pub use errors::{Error, ErrorKind, EvalResult};
pub use value::Value;

/// Limits applied to a single evaluation.
#[derive(Clone, Debug)]
pub struct Options {
    /// Nested method, block and lambda invocations.
    pub max_call_depth: usize,
    /// Nesting of expressions within one invocation.
    pub max_nesting: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_call_depth: 256,
            max_nesting: 1024,
        }
    }
}

/// Evaluates graphs, writing what `puts`, `print` and `p` produce to
/// `W`. Nothing but the output sink is kept between evaluations.
pub struct Interpreter<W: Write = io::Stdout> {
    options: Options,
    out: W,
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::with_output(io::stdout())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl<W: Write> Interpreter<W> {
    pub fn with_output(out: W) -> Self {
        Interpreter {
            options: Options::default(),
            out,
        }
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }
}

impl<W: Write> Evaluator for Interpreter<W> {
    type Value = Value;
    type Error = Error;

    #[instrument(level = "trace", skip_all, fields(nodes = graph.len()), err)]
    fn evaluate(&mut self, graph: &Graph) -> EvalResult<Value> {
        let result = interpreter::Machine::new(graph, &self.options, &mut self.out).run();
        self.out.flush().map_err(|e| Error::new(ErrorKind::Output(e), graph.root()))?;
        result
    }
}
