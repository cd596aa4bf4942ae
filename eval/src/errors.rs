use nodemarshal::NodeId;
use thiserror::Error;

use crate::value::Value;

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("undefined local variable or method '{0}' for main")]
    UndefinedName(String),

    #[error("undefined method '{name}' for an instance of {class}")]
    NoMethod { name: String, class: &'static str },

    #[error("uninitialized constant {0}")]
    UninitializedConstant(String),

    #[error("wrong number of arguments (given {given}, expected {expected})")]
    WrongArity { given: usize, expected: String },

    #[error("no implicit conversion of {actual} into {expected}")]
    TypeError {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("comparison of {0} with {1} failed")]
    Incomparable(&'static str, &'static str),

    #[error("divided by 0")]
    ZeroDivision,

    #[error("{0}")]
    FloatDomain(String),

    #[error("{0}")]
    Argument(String),

    #[error("exponent {0} is too large")]
    ExponentTooLarge(String),

    #[error("index {index} too small for array; minimum: -{len}")]
    IndexTooSmall { index: i64, len: usize },

    #[error("no block given (yield)")]
    NoBlock,

    #[error("{0}")]
    InvalidJump(&'static str),

    #[error("stack level too deep (limit {0})")]
    CallDepth(usize),

    #[error("nesting level too deep (limit {0})")]
    Nesting(usize),

    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),

    #[error("{0}")]
    Raised(String),

    #[error("{0} is not supported")]
    Unsupported(&'static str),

    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    #[error("could not write output: {0}")]
    Output(#[from] std::io::Error),
}

/// An evaluation error together with the node it was raised at.
#[derive(Debug, Error)]
#[error("{kind} (at node {node})")]
pub struct Error {
    pub kind: ErrorKind,
    pub node: NodeId,
}

impl Error {
    pub fn new(kind: ErrorKind, node: NodeId) -> Self {
        Error { kind, node }
    }
}

pub type EvalResult<T> = Result<T, Error>;

/// Ways for the evaluation of a node to finish other than with a
/// value. Everything but [Flow::Error] is caught by some enclosing
/// construct before it reaches the top.
#[derive(Debug)]
pub(crate) enum Flow {
    Error(Box<Error>),
    Break { value: Value, node: NodeId },
    Next { value: Value, node: NodeId },
    Return(Value),
    /// A `break` that left the body of the block with the given id,
    /// and now ends the call the block was attached to.
    BlockBreak { block: usize, value: Value },
}

impl From<Error> for Flow {
    fn from(error: Error) -> Self {
        Flow::Error(Box::new(error))
    }
}

/// Attach the node being evaluated to a bare [ErrorKind].
pub(crate) trait WithNode<T> {
    fn with_node(self, node: NodeId) -> Result<T, Flow>;
}

impl<T> WithNode<T> for Result<T, ErrorKind> {
    fn with_node(self, node: NodeId) -> Result<T, Flow> {
        self.map_err(|kind| Error::new(kind, node).into())
    }
}
