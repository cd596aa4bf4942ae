use std::fmt;

use thiserror::Error;

use crate::graph::{Arity, NodeId, NodeKind, PayloadKind};

/// Violations of the graph invariants, detected while building.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node {0} was reserved but never filled")]
    Unfilled(NodeId),

    #[error("node {0} has already been filled")]
    AlreadyFilled(NodeId),

    #[error("node {0} was not allocated by this builder")]
    UnknownId(NodeId),

    #[error("node {node} refers to missing child {child}")]
    Dangling { node: NodeId, child: NodeId },

    #[error("root {0} is not part of the graph")]
    UnknownRoot(NodeId),
}

/// A node whose children or payload do not fit its tag.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum ShapeError {
    #[error("expected {expected} children, got {found}")]
    Arity { expected: Arity, found: usize },

    #[error("expected a {expected:?} payload, got {found:?}")]
    Payload {
        expected: PayloadKind,
        found: PayloadKind,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("cannot encode {kind} node {node}: {reason}")]
    UnsupportedNode {
        node: NodeId,
        kind: NodeKind,
        reason: ShapeError,
    },
}

/// The origin of a child reference that failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Referrer {
    /// The root id in the header.
    Root,
    /// The child list of the record with this id.
    Node(u32),
}

impl fmt::Display for Referrer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Referrer::Root => f.write_str("root"),
            Referrer::Node(id) => write!(f, "node #{id}"),
        }
    }
}

/// Records which decode in isolation but cannot be part of a valid graph.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum RecordError {
    #[error("expected record #{expected}, got #{found}")]
    IdOutOfOrder { expected: u64, found: u64 },

    #[error("{kind} record: {shape}")]
    Shape { kind: NodeKind, shape: ShapeError },

    #[error("unknown scope kind {0}")]
    UnknownScope(u8),

    #[error("undefined pattern flag bits {0:#x}")]
    UnknownPatternFlags(u64),

    #[error("varint does not fit into 64 bits")]
    VarintOverflow,

    #[error("{0} bytes left over after the last record")]
    TrailingData(usize),

    #[error("root is record #{0} instead of the first record")]
    RootNotFirst(u64),
}

/// Errors that can occur while decoding a serialized graph.
///
/// Every variant is terminal: the decoder never returns a partially
/// reconstructed graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("input is not a serialized node graph")]
    Format,

    #[error("format version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u16, expected: u16 },

    #[error("input truncated at offset {offset}: {needed} more bytes required")]
    TruncatedInput { offset: usize, needed: usize },

    #[error("unknown node type {tag:#04x} at offset {offset}")]
    UnknownNodeType { tag: u8, offset: usize },

    #[error("{referrer} refers to undefined node #{target}")]
    DanglingReference { referrer: Referrer, target: u64 },

    #[error("invalid record at offset {offset}: {reason}")]
    InvalidRecord { offset: usize, reason: RecordError },

    #[error("{what} of {found} at offset {offset} exceeds the limit of {limit}")]
    LimitExceeded {
        what: &'static str,
        limit: u64,
        found: u64,
        offset: usize,
    },
}
