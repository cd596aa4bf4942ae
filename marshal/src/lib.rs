//! Serialization of parsed syntax trees into a compact binary format,
//! and a printable radix-85 wrapper for carrying that format through
//! text-only channels.
//!
//! A tree is modelled as a [Graph]: an arena of tagged [Node]s which
//! refer to their children by [NodeId]. Nodes may be shared between
//! parents and may refer back to their ancestors; both survive a round
//! trip through [encode] and [decode] unchanged.

pub mod decoder;
pub mod encoder;
pub mod errors;
pub mod graph;
pub mod pretty;
pub mod radix85;
pub mod session;
pub mod wire;

#[cfg(test)]
mod tests;

pub use decoder::{decode, decode_with, DecodeOptions};
pub use encoder::{encode, encode_into};
pub use errors::{DecodeError, EncodeError, GraphError};
pub use graph::{
    Arity, Category, Graph, GraphBuilder, Node, NodeId, NodeKind, Payload, PatternFlags,
    PayloadKind, ScopeKind, Symbol,
};
pub use radix85::Radix85Error;
pub use session::{Evaluator, Parser, Session, SessionError};
