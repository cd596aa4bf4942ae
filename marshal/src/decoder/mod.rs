//! Reconstruct a [Graph] from the format described in [crate::wire].
//!
//! The input is not trusted. Records are read in a single pass into a
//! table indexed by id; child ids are stored as read. Once the table
//! is complete a linking pass checks that the root and every child id
//! resolve, which covers back-references to records further down the
//! stream.

use bstr::BString;
use num_bigint::BigInt;
use rustc_hash::FxHashMap;
use tracing::{debug, instrument, trace};

use crate::errors::{DecodeError, RecordError, Referrer, ShapeError};
use crate::graph::{
    Graph, Node, NodeId, NodeKind, Payload, PatternFlags, PayloadKind, ScopeKind, Symbol,
};
use crate::wire;

mod read;

use read::Cursor;

/// Smallest possible record: id, tag and child count, one byte each.
const MIN_RECORD_LEN: usize = 3;

/// Limits applied while decoding untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    max_nodes: u64,
    max_bytes_len: u64,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            max_nodes: 1 << 24,
            max_bytes_len: 1 << 28,
        }
    }
}

impl DecodeOptions {
    /// Maximum number of records a stream may declare. Values above
    /// [u32::MAX] are clamped, as node ids are 32 bits wide.
    pub fn max_nodes(mut self, max_nodes: u64) -> Self {
        self.max_nodes = max_nodes.min(u32::MAX as u64);
        self
    }

    /// Maximum length of any string, symbol, pattern or integer payload.
    pub fn max_bytes_len(mut self, max_bytes_len: u64) -> Self {
        self.max_bytes_len = max_bytes_len;
        self
    }

    pub fn get_max_nodes(&self) -> u64 {
        self.max_nodes
    }

    pub fn get_max_bytes_len(&self) -> u64 {
        self.max_bytes_len
    }
}

/// Decode `input` with the default [DecodeOptions].
pub fn decode(input: &[u8]) -> Result<Graph, DecodeError> {
    decode_with(input, &DecodeOptions::default())
}

#[instrument(level = "trace", skip_all, fields(len = input.len()), err)]
pub fn decode_with(input: &[u8], options: &DecodeOptions) -> Result<Graph, DecodeError> {
    Decoder {
        cursor: Cursor::new(input),
        options,
        symbols: FxHashMap::default(),
    }
    .graph()
}

struct Decoder<'a, 'o> {
    cursor: Cursor<'a>,
    options: &'o DecodeOptions,
    /// Equal names decode to one shared [Symbol].
    symbols: FxHashMap<&'a [u8], Symbol>,
}

impl<'a> Decoder<'a, '_> {
    fn graph(mut self) -> Result<Graph, DecodeError> {
        self.magic()?;

        let version = self.cursor.u16()?;
        if version != wire::FORMAT_VERSION {
            return Err(DecodeError::VersionMismatch {
                found: version,
                expected: wire::FORMAT_VERSION,
            });
        }

        let offset = self.cursor.offset();
        let count = self.cursor.varint()?;
        if count > self.options.max_nodes {
            return Err(DecodeError::LimitExceeded {
                what: "node count",
                limit: self.options.max_nodes,
                found: count,
                offset,
            });
        }
        let root_offset = self.cursor.offset();
        let root = self.cursor.varint()?;
        debug!(version, count, root, "read header");

        // never trust the declared count for allocations
        let capacity = (count as usize).min(self.cursor.remaining() / MIN_RECORD_LEN);
        let mut nodes = Vec::with_capacity(capacity);
        for expected in 0..count {
            nodes.push(self.record(expected)?);
        }

        if self.cursor.remaining() != 0 {
            return Err(DecodeError::InvalidRecord {
                offset: self.cursor.offset(),
                reason: RecordError::TrailingData(self.cursor.remaining()),
            });
        }

        link(&nodes, root)?;
        // records are written starting at the root
        if root != 0 {
            return Err(DecodeError::InvalidRecord {
                offset: root_offset,
                reason: RecordError::RootNotFirst(root),
            });
        }
        Ok(Graph::from_checked(nodes, NodeId(root as u32)))
    }

    fn magic(&mut self) -> Result<(), DecodeError> {
        match self.cursor.bytes(wire::MAGIC.len()) {
            Ok(magic) if magic == wire::MAGIC => Ok(()),
            Ok(_) => Err(DecodeError::Format),
            // a cut off magic is only truncation if what is there matches
            Err(e) => {
                let rest = self.cursor.bytes(self.cursor.remaining())?;
                if wire::MAGIC.starts_with(rest) {
                    Err(e)
                } else {
                    Err(DecodeError::Format)
                }
            }
        }
    }

    fn record(&mut self, expected: u64) -> Result<Node, DecodeError> {
        let offset = self.cursor.offset();
        let id = self.cursor.varint()?;
        if id != expected {
            return Err(DecodeError::InvalidRecord {
                offset,
                reason: RecordError::IdOutOfOrder {
                    expected,
                    found: id,
                },
            });
        }

        let tag_offset = self.cursor.offset();
        let tag = self.cursor.u8()?;
        let kind = NodeKind::from_u8(tag).ok_or(DecodeError::UnknownNodeType {
            tag,
            offset: tag_offset,
        })?;

        let count_offset = self.cursor.offset();
        let child_count = self.cursor.varint()?;
        let arity = kind.arity();
        if !usize::try_from(child_count).is_ok_and(|n| arity.accepts(n)) {
            return Err(DecodeError::InvalidRecord {
                offset: count_offset,
                reason: RecordError::Shape {
                    kind,
                    shape: ShapeError::Arity {
                        expected: arity,
                        found: child_count.try_into().unwrap_or(usize::MAX),
                    },
                },
            });
        }

        // every child id takes at least one byte
        let remaining = self.cursor.remaining() as u64;
        if child_count > remaining {
            return Err(DecodeError::TruncatedInput {
                offset: self.cursor.offset() + remaining as usize,
                needed: (child_count - remaining) as usize,
            });
        }

        let mut children = Vec::with_capacity(child_count as usize);
        for _ in 0..child_count {
            let child = self.cursor.varint()?;
            // ids below u32::MAX but past the last record fail during linking
            let child = u32::try_from(child).map_err(|_| DecodeError::DanglingReference {
                referrer: Referrer::Node(id as u32),
                target: child,
            })?;
            children.push(NodeId(child));
        }

        let payload = self.payload(kind)?;
        trace!(id, %kind, children = children.len(), "read record");
        Ok(Node::new(kind, children, payload))
    }

    fn symbol(&mut self) -> Result<Symbol, DecodeError> {
        let name = self.cursor.string(self.options.max_bytes_len)?;
        Ok(self
            .symbols
            .entry(name)
            .or_insert_with(|| Symbol::new(name))
            .clone())
    }

    fn payload(&mut self, kind: NodeKind) -> Result<Payload, DecodeError> {
        let max = self.options.max_bytes_len;
        Ok(match kind.payload_kind() {
            PayloadKind::None => Payload::None,
            PayloadKind::Integer => {
                Payload::Integer(BigInt::from_signed_bytes_le(self.cursor.string(max)?))
            }
            PayloadKind::Float => Payload::Float(f64::from_bits(self.cursor.u64()?)),
            PayloadKind::Bytes => Payload::Bytes(BString::from(self.cursor.string(max)?)),
            PayloadKind::Symbol => Payload::Symbol(self.symbol()?),
            PayloadKind::Pattern => {
                let source = BString::from(self.cursor.string(max)?);
                let offset = self.cursor.offset();
                let bits = self.cursor.varint()?;
                let flags = u32::try_from(bits)
                    .ok()
                    .and_then(PatternFlags::from_bits)
                    .ok_or(DecodeError::InvalidRecord {
                        offset,
                        reason: RecordError::UnknownPatternFlags(bits),
                    })?;
                Payload::Pattern { source, flags }
            }
            PayloadKind::Binding => {
                let offset = self.cursor.offset();
                let byte = self.cursor.u8()?;
                let scope = ScopeKind::from_u8(byte).ok_or(DecodeError::InvalidRecord {
                    offset,
                    reason: RecordError::UnknownScope(byte),
                })?;
                Payload::Binding {
                    scope,
                    name: self.symbol()?,
                }
            }
        })
    }
}

/// Check that the root and all child ids resolve against the full table.
fn link(nodes: &[Node], root: u64) -> Result<(), DecodeError> {
    let len = nodes.len() as u64;
    if root >= len {
        return Err(DecodeError::DanglingReference {
            referrer: Referrer::Root,
            target: root,
        });
    }

    for (id, node) in nodes.iter().enumerate() {
        if let Some(child) = node.children.iter().find(|c| c.0 as u64 >= len) {
            return Err(DecodeError::DanglingReference {
                referrer: Referrer::Node(id as u32),
                target: child.0 as u64,
            });
        }
    }

    Ok(())
}
