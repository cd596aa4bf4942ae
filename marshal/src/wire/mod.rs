//! Binary wire format, shared by [crate::encoder] and [crate::decoder].
//!
//! # Encoding
//!
//! Unsigned integers (counts, ids, lengths, flag sets) are LEB128
//! varints. Byte strings are prefixed by their varint length and copied
//! verbatim, with no terminator and no assumption about their text
//! encoding. Arbitrary precision integers are stored as the minimal
//! two's-complement little-endian byte string of their value. Floats
//! are the eight little-endian bytes of their IEEE-754 bit pattern.
//!
//! # Grammar
//!
//! ```plain
//! graph   ::= MAGIC version:u16le count:varint root:varint record{count}
//! record  ::= id:varint tag:u8 child_count:varint child:varint{child_count} payload
//!
//! payload ::= ε                                  (no payload)
//!         ||= string                             (integer)
//!         ||= u64le                              (float)
//!         ||= string                             (bytes, symbol)
//!         ||= string flags:varint                (pattern)
//!         ||= scope:u8 string                    (binding)
//!
//! string  ::= len:varint byte{len}
//! ```
//!
//! # Ordering
//!
//! Records appear in the pre-order of [crate::Graph::preorder], and a
//! record's id is its position in the stream, so the root is always
//! record 0. A child id may point at a record that has not been
//! emitted yet only if that record is reached through an earlier
//! sibling. Any other forward id is a dangling reference.
//!
//! The tag byte is the discriminant of [crate::NodeKind]; its payload
//! layout and child count are fixed by [crate::NodeKind::payload_kind]
//! and [crate::NodeKind::arity].

pub mod varint;

/// Marker at the start of every serialized graph.
pub const MAGIC: [u8; 4] = *b"NDMR";

/// Bumped whenever the tag set or a payload layout changes.
pub const FORMAT_VERSION: u16 = 1;

/// Size of the fixed part of the header.
pub const HEADER_LEN: usize = MAGIC.len() + 2;

#[cfg(test)]
mod tests {
    use super::{FORMAT_VERSION, MAGIC};
    use crate::{decode, encode, GraphBuilder};

    #[test]
    fn header_layout() {
        let mut b = GraphBuilder::new();
        let root = b.nil();
        let bytes = encode(&b.finish(root).unwrap()).unwrap();

        assert_eq!(MAGIC, bytes[..4]);
        assert_eq!(FORMAT_VERSION.to_le_bytes(), bytes[4..6]);
        // count 1, root 0, then a childless nil record with id 0
        assert_eq!([1, 0, 0, 0, 0], bytes[6..]);
        assert!(decode(&bytes).is_ok());
    }
}
