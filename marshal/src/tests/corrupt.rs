use hex_literal::hex;
use pretty_assertions::assert_eq;
use rstest::rstest;

use super::{self_referential_def, sum_of_squares};
use crate::errors::{DecodeError, RecordError, Referrer, ShapeError};
use crate::graph::{Arity, Graph, GraphBuilder, NodeKind, Payload};
use crate::{decode, decode_with, encode, DecodeOptions};

#[rstest]
#[case::sum_of_squares(sum_of_squares())]
#[case::self_referential_def(self_referential_def())]
fn truncated_at_every_offset(#[case] graph: Graph) {
    let bytes = encode(&graph).unwrap();
    assert!(graph.is_isomorphic(&decode(&bytes).unwrap()));

    for len in 0..bytes.len() {
        match decode(&bytes[..len]) {
            Err(DecodeError::TruncatedInput { .. }) => {}
            other => panic!("prefix of {len} bytes decoded to {other:?}"),
        }
    }
}

#[test]
fn version_bump() {
    let mut bytes = encode(&sum_of_squares()).unwrap();
    bytes[4] += 1;

    assert_eq!(
        Err(DecodeError::VersionMismatch {
            found: 2,
            expected: 1
        }),
        decode(&bytes)
    );
}

#[test]
fn shared_child_decodes_once() {
    // [[7], [7]] with one `7` node under both inner arrays
    let mut b = GraphBuilder::new();
    let seven = b.int(7);
    let left = b.array(vec![seven]);
    let right = b.array(vec![seven]);
    let root = b.array(vec![left, right]);
    let graph = b.finish(root).unwrap();

    let back = decode(&encode(&graph).unwrap()).unwrap();
    assert_eq!(4, back.len());
    let [left, right] = back[back.root()].children[..] else {
        panic!("root should have two children");
    };
    assert_ne!(left, right);
    assert_eq!(back[left].children, back[right].children);
    assert_eq!(Payload::Integer(7.into()), back[back[left].children[0]].payload);
}

#[test]
fn distinct_reads_stay_distinct() {
    let graph = sum_of_squares();
    let back = decode(&encode(&graph).unwrap()).unwrap();

    // `sum` is read inside the block and once more at the end, and
    // both reads must stay distinct nodes.
    let sums: Vec<_> = back
        .nodes()
        .filter(|(_, n)| n.kind == NodeKind::Var && n.payload.as_symbol().unwrap() == "sum")
        .collect();
    assert_eq!(2, sums.len());

    // the decoder interns names
    let (_, a) = sums[0];
    let (_, b) = sums[1];
    assert!(a.payload.as_symbol().unwrap().ptr_eq(b.payload.as_symbol().unwrap()));
}

#[test]
fn back_reference_resolves_to_the_same_node() {
    let graph = self_referential_def();
    let back = decode(&encode(&graph).unwrap()).unwrap();

    let def = back.root();
    let body = back[def].children[1];
    assert_eq!(NodeKind::Array, back[body].kind);
    assert_eq!(def, back[body].children[0]);
    assert_eq!(def, back[body].children[6]);
    assert!(matches!(back[back[body].children[2]].payload, Payload::Float(f) if f.to_bits() == (-0.0f64).to_bits()));
}

#[rstest]
#[case::empty(&[], DecodeError::TruncatedInput { offset: 0, needed: 4 })]
#[case::partial_magic(b"NDM", DecodeError::TruncatedInput { offset: 3, needed: 1 })]
#[case::foreign_prefix(b"ND\x00", DecodeError::Format)]
#[case::foreign(b"\x7fELF\x02\x01\x01", DecodeError::Format)]
#[case::partial_version(b"NDMR\x01", DecodeError::TruncatedInput { offset: 5, needed: 1 })]
#[case::future_version(&hex!("4e444d52 0200 01 00 00 00 00"), DecodeError::VersionMismatch { found: 2, expected: 1 })]
#[case::unknown_tag(&hex!("4e444d52 0100 01 00 00 2d 00"), DecodeError::UnknownNodeType { tag: 0x2d, offset: 9 })]
#[case::dangling_child(&hex!("4e444d52 0100 01 00 00 09 01 05"), DecodeError::DanglingReference { referrer: Referrer::Node(0), target: 5 })]
#[case::dangling_root(&hex!("4e444d52 0100 01 03 00 00 00"), DecodeError::DanglingReference { referrer: Referrer::Root, target: 3 })]
#[case::root_not_first(&hex!("4e444d52 0100 02 01 00 00 00 01 00 00"), DecodeError::InvalidRecord {
    offset: 7,
    reason: RecordError::RootNotFirst(1),
})]
#[case::wide_child_id(&hex!("4e444d52 0100 01 00 00 09 01 8080808010"), DecodeError::DanglingReference {
    referrer: Referrer::Node(0),
    target: 1 << 32,
})]
#[case::no_nodes(&hex!("4e444d52 0100 00 00"), DecodeError::DanglingReference { referrer: Referrer::Root, target: 0 })]
#[case::id_out_of_order(&hex!("4e444d52 0100 01 00 01 00 00"), DecodeError::InvalidRecord {
    offset: 8,
    reason: RecordError::IdOutOfOrder { expected: 0, found: 1 },
})]
#[case::missing_operand(&hex!("4e444d52 0100 01 00 00 18 00"), DecodeError::InvalidRecord {
    offset: 10,
    reason: RecordError::Shape {
        kind: NodeKind::Not,
        shape: ShapeError::Arity { expected: Arity::Exact(1), found: 0 },
    },
})]
#[case::odd_hash(&hex!("4e444d52 0100 02 00 00 0a 01 01 01 00 00"), DecodeError::InvalidRecord {
    offset: 10,
    reason: RecordError::Shape {
        kind: NodeKind::Hash,
        shape: ShapeError::Arity { expected: Arity::Pairs, found: 1 },
    },
})]
#[case::trailing(&hex!("4e444d52 0100 01 00 00 00 00 ff"), DecodeError::InvalidRecord {
    offset: 11,
    reason: RecordError::TrailingData(1),
})]
#[case::unknown_scope(&hex!("4e444d52 0100 01 00 00 0f 00 07 01 78"), DecodeError::InvalidRecord {
    offset: 11,
    reason: RecordError::UnknownScope(7),
})]
#[case::unknown_pattern_flags(&hex!("4e444d52 0100 01 00 00 08 00 00 10"), DecodeError::InvalidRecord {
    offset: 12,
    reason: RecordError::UnknownPatternFlags(0x10),
})]
#[case::overlong_count(&hex!("4e444d52 0100 ffffffffffffffffff7f 00"), DecodeError::InvalidRecord {
    offset: 6,
    reason: RecordError::VarintOverflow,
})]
#[case::inflated_count(&hex!("4e444d52 0100 808040 00"), DecodeError::TruncatedInput { offset: 10, needed: 1 })]
#[case::inflated_children(&hex!("4e444d52 0100 01 00 00 09 e807 00"), DecodeError::TruncatedInput { offset: 13, needed: 999 })]
#[case::inflated_string(&hex!("4e444d52 0100 01 00 00 06 00 e807 61"), DecodeError::TruncatedInput { offset: 14, needed: 999 })]
fn malformed(#[case] input: &[u8], #[case] expected: DecodeError) {
    assert_eq!(Err(expected), decode(input));
}

#[test]
fn node_count_limit() {
    let bytes = encode(&sum_of_squares()).unwrap();
    let options = DecodeOptions::default().max_nodes(3);

    assert_eq!(
        Err(DecodeError::LimitExceeded {
            what: "node count",
            limit: 3,
            found: 20,
            offset: 6,
        }),
        decode_with(&bytes, &options)
    );
}

#[test]
fn byte_string_limit() {
    let bytes = hex!("4e444d52 0100 01 00 00 06 00 05 6162636465");
    let options = DecodeOptions::default().max_bytes_len(4);

    assert_eq!(
        Err(DecodeError::LimitExceeded {
            what: "byte string length",
            limit: 4,
            found: 5,
            offset: 11,
        }),
        decode_with(&bytes, &options)
    );
    assert!(decode(&bytes).is_ok());
}

#[test]
fn forward_references_resolve() {
    // #0 = [#1], #1 = [#0]
    let bytes = hex!("4e444d52 0100 02 00 00 09 01 01 01 09 01 00");
    let graph = decode(&bytes).unwrap();

    assert_eq!(2, graph.len());
    assert_eq!(graph.root(), graph[graph[graph.root()].children[0]].children[0]);
    assert_eq!(bytes.as_slice(), encode(&graph).unwrap());
}
