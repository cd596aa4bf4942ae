//! Support for generating arbitrary node graphs, including shared
//! nodes and cycles.

use bstr::BString;
use num_bigint::BigInt;
use proptest::collection::vec;
use proptest::sample::{select, Index};
use proptest::{prelude::*, strategy::BoxedStrategy};

use super::{
    Arity, Graph, Node, NodeId, NodeKind, Payload, PatternFlags, PayloadKind, ScopeKind, Symbol,
};

/// Most children any generated node can have.
const MAX_CHILDREN: usize = 6;

#[derive(Clone, Debug)]
pub struct Parameters {
    /// Upper bound on the arena size, at least 1.
    pub max_nodes: usize,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters { max_nodes: 48 }
    }
}

impl Arbitrary for Symbol {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: ()) -> Self::Strategy {
        prop_oneof![
            // a small pool, so that equal names show up regularly
            select(&["x", "each", "+", "[]=", "puts", "Foo"][..]).prop_map(Symbol::from),
            vec(any::<u8>(), 0..12).prop_map(Symbol::new),
        ]
        .boxed()
    }
}

fn payload(kind: PayloadKind) -> BoxedStrategy<Payload> {
    match kind {
        PayloadKind::None => Just(Payload::None).boxed(),
        PayloadKind::Integer => vec(any::<u8>(), 0..24)
            .prop_map(|b| Payload::Integer(BigInt::from_signed_bytes_le(&b)))
            .boxed(),
        PayloadKind::Float => any::<u64>()
            .prop_map(|bits| Payload::Float(f64::from_bits(bits)))
            .boxed(),
        PayloadKind::Bytes => vec(any::<u8>(), 0..32)
            .prop_map(|b| Payload::Bytes(BString::from(b)))
            .boxed(),
        PayloadKind::Symbol => any::<Symbol>().prop_map(Payload::Symbol).boxed(),
        PayloadKind::Pattern => (vec(any::<u8>(), 0..16), any::<u32>())
            .prop_map(|(source, bits)| Payload::Pattern {
                source: BString::from(source),
                flags: PatternFlags::from_bits_truncate(bits),
            })
            .boxed(),
        PayloadKind::Binding => (
            select(
                &[
                    ScopeKind::Local,
                    ScopeKind::Instance,
                    ScopeKind::Class,
                    ScopeKind::Global,
                    ScopeKind::Constant,
                ][..],
            ),
            any::<Symbol>(),
        )
            .prop_map(|(scope, name)| Payload::Binding { scope, name })
            .boxed(),
    }
}

/// Pick a child count the tag accepts.
fn child_count(arity: Arity, seed: usize) -> usize {
    match arity {
        Arity::Exact(n) => n,
        Arity::Between(min, max) => min + seed % (max - min + 1),
        Arity::AtLeast(min) => min + seed % (MAX_CHILDREN - min + 1),
        Arity::Pairs => 2 * (seed % (MAX_CHILDREN / 2 + 1)),
    }
}

/// A node whose children are still unresolved positions.
fn template() -> impl Strategy<Value = (NodeKind, Payload, usize, Vec<Index>)> {
    select(NodeKind::ALL).prop_flat_map(|kind| {
        (
            Just(kind),
            payload(kind.payload_kind()),
            any::<usize>(),
            vec(any::<Index>(), MAX_CHILDREN),
        )
    })
}

impl Arbitrary for Graph {
    type Parameters = Parameters;
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(args: Self::Parameters) -> Self::Strategy {
        vec(template(), 1..=args.max_nodes.max(1))
            .prop_map(|templates| {
                let len = templates.len();
                let nodes = templates
                    .into_iter()
                    .map(|(kind, payload, seed, picks)| {
                        let count = child_count(kind.arity(), seed);
                        // any position may be picked, which yields
                        // sharing, self references and cycles
                        let children = picks[..count]
                            .iter()
                            .map(|p| NodeId(p.index(len) as u32))
                            .collect();
                        Node::new(kind, children, payload)
                    })
                    .collect();
                Graph::from_checked(nodes, NodeId(0))
            })
            .boxed()
    }
}
