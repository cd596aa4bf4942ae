mod corrupt;
mod properties;

use crate::graph::{Graph, GraphBuilder, Node, NodeKind, Payload, PatternFlags, ScopeKind};

/// `sum = 0; (1..50).each { |n| sum += n ** 2 }; sum`, as the
/// reference parser lowers it. The `sum` read inside the block and
/// the `2` literal are ordinary nodes; the block captures `sum`.
pub(crate) fn sum_of_squares() -> Graph {
    let mut b = GraphBuilder::new();
    let zero = b.int(0);
    let init = b.assign(ScopeKind::Local, "sum", zero);

    let one = b.int(1);
    let fifty = b.int(50);
    let range = b.node(NodeKind::RangeIncl, vec![one, fifty], Payload::None);

    let n = b.var(ScopeKind::Local, "n");
    let two = b.int(2);
    let square = b.call(n, "**", vec![two], None);
    let sum = b.var(ScopeKind::Local, "sum");
    let add = b.call(sum, "+", vec![square], None);
    let update = b.assign(ScopeKind::Local, "sum", add);

    let param = b.node(NodeKind::Param, vec![], Payload::Symbol("n".into()));
    let params = b.node(NodeKind::Params, vec![param], Payload::None);
    let block = b.node(NodeKind::Block, vec![params, update], Payload::None);
    let each = b.call(range, "each", vec![], Some(block));

    let result = b.var(ScopeKind::Local, "sum");
    let root = b.seq(vec![init, each, result]);
    b.finish(root).unwrap()
}

/// A method whose body refers back to its own definition node, plus
/// every payload kind.
pub(crate) fn self_referential_def() -> Graph {
    let mut b = GraphBuilder::new();
    let def = b.reserve();
    let params = b.node(NodeKind::Params, vec![], Payload::None);
    let pattern = b.regex("a+b", PatternFlags::IGNORECASE | PatternFlags::MULTILINE);
    let float = b.float(-0.0);
    let bytes = b.str(&b"\x00\xff not utf-8"[..]);
    let huge = b.int(num_bigint::BigInt::from(-7) << 200);
    let global = b.var(ScopeKind::Global, "stdout");
    let body = b.array(vec![def, pattern, float, bytes, huge, global, def]);
    b.fill(
        def,
        Node::new(NodeKind::Def, vec![params, body], Payload::Symbol("me".into())),
    )
    .unwrap();
    b.finish(def).unwrap()
}
