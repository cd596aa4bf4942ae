use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use nodemarshal::{decode, encode, radix85, Graph, GraphBuilder, NodeKind, Payload, ScopeKind};

/// `xs = [1, 2, ..., n].map { |x| x * x }`, both operands sharing one `x` node.
fn wide_graph(n: i64) -> Graph {
    let mut b = GraphBuilder::new();
    let elements = (1..=n).map(|i| b.int(i)).collect();
    let list = b.array(elements);

    let x = b.var(ScopeKind::Local, "x");
    let square = b.call(x, "*", vec![x], None);
    let param = b.node(NodeKind::Param, vec![], Payload::Symbol("x".into()));
    let params = b.node(NodeKind::Params, vec![param], Payload::None);
    let block = b.node(NodeKind::Block, vec![params, square], Payload::None);
    let map = b.call(list, "map", vec![], Some(block));
    let root = b.assign(ScopeKind::Local, "xs", map);
    b.finish(root).unwrap()
}

/// `!!!...!nil`, to exercise long parent chains.
fn deep_graph(depth: usize) -> Graph {
    let mut b = GraphBuilder::new();
    let mut id = b.nil();
    for _ in 0..depth {
        id = b.node(NodeKind::Not, vec![id], Payload::None);
    }
    b.finish(id).unwrap()
}

fn bench_graph(c: &mut Criterion) {
    let mut g = c.benchmark_group("graph");
    for (name, graph) in [("wide", wide_graph(10_000)), ("deep", deep_graph(10_000))] {
        let bytes = encode(&graph).unwrap();
        g.throughput(Throughput::Bytes(bytes.len() as u64));

        g.bench_function(format!("encode {name}"), |b| {
            b.iter(|| black_box(encode(black_box(&graph))))
        });
        g.bench_function(format!("decode {name}"), |b| {
            b.iter(|| black_box(decode(black_box(&bytes))))
        });
    }
    g.finish();
}

fn bench_radix85(c: &mut Criterion) {
    let data: Vec<u8> = (0..64 * 1024).map(|i| (i * 31 % 251) as u8).collect();
    let text = radix85::encode(&data);

    let mut g = c.benchmark_group("radix85");
    g.throughput(Throughput::Bytes(data.len() as u64));
    g.bench_function("encode", |b| b.iter(|| black_box(radix85::encode(black_box(&data)))));
    g.bench_function("decode", |b| b.iter(|| black_box(radix85::decode(black_box(&text)))));
    g.finish();
}

criterion_group!(benches, bench_graph, bench_radix85);
criterion_main!(benches);
