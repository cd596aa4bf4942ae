use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nodemarshal::Evaluator;
use nodemarshal_eval::Interpreter;

const FIBONACCI: &str = "def fib(n)\n  n < 2 ? n : fib(n - 1) + fib(n - 2)\nend\nfib(15)\n";

const SIEVE: &str = r#"
table = Array.new(5000) {|index| index + 2}
table.each_index do |ind|
	num = table[ind]
	if num != 0
		((ind + num)..(table.length)).step(num) {|i| table[i] = 0 }
	end
end
table.select! {|val| val != 0}
table.length
"#;

fn bench_programs(c: &mut Criterion) {
    let mut g = c.benchmark_group("eval");
    for (name, src) in [("fibonacci", FIBONACCI), ("sieve", SIEVE)] {
        let graph = nodemarshal_ruby::parse(src.as_bytes()).unwrap();
        let mut interpreter = Interpreter::with_output(std::io::sink());
        g.bench_function(name, |b| {
            b.iter(|| black_box(interpreter.evaluate(black_box(&graph)).unwrap()))
        });
    }
    g.finish();
}

criterion_group!(benches, bench_programs);
criterion_main!(benches);
