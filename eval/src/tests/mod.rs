use nodemarshal::{Evaluator, Graph, NodeKind};
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::{Error, ErrorKind, Interpreter, Options, Value};

fn graph(src: &str) -> Graph {
    nodemarshal_ruby::parse(src.as_bytes()).expect("test program must parse")
}

/// Evaluate `src` with a small call depth limit, returning the result
/// and everything written to the output.
fn run(src: &str) -> (Result<Value, Error>, String) {
    let mut interpreter = Interpreter::with_output(Vec::new()).options(Options {
        max_call_depth: 16,
        ..Options::default()
    });
    let result = interpreter.evaluate(&graph(src));
    let out = String::from_utf8(interpreter.into_output()).expect("output must be UTF-8");
    (result, out)
}

fn inspect(src: &str) -> String {
    match run(src).0 {
        Ok(value) => value.to_string(),
        Err(e) => panic!("evaluating {src:?} failed: {e}"),
    }
}

fn error(src: &str) -> Error {
    match run(src).0 {
        Ok(value) => panic!("evaluating {src:?} succeeded with {value}"),
        Err(e) => e,
    }
}

#[rstest]
#[case::precedence("1 + 2 * 3", "7")]
#[case::bignum("2 ** 70", "1180591620717411303424")]
#[case::floored_division("(0 - 7) / 2", "-4")]
#[case::floored_modulo("7 % -3", "-2")]
#[case::mixed_float("1.5 + 1", "2.5")]
#[case::compound_assignment("x = 5\nx += 1\nx", "6")]
#[case::optional_parameter("def f(a, b = 2)\n  a + b\nend\nf(1)", "3")]
#[case::string_methods("\"abc\".upcase + \"!\"", "\"ABC!\"")]
#[case::split("'a-b-c'.split('-')", "[\"a\", \"b\", \"c\"]")]
#[case::map_range("(1..4).map { |x| x * x }", "[1, 4, 9, 16]")]
#[case::sort_reverse("[3, 1, 2].sort.reverse", "[3, 2, 1]")]
#[case::sort_by("%w[b c a].sort_by { |s| s }", "[\"a\", \"b\", \"c\"]")]
#[case::inject_symbol("[1, 2, 3].inject(:+)", "6")]
#[case::sum("[1, 2, 3].sum", "6")]
#[case::select_block_pass("[1, 2, 3, 4].select(&:even?)", "[2, 4]")]
#[case::flatten("[1, [2, [3]]].flatten", "[1, 2, 3]")]
#[case::tally("[1, 2, 2, 3].tally", "{1=>1, 2=>2, 3=>1}")]
#[case::merge("{a: 1}.merge({b: 2})", "{:a=>1, :b=>2}")]
#[case::nil_to_a("nil.to_a", "[]")]
#[case::array_repeat("[1, 2] * 2", "[1, 2, 1, 2]")]
#[case::array_join_operator("[1, 2] * \"-\"", "\"1-2\"")]
#[case::recursive_array("x = []\nx << x\nx << 1\nx.to_s", "\"[[...], 1]\"")]
#[case::recursive_hash("h = {}\nh[:me] = h\nh", "{:me=>{...}}")]
#[case::closure("n = 0\n[1, 2, 3].each { |x| n += x }\nn", "6")]
fn evaluates(#[case] src: &str, #[case] expected: &str) {
    assert_eq!(expected, inspect(src));
}

#[rstest]
#[case::break_from_block("[1, 2, 3].each { |x| break x * 10 if x == 2 }", "20")]
#[case::next_in_block("[1, 2, 3].map { |x| next 0 if x == 2\n  x }", "[1, 0, 3]")]
#[case::return_from_block("def f\n  [1, 2].each { |x| return x }\n  nil\nend\nf", "1")]
#[case::while_break("i = 0\nwhile true\n  i += 1\n  break if i == 3\nend\ni", "3")]
#[case::loop_break("i = 0\nloop do\n  i += 1\n  break if i > 4\nend\ni", "5")]
#[case::yield_to_block("def twice\n  yield(1) + yield(2)\nend\ntwice { |x| x * 10 }", "30")]
#[case::proc_spreads_array("pr = proc { |a, b| b }\npr.call([1, 2])", "2")]
#[case::case_when("case 5\nwhen 1..3\n  :low\nwhen 4..6\n  :mid\nelse\n  :high\nend", ":mid")]
#[case::op_assign_on_index("h = {a: nil}\nh[:a] ||= 2\nh[:a] &&= h[:a] + 1\nh", "{:a=>3}")]
fn control_flow(#[case] src: &str, #[case] expected: &str) {
    assert_eq!(expected, inspect(src));
}

#[test]
fn lambdas_check_arity() {
    let e = error("l = lambda { |a, b| a }\nl.call(1)");
    assert!(
        matches!(&e.kind, ErrorKind::WrongArity { given: 1, expected } if expected == "2"),
        "{e}"
    );
}

#[test]
fn errors_carry_their_node() {
    let src = "x = 1\nfoo";
    let e = error(src);
    assert!(matches!(&e.kind, ErrorKind::UndefinedName(name) if name == "foo"), "{e}");
    assert_eq!(NodeKind::FCall, graph(src)[e.node].kind);

    let e = error("[1].bogus");
    assert!(
        matches!(&e.kind, ErrorKind::NoMethod { name, class: "Array" } if name == "bogus"),
        "{e}"
    );
    assert!(matches!(error("1 / 0").kind, ErrorKind::ZeroDivision));
    assert!(matches!(error("break").kind, ErrorKind::InvalidJump(_)));
}

#[test]
fn classes_are_not_evaluated() {
    let e = error("class A\nend");
    assert!(matches!(e.kind, ErrorKind::Unsupported(_)), "{e}");
}

#[test]
fn call_depth_is_bounded() {
    let e = error("def f(n)\n  f(n + 1)\nend\nf(0)");
    assert!(matches!(e.kind, ErrorKind::CallDepth(16)), "{e}");
}

#[test]
fn output_goes_to_the_sink() {
    let (result, out) = run("puts(1, [2, 3])\nprint('a')\np(:b)");
    assert_eq!(Value::Symbol("b".into()), result.unwrap());
    assert_eq!("1\n2\n3\na:b\n", out);
}

#[test]
fn methods_do_not_outlive_an_evaluation() {
    let mut interpreter = Interpreter::with_output(Vec::new());
    interpreter.evaluate(&graph("def f\n  1\nend")).unwrap();
    let e = interpreter.evaluate(&graph("f")).unwrap_err();
    assert!(matches!(e.kind, ErrorKind::UndefinedName(_)), "{e}");
}
