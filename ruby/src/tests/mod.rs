use std::fmt::Write;
use std::path::Path;

use nodemarshal::{Graph, GraphBuilder, NodeId, NodeKind, Parser, Payload, ScopeKind};
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::{parse, RubyParser};

mod programs;

/// Render the tree below the root as nested s-expressions. Shared
/// nodes are printed at every use.
fn sexp(graph: &Graph) -> String {
    fn walk(graph: &Graph, id: NodeId, out: &mut String) {
        let node = &graph[id];
        out.push('(');
        out.push_str(node.kind.name());
        match &node.payload {
            Payload::None => {}
            Payload::Integer(n) => write!(out, " {n}").unwrap(),
            Payload::Float(x) => write!(out, " {x:?}").unwrap(),
            Payload::Bytes(b) => write!(out, " {:?}", b.to_string()).unwrap(),
            Payload::Symbol(s) => write!(out, " {s}").unwrap(),
            Payload::Pattern { source, flags } => {
                write!(out, " /{source}/{}", flags.bits()).unwrap()
            }
            Payload::Binding { scope, name } => write!(out, " {}{name}", scope.sigil()).unwrap(),
        }
        for child in &node.children {
            out.push(' ');
            walk(graph, *child, out);
        }
        out.push(')');
    }

    let mut out = String::new();
    walk(graph, graph.root(), &mut out);
    out
}

fn parsed(src: &str) -> String {
    match parse(src.as_bytes()) {
        Ok(graph) => sexp(&graph),
        Err(e) => panic!("{src:?} failed to parse: {e}"),
    }
}

#[rstest]
#[case::precedence("1 + 2 * 3", "(call + (integer 1) (args (call * (integer 2) (args (integer 3)))))")]
#[case::power_binds_tighter_than_minus("-2 ** 2", "(call -@ (call ** (integer 2) (args (integer 2))) (args))")]
#[case::negative_literal("-2.abs", "(call abs (integer -2) (args))")]
#[case::negated_variable("x = 1; -x", "(assign x (integer 1)) (call -@ (var x) (args))")]
#[case::power_is_right_associative("2 ** 3 ** 2", "(call ** (integer 2) (args (call ** (integer 3) (args (integer 2)))))")]
#[case::known_local("a = 1\na", "(assign a (integer 1)) (var a)")]
#[case::unknown_name("a", "(fcall a (args))")]
#[case::command_call("puts \"x\", 1", "(fcall puts (args (str \"x\") (integer 1)))")]
#[case::ternary("x = 1; x ? 2 : 3", "(assign x (integer 1)) (ternary (var x) (integer 2) (integer 3))")]
#[case::not_and("a = nil; not a and true", "(assign a (nil)) (and (not (var a)) (true))")]
#[case::logical_operators("a = b = nil; a || b && !a", "(assign a (assign b (nil))) (or (var a) (and (var b) (not (var a))))")]
#[case::while_modifier(
    "x = 0; x += 1 while x < 3",
    "(assign x (integer 0)) (while (call < (var x) (args (integer 3))) (assign x (call + (var x) (args (integer 1)))))"
)]
#[case::unless("unless a then b end", "(if (not (fcall a (args))) (fcall b (args)))")]
#[case::elsif(
    "if a\n  1\nelsif b\n  2\nelse\n  3\nend",
    "(if (fcall a (args)) (integer 1) (if (fcall b (args)) (integer 2) (integer 3)))"
)]
#[case::until_loop("i = 0\nuntil i == 2 do i += 1 end", "(assign i (integer 0)) (until (call == (var i) (args (integer 2))) (assign i (call + (var i) (args (integer 1)))))")]
#[case::attribute_assignment("o = 1; o.name = 2", "(assign o (integer 1)) (call name= (var o) (args (integer 2)))")]
#[case::interpolation("\"a#{1}b\"", "(dstr (str \"a\") (evstr (integer 1)) (str \"b\"))")]
#[case::empty_interpolation("\"#{}\"", "(dstr (evstr (nil)))")]
#[case::block_pass("[1].map(&:class)", "(call map (array (integer 1)) (args) (block_pass (sym class)))")]
#[case::call_shorthand("f = 1; f.(2)", "(assign f (integer 1)) (call call (var f) (args (integer 2)))")]
#[case::hash("{a: 1, \"b\" => 2}", "(hash (sym a) (integer 1) (str \"b\") (integer 2))")]
#[case::trailing_hash_argument("f 1, key: 2", "(fcall f (args (integer 1) (hash (sym key) (integer 2))))")]
#[case::scoped_constant("Math::PI", "(scoped_const PI (var Math))")]
#[case::scoped_method("Math::sin(0)", "(call sin (var Math) (args (integer 0)))")]
#[case::case_when(
    "case 1\nwhen 1, 2 then :a\nelse :b\nend",
    "(case (integer 1) (when (array (integer 1) (integer 2)) (sym a)) (sym b))"
)]
#[case::def(
    "def f(a, b = 2)\n  a + b\nend",
    "(def f (params (param a) (param b (integer 2))) (call + (var a) (args (var b))))"
)]
#[case::def_bare_params("def f a\nend", "(def f (params (param a)) (nil))")]
#[case::setter_def("def x=(v)\nend", "(def x= (params (param v)) (nil))")]
#[case::operator_def("def ==(o)\nend", "(def == (params (param o)) (nil))")]
#[case::class("class A < B\nend", "(class A (var B) (nil))")]
#[case::yield_and_zsuper(
    "def f\n  yield 1\n  super\nend",
    "(def f (params) (sequence (yield (integer 1)) (zsuper)))"
)]
#[case::super_with_args("super(1)", "(super (integer 1))")]
#[case::block_params("[1].each do |x| next x end", "(call each (array (integer 1)) (args) (block (params (param x)) (next (var x))))")]
#[case::do_binds_to_command("foo bar do end", "(fcall foo (args (fcall bar (args))) (block (params) (nil)))")]
#[case::brace_binds_to_argument("foo bar { }", "(fcall foo (args (fcall bar (args) (block (params) (nil)))))")]
#[case::while_do("while x do end", "(while (fcall x (args)) (nil))")]
#[case::regex("a = /ab+/i", "(assign a (regex /ab+/1))")]
#[case::exclusive_range("(1...3)", "(range_excl (integer 1) (integer 3))")]
#[case::lambda("-> (x) { x }", "(fcall lambda (args) (block (params (param x)) (var x)))")]
#[case::not_match("\"a\" !~ /b/", "(not (call =~ (str \"a\") (args (regex /b/0))))")]
#[case::variables("@a; @@b; $c; D", "(var @a) (var @@b) (var $c) (var D)")]
#[case::literals("nil; true; false; self; 1.5; :s", "(nil) (true) (false) (self) (float 1.5) (sym s)")]
#[case::word_list("%w[a b]", "(array (str \"a\") (str \"b\"))")]
#[case::return_without_value("def f\n  return\nend", "(def f (params) (return))")]
#[case::break_with_modifier("loop { break 1 if true }", "(fcall loop (args) (block (params) (if (true) (break (integer 1)))))")]
#[case::method_chain_across_lines("a = [1]\na\n  .first", "(assign a (array (integer 1))) (call first (var a) (args))")]
fn lowering(#[case] src: &str, #[case] expected: &str) {
    assert_eq!(format!("(sequence {expected})"), parsed(src));
}

#[test]
fn empty_program() {
    assert_eq!("(sequence)", parsed(""));
    assert_eq!("(sequence)", parsed("\n# only a comment\n;;\n"));
}

#[test]
fn index_op_assign_shares_operands() {
    let graph = parse(b"x = {}; x[:a] ||= 1").unwrap();
    assert_eq!(
        "(sequence (assign x (hash)) (or_assign (call [] (var x) (args (sym a))) (call []= (var x) (args (sym a) (integer 1)))))",
        sexp(&graph)
    );

    let or_assign = &graph[graph[graph.root()].children[1]];
    let (read, write) = (&graph[or_assign.children[0]], &graph[or_assign.children[1]]);
    assert_eq!(read.children[0], write.children[0], "receiver");
    assert_eq!(
        graph[read.children[1]].children[0],
        graph[write.children[1]].children[0],
        "index"
    );
}

#[test]
fn attribute_op_assign_shares_receiver() {
    let graph = parse(b"o = 1; o.count += 2").unwrap();
    assert_eq!(
        "(sequence (assign o (integer 1)) (call count= (var o) (args (call + (call count (var o) (args)) (args (integer 2))))))",
        sexp(&graph)
    );

    let write = &graph[graph[graph.root()].children[1]];
    let sum = &graph[graph[write.children[1]].children[0]];
    let read = &graph[sum.children[0]];
    assert_eq!(write.children[0], read.children[0]);
}

#[test]
fn escapes() {
    let graph = parse(r#""\t\x41é\101"; 'a\b'"#.as_bytes()).unwrap();
    let root = &graph[graph.root()];
    let strings: Vec<_> = root
        .children
        .iter()
        .map(|id| graph[*id].payload.as_bytes().unwrap().to_vec())
        .collect();
    assert_eq!(vec![b"\tA\xc3\xa9A".to_vec(), br"a\b".to_vec()], strings);
}

#[test]
fn block_locals_do_not_leak() {
    // `y` is first assigned inside the block, so the final `y` is a call
    assert_eq!(
        "(sequence (call each (array) (args) (block (params (param x)) (assign y (var x)))) (fcall y (args)))",
        parsed("[].each { |x| y = x }\ny")
    );
    // while outer locals are visible inside
    assert_eq!(
        "(sequence (assign y (integer 0)) (call each (array) (args) (block (params (param x)) (assign y (var x)))) (var y))",
        parsed("y = 0\n[].each { |x| y = x }\ny")
    );
}

#[test]
fn methods_do_not_see_outer_locals() {
    assert_eq!(
        "(sequence (assign a (integer 1)) (def f (params) (fcall a (args))))",
        parsed("a = 1\ndef f\n  a\nend")
    );
}

#[test]
fn sum_of_squares_lowering() {
    let graph = parse(b"sum = 0\n(1..50).each do |n|\n  sum += n ** 2\nend\nsum\n").unwrap();

    let mut b = GraphBuilder::new();
    let zero = b.int(0);
    let init = b.assign(ScopeKind::Local, "sum", zero);
    let one = b.int(1);
    let fifty = b.int(50);
    let range = b.node(NodeKind::RangeIncl, vec![one, fifty], Payload::None);
    let sum = b.var(ScopeKind::Local, "sum");
    let n = b.var(ScopeKind::Local, "n");
    let two = b.int(2);
    let square = b.call(n, "**", vec![two], None);
    let add = b.call(sum, "+", vec![square], None);
    let update = b.assign(ScopeKind::Local, "sum", add);
    let param = b.node(NodeKind::Param, vec![], Payload::Symbol("n".into()));
    let params = b.node(NodeKind::Params, vec![param], Payload::None);
    let block = b.node(NodeKind::Block, vec![params, update], Payload::None);
    let each = b.call(range, "each", vec![], Some(block));
    let result = b.var(ScopeKind::Local, "sum");
    let root = b.seq(vec![init, each, result]);
    let expected = b.finish(root).unwrap();

    assert!(graph.is_isomorphic(&expected), "{}", sexp(&graph));
}

#[rstest]
#[case::increment("a = 1; a++", 1, 11, "unexpected end of input")]
#[case::dangling_operator("1 +\n", 2, 1, "unexpected end of input")]
#[case::unterminated_def("def f\n  1\n", 3, 1, "unexpected end of input, expecting 'end'")]
#[case::multiple_assignment("a, b = 1, 2", 1, 2, "multiple assignment is not supported")]
#[case::unclosed_call("foo(1", 1, 6, "unexpected end of input, expecting ')'")]
#[case::missing_value("x = ", 1, 5, "unexpected end of input")]
#[case::literal_target("1 = 2", 1, 3, "unexpected '=', left-hand side is not assignable")]
#[case::subjectless_case("case\nwhen 1 then 2 end", 1, 5, "case without a subject is not supported")]
#[case::two_blocks("[1].map(&:a) { }", 1, 14, "both block arg and actual block given")]
#[case::begin("begin; end", 1, 1, "'begin' is not supported")]
#[case::splat("f(*a)", 1, 3, "splat arguments are not supported")]
#[case::juxtaposed("1 2", 1, 3, "unexpected integer 2, expecting end of statement")]
#[case::lexer("x = 'open", 1, 6, "unterminated string meets end of file")]
fn syntax_errors(
    #[case] src: &str,
    #[case] line: usize,
    #[case] column: usize,
    #[case] message: &str,
) {
    let err = parse(src.as_bytes()).unwrap_err();
    assert_eq!(
        (line, column, message),
        (err.line, err.column, err.message.as_str()),
        "{src:?}"
    );
}

fn nested_interpolation(levels: usize) -> String {
    (0..levels).fold("1".to_owned(), |inner, _| format!("\"#{{{inner}}}\""))
}

#[rstest]
#[case::parens(format!("{}1{}", "(".repeat(2000), ")".repeat(2000)))]
#[case::brackets(format!("{}{}", "[".repeat(5000), "]".repeat(5000)))]
#[case::bangs(format!("{}true", "!".repeat(5000)))]
#[case::not_keywords(format!("{}true", "not ".repeat(5000)))]
#[case::ternaries(format!("{}3", "1 ? 2 : ".repeat(5000)))]
#[case::assignments(format!("{}1", "a = ".repeat(5000)))]
#[case::interpolations(nested_interpolation(500))]
fn deep_nesting_is_rejected(#[case] src: String) {
    // the thread gets the stack of a main thread
    let err = std::thread::Builder::new()
        .stack_size(8 << 20)
        .spawn(move || parse(src.as_bytes()).unwrap_err())
        .unwrap()
        .join()
        .unwrap();
    assert_eq!("nesting too deep", err.message);
}

#[test]
fn moderate_nesting_parses() {
    parse(format!("{}1{}", "(".repeat(20), ")".repeat(20)).as_bytes()).unwrap();
    parse(format!("{}{}", "[".repeat(20), "]".repeat(20)).as_bytes()).unwrap();
    parse(nested_interpolation(20).as_bytes()).unwrap();
}

#[test]
fn errors_name_the_file() {
    let err = RubyParser
        .parse(b"a = 1; a++", Some(Path::new("prog.rb")))
        .unwrap_err();
    assert_eq!(Some(Path::new("prog.rb")), err.file.as_deref());
    assert_eq!("prog.rb:1:11: unexpected end of input", err.to_string());

    let err = RubyParser.parse(b"a = 1; a++", None).unwrap_err();
    assert_eq!("1:11: unexpected end of input", err.to_string());
}
