//! The smoke programs of the original test-suite: each is evaluated
//! once as parsed and once after a trip through the binary and the
//! text encodings, and all results must agree.

use nodemarshal::{Evaluator, Session};
use nodemarshal_eval::{ErrorKind, Interpreter, Value};
use nodemarshal_ruby::RubyParser;
use pretty_assertions::assert_eq;

type TestSession = Session<RubyParser, Interpreter<Vec<u8>>>;

fn session() -> TestSession {
    Session::new(RubyParser, Interpreter::with_output(Vec::new()))
}

/// Evaluate `src` directly, after a binary round trip and after a text
/// round trip. Returns the common result and the output of one run.
fn evaluate_all_ways(src: &str) -> (String, String) {
    let mut session = session();
    let graph = session.graph_from_source(src).expect("program must parse");

    let direct = session.evaluate(&graph).expect("direct evaluation");
    let out = std::mem::take(session.evaluator().output_mut());

    let binary = session.round_trip(&graph).expect("binary round trip");
    assert!(graph.is_isomorphic(&binary));
    let from_binary = session.evaluate(&binary).expect("evaluation after binary round trip");

    let text = session.encode_text(&graph).expect("text encoding");
    let decoded = session.decode_text(&text).expect("text decoding");
    let from_text = session.evaluate(&decoded).expect("evaluation after text round trip");

    assert_eq!(direct, from_binary);
    assert_eq!(direct, from_text);
    (direct.to_string(), String::from_utf8(out).expect("UTF-8 output"))
}

macro_rules! round_trip_tests {
    ($($name:ident: $src:expr => $expected:expr;)*) => {
        $(
            #[test]
            fn $name() {
                assert_eq!($expected, evaluate_all_ways($src).0);
            }
        )*
    };
}

/// The `ROT13 < String` smoke program with the class taken out, since
/// classes are not evaluated.
const ROT13_WITHOUT_CLASS: &str = r#"
$rfunc = Proc.new do |chr, limit|
	newcode = chr.ord + 13
	newcode -= 26 if newcode > limit.ord
	newcode.chr
end

def rot13(str)
	ans = ""
	str.each_char do |c|
		case c
		when ('A'..'Z')
			ans += $rfunc.(c,'Z')
		when ('a'..'z')
			ans += $rfunc.(c,'z')
		else
			ans += c
		end
	end
	return ans
end

$str = "This is global variable string!"
[rot13($str), rot13(rot13($str))]
"#;

round_trip_tests! {
    rot13: ROT13_WITHOUT_CLASS => r#"["Guvf vf tybony inevnoyr fgevat!", "This is global variable string!"]"#;
    sum_of_squares: "sum = 0\n(1..50).each do |n|\n\tsum += n ** 2\nend\nsum\n" => "42925";
    factorials: "ni = [1, 2, 3, 4, 5, 6, 7, 8, 9]\ndef fact(n)\n\t(n == 1) ? 1 : n * fact(n - 1)\nend\nni.map {|x| fact(x) }\n"
        => "[1, 2, 6, 24, 120, 720, 5040, 40320, 362880]";
    array: "[2*2, 3*3, 4*5 + 6, [5,6,7], true && false].flatten\n" => "[4, 9, 26, 5, 6, 7, false]";
    dstr: "a = \"#{1} and #{2*2} and #{3*3} and #{4*4}\"" => "\"1 and 4 and 9 and 16\"";
    node_match3: "a = \"  d--abc\"\na =~ Regexp.new(\"abc\")\n" => "5";
    block_pass: "[1, 2, 3, \"A\"].map(&:class)\n" => "[Integer, Integer, Integer, String]";
    op_asgn1: r#"x = {a: [1234], b: [5678, 2],
	and1: true, and2: true, and3: false, and4: false,
	or1:  true, or2:  true, or3:  false, or4:  false}
x[:a] &&= 'test'
x[:b] ||= 'qqq'

x[:and1] &&= false; x[:and2] &&= true
x[:and3] &&= false; x[:and4] &&= true

x[:or1] ||= false; x[:or2] ||= true
x[:or3] ||= false; x[:or4] ||= true
x
"# => concat!(
        "{:a=>\"test\", :b=>[5678, 2], ",
        ":and1=>false, :and2=>true, :and3=>false, :and4=>false, ",
        ":or1=>true, :or2=>true, :or3=>false, :or4=>true}"
    );
}

#[test]
fn hello() {
    let (value, out) = evaluate_all_ways("puts \"Hello, World\"\n\"Hello, World\"\n");
    assert_eq!("\"Hello, World\"", value);
    assert_eq!("Hello, World\n", out);
}

#[test]
fn eratosthenes() {
    let src = r#"
table = Array.new(5000) {|index| index + 2}
table.each_index do |ind|
	num = table[ind]
	if num != 0
		((ind + num)..(table.length)).step(num) {|i| table[i] = 0 }
	end
end
table.select! {|val| val != 0}
table
"#;
    let mut session = session();
    let graph = session.graph_from_source(src).unwrap();
    let binary = session.round_trip(&graph).unwrap();

    let Value::Array(primes) = session.evaluate(&binary).unwrap() else {
        panic!("expected an array");
    };
    let primes = primes.borrow();
    assert_eq!(669, primes.len());
    assert_eq!(Value::int(2), primes[0]);
    assert_eq!(Value::int(4999), primes[668]);
}

#[test]
fn classes_round_trip_but_are_not_evaluated() {
    let src = "class XYPoint\n\tdef initialize(x, y)\n\t\t@x = x.to_f\n\tend\nend\nXYPoint.new(1, 2)\n";
    let mut session = session();
    let graph = session.graph_from_source(src).unwrap();
    let binary = session.round_trip(&graph).unwrap();
    assert!(graph.is_isomorphic(&binary));

    let error = session.evaluator().evaluate(&binary).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::Unsupported(_)), "{error}");
}
