//! Whole programs that exercise most of the supported syntax at once.

use nodemarshal::NodeKind;
use rstest::rstest;

use crate::parse;

const HELLO: &str = "puts \"Hello, World\"\n\"Hello, World\"\n";

const FACTORIALS: &str = r#"
ni = [1, 2, 3, 4, 5, 6, 7, 8, 9]
def fact(n)
	(n == 1) ? 1 : n * fact(n - 1)
end
ni.map {|x| fact(x) }
"#;

const ROT13: &str = r#"
class ROT13 < String
	def initialize(str)
		@rfunc = Proc.new do |chr, limit|
			newcode = chr.ord + 13
			newcode -= 26 if newcode > limit.ord
			newcode.chr
		end
		super(str)
	end

	def rot13
		ans = ""
		self.each_char do |c|
			case c
			when ('A'..'Z')
				ans += @rfunc.(c,'Z')
			when ('a'..'z')
				ans += @rfunc.(c,'z')
			else
				ans += c
			end
		end
		return ROT13.new(ans)
	end
end

$str = ROT13.new("This is global variable string!")
[$str.rot13, $str.rot13.rot13]
"#;

const ERATOSTHENES: &str = r#"
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

const POINTS: &str = r#"
class XYPoint
	attr_reader :x, :y
	def initialize(x, y)
		@x = x.to_f
		@y = y.to_f
	end

	def distance(other)
		((@x - other.x) ** 2 + (@y - other.y) ** 2) ** 0.5
	end
end

class PolarPoint < XYPoint
	def initialize(r, phi)
		super(r*Math::sin(phi), r*Math::cos(phi))
	end
end

a = XYPoint.new(0, 0)
b = XYPoint.new(3, 4)
[a.distance(b), PolarPoint.new(1, Math::PI).distance(a)]
"#;

const OP_ASSIGN: &str = r#"
x = {a: [1234], b: [5678, 2],
	and1: true, and2: true, and3: false, and4: false,
	or1:  true, or2:  true, or3:  false, or4:  false}
x[:a] &&= 'test'
x[:b] ||= 'qqq'

x[:and1] &&= false; x[:and2] &&= true
x[:and3] &&= false; x[:and4] &&= true

x[:or1] ||= false; x[:or2] ||= true
x[:or3] ||= false; x[:or4] ||= true
x
"#;

#[rstest]
#[case::hello(HELLO, 2)]
#[case::sum_of_squares("sum = 0\n(1..50).each do |n|\n\tsum += n ** 2\nend\nsum\n", 3)]
#[case::factorials(FACTORIALS, 3)]
#[case::rot13(ROT13, 3)]
#[case::array("[2*2, 3*3, 4*5 + 6, [5,6,7], true && false].flatten\n", 1)]
#[case::eratosthenes(ERATOSTHENES, 4)]
#[case::points(POINTS, 5)]
#[case::regexp_match("a = \"  d--abc\"\na =~ Regexp.new(\"abc\")\n", 2)]
#[case::block_pass("[1, 2, 3, \"A\"].map(&:class)\n", 1)]
#[case::op_assign(OP_ASSIGN, 12)]
#[case::interpolation("a = \"#{1} and #{2*2} and #{3*3} and #{4*4}\"\n", 1)]
fn parses(#[case] src: &str, #[case] statements: usize) {
    let graph = parse(src.as_bytes()).unwrap_or_else(|e| panic!("{e}"));
    let root = &graph[graph.root()];
    assert_eq!(NodeKind::Sequence, root.kind);
    assert_eq!(statements, root.children.len());
}

#[test]
fn rot13_structure() {
    let graph = parse(ROT13.as_bytes()).unwrap();
    let count = |kind: NodeKind| graph.preorder().filter(|(_, n)| n.kind == kind).count();

    assert_eq!(1, count(NodeKind::Class));
    assert_eq!(2, count(NodeKind::Def));
    assert_eq!(1, count(NodeKind::Case));
    assert_eq!(2, count(NodeKind::When));
    assert_eq!(1, count(NodeKind::Super));
    assert_eq!(1, count(NodeKind::Return));
    // `@rfunc.(...)` twice
    let shorthand = graph
        .preorder()
        .filter(|(_, n)| n.kind == NodeKind::Call && n.payload.as_symbol().is_some_and(|s| *s == "call"))
        .count();
    assert_eq!(2, shorthand);
}

#[test]
fn multiple_assignment_is_rejected() {
    let err = parse(b"c, d = 1, 2\n").unwrap_err();
    assert_eq!("1:2: multiple assignment is not supported", err.to_string());
}
