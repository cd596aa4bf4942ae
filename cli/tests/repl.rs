use clap::Parser;
use expect_test::expect;
use nodemarshal_cli::repl::ReplResult;
use nodemarshal_cli::{Args, Repl};

macro_rules! test_repl {
    ($name:ident() {$($send:expr => $expect:expr;)*}) => {
        #[test]
        fn $name() {
            let args = Args::parse_from(["nodemarshal", "repl"]);
            let mut repl = Repl::new(&args).unwrap();
            $({
                let result = repl.send($send.into());
                $expect.assert_eq(result.output());
            })*
        }
    }
}

test_repl!(simple_expr_eval() {
    "1" => expect![[r#"
        => 1
    "#]];
});

test_repl!(output_comes_before_the_value() {
    "puts 'hi'; 3 * 4" => expect![[r#"
        hi
        => 12
    "#]];
});

#[test]
fn inputs_are_separate_programs() {
    let args = Args::parse_from(["nodemarshal", "repl"]);
    let mut repl = Repl::new(&args).unwrap();
    assert_eq!(ReplResult::Success("=> 1\n".into()), repl.send("x = 1".into()));
    let result = repl.send("x".into());
    assert!(result.output().starts_with("error: "), "{result:?}");
}

test_repl!(multiline_input() {
    "def double(n)" => expect![[""]];
    "  n * 2" => expect![[""]];
    "end; double(21)" => expect![[r#"
        => 42
    "#]];
});

#[test]
fn dump_graph() {
    let args = Args::parse_from(["nodemarshal", "repl"]);
    let mut repl = Repl::new(&args).unwrap();
    let output = repl.send(":d 40 + 2".into()).output().to_owned();
    assert!(output.starts_with("{\n  \"root\": "), "{output}");
    assert!(output.contains("\"value\": \"40\""), "{output}");
    assert!(output.contains("\"name\": \"+\""), "{output}");
}

#[test]
fn errors_are_reported_and_the_repl_goes_on() {
    let args = Args::parse_from(["nodemarshal", "repl"]);
    let mut repl = Repl::new(&args).unwrap();
    let result = repl.send("1 / 0".into());
    assert!(result.output().starts_with("error: "), "{result:?}");
    assert_eq!(ReplResult::Success("=> 2\n".into()), repl.send("1 + 1".into()));
    assert_eq!(ReplResult::Quit, repl.send(":q".into()));
}
