use clap::Parser;
use nodemarshal_cli::{run, Args, Error};
use pretty_assertions::assert_eq;

fn invoke(argv: &[&str], stdin: &[u8]) -> Result<Vec<u8>, Error> {
    let args = Args::parse_from(std::iter::once("nodemarshal").chain(argv.iter().copied()));
    let mut stdin = stdin;
    let mut stdout: Vec<u8> = Vec::new();
    run(&args, &mut stdin, &mut stdout)?;
    Ok(stdout)
}

fn invoke_str(argv: &[&str], stdin: &[u8]) -> String {
    String::from_utf8(invoke(argv, stdin).unwrap()).unwrap()
}

#[test]
fn eval_expression() {
    assert_eq!("=> 3\n", invoke_str(&["eval", "-E", "1 + 2"], b""));
}

#[test]
fn eval_reads_stdin() {
    assert_eq!(
        "6\n=> nil\n",
        invoke_str(&["eval"], b"puts([1, 2, 3].sum)\n")
    );
}

#[test]
fn compiled_text_runs() {
    let text = invoke_str(&["compile", "--text", "-E", "[1, 2].map { |x| x * 10 }"], b"");
    assert!(text.ends_with('\n'));
    assert_eq!("=> [10, 20]\n", invoke_str(&["run", "--text"], text.as_bytes()));
}

#[test]
fn compiled_binary_runs_from_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program.bin");
    let path = path.to_str().unwrap();

    let stdout = invoke(&["compile", "-E", "'a' * 3", "-o", path], b"").unwrap();
    assert!(stdout.is_empty());
    assert_eq!("=> \"aaa\"\n", invoke_str(&["run", path], b""));
}

#[test]
fn compile_reads_scripts() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("script.rb");
    std::fs::write(&script, "x = 5\nx * x\n").unwrap();

    let binary = invoke(&["compile", script.to_str().unwrap()], b"").unwrap();
    assert_eq!("=> 25\n", invoke_str(&["run"], &binary));
}

#[test]
fn base85_both_ways() {
    let text = invoke_str(&["base85", "encode"], b"hello");
    assert_eq!(
        b"hello".to_vec(),
        invoke(&["base85", "decode"], text.as_bytes()).unwrap()
    );
}

#[test]
fn syntax_errors_fail() {
    assert!(matches!(
        invoke(&["eval", "-E", "1 +"], b""),
        Err(Error::Session(nodemarshal::SessionError::Syntax(_)))
    ));
}

#[test]
fn decoding_limits_apply() {
    let binary = invoke(&["compile", "-E", "[1, 2, 3, 4]"], b"").unwrap();
    assert!(matches!(
        invoke(&["--max-nodes", "2", "run"], &binary),
        Err(Error::Session(nodemarshal::SessionError::Decode(_)))
    ));
}

#[test]
fn missing_input_file() {
    assert!(matches!(
        invoke(&["run", "/nonexistent/program.bin"], b""),
        Err(Error::Read { .. })
    ));
}
