use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use nodemarshal::{pretty, radix85, Graph, Session};
use nodemarshal_eval::Interpreter;
use nodemarshal_ruby::RubyParser;
use tracing::{debug, instrument};

pub mod args;
pub mod errors;
pub mod repl;

pub use args::{Args, Command, Direction, Encoded, Source};
pub use errors::Error;
pub use repl::Repl;

/// A session evaluating into `out`.
pub type CliSession<'a> = Session<RubyParser, Interpreter<&'a mut dyn Write>>;

pub fn session<'a>(args: &Args, out: &'a mut dyn Write) -> CliSession<'a> {
    Session::new(RubyParser, Interpreter::with_output(out)).with_decode_options(args.decode_options())
}

fn read_input(path: Option<&Path>, stdin: &mut dyn Read) -> Result<Vec<u8>, Error> {
    match path {
        Some(path) => fs::read(path).map_err(|source| Error::Read {
            path: path.to_owned(),
            source,
        }),
        None => {
            let mut bytes = Vec::new();
            stdin.read_to_end(&mut bytes)?;
            Ok(bytes)
        }
    }
}

fn parse_source(session: &CliSession, source: &Source, stdin: &mut dyn Read) -> Result<Graph, Error> {
    let graph = match (&source.expr, &source.script) {
        (Some(expr), _) => session.graph_from_source(expr)?,
        (None, Some(script)) => session.graph_from_file(script)?,
        (None, None) => session.graph_from_source(read_input(None, stdin)?)?,
    };
    debug!(nodes = graph.len(), root = %graph.root(), "parsed source");
    Ok(graph)
}

fn decode_input(session: &CliSession, input: &Encoded, stdin: &mut dyn Read) -> Result<Graph, Error> {
    let bytes = read_input(input.input.as_deref(), stdin)?;
    Ok(if input.text {
        session.decode_text(bytes.trim_ascii())?
    } else {
        session.decode(&bytes)?
    })
}

/// Run the command described by `args`. Program output and results go
/// to `stdout`; logs and errors are left to the caller.
#[instrument(level = "debug", skip_all, err)]
pub fn run(args: &Args, stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<(), Error> {
    match &args.command {
        Command::Compile {
            source,
            text,
            output,
        } => {
            let mut sink = std::io::sink();
            let session = session(args, &mut sink);
            let graph = parse_source(&session, source, stdin)?;
            let bytes = if *text {
                let mut text = session.encode_text(&graph)?.into_bytes();
                text.push(b'\n');
                text
            } else {
                session.encode(&graph)?
            };
            match output {
                Some(path) => fs::write(path, &bytes).map_err(|source| Error::Write {
                    path: path.clone(),
                    source,
                })?,
                None => stdout.write_all(&bytes)?,
            }
        }

        Command::Run { input } => {
            let value = {
                let mut session = session(args, &mut *stdout);
                let graph = decode_input(&session, input, stdin)?;
                session.evaluate(&graph)?
            };
            writeln!(stdout, "=> {value}")?;
        }

        Command::Eval {
            source,
            display_ast,
        } => {
            let value = {
                let mut session = session(args, &mut *stdout);
                let graph = parse_source(&session, source, stdin)?;
                let decoded = session.round_trip(&graph)?;
                if *display_ast {
                    eprintln!("AST: {}", pretty::to_json(&decoded));
                }
                session.evaluate(&decoded)?
            };
            writeln!(stdout, "=> {value}")?;
        }

        Command::Dump { input } => {
            let mut sink = std::io::sink();
            let session = session(args, &mut sink);
            let graph = decode_input(&session, input, stdin)?;
            writeln!(stdout, "{}", pretty::to_json(&graph))?;
        }

        Command::Base85 { direction } => match direction {
            Direction::Encode { input } => {
                let bytes = read_input(input.as_deref(), stdin)?;
                writeln!(stdout, "{}", radix85::encode(&bytes))?;
            }
            Direction::Decode { input } => {
                let text = read_input(input.as_deref(), stdin)?;
                stdout.write_all(&radix85::decode(text.trim_ascii())?)?;
            }
        },

        Command::Repl => Repl::new(args)?.run()?,
    }
    stdout.flush()?;
    Ok(())
}
