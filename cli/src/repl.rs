use std::path::PathBuf;

use nodemarshal::{pretty, SessionError};
use rustyline::{error::ReadlineError, Editor};

use crate::{session, Args, Error};

fn state_dir() -> Option<PathBuf> {
    let mut path = dirs::data_dir();
    if let Some(p) = path.as_mut() {
        p.push("nodemarshal")
    }
    path
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand<'a> {
    /// Evaluate the program after a round trip through the wire format
    Eval(&'a str),
    /// Show the graph of the program as JSON
    Dump(&'a str),
    /// Show the program in radix-85 text form
    Text(&'a str),
    Quit,
    Help,
}

impl<'a> ReplCommand<'a> {
    const HELP: &'static str = "
Welcome to the nodemarshal REPL!

Every input is a separate program. The following commands are supported:

  <program>    Encode, decode and evaluate a Ruby program and print the result
  :d <program> Print the graph of a Ruby program as JSON
  :t <program> Print the radix-85 text encoding of a Ruby program
  :q           Exit the REPL
  :?, :h       Display this help text
";

    pub fn parse(input: &'a str) -> Self {
        if input.starts_with(':') {
            if let Some(without_prefix) = input.strip_prefix(":d ") {
                return Self::Dump(without_prefix);
            } else if let Some(without_prefix) = input.strip_prefix(":t ") {
                return Self::Text(without_prefix);
            }

            match input.trim_end() {
                ":q" => return Self::Quit,
                ":h" | ":?" => return Self::Help,
                _ => {}
            }
        }
        Self::Eval(input)
    }
}

/// The outcome of one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplResult {
    /// The input was handled, printing this.
    Success(String),
    /// The input so far is not a complete program.
    Continue,
    Quit,
}

impl ReplResult {
    pub fn output(&self) -> &str {
        match self {
            ReplResult::Success(output) => output,
            ReplResult::Continue | ReplResult::Quit => "",
        }
    }
}

/// Whether `error` says the source ended in the middle of a construct,
/// so that more lines could complete it.
fn is_incomplete(error: &SessionError) -> bool {
    let SessionError::Syntax(error) = error else {
        return false;
    };
    let message = error.to_string();
    message.contains("unexpected end of input") || message.contains("meets end of file")
}

pub struct Repl {
    /// In-progress multiline input, when the input so far doesn't parse as a complete program
    multiline_input: Option<String>,
    rl: Editor<()>,
    args: Args,
}

impl Repl {
    pub fn new(args: &Args) -> Result<Self, Error> {
        Ok(Self {
            multiline_input: None,
            rl: Editor::<()>::new()?,
            args: args.clone(),
        })
    }

    fn handle(&self, command: ReplCommand) -> Result<String, SessionError> {
        let mut out: Vec<u8> = Vec::new();
        let result = {
            let mut session = session(&self.args, &mut out);
            match command {
                ReplCommand::Eval(src) => {
                    let graph = session.graph_from_source(src)?;
                    let decoded = session.round_trip(&graph)?;
                    format!("=> {}\n", session.evaluate(&decoded)?)
                }
                ReplCommand::Dump(src) => {
                    format!("{}\n", pretty::to_json(&session.graph_from_source(src)?))
                }
                ReplCommand::Text(src) => {
                    let graph = session.graph_from_source(src)?;
                    format!("{}\n", session.encode_text(&graph)?)
                }
                ReplCommand::Quit | ReplCommand::Help => String::new(),
            }
        };
        let mut output = String::from_utf8_lossy(&out).into_owned();
        output.push_str(&result);
        Ok(output)
    }

    /// Handle one line of input.
    pub fn send(&mut self, line: String) -> ReplResult {
        let input = match self.multiline_input.take() {
            Some(mut pending) => {
                pending.push('\n');
                pending.push_str(&line);
                pending
            }
            None => line,
        };

        let command = ReplCommand::parse(&input);
        let output = match command {
            ReplCommand::Quit => return ReplResult::Quit,
            ReplCommand::Help => format!("{}\n", ReplCommand::HELP),
            command => match self.handle(command) {
                Ok(output) => output,
                Err(error) if is_incomplete(&error) => {
                    self.multiline_input = Some(input);
                    return ReplResult::Continue;
                }
                Err(error) => format!("error: {error}\n"),
            },
        };
        self.rl.add_history_entry(input.as_str());
        ReplResult::Success(output)
    }

    pub fn run(mut self) -> Result<(), Error> {
        let history_path = match state_dir() {
            // Attempt to set up these paths, but do not hard fail if it
            // doesn't work.
            Some(mut path) => {
                let _ = std::fs::create_dir_all(&path);
                path.push("history.txt");
                let _ = self.rl.load_history(&path);
                Some(path)
            }

            None => None,
        };

        loop {
            let prompt = if self.multiline_input.is_some() {
                "           > "
            } else {
                "nodemarshal> "
            };

            match self.rl.readline(prompt) {
                Ok(line) => {
                    if line.is_empty() && self.multiline_input.is_none() {
                        continue;
                    }
                    match self.send(line) {
                        ReplResult::Quit => break,
                        ReplResult::Continue => {}
                        ReplResult::Success(output) => print!("{output}"),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }

        if let Some(path) = history_path {
            self.rl.save_history(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ReplCommand;

    #[test]
    fn commands() {
        assert_eq!(ReplCommand::Quit, ReplCommand::parse(":q"));
        assert_eq!(ReplCommand::Help, ReplCommand::parse(":? "));
        assert_eq!(ReplCommand::Dump("1 + 2"), ReplCommand::parse(":d 1 + 2"));
        assert_eq!(ReplCommand::Eval(":sym"), ReplCommand::parse(":sym"));
    }
}
