use std::io;
use std::path::PathBuf;

use nodemarshal::{Radix85Error, SessionError};
use rustyline::error::ReadlineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Radix85(#[from] Radix85Error),

    #[error("could not read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("could not write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("i/o error on the standard streams: {0}")]
    Stdio(#[from] io::Error),

    #[error(transparent)]
    Readline(#[from] ReadlineError),
}
