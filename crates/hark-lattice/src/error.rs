use std::io;

#[derive(Debug, thiserror::Error)]
pub enum LatticeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("syntax error at line {line}: {text}")]
    Syntax { line: usize, text: String },

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("lattice has no {0} node")]
    MissingNode(&'static str),

    #[error("inconsistent lattice: {0}")]
    Inconsistent(String),
}
