use thiserror::Error;

/// Fatal conditions raised by the tape machine.
#[derive(Debug, Error)]
pub enum TapeError {
    #[error("Tape Underflow: cursor {cursor} cannot shift by {delta}")]
    Underflow { cursor: usize, delta: isize },

    #[error("Invalid input: Empty String")]
    EmptyInput,

    #[error("Cell {index} is outside the tape (length {len})")]
    OutOfBounds { index: usize, len: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors found while translating source text into a program.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unmatched '[' at offset {position}")]
    UnmatchedOpen { position: usize },

    #[error("Unmatched ']' at offset {position}")]
    UnmatchedClose { position: usize },
}

/// Result type for machine operations
pub type Result<T> = std::result::Result<T, TapeError>;
