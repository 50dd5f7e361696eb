// src/lexer/error.rs
use std::io;

use thiserror::Error;

use super::tables::{ActionId, LookaheadId, pack::Encoding};

/// Failures of the packed-array codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("value {value} at index {index} does not fit {encoding:?} packing (translate {translate})")]
    InvalidArgument {
        index: usize,
        value: i64,
        translate: i64,
        encoding: Encoding,
    },
    #[error("malformed packed data at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },
    #[error("packed data holds {actual} entries but {expected} were declared")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("decoded value {value} does not fit the requested integer type")]
    Overflow { value: i64 },
}

/// A table description that cannot drive a scanner.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("table has no states")]
    NoStates,
    #[error("table declares no lexical states")]
    NoLexicalStates,
    #[error("{what} has {actual} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("row of state {state} at offset {offset} runs past the transition table ({len} entries)")]
    RowOutOfRange {
        state: usize,
        offset: usize,
        len: usize,
    },
    #[error("transition entry {index} targets unknown state {target}")]
    BadTarget { index: usize, target: i64 },
    #[error("{what} refers to unknown state {state}")]
    UnknownState { what: &'static str, state: usize },
    #[error("{what} refers to unknown action {action}")]
    UnknownAction { what: &'static str, action: ActionId },
    #[error("action {action} refers to unknown lookahead automaton {id}")]
    UnknownLookahead { action: ActionId, id: LookaheadId },
    #[error("character {code:#x} maps to class {class} but only {n_classes} classes exist")]
    BadClass {
        code: usize,
        class: usize,
        n_classes: usize,
    },
    #[error("{0} character classes exceed the 16-bit class map")]
    TooManyClasses(usize),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("failed to parse tables JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by [`crate::lexer::scanner::Scanner`].
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no rule matches the input at line {line}, column {column} (char {char_offset})")]
    NoMatch {
        line: usize,
        column: usize,
        char_offset: usize,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("trailing context of action {action} could not be resolved")]
    BrokenLookahead { action: ActionId },
    #[error("scanner is closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Table(#[from] TableError),
}
