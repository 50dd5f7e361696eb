// src/lexer/mod.rs
pub mod buffer;
pub mod config;
pub mod error;
pub mod position;
pub mod scanner;
pub mod tables;

pub use buffer::{CharSource, ChunkedSource, ReaderSource, StrSource};
pub use config::ScannerConfig;
pub use error::{CodecError, ScanError, TableError};
pub use scanner::{Actions, Lifecycle, ScanState, Scanner, Step};
pub use tables::{ActionId, DfaTable, LexState};
