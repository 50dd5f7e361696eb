// src/dev/mod.rs
//! Sample grammars, input generators and logging setup shared by the binaries and tests.

pub mod generator;
pub mod grammars;
pub mod logging;
