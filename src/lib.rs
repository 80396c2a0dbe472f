//! Pipeline shell core: tokenizing, pipeline parsing, process launching
//! and child tracking. The binary in `main.rs` wraps this in a read-eval
//! loop.

pub mod eval;
pub mod job;
pub mod parser;
pub mod types;
