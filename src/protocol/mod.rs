//! Line protocol implementation.
//!
//! The wire format is newline-delimited UTF-8 text, one exchange per
//! request line. `parser` owns request parsing and response rendering;
//! `handler` owns the per-connection session loop.

pub mod handler;
pub mod parser;
