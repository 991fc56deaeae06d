//! Protocol layer for the ELM327 diagnostic terminal: hex codec, line
//! framing, ISO 15765-2 reassembly and the traffic analyzer.
//!
//! Everything here is pure with respect to I/O. Bytes come in as slices or
//! string slices, annotations and lines come out as values; the session
//! layer owns all file descriptors.

pub mod analyzer;
pub mod framer;
pub mod hex;
pub mod isotp;
pub mod tables;

pub use analyzer::{Analyzer, Annotation, Severity};
pub use framer::LineFramer;
