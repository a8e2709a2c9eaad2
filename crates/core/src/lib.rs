//! bhive-core
//!
//! Core library for converting basic-block throughput benchmarks into
//! serialized training datasets.
//!
//! The pipeline has four stages: load the exclusion table, stream the
//! per-architecture block table, disassemble and tokenize each surviving
//! block through external tools, and write the ordered dataset artifact.
//! All substantive logic lives here so it is fully testable and reusable
//! from multiple frontends (CLI today, batch drivers later).

pub mod config;
pub mod db;
pub mod exclusion;
pub mod model;
pub mod pipeline;
pub mod reader;
pub mod toolchain;
pub mod writer;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
