//! Core data model: micro-architectures, raw benchmark rows, and processed
//! dataset records.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Micro-architectures with a benchmark table in the data directory.
///
/// The code (`hsw`, `ivb`, `skl`) selects both the input table
/// (`throughput/<code>.csv`) and the output artifact (`bhive_<code>.data`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MicroArch {
    Haswell,
    IvyBridge,
    Skylake,
}

/// Error for unrecognized architecture codes.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown architecture '{0}' (expected one of: hsw, ivb, skl)")]
pub struct UnknownArchError(pub String);

impl MicroArch {
    /// All supported architectures, in a stable order.
    pub fn all() -> [MicroArch; 3] {
        [MicroArch::Haswell, MicroArch::IvyBridge, MicroArch::Skylake]
    }

    /// Short code used in file names and CLI arguments.
    pub fn code(&self) -> &'static str {
        match self {
            MicroArch::Haswell => "hsw",
            MicroArch::IvyBridge => "ivb",
            MicroArch::Skylake => "skl",
        }
    }

    /// File name of this architecture's block table.
    pub fn table_file_name(&self) -> String {
        format!("{}.csv", self.code())
    }

    /// File name of this architecture's dataset artifact.
    pub fn dataset_file_name(&self) -> String {
        format!("bhive_{}.data", self.code())
    }
}

impl FromStr for MicroArch {
    type Err = UnknownArchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hsw" => Ok(MicroArch::Haswell),
            "ivb" => Ok(MicroArch::IvyBridge),
            "skl" => Ok(MicroArch::Skylake),
            other => Err(UnknownArchError(other.to_string())),
        }
    }
}

impl fmt::Display for MicroArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One row of a block table: identifier, measured throughput in cycles, and
/// the block's opcode bytes as a hex string.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBlockRecord {
    pub block_id: String,
    pub throughput: f64,
    pub hex: String,
}

/// A fully processed block: both disassembly renderings plus the canonical
/// token stream, ready for serialization. One-to-one with the surviving
/// [`RawBlockRecord`] it was built from.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProcessedBlockRecord {
    pub block_id: String,
    pub throughput: f64,
    pub asm_intel: String,
    pub asm_xml: String,
    pub tokens: String,
}

/// Whether a string satisfies the opcode-bytes invariant: non-empty, even
/// length, ASCII hex digits only.
pub fn is_well_formed_hex(hex: &str) -> bool {
    !hex.is_empty() && hex.len() % 2 == 0 && hex.bytes().all(|b| b.is_ascii_hexdigit())
}
