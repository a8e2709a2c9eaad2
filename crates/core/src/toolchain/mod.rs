//! External-tool seam.
//!
//! Disassembly and tokenization run as short-lived subprocesses in
//! production, but everything downstream only sees the [`BlockToolchain`]
//! trait, so tests swap in in-process fakes without touching the pipeline.

pub mod command;

pub use command::CommandToolchain;

use thiserror::Error;

pub(crate) const DISASSEMBLER: &str = "disassembler";
pub(crate) const TOKENIZER: &str = "tokenizer";

/// Per-block tool failure. Never fatal to a run: the pipeline counts the
/// failure, drops the block, and moves on.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    NonZeroExit { tool: &'static str, status: std::process::ExitStatus, stderr: String },

    #[error("{tool} timed out after {timeout_secs}s")]
    TimedOut { tool: &'static str, timeout_secs: u64 },

    #[error("{tool} produced malformed output: {reason}")]
    MalformedOutput { tool: &'static str, reason: String },

    #[error("failed to capture {tool} output: {source}")]
    Capture {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience result type for tool invocations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Both textual renderings of one block, parsed from a single disassembler
/// invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Disassembly {
    /// Compact Intel-syntax listing.
    pub intel: String,
    /// Structured XML rendering.
    pub xml: String,
}

/// The two operations the pipeline needs from the outside world.
pub trait BlockToolchain: Send + Sync {
    /// Disassemble hex-encoded opcode bytes into both renderings.
    fn disassemble(&self, hex: &str) -> ToolResult<Disassembly>;

    /// Tokenize hex-encoded opcode bytes into the canonical token stream.
    fn tokenize(&self, hex: &str) -> ToolResult<String>;
}

/// Split a disassembler's stdout into its compact and structured sections.
///
/// The structured rendering starts at the first line whose trimmed form
/// begins with `<`; everything before that line is the compact rendering.
/// Both sections must be non-empty.
pub fn split_disasm_output(stdout: &str) -> ToolResult<Disassembly> {
    if stdout.trim().is_empty() {
        return Err(ToolError::MalformedOutput {
            tool: DISASSEMBLER,
            reason: "empty output".to_string(),
        });
    }

    let mut split_at = None;
    let mut pos = 0;
    for line in stdout.split_inclusive('\n') {
        if line.trim_start().starts_with('<') {
            split_at = Some(pos);
            break;
        }
        pos += line.len();
    }

    let split_at = split_at.ok_or_else(|| ToolError::MalformedOutput {
        tool: DISASSEMBLER,
        reason: "no structured section in output".to_string(),
    })?;

    let intel = stdout[..split_at].trim();
    if intel.is_empty() {
        return Err(ToolError::MalformedOutput {
            tool: DISASSEMBLER,
            reason: "empty compact section".to_string(),
        });
    }
    let xml = stdout[split_at..].trim();

    Ok(Disassembly { intel: intel.to_string(), xml: xml.to_string() })
}

/// Validate a tokenizer's stdout and trim it to the token stream.
pub fn parse_token_output(stdout: &str) -> ToolResult<String> {
    let tokens = stdout.trim();
    if tokens.is_empty() {
        return Err(ToolError::MalformedOutput {
            tool: TOKENIZER,
            reason: "empty output".to_string(),
        });
    }
    Ok(tokens.to_string())
}
