//! Subprocess-backed [`BlockToolchain`] implementation.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::config::ToolchainConfig;

use super::{
    parse_token_output, split_disasm_output, BlockToolchain, Disassembly, ToolError, ToolResult,
    DISASSEMBLER, TOKENIZER,
};

/// Interval between liveness polls while waiting on a child process.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Toolchain that shells out to the configured disassembler and tokenizer.
///
/// Each invocation owns its child exclusively: stdout and stderr are drained
/// on reader threads while the parent polls for exit, and every path
/// (success, failure, timeout) reaps the child before returning.
#[derive(Debug, Clone)]
pub struct CommandToolchain {
    config: ToolchainConfig,
}

impl CommandToolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolchainConfig {
        &self.config
    }

    fn run_tool(&self, tool: &'static str, mut cmd: Command) -> ToolResult<String> {
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(|source| ToolError::Spawn { tool, source })?;

        // Drain both pipes off-thread so a chatty tool cannot stall on a
        // full pipe buffer while we wait for it to exit.
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let status = match wait_with_timeout(&mut child, self.config.tool_timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = stdout_reader.join();
                let _ = stderr_reader.join();
                return Err(ToolError::TimedOut {
                    tool,
                    timeout_secs: self.config.tool_timeout.as_secs(),
                });
            }
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolError::Capture { tool, source });
            }
        };

        let stdout = join_reader(tool, stdout_reader)?;
        let stderr = join_reader(tool, stderr_reader)?;

        if !status.success() {
            return Err(ToolError::NonZeroExit { tool, status, stderr: snippet(&stderr) });
        }
        Ok(stdout)
    }
}

impl BlockToolchain for CommandToolchain {
    fn disassemble(&self, hex: &str) -> ToolResult<Disassembly> {
        debug!("invoking {} at {}", DISASSEMBLER, self.config.disasm.display());
        let mut cmd = Command::new(&self.config.disasm);
        cmd.arg(hex);
        let stdout = self.run_tool(DISASSEMBLER, cmd)?;
        split_disasm_output(&stdout)
    }

    fn tokenize(&self, hex: &str) -> ToolResult<String> {
        debug!("invoking {} at {}", TOKENIZER, self.config.tokenizer.display());
        let mut cmd = Command::new(&self.config.tokenizer);
        cmd.arg(hex)
            .arg("--token")
            .env("ITHEMAL_HOME", &self.config.ithemal_home)
            .env("DYNAMORIO_HOME", &self.config.dynamorio_home);
        let stdout = self.run_tool(TOKENIZER, cmd)?;
        parse_token_output(&stdout)
    }
}

/// Poll `try_wait` until exit or deadline. `Ok(None)` means the deadline
/// passed with the child still running; the caller must kill and reap it.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(WAIT_POLL_INTERVAL);
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> thread::JoinHandle<std::io::Result<String>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    })
}

fn join_reader(
    tool: &'static str,
    handle: thread::JoinHandle<std::io::Result<String>>,
) -> ToolResult<String> {
    match handle.join() {
        Ok(Ok(buf)) => Ok(buf),
        Ok(Err(source)) => Err(ToolError::Capture { tool, source }),
        Err(_) => Err(ToolError::Capture {
            tool,
            source: std::io::Error::other("output reader thread panicked"),
        }),
    }
}

/// First few hundred characters of trimmed stderr, for error messages.
fn snippet(stderr: &str) -> String {
    stderr.trim().chars().take(400).collect()
}
