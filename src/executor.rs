use std::io::{self, Read};
use std::process::{ChildStderr, Stdio};
use std::thread;

use crate::{build_external_command, clip_to_boundary, exit_code_of, kill_process_group};

const READ_CHUNK_BYTES: usize = 4096;

/// Outcome of running one local command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExecutionResult {
    pub(crate) stdout: String,
    pub(crate) stderr: String,
    pub(crate) exit_code: i32,
    /// Set when the early output cutoff killed the process.
    pub(crate) truncated: bool,
}

impl ExecutionResult {
    pub(crate) fn failure(description: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: description.into(),
            exit_code: 1,
            truncated: false,
        }
    }
}

/// Anything able to run an argv to completion. Never fails: OS-level
/// problems come back as a failed [`ExecutionResult`].
pub(crate) trait CommandRunner {
    fn execute(&self, argv: &[String]) -> ExecutionResult;
}

/// Runs commands as child processes, killing them as soon as their stdout
/// grows past `max_output_size` bytes.
#[derive(Debug, Clone)]
pub(crate) struct BoundedExecutor {
    max_output_size: usize,
}

impl BoundedExecutor {
    pub(crate) fn new(max_output_size: usize) -> Self {
        Self { max_output_size }
    }

    fn run(&self, argv: &[String]) -> io::Result<ExecutionResult> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
        let mut cmd = build_external_command(program, args);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let pid = child.id();
        tracing::debug!(pid, command = ?argv, "spawned");

        let stderr_handle = child
            .stderr
            .take()
            .map(|pipe| spawn_stderr_drain(pipe, self.max_output_size));

        let mut stdout: Vec<u8> = Vec::new();
        let mut truncated = false;
        if let Some(mut pipe) = child.stdout.take() {
            let mut chunk = [0_u8; READ_CHUNK_BYTES];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        stdout.extend_from_slice(&chunk[..n]);
                        if stdout.len() > self.max_output_size {
                            truncated = true;
                            kill_process_group(&mut child);
                            tracing::warn!(
                                pid,
                                bytes = stdout.len(),
                                limit = self.max_output_size,
                                "output limit exceeded, killed"
                            );
                            break;
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        kill_process_group(&mut child);
                        let _ = child.wait();
                        return Err(err);
                    }
                }
            }
        }

        let status = child.wait()?;
        let stderr = stderr_handle
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        let stdout = String::from_utf8_lossy(&stdout).trim().to_string();
        let mut stderr = String::from_utf8_lossy(&stderr).trim().to_string();
        // Lossy decoding can widen invalid bytes, so clip after converting.
        clip_to_boundary(&mut stderr, self.max_output_size);

        let exit_code = exit_code_of(&status);
        tracing::debug!(pid, exit_code, truncated, stdout_bytes = stdout.len(), "finished");
        Ok(ExecutionResult {
            stdout,
            stderr,
            exit_code,
            truncated,
        })
    }
}

impl CommandRunner for BoundedExecutor {
    fn execute(&self, argv: &[String]) -> ExecutionResult {
        match self.run(argv) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(command = ?argv, error = %err, "execution error");
                ExecutionResult::failure(err.to_string())
            }
        }
    }
}

/// Reads stderr to EOF on its own thread so a chatty stderr cannot fill its
/// pipe and stall the child. Keeps at most `cap` bytes.
fn spawn_stderr_drain(pipe: ChildStderr, cap: usize) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut captured: Vec<u8> = Vec::new();
        let mut buffer = [0_u8; READ_CHUNK_BYTES];
        let mut reader = pipe;
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    let remaining = cap.saturating_sub(captured.len());
                    let take = remaining.min(n);
                    captured.extend_from_slice(&buffer[..take]);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        captured
    })
}
