//! Python interpreter discovery and line-streaming subprocess execution.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

// ============================================================================
// Constants
// ============================================================================

#[cfg(target_os = "windows")]
const PYTHON_CANDIDATES: &[&str] = &["python"];

#[cfg(not(target_os = "windows"))]
const PYTHON_CANDIDATES: &[&str] = &["python3", "python"];

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Python not found in PATH (tried: {0})")]
    PythonNotFound(String),

    #[error("Failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Failed to read process output: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Interpreter discovery
// ============================================================================

/// First Python interpreter found on `PATH`.
pub fn find_python() -> Result<PathBuf, ProcessError> {
    PYTHON_CANDIDATES
        .iter()
        .find_map(|candidate| which::which(candidate).ok())
        .ok_or_else(|| ProcessError::PythonNotFound(PYTHON_CANDIDATES.join(", ")))
}

/// Run `python -c <code>` and return trimmed stdout if it exits successfully.
pub async fn python_eval(python: &Path, code: &str) -> Option<String> {
    let output = Command::new(python)
        .args(["-c", code])
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .ok()?;

    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

// ============================================================================
// Streaming execution
// ============================================================================

/// Exit status and collected output of a finished process.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    /// Non-empty, trimmed stdout and stderr lines in arrival order.
    pub lines: Vec<String>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn joined(&self) -> String {
        self.lines.join("\n")
    }
}

/// Spawn `cmd` with stdout and stderr merged line by line.
///
/// `on_line` sees every non-empty trimmed line as it arrives. The child is
/// killed if the returned future is dropped.
pub async fn run_streaming(
    mut cmd: Command,
    mut on_line: impl FnMut(&str),
) -> Result<ProcessOutput, ProcessError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .env("PYTHONUNBUFFERED", "1")
        .spawn()
        .map_err(|e| ProcessError::Spawn {
            program: program.clone(),
            reason: e.to_string(),
        })?;

    let stdout = child.stdout.take().ok_or_else(|| ProcessError::Spawn {
        program: program.clone(),
        reason: "missing stdout".to_string(),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| ProcessError::Spawn {
        program: program.clone(),
        reason: "missing stderr".to_string(),
    })?;

    let mut out = BufReader::new(stdout).lines();
    let mut err = BufReader::new(stderr).lines();
    let (mut out_done, mut err_done) = (false, false);
    let mut lines = Vec::new();

    loop {
        let line = tokio::select! {
            line = out.next_line(), if !out_done => match line? {
                Some(line) => line,
                None => { out_done = true; continue; }
            },
            line = err.next_line(), if !err_done => match line? {
                Some(line) => line,
                None => { err_done = true; continue; }
            },
            else => break,
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        on_line(line);
        lines.push(line.to_string());
    }

    let status = child.wait().await?;
    debug!(%program, %status, lines = lines.len(), "Process finished");
    Ok(ProcessOutput { status, lines })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn merges_both_streams_and_skips_blank_lines() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo one; echo; echo two >&2; echo '  three  '; exit 3"]);

        let mut seen = Vec::new();
        let output = run_streaming(cmd, |line| seen.push(line.to_string()))
            .await
            .unwrap();

        assert!(!output.success());
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(seen, output.lines);
        let mut sorted = output.lines.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["one", "three", "two"]);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let cmd = Command::new("/nonexistent/voicestudio-test-binary");
        let err = run_streaming(cmd, |_| {}).await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn eval_returns_stdout_only_on_success() {
        let sh = Path::new("sh");
        assert_eq!(python_eval(sh, "echo True").await.as_deref(), Some("True"));
        assert_eq!(python_eval(sh, "exit 1").await, None);
    }
}
