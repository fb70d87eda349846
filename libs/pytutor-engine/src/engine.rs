/// Process Engine - Runs One Snippet in a Fresh Interpreter
///
/// **Core Responsibility:**
/// Launch `<python> -c <source>` in a throwaway working directory, capture
/// stdout/stderr separately, enforce the wall-clock budget and classify how
/// the run ended.
///
/// **Lifecycle:**
/// Spawned → Running → { Completed | TimedOut | LaunchFailed }
///
/// The child handle lives in a [`ProcessGuard`] from the moment it is spawned,
/// so it is killed and reaped on every path out of [`ProcessEngine::run`],
/// including cancellation of the surrounding future.
///
/// **Boundary:**
/// - Engine does NOT decide whether source is allowed to run (safety.rs)
/// - Engine does NOT judge correctness (validator.rs)

use pytutor_common::config::ExecutionLimits;
use pytutor_common::types::{ErrorKind, ExecutionOutcome};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

pub const TIMEOUT_MESSAGE: &str = "Code execution timed out (taking too long to run)";
pub const TRUNCATION_MARKER: &str = "\n... (output truncated)";

/// Extra stdout kept beyond `max_output_bytes` so trimming happens before truncation
const CAPTURE_SLACK_BYTES: usize = 64 * 1024;
const STDERR_CAPTURE_BYTES: usize = 64 * 1024;
/// How long to wait for the pipes to reach EOF once the child is gone
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Markers the interpreter writes to stderr when it cannot compile the source
const SYNTAX_MARKERS: &[&str] = &["syntaxerror", "invalid syntax", "indentationerror", "taberror"];

/// Where a single run is in its lifecycle
#[derive(Debug)]
enum RunState {
    Spawned,
    Running,
    Completed(ExitStatus),
    TimedOut,
    LaunchFailed(String),
}

/// Kill-and-reap guard around the child process
///
/// Dropping the guard before the child has been reaped sends SIGKILL;
/// `kill_on_drop` on the command lets tokio reap it in the background.
struct ProcessGuard {
    child: Child,
    reaped: bool,
}

impl ProcessGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        self.reaped = true;
        Ok(status)
    }

    /// Force-kill and wait for the process to be reaped
    async fn kill(&mut self) {
        match self.child.kill().await {
            Ok(()) => self.reaped = true,
            Err(e) => warn!(error = %e, "Failed to kill interpreter process"),
        }
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if !self.reaped {
            // Best-effort: the process may already have exited
            if let Err(e) = self.child.start_kill() {
                debug!(error = %e, "Interpreter already gone during cleanup");
            }
        }
    }
}

/// Bounded capture of one output stream
///
/// The reader keeps draining past the cap so the child never blocks on a
/// full pipe; only the first `cap` bytes are kept.
struct StreamCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl StreamCapture {
    fn start<R>(reader: Option<R>, cap: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let task = reader.map(|mut reader| {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match reader.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let mut captured = buffer.lock().unwrap_or_else(PoisonError::into_inner);
                            let room = cap.saturating_sub(captured.len());
                            captured.extend_from_slice(&chunk[..n.min(room)]);
                        }
                    }
                }
            })
        });
        Self { buffer, task }
    }

    /// Wait briefly for EOF, then return whatever was captured
    async fn finish(mut self) -> String {
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(DRAIN_TIMEOUT, &mut task).await.is_err() {
                // Pipe still held open (e.g. by a grandchild); keep what we have
                task.abort();
            }
        }
        let captured = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&captured).into_owned()
    }
}

/// Local-process execution backend
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    python_path: String,
    isolated: bool,
}

impl ProcessEngine {
    pub fn new(python_path: impl Into<String>, isolated: bool) -> Self {
        Self {
            python_path: python_path.into(),
            isolated,
        }
    }

    pub fn python_path(&self) -> &str {
        &self.python_path
    }

    /// Run `source` to completion or until the timeout fires
    ///
    /// Never returns an error: launch failures come back as a `Runtime`
    /// outcome carrying the OS error text.
    pub async fn run(&self, source: &str, limits: ExecutionLimits) -> ExecutionOutcome {
        let start = Instant::now();

        // Fresh cwd per run; removed when `workdir` drops
        let workdir = match tempfile::Builder::new().prefix("pytutor-run-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                let state = RunState::LaunchFailed(format!("could not create working directory: {}", e));
                return finish(state, String::new(), String::new(), limits, start);
            }
        };

        let path_env = std::env::var("PATH").unwrap_or_else(|_| "/usr/local/bin:/usr/bin:/bin".to_string());

        let mut command = Command::new(&self.python_path);
        if self.isolated {
            command.arg("-I");
        }
        command
            .arg("-c")
            .arg(source)
            .current_dir(workdir.path())
            .env_clear()
            .env("PATH", &path_env)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(python = %self.python_path, error = %e, "Failed to launch interpreter");
                return finish(RunState::LaunchFailed(e.to_string()), String::new(), String::new(), limits, start);
            }
        };

        let mut guard = ProcessGuard::new(child);
        let mut state = RunState::Spawned;
        debug!(pid = ?guard.child.id(), ?state, "Interpreter started");

        let stdout = StreamCapture::start(
            guard.child.stdout.take(),
            limits.max_output_bytes.saturating_add(CAPTURE_SLACK_BYTES),
        );
        let stderr = StreamCapture::start(guard.child.stderr.take(), STDERR_CAPTURE_BYTES);
        state = RunState::Running;
        debug!(?state, timeout_seconds = limits.timeout_seconds, "Capturing output");

        let budget = Duration::from_secs(limits.timeout_seconds);
        state = match tokio::time::timeout(budget, guard.wait()).await {
            Ok(Ok(status)) => RunState::Completed(status),
            Ok(Err(e)) => {
                error!(error = %e, "Failed to wait for interpreter");
                guard.kill().await;
                RunState::LaunchFailed(e.to_string())
            }
            Err(_) => {
                warn!(timeout_seconds = limits.timeout_seconds, "Execution timed out; killing interpreter");
                guard.kill().await;
                RunState::TimedOut
            }
        };

        let stdout = stdout.finish().await;
        let stderr = stderr.finish().await;
        drop(guard);

        finish(state, stdout, stderr, limits, start)
    }
}

/// Map a terminal lifecycle state plus captured streams to an outcome
fn finish(
    state: RunState,
    stdout: String,
    stderr: String,
    limits: ExecutionLimits,
    start: Instant,
) -> ExecutionOutcome {
    let elapsed = start.elapsed().as_secs_f64();
    let stdout = truncate_output(stdout.trim(), limits.max_output_bytes);

    match state {
        RunState::Completed(status) => {
            let stderr = stderr.trim().to_string();
            let exit_code = status.code().unwrap_or(-1);
            debug!(
                exit_code,
                stdout_bytes = stdout.len(),
                stderr_bytes = stderr.len(),
                elapsed_seconds = elapsed,
                "Interpreter finished"
            );
            if status.success() {
                ExecutionOutcome::success(stdout, stderr, elapsed)
            } else {
                let kind = classify_failure(&stderr);
                ExecutionOutcome::failure(kind, stdout, stderr, exit_code, elapsed)
            }
        }
        RunState::TimedOut => {
            ExecutionOutcome::failure(ErrorKind::Timeout, stdout, TIMEOUT_MESSAGE.to_string(), -1, elapsed)
        }
        RunState::LaunchFailed(reason) => ExecutionOutcome::failure(
            ErrorKind::Runtime,
            String::new(),
            format!("Execution failed: {}", reason),
            1,
            elapsed,
        ),
        // Only terminal states reach here
        RunState::Spawned | RunState::Running => ExecutionOutcome::failure(
            ErrorKind::Runtime,
            stdout,
            "Execution failed: interpreter did not finish".to_string(),
            1,
            elapsed,
        ),
    }
}

/// Syntax errors are reported by the interpreter, everything else is runtime
pub fn classify_failure(stderr: &str) -> ErrorKind {
    let lowered = stderr.to_lowercase();
    if SYNTAX_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        ErrorKind::Syntax
    } else {
        ErrorKind::Runtime
    }
}

/// Cut `text` to at most `max_bytes` (on a char boundary) and append the marker
pub fn truncate_output(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &text[..end], TRUNCATION_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_output("hello", 10), "hello");
        assert_eq!(truncate_output("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_appends_marker() {
        let long = "x".repeat(100);
        let out = truncate_output(&long, 50);
        assert!(out.starts_with(&"x".repeat(50)));
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert_eq!(out.len(), 50 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // 'é' is two bytes; cutting at 3 would split the second one
        let out = truncate_output("éééé", 3);
        assert!(out.starts_with('é'));
        assert_eq!(out, format!("é{}", TRUNCATION_MARKER));
    }

    #[test]
    fn test_classify_syntax_markers() {
        assert_eq!(
            classify_failure("  File \"<string>\", line 1\n    print('x'\nSyntaxError: '(' was never closed"),
            ErrorKind::Syntax
        );
        assert_eq!(
            classify_failure("IndentationError: expected an indented block"),
            ErrorKind::Syntax
        );
        assert_eq!(
            classify_failure("ZeroDivisionError: division by zero"),
            ErrorKind::Runtime
        );
        assert_eq!(classify_failure(""), ErrorKind::Runtime);
    }

    #[test]
    fn test_finish_timeout_shape() {
        let outcome = finish(
            RunState::TimedOut,
            "partial\n".into(),
            String::new(),
            ExecutionLimits::default(),
            Instant::now(),
        );
        assert!(!outcome.succeeded);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Timeout));
        assert_eq!(outcome.exit_code, -1);
        assert_eq!(outcome.stdout, "partial");
        assert!(outcome.stderr.contains("too long"));
    }

    #[test]
    fn test_finish_launch_failure_shape() {
        let outcome = finish(
            RunState::LaunchFailed("No such file or directory (os error 2)".into()),
            String::new(),
            String::new(),
            ExecutionLimits::default(),
            Instant::now(),
        );
        assert_eq!(outcome.error_kind, Some(ErrorKind::Runtime));
        assert_eq!(outcome.exit_code, 1);
        assert!(outcome.stderr.starts_with("Execution failed: "));
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_runtime_outcome() {
        let engine = ProcessEngine::new("/nonexistent/bin/python-does-not-exist", false);
        let outcome = engine.run("print(1)", ExecutionLimits::default()).await;
        assert!(!outcome.succeeded);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Runtime));
        assert!(outcome.stderr.starts_with("Execution failed: "));
    }
}
