/// Code Executor - Safety Check + Process Engine
///
/// **Responsibility:**
/// The single entry point for running learner code:
/// 1. Reject empty, oversized or denylisted source (safety.rs)
/// 2. Run what remains in a fresh interpreter (engine.rs)
/// 3. Log how the run ended
///
/// Rejected source never reaches the engine, so no process is spawned for it.
/// The executor holds no mutable state; clones share nothing but configuration
/// and may run concurrently.

use crate::engine::ProcessEngine;
use crate::safety::check_safety;
use pytutor_common::config::{ExecutionLimits, TutorConfig};
use pytutor_common::types::ExecutionOutcome;
use tracing::{debug, warn};

/// Source larger than this is rejected before parsing
pub const MAX_SOURCE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct Executor {
    engine: ProcessEngine,
    limits: ExecutionLimits,
}

impl Default for Executor {
    fn default() -> Self {
        Self::from_config(&TutorConfig::default())
    }
}

impl Executor {
    pub fn new(engine: ProcessEngine, limits: ExecutionLimits) -> Self {
        Self { engine, limits }
    }

    pub fn from_config(config: &TutorConfig) -> Self {
        Self::new(
            ProcessEngine::new(config.python_path.clone(), config.isolated_mode),
            config.limits(),
        )
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    /// Execute with the configured limits
    pub async fn execute(&self, source: &str) -> ExecutionOutcome {
        self.execute_with(source, self.limits).await
    }

    /// Execute with optional per-call overrides of the configured limits
    pub async fn execute_code(
        &self,
        source: &str,
        timeout_seconds: Option<u64>,
        max_output_bytes: Option<usize>,
    ) -> ExecutionOutcome {
        let limits = self.limits.with_overrides(timeout_seconds, max_output_bytes);
        self.execute_with(source, limits).await
    }

    /// Execute with per-call limits
    #[tracing::instrument(skip(self, source), fields(source_bytes = source.len(), timeout_seconds = limits.timeout_seconds))]
    pub async fn execute_with(&self, source: &str, limits: ExecutionLimits) -> ExecutionOutcome {
        if source.len() > MAX_SOURCE_BYTES {
            warn!(max = MAX_SOURCE_BYTES, "Rejected oversized submission");
            return ExecutionOutcome::rejected(format!(
                "Code is too long (limit is {} bytes)",
                MAX_SOURCE_BYTES
            ));
        }

        let verdict = check_safety(source);
        if !verdict.is_safe {
            warn!(reason = %verdict.reason, "Rejected submission before execution");
            return ExecutionOutcome::rejected(verdict.reason);
        }

        let outcome = self.engine.run(source, limits).await;

        match outcome.error_kind {
            None => debug!(
                wall_clock_seconds = outcome.wall_clock_seconds,
                stdout_bytes = outcome.stdout.len(),
                "Execution succeeded"
            ),
            Some(kind) => warn!(
                error_kind = %kind,
                exit_code = outcome.exit_code,
                wall_clock_seconds = outcome.wall_clock_seconds,
                "Execution failed"
            ),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pytutor_common::types::ErrorKind;

    /// Points at an interpreter that does not exist: any spawn attempt
    /// would surface as a Runtime outcome instead of Validation.
    fn executor_without_interpreter() -> Executor {
        Executor::new(
            ProcessEngine::new("/nonexistent/python", false),
            ExecutionLimits::default(),
        )
    }

    #[tokio::test]
    async fn test_denylisted_import_never_spawns() {
        let outcome = executor_without_interpreter().execute("import os\nos.system('ls')").await;
        assert!(!outcome.succeeded);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Validation));
        assert!(outcome.stderr.contains("'os'"));
        assert_eq!(outcome.wall_clock_seconds, 0.0);
    }

    #[tokio::test]
    async fn test_blocked_call_in_default_argument_never_spawns() {
        let source = "def f(x=eval('6*7')):\n    return x\nprint(f())\n";
        let outcome = executor_without_interpreter().execute(source).await;
        assert_eq!(outcome.error_kind, Some(ErrorKind::Validation));
        assert!(outcome.stderr.contains("'eval'"), "{}", outcome.stderr);
    }

    #[tokio::test]
    async fn test_empty_source_rejected() {
        let outcome = executor_without_interpreter().execute("   \n").await;
        assert_eq!(outcome.error_kind, Some(ErrorKind::Validation));
        assert!(outcome.stderr.to_lowercase().contains("empty"));
    }

    #[tokio::test]
    async fn test_oversized_source_rejected() {
        let source = format!("x = '{}'", "a".repeat(MAX_SOURCE_BYTES));
        let outcome = executor_without_interpreter().execute(&source).await;
        assert_eq!(outcome.error_kind, Some(ErrorKind::Validation));
        assert!(outcome.stderr.contains("too long"));
    }

    #[tokio::test]
    async fn test_safe_source_reaches_engine() {
        let outcome = executor_without_interpreter().execute("print(1)").await;
        assert_eq!(outcome.error_kind, Some(ErrorKind::Runtime));
        assert!(outcome.stderr.starts_with("Execution failed"));
    }
}
