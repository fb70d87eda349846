/// Challenge Session - Explicit Per-Challenge State
///
/// **Core Responsibility:**
/// Own everything that changes while one learner works on one challenge:
/// attempt history, hints revealed so far, and the cached expected output
/// of the reference solution.
///
/// **Properties:**
/// - Nothing is global; two sessions never share state
/// - The validator stays stateless and is borrowed per submission
/// - The reference solution runs at most once per session (ExactMatch)

use crate::hints::{hint_for_attempt, should_reveal_solution, Hint};
use crate::validator::{ExpectedOutput, Validator};
use chrono::Utc;
use pytutor_common::types::{Attempt, ChallengeSpec, ValidationStrategy, ValidationVerdict};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// What the caller gets back for one submission
#[derive(Debug, Clone)]
pub struct SubmissionReport {
    pub verdict: ValidationVerdict,
    pub attempt_number: u32,
    /// Next hint, only after a failed attempt
    pub hint: Option<Hint>,
    /// Reference solution, once all allowed attempts have failed
    pub revealed_solution: Option<String>,
    pub attempts_remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub challenge_id: String,
    pub attempts: u32,
    pub failed_attempts: u32,
    pub hints_used: u32,
    pub best_score: f64,
    pub solved: bool,
}

#[derive(Debug, Clone)]
pub struct ChallengeSession {
    challenge: ChallengeSpec,
    max_attempts: u32,
    attempts: Vec<Attempt>,
    hints_used: u32,
    /// `None` until resolved; `Some(None)` when the reference solution failed
    expected_output: Option<Option<String>>,
}

impl ChallengeSession {
    pub fn new(challenge: ChallengeSpec, max_attempts: u32) -> Self {
        Self {
            challenge,
            max_attempts: max_attempts.max(1),
            attempts: Vec::new(),
            hints_used: 0,
            expected_output: None,
        }
    }

    pub fn challenge(&self) -> &ChallengeSpec {
        &self.challenge
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn hints_used(&self) -> u32 {
        self.hints_used
    }

    pub fn is_solved(&self) -> bool {
        self.attempts.iter().any(|a| a.verdict.is_correct)
    }

    fn failed_attempts(&self) -> u32 {
        self.attempts.iter().filter(|a| !a.verdict.is_correct).count() as u32
    }

    /// Validate one submission and record it in the history
    pub async fn submit(&mut self, validator: &Validator, source: &str) -> SubmissionReport {
        if self.expected_output.is_none() && self.challenge.strategy == ValidationStrategy::ExactMatch {
            self.expected_output = Some(validator.expected_output(&self.challenge).await);
        }

        let expected = match &self.expected_output {
            Some(resolved) => ExpectedOutput::from_resolved(resolved.as_deref()),
            None => ExpectedOutput::Derive,
        };
        let verdict = validator
            .validate_with_expected(source, &self.challenge, expected)
            .await;

        let attempt_number = self.attempts.len() as u32 + 1;
        let mut hint = None;
        let mut revealed_solution = None;

        if !verdict.is_correct {
            let failed = self.failed_attempts() + 1;
            hint = Some(self.next_hint());
            if should_reveal_solution(failed, self.max_attempts) {
                revealed_solution = Some(self.challenge.solution.clone());
            }
        }

        self.attempts.push(Attempt {
            id: Uuid::new_v4(),
            challenge_id: self.challenge.id.clone(),
            submitted_code: source.to_string(),
            verdict: verdict.clone(),
            attempt_number,
            hints_used: self.hints_used,
            submitted_at: Utc::now(),
        });

        info!(
            challenge = %self.challenge.id,
            attempt_number,
            is_correct = verdict.is_correct,
            score = verdict.score,
            "Recorded attempt"
        );

        SubmissionReport {
            verdict,
            attempt_number,
            hint,
            revealed_solution,
            attempts_remaining: self.max_attempts.saturating_sub(self.failed_attempts()),
        }
    }

    /// Explicit hint request between submissions
    pub fn request_hint(&mut self) -> Hint {
        self.next_hint()
    }

    /// Hints advance on one counter whether requested or earned by a failure
    fn next_hint(&mut self) -> Hint {
        self.hints_used += 1;
        hint_for_attempt(&self.challenge, self.hints_used)
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            challenge_id: self.challenge.id.clone(),
            attempts: self.attempts.len() as u32,
            failed_attempts: self.failed_attempts(),
            hints_used: self.hints_used,
            best_score: self
                .attempts
                .iter()
                .map(|a| a.verdict.score)
                .fold(0.0, f64::max),
            solved: self.is_solved(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ProcessEngine;
    use crate::executor::Executor;
    use pytutor_common::config::ExecutionLimits;

    /// Every submission that reaches the interpreter fails to launch, which
    /// makes the failure path deterministic without python installed
    fn offline_validator() -> Validator {
        Validator::new(Executor::new(
            ProcessEngine::new("/nonexistent/python", false),
            ExecutionLimits::default(),
        ))
    }

    fn challenge() -> ChallengeSpec {
        ChallengeSpec::new("Print 4", "print(2 + 2)")
            .with_id("arithmetic-1")
            .with_expected_output("4")
            .with_hints(["Use print()", "2 + 2 is 4"])
    }

    #[tokio::test]
    async fn test_failed_attempts_unlock_hints_then_solution() {
        let validator = offline_validator();
        let mut session = ChallengeSession::new(challenge(), 3);

        let first = session.submit(&validator, "print(4)").await;
        assert_eq!(first.attempt_number, 1);
        assert_eq!(first.hint, Some(Hint::Text("Use print()".into())));
        assert_eq!(first.revealed_solution, None);
        assert_eq!(first.attempts_remaining, 2);

        let second = session.submit(&validator, "print(4)").await;
        assert_eq!(second.hint, Some(Hint::Text("2 + 2 is 4".into())));

        let third = session.submit(&validator, "print(4)").await;
        assert!(matches!(third.hint, Some(Hint::Skeleton(_))));
        assert_eq!(third.revealed_solution.as_deref(), Some("print(2 + 2)"));
        assert_eq!(third.attempts_remaining, 0);

        let stats = session.stats();
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.failed_attempts, 3);
        assert_eq!(stats.hints_used, 3);
        assert!(!stats.solved);
        assert_eq!(session.attempts()[2].attempt_number, 3);
        assert_eq!(session.attempts()[0].challenge_id, "arithmetic-1");
    }

    #[tokio::test]
    async fn test_empty_submission_is_recorded() {
        let validator = offline_validator();
        let mut session = ChallengeSession::new(challenge(), 3);
        let report = session.submit(&validator, "").await;
        assert!(!report.verdict.is_correct);
        assert_eq!(session.attempts().len(), 1);
        assert_eq!(session.attempts()[0].submitted_code, "");
    }

    #[test]
    fn test_request_hint_progresses() {
        let mut session = ChallengeSession::new(challenge(), 3);
        assert_eq!(session.request_hint().text(), "Use print()");
        assert_eq!(session.request_hint().text(), "2 + 2 is 4");
        assert_eq!(session.hints_used(), 2);
    }

    #[tokio::test]
    async fn test_requested_hint_is_not_repeated_on_failure() {
        let validator = offline_validator();
        let mut session = ChallengeSession::new(challenge(), 3);

        assert_eq!(session.request_hint().text(), "Use print()");
        let report = session.submit(&validator, "print(4)").await;
        assert_eq!(report.hint, Some(Hint::Text("2 + 2 is 4".into())));
        assert_eq!(report.revealed_solution, None);
        assert_eq!(session.hints_used(), 2);
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut a = ChallengeSession::new(challenge(), 3);
        let b = ChallengeSession::new(challenge(), 3);
        a.request_hint();
        assert_eq!(a.hints_used(), 1);
        assert_eq!(b.hints_used(), 0);
    }
}
