/// Challenge Validator - Execute Once, Then Judge
///
/// **Core Responsibility:**
/// Turn one submission plus one [`ChallengeSpec`] into a [`ValidationVerdict`].
///
/// **Order of Operations:**
/// 1. Empty submission → "No code provided", nothing is executed
/// 2. Execute the submission once (safety check included)
/// 3. Execution failure → score 0.0 with the friendly error; no strategy runs
/// 4. Dispatch on the strategy; every strategy judges the same captured outcome
/// 5. Score (scoring.rs) and attach quality notes (quality.rs)
///
/// **Normalization (ExactMatch):**
/// - Leading/trailing whitespace trimmed
/// - Internal whitespace runs collapsed to one space
/// - Compared case-insensitively

use crate::executor::Executor;
use crate::feedback::{error_suggestions, friendly_error};
use crate::pattern;
use crate::quality;
use crate::requirements;
use crate::scoring::{self, ScoreInputs};
use crate::syntax::SyntaxTree;
use pytutor_common::types::{ChallengeSpec, ExecutionOutcome, ValidationStrategy, ValidationVerdict};
use std::collections::BTreeSet;
use tracing::{info, warn};

pub const NO_CODE_FEEDBACK: &str = "No code provided. Please write some code to solve the challenge.";

/// What a strategy decided, before scoring
#[derive(Debug, Clone, PartialEq)]
struct StrategyResult {
    passed: bool,
    /// `None` when the strategy does not compare output
    output_matches: Option<bool>,
    requirements_fraction: f64,
    unmet: BTreeSet<String>,
    feedback: String,
}

impl StrategyResult {
    fn pass(output_matches: Option<bool>, feedback: &str) -> Self {
        Self {
            passed: true,
            output_matches,
            requirements_fraction: 1.0,
            unmet: BTreeSet::new(),
            feedback: feedback.to_string(),
        }
    }
}

/// Collapse whitespace runs and trim; the comparison form of program output
pub fn normalize_output(output: &str) -> String {
    output.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn outputs_match(actual: &str, expected: &str) -> bool {
    normalize_output(actual).to_lowercase() == normalize_output(expected).to_lowercase()
}

/// What ExactMatch compares against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedOutput<'a> {
    /// Not resolved yet; derive it from the challenge
    Derive,
    Known(&'a str),
    /// Already resolved and the reference solution failed; do not rerun it
    Unavailable,
}

impl<'a> ExpectedOutput<'a> {
    pub fn from_resolved(resolved: Option<&'a str>) -> Self {
        match resolved {
            Some(expected) => ExpectedOutput::Known(expected),
            None => ExpectedOutput::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    executor: Executor,
}

impl Validator {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Validate a submission, deriving expected output as needed
    pub async fn validate(&self, source: &str, challenge: &ChallengeSpec) -> ValidationVerdict {
        self.validate_with_expected(source, challenge, ExpectedOutput::Derive).await
    }

    /// Validate with an already resolved expected output (ExactMatch only)
    #[tracing::instrument(
        skip(self, source, challenge, expected),
        fields(challenge_id = %challenge.id, strategy = challenge.strategy.tag())
    )]
    pub async fn validate_with_expected(
        &self,
        source: &str,
        challenge: &ChallengeSpec,
        expected: ExpectedOutput<'_>,
    ) -> ValidationVerdict {
        if source.trim().is_empty() {
            let mut verdict = ValidationVerdict::rejected(NO_CODE_FEEDBACK);
            verdict.suggestions = vec![
                "Try writing at least one line of code".to_string(),
                "Look at the challenge prompt for guidance".to_string(),
            ];
            return verdict;
        }

        let outcome = self.executor.execute(source).await;
        if !outcome.succeeded {
            let mut verdict =
                ValidationVerdict::rejected(format!("Code execution failed: {}", friendly_error(&outcome)));
            verdict.error_details = Some(outcome.stderr.clone());
            verdict.suggestions = error_suggestions(&outcome);
            info!(error_kind = ?outcome.error_kind, "Submission failed to execute");
            return verdict;
        }

        let tree = SyntaxTree::parse(source).ok();

        let result = match &challenge.strategy {
            ValidationStrategy::ExactMatch => {
                let expected = match expected {
                    ExpectedOutput::Known(known) => Some(known.to_string()),
                    ExpectedOutput::Unavailable => None,
                    ExpectedOutput::Derive => self.expected_output(challenge).await,
                };
                exact_match(&outcome, expected.as_deref())
            }
            ValidationStrategy::StructuralRequirements(reqs) => match &tree {
                Some(tree) => {
                    let report = requirements::evaluate(tree, reqs);
                    StrategyResult {
                        passed: report.all_met(),
                        output_matches: None,
                        requirements_fraction: report.fraction_met(),
                        feedback: if report.all_met() {
                            "🎉 Excellent code structure! You've mastered the concepts!".to_string()
                        } else {
                            report.messages.join("\n")
                        },
                        unmet: report.unmet,
                    }
                }
                None => StrategyResult {
                    passed: false,
                    output_matches: None,
                    requirements_fraction: 0.0,
                    unmet: ["valid_syntax".to_string()].into_iter().collect(),
                    feedback: "Code has syntax errors".to_string(),
                },
            },
            ValidationStrategy::PatternMatch(reqs) => {
                let report = pattern::evaluate(source, tree.as_ref(), &outcome, reqs);
                StrategyResult {
                    passed: report.all_met(),
                    output_matches: None,
                    requirements_fraction: report.fraction_met(),
                    feedback: if report.all_met() {
                        "🎉 Perfect! Your solution matches all the required patterns!".to_string()
                    } else {
                        report.messages.join("\n")
                    },
                    unmet: report.unmet,
                }
            }
            ValidationStrategy::Custom => StrategyResult::pass(None, "🎉 Custom validation passed!"),
        };

        let quality = quality::analyze(source, tree.as_ref());
        // Without an output comparison the output share follows the strategy
        let score = scoring::score(ScoreInputs {
            executed: true,
            output_matches: result.output_matches.unwrap_or(result.passed),
            requirements_fraction: result.requirements_fraction,
            quality: quality.score,
        });

        info!(
            is_correct = result.passed,
            score,
            unmet = result.unmet.len(),
            "Validated submission"
        );

        ValidationVerdict {
            is_correct: result.passed,
            score,
            feedback: result.feedback,
            unmet_requirements: result.unmet,
            output_matches: result.output_matches == Some(true),
            quality_notes: quality.notes,
            suggestions: quality.suggestions,
            error_details: None,
        }
    }

    /// Expected stdout: the pre-supplied value, else the reference solution's output
    ///
    /// `None` when the reference solution itself fails to run.
    pub async fn expected_output(&self, challenge: &ChallengeSpec) -> Option<String> {
        if let Some(expected) = &challenge.expected_output {
            return Some(expected.clone());
        }

        let outcome = self.executor.execute(&challenge.solution).await;
        if outcome.succeeded {
            Some(outcome.stdout)
        } else {
            warn!(
                challenge = %challenge.id,
                error_kind = ?outcome.error_kind,
                "Reference solution failed to execute"
            );
            None
        }
    }
}

fn exact_match(outcome: &ExecutionOutcome, expected: Option<&str>) -> StrategyResult {
    let Some(expected) = expected else {
        return StrategyResult {
            passed: false,
            output_matches: Some(false),
            requirements_fraction: 1.0,
            unmet: ["expected_output".to_string()].into_iter().collect(),
            feedback: "The expected output for this challenge is unavailable".to_string(),
        };
    };

    if outputs_match(&outcome.stdout, expected) {
        StrategyResult::pass(Some(true), "🎉 Perfect! Your solution works correctly!")
    } else {
        StrategyResult {
            passed: false,
            output_matches: Some(false),
            requirements_fraction: 1.0,
            unmet: BTreeSet::new(),
            feedback: format!(
                "Expected: {}, but got: {}",
                normalize_output(expected),
                normalize_output(&outcome.stdout)
            ),
        }
    }
}
