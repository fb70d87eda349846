use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Requirement name → expected condition, as written in curriculum files
pub type Requirements = BTreeMap<String, Value>;

/// Why an execution did not succeed
///
/// Exactly one kind is attached to every failed outcome:
/// - `Validation`: rejected before any process was spawned
/// - `Syntax`: the interpreter itself reported a syntax error
/// - `Runtime`: an exception or non-zero exit while running
/// - `Timeout`: the wall-clock budget was exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    Syntax,
    Runtime,
    Timeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Syntax => "syntax",
            ErrorKind::Runtime => "runtime",
            ErrorKind::Timeout => "timeout",
        };
        write!(f, "{}", name)
    }
}

/// Result of one code execution attempt
///
/// Built only through the constructors below so that a failed outcome
/// always carries an [`ErrorKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    pub wall_clock_seconds: f64,
    /// Only meaningful once a process was started; -1 on timeout
    pub exit_code: i32,
    pub error_kind: Option<ErrorKind>,
}

impl ExecutionOutcome {
    pub fn success(stdout: String, stderr: String, wall_clock_seconds: f64) -> Self {
        Self {
            succeeded: true,
            stdout,
            stderr,
            wall_clock_seconds,
            exit_code: 0,
            error_kind: None,
        }
    }

    pub fn failure(
        kind: ErrorKind,
        stdout: String,
        stderr: String,
        exit_code: i32,
        wall_clock_seconds: f64,
    ) -> Self {
        Self {
            succeeded: false,
            stdout,
            stderr,
            wall_clock_seconds,
            exit_code,
            error_kind: Some(kind),
        }
    }

    /// Outcome for source that never reached the interpreter
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::failure(ErrorKind::Validation, String::new(), reason.into(), 1, 0.0)
    }

    pub fn has_output(&self) -> bool {
        !self.stdout.trim().is_empty()
    }

    pub fn is_timeout(&self) -> bool {
        self.error_kind == Some(ErrorKind::Timeout)
    }

    pub fn is_syntax_error(&self) -> bool {
        self.error_kind == Some(ErrorKind::Syntax)
    }

    pub fn is_runtime_error(&self) -> bool {
        self.error_kind == Some(ErrorKind::Runtime)
    }
}

/// Static judgement on source text, produced before anything runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub is_safe: bool,
    pub reason: String,
}

impl SafetyVerdict {
    pub fn safe() -> Self {
        Self {
            is_safe: true,
            reason: "Code is safe to execute".to_string(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            is_safe: false,
            reason: reason.into(),
        }
    }
}

/// How a submission is judged, each variant carrying the data it needs
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ValidationStrategy {
    /// Normalized stdout must equal the reference solution's
    #[default]
    ExactMatch,
    /// Every requirement is a named predicate over the syntax tree
    StructuralRequirements(Requirements),
    /// Regexes and substrings over source and output
    PatternMatch(Requirements),
    /// Reserved for challenge-specific logic
    Custom,
}

impl ValidationStrategy {
    /// Curriculum tag for this strategy
    pub fn tag(&self) -> &'static str {
        match self {
            ValidationStrategy::ExactMatch => "exact_match",
            ValidationStrategy::StructuralRequirements(_) => "code_structure",
            ValidationStrategy::PatternMatch(_) => "pattern_match",
            ValidationStrategy::Custom => "custom",
        }
    }

    /// Build a strategy from a curriculum tag; unknown tags fall back to exact match
    pub fn from_tag(tag: &str, requirements: Requirements) -> Self {
        match tag {
            "code_structure" | "structural_requirements" => {
                ValidationStrategy::StructuralRequirements(requirements)
            }
            "pattern_match" => ValidationStrategy::PatternMatch(requirements),
            "custom" => ValidationStrategy::Custom,
            _ => ValidationStrategy::ExactMatch,
        }
    }

    pub fn requirements(&self) -> Option<&Requirements> {
        match self {
            ValidationStrategy::StructuralRequirements(reqs)
            | ValidationStrategy::PatternMatch(reqs) => Some(reqs),
            ValidationStrategy::ExactMatch | ValidationStrategy::Custom => None,
        }
    }
}

/// A coding exercise, loaded once from curriculum content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ChallengeRecord", into = "ChallengeRecord")]
pub struct ChallengeSpec {
    pub id: String,
    pub prompt: String,
    pub solution: String,
    pub strategy: ValidationStrategy,
    pub hints: Vec<String>,
    pub difficulty: u8,
    /// Known stdout of the reference solution, if the author supplied one
    pub expected_output: Option<String>,
}

impl ChallengeSpec {
    pub fn new(prompt: impl Into<String>, solution: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            prompt: prompt.into(),
            solution: solution.into(),
            strategy: ValidationStrategy::ExactMatch,
            hints: Vec::new(),
            difficulty: 1,
            expected_output: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_strategy(mut self, strategy: ValidationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hints = hints.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }
}

/// On-disk shape of a challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChallengeRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    id: String,
    prompt: String,
    solution: String,
    #[serde(default)]
    hints: Vec<String>,
    #[serde(default = "default_difficulty")]
    difficulty: u8,
    #[serde(default = "default_validation_type")]
    validation_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    requirements: Requirements,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expected_output: Option<String>,
}

fn default_difficulty() -> u8 {
    1
}

fn default_validation_type() -> String {
    "exact_match".to_string()
}

impl From<ChallengeRecord> for ChallengeSpec {
    fn from(record: ChallengeRecord) -> Self {
        Self {
            id: record.id,
            prompt: record.prompt,
            solution: record.solution,
            strategy: ValidationStrategy::from_tag(&record.validation_type, record.requirements),
            hints: record.hints,
            difficulty: record.difficulty,
            expected_output: record.expected_output,
        }
    }
}

impl From<ChallengeSpec> for ChallengeRecord {
    fn from(spec: ChallengeSpec) -> Self {
        let validation_type = spec.strategy.tag().to_string();
        let requirements = match spec.strategy {
            ValidationStrategy::StructuralRequirements(reqs)
            | ValidationStrategy::PatternMatch(reqs) => reqs,
            ValidationStrategy::ExactMatch | ValidationStrategy::Custom => Requirements::new(),
        };
        Self {
            id: spec.id,
            prompt: spec.prompt,
            solution: spec.solution,
            hints: spec.hints,
            difficulty: spec.difficulty,
            validation_type,
            requirements,
            expected_output: spec.expected_output,
        }
    }
}

/// Judgement on one submission; derived fresh every time, never persisted here
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub is_correct: bool,
    pub score: f64,
    pub feedback: String,
    pub unmet_requirements: BTreeSet<String>,
    #[serde(default)]
    pub output_matches: bool,
    #[serde(default)]
    pub quality_notes: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Raw interpreter error text, kept next to the friendly feedback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl ValidationVerdict {
    /// A failing verdict with zero score and nothing else attached
    pub fn rejected(feedback: impl Into<String>) -> Self {
        Self {
            is_correct: false,
            score: 0.0,
            feedback: feedback.into(),
            unmet_requirements: BTreeSet::new(),
            output_matches: false,
            quality_notes: Vec::new(),
            suggestions: Vec::new(),
            error_details: None,
        }
    }
}

/// One submission recorded in a session's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub challenge_id: String,
    pub submitted_code: String,
    pub verdict: ValidationVerdict,
    pub attempt_number: u32,
    pub hints_used: u32,
    pub submitted_at: DateTime<Utc>,
}

/// Kind of lesson content shown at one level of a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Concept,
    SimpleExample,
    MediumExample,
    ComplexExample,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentLevel {
    #[serde(rename = "type")]
    pub kind: ContentType,
    pub content: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub key_concepts: Vec<String>,
    #[serde(default)]
    pub pseudocode: Option<String>,
}

/// A learning topic with its staged levels and challenges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    #[serde(rename = "topic_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default = "default_topic_difficulty")]
    pub difficulty: u8,
    /// Minutes
    #[serde(default = "default_estimated_time")]
    pub estimated_time: u32,
    #[serde(default)]
    pub levels: BTreeMap<String, ContentLevel>,
    #[serde(default)]
    pub challenges: Vec<ChallengeSpec>,
}

fn default_topic_difficulty() -> u8 {
    1
}

fn default_estimated_time() -> u32 {
    30
}
