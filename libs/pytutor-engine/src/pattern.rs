// Pattern-match checks: regexes and substrings over source and captured output
use crate::syntax::SyntaxTree;
use pytutor_common::types::{ExecutionOutcome, Requirements};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;

/// Tuple-assignment shape used when `uses_multiple_assignment` is set
const MULTIPLE_ASSIGNMENT_PATTERN: &str = r"\w+\s*,\s*\w+\s*=";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternReport {
    pub checked: usize,
    pub unmet: BTreeSet<String>,
    pub messages: Vec<String>,
}

impl PatternReport {
    pub fn all_met(&self) -> bool {
        self.unmet.is_empty()
    }

    pub fn fraction_met(&self) -> f64 {
        if self.checked == 0 {
            1.0
        } else {
            (self.checked - self.unmet.len()) as f64 / self.checked as f64
        }
    }

    fn check(&mut self, key: &str, holds: bool, message: impl FnOnce() -> String) {
        self.checked += 1;
        if !holds {
            self.unmet.insert(key.to_string());
            self.messages.push(message());
        }
    }
}

/// Run every configured check against the source and the single captured outcome
///
/// Keys:
/// - `pattern`: regex that must match the source
/// - `min_variables`: minimum number of distinct names assigned with `=`
/// - `uses_multiple_assignment`: source must contain a tuple assignment
/// - `regex_patterns` / `output_pattern`: regexes that must match the output
/// - `must_contain`: substrings the output must contain (case-insensitive)
///
/// Unknown keys are ignored here; a malformed value or an invalid regex is
/// reported as unmet.
pub fn evaluate(
    source: &str,
    tree: Option<&SyntaxTree>,
    outcome: &ExecutionOutcome,
    requirements: &Requirements,
) -> PatternReport {
    let mut report = PatternReport::default();
    let output = outcome.stdout.trim();

    if let Some(value) = requirements.get("pattern") {
        let holds = value.as_str().and_then(compile).is_some_and(|re| re.is_match(source));
        report.check("pattern", holds, || {
            "Your code doesn't use the required pattern".to_string()
        });
    }

    if let Some(value) = requirements.get("min_variables") {
        let assigned = tree.map(|t| t.assigned_names().len()).unwrap_or(0) as u64;
        match value.as_u64() {
            Some(min) => report.check("min_variables", assigned >= min, || {
                format!("You need at least {} variables", min)
            }),
            None => report.check("min_variables", false, || {
                "Requirement 'min_variables' is malformed".to_string()
            }),
        }
    }

    if requirements.get("uses_multiple_assignment") == Some(&Value::Bool(true)) {
        let holds = compile(MULTIPLE_ASSIGNMENT_PATTERN).is_some_and(|re| re.is_match(source));
        report.check("uses_multiple_assignment", holds, || {
            "Use Python's multiple assignment feature (a, b = b, a)".to_string()
        });
    }

    if let Some(value) = requirements.get("must_contain") {
        match strings(value) {
            Some(needles) => {
                let haystack = output.to_lowercase();
                let missing = needles.iter().find(|n| !haystack.contains(&n.to_lowercase()));
                report.check("must_contain", missing.is_none(), || {
                    format!("Output should contain: {}", missing.map(String::as_str).unwrap_or_default())
                });
            }
            None => report.check("must_contain", false, || {
                "Requirement 'must_contain' is malformed".to_string()
            }),
        }
    }

    for key in ["regex_patterns", "output_pattern"] {
        let Some(value) = requirements.get(key) else {
            continue;
        };
        let holds = strings(value).is_some_and(|patterns| {
            patterns
                .iter()
                .all(|p| compile(p).is_some_and(|re| re.is_match(output)))
        });
        report.check(key, holds, || "Output doesn't match expected pattern".to_string());
    }

    report
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(pattern, error = %e, "Invalid regex in challenge requirements");
            None
        }
    }
}

/// A single string or a list of strings
fn strings(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items.iter().map(|v| v.as_str().map(str::to_string)).collect(),
        _ => None,
    }
}
