/// Structural Requirements - Named Predicates over the Syntax Tree
///
/// **Core Responsibility:**
/// Map each requirement key a curriculum author can write to a pure
/// function of the parsed submission, plus the message shown when it fails.
///
/// **Evaluation Rules:**
/// - `true` → the predicate must hold
/// - `false` → the requirement is switched off and skipped
/// - `variables_required: [names]` → every name must be assigned with `=`
/// - unknown keys and malformed values count as unmet, never as errors

use crate::syntax::{AssignTarget, BinaryOperator, Node, SyntaxTree};
use pytutor_common::types::Requirements;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

pub type Predicate = fn(&SyntaxTree) -> bool;

/// A registered requirement: predicate plus remediation text
#[derive(Clone, Copy)]
pub struct RequirementCheck {
    pub predicate: Predicate,
    pub remediation: &'static str,
}

/// Result of evaluating a requirement map against one tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequirementReport {
    /// Requirements that were actually evaluated
    pub checked: usize,
    pub unmet: BTreeSet<String>,
    /// One message per unmet requirement, in key order
    pub messages: Vec<String>,
}

impl RequirementReport {
    pub fn all_met(&self) -> bool {
        self.unmet.is_empty()
    }

    /// Fraction of evaluated requirements that hold; vacuously 1.0
    pub fn fraction_met(&self) -> f64 {
        if self.checked == 0 {
            1.0
        } else {
            (self.checked - self.unmet.len()) as f64 / self.checked as f64
        }
    }

    fn mark_unmet(&mut self, key: &str, message: String) {
        self.unmet.insert(key.to_string());
        self.messages.push(message);
    }
}

pub const VARIABLES_REQUIRED: &str = "variables_required";

fn registry() -> &'static HashMap<&'static str, RequirementCheck> {
    static REGISTRY: OnceLock<HashMap<&'static str, RequirementCheck>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let entries: [(&'static str, Predicate, &'static str); 10] = [
            ("has_variables", has_variables, "Try creating some variables with the = operator"),
            ("uses_variables", has_variables, "Try creating some variables with the = operator"),
            ("uses_print", uses_print, "Your solution should include a print statement"),
            ("uses_f_string", uses_f_string, "Try using f-string formatting in your print statement"),
            ("uses_formatting", uses_formatting, "Try using f-strings to format your output"),
            ("uses_multiple_assignment", uses_multiple_assignment, "Try using multiple assignment (a, b = b, a)"),
            ("uses_sorted_with_reverse", uses_sorted_with_reverse, "Use sorted(list, reverse=True) to sort in descending order"),
            ("uses_slicing", uses_slicing, "Use list slicing [:3] to get the first 3 items"),
            ("calculates_average", calculates_average, "Calculate the average using sum() and division"),
            ("finds_indices", finds_indices, "Use .index() to find positions in the original list"),
        ];
        entries
            .into_iter()
            .map(|(name, predicate, remediation)| (name, RequirementCheck { predicate, remediation }))
            .collect()
    })
}

/// Look up a registered requirement by name
pub fn lookup(name: &str) -> Option<RequirementCheck> {
    registry().get(name).copied()
}

/// Names of every registered requirement, sorted
pub fn known_requirements() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = registry().keys().copied().collect();
    names.push(VARIABLES_REQUIRED);
    names.sort_unstable();
    names
}

/// Evaluate every requirement in `requirements` against `tree`
pub fn evaluate(tree: &SyntaxTree, requirements: &Requirements) -> RequirementReport {
    let mut report = RequirementReport::default();

    for (key, expected) in requirements {
        if key == VARIABLES_REQUIRED {
            report.checked += 1;
            let Some(names) = string_list(expected) else {
                report.mark_unmet(key, format!("Requirement '{}' is malformed", key));
                continue;
            };
            let assigned = tree.assigned_names();
            if let Some(missing) = names.iter().find(|n| !assigned.contains(n.as_str())) {
                report.mark_unmet(key, format!("Missing required variable: {}", missing));
            }
            continue;
        }

        match (lookup(key), expected) {
            (Some(_), Value::Bool(false)) => {}
            (Some(check), Value::Bool(true)) => {
                report.checked += 1;
                if !(check.predicate)(tree) {
                    report.mark_unmet(key, check.remediation.to_string());
                }
            }
            (Some(_), _) => {
                report.checked += 1;
                report.mark_unmet(key, format!("Requirement '{}' is malformed", key));
            }
            (None, _) => {
                report.checked += 1;
                report.mark_unmet(key, format!("Unknown requirement '{}'", key));
            }
        }
    }

    report
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn has_variables(tree: &SyntaxTree) -> bool {
    tree.assignments().next().is_some()
}

fn uses_print(tree: &SyntaxTree) -> bool {
    tree.calls().any(|c| c.is_named("print"))
}

fn uses_f_string(tree: &SyntaxTree) -> bool {
    tree.calls().any(|c| c.is_named("print") && c.has_fstring_arg)
}

fn uses_formatting(tree: &SyntaxTree) -> bool {
    tree.contains(|n| matches!(n, Node::FormattedString)) || tree.calls().any(|c| c.is_method("format"))
}

fn uses_multiple_assignment(tree: &SyntaxTree) -> bool {
    tree.assignments()
        .flatten()
        .any(|t| matches!(t, AssignTarget::Sequence(elts) if elts.len() > 1))
}

fn uses_sorted_with_reverse(tree: &SyntaxTree) -> bool {
    tree.calls()
        .any(|c| (c.is_named("sorted") || c.is_method("sort")) && c.keyword_is_true("reverse"))
}

fn uses_slicing(tree: &SyntaxTree) -> bool {
    tree.contains(|n| matches!(n, Node::Slice))
}

fn calculates_average(tree: &SyntaxTree) -> bool {
    tree.calls().any(|c| c.is_named("sum"))
        && tree.contains(|n| matches!(n, Node::BinaryOp(BinaryOperator::Div)))
}

fn finds_indices(tree: &SyntaxTree) -> bool {
    tree.calls().any(|c| c.is_method("index"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(source: &str) -> SyntaxTree {
        SyntaxTree::parse(source).unwrap()
    }

    fn reqs(value: Value) -> Requirements {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_multiple_assignment() {
        let requirement = reqs(json!({ "uses_multiple_assignment": true }));
        assert!(evaluate(&tree("a, b = 1, 2\na, b = b, a\n"), &requirement).all_met());

        let report = evaluate(&tree("a = 1\nb = 2\n"), &requirement);
        assert!(!report.all_met());
        assert!(report.unmet.contains("uses_multiple_assignment"));
        assert_eq!(report.messages, vec!["Try using multiple assignment (a, b = b, a)"]);
    }

    #[test]
    fn test_false_requirement_is_skipped() {
        let report = evaluate(&tree("x = 1\n"), &reqs(json!({ "uses_print": false })));
        assert!(report.all_met());
        assert_eq!(report.checked, 0);
        assert_eq!(report.fraction_met(), 1.0);
    }

    #[test]
    fn test_unknown_and_malformed_are_unmet() {
        let report = evaluate(
            &tree("print(1)\n"),
            &reqs(json!({ "uses_magic": true, "uses_print": "yes" })),
        );
        assert_eq!(report.checked, 2);
        assert!(report.unmet.contains("uses_magic"));
        assert!(report.unmet.contains("uses_print"));
    }

    #[test]
    fn test_variables_required() {
        let requirement = reqs(json!({ "variables_required": ["name", "age"] }));
        assert!(evaluate(&tree("name = 'Ada'\nage = 36\n"), &requirement).all_met());

        let report = evaluate(&tree("name = 'Ada'\n"), &requirement);
        assert_eq!(report.messages, vec!["Missing required variable: age"]);

        let report = evaluate(&tree("name = 1\n"), &reqs(json!({ "variables_required": "name" })));
        assert!(!report.all_met());
    }

    #[test]
    fn test_f_string_only_counts_inside_print() {
        let requirement = reqs(json!({ "uses_f_string": true }));
        assert!(evaluate(&tree("name = 'x'\nprint(f'Hi {name}')\n"), &requirement).all_met());
        assert!(!evaluate(&tree("msg = f'{1}'\nprint(msg)\n"), &requirement).all_met());
    }

    #[test]
    fn test_formatting_accepts_format_method() {
        let requirement = reqs(json!({ "uses_formatting": true }));
        assert!(evaluate(&tree("print('{}'.format(1))\n"), &requirement).all_met());
        assert!(!evaluate(&tree("print('plain')\n"), &requirement).all_met());
    }

    #[test]
    fn test_sorted_with_reverse() {
        let requirement = reqs(json!({ "uses_sorted_with_reverse": true }));
        assert!(evaluate(&tree("print(sorted([3, 1], reverse=True))\n"), &requirement).all_met());
        assert!(evaluate(&tree("xs = [3, 1]\nxs.sort(reverse=True)\n"), &requirement).all_met());
        assert!(!evaluate(&tree("print(sorted([3, 1]))\n"), &requirement).all_met());
        assert!(!evaluate(&tree("print(sorted([3, 1], reverse=False))\n"), &requirement).all_met());
    }

    #[test]
    fn test_average_slicing_and_index() {
        let source = "scores = [90, 80, 70]\ntop = scores[:2]\navg = sum(scores) / len(scores)\nprint(scores.index(80))\n";
        let report = evaluate(
            &tree(source),
            &reqs(json!({ "calculates_average": true, "uses_slicing": true, "finds_indices": true })),
        );
        assert!(report.all_met(), "{:?}", report);
        assert_eq!(report.checked, 3);
    }

    #[test]
    fn test_fraction_met() {
        let report = evaluate(
            &tree("x = 1\n"),
            &reqs(json!({ "has_variables": true, "uses_print": true })),
        );
        assert_eq!(report.fraction_met(), 0.5);
    }

    #[test]
    fn test_known_requirements_listed() {
        let names = known_requirements();
        assert!(names.contains(&"uses_multiple_assignment"));
        assert!(names.contains(&VARIABLES_REQUIRED));
    }
}
