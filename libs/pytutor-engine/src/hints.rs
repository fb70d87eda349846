// Progressive hints: each failed attempt unlocks a more specific one
use pytutor_common::types::ChallengeSpec;

const FIRST_FALLBACK: &str = "Break down the problem into smaller steps";
const SECOND_FALLBACK: &str = "Look at the example code patterns from the lesson";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hint {
    /// Author-written hint or a generic nudge
    Text(String),
    /// Synthesized starting point, offered once written hints run out
    Skeleton(String),
}

impl Hint {
    pub fn text(&self) -> &str {
        match self {
            Hint::Text(text) | Hint::Skeleton(text) => text,
        }
    }

    /// Display form used by the CLI and API
    pub fn render(&self) -> String {
        match self {
            Hint::Text(text) => format!("💡 Hint: {}", text),
            Hint::Skeleton(code) => format!("💡 Strong Hint: Try something like this structure:\n{}", code),
        }
    }
}

/// Hint for a 1-based attempt number; attempt 0 is treated as the first
pub fn hint_for_attempt(challenge: &ChallengeSpec, attempt_number: u32) -> Hint {
    match attempt_number {
        0 | 1 => Hint::Text(
            challenge
                .hints
                .first()
                .cloned()
                .unwrap_or_else(|| FIRST_FALLBACK.to_string()),
        ),
        2 => Hint::Text(
            challenge
                .hints
                .get(1)
                .cloned()
                .unwrap_or_else(|| SECOND_FALLBACK.to_string()),
        ),
        _ => match challenge.hints.get(2) {
            Some(hint) => Hint::Text(hint.clone()),
            None => Hint::Skeleton(code_skeleton(challenge)),
        },
    }
}

/// Starter template shaped by what the prompt talks about
pub fn code_skeleton(challenge: &ChallengeSpec) -> String {
    let prompt = challenge.prompt.to_lowercase();
    if prompt.contains("variable") && prompt.contains("print") {
        "# Create your variables here\nvariable_name = \"your_value\"\n# Print your result\nprint(f\"Your message with {variable_name}\")"
            .to_string()
    } else if prompt.contains("list") {
        "# Start from a list\nitems = [3, 1, 2]\n# Work with it here\nprint(items)".to_string()
    } else {
        "# Write your code here\nprint(\"Your result\")".to_string()
    }
}

/// The reference solution is revealed once every allowed attempt has failed
pub fn should_reveal_solution(failed_attempts: u32, max_attempts: u32) -> bool {
    failed_attempts >= max_attempts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge_with_hints(hints: &[&str]) -> ChallengeSpec {
        ChallengeSpec::new("Create a variable and print it", "name = 'x'\nprint(name)")
            .with_hints(hints.iter().copied())
    }

    #[test]
    fn test_author_hints_in_order() {
        let challenge = challenge_with_hints(&["one", "two", "three"]);
        assert_eq!(hint_for_attempt(&challenge, 1), Hint::Text("one".into()));
        assert_eq!(hint_for_attempt(&challenge, 2), Hint::Text("two".into()));
        assert_eq!(hint_for_attempt(&challenge, 3), Hint::Text("three".into()));
        assert_eq!(hint_for_attempt(&challenge, 7), Hint::Text("three".into()));
    }

    #[test]
    fn test_fallbacks_without_hints() {
        let challenge = challenge_with_hints(&[]);
        assert_eq!(hint_for_attempt(&challenge, 1).text(), FIRST_FALLBACK);
        assert_eq!(hint_for_attempt(&challenge, 2).text(), SECOND_FALLBACK);
        match hint_for_attempt(&challenge, 3) {
            Hint::Skeleton(code) => assert!(code.contains("variable_name")),
            other => panic!("expected skeleton, got {:?}", other),
        }
    }

    #[test]
    fn test_render() {
        assert_eq!(Hint::Text("x".into()).render(), "💡 Hint: x");
        assert!(Hint::Skeleton("print(1)".into()).render().ends_with("\nprint(1)"));
    }

    #[test]
    fn test_generic_skeleton() {
        let challenge = ChallengeSpec::new("Compute 2 + 2", "print(4)");
        assert_eq!(code_skeleton(&challenge), "# Write your code here\nprint(\"Your result\")");
    }

    #[test]
    fn test_reveal_after_max_attempts() {
        assert!(!should_reveal_solution(2, 3));
        assert!(should_reveal_solution(3, 3));
    }
}
