// Learner-facing wording for failed executions
use pytutor_common::types::{ErrorKind, ExecutionOutcome};

const INDENTATION_MARKERS: &[&str] = &[
    "indentationerror",
    "unexpected indent",
    "expected an indented block",
    "unindent does not match",
    "taberror",
];

/// One friendly line for a failed outcome; raw stderr stays on the outcome
pub fn friendly_error(outcome: &ExecutionOutcome) -> String {
    let stderr = outcome.stderr.trim();
    let lowered = stderr.to_lowercase();

    match outcome.error_kind {
        Some(ErrorKind::Validation) => format!("🚫 {}", stderr),
        Some(ErrorKind::Syntax) => {
            if INDENTATION_MARKERS.iter().any(|m| lowered.contains(m)) {
                "🚫 Indentation Error: Make sure your indentation is consistent".to_string()
            } else {
                "🚫 Syntax Error: Check for missing quotes, parentheses, or colons".to_string()
            }
        }
        Some(ErrorKind::Runtime) => {
            if lowered.contains("zerodivisionerror") {
                "🔢 Math Error: Can't divide by zero! Try a different number.".to_string()
            } else if lowered.contains("nameerror") {
                "🏷️ Name Error: Variable not defined. Check your spelling and make sure you assigned it first."
                    .to_string()
            } else if lowered.contains("typeerror") {
                "🔀 Type Error: You might be mixing different data types (like numbers and text).".to_string()
            } else if lowered.contains("indexerror") {
                "📋 Index Error: You're trying to access an item that doesn't exist in the list.".to_string()
            } else {
                format!("💥 Runtime Error: {}", last_line(stderr))
            }
        }
        Some(ErrorKind::Timeout) => {
            "⏱️ Timeout: Your code took too long to run. Check for infinite loops!".to_string()
        }
        None => format!("🤖 Something unexpected happened: {}", stderr),
    }
}

/// Remediation steps for a failed outcome
pub fn error_suggestions(outcome: &ExecutionOutcome) -> Vec<String> {
    let lowered = outcome.stderr.to_lowercase();
    let suggestions: &[&str] = match outcome.error_kind {
        Some(ErrorKind::Syntax) => &[
            "Check for matching quotes and parentheses",
            "Make sure your indentation is consistent",
            "Look for typos in keywords like 'print' or 'if'",
        ],
        Some(ErrorKind::Runtime) if lowered.contains("nameerror") => &[
            "Make sure you've defined all variables before using them",
            "Check for typos in variable names",
        ],
        Some(ErrorKind::Runtime) if lowered.contains("zerodivisionerror") => &[
            "Avoid dividing by zero",
            "Check that denominators are not zero",
        ],
        Some(ErrorKind::Runtime) if lowered.contains("typeerror") => &[
            "Convert values with int() or str() before combining them",
            "Check the types of the values you are passing to functions",
        ],
        Some(ErrorKind::Runtime) if lowered.contains("indexerror") => &[
            "Remember that list positions start at 0",
            "Use len() to check how many items a list has",
        ],
        Some(ErrorKind::Timeout) => &[
            "Check for infinite loops",
            "Make sure your loops have a way to end",
        ],
        Some(ErrorKind::Validation) => &[
            "Stick to the Python features covered in the lesson",
            "Remove imports of system or network modules",
        ],
        _ => &["Try running your code step by step to find the issue"],
    };
    suggestions.iter().map(|s| s.to_string()).collect()
}

/// Tracebacks end with the exception line, which is the useful part
fn last_line(stderr: &str) -> &str {
    stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or(stderr)
}
