// Code-quality heuristic: praise notes, improvement suggestions, score in [0, 1]
use crate::syntax::SyntaxTree;

const BASE_SCORE: f64 = 0.4;
const NOTE_BONUS: f64 = 0.3;
const LONG_SOLUTION_LINES: usize = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityReport {
    pub score: f64,
    pub notes: Vec<String>,
    pub suggestions: Vec<String>,
}

pub fn analyze(source: &str, tree: Option<&SyntaxTree>) -> QualityReport {
    let Some(tree) = tree else {
        return QualityReport {
            score: 0.0,
            notes: vec!["Code has syntax errors".to_string()],
            suggestions: vec!["Check for typos, missing quotes, or parentheses".to_string()],
        };
    };

    let mut notes = Vec::new();
    let mut suggestions = Vec::new();

    let prints = tree.calls().any(|c| c.is_named("print"));
    let fstrings = tree.calls().any(|c| c.has_fstring_arg);
    let older_formatting = tree.calls().any(|c| c.is_method("format")) || source.contains('%');

    if prints && fstrings {
        notes.push("Great use of f-strings for formatting!".to_string());
    } else if prints && older_formatting {
        notes.push("Good formatting, but f-strings are more modern".to_string());
        suggestions.push("Try using f-strings: f\"Hello {name}\" instead of older formatting".to_string());
    }

    let names = tree.stored_names();
    if !names.is_empty() {
        if names.iter().all(|n| n.len() > 1 && is_lowercase_name(n)) {
            notes.push("Excellent variable naming!".to_string());
        } else if names.iter().any(|n| n.chars().count() == 1) {
            suggestions.push("Consider using more descriptive variable names than single letters".to_string());
        }
    }

    if source.matches('\n').count() > LONG_SOLUTION_LINES {
        suggestions.push("Your solution works but could be simpler".to_string());
    }

    let score = (BASE_SCORE + NOTE_BONUS * notes.len() as f64).min(1.0);
    QualityReport {
        score,
        notes,
        suggestions,
    }
}

fn is_lowercase_name(name: &str) -> bool {
    !name.chars().any(char::is_uppercase)
}
