// Output prediction scoring: how close was the learner's guess to the real output
use crate::validator::normalize_output;
use pytutor_common::types::ExecutionOutcome;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const EXACT: f64 = 1.0;
pub const CONTAINED: f64 = 0.7;
pub const SHARED_TOKEN: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub score: f64,
    pub feedback: String,
    pub actual_output: String,
}

/// Tiered match score
///
/// - 1.0: equal after whitespace normalization
/// - 0.7: prediction appears in the output (case-insensitive)
/// - 0.3: at least one whitespace-separated token in common (case-insensitive)
/// - 0.0: otherwise, or when the code did not run
///
/// An empty prediction only scores when the output is empty too.
pub fn score_prediction(prediction: &str, outcome: &ExecutionOutcome) -> f64 {
    if !outcome.succeeded {
        return 0.0;
    }

    let predicted = normalize_output(prediction);
    let actual = normalize_output(&outcome.stdout);

    if predicted == actual {
        return EXACT;
    }
    if predicted.is_empty() || actual.is_empty() {
        return 0.0;
    }

    let predicted = predicted.to_lowercase();
    let actual = actual.to_lowercase();
    if actual.contains(&predicted) {
        return CONTAINED;
    }

    let actual_tokens: HashSet<&str> = actual.split(' ').collect();
    if predicted.split(' ').any(|token| actual_tokens.contains(token)) {
        SHARED_TOKEN
    } else {
        0.0
    }
}

pub fn prediction_feedback(score: f64, outcome: &ExecutionOutcome) -> String {
    if score >= EXACT {
        "🎉 Exactly right! Great prediction!".to_string()
    } else if score >= CONTAINED {
        "👍 Very close! You got the main idea.".to_string()
    } else if score >= SHARED_TOKEN {
        "🤔 You're on the right track, but let's see what actually happens.".to_string()
    } else if outcome.succeeded {
        format!("🔍 Not quite. The actual result is: {}", outcome.stdout.trim())
    } else {
        "🔍 Interesting prediction! Let's run it and see what happens.".to_string()
    }
}

pub fn evaluate_prediction(prediction: &str, outcome: &ExecutionOutcome) -> PredictionResult {
    let score = score_prediction(prediction, outcome);
    PredictionResult {
        score,
        feedback: prediction_feedback(score, outcome),
        actual_output: outcome.stdout.clone(),
    }
}
