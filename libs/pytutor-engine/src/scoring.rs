/// Scoring - Weighted Score for a Submission that Ran
///
/// **Weights:**
/// - 0.3 the code executed successfully
/// - 0.4 the output matched (or, when no output comparison applies, the
///   strategy accepted the submission)
/// - 0.2 × fraction of structural requirements met (vacuously 1.0)
/// - 0.1 × code-quality heuristic
///
/// The score is reported alongside the verdict; pass/fail comes from the
/// strategy, not from [`CORRECTNESS_THRESHOLD`].

pub const EXECUTION_WEIGHT: f64 = 0.3;
pub const OUTPUT_WEIGHT: f64 = 0.4;
pub const REQUIREMENTS_WEIGHT: f64 = 0.2;
pub const QUALITY_WEIGHT: f64 = 0.1;

/// Score at or above which a submission counts as a good solution
pub const CORRECTNESS_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInputs {
    pub executed: bool,
    pub output_matches: bool,
    pub requirements_fraction: f64,
    pub quality: f64,
}

pub fn score(inputs: ScoreInputs) -> f64 {
    if !inputs.executed {
        return 0.0;
    }

    let mut total = EXECUTION_WEIGHT;
    if inputs.output_matches {
        total += OUTPUT_WEIGHT;
    }
    total += REQUIREMENTS_WEIGHT * inputs.requirements_fraction.clamp(0.0, 1.0);
    total += QUALITY_WEIGHT * inputs.quality.clamp(0.0, 1.0);

    total.clamp(0.0, 1.0)
}

pub fn meets_threshold(score: f64) -> bool {
    score >= CORRECTNESS_THRESHOLD
}
