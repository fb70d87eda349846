// CLI commands for working with exercises
use anyhow::{Context, Result};
use pytutor_common::config::TutorConfig;
use pytutor_common::curriculum::CurriculumStore;
use pytutor_common::types::ExecutionOutcome;
use pytutor_engine::feedback::friendly_error;
use pytutor_engine::hints::{hint_for_attempt, should_reveal_solution};
use pytutor_engine::prediction::evaluate_prediction;
use pytutor_engine::{check_safety, Executor, Validator};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

fn read_source(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn print_outcome(outcome: &ExecutionOutcome) {
    if outcome.succeeded {
        println!("✓ Ran in {:.3}s", outcome.wall_clock_seconds);
        if outcome.has_output() {
            println!("{}", outcome.stdout);
        }
    } else {
        println!("✗ {}", friendly_error(outcome));
        if outcome.has_output() {
            println!("\nOutput before the error:\n{}", outcome.stdout);
        }
        if !outcome.stderr.is_empty() {
            println!("\nDetails:\n{}", outcome.stderr);
        }
    }
}

/// Static safety check only; nothing is executed
pub fn check(file: &Path, json: bool) -> Result<bool> {
    let source = read_source(file)?;
    let verdict = check_safety(&source);

    if json {
        print_json(&verdict)?;
    } else if verdict.is_safe {
        println!("✓ {}", verdict.reason);
    } else {
        println!("✗ {}", verdict.reason);
    }
    Ok(verdict.is_safe)
}

pub async fn run(
    config: &TutorConfig,
    file: &Path,
    timeout: Option<u64>,
    max_output: Option<usize>,
    json: bool,
) -> Result<bool> {
    let source = read_source(file)?;
    let executor = Executor::from_config(config);
    let outcome = executor.execute_code(&source, timeout, max_output).await;

    if json {
        print_json(&outcome)?;
    } else {
        print_outcome(&outcome);
    }
    Ok(outcome.succeeded)
}

#[derive(Serialize)]
struct ValidateOutput<'a> {
    challenge_id: &'a str,
    attempt: u32,
    #[serde(flatten)]
    verdict: &'a pytutor_common::types::ValidationVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    solution: Option<&'a str>,
}

pub async fn validate(
    config: &TutorConfig,
    topic: &str,
    challenge_number: usize,
    attempt: u32,
    file: &Path,
    json: bool,
) -> Result<bool> {
    let store = CurriculumStore::open(&config.curriculum_dir)?;
    let challenge = store.load_challenge(topic, challenge_number)?;
    let source = read_source(file)?;

    let validator = Validator::new(Executor::from_config(config));
    let verdict = validator.validate(&source, &challenge).await;

    let (hint, solution) = if verdict.is_correct {
        (None, None)
    } else {
        let hint = hint_for_attempt(&challenge, attempt).render();
        let solution = should_reveal_solution(attempt, config.max_attempts).then_some(challenge.solution.as_str());
        (Some(hint), solution)
    };

    if json {
        print_json(&ValidateOutput {
            challenge_id: &challenge.id,
            attempt,
            verdict: &verdict,
            hint,
            solution,
        })?;
        return Ok(verdict.is_correct);
    }

    println!("📝 {}", challenge.prompt);
    println!();
    if verdict.is_correct {
        println!("✅ {}", verdict.feedback);
    } else {
        println!("❌ {}", verdict.feedback);
    }
    println!("   Score: {:.0}%", verdict.score * 100.0);

    if !verdict.quality_notes.is_empty() {
        println!("💡 Code quality notes:");
        for note in &verdict.quality_notes {
            println!("   • {}", note);
        }
    }
    if !verdict.suggestions.is_empty() {
        println!("🔧 Suggestions for improvement:");
        for suggestion in &verdict.suggestions {
            println!("   • {}", suggestion);
        }
    }
    if let Some(hint) = hint {
        println!();
        println!("{}", hint);
    }
    if let Some(solution) = solution {
        println!();
        println!("📖 Reference solution:\n{}", solution);
    }

    Ok(verdict.is_correct)
}

pub async fn predict(config: &TutorConfig, file: &Path, prediction: &str, json: bool) -> Result<bool> {
    let source = read_source(file)?;
    let outcome = Executor::from_config(config).execute(&source).await;
    let result = evaluate_prediction(prediction, &outcome);

    if json {
        print_json(&result)?;
    } else {
        println!("{}", result.feedback);
        println!("   Match: {:.0}%", result.score * 100.0);
        if !outcome.succeeded {
            println!("   {}", friendly_error(&outcome));
        }
    }
    Ok(result.score > 0.0)
}

#[derive(Serialize)]
struct TopicSummary {
    topic_id: String,
    title: String,
    difficulty: u8,
    estimated_time: u32,
    prerequisites: Vec<String>,
    challenges: usize,
}

pub fn topics(config: &TutorConfig, completed: Option<Vec<String>>, json: bool) -> Result<bool> {
    let store = CurriculumStore::open(&config.curriculum_dir)?;

    let topics = match completed {
        Some(completed) => {
            let completed: HashSet<String> = completed.into_iter().collect();
            store.next_topics(&completed)?
        }
        None => store
            .list_topics()?
            .iter()
            .map(|id| store.load_topic(id))
            .collect::<Result<Vec<_>>>()?,
    };

    let summaries: Vec<TopicSummary> = topics
        .into_iter()
        .map(|t| TopicSummary {
            challenges: t.challenges.len(),
            topic_id: t.id,
            title: t.title,
            difficulty: t.difficulty,
            estimated_time: t.estimated_time,
            prerequisites: t.prerequisites,
        })
        .collect();

    if json {
        print_json(&summaries)?;
        return Ok(true);
    }

    if summaries.is_empty() {
        println!("No topics available in {}", store.root().display());
        return Ok(true);
    }
    for topic in &summaries {
        println!(
            "• {} - {} (difficulty {}, ~{} min, {} challenge(s))",
            topic.topic_id, topic.title, topic.difficulty, topic.estimated_time, topic.challenges
        );
        if !topic.prerequisites.is_empty() {
            println!("    requires: {}", topic.prerequisites.join(", "));
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_check_flags_unsafe_file() {
        let dir = tempfile::tempdir().unwrap();
        let safe = write(dir.path(), "safe.py", "print('hi')\n");
        let unsafe_file = write(dir.path(), "unsafe.py", "import subprocess\n");

        assert!(check(&safe, false).unwrap());
        assert!(!check(&unsafe_file, true).unwrap());
    }

    #[test]
    fn test_check_missing_file_is_error() {
        let err = check(Path::new("/nonexistent/solution.py"), false).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_topics_with_prerequisites() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "basics.json", r#"{ "topic_id": "basics", "title": "Basics" }"#);
        write(
            dir.path(),
            "loops.json",
            r#"{ "topic_id": "loops", "title": "Loops", "prerequisites": ["basics"] }"#,
        );
        let config = TutorConfig {
            curriculum_dir: dir.path().to_path_buf(),
            ..TutorConfig::default()
        };

        assert!(topics(&config, None, true).unwrap());
        assert!(topics(&config, Some(vec!["basics".into()]), false).unwrap());
    }

    #[tokio::test]
    async fn test_validate_unknown_challenge_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "basics.json", r#"{ "topic_id": "basics", "title": "Basics" }"#);
        let solution = write(dir.path(), "solution.py", "print(4)\n");
        let config = TutorConfig {
            curriculum_dir: dir.path().to_path_buf(),
            ..TutorConfig::default()
        };

        let err = validate(&config, "basics", 1, 1, &solution, false).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
