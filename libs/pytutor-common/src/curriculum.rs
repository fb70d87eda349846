// Curriculum content store: one `<topic_id>.json` file per topic
use crate::types::{ChallengeSpec, Topic};
use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Read-only access to the topic files in a curriculum directory
#[derive(Debug, Clone)]
pub struct CurriculumStore {
    root: PathBuf,
}

impl CurriculumStore {
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            bail!("Curriculum directory not found: {}", root.display());
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Topic ids available in the store, sorted
    pub fn list_topics(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read {}", self.root.display()))?;

        let mut topics = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                topics.push(stem.to_string());
            }
        }
        topics.sort();
        Ok(topics)
    }

    /// Load one topic; challenges without an id get `<topic_id>-<n>`
    pub fn load_topic(&self, topic_id: &str) -> Result<Topic> {
        if topic_id.is_empty()
            || topic_id.contains(|c: char| c == '/' || c == '\\')
            || topic_id.contains("..")
        {
            bail!("Invalid topic id: {:?}", topic_id);
        }

        let path = self.root.join(format!("{}.json", topic_id));
        if !path.exists() {
            bail!("Topic file not found: {}", path.display());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut topic: Topic = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        for (idx, challenge) in topic.challenges.iter_mut().enumerate() {
            if challenge.id.is_empty() {
                challenge.id = format!("{}-{}", topic.id, idx + 1);
            }
        }

        debug!(
            topic = %topic.id,
            levels = topic.levels.len(),
            challenges = topic.challenges.len(),
            "Loaded topic"
        );
        Ok(topic)
    }

    /// Challenge by 1-based position within its topic
    pub fn load_challenge(&self, topic_id: &str, number: usize) -> Result<ChallengeSpec> {
        let mut topic = self.load_topic(topic_id)?;
        let count = topic.challenges.len();
        if number == 0 || number > count {
            bail!(
                "Topic '{}' has {} challenge(s); challenge {} does not exist",
                topic_id,
                count,
                number
            );
        }
        Ok(topic.challenges.swap_remove(number - 1))
    }

    /// Topics not yet completed whose prerequisites are all completed
    ///
    /// Files that fail to load are skipped with a warning.
    pub fn next_topics(&self, completed: &HashSet<String>) -> Result<Vec<Topic>> {
        let mut next = Vec::new();
        for topic_id in self.list_topics()? {
            if completed.contains(&topic_id) {
                continue;
            }
            match self.load_topic(&topic_id) {
                Ok(topic) if prerequisites_met(&topic, completed) => next.push(topic),
                Ok(_) => {}
                Err(e) => warn!(topic = %topic_id, error = %e, "Skipping unreadable topic"),
            }
        }
        Ok(next)
    }
}

pub fn prerequisites_met(topic: &Topic, completed: &HashSet<String>) -> bool {
    topic.prerequisites.iter().all(|p| completed.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidationStrategy;

    fn write_topic(dir: &Path, id: &str, body: &str) {
        fs::write(dir.join(format!("{}.json", id)), body).unwrap();
    }

    fn sample_store() -> (tempfile::TempDir, CurriculumStore) {
        let dir = tempfile::tempdir().unwrap();
        write_topic(
            dir.path(),
            "variables",
            r#"{
                "topic_id": "variables",
                "title": "Variables",
                "challenges": [
                    { "prompt": "Print 4", "solution": "print(2 + 2)" },
                    {
                        "prompt": "Swap a and b",
                        "solution": "a, b = 1, 2\na, b = b, a\nprint(a, b)",
                        "validation_type": "pattern_match",
                        "requirements": { "pattern": "\\w+\\s*,\\s*\\w+\\s*=" }
                    }
                ]
            }"#,
        );
        write_topic(
            dir.path(),
            "lists",
            r#"{ "topic_id": "lists", "title": "Lists", "prerequisites": ["variables"] }"#,
        );
        fs::write(dir.path().join("notes.txt"), "not a topic").unwrap();

        let store = CurriculumStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_list_topics_only_json() {
        let (_dir, store) = sample_store();
        assert_eq!(store.list_topics().unwrap(), vec!["lists", "variables"]);
    }

    #[test]
    fn test_load_topic_assigns_challenge_ids() {
        let (_dir, store) = sample_store();
        let topic = store.load_topic("variables").unwrap();
        assert_eq!(topic.challenges[0].id, "variables-1");
        assert_eq!(topic.challenges[1].id, "variables-2");
        assert!(matches!(
            topic.challenges[1].strategy,
            ValidationStrategy::PatternMatch(_)
        ));
    }

    #[test]
    fn test_load_challenge_bounds() {
        let (_dir, store) = sample_store();
        assert_eq!(store.load_challenge("variables", 1).unwrap().solution, "print(2 + 2)");
        assert!(store.load_challenge("variables", 0).is_err());
        assert!(store.load_challenge("variables", 3).is_err());
    }

    #[test]
    fn test_rejects_path_traversal() {
        let (_dir, store) = sample_store();
        assert!(store.load_topic("../secrets").is_err());
        assert!(store.load_topic("a/b").is_err());
    }

    #[test]
    fn test_next_topics_respects_prerequisites() {
        let (_dir, store) = sample_store();

        let next: Vec<String> = store
            .next_topics(&HashSet::new())
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(next, vec!["variables"]);

        let completed: HashSet<String> = ["variables".to_string()].into_iter().collect();
        let next: Vec<String> = store
            .next_topics(&completed)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(next, vec!["lists"]);
    }

    #[test]
    fn test_open_missing_directory() {
        assert!(CurriculumStore::open(Path::new("/nonexistent/curriculum")).is_err());
    }
}
