// Runtime configuration shared by the CLI and the API
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Per-call execution bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    pub timeout_seconds: u64,
    pub max_output_bytes: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl ExecutionLimits {
    /// Apply optional per-request overrides on top of these limits
    pub fn with_overrides(self, timeout_seconds: Option<u64>, max_output_bytes: Option<usize>) -> Self {
        Self {
            timeout_seconds: timeout_seconds.unwrap_or(self.timeout_seconds),
            max_output_bytes: max_output_bytes.unwrap_or(self.max_output_bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
    /// Interpreter invoked as `<python_path> -c <code>`
    pub python_path: String,
    pub timeout_seconds: u64,
    pub max_output_bytes: usize,
    /// Failed attempts before the reference solution is revealed
    pub max_attempts: u32,
    /// Run the interpreter with `-I` (no user site, no PYTHON* env)
    pub isolated_mode: bool,
    pub curriculum_dir: PathBuf,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            python_path: "python3".to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            isolated_mode: true,
            curriculum_dir: PathBuf::from("curriculum"),
        }
    }
}

impl TutorConfig {
    /// Load configuration from a JSON file; missing keys take defaults
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Tutor config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: TutorConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `PYTUTOR_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(python) = std::env::var("PYTUTOR_PYTHON") {
            self.python_path = python;
        }
        if let Ok(timeout) = std::env::var("PYTUTOR_TIMEOUT_SECS") {
            self.timeout_seconds = timeout
                .parse()
                .with_context(|| format!("Invalid PYTUTOR_TIMEOUT_SECS: {}", timeout))?;
        }
        if let Ok(max_output) = std::env::var("PYTUTOR_MAX_OUTPUT_BYTES") {
            self.max_output_bytes = max_output
                .parse()
                .with_context(|| format!("Invalid PYTUTOR_MAX_OUTPUT_BYTES: {}", max_output))?;
        }
        if let Ok(attempts) = std::env::var("PYTUTOR_MAX_ATTEMPTS") {
            self.max_attempts = attempts
                .parse()
                .with_context(|| format!("Invalid PYTUTOR_MAX_ATTEMPTS: {}", attempts))?;
        }
        if let Ok(dir) = std::env::var("PYTUTOR_CURRICULUM_DIR") {
            self.curriculum_dir = PathBuf::from(dir);
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.python_path.trim().is_empty() {
            bail!("python_path cannot be empty");
        }
        if self.timeout_seconds == 0 {
            bail!("timeout_seconds must be greater than zero");
        }
        if self.max_output_bytes == 0 {
            bail!("max_output_bytes must be greater than zero");
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be greater than zero");
        }
        Ok(())
    }

    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            timeout_seconds: self.timeout_seconds,
            max_output_bytes: self.max_output_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = TutorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.limits(), ExecutionLimits::default());
        assert_eq!(config.limits().timeout_seconds, 5);
        assert_eq!(config.limits().max_output_bytes, 1000);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "timeout_seconds": 2, "python_path": "/usr/bin/python3" }}"#).unwrap();

        let config = TutorConfig::load(file.path()).unwrap();
        assert_eq!(config.timeout_seconds, 2);
        assert_eq!(config.python_path, "/usr/bin/python3");
        assert_eq!(config.max_output_bytes, DEFAULT_MAX_OUTPUT_BYTES);
        assert!(config.isolated_mode);
    }

    #[test]
    fn test_load_rejects_zero_timeout() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "timeout_seconds": 0 }}"#).unwrap();

        let err = TutorConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = TutorConfig::load(Path::new("/nonexistent/pytutor.json")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    /// Process environment is shared between test threads
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    const ENV_KEYS: [&str; 5] = [
        "PYTUTOR_PYTHON",
        "PYTUTOR_TIMEOUT_SECS",
        "PYTUTOR_MAX_OUTPUT_BYTES",
        "PYTUTOR_MAX_ATTEMPTS",
        "PYTUTOR_CURRICULUM_DIR",
    ];

    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
        for (key, value) in vars {
            std::env::set_var(key, value);
        }
        let result = f();
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
        result
    }

    #[test]
    fn test_env_overrides_apply() {
        let config = with_env(
            &[
                ("PYTUTOR_PYTHON", "/opt/python/bin/python3"),
                ("PYTUTOR_TIMEOUT_SECS", "9"),
                ("PYTUTOR_MAX_OUTPUT_BYTES", "4096"),
                ("PYTUTOR_MAX_ATTEMPTS", "5"),
                ("PYTUTOR_CURRICULUM_DIR", "/srv/curriculum"),
            ],
            TutorConfig::from_env,
        )
        .unwrap();

        assert_eq!(config.python_path, "/opt/python/bin/python3");
        assert_eq!(config.timeout_seconds, 9);
        assert_eq!(config.max_output_bytes, 4096);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.curriculum_dir, PathBuf::from("/srv/curriculum"));
        assert!(config.isolated_mode);
    }

    #[test]
    fn test_env_overrides_on_top_of_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "timeout_seconds": 2, "max_attempts": 4 }}"#).unwrap();

        let config = with_env(&[("PYTUTOR_TIMEOUT_SECS", "7")], || {
            TutorConfig::load(file.path()).and_then(TutorConfig::with_env_overrides)
        })
        .unwrap();
        assert_eq!(config.timeout_seconds, 7);
        assert_eq!(config.max_attempts, 4);
    }

    #[test]
    fn test_env_override_parse_error() {
        let err = with_env(&[("PYTUTOR_TIMEOUT_SECS", "soon")], TutorConfig::from_env).unwrap_err();
        assert!(err.to_string().contains("Invalid PYTUTOR_TIMEOUT_SECS: soon"), "{}", err);
    }

    #[test]
    fn test_env_override_zero_is_rejected() {
        let err = with_env(&[("PYTUTOR_MAX_OUTPUT_BYTES", "0")], TutorConfig::from_env).unwrap_err();
        assert!(err.to_string().contains("max_output_bytes"), "{}", err);
    }

    #[test]
    fn test_limit_overrides() {
        let limits = ExecutionLimits::default().with_overrides(Some(2), None);
        assert_eq!(limits.timeout_seconds, 2);
        assert_eq!(limits.max_output_bytes, DEFAULT_MAX_OUTPUT_BYTES);
    }
}
