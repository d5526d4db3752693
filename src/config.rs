//! Configuration management for sqlgrade.
//!
//! Settings come from three layers: command-line flags, an optional TOML
//! file and built-in defaults, in that order of precedence.

use crate::db::SeedMode;
use crate::error::{GraderError, Result};
use crate::feedback::{FeedbackConfig, LlmProvider};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SUBMISSIONS_DIR: &str = "data/students";
pub const DEFAULT_SCHEMA: &str = "data/schema.toml";
pub const DEFAULT_DATABASE: &str = "student_queries.db";
pub const DEFAULT_OUTPUT: &str = "results.csv";
pub const DEFAULT_FEEDBACK_OUTPUT: &str = "feedback.csv";
pub const DEFAULT_TIMEOUT_SECS: f64 = 3.0;
pub const DEFAULT_FEEDBACK_TIMEOUT_SECS: u64 = 30;

/// Contents of a configuration file. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub grading: GradingSection,

    #[serde(default)]
    pub feedback: FeedbackSection,
}

/// The `[grading]` table.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GradingSection {
    /// Directory holding one `.sql` file per student.
    pub submissions_dir: Option<PathBuf>,
    /// TOML table list or SQL script.
    pub schema: Option<PathBuf>,
    /// Where the reference database is created.
    pub database: Option<PathBuf>,
    /// Results CSV path.
    pub output: Option<PathBuf>,
    /// Per-query wall-clock limit; fractions allowed.
    pub timeout_secs: Option<f64>,
    /// Generate random rows instead of loading fixtures.
    pub random_data: Option<bool>,
    pub seed: Option<u64>,
    /// Concurrent worker processes.
    pub jobs: Option<usize>,
}

/// The `[feedback]` table.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FeedbackSection {
    pub enabled: Option<bool>,
    /// "openai", "anthropic" or "mock".
    pub provider: Option<String>,
    pub model: Option<String>,
    pub output: Option<PathBuf>,
    /// Prefer the provider's environment variable.
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Fully resolved settings for one grading run.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeSettings {
    pub submissions_dir: PathBuf,
    pub schema: PathBuf,
    pub database: PathBuf,
    pub output: PathBuf,
    pub timeout: Duration,
    pub seed_mode: SeedMode,
    pub jobs: usize,
    /// Present only when feedback is enabled.
    pub feedback: Option<FeedbackSettings>,
}

/// Resolved feedback settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackSettings {
    pub client: FeedbackConfig,
    pub output: PathBuf,
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sqlgrade")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| GraderError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            GraderError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Merges another config into this one, with the other taking precedence.
    pub fn merge(&mut self, other: Config) {
        let g = other.grading;
        merge_opt(&mut self.grading.submissions_dir, g.submissions_dir);
        merge_opt(&mut self.grading.schema, g.schema);
        merge_opt(&mut self.grading.database, g.database);
        merge_opt(&mut self.grading.output, g.output);
        merge_opt(&mut self.grading.timeout_secs, g.timeout_secs);
        merge_opt(&mut self.grading.random_data, g.random_data);
        merge_opt(&mut self.grading.seed, g.seed);
        merge_opt(&mut self.grading.jobs, g.jobs);

        let f = other.feedback;
        merge_opt(&mut self.feedback.enabled, f.enabled);
        merge_opt(&mut self.feedback.provider, f.provider);
        merge_opt(&mut self.feedback.model, f.model);
        merge_opt(&mut self.feedback.output, f.output);
        merge_opt(&mut self.feedback.api_key, f.api_key);
        merge_opt(&mut self.feedback.timeout_secs, f.timeout_secs);
    }

    /// Applies defaults and validates.
    pub fn resolve(&self) -> Result<GradeSettings> {
        let g = &self.grading;

        let timeout_secs = g.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if !timeout_secs.is_finite() || timeout_secs <= 0.0 {
            return Err(GraderError::config(format!(
                "Timeout must be a positive number of seconds, got {timeout_secs}"
            )));
        }
        let timeout = Duration::try_from_secs_f64(timeout_secs)
            .map_err(|e| GraderError::config(format!("Invalid timeout {timeout_secs}: {e}")))?;

        let jobs = g.jobs.unwrap_or(1);
        if jobs == 0 {
            return Err(GraderError::config("jobs must be at least 1"));
        }

        let seed_mode = if g.random_data.unwrap_or(false) {
            SeedMode::Random { seed: g.seed }
        } else {
            SeedMode::Fixture
        };

        Ok(GradeSettings {
            submissions_dir: path_or(&g.submissions_dir, DEFAULT_SUBMISSIONS_DIR),
            schema: path_or(&g.schema, DEFAULT_SCHEMA),
            database: path_or(&g.database, DEFAULT_DATABASE),
            output: path_or(&g.output, DEFAULT_OUTPUT),
            timeout,
            seed_mode,
            jobs,
            feedback: self.resolve_feedback()?,
        })
    }

    fn resolve_feedback(&self) -> Result<Option<FeedbackSettings>> {
        let f = &self.feedback;
        if !f.enabled.unwrap_or(false) {
            return Ok(None);
        }

        let provider = match &f.provider {
            Some(name) => name.parse::<LlmProvider>().map_err(GraderError::config)?,
            None => LlmProvider::default(),
        };

        let timeout_secs = f.timeout_secs.unwrap_or(DEFAULT_FEEDBACK_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(GraderError::config("feedback timeout must be at least 1 second"));
        }

        Ok(Some(FeedbackSettings {
            client: FeedbackConfig {
                provider,
                model: f.model.clone(),
                api_key: f.api_key.clone(),
                timeout_secs,
            },
            output: path_or(&f.output, DEFAULT_FEEDBACK_OUTPUT),
        }))
    }
}

fn merge_opt<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

fn path_or(path: &Option<PathBuf>, default: &str) -> PathBuf {
    path.clone().unwrap_or_else(|| PathBuf::from(default))
}
