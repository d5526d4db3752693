//! Command-line argument parsing for sqlgrade.

use crate::config::{Config, FeedbackSection, GradingSection};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Grades student SQL queries by majority consensus.
///
/// Every `.sql` file in the submissions directory is one student's answer.
/// Each query runs in its own worker process against a freshly provisioned
/// SQLite database; the result set most of the class agrees on is accepted.
#[derive(Parser, Debug)]
#[command(name = "sqlgrade")]
#[command(version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Directory containing one .sql file per student
    #[arg(short = 's', long = "submissions", value_name = "DIR")]
    pub submissions_dir: Option<PathBuf>,

    /// Schema definition (.toml table list or .sql script)
    #[arg(long, value_name = "PATH")]
    pub schema: Option<PathBuf>,

    /// Results CSV path
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Where to create the reference database
    #[arg(long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Per-query time limit in seconds (fractions allowed)
    #[arg(short = 't', long, value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// Fill tables with random rows instead of fixture data
    #[arg(long)]
    pub random_data: bool,

    /// Seed for random data generation
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Number of queries to run concurrently
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Generate feedback for failed submissions
    #[arg(long)]
    pub feedback: bool,

    /// LLM provider for feedback: openai, anthropic or mock
    #[arg(long, value_name = "PROVIDER")]
    pub llm: Option<String>,

    /// Feedback CSV path
    #[arg(long, value_name = "PATH")]
    pub feedback_output: Option<PathBuf>,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

/// Internal subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Runs one query from stdin and prints a JSON reply (used internally)
    #[command(hide = true)]
    Worker {
        /// Database to query
        #[arg(long, value_name = "PATH")]
        database: PathBuf,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// The flags given on the command line, as a config layer.
    ///
    /// Boolean switches only override the file when present.
    pub fn to_config(&self) -> Config {
        Config {
            grading: GradingSection {
                submissions_dir: self.submissions_dir.clone(),
                schema: self.schema.clone(),
                database: self.database.clone(),
                output: self.output.clone(),
                timeout_secs: self.timeout,
                random_data: self.random_data.then_some(true),
                seed: self.seed,
                jobs: self.jobs,
            },
            feedback: FeedbackSection {
                enabled: (self.feedback || self.llm.is_some()).then_some(true),
                provider: self.llm.clone(),
                output: self.feedback_output.clone(),
                ..FeedbackSection::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SeedMode;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sqlgrade").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_no_args() {
        let cli = parse(&[]);
        assert!(cli.command.is_none());
        assert_eq!(cli.to_config(), Config::default());
    }

    #[test]
    fn test_grading_flags() {
        let cli = parse(&[
            "-s",
            "hw/students",
            "--schema",
            "hw/schema.toml",
            "-o",
            "out.csv",
            "-t",
            "0.25",
            "--random-data",
            "--seed",
            "9",
            "-j",
            "3",
        ]);

        let settings = cli.to_config().resolve().unwrap();
        assert_eq!(settings.submissions_dir, PathBuf::from("hw/students"));
        assert_eq!(settings.schema, PathBuf::from("hw/schema.toml"));
        assert_eq!(settings.output, PathBuf::from("out.csv"));
        assert_eq!(settings.timeout, Duration::from_millis(250));
        assert_eq!(settings.seed_mode, SeedMode::Random { seed: Some(9) });
        assert_eq!(settings.jobs, 3);
        assert!(settings.feedback.is_none());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config: Config = toml::from_str(
            r#"
[grading]
timeout_secs = 10.0
random_data = true
jobs = 2
"#,
        )
        .unwrap();
        config.merge(parse(&["--timeout", "1"]).to_config());

        let settings = config.resolve().unwrap();
        assert_eq!(settings.timeout, Duration::from_secs(1));
        // Absent switches leave the file's value alone.
        assert_eq!(settings.seed_mode, SeedMode::Random { seed: None });
        assert_eq!(settings.jobs, 2);
    }

    #[test]
    fn test_llm_flag_enables_feedback() {
        let cli = parse(&["--llm", "mock", "--feedback-output", "fb.csv"]);
        let feedback = cli.to_config().resolve().unwrap().feedback.unwrap();
        assert_eq!(feedback.client.provider.as_str(), "mock");
        assert_eq!(feedback.output, PathBuf::from("fb.csv"));
    }

    #[test]
    fn test_worker_subcommand() {
        let cli = parse(&["worker", "--database", "/tmp/grade.db"]);
        assert_eq!(
            cli.command,
            Some(Command::Worker {
                database: PathBuf::from("/tmp/grade.db")
            })
        );
    }

    #[test]
    fn test_worker_requires_database() {
        assert!(Cli::try_parse_from(["sqlgrade", "worker"]).is_err());
    }

    #[test]
    fn test_bad_timeout_value() {
        assert!(Cli::try_parse_from(["sqlgrade", "--timeout", "soon"]).is_err());
    }

    #[test]
    fn test_config_path_override() {
        let cli = parse(&["--config", "grading.toml"]);
        assert_eq!(cli.config_path(), PathBuf::from("grading.toml"));
        assert_eq!(parse(&[]).config_path(), Config::default_path());
    }

    #[test]
    fn test_worker_subcommand_name_matches_protocol() {
        use clap::CommandFactory;
        let command = Cli::command();
        assert!(command
            .get_subcommands()
            .any(|sub| sub.get_name() == crate::query::WORKER_SUBCOMMAND));
    }
}
