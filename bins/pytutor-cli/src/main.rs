mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pytutor_common::config::TutorConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pytutor")]
#[command(about = "PyTutor CLI - Check, run and validate Python exercises", long_about = None)]
struct Cli {
    /// JSON config file (defaults plus PYTUTOR_* environment variables when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true, default_value = "false")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the static safety check on a file without executing it
    Check {
        /// Python source file
        file: PathBuf,
    },

    /// Execute a file in the sandboxed interpreter
    Run {
        /// Python source file
        file: PathBuf,

        /// Wall-clock limit in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Maximum stdout bytes kept
        #[arg(short, long)]
        max_output: Option<usize>,
    },

    /// Validate a solution against a curriculum challenge
    Validate {
        /// Topic id (file stem in the curriculum directory)
        #[arg(short, long)]
        topic: String,

        /// 1-based challenge number within the topic
        #[arg(short = 'n', long)]
        challenge: usize,

        /// Which attempt this is; drives the hint shown on failure
        #[arg(short, long, default_value = "1")]
        attempt: u32,

        /// Python source file with the solution
        file: PathBuf,
    },

    /// Score a prediction of what a file will print
    Predict {
        /// Python source file
        file: PathBuf,

        /// Expected output, as the learner would type it
        prediction: String,
    },

    /// List curriculum topics
    Topics {
        /// Completed topic ids; only topics unlocked by them are listed
        #[arg(long, value_delimiter = ',')]
        completed: Option<Vec<String>>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<TutorConfig> {
    match path {
        Some(path) => TutorConfig::load(path)?.with_env_overrides(),
        None => TutorConfig::from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    let passed = match cli.command {
        Commands::Check { file } => commands::check(&file, cli.json)?,
        Commands::Run {
            file,
            timeout,
            max_output,
        } => commands::run(&config, &file, timeout, max_output, cli.json).await?,
        Commands::Validate {
            topic,
            challenge,
            attempt,
            file,
        } => commands::validate(&config, &topic, challenge, attempt, &file, cli.json).await?,
        Commands::Predict { file, prediction } => {
            commands::predict(&config, &file, &prediction, cli.json).await?
        }
        Commands::Topics { completed } => commands::topics(&config, completed, cli.json)?,
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_validate_with_short_flags() {
        let cli = Cli::try_parse_from([
            "pytutor", "-c", "tutor.json", "validate", "-t", "variables", "-n", "2", "-a", "3", "sol.py",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("tutor.json")));
        match cli.command {
            Commands::Validate {
                topic,
                challenge,
                attempt,
                file,
            } => {
                assert_eq!(topic, "variables");
                assert_eq!(challenge, 2);
                assert_eq!(attempt, 3);
                assert_eq!(file, PathBuf::from("sol.py"));
            }
            _ => panic!("expected validate command"),
        }
    }

    #[test]
    fn test_parse_run_defaults() {
        let cli = Cli::try_parse_from(["pytutor", "run", "hello.py", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Run {
                timeout: None,
                max_output: None,
                ..
            }
        ));
    }
}
