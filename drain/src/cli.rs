use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Output format for log lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable console output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Drain a hosted message queue in batches, then exit.
#[derive(Debug, Clone, Parser)]
#[command(name = "drain", version, about)]
pub struct Cli {
    /// JSON worker configuration. Defaults apply when omitted.
    #[arg(env = "CONFIG_FILE", long)]
    pub config: Option<PathBuf>,

    /// Task payload file supplied by the hosted runner. Logged, not read.
    #[arg(env = "PAYLOAD_FILE", long)]
    pub payload: Option<PathBuf>,

    /// Task id supplied by the hosted runner.
    #[arg(env = "TASK_ID", long)]
    pub id: Option<String>,

    /// Log output format.
    #[arg(env = "DRAIN_LOG_FORMAT", long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_all_flags() {
        let cli = Cli::try_parse_from([
            "drain",
            "--config",
            "/task/config.json",
            "--payload",
            "/task/payload.json",
            "--id",
            "task-42",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/task/config.json")));
        assert_eq!(cli.payload, Some(PathBuf::from("/task/payload.json")));
        assert_eq!(cli.id.as_deref(), Some("task-42"));
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let result = Cli::try_parse_from(["drain", "--log-format", "xml"]);
        assert!(result.is_err());
    }
}
