use std::path::PathBuf;

use clap::Parser;

use crate::{LogConfig, LogLevel, DEFAULT_LOG_FILE};

#[derive(Parser, Debug)]
#[command(name = "detective")]
#[command(
    about = "Investigate host issues with a remote diagnostic service, running its commands only with your consent",
    long_about = None
)]
#[command(version)]
pub(crate) struct Cli {
    /// Issue to investigate once, instead of prompting for issues until end of input.
    pub(crate) issue: Option<String>,

    /// Config file (YAML, or JSON when the extension is .json). Default: ./config.yaml
    #[arg(short, long)]
    pub(crate) config: Option<PathBuf>,

    /// Remote service base URL (overrides the config file and DETECTIVE_SERVER_URL).
    #[arg(long)]
    pub(crate) server_url: Option<String>,

    /// Debug log file.
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    pub(crate) log_file: PathBuf,

    /// Level written to the debug log file.
    #[arg(long, value_enum, default_value_t = LogLevel::Debug)]
    pub(crate) log_level: LogLevel,

    /// Do not write a debug log file; errors still go to stderr.
    #[arg(long)]
    pub(crate) no_log_file: bool,
}

impl Cli {
    pub(crate) fn log_config(&self) -> LogConfig {
        LogConfig {
            file: (!self.no_log_file).then(|| self.log_file.clone()),
            level: self.log_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["detective"]).unwrap();
        assert_eq!(cli.issue, None);
        assert_eq!(cli.config, None);
        let log = cli.log_config();
        assert_eq!(log.file, Some(PathBuf::from(DEFAULT_LOG_FILE)));
        assert_eq!(log.level, LogLevel::Debug);
    }

    #[test]
    fn one_shot_issue_and_overrides() {
        let cli = Cli::try_parse_from([
            "detective",
            "--config",
            "/etc/detective.json",
            "--server-url",
            "http://localhost:8000",
            "--log-level",
            "warn",
            "--no-log-file",
            "nginx returns 502",
        ])
        .unwrap();
        assert_eq!(cli.issue.as_deref(), Some("nginx returns 502"));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/detective.json")));
        assert_eq!(cli.server_url.as_deref(), Some("http://localhost:8000"));
        let log = cli.log_config();
        assert_eq!(log.file, None);
        assert_eq!(log.level, LogLevel::Warn);
    }

    #[test]
    fn rejects_unknown_level() {
        assert!(Cli::try_parse_from(["detective", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn command_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
