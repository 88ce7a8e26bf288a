use std::fmt;
use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::{
    env_optional, is_privilege_escalation, load_file_config, ConfigError, FileConfig, Settings,
    TimeoutConfig,
};

pub(crate) const SERVER_URL_ENV: &str = "DETECTIVE_SERVER_URL";
pub(crate) const API_TOKEN_ENV: &str = "DETECTIVE_API_TOKEN";

/// Probes run once when an investigation starts, to describe the host.
pub(crate) fn default_env_commands() -> Vec<Vec<String>> {
    vec![
        vec!["cat".to_string(), "/etc/os-release".to_string()],
        vec!["uname".to_string(), "-a".to_string()],
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Timeouts {
    pub(crate) connect: Duration,
    pub(crate) read: Duration,
}

/// Validated configuration. Immutable once built.
#[derive(Clone)]
pub(crate) struct DetectiveConfig {
    pub(crate) server_base_url: Url,
    pub(crate) api_token: String,
    pub(crate) settings: Settings,
    pub(crate) timeouts: Timeouts,
    pub(crate) env_commands: Vec<Vec<String>>,
}

impl fmt::Debug for DetectiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectiveConfig")
            .field("server_base_url", &self.server_base_url.as_str())
            .field("api_token", &"<redacted>")
            .field("settings", &self.settings)
            .field("timeouts", &self.timeouts)
            .field("env_commands", &self.env_commands)
            .finish()
    }
}

/// Values that take precedence over the file, highest first: command line, then environment.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConfigOverrides {
    pub(crate) server_url: Option<String>,
    pub(crate) api_token: Option<String>,
}

impl ConfigOverrides {
    pub(crate) fn from_env(cli_server_url: Option<String>) -> Self {
        Self {
            server_url: cli_server_url.or_else(|| env_optional(SERVER_URL_ENV)),
            api_token: env_optional(API_TOKEN_ENV),
        }
    }
}

fn parse_server_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl {
        value: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}

fn resolve_timeouts(raw: TimeoutConfig) -> Result<Timeouts, ConfigError> {
    if raw.connect_secs == 0 {
        return Err(ConfigError::ZeroTimeout("connect_secs"));
    }
    if raw.read_secs == 0 {
        return Err(ConfigError::ZeroTimeout("read_secs"));
    }
    Ok(Timeouts {
        connect: Duration::from_secs(raw.connect_secs),
        read: Duration::from_secs(raw.read_secs),
    })
}

/// Validate a parsed file plus overrides into a usable configuration.
pub(crate) fn resolve_config(
    file: FileConfig,
    overrides: ConfigOverrides,
) -> Result<DetectiveConfig, ConfigError> {
    let raw_url = overrides
        .server_url
        .or(file.server_base_url)
        .ok_or(ConfigError::MissingServerUrl)?;
    let server_base_url = parse_server_url(&raw_url)?;

    let api_token = overrides
        .api_token
        .or(file.api_token)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(ConfigError::MissingToken)?;

    if file.settings.command_max_output_size == 0 {
        return Err(ConfigError::ZeroOutputSize);
    }

    let env_commands = file.env_commands.unwrap_or_else(default_env_commands);
    if let Some(idx) = env_commands
        .iter()
        .position(|cmd| cmd.first().is_none_or(|p| p.trim().is_empty()))
    {
        return Err(ConfigError::EmptyEnvCommand(idx));
    }
    if !file.settings.allow_sudo {
        if let Some(idx) = env_commands.iter().position(|cmd| is_privilege_escalation(cmd)) {
            return Err(ConfigError::PrivilegedEnvCommand(idx));
        }
    }

    Ok(DetectiveConfig {
        server_base_url,
        api_token,
        settings: file.settings,
        timeouts: resolve_timeouts(file.timeouts)?,
        env_commands,
    })
}

pub(crate) fn load_config(path: &Path, overrides: ConfigOverrides) -> Result<DetectiveConfig, ConfigError> {
    let file = load_file_config(path)?;
    resolve_config(file, overrides)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> FileConfig {
        FileConfig {
            server_base_url: Some("https://detective.example.com/api".into()),
            api_token: Some("token-123".into()),
            ..FileConfig::default()
        }
    }

    #[test]
    fn resolves_with_defaults() {
        let cfg = resolve_config(file(), ConfigOverrides::default()).unwrap();
        assert_eq!(cfg.server_base_url.as_str(), "https://detective.example.com/api");
        assert_eq!(cfg.api_token, "token-123");
        assert_eq!(cfg.settings, Settings::default());
        assert_eq!(cfg.timeouts.connect, Duration::from_secs(5));
        assert_eq!(cfg.timeouts.read, Duration::from_secs(30));
        assert_eq!(cfg.env_commands, default_env_commands());
    }

    #[test]
    fn overrides_win_over_file() {
        let overrides = ConfigOverrides {
            server_url: Some("http://localhost:8000".into()),
            api_token: Some("from-env".into()),
        };
        let cfg = resolve_config(file(), overrides).unwrap();
        assert_eq!(cfg.server_base_url.as_str(), "http://localhost:8000/");
        assert_eq!(cfg.api_token, "from-env");
    }

    #[test]
    fn rejects_bad_urls() {
        let mut f = file();
        f.server_base_url = Some("not a url".into());
        assert!(matches!(
            resolve_config(f, ConfigOverrides::default()),
            Err(ConfigError::InvalidUrl { .. })
        ));

        let mut f = file();
        f.server_base_url = Some("ftp://example.com".into());
        assert!(matches!(
            resolve_config(f, ConfigOverrides::default()),
            Err(ConfigError::UnsupportedScheme(s)) if s == "ftp"
        ));

        let mut f = file();
        f.server_base_url = None;
        assert!(matches!(
            resolve_config(f, ConfigOverrides::default()),
            Err(ConfigError::MissingServerUrl)
        ));
    }

    #[test]
    fn rejects_blank_token() {
        let mut f = file();
        f.api_token = Some("   ".into());
        assert!(matches!(
            resolve_config(f, ConfigOverrides::default()),
            Err(ConfigError::MissingToken)
        ));
    }

    #[test]
    fn rejects_zero_output_size() {
        let mut f = file();
        f.settings.command_max_output_size = 0;
        assert!(matches!(
            resolve_config(f, ConfigOverrides::default()),
            Err(ConfigError::ZeroOutputSize)
        ));
    }

    #[test]
    fn rejects_zero_timeouts_and_empty_probes() {
        let mut f = file();
        f.timeouts.read_secs = 0;
        assert!(matches!(
            resolve_config(f, ConfigOverrides::default()),
            Err(ConfigError::ZeroTimeout("read_secs"))
        ));

        let mut f = file();
        f.env_commands = Some(vec![vec!["uname".into()], vec![]]);
        assert!(matches!(
            resolve_config(f, ConfigOverrides::default()),
            Err(ConfigError::EmptyEnvCommand(1))
        ));
    }

    #[test]
    fn privileged_probes_need_allow_sudo() {
        let mut f = file();
        f.env_commands = Some(vec![
            vec!["uname".into(), "-a".into()],
            vec!["sudo".into(), "cat".into(), "/etc/shadow".into()],
        ]);
        assert!(matches!(
            resolve_config(f.clone(), ConfigOverrides::default()),
            Err(ConfigError::PrivilegedEnvCommand(1))
        ));

        f.settings.allow_sudo = true;
        let cfg = resolve_config(f, ConfigOverrides::default()).unwrap();
        assert_eq!(cfg.env_commands.len(), 2);
    }

    #[test]
    fn debug_output_hides_token() {
        let cfg = resolve_config(file(), ConfigOverrides::default()).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("token-123"));
        assert!(rendered.contains("<redacted>"));
    }
}
