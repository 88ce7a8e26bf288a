//! Error types for configuration, the remote protocol and the session engine.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid or unreadable configuration. Start-up refuses to continue on any of these.
#[derive(Error, Debug)]
pub(crate) enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("server_base_url is required")]
    MissingServerUrl,

    #[error("server_base_url '{value}' is not a valid URL: {source}")]
    InvalidUrl {
        value: String,
        source: url::ParseError,
    },

    #[error("server_base_url must use http or https, got '{0}'")]
    UnsupportedScheme(String),

    #[error("api_token must not be empty")]
    MissingToken,

    #[error("settings.command_max_output_size must be a positive number of bytes")]
    ZeroOutputSize,

    #[error("timeouts.{0} must be at least one second")]
    ZeroTimeout(&'static str),

    #[error("env_commands entry {0} is empty")]
    EmptyEnvCommand(usize),

    #[error("env_commands entry {0} escalates privileges but settings.allow_sudo is false")]
    PrivilegedEnvCommand(usize),
}

/// Failure talking to the remote service, by cause.
#[derive(Error, Debug)]
pub(crate) enum RemoteError {
    #[error("cannot connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned HTTP {code}")]
    Status { url: String, code: u16, body: String },

    #[error("response is not valid JSON: {source}")]
    Json {
        body: String,
        source: serde_json::Error,
    },

    #[error("payload does not match the expected model: {message}")]
    Schema { message: String },

    #[error("could not encode request: {0}")]
    Encode(#[source] serde_json::Error),
}

impl RemoteError {
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        RemoteError::Schema {
            message: message.into(),
        }
    }

    pub(crate) fn is_connect(&self) -> bool {
        matches!(self, RemoteError::Connect { .. })
    }
}

/// Errors that end the process rather than just the current conversation.
#[derive(Error, Debug)]
pub(crate) enum SessionError {
    #[error("cannot connect to the remote service")]
    Connect(#[source] RemoteError),

    #[error("the remote service reported an error")]
    Rejected(#[source] RemoteError),

    #[error("conversation setup failed")]
    Setup(#[source] RemoteError),

    #[error("operator chose to exit")]
    OperatorExit,

    #[error("terminal I/O failed: {0}")]
    Terminal(#[from] std::io::Error),
}

impl SessionError {
    /// Classify a failure of the opening investigate exchange.
    pub(crate) fn from_start(err: RemoteError) -> Self {
        if err.is_connect() {
            SessionError::Connect(err)
        } else if matches!(err, RemoteError::Status { .. }) {
            SessionError::Rejected(err)
        } else {
            SessionError::Setup(err)
        }
    }
}
