//! Wire contract with the remote investigation service.
//!
//! Field names match the JSON bodies exactly. Every inbound body passes through
//! [`decode_envelope`] and every outbound evidence payload through
//! [`Evidence::validate`] before it crosses the boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::RemoteError;

pub(crate) const DEFAULT_MAX_OUTPUT_SIZE: usize = 20_000;

/// Operator policy, sent along with every new investigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) allow_sudo: bool,
    pub(crate) review_commands_before_executing: bool,
    pub(crate) review_command_output_before_sending: bool,
    pub(crate) command_max_output_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            allow_sudo: false,
            review_commands_before_executing: true,
            review_command_output_before_sending: true,
            command_max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct InvestigateRequest {
    pub(crate) conversation_id: Option<String>,
    pub(crate) local_datetime: String,
    pub(crate) env_command_outputs: BTreeMap<String, String>,
    pub(crate) settings: Settings,
    pub(crate) content: String,
}

impl InvestigateRequest {
    pub(crate) fn validate(&self) -> Result<(), RemoteError> {
        if self.content.trim().is_empty() {
            return Err(RemoteError::schema("content must not be empty"));
        }
        validate_id(self.conversation_id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Evidence {
    pub(crate) conversation_id: Option<String>,
    pub(crate) local_datetime: String,
    pub(crate) command_stdout: Option<String>,
    /// Reserved by the protocol; never populated locally.
    pub(crate) command_stdout_relevant_excerpt: Option<String>,
    pub(crate) command_stderr: Option<String>,
    pub(crate) command_code: i32,
    pub(crate) comment: Option<String>,
}

impl Evidence {
    /// Outbound check: nothing larger than `max_output_size` may leave the host.
    pub(crate) fn validate(&self, max_output_size: usize) -> Result<(), RemoteError> {
        if self.conversation_id.is_none() {
            return Err(RemoteError::schema("evidence requires a conversation_id"));
        }
        validate_id(self.conversation_id.as_deref())?;
        for (field, value) in [
            ("command_stdout", &self.command_stdout),
            ("command_stderr", &self.command_stderr),
        ] {
            if let Some(value) = value {
                if value.len() > max_output_size {
                    return Err(RemoteError::schema(format!(
                        "{field} is {} bytes, limit is {max_output_size}",
                        value.len()
                    )));
                }
            }
        }
        if self.command_stdout_relevant_excerpt.is_some() {
            return Err(RemoteError::schema(
                "command_stdout_relevant_excerpt is reserved",
            ));
        }
        Ok(())
    }
}

/// A response to either an investigate or an evidence call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct ResponseEnvelope {
    #[serde(default)]
    pub(crate) conversation_id: Option<String>,
    /// Reserved by the protocol; accepted and ignored.
    #[serde(default)]
    pub(crate) previous_command_stdout_relevant_excerpt: Option<String>,
    #[serde(default)]
    pub(crate) completed: bool,
    #[serde(default)]
    pub(crate) command: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) text: Option<String>,
}

impl ResponseEnvelope {
    /// Only the id is checked here. An empty `command` is well-formed on the
    /// wire; whether it is runnable is the session's call.
    pub(crate) fn validate(&self) -> Result<(), RemoteError> {
        validate_id(self.conversation_id.as_deref())
    }

    /// The requested command, if it names a program to run.
    pub(crate) fn runnable_command(&mut self) -> Option<Vec<String>> {
        self.command
            .take()
            .filter(|argv| argv.first().is_some_and(|program| !program.trim().is_empty()))
    }
}

fn validate_id(id: Option<&str>) -> Result<(), RemoteError> {
    match id {
        Some(id) if id.trim().is_empty() => {
            Err(RemoteError::schema("conversation_id must not be blank"))
        }
        _ => Ok(()),
    }
}

/// Decode a response body. The service may send the envelope as a JSON object
/// or as a JSON string whose contents are the encoded object.
pub(crate) fn decode_envelope(body: &str) -> Result<ResponseEnvelope, RemoteError> {
    let json_error = |source| RemoteError::Json {
        body: body.to_string(),
        source,
    };
    let mut value: serde_json::Value = serde_json::from_str(body).map_err(json_error)?;
    if let serde_json::Value::String(inner) = &value {
        value = serde_json::from_str(inner).map_err(json_error)?;
    }
    let envelope: ResponseEnvelope =
        serde_json::from_value(value).map_err(|e| RemoteError::schema(e.to_string()))?;
    envelope.validate()?;
    Ok(envelope)
}
