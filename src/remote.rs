use serde::Serialize;

use crate::{decode_envelope, DetectiveConfig, Evidence, InvestigateRequest, RemoteError, ResponseEnvelope};

/// Result of a `/delete` slash command, by HTTP status class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeleteOutcome {
    Deleted,
    ClientError(u16),
    ServerError(u16),
    Failed(u16),
}

impl DeleteOutcome {
    pub(crate) fn from_status(code: u16) -> Self {
        match code {
            200..=299 => DeleteOutcome::Deleted,
            400..=499 => DeleteOutcome::ClientError(code),
            500..=599 => DeleteOutcome::ServerError(code),
            _ => DeleteOutcome::Failed(code),
        }
    }
}

/// The remote decision-making service.
pub(crate) trait RemoteService {
    fn investigate(&self, request: &InvestigateRequest) -> Result<ResponseEnvelope, RemoteError>;
    fn evidence(&self, evidence: &Evidence) -> Result<ResponseEnvelope, RemoteError>;
    fn delete(&self, conversation_id: &str) -> Result<DeleteOutcome, RemoteError>;
    /// Where a delete for `conversation_id` is sent, for display.
    fn delete_url(&self, conversation_id: &str) -> String;
}

/// JSON over HTTP(S) with a bearer token on every call.
pub(crate) struct HttpRemote {
    base_url: String,
    api_token: String,
    agent: ureq::Agent,
}

impl HttpRemote {
    pub(crate) fn new(config: &DetectiveConfig) -> Self {
        // One agent for every endpoint, so evidence calls get the same bounded
        // timeouts as investigate calls.
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.timeouts.connect)
            .timeout_read(config.timeouts.read)
            .timeout_write(config.timeouts.read)
            .build();
        Self {
            base_url: config.server_base_url.as_str().to_string(),
            api_token: config.api_token.clone(),
            agent,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(base_url: &str, api_token: &str, timeout: std::time::Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .build();
        Self {
            base_url: base_url.to_string(),
            api_token: api_token.to_string(),
            agent,
        }
    }

    pub(crate) fn url(&self, method: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            method.trim_matches('/')
        )
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.api_token)
    }

    fn post_json<T: Serialize>(&self, method: &str, body: &T) -> Result<ResponseEnvelope, RemoteError> {
        let url = self.url(method);
        let payload = serde_json::to_string(body).map_err(RemoteError::Encode)?;
        tracing::debug!(%url, bytes = payload.len(), "POST");
        let response = self
            .agent
            .post(&url)
            .set("Authorization", &self.authorization())
            .set("Content-Type", "application/json")
            .send_string(&payload);
        match response {
            Ok(resp) => {
                let text = resp.into_string().map_err(|e| RemoteError::Transport {
                    url: url.clone(),
                    message: e.to_string(),
                })?;
                decode_envelope(&text)
            }
            Err(ureq::Error::Status(code, resp)) => Err(RemoteError::Status {
                url,
                code,
                body: resp.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(err)) => Err(transport_error(url, &err)),
        }
    }
}

fn transport_error(url: String, err: &ureq::Transport) -> RemoteError {
    let message = err.to_string();
    match err.kind() {
        ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed => RemoteError::Connect { url, message },
        _ => RemoteError::Transport { url, message },
    }
}

impl RemoteService for HttpRemote {
    fn investigate(&self, request: &InvestigateRequest) -> Result<ResponseEnvelope, RemoteError> {
        self.post_json("investigate", request)
    }

    fn evidence(&self, evidence: &Evidence) -> Result<ResponseEnvelope, RemoteError> {
        self.post_json("evidence", evidence)
    }

    fn delete(&self, conversation_id: &str) -> Result<DeleteOutcome, RemoteError> {
        let url = self.delete_url(conversation_id);
        tracing::debug!(%url, "POST");
        let response = self
            .agent
            .post(&url)
            .set("Authorization", &self.authorization())
            .call();
        match response {
            Ok(resp) => Ok(DeleteOutcome::from_status(resp.status())),
            Err(ureq::Error::Status(code, _)) => Ok(DeleteOutcome::from_status(code)),
            Err(ureq::Error::Transport(err)) => Err(transport_error(url, &err)),
        }
    }

    fn delete_url(&self, conversation_id: &str) -> String {
        format!("{}/{}", self.url("delete"), urlencoding::encode(conversation_id))
    }
}
