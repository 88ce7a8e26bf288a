//! The investigate/evidence conversation loop.
//!
//! A conversation starts from free-text issue content and then alternates
//! between running remote-requested commands (through [`ConsentGate`]) and
//! sending their evidence back, until a response is marked completed.
//!
//! Failures while opening a conversation are returned as [`SessionError`] and
//! end the process. Once a conversation exists, failures are only logged and
//! end the loop quietly; the operator is returned to the issue prompt.

use std::collections::BTreeMap;

use crate::{
    clip_to_boundary, display_command, is_privilege_escalation, local_datetime, package_evidence,
    CommandRunner, ConsentGate, DeleteOutcome, DetectiveConfig, GateError, InvestigateRequest,
    Operator, RemoteError, RemoteService, ResponseEnvelope, SessionError, Settings, Tone,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    New,
    Active,
    Closed,
}

/// How an established conversation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// The remote service marked the investigation completed.
    Completed,
    /// A response was not completed and carried no runnable command.
    ProtocolViolation,
    /// A transport, protocol or terminal failure mid-conversation.
    Aborted,
}

const VALID_SLASH_COMMANDS: &[&str] = &["delete"];

pub(crate) struct Detective<R, C, O> {
    remote: R,
    runner: C,
    operator: O,
    gate: ConsentGate,
    settings: Settings,
    env_commands: Vec<Vec<String>>,
    conversation_id: Option<String>,
    state: SessionState,
}

impl<R: RemoteService, C: CommandRunner, O: Operator> Detective<R, C, O> {
    pub(crate) fn new(config: &DetectiveConfig, remote: R, runner: C, operator: O) -> Self {
        Self {
            remote,
            runner,
            operator,
            gate: ConsentGate::new(config.settings),
            settings: config.settings,
            env_commands: config.env_commands.clone(),
            conversation_id: None,
            state: SessionState::New,
        }
    }

    pub(crate) fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn remote(&self) -> &R {
        &self.remote
    }

    #[cfg(test)]
    pub(crate) fn runner(&self) -> &C {
        &self.runner
    }

    #[cfg(test)]
    pub(crate) fn operator(&self) -> &O {
        &self.operator
    }

    /// Interactive loop: read issues until input ends. Slash commands act
    /// directly on the remote service; anything else starts an investigation.
    pub(crate) fn on_duty(&mut self) -> Result<(), SessionError> {
        while let Some(issue) = self.operator.read_issue()? {
            if issue.is_empty() {
                continue;
            }
            if let Some(directive) = issue.strip_prefix('/') {
                self.run_slash_command(directive);
                continue;
            }
            let end = self.investigate(&issue)?;
            tracing::info!(?end, conversation_id = ?self.conversation_id, "investigation ended");
        }
        Ok(())
    }

    /// Run one investigation to its end.
    pub(crate) fn investigate(&mut self, issue: &str) -> Result<SessionEnd, SessionError> {
        let first = match self.start(issue) {
            Ok(response) => response,
            Err(err) => {
                self.state = SessionState::Closed;
                self.report_start_failure(&err);
                return Err(err);
            }
        };
        let end = self.converse(first);
        self.state = SessionState::Closed;
        end
    }

    /// NEW -> ACTIVE: gather host probes, send the issue, adopt the conversation id.
    fn start(&mut self, issue: &str) -> Result<ResponseEnvelope, SessionError> {
        let request = InvestigateRequest {
            conversation_id: self.conversation_id.clone(),
            local_datetime: local_datetime(),
            env_command_outputs: self.gather_env_outputs(),
            settings: self.settings,
            content: issue.to_string(),
        };
        request.validate().map_err(SessionError::Setup)?;

        tracing::info!(conversation_id = ?self.conversation_id, "starting investigation");
        let response = self
            .remote
            .investigate(&request)
            .map_err(SessionError::from_start)?;

        match (self.conversation_id.as_deref(), response.conversation_id.as_deref()) {
            (None, Some(id)) => {
                self.operator
                    .say(Tone::Output, &format!("The id for this conversation is {id}."));
                self.operator.say(
                    Tone::Output,
                    &format!(
                        "You may delete this conversation from our server at any time by \
                         entering the following at the issue prompt: /delete {id}"
                    ),
                );
                self.conversation_id = Some(id.to_string());
            }
            (None, None) if !response.completed => {
                return Err(SessionError::Setup(RemoteError::schema(
                    "investigate response did not assign a conversation_id",
                )));
            }
            _ => self.check_conversation_id(&response),
        }
        self.state = SessionState::Active;
        Ok(response)
    }

    fn report_start_failure(&mut self, err: &SessionError) {
        tracing::error!(error = ?err, "investigation could not start");
        let message = match err {
            SessionError::Connect(_) => "Cannot connect to the remote service. Exiting.".to_string(),
            SessionError::Rejected(source) => {
                format!("The remote service reported an error. Exiting. (\"{source}\")")
            }
            _ => "Something went wrong setting up the conversation. We'll stop here for now."
                .to_string(),
        };
        self.operator.say(Tone::Output, &message);
    }

    /// The ACTIVE loop. Only an operator exit escapes as an error.
    fn converse(&mut self, first: ResponseEnvelope) -> Result<SessionEnd, SessionError> {
        let mut response = first;
        loop {
            if let Some(text) = response.text.as_deref() {
                self.operator.say(Tone::Explanation, &format!("\n{text}"));
            }
            if response.completed {
                self.operator.say(Tone::Completed, "\n*** CASE CLOSED ***\n");
                return Ok(SessionEnd::Completed);
            }
            let Some(command) = response.runnable_command() else {
                tracing::error!(conversation_id = ?self.conversation_id, "no command specified");
                return Ok(SessionEnd::ProtocolViolation);
            };

            let outcome = match self.gate.run(&command, &self.runner, &mut self.operator) {
                Ok(outcome) => outcome,
                Err(GateError::OperatorExit) => return Err(SessionError::OperatorExit),
                Err(GateError::Terminal(err)) => {
                    tracing::error!(error = %err, "terminal failed during confirmation");
                    return Ok(SessionEnd::Aborted);
                }
            };
            tracing::info!(
                command = %display_command(&command),
                exit_code = outcome.exit_code,
                executed = outcome.executed,
                comment = ?outcome.comment,
                "turn complete"
            );

            let evidence =
                package_evidence(self.conversation_id.as_deref(), local_datetime(), outcome);
            let sent = evidence
                .validate(self.settings.command_max_output_size)
                .and_then(|()| self.remote.evidence(&evidence));
            response = match sent {
                Ok(next) => next,
                Err(err) => {
                    log_turn_failure(&err);
                    return Ok(SessionEnd::Aborted);
                }
            };
            self.check_conversation_id(&response);
        }
    }

    /// The conversation id never changes mid-conversation; a differing id in a
    /// response is logged and ignored.
    fn check_conversation_id(&self, response: &ResponseEnvelope) {
        if let (Some(current), Some(received)) =
            (self.conversation_id.as_deref(), response.conversation_id.as_deref())
        {
            if current != received {
                tracing::warn!(current, received, "response carried a different conversation id, ignoring");
            }
        }
    }

    /// Host probes, keyed by the space-joined argv. Probe failures are still
    /// reported, as whatever stdout the probe produced. Probes that escalate
    /// privileges are skipped unless `allow_sudo` is set.
    fn gather_env_outputs(&self) -> BTreeMap<String, String> {
        self.env_commands
            .iter()
            .filter(|argv| {
                let forbidden = !self.settings.allow_sudo && is_privilege_escalation(argv);
                if forbidden {
                    tracing::error!(command = ?argv, "skipping environment probe that escalates privileges");
                }
                !forbidden
            })
            .map(|argv| {
                let mut result = self.runner.execute(argv);
                clip_to_boundary(&mut result.stdout, self.settings.command_max_output_size);
                (argv.join(" "), result.stdout)
            })
            .collect()
    }

    /// Handle a `/name args...` directive (without the slash). Returns whether
    /// the remote action succeeded.
    pub(crate) fn run_slash_command(&mut self, directive: &str) -> bool {
        let parts: Vec<&str> = directive.split_whitespace().collect();
        let Some((&name, args)) = parts.split_first() else {
            self.operator.say(Tone::Explanation, "\"\" is not a valid command.");
            return false;
        };
        if !VALID_SLASH_COMMANDS.contains(&name) {
            self.operator
                .say(Tone::Explanation, &format!("\"{name}\" is not a valid command."));
            return false;
        }
        let [id] = args else {
            self.operator
                .say(Tone::Explanation, "Usage: /delete <conversation id>");
            return false;
        };

        self.operator
            .say(Tone::Explanation, "Attempting to execute remote API call:");
        self.operator.say(Tone::Command, &self.remote.delete_url(id));

        match self.remote.delete(id) {
            Ok(DeleteOutcome::Deleted) => {
                self.operator
                    .say(Tone::Explanation, "Remote API call executed successfully :)");
                if self.conversation_id.as_deref() == Some(*id) {
                    tracing::info!(conversation_id = %id, "current conversation deleted");
                    self.conversation_id = None;
                    self.state = SessionState::New;
                }
                true
            }
            Ok(DeleteOutcome::ClientError(code)) => {
                self.operator.say(
                    Tone::Explanation,
                    &format!("Remote API reported a client error ({code})"),
                );
                false
            }
            Ok(DeleteOutcome::ServerError(code)) => {
                self.operator.say(
                    Tone::Explanation,
                    &format!("Remote API reported a server error ({code})"),
                );
                false
            }
            Ok(DeleteOutcome::Failed(code)) => {
                self.operator.say(
                    Tone::Explanation,
                    &format!("Remote API call failed with error code {code}"),
                );
                false
            }
            Err(err) => {
                tracing::error!(error = %err, "delete call failed");
                self.operator
                    .say(Tone::Explanation, &format!("Remote API call failed: {err}"));
                false
            }
        }
    }
}

fn log_turn_failure(err: &RemoteError) {
    match err {
        RemoteError::Connect { .. } => tracing::error!(error = %err, "could not connect to server"),
        RemoteError::Status { code, body, .. } => {
            tracing::error!(code, body = %body, "server error: {err}")
        }
        RemoteError::Json { body, .. } => {
            tracing::error!(body = %body, "response is not valid JSON: {err}")
        }
        RemoteError::Schema { .. } => {
            tracing::error!("response does not match the expected model: {err}")
        }
        _ => tracing::error!(error = %err, "evidence exchange failed"),
    }
}
