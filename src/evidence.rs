use chrono::{Local, SecondsFormat};

use crate::{CommandOutcome, Evidence};

/// Local wall-clock time in ISO 8601 extended format with offset.
pub(crate) fn local_datetime() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Build the evidence payload for one turn. The reserved excerpt field is
/// always left empty.
pub(crate) fn package_evidence(
    conversation_id: Option<&str>,
    local_datetime: String,
    outcome: CommandOutcome,
) -> Evidence {
    Evidence {
        conversation_id: conversation_id.map(str::to_string),
        local_datetime,
        command_stdout: outcome.stdout,
        command_stdout_relevant_excerpt: None,
        command_stderr: outcome.stderr,
        command_code: outcome.exit_code,
        comment: outcome.comment,
    }
}
