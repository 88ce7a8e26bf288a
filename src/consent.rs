//! Operator consent around remote-requested commands.
//!
//! Three checkpoints run per turn, in order: the pre-execution gate (privilege
//! escalation and the run prompt), the post-execution size check, and the
//! pre-send review of collected output.

use std::io;
use std::path::Path;

use crate::{display_command, Choice, CommandRunner, ExecutionResult, Operator, Settings, Tone};

pub(crate) const PRIVILEGE_ESCALATION_COMMENT: &str =
    "Privilege escalation not permitted: the user does not allow `sudo` or similar commands.";
pub(crate) const DECLINED_TO_RUN_COMMENT: &str =
    "The user declined to run this command. Try something else.";
pub(crate) const OUTPUT_TOO_LONG_COMMENT: &str =
    "The command output exceeded the maximum length defined by the user. \
     Try an alternative command or options to reduce the output size.";
pub(crate) const DECLINED_TO_SEND_COMMENT: &str =
    "The user declined to allow the output of the command to be sent.";

const PRIVILEGE_ESCALATION_PROGRAMS: &[&str] = &["sudo", "sudoedit", "doas", "su", "pkexec", "run0"];

/// What will be reported for one remote-requested command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandOutcome {
    pub(crate) stdout: Option<String>,
    pub(crate) stderr: Option<String>,
    pub(crate) exit_code: i32,
    pub(crate) comment: Option<String>,
    /// Whether a process was actually run for this outcome.
    pub(crate) executed: bool,
}

impl CommandOutcome {
    pub(crate) fn withheld(comment: &str) -> Self {
        Self {
            stdout: None,
            stderr: None,
            exit_code: 1,
            comment: Some(comment.to_string()),
            executed: false,
        }
    }

    fn from_execution(result: ExecutionResult) -> Self {
        Self {
            stdout: Some(result.stdout),
            stderr: Some(result.stderr),
            exit_code: result.exit_code,
            comment: None,
            executed: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Run,
    Declined,
    Forbidden,
}

#[derive(Debug)]
pub(crate) enum GateError {
    OperatorExit,
    Terminal(io::Error),
}

impl From<io::Error> for GateError {
    fn from(err: io::Error) -> Self {
        GateError::Terminal(err)
    }
}

/// Whether `argv` starts with a program that raises privileges.
pub(crate) fn is_privilege_escalation(argv: &[String]) -> bool {
    let Some(program) = argv.first() else {
        return false;
    };
    let name = Path::new(program.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    PRIVILEGE_ESCALATION_PROGRAMS.contains(&name)
}

#[derive(Debug, Clone)]
pub(crate) struct ConsentGate {
    settings: Settings,
}

impl ConsentGate {
    pub(crate) fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Checkpoint 1. Forbidden commands are refused before any prompt.
    pub(crate) fn review_command(
        &self,
        argv: &[String],
        operator: &mut dyn Operator,
    ) -> Result<Verdict, GateError> {
        if !self.settings.allow_sudo && is_privilege_escalation(argv) {
            tracing::error!(command = ?argv, "remote requested privilege escalation");
            return Ok(Verdict::Forbidden);
        }
        if !self.settings.review_commands_before_executing {
            return Ok(Verdict::Run);
        }
        let choice = operator.choose(
            "\nOK to run this command?",
            &[Choice::Yes, Choice::No, Choice::Exit],
        )?;
        match choice {
            Choice::Yes => Ok(Verdict::Run),
            Choice::No => {
                tracing::info!(command = ?argv, "operator declined to run");
                Ok(Verdict::Declined)
            }
            Choice::Exit => {
                operator.say(Tone::Explanation, "Exiting");
                Err(GateError::OperatorExit)
            }
        }
    }

    /// Checkpoint 2. Independent of the executor's early cutoff: whatever was
    /// collected, oversized stdout never reaches the evidence payload.
    pub(crate) fn enforce_output_limit(&self, result: ExecutionResult) -> CommandOutcome {
        let limit = self.settings.command_max_output_size;
        if result.stdout.len() > limit {
            tracing::warn!(
                bytes = result.stdout.len(),
                limit,
                truncated = result.truncated,
                "discarding oversized output"
            );
            return CommandOutcome {
                executed: true,
                ..CommandOutcome::withheld(OUTPUT_TOO_LONG_COMMENT)
            };
        }
        CommandOutcome::from_execution(result)
    }

    /// Checkpoint 3. Runs for every command that executed, including one whose
    /// output was discarded for size; declining keeps the real exit code.
    pub(crate) fn review_output(
        &self,
        mut outcome: CommandOutcome,
        operator: &mut dyn Operator,
    ) -> Result<CommandOutcome, GateError> {
        if !self.settings.review_command_output_before_sending || !outcome.executed {
            return Ok(outcome);
        }

        let stdout = outcome.stdout.as_deref().unwrap_or("");
        let display = if stdout.is_empty() { "[no output]" } else { stdout };
        operator.say(Tone::Output, &format!("\n{display}\n"));
        if let Some(stderr) = outcome.stderr.as_deref().filter(|s| !s.is_empty()) {
            operator.say(Tone::Output, &format!("stderr:\n{stderr}\n"));
        }

        let choice = operator.choose(
            "OK to send this output to the server?",
            &[Choice::Yes, Choice::No],
        )?;
        if choice == Choice::No {
            tracing::info!("operator declined to send output");
            outcome.stdout = None;
            outcome.stderr = None;
            outcome.comment = Some(DECLINED_TO_SEND_COMMENT.to_string());
        }
        Ok(outcome)
    }

    /// All three checkpoints for one command, running it through `runner`
    /// only when the pre-execution gate allows.
    pub(crate) fn run(
        &self,
        argv: &[String],
        runner: &dyn CommandRunner,
        operator: &mut dyn Operator,
    ) -> Result<CommandOutcome, GateError> {
        operator.say(Tone::Command, &format!("\n> {}", display_command(argv)));

        let outcome = match self.review_command(argv, operator)? {
            Verdict::Forbidden => CommandOutcome::withheld(PRIVILEGE_ESCALATION_COMMENT),
            Verdict::Declined => CommandOutcome::withheld(DECLINED_TO_RUN_COMMENT),
            Verdict::Run => self.enforce_output_limit(runner.execute(argv)),
        };
        self.review_output(outcome, operator)
    }
}
