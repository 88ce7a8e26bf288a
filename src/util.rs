use std::env;
use std::process::{Child, Command as ProcessCommand, ExitStatus};

pub(crate) fn env_optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

pub(crate) fn build_external_command(program: &str, args: &[String]) -> ProcessCommand {
    let mut cmd = ProcessCommand::new(program);
    cmd.args(args);

    // Process group isolation: the child becomes its own process group leader
    // so we can kill the entire tree without affecting the parent.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    cmd
}

/// Kill a child process and its entire process group with SIGKILL.
/// Grandchildren holding the output pipes die with it, so draining the
/// remaining stderr cannot block on them.
#[cfg(unix)]
pub(crate) fn kill_process_group(child: &mut Child) {
    let pid = child.id() as i32;
    unsafe {
        libc::killpg(pid, libc::SIGKILL);
    }
    // The leader may already be a zombie, which killpg does not cover.
    let _ = child.kill();
}

#[cfg(not(unix))]
pub(crate) fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
}

/// Numeric exit code for a finished child. On Unix a process killed by a
/// signal reports the negated signal number.
pub(crate) fn exit_code_of(status: &ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(code) = status.code() {
            code
        } else if let Some(sig) = status.signal() {
            -sig
        } else {
            1
        }
    }
    #[cfg(not(unix))]
    {
        status.code().unwrap_or(1)
    }
}

/// Render an argv for display, quoting arguments the way a shell would need them.
pub(crate) fn display_command(argv: &[String]) -> String {
    shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_else(|_| argv.join(" "))
}

/// Cut a string to at most `max_bytes`, backing off to a char boundary.
pub(crate) fn clip_to_boundary(text: &mut String, max_bytes: usize) -> bool {
    if text.len() <= max_bytes {
        return false;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    true
}
