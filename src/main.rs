// Module declarations
mod cli;
mod config;
mod config_file;
mod consent;
mod error;
mod evidence;
mod executor;
mod logging;
mod protocol;
mod remote;
mod session;
mod terminal;
mod util;

#[cfg(test)]
mod testing;

// Re-export module items at crate root so cross-module references stay short.
#[allow(unused_imports)]
pub(crate) use cli::*;
#[allow(unused_imports)]
pub(crate) use config::*;
#[allow(unused_imports)]
pub(crate) use config_file::*;
#[allow(unused_imports)]
pub(crate) use consent::*;
#[allow(unused_imports)]
pub(crate) use error::*;
#[allow(unused_imports)]
pub(crate) use evidence::*;
#[allow(unused_imports)]
pub(crate) use executor::*;
#[allow(unused_imports)]
pub(crate) use logging::*;
#[allow(unused_imports)]
pub(crate) use protocol::*;
#[allow(unused_imports)]
pub(crate) use remote::*;
#[allow(unused_imports)]
pub(crate) use session::*;
#[allow(unused_imports)]
pub(crate) use terminal::*;
#[allow(unused_imports)]
pub(crate) use util::*;

use clap::Parser;

fn main() {
    let cli = Cli::parse();
    let code = run(cli);
    std::process::exit(code);
}

/// Everything that needs cleanup lives in here, so it is dropped before exit.
fn run(cli: Cli) -> i32 {
    let _logging = match init_logging(&cli.log_config()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Cannot open log file {}: {err}", cli.log_file.display());
            return 2;
        }
    };

    let path = config_file_path(cli.config.clone());
    let config = match load_config(&path, ConfigOverrides::from_env(cli.server_url.clone())) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(path = %path.display(), "Invalid configuration: {err}");
            return 2;
        }
    };
    tracing::info!(?config, "configuration loaded");

    let remote = HttpRemote::new(&config);
    let runner = BoundedExecutor::new(config.settings.command_max_output_size);
    let mut detective = Detective::new(&config, remote, runner, ConsoleOperator::stdio());

    let result = match cli.issue.as_deref() {
        Some(issue) => detective.investigate(issue).map(|_| ()),
        None => detective.on_duty(),
    };
    match result {
        Ok(()) => 0,
        Err(SessionError::OperatorExit) => {
            tracing::info!(conversation_id = ?detective.conversation_id(), "operator exited");
            1
        }
        Err(err) => {
            tracing::debug!(state = ?detective.state(), "session ended: {err}");
            1
        }
    }
}
