//! Command dispatch: bridges CLI args -> coordinator -> output formatting.

pub mod clear_log;
pub mod config_cmd;
pub mod snapshot;
pub mod watch;

use agdns_core::CoordinatorConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch an API-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: CoordinatorConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Snapshot(args) => snapshot::handle(config, &args, global).await,
        Command::Watch(args) => watch::handle(config, &args, global).await,
        Command::ClearLog => clear_log::handle(config, global).await,
        // Config is handled before dispatch
        Command::Config(_) => unreachable!(),
    }
}
