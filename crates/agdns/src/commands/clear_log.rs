//! Clear-log command.

use agdns_core::{Coordinator, CoordinatorConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn handle(config: CoordinatorConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let cleared = Coordinator::oneshot(config, |coordinator| async move {
        Ok(coordinator.clear_remote_log().await)
    })
    .await?;

    if !cleared {
        return Err(CliError::ClearLogFailed);
    }
    output::print_output("Query log cleared", global.quiet);
    Ok(())
}
