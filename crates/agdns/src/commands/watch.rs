//! Watch command: scheduled polling until interrupted.

use std::time::Duration;

use futures_util::StreamExt;

use agdns_core::{Coordinator, CoordinatorConfig, Snapshot};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::commands::snapshot::snapshot_table;
use crate::error::CliError;
use crate::output;

fn print_snapshot(snapshot: &Snapshot, global: &GlobalOpts) -> Result<(), CliError> {
    let rendered = output::render(global.output, snapshot, |s| snapshot_table(s, false))?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn handle(
    mut config: CoordinatorConfig,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(secs) = args.interval {
        config.update_interval = Duration::from_secs(secs);
    }
    let coordinator = Coordinator::new(config)?;

    // Bootstrap failures abort; later cycle failures only log
    let first = coordinator.first_refresh().await?;
    print_snapshot(&first, global)?;
    let mut printed = 1_usize;
    if args.count.is_some_and(|n| printed >= n) {
        coordinator.shutdown().await;
        return Ok(());
    }

    let mut stream = coordinator.subscribe().into_stream();
    coordinator.start().await?;

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break Ok(());
            }
            next = stream.next() => {
                let Some(snapshot) = next else { break Ok(()) };
                if let Err(e) = print_snapshot(&snapshot, global) {
                    break Err(e);
                }
                printed += 1;
                if args.count.is_some_and(|n| printed >= n) {
                    break Ok(());
                }
            }
        }
    };

    coordinator.shutdown().await;
    result
}
