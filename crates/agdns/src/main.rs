mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

use agdns_config::{ConfigError, Profile};
use agdns_core::CoordinatorConfig;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands never touch the API
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        cmd => {
            let config = build_coordinator_config(&cli.global)?;
            tracing::debug!(command = ?cmd, api_url = %config.api_url, "dispatching command");
            commands::dispatch(cmd, config, &cli.global).await
        }
    }
}

/// Path of the config file in effect: `--config`, else the platform default.
fn config_file(global: &GlobalOpts) -> std::path::PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(agdns_config::config_path)
}

/// Build a `CoordinatorConfig` from the config file, profile, and CLI overrides.
fn build_coordinator_config(global: &GlobalOpts) -> Result<CoordinatorConfig, CliError> {
    let cfg = agdns_config::load_config_from(&config_file(global))?;

    let (profile_name, mut profile) =
        match agdns_config::select_profile(&cfg, global.profile.as_deref()) {
            Ok((name, profile)) => (name, profile.clone()),
            Err(ConfigError::UnknownProfile { name }) => {
                if global.profile.is_some() {
                    let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
                    available.sort();
                    return Err(CliError::ProfileNotFound {
                        name,
                        available: if available.is_empty() {
                            "(none)".into()
                        } else {
                            available.join(", ")
                        },
                    });
                }
                // No profile on disk -- build from CLI flags / env vars alone
                if global.refresh_token.is_none() {
                    return Err(CliError::NoCredentials { profile: name });
                }
                (name, Profile::default())
            }
            Err(other) => return Err(other.into()),
        };

    // CLI flag overrides
    if let Some(ref url) = global.api_url {
        profile.api_url.clone_from(url);
    }
    if let Some(ref url) = global.token_url {
        profile.token_url.clone_from(url);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    if let Some(ref token) = global.refresh_token {
        profile.refresh_token = Some(token.clone());
    }

    let mut config =
        agdns_config::profile_to_coordinator_config(&profile, &profile_name, &cfg.defaults)?;

    // An explicit token beats keyring and env lookups
    if let Some(ref token) = global.refresh_token {
        config.credentials.refresh_token = SecretString::from(token.clone());
    }

    Ok(config)
}
