//! Config subcommand handlers.

use std::fmt::Write as _;

use agdns_config::{Config, Profile, TokenKind};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "update_interval = {}", cfg.defaults.update_interval);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let Some(p) = cfg.profiles.get(name) else {
            continue;
        };
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "api_url = \"{}\"", p.api_url);
        let _ = writeln!(out, "token_url = \"{}\"", p.token_url);
        if !p.client_id.is_empty() {
            let _ = writeln!(out, "client_id = \"{}\"", p.client_id);
        }
        if p.access_token.is_some() {
            let _ = writeln!(out, "access_token = \"****\"");
        }
        if let Some(ref env) = p.access_token_env {
            let _ = writeln!(out, "access_token_env = \"{env}\"");
        }
        if p.refresh_token.is_some() {
            let _ = writeln!(out, "refresh_token = \"****\"");
        }
        if let Some(ref env) = p.refresh_token_env {
            let _ = writeln!(out, "refresh_token_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(interval) = p.update_interval {
            let _ = writeln!(out, "update_interval = {interval}");
        }
        if let Some(limit) = p.query_log_limit {
            let _ = writeln!(out, "query_log_limit = {limit}");
        }
        if let Some(hours) = p.stats_window_hours {
            let _ = writeln!(out, "stats_window_hours = {hours}");
        }
    }

    out
}

/// Profile named by `--profile`, else the file's default, else `default`.
fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = crate::config_file(global);

    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = agdns_config::load_config_from(&path)?;
            output::print_output(&format_config_redacted(&cfg), global.quiet);
            Ok(())
        }

        ConfigCommand::Init {
            refresh_token_env,
            force,
        } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            let name = global.profile.clone().unwrap_or_else(|| "default".into());
            let profile = Profile {
                refresh_token_env: Some(refresh_token_env),
                ..Profile::default()
            };
            let mut cfg = Config {
                default_profile: Some(name.clone()),
                ..Config::default()
            };
            cfg.profiles.insert(name.clone(), profile);
            agdns_config::save_config_to(&path, &cfg)?;

            tracing::info!(profile = %name, path = %path.display(), "config written");
            output::print_output(
                &format!("Wrote profile '{name}' to {}", path.display()),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::SetToken { token, access } => {
            let cfg = agdns_config::load_config_from(&path)?;
            let name = active_profile_name(global, &cfg);
            let kind = if access {
                TokenKind::Access
            } else {
                TokenKind::Refresh
            };
            agdns_config::store_token(&name, kind, &token)?;
            output::print_output(
                &format!("Stored token for profile '{name}' in the system keyring"),
                global.quiet,
            );
            Ok(())
        }
    }
}
