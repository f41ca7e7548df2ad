use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result},
    chirp_config::ChirpConfig,
    chirp_twitter::{TwitterAccountConfig, auth::AuthMode},
    clap::Subcommand,
};

#[derive(Clone, Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report the selected auth mode.
    Check,
    /// Print the config file path that would be loaded.
    Path,
}

pub fn handle_config(action: ConfigAction, explicit: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check => check(explicit),
        ConfigAction::Path => {
            match config_path(explicit) {
                Some(path) => println!("{}", path.display()),
                None => eprintln!("No config file found."),
            }
            Ok(())
        },
    }
}

fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(chirp_config::find_config_file)
}

/// Load config from `explicit`, or discover it in the standard locations.
pub fn load(explicit: Option<&Path>) -> Result<ChirpConfig> {
    match explicit {
        Some(path) => chirp_config::load_config(path),
        None => Ok(chirp_config::discover_and_load()),
    }
}

/// The Twitter account section of `config`.
pub fn twitter_config(config: &ChirpConfig) -> Result<TwitterAccountConfig> {
    let value = config
        .channels
        .twitter
        .clone()
        .context("missing [channels.twitter] section in config")?;
    serde_json::from_value(value).context("invalid [channels.twitter] section")
}

fn check(explicit: Option<&Path>) -> Result<()> {
    match config_path(explicit) {
        Some(path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("No config file found; checking defaults.\n"),
    }

    let config = load(explicit)?;
    let twitter = twitter_config(&config)?;
    let mode = AuthMode::select(&twitter.credentials)?;

    eprintln!("  relay endpoint: {}", config.server.addr());
    eprintln!(
        "  auth mode:      {}",
        if mode.is_user_context() {
            "user context (OAuth 1.0a)"
        } else {
            "app-only (bearer token)"
        }
    );
    match &twitter.relay_url {
        Some(url) => eprintln!("  relay_url:      {url}"),
        None => eprintln!("  relay_url:      (none, turns run in-process)"),
    }
    eprintln!("\nNo issues found.");
    Ok(())
}
