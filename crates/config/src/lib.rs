//! Configuration loading and env substitution.
//!
//! Config files: `chirp.toml`, `chirp.yaml`, `chirp.yml` or `chirp.json`.
//! Searched in `./` then the user config directory (`~/.config/chirp/`).
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{config_dir, discover_and_load, find_config_file, load_config},
    schema::{ChannelsConfig, ChirpConfig, ServerConfig},
};
