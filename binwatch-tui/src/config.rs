//! Console configuration merged from `binwatch.toml` and `BINWATCH_*` env.

use std::path::PathBuf;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

const CONFIG_FILE: &str = "binwatch.toml";
const ENV_PREFIX: &str = "BINWATCH_";

fn default_log_file() -> PathBuf {
    PathBuf::from("binwatch.log")
}

fn default_log_filter() -> String {
    String::from("info")
}

fn default_poll_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum BackendKind {
    /// Fixture data, no network.
    #[default]
    Memory,
    /// Hosted record store; requires the `[remote]` section.
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RemoteSettings {
    /// Base URL of the hosted project.
    pub url: String,
    /// Project API key.
    pub api_key: String,
    /// Change-feed poll interval in seconds.
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AppConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub remote: Option<RemoteSettings>,
    /// The console owns the terminal, so diagnostics go to a file.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// `tracing` filter directive for the log file.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl AppConfig {
    /// Load configuration, env over file, defaults for everything absent.
    pub(crate) fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }
}
