//! Configuration management

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

/// Well-known port every wireless node listens on for command datagrams.
pub const DEFAULT_WIRELESS_PORT: u16 = 5555;

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Node registry store (read-only for this service).
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,

    #[serde(default)]
    pub helper: HelperConfig,

    #[serde(default = "default_wireless_port")]
    pub wireless_port: u16,
}

/// Command line for the wired-node helper process.
#[derive(Debug, Clone, Deserialize)]
pub struct HelperConfig {
    #[serde(default = "default_helper_command")]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            command: default_helper_command(),
            args: Vec::new(),
        }
    }
}

pub fn get_config_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "open-horizon-labs", "dmx-bridge")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_registry_path() -> PathBuf {
    get_config_dir().join("nodes.json")
}

fn default_wireless_port() -> u16 {
    DEFAULT_WIRELESS_PORT
}

fn default_helper_command() -> String {
    "dmx-helper".to_string()
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let config = ::config::Config::builder()
        // Load from config file if it exists
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy())
                .required(false),
        )
        // Override with environment variables (DMX_REGISTRY_PATH, DMX_HELPER__COMMAND, etc.)
        .add_source(
            ::config::Environment::with_prefix("DMX")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}
