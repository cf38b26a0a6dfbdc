use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;
use config::{builder::DefaultState, ConfigBuilder, ConfigError, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const DEFAULT_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_API_URL: &str = "https://api.mercadolibre.com";
const DEFAULT_SITE_ID: &str = "MLB";
const DEFAULT_PAGE_SIZE: usize = 50;
const CONFIG_FILE_NAME: &str = "config.toml";

/// Upper bound on pages fetched per search, whatever the configuration says.
/// Also the default number of pages.
pub(crate) const PAGE_LIMIT: usize = 10;

#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// Path to the local configuration TOML file.
    #[arg(short, value_name = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Path to the certificate file.
    #[arg(long, value_name = "CERT_PATH", requires = "key")]
    pub cert: Option<PathBuf>,

    /// Path to the key file.
    #[arg(long, value_name = "KEY_PATH", requires = "cert")]
    pub key: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Web {
    #[serde(deserialize_with = "deserialize_socket_addr")]
    pub address: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Marketplace {
    pub api_url: String,
    pub site_id: String,
    pub page_size: usize,
    pub max_pages: usize,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Marketplace {
    /// Number of pages one search walks through.
    pub fn pages(&self) -> usize {
        self.max_pages.min(PAGE_LIMIT)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for Marketplace {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            site_id: DEFAULT_SITE_ID.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: PAGE_LIMIT,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    pub web: Web,
    pub marketplace: Marketplace,
}

impl Settings {
    /// Load settings from the given TOML file, with sane defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let cfg = defaults()?.add_source(File::from(path)).build()?;

        cfg.try_deserialize()
    }

    /// Settings made of the built-in defaults only.
    pub fn from_defaults() -> Result<Self, ConfigError> {
        defaults()?.build()?.try_deserialize()
    }

    /// Loads `path` if given, then the per-user config file if it exists,
    /// falling back to the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Self::from_defaults(),
        }
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    ConfigBuilder::<DefaultState>::default()
        .set_default("web.address", DEFAULT_ADDR)?
        .set_default("marketplace.api_url", DEFAULT_API_URL)?
        .set_default("marketplace.site_id", DEFAULT_SITE_ID)?
        .set_default("marketplace.page_size", DEFAULT_PAGE_SIZE as u64)?
        .set_default("marketplace.max_pages", PAGE_LIMIT as u64)
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "mercado", "mercado-dashboard-server")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn deserialize_socket_addr<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}
