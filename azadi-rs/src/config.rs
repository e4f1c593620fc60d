use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use crate::upstream::{is_valid_upstream, DEFAULT_UPSTREAM};

#[derive(Debug, Parser)]
#[command(
    name = "azadi-rs",
    version,
    about = "DNS-over-HTTPS relay with a settings panel"
)]
pub struct Cli {
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    #[arg(long, short = 'd', value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Default upstream DoH URL used until one is saved through the panel.
    #[arg(long, value_name = "URL")]
    pub upstream: Option<String>,

    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub default_upstream: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid upstream URL {value:?} (from {origin})")]
    InvalidUpstream { value: String, origin: &'static str },
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind: Option<SocketAddr>,
    data_dir: Option<PathBuf>,
    #[serde(alias = "upstream")]
    default_upstream: Option<String>,
}

impl AppConfig {
    /// Merge CLI flags over `AZADI_UPSTREAM`, the config file, and built-in
    /// defaults, in that order of precedence.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let from_file = read_file_config(cli.config.as_deref())?;

        let bind = cli
            .bind
            .or(from_file.bind)
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8453)));
        let data_dir = cli
            .data_dir
            .or(from_file.data_dir)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let (default_upstream, origin) = if let Some(value) = cli.upstream {
            (value, "--upstream")
        } else if let Ok(value) = std::env::var("AZADI_UPSTREAM") {
            (value, "AZADI_UPSTREAM")
        } else if let Some(value) = from_file.default_upstream {
            (value, "config file")
        } else {
            (String::from(DEFAULT_UPSTREAM), "built-in default")
        };

        if !is_valid_upstream(&default_upstream) {
            return Err(ConfigError::InvalidUpstream {
                value: default_upstream,
                origin,
            });
        }

        Ok(Self {
            bind,
            data_dir,
            default_upstream,
        })
    }
}

fn read_file_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}
