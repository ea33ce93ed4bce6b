//! Command-line and environment configuration.

use std::fmt;
use std::path::PathBuf;

use clap::Parser;

/// BookIt - walk-up reservation service for shared lab resources
#[derive(Parser, Debug, Clone)]
#[command(name = "bookit")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Directory holding objects.txt and reservations.txt
    #[arg(long, env = "BOOKIT_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Address to listen on
    #[arg(long, env = "BOOKIT_BIND", default_value = "127.0.0.1")]
    pub bind: String,

    /// Port for the line protocol
    #[arg(long, env = "BOOKIT_PORT", default_value_t = 9020)]
    pub port: u16,

    /// Concurrent connections before new ones are refused
    #[arg(long, env = "BOOKIT_MAX_CONNECTIONS", default_value_t = 64)]
    pub max_connections: usize,

    /// Serve Prometheus metrics on this port
    #[arg(long, env = "BOOKIT_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Seconds between background compaction passes (0 disables)
    #[arg(long, env = "BOOKIT_COMPACT_INTERVAL", default_value_t = 300)]
    pub compact_interval: u64,
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    DataDirMissing(PathBuf),
    NoConnections,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::DataDirMissing(path) => {
                write!(f, "data directory {} does not exist", path.display())
            }
            ConfigError::NoConnections => write!(f, "max connections must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.data_dir.is_dir() {
            return Err(ConfigError::DataDirMissing(self.data_dir.clone()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::NoConnections);
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
