//! Client configuration.
//!
//! Loaded from `client_config.json`, with `XS_CONFIG_PATH` pointing at an
//! override file.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use crate::queue::{OverflowPolicy, TruthQueue};
use crate::view::ViewConfig;

pub const BUILTIN_CLIENT_CONFIG: &str = include_str!("data/client_config.json");

pub const CONFIG_PATH_ENV: &str = "XS_CONFIG_PATH";

pub const DEFAULT_TRUTH_PORT: u16 = 6601;
pub const DEFAULT_ENVIRONMENT_PORT: u16 = 6602;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub truth_port: u16,
    pub environment_port: u16,
    pub connect_timeout_ms: u64,
    /// Also bounds how long shutdown waits on a stalled writer.
    pub write_timeout_ms: u64,
    pub tick_interval_ms: u64,
    pub writer_poll_ms: u64,
    pub outbound_capacity: usize,
    pub outbound_overflow: OverflowPolicy,
    pub inbound_capacity: Option<usize>,
    pub stale_after_ticks: Option<u64>,
    pub reconnect_delay_ms: u64,
    pub view: ViewConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            truth_port: DEFAULT_TRUTH_PORT,
            environment_port: DEFAULT_ENVIRONMENT_PORT,
            connect_timeout_ms: 5000,
            write_timeout_ms: 2000,
            tick_interval_ms: 50,
            writer_poll_ms: 1,
            outbound_capacity: 256,
            outbound_overflow: OverflowPolicy::DropOldest,
            inbound_capacity: None,
            stale_after_ticks: None,
            reconnect_delay_ms: 2000,
            view: ViewConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn builtin() -> Self {
        serde_json::from_str(BUILTIN_CLIENT_CONFIG).expect("builtin client config should parse")
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = ClientConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }

    /// `None` disables the timeout.
    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn writer_poll(&self) -> Duration {
        Duration::from_millis(self.writer_poll_ms.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn inbound_queue(&self) -> TruthQueue {
        TruthQueue::with_limits(self.inbound_capacity, OverflowPolicy::Block)
    }

    pub fn outbound_queue(&self) -> TruthQueue {
        TruthQueue::bounded(self.outbound_capacity, self.outbound_overflow)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse client config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read client config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where the active configuration came from.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigMetadata {
    path: Option<PathBuf>,
}

impl ClientConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// `None` when the builtin configuration is in use.
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Load the file named by `XS_CONFIG_PATH`, falling back to the builtin
/// configuration when the variable is unset or the file is unusable.
pub fn load_client_config_from_env() -> (ClientConfig, ClientConfigMetadata) {
    load_client_config(env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
}

pub fn load_client_config(path: Option<PathBuf>) -> (ClientConfig, ClientConfigMetadata) {
    if let Some(path) = path {
        match ClientConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "xs::config",
                    path = %path.display(),
                    "client_config.loaded=file"
                );
                return (config, ClientConfigMetadata::new(Some(path)));
            }
            Err(err) => {
                tracing::warn!(
                    target: "xs::config",
                    path = %path.display(),
                    error = %err,
                    "client_config.load_failed"
                );
            }
        }
    }

    let config = ClientConfig::builtin();
    tracing::info!(target: "xs::config", "client_config.loaded=builtin");
    (config, ClientConfigMetadata::new(None))
}
