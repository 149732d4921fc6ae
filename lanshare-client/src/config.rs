use std::{
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Args;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bound for the optional JSON config file; a real one is a few hundred bytes.
pub const MAX_CONFIG_BYTES: u64 = 64 * 1024;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_MAX_OFFER_BYTES: u64 = 10 * 1024 * 1024;

/// Independent cadences of the periodic triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub messages: Duration,
    /// Roster and block list are polled together.
    pub roster: Duration,
    pub transfers: Duration,
    pub liveness: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            messages: Duration::from_millis(2_000),
            roster: Duration::from_millis(3_000),
            transfers: Duration::from_millis(3_000),
            liveness: Duration::from_millis(5_000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub messages_ms: u64,
    pub roster_ms: u64,
    pub transfers_ms: u64,
    pub liveness_ms: u64,
    pub request_timeout_ms: u64,
    pub max_offer_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let intervals = PollIntervals::default();
        Self {
            server_url: DEFAULT_SERVER_URL.to_owned(),
            messages_ms: intervals.messages.as_millis() as u64,
            roster_ms: intervals.roster.as_millis() as u64,
            transfers_ms: intervals.transfers.as_millis() as u64,
            liveness_ms: intervals.liveness.as_millis() as u64,
            request_timeout_ms: 4_000,
            max_offer_bytes: DEFAULT_MAX_OFFER_BYTES,
        }
    }
}

impl ClientConfig {
    pub fn poll_intervals(&self) -> PollIntervals {
        PollIntervals {
            messages: Duration::from_millis(self.messages_ms),
            roster: Duration::from_millis(self.roster_ms),
            transfers: Duration::from_millis(self.transfers_ms),
            liveness: Duration::from_millis(self.liveness_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::EmptyServerUrl);
        }
        let periods = [
            ("messages", self.messages_ms),
            ("roster", self.roster_ms),
            ("transfers", self.transfers_ms),
            ("liveness", self.liveness_ms),
            ("request timeout", self.request_timeout_ms),
        ];
        if let Some(&(name, _)) = periods.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::ZeroPeriod(name));
        }
        if self.max_offer_bytes == 0 {
            return Err(ConfigError::ZeroOfferLimit);
        }
        Ok(())
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// Base URL of the peer's local HTTP interface.
    #[arg(long)]
    pub server_url: Option<String>,
    #[arg(long)]
    pub messages_ms: Option<u64>,
    #[arg(long)]
    pub roster_ms: Option<u64>,
    #[arg(long)]
    pub transfers_ms: Option<u64>,
    #[arg(long)]
    pub liveness_ms: Option<u64>,
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,
    #[arg(long)]
    pub max_offer_bytes: Option<u64>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut ClientConfig) {
        if let Some(url) = &self.server_url {
            config.server_url = url.clone();
        }
        let numeric = [
            (self.messages_ms, &mut config.messages_ms),
            (self.roster_ms, &mut config.roster_ms),
            (self.transfers_ms, &mut config.transfers_ms),
            (self.liveness_ms, &mut config.liveness_ms),
            (self.request_timeout_ms, &mut config.request_timeout_ms),
            (self.max_offer_bytes, &mut config.max_offer_bytes),
        ];
        for (value, slot) in numeric {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config {path} is {size} bytes, over the {max} byte limit")]
    TooLarge { path: PathBuf, size: u64, max: u64 },
    #[error("config {path}: parse failed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("server url must not be empty")]
    EmptyServerUrl,
    #[error("{0} period must be greater than zero")]
    ZeroPeriod(&'static str),
    #[error("max offer size must be greater than zero")]
    ZeroOfferLimit,
}

pub fn parse_config_json(data: &str) -> Result<ClientConfig, serde_json::Error> {
    serde_json::from_str::<ClientConfig>(data)
}

/// Reads the JSON config file, refusing anything over [`MAX_CONFIG_BYTES`].
///
/// The size is taken from the open handle, and the read itself is bounded so a
/// file that grows after the check still cannot exceed the cap.
pub fn load_config_from_path(path: &Path) -> Result<ClientConfig, ConfigError> {
    let read_err = |source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    };
    let too_large = |size| ConfigError::TooLarge {
        path: path.to_path_buf(),
        size,
        max: MAX_CONFIG_BYTES,
    };

    let file = File::open(path).map_err(read_err)?;
    let size = file.metadata().map_err(read_err)?.len();
    if size > MAX_CONFIG_BYTES {
        return Err(too_large(size));
    }

    let mut data = String::new();
    let read = file
        .take(MAX_CONFIG_BYTES + 1)
        .read_to_string(&mut data)
        .map_err(read_err)? as u64;
    if read > MAX_CONFIG_BYTES {
        return Err(too_large(read));
    }
    parse_config_json(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Config file (if any) with command-line overrides applied, validated.
pub fn resolve_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<ClientConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config_from_path(path)?,
        None => ClientConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}
