//! Operator settings.
//!
//! An optional TOML file (default `~/.cinder/treasury.toml`) supplies the
//! gateway endpoint, file locations and the confirmation timeout. Command
//! line flags win over the file; the deployment record's `network` is the
//! last resort for the endpoint.

use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use cinder_supply::{ledger::EngineOptions, record::DeploymentRecord};

/// Deployment record looked up in the working directory when no path is set.
pub const DEFAULT_DEPLOYMENT_FILE: &str = "deployment-info.json";

/// Gateway endpoint of a local development ledger.
pub const LOCALNET_URL: &str = "http://127.0.0.1:8899";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse settings from {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid settings in {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("no gateway endpoint for network {0:?}; set rpc_url or pass --rpc-url")]
    UnknownNetwork(String),
}

/// Contents of `treasury.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Gateway endpoint, overriding the deployment record's network.
    pub rpc_url: Option<String>,

    /// Path to the deployment record.
    pub deployment: Option<PathBuf>,

    /// Path to the treasury key file.
    pub keypair: Option<PathBuf>,

    /// Seconds to wait for each confirmation.
    pub confirm_timeout_secs: u64,

    /// Directory holding harvest-cycle lease files.
    pub lock_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: None,
            deployment: None,
            keypair: None,
            confirm_timeout_secs: default_confirm_timeout_secs(),
            lock_dir: None,
        }
    }
}

fn default_confirm_timeout_secs() -> u64 {
    60
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if settings.confirm_timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                path: path.to_path_buf(),
                reason: "confirm_timeout_secs must be at least 1".to_string(),
            });
        }
        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            confirm_timeout: Duration::from_secs(self.confirm_timeout_secs),
        }
    }

    /// Deployment record path: flag, then settings, then the working
    /// directory.
    pub fn deployment_path(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.deployment.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEPLOYMENT_FILE))
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.lock_dir
            .clone()
            .unwrap_or_else(|| default_data_dir().join("locks"))
    }

    /// Gateway endpoint: flag, then settings, then the record's network.
    pub fn endpoint(
        &self,
        flag: Option<&str>,
        record: &DeploymentRecord,
    ) -> Result<String, SettingsError> {
        if let Some(url) = flag.or(self.rpc_url.as_deref()) {
            return Ok(url.to_string());
        }
        network_endpoint(&record.network)
            .ok_or_else(|| SettingsError::UnknownNetwork(record.network.clone()))
    }
}

/// Map a deployment record's network field to a gateway URL.
pub fn network_endpoint(network: &str) -> Option<String> {
    if network.starts_with("http://") || network.starts_with("https://") {
        return Some(network.to_string());
    }
    match network {
        "localnet" | "localhost" => Some(LOCALNET_URL.to_string()),
        _ => None,
    }
}

/// Get the default data directory (`~/.cinder`).
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".cinder"))
        .unwrap_or_else(|| PathBuf::from(".cinder"))
}

/// Get the default settings file path.
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("treasury.toml")
}
