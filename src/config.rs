//! Configuration - JSON file with serde defaults

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::identicon::ShortSeedPolicy;
use crate::transcript::ChatModel;

/// 0.01 ether.
pub const DEFAULT_MINT_PRICE_WEI: u128 = 10_000_000_000_000_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// How validation violations affect the outcome.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    #[default]
    Block,
    Warn,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    #[serde(default)]
    pub default_model: ChatModel,
    #[serde(default = "default_mint_price", with = "wei_string")]
    pub mint_price_wei: u128,
    #[serde(default)]
    pub short_seed_policy: ShortSeedPolicy,
    #[serde(default)]
    pub failure_mode: FailureMode,
}

fn default_gateway_url() -> String { "https://ipfs.io/ipfs/".to_string() }
fn default_mint_price() -> u128 { DEFAULT_MINT_PRICE_WEI }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            default_model: ChatModel::default(),
            mint_price_wei: DEFAULT_MINT_PRICE_WEI,
            short_seed_policy: ShortSeedPolicy::default(),
            failure_mode: FailureMode::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`; a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path: display, source })
    }
}

// Wei amounts overflow JSON numbers in most clients.
mod wei_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
