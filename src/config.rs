use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Engine tuning knobs. Chain-specific data comes from [`crate::chain`]
/// metadata, not from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub timeouts: TimeoutConfig,
    pub gas: GasConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub account_secs: u64,
    pub simulate_secs: u64,
    pub broadcast_secs: u64,
    pub status_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    /// Multiplier on simulated gas. Values below 1.3 are raised to 1.3 at
    /// use; simulation undershoots real execution.
    pub adjustment: f64,
    /// Gas limit used when simulation is skipped or fails.
    pub fallback_gas_limit: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Optional proxy base URL tried after a direct transport failure.
    #[serde(default)]
    pub proxy_base_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeouts: TimeoutConfig {
                account_secs: 5,
                simulate_secs: 5,
                broadcast_secs: 30,
                status_secs: 5,
            },
            gas: GasConfig {
                adjustment: 1.3,
                fallback_gas_limit: 300_000,
            },
            broadcast: BroadcastConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("failed to read config file: {e}")))?;
        let config: EngineConfig = toml::from_str(&content)
            .map_err(|e| EngineError::Config(format!("failed to parse config: {e}")))?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)
            .map_err(|e| EngineError::Config(format!("failed to write config file: {e}")))?;
        Ok(())
    }

    pub fn account_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.account_secs)
    }

    pub fn simulate_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.simulate_secs)
    }

    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.broadcast_secs)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.status_secs)
    }
}
