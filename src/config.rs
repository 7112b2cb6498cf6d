use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{Error, Merchant};

/// Ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Longest wait for a row lock before the unit gives up (ms)
    pub lock_timeout_ms: u64,

    /// Fresh card numbers tried before card creation fails
    pub card_number_attempts: u32,

    /// Merchants seeded at startup
    pub merchants: Vec<Merchant>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            card_number_attempts: 8,
            merchants: vec![
                Merchant::new("amazon", "Amazon", "Shopping", "Money Trail"),
                Merchant::new("apple", "Apple", "Technology", "Lotsa Money Trail"),
                Merchant::new(
                    "mcdonalds",
                    "Mcdonalds",
                    "Food & Drink",
                    "Less Money Trail, but still got Money",
                ),
            ],
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.lock_timeout_ms == 0 {
            return Err(Error::Config("lock_timeout_ms must be positive".to_string()));
        }
        if self.card_number_attempts == 0 {
            return Err(Error::Config("card_number_attempts must be positive".to_string()));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
