//! DAL configuration via `dal.toml`
//!
//! A single flat config file read once at start-up. `DalConfig::apply`
//! installs it as the process-wide default; sessions and coordinators read the
//! active values through [`DalConfig::current`].

use crate::error::{DalError, DalResult};
use crate::idgen;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "dal.toml";

static ACTIVE: RwLock<DalConfig> = parking_lot::const_rwlock(DalConfig::DEFAULT);

/// DAL configuration loaded from `dal.toml`.
///
/// # Example
///
/// ```toml
/// random_string_id_length = 16
/// transaction_attempts = 3
/// retry_base_delay_ms = 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DalConfig {
    /// Length of generated random string IDs
    pub random_string_id_length: usize,
    /// Transaction attempts when the options don't say
    pub transaction_attempts: u32,
    /// Attempts of insert-with-generated-ID when the options don't say
    pub insert_max_attempts: u32,
    /// First back-off between transaction attempts, doubled each retry
    pub retry_base_delay_ms: u64,
    /// Back-off ceiling
    pub retry_max_delay_ms: u64,
}

impl DalConfig {
    /// Built-in defaults
    pub const DEFAULT: DalConfig = DalConfig {
        random_string_id_length: idgen::DEFAULT_RANDOM_STRING_ID_LENGTH,
        transaction_attempts: 1,
        insert_max_attempts: 10,
        retry_base_delay_ms: 0,
        retry_max_delay_ms: 100,
    };

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# DAL configuration
#
# Length of generated random string IDs (default: 16)
random_string_id_length = 16

# How many times a transaction is attempted when it hits a write conflict
# and the caller did not pass an explicit attempts option (default: 1)
transaction_attempts = 1

# How many IDs insert-with-generated-ID tries before giving up (default: 10)
insert_max_attempts = 10

# Back-off between transaction attempts: base * 2^retry, capped at max
retry_base_delay_ms = 0
retry_max_delay_ms = 100
"#
    }

    /// Parse and validate config from a TOML string.
    pub fn from_toml_str(content: &str) -> DalResult<Self> {
        let config: DalConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> DalResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DalError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            DalError::Config(msg) => {
                DalError::Config(format!("config file '{}': {}", path.display(), msg))
            }
            other => other,
        })?;
        debug!(target: "dal::config", path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> DalResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
            debug!(target: "dal::config", path = %path.display(), "wrote default configuration");
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> DalResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> DalResult<()> {
        if self.random_string_id_length == 0 {
            return Err(DalError::Config(
                "random_string_id_length must be greater than zero".into(),
            ));
        }
        if self.transaction_attempts == 0 {
            return Err(DalError::Config(
                "transaction_attempts must be greater than zero".into(),
            ));
        }
        if self.insert_max_attempts == 0 {
            return Err(DalError::Config(
                "insert_max_attempts must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Install this config as the process-wide default
    pub fn apply(&self) -> DalResult<()> {
        self.validate()?;
        idgen::set_default_random_string_id_length(self.random_string_id_length)?;
        *ACTIVE.write() = self.clone();
        debug!(target: "dal::config", config = ?self, "applied configuration");
        Ok(())
    }

    /// The config installed by the last `apply`, or the defaults
    pub fn current() -> DalConfig {
        ACTIVE.read().clone()
    }

    /// Back-off before retry number `retry` (0-based)
    pub fn retry_delay(&self, retry: u32) -> Duration {
        let delay = self
            .retry_base_delay_ms
            .saturating_mul(1u64 << retry.min(20));
        Duration::from_millis(delay.min(self.retry_max_delay_ms))
    }
}

impl Default for DalConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
