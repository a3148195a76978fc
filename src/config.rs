//! Runtime configuration.
//!
//! Defaults live in code; `from_env` overrides them from `RPLUS_*`
//! environment variables.

use crate::chain::VerifyMode;
use crate::digest::HashAlgorithm;
use crate::error::ConfigError;
use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;

/// Storage key holding the achievement document.
pub const ACHIEVEMENTS_KEY: &str = "rp_achievements";
/// Event type fired when a subject becomes active.
pub const WELCOME_EVENT: &str = "welcome";
/// Title recorded on the welcome entry.
pub const WELCOME_TITLE: &str = "Welcome to Resource Plus";
/// Points recorded on the welcome entry.
pub const WELCOME_VALUE: i64 = 1;

/// Ledger behaviour knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Digest used to seal and reseal entries.
    pub algorithm: HashAlgorithm,
    /// Checks run by ledger reports.
    pub verify_mode: VerifyMode,
    /// Event types recorded at most once per subject.
    pub idempotent_types: BTreeSet<String>,
    /// Key under which the ledger document is persisted.
    pub storage_key: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            verify_mode: VerifyMode::default(),
            idempotent_types: BTreeSet::from([WELCOME_EVENT.to_string()]),
            storage_key: ACHIEVEMENTS_KEY.to_string(),
        }
    }
}

impl LedgerConfig {
    /// Returns true when `event_type` may be recorded only once per subject.
    pub fn is_idempotent(&self, event_type: &str) -> bool {
        self.idempotent_types.contains(event_type)
    }

    /// Applies `RPLUS_HASH`, `RPLUS_VERIFY` and `RPLUS_IDEMPOTENT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();
        if let Some(raw) = read("RPLUS_HASH") {
            config.algorithm = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RPLUS_HASH",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = read("RPLUS_VERIFY") {
            config.verify_mode = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RPLUS_VERIFY",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = read("RPLUS_IDEMPOTENT") {
            config.idempotent_types = parse_type_list(&raw);
        }
        Ok(config)
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory holding the persisted documents.
    pub data_dir: PathBuf,
    /// Ledger settings.
    pub ledger: LedgerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: env::temp_dir().join("resource_plus"),
            ledger: LedgerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Builds a configuration from defaults and `RPLUS_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = lookup("RPLUS_DATA_DIR")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::default().data_dir);
        Ok(Self {
            data_dir,
            ledger: LedgerConfig::from_lookup(lookup)?,
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn parse_type_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
