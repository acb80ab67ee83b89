//! # Runtime Configuration
//!
//! Defaults, overridable from the environment.
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `CONDUIT_APP_CONFIG` | `app_config` | none |
//! | `CONDUIT_MODULE_DIR` | `module_dir` | none |
//! | `CONDUIT_WAIT_TIMEOUT_MS` | `wait_timeout` | 5000 ms |
//! | `CONDUIT_EVENT_CAPACITY` | `event_capacity` | 1000 |
//! | `CONDUIT_MAX_CASCADE_ROUNDS` | `max_cascade_rounds` | components + 1 |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use cd_04_lifecycle::ManagerSettings;
use thiserror::Error;
use tracing::warn;

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Application configuration document launched at startup.
    pub app_config: Option<PathBuf>,
    /// Directory scanned for module manifests (`*.json`).
    pub module_dir: Option<PathBuf>,
    /// How long the manager waits for one transition.
    pub wait_timeout: Duration,
    /// Event bus capacity.
    pub event_capacity: usize,
    pub max_cascade_rounds: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            app_config: None,
            module_dir: None,
            wait_timeout: Duration::from_millis(5000),
            event_capacity: 1000,
            max_cascade_rounds: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Transition wait timeout must be greater than zero")]
    ZeroWaitTimeout,

    #[error("Event bus capacity must be greater than zero")]
    ZeroEventCapacity,

    #[error("Cascade round bound must be greater than zero")]
    ZeroCascadeRounds,
}

impl RuntimeConfig {
    /// Defaults overridden by `CONDUIT_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns. Values that do not
    /// parse are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("CONDUIT_APP_CONFIG").filter(|v| !v.is_empty()) {
            config.app_config = Some(PathBuf::from(path));
        }
        if let Some(dir) = lookup("CONDUIT_MODULE_DIR").filter(|v| !v.is_empty()) {
            config.module_dir = Some(PathBuf::from(dir));
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "CONDUIT_WAIT_TIMEOUT_MS") {
            config.wait_timeout = Duration::from_millis(ms);
        }
        if let Some(capacity) = parse_var(&lookup, "CONDUIT_EVENT_CAPACITY") {
            config.event_capacity = capacity;
        }
        if let Some(rounds) = parse_var(&lookup, "CONDUIT_MAX_CASCADE_ROUNDS") {
            config.max_cascade_rounds = Some(rounds);
        }
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait_timeout.is_zero() {
            return Err(ConfigError::ZeroWaitTimeout);
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroEventCapacity);
        }
        if self.max_cascade_rounds == Some(0) {
            return Err(ConfigError::ZeroCascadeRounds);
        }
        Ok(())
    }

    /// Lifecycle manager settings derived from this configuration.
    #[must_use]
    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            wait_timeout: self.wait_timeout,
            max_cascade_rounds: self.max_cascade_rounds,
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring unparsable environment value");
            None
        }
    }
}
