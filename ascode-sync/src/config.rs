//! Sync configuration, loadable from YAML.
//!
//! ```yaml
//! poller:
//!   interval_secs: 2
//!   timeout_secs: 600
//! pattern: .cds/**/*.yml
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, SyncError};

/// Files requested from the repository for an as-code workflow.
pub const WORKFLOW_AS_CODE_PATTERN: &str = ".cds/**/*.yml";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerConfig {
    #[serde(rename = "interval_secs", with = "secs", default = "default_interval")]
    pub interval: Duration,
    #[serde(rename = "timeout_secs", with = "secs", default = "default_timeout")]
    pub timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

fn default_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_timeout() -> Duration {
    DEFAULT_POLL_TIMEOUT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poller: PollerConfig::default(),
            pattern: default_pattern(),
        }
    }
}

fn default_pattern() -> String {
    WORKFLOW_AS_CODE_PATTERN.to_string()
}

impl SyncConfig {
    /// Read a config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}

mod secs {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        match u64::deserialize(d)? {
            0 => Err(D::Error::custom("must be at least 1 second")),
            n => Ok(Duration::from_secs(n)),
        }
    }
}
