//! Configuration module for netsweep sessions

use crate::error::SweepError;
use crate::ping::PingerKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Name of the per-user configuration file looked up in the home directory
pub const CONFIG_FILE_NAME: &str = ".netsweep.toml";

/// Default number of echo requests per host
pub const DEFAULT_COUNT: i64 = 3;

/// Default per-host timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: i64 = 300;

/// User-facing options for a sweep.
///
/// Numeric fields are signed so that negative values coming from a config
/// file or the command line reach [`Options::validate`] and are rejected
/// there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Subnet to sweep, in CIDR notation
    pub subnet: String,

    /// Number of echo requests sent to each host
    pub count: i64,

    /// Spacing between echo requests in milliseconds
    pub interval_ms: i64,

    /// Per-host timeout in milliseconds, 0 for no explicit timeout
    pub timeout_ms: i64,

    /// Number of concurrent workers
    pub max_workers: i64,

    /// Which pinger implementation to use
    pub pinger: PingerKind,

    /// Log level for the command line front-end
    pub log_level: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            subnet: String::new(),
            count: DEFAULT_COUNT,
            interval_ms: 0,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_workers: num_cpus::get() as i64,
            pinger: PingerKind::Auto,
            log_level: None,
        }
    }
}

impl Options {
    /// Create options for a subnet with default settings
    pub fn new(subnet: impl Into<String>) -> Self {
        Self {
            subnet: subnet.into(),
            ..Default::default()
        }
    }

    pub fn with_count(mut self, count: i64) -> Self {
        self.count = count;
        self
    }

    /// Set the interval in milliseconds
    pub fn with_interval(mut self, interval_ms: i64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Set the timeout in milliseconds
    pub fn with_timeout(mut self, timeout_ms: i64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_workers(mut self, max_workers: i64) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_pinger(mut self, pinger: PingerKind) -> Self {
        self.pinger = pinger;
        self
    }

    /// Validate the options, without touching the subnet text beyond emptiness
    pub fn validate(&self) -> crate::Result<()> {
        if self.subnet.trim().is_empty() {
            return Err(SweepError::Config(
                "subnet should be in CIDR notation and cannot be empty".to_string(),
            ));
        }

        if self.count < 1 {
            return Err(SweepError::Config("count should be more than zero (0)".to_string()));
        }

        if self.max_workers < 1 {
            return Err(SweepError::Config("max workers should be more than zero (0)".to_string()));
        }

        if self.timeout_ms < 0 {
            return Err(SweepError::Config("timeout cannot be negative".to_string()));
        }

        if self.interval_ms < 0 {
            return Err(SweepError::Config("interval cannot be negative".to_string()));
        }

        Ok(())
    }

    /// Interval as a Duration, negative values clamp to zero
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(0) as u64)
    }

    /// Timeout as a Duration, negative values clamp to zero
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(0) as u64)
    }

    /// Load options from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SweepError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| SweepError::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load options from `~/.netsweep.toml`, falling back to defaults
    pub fn load_default() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let config_path = home_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            match Self::from_toml_file(&config_path) {
                Ok(options) => {
                    log::info!("Loaded config from {}", config_path.display());
                    return options;
                }
                Err(e) => log::warn!("Ignoring {}: {}", config_path.display(), e),
            }
        }

        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid_with_subnet() {
        let options = Options::new("10.0.0.0/30");
        assert!(options.validate().is_ok());
        assert_eq!(options.count, DEFAULT_COUNT);
        assert_eq!(options.timeout(), Duration::from_millis(300));
        assert!(options.max_workers >= 1);
    }

    #[test]
    fn test_each_bad_field_is_rejected() {
        let base = Options::new("10.0.0.0/30").with_max_workers(2);

        assert!(Options::new("").validate().is_err());
        assert!(base.clone().with_count(0).validate().is_err());
        assert!(base.clone().with_count(-1).validate().is_err());
        assert!(base.clone().with_max_workers(0).validate().is_err());
        assert!(base.clone().with_max_workers(-2).validate().is_err());
        assert!(base.clone().with_timeout(-1).validate().is_err());
        assert!(base.clone().with_interval(-5).validate().is_err());
        assert!(base.with_timeout(0).with_interval(0).validate().is_ok());
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "subnet = \"192.168.1.0/28\"\ncount = 2\ninterval_ms = 50\nmax_workers = 4\npinger = \"mock\""
        )
        .unwrap();

        let options = Options::from_toml_file(file.path()).unwrap();
        assert_eq!(options.subnet, "192.168.1.0/28");
        assert_eq!(options.count, 2);
        assert_eq!(options.interval(), Duration::from_millis(50));
        assert_eq!(options.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(options.max_workers, 4);
        assert_eq!(options.pinger, PingerKind::Mock);
    }

    #[test]
    fn test_from_toml_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "count = \"many\"").unwrap();
        assert!(Options::from_toml_file(file.path()).is_err());
        assert!(Options::from_toml_file("/nonexistent/netsweep.toml").is_err());
    }
}
