use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::{ArtifactKind, SupervisorError};

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_LOG_CAPACITY: usize = 1000;
pub const DEFAULT_READINESS_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_GRACEFUL_TIMEOUT: Duration = Duration::from_millis(2000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_ORPHAN_SETTLE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_AUTH_DECISION_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_AUTH_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Where the server lives and how patiently it is supervised.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub binary_path: PathBuf,
    pub config_path: PathBuf,
    pub log_capacity: usize,
    pub readiness_delay: Duration,
    pub graceful_timeout: Duration,
    pub poll_interval: Duration,
    pub orphan_settle_delay: Duration,
    pub auth_decision_delay: Duration,
    pub auth_settle_delay: Duration,
}

impl SupervisorConfig {
    pub fn new(binary_path: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            config_path: config_path.into(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            readiness_delay: DEFAULT_READINESS_DELAY,
            graceful_timeout: DEFAULT_GRACEFUL_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            orphan_settle_delay: DEFAULT_ORPHAN_SETTLE_DELAY,
            auth_decision_delay: DEFAULT_AUTH_DECISION_DELAY,
            auth_settle_delay: DEFAULT_AUTH_SETTLE_DELAY,
        }
    }

    /// `<dir>/<binary_name>` and `<dir>/config.yaml`.
    pub fn from_resource_dir(dir: impl AsRef<Path>, binary_name: &str) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(binary_name), dir.join(DEFAULT_CONFIG_FILE))
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    pub fn with_readiness_delay(mut self, delay: Duration) -> Self {
        self.readiness_delay = delay;
        self
    }

    pub fn with_graceful_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_orphan_settle_delay(mut self, delay: Duration) -> Self {
        self.orphan_settle_delay = delay;
        self
    }

    pub fn with_auth_decision_delay(mut self, delay: Duration) -> Self {
        self.auth_decision_delay = delay;
        self
    }

    pub fn with_auth_settle_delay(mut self, delay: Duration) -> Self {
        self.auth_settle_delay = delay;
        self
    }

    /// File name used to find orphaned instances of the server.
    pub fn binary_name(&self) -> String {
        self.binary_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.binary_path.to_string_lossy().into_owned())
    }

    /// Both the binary and its config file must exist before anything is
    /// spawned.
    pub fn validate_artifacts(&self) -> Result<(), SupervisorError> {
        if !self.binary_path.is_file() {
            return Err(SupervisorError::MissingArtifact {
                kind: ArtifactKind::Binary,
                path: self.binary_path.clone(),
            });
        }
        if !self.config_path.is_file() {
            return Err(SupervisorError::MissingArtifact {
                kind: ArtifactKind::Config,
                path: self.config_path.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = SupervisorConfig::new("/opt/app/server", "/opt/app/config.yaml");
        assert_eq!(config.log_capacity, 1000);
        assert_eq!(config.readiness_delay, Duration::from_secs(1));
        assert_eq!(config.graceful_timeout, Duration::from_secs(2));
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.binary_name(), "server");
    }

    #[test]
    fn test_from_resource_dir() {
        let config = SupervisorConfig::from_resource_dir("/res", "proxy");
        assert_eq!(config.binary_path, PathBuf::from("/res/proxy"));
        assert_eq!(config.config_path, PathBuf::from("/res/config.yaml"));
    }

    #[test]
    fn test_validate_reports_missing_binary_first() {
        let dir = tempdir().unwrap();
        let config = SupervisorConfig::from_resource_dir(dir.path(), "server");
        assert!(matches!(
            config.validate_artifacts(),
            Err(SupervisorError::MissingArtifact {
                kind: ArtifactKind::Binary,
                ..
            })
        ));
    }

    #[test]
    fn test_validate_reports_missing_config() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("server"), "").unwrap();
        let config = SupervisorConfig::from_resource_dir(dir.path(), "server");
        assert!(matches!(
            config.validate_artifacts(),
            Err(SupervisorError::MissingArtifact {
                kind: ArtifactKind::Config,
                ..
            })
        ));

        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "port: 8317\n").unwrap();
        assert!(config.validate_artifacts().is_ok());
    }
}
