use std::{fmt, io, path::PathBuf};

use thiserror::Error;

use crate::process::ExitInfo;

/// Which required file was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Binary,
    Config,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Binary => write!(f, "server binary"),
            ArtifactKind::Config => write!(f, "config file"),
        }
    }
}

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Executable not found at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to launch {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("{kind} not found at {}", path.display())]
    MissingArtifact { kind: ArtifactKind, path: PathBuf },

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("Server exited during startup ({exit})")]
    ReadinessTimeout { exit: ExitInfo },

    #[error("Supervisor worker is not running")]
    WorkerUnavailable,
}

/// Orphan cleanup failures. Logged and swallowed, never returned to callers.
#[derive(Error, Debug)]
pub enum OrphanError {
    #[error("Failed to scan for orphaned processes: {0}")]
    Scan(#[source] io::Error),

    #[error("Failed to kill orphaned process {pid}: {source}")]
    Kill {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_artifact_message_names_path() {
        let err = SupervisorError::MissingArtifact {
            kind: ArtifactKind::Config,
            path: PathBuf::from("/opt/app/config.yaml"),
        };
        assert_eq!(err.to_string(), "config file not found at /opt/app/config.yaml");
    }

    #[test]
    fn test_launch_error_is_transparent() {
        let err: SupervisorError = LaunchError::NotFound {
            path: PathBuf::from("/nope"),
        }
        .into();
        assert_eq!(err.to_string(), "Executable not found at /nope");
    }

    #[test]
    fn test_readiness_timeout_reports_exit() {
        let err = SupervisorError::ReadinessTimeout {
            exit: ExitInfo::from_code(3),
        };
        assert_eq!(err.to_string(), "Server exited during startup (exit code 3)");
    }
}
