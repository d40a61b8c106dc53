//! Error handling for the netsweep engine
//!
//! Two families of errors exist. [`SweepError`] covers everything that can
//! stop a session from being built or run; [`PingError`] covers a single
//! failed echo exchange, which the scheduler absorbs and never propagates.

use thiserror::Error;

/// Main error type for sweep sessions
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Invalid subnet: {0}")]
    InvalidSubnet(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Partition size overflow: {total_hosts} hosts across {workers} workers exceeds the range of usize")]
    PartitionOverflow { total_hosts: u128, workers: usize },

    #[error("Scan session has already been run")]
    AlreadyRun,

    #[error("Worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SweepError {
    /// Whether the error is raised while building a session, before any probe is sent.
    ///
    /// A successful run with no reachable hosts is not an error at all, so
    /// callers can use this to tell a misconfigured sweep from an empty one.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SweepError::InvalidSubnet(_)
                | SweepError::Config(_)
                | SweepError::PartitionOverflow { .. }
        )
    }
}

/// Failure of a single echo exchange against one host
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PingError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Failed to resolve {0}")]
    Resolve(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{0}")]
    Forced(String),
}

impl From<std::io::Error> for PingError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            PingError::Permission(e.to_string())
        } else {
            PingError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(SweepError::InvalidSubnet("x".into()).is_configuration());
        assert!(SweepError::Config("count".into()).is_configuration());
        assert!(SweepError::PartitionOverflow { total_hosts: 1, workers: 1 }.is_configuration());
        assert!(!SweepError::AlreadyRun.is_configuration());
        assert!(!SweepError::Worker("panic".into()).is_configuration());
    }

    #[test]
    fn test_permission_io_error_maps_to_permission() {
        let err: PingError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert!(matches!(err, PingError::Permission(_)));

        let err: PingError = std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into();
        assert!(matches!(err, PingError::Network(_)));
    }
}
