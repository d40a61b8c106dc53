//! Scanner module containing the sweep scheduler and its helpers

pub mod engine;
pub mod results;

use crate::error::SweepError;
use crate::network::HostAddress;
use crate::ping::PingStats;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub use engine::ScanSession;
pub use results::ResultStore;

/// Upper bound on the work queue capacity.
///
/// Large subnets with few workers produce partition sizes far beyond what a
/// channel can allocate; the queue only provides back-pressure, so capping
/// it does not change which hosts get probed.
pub const MAX_QUEUE_CAPACITY: usize = 1 << 16;

/// Lifecycle of a [`ScanSession`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanState {
    /// Options validated, enumeration not started
    Created,
    /// Producer feeding the queue while workers drain it
    Dispatching,
    /// Queue closed, workers finishing in-flight probes
    Draining,
    /// Workers joined and results flattened
    Completed,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanState::Created => "created",
            ScanState::Dispatching => "dispatching",
            ScanState::Draining => "draining",
            ScanState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Host counts derived from a completed sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
}

impl ScanSummary {
    pub fn from_results(results: &HashMap<String, PingStats>) -> Self {
        let online = results.values().filter(|stats| stats.is_online()).count();
        Self {
            total: results.len(),
            online,
            offline: results.len() - online,
        }
    }
}

/// Per-worker queue capacity: `ceil(total_hosts / workers)`.
///
/// Fails when the result does not fit in `usize`, which only happens for
/// the very largest IPv6 blocks.
pub fn max_partition_size(total_hosts: u128, workers: usize) -> crate::Result<usize> {
    if workers == 0 {
        return Err(SweepError::Config(
            "number of partitions must be greater than zero".to_string(),
        ));
    }

    let divisor = workers as u128;
    let mut size = total_hosts / divisor;
    if total_hosts % divisor != 0 {
        size += 1;
    }

    usize::try_from(size).map_err(|_| SweepError::PartitionOverflow { total_hosts, workers })
}

/// Results ordered by ascending address; keys that are not addresses sort last
pub fn sort_by_address(results: &HashMap<String, PingStats>) -> Vec<(String, PingStats)> {
    let mut entries: Vec<(Option<HostAddress>, &String, &PingStats)> = results
        .iter()
        .map(|(key, stats)| (key.parse::<HostAddress>().ok(), key, stats))
        .collect();

    entries.sort_by(|a, b| match (&a.0, &b.0) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.1.cmp(b.1),
    });

    entries
        .into_iter()
        .map(|(_, key, stats)| (key.clone(), *stats))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_sizes() {
        assert_eq!(max_partition_size(256, 10).unwrap(), 26);
        assert_eq!(max_partition_size(256, 256).unwrap(), 1);
        assert_eq!(max_partition_size(1, 1).unwrap(), 1);
        assert_eq!(max_partition_size(8, 4).unwrap(), 2);
        assert_eq!(max_partition_size(2, 8).unwrap(), 1);
    }

    #[test]
    fn test_partition_overflow() {
        let err = max_partition_size(u128::MAX, 1).unwrap_err();
        assert!(matches!(err, SweepError::PartitionOverflow { workers: 1, .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_partition_zero_workers() {
        assert!(max_partition_size(16, 0).is_err());
    }

    #[test]
    fn test_summary_counts() {
        let mut results = HashMap::new();
        results.insert(
            "10.0.0.1".to_string(),
            PingStats {
                packets_sent: 1,
                packets_recv: 1,
                ..Default::default()
            },
        );
        results.insert("10.0.0.2".to_string(), PingStats::default());

        let summary = ScanSummary::from_results(&results);
        assert_eq!(summary, ScanSummary { total: 2, online: 1, offline: 1 });
    }

    #[test]
    fn test_sort_by_address_is_numeric() {
        let mut results = HashMap::new();
        for key in ["10.0.0.10", "10.0.0.9", "10.0.0.100", "garbage"] {
            results.insert(key.to_string(), PingStats::default());
        }

        let keys: Vec<String> = sort_by_address(&results).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["10.0.0.9", "10.0.0.10", "10.0.0.100", "garbage"]);
    }
}
