//! Ping module: the probe capability used by the sweep engine
//!
//! A [`Pinger`] performs one echo exchange against one host and reduces it
//! to [`PingStats`]. Two implementations ship with the crate:
//! - [`IcmpPinger`]: real ICMP echo over a raw or datagram socket
//! - [`MockPinger`]: deterministic, network-free stand-in for tests and
//!   restricted environments
//!
//! Which one a session uses is always chosen by the caller, either by
//! passing a pinger directly or through [`PingerKind`].

pub mod icmp;
pub mod mock;

pub use icmp::IcmpPinger;
pub use mock::{HostClass, MockHostConfig, MockPinger, MockPingerConfig};

use crate::error::PingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Aggregate result of one echo exchange against a host.
///
/// The zero value doubles as the result recorded for a host whose probe
/// failed, so a failure and "nothing sent, nothing received" look the same.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PingStats {
    /// Average round-trip time
    pub avg_rtt: Duration,

    /// Packet loss percentage (0-100)
    pub packet_loss: f64,

    /// Number of echo requests sent
    pub packets_sent: usize,

    /// Number of echo replies received
    pub packets_recv: usize,

    /// Number of duplicate replies received
    pub packets_recv_duplicates: usize,
}

impl PingStats {
    /// A host counts as online when at least one reply came back
    pub fn is_online(&self) -> bool {
        self.packets_recv > 0
    }
}

/// Full statistics of an echo exchange, including RTT spread
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub packets_recv: usize,
    pub packets_sent: usize,
    pub packets_recv_duplicates: usize,
    pub packet_loss: f64,
    pub avg_rtt: Duration,
    pub min_rtt: Duration,
    pub max_rtt: Duration,
    pub std_dev_rtt: Duration,
}

impl Statistics {
    /// Reduce the round-trip times of an exchange into statistics
    pub fn from_rtts(packets_sent: usize, rtts: &[Duration], duplicates: usize) -> Self {
        let packets_recv = rtts.len();
        let packet_loss = if packets_sent == 0 {
            0.0
        } else {
            packets_sent.saturating_sub(packets_recv) as f64 / packets_sent as f64 * 100.0
        };

        let mut stats = Self {
            packets_recv,
            packets_sent,
            packets_recv_duplicates: duplicates,
            packet_loss,
            ..Default::default()
        };

        if packets_recv == 0 {
            return stats;
        }

        let total: Duration = rtts.iter().sum();
        let avg = total / packets_recv as u32;
        let mean_nanos = avg.as_nanos() as f64;
        let variance = rtts
            .iter()
            .map(|rtt| {
                let diff = rtt.as_nanos() as f64 - mean_nanos;
                diff * diff
            })
            .sum::<f64>()
            / packets_recv as f64;

        stats.avg_rtt = avg;
        stats.min_rtt = rtts.iter().min().copied().unwrap_or_default();
        stats.max_rtt = rtts.iter().max().copied().unwrap_or_default();
        stats.std_dev_rtt = Duration::from_nanos(variance.sqrt() as u64);
        stats
    }
}

impl From<Statistics> for PingStats {
    fn from(stats: Statistics) -> Self {
        Self {
            avg_rtt: stats.avg_rtt,
            packet_loss: stats.packet_loss,
            packets_sent: stats.packets_sent,
            packets_recv: stats.packets_recv,
            packets_recv_duplicates: stats.packets_recv_duplicates,
        }
    }
}

/// Capability to probe one host with a train of echo requests
#[async_trait::async_trait]
pub trait Pinger: Send + Sync {
    /// Send `count` echoes to `target` spaced by `interval`.
    ///
    /// A zero `timeout` means no explicit bound on the exchange.
    async fn ping(
        &self,
        target: &str,
        count: usize,
        interval: Duration,
        timeout: Duration,
    ) -> Result<PingStats, PingError>;

    fn name(&self) -> &str;
}

/// Environment variables set by common CI systems
const CI_ENV_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "CONTINUOUS_INTEGRATION",
    "TRAVIS",
    "CIRCLECI",
    "JENKINS_URL",
    "GITLAB_CI",
    "APPVEYOR",
    "CI_NAME",
    "BUILDKITE",
    "SEMAPHORE",
];

/// Selection of the pinger implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PingerKind {
    /// Real ICMP echo
    Real,
    /// Deterministic synthetic results
    Mock,
    /// Mock under CI, real otherwise
    #[default]
    Auto,
}

impl PingerKind {
    /// Pick a concrete kind from the process environment
    pub fn detect() -> PingerKind {
        Self::detect_with(|name| std::env::var_os(name).map(|v| !v.is_empty()).unwrap_or(false))
    }

    /// Pick a concrete kind using `is_set` to look up environment variables
    pub fn detect_with<F>(is_set: F) -> PingerKind
    where
        F: Fn(&str) -> bool,
    {
        if CI_ENV_VARS.iter().any(|name| is_set(name)) {
            PingerKind::Mock
        } else {
            PingerKind::Real
        }
    }

    /// Replace `Auto` with the kind detected from the environment
    pub fn resolve(self) -> PingerKind {
        match self {
            PingerKind::Auto => Self::detect(),
            kind => kind,
        }
    }

    pub fn build(self) -> Arc<dyn Pinger> {
        match self.resolve() {
            PingerKind::Mock => Arc::new(MockPinger::new()),
            _ => Arc::new(IcmpPinger::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PingerKind::Real => "real",
            PingerKind::Mock => "mock",
            PingerKind::Auto => "auto",
        }
    }
}

impl FromStr for PingerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "real" => Ok(PingerKind::Real),
            "mock" => Ok(PingerKind::Mock),
            "auto" | "" => Ok(PingerKind::Auto),
            other => Err(format!("unknown pinger type: {}", other)),
        }
    }
}

impl fmt::Display for PingerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One-shot real ping of a single host.
///
/// Errors are swallowed and reported as zeroed statistics.
pub async fn run_ping(target: &str, count: usize, interval: Duration, timeout: Duration) -> Statistics {
    match IcmpPinger::new().statistics(target, count, interval, timeout).await {
        Ok(stats) => stats,
        Err(e) => {
            log::debug!("run_ping {} failed: {}", target, e);
            Statistics::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_from_rtts() {
        let rtts = [
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(30),
        ];
        let stats = Statistics::from_rtts(4, &rtts, 1);

        assert_eq!(stats.packets_sent, 4);
        assert_eq!(stats.packets_recv, 3);
        assert_eq!(stats.packets_recv_duplicates, 1);
        assert_eq!(stats.packet_loss, 25.0);
        assert_eq!(stats.avg_rtt, Duration::from_millis(20));
        assert_eq!(stats.min_rtt, Duration::from_millis(10));
        assert_eq!(stats.max_rtt, Duration::from_millis(30));
        // population standard deviation of 10/20/30 ms is ~8.165 ms
        assert!(stats.std_dev_rtt > Duration::from_micros(8100));
        assert!(stats.std_dev_rtt < Duration::from_micros(8200));
    }

    #[test]
    fn test_statistics_with_no_replies() {
        let stats = Statistics::from_rtts(3, &[], 0);
        assert_eq!(stats.packet_loss, 100.0);
        assert_eq!(stats.avg_rtt, Duration::ZERO);

        let pstats = PingStats::from(stats);
        assert!(!pstats.is_online());
        assert_eq!(pstats.packets_sent, 3);
    }

    #[test]
    fn test_pinger_kind_parsing() {
        assert_eq!("mock".parse::<PingerKind>().unwrap(), PingerKind::Mock);
        assert_eq!("REAL".parse::<PingerKind>().unwrap(), PingerKind::Real);
        assert_eq!("auto".parse::<PingerKind>().unwrap(), PingerKind::Auto);
        assert!("fast".parse::<PingerKind>().is_err());
    }

    #[test]
    fn test_detect_with_ci_variables() {
        assert_eq!(PingerKind::detect_with(|name| name == "GITHUB_ACTIONS"), PingerKind::Mock);
        assert_eq!(PingerKind::detect_with(|_| false), PingerKind::Real);
    }

    #[test]
    fn test_explicit_kinds_do_not_resolve() {
        assert_eq!(PingerKind::Mock.resolve(), PingerKind::Mock);
        assert_eq!(PingerKind::Real.resolve(), PingerKind::Real);
        assert_eq!(PingerKind::Mock.build().name(), "mock");
    }
}
