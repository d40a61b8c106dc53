//! Synthetic pinger producing deterministic results without network access

use super::{PingStats, Pinger};
use crate::error::PingError;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::RwLock;
use std::time::Duration;

/// Latency reported for loopback targets
pub const LOOPBACK_LATENCY: Duration = Duration::from_millis(1);

/// Latency reported for public targets
pub const PUBLIC_LATENCY: Duration = Duration::from_millis(50);

/// Packet loss ratio reported for public targets
pub const PUBLIC_PACKET_LOSS: f64 = 0.1;

const SIMULATED_DELAY: Duration = Duration::from_millis(1);

/// Behaviour override for one host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockHostConfig {
    /// Round-trip time reported for this host
    pub latency: Duration,

    /// Packet loss ratio for this host (0.0 to 1.0)
    pub packet_loss: f64,

    /// Fail the probe instead of returning statistics
    pub should_error: bool,

    /// Message carried by the forced failure
    pub error_msg: String,
}

impl MockHostConfig {
    pub fn reachable(latency: Duration, packet_loss: f64) -> Self {
        Self {
            latency,
            packet_loss,
            ..Default::default()
        }
    }

    pub fn failing(error_msg: impl Into<String>) -> Self {
        Self {
            should_error: true,
            error_msg: error_msg.into(),
            ..Default::default()
        }
    }
}

/// Configuration of the synthetic pinger
#[derive(Debug, Clone)]
pub struct MockPingerConfig {
    /// Round-trip time for private-range targets
    pub default_latency: Duration,

    /// Packet loss ratio for private-range targets (0.0 to 1.0)
    pub default_packet_loss: f64,

    /// Per-host overrides keyed by the exact target string
    pub host_configs: HashMap<String, MockHostConfig>,

    /// Sleep briefly on every probe to mimic a network round trip
    pub simulate_timing: bool,
}

impl Default for MockPingerConfig {
    fn default() -> Self {
        Self {
            default_latency: Duration::from_millis(10),
            default_packet_loss: 0.0,
            host_configs: HashMap::new(),
            simulate_timing: true,
        }
    }
}

/// Class a target falls into when it has no override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostClass {
    Loopback,
    Private,
    Public,
}

impl HostClass {
    /// Classify a target string, `None` when it is neither an IP address nor `localhost`
    pub fn of(target: &str) -> Option<HostClass> {
        if target == "localhost" {
            return Some(HostClass::Loopback);
        }

        let ip = match target.parse::<IpAddr>().ok()? {
            // ::ffff:a.b.c.d is classified as a.b.c.d
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(IpAddr::V6(v6), IpAddr::V4),
            v4 => v4,
        };
        let class = if ip.is_loopback() {
            HostClass::Loopback
        } else if is_private(&ip) {
            HostClass::Private
        } else {
            HostClass::Public
        };
        Some(class)
    }
}

/// RFC 1918 ranges, IPv6 unique local (fc00::/7) and link-local (fe80::/10)
fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            first & 0xfe00 == 0xfc00 || first & 0xffc0 == 0xfe80
        }
    }
}

/// Deterministic pinger for tests and environments without raw socket access
pub struct MockPinger {
    config: RwLock<MockPingerConfig>,
}

impl MockPinger {
    pub fn new() -> Self {
        Self::with_config(MockPingerConfig::default())
    }

    pub fn with_config(config: MockPingerConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Install or replace the override for one host
    pub fn set_host_config(&self, target: impl Into<String>, host_config: MockHostConfig) {
        let mut config = self.config.write().unwrap_or_else(|e| e.into_inner());
        config.host_configs.insert(target.into(), host_config);
    }

    pub fn host_config(&self, target: &str) -> Option<MockHostConfig> {
        let config = self.config.read().unwrap_or_else(|e| e.into_inner());
        config.host_configs.get(target).cloned()
    }

    pub fn clear_host_configs(&self) {
        let mut config = self.config.write().unwrap_or_else(|e| e.into_inner());
        config.host_configs.clear();
    }

    /// Compute the outcome for a target without sleeping
    fn evaluate(&self, target: &str, count: usize) -> Result<PingStats, PingError> {
        let config = self.config.read().unwrap_or_else(|e| e.into_inner());

        let class = HostClass::of(target)
            .ok_or_else(|| PingError::InvalidAddress(target.to_string()))?;

        if let Some(host) = config.host_configs.get(target) {
            if host.should_error {
                return Err(PingError::Forced(host.error_msg.clone()));
            }
            return Ok(synthesize(count, host.latency, host.packet_loss));
        }

        let stats = match class {
            HostClass::Loopback => synthesize(count, LOOPBACK_LATENCY, 0.0),
            HostClass::Private => synthesize(count, config.default_latency, config.default_packet_loss),
            HostClass::Public => synthesize(count, PUBLIC_LATENCY, PUBLIC_PACKET_LOSS),
        };
        Ok(stats)
    }

    fn simulates_timing(&self) -> bool {
        self.config.read().unwrap_or_else(|e| e.into_inner()).simulate_timing
    }
}

impl Default for MockPinger {
    fn default() -> Self {
        Self::new()
    }
}

/// Received count is `floor(count * (1 - loss))`; reported loss is the ratio as a percentage
fn synthesize(count: usize, latency: Duration, packet_loss: f64) -> PingStats {
    let packets_recv = (count as f64 * (1.0 - packet_loss)).max(0.0) as usize;

    PingStats {
        avg_rtt: latency,
        packet_loss: packet_loss * 100.0,
        packets_sent: count,
        packets_recv,
        packets_recv_duplicates: 0,
    }
}

#[async_trait::async_trait]
impl Pinger for MockPinger {
    async fn ping(
        &self,
        target: &str,
        count: usize,
        _interval: Duration,
        _timeout: Duration,
    ) -> Result<PingStats, PingError> {
        if self.simulates_timing() {
            tokio::time::sleep(SIMULATED_DELAY).await;
        }

        self.evaluate(target, count)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
