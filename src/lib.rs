//! netsweep - concurrent ICMP sweep of a subnet
//!
//! Enumerates every address of a CIDR block, probes each one from a fixed
//! pool of workers and reports latency and loss per host.
//!
//! ```no_run
//! use netsweep::{Options, PingerKind, ScanSession};
//!
//! # async fn sweep() -> netsweep::Result<()> {
//! let options = Options::new("192.168.0.0/24")
//!     .with_count(3)
//!     .with_timeout(300)
//!     .with_max_workers(16);
//!
//! let mut session = ScanSession::with_kind(&options, PingerKind::Real)?;
//! session.run().await?;
//!
//! let online = session.online_hosts();
//! println!("{} of {} hosts online", online.len(), session.total_results());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod network;
pub mod output;
pub mod ping;
pub mod scanner;

// Re-export commonly used types
pub use config::Options;
pub use error::{PingError, SweepError};
pub use network::{HostAddress, Subnet};
pub use ping::{MockPinger, PingStats, Pinger, PingerKind};
pub use scanner::{ScanSession, ScanState, ScanSummary};

pub type Result<T> = std::result::Result<T, SweepError>;
