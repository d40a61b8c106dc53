//! Network module: address family model and subnet host enumeration

pub mod address;
pub mod subnet;

pub use address::{AddressFamily, HostAddress};
pub use subnet::{hosts_outside, Subnet, SubnetHosts};
