//! Subnet parsing and host enumeration
//!
//! A [`Subnet`] is parsed once from CIDR text and never changes. Its
//! [`SubnetHosts`] iterator walks every address of the block in ascending
//! order, network and broadcast addresses included.

use super::address::{AddressFamily, HostAddress};
use crate::error::SweepError;
use ipnetwork::IpNetwork;
use std::fmt;
use std::iter::FusedIterator;
use std::net::IpAddr;
use std::str::FromStr;

/// A contiguous block of addresses described by a network address and a prefix length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet {
    network: HostAddress,
    prefix: u8,
}

impl Subnet {
    /// Parse CIDR notation such as `192.168.0.0/24` or `2001:db8::/120`.
    ///
    /// Host bits in the address part are cleared, so `10.1.2.3/8` yields the
    /// `10.0.0.0/8` block.
    pub fn parse(cidr: &str) -> crate::Result<Self> {
        let cidr = cidr.trim();
        if cidr.is_empty() {
            return Err(SweepError::InvalidSubnet("subnet cannot be empty".to_string()));
        }

        if !cidr.contains('/') {
            return Err(SweepError::InvalidSubnet(format!(
                "{} is not in CIDR notation (missing /prefix)",
                cidr
            )));
        }

        let network = IpNetwork::from_str(cidr)
            .map_err(|e| SweepError::InvalidSubnet(format!("failed to parse {}: {}", cidr, e)))?;

        Self::new(network.network(), network.prefix())
    }

    /// Build a subnet from any address inside it and a prefix length
    pub fn new(addr: IpAddr, prefix: u8) -> crate::Result<Self> {
        let addr = HostAddress::from(addr);
        let bits = addr.family().bit_length();
        if prefix > bits {
            return Err(SweepError::InvalidSubnet(format!(
                "prefix length {} exceeds {} bits",
                prefix, bits
            )));
        }

        Ok(Self {
            network: addr.with_host_bits_cleared(prefix),
            prefix,
        })
    }

    pub fn family(&self) -> AddressFamily {
        self.network.family()
    }

    /// Network address with every host bit zeroed
    pub fn network(&self) -> HostAddress {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn bit_length(&self) -> u8 {
        self.family().bit_length()
    }

    pub fn host_bits(&self) -> u8 {
        self.bit_length() - self.prefix
    }

    /// First address produced by enumeration, always the network address
    pub fn first_host(&self) -> HostAddress {
        self.network
    }

    /// Last address of the block, with every host bit set
    pub fn last_host(&self) -> HostAddress {
        self.network.with_host_bits_set(self.prefix)
    }

    /// Number of addresses in the block, `2^(bits - prefix)`.
    ///
    /// `::/0` holds 2^128 addresses, one more than `u128` can hold; it
    /// saturates to `u128::MAX`.
    pub fn host_count(&self) -> u128 {
        1u128.checked_shl(self.host_bits() as u32).unwrap_or(u128::MAX)
    }

    pub fn contains(&self, addr: &HostAddress) -> bool {
        addr.family() == self.family() && addr.with_host_bits_cleared(self.prefix) == self.network
    }

    pub fn contains_ip(&self, ip: IpAddr) -> bool {
        self.contains(&HostAddress::from(ip))
    }

    /// Fresh enumeration of every address in the block
    pub fn hosts(&self) -> SubnetHosts {
        SubnetHosts::new(*self)
    }
}

impl FromStr for Subnet {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Subnet::parse(s)
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// Lazy, single-pass walk over the addresses of a subnet.
///
/// The first call to `next` yields the network address. Each later call
/// increments the previous address and stops as soon as the result falls
/// outside the subnet (or wraps past the top of the address space). Once
/// exhausted it stays exhausted.
#[derive(Debug, Clone)]
pub struct SubnetHosts {
    subnet: Subnet,
    current: Option<HostAddress>,
    exhausted: bool,
}

impl SubnetHosts {
    pub fn new(subnet: Subnet) -> Self {
        Self {
            subnet,
            current: None,
            exhausted: false,
        }
    }

    pub fn subnet(&self) -> &Subnet {
        &self.subnet
    }
}

impl Iterator for SubnetHosts {
    type Item = HostAddress;

    fn next(&mut self) -> Option<HostAddress> {
        if self.exhausted {
            return None;
        }

        let next = match self.current {
            None => Some(self.subnet.first_host()),
            Some(current) => current
                .checked_increment()
                .filter(|addr| self.subnet.contains(addr)),
        };

        match next {
            Some(addr) => {
                self.current = Some(addr);
                Some(addr)
            }
            None => {
                self.exhausted = true;
                None
            }
        }
    }
}

impl FusedIterator for SubnetHosts {}

/// Addresses from `addrs` that fall outside `subnet`, in their original order
pub fn hosts_outside<'a, I>(addrs: I, subnet: &Subnet) -> Vec<HostAddress>
where
    I: IntoIterator<Item = &'a HostAddress>,
{
    addrs
        .into_iter()
        .filter(|addr| !subnet.contains(addr))
        .copied()
        .collect()
}
