//! Fixed-width host addresses with carry increment

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Address family of a host address or subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressFamily {
    /// 4-byte addresses
    V4,
    /// 16-byte addresses
    V6,
}

impl AddressFamily {
    /// Number of bits in an address of this family
    pub fn bit_length(&self) -> u8 {
        match self {
            AddressFamily::V4 => 32,
            AddressFamily::V6 => 128,
        }
    }

    /// Number of bytes in an address of this family
    pub fn byte_length(&self) -> usize {
        match self {
            AddressFamily::V4 => 4,
            AddressFamily::V6 => 16,
        }
    }
}

/// A single host address held as its network-order bytes.
///
/// Ordering compares the family first and then the bytes, so within one
/// family it is plain unsigned big-endian ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HostAddress {
    V4([u8; 4]),
    V6([u8; 16]),
}

impl HostAddress {
    pub fn family(&self) -> AddressFamily {
        match self {
            HostAddress::V4(_) => AddressFamily::V4,
            HostAddress::V6(_) => AddressFamily::V6,
        }
    }

    /// Raw bytes, most significant first
    pub fn octets(&self) -> &[u8] {
        match self {
            HostAddress::V4(bytes) => bytes,
            HostAddress::V6(bytes) => bytes,
        }
    }

    fn octets_mut(&mut self) -> &mut [u8] {
        match self {
            HostAddress::V4(bytes) => bytes,
            HostAddress::V6(bytes) => bytes,
        }
    }

    /// The next address in the family, or `None` when the increment wraps past all ones.
    ///
    /// Bytes are incremented from the least significant end and the carry
    /// moves towards the most significant byte, exactly like a fixed-width
    /// unsigned integer.
    pub fn checked_increment(&self) -> Option<Self> {
        let mut next = *self;
        for byte in next.octets_mut().iter_mut().rev() {
            let (value, carry) = byte.overflowing_add(1);
            *byte = value;
            if !carry {
                return Some(next);
            }
        }
        None
    }

    /// Copy of this address with every bit after `prefix` cleared
    pub fn with_host_bits_cleared(&self, prefix: u8) -> Self {
        let mut masked = *self;
        for (i, byte) in masked.octets_mut().iter_mut().enumerate() {
            *byte &= prefix_mask_byte(prefix, i);
        }
        masked
    }

    /// Copy of this address with every bit after `prefix` set
    pub fn with_host_bits_set(&self, prefix: u8) -> Self {
        let mut filled = *self;
        for (i, byte) in filled.octets_mut().iter_mut().enumerate() {
            *byte |= !prefix_mask_byte(prefix, i);
        }
        filled
    }

    pub fn to_ip_addr(&self) -> IpAddr {
        match *self {
            HostAddress::V4(bytes) => IpAddr::V4(Ipv4Addr::from(bytes)),
            HostAddress::V6(bytes) => IpAddr::V6(Ipv6Addr::from(bytes)),
        }
    }
}

/// Network mask bits that fall into byte `index` for a given prefix length
fn prefix_mask_byte(prefix: u8, index: usize) -> u8 {
    let covered = (prefix as usize).saturating_sub(index * 8).min(8);
    match covered {
        0 => 0x00,
        8 => 0xff,
        n => 0xffu8 << (8 - n),
    }
}

impl From<IpAddr> for HostAddress {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => HostAddress::V4(v4.octets()),
            IpAddr::V6(v6) => HostAddress::V6(v6.octets()),
        }
    }
}

impl From<Ipv4Addr> for HostAddress {
    fn from(ip: Ipv4Addr) -> Self {
        HostAddress::V4(ip.octets())
    }
}

impl From<Ipv6Addr> for HostAddress {
    fn from(ip: Ipv6Addr) -> Self {
        HostAddress::V6(ip.octets())
    }
}

impl From<HostAddress> for IpAddr {
    fn from(addr: HostAddress) -> Self {
        addr.to_ip_addr()
    }
}

impl FromStr for HostAddress {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IpAddr::from_str(s).map(HostAddress::from)
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ip_addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_carries_across_bytes() {
        let addr: HostAddress = "10.0.0.255".parse().unwrap();
        assert_eq!(addr.checked_increment().unwrap().to_string(), "10.0.1.0");

        let addr: HostAddress = "10.255.255.255".parse().unwrap();
        assert_eq!(addr.checked_increment().unwrap().to_string(), "11.0.0.0");

        let addr: HostAddress = "2001:db8::ffff".parse().unwrap();
        assert_eq!(addr.checked_increment().unwrap().to_string(), "2001:db8::1:0");
    }

    #[test]
    fn test_increment_wraps_to_none() {
        let addr: HostAddress = "255.255.255.255".parse().unwrap();
        assert!(addr.checked_increment().is_none());

        let addr = HostAddress::V6([0xff; 16]);
        assert!(addr.checked_increment().is_none());
    }

    #[test]
    fn test_host_bit_masks() {
        let addr: HostAddress = "192.168.10.77".parse().unwrap();
        assert_eq!(addr.with_host_bits_cleared(20).to_string(), "192.168.0.0");
        assert_eq!(addr.with_host_bits_set(20).to_string(), "192.168.15.255");
        assert_eq!(addr.with_host_bits_cleared(32), addr);
        assert_eq!(addr.with_host_bits_set(0).to_string(), "255.255.255.255");
    }

    #[test]
    fn test_ordering_is_bytewise() {
        let a: HostAddress = "10.0.0.9".parse().unwrap();
        let b: HostAddress = "10.0.0.10".parse().unwrap();
        let c: HostAddress = "9.255.255.255".parse().unwrap();
        assert!(a < b);
        assert!(c < a);
    }

    #[test]
    fn test_family_lengths() {
        assert_eq!(AddressFamily::V4.bit_length(), 32);
        assert_eq!(AddressFamily::V6.byte_length(), 16);
        let v6: HostAddress = "::1".parse().unwrap();
        assert_eq!(v6.octets().len(), 16);
        assert_eq!(v6.family(), AddressFamily::V6);
    }
}
