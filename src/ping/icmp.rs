//! ICMP implementation for native ping functionality
//!
//! Echo requests go out over a raw ICMP socket when the process may open
//! one, otherwise over the unprivileged datagram ICMP socket Linux and
//! macOS provide. The socket is polled without blocking so that sending,
//! receiving and the overall timeout share one loop.

use super::{PingStats, Pinger, Statistics};
use crate::error::PingError;
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{IcmpCode, IcmpTypes};
use pnet::packet::icmpv6::{Icmpv6Code, Icmpv6Packet, Icmpv6Types, MutableIcmpv6Packet};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::Packet;
use rand::Rng;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::collections::{HashMap, HashSet};
use std::mem::MaybeUninit;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

/// ICMP header (8 bytes) plus 56 bytes of payload, the classic ping size
const ECHO_PACKET_SIZE: usize = 64;

const RECV_BUFFER_SIZE: usize = 1500;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Distinct echo sequence numbers before they wrap
const SEQUENCE_SPACE: usize = u16::MAX as usize + 1;

/// How long to wait for replies after the last echo when no timeout is given
pub const DEFAULT_REPLY_WAIT: Duration = Duration::from_secs(1);

/// Real ICMP echo pinger
#[derive(Debug, Clone)]
pub struct IcmpPinger {
    reply_wait: Duration,
}

impl IcmpPinger {
    pub fn new() -> Self {
        Self {
            reply_wait: DEFAULT_REPLY_WAIT,
        }
    }

    /// Override the linger applied after the final echo when no timeout is set
    pub fn with_reply_wait(mut self, reply_wait: Duration) -> Self {
        self.reply_wait = reply_wait;
        self
    }

    /// Run a full exchange and keep the RTT spread
    pub async fn statistics(
        &self,
        target: &str,
        count: usize,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Statistics, PingError> {
        let addr = resolve(target).await?;
        let socket = EchoSocket::open(addr)?;
        self.exchange(&socket, count, interval, timeout).await
    }

    async fn exchange(
        &self,
        socket: &EchoSocket,
        count: usize,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Statistics, PingError> {
        let identifier = rand::thread_rng().gen::<u16>();
        let start = Instant::now();
        let deadline = (timeout > Duration::ZERO).then(|| start + timeout);

        let mut ledger = EchoLedger::new(count);
        let mut next_send = start;
        let mut last_send = start;
        let mut buffer = vec![MaybeUninit::new(0u8); RECV_BUFFER_SIZE];

        loop {
            let now = Instant::now();
            if deadline.map_or(false, |deadline| now >= deadline) {
                break;
            }

            if ledger.sent() < count && now >= next_send {
                socket.send_echo(identifier, ledger.next_sequence())?;
                ledger.record_send(now);
                last_send = now;
                next_send = now + interval;
            }

            while let Some((sequence, arrived)) = socket.try_recv_reply(identifier, &mut buffer)? {
                ledger.record_reply(sequence, arrived);
            }

            if ledger.sent() == count && ledger.received() >= count {
                break;
            }

            if deadline.is_none() && ledger.sent() == count && last_send.elapsed() >= self.reply_wait {
                break;
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }

        Ok(ledger.statistics())
    }
}

/// Send times and replies keyed by the 16-bit echo sequence number.
///
/// Sequences wrap after 65536 echoes; reusing one forgets the earlier
/// generation so its slot counts again for the new send.
struct EchoLedger {
    sent_at: HashMap<u16, Instant>,
    answered: HashSet<u16>,
    rtts: Vec<Duration>,
    duplicates: usize,
    sent: usize,
}

impl EchoLedger {
    fn new(count: usize) -> Self {
        Self {
            sent_at: HashMap::new(),
            answered: HashSet::new(),
            rtts: Vec::with_capacity(count.min(SEQUENCE_SPACE)),
            duplicates: 0,
            sent: 0,
        }
    }

    fn sent(&self) -> usize {
        self.sent
    }

    fn received(&self) -> usize {
        self.rtts.len()
    }

    fn next_sequence(&self) -> u16 {
        (self.sent % SEQUENCE_SPACE) as u16
    }

    /// Record the echo that was just sent with [`next_sequence`](Self::next_sequence)
    fn record_send(&mut self, now: Instant) -> u16 {
        let sequence = self.next_sequence();
        self.sent_at.insert(sequence, now);
        self.answered.remove(&sequence);
        self.sent += 1;
        sequence
    }

    /// Replies for sequences never sent are ignored
    fn record_reply(&mut self, sequence: u16, arrived: Instant) {
        let Some(sent_time) = self.sent_at.get(&sequence) else {
            return;
        };
        if self.answered.insert(sequence) {
            self.rtts.push(arrived.saturating_duration_since(*sent_time));
        } else {
            self.duplicates += 1;
        }
    }

    fn statistics(&self) -> Statistics {
        Statistics::from_rtts(self.sent, &self.rtts, self.duplicates)
    }
}

impl Default for IcmpPinger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Pinger for IcmpPinger {
    async fn ping(
        &self,
        target: &str,
        count: usize,
        interval: Duration,
        timeout: Duration,
    ) -> Result<PingStats, PingError> {
        match self.statistics(target, count, interval, timeout).await {
            Ok(stats) => Ok(stats.into()),
            Err(e) => {
                log::warn!("Failed to ping the address {}: {}", target, e);
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        "icmp"
    }
}

/// Resolve a literal address or a hostname to the first address it maps to
async fn resolve(target: &str) -> Result<IpAddr, PingError> {
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(ip);
    }

    let mut addrs = tokio::net::lookup_host((target, 0))
        .await
        .map_err(|e| PingError::Resolve(format!("{}: {}", target, e)))?;

    addrs
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| PingError::Resolve(target.to_string()))
}

/// Non-blocking ICMP socket bound to a single target
struct EchoSocket {
    socket: Socket,
    target: IpAddr,
    destination: SockAddr,
    /// Raw sockets see every ICMP packet on the host and, for IPv4, the IP header too
    raw: bool,
}

impl EchoSocket {
    fn open(target: IpAddr) -> Result<Self, PingError> {
        let (domain, protocol) = match target {
            IpAddr::V4(_) => (Domain::IPV4, Protocol::ICMPV4),
            IpAddr::V6(_) => (Domain::IPV6, Protocol::ICMPV6),
        };

        let (socket, raw) = match Socket::new(domain, Type::RAW, Some(protocol)) {
            Ok(socket) => (socket, true),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                log::debug!("Raw ICMP socket denied ({}), trying datagram ICMP socket", e);
                let socket = Socket::new(domain, Type::DGRAM, Some(protocol)).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        PingError::Permission(format!("ICMP socket: {}", e))
                    } else {
                        PingError::Socket(e.to_string())
                    }
                })?;
                (socket, false)
            }
            Err(e) => return Err(PingError::Socket(e.to_string())),
        };

        socket
            .set_nonblocking(true)
            .map_err(|e| PingError::Socket(e.to_string()))?;

        Ok(Self {
            socket,
            target,
            destination: SockAddr::from(SocketAddr::new(target, 0)),
            raw,
        })
    }

    fn send_echo(&self, identifier: u16, sequence: u16) -> Result<(), PingError> {
        let packet = match self.target {
            IpAddr::V4(_) => echo_request_v4(identifier, sequence),
            IpAddr::V6(_) => echo_request_v6(identifier, sequence),
        };

        self.socket.send_to(&packet, &self.destination)?;
        Ok(())
    }

    /// Next echo reply from the target as `(sequence, arrival)`, `None` when nothing is queued
    fn try_recv_reply(
        &self,
        identifier: u16,
        buffer: &mut [MaybeUninit<u8>],
    ) -> Result<Option<(u16, Instant)>, PingError> {
        loop {
            match self.socket.recv_from(buffer) {
                Ok((len, from)) => {
                    let arrived = Instant::now();
                    if from.as_socket().map(|addr| addr.ip()) != Some(self.target) {
                        continue;
                    }

                    // SAFETY: the buffer is zero-initialised on allocation and
                    // recv_from only ever writes initialised bytes into it.
                    let data = unsafe { std::slice::from_raw_parts(buffer.as_ptr() as *const u8, len) };

                    if let Some((id, sequence)) = self.parse_reply(data) {
                        // datagram sockets rewrite the identifier to the local port
                        if !self.raw || id == identifier {
                            return Ok(Some((sequence, arrived)));
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Extract `(identifier, sequence)` from an echo reply
    fn parse_reply(&self, data: &[u8]) -> Option<(u16, u16)> {
        match self.target {
            IpAddr::V4(_) => {
                let icmp = if self.raw {
                    let ip_packet = Ipv4Packet::new(data)?;
                    if ip_packet.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
                        return None;
                    }
                    let offset = ip_packet.get_header_length() as usize * 4;
                    data.get(offset..)?
                } else {
                    data
                };

                let reply = EchoReplyPacket::new(icmp)?;
                if reply.get_icmp_type() != IcmpTypes::EchoReply {
                    return None;
                }
                Some((reply.get_identifier(), reply.get_sequence_number()))
            }
            IpAddr::V6(_) => {
                let reply = Icmpv6Packet::new(data)?;
                if reply.get_icmpv6_type() != Icmpv6Types::EchoReply {
                    return None;
                }
                let payload = reply.payload();
                if payload.len() < 4 {
                    return None;
                }
                Some((
                    u16::from_be_bytes([payload[0], payload[1]]),
                    u16::from_be_bytes([payload[2], payload[3]]),
                ))
            }
        }
    }
}

fn echo_request_v4(identifier: u16, sequence: u16) -> Vec<u8> {
    let mut buffer = vec![0u8; ECHO_PACKET_SIZE];
    if let Some(mut packet) = MutableEchoRequestPacket::new(&mut buffer) {
        packet.set_icmp_type(IcmpTypes::EchoRequest);
        packet.set_icmp_code(IcmpCode(0));
        packet.set_identifier(identifier);
        packet.set_sequence_number(sequence);
        packet.set_payload(&payload_pattern(ECHO_PACKET_SIZE - 8));
    }

    let checksum = icmp_checksum(&buffer);
    buffer[2..4].copy_from_slice(&checksum.to_be_bytes());
    buffer
}

/// The kernel fills in the ICMPv6 checksum, it depends on the IPv6 pseudo-header
fn echo_request_v6(identifier: u16, sequence: u16) -> Vec<u8> {
    let mut buffer = vec![0u8; ECHO_PACKET_SIZE];
    if let Some(mut packet) = MutableIcmpv6Packet::new(&mut buffer) {
        packet.set_icmpv6_type(Icmpv6Types::EchoRequest);
        packet.set_icmpv6_code(Icmpv6Code(0));
        packet.set_checksum(0);

        let mut payload = payload_pattern(ECHO_PACKET_SIZE - 4);
        payload[0..2].copy_from_slice(&identifier.to_be_bytes());
        payload[2..4].copy_from_slice(&sequence.to_be_bytes());
        packet.set_payload(&payload);
    }
    buffer
}

fn payload_pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

/// Internet checksum over an ICMP message whose checksum field is zero
fn icmp_checksum(data: &[u8]) -> u16 {
    let mut sum = 0u32;

    for chunk in data.chunks(2) {
        if chunk.len() == 2 {
            sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
        } else {
            sum += (chunk[0] as u32) << 8;
        }
    }

    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !sum as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::icmp::echo_request::EchoRequestPacket;

    #[test]
    fn test_echo_request_v4_layout() {
        let packet = echo_request_v4(0xBEEF, 7);
        assert_eq!(packet.len(), ECHO_PACKET_SIZE);

        let parsed = EchoRequestPacket::new(&packet).unwrap();
        assert_eq!(parsed.get_icmp_type(), IcmpTypes::EchoRequest);
        assert_eq!(parsed.get_identifier(), 0xBEEF);
        assert_eq!(parsed.get_sequence_number(), 7);
    }

    #[test]
    fn test_checksum_verifies_to_zero() {
        let packet = echo_request_v4(1, 1);
        // summing a message including its own checksum yields all ones
        assert_eq!(icmp_checksum(&packet), 0);
    }

    #[test]
    fn test_echo_request_v6_carries_identifier() {
        let packet = echo_request_v6(0x1234, 0x0102);
        let parsed = Icmpv6Packet::new(&packet).unwrap();
        assert_eq!(parsed.get_icmpv6_type(), Icmpv6Types::EchoRequest);
        assert_eq!(&parsed.payload()[0..4], &[0x12, 0x34, 0x01, 0x02]);
    }

    #[test]
    fn test_ledger_preallocation_is_bounded() {
        let ledger = EchoLedger::new(1usize << 60);
        assert!(ledger.rtts.capacity() <= SEQUENCE_SPACE);
        assert_eq!(ledger.sent(), 0);
    }

    #[test]
    fn test_ledger_counts_replies_past_sequence_wrap() {
        let count = SEQUENCE_SPACE + 4464;
        let mut ledger = EchoLedger::new(count);
        let start = Instant::now();

        for i in 0..count {
            let sent = start + Duration::from_micros(i as u64);
            let sequence = ledger.record_send(sent);
            assert_eq!(sequence as usize, i % SEQUENCE_SPACE);
            ledger.record_reply(sequence, sent + Duration::from_millis(2));
        }

        let stats = ledger.statistics();
        assert_eq!(stats.packets_sent, count);
        assert_eq!(stats.packets_recv, count);
        assert_eq!(stats.packets_recv_duplicates, 0);
        assert_eq!(stats.packet_loss, 0.0);
        assert_eq!(stats.avg_rtt, Duration::from_millis(2));
    }

    #[test]
    fn test_ledger_duplicates_and_unknown_replies() {
        let mut ledger = EchoLedger::new(2);
        let start = Instant::now();

        let first = ledger.record_send(start);
        ledger.record_send(start);
        ledger.record_reply(first, start + Duration::from_millis(1));
        ledger.record_reply(first, start + Duration::from_millis(3));
        ledger.record_reply(900, start + Duration::from_millis(1));

        let stats = ledger.statistics();
        assert_eq!(stats.packets_recv, 1);
        assert_eq!(stats.packets_recv_duplicates, 1);
        assert_eq!(stats.packet_loss, 50.0);
    }

    #[tokio::test]
    async fn test_resolve_literal_address() {
        assert_eq!(resolve("127.0.0.1").await.unwrap(), IpAddr::from([127, 0, 0, 1]));
        assert_eq!(resolve("::1").await.unwrap(), "::1".parse::<IpAddr>().unwrap());
    }
}
