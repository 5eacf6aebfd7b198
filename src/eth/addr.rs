//! Hardware and IPv4 address value types
//!
//! Plain `Copy` values with no shared state. The classification helpers
//! (`is_zero`, `is_broadcast`) run on every receive path, so they are
//! straight-line byte comparisons with no allocation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Length of a hardware (MAC) address in bytes.
pub const MAC_LEN: usize = 6;

/// Length of an IPv4 address in bytes.
pub const IP4_LEN: usize = 4;

/// A 48-bit IEEE 802 hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Mac(pub [u8; MAC_LEN]);

impl Mac {
    /// The all-ones broadcast address.
    pub const BROADCAST: Mac = Mac([0xFF; MAC_LEN]);

    /// The all-zero address; never valid as a real endpoint.
    pub const ZERO: Mac = Mac([0; MAC_LEN]);

    /// Wraps raw octets.
    #[must_use]
    pub const fn new(octets: [u8; MAC_LEN]) -> Self {
        Self(octets)
    }

    /// The raw octets.
    #[must_use]
    pub const fn octets(self) -> [u8; MAC_LEN] {
        self.0
    }

    /// True for the all-zero address.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == [0; MAC_LEN]
    }

    /// True for the all-ones broadcast address.
    #[must_use]
    pub fn is_broadcast(self) -> bool {
        self.0 == [0xFF; MAC_LEN]
    }

    /// 48-bit integer projection with octet 0 as the least significant
    /// byte. Compact map key for the forwarding database.
    #[must_use]
    pub fn to_u64(self) -> u64 {
        u64::from(self.0[5]) << 40
            | u64::from(self.0[4]) << 32
            | u64::from(self.0[3]) << 24
            | u64::from(self.0[2]) << 16
            | u64::from(self.0[1]) << 8
            | u64::from(self.0[0])
    }
}

impl fmt::Display for Mac {
    /// Uppercase colon-separated hex: `DE:AD:BE:EF:00:01`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl From<[u8; MAC_LEN]> for Mac {
    fn from(octets: [u8; MAC_LEN]) -> Self {
        Self(octets)
    }
}

/// An IPv4 address as it appears inside ARP payloads.
///
/// Kept separate from `std::net::Ipv4Addr` so the codec stays a pure
/// octet-level concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ip4(pub [u8; IP4_LEN]);

impl Ip4 {
    /// Wraps raw octets.
    #[must_use]
    pub const fn new(octets: [u8; IP4_LEN]) -> Self {
        Self(octets)
    }

    /// The raw octets.
    #[must_use]
    pub const fn octets(self) -> [u8; IP4_LEN] {
        self.0
    }
}

impl fmt::Display for Ip4 {
    /// Dotted decimal: `192.168.1.1`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl From<[u8; IP4_LEN]> for Ip4 {
    fn from(octets: [u8; IP4_LEN]) -> Self {
        Self(octets)
    }
}
