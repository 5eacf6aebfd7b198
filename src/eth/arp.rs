//! ARP payload codec
//!
//! Fixed 28-byte decode of the Ethernet/IPv4 ARP message body, read at a
//! frame's payload offset when the effective EtherType is ARP:
//!
//! ```text
//! hardware type    (2 bytes)
//! protocol type    (2 bytes)
//! hardware length  (1 byte)
//! protocol length  (1 byte)
//! opcode           (2 bytes)
//! sender MAC       (6 bytes)
//! sender IPv4      (4 bytes)
//! target MAC       (6 bytes)
//! target IPv4      (4 bytes)
//! ```

use std::fmt;

use crate::error::CodecError;
use crate::eth::{ArpOp, EtherType, Ip4, Mac, IP4_LEN, MAC_LEN};

/// Wire size of an Ethernet/IPv4 ARP message body.
pub const ARP_PAYLOAD_LEN: usize = 28;

/// A decoded ARP message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPayload {
    /// Hardware address space (1 for Ethernet).
    pub hardware_type: u16,
    /// Protocol address space.
    pub protocol_type: EtherType,
    /// Hardware address length (6 for Ethernet).
    pub hardware_len: u8,
    /// Protocol address length (4 for IPv4).
    pub protocol_len: u8,
    /// Request or reply.
    pub op: ArpOp,
    /// Sender hardware address.
    pub sender_mac: Mac,
    /// Sender protocol address.
    pub sender_ip: Ip4,
    /// Target hardware address.
    pub target_mac: Mac,
    /// Target protocol address.
    pub target_ip: Ip4,
}

impl ArpPayload {
    /// Decodes the fixed 28-byte message body from the front of
    /// `payload`.
    ///
    /// # Errors
    ///
    /// [`CodecError::Truncated`] if `payload` is shorter than 28 bytes.
    pub fn parse(payload: &[u8]) -> Result<ArpPayload, CodecError> {
        if payload.len() < ARP_PAYLOAD_LEN {
            return Err(CodecError::Truncated {
                len: payload.len(),
                need: ARP_PAYLOAD_LEN,
            });
        }

        let mut sender_mac = [0u8; MAC_LEN];
        sender_mac.copy_from_slice(&payload[8..14]);
        let mut sender_ip = [0u8; IP4_LEN];
        sender_ip.copy_from_slice(&payload[14..18]);
        let mut target_mac = [0u8; MAC_LEN];
        target_mac.copy_from_slice(&payload[18..24]);
        let mut target_ip = [0u8; IP4_LEN];
        target_ip.copy_from_slice(&payload[24..28]);

        Ok(ArpPayload {
            hardware_type: u16::from_be_bytes([payload[0], payload[1]]),
            protocol_type: EtherType::from_wire([payload[2], payload[3]]),
            hardware_len: payload[4],
            protocol_len: payload[5],
            op: ArpOp::from_wire([payload[6], payload[7]]),
            sender_mac: Mac::new(sender_mac),
            sender_ip: Ip4::new(sender_ip),
            target_mac: Mac::new(target_mac),
            target_ip: Ip4::new(target_ip),
        })
    }
}

impl fmt::Display for ArpPayload {
    /// `request who has <target-IP>, tell <sender-IP>` for requests,
    /// `reply <target-IP> is at <target-MAC>` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.op == ArpOp::REQUEST {
            write!(f, "request who has {}, tell {}", self.target_ip, self.sender_ip)
        } else {
            write!(f, "reply {} is at {}", self.target_ip, self.target_mac)
        }
    }
}
