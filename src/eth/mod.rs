//! Ethernet wire types and codec
//!
//! Value types for hardware and IPv4 addresses, the EtherType and ARP
//! opcode registries, and the bounds-checked decoders for the Ethernet
//! header (with optional VLAN tag) and the fixed-size ARP payload.
//!
//! All multi-byte wire fields are read and written in network byte order
//! at this boundary and nowhere else; nothing in the crate mirrors host
//! memory layout onto the wire.

mod addr;
mod arp;
mod ethertype;
mod frame;

pub use addr::{Ip4, Mac, IP4_LEN, MAC_LEN};
pub use arp::{ArpPayload, ARP_PAYLOAD_LEN};
pub use ethertype::{ArpOp, EtherType};
pub use frame::{Frame, Header, VlanTag, HEADER_LEN, VLAN_HEADER_LEN};
