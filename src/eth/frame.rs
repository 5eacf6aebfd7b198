//! Ethernet header codec and the owned `Frame`
//!
//! ## Header layout
//!
//! ```text
//! Destination (6 bytes)
//! Source      (6 bytes)
//! EtherType   (2 bytes, network order)
//! -- if EtherType == 0x8100 (VLAN tag) --
//! TCI         (2 bytes, low 12 bits = VLAN ID)
//! EtherType   (2 bytes, encapsulated payload type)
//! ```
//!
//! Untagged headers are 14 bytes, tagged headers 18. The decoder checks
//! the buffer length for the header the frame claims to carry before
//! interpreting any byte; undersized input is a [`CodecError`], never a
//! panic.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::CodecError;
use crate::eth::{EtherType, Mac, MAC_LEN};
use crate::iface::Interface;

/// Untagged Ethernet header length.
pub const HEADER_LEN: usize = 14;

/// VLAN-tagged Ethernet header length.
pub const VLAN_HEADER_LEN: usize = 18;

/// Byte offset of the source address within any Ethernet header.
const SOURCE_OFFSET: usize = MAC_LEN;

/// Copies a hardware address out of `buf` at `at`. Caller has already
/// bounds-checked.
fn read_mac(buf: &[u8], at: usize) -> Mac {
    let mut octets = [0u8; MAC_LEN];
    octets.copy_from_slice(&buf[at..at + MAC_LEN]);
    Mac::new(octets)
}

/// The 802.1Q tag of a VLAN-tagged frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanTag {
    /// VLAN ID; 12 significant bits.
    pub vid: u16,
    /// EtherType of the encapsulated payload.
    pub inner: EtherType,
}

/// A decoded Ethernet header.
///
/// Field values are copied out of the wire buffer at decode time, so a
/// `Header` stays valid independently of the buffer it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Destination hardware address.
    pub destination: Mac,
    /// Source hardware address.
    pub source: Mac,
    /// Outer EtherType; [`EtherType::VLAN`] when a tag is present.
    pub ethertype: EtherType,
    /// The 802.1Q tag, when present.
    pub vlan: Option<VlanTag>,
}

impl Header {
    /// Decodes a header from the front of `buf`, returning it together
    /// with the offset at which the payload begins (14 or 18).
    ///
    /// # Errors
    ///
    /// [`CodecError::Truncated`] if `buf` is shorter than the header it
    /// claims to carry.
    pub fn parse(buf: &[u8]) -> Result<(Header, usize), CodecError> {
        if buf.len() < HEADER_LEN {
            return Err(CodecError::Truncated {
                len: buf.len(),
                need: HEADER_LEN,
            });
        }

        let destination = read_mac(buf, 0);
        let source = read_mac(buf, SOURCE_OFFSET);
        let ethertype = EtherType::from_wire([buf[12], buf[13]]);

        if ethertype != EtherType::VLAN {
            return Ok((
                Header {
                    destination,
                    source,
                    ethertype,
                    vlan: None,
                },
                HEADER_LEN,
            ));
        }

        // The frame claims a VLAN tag; it must carry the 4 extra bytes.
        if buf.len() < VLAN_HEADER_LEN {
            return Err(CodecError::Truncated {
                len: buf.len(),
                need: VLAN_HEADER_LEN,
            });
        }

        let tci = u16::from_be_bytes([buf[14], buf[15]]);
        let vlan = VlanTag {
            vid: tci & 0x0FFF,
            inner: EtherType::from_wire([buf[16], buf[17]]),
        };

        Ok((
            Header {
                destination,
                source,
                ethertype,
                vlan: Some(vlan),
            },
            VLAN_HEADER_LEN,
        ))
    }

    /// The protocol of the payload: the inner EtherType for tagged
    /// frames, the outer one otherwise.
    #[must_use]
    pub fn effective_type(&self) -> EtherType {
        self.vlan.map_or(self.ethertype, |tag| tag.inner)
    }

    /// Wire length of this header (14 or 18).
    #[must_use]
    pub fn wire_len(&self) -> usize {
        if self.vlan.is_some() {
            VLAN_HEADER_LEN
        } else {
            HEADER_LEN
        }
    }
}

impl fmt::Display for Header {
    /// `{IPv4 Destination: .. Source: ..}`, with a `VLAN(id)` prefix and
    /// the inner EtherType for tagged frames.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tag) = self.vlan {
            write!(
                f,
                "{{VLAN({}) {} Destination: {} Source: {}}}",
                tag.vid, tag.inner, self.destination, self.source
            )
        } else {
            write!(
                f,
                "{{{} Destination: {} Source: {}}}",
                self.ethertype, self.destination, self.source
            )
        }
    }
}

/// One received frame: the owned wire bytes, the decoded header, and a
/// non-owning reference back to the interface it arrived on.
///
/// Cloning duplicates the buffer byte for byte and preserves the origin
/// reference. Concurrent egress paths each rewrite the source field of
/// their own clone, so the buffer is never shared between tasks.
pub struct Frame {
    origin: Weak<dyn Interface>,
    origin_index: u32,
    header: Header,
    payload_at: usize,
    data: Vec<u8>,
}

impl Frame {
    /// Decodes `data` as a frame received on `origin`, taking ownership
    /// of the buffer.
    ///
    /// # Errors
    ///
    /// [`CodecError::Truncated`] if the buffer is shorter than the header
    /// it claims to carry.
    pub fn parse(origin: &Arc<dyn Interface>, data: Vec<u8>) -> Result<Frame, CodecError> {
        let (header, payload_at) = Header::parse(&data)?;
        Ok(Frame {
            origin: Arc::downgrade(origin),
            origin_index: origin.index(),
            header,
            payload_at,
            data,
        })
    }

    /// The decoded header.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The full wire bytes, header included.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The payload bytes following the header.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data[self.payload_at..]
    }

    /// Byte offset at which the payload begins (14 or 18).
    #[must_use]
    pub fn payload_offset(&self) -> usize {
        self.payload_at
    }

    /// The interface this frame arrived on, if it is still alive.
    #[must_use]
    pub fn origin(&self) -> Option<Arc<dyn Interface>> {
        self.origin.upgrade()
    }

    /// Link-table index of the origin interface. Valid even after the
    /// origin itself is gone.
    #[must_use]
    pub fn origin_index(&self) -> u32 {
        self.origin_index
    }

    /// Rewrites the source address, in the owned buffer and the decoded
    /// header both.
    pub fn set_source(&mut self, source: Mac) {
        self.data[SOURCE_OFFSET..SOURCE_OFFSET + MAC_LEN].copy_from_slice(&source.octets());
        self.header.source = source;
    }
}

impl Clone for Frame {
    fn clone(&self) -> Self {
        Frame {
            origin: Weak::clone(&self.origin),
            origin_index: self.origin_index,
            header: self.header,
            payload_at: self.payload_at,
            data: self.data.clone(),
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("origin_index", &self.origin_index)
            .field("header", &self.header)
            .field("len", &self.data.len())
            .finish()
    }
}
