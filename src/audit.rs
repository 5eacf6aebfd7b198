//! Audit trail of frames crossing the bridge
//!
//! Best-effort, asynchronous record of relay traffic: one bounded queue
//! per bridge with exactly one consumer task rendering events through the
//! logging sink. Producing an event is a blocking enqueue — when the
//! queue is full, the calling ingress or egress task waits for space, so
//! the audit trail participates in the engine's backpressure rather than
//! silently dropping entries.
//!
//! Degenerate frames are filtered at the producer: a received event
//! requires a non-zero source address, a sent event a non-zero
//! destination.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::eth::{ArpPayload, EtherType, Frame, Header};
use crate::iface::Interface;

/// Default capacity of the audit queue.
pub const AUDIT_QUEUE_CAPACITY: usize = 2048;

/// Which way a frame crossed the interface the event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The interface received the frame off the wire.
    Received,
    /// The bridge transmitted the frame out of the interface.
    Sent,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Received => write!(f, "<"),
            Self::Sent => write!(f, ">"),
        }
    }
}

/// One audit record, self-contained so it outlives the frame it was
/// taken from.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    iface: String,
    direction: Direction,
    header: Header,
    arp: Option<ArpPayload>,
}

impl AuditEvent {
    /// Builds a received-event, or `None` for a zero source address.
    #[must_use]
    pub fn received(iface: &dyn Interface, frame: &Frame) -> Option<Self> {
        if frame.header().source.is_zero() {
            return None;
        }
        Some(Self::build(iface, Direction::Received, frame))
    }

    /// Builds a sent-event, or `None` for a zero destination address.
    #[must_use]
    pub fn sent(iface: &dyn Interface, frame: &Frame) -> Option<Self> {
        if frame.header().destination.is_zero() {
            return None;
        }
        Some(Self::build(iface, Direction::Sent, frame))
    }

    fn build(iface: &dyn Interface, direction: Direction, frame: &Frame) -> Self {
        // Only ARP gets a payload summary; the decode is 28 fixed bytes,
        // cheap enough to take eagerly while the frame is still around.
        let arp = (frame.header().effective_type() == EtherType::ARP)
            .then(|| ArpPayload::parse(frame.payload()).ok())
            .flatten();
        Self {
            iface: iface.name().to_string(),
            direction,
            header: *frame.header(),
            arp,
        }
    }
}

impl std::fmt::Display for AuditEvent {
    /// `eth0 < {ARP Destination: .. Source: ..} request who has ..`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.iface, self.direction, self.header)?;
        if let Some(arp) = &self.arp {
            write!(f, " {arp}")?;
        }
        Ok(())
    }
}

/// Handle to a bridge's audit trail. Cheap to clone; all clones feed the
/// same queue.
#[derive(Clone)]
pub struct AuditLog {
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditLog {
    /// Creates the trail and spawns its consumer task, which runs until
    /// `cancel` fires.
    #[must_use]
    pub fn new(cancel: CancellationToken) -> Self {
        Self::with_capacity(cancel, AUDIT_QUEUE_CAPACITY)
    }

    /// Creates the trail with an explicit queue capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(cancel: CancellationToken, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<AuditEvent>(capacity);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    event = rx.recv() => {
                        let Some(event) = event else { break };
                        info!("{event}");
                    }
                }
            }
        });

        Self { tx }
    }

    /// Records that `iface` received `frame`. Filtered for zero source;
    /// otherwise waits for queue space.
    pub async fn received(&self, iface: &dyn Interface, frame: &Frame) {
        if let Some(event) = AuditEvent::received(iface, frame) {
            let _ = self.tx.send(event).await;
        }
    }

    /// Records that the bridge sent `frame` out of `iface`. Filtered for
    /// zero destination; otherwise waits for queue space.
    pub async fn sent(&self, iface: &dyn Interface, frame: &Frame) {
        if let Some(event) = AuditEvent::sent(iface, frame) {
            let _ = self.tx.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::eth::Mac;
    use crate::iface::pair::{pair, EndpointSpec};

    fn endpoint() -> Arc<dyn Interface> {
        let (end, _peer) = pair(
            EndpointSpec::new("eth0", 1, Mac::new([0x02, 0, 0, 0, 0, 0x01])),
            EndpointSpec::new("peer", 2, Mac::new([0x02, 0, 0, 0, 0, 0x02])),
        );
        end
    }

    fn frame_bytes(dst: [u8; 6], src: [u8; 6], ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&dst);
        data.extend_from_slice(&src);
        data.extend_from_slice(&ethertype.to_be_bytes());
        data.extend_from_slice(payload);
        data
    }

    fn arp_request() -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u16.to_be_bytes());
        payload.extend_from_slice(&0x0800u16.to_be_bytes());
        payload.push(6);
        payload.push(4);
        payload.extend_from_slice(&1u16.to_be_bytes());
        payload.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x01]); // sender MAC
        payload.extend_from_slice(&[192, 168, 1, 1]); // sender IP
        payload.extend_from_slice(&[0u8; 6]); // target MAC
        payload.extend_from_slice(&[192, 168, 1, 7]); // target IP
        payload
    }

    const SRC: [u8; 6] = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];

    #[tokio::test]
    async fn zero_source_produces_no_received_event() {
        let iface = endpoint();
        let frame =
            Frame::parse(&iface, frame_bytes([0xFF; 6], [0; 6], 0x0800, b"xx")).unwrap();

        assert_eq!(AuditEvent::received(iface.as_ref(), &frame), None);
        // The same degenerate frame still produces a sent event: its
        // destination is non-zero
        assert!(AuditEvent::sent(iface.as_ref(), &frame).is_some());
    }

    #[tokio::test]
    async fn zero_destination_produces_no_sent_event() {
        let iface = endpoint();
        let frame = Frame::parse(&iface, frame_bytes([0; 6], SRC, 0x0800, b"xx")).unwrap();

        assert_eq!(AuditEvent::sent(iface.as_ref(), &frame), None);
        assert!(AuditEvent::received(iface.as_ref(), &frame).is_some());
    }

    #[tokio::test]
    async fn non_arp_event_renders_header_only() {
        let iface = endpoint();
        let frame =
            Frame::parse(&iface, frame_bytes([0xFF; 6], SRC, 0x0800, b"xx")).unwrap();

        let event = AuditEvent::received(iface.as_ref(), &frame).unwrap();
        assert_eq!(
            event.to_string(),
            "eth0 < {IPv4 Destination: FF:FF:FF:FF:FF:FF Source: AA:BB:CC:DD:EE:FF}"
        );
    }

    #[tokio::test]
    async fn arp_event_appends_the_summary() {
        let iface = endpoint();
        let frame =
            Frame::parse(&iface, frame_bytes([0xFF; 6], SRC, 0x0806, &arp_request())).unwrap();

        let event = AuditEvent::sent(iface.as_ref(), &frame).unwrap();
        assert_eq!(
            event.to_string(),
            "eth0 > {ARP Destination: FF:FF:FF:FF:FF:FF Source: AA:BB:CC:DD:EE:FF} \
             request who has 192.168.1.7, tell 192.168.1.1"
        );
    }

    #[tokio::test]
    async fn short_arp_payload_renders_no_summary() {
        let iface = endpoint();
        let frame =
            Frame::parse(&iface, frame_bytes([0xFF; 6], SRC, 0x0806, &[0u8; 10])).unwrap();

        let event = AuditEvent::received(iface.as_ref(), &frame).unwrap();
        assert!(!event.to_string().contains("request"));
    }

    #[tokio::test]
    async fn enqueue_does_not_block_under_capacity() {
        let cancel = CancellationToken::new();
        let log = AuditLog::with_capacity(cancel.clone(), 8);
        let iface = endpoint();
        let frame =
            Frame::parse(&iface, frame_bytes([0xFF; 6], SRC, 0x0800, b"xx")).unwrap();

        log.received(iface.as_ref(), &frame).await;
        log.sent(iface.as_ref(), &frame).await;

        cancel.cancel();
    }
}
