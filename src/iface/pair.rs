//! In-memory connected interface pair
//!
//! Two [`Interface`] endpoints wired back to back over bounded channels:
//! a frame sent on one end becomes receivable on the other. The relay
//! integration tests link one end of a pair into a bridge and drive
//! traffic from the other; demos can do the same without touching raw
//! sockets.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::IfaceError;
use crate::eth::{Mac, MAC_LEN};
use crate::iface::Interface;

/// Default frame capacity of each direction of a pair.
pub const DEFAULT_PAIR_CAPACITY: usize = 64;

/// Identity of one endpoint of a pair.
#[derive(Debug, Clone)]
pub struct EndpointSpec {
    /// Device name reported by [`Interface::name`].
    pub name: String,
    /// Stable index reported by [`Interface::index`].
    pub index: u32,
    /// Hardware address reported by [`Interface::mac`].
    pub mac: Mac,
}

impl EndpointSpec {
    /// Convenience constructor.
    #[must_use]
    pub fn new(name: impl Into<String>, index: u32, mac: Mac) -> Self {
        Self {
            name: name.into(),
            index,
            mac,
        }
    }
}

/// One end of an in-memory pair.
pub struct PairEndpoint {
    spec: EndpointSpec,
    tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Vec<u8>>>,
    closed: CancellationToken,
}

/// Creates two endpoints wired back to back with
/// [`DEFAULT_PAIR_CAPACITY`] frames of buffering per direction.
#[must_use]
pub fn pair(left: EndpointSpec, right: EndpointSpec) -> (Arc<PairEndpoint>, Arc<PairEndpoint>) {
    pair_with_capacity(left, right, DEFAULT_PAIR_CAPACITY)
}

/// Creates two endpoints wired back to back with an explicit per-direction
/// capacity.
#[must_use]
pub fn pair_with_capacity(
    left: EndpointSpec,
    right: EndpointSpec,
    capacity: usize,
) -> (Arc<PairEndpoint>, Arc<PairEndpoint>) {
    let (ltr_tx, ltr_rx) = mpsc::channel(capacity);
    let (rtl_tx, rtl_rx) = mpsc::channel(capacity);

    let left = Arc::new(PairEndpoint {
        spec: left,
        tx: Mutex::new(Some(ltr_tx)),
        rx: tokio::sync::Mutex::new(rtl_rx),
        closed: CancellationToken::new(),
    });
    let right = Arc::new(PairEndpoint {
        spec: right,
        tx: Mutex::new(Some(rtl_tx)),
        rx: tokio::sync::Mutex::new(ltr_rx),
        closed: CancellationToken::new(),
    });

    (left, right)
}

/// Reads the source address out of a raw frame, zero if the frame is too
/// short to carry one.
fn frame_source(data: &[u8]) -> Mac {
    if data.len() < 2 * MAC_LEN {
        return Mac::ZERO;
    }
    let mut octets = [0u8; MAC_LEN];
    octets.copy_from_slice(&data[MAC_LEN..2 * MAC_LEN]);
    Mac::new(octets)
}

#[async_trait]
impl Interface for PairEndpoint {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn index(&self) -> u32 {
        self.spec.index
    }

    fn mac(&self) -> Mac {
        self.spec.mac
    }

    async fn send(&self, _dst: Mac, data: &[u8]) -> Result<(), IfaceError> {
        let tx = self.tx.lock().clone();
        let Some(tx) = tx else {
            return Err(IfaceError::Closed);
        };
        tx.send(data.to_vec())
            .await
            .map_err(|_| IfaceError::Closed)
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, Mac), IfaceError> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            () = self.closed.cancelled() => Err(IfaceError::Closed),
            frame = rx.recv() => {
                let Some(data) = frame else {
                    // Peer end dropped its sender
                    return Err(IfaceError::Closed);
                };
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok((n, frame_source(&data)))
            }
        }
    }

    fn close(&self) -> Result<(), IfaceError> {
        // Dropping the sender ends the peer's receive stream; the token
        // wakes our own blocked receivers.
        *self.tx.lock() = None;
        self.closed.cancel();
        Ok(())
    }
}
