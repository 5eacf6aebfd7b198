//! Interface capability contract and adapters
//!
//! [`Interface`] is the narrow seam between the relay engine and whatever
//! actually moves bytes: a raw `AF_PACKET` socket in production
//! ([`packet`], Linux only), or an in-memory connected pair ([`pair`])
//! in tests and demos. Any conforming implementation can be linked into a
//! bridge.

use async_trait::async_trait;

use crate::error::IfaceError;
use crate::eth::Mac;

pub mod pair;

#[cfg(target_os = "linux")]
pub mod packet;

/// A network endpoint the bridge can relay through.
///
/// Implementations are shared across tasks behind `Arc`, so every method
/// takes `&self`; adapters carry their own interior synchronization.
#[async_trait]
pub trait Interface: Send + Sync {
    /// Human-readable device name.
    fn name(&self) -> &str;

    /// Stable identity; the key of the bridge's link table.
    fn index(&self) -> u32;

    /// This endpoint's own hardware address, used to rewrite the source
    /// field on egress.
    fn mac(&self) -> Mac;

    /// Transmits a full wire frame to `dst`.
    ///
    /// # Errors
    ///
    /// [`IfaceError`] on transmit failure; one failed send never affects
    /// other interfaces.
    async fn send(&self, dst: Mac, data: &[u8]) -> Result<(), IfaceError>;

    /// Receives one frame into `buf`, returning the byte count and the
    /// link-layer source address. Pends until a frame arrives or the
    /// interface is torn down.
    ///
    /// # Errors
    ///
    /// Transient errors ([`IfaceError::is_transient`]) mean no frame this
    /// call; [`IfaceError::Closed`] means the endpoint is gone.
    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, Mac), IfaceError>;

    /// Shuts the endpoint down, waking any blocked receiver.
    ///
    /// # Errors
    ///
    /// [`IfaceError`] if the underlying teardown fails.
    fn close(&self) -> Result<(), IfaceError>;
}
