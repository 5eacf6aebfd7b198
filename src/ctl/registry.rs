//! Bridge and interface registries
//!
//! Explicit, owned state for the control plane: a map of live bridges by
//! name and a map of opened interfaces by device name. One `Registry` is
//! created by the process entry point and handed by reference to
//! whatever executes commands — there is no global state.
//!
//! Interface opening goes through [`InterfaceProvider`], so production
//! code uses raw packet sockets while tests substitute in-memory
//! endpoints. Opening the same device name twice yields the same shared
//! adapter.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::protocol::Command;
use crate::bridge::{Bridge, BridgeConfig};
use crate::error::{CtlError, IfaceError};
use crate::iface::Interface;

/// Opens devices by name. The seam between the control plane and the
/// OS.
pub trait InterfaceProvider: Send + Sync {
    /// Opens the named device.
    ///
    /// # Errors
    ///
    /// [`IfaceError`] if the device cannot be resolved or opened.
    fn open(&self, name: &str) -> Result<Arc<dyn Interface>, IfaceError>;
}

/// Production provider: raw `AF_PACKET` sockets.
#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketProvider;

#[cfg(target_os = "linux")]
impl InterfaceProvider for PacketProvider {
    fn open(&self, name: &str) -> Result<Arc<dyn Interface>, IfaceError> {
        let iface: Arc<dyn Interface> = crate::iface::packet::PacketInterface::open(name)?;
        Ok(iface)
    }
}

/// The control plane's view of the world: bridges by name, opened
/// interfaces by device name.
pub struct Registry {
    bridge_defaults: BridgeConfig,
    provider: Box<dyn InterfaceProvider>,
    bridges: Mutex<HashMap<String, Bridge>>,
    ifaces: Mutex<HashMap<String, Arc<dyn Interface>>>,
}

impl Registry {
    /// Creates an empty registry. Bridges created through it inherit
    /// `bridge_defaults`.
    pub fn new(bridge_defaults: BridgeConfig, provider: impl InterfaceProvider + 'static) -> Self {
        Self {
            bridge_defaults,
            provider: Box::new(provider),
            bridges: Mutex::new(HashMap::new()),
            ifaces: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a bridge under `name`.
    ///
    /// # Errors
    ///
    /// [`CtlError::BridgeExists`] if the name is taken.
    pub fn up(&self, name: &str) -> Result<(), CtlError> {
        let mut bridges = self.bridges.lock();
        if bridges.contains_key(name) {
            return Err(CtlError::BridgeExists(name.to_string()));
        }
        bridges.insert(name.to_string(), Bridge::new(self.bridge_defaults.clone()));
        Ok(())
    }

    /// Closes and forgets the named bridge.
    ///
    /// # Errors
    ///
    /// [`CtlError::BridgeNotFound`] if the name is unknown.
    pub fn down(&self, name: &str) -> Result<(), CtlError> {
        let bridge = self
            .bridges
            .lock()
            .remove(name)
            .ok_or_else(|| CtlError::BridgeNotFound(name.to_string()))?;
        bridge.close();
        Ok(())
    }

    /// Looks up a live bridge by name.
    ///
    /// # Errors
    ///
    /// [`CtlError::BridgeNotFound`] if the name is unknown.
    pub fn bridge(&self, name: &str) -> Result<Bridge, CtlError> {
        self.bridges
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| CtlError::BridgeNotFound(name.to_string()))
    }

    /// Links the named device into the named bridge, opening the device
    /// on first use.
    ///
    /// # Errors
    ///
    /// Bridge lookup, device open, or [`Bridge::link`] failures.
    pub fn link(&self, bridge: &str, iface: &str) -> Result<(), CtlError> {
        let bridge = self.bridge(bridge)?;
        let iface = self.open_iface(iface)?;
        bridge.link(iface)?;
        Ok(())
    }

    /// Unlinks the named device from the named bridge.
    ///
    /// # Errors
    ///
    /// Bridge lookup failure, [`CtlError::InterfaceNotFound`] if the
    /// device was never opened, or [`Bridge::unlink`] failures.
    pub fn unlink(&self, bridge: &str, iface: &str) -> Result<(), CtlError> {
        let bridge = self.bridge(bridge)?;
        let iface = self
            .ifaces
            .lock()
            .get(iface)
            .cloned()
            .ok_or_else(|| CtlError::InterfaceNotFound(iface.to_string()))?;
        bridge.unlink(iface.as_ref())?;
        Ok(())
    }

    /// Applies one topology command.
    ///
    /// # Errors
    ///
    /// The underlying operation's error; session- and daemon-level verbs
    /// (`start`, `stop`, `close`) are not topology commands and are
    /// rejected.
    pub fn apply(&self, command: &Command) -> Result<(), CtlError> {
        match command {
            Command::Up { bridge } => self.up(bridge),
            Command::Down { bridge } => self.down(bridge),
            Command::Link { bridge, iface } => self.link(bridge, iface),
            Command::Unlink { bridge, iface } => self.unlink(bridge, iface),
            Command::Start | Command::Stop | Command::Close => {
                Err(CtlError::NotSupported("registry"))
            }
        }
    }

    /// Closes every bridge and every opened interface. Called on
    /// process shutdown.
    pub fn close_all(&self) {
        for (name, bridge) in self.bridges.lock().drain() {
            tracing::debug!(bridge = name, "closing");
            bridge.close();
        }
        for (name, iface) in self.ifaces.lock().drain() {
            if let Err(err) = iface.close() {
                warn!(iface = name, %err, "close failed");
            }
        }
    }

    /// Names of live bridges, for diagnostics.
    #[must_use]
    pub fn bridge_names(&self) -> Vec<String> {
        self.bridges.lock().keys().cloned().collect()
    }

    fn open_iface(&self, name: &str) -> Result<Arc<dyn Interface>, CtlError> {
        let mut ifaces = self.ifaces.lock();
        if let Some(iface) = ifaces.get(name) {
            return Ok(Arc::clone(iface));
        }
        let iface = self.provider.open(name)?;
        ifaces.insert(name.to_string(), Arc::clone(&iface));
        Ok(iface)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::eth::Mac;
    use crate::iface::pair::{pair, EndpointSpec};

    /// Provider handing out the near end of an in-memory pair per
    /// device name.
    #[derive(Default)]
    struct MemoryProvider {
        next_index: AtomicU32,
        peers: Mutex<Vec<Arc<dyn Interface>>>,
    }

    impl InterfaceProvider for MemoryProvider {
        fn open(&self, name: &str) -> Result<Arc<dyn Interface>, IfaceError> {
            if name.starts_with("missing") {
                return Err(IfaceError::NoSuchDevice {
                    name: name.to_string(),
                });
            }
            let index = self.next_index.fetch_add(2, Ordering::Relaxed) + 1;
            let (near, far) = pair(
                EndpointSpec::new(name, index, Mac::new([2, 0, 0, 0, 0, index as u8])),
                EndpointSpec::new(
                    format!("{name}-peer"),
                    index + 1,
                    Mac::new([2, 0, 0, 0, 1, index as u8]),
                ),
            );
            self.peers.lock().push(far);
            Ok(near)
        }
    }

    fn registry() -> Registry {
        Registry::new(BridgeConfig::default(), MemoryProvider::default())
    }

    #[tokio::test]
    async fn up_twice_is_rejected() {
        let reg = registry();
        reg.up("br0").unwrap();
        assert!(matches!(reg.up("br0"), Err(CtlError::BridgeExists(_))));
        reg.close_all();
    }

    #[tokio::test]
    async fn down_unknown_bridge_is_rejected() {
        let reg = registry();
        assert!(matches!(reg.down("br0"), Err(CtlError::BridgeNotFound(_))));
    }

    #[tokio::test]
    async fn down_closes_the_bridge() {
        let reg = registry();
        reg.up("br0").unwrap();
        let bridge = reg.bridge("br0").unwrap();

        reg.down("br0").unwrap();
        assert_eq!(bridge.state(), crate::bridge::BridgeState::Closed);
        assert!(reg.bridge("br0").is_err());
    }

    #[tokio::test]
    async fn link_opens_the_device_once() {
        let reg = registry();
        reg.up("br0").unwrap();
        reg.up("br1").unwrap();

        reg.link("br0", "eth0").unwrap();
        reg.link("br1", "eth1").unwrap();

        // Linking the same device name again reuses the cached adapter,
        // so the bridge sees the same index and rejects it
        assert!(matches!(
            reg.link("br0", "eth0"),
            Err(CtlError::Bridge(crate::error::BridgeError::AlreadyLinked { .. }))
        ));

        reg.close_all();
    }

    #[tokio::test]
    async fn link_to_unknown_bridge_is_rejected() {
        let reg = registry();
        assert!(matches!(
            reg.link("br0", "eth0"),
            Err(CtlError::BridgeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn link_unopenable_device_is_rejected() {
        let reg = registry();
        reg.up("br0").unwrap();
        assert!(matches!(
            reg.link("br0", "missing0"),
            Err(CtlError::Iface(IfaceError::NoSuchDevice { .. }))
        ));
        reg.close_all();
    }

    #[tokio::test]
    async fn unlink_roundtrip() {
        let reg = registry();
        reg.up("br0").unwrap();
        reg.link("br0", "eth0").unwrap();

        reg.unlink("br0", "eth0").unwrap();

        // Unlinking again: the bridge no longer knows the index
        assert!(matches!(
            reg.unlink("br0", "eth0"),
            Err(CtlError::Bridge(crate::error::BridgeError::NotLinked { .. }))
        ));

        // A device that was never opened is rejected earlier
        assert!(matches!(
            reg.unlink("br0", "eth7"),
            Err(CtlError::InterfaceNotFound(_))
        ));

        reg.close_all();
    }

    #[tokio::test]
    async fn apply_dispatches_topology_commands() {
        let reg = registry();
        reg.apply(&Command::parse("up br0").unwrap()).unwrap();
        reg.apply(&Command::parse("link br0 eth0").unwrap()).unwrap();
        reg.apply(&Command::parse("unlink br0 eth0").unwrap())
            .unwrap();
        reg.apply(&Command::parse("down br0").unwrap()).unwrap();

        assert!(matches!(
            reg.apply(&Command::Start),
            Err(CtlError::NotSupported(_))
        ));
    }
}
