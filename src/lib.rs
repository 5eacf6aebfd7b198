//! vbridge: userspace software Ethernet bridge
//!
//! This crate joins a set of network interfaces into one logical broadcast
//! domain. Frames received on any linked interface are relayed to every
//! other linked interface, with enough of each frame decoded (Ethernet
//! header, optional VLAN tag, ARP payload) to drive a forwarding database
//! and an audit log.
//!
//! # Architecture
//!
//! ```text
//!  Interface ──► ingress task ──► Frame decode ──► audit + dispatch queue
//!                (one per link)                         │
//!                                                       ▼
//!                                                 dispatch task
//!                                                 (one per bridge)
//!                                                       │
//!                                  ┌────────────────────┼──────────────────┐
//!                                  ▼                    ▼                  ▼
//!                             egress copy          egress copy        egress copy
//!                             rewrite source       rewrite source     rewrite source
//!                                  │                    │                  │
//!                                  ▼                    ▼                  ▼
//!                              Interface            Interface          Interface
//! ```
//!
//! Each linked interface runs a dedicated ingress task that receives raw
//! frames, decodes them, and feeds a bounded dispatch queue. A single
//! dispatch task per bridge floods every frame to all interfaces except its
//! origin, handing each destination its own copy so the per-destination
//! source rewrite never races. Backpressure is blocking end to end: a full
//! queue stalls the producer rather than dropping a received frame.
//!
//! # Quick start
//!
//! ```no_run
//! use vbridge::bridge::{Bridge, BridgeConfig};
//! use vbridge::iface::packet::PacketInterface;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bridge = Bridge::new(BridgeConfig::default());
//! bridge.link(PacketInterface::open("eth0")?)?;
//! bridge.link(PacketInterface::open("eth1")?)?;
//! // Frames now flow between eth0 and eth1 until the bridge closes.
//! bridge.close();
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`eth`]: address types, EtherType registry, frame and ARP codec
//! - [`fdb`]: forwarding database (learned MAC → interface table)
//! - [`audit`]: asynchronous audit trail of relayed frames
//! - [`bridge`]: the relay engine
//! - [`iface`]: interface capability contract and adapters
//! - [`ctl`]: control-plane protocol, registry, daemon and client
//! - [`config`]: daemon configuration
//! - [`error`]: error types

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod audit;
pub mod bridge;
pub mod config;
pub mod ctl;
pub mod error;
pub mod eth;
pub mod fdb;
pub mod iface;

// Re-export commonly used types at the crate root
pub use bridge::{Bridge, BridgeConfig, BridgeStats};
pub use config::Config;
pub use error::{BridgeError, CodecError, CtlError, Error, IfaceError};
pub use eth::{ArpPayload, EtherType, Frame, Header, Ip4, Mac};
pub use fdb::Fdb;
pub use iface::Interface;

/// Crate version, surfaced by the binary's `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
