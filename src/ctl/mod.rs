//! Control plane
//!
//! The textual remote-control layer for administering bridges at
//! runtime: a line-oriented command protocol, the registry of live
//! bridges and open interfaces, a Unix-socket daemon serving the
//! protocol, and a one-shot client. Everything here drives bridges
//! exclusively through their public operations; the relay engine knows
//! nothing about it.

mod client;
mod protocol;
mod registry;
mod server;

pub use client::CtlClient;
pub use protocol::Command;
pub use registry::{InterfaceProvider, Registry};
pub use server::CtlServer;

#[cfg(target_os = "linux")]
pub use registry::PacketProvider;
