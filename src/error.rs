//! Error types for vbridge
//!
//! Errors are grouped by subsystem: the frame codec, the bridge topology,
//! the interface adapters, configuration loading, and the control plane.
//! Topology errors are synchronous precondition failures the caller may
//! retry or ignore; codec errors mean a frame is dropped from the relay
//! path; interface errors distinguish transient receive conditions from
//! terminal ones so the ingress loop knows whether to retry or exit.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for vbridge
#[derive(Debug, Error)]
pub enum Error {
    /// Frame decode errors (truncated or malformed wire input)
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Bridge topology errors
    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Interface adapter errors
    #[error("interface error: {0}")]
    Iface(#[from] IfaceError),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Control-plane errors
    #[error("control error: {0}")]
    Ctl(#[from] CtlError),

    /// I/O errors not covered by another category
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience alias used by the public API.
pub type Result<T> = std::result::Result<T, Error>;

/// Frame decode errors.
///
/// Wire input is attacker- or driver-controlled; every structured read is
/// bounds-checked first and a short buffer surfaces here instead of a
/// panic. A frame failing decode is dropped from the relay path.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer shorter than the structure it claims to carry
    #[error("malformed frame: {len} bytes, need at least {need}")]
    Truncated {
        /// Bytes available
        len: usize,
        /// Bytes required for the claimed structure
        need: usize,
    },
}

/// Bridge topology errors.
///
/// Local precondition violations returned synchronously from `link` and
/// `unlink`. Never fatal; the caller decides whether to retry or ignore.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The interface index is already registered with this bridge
    #[error("interface {name} (index {index}) is already linked")]
    AlreadyLinked {
        /// Device name of the offending interface
        name: String,
        /// Its link-table index
        index: u32,
    },

    /// The interface index is unknown to this bridge
    #[error("interface index {index} is not linked")]
    NotLinked {
        /// The index that was looked up
        index: u32,
    },

    /// The bridge has been closed and accepts no new links
    #[error("bridge is closed")]
    Closed,
}

/// Interface adapter errors.
#[derive(Debug, Error)]
pub enum IfaceError {
    /// The kernel handed back one of our own transmissions
    /// (`PACKET_OUTGOING`); never a real ingress frame
    #[error("own outgoing packet")]
    Outgoing,

    /// The interface has been closed; receive and send will not succeed
    /// again
    #[error("interface closed")]
    Closed,

    /// Device lookup failed (unknown name, no hardware address)
    #[error("no such device: {name}")]
    NoSuchDevice {
        /// The device name that failed to resolve
        name: String,
    },

    /// Underlying socket I/O error
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl IfaceError {
    /// Whether a receive loop should skip this error and retry.
    ///
    /// Transient conditions (our own looped-back transmissions, interrupted
    /// or would-block I/O) produce no frame this iteration; terminal ones
    /// end the loop.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Outgoing => true,
            Self::Closed | Self::NoSuchDevice { .. } => false,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
            ),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Failed to parse the configuration file
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// Path that failed
        path: PathBuf,
        /// Underlying JSON error
        source: serde_json::Error,
    },
}

/// Control-plane errors.
#[derive(Debug, Error)]
pub enum CtlError {
    /// Unknown command verb
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Command verb recognized but arguments missing
    #[error("invalid arguments: {command} takes {expected} argument(s)")]
    InvalidArguments {
        /// The command verb
        command: &'static str,
        /// How many arguments it needs
        expected: usize,
    },

    /// A bridge with this name already exists in the registry
    #[error("bridge already exists")]
    BridgeExists(String),

    /// No bridge with this name exists in the registry
    #[error("bridge not exists")]
    BridgeNotFound(String),

    /// The interface was never opened by this registry
    #[error("interface {0} is not open")]
    InterfaceNotFound(String),

    /// No daemon socket to connect to
    #[error("daemon is not running")]
    DaemonNotRunning,

    /// The daemon is already running and cannot be started again
    #[error("daemon is already running")]
    DaemonRunning,

    /// The operation is not available on this backend
    #[error("not supported on {0} backend")]
    NotSupported(&'static str),

    /// Error line returned by the remote daemon
    #[error("{0}")]
    Remote(String),

    /// Bridge operation failure surfaced through the control plane
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Interface operation failure surfaced through the control plane
    #[error(transparent)]
    Iface(#[from] IfaceError),

    /// Socket I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
