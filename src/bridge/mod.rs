//! The relay engine
//!
//! A [`Bridge`] joins interfaces into one broadcast domain.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                            Bridge                              │
//! ├────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌────────────────────┐  │
//! │  │ Link table   │   │ Forwarding   │   │ Audit trail        │  │
//! │  │ index → ifce │   │ database     │   │ (bounded queue +   │  │
//! │  │ + cancel tok │   │ (MAC → ifce) │   │  consumer task)    │  │
//! │  └──────────────┘   └──────────────┘   └────────────────────┘  │
//! │         │                                                      │
//! │  ingress task per link ──► bounded dispatch queue (FIFO)       │
//! │                                      │                         │
//! │                              dispatch task (one)               │
//! │                                      │                         │
//! │                     egress task per destination (JoinSet)      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Task topology and cancellation
//!
//! Every task is scoped to a cancellation token. The bridge's root token
//! stops the dispatch task and the audit consumer; each linked interface
//! gets its own fresh token at [`Bridge::link`] time, cancelled only by
//! [`Bridge::unlink`]. Ingress loops watch both tokens, so closing the
//! bridge winds them down too — but [`Bridge::close`] itself never
//! touches the per-interface tokens. The asymmetry is deliberate:
//! closing guarantees dispatch stops, while in-flight receives stop on
//! their own schedule and trigger their own unlink cleanup.
//!
//! # Lock ordering
//!
//! The link table and the forwarding database have independent locks and
//! are never held at the same time; neither is ever held across an
//! await.
//!
//! # Backpressure
//!
//! The dispatch queue is bounded. When consumers fall behind, enqueue
//! blocks the ingress task, stalling that interface's receive loop. The
//! engine never drops a successfully received frame; any loss under
//! sustained overload happens beneath it, in the interface's own receive
//! buffering.

mod relay;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::audit::{AuditLog, AUDIT_QUEUE_CAPACITY};
use crate::error::BridgeError;
use crate::eth::Frame;
use crate::fdb::Fdb;
use crate::iface::Interface;

/// Default capacity of the dispatch queue, in frames.
pub const DEFAULT_DISPATCH_CAPACITY: usize = 4096;

/// Default size of each ingress task's reusable receive buffer; sized
/// generously so any realizable frame fits.
pub const DEFAULT_RECV_BUFFER_LEN: usize = 64 * 1024;

/// Tunables of one bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Capacity of the dispatch queue, in frames.
    pub dispatch_capacity: usize,

    /// Capacity of the audit queue, in events.
    pub audit_capacity: usize,

    /// Size of each ingress task's receive scratch buffer, in bytes.
    pub recv_buffer_len: usize,

    /// Learning-bridge extension: when enabled, ingress learns
    /// source-address → interface into the forwarding database and
    /// dispatch unicasts to a known destination instead of flooding.
    /// Disabled by default, giving pure flooding-hub semantics with the
    /// database as a write-side administrative table.
    pub learning: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            dispatch_capacity: DEFAULT_DISPATCH_CAPACITY,
            audit_capacity: AUDIT_QUEUE_CAPACITY,
            recv_buffer_len: DEFAULT_RECV_BUFFER_LEN,
            learning: false,
        }
    }
}

/// Lifecycle of a bridge. Dispatch starts at construction, so a bridge
/// is born running; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Dispatch is running and interfaces can be linked.
    Running,
    /// The root token has been cancelled; the bridge accepts no new
    /// links and dispatch is winding down.
    Closed,
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Point-in-time counters of one bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeStats {
    /// Frames accepted off ingress and enqueued for dispatch.
    pub rx_frames: u64,
    /// Egress copies delivered to an interface.
    pub relayed: u64,
    /// Egress sends that failed.
    pub send_errors: u64,
    /// Received buffers dropped because they failed header decode.
    pub decode_errors: u64,
}

/// Internal counter storage, updated with relaxed atomics on the hot
/// path.
#[derive(Default)]
struct Counters {
    rx_frames: AtomicU64,
    relayed: AtomicU64,
    send_errors: AtomicU64,
    decode_errors: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> BridgeStats {
        BridgeStats {
            rx_frames: self.rx_frames.load(Ordering::Relaxed),
            relayed: self.relayed.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}

/// One registered interface: the endpoint plus the token scoping its
/// ingress task.
struct LinkEntry {
    iface: Arc<dyn Interface>,
    cancel: CancellationToken,
}

/// State shared between the bridge handle and its tasks.
///
/// Invariant: an index is present in `links` iff its ingress task is
/// running or being torn down.
struct Shared {
    cfg: BridgeConfig,
    cancel: CancellationToken,
    links: RwLock<HashMap<u32, LinkEntry>>,
    dispatch_tx: mpsc::Sender<Frame>,
    fdb: Fdb,
    audit: AuditLog,
    counters: Counters,
}

impl Shared {
    /// Removes a registration, cancels its ingress token, and purges its
    /// learned addresses. The link-table lock is released before the
    /// database lock is taken.
    fn unlink_index(&self, index: u32) -> Result<(), BridgeError> {
        let entry = self.links.write().remove(&index);
        let Some(entry) = entry else {
            return Err(BridgeError::NotLinked { index });
        };
        entry.cancel.cancel();
        self.fdb.clear(entry.iface.as_ref());
        info!(iface = entry.iface.name(), index, "unlinked");
        Ok(())
    }
}

/// A software Ethernet bridge.
///
/// Cheap to clone; all clones drive the same bridge. Must be created
/// within a tokio runtime — construction spawns the dispatch task and
/// the audit consumer.
///
/// The bridge holds strong references to linked interfaces only while
/// they are linked; callers own interface lifetime.
#[derive(Clone)]
pub struct Bridge {
    shared: Arc<Shared>,
}

impl Bridge {
    /// Creates a bridge with its own root token and starts its dispatch
    /// task.
    #[must_use]
    pub fn new(cfg: BridgeConfig) -> Self {
        Self::with_cancel(cfg, CancellationToken::new())
    }

    /// Creates a bridge scoped to `cancel`: cancelling the token — from
    /// the outside or through [`Bridge::close`] — closes the bridge.
    #[must_use]
    pub fn with_cancel(cfg: BridgeConfig, cancel: CancellationToken) -> Self {
        let audit = AuditLog::with_capacity(cancel.clone(), cfg.audit_capacity);
        let (dispatch_tx, dispatch_rx) = mpsc::channel(cfg.dispatch_capacity);

        let shared = Arc::new(Shared {
            cfg,
            cancel,
            links: RwLock::new(HashMap::new()),
            dispatch_tx,
            fdb: Fdb::new(),
            audit,
            counters: Counters::default(),
        });

        tokio::spawn(relay::dispatch(Arc::clone(&shared), dispatch_rx));

        Self { shared }
    }

    /// Registers `iface` and starts its ingress task under a fresh
    /// cancellation token.
    ///
    /// The ingress task unlinks the interface itself when it exits for
    /// any reason — its token firing, the bridge root token firing, or
    /// the interface closing underneath it.
    ///
    /// # Errors
    ///
    /// [`BridgeError::AlreadyLinked`] if the index is already
    /// registered; [`BridgeError::Closed`] after [`Bridge::close`].
    pub fn link(&self, iface: Arc<dyn Interface>) -> Result<(), BridgeError> {
        if self.state() == BridgeState::Closed {
            return Err(BridgeError::Closed);
        }

        let index = iface.index();
        let cancel = CancellationToken::new();
        {
            let mut links = self.shared.links.write();
            if links.contains_key(&index) {
                return Err(BridgeError::AlreadyLinked {
                    name: iface.name().to_string(),
                    index,
                });
            }
            links.insert(
                index,
                LinkEntry {
                    iface: Arc::clone(&iface),
                    cancel: cancel.clone(),
                },
            );
        }

        info!(iface = iface.name(), index, "linked");
        tokio::spawn(relay::ingress(Arc::clone(&self.shared), iface, cancel));
        Ok(())
    }

    /// Cancels the interface's ingress task, removes its registration,
    /// and purges its learned addresses.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotLinked`] if the index is unknown.
    pub fn unlink(&self, iface: &dyn Interface) -> Result<(), BridgeError> {
        self.shared.unlink_index(iface.index())
    }

    /// Closes the bridge: cancels the root token, stopping dispatch and
    /// the audit consumer. Idempotent.
    ///
    /// Per-interface ingress tokens are deliberately left alone; the
    /// ingress loops observe the root token independently and unlink
    /// themselves as they exit.
    pub fn close(&self) {
        self.shared.cancel.cancel();
        info!("bridge closed");
    }

    /// Current lifecycle state, derived from the root token.
    #[must_use]
    pub fn state(&self) -> BridgeState {
        if self.shared.cancel.is_cancelled() {
            BridgeState::Closed
        } else {
            BridgeState::Running
        }
    }

    /// Whether an interface index is currently registered.
    #[must_use]
    pub fn is_linked(&self, index: u32) -> bool {
        self.shared.links.read().contains_key(&index)
    }

    /// The bridge's forwarding database.
    #[must_use]
    pub fn fdb(&self) -> &Fdb {
        &self.shared.fdb
    }

    /// Point-in-time counters.
    #[must_use]
    pub fn stats(&self) -> BridgeStats {
        self.shared.counters.snapshot()
    }
}
