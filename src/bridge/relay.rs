//! Ingress, dispatch, and egress loops
//!
//! One ingress task per linked interface feeds the bridge's bounded
//! dispatch queue. One dispatch task per bridge drains it in FIFO order
//! and fans each frame out: every destination gets its own egress task
//! with its own copy of the frame, spawned into a `JoinSet` so the group
//! is tracked and drained when the bridge closes.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::Shared;
use crate::eth::Frame;
use crate::iface::Interface;

/// Receive loop of one linked interface.
///
/// Exits when its own token fires (unlink), the bridge root token fires
/// (close), the interface reports a terminal error, or the dispatch
/// queue is gone. Exit doubles as cleanup: the interface unlinks itself.
pub(super) async fn ingress(
    shared: Arc<Shared>,
    iface: Arc<dyn Interface>,
    cancel: CancellationToken,
) {
    let mut scratch = BytesMut::zeroed(shared.cfg.recv_buffer_len);
    debug!(iface = iface.name(), "ingress started");

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = shared.cancel.cancelled() => break,
            res = iface.recv(&mut scratch) => match res {
                Ok((n, _source)) => {
                    // Exact-size copy decouples the frame's lifetime from
                    // the scratch buffer, which is reused next iteration.
                    let data = scratch[..n].to_vec();
                    let frame = match Frame::parse(&iface, data) {
                        Ok(frame) => frame,
                        Err(err) => {
                            shared.counters.decode_errors.fetch_add(1, Ordering::Relaxed);
                            trace!(iface = iface.name(), %err, "dropping undecodable frame");
                            continue;
                        }
                    };

                    if shared.cfg.learning {
                        shared.fdb.add(&iface, &[frame.header().source]);
                    }
                    shared.audit.received(iface.as_ref(), &frame).await;
                    shared.counters.rx_frames.fetch_add(1, Ordering::Relaxed);

                    if shared.dispatch_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(err) if err.is_transient() => {
                    trace!(iface = iface.name(), %err, "skipping receive");
                }
                Err(err) => {
                    debug!(iface = iface.name(), %err, "receive loop ending");
                    break;
                }
            }
        }
    }

    let _ = shared.unlink_index(iface.index());
    debug!(iface = iface.name(), "ingress stopped");
}

/// The bridge's single dispatch loop.
///
/// Drains the queue in FIFO order for the bridge's whole lifetime;
/// spawned egress sends are reaped as they finish and drained before the
/// task exits on cancellation.
pub(super) async fn dispatch(shared: Arc<Shared>, mut rx: mpsc::Receiver<Frame>) {
    let mut egress = JoinSet::new();
    debug!("dispatch started");

    loop {
        tokio::select! {
            () = shared.cancel.cancelled() => break,
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                while egress.try_join_next().is_some() {}
                fan_out(&shared, &mut egress, frame);
            }
        }
    }

    while egress.join_next().await.is_some() {}
    debug!("dispatch stopped");
}

/// Starts one egress task per destination, each with its own copy of the
/// frame. Per-destination copies are mandatory: every egress task
/// rewrites its copy's source field, which on a shared buffer would race.
fn fan_out(shared: &Arc<Shared>, egress: &mut JoinSet<()>, frame: Frame) {
    for target in select_targets(shared, &frame) {
        let shared = Arc::clone(shared);
        let copy = frame.clone();
        egress.spawn(async move { egress_send(&shared, &target, copy).await });
    }
}

/// Flooding policy: every linked interface except the frame's origin.
///
/// With learning enabled, a known unicast destination that is not the
/// origin gets a single copy instead; an unknown, zero, broadcast, or
/// origin-side destination falls back to flooding.
fn select_targets(shared: &Shared, frame: &Frame) -> Vec<Arc<dyn Interface>> {
    let destination = frame.header().destination;

    if shared.cfg.learning && !destination.is_zero() && !destination.is_broadcast() {
        if let Some(target) = shared.fdb.get(destination) {
            if target.index() != frame.origin_index() {
                return vec![target];
            }
        }
    }

    let links = shared.links.read();
    links
        .values()
        .filter(|entry| entry.iface.index() != frame.origin_index())
        .map(|entry| Arc::clone(&entry.iface))
        .collect()
}

/// Delivers one copy to one destination: the copy's source becomes the
/// destination interface's own hardware address, so each recipient sees
/// the bridge, not the original sender, as the layer-2 source on its
/// segment.
async fn egress_send(shared: &Shared, target: &Arc<dyn Interface>, mut frame: Frame) {
    frame.set_source(target.mac());
    shared.audit.sent(target.as_ref(), &frame).await;

    let destination = frame.header().destination;
    match target.send(destination, frame.data()).await {
        Ok(()) => {
            shared.counters.relayed.fetch_add(1, Ordering::Relaxed);
        }
        Err(err) => {
            shared.counters.send_errors.fetch_add(1, Ordering::Relaxed);
            debug!(iface = target.name(), %err, "egress send failed");
        }
    }
}
