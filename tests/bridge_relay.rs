//! End-to-end relay tests over in-memory interface pairs
//!
//! Each test links the near ends of one or more pairs into a bridge and
//! drives traffic from the far ends, observing what the bridge actually
//! puts on the wire.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use vbridge::bridge::{Bridge, BridgeConfig};
use vbridge::eth::{Header, Mac};
use vbridge::iface::pair::{pair, EndpointSpec};
use vbridge::iface::Interface;

fn mac(last: u8) -> Mac {
    Mac::new([0x02, 0, 0, 0, 0, last])
}

/// Builds one pair; the near end (bridge side) gets `index`, the far
/// end (outside world) `index + 100`.
fn port(name: &str, index: u32) -> (Arc<dyn Interface>, Arc<dyn Interface>) {
    let (near, far) = pair(
        EndpointSpec::new(name, index, mac(index as u8)),
        EndpointSpec::new(format!("{name}x"), index + 100, mac(index as u8 + 100)),
    );
    (near, far)
}

fn frame(dst: Mac, src: Mac, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&dst.octets());
    data.extend_from_slice(&src.octets());
    data.extend_from_slice(&0x0800u16.to_be_bytes());
    data.extend_from_slice(payload);
    data
}

fn vlan_frame(dst: Mac, src: Mac, vid: u16, inner: u16, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&dst.octets());
    data.extend_from_slice(&src.octets());
    data.extend_from_slice(&0x8100u16.to_be_bytes());
    data.extend_from_slice(&vid.to_be_bytes());
    data.extend_from_slice(&inner.to_be_bytes());
    data.extend_from_slice(payload);
    data
}

async fn recv_frame(iface: &Arc<dyn Interface>) -> Vec<u8> {
    let mut buf = [0u8; 2048];
    let (n, _src) = timeout(Duration::from_secs(1), iface.recv(&mut buf))
        .await
        .expect("timed out waiting for a relayed frame")
        .expect("receive failed");
    buf[..n].to_vec()
}

async fn assert_silent(iface: &Arc<dyn Interface>) {
    let mut buf = [0u8; 2048];
    let res = timeout(Duration::from_millis(200), iface.recv(&mut buf)).await;
    assert!(res.is_err(), "unexpected frame relayed");
}

#[tokio::test]
async fn broadcast_floods_to_all_interfaces_except_origin() {
    let bridge = Bridge::new(BridgeConfig::default());
    let (a, ax) = port("a", 1);
    let (b, bx) = port("b", 2);
    let (c, cx) = port("c", 3);

    bridge.link(a).unwrap();
    bridge.link(b).unwrap();
    bridge.link(c).unwrap();

    let sender = Mac::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    ax.send(Mac::BROADCAST, &frame(Mac::BROADCAST, sender, b"hello"))
        .await
        .unwrap();

    // B and C each get one copy
    let at_b = recv_frame(&bx).await;
    let at_c = recv_frame(&cx).await;
    assert_eq!(&at_b[..6], &Mac::BROADCAST.octets());
    assert_eq!(&at_c[..6], &Mac::BROADCAST.octets());

    // A never hears its own frame back
    assert_silent(&ax).await;

    bridge.close();
}

#[tokio::test]
async fn egress_source_is_rewritten_per_destination() {
    let bridge = Bridge::new(BridgeConfig::default());
    let (a, ax) = port("a", 1);
    let (b, bx) = port("b", 2);
    let (c, cx) = port("c", 3);

    bridge.link(a).unwrap();
    bridge.link(Arc::clone(&b)).unwrap();
    bridge.link(Arc::clone(&c)).unwrap();

    let sender = Mac::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    ax.send(Mac::BROADCAST, &frame(Mac::BROADCAST, sender, b"payload"))
        .await
        .unwrap();

    // Each copy carries the egress interface's own address as source,
    // not the original sender's
    let at_b = recv_frame(&bx).await;
    let (header_b, offset) = Header::parse(&at_b).unwrap();
    assert_eq!(header_b.source, b.mac());
    assert_eq!(header_b.destination, Mac::BROADCAST);
    assert_eq!(&at_b[offset..], b"payload");

    let at_c = recv_frame(&cx).await;
    let (header_c, _) = Header::parse(&at_c).unwrap();
    assert_eq!(header_c.source, c.mac());

    // The two copies were rewritten independently
    assert_ne!(header_b.source, header_c.source);

    bridge.close();
}

#[tokio::test]
async fn vlan_tag_passes_through_untouched() {
    let bridge = Bridge::new(BridgeConfig::default());
    let (a, ax) = port("a", 1);
    let (b, bx) = port("b", 2);

    bridge.link(a).unwrap();
    bridge.link(Arc::clone(&b)).unwrap();

    let sender = mac(0x77);
    ax.send(
        Mac::BROADCAST,
        &vlan_frame(Mac::BROADCAST, sender, 42, 0x86DD, b"six"),
    )
    .await
    .unwrap();

    let relayed = recv_frame(&bx).await;
    let (header, offset) = Header::parse(&relayed).unwrap();
    let tag = header.vlan.expect("tag must survive the relay");
    assert_eq!(tag.vid, 42);
    assert_eq!(tag.inner.0, 0x86DD);
    assert_eq!(offset, 18);
    assert_eq!(header.source, b.mac());
    assert_eq!(&relayed[offset..], b"six");

    bridge.close();
}

#[tokio::test]
async fn frames_are_relayed_in_receive_order() {
    let bridge = Bridge::new(BridgeConfig::default());
    let (a, ax) = port("a", 1);
    let (b, bx) = port("b", 2);

    bridge.link(a).unwrap();
    bridge.link(b).unwrap();

    let sender = mac(0x55);
    for i in 0u8..8 {
        ax.send(Mac::BROADCAST, &frame(Mac::BROADCAST, sender, &[i]))
            .await
            .unwrap();
    }

    for i in 0u8..8 {
        let relayed = recv_frame(&bx).await;
        let (_, offset) = Header::parse(&relayed).unwrap();
        assert_eq!(relayed[offset..], [i], "frame {i} out of order");
    }

    bridge.close();
}

#[tokio::test]
async fn unlinked_interface_stops_receiving_copies() {
    let bridge = Bridge::new(BridgeConfig::default());
    let (a, ax) = port("a", 1);
    let (b, bx) = port("b", 2);
    let (c, cx) = port("c", 3);

    bridge.link(a).unwrap();
    bridge.link(b).unwrap();
    bridge.link(Arc::clone(&c)).unwrap();

    bridge.unlink(c.as_ref()).unwrap();

    ax.send(Mac::BROADCAST, &frame(Mac::BROADCAST, mac(0x11), b"x"))
        .await
        .unwrap();

    let _ = recv_frame(&bx).await;
    assert_silent(&cx).await;

    bridge.close();
}

#[tokio::test]
async fn learning_unicasts_to_a_known_destination() {
    let config = BridgeConfig {
        learning: true,
        ..BridgeConfig::default()
    };
    let bridge = Bridge::new(config);
    let (a, ax) = port("a", 1);
    let (b, bx) = port("b", 2);
    let (c, cx) = port("c", 3);

    bridge.link(Arc::clone(&a)).unwrap();
    bridge.link(b).unwrap();
    bridge.link(c).unwrap();

    let host_s = Mac::new([0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F]);

    // A broadcast from S behind A floods everywhere and teaches the
    // bridge where S lives
    ax.send(Mac::BROADCAST, &frame(Mac::BROADCAST, host_s, b"learn"))
        .await
        .unwrap();
    let _ = recv_frame(&bx).await;
    let _ = recv_frame(&cx).await;
    assert!(bridge.fdb().get(host_s).is_some());

    // A frame addressed to S now goes out only through A
    bx.send(Mac::BROADCAST, &frame(host_s, mac(0x33), b"tos"))
        .await
        .unwrap();

    let relayed = recv_frame(&ax).await;
    let (header, offset) = Header::parse(&relayed).unwrap();
    assert_eq!(header.destination, host_s);
    assert_eq!(&relayed[offset..], b"tos");

    // No flood: C stays quiet
    assert_silent(&cx).await;

    bridge.close();
}

#[tokio::test]
async fn without_learning_every_frame_floods() {
    let bridge = Bridge::new(BridgeConfig::default());
    let (a, ax) = port("a", 1);
    let (b, bx) = port("b", 2);
    let (c, cx) = port("c", 3);

    bridge.link(a).unwrap();
    bridge.link(b).unwrap();
    bridge.link(c).unwrap();

    let host_s = Mac::new([0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F]);
    ax.send(Mac::BROADCAST, &frame(Mac::BROADCAST, host_s, b"one"))
        .await
        .unwrap();
    let _ = recv_frame(&bx).await;
    let _ = recv_frame(&cx).await;

    // The flooding hub never learned anything, so even a frame
    // addressed straight to S still floods
    assert!(bridge.fdb().get(host_s).is_none());

    bx.send(Mac::BROADCAST, &frame(host_s, mac(0x33), b"two"))
        .await
        .unwrap();
    let _ = recv_frame(&ax).await;
    let _ = recv_frame(&cx).await;

    bridge.close();
}
