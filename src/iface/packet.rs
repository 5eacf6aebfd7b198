//! Linux `AF_PACKET` interface adapter
//!
//! Production implementation of the [`Interface`] contract over raw
//! packet sockets. Each adapter owns **two** sockets bound to the same
//! device — one dedicated to receive, one to transmit — so a blocked
//! transmit never stalls the receive path. The receive socket joins the
//! `PACKET_MR_PROMISC` membership, which the kernel drops automatically
//! when the socket closes; teardown is the plain `Drop` of the owned file
//! descriptors on every exit path.
//!
//! Requires `CAP_NET_RAW` (or root).

use std::io;
use std::mem;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;

use async_trait::async_trait;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::IfaceError;
use crate::eth::{Mac, MAC_LEN};
use crate::iface::Interface;

/// A raw-socket network interface.
#[derive(Debug)]
pub struct PacketInterface {
    name: String,
    index: u32,
    mac: Mac,
    rx: AsyncFd<Socket>,
    tx: AsyncFd<Socket>,
    closed: CancellationToken,
}

impl PacketInterface {
    /// Opens the named device for bridging: resolves its index and
    /// hardware address, opens the receive socket in promiscuous mode and
    /// the transmit socket, and registers both with the reactor.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`IfaceError::NoSuchDevice`] if the name does not resolve;
    /// [`IfaceError::Io`] if socket setup fails (typically missing
    /// `CAP_NET_RAW`).
    pub fn open(name: &str) -> Result<Arc<Self>, IfaceError> {
        let index = device_index(name)?;
        let mac = hardware_addr(name)?;

        let rx = open_bound_socket(index)?;
        enable_promiscuous(&rx, index)?;
        let tx = open_bound_socket(index)?;

        debug!(device = name, index, %mac, "opened packet interface");

        Ok(Arc::new(Self {
            name: name.to_string(),
            index,
            mac,
            rx: AsyncFd::new(rx)?,
            tx: AsyncFd::new(tx)?,
            closed: CancellationToken::new(),
        }))
    }

    async fn recv_inner(&self, buf: &mut [u8]) -> Result<(usize, Mac), IfaceError> {
        let (n, addr) = self
            .rx
            .async_io(Interest::READABLE, |sock| {
                let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
                let mut addr_len = mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;
                let n = unsafe {
                    libc::recvfrom(
                        sock.as_raw_fd(),
                        buf.as_mut_ptr().cast(),
                        buf.len(),
                        0,
                        std::ptr::addr_of_mut!(addr).cast(),
                        &mut addr_len,
                    )
                };
                if n < 0 {
                    return Err(io::Error::last_os_error());
                }
                #[allow(clippy::cast_sign_loss)]
                Ok((n as usize, addr))
            })
            .await?;

        // The kernel loops our own transmissions back through the packet
        // socket; they are not ingress traffic.
        if addr.sll_pkttype == libc::PACKET_OUTGOING {
            return Err(IfaceError::Outgoing);
        }

        let mut octets = [0u8; MAC_LEN];
        octets.copy_from_slice(&addr.sll_addr[..MAC_LEN]);
        Ok((n, Mac::new(octets)))
    }
}

#[async_trait]
impl Interface for PacketInterface {
    fn name(&self) -> &str {
        &self.name
    }

    fn index(&self) -> u32 {
        self.index
    }

    fn mac(&self) -> Mac {
        self.mac
    }

    async fn send(&self, dst: Mac, data: &[u8]) -> Result<(), IfaceError> {
        if self.closed.is_cancelled() {
            return Err(IfaceError::Closed);
        }
        let addr = link_addr(self.index, Some(dst));
        self.tx
            .async_io(Interest::WRITABLE, |sock| sock.send_to(data, &addr))
            .await?;
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, Mac), IfaceError> {
        if self.closed.is_cancelled() {
            return Err(IfaceError::Closed);
        }
        tokio::select! {
            () = self.closed.cancelled() => Err(IfaceError::Closed),
            res = self.recv_inner(buf) => res,
        }
    }

    fn close(&self) -> Result<(), IfaceError> {
        // Wakes blocked receivers; the descriptors themselves close when
        // the adapter drops, taking the promiscuous membership with them.
        self.closed.cancel();
        Ok(())
    }
}

/// Resolves a device name to its interface index.
fn device_index(name: &str) -> Result<u32, IfaceError> {
    let cname = std::ffi::CString::new(name).map_err(|_| IfaceError::NoSuchDevice {
        name: name.to_string(),
    })?;
    let index = unsafe { libc::if_nametoindex(cname.as_ptr()) };
    if index == 0 {
        return Err(IfaceError::NoSuchDevice {
            name: name.to_string(),
        });
    }
    Ok(index)
}

/// `ifreq` overlay for `SIOCGIFHWADDR`.
#[repr(C)]
struct IfReqHwAddr {
    ifr_name: [libc::c_char; libc::IF_NAMESIZE],
    ifr_hwaddr: libc::sockaddr,
}

/// Reads a device's hardware address via `SIOCGIFHWADDR` on a throwaway
/// datagram socket.
fn hardware_addr(name: &str) -> Result<Mac, IfaceError> {
    if name.is_empty() || name.len() >= libc::IF_NAMESIZE {
        return Err(IfaceError::NoSuchDevice {
            name: name.to_string(),
        });
    }

    let mut ifreq: IfReqHwAddr = unsafe { mem::zeroed() };
    for (slot, byte) in ifreq.ifr_name.iter_mut().zip(name.bytes()) {
        *slot = byte as libc::c_char;
    }

    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error().into());
    }
    let rc = unsafe { libc::ioctl(fd, libc::SIOCGIFHWADDR as _, std::ptr::addr_of_mut!(ifreq)) };
    unsafe { libc::close(fd) };
    if rc != 0 {
        return Err(IfaceError::NoSuchDevice {
            name: name.to_string(),
        });
    }

    let mut octets = [0u8; MAC_LEN];
    for (octet, raw) in octets.iter_mut().zip(ifreq.ifr_hwaddr.sa_data.iter()) {
        #[allow(clippy::cast_sign_loss)]
        {
            *octet = *raw as u8;
        }
    }
    Ok(Mac::new(octets))
}

/// Opens a nonblocking `AF_PACKET`/`SOCK_RAW` socket for all protocols
/// and binds it to the device.
fn open_bound_socket(index: u32) -> Result<Socket, IfaceError> {
    let protocol = i32::from((libc::ETH_P_ALL as u16).to_be());
    let sock = Socket::new(Domain::PACKET, Type::RAW, Some(Protocol::from(protocol)))?;
    sock.set_nonblocking(true)?;
    sock.bind(&link_addr(index, None))?;
    Ok(sock)
}

/// Joins the `PACKET_MR_PROMISC` membership so the device delivers all
/// observed traffic, not only frames addressed to it.
fn enable_promiscuous(sock: &Socket, index: u32) -> Result<(), IfaceError> {
    let mut mreq: libc::packet_mreq = unsafe { mem::zeroed() };
    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    {
        mreq.mr_ifindex = index as i32;
        mreq.mr_type = libc::PACKET_MR_PROMISC as u16;
    }
    let rc = unsafe {
        libc::setsockopt(
            sock.as_raw_fd(),
            libc::SOL_PACKET,
            libc::PACKET_ADD_MEMBERSHIP,
            std::ptr::addr_of!(mreq).cast(),
            mem::size_of::<libc::packet_mreq>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error().into());
    }
    Ok(())
}

/// Builds a `sockaddr_ll` for binding (no destination) or transmitting
/// (destination hardware address filled in).
fn link_addr(index: u32, dst: Option<Mac>) -> SockAddr {
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    {
        let sll = unsafe { &mut *std::ptr::addr_of_mut!(storage).cast::<libc::sockaddr_ll>() };
        sll.sll_family = libc::AF_PACKET as libc::sa_family_t;
        sll.sll_protocol = (libc::ETH_P_ALL as u16).to_be();
        #[allow(clippy::cast_possible_wrap)]
        {
            sll.sll_ifindex = index as i32;
        }
        if let Some(dst) = dst {
            sll.sll_halen = MAC_LEN as u8;
            sll.sll_addr[..MAC_LEN].copy_from_slice(&dst.octets());
        }
    }
    unsafe {
        SockAddr::new(
            storage,
            mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    }
}
