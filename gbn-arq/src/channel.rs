//! Unreliable datagram channel abstraction.
//!
//! [`DatagramChannel`] is everything the transport needs from the network:
//! fire-and-forget sends and blocking receives of whole datagrams.  A real
//! channel may drop, corrupt, delay, or duplicate anything it carries; the
//! transport above copes with all of it.
//!
//! [`UdpChannel`] is a thin wrapper around `tokio::net::UdpSocket`.  All
//! protocol logic lives elsewhere; this module owns only byte I/O.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

/// Receive buffer size.  Anything longer than a frame is already corrupt, so
/// this only needs to be large enough for [`crate::frame::Frame::decode`] to
/// notice.
const RECV_BUF_LEN: usize = 2048;

/// Datagram transport consumed by a [`crate::session::Session`].
///
/// Methods take `&self` so one channel can be shared between the caller and
/// the session's background tasks.
pub trait DatagramChannel: Send + Sync + 'static {
    /// Address this channel receives on.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Hand `buf` to the network for delivery to `dest`.  Success says
    /// nothing about arrival.
    fn send_to(&self, buf: &[u8], dest: SocketAddr) -> impl Future<Output = io::Result<()>> + Send;

    /// Wait for the next datagram and return it with its source address.
    fn recv_from(&self) -> impl Future<Output = io::Result<(Vec<u8>, SocketAddr)>> + Send;
}

/// A UDP socket speaking raw frame bytes.
#[derive(Debug)]
pub struct UdpChannel {
    inner: UdpSocket,
}

impl UdpChannel {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `127.0.0.1:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let inner = UdpSocket::bind(local_addr).await?;
        log::debug!("[chan] bound udp {}", inner.local_addr()?);
        Ok(Self { inner })
    }
}

impl DatagramChannel for UdpChannel {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<()> {
        self.inner.send_to(buf, dest).await?;
        Ok(())
    }

    async fn recv_from(&self) -> io::Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; RECV_BUF_LEN];
        let (n, addr) = self.inner.recv_from(&mut buf).await?;
        buf.truncate(n);
        Ok((buf, addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn udp_roundtrip_on_loopback() {
        let a = UdpChannel::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpChannel::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b_addr = b.local_addr().unwrap();

        a.send_to(b"datagram", b_addr).await.unwrap();
        let (bytes, from) = b.recv_from().await.unwrap();

        assert_eq!(bytes, b"datagram");
        assert_eq!(from, a.local_addr().unwrap());
    }

    #[tokio::test]
    async fn ephemeral_port_is_resolved() {
        let chan = UdpChannel::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        assert_ne!(chan.local_addr().unwrap().port(), 0);
    }
}
