//! UDP transport on a tokio socket

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};

use super::{Transport, check_written};
use crate::error::TransportError;
use crate::protocol::MAX_DATAGRAM_SIZE;

/// UDP socket bound to the local EGM endpoint.
pub struct UdpTransport {
    socket: UdpSocket,

    /// Bound address (resolved, so port 0 becomes the real port)
    local_addr: SocketAddr,

    /// Controller endpoint, preconfigured or learned from the last datagram
    remote: Mutex<Option<SocketAddr>>,

    closed: AtomicBool,
}

impl UdpTransport {
    /// Bind the local endpoint.
    ///
    /// An address already in use is reported as
    /// [`TransportError::BindConflict`].
    pub async fn bind(
        local_addr: SocketAddr,
        remote: Option<SocketAddr>,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(local_addr).await.map_err(|source| {
            if source.kind() == ErrorKind::AddrInUse {
                TransportError::BindConflict { addr: local_addr, source }
            } else {
                TransportError::io("bind", source)
            }
        })?;
        let local_addr = socket.local_addr().map_err(|e| TransportError::io("local_addr", e))?;

        info!(%local_addr, remote = ?remote, "EGM socket bound");

        Ok(Self { socket, local_addr, remote: Mutex::new(remote), closed: AtomicBool::new(false) })
    }

    fn set_remote(&self, addr: SocketAddr) {
        let mut remote = self.remote.lock().unwrap_or_else(|e| e.into_inner());
        if *remote != Some(addr) {
            info!(controller = %addr, "Controller address learned");
            *remote = Some(addr);
        }
    }
}

#[async_trait::async_trait]
impl Transport for UdpTransport {
    fn poll_available(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.socket.try_peek_sender() {
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::WouldBlock => false,
            Err(e) => {
                warn!("Peek failed on EGM socket: {}", e);
                false
            }
        }
    }

    async fn receive(&self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        if self.is_closed() {
            return Err(TransportError::SocketClosed);
        }

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, from) =
            self.socket.recv_from(&mut buf).await.map_err(|e| TransportError::io("recv_from", e))?;
        buf.truncate(len);

        trace!("Received {} bytes from {}", len, from);
        self.set_remote(from);

        Ok((buf, from))
    }

    async fn send(&self, payload: &[u8], destination: SocketAddr) -> Result<usize, TransportError> {
        if self.is_closed() {
            return Err(TransportError::SocketClosed);
        }

        let written = self
            .socket
            .send_to(payload, destination)
            .await
            .map_err(|e| TransportError::io("send_to", e))?;

        trace!("Sent {}/{} bytes to {}", written, payload.len(), destination);
        check_written(written, payload.len())
    }

    fn remote(&self) -> Option<SocketAddr> {
        *self.remote.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        if self.is_closed() {
            return Err(TransportError::SocketClosed);
        }
        Ok(self.local_addr)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(local_addr = %self.local_addr, "EGM socket closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        if !self.is_closed() {
            warn!(local_addr = %self.local_addr, "EGM socket dropped without close");
        }
    }
}
