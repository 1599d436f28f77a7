//! Transport trait for the controller link

use std::net::SocketAddr;

use crate::error::TransportError;

mod udp;

pub use udp::UdpTransport;

/// Default EGM port configured on the controller side in RobotStudio.
pub const DEFAULT_EGM_PORT: u16 = 6511;

/// Datagram link to one robot controller.
///
/// Implementations are shared between the background receive task and the
/// command path, so every method takes `&self`. The remote address is learned
/// from received datagrams unless it was supplied up front.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Whether a datagram is queued. Must return immediately.
    fn poll_available(&self) -> bool;

    /// Wait for one datagram and remember its sender as the controller.
    async fn receive(&self) -> Result<(Vec<u8>, SocketAddr), TransportError>;

    /// Send one datagram. A short write is [`TransportError::PartialSend`].
    async fn send(&self, payload: &[u8], destination: SocketAddr) -> Result<usize, TransportError>;

    /// Controller address, once known.
    fn remote(&self) -> Option<SocketAddr>;

    /// Locally bound endpoint.
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;

    /// Refuse further traffic. The socket itself is released on drop.
    fn close(&self);

    /// Whether [`close`](Transport::close) has been called.
    fn is_closed(&self) -> bool;
}

/// Turn a raw byte count into the send result.
pub(crate) fn check_written(written: usize, expected: usize) -> Result<usize, TransportError> {
    if written < expected {
        Err(TransportError::PartialSend { written, expected })
    } else {
        Ok(written)
    }
}
