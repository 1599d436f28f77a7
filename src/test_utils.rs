//! Test utilities shared by unit tests and benchmarks
//!
//! [`MockTransport`] stands in for the UDP socket so the command path, the
//! driver and the session can be exercised without binding ports.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;

use crate::error::TransportError;
use crate::protocol::{ControllerFeedback, encode_feedback};
use crate::transport::Transport;
use crate::types::{CommunicationState, JointVector};

/// Address used as the fake controller endpoint.
pub fn controller_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6510))
}

/// Encoded `EgmRobot` feedback datagram.
pub fn feedback_datagram(
    sequence_number: u32,
    joints: [f64; 6],
    state: CommunicationState,
) -> Vec<u8> {
    encode_feedback(&ControllerFeedback {
        sequence_number,
        timestamp: sequence_number.wrapping_mul(4),
        joints: JointVector::new(joints),
        state,
    })
}

/// Waypoints spread over every axis, used by benches.
pub fn sample_waypoints(count: usize) -> Vec<JointVector> {
    (0..count)
        .map(|i| {
            let base = i as f64 * 7.5;
            JointVector::new([base, -base / 2.0, base / 3.0, base * 1.5, -base, base / 4.0])
        })
        .collect()
}

/// In-memory transport with scripted inbound datagrams.
#[derive(Default)]
pub struct MockTransport {
    inbound: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
    arrived: Notify,
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    remote: Mutex<Option<SocketAddr>>,
    closed: AtomicBool,
    fail_sends: AtomicBool,
    short_by: AtomicUsize,
    receive_errors: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that already knows its controller.
    pub fn with_remote(remote: SocketAddr) -> Self {
        let transport = Self::new();
        *lock(&transport.remote) = Some(remote);
        transport
    }

    /// Queue a datagram as if the controller had sent it.
    pub fn push_inbound(&self, datagram: Vec<u8>) {
        lock(&self.inbound).push_back((datagram, controller_addr()));
        self.arrived.notify_one();
    }

    /// Make the next `count` receives fail with an I/O error.
    pub fn fail_next_receives(&self, count: usize) {
        self.receive_errors.store(count, Ordering::SeqCst);
        self.arrived.notify_one();
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Report sends as `bytes` shorter than requested.
    pub fn set_short_writes(&self, bytes: usize) {
        self.short_by.store(bytes, Ordering::SeqCst);
    }

    /// Datagrams handed to `send`, including failed ones.
    pub fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        lock(&self.sent).clone()
    }

    pub fn pending_inbound(&self) -> usize {
        lock(&self.inbound).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    fn poll_available(&self) -> bool {
        !self.is_closed() && !lock(&self.inbound).is_empty()
    }

    async fn receive(&self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        loop {
            if self.is_closed() {
                return Err(TransportError::SocketClosed);
            }
            if self
                .receive_errors
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(TransportError::io(
                    "recv_from",
                    std::io::Error::new(std::io::ErrorKind::ConnectionReset, "scripted failure"),
                ));
            }
            if let Some((datagram, from)) = lock(&self.inbound).pop_front() {
                *lock(&self.remote) = Some(from);
                return Ok((datagram, from));
            }
            self.arrived.notified().await;
        }
    }

    async fn send(&self, payload: &[u8], destination: SocketAddr) -> Result<usize, TransportError> {
        if self.is_closed() {
            return Err(TransportError::SocketClosed);
        }
        lock(&self.sent).push((payload.to_vec(), destination));
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::io(
                "send_to",
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "scripted failure"),
            ));
        }
        let written = payload.len().saturating_sub(self.short_by.load(Ordering::SeqCst));
        crate::transport::check_written(written, payload.len())
    }

    fn remote(&self) -> Option<SocketAddr> {
        *lock(&self.remote)
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        if self.is_closed() {
            return Err(TransportError::SocketClosed);
        }
        Ok(SocketAddr::from(([127, 0, 0, 1], crate::transport::DEFAULT_EGM_PORT)))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.arrived.notify_waiters();
        self.arrived.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
