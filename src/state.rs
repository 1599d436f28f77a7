//! Shared joint state
//!
//! The store holds one immutable [`JointSnapshot`] behind a `watch` channel.
//! An update swaps the whole `Arc` in a single step, so readers in any
//! execution context see either the previous snapshot or the new one, never a
//! mix of old angles and a new state.
//!
//! Datagrams are applied in arrival order without reordering: the last
//! usable message wins.

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, trace};

use crate::error::IndexError;
use crate::protocol::InboundMessage;
use crate::stream::ThrottleExt;
use crate::types::{CommunicationState, JointVector, UpdateRate};

/// Joint angles and controller state taken from one controller message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JointSnapshot {
    pub joints: JointVector,
    pub state: CommunicationState,
    /// Controller sequence number of the message, `None` before the first one
    pub sequence_number: Option<u32>,
    pub received_at: Option<Instant>,
}

impl JointSnapshot {
    /// Whether this snapshot came from the controller rather than the initial default.
    pub fn is_received(&self) -> bool {
        self.received_at.is_some()
    }
}

/// Single-writer store of the latest joint snapshot.
#[derive(Debug)]
pub struct JointStateStore {
    tx: watch::Sender<Arc<JointSnapshot>>,
}

impl JointStateStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(JointSnapshot::default()));
        Self { tx }
    }

    /// Replace the snapshot with the contents of `message`.
    ///
    /// Returns `false`, leaving the store untouched, when the header lacks a
    /// sequence number or timestamp or the message carries no feedback joints.
    pub fn update(&self, message: &InboundMessage) -> bool {
        let joints = match message.feedback_joints {
            Some(joints) if message.has_valid_header() => joints,
            _ => {
                debug!(
                    has_seqno = message.sequence_number.is_some(),
                    has_tm = message.timestamp.is_some(),
                    has_joints = message.feedback_joints.is_some(),
                    "The message received from robot is invalid"
                );
                return false;
            }
        };

        let snapshot = Arc::new(JointSnapshot {
            joints,
            state: message.state,
            sequence_number: message.sequence_number,
            received_at: Some(Instant::now()),
        });
        trace!(seqno = ?snapshot.sequence_number, joints = %snapshot.joints, "Joint state updated");
        self.tx.send_replace(snapshot);
        true
    }

    /// Consistent copy of the current joints and state.
    pub fn read(&self) -> (JointVector, CommunicationState) {
        let snapshot = self.tx.borrow();
        (snapshot.joints, snapshot.state)
    }

    pub fn snapshot(&self) -> Arc<JointSnapshot> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn joint(&self, index: usize) -> Result<f64, IndexError> {
        self.tx.borrow().joints.get(index)
    }

    pub fn current_state(&self) -> CommunicationState {
        self.tx.borrow().state
    }

    /// Handle for observers in other tasks or threads.
    pub fn reader(&self) -> JointStateReader {
        JointStateReader { rx: self.tx.subscribe() }
    }
}

impl Default for JointStateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of the store; cheap to clone.
#[derive(Debug, Clone)]
pub struct JointStateReader {
    rx: watch::Receiver<Arc<JointSnapshot>>,
}

impl JointStateReader {
    pub fn snapshot(&self) -> Arc<JointSnapshot> {
        Arc::clone(&self.rx.borrow())
    }

    /// Whether a snapshot arrived since the last [`mark_seen`](Self::mark_seen).
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Take the latest snapshot and clear the change flag.
    pub fn mark_seen(&mut self) -> Arc<JointSnapshot> {
        Arc::clone(&self.rx.borrow_and_update())
    }

    /// Wait for the next snapshot. `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Arc<JointSnapshot>> {
        self.rx.changed().await.ok()?;
        Some(self.mark_seen())
    }

    /// Stream of received snapshots at the requested rate.
    ///
    /// The initial default snapshot is skipped, so the stream first yields
    /// once the controller has sent something.
    pub fn updates(
        &self,
        rate: UpdateRate,
    ) -> impl Stream<Item = Arc<JointSnapshot>> + use<> {
        let snapshots = WatchStream::new(self.rx.clone()).filter(|snapshot| {
            let received = snapshot.is_received();
            async move { received }
        });

        match rate.interval() {
            None => snapshots.boxed(),
            Some(interval) => snapshots.throttle(interval).boxed(),
        }
    }
}
