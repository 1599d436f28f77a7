//! Driver spawns and manages the background receive task

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::TransportError;
use crate::protocol::decode;
use crate::state::JointStateStore;
use crate::transport::Transport;

/// Counters reported when the receive task ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriverStats {
    pub datagrams: u64,
    pub applied: u64,
    pub decode_errors: u64,
    pub transport_errors: u64,
}

/// Running receive task
pub struct DriverHandle {
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    pub task: JoinHandle<DriverStats>,
}

impl DriverHandle {
    /// Cancel the task and wait for it to release its transport handle.
    pub async fn stop(self) -> DriverStats {
        self.cancel.cancel();
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Receive task failed to join: {}", e);
                DriverStats::default()
            }
        }
    }
}

/// Outcome of feeding one datagram to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Updated,
    /// Decoded, but missing header fields or joints
    Discarded,
    Malformed,
}

/// Decode `bytes` and update `store` with the result.
///
/// Shared by the background task and the polled tick so both paths log and
/// discard bad input the same way.
pub fn apply_datagram(store: &JointStateStore, bytes: &[u8]) -> Applied {
    match decode(bytes) {
        Ok(message) => {
            if store.update(&message) {
                Applied::Updated
            } else {
                Applied::Discarded
            }
        }
        Err(e) => {
            warn!("Dropping datagram ({} bytes): {}", bytes.len(), e);
            Applied::Malformed
        }
    }
}

/// Driver spawns and manages the receive task
///
/// The task owns a transport handle, receives datagrams as they arrive and
/// publishes every usable one to the joint state store.
pub struct Driver;

impl Driver {
    /// Spawn the receive task on the current tokio runtime.
    pub fn spawn(transport: Arc<dyn Transport>, store: Arc<JointStateStore>) -> DriverHandle {
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        let task =
            tokio::spawn(async move { Self::receive_task(transport, store, cancel_task).await });

        DriverHandle { cancel, task }
    }

    async fn receive_task(
        transport: Arc<dyn Transport>,
        store: Arc<JointStateStore>,
        cancel: CancellationToken,
    ) -> DriverStats {
        info!("Receive task started");
        let mut stats = DriverStats::default();
        let mut consecutive_errors = 0u32;

        loop {
            // Use select to allow cancellation while waiting on the socket
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Receive task cancelled");
                    break;
                }
                result = transport.receive() => result,
            };

            match result {
                Ok((bytes, from)) => {
                    consecutive_errors = 0;
                    stats.datagrams += 1;
                    trace!("Datagram {}: {} bytes from {}", stats.datagrams, bytes.len(), from);

                    match apply_datagram(&store, &bytes) {
                        Applied::Updated => stats.applied += 1,
                        Applied::Discarded => {}
                        Applied::Malformed => stats.decode_errors += 1,
                    }
                }
                Err(TransportError::SocketClosed) => {
                    debug!("Transport closed, receive task exiting");
                    break;
                }
                Err(e) => {
                    // Transient socket errors never end the task
                    consecutive_errors += 1;
                    stats.transport_errors += 1;
                    error!("Receive error ({} in a row): {}", consecutive_errors, e);

                    // Exponential backoff: 50ms, 100ms, 200ms, ... capped at 800ms
                    let backoff = Duration::from_millis(25 * (1 << consecutive_errors.min(5)));
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("Receive task cancelled during backoff");
                            break;
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        info!(
            datagrams = stats.datagrams,
            applied = stats.applied,
            decode_errors = stats.decode_errors,
            transport_errors = stats.transport_errors,
            "Receive task ended"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockTransport, feedback_datagram};
    use crate::types::{CommunicationState, JointVector};

    async fn wait_for_seq(store: &JointStateStore, seq: u32) {
        let mut reader = store.reader();
        tokio::time::timeout(Duration::from_secs(2), async {
            while reader.snapshot().sequence_number != Some(seq) {
                reader.changed().await;
            }
        })
        .await
        .expect("snapshot should arrive");
    }

    #[tokio::test]
    async fn publishes_feedback_to_the_store() {
        let _ = tracing_subscriber::fmt::try_init();
        let transport = Arc::new(MockTransport::new());
        let store = Arc::new(JointStateStore::new());
        let handle = Driver::spawn(transport.clone(), store.clone());

        transport.push_inbound(feedback_datagram(
            1,
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            CommunicationState::Running,
        ));
        wait_for_seq(&store, 1).await;

        assert_eq!(
            store.read(),
            (JointVector::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), CommunicationState::Running)
        );

        let stats = handle.stop().await;
        assert_eq!(stats.datagrams, 1);
        assert_eq!(stats.applied, 1);
    }

    #[tokio::test]
    async fn malformed_datagrams_do_not_stop_the_task() {
        let transport = Arc::new(MockTransport::new());
        let store = Arc::new(JointStateStore::new());
        let handle = Driver::spawn(transport.clone(), store.clone());

        transport.push_inbound(vec![0xff, 0xff, 0xff]);
        transport.push_inbound(Vec::new());
        transport.push_inbound(feedback_datagram(7, [7.0; 6], CommunicationState::Connected));
        wait_for_seq(&store, 7).await;

        let stats = handle.stop().await;
        assert_eq!(stats.decode_errors, 2);
        assert_eq!(stats.applied, 1);
    }

    #[tokio::test]
    async fn transport_errors_back_off_and_continue() {
        let transport = Arc::new(MockTransport::new());
        let store = Arc::new(JointStateStore::new());
        transport.fail_next_receives(2);
        let handle = Driver::spawn(transport.clone(), store.clone());

        transport.push_inbound(feedback_datagram(3, [3.0; 6], CommunicationState::Running));
        wait_for_seq(&store, 3).await;

        let stats = handle.stop().await;
        assert_eq!(stats.transport_errors, 2);
        assert_eq!(stats.applied, 1);
    }

    #[tokio::test]
    async fn cancel_ends_an_idle_task() {
        let transport = Arc::new(MockTransport::new());
        let store = Arc::new(JointStateStore::new());
        let handle = Driver::spawn(transport.clone(), store);

        let stats = tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("cancellation should interrupt receive");
        assert_eq!(stats, DriverStats::default());
        assert_eq!(Arc::strong_count(&transport), 1, "task released its transport");
    }

    #[tokio::test]
    async fn closed_transport_ends_the_task() {
        let transport = Arc::new(MockTransport::new());
        let handle = Driver::spawn(transport.clone(), Arc::new(JointStateStore::new()));

        transport.close();
        let finished = tokio::time::timeout(Duration::from_secs(1), handle.task).await;
        assert!(finished.is_ok());
    }

    #[test]
    fn apply_datagram_outcomes() {
        let store = JointStateStore::new();
        assert_eq!(apply_datagram(&store, &[0x08]), Applied::Malformed);
        assert_eq!(
            apply_datagram(&store, &feedback_datagram(1, [0.5; 6], CommunicationState::Running)),
            Applied::Updated
        );

        // Header only: decodes, but carries no joints
        let header_only = crate::protocol::egm::EgmRobot {
            header: Some(crate::protocol::egm::EgmHeader {
                seqno: Some(2),
                tm: Some(8),
                mtype: Some(2),
            }),
            ..Default::default()
        };
        let bytes = prost::Message::encode_to_vec(&header_only);
        assert_eq!(apply_datagram(&store, &bytes), Applied::Discarded);
        assert_eq!(store.snapshot().sequence_number, Some(1));
    }
}
