//! Command sender, the only path for joint targets onto the wire

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::protocol::{MessageType, OutboundMessage, ProtocolHeader, encode};
use crate::transport::Transport;
use crate::types::JointVector;

/// Builds planned-joint messages and sends them to the controller.
///
/// The sequence counter starts at 0, wraps at `u32::MAX` and moves exactly
/// once per send attempt, failed ones included. It lives here rather than in
/// the transport, so swapping the transport on reconnect keeps numbering.
pub struct CommandSender {
    transport: Option<Arc<dyn Transport>>,
    sequence: AtomicU32,
}

impl CommandSender {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport: Some(transport), sequence: AtomicU32::new(0) }
    }

    /// Point the sender at a freshly bound transport.
    pub fn replace_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transport = Some(transport);
    }

    /// Let go of the transport so its socket can be released.
    pub fn detach_transport(&mut self) {
        self.transport = None;
    }

    /// Sequence number the next send will carry.
    pub fn peek_sequence(&self) -> u32 {
        self.sequence.load(Ordering::Relaxed)
    }

    fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Send `joints` as the planned position.
    ///
    /// Fails with [`TransportError::NoRemote`] until the controller address is
    /// known, and with [`TransportError::SocketClosed`] while detached.
    /// Nothing is retried.
    pub async fn send_target(&self, joints: &JointVector) -> Result<usize, TransportError> {
        let sequence_number = self.next_sequence();

        let Some(transport) = &self.transport else {
            return Err(TransportError::SocketClosed);
        };
        let Some(remote) = transport.remote() else {
            debug!(seqno = sequence_number, "No controller address yet, target dropped");
            return Err(TransportError::NoRemote);
        };

        let message = OutboundMessage {
            header: ProtocolHeader {
                sequence_number,
                message_type: MessageType::Correction,
                timestamp: timestamp_ms(),
            },
            planned_joints: *joints,
        };
        let bytes = encode(&message);

        trace!(seqno = sequence_number, %joints, %remote, "Sending joint target");
        transport.send(&bytes, remote).await
    }

    /// Send `current` with one axis overridden, as a slider would.
    pub async fn send_joint(
        &self,
        current: &JointVector,
        index: usize,
        angle: f64,
    ) -> Result<usize> {
        let target = current.with_joint(index, angle)?;
        Ok(self.send_target(&target).await?)
    }
}

/// Wall clock in milliseconds, truncated to the 32-bit header field.
fn timestamp_ms() -> u32 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u32).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EgmError, IndexError};
    use crate::protocol::decode_planned;
    use crate::test_utils::{MockTransport, controller_addr};

    fn sender_with(transport: &Arc<MockTransport>) -> CommandSender {
        CommandSender::new(Arc::clone(transport) as Arc<dyn Transport>)
    }

    #[tokio::test]
    async fn sequence_numbers_increase_from_zero() {
        let transport = Arc::new(MockTransport::with_remote(controller_addr()));
        let sender = sender_with(&transport);

        for i in 0..20 {
            sender.send_target(&JointVector::new([i as f64; 6])).await.unwrap();
        }

        let seqnos: Vec<u32> = transport
            .sent()
            .iter()
            .map(|(bytes, _)| decode_planned(bytes).unwrap().header.sequence_number)
            .collect();
        assert_eq!(seqnos, (0..20).collect::<Vec<_>>());
        assert!(transport.sent().iter().all(|(_, to)| *to == controller_addr()));
    }

    #[tokio::test]
    async fn target_is_a_correction_with_the_joints() {
        let transport = Arc::new(MockTransport::with_remote(controller_addr()));
        let sender = sender_with(&transport);
        let joints = JointVector::new([10.0, -20.0, 30.5, 0.0, 45.0, -90.0]);

        let written = sender.send_target(&joints).await.unwrap();

        let (bytes, _) = &transport.sent()[0];
        assert_eq!(written, bytes.len());
        let decoded = decode_planned(bytes).unwrap();
        assert_eq!(decoded.planned_joints, joints);
        assert_eq!(decoded.header.message_type, MessageType::Correction);
    }

    #[tokio::test]
    async fn failed_sends_still_consume_a_sequence_number() {
        let transport = Arc::new(MockTransport::with_remote(controller_addr()));
        let sender = sender_with(&transport);

        transport.set_fail_sends(true);
        assert!(sender.send_target(&JointVector::ZERO).await.is_err());
        transport.set_fail_sends(false);
        sender.send_target(&JointVector::ZERO).await.unwrap();

        let last = transport.sent().last().cloned().unwrap();
        assert_eq!(decode_planned(&last.0).unwrap().header.sequence_number, 1);
        assert_eq!(sender.peek_sequence(), 2);
    }

    #[tokio::test]
    async fn no_remote_means_nothing_is_sent() {
        let transport = Arc::new(MockTransport::new());
        let sender = sender_with(&transport);

        let result = sender.send_target(&JointVector::ZERO).await;
        assert!(matches!(result, Err(TransportError::NoRemote)));
        assert!(transport.sent().is_empty());
        assert_eq!(sender.peek_sequence(), 1);
    }

    #[tokio::test]
    async fn short_write_is_reported() {
        let transport = Arc::new(MockTransport::with_remote(controller_addr()));
        transport.set_short_writes(2);
        let sender = sender_with(&transport);

        let result = sender.send_target(&JointVector::ZERO).await;
        assert!(matches!(result, Err(TransportError::PartialSend { .. })));
    }

    #[tokio::test]
    async fn numbering_survives_a_transport_swap() {
        let first = Arc::new(MockTransport::with_remote(controller_addr()));
        let mut sender = sender_with(&first);
        sender.send_target(&JointVector::ZERO).await.unwrap();
        sender.send_target(&JointVector::ZERO).await.unwrap();

        let second = Arc::new(MockTransport::with_remote(controller_addr()));
        sender.replace_transport(Arc::clone(&second) as Arc<dyn Transport>);
        sender.send_target(&JointVector::ZERO).await.unwrap();

        let (bytes, _) = &second.sent()[0];
        assert_eq!(decode_planned(bytes).unwrap().header.sequence_number, 2);
    }

    #[tokio::test]
    async fn send_joint_overrides_one_axis() {
        let transport = Arc::new(MockTransport::with_remote(controller_addr()));
        let sender = sender_with(&transport);
        let current = JointVector::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        sender.send_joint(&current, 3, 40.0).await.unwrap();
        let (bytes, _) = &transport.sent()[0];
        assert_eq!(
            decode_planned(bytes).unwrap().planned_joints.as_array(),
            &[1.0, 2.0, 3.0, 40.0, 5.0, 6.0]
        );

        let out_of_range = sender.send_joint(&current, 6, 1.0).await;
        assert!(matches!(out_of_range, Err(EgmError::Index(IndexError::OutOfRange { index: 6 }))));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn detached_sender_reports_closed_socket() {
        let transport = Arc::new(MockTransport::with_remote(controller_addr()));
        let mut sender = sender_with(&transport);
        sender.detach_transport();

        let result = sender.send_target(&JointVector::ZERO).await;
        assert!(matches!(result, Err(TransportError::SocketClosed)));
        assert_eq!(Arc::strong_count(&transport), 1);
    }

    #[test]
    fn wrapping_counter() {
        let sender = CommandSender::new(Arc::new(MockTransport::new()));
        sender.sequence.store(u32::MAX, Ordering::Relaxed);
        assert_eq!(sender.next_sequence(), u32::MAX);
        assert_eq!(sender.next_sequence(), 0);
    }
}
