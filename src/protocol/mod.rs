//! EGM protocol codec.
//!
//! EGM exchanges one protobuf message per UDP datagram:
//!
//! ```text
//! controller ── EgmRobot  (header, feedBack.joints, mciState) ──▶ this link
//! this link  ── EgmSensor (header, planned.joints)            ──▶ controller
//! ```
//!
//! The messages in [`egm`] follow ABB's `egm.proto` field numbers so the
//! controller's own decoder reads what [`encode`] produces. Datagrams are
//! self-delimiting; there is no length prefix.

pub mod codec;
pub mod egm;

pub use codec::{
    ControllerFeedback, InboundMessage, MessageType, OutboundMessage, ProtocolHeader,
    communication_state_from_mci, decode, decode_planned, encode, encode_feedback,
};

/// Receive buffer size; EGM messages are a few hundred bytes.
pub const MAX_DATAGRAM_SIZE: usize = 4096;
