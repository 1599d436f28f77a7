//! Conversion between EGM wire bytes and the link's message types

use prost::Message;
use tracing::trace;

use super::egm::{
    EgmFeedBack, EgmHeader, EgmJoints, EgmMciState, EgmMciStateType, EgmMessageType,
    EgmMotorState, EgmMotorStateType, EgmPlanned, EgmRobot, EgmSensor,
};
use crate::error::DecodeError;
use crate::types::{CommunicationState, JointVector};

/// Message type tag carried in every EGM header.
pub type MessageType = EgmMessageType;

/// Header of an outbound message, rebuilt for every send.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtocolHeader {
    pub sequence_number: u32,
    pub message_type: MessageType,
    pub timestamp: u32,
}

/// Planned joint target sent to the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutboundMessage {
    pub header: ProtocolHeader,
    pub planned_joints: JointVector,
}

/// Decoded controller feedback.
///
/// Header fields are kept as `Option` so the presence check can happen at the
/// store, which must leave its state untouched for unusable messages.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub sequence_number: Option<u32>,
    pub timestamp: Option<u32>,
    /// Raw tag; values unknown to this build are kept as-is
    pub message_type: Option<i32>,
    pub feedback_joints: Option<JointVector>,
    pub state: CommunicationState,
    pub motors_on: Option<bool>,
}

impl InboundMessage {
    /// Both sequence number and timestamp are present.
    pub fn has_valid_header(&self) -> bool {
        self.sequence_number.is_some() && self.timestamp.is_some()
    }

    /// The message can replace the joint state as a whole.
    pub fn is_usable(&self) -> bool {
        self.has_valid_header() && self.feedback_joints.is_some()
    }

    /// Known message type, if the tag is one this build understands.
    pub fn known_message_type(&self) -> Option<MessageType> {
        self.message_type.and_then(|raw| MessageType::try_from(raw).ok())
    }
}

/// Encode a planned joint target as an `EgmSensor` datagram.
pub fn encode(message: &OutboundMessage) -> Vec<u8> {
    let sensor = EgmSensor {
        header: Some(EgmHeader {
            seqno: Some(message.header.sequence_number),
            tm: Some(message.header.timestamp),
            mtype: Some(message.header.message_type as i32),
        }),
        planned: Some(EgmPlanned {
            joints: Some(EgmJoints { joints: message.planned_joints.to_vec() }),
        }),
    };
    sensor.encode_to_vec()
}

/// Decode an `EgmRobot` datagram.
///
/// Empty input and anything prost cannot parse are [`DecodeError::Malformed`].
pub fn decode(bytes: &[u8]) -> Result<InboundMessage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::malformed("empty datagram"));
    }

    let robot = EgmRobot::decode(bytes).map_err(|e| DecodeError::malformed(e.to_string()))?;

    let header = robot.header.unwrap_or_default();
    let feedback_joints = robot
        .feed_back
        .and_then(|fb| fb.joints)
        .and_then(|joints| JointVector::from_slice(&joints.joints));
    let state = robot
        .mci_state
        .and_then(|mci| mci.state)
        .map(communication_state_from_mci)
        .unwrap_or_default();
    let motors_on = robot
        .motor_state
        .and_then(|motor| motor.state)
        .and_then(|raw| EgmMotorStateType::try_from(raw).ok())
        .and_then(|motor| match motor {
            EgmMotorStateType::On => Some(true),
            EgmMotorStateType::Off => Some(false),
            EgmMotorStateType::Undefined => None,
        });

    trace!(
        seqno = ?header.seqno,
        tm = ?header.tm,
        has_joints = feedback_joints.is_some(),
        %state,
        "Decoded EgmRobot ({} bytes)",
        bytes.len()
    );

    Ok(InboundMessage {
        sequence_number: header.seqno,
        timestamp: header.tm,
        message_type: header.mtype,
        feedback_joints,
        state,
        motors_on,
    })
}

/// Map the controller's MCI state tag; unknown tags read as `Undefined`.
pub fn communication_state_from_mci(raw: i32) -> CommunicationState {
    match EgmMciStateType::try_from(raw) {
        Ok(EgmMciStateType::Running) => CommunicationState::Running,
        Ok(EgmMciStateType::Stopped) => CommunicationState::Connected,
        Ok(EgmMciStateType::Error) => CommunicationState::Error,
        Ok(EgmMciStateType::Undefined) | Err(_) => CommunicationState::Undefined,
    }
}

fn mci_from_communication_state(state: CommunicationState) -> EgmMciStateType {
    match state {
        CommunicationState::Undefined => EgmMciStateType::Undefined,
        CommunicationState::Connected => EgmMciStateType::Stopped,
        CommunicationState::Running => EgmMciStateType::Running,
        CommunicationState::Error => EgmMciStateType::Error,
    }
}

/// Feedback produced by a controller (or a stand-in for one).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerFeedback {
    pub sequence_number: u32,
    pub timestamp: u32,
    pub joints: JointVector,
    pub state: CommunicationState,
}

/// Encode controller feedback as an `EgmRobot` datagram.
pub fn encode_feedback(feedback: &ControllerFeedback) -> Vec<u8> {
    let robot = EgmRobot {
        header: Some(EgmHeader {
            seqno: Some(feedback.sequence_number),
            tm: Some(feedback.timestamp),
            mtype: Some(EgmMessageType::Data as i32),
        }),
        feed_back: Some(EgmFeedBack {
            joints: Some(EgmJoints { joints: feedback.joints.to_vec() }),
        }),
        planned: None,
        motor_state: Some(EgmMotorState { state: Some(EgmMotorStateType::On as i32) }),
        mci_state: Some(EgmMciState {
            state: Some(mci_from_communication_state(feedback.state) as i32),
        }),
        mci_convergence_met: None,
    };
    robot.encode_to_vec()
}

/// Decode an `EgmSensor` datagram on the controller side.
pub fn decode_planned(bytes: &[u8]) -> Result<OutboundMessage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::malformed("empty datagram"));
    }

    let sensor = EgmSensor::decode(bytes).map_err(|e| DecodeError::malformed(e.to_string()))?;
    let header = sensor.header.ok_or_else(|| DecodeError::malformed("missing header"))?;
    let (Some(sequence_number), Some(timestamp)) = (header.seqno, header.tm) else {
        return Err(DecodeError::malformed("header without seqno/tm"));
    };
    let planned_joints = sensor
        .planned
        .and_then(|planned| planned.joints)
        .and_then(|joints| JointVector::from_slice(&joints.joints))
        .ok_or_else(|| DecodeError::malformed("missing planned joints"))?;

    Ok(OutboundMessage {
        header: ProtocolHeader {
            sequence_number,
            message_type: header
                .mtype
                .and_then(|raw| MessageType::try_from(raw).ok())
                .unwrap_or(MessageType::Undefined),
            timestamp,
        },
        planned_joints,
    })
}
