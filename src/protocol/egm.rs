//! EGM wire messages (ABB `egm.proto`, proto2).
//!
//! Only the fields this link reads or writes are declared; the decoder skips
//! everything else (cartesian poses, external axes, test signals, ...), so
//! newer RobotWare releases that add fields still parse.
//!
//! Required proto2 fields are declared `optional` so a message with a missing
//! field is reported through presence flags instead of a hard decode failure.

use prost::{Enumeration, Message};

/// `EgmHeader.MessageType`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum EgmMessageType {
    Undefined = 0,
    Command = 1,
    Data = 2,
    Correction = 3,
    PathCorrection = 4,
}

/// `EgmMCIState.MCIStateType`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum EgmMciStateType {
    Undefined = 0,
    Error = 1,
    Stopped = 2,
    Running = 3,
}

/// `EgmMotorState.MotorStateType`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum EgmMotorStateType {
    Undefined = 0,
    On = 1,
    Off = 2,
}

#[derive(Clone, PartialEq, Message)]
pub struct EgmHeader {
    /// Sequence number, incremented per message by the sender
    #[prost(uint32, optional, tag = "1")]
    pub seqno: Option<u32>,
    /// Timestamp in milliseconds
    #[prost(uint32, optional, tag = "2")]
    pub tm: Option<u32>,
    #[prost(enumeration = "EgmMessageType", optional, tag = "3")]
    pub mtype: Option<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EgmJoints {
    #[prost(double, repeated, packed = "false", tag = "1")]
    pub joints: Vec<f64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EgmFeedBack {
    #[prost(message, optional, tag = "1")]
    pub joints: Option<EgmJoints>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EgmPlanned {
    #[prost(message, optional, tag = "1")]
    pub joints: Option<EgmJoints>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EgmMotorState {
    #[prost(enumeration = "EgmMotorStateType", optional, tag = "1")]
    pub state: Option<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EgmMciState {
    #[prost(enumeration = "EgmMciStateType", optional, tag = "1")]
    pub state: Option<i32>,
}

/// Controller → sensor message.
#[derive(Clone, PartialEq, Message)]
pub struct EgmRobot {
    #[prost(message, optional, tag = "1")]
    pub header: Option<EgmHeader>,
    #[prost(message, optional, tag = "2")]
    pub feed_back: Option<EgmFeedBack>,
    #[prost(message, optional, tag = "3")]
    pub planned: Option<EgmPlanned>,
    #[prost(message, optional, tag = "4")]
    pub motor_state: Option<EgmMotorState>,
    #[prost(message, optional, tag = "5")]
    pub mci_state: Option<EgmMciState>,
    #[prost(bool, optional, tag = "6")]
    pub mci_convergence_met: Option<bool>,
}

/// Sensor → controller message.
#[derive(Clone, PartialEq, Message)]
pub struct EgmSensor {
    #[prost(message, optional, tag = "1")]
    pub header: Option<EgmHeader>,
    #[prost(message, optional, tag = "2")]
    pub planned: Option<EgmPlanned>,
}
