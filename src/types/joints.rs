//! Joint-space values exchanged with the controller

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::IndexError;

/// Number of robot axes carried by every joint vector.
pub const JOINT_COUNT: usize = 6;

/// Six joint angles in degrees, axis 1 first.
///
/// Values are not range checked here; see [`JointLimits`](super::JointLimits)
/// for the advisory axis ranges.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointVector([f64; JOINT_COUNT]);

impl JointVector {
    /// All axes at zero degrees.
    pub const ZERO: JointVector = JointVector([0.0; JOINT_COUNT]);

    pub const fn new(angles: [f64; JOINT_COUNT]) -> Self {
        Self(angles)
    }

    /// Build from a controller payload, taking the first six values.
    ///
    /// Returns `None` when fewer than six values are present.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let head: [f64; JOINT_COUNT] = values.get(..JOINT_COUNT)?.try_into().ok()?;
        Some(Self(head))
    }

    /// Angle of one axis.
    pub fn get(&self, index: usize) -> Result<f64, IndexError> {
        self.0.get(index).copied().ok_or(IndexError::OutOfRange { index })
    }

    /// Copy of this vector with a single axis replaced.
    pub fn with_joint(mut self, index: usize, angle: f64) -> Result<Self, IndexError> {
        let slot = self.0.get_mut(index).ok_or(IndexError::OutOfRange { index })?;
        *slot = angle;
        Ok(self)
    }

    pub fn as_array(&self) -> &[f64; JOINT_COUNT] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }

    /// Per-axis linear interpolation towards `target`.
    ///
    /// `t` is clamped to `[0, 1]`; at `t == 1` the result is exactly `target`.
    pub fn lerp(&self, target: &JointVector, t: f64) -> JointVector {
        let t = t.clamp(0.0, 1.0);
        if t >= 1.0 {
            return *target;
        }
        let mut out = [0.0; JOINT_COUNT];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.0[i] + (target.0[i] - self.0[i]) * t;
        }
        JointVector(out)
    }

    /// True when every axis differs from `other` by at most `tolerance_deg`.
    pub fn approx_eq(&self, other: &JointVector, tolerance_deg: f64) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| (a - b).abs() <= tolerance_deg)
    }
}

impl From<[f64; JOINT_COUNT]> for JointVector {
    fn from(angles: [f64; JOINT_COUNT]) -> Self {
        Self(angles)
    }
}

impl fmt::Display for JointVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, angle) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.2}", angle)?;
        }
        write!(f, "]")
    }
}

/// Motion supervision state reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CommunicationState {
    /// Nothing received yet, or the controller reported an undefined state.
    #[default]
    Undefined,
    /// Controller is talking to us but EGM motion is stopped.
    Connected,
    /// EGM motion is active on the controller.
    Running,
    /// Controller reported an EGM supervision error.
    Error,
}

impl CommunicationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationState::Undefined => "Undefined",
            CommunicationState::Connected => "Connected",
            CommunicationState::Running => "Running",
            CommunicationState::Error => "Error",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, CommunicationState::Running)
    }
}

impl fmt::Display for CommunicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
