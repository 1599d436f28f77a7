//! Core value types shared by every layer of the link.
//!
//! - [`JointVector`] is the six-axis payload of every EGM message we care about
//! - [`CommunicationState`] mirrors the controller's motion supervision state
//! - [`JointLimits`] carries advisory axis ranges for display
//! - [`UpdateRate`] controls how often observers receive joint snapshots
//!
//! ```rust
//! use egm_bridge::types::{JointVector, CommunicationState};
//!
//! let start = JointVector::ZERO;
//! let end = JointVector::new([90.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
//! let halfway = start.lerp(&end, 0.5);
//! assert_eq!(halfway.get(0).unwrap(), 45.0);
//! assert_eq!(CommunicationState::default().to_string(), "Undefined");
//! ```

mod joints;
mod limits;
mod update_rate;

pub use joints::{CommunicationState, JOINT_COUNT, JointVector};
pub use limits::{AxisRange, JointLimits};
pub use update_rate::{EGM_SOURCE_HZ, UpdateRate};
