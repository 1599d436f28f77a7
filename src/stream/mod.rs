//! Stream adapters for joint snapshot observers

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
