//! Delivery rate for joint-state observers

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often an observer wants joint snapshots delivered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every snapshot the controller produces (EGM runs at up to 250 Hz)
    Native,

    /// At most this many snapshots per second, latest wins
    Max(u32),
}

/// Highest rate an EGM controller streams feedback at.
pub const EGM_SOURCE_HZ: u32 = 250;

impl UpdateRate {
    /// Collapse rates that cannot throttle anything into [`UpdateRate::Native`].
    ///
    /// `Max(0)` and any rate at or above [`EGM_SOURCE_HZ`] deliver every
    /// snapshot anyway.
    pub fn normalize(self) -> Self {
        match self {
            UpdateRate::Max(hz) if hz == 0 || hz >= EGM_SOURCE_HZ => UpdateRate::Native,
            other => other,
        }
    }

    /// Interval between deliveries, or `None` when no throttling applies.
    pub fn interval(self) -> Option<Duration> {
        match self.normalize() {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

impl Default for UpdateRate {
    fn default() -> Self {
        UpdateRate::Native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_for_rates() {
        assert_eq!(UpdateRate::Native.interval(), None);
        assert_eq!(UpdateRate::Max(0).interval(), None);
        assert_eq!(UpdateRate::Max(50).interval(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn rates_at_or_above_the_source_are_native() {
        assert_eq!(UpdateRate::Max(EGM_SOURCE_HZ).normalize(), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(u32::MAX).normalize(), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(u32::MAX).interval(), None);
        assert_eq!(UpdateRate::Max(EGM_SOURCE_HZ - 1).normalize(), UpdateRate::Max(249));
        assert_eq!(UpdateRate::Native.normalize(), UpdateRate::Native);
    }
}
