//! Advisory axis ranges for display

use super::joints::JOINT_COUNT;

/// Mechanical range of one axis in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, angle: f64) -> bool {
        angle >= self.min && angle <= self.max
    }
}

/// Per-axis working ranges of an arm.
///
/// The command path never enforces these; they feed range labels and
/// collaborator-side checks.
#[derive(Debug, Clone, PartialEq)]
pub struct JointLimits {
    axes: [AxisRange; JOINT_COUNT],
}

impl JointLimits {
    pub fn new(axes: [AxisRange; JOINT_COUNT]) -> Self {
        Self { axes }
    }

    /// ABB IRB 120 axis ranges.
    pub fn irb120() -> Self {
        Self::new([
            AxisRange::new(-165.0, 165.0),
            AxisRange::new(-110.0, 110.0),
            AxisRange::new(-110.0, 70.0),
            AxisRange::new(-160.0, 160.0),
            AxisRange::new(-120.0, 120.0),
            AxisRange::new(-400.0, 400.0),
        ])
    }

    pub fn axis(&self, index: usize) -> Option<AxisRange> {
        self.axes.get(index).copied()
    }

    /// Whether `angle` lies inside the range of axis `index`.
    ///
    /// Unknown axes are never in range.
    pub fn contains(&self, index: usize, angle: f64) -> bool {
        self.axis(index).is_some_and(|range| range.contains(angle))
    }

    /// Human readable range, e.g. `-110° / +70°`, or `N/A` for unknown axes.
    pub fn range_label(&self, index: usize) -> String {
        match self.axis(index) {
            Some(range) => format!("{:+}° / {:+}°", range.min, range.max),
            None => "N/A".to_string(),
        }
    }
}

impl Default for JointLimits {
    fn default() -> Self {
        Self::irb120()
    }
}
