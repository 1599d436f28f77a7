//! Waypoint recording, playback and RAPID export
//!
//! The sequencer never touches the network. The session calls
//! [`Sequencer::advance`] once per tick and sends whatever target comes back,
//! so playback is a resumable state machine rather than a task:
//!
//! ```text
//! Idle ──play()/home()──▶ PlaybackPending ──advance()──▶ Playing ──last pair──▶ Idle
//!                                  ▲                        │
//!                                  └────── stop()/clear() ──┘ (at the next tick)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use egm_bridge::sequencer::{Sequencer, SequencerState};
//! use egm_bridge::types::JointVector;
//! use std::time::Duration;
//!
//! let mut sequencer = Sequencer::new(Duration::from_secs(2));
//! sequencer.add_waypoint(JointVector::ZERO, None);
//! sequencer.add_waypoint(JointVector::new([90.0, 0.0, 0.0, 0.0, 0.0, 0.0]), None);
//!
//! sequencer.play(JointVector::ZERO).unwrap();
//! while let Some(target) = sequencer.advance(Duration::from_millis(100)) {
//!     // send `target` to the controller
//!     let _ = target;
//! }
//! assert_eq!(sequencer.state(), SequencerState::Idle);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{EgmError, SequencerError};
use crate::types::JointVector;

mod playback;
mod rapid;

pub use playback::Playback;
pub use rapid::{DEFAULT_EXPORT_FILE, DEFAULT_MODULE_NAME};

use playback::Step;

/// Per-axis tolerance for "already at the first waypoint".
pub const JOINT_TOLERANCE_DEG: f64 = 1e-3;

/// Duration of one waypoint-to-waypoint segment unless configured otherwise.
pub const DEFAULT_SEGMENT_DURATION: Duration = Duration::from_secs(2);

/// A recorded joint configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub joints: JointVector,
    /// End-effector location at capture time, for display only
    pub position: Option<[f64; 3]>,
}

impl Waypoint {
    pub fn new(joints: JointVector) -> Self {
        Self { joints, position: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequencerState {
    Idle,
    /// Playback requested, first target goes out on the next tick
    PlaybackPending,
    Playing,
}

/// Owns the recorded waypoints and the active playback, if any.
#[derive(Debug, Clone)]
pub struct Sequencer {
    waypoints: Vec<Waypoint>,
    segment_duration: Duration,
    state: SequencerState,
    path: Vec<JointVector>,
    playback: Playback,
    stop_requested: bool,
}

impl Sequencer {
    pub fn new(segment_duration: Duration) -> Self {
        Self {
            waypoints: Vec::new(),
            segment_duration,
            state: SequencerState::Idle,
            path: Vec::new(),
            playback: Playback::default(),
            stop_requested: false,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != SequencerState::Idle
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn segment_duration(&self) -> Duration {
        self.segment_duration
    }

    pub fn set_segment_duration(&mut self, duration: Duration) {
        self.segment_duration = duration;
    }

    /// Progress of the active playback.
    pub fn playback(&self) -> Option<Playback> {
        self.is_active().then_some(self.playback)
    }

    /// Record a waypoint at the end of the sequence.
    pub fn add_waypoint(&mut self, joints: JointVector, position: Option<[f64; 3]>) {
        self.waypoints.push(Waypoint { joints, position });
        info!(count = self.waypoints.len(), %joints, "Waypoint recorded");
    }

    /// Drop every waypoint and cancel playback immediately.
    pub fn clear(&mut self) {
        self.waypoints.clear();
        self.reset();
        info!("Waypoints cleared");
    }

    /// Start playing the recorded waypoints from `current`.
    ///
    /// When `current` is not already at the first waypoint it is recorded as
    /// a new leading waypoint, so the arm moves there smoothly first.
    pub fn play(&mut self, current: JointVector) -> Result<(), SequencerError> {
        let Some(first) = self.waypoints.first() else {
            warn!("No waypoints recorded");
            return Err(SequencerError::NoWaypoints);
        };

        if !current.approx_eq(&first.joints, JOINT_TOLERANCE_DEG) {
            debug!(%current, first = %first.joints, "Inserting current position as start waypoint");
            self.waypoints.insert(0, Waypoint::new(current));
        }

        let path = self.waypoints.iter().map(|w| w.joints).collect();
        self.start(path);
        info!(waypoints = self.waypoints.len(), "Playback started");
        Ok(())
    }

    /// Move smoothly from `current` to `home` without touching the recording.
    pub fn home(&mut self, current: JointVector, home: JointVector) {
        self.start(vec![current, home]);
        info!(%home, "Returning to home position");
    }

    /// Request that playback stop at the next tick.
    pub fn stop(&mut self) {
        if self.is_active() {
            self.stop_requested = true;
            debug!("Playback stop requested");
        }
    }

    /// One scheduling tick. Returns the target to send, if any.
    pub fn advance(&mut self, dt: Duration) -> Option<JointVector> {
        if self.state == SequencerState::Idle {
            return None;
        }
        if self.stop_requested {
            info!(pair = self.playback.pair_index, "Playback stopped");
            self.reset();
            return None;
        }
        self.state = SequencerState::Playing;

        match self.playback.step(&self.path, self.segment_duration, dt) {
            Step::Moving(target) => Some(target),
            Step::Finished(target) => {
                info!("Playback finished");
                self.reset();
                Some(target)
            }
            Step::Empty => {
                debug!("Already at the only waypoint, nothing to play");
                self.reset();
                None
            }
        }
    }

    /// RAPID module that replays the recorded waypoints.
    pub fn export_rapid(&self, module_name: &str) -> Result<String, SequencerError> {
        if self.waypoints.is_empty() {
            warn!("No waypoints to export");
            return Err(SequencerError::NoWaypoints);
        }
        Ok(rapid::render_module(module_name, &self.waypoints))
    }

    /// Write [`export_rapid`](Self::export_rapid) output to `path`.
    pub fn export_rapid_to_file(
        &self,
        module_name: &str,
        path: impl AsRef<Path>,
    ) -> Result<(), EgmError> {
        let path = path.as_ref();
        let program = self.export_rapid(module_name)?;
        std::fs::write(path, program).map_err(|e| EgmError::file_error(path.to_path_buf(), e))?;
        info!(path = %path.display(), waypoints = self.waypoints.len(), "RAPID program exported");
        Ok(())
    }

    fn start(&mut self, path: Vec<JointVector>) {
        self.path = path;
        self.playback = Playback::default();
        self.stop_requested = false;
        self.state = SequencerState::PlaybackPending;
    }

    fn reset(&mut self) {
        self.state = SequencerState::Idle;
        self.path.clear();
        self.playback = Playback::default();
        self.stop_requested = false;
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new(DEFAULT_SEGMENT_DURATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FRAME: Duration = Duration::from_micros(16_667);

    fn j1(angle: f64) -> JointVector {
        JointVector::new([angle, 0.0, 0.0, 0.0, 0.0, 0.0])
    }

    fn run_to_end(sequencer: &mut Sequencer, dt: Duration) -> Vec<JointVector> {
        let mut targets = Vec::new();
        while let Some(target) = sequencer.advance(dt) {
            targets.push(target);
            assert!(targets.len() < 100_000, "playback never finished");
        }
        targets
    }

    #[test]
    fn play_without_waypoints_does_nothing() {
        let mut sequencer = Sequencer::default();
        assert_eq!(sequencer.play(JointVector::ZERO), Err(SequencerError::NoWaypoints));
        assert_eq!(sequencer.state(), SequencerState::Idle);
        assert_eq!(sequencer.advance(FRAME), None);
    }

    #[test]
    fn single_axis_sweep_is_monotonic_and_lands_exactly() {
        let mut sequencer = Sequencer::new(Duration::from_secs(2));
        sequencer.add_waypoint(JointVector::ZERO, None);
        sequencer.add_waypoint(j1(90.0), None);

        sequencer.play(JointVector::ZERO).unwrap();
        assert_eq!(sequencer.state(), SequencerState::PlaybackPending);
        assert_eq!(sequencer.waypoints().len(), 2, "already at start, nothing inserted");

        let targets = run_to_end(&mut sequencer, FRAME);
        let joint1: Vec<f64> = targets.iter().map(|t| t.as_array()[0]).collect();

        assert!(joint1.windows(2).all(|w| w[0] <= w[1]));
        assert!(joint1[0] >= 0.0);
        assert_eq!(*joint1.last().unwrap(), 90.0);
        assert_eq!(sequencer.state(), SequencerState::Idle);
        // 2 s at 60 Hz
        assert!((119..=121).contains(&targets.len()));
    }

    #[test]
    fn playback_moves_from_current_position_first() {
        let mut sequencer = Sequencer::new(Duration::from_secs(1));
        sequencer.add_waypoint(j1(10.0), None);
        sequencer.add_waypoint(j1(20.0), None);

        sequencer.play(j1(-30.0)).unwrap();
        assert_eq!(sequencer.waypoints()[0].joints, j1(-30.0));
        assert_eq!(sequencer.waypoints().len(), 3);

        let first = sequencer.advance(Duration::from_millis(500)).unwrap();
        assert_eq!(first, j1(-10.0));
        assert_eq!(sequencer.state(), SequencerState::Playing);

        let rest = run_to_end(&mut sequencer, Duration::from_millis(500));
        assert_eq!(rest, vec![j1(10.0), j1(15.0), j1(20.0)]);
    }

    #[test]
    fn tolerance_avoids_a_duplicate_start() {
        let mut sequencer = Sequencer::default();
        sequencer.add_waypoint(j1(45.0), None);
        sequencer.add_waypoint(j1(50.0), None);

        sequencer.play(j1(45.0 + JOINT_TOLERANCE_DEG / 2.0)).unwrap();
        assert_eq!(sequencer.waypoints().len(), 2);
    }

    #[test]
    fn single_waypoint_at_current_position_finishes_immediately() {
        let mut sequencer = Sequencer::default();
        sequencer.add_waypoint(j1(5.0), None);

        sequencer.play(j1(5.0)).unwrap();
        assert_eq!(sequencer.advance(FRAME), None);
        assert_eq!(sequencer.state(), SequencerState::Idle);
    }

    #[test]
    fn stop_takes_effect_on_next_tick() {
        let mut sequencer = Sequencer::default();
        sequencer.add_waypoint(JointVector::ZERO, None);
        sequencer.add_waypoint(j1(90.0), None);
        sequencer.play(JointVector::ZERO).unwrap();

        assert!(sequencer.advance(FRAME).is_some());
        sequencer.stop();
        assert!(sequencer.is_active());
        assert_eq!(sequencer.advance(FRAME), None);
        assert_eq!(sequencer.state(), SequencerState::Idle);
        assert_eq!(sequencer.waypoints().len(), 2, "recording survives a stop");
    }

    #[test]
    fn clear_cancels_playback() {
        let mut sequencer = Sequencer::default();
        sequencer.add_waypoint(JointVector::ZERO, None);
        sequencer.add_waypoint(j1(90.0), None);
        sequencer.play(JointVector::ZERO).unwrap();

        sequencer.clear();
        assert!(sequencer.waypoints().is_empty());
        assert_eq!(sequencer.state(), SequencerState::Idle);
        assert_eq!(sequencer.advance(FRAME), None);
    }

    #[test]
    fn home_ends_at_home_and_keeps_the_recording() {
        let mut sequencer = Sequencer::new(Duration::from_secs(2));
        sequencer.add_waypoint(j1(30.0), Some([0.3, 0.0, 0.5]));

        let current = JointVector::new([30.0, -20.0, 10.0, 5.0, 60.0, 90.0]);
        sequencer.home(current, JointVector::ZERO);
        let targets = run_to_end(&mut sequencer, FRAME);

        assert_eq!(*targets.last().unwrap(), JointVector::ZERO);
        assert_eq!(sequencer.waypoints().len(), 1);
        assert_eq!(sequencer.waypoints()[0].position, Some([0.3, 0.0, 0.5]));
    }

    #[test]
    fn export_rounds_to_two_decimals() {
        let mut sequencer = Sequencer::default();
        sequencer.add_waypoint(JointVector::new([1.005, 2.0, 3.0, 4.0, 5.0, 6.0]), None);

        let program = sequencer.export_rapid(DEFAULT_MODULE_NAME).unwrap();
        let line = program.lines().find(|l| l.contains("waypoint :=")).unwrap();
        assert!(line.contains("1.00") || line.contains("1.01"), "{line}");
        assert_eq!(program.matches("MoveAbsJ").count(), 1);
    }

    #[test]
    fn export_without_waypoints_fails() {
        let sequencer = Sequencer::default();
        assert_eq!(sequencer.export_rapid(DEFAULT_MODULE_NAME), Err(SequencerError::NoWaypoints));
    }

    #[test]
    fn export_to_file_writes_the_module() {
        let mut sequencer = Sequencer::default();
        sequencer.add_waypoint(j1(12.5), None);
        let path = std::env::temp_dir()
            .join(format!("egm-bridge-{}-{}", std::process::id(), DEFAULT_EXPORT_FILE));

        sequencer.export_rapid_to_file(DEFAULT_MODULE_NAME, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(written, sequencer.export_rapid(DEFAULT_MODULE_NAME).unwrap());
    }

    #[test]
    fn export_to_missing_directory_is_a_file_error() {
        let mut sequencer = Sequencer::default();
        sequencer.add_waypoint(j1(1.0), None);
        let path = std::env::temp_dir()
            .join("egm-bridge-missing-dir")
            .join("nested")
            .join(DEFAULT_EXPORT_FILE);

        let result = sequencer.export_rapid_to_file(DEFAULT_MODULE_NAME, &path);
        assert!(matches!(result, Err(EgmError::File { .. })));
    }

    proptest! {
        #[test]
        fn one_move_per_waypoint(count in 1usize..40) {
            let mut sequencer = Sequencer::default();
            for i in 0..count {
                sequencer.add_waypoint(j1(i as f64), None);
            }
            let program = sequencer.export_rapid(DEFAULT_MODULE_NAME).unwrap();
            prop_assert_eq!(program.matches("MoveAbsJ").count(), count);
        }

        #[test]
        fn playback_always_ends_on_the_last_waypoint(
            angles in proptest::collection::vec(-165.0f64..165.0, 1..6),
            start in -165.0f64..165.0,
            frame_ms in 1u64..200,
        ) {
            let mut sequencer = Sequencer::new(Duration::from_millis(250));
            for angle in &angles {
                sequencer.add_waypoint(j1(*angle), None);
            }
            sequencer.play(j1(start)).unwrap();

            let targets = run_to_end(&mut sequencer, Duration::from_millis(frame_ms));
            let last = *angles.last().unwrap();
            match targets.last() {
                Some(target) => prop_assert_eq!(*target, j1(last)),
                None => prop_assert!(
                    (start - angles[0]).abs() <= JOINT_TOLERANCE_DEG && angles.len() == 1
                ),
            }
        }
    }
}
