//! Resumable linear playback along a joint-space path

use std::time::Duration;

use crate::types::JointVector;

/// Position inside a playback: which pair of path points is active and how
/// long it has been running. Advanced once per host tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Playback {
    pub pair_index: usize,
    pub elapsed: Duration,
}

/// Result of advancing a playback by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Step {
    /// Target for this tick; playback continues.
    Moving(JointVector),
    /// Final target of the last pair; playback is over.
    Finished(JointVector),
    /// The path has no pair to interpolate.
    Empty,
}

impl Playback {
    /// Advance along `path` by `dt`, each pair taking `segment`.
    ///
    /// When a pair completes, the exact end point is returned and the next
    /// pair starts from zero elapsed time on the following tick.
    pub(crate) fn step(&mut self, path: &[JointVector], segment: Duration, dt: Duration) -> Step {
        let (Some(start), Some(end)) = (path.get(self.pair_index), path.get(self.pair_index + 1))
        else {
            return Step::Empty;
        };

        self.elapsed = self.elapsed.saturating_add(dt);
        let t = if segment.is_zero() {
            1.0
        } else {
            (self.elapsed.as_secs_f64() / segment.as_secs_f64()).clamp(0.0, 1.0)
        };
        let target = start.lerp(end, t);

        if t < 1.0 {
            return Step::Moving(target);
        }

        self.pair_index += 1;
        self.elapsed = Duration::ZERO;
        if self.pair_index + 1 >= path.len() {
            Step::Finished(target)
        } else {
            Step::Moving(target)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn j1(angle: f64) -> JointVector {
        JointVector::new([angle, 0.0, 0.0, 0.0, 0.0, 0.0])
    }

    #[test]
    fn pair_ends_exactly_on_the_end_point() {
        let path = [j1(0.0), j1(90.0)];
        let mut playback = Playback::default();

        assert_eq!(
            playback.step(&path, Duration::from_secs(2), Duration::from_secs(1)),
            Step::Moving(j1(45.0))
        );
        assert_eq!(
            playback.step(&path, Duration::from_secs(2), Duration::from_millis(1500)),
            Step::Finished(j1(90.0))
        );
    }

    #[test]
    fn next_pair_restarts_elapsed() {
        let path = [j1(0.0), j1(10.0), j1(30.0)];
        let segment = Duration::from_secs(1);
        let mut playback = Playback::default();

        assert_eq!(playback.step(&path, segment, Duration::from_secs(1)), Step::Moving(j1(10.0)));
        assert_eq!(playback, Playback { pair_index: 1, elapsed: Duration::ZERO });
        let half = Duration::from_millis(500);
        assert_eq!(playback.step(&path, segment, half), Step::Moving(j1(20.0)));
        assert_eq!(playback.step(&path, segment, half), Step::Finished(j1(30.0)));
    }

    #[test]
    fn huge_tick_finishes_without_overflow() {
        let path = [j1(0.0), j1(10.0), j1(20.0)];
        let segment = Duration::from_secs(2);
        let mut playback = Playback { pair_index: 0, elapsed: Duration::from_secs(1) };

        assert_eq!(playback.step(&path, segment, Duration::MAX), Step::Moving(j1(10.0)));
        assert_eq!(playback.step(&path, segment, Duration::MAX), Step::Finished(j1(20.0)));
    }

    #[test]
    fn zero_segment_jumps_to_the_end() {
        let path = [j1(0.0), j1(5.0)];
        let mut playback = Playback::default();
        assert_eq!(playback.step(&path, Duration::ZERO, Duration::ZERO), Step::Finished(j1(5.0)));
    }

    #[test]
    fn single_point_has_nothing_to_play() {
        let mut playback = Playback::default();
        let (segment, frame) = (Duration::from_secs(2), Duration::from_millis(16));
        assert_eq!(playback.step(&[j1(1.0)], segment, frame), Step::Empty);
        assert_eq!(playback.step(&[], segment, frame), Step::Empty);
    }
}
