//! # Presentation Time Synthesis
//!
//! The decode engine hands out frames without timestamps. [`FrameClock`]
//! derives them from the essence frame rate: the n-th frame after the last
//! reset is presented at `base + round(n * 1_000_000 / frame_rate)`.
//!
//! The unrounded elapsed time is carried in an accumulator and only rounded
//! when read, so the error of any timestamp stays below one microsecond no
//! matter how many frames have been emitted.

use crate::error::{PlaybackError, Result};

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Synthesises presentation timestamps at a constant frame rate.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameClock {
    frame_rate: f32,
    interval_us: f64,
    base_us: i64,
    elapsed_us: f64,
    frames: u64,
}

impl FrameClock {
    /// Fails with [`PlaybackError::InvalidFrameRate`] unless `frame_rate` is
    /// finite and positive.
    pub fn new(frame_rate: f32) -> Result<Self> {
        validate_frame_rate(frame_rate)?;
        Ok(Self {
            frame_rate,
            interval_us: MICROS_PER_SECOND / f64::from(frame_rate),
            base_us: 0,
            elapsed_us: 0.0,
            frames: 0,
        })
    }

    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    /// Nominal duration of one frame, rounded to whole microseconds.
    pub fn frame_duration_us(&self) -> i64 {
        self.interval_us.round() as i64
    }

    /// Presentation time of the next frame.
    pub fn pts_us(&self) -> i64 {
        self.base_us + self.elapsed_us.round() as i64
    }

    /// Returns the presentation time of the frame being emitted and moves the
    /// clock to the next one.
    pub fn advance(&mut self) -> i64 {
        let pts = self.pts_us();
        self.elapsed_us += self.interval_us;
        self.frames += 1;
        pts
    }

    /// Restart counting from `time_us` (after a seek).
    pub fn reset_to(&mut self, time_us: i64) {
        self.base_us = time_us;
        self.elapsed_us = 0.0;
        self.frames = 0;
    }

    /// Frames emitted since the last reset.
    pub fn frames_since_reset(&self) -> u64 {
        self.frames
    }
}

/// Checks that a frame rate can drive pacing and duration computations.
pub fn validate_frame_rate(frame_rate: f32) -> Result<()> {
    if frame_rate.is_finite() && frame_rate > 0.0 {
        Ok(())
    } else {
        Err(PlaybackError::InvalidFrameRate(frame_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_four_fps_timestamps() {
        let mut clock = FrameClock::new(24.0).unwrap();
        let pts: Vec<i64> = (0..10).map(|_| clock.advance()).collect();

        assert_eq!(
            pts,
            vec![0, 41667, 83333, 125000, 166667, 208333, 250000, 291667, 333333, 375000]
        );
        assert_eq!(clock.frame_duration_us(), 41667);
        assert_eq!(clock.frames_since_reset(), 10);
    }

    #[test]
    fn consecutive_deltas_stay_within_one_microsecond_of_interval() {
        for rate in [23.976_f32, 24.0, 25.0, 29.97, 48.0, 60.0] {
            let mut clock = FrameClock::new(rate).unwrap();
            let nominal = clock.frame_duration_us();
            let mut previous = clock.advance();
            for _ in 0..10_000 {
                let pts = clock.advance();
                assert!((pts - previous - nominal).abs() <= 1, "rate {}", rate);
                previous = pts;
            }
        }
    }

    #[test]
    fn no_drift_over_long_runs() {
        let rate = 23.976_f32;
        let mut clock = FrameClock::new(rate).unwrap();
        let interval = MICROS_PER_SECOND / f64::from(rate);

        for n in 0..200_000u64 {
            let pts = clock.advance();
            let exact = n as f64 * interval;
            assert!((pts as f64 - exact).abs() < 1.0, "frame {}", n);
        }
    }

    #[test]
    fn reset_rebases_on_seek_target() {
        let mut clock = FrameClock::new(24.0).unwrap();
        for _ in 0..5 {
            clock.advance();
        }

        clock.reset_to(2_000_000);
        assert_eq!(clock.frames_since_reset(), 0);
        assert_eq!(clock.advance(), 2_000_000);
        assert_eq!(clock.advance(), 2_041_667);
    }

    #[test]
    fn rejects_unusable_frame_rates() {
        for rate in [0.0_f32, -24.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                FrameClock::new(rate),
                Err(PlaybackError::InvalidFrameRate(_))
            ));
        }
    }
}
