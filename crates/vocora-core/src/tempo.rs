//! Tap tempo for the echo delay.
//!
//! Four taps make one gesture. With tap times `t0..t3` (latest first), the
//! gesture is rhythmic when both
//!
//! ```text
//! |(t0 - t1)     - (t0 - t3) / 3| < 100 ms
//! |(t0 - t2) / 2 - (t0 - t3) / 3| < 100 ms
//! ```
//!
//! and the echo delay is the mean interval, `sample_rate * (t0 - t3) / 3`.

use core::time::Duration;

/// Taps per gesture.
pub const TAP_COUNT: usize = 4;

/// Largest allowed deviation of an interval from the mean interval.
pub const TAP_TOLERANCE: Duration = Duration::from_millis(100);

/// Result of a single tap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapOutcome {
    /// More taps needed.
    Pending {
        /// Taps still to go.
        remaining: usize,
    },
    /// Gesture complete and steady; delay in samples.
    Rhythmic {
        /// Mean tap interval in samples.
        delay: usize,
    },
    /// Gesture complete but too uneven to use.
    Irregular,
}

/// Collects taps into a delay time.
///
/// # Example
///
/// ```rust
/// use core::time::Duration;
/// use vocora_core::{TapOutcome, TapTempo};
///
/// let mut tempo = TapTempo::new();
/// for beat in 0..3 {
///     tempo.tap(Duration::from_millis(beat * 250), 48000.0);
/// }
/// let outcome = tempo.tap(Duration::from_millis(750), 48000.0);
/// assert_eq!(outcome, TapOutcome::Rhythmic { delay: 12000 });
/// ```
#[derive(Debug, Clone, Default)]
pub struct TapTempo {
    taps: [Duration; TAP_COUNT],
    count: usize,
}

impl TapTempo {
    /// Create an empty gesture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Taps collected in the gesture so far.
    pub fn pending(&self) -> usize {
        self.count
    }

    /// Abandon a partial gesture.
    pub fn cancel(&mut self) {
        self.count = 0;
    }

    /// Register a tap at time `now`.
    pub fn tap(&mut self, now: Duration, sample_rate: f32) -> TapOutcome {
        // Store earliest first; `taps[TAP_COUNT - 1]` ends up as the latest.
        self.taps[self.count] = now;
        self.count += 1;
        if self.count < TAP_COUNT {
            return TapOutcome::Pending { remaining: TAP_COUNT - self.count };
        }
        self.count = 0;

        let secs = |d: Duration| d.as_secs_f64();
        let t0 = secs(self.taps[3]);
        let t1 = secs(self.taps[2]);
        let t2 = secs(self.taps[1]);
        let t3 = secs(self.taps[0]);
        let mean = (t0 - t3) / 3.0;
        let tolerance = secs(TAP_TOLERANCE);

        if mean > 0.0
            && ((t0 - t1) - mean).abs() < tolerance
            && ((t0 - t2) / 2.0 - mean).abs() < tolerance
        {
            let delay = (f64::from(sample_rate) * mean) as usize;
            TapOutcome::Rhythmic { delay }
        } else {
            TapOutcome::Irregular
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(t: u64) -> Duration {
        Duration::from_millis(t)
    }

    #[test]
    fn test_pending_countdown() {
        let mut tempo = TapTempo::new();
        assert_eq!(tempo.tap(ms(0), 48000.0), TapOutcome::Pending { remaining: 3 });
        assert_eq!(tempo.tap(ms(300), 48000.0), TapOutcome::Pending { remaining: 2 });
        assert_eq!(tempo.tap(ms(600), 48000.0), TapOutcome::Pending { remaining: 1 });
        assert_eq!(tempo.pending(), 3);
    }

    #[test]
    fn test_steady_taps_give_mean_interval() {
        let mut tempo = TapTempo::new();
        let mut outcome = TapOutcome::Irregular;
        for t in [1000, 1200, 1400, 1600] {
            outcome = tempo.tap(ms(t), 44100.0);
        }
        assert_eq!(outcome, TapOutcome::Rhythmic { delay: 8820 });
        assert_eq!(tempo.pending(), 0);
    }

    #[test]
    fn test_slightly_uneven_taps_still_count() {
        let mut tempo = TapTempo::new();
        let mut outcome = TapOutcome::Irregular;
        for t in [0, 330, 580, 900] {
            outcome = tempo.tap(ms(t), 48000.0);
        }
        assert_eq!(outcome, TapOutcome::Rhythmic { delay: 14400 });
    }

    #[test]
    fn test_uneven_taps_rejected() {
        let mut tempo = TapTempo::new();
        let mut outcome = TapOutcome::Rhythmic { delay: 0 };
        for t in [0, 100, 200, 900] {
            outcome = tempo.tap(ms(t), 48000.0);
        }
        assert_eq!(outcome, TapOutcome::Irregular);
    }

    #[test]
    fn test_cancel_restarts_gesture() {
        let mut tempo = TapTempo::new();
        tempo.tap(ms(0), 48000.0);
        tempo.tap(ms(10), 48000.0);
        tempo.cancel();
        assert_eq!(tempo.tap(ms(5000), 48000.0), TapOutcome::Pending { remaining: 3 });
    }
}
