//! Noise gate for the natural-voice path.
//!
//! Tracks a smoothed power estimate and compares it against a learned
//! noise level `L`:
//!
//! | Power | Action |
//! |-------|--------|
//! | `< L` | mute |
//! | `L ..< 2L` | scale by `(power - L) / L` |
//! | `>= 2L` | pass |
//!
//! The gate is inactive until a level has been learned or learning is in
//! progress. While learning, the level ratchets up to the highest power seen
//! at the end of each block.

use crate::math::flush_denormal;

/// Smoothing time constant of the gate power estimate, in samples.
pub const GATE_SMOOTHNESS: f32 = 512.0;

/// Power-tracking noise gate.
#[derive(Debug, Clone, Default)]
pub struct NaturalGate {
    power: f32,
    level: f32,
}

impl NaturalGate {
    /// Create a gate with no learned level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Learned noise level (0 when nothing has been learned).
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Current power estimate.
    pub fn power(&self) -> f32 {
        self.power
    }

    /// Forget the learned level.
    pub fn clear_level(&mut self) {
        self.level = 0.0;
    }

    /// Zero the power estimate.
    pub fn reset_power(&mut self) {
        self.power = 0.0;
    }

    /// Gate one block in place.
    pub fn process_block(&mut self, buffer: &mut [f32], learning: bool) {
        if self.level <= 0.0 && !learning {
            return;
        }

        let level = self.level;
        let open = level * 2.0;
        for sample in buffer.iter_mut() {
            let x = *sample;
            self.power = flush_denormal(self.power + (x * x - self.power) / GATE_SMOOTHNESS);
            if self.power < level {
                *sample = 0.0;
            } else if self.power < open {
                *sample *= (self.power - level) / level;
            }
        }

        if learning && self.power > self.level {
            self.level = self.power;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_without_level() {
        let mut gate = NaturalGate::new();
        let mut block = [0.001f32; 64];
        gate.process_block(&mut block, false);
        assert!(block.iter().all(|&s| s == 0.001));
        assert_eq!(gate.power(), 0.0);
    }

    #[test]
    fn test_learning_ratchets_level() {
        let mut gate = NaturalGate::new();
        let mut block = [0.1f32; 4096];
        gate.process_block(&mut block, true);
        let learned = gate.level();
        assert!(learned > 0.009 && learned <= 0.01, "level {learned}");

        let mut quieter = [0.01f32; 4096];
        gate.process_block(&mut quieter, true);
        assert_eq!(gate.level(), learned);
    }

    #[test]
    fn test_mutes_below_level_and_passes_loud_signal() {
        let mut gate = NaturalGate::new();
        let mut noise = [0.05f32; 8192];
        gate.process_block(&mut noise, true);

        let mut quiet = [0.01f32; 8192];
        gate.process_block(&mut quiet, false);
        assert_eq!(quiet[8191], 0.0);

        let mut loud = [0.5f32; 8192];
        gate.process_block(&mut loud, false);
        assert_eq!(loud[8191], 0.5);
    }

    #[test]
    fn test_partial_attenuation_in_knee() {
        let mut gate = NaturalGate::new();
        let mut noise = [0.1f32; 8192];
        gate.process_block(&mut noise, true);
        let level = gate.level();

        // Settle at 1.5x the learned power.
        let x = libm::sqrtf(1.5 * level);
        let mut knee = [x; 16384];
        gate.process_block(&mut knee, false);
        let expected = x * (gate.power() - level) / level;
        assert!((knee[16383] - expected).abs() < 1e-4);
        assert!(knee[16383] < x && knee[16383] > 0.0);
    }

    #[test]
    fn test_clear_level_disables_gate() {
        let mut gate = NaturalGate::new();
        let mut noise = [0.1f32; 1024];
        gate.process_block(&mut noise, true);
        gate.clear_level();
        gate.reset_power();
        let mut block = [0.001f32; 16];
        gate.process_block(&mut block, false);
        assert!(block.iter().all(|&s| s == 0.001));
    }
}
