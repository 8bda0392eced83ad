//! Property-based tests for vocora-core primitives.
//!
//! Output bounds of the dynamics stage, echo stability, gate attenuation,
//! and note mapping totality, using proptest for randomized input.

use proptest::prelude::*;
use vocora_core::{
    Compressor, Dynamics, Echo, Effect, NaturalGate, NoteSlot, PeakLimiter, REGISTERS,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Whatever the gain, threshold, and input, the dynamics stage emits
    /// finite samples in [-1, 1].
    #[test]
    fn dynamics_output_is_bounded(
        gain_db in -20i32..=30,
        threshold_db in -60i32..=0,
        input in prop::collection::vec(-8.0f32..=8.0f32, 1..2048),
    ) {
        let mut dynamics = Dynamics::new();
        let mut block = input;
        dynamics.process_block(&mut block, gain_db, threshold_db);
        for &s in &block {
            prop_assert!(s.is_finite());
            prop_assert!(s.abs() <= 1.0 + 1e-6, "sample {} out of range", s);
        }
    }

    /// Compressor gain never exceeds unity and never increases with power.
    #[test]
    fn compressor_gain_is_monotonic(
        threshold_db in -60i32..=-3,
        p in 1e-6f32..1e6f32,
        factor in 1.0f32..16.0f32,
    ) {
        let comp = Compressor::new(threshold_db);
        let g1 = comp.gain_for_power(p);
        let g2 = comp.gain_for_power(p * factor);
        prop_assert!(g1 <= 1.0);
        prop_assert!(g2 <= g1 + 1e-6, "gain rose from {} to {}", g1, g2);
        prop_assert!(g2 > 0.0);
    }

    /// The limiter alone never lets a sample through above unit magnitude.
    #[test]
    fn limiter_ceiling(input in prop::collection::vec(-100.0f32..=100.0f32, 1..1024)) {
        let mut limiter = PeakLimiter::new();
        for &x in &input {
            let y = limiter.process(x);
            prop_assert!(y.abs() <= 1.0 + 1e-6);
        }
    }

    /// Bounded input through the echo yields bounded output: the feedback
    /// loop gain of 1/8 can at most amplify by 8/7.
    #[test]
    fn echo_is_stable(
        delay in 1usize..4096,
        input in prop::collection::vec(-1.0f32..=1.0f32, 1..8192),
    ) {
        let mut echo = Echo::new();
        echo.retime(delay);
        for &x in &input {
            let y = echo.process(x);
            prop_assert!(y.abs() <= 8.0 / 7.0 + 1e-4);
        }
    }

    /// The gate only ever attenuates.
    #[test]
    fn gate_never_amplifies(
        learn in prop::collection::vec(-0.5f32..=0.5f32, 256..1024),
        input in prop::collection::vec(-1.0f32..=1.0f32, 1..2048),
    ) {
        let mut gate = NaturalGate::new();
        let mut learn = learn;
        gate.process_block(&mut learn, true);
        let mut block = input.clone();
        gate.process_block(&mut block, false);
        for (x, y) in input.iter().zip(&block) {
            prop_assert!(y.abs() <= x.abs() + 1e-7);
        }
    }

    /// Every note at or above -128 maps to a valid class and register.
    #[test]
    fn note_mapping_is_total(note in -128i32..1000) {
        let slot = NoteSlot::from_relative(note);
        prop_assert!(slot.is_some());
        let slot = slot.unwrap();
        prop_assert!(slot.class < 12);
        prop_assert!(slot.register < REGISTERS);
    }
}
