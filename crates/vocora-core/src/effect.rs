//! Core per-sample processor trait.
//!
//! The [`Effect`] trait is shared by every sample-by-sample stage of the
//! vocoder's signal path: the DC pre-conditioner, the compressor, the peak
//! limiter, and the echo unit.
//!
//! ## Design Decisions
//!
//! - **Mono processing**: Single `f32` input/output. The vocoder is a
//!   single-channel instrument.
//!
//! - **Sample-count time constants**: Stages here are specified in samples
//!   (attack 4096, release 1024, ...), so there is no sample-rate hook.
//!
//! - **No allocations**: All methods are called from the audio callback.

/// Core trait for per-sample audio stages.
///
/// # Example
///
/// ```rust
/// use vocora_core::Effect;
///
/// struct Gain {
///     gain: f32,
/// }
///
/// impl Effect for Gain {
///     fn process(&mut self, input: f32) -> f32 {
///         input * self.gain
///     }
///
///     fn reset(&mut self) {
///         // Gain has no internal state to reset
///     }
/// }
/// ```
pub trait Effect {
    /// Process a single sample, advancing internal state by one sample.
    fn process(&mut self, input: f32) -> f32;

    /// Process a block of samples in-place.
    ///
    /// Default implementation processes each sample in place. Stages may
    /// override this to hoist per-block work out of the loop.
    fn process_block_inplace(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Clear all internal state (filter memories, estimates, buffers)
    /// without changing parameters.
    fn reset(&mut self);
}

/// Extension trait for chaining stages with static dispatch.
pub trait EffectExt: Effect + Sized {
    /// Chain this stage with another; the output of `self` feeds `next`.
    fn chain<E: Effect>(self, next: E) -> Chain<Self, E> {
        Chain {
            first: self,
            second: next,
        }
    }
}

// Blanket implementation for all Effects
impl<T: Effect> EffectExt for T {}

/// Two stages chained in series.
///
/// Created by [`EffectExt::chain`].
#[derive(Debug, Clone)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A: Effect, B: Effect> Effect for Chain<A, B> {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let mid = self.first.process(input);
        self.second.process(mid)
    }

    fn process_block_inplace(&mut self, buffer: &mut [f32]) {
        self.first.process_block_inplace(buffer);
        self.second.process_block_inplace(buffer);
    }

    fn reset(&mut self) {
        self.first.reset();
        self.second.reset();
    }
}

impl<A, B> Chain<A, B> {
    /// Get a reference to the first stage in the chain.
    pub fn first(&self) -> &A {
        &self.first
    }

    /// Get a mutable reference to the first stage in the chain.
    pub fn first_mut(&mut self) -> &mut A {
        &mut self.first
    }

    /// Get a reference to the second stage in the chain.
    pub fn second(&self) -> &B {
        &self.second
    }

    /// Get a mutable reference to the second stage in the chain.
    pub fn second_mut(&mut self) -> &mut B {
        &mut self.second
    }
}
