//! Engine error taxonomy.
//!
//! Only configuration faults are errors. Everything else the engine meets
//! at run time (a NaN in the signal, a power estimate gone non-finite) is
//! absorbed as degraded output, never raised.

/// Fatal engine conditions.
///
/// Any of these except [`EngineError::InvalidSampleRate`] latches the engine:
/// once raised, every later block is silent and returns
/// [`EngineError::Halted`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Block length is zero or not a multiple of the analysis size.
    #[error("block length {len} is not a positive multiple of {fft_size} samples")]
    BlockSize {
        /// Offending block length.
        len: usize,
        /// Required granularity.
        fft_size: usize,
    },

    /// The host changed the sample rate after startup.
    #[error("sample rate changed from {initial} Hz to {requested} Hz")]
    SampleRateChanged {
        /// Rate the engine was built for.
        initial: f32,
        /// Rate the host asked for.
        requested: f32,
    },

    /// The sample rate given at construction is unusable.
    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(f32),

    /// Input and output buffers of one block have different lengths.
    #[error("input block has {input} samples but output block has {output}")]
    BufferMismatch {
        /// Input length.
        input: usize,
        /// Output length.
        output: usize,
    },

    /// A previous fatal error stopped the engine.
    #[error("engine halted after a fatal error")]
    Halted,
}

impl EngineError {
    /// Whether this error stops the engine for good.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidSampleRate(_))
    }
}
