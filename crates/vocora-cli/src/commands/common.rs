//! Shared CLI arguments used by `run` and `process`.

use clap::{Args, ValueEnum};
use vocora_core::{
    ControlParams, DEFAULT_GAIN_DB, DEFAULT_THRESHOLD_DB, KeyingMode, MappingMode, ThroughMode,
};

/// Spectral mapping, as named on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Band {
    /// Sparse harmonics
    Thin,
    /// Dense spectrum
    Wide,
}

impl From<Band> for MappingMode {
    fn from(band: Band) -> Self {
        match band {
            Band::Thin => MappingMode::Thin,
            Band::Wide => MappingMode::Wide,
        }
    }
}

/// Note keying, as named on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Keys {
    /// One note at a time
    Single,
    /// Bassline plus melody
    Double,
    /// Notes struck together form a chord
    Chords,
}

impl From<Keys> for KeyingMode {
    fn from(keys: Keys) -> Self {
        match keys {
            Keys::Single => KeyingMode::Single,
            Keys::Double => KeyingMode::Double,
            Keys::Chords => KeyingMode::Chords,
        }
    }
}

/// Voice-through, as named on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Thru {
    /// Vocoder only while notes are held
    Solo,
    /// Natural voice mixed under the vocoder
    Mix,
}

impl From<Thru> for ThroughMode {
    fn from(thru: Thru) -> Self {
        match thru {
            Thru::Solo => ThroughMode::Solo,
            Thru::Mix => ThroughMode::Mix,
        }
    }
}

/// Initial engine parameters.
#[derive(Args, Debug, Clone)]
pub struct ParamArgs {
    /// Input gain in dB
    #[arg(long, default_value_t = DEFAULT_GAIN_DB, allow_negative_numbers = true)]
    pub gain: i32,

    /// Formant shift (0.20 to 4.00)
    #[arg(long, default_value_t = 1.0)]
    pub formant: f32,

    /// Spectral mapping
    #[arg(long, value_enum, default_value_t = Band::Thin)]
    pub band: Band,

    /// Note keying
    #[arg(long, value_enum, default_value_t = Keys::Chords)]
    pub keys: Keys,

    /// Natural voice alongside the vocoder
    #[arg(long, value_enum, default_value_t = Thru::Solo)]
    pub thru: Thru,

    /// Compressor threshold in dB (0 disables, down to -60 in 3 dB steps)
    #[arg(long, default_value_t = DEFAULT_THRESHOLD_DB, allow_negative_numbers = true)]
    pub comp: i32,

    /// Echo delay in samples (off when omitted)
    #[arg(long)]
    pub echo: Option<usize>,
}

impl ParamArgs {
    /// Write these values into `params`.
    pub fn apply(&self, params: &ControlParams) {
        params.set_gain_db(self.gain);
        params.set_formant(self.formant);
        params.set_mapping(self.band.into());
        params.set_keying(self.keys.into());
        params.set_through(self.thru.into());
        params.set_threshold_db(self.comp);
        if let Some(delay) = self.echo {
            params.set_echo(Some(delay));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        params: ParamArgs,
    }

    #[test]
    fn test_defaults_match_control_params() {
        let args = Harness::parse_from(["vocora"]).params;
        let params = ControlParams::new();
        let before = params.snapshot();
        args.apply(&params);
        let after = params.snapshot();

        assert_eq!(after.gain_db, before.gain_db);
        assert_eq!(after.threshold_db, before.threshold_db);
        assert_eq!(after.mapping, before.mapping);
        assert_eq!(after.through, before.through);
        assert_eq!(params.keying(), KeyingMode::Chords);
        assert!(!after.echo_enabled);
    }

    #[test]
    fn test_negative_values_and_enums() {
        let args = Harness::parse_from([
            "vocora", "--gain", "-6", "--comp", "-30", "--band", "wide", "--keys", "double",
            "--thru", "mix", "--echo", "9000",
        ])
        .params;
        let params = ControlParams::new();
        args.apply(&params);

        assert_eq!(params.gain_db(), -6);
        assert_eq!(params.threshold_db(), -30);
        assert_eq!(params.mapping(), MappingMode::Wide);
        assert_eq!(params.keying(), KeyingMode::Double);
        assert_eq!(params.through(), ThroughMode::Mix);
        assert!(params.echo_enabled());
        assert_eq!(params.echo_delay(), 9000);
    }
}
