//! Pitch layout for a sample rate.

use clap::Args;
use vocora_core::REGISTERS;
use vocora_vocoder::PitchLayout;

/// Show the note tables the engine derives for a sample rate.
#[derive(Args)]
pub struct InfoArgs {
    /// Sample rate in Hz
    #[arg(long, default_value = "48000")]
    pub sample_rate: u32,
}

/// Run the info command.
pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let layout = PitchLayout::new(args.sample_rate as f32)?;
    print!("{}", describe(&layout));
    Ok(())
}

/// Table of classes, periods and register labels.
pub fn describe(layout: &PitchLayout) -> String {
    let mut out = format!(
        "Pitch layout at {} Hz\n\
         relative note 0 = MIDI {}, offset {:+} semitones from A2\n\n\
         {:<4} {:<4} {:>6} {:>9}  registers\n",
        layout.sample_rate(),
        layout.midi_low(),
        layout.offset(),
        "rel",
        "name",
        "period",
        "harmonics",
    );

    for (class, pc) in layout.classes().iter().enumerate() {
        let registers: Vec<String> = (0..REGISTERS)
            .filter_map(|r| {
                let label = layout.label(class, r)?;
                let hz = layout.frequency(class, r)?;
                Some(format!("{label} {hz:.1}Hz"))
            })
            .collect();
        out.push_str(&format!(
            "{:<4} {:<4} {:>6} {:>9}  {}\n",
            class,
            pc.name,
            pc.period,
            pc.harmonics(),
            registers.join(", ")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_lists_every_class() {
        let layout = PitchLayout::new(48000.0).unwrap();
        let text = describe(&layout);
        assert!(text.starts_with("Pitch layout at 48000 Hz"));
        // Header, midi line, blank, column heads, then twelve classes.
        assert_eq!(text.lines().count(), 4 + 12);
        for pc in layout.classes() {
            assert!(text.contains(&format!(" {:<4} ", pc.name)));
        }
    }
}
