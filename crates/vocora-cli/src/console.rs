//! Line-oriented control console for a live session.
//!
//! Reads one command per line and turns it into control-parameter writes.
//! Note commands never touch the activation flags directly: they go out on
//! the note channel so the listener thread stays their only writer.

use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use crossbeam_channel::Sender;
use vocora_core::{
    ControlParams, ECHO_CAPACITY, NOISE_LEARN_WINDOW, NoteEvent, PITCH_CLASSES, TapOutcome,
    TapTempo,
};
use vocora_vocoder::PitchLayout;

use crate::commands::common::{Band, Keys, Thru};

/// Input gain limit either side of 0 dB.
pub const MAX_GAIN_DB: i32 = 40;

const HELP: &str = "\
commands:
  on N | off N        press or release relative note N
  clear               release every note (natural voice)
  gain +D | -D | N    nudge or set input gain in dB
  formant X           formant shift, 0.20 to 4.00
  band thin|wide      spectral mapping
  keys single|double|chords
  thru solo|mix       natural voice under the vocoder
  noise               learn the noise floor for one second, or forget it
  comp N              compressor threshold in dB (0 = off)
  echo N | off        echo delay in samples
  tap                 tap four times to time the echo
  rec                 start or stop recording
  status              show the current settings
  quit";

/// Gain edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GainChange {
    /// Relative, from a signed argument.
    By(i32),
    /// Absolute.
    To(i32),
}

/// One console command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    On(i32),
    Off(i32),
    Clear,
    Gain(GainChange),
    Formant(f32),
    Band(Band),
    Keys(Keys),
    Thru(Thru),
    Noise,
    Comp(i32),
    Echo(Option<usize>),
    Tap,
    Rec,
    Status,
    Help,
    Quit,
}

/// Why a line did not parse.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Blank line.
    #[error("empty command")]
    Empty,
    /// First word is not a command.
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    /// Missing or malformed argument.
    #[error("usage: {0}")]
    Usage(&'static str),
}

fn arg<T: FromStr>(word: Option<&str>, usage: &'static str) -> Result<T, ParseError> {
    word.and_then(|w| w.parse().ok())
        .ok_or(ParseError::Usage(usage))
}

fn choice<T: ValueEnum>(word: Option<&str>, usage: &'static str) -> Result<T, ParseError> {
    word.and_then(|w| T::from_str(w, true).ok())
        .ok_or(ParseError::Usage(usage))
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(ParseError::Empty);
        };
        let value = words.next();

        let command = match name.to_ascii_lowercase().as_str() {
            "on" => Self::On(arg(value, "on N")?),
            "off" => Self::Off(arg(value, "off N")?),
            "clear" => Self::Clear,
            "gain" => {
                let usage = "gain +D | -D | N";
                let text = value.ok_or(ParseError::Usage(usage))?;
                let db = arg(Some(text), usage)?;
                if text.starts_with(['+', '-']) {
                    Self::Gain(GainChange::By(db))
                } else {
                    Self::Gain(GainChange::To(db))
                }
            }
            "formant" => Self::Formant(arg(value, "formant X")?),
            "band" => Self::Band(choice(value, "band thin|wide")?),
            "keys" => Self::Keys(choice(value, "keys single|double|chords")?),
            "thru" => Self::Thru(choice(value, "thru solo|mix")?),
            "noise" => Self::Noise,
            "comp" => Self::Comp(arg(value, "comp N")?),
            "echo" => match value {
                Some(w) if w.eq_ignore_ascii_case("off") => Self::Echo(None),
                _ => Self::Echo(Some(arg(value, "echo N | off")?)),
            },
            "tap" => Self::Tap,
            "rec" => Self::Rec,
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

/// What the console says after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    /// Keep reading; print the message.
    Continue(String),
    /// Leave the session.
    Quit,
}

/// Interactive control thread state.
pub struct Console {
    params: Arc<ControlParams>,
    notes: Sender<NoteEvent>,
    layout: PitchLayout,
    tempo: TapTempo,
    epoch: Instant,
    learn_window: Duration,
}

impl Console {
    /// Console writing to `params` and sending note events on `notes`.
    pub fn new(params: Arc<ControlParams>, notes: Sender<NoteEvent>, layout: PitchLayout) -> Self {
        Self {
            params,
            notes,
            layout,
            tempo: TapTempo::new(),
            epoch: Instant::now(),
            learn_window: NOISE_LEARN_WINDOW,
        }
    }

    /// Override the noise learning window.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn with_learn_window(mut self, window: Duration) -> Self {
        self.learn_window = window;
        self
    }

    /// Read commands from `input` until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> io::Result<()> {
        for line in input.lines() {
            let line = line?;
            match line.parse::<Command>() {
                Err(ParseError::Empty) => {}
                Err(err) => writeln!(out, "{err}")?,
                Ok(Command::Noise) if !self.params.noise_removal() => {
                    writeln!(out, "learning noise, stay quiet...")?;
                    out.flush()?;
                    if let Reply::Continue(msg) = self.execute(Command::Noise) {
                        writeln!(out, "{msg}")?;
                    }
                }
                Ok(command) => match self.execute(command) {
                    Reply::Continue(msg) => writeln!(out, "{msg}")?,
                    Reply::Quit => break,
                },
            }
            out.flush()?;
        }
        Ok(())
    }

    /// Execute one command now.
    pub fn execute(&mut self, command: Command) -> Reply {
        let now = self.epoch.elapsed();
        self.execute_at(command, now)
    }

    /// Execute one command at session time `now` (used by tap tempo).
    pub fn execute_at(&mut self, command: Command, now: Duration) -> Reply {
        // A tap gesture only counts while nothing else happens in between.
        if command != Command::Tap {
            self.tempo.cancel();
        }
        let params = &self.params;
        let msg = match command {
            Command::On(note) => self.send(NoteEvent::On { note, velocity: 127 }, "on", note),
            Command::Off(note) => self.send(NoteEvent::Off { note }, "off", note),
            Command::Clear => match self.notes.send(NoteEvent::AllOff) {
                Ok(()) => "natural voice".to_string(),
                Err(_) => "note listener has stopped".to_string(),
            },
            Command::Gain(change) => {
                let db = match change {
                    GainChange::By(delta) => params.gain_db().saturating_add(delta),
                    GainChange::To(db) => db,
                };
                params.set_gain_db(db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB));
                format!("gain {} dB", params.gain_db())
            }
            Command::Formant(formant) => {
                params.set_formant(formant);
                format!("formant {:.2}", params.formant())
            }
            Command::Band(band) => {
                params.set_mapping(band.into());
                format!("band {:?}", params.mapping())
            }
            Command::Keys(keys) => {
                params.set_keying(keys.into());
                // The listener clears on the next event; do it now.
                if self.notes.send(NoteEvent::AllOff).is_err() {
                    tracing::warn!("note listener has stopped; held notes stay on");
                    return Reply::Continue(format!(
                        "keys {:?} (note listener has stopped)",
                        params.keying()
                    ));
                }
                format!("keys {:?}", params.keying())
            }
            Command::Thru(thru) => {
                params.set_through(thru.into());
                format!("thru {:?}", params.through())
            }
            Command::Noise => self.toggle_noise(),
            Command::Comp(db) => {
                params.set_threshold_db(db);
                match params.threshold_db() {
                    0 => "compressor off".to_string(),
                    thr => format!("compressor {thr} dB"),
                }
            }
            Command::Echo(delay) => self.set_echo(delay),
            Command::Tap => match self.tempo.tap(now, self.layout.sample_rate()) {
                TapOutcome::Pending { remaining } => format!("tap ({remaining} to go)"),
                TapOutcome::Rhythmic { delay } => self.set_echo(Some(delay)),
                TapOutcome::Irregular => {
                    params.set_echo(None);
                    "echo off (taps were uneven)".to_string()
                }
            },
            Command::Rec => {
                let on = !params.recording();
                params.set_recording(on);
                format!("recording {}", if on { "on" } else { "off" })
            }
            Command::Status => self.status(),
            Command::Help => HELP.to_string(),
            Command::Quit => return Reply::Quit,
        };
        Reply::Continue(msg)
    }

    fn send(&self, event: NoteEvent, verb: &str, note: i32) -> String {
        match self.notes.send(event) {
            Ok(()) => format!("{verb} {note}"),
            Err(_) => "note listener has stopped".to_string(),
        }
    }

    fn set_echo(&self, delay: Option<usize>) -> String {
        match (self.params.set_echo(delay), delay) {
            (true, Some(d)) => format!("echo {d} samples"),
            (false, Some(_)) => format!("echo off (delay must be 1..{ECHO_CAPACITY})"),
            _ => "echo off".to_string(),
        }
    }

    /// Forget the noise floor, or learn a new one over the learning window.
    /// Blocks the console for the window; the learning flag is ours to clear.
    fn toggle_noise(&self) -> String {
        let params = &self.params;
        params.request_noise_clear();
        if params.noise_removal() {
            params.set_noise_removal(false);
            return "noise removal off".to_string();
        }

        params.set_learning(true);
        thread::sleep(self.learn_window);
        params.set_learning(false);
        params.set_noise_removal(true);
        tracing::info!(window = ?self.learn_window, "noise floor learned");
        "noise removal on".to_string()
    }

    fn status(&self) -> String {
        let snap = self.params.snapshot();
        let notes: Vec<String> = (0..PITCH_CLASSES)
            .flat_map(|class| {
                snap.registers[class]
                    .iter()
                    .filter_map(move |register| self.layout.label(class, register))
            })
            .collect();
        let notes = if notes.is_empty() {
            "none".to_string()
        } else {
            notes.join(" ")
        };
        let echo = if snap.echo_enabled {
            format!("{} samples", snap.echo_delay)
        } else {
            "off".to_string()
        };
        let comp = match snap.threshold_db {
            0 => "off".to_string(),
            thr => format!("{thr} dB"),
        };

        format!(
            "notes: {notes}\n\
             gain: {} dB  formant: {:.2}  band: {:?}  keys: {:?}  thru: {:?}\n\
             noise removal: {}  compressor: {comp}  echo: {echo}  recording: {}",
            snap.gain_db,
            snap.formant,
            snap.mapping,
            self.params.keying(),
            snap.through,
            if self.params.noise_removal() { "on" } else { "off" },
            if snap.recording { "on" } else { "off" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{Receiver, unbounded};
    use vocora_core::{KeyingMode, MappingMode, ThroughMode};

    fn console() -> (Console, Arc<ControlParams>, Receiver<NoteEvent>) {
        let params = Arc::new(ControlParams::new());
        let (tx, rx) = unbounded();
        let layout = PitchLayout::new(48000.0).unwrap();
        let console = Console::new(Arc::clone(&params), tx, layout)
            .with_learn_window(Duration::from_millis(1));
        (console, params, rx)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("on 12".parse(), Ok(Command::On(12)));
        assert_eq!("  off -3 ".parse(), Ok(Command::Off(-3)));
        assert_eq!("gain +3".parse(), Ok(Command::Gain(GainChange::By(3))));
        assert_eq!("gain -6".parse(), Ok(Command::Gain(GainChange::By(-6))));
        assert_eq!("gain 10".parse(), Ok(Command::Gain(GainChange::To(10))));
        assert_eq!("band WIDE".parse(), Ok(Command::Band(Band::Wide)));
        assert_eq!("keys double".parse(), Ok(Command::Keys(Keys::Double)));
        assert_eq!("echo off".parse(), Ok(Command::Echo(None)));
        assert_eq!("echo 9000".parse(), Ok(Command::Echo(Some(9000))));
        assert_eq!("Quit".parse(), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Command>(), Err(ParseError::Empty));
        assert_eq!("on".parse::<Command>(), Err(ParseError::Usage("on N")));
        assert_eq!("band loud".parse::<Command>(), Err(ParseError::Usage("band thin|wide")));
        assert_eq!(
            "sing".parse::<Command>(),
            Err(ParseError::Unknown("sing".to_string()))
        );
    }

    #[test]
    fn test_notes_go_through_channel() {
        let (mut console, params, rx) = console();
        console.execute(Command::On(12));
        console.execute(Command::Off(12));
        console.execute(Command::Clear);

        assert_eq!(rx.try_recv(), Ok(NoteEvent::On { note: 12, velocity: 127 }));
        assert_eq!(rx.try_recv(), Ok(NoteEvent::Off { note: 12 }));
        assert_eq!(rx.try_recv(), Ok(NoteEvent::AllOff));
        assert!(!params.snapshot().any_active());
    }

    #[test]
    fn test_keys_change_releases_notes() {
        let (mut console, params, rx) = console();
        console.execute(Command::Keys(Keys::Single));
        assert_eq!(params.keying(), KeyingMode::Single);
        assert_eq!(rx.try_recv(), Ok(NoteEvent::AllOff));
    }

    #[test]
    fn test_keys_change_reports_stopped_listener() {
        let (mut console, params, rx) = console();
        drop(rx);
        let reply = console.execute(Command::Keys(Keys::Double));
        assert_eq!(params.keying(), KeyingMode::Double);
        assert_eq!(
            reply,
            Reply::Continue("keys Double (note listener has stopped)".to_string())
        );
    }

    #[test]
    fn test_gain_nudges_and_clamps() {
        let (mut console, params, _rx) = console();
        console.execute(Command::Gain(GainChange::By(3)));
        assert_eq!(params.gain_db(), 9);
        console.execute(Command::Gain(GainChange::To(100)));
        assert_eq!(params.gain_db(), MAX_GAIN_DB);
        console.execute(Command::Gain(GainChange::By(-200)));
        assert_eq!(params.gain_db(), -MAX_GAIN_DB);
    }

    #[test]
    fn test_settings() {
        let (mut console, params, _rx) = console();
        console.execute(Command::Band(Band::Wide));
        console.execute(Command::Thru(Thru::Mix));
        console.execute(Command::Formant(9.0));
        let reply = console.execute(Command::Comp(0));

        assert_eq!(params.mapping(), MappingMode::Wide);
        assert_eq!(params.through(), ThroughMode::Mix);
        assert!((params.formant() - 4.0).abs() < 1e-6);
        assert_eq!(reply, Reply::Continue("compressor off".to_string()));
    }

    #[test]
    fn test_noise_toggle() {
        let (mut console, params, _rx) = console();
        let seq = params.snapshot().noise_clear_seq;

        console.execute(Command::Noise);
        assert!(params.noise_removal());
        assert!(!params.learning());
        assert_eq!(params.snapshot().noise_clear_seq, seq.wrapping_add(1));

        console.execute(Command::Noise);
        assert!(!params.noise_removal());
        assert_eq!(params.snapshot().noise_clear_seq, seq.wrapping_add(2));
    }

    #[test]
    fn test_echo_commands() {
        let (mut console, params, _rx) = console();
        let reply = console.execute(Command::Echo(Some(8000)));
        assert_eq!(reply, Reply::Continue("echo 8000 samples".to_string()));
        assert!(params.echo_enabled());

        console.execute(Command::Echo(Some(ECHO_CAPACITY)));
        assert!(!params.echo_enabled());

        console.execute(Command::Echo(Some(8000)));
        console.execute(Command::Echo(None));
        assert!(!params.echo_enabled());
    }

    #[test]
    fn test_tap_tempo_sets_echo() {
        let (mut console, params, _rx) = console();
        for beat in 0..3 {
            let reply = console.execute_at(Command::Tap, Duration::from_millis(beat * 250));
            assert!(matches!(reply, Reply::Continue(ref m) if m.starts_with("tap")));
        }
        console.execute_at(Command::Tap, Duration::from_millis(750));
        assert!(params.echo_enabled());
        assert_eq!(params.echo_delay(), 12000);

        // An uneven gesture turns the echo off.
        for ms in [1000, 1100, 1600, 1700] {
            console.execute_at(Command::Tap, Duration::from_millis(ms));
        }
        assert!(!params.echo_enabled());
    }

    #[test]
    fn test_other_command_drops_half_tapped_gesture() {
        let (mut console, params, _rx) = console();
        for beat in 0..3 {
            console.execute_at(Command::Tap, Duration::from_millis(beat * 250));
        }
        console.execute_at(Command::Gain(GainChange::By(1)), Duration::from_millis(600));

        // The gesture starts over instead of completing on the next tap.
        let reply = console.execute_at(Command::Tap, Duration::from_millis(750));
        assert_eq!(reply, Reply::Continue("tap (3 to go)".to_string()));
        assert!(!params.echo_enabled());

        for beat in 1..4 {
            console.execute_at(Command::Tap, Duration::from_millis(750 + beat * 250));
        }
        assert!(params.echo_enabled());
        assert_eq!(params.echo_delay(), 12000);
    }

    #[test]
    fn test_rec_toggles() {
        let (mut console, params, _rx) = console();
        console.execute(Command::Rec);
        assert!(params.recording());
        console.execute(Command::Rec);
        assert!(!params.recording());
    }

    #[test]
    fn test_status_lists_note_labels() {
        let (mut console, params, _rx) = console();
        let c = PitchLayout::new(48000.0).unwrap().c_index();
        params.set_note(vocora_core::NoteSlot { class: c, register: 1 }, true);

        let Reply::Continue(status) = console.execute(Command::Status) else {
            panic!("status quit");
        };
        assert!(status.contains("notes: C2"), "{status}");
        assert!(status.contains("gain: 6 dB"), "{status}");
    }

    #[test]
    fn test_run_reads_until_quit() {
        let (mut console, params, rx) = console();
        let script = "on 5\n\nbogus\ngain 3\nquit\non 7\n";
        let mut out = Vec::new();
        console.run(script.as_bytes(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("on 5"));
        assert!(text.contains("unknown command 'bogus'"));
        assert_eq!(params.gain_db(), 3);
        assert_eq!(rx.try_iter().count(), 1);
    }
}
