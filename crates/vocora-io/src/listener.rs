//! Note listener thread.
//!
//! The only writer of note activation flags. It blocks on a channel of
//! [`NoteEvent`]s (from a MIDI bridge, the command line, or a test) and
//! applies the current keying mode through a [`NoteKeyer`]. The thread ends
//! when every sender has been dropped.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::Receiver;
use vocora_core::{ControlParams, NoteEvent, NoteKeyer};

/// Spawn the listener. Event times are measured from the spawn instant.
pub fn spawn_note_listener(
    events: Receiver<NoteEvent>,
    params: Arc<ControlParams>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("vocora-notes".into())
        .spawn(move || {
            let epoch = Instant::now();
            let mut keyer = NoteKeyer::new();
            for event in events {
                tracing::debug!(?event, keying = ?params.keying(), "note event");
                keyer.apply(event, epoch.elapsed(), &params);
            }
            tracing::debug!("note listener stopped");
        })
}
