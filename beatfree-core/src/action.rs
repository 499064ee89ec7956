//! Action types for the dispatch system.
//!
//! Actions are what the surrounding UI asks of the tuner. They carry plain
//! data only, so a front-end can build them from key presses, command-line
//! flags or a saved script.

use serde::{Deserialize, Serialize};

use beatfree_types::{ChordType, NoteId, PitchClass};

use crate::tuner::ToggleMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Switch one note instance on or off
    SetActivation { note: NoteId, active: bool },
    /// Replace the activation set with exactly these notes
    SetNotes(Vec<NoteId>),
    /// Flip a pitch class per the current toggle mode
    ToggleNote(PitchClass),
    /// Manual detune edit, applied immediately
    SetDetune { pitch_class: PitchClass, cents: f64 },
    /// Animate active notes to beat-free ratios
    AutoTune,
    /// Animate active notes back to equal temperament
    Reset,
    /// Replace the activation set with a chord
    ApplyChord { root: PitchClass, chord: ChordType },
    /// Replace the activation set with root + named interval
    ApplyInterval { root: PitchClass, interval: String },
    SetToggleMode(ToggleMode),
    /// Gradual retune duration in milliseconds
    SetTransitionMs(u64),
    Play,
    Stop,
    Quit,
}

/// What the caller should do after an action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchResult {
    pub quit: bool,
    /// Human-readable notes for a status line
    pub status: Vec<String>,
}

impl DispatchResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_quit() -> Self {
        Self { quit: true, ..Self::default() }
    }

    pub fn with_status(message: impl Into<String>) -> Self {
        Self {
            status: vec![message.into()],
            ..Self::default()
        }
    }

    pub fn push_status(&mut self, message: impl Into<String>) {
        self.status.push(message.into());
    }
}
