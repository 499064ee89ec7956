//! # beatfree-types
//!
//! Shared types and pure tuning logic for beatfree: note identifiers, the
//! activation set and detune map, the equal-tempered frequency table, the
//! just-intonation interval table and resolver, and the detune transition
//! engine. Nothing in this crate touches an audio device or a clock.

pub mod chord;
pub mod note;
pub mod state;
pub mod transition;
pub mod tuning;

pub use chord::ChordType;
pub use note::{NoteId, Octave, ParseNoteError, PitchClass};
pub use state::{ActivationSet, DetuneMap};
pub use transition::{Advance, TransitionEngine, TransitionState};
pub use tuning::{
    cents_difference, cents_from_ratio, detune_frequency, equal_temperament_cents, FrequencyTable,
    Interval,
};
