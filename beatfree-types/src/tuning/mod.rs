//! Tuning math: equal-tempered base frequencies, cents arithmetic and the
//! just-intonation resolver.
//!
//! All tuning math lives here. Pure functions, no audio dependencies.

pub mod intervals;
pub mod resolver;

use crate::note::{NoteId, PitchClass};

pub use intervals::{best_interval, Interval, INTERVALS};
pub use resolver::{lowest_active, resolve_beat_free};

/// Default tuning reference for A.
pub const DEFAULT_REFERENCE_HZ: f64 = 440.0;

/// Pitch class the reference frequency is pinned to.
pub const REFERENCE_PITCH_CLASS: PitchClass = PitchClass::A;

/// Equal-tempered frequencies for the 24 notes, derived from a reference A.
///
/// The upper-octave instance of every pitch class is exactly twice its base.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyTable {
    reference_hz: f64,
    base: [f64; 12],
}

impl FrequencyTable {
    pub fn new(reference_hz: f64) -> Self {
        let reference_index = REFERENCE_PITCH_CLASS.index() as f64;
        let mut base = [0.0; 12];
        for pc in PitchClass::ALL {
            let offset = pc.index() as f64 - reference_index;
            base[pc.index()] = reference_hz * 2.0_f64.powf(offset / 12.0);
        }
        Self { reference_hz, base }
    }

    pub fn reference_hz(&self) -> f64 {
        self.reference_hz
    }

    /// Equal-tempered frequency of `note` in Hz.
    pub fn frequency(&self, note: NoteId) -> f64 {
        self.base[note.pitch_class().index()] * note.octave().multiplier()
    }

    /// All notes and their frequencies in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (NoteId, f64)> + '_ {
        NoteId::all().map(move |n| (n, self.frequency(n)))
    }
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_HZ)
    }
}

/// Shift `base_hz` by `cents` (1200 cents per octave).
pub fn detune_frequency(base_hz: f64, cents: f64) -> f64 {
    base_hz * 2.0_f64.powf(cents / 1200.0)
}

/// Size of a frequency ratio in cents.
pub fn cents_from_ratio(ratio: f64) -> f64 {
    1200.0 * ratio.log2()
}

/// Size of an equal-tempered interval of `semitones` in cents.
pub fn equal_temperament_cents(semitones: i32) -> f64 {
    100.0 * semitones as f64
}

/// Offset to apply to an equal-tempered note `semitones` above its reference
/// so that it sounds at exactly `ratio` above that reference instead.
pub fn cents_difference(ratio: f64, semitones: i32) -> f64 {
    cents_from_ratio(ratio) - equal_temperament_cents(semitones)
}
