use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::note::{NoteId, PitchClass};

/// Which notes are sounding. Notes missing from the map count as inactive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivationSet {
    notes: BTreeMap<NoteId, bool>,
}

impl ActivationSet {
    /// All 24 notes present and inactive.
    pub fn silent() -> Self {
        Self {
            notes: NoteId::all().map(|n| (n, false)).collect(),
        }
    }

    /// All 24 notes present, with `active` ones switched on.
    pub fn with_active<I>(active: I) -> Self
    where
        I: IntoIterator<Item = NoteId>,
    {
        let mut set = Self::silent();
        for note in active {
            set.set(note, true);
        }
        set
    }

    pub fn is_active(&self, note: NoteId) -> bool {
        self.notes.get(&note).copied().unwrap_or(false)
    }

    /// True if either octave instance of `pc` is active.
    pub fn is_pitch_class_active(&self, pc: PitchClass) -> bool {
        pc.notes().iter().any(|n| self.is_active(*n))
    }

    pub fn set(&mut self, note: NoteId, active: bool) {
        self.notes.insert(note, active);
    }

    /// Flip one note, returning its new state.
    pub fn toggle(&mut self, note: NoteId) -> bool {
        let next = !self.is_active(note);
        self.set(note, next);
        next
    }

    /// Flip both octave instances of `pc` independently.
    pub fn toggle_pair(&mut self, pc: PitchClass) {
        for note in pc.notes() {
            self.toggle(note);
        }
    }

    /// Number of notes (octave instances counted separately) marked active.
    pub fn active_count(&self) -> usize {
        self.notes.values().filter(|a| **a).count()
    }

    pub fn active_notes(&self) -> impl Iterator<Item = NoteId> + '_ {
        self.notes.iter().filter(|(_, a)| **a).map(|(n, _)| *n)
    }

    /// Every note known to the set, active or not, in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (NoteId, bool)> + '_ {
        self.notes.iter().map(|(n, a)| (*n, *a))
    }

    /// Pitch classes with at least one active instance, in chromatic order.
    pub fn active_pitch_classes(&self) -> impl Iterator<Item = PitchClass> + '_ {
        PitchClass::ALL
            .into_iter()
            .filter(move |pc| self.is_pitch_class_active(*pc))
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }
}
