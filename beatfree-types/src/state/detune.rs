use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::note::PitchClass;

/// Conventional UI range for a detune slider, in cents. Not enforced.
pub const DETUNE_UI_RANGE: (f64, f64) = (-50.0, 50.0);

/// Cents offset per pitch class. Both octave instances share one entry.
///
/// Entries may be absent (e.g. a partially restored snapshot); consumers
/// decide how to treat a missing value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetuneMap {
    cents: BTreeMap<PitchClass, f64>,
}

impl DetuneMap {
    /// All twelve pitch classes at 0 cents (equal temperament).
    pub fn zeroed() -> Self {
        Self {
            cents: PitchClass::ALL.into_iter().map(|pc| (pc, 0.0)).collect(),
        }
    }

    pub fn get(&self, pc: PitchClass) -> Option<f64> {
        self.cents.get(&pc).copied()
    }

    pub fn set(&mut self, pc: PitchClass, cents: f64) {
        self.cents.insert(pc, cents);
    }

    pub fn contains(&self, pc: PitchClass) -> bool {
        self.cents.contains_key(&pc)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PitchClass, f64)> + '_ {
        self.cents.iter().map(|(pc, c)| (*pc, *c))
    }

    pub fn len(&self) -> usize {
        self.cents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cents.is_empty()
    }

    /// Largest absolute per-entry difference against `other`, over the
    /// given pitch classes. Missing entries on either side are ignored.
    pub fn max_difference<I>(&self, other: &DetuneMap, pitch_classes: I) -> f64
    where
        I: IntoIterator<Item = PitchClass>,
    {
        pitch_classes
            .into_iter()
            .filter_map(|pc| Some((self.get(pc)? - other.get(pc)?).abs()))
            .fold(0.0, f64::max)
    }
}

impl FromIterator<(PitchClass, f64)> for DetuneMap {
    fn from_iter<T: IntoIterator<Item = (PitchClass, f64)>>(iter: T) -> Self {
        Self {
            cents: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_covers_all_pitch_classes() {
        let map = DetuneMap::zeroed();
        assert_eq!(map.len(), 12);
        assert!(map.iter().all(|(_, c)| c == 0.0));
    }

    #[test]
    fn max_difference_skips_missing() {
        let a: DetuneMap = [(PitchClass::C, 1.0), (PitchClass::E, -13.7)].into_iter().collect();
        let b: DetuneMap = [(PitchClass::C, 4.0)].into_iter().collect();
        let diff = a.max_difference(&b, PitchClass::ALL);
        assert!((diff - 3.0).abs() < 1e-12);
    }

    #[test]
    fn serializes_with_note_names() {
        let mut map = DetuneMap::default();
        map.set(PitchClass::Fs, 2.5);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"F#":2.5}"#);
    }
}
