//! Chord and interval shapes that produce whole activation sets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::note::PitchClass;
use crate::state::ActivationSet;
use crate::tuning::Interval;

/// Chord shapes offered to the user, with their German names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChordType {
    /// Major triad
    Dur,
    /// Minor triad
    Moll,
    /// Major seventh
    Maj7,
}

impl ChordType {
    pub const ALL: [ChordType; 3] = [ChordType::Dur, ChordType::Moll, ChordType::Maj7];

    pub fn name(&self) -> &'static str {
        match self {
            ChordType::Dur => "Dur",
            ChordType::Moll => "Moll",
            ChordType::Maj7 => "Maj7",
        }
    }

    /// Semitone offsets from the root.
    pub fn offsets(&self) -> &'static [u8] {
        match self {
            ChordType::Dur => &[0, 4, 7],
            ChordType::Moll => &[0, 3, 7],
            ChordType::Maj7 => &[0, 4, 7, 11],
        }
    }

    /// Pitch classes of this chord built on `root`.
    pub fn pitch_classes(&self, root: PitchClass) -> Vec<PitchClass> {
        self.offsets().iter().map(|o| root.transpose(*o)).collect()
    }
}

impl fmt::Display for ChordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dur" | "major" | "maj" => Ok(ChordType::Dur),
            "moll" | "minor" | "min" => Ok(ChordType::Moll),
            "maj7" => Ok(ChordType::Maj7),
            _ => Err(format!("unknown chord type '{}'", s)),
        }
    }
}

/// Activation set with exactly `pcs` sounding, in both octaves.
pub fn activate_pitch_classes<I>(pcs: I) -> ActivationSet
where
    I: IntoIterator<Item = PitchClass>,
{
    ActivationSet::with_active(pcs.into_iter().flat_map(|pc| pc.notes()))
}

/// Replace the activation set with a chord on `root`.
pub fn chord_activation(root: PitchClass, chord: ChordType) -> ActivationSet {
    activate_pitch_classes(chord.pitch_classes(root))
}

/// Replace the activation set with `root` and the note `interval` above it.
pub fn interval_activation(root: PitchClass, interval: &Interval) -> ActivationSet {
    activate_pitch_classes([root, root.transpose(interval.semitones)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::intervals::find_interval;

    #[test]
    fn c_major_in_both_octaves() {
        let set = chord_activation(PitchClass::C, ChordType::Dur);
        assert_eq!(set.active_count(), 6);
        for pc in [PitchClass::C, PitchClass::E, PitchClass::G] {
            assert!(set.is_active(pc.base()));
            assert!(set.is_active(pc.upper()));
        }
        assert!(!set.is_active(PitchClass::D.base()));
    }

    #[test]
    fn chord_wraps_past_b() {
        let pcs = ChordType::Moll.pitch_classes(PitchClass::A);
        assert_eq!(pcs, vec![PitchClass::A, PitchClass::C, PitchClass::E]);
        let pcs = ChordType::Maj7.pitch_classes(PitchClass::G);
        assert_eq!(
            pcs,
            vec![PitchClass::G, PitchClass::B, PitchClass::D, PitchClass::Fs]
        );
    }

    #[test]
    fn octave_interval_activates_single_pitch_class() {
        let octave = find_interval("Perfect Octave").unwrap();
        let set = interval_activation(PitchClass::D, octave);
        assert_eq!(set.active_count(), 2);
        assert!(set.is_active(PitchClass::D.upper()));
    }

    #[test]
    fn fifth_interval_activates_root_and_fifth() {
        let fifth = find_interval("Perfect Fifth").unwrap();
        let set = interval_activation(PitchClass::F, fifth);
        let pcs: Vec<_> = set.active_pitch_classes().collect();
        assert_eq!(pcs, vec![PitchClass::C, PitchClass::F]);
    }

    #[test]
    fn parse_chord_names() {
        assert_eq!("Dur".parse::<ChordType>(), Ok(ChordType::Dur));
        assert_eq!("minor".parse::<ChordType>(), Ok(ChordType::Moll));
        assert!("sus4".parse::<ChordType>().is_err());
    }
}
