use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Suffix marking the upper-octave instance of a pitch class.
pub const OCTAVE_SUFFIX: char = '\'';

/// One of the twelve chromatic pitch classes, in chromatic order from C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    #[serde(rename = "C#")]
    Cs,
    D,
    #[serde(rename = "D#")]
    Ds,
    E,
    F,
    #[serde(rename = "F#")]
    Fs,
    G,
    #[serde(rename = "G#")]
    Gs,
    A,
    #[serde(rename = "A#")]
    As,
    B,
}

impl PitchClass {
    /// Fixed chromatic scan order. Auto-tune relies on this order to pick
    /// the lowest active note.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Ds,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
        PitchClass::A,
        PitchClass::As,
        PitchClass::B,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        }
    }

    /// Chromatic index 0..12 (C = 0).
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> PitchClass {
        Self::ALL[index % 12]
    }

    /// Pitch class `semitones` above this one, wrapping at the octave.
    pub fn transpose(&self, semitones: u8) -> PitchClass {
        Self::from_index(self.index() + semitones as usize)
    }

    /// Base (lower octave) note of this pitch class.
    pub fn base(self) -> NoteId {
        NoteId::new(self, Octave::Base)
    }

    /// Upper octave note of this pitch class.
    pub fn upper(self) -> NoteId {
        NoteId::new(self, Octave::Upper)
    }

    /// Both instances of this pitch class, base first.
    pub fn notes(self) -> [NoteId; 2] {
        [self.base(), self.upper()]
    }

    /// Parse a compile-time-known name. Panics on unknown input, which is
    /// always a programming error at the call site.
    pub fn named(name: &str) -> PitchClass {
        match name.parse() {
            Ok(pc) => pc,
            Err(e) => panic!("{}", e),
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = ParseNoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "C" => Ok(PitchClass::C),
            "C#" | "Cs" | "Db" => Ok(PitchClass::Cs),
            "D" => Ok(PitchClass::D),
            "D#" | "Ds" | "Eb" => Ok(PitchClass::Ds),
            "E" => Ok(PitchClass::E),
            "F" => Ok(PitchClass::F),
            "F#" | "Fs" | "Gb" => Ok(PitchClass::Fs),
            "G" => Ok(PitchClass::G),
            "G#" | "Gs" | "Ab" => Ok(PitchClass::Gs),
            "A" => Ok(PitchClass::A),
            "A#" | "As" | "Bb" => Ok(PitchClass::As),
            // German spelling
            "B" | "H" => Ok(PitchClass::B),
            other => Err(ParseNoteError(other.to_string())),
        }
    }
}

/// Which of the two octave instances a note refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Octave {
    Base,
    Upper,
}

impl Octave {
    /// Frequency multiplier relative to the base instance.
    pub fn multiplier(&self) -> f64 {
        match self {
            Octave::Base => 1.0,
            Octave::Upper => 2.0,
        }
    }
}

/// A concrete sounding note: pitch class plus octave instance.
///
/// Ordering is all base notes in chromatic order, then all upper notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NoteId {
    octave: Octave,
    pitch_class: PitchClass,
}

impl NoteId {
    pub const fn new(pitch_class: PitchClass, octave: Octave) -> Self {
        Self { octave, pitch_class }
    }

    pub fn pitch_class(&self) -> PitchClass {
        self.pitch_class
    }

    pub fn octave(&self) -> Octave {
        self.octave
    }

    /// The other octave instance of the same pitch class.
    pub fn octave_pair(&self) -> NoteId {
        match self.octave {
            Octave::Base => self.pitch_class.upper(),
            Octave::Upper => self.pitch_class.base(),
        }
    }

    /// All 24 notes in canonical order.
    pub fn all() -> impl Iterator<Item = NoteId> {
        [Octave::Base, Octave::Upper]
            .into_iter()
            .flat_map(|octave| PitchClass::ALL.into_iter().map(move |pc| NoteId::new(pc, octave)))
    }

    /// Fail-fast parse for identifiers known at compile time.
    pub fn named(name: &str) -> NoteId {
        match name.parse() {
            Ok(note) => note,
            Err(e) => panic!("{}", e),
        }
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.octave {
            Octave::Base => write!(f, "{}", self.pitch_class),
            Octave::Upper => write!(f, "{}{}", self.pitch_class, OCTAVE_SUFFIX),
        }
    }
}

impl FromStr for NoteId {
    type Err = ParseNoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, octave) = match s.strip_suffix(OCTAVE_SUFFIX) {
            Some(name) => (name, Octave::Upper),
            None => (s, Octave::Base),
        };
        let pitch_class = name
            .parse::<PitchClass>()
            .map_err(|_| ParseNoteError(s.to_string()))?;
        Ok(NoteId::new(pitch_class, octave))
    }
}

impl TryFrom<String> for NoteId {
    type Error = ParseNoteError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NoteId> for String {
    fn from(note: NoteId) -> Self {
        note.to_string()
    }
}

/// Text that does not name a known pitch class or note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNoteError(pub String);

impl fmt::Display for ParseNoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown note identifier '{}'", self.0)
    }
}

impl std::error::Error for ParseNoteError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chromatic_indices_follow_order() {
        for (i, pc) in PitchClass::ALL.iter().enumerate() {
            assert_eq!(pc.index(), i);
            assert_eq!(PitchClass::from_index(i), *pc);
        }
    }

    #[test]
    fn transpose_wraps_at_octave() {
        assert_eq!(PitchClass::A.transpose(3), PitchClass::C);
        assert_eq!(PitchClass::C.transpose(12), PitchClass::C);
        assert_eq!(PitchClass::E.transpose(7), PitchClass::B);
    }

    #[test]
    fn parse_upper_octave_suffix() {
        let note: NoteId = "C#'".parse().unwrap();
        assert_eq!(note.pitch_class(), PitchClass::Cs);
        assert_eq!(note.octave(), Octave::Upper);
        assert_eq!(note.to_string(), "C#'");
    }

    #[test]
    fn parse_accepts_german_h() {
        assert_eq!(NoteId::named("H'"), PitchClass::B.upper());
        assert_eq!(PitchClass::named("Fs"), PitchClass::Fs);
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!("X".parse::<NoteId>().is_err());
        assert!("C''".parse::<NoteId>().is_err());
        let err = "Q#".parse::<PitchClass>().unwrap_err();
        assert_eq!(err.to_string(), "unknown note identifier 'Q#'");
    }

    #[test]
    #[should_panic(expected = "unknown note identifier")]
    fn named_fails_fast() {
        NoteId::named("nope");
    }

    #[test]
    fn canonical_order_is_base_then_upper() {
        let all: Vec<NoteId> = NoteId::all().collect();
        assert_eq!(all.len(), 24);
        assert_eq!(all[0], PitchClass::C.base());
        assert_eq!(all[11], PitchClass::B.base());
        assert_eq!(all[12], PitchClass::C.upper());
        let mut sorted = all.clone();
        sorted.sort();
        assert_eq!(sorted, all);
    }

    #[test]
    fn octave_pair_round_trips() {
        let e = PitchClass::E.base();
        assert_eq!(e.octave_pair(), PitchClass::E.upper());
        assert_eq!(e.octave_pair().octave_pair(), e);
    }

    #[test]
    fn note_serializes_as_name() {
        let json = serde_json::to_string(&PitchClass::G.upper()).unwrap();
        assert_eq!(json, "\"G'\"");
        let back: NoteId = serde_json::from_str("\"D#\"").unwrap();
        assert_eq!(back, PitchClass::Ds.base());
    }
}
