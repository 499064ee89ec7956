//! Just-intonation interval table and ratio matching.

use super::{cents_difference, cents_from_ratio};

/// A named just interval: an exact frequency ratio and the equal-tempered
/// semitone count it replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub name: &'static str,
    pub numerator: u32,
    pub denominator: u32,
    pub semitones: u8,
}

impl Interval {
    pub const fn new(name: &'static str, numerator: u32, denominator: u32, semitones: u8) -> Self {
        Self {
            name,
            numerator,
            denominator,
            semitones,
        }
    }

    pub fn ratio(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Size of the pure interval in cents.
    pub fn cents(&self) -> f64 {
        cents_from_ratio(self.ratio())
    }

    /// How far the pure interval sits from its equal-tempered counterpart.
    pub fn cents_from_equal_temperament(&self) -> f64 {
        cents_difference(self.ratio(), self.semitones as i32)
    }
}

/// 1/1, used only for a zero semitone distance.
pub const UNISON: Interval = Interval::new("Unison", 1, 1, 0);

/// One entry per semitone distance 1..=12. Table order is the tie-break
/// order for nearest matching.
pub const INTERVALS: [Interval; 12] = [
    Interval::new("Perfect Octave", 2, 1, 12),
    Interval::new("Perfect Fifth", 3, 2, 7),
    Interval::new("Perfect Fourth", 4, 3, 5),
    Interval::new("Major Third", 5, 4, 4),
    Interval::new("Minor Third", 6, 5, 3),
    Interval::new("Major Sixth", 5, 3, 9),
    Interval::new("Minor Sixth", 8, 5, 8),
    Interval::new("Major Second", 9, 8, 2),
    Interval::new("Minor Second", 16, 15, 1),
    Interval::new("Major Seventh", 15, 8, 11),
    Interval::new("Minor Seventh", 16, 9, 10),
    Interval::new("Tritone", 45, 32, 6),
];

/// Look up an interval by its display name.
pub fn find_interval(name: &str) -> Option<&'static Interval> {
    INTERVALS.iter().find(|i| i.name.eq_ignore_ascii_case(name))
}

/// Best just interval for a distance of `semitones` from the reference note.
pub fn best_interval(semitones: u32) -> Interval {
    best_interval_in(&INTERVALS, semitones)
}

/// Matching policy over an arbitrary ordered table.
///
/// The distance is folded into 1..=12 for exact lookup, so octave-displaced
/// intervals match their simple counterpart. Without an exact match the
/// entry whose semitone count is nearest to the unfolded distance wins, with
/// ties going to the earlier entry. An empty table yields unison.
pub fn best_interval_in(table: &[Interval], semitones: u32) -> Interval {
    if semitones == 0 {
        return UNISON;
    }
    let folded = match semitones % 12 {
        0 => 12,
        n => n,
    };
    if let Some(exact) = table.iter().find(|i| i.semitones as u32 == folded) {
        return *exact;
    }

    let mut best = UNISON;
    let mut smallest = u32::MAX;
    for interval in table {
        let difference = (interval.semitones as u32).abs_diff(semitones);
        if difference < smallest {
            smallest = difference;
            best = *interval;
        }
    }
    best
}

/// Detune offset that turns an equal-tempered note `semitones` above its
/// reference into the best-matching pure interval. Uses the unfolded
/// distance, so each extra octave moves the offset by a further 1200 cents.
pub fn just_offset_cents(semitones: u32) -> f64 {
    let interval = best_interval(semitones);
    cents_difference(interval.ratio(), semitones as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_entry_per_semitone_distance() {
        for d in 1..=12u8 {
            let count = INTERVALS.iter().filter(|i| i.semitones == d).count();
            assert_eq!(count, 1, "distance {} has {} entries", d, count);
        }
    }

    #[test]
    fn exact_match_for_every_distance() {
        for d in 1..=12u32 {
            assert_eq!(best_interval(d).semitones as u32, d);
        }
    }

    #[test]
    fn ratios_are_above_unison_and_within_octave() {
        for interval in INTERVALS {
            assert!(interval.ratio() > 1.0);
            assert!(interval.ratio() <= 2.0, "{} exceeds an octave", interval.name);
        }
    }

    #[test]
    fn compound_distance_folds_to_simple_interval() {
        assert_eq!(best_interval(19).name, "Perfect Fifth");
        assert_eq!(best_interval(24).name, "Perfect Octave");
    }

    #[test]
    fn zero_distance_is_unison() {
        assert_eq!(best_interval(0), UNISON);
        assert_eq!(just_offset_cents(0), 0.0);
    }

    #[test]
    fn nearest_match_breaks_ties_by_table_order() {
        // No tritone in this table: 5 and 7 are equally near to 6.
        let gapped: Vec<Interval> = INTERVALS
            .iter()
            .copied()
            .filter(|i| i.semitones != 6)
            .collect();
        assert_eq!(best_interval_in(&gapped, 6).name, "Perfect Fifth");

        let reordered: Vec<Interval> = gapped.iter().rev().copied().collect();
        assert_eq!(best_interval_in(&reordered, 6).name, "Perfect Fourth");
    }

    #[test]
    fn nearest_match_uses_unfolded_distance() {
        let only_octave = [INTERVALS[0]];
        assert_eq!(best_interval_in(&only_octave, 5).name, "Perfect Octave");
        assert_eq!(best_interval_in(&[], 5), UNISON);
    }

    #[test]
    fn octave_displacement_shifts_by_whole_octaves() {
        let simple = just_offset_cents(7);
        let compound = just_offset_cents(19);
        assert!((simple - compound - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn find_by_name_is_case_insensitive() {
        let fifth = find_interval("perfect fifth").unwrap();
        assert_eq!((fifth.numerator, fifth.denominator), (3, 2));
        assert!(find_interval("Neutral Third").is_none());
    }

    #[test]
    fn fifth_reports_its_deviation() {
        let fifth = find_interval("Perfect Fifth").unwrap();
        assert!((fifth.cents_from_equal_temperament() - 1.955).abs() < 0.001);
        assert!((fifth.cents() - 701.955).abs() < 0.001);
    }
}
