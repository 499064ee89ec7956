use std::fmt::Write;

use beatfree_core::Tuner;
use beatfree_types::tuning::intervals::INTERVALS;
use beatfree_types::{detune_frequency, PitchClass};

/// One row per pitch class: which octaves sound, the current detune and
/// the resulting base-octave frequency.
pub fn format_detune_table(tuner: &Tuner) -> String {
    let frequencies = tuner.pool().frequencies();
    let mut out = String::new();
    let _ = writeln!(out, "note  base upper   cents        Hz");
    for pc in PitchClass::ALL {
        let cents = tuner.current_detune(pc);
        let hz = detune_frequency(frequencies.frequency(pc.base()), cents);
        let _ = writeln!(
            out,
            "{:<4}  {:^4} {:^5} {:>+7.2} {:>9.3}",
            pc.name(),
            marker(tuner.is_active(pc.base())),
            marker(tuner.is_active(pc.upper())),
            cents,
            hz
        );
    }
    out
}

pub fn format_interval_table() -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<16} {:>6} {:>9} {:>8}", "interval", "ratio", "cents", "vs ET");
    for interval in INTERVALS.iter() {
        let _ = writeln!(
            out,
            "{:<16} {:>6} {:>9.2} {:>+8.2}",
            interval.name,
            format!("{}/{}", interval.numerator, interval.denominator),
            interval.cents(),
            interval.cents_from_equal_temperament()
        );
    }
    out
}

fn marker(active: bool) -> &'static str {
    if active {
        "*"
    } else {
        "."
    }
}
