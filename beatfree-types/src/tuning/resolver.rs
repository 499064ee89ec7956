//! Beat-free auto-tune: retune every active pitch class to a pure ratio
//! above the lowest active one.

use crate::note::PitchClass;
use crate::state::{ActivationSet, DetuneMap};

use super::intervals::{best_interval, just_offset_cents};

/// First pitch class in chromatic order with either instance active.
pub fn lowest_active(active: &ActivationSet) -> Option<PitchClass> {
    active.active_pitch_classes().next()
}

/// Compute beat-free detune targets for the current chord shape.
///
/// Returns `None` when nothing is active: the caller treats that as a
/// successful no-op. Otherwise the result is a copy of `current` where every
/// active pitch class except the reference is overwritten. The reference
/// keeps whatever offset it already had, and inactive pitch classes are
/// left untouched.
pub fn resolve_beat_free(active: &ActivationSet, current: &DetuneMap) -> Option<DetuneMap> {
    let reference = lowest_active(active)?;
    let reference_index = reference.index() as i32;

    let mut resolved = current.clone();
    for pc in PitchClass::ALL {
        if pc == reference || !active.is_pitch_class_active(pc) {
            continue;
        }
        let semitones = match (pc.index() as i32 - reference_index).rem_euclid(12) {
            0 => 12,
            n => n as u32,
        };
        let cents = just_offset_cents(semitones);
        log::debug!(
            target: "tuning",
            "{} is {} semitones above {}: {} -> {:+.3} cents",
            pc,
            semitones,
            reference,
            best_interval(semitones).name,
            cents
        );
        resolved.set(pc, cents);
    }
    Some(resolved)
}
