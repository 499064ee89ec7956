use std::time::{Duration, Instant};

use beatfree_types::tuning::intervals::find_interval;
use beatfree_types::{ActivationSet, TransitionState};

use crate::action::{Action, DispatchResult};
use crate::tuner::Tuner;

/// Apply one action to the tuner. `now` is the frame clock used for
/// transitions; device-side scheduling reads the backend's own clock.
pub fn dispatch_action(action: &Action, tuner: &mut Tuner, now: Instant) -> DispatchResult {
    match action {
        Action::SetActivation { note, active } => {
            tuner.set_activation(*note, *active, now);
            DispatchResult::none()
        }
        Action::SetNotes(notes) => {
            tuner.replace_activation(ActivationSet::with_active(notes.iter().copied()), now);
            DispatchResult::none()
        }
        Action::ToggleNote(pc) => {
            let on = tuner.toggle_note(*pc, now);
            DispatchResult::with_status(format!("{} {}", pc, if on { "on" } else { "off" }))
        }
        Action::SetDetune { pitch_class, cents } => {
            if !cents.is_finite() {
                return DispatchResult::with_status(format!("ignored detune {} for {}", cents, pitch_class));
            }
            tuner.set_detune(*pitch_class, *cents);
            DispatchResult::none()
        }
        Action::AutoTune => transition_result("auto-tune", tuner.request_auto_tune(now)),
        Action::Reset => transition_result("reset", tuner.request_reset(now)),
        Action::ApplyChord { root, chord } => {
            tuner.apply_chord(*root, *chord, now);
            DispatchResult::with_status(format!("{} {}", root, chord))
        }
        Action::ApplyInterval { root, interval } => match find_interval(interval) {
            Some(found) => {
                tuner.apply_interval(*root, found, now);
                DispatchResult::with_status(format!(
                    "{} + {} ({}/{})",
                    root, found.name, found.numerator, found.denominator
                ))
            }
            None => {
                log::warn!(target: "tuner", "unknown interval '{}'", interval);
                DispatchResult::with_status(format!("unknown interval '{}'", interval))
            }
        },
        Action::SetToggleMode(mode) => {
            tuner.set_toggle_mode(*mode);
            DispatchResult::none()
        }
        Action::SetTransitionMs(ms) => {
            tuner.set_transition_duration(Duration::from_millis((*ms).min(60_000)));
            DispatchResult::none()
        }
        Action::Play => {
            tuner.play(now);
            DispatchResult::none()
        }
        Action::Stop => {
            tuner.stop();
            DispatchResult::none()
        }
        Action::Quit => {
            tuner.stop();
            DispatchResult::with_quit()
        }
    }
}

fn transition_result(label: &str, state: TransitionState) -> DispatchResult {
    match state {
        TransitionState::Animating => DispatchResult::with_status(format!("{}: retuning", label)),
        TransitionState::Idle => DispatchResult::with_status(format!("{}: nothing to change", label)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatfree_audio::engine::backend::NullBackend;
    use beatfree_types::{ChordType, NoteId, PitchClass};

    fn tuner() -> Tuner {
        Tuner::with_backend(Box::new(NullBackend))
    }

    #[test]
    fn test_quit_stops_playback() {
        let mut tuner = tuner();
        let now = Instant::now();
        dispatch_action(&Action::Play, &mut tuner, now);
        assert!(tuner.is_playing());
        let result = dispatch_action(&Action::Quit, &mut tuner, now);
        assert!(result.quit);
        assert!(!tuner.is_playing());
    }

    #[test]
    fn test_chord_then_auto_tune() {
        let mut tuner = tuner();
        let now = Instant::now();
        dispatch_action(
            &Action::ApplyChord { root: PitchClass::D, chord: ChordType::Moll },
            &mut tuner,
            now,
        );
        assert!(tuner.is_active(NoteId::named("F'")));
        let result = dispatch_action(&Action::AutoTune, &mut tuner, now);
        assert_eq!(result.status, vec!["auto-tune: retuning".to_string()]);
        assert_eq!(tuner.transition_state(), TransitionState::Animating);
    }

    #[test]
    fn test_auto_tune_on_silence_reports_no_change() {
        let mut tuner = tuner();
        let now = Instant::now();
        tuner.replace_activation(ActivationSet::silent(), now);
        let result = dispatch_action(&Action::AutoTune, &mut tuner, now);
        assert_eq!(result.status, vec!["auto-tune: nothing to change".to_string()]);
    }

    #[test]
    fn test_set_notes_replaces_activation() {
        let mut tuner = tuner();
        let notes = vec![NoteId::named("D"), NoteId::named("A'")];
        dispatch_action(&Action::SetNotes(notes), &mut tuner, Instant::now());
        assert_eq!(tuner.activation().active_count(), 2);
        assert!(!tuner.is_active(NoteId::named("C")));
    }

    #[test]
    fn test_unknown_interval_is_reported() {
        let mut tuner = tuner();
        let before = tuner.activation().clone();
        let result = dispatch_action(
            &Action::ApplyInterval { root: PitchClass::C, interval: "Wolf Fifth".into() },
            &mut tuner,
            Instant::now(),
        );
        assert!(result.status[0].contains("unknown interval"));
        assert_eq!(tuner.activation(), &before);
    }

    #[test]
    fn test_non_finite_detune_is_ignored() {
        let mut tuner = tuner();
        dispatch_action(
            &Action::SetDetune { pitch_class: PitchClass::G, cents: f64::NAN },
            &mut tuner,
            Instant::now(),
        );
        assert_eq!(tuner.current_detune(PitchClass::G), 0.0);
    }

    #[test]
    fn test_transition_duration_is_clamped() {
        let mut tuner = tuner();
        dispatch_action(&Action::SetTransitionMs(120_000), &mut tuner, Instant::now());
        assert_eq!(tuner.transition_duration(), Duration::from_secs(60));
    }

    #[test]
    fn test_actions_serialize() {
        let action = Action::SetDetune { pitch_class: PitchClass::Fs, cents: -5.0 };
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains("F#"));
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }
}
