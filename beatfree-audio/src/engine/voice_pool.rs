//! Live voices keyed by note, kept consistent with the activation set.
//!
//! The pool owns lifecycle data and decides what each voice should do; the
//! backend carries it out. Fades are scheduled on the audio clock and a
//! faded-out voice stays in the pool until `poll` sees its release time pass.

use std::collections::BTreeMap;

use beatfree_types::{detune_frequency, ActivationSet, DetuneMap, FrequencyTable, NoteId, PitchClass};

use super::backend::{AudioBackend, BackendResult, VoiceId, VoiceParam};
use crate::param::ParamEvent;

/// Per-voice gain when few notes sound.
pub const DEFAULT_BASE_GAIN: f32 = 0.2;

/// Active-note count above which per-voice gain is scaled down.
pub const DEFAULT_POLYPHONY_THRESHOLD: usize = 3;

/// Fade-in/fade-out window (50ms)
pub const DEFAULT_FADE_SECS: f64 = 0.050;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolSettings {
    pub base_gain: f32,
    pub polyphony_threshold: usize,
    pub fade_secs: f64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            base_gain: DEFAULT_BASE_GAIN,
            polyphony_threshold: DEFAULT_POLYPHONY_THRESHOLD,
            fade_secs: DEFAULT_FADE_SECS,
        }
    }
}

/// Per-voice gain target for `active_count` sounding notes.
pub fn polyphony_gain(base_gain: f32, active_count: usize, threshold: usize) -> f32 {
    if active_count <= threshold || active_count == 0 {
        base_gain
    } else {
        base_gain * threshold as f32 / active_count as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceState {
    Sounding,
    /// Gain is ramping to zero; the voice is released once `release_at` passes.
    Fading { release_at: f64 },
}

#[derive(Debug, Clone)]
pub struct Voice {
    pub id: VoiceId,
    pub note: NoteId,
    /// Frequency the voice is at or heading towards.
    pub frequency: f64,
    pub state: VoiceState,
    pub spawned_at: f64,
}

impl Voice {
    pub fn is_fading(&self) -> bool {
        matches!(self.state, VoiceState::Fading { .. })
    }
}

/// How a reconcile pass moves the frequency of voices that already exist.
#[derive(Debug, Clone, Copy)]
pub enum Retune<'a> {
    /// Jump straight to the current detune values (manual edits).
    Immediate,
    /// Ramp from wherever each voice is now to `target` over `duration_secs`.
    Ramp {
        target: &'a DetuneMap,
        duration_secs: f64,
    },
}

pub struct VoicePool {
    backend: Box<dyn AudioBackend>,
    frequencies: FrequencyTable,
    settings: PoolSettings,
    voices: BTreeMap<NoteId, Voice>,
    next_voice_id: VoiceId,
}

impl VoicePool {
    pub fn new(backend: Box<dyn AudioBackend>, frequencies: FrequencyTable, settings: PoolSettings) -> Self {
        Self {
            backend,
            frequencies,
            settings,
            voices: BTreeMap::new(),
            next_voice_id: 1,
        }
    }

    pub fn backend(&self) -> &dyn AudioBackend {
        self.backend.as_ref()
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    pub fn frequencies(&self) -> &FrequencyTable {
        &self.frequencies
    }

    /// Voice for `note`, including one that is still fading out.
    pub fn voice(&self, note: NoteId) -> Option<&Voice> {
        self.voices.get(&note)
    }

    pub fn voices(&self) -> impl Iterator<Item = &Voice> {
        self.voices.values()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn sounding_count(&self) -> usize {
        self.voices.values().filter(|v| !v.is_fading()).count()
    }

    pub fn adjusted_gain(&self, active_count: usize) -> f32 {
        polyphony_gain(
            self.settings.base_gain,
            active_count,
            self.settings.polyphony_threshold,
        )
    }

    /// Start a voice for every active note, fading each in.
    pub fn start_all(&mut self, active: &ActivationSet, detune: &DetuneMap) {
        self.reconcile(active, detune, Retune::Immediate);
    }

    /// Fade out every sounding voice. Voices stay in the pool until `poll`
    /// releases them after the fade window.
    pub fn stop_all(&mut self) {
        let now = self.backend.current_time();
        let notes: Vec<NoteId> = self
            .voices
            .values()
            .filter(|v| !v.is_fading())
            .map(|v| v.note)
            .collect();
        for note in notes {
            self.fade_out(note, now);
        }
        log::debug!(target: "audio::pool", "stop_all: {} voices fading", self.voices.len());
    }

    /// Bring the live voices in line with `active`.
    ///
    /// Gain for every voice that stays active is re-applied first, so a change
    /// in polyphony is reflected before any voice is created or retuned. Then
    /// each note in canonical order is created, retuned, or faded out.
    pub fn reconcile(&mut self, active: &ActivationSet, current: &DetuneMap, retune: Retune<'_>) {
        let now = self.backend.current_time();
        let gain = self.adjusted_gain(active.active_count());

        let kept: Vec<NoteId> = self
            .voices
            .keys()
            .copied()
            .filter(|note| active.is_active(*note))
            .collect();
        for note in kept {
            self.apply_gain(note, gain, now);
        }

        for note in NoteId::all() {
            let is_active = active.is_active(note);
            match (is_active, self.voices.get(&note).map(|v| v.is_fading())) {
                (true, None) => self.spawn(note, current, retune, gain, now),
                (true, Some(_)) => self.retune(note, current, retune, now),
                (false, Some(false)) => self.fade_out(note, now),
                (false, Some(true)) | (false, None) => {}
            }
        }
    }

    /// Retune the voices of both octave instances of `pc`, leaving gain and
    /// every other voice alone.
    pub fn retune_pitch_class(&mut self, pc: PitchClass, current: &DetuneMap, retune: Retune<'_>) {
        let now = self.backend.current_time();
        for note in pc.notes() {
            if self.voices.contains_key(&note) {
                self.retune(note, current, retune, now);
            }
        }
    }

    /// Release every voice whose fade has finished. Returns the released notes.
    pub fn poll(&mut self) -> Vec<NoteId> {
        let now = self.backend.current_time();
        let expired: Vec<NoteId> = self
            .voices
            .values()
            .filter(|v| matches!(v.state, VoiceState::Fading { release_at } if release_at <= now))
            .map(|v| v.note)
            .collect();

        for note in &expired {
            if let Some(voice) = self.voices.remove(note) {
                self.release(&voice);
            }
        }
        expired
    }

    /// Release every voice right away, faded or not. For teardown when the
    /// output is going away anyway.
    pub fn drain_all(&mut self) -> usize {
        let voices = std::mem::take(&mut self.voices);
        for voice in voices.values() {
            self.release(voice);
        }
        voices.len()
    }

    /// Target frequency for `note` under `detune`, or `None` when the value
    /// is missing or unusable.
    pub fn voice_frequency(&self, note: NoteId, detune: &DetuneMap) -> Option<f64> {
        let Some(cents) = detune.get(note.pitch_class()) else {
            log::warn!(target: "audio::pool", "no detune value for {}, skipping", note);
            return None;
        };
        let hz = detune_frequency(self.frequencies.frequency(note), cents);
        if !hz.is_finite() || hz <= 0.0 {
            log::warn!(target: "audio::pool", "unusable frequency {} for {}, skipping", hz, note);
            return None;
        }
        Some(hz)
    }

    fn spawn(&mut self, note: NoteId, current: &DetuneMap, retune: Retune<'_>, gain: f32, now: f64) {
        let Some(start_hz) = self.voice_frequency(note, current) else {
            return;
        };
        let ramp = match retune {
            Retune::Immediate => None,
            Retune::Ramp { target, duration_secs } => self
                .voice_frequency(note, target)
                .map(|hz| (hz, now + duration_secs)),
        };

        let id = self.next_voice_id;
        if let Err(e) = self.backend.create_voice(id, start_hz as f32, 0.0) {
            log::warn!(target: "audio::pool", "failed to start voice for {}: {}", note, e);
            return;
        }
        self.next_voice_id = self.next_voice_id.wrapping_add(1);

        let fade_end = now + self.settings.fade_secs;
        self.schedule(
            id,
            VoiceParam::Gain,
            &[
                ParamEvent::SetValueAtTime { value: 0.0, time: now },
                ParamEvent::LinearRampToValueAtTime { value: gain, time: fade_end },
            ],
        );

        let mut frequency = start_hz;
        let mut events = vec![ParamEvent::SetValueAtTime {
            value: start_hz as f32,
            time: now,
        }];
        if let Some((target_hz, end)) = ramp {
            events.push(ParamEvent::LinearRampToValueAtTime {
                value: target_hz as f32,
                time: end,
            });
            frequency = target_hz;
        }
        self.schedule(id, VoiceParam::Frequency, &events);

        log::debug!(target: "audio::pool", "voice {} started for {} at {:.3} Hz", id, note, start_hz);
        self.voices.insert(
            note,
            Voice {
                id,
                note,
                frequency,
                state: VoiceState::Sounding,
                spawned_at: now,
            },
        );
    }

    fn retune(&mut self, note: NoteId, current: &DetuneMap, retune: Retune<'_>, now: f64) {
        let (hz, events) = match retune {
            Retune::Immediate => {
                let Some(hz) = self.voice_frequency(note, current) else {
                    return;
                };
                (
                    hz,
                    vec![
                        ParamEvent::CancelScheduledValues { time: now },
                        ParamEvent::SetValueAtTime { value: hz as f32, time: now },
                    ],
                )
            }
            Retune::Ramp { target, duration_secs } => {
                let Some(hz) = self.voice_frequency(note, target) else {
                    return;
                };
                (
                    hz,
                    vec![
                        ParamEvent::CancelAndHoldAtTime { time: now },
                        ParamEvent::LinearRampToValueAtTime {
                            value: hz as f32,
                            time: now + duration_secs,
                        },
                    ],
                )
            }
        };
        let Some(id) = self.voices.get(&note).map(|v| v.id) else {
            return;
        };
        self.schedule(id, VoiceParam::Frequency, &events);
        if let Some(voice) = self.voices.get_mut(&note) {
            voice.frequency = hz;
        }
    }

    /// Ramp a kept voice to `gain`. A voice that was fading is revived.
    fn apply_gain(&mut self, note: NoteId, gain: f32, now: f64) {
        let Some(voice) = self.voices.get_mut(&note) else {
            return;
        };
        if voice.is_fading() {
            log::debug!(target: "audio::pool", "voice {} for {} revived", voice.id, note);
        }
        voice.state = VoiceState::Sounding;
        let id = voice.id;
        self.schedule(
            id,
            VoiceParam::Gain,
            &[
                ParamEvent::CancelAndHoldAtTime { time: now },
                ParamEvent::LinearRampToValueAtTime {
                    value: gain,
                    time: now + self.settings.fade_secs,
                },
            ],
        );
    }

    fn fade_out(&mut self, note: NoteId, now: f64) {
        let release_at = now + self.settings.fade_secs;
        let Some(voice) = self.voices.get_mut(&note) else {
            return;
        };
        voice.state = VoiceState::Fading { release_at };
        let id = voice.id;
        self.schedule(
            id,
            VoiceParam::Gain,
            &[
                ParamEvent::CancelAndHoldAtTime { time: now },
                ParamEvent::LinearRampToValueAtTime { value: 0.0, time: release_at },
            ],
        );
    }

    fn release(&self, voice: &Voice) {
        if let Err(e) = self.backend.release_voice(voice.id) {
            log::warn!(target: "audio::pool", "failed to release voice {}: {}", voice.id, e);
        }
    }

    fn schedule(&self, id: VoiceId, param: VoiceParam, events: &[ParamEvent]) {
        let result: BackendResult = self.backend.schedule_all(id, param, events);
        if let Err(e) = result {
            log::warn!(target: "audio::pool", "failed to schedule {:?} on voice {}: {}", param, id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::{SharedTestBackend, TestBackend, TestOp};
    use std::sync::Arc;

    fn make_pool() -> (VoicePool, Arc<TestBackend>) {
        let backend = Arc::new(TestBackend::new());
        let pool = VoicePool::new(
            Box::new(SharedTestBackend(Arc::clone(&backend))),
            FrequencyTable::default(),
            PoolSettings::default(),
        );
        (pool, backend)
    }

    fn active(names: &[&str]) -> ActivationSet {
        ActivationSet::with_active(names.iter().map(|n| NoteId::named(n)))
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_polyphony_gain() {
        assert_eq!(polyphony_gain(0.2, 2, 3), 0.2);
        assert_eq!(polyphony_gain(0.2, 3, 3), 0.2);
        assert!(close(polyphony_gain(0.2, 6, 3), 0.1));
        assert_eq!(polyphony_gain(0.2, 0, 3), 0.2);
    }

    #[test]
    fn test_start_all_fades_in_at_detuned_frequency() {
        let (mut pool, backend) = make_pool();
        let mut detune = DetuneMap::zeroed();
        detune.set(PitchClass::A, 1200.0);

        pool.start_all(&active(&["A", "C"]), &detune);
        assert_eq!(pool.len(), 2);

        let a = pool.voice(NoteId::named("A")).unwrap().id;
        assert!(matches!(
            backend.find(|op| matches!(op, TestOp::CreateVoice { voice_id, .. } if *voice_id == a)),
            Some(TestOp::CreateVoice { frequency, gain, .. }) if close(frequency, 880.0) && gain == 0.0
        ));

        assert_eq!(backend.param_value(a, VoiceParam::Gain), Some(0.0));
        backend.advance(DEFAULT_FADE_SECS);
        assert!(close(backend.param_value(a, VoiceParam::Gain).unwrap(), 0.2));
    }

    #[test]
    fn test_upper_octave_shares_detune() {
        let (mut pool, _backend) = make_pool();
        let mut detune = DetuneMap::zeroed();
        detune.set(PitchClass::A, 10.0);
        pool.start_all(&active(&["A", "A'"]), &detune);

        let base = pool.voice(NoteId::named("A")).unwrap().frequency;
        let upper = pool.voice(NoteId::named("A'")).unwrap().frequency;
        assert!((upper - 2.0 * base).abs() < 1e-9);
        assert!((base - detune_frequency(440.0, 10.0)).abs() < 1e-9);
    }

    #[test]
    fn test_deactivated_voice_fades_before_release() {
        let (mut pool, backend) = make_pool();
        let detune = DetuneMap::zeroed();
        pool.start_all(&active(&["C", "E"]), &detune);
        backend.advance(1.0);

        pool.reconcile(&active(&["C"]), &detune, Retune::Immediate);
        let e = NoteId::named("E");
        assert!(pool.voice(e).unwrap().is_fading());
        assert!(pool.poll().is_empty());
        assert!(pool.voice(e).is_some());

        backend.set_time(1.0 + DEFAULT_FADE_SECS / 2.0);
        assert!(pool.poll().is_empty());
        assert!(pool.voice(e).is_some());

        backend.set_time(1.0 + DEFAULT_FADE_SECS);
        assert_eq!(pool.poll(), vec![e]);
        assert!(pool.voice(e).is_none());
        assert_eq!(backend.voices_released().len(), 1);
    }

    #[test]
    fn test_stop_all_empties_only_after_fades() {
        let (mut pool, backend) = make_pool();
        pool.start_all(&active(&["C", "E", "G"]), &DetuneMap::zeroed());
        backend.advance(0.5);

        pool.stop_all();
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.sounding_count(), 0);
        assert!(backend.voices_released().is_empty());

        backend.advance(DEFAULT_FADE_SECS);
        assert_eq!(pool.poll().len(), 3);
        assert!(pool.is_empty());
        assert_eq!(backend.live_voices(), 0);
    }

    #[test]
    fn test_gain_reapplied_when_polyphony_changes() {
        let (mut pool, backend) = make_pool();
        let detune = DetuneMap::zeroed();
        pool.start_all(&active(&["C", "E"]), &detune);
        backend.advance(1.0);
        let c = pool.voice(NoteId::named("C")).unwrap().id;
        assert!(close(backend.param_value(c, VoiceParam::Gain).unwrap(), 0.2));

        pool.reconcile(&active(&["C", "E", "G", "C'", "E'", "G'"]), &detune, Retune::Immediate);
        backend.advance(DEFAULT_FADE_SECS);
        assert!(close(backend.param_value(c, VoiceParam::Gain).unwrap(), 0.1));
        let g = pool.voice(NoteId::named("G'")).unwrap().id;
        assert!(close(backend.param_value(g, VoiceParam::Gain).unwrap(), 0.1));
    }

    #[test]
    fn test_gain_updates_precede_creation() {
        let (mut pool, backend) = make_pool();
        let detune = DetuneMap::zeroed();
        pool.start_all(&active(&["C", "D", "E"]), &detune);
        backend.clear();

        pool.reconcile(&active(&["C", "D", "E", "F"]), &detune, Retune::Immediate);
        let ops = backend.operations();
        let created = ops
            .iter()
            .position(|op| matches!(op, TestOp::CreateVoice { .. }))
            .unwrap();
        let last_gain_update = ops
            .iter()
            .rposition(|op| {
                matches!(op, TestOp::Schedule { param: VoiceParam::Gain, event: ParamEvent::CancelAndHoldAtTime { .. }, .. })
            })
            .unwrap();
        assert!(last_gain_update < created);
    }

    #[test]
    fn test_immediate_retune_cancels_pending_ramp() {
        let (mut pool, backend) = make_pool();
        let a = NoteId::named("A");
        let zero = DetuneMap::zeroed();
        let mut target = DetuneMap::zeroed();
        target.set(PitchClass::A, 1200.0);
        pool.start_all(&ActivationSet::with_active([a]), &zero);

        pool.reconcile(
            &ActivationSet::with_active([a]),
            &zero,
            Retune::Ramp { target: &target, duration_secs: 2.0 },
        );
        backend.advance(1.0);
        let id = pool.voice(a).unwrap().id;
        let mid = backend.param_value(id, VoiceParam::Frequency).unwrap();
        assert!(close(mid, 660.0));

        let mut edited = DetuneMap::zeroed();
        edited.set(PitchClass::A, 0.0);
        pool.reconcile(&ActivationSet::with_active([a]), &edited, Retune::Immediate);
        backend.advance(1.0);
        assert!(close(backend.param_value(id, VoiceParam::Frequency).unwrap(), 440.0));
    }

    #[test]
    fn test_retarget_ramp_continues_from_current_frequency() {
        let (mut pool, backend) = make_pool();
        let a = NoteId::named("A");
        let set = ActivationSet::with_active([a]);
        let zero = DetuneMap::zeroed();
        pool.start_all(&set, &zero);

        let mut octave_up = DetuneMap::zeroed();
        octave_up.set(PitchClass::A, 1200.0);
        pool.reconcile(&set, &zero, Retune::Ramp { target: &octave_up, duration_secs: 2.0 });
        backend.advance(1.0);

        pool.reconcile(&set, &zero, Retune::Ramp { target: &zero, duration_secs: 2.0 });
        let id = pool.voice(a).unwrap().id;
        assert!(close(backend.param_value(id, VoiceParam::Frequency).unwrap(), 660.0));
        backend.advance(1.0);
        assert!(close(backend.param_value(id, VoiceParam::Frequency).unwrap(), 550.0));
    }

    #[test]
    fn test_new_voice_ramps_towards_target() {
        let (mut pool, backend) = make_pool();
        let a = NoteId::named("A");
        let mut target = DetuneMap::zeroed();
        target.set(PitchClass::A, 1200.0);

        pool.reconcile(
            &ActivationSet::with_active([a]),
            &DetuneMap::zeroed(),
            Retune::Ramp { target: &target, duration_secs: 2.0 },
        );
        let voice = pool.voice(a).unwrap();
        assert!((voice.frequency - 880.0).abs() < 1e-9);
        backend.advance(2.0);
        assert!(close(backend.param_value(voice.id, VoiceParam::Frequency).unwrap(), 880.0));
    }

    #[test]
    fn test_reactivation_revives_fading_voice() {
        let (mut pool, backend) = make_pool();
        let detune = DetuneMap::zeroed();
        let set = active(&["C"]);
        pool.start_all(&set, &detune);
        let id = pool.voice(NoteId::named("C")).unwrap().id;

        pool.reconcile(&ActivationSet::silent(), &detune, Retune::Immediate);
        backend.advance(DEFAULT_FADE_SECS / 2.0);
        pool.reconcile(&set, &detune, Retune::Immediate);

        backend.advance(DEFAULT_FADE_SECS);
        assert!(pool.poll().is_empty());
        let voice = pool.voice(NoteId::named("C")).unwrap();
        assert_eq!(voice.id, id);
        assert!(!voice.is_fading());
        assert!(close(backend.param_value(id, VoiceParam::Gain).unwrap(), 0.2));
        assert_eq!(backend.voices_created().len(), 1);
    }

    #[test]
    fn test_missing_detune_skips_note() {
        let (mut pool, backend) = make_pool();
        let detune: DetuneMap = [(PitchClass::C, 0.0)].into_iter().collect();
        pool.start_all(&active(&["C", "E"]), &detune);

        assert!(pool.voice(NoteId::named("C")).is_some());
        assert!(pool.voice(NoteId::named("E")).is_none());
        assert_eq!(backend.voices_created().len(), 1);
    }

    #[test]
    fn test_non_finite_frequency_skips_note() {
        let (mut pool, backend) = make_pool();
        let mut detune = DetuneMap::zeroed();
        detune.set(PitchClass::E, f64::NAN);
        pool.start_all(&active(&["C", "E"]), &detune);
        assert_eq!(pool.len(), 1);
        assert_eq!(backend.voices_created().len(), 1);
    }

    #[test]
    fn test_failed_create_leaves_pool_untouched() {
        let (mut pool, backend) = make_pool();
        backend.fail_creates(true);
        pool.start_all(&active(&["C"]), &DetuneMap::zeroed());
        assert!(pool.is_empty());

        backend.fail_creates(false);
        pool.start_all(&active(&["C"]), &DetuneMap::zeroed());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_retune_pitch_class_touches_only_its_octave_pair() {
        let (mut pool, backend) = make_pool();
        let set = active(&["A", "A'", "C"]);
        pool.start_all(&set, &DetuneMap::zeroed());
        backend.clear();

        let mut detune = DetuneMap::zeroed();
        detune.set(PitchClass::A, 100.0);
        pool.retune_pitch_class(PitchClass::A, &detune, Retune::Immediate);

        let upper = pool.voice(NoteId::named("A'")).unwrap();
        assert!((upper.frequency - detune_frequency(880.0, 100.0)).abs() < 1e-9);
        let c = pool.voice(NoteId::named("C")).unwrap().id;
        assert!(backend.events_for(c, VoiceParam::Frequency).is_empty());
        assert_eq!(backend.count(|op| matches!(op, TestOp::Schedule { param: VoiceParam::Gain, .. })), 0);
    }

    #[test]
    fn test_drain_all_releases_immediately() {
        let (mut pool, backend) = make_pool();
        pool.start_all(&active(&["C", "G"]), &DetuneMap::zeroed());
        assert_eq!(pool.drain_all(), 2);
        assert!(pool.is_empty());
        assert_eq!(backend.voices_released().len(), 2);
    }

    #[test]
    fn test_voices_created_in_canonical_order() {
        let (mut pool, backend) = make_pool();
        pool.start_all(&active(&["G'", "C", "E", "C'"]), &DetuneMap::zeroed());
        let created = backend.voices_created();
        let order: Vec<NoteId> = created
            .iter()
            .map(|id| pool.voices().find(|v| v.id == *id).unwrap().note)
            .collect();
        assert_eq!(
            order,
            vec![NoteId::named("C"), NoteId::named("E"), NoteId::named("C'"), NoteId::named("G'")]
        );
    }
}
