//! The tuner engine: activation state, detune transitions and the voice pool
//! under one owner.
//!
//! One `Tuner` exists per playback session. The caller drives it: actions
//! mutate state, and `tick` is called once per frame to advance the detune
//! transition and release voices whose fade-out has finished.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use beatfree_audio::engine::backend::AudioBackend;
use beatfree_audio::{PoolSettings, Retune, VoicePool};
use beatfree_types::chord::{chord_activation, interval_activation};
use beatfree_types::transition::DEFAULT_TRANSITION;
use beatfree_types::tuning::resolve_beat_free;
use beatfree_types::{
    ActivationSet, Advance, ChordType, DetuneMap, FrequencyTable, Interval, NoteId, PitchClass,
    TransitionEngine, TransitionState,
};

use crate::snapshot::TunerSnapshot;

/// What `toggle_note` flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToggleMode {
    /// Both octave instances of the pitch class
    #[default]
    Pair,
    /// Only the base octave instance
    Single,
}

#[derive(Debug, Clone)]
pub struct TunerSettings {
    pub frequencies: FrequencyTable,
    pub transition: Duration,
    pub pool: PoolSettings,
    pub toggle_mode: ToggleMode,
}

impl Default for TunerSettings {
    fn default() -> Self {
        Self {
            frequencies: FrequencyTable::default(),
            transition: DEFAULT_TRANSITION,
            pool: PoolSettings::default(),
            toggle_mode: ToggleMode::default(),
        }
    }
}

/// C and E in both octaves.
pub fn default_activation() -> ActivationSet {
    ActivationSet::with_active([PitchClass::C, PitchClass::E].into_iter().flat_map(|pc| pc.notes()))
}

pub struct Tuner {
    active: ActivationSet,
    transition: TransitionEngine,
    pool: VoicePool,
    toggle_mode: ToggleMode,
    playing: bool,
}

impl Tuner {
    /// Build a tuner whose starting detune values apply without animation.
    pub fn new(
        backend: Box<dyn AudioBackend>,
        settings: TunerSettings,
        active: ActivationSet,
        detune: DetuneMap,
    ) -> Self {
        let mut transition = TransitionEngine::new(settings.transition);
        transition.initialize(detune);
        Self {
            active,
            transition,
            pool: VoicePool::new(backend, settings.frequencies, settings.pool),
            toggle_mode: settings.toggle_mode,
            playing: false,
        }
    }

    /// Default settings, default activation, equal temperament.
    pub fn with_backend(backend: Box<dyn AudioBackend>) -> Self {
        Self::new(
            backend,
            TunerSettings::default(),
            default_activation(),
            DetuneMap::zeroed(),
        )
    }

    // ── Read-only views ──────────────────────────────────────────────

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn activation(&self) -> &ActivationSet {
        &self.active
    }

    pub fn is_active(&self, note: NoteId) -> bool {
        self.active.is_active(note)
    }

    /// Audible detune for `pc` in cents; 0 when no value is stored.
    pub fn current_detune(&self, pc: PitchClass) -> f64 {
        self.transition.current_cents(pc).unwrap_or(0.0)
    }

    pub fn current_detune_map(&self) -> &DetuneMap {
        self.transition.current()
    }

    pub fn target_detune_map(&self) -> &DetuneMap {
        self.transition.target()
    }

    pub fn transition_state(&self) -> TransitionState {
        self.transition.state()
    }

    pub fn transition_duration(&self) -> Duration {
        self.transition.duration()
    }

    pub fn set_transition_duration(&mut self, duration: Duration) {
        self.transition.set_duration(duration);
    }

    pub fn toggle_mode(&self) -> ToggleMode {
        self.toggle_mode
    }

    pub fn set_toggle_mode(&mut self, mode: ToggleMode) {
        self.toggle_mode = mode;
    }

    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }

    /// True once stopped and every fade-out has been released.
    pub fn is_silent(&self) -> bool {
        !self.playing && self.pool.is_empty()
    }

    // ── Activation ───────────────────────────────────────────────────

    /// Switch a single note instance on or off.
    pub fn set_activation(&mut self, note: NoteId, active: bool, now: Instant) {
        if self.active.is_active(note) == active {
            return;
        }
        self.active.set(note, active);
        self.sync(now);
    }

    /// Flip a pitch class according to the toggle mode. Returns whether the
    /// base instance is now active.
    pub fn toggle_note(&mut self, pc: PitchClass, now: Instant) -> bool {
        match self.toggle_mode {
            ToggleMode::Pair => self.active.toggle_pair(pc),
            ToggleMode::Single => {
                self.active.toggle(pc.base());
            }
        }
        self.sync(now);
        self.active.is_active(pc.base())
    }

    /// Replace the activation set with `chord` on `root`.
    pub fn apply_chord(&mut self, root: PitchClass, chord: ChordType, now: Instant) {
        log::debug!(target: "tuner", "chord {} {}", root, chord);
        self.replace_activation(chord_activation(root, chord), now);
    }

    /// Replace the activation set with `root` and the note `interval` above it.
    pub fn apply_interval(&mut self, root: PitchClass, interval: &Interval, now: Instant) {
        log::debug!(target: "tuner", "interval {} from {}", interval.name, root);
        self.replace_activation(interval_activation(root, interval), now);
    }

    pub fn replace_activation(&mut self, active: ActivationSet, now: Instant) {
        self.active = active;
        self.sync(now);
    }

    // ── Detune ───────────────────────────────────────────────────────

    /// Manual edit: applies at once, to both octave instances of `pc`.
    pub fn set_detune(&mut self, pc: PitchClass, cents: f64) {
        self.transition.set_immediate(pc, cents);
        if self.playing {
            self.pool
                .retune_pitch_class(pc, self.transition.current(), Retune::Immediate);
        }
    }

    /// Animate the active pitch classes to beat-free ratios above the lowest
    /// active one. Nothing happens when no note is active.
    pub fn request_auto_tune(&mut self, now: Instant) -> TransitionState {
        let Some(target) = resolve_beat_free(&self.active, self.transition.current()) else {
            log::debug!(target: "tuner", "auto-tune with no active notes");
            return self.transition.state();
        };
        self.retarget(&target, now)
    }

    /// Animate the active pitch classes back to equal temperament. Inactive
    /// pitch classes keep their values.
    pub fn request_reset(&mut self, now: Instant) -> TransitionState {
        let mut target = self.transition.current().clone();
        for pc in self.active.active_pitch_classes() {
            target.set(pc, 0.0);
        }
        self.retarget(&target, now)
    }

    fn retarget(&mut self, target: &DetuneMap, now: Instant) -> TransitionState {
        let state = self.transition.retarget(target, &self.active, now);
        log::debug!(target: "tuner", "retarget -> {:?}", state);
        self.sync(now);
        state
    }

    // ── Playback ─────────────────────────────────────────────────────

    pub fn play(&mut self, now: Instant) {
        if self.playing {
            return;
        }
        self.playing = true;
        log::info!(target: "tuner", "play: {} notes", self.active.active_count());
        self.sync(now);
    }

    pub fn stop(&mut self) {
        if !self.playing {
            return;
        }
        self.playing = false;
        log::info!(target: "tuner", "stop");
        self.pool.stop_all();
    }

    /// Per-frame step: advance the transition and release finished fades.
    pub fn tick(&mut self, now: Instant) -> Advance {
        let advance = self.transition.advance(now);
        if advance == Advance::Completed && self.playing {
            // device ramps have landed; pin voices to the exact target
            self.pool
                .reconcile(&self.active, self.transition.current(), Retune::Immediate);
        }
        for note in self.pool.poll() {
            log::debug!(target: "tuner", "released {}", note);
        }
        advance
    }

    /// Release every voice at once and stop. The tuner can be played again.
    pub fn shutdown(&mut self) {
        self.playing = false;
        let released = self.pool.drain_all();
        log::debug!(target: "tuner", "shutdown released {} voices", released);
    }

    // ── Snapshot ─────────────────────────────────────────────────────

    /// Activation plus the detune values the tuner is heading towards.
    pub fn snapshot(&self) -> TunerSnapshot {
        TunerSnapshot {
            active_notes: self.active.active_notes().collect(),
            detune_cents: self.transition.target().clone(),
        }
    }

    /// Apply a snapshot without animation.
    pub fn restore(&mut self, snapshot: &TunerSnapshot, now: Instant) {
        let mut detune = DetuneMap::zeroed();
        for (pc, cents) in snapshot.detune_cents.iter() {
            detune.set(pc, cents);
        }
        self.transition.initialize(detune);
        self.active = ActivationSet::with_active(snapshot.active_notes.iter().copied());
        self.sync(now);
    }

    /// Bring the voice pool in line with the current state. While a
    /// transition is in flight, voices ramp to its target over the time it
    /// has left.
    fn sync(&mut self, now: Instant) {
        if !self.playing {
            return;
        }
        let retune = if self.transition.is_animating() {
            Retune::Ramp {
                target: self.transition.target(),
                duration_secs: self.transition.remaining(now).as_secs_f64(),
            }
        } else {
            Retune::Immediate
        };
        self.pool.reconcile(&self.active, self.transition.current(), retune);
    }
}
