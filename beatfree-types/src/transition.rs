//! Time-based interpolation of detune values.
//!
//! The engine keeps two maps: `current` (what should be audible now) and
//! `target` (where an in-flight transition is heading). The surrounding
//! scheduler calls [`TransitionEngine::advance`] once per frame; nothing here
//! reads a clock on its own, so tests drive it with synthetic instants.
//!
//! Interpolation is linear in cents. Only pitch classes that were active when
//! the transition was requested are animated; everything else keeps its
//! stored value verbatim.

use std::time::{Duration, Instant};

use crate::note::PitchClass;
use crate::state::{ActivationSet, DetuneMap};

/// Default duration of a gradual retune.
pub const DEFAULT_TRANSITION: Duration = Duration::from_millis(2000);

/// Differences below this many cents are treated as already settled.
const SETTLE_EPSILON_CENTS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    /// `current == target`, nothing scheduled
    Idle,
    /// A transition is in flight
    Animating,
}

/// Outcome of one [`TransitionEngine::advance`] step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Advance {
    /// Nothing was in flight.
    Idle,
    /// Still interpolating; `progress` is in `[0, 1)`.
    Animating { progress: f64 },
    /// The transition finished on this step and values were snapped to target.
    Completed,
}

impl Advance {
    pub fn is_done(&self) -> bool {
        !matches!(self, Advance::Animating { .. })
    }
}

#[derive(Debug, Clone)]
struct InFlight {
    start: DetuneMap,
    started_at: Instant,
    duration: Duration,
    animated: Vec<PitchClass>,
}

#[derive(Debug, Clone)]
pub struct TransitionEngine {
    current: DetuneMap,
    target: DetuneMap,
    duration: Duration,
    in_flight: Option<InFlight>,
    initialized: bool,
}

impl TransitionEngine {
    pub fn new(duration: Duration) -> Self {
        Self {
            current: DetuneMap::zeroed(),
            target: DetuneMap::zeroed(),
            duration,
            in_flight: None,
            initialized: false,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Applies to transitions requested from now on.
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Establish starting values without animating toward them.
    pub fn initialize(&mut self, values: DetuneMap) {
        self.current = values.clone();
        self.target = values;
        self.in_flight = None;
        self.initialized = true;
    }

    pub fn state(&self) -> TransitionState {
        if self.in_flight.is_some() {
            TransitionState::Animating
        } else {
            TransitionState::Idle
        }
    }

    pub fn is_animating(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn current(&self) -> &DetuneMap {
        &self.current
    }

    pub fn target(&self) -> &DetuneMap {
        &self.target
    }

    pub fn current_cents(&self, pc: PitchClass) -> Option<f64> {
        self.current.get(pc)
    }

    /// Pitch classes moving in the in-flight transition.
    pub fn animated(&self) -> &[PitchClass] {
        self.in_flight.as_ref().map(|f| f.animated.as_slice()).unwrap_or(&[])
    }

    /// Time left until the in-flight transition completes.
    pub fn remaining(&self, now: Instant) -> Duration {
        match &self.in_flight {
            Some(flight) => flight
                .duration
                .saturating_sub(now.saturating_duration_since(flight.started_at)),
            None => Duration::ZERO,
        }
    }

    /// Direct manual edit: `current` and `target` move together, no animation.
    ///
    /// If `pc` was part of an in-flight transition it drops out of it; the
    /// other animated pitch classes carry on.
    pub fn set_immediate(&mut self, pc: PitchClass, cents: f64) {
        self.current.set(pc, cents);
        self.target.set(pc, cents);
        self.initialized = true;
        if let Some(flight) = &mut self.in_flight {
            flight.start.set(pc, cents);
            flight.animated.retain(|p| *p != pc);
            if flight.animated.is_empty() {
                self.in_flight = None;
            }
        }
    }

    /// Request a gradual move toward `requested` for the active pitch classes.
    ///
    /// Any in-flight transition is superseded: interpolation restarts from the
    /// values reached at `now`, and the full duration starts counting again.
    /// Inactive pitch classes keep their stored value. The very first call on
    /// an uninitialised engine applies `requested` directly.
    pub fn retarget(
        &mut self,
        requested: &DetuneMap,
        active: &ActivationSet,
        now: Instant,
    ) -> TransitionState {
        if !self.initialized {
            self.initialize(requested.clone());
            return TransitionState::Idle;
        }

        self.interpolate(now);
        self.in_flight = None;
        self.target = self.current.clone();

        let mut animated = Vec::new();
        for pc in active.active_pitch_classes() {
            let Some(cents) = requested.get(pc) else {
                continue;
            };
            self.target.set(pc, cents);
            match self.current.get(pc) {
                Some(from) if (from - cents).abs() > SETTLE_EPSILON_CENTS => animated.push(pc),
                Some(_) => {}
                None => self.current.set(pc, cents),
            }
        }

        if animated.is_empty() {
            return TransitionState::Idle;
        }
        if self.duration.is_zero() {
            self.current = self.target.clone();
            return TransitionState::Idle;
        }

        log::debug!(
            target: "tuning",
            "retuning {} pitch class(es) over {:?}",
            animated.len(),
            self.duration
        );
        self.in_flight = Some(InFlight {
            start: self.current.clone(),
            started_at: now,
            duration: self.duration,
            animated,
        });
        TransitionState::Animating
    }

    /// Move `current` to where it should be at `now`.
    ///
    /// Once the elapsed time reaches the duration, values snap exactly to
    /// target and the engine reports [`Advance::Completed`] once, then
    /// [`Advance::Idle`] on later calls.
    pub fn advance(&mut self, now: Instant) -> Advance {
        if self.in_flight.is_none() {
            return Advance::Idle;
        }
        match self.interpolate(now) {
            Some(progress) if progress < 1.0 => Advance::Animating { progress },
            _ => {
                self.in_flight = None;
                log::debug!(target: "tuning", "transition complete");
                Advance::Completed
            }
        }
    }

    /// Writes interpolated values into `current`. Returns clamped progress,
    /// or `None` when idle.
    fn interpolate(&mut self, now: Instant) -> Option<f64> {
        let flight = self.in_flight.as_ref()?;
        let elapsed = now.saturating_duration_since(flight.started_at);
        let progress = (elapsed.as_secs_f64() / flight.duration.as_secs_f64()).clamp(0.0, 1.0);

        for pc in &flight.animated {
            let (Some(start), Some(end)) = (flight.start.get(*pc), self.target.get(*pc)) else {
                continue;
            };
            let value = if progress >= 1.0 {
                end
            } else {
                start + (end - start) * progress
            };
            self.current.set(*pc, value);
        }
        Some(progress)
    }
}

impl Default for TransitionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSITION)
    }
}
