//! Audio backend trait: a semantic-level abstraction over the output device.
//!
//! `AudioBackend` captures what the voice pool *means* to do (start a voice,
//! schedule a parameter change, release a voice) independently of how it's
//! done (a cpal stream, an offline renderer). This enables unit testing of
//! voice handling without an audio device.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::param::{AudioParam, ParamEvent};

/// Result type for backend operations.
pub type BackendResult<T = ()> = Result<T, BackendError>;

/// Error from a backend operation.
#[derive(Debug, Clone)]
pub struct BackendError(pub String);

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError(e.to_string())
    }
}

impl From<String> for BackendError {
    fn from(s: String) -> Self {
        BackendError(s)
    }
}

/// Identifier for a voice on the backend.
pub type VoiceId = u32;

/// The two automatable parameters of a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceParam {
    Frequency,
    Gain,
}

/// Semantic-level audio backend trait.
///
/// Times are seconds on the backend's own clock, as reported by
/// `current_time`. Implementations translate these into device commands or
/// record them for testing.
pub trait AudioBackend: Send {
    /// Current position of the audio clock in seconds.
    fn current_time(&self) -> f64;

    /// Start a sine voice. It sounds immediately at `frequency` and `gain`
    /// until its parameters are scheduled otherwise.
    fn create_voice(&self, voice_id: VoiceId, frequency: f32, gain: f32) -> BackendResult;

    /// Add an event to one of a voice's parameter timelines.
    fn schedule(&self, voice_id: VoiceId, param: VoiceParam, event: ParamEvent) -> BackendResult;

    /// Stop a voice and discard it.
    fn release_voice(&self, voice_id: VoiceId) -> BackendResult;

    /// Schedule several events on one parameter, in order.
    fn schedule_all(&self, voice_id: VoiceId, param: VoiceParam, events: &[ParamEvent]) -> BackendResult {
        for event in events {
            self.schedule(voice_id, param, *event)?;
        }
        Ok(())
    }
}

// ─── TestBackend ────────────────────────────────────────────────────

/// Recorded operation from TestBackend, for assertions in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum TestOp {
    CreateVoice {
        voice_id: VoiceId,
        frequency: f32,
        gain: f32,
    },
    Schedule {
        voice_id: VoiceId,
        param: VoiceParam,
        event: ParamEvent,
    },
    ReleaseVoice(VoiceId),
}

/// A test backend that records all operations into a vector for assertions.
/// All operations succeed by default. Uses `Mutex` for interior mutability
/// so the backend is `Send + Sync` (needed for `Arc<TestBackend>` sharing).
///
/// The clock only moves when the test advances it. Scheduled events are also
/// applied to a parameter model so tests can ask what a voice sounds like.
pub struct TestBackend {
    ops: Mutex<Vec<TestOp>>,
    clock: Mutex<f64>,
    params: Mutex<HashMap<(VoiceId, VoiceParam), AudioParam>>,
    fail_creates: Mutex<bool>,
}

impl TestBackend {
    pub fn new() -> Self {
        Self {
            ops: Mutex::new(Vec::new()),
            clock: Mutex::new(0.0),
            params: Mutex::new(HashMap::new()),
            fail_creates: Mutex::new(false),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: f64) {
        *self.clock.lock().unwrap() += secs;
    }

    pub fn set_time(&self, secs: f64) {
        *self.clock.lock().unwrap() = secs;
    }

    /// Make subsequent `create_voice` calls fail.
    pub fn fail_creates(&self, fail: bool) {
        *self.fail_creates.lock().unwrap() = fail;
    }

    /// Return all recorded operations.
    pub fn operations(&self) -> Vec<TestOp> {
        self.ops.lock().unwrap().clone()
    }

    /// Clear recorded operations.
    pub fn clear(&self) {
        self.ops.lock().unwrap().clear();
    }

    /// Count operations matching a predicate.
    pub fn count<F: Fn(&TestOp) -> bool>(&self, f: F) -> usize {
        self.ops.lock().unwrap().iter().filter(|op| f(op)).count()
    }

    /// Find the first operation matching a predicate.
    pub fn find<F: Fn(&TestOp) -> bool>(&self, f: F) -> Option<TestOp> {
        self.ops.lock().unwrap().iter().find(|op| f(op)).cloned()
    }

    /// Return the ids of all created voices, in creation order.
    pub fn voices_created(&self) -> Vec<VoiceId> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                TestOp::CreateVoice { voice_id, .. } => Some(*voice_id),
                _ => None,
            })
            .collect()
    }

    /// Return all released voice ids.
    pub fn voices_released(&self) -> Vec<VoiceId> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                TestOp::ReleaseVoice(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Events scheduled on one parameter of one voice.
    pub fn events_for(&self, voice_id: VoiceId, param: VoiceParam) -> Vec<ParamEvent> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                TestOp::Schedule {
                    voice_id: id,
                    param: p,
                    event,
                } if *id == voice_id && *p == param => Some(*event),
                _ => None,
            })
            .collect()
    }

    /// Value of a live voice's parameter at the current clock time.
    pub fn param_value(&self, voice_id: VoiceId, param: VoiceParam) -> Option<f32> {
        let now = *self.clock.lock().unwrap();
        self.params
            .lock()
            .unwrap()
            .get(&(voice_id, param))
            .map(|p| p.value_at(now))
    }

    /// Number of voices created and not yet released.
    pub fn live_voices(&self) -> usize {
        self.params
            .lock()
            .unwrap()
            .keys()
            .filter(|(_, p)| *p == VoiceParam::Gain)
            .count()
    }
}

impl AudioBackend for TestBackend {
    fn current_time(&self) -> f64 {
        *self.clock.lock().unwrap()
    }

    fn create_voice(&self, voice_id: VoiceId, frequency: f32, gain: f32) -> BackendResult {
        if *self.fail_creates.lock().unwrap() {
            return Err(BackendError(format!("voice {} refused", voice_id)));
        }
        self.ops.lock().unwrap().push(TestOp::CreateVoice {
            voice_id,
            frequency,
            gain,
        });
        let mut params = self.params.lock().unwrap();
        params.insert((voice_id, VoiceParam::Frequency), AudioParam::new(frequency));
        params.insert((voice_id, VoiceParam::Gain), AudioParam::new(gain));
        Ok(())
    }

    fn schedule(&self, voice_id: VoiceId, param: VoiceParam, event: ParamEvent) -> BackendResult {
        self.ops.lock().unwrap().push(TestOp::Schedule {
            voice_id,
            param,
            event,
        });
        if let Some(p) = self.params.lock().unwrap().get_mut(&(voice_id, param)) {
            p.apply(event);
        }
        Ok(())
    }

    fn release_voice(&self, voice_id: VoiceId) -> BackendResult {
        self.ops.lock().unwrap().push(TestOp::ReleaseVoice(voice_id));
        let mut params = self.params.lock().unwrap();
        params.remove(&(voice_id, VoiceParam::Frequency));
        params.remove(&(voice_id, VoiceParam::Gain));
        Ok(())
    }
}

impl Default for TestBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps `Arc<TestBackend>` to implement `AudioBackend` so the pool can
/// own a `Box<dyn AudioBackend>` while tests retain an `Arc` for assertions.
pub struct SharedTestBackend(pub Arc<TestBackend>);

impl AudioBackend for SharedTestBackend {
    fn current_time(&self) -> f64 {
        self.0.current_time()
    }
    fn create_voice(&self, voice_id: VoiceId, frequency: f32, gain: f32) -> BackendResult {
        self.0.create_voice(voice_id, frequency, gain)
    }
    fn schedule(&self, voice_id: VoiceId, param: VoiceParam, event: ParamEvent) -> BackendResult {
        self.0.schedule(voice_id, param, event)
    }
    fn release_voice(&self, voice_id: VoiceId) -> BackendResult {
        self.0.release_voice(voice_id)
    }
}

// ─── NullBackend ────────────────────────────────────────────────────

/// A no-op backend that silently succeeds. Its clock always reads as
/// infinitely late, so any fade scheduled on it is over by the next poll.
/// Useful when no output device is available.
pub struct NullBackend;

impl AudioBackend for NullBackend {
    fn current_time(&self) -> f64 { f64::INFINITY }
    fn create_voice(&self, _: VoiceId, _: f32, _: f32) -> BackendResult { Ok(()) }
    fn schedule(&self, _: VoiceId, _: VoiceParam, _: ParamEvent) -> BackendResult { Ok(()) }
    fn release_voice(&self, _: VoiceId) -> BackendResult { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_records_operations() {
        let backend = TestBackend::new();
        backend.create_voice(1, 440.0, 0.0).unwrap();
        backend
            .schedule(1, VoiceParam::Gain, ParamEvent::LinearRampToValueAtTime { value: 0.2, time: 0.05 })
            .unwrap();
        backend.release_voice(1).unwrap();

        assert_eq!(backend.operations().len(), 3);
        assert_eq!(backend.voices_created(), vec![1]);
        assert_eq!(backend.voices_released(), vec![1]);
        assert_eq!(backend.events_for(1, VoiceParam::Gain).len(), 1);
        assert_eq!(backend.live_voices(), 0);
    }

    #[test]
    fn test_backend_tracks_parameter_values() {
        let backend = TestBackend::new();
        backend.create_voice(7, 440.0, 0.0).unwrap();
        backend
            .schedule_all(
                7,
                VoiceParam::Gain,
                &[
                    ParamEvent::SetValueAtTime { value: 0.0, time: 0.0 },
                    ParamEvent::LinearRampToValueAtTime { value: 0.2, time: 0.1 },
                ],
            )
            .unwrap();

        backend.advance(0.05);
        let mid = backend.param_value(7, VoiceParam::Gain).unwrap();
        assert!((mid - 0.1).abs() < 1e-6);
        backend.advance(0.05);
        assert_eq!(backend.param_value(7, VoiceParam::Gain), Some(0.2));
        assert_eq!(backend.param_value(7, VoiceParam::Frequency), Some(440.0));
    }

    #[test]
    fn failing_create_is_not_recorded() {
        let backend = TestBackend::new();
        backend.fail_creates(true);
        assert!(backend.create_voice(1, 440.0, 0.0).is_err());
        assert!(backend.operations().is_empty());
        assert_eq!(backend.live_voices(), 0);
    }

    #[test]
    fn shared_backend_forwards_to_inner() {
        let inner = Arc::new(TestBackend::new());
        let shared = SharedTestBackend(Arc::clone(&inner));
        inner.set_time(2.5);
        assert_eq!(shared.current_time(), 2.5);
        shared.create_voice(3, 220.0, 0.1).unwrap();
        assert_eq!(inner.voices_created(), vec![3]);
    }
}
