//! Software sine synthesizer: one oscillator and one gain per voice.
//!
//! The synth is driven by `SynthCmd`s and renders mono blocks. It keeps its
//! own frame counter, which is the audio clock every backend reports.

use std::f64::consts::TAU;

use crate::engine::backend::{VoiceId, VoiceParam};
use crate::param::{AudioParam, ParamEvent};

/// Commands accepted by the synth, in the order they must be applied.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthCmd {
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
    Release(VoiceId),
}

struct SynthVoice {
    id: VoiceId,
    phase: f64,
    frequency: AudioParam,
    gain: AudioParam,
}

pub struct Synth {
    sample_rate: u32,
    frame: u64,
    voices: Vec<SynthVoice>,
}

impl Synth {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frame: 0,
            voices: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frame
    }

    /// Audio clock in seconds.
    pub fn time(&self) -> f64 {
        frames_to_secs(self.frame, self.sample_rate)
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn apply(&mut self, cmd: SynthCmd) {
        match cmd {
            SynthCmd::CreateVoice {
                voice_id,
                frequency,
                gain,
            } => {
                self.voices.retain(|v| v.id != voice_id);
                self.voices.push(SynthVoice {
                    id: voice_id,
                    phase: 0.0,
                    frequency: AudioParam::new(frequency),
                    gain: AudioParam::new(gain),
                });
            }
            SynthCmd::Schedule {
                voice_id,
                param,
                event,
            } => {
                let Some(voice) = self.voices.iter_mut().find(|v| v.id == voice_id) else {
                    log::debug!(target: "audio::synth", "event for unknown voice {}", voice_id);
                    return;
                };
                match param {
                    VoiceParam::Frequency => voice.frequency.apply(event),
                    VoiceParam::Gain => voice.gain.apply(event),
                }
            }
            SynthCmd::Release(voice_id) => {
                self.voices.retain(|v| v.id != voice_id);
            }
        }
    }

    /// Render mono samples into `out`, overwriting it.
    pub fn render(&mut self, out: &mut [f32]) {
        let rate = self.sample_rate as f64;
        for sample in out.iter_mut() {
            let t = frames_to_secs(self.frame, self.sample_rate);
            let mut mix = 0.0f64;
            for voice in &mut self.voices {
                let gain = voice.gain.value_at(t) as f64;
                let hz = voice.frequency.value_at(t) as f64;
                mix += (voice.phase * TAU).sin() * gain;
                voice.phase = (voice.phase + hz / rate).fract();
            }
            *sample = mix as f32;
            self.frame += 1;
        }

        let now = self.time();
        for voice in &mut self.voices {
            voice.frequency.prune(now);
            voice.gain.prune(now);
        }
    }
}

pub fn frames_to_secs(frames: u64, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    frames as f64 / sample_rate as f64
}
