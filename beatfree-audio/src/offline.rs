//! Offline rendering: drive the synth faster than real time and write the
//! result to a WAV file.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::engine::backend::{AudioBackend, BackendError, BackendResult, VoiceId, VoiceParam};
use crate::param::ParamEvent;
use crate::synth::{Synth, SynthCmd};

/// Backend whose clock only moves when `render` is called. Clones share the
/// same synth, so the caller can keep one while the voice pool owns another.
#[derive(Clone)]
pub struct OfflineBackend {
    synth: Arc<Mutex<Synth>>,
}

impl OfflineBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            synth: Arc::new(Mutex::new(Synth::new(sample_rate))),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.synth.lock().map(|s| s.sample_rate()).unwrap_or(0)
    }

    /// Render the next `frames` mono samples.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        if let Ok(mut synth) = self.synth.lock() {
            synth.render(&mut out);
        }
        out
    }

    pub fn voice_count(&self) -> usize {
        self.synth.lock().map(|s| s.voice_count()).unwrap_or(0)
    }

    fn apply(&self, cmd: SynthCmd) -> BackendResult {
        let mut synth = self
            .synth
            .lock()
            .map_err(|_| BackendError("offline renderer lock poisoned".to_string()))?;
        synth.apply(cmd);
        Ok(())
    }
}

impl AudioBackend for OfflineBackend {
    fn current_time(&self) -> f64 {
        self.synth.lock().map(|s| s.time()).unwrap_or(0.0)
    }

    fn create_voice(&self, voice_id: VoiceId, frequency: f32, gain: f32) -> BackendResult {
        self.apply(SynthCmd::CreateVoice {
            voice_id,
            frequency,
            gain,
        })
    }

    fn schedule(&self, voice_id: VoiceId, param: VoiceParam, event: ParamEvent) -> BackendResult {
        self.apply(SynthCmd::Schedule {
            voice_id,
            param,
            event,
        })
    }

    fn release_voice(&self, voice_id: VoiceId) -> BackendResult {
        self.apply(SynthCmd::Release(voice_id))
    }
}

/// Write mono samples to a 32-bit float WAV file.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), String> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| format!("Failed to create WAV writer: {}", e))?;

    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| format!("Failed to write sample: {}", e))?;
    }

    writer
        .finalize()
        .map_err(|e| format!("Failed to finalize WAV: {}", e))?;

    log::info!(target: "audio::offline", "wrote {} samples to {}", samples.len(), path.display());
    Ok(())
}
