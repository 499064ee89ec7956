//! Real-time output through cpal.
//!
//! The stream callback owns the `Synth`. Commands reach it over a crossbeam
//! channel and are applied at the start of each buffer; the frame count it
//! publishes after each buffer is the clock `DeviceBackend` reports.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};

use crate::engine::backend::{AudioBackend, BackendError, BackendResult, VoiceId, VoiceParam};
use crate::param::ParamEvent;
use crate::synth::{frames_to_secs, Synth, SynthCmd};

/// Backend that forwards voice operations to a running output stream.
pub struct DeviceBackend {
    tx: Sender<SynthCmd>,
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl DeviceBackend {
    fn send(&self, cmd: SynthCmd) -> BackendResult {
        self.tx
            .send(cmd)
            .map_err(|_| BackendError("audio stream has shut down".to_string()))
    }
}

impl AudioBackend for DeviceBackend {
    fn current_time(&self) -> f64 {
        frames_to_secs(self.frames.load(Ordering::Acquire), self.sample_rate)
    }

    fn create_voice(&self, voice_id: VoiceId, frequency: f32, gain: f32) -> BackendResult {
        self.send(SynthCmd::CreateVoice {
            voice_id,
            frequency,
            gain,
        })
    }

    fn schedule(&self, voice_id: VoiceId, param: VoiceParam, event: ParamEvent) -> BackendResult {
        self.send(SynthCmd::Schedule {
            voice_id,
            param,
            event,
        })
    }

    fn release_voice(&self, voice_id: VoiceId) -> BackendResult {
        self.send(SynthCmd::Release(voice_id))
    }
}

/// Handle keeping the output stream alive. Dropping it stops the sound.
pub struct AudioOutput {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
    channels: u16,
}

impl AudioOutput {
    /// Open the default output device and start a silent stream.
    pub fn open_default() -> Result<(AudioOutput, DeviceBackend), String> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| "No output device available".to_string())?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported = device
            .default_output_config()
            .map_err(|e| format!("Failed to get output config: {}", e))?;
        let sample_format = supported.sample_format();
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        let config: StreamConfig = supported.into();

        let (tx, rx) = crossbeam_channel::unbounded();
        let frames = Arc::new(AtomicU64::new(0));
        let synth = Synth::new(sample_rate);

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, synth, rx, Arc::clone(&frames)),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, synth, rx, Arc::clone(&frames)),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, synth, rx, Arc::clone(&frames)),
            other => return Err(format!("Unsupported sample format: {:?}", other)),
        }?;

        stream
            .play()
            .map_err(|e| format!("Failed to start output stream: {}", e))?;

        log::info!(
            target: "audio::device",
            "output open on '{}': {} Hz, {} channels, {:?}",
            device_name,
            sample_rate,
            channels,
            sample_format
        );

        let output = AudioOutput {
            _stream: stream,
            device_name,
            sample_rate,
            channels,
        };
        let backend = DeviceBackend {
            tx,
            frames,
            sample_rate,
        };
        Ok((output, backend))
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut synth: Synth,
    rx: Receiver<SynthCmd>,
    frames: Arc<AtomicU64>,
) -> Result<Stream, String>
where
    T: OutputSample + cpal::SizedSample + Send + 'static,
{
    let channels = config.channels as usize;
    let mut mono: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for cmd in rx.try_iter() {
                    synth.apply(cmd);
                }
                if channels == 0 {
                    return;
                }
                let frame_count = data.len() / channels;
                mono.resize(frame_count, 0.0);
                synth.render(&mut mono);
                for (frame, sample) in data.chunks_mut(channels).zip(mono.iter()) {
                    let value = T::from_f32(*sample);
                    for slot in frame.iter_mut() {
                        *slot = value;
                    }
                }
                frames.store(synth.frames(), Ordering::Release);
            },
            |err| {
                log::error!(target: "audio::device", "Audio output error: {}", err);
            },
            None,
        )
        .map_err(|e| format!("Failed to build output stream: {}", e))
}

trait OutputSample: Copy {
    fn from_f32(s: f32) -> Self;
}

impl OutputSample for f32 {
    fn from_f32(s: f32) -> Self {
        s.clamp(-1.0, 1.0)
    }
}

impl OutputSample for i16 {
    fn from_f32(s: f32) -> Self {
        (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
    }
}

impl OutputSample for u16 {
    fn from_f32(s: f32) -> Self {
        (((s.clamp(-1.0, 1.0) * 0.5) + 0.5) * u16::MAX as f32) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_conversion_clamps() {
        assert_eq!(<i16 as OutputSample>::from_f32(2.0), i16::MAX);
        assert_eq!(<i16 as OutputSample>::from_f32(0.0), 0);
        assert_eq!(<u16 as OutputSample>::from_f32(-1.0), 0);
        assert_eq!(<f32 as OutputSample>::from_f32(-3.0), -1.0);
    }

    #[test]
    fn device_backend_reports_published_frames() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let frames = Arc::new(AtomicU64::new(0));
        let backend = DeviceBackend {
            tx,
            frames: Arc::clone(&frames),
            sample_rate: 48_000,
        };
        frames.store(24_000, Ordering::Release);
        assert_eq!(backend.current_time(), 0.5);

        backend.create_voice(1, 440.0, 0.0).unwrap();
        backend.release_voice(1).unwrap();
        let cmds: Vec<SynthCmd> = rx.try_iter().collect();
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[1], SynthCmd::Release(1));
    }

    #[test]
    fn closed_stream_is_a_backend_error() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        let backend = DeviceBackend {
            tx,
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate: 48_000,
        };
        assert!(backend.release_voice(1).is_err());
    }
}
