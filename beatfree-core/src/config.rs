use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use beatfree_audio::PoolSettings;
use beatfree_types::{ActivationSet, FrequencyTable, NoteId};

use crate::tuner::{default_activation, ToggleMode, TunerSettings};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    tuning: TuningConfig,
    #[serde(default)]
    audio: AudioConfig,
    #[serde(default)]
    defaults: DefaultsConfig,
}

#[derive(Deserialize, Default)]
struct TuningConfig {
    reference_hz: Option<f64>,
    transition_ms: Option<u64>,
}

#[derive(Deserialize, Default)]
struct AudioConfig {
    base_gain: Option<f32>,
    polyphony_threshold: Option<usize>,
    fade_ms: Option<u64>,
    sample_rate: Option<u32>,
}

#[derive(Deserialize, Default)]
struct DefaultsConfig {
    active_notes: Option<Vec<String>>,
    toggle_mode: Option<String>,
}

pub struct Config {
    tuning: TuningConfig,
    audio: AudioConfig,
    defaults: DefaultsConfig,
}

impl Config {
    /// Embedded defaults overlaid with the user's config file, if any.
    pub fn load() -> Self {
        Self::load_from(user_config_path().as_deref())
    }

    /// Embedded defaults overlaid with the file at `path`. A missing,
    /// unreadable or malformed file leaves the defaults in place.
    pub fn load_from(path: Option<&Path>) -> Self {
        let mut base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");

        if let Some(path) = path {
            if path.exists() {
                match std::fs::read_to_string(path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => merge(&mut base, user),
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        Config {
            tuning: base.tuning,
            audio: base.audio,
            defaults: base.defaults,
        }
    }

    /// Embedded defaults overlaid with `user`.
    pub fn from_toml_str(user: &str) -> Result<Self, String> {
        let mut base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        let user: ConfigFile = toml::from_str(user).map_err(|e| e.to_string())?;
        merge(&mut base, user);
        Ok(Config {
            tuning: base.tuning,
            audio: base.audio,
            defaults: base.defaults,
        })
    }

    /// Reference frequency for A (clamped to 200..=1000 Hz).
    pub fn reference_hz(&self) -> f64 {
        self.tuning
            .reference_hz
            .filter(|hz| hz.is_finite())
            .unwrap_or(440.0)
            .clamp(200.0, 1000.0)
    }

    /// Gradual retune duration (clamped to 0..=60s).
    pub fn transition_duration(&self) -> Duration {
        Duration::from_millis(self.tuning.transition_ms.unwrap_or(2000).min(60_000))
    }

    /// Fade window in seconds (clamped to 1..=1000 ms).
    pub fn fade_secs(&self) -> f64 {
        self.audio.fade_ms.unwrap_or(50).clamp(1, 1000) as f64 / 1000.0
    }

    pub fn base_gain(&self) -> f32 {
        self.audio
            .base_gain
            .filter(|g| g.is_finite())
            .unwrap_or(0.2)
            .clamp(0.0, 1.0)
    }

    pub fn polyphony_threshold(&self) -> usize {
        self.audio.polyphony_threshold.unwrap_or(3).max(1)
    }

    pub fn sample_rate(&self) -> u32 {
        self.audio.sample_rate.unwrap_or(44_100).clamp(8_000, 192_000)
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            base_gain: self.base_gain(),
            polyphony_threshold: self.polyphony_threshold(),
            fade_secs: self.fade_secs(),
        }
    }

    pub fn toggle_mode(&self) -> ToggleMode {
        self.defaults
            .toggle_mode
            .as_deref()
            .and_then(parse_toggle_mode)
            .unwrap_or_default()
    }

    /// Notes sounding at startup. Unknown names are logged and skipped.
    pub fn default_activation(&self) -> ActivationSet {
        let Some(names) = &self.defaults.active_notes else {
            return default_activation();
        };
        let notes = names.iter().filter_map(|name| match name.parse::<NoteId>() {
            Ok(note) => Some(note),
            Err(e) => {
                log::warn!(target: "config", "{}", e);
                None
            }
        });
        ActivationSet::with_active(notes)
    }

    pub fn tuner_settings(&self) -> TunerSettings {
        TunerSettings {
            frequencies: FrequencyTable::new(self.reference_hz()),
            transition: self.transition_duration(),
            pool: self.pool_settings(),
            toggle_mode: self.toggle_mode(),
        }
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("beatfree").join("config.toml"))
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    merge_tuning(&mut base.tuning, user.tuning);
    merge_audio(&mut base.audio, user.audio);
    merge_defaults(&mut base.defaults, user.defaults);
}

fn merge_tuning(base: &mut TuningConfig, user: TuningConfig) {
    if user.reference_hz.is_some() {
        base.reference_hz = user.reference_hz;
    }
    if user.transition_ms.is_some() {
        base.transition_ms = user.transition_ms;
    }
}

fn merge_audio(base: &mut AudioConfig, user: AudioConfig) {
    if user.base_gain.is_some() {
        base.base_gain = user.base_gain;
    }
    if user.polyphony_threshold.is_some() {
        base.polyphony_threshold = user.polyphony_threshold;
    }
    if user.fade_ms.is_some() {
        base.fade_ms = user.fade_ms;
    }
    if user.sample_rate.is_some() {
        base.sample_rate = user.sample_rate;
    }
}

fn merge_defaults(base: &mut DefaultsConfig, user: DefaultsConfig) {
    if user.active_notes.is_some() {
        base.active_notes = user.active_notes;
    }
    if user.toggle_mode.is_some() {
        base.toggle_mode = user.toggle_mode;
    }
}

fn parse_toggle_mode(s: &str) -> Option<ToggleMode> {
    match s.to_lowercase().as_str() {
        "pair" | "both" => Some(ToggleMode::Pair),
        "single" => Some(ToggleMode::Single),
        _ => None,
    }
}
