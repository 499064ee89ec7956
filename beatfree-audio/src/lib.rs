pub mod device;
pub mod engine;
pub mod offline;
pub mod param;
pub mod synth;

pub use device::{AudioOutput, DeviceBackend};
pub use engine::{AudioBackend, NullBackend, PoolSettings, Retune, VoicePool};
pub use offline::{write_wav, OfflineBackend};
pub use param::{AudioParam, ParamEvent};
