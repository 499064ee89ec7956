pub mod backend;
pub mod voice_pool;

pub use backend::{AudioBackend, BackendError, BackendResult, NullBackend, VoiceId, VoiceParam};
pub use voice_pool::{polyphony_gain, PoolSettings, Retune, Voice, VoicePool, VoiceState};
