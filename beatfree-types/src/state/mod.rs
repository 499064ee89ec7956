//! Plain state handed across the core boundary: which notes sound and how
//! far each pitch class is detuned.

pub mod activation;
pub mod detune;

pub use activation::ActivationSet;
pub use detune::{DetuneMap, DETUNE_UI_RANGE};
