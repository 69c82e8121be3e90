//! Text-to-speech seam.
//!
//! [`SpeechSynthesizer`] turns the coach's reply into encoded audio that
//! the [`playback`](crate::playback) module plays back.

pub mod synth;

pub use synth::{OpenAiSpeech, SpeechError, SpeechSynthesizer};
