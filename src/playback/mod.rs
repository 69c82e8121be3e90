//! Audio playback.
//!
//! * [`PlaybackController`]: owns at most one playing clip; `play` returns
//!   a completion that resolves exactly once, `stop` is idempotent.
//! * [`AudioSink`] / [`AudioResource`]: output seam.
//! * [`CommandSink`]: plays clips through an external player process.

pub mod controller;
pub mod sink;

pub use controller::{PlaybackCompletion, PlaybackController, PlaybackOutcome};
pub use sink::{AudioResource, AudioSink, CommandSink, PlaybackError, PlayingAudio, SinkEvent};

#[cfg(test)]
pub use sink::{MockSink, MockSinkMode};
