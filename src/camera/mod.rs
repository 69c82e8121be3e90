//! Camera seam.
//!
//! The monitor takes cheap size-only samples through [`FrameSource`]; the
//! orchestrator takes one full capture per session.

pub mod source;

pub use source::{
    CaptureError, CaptureRequest, CapturedFrame, FrameSource, ImageData, SnapshotDirSource,
};

#[cfg(test)]
pub use source::MockFrameSource;
