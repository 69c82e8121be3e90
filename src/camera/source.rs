//! Frame capture seam and a directory-backed implementation.
//!
//! [`FrameSource`] is what the monitor and the orchestrator call to get a
//! frame.  [`SnapshotDirSource`] reads the newest JPEG an external camera
//! process wrote into a directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors from a [`FrameSource`].
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Camera access has not been granted (yet).
    #[error("camera permission not granted")]
    PermissionDenied,

    /// The camera has not produced a frame.
    #[error("no frame available")]
    NoFrame,

    /// A frame was requested with its image payload but none came back.
    #[error("captured frame carried no image data")]
    NoImage,

    #[error("I/O error reading frame: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for CaptureError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied,
            std::io::ErrorKind::NotFound => CaptureError::NoFrame,
            _ => CaptureError::Io(e),
        }
    }
}

impl CaptureError {
    /// Permission problems are expected until the user grants access.
    pub fn is_permission(&self) -> bool {
        matches!(self, CaptureError::PermissionDenied)
    }
}

// ---------------------------------------------------------------------------
// Capture types
// ---------------------------------------------------------------------------

/// Encoded JPEG bytes.  Cheap to clone.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData(Arc<[u8]>);

impl ImageData {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ImageData({} bytes)", self.0.len())
    }
}

/// Parameters for one capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRequest {
    /// Encoder quality, 0.0 – 1.0.
    pub quality: f32,
    /// Whether the encoded image must be returned.  Stability samples only
    /// need the size.
    pub include_image: bool,
}

impl CaptureRequest {
    pub fn sample(quality: f32) -> Self {
        Self {
            quality,
            include_image: false,
        }
    }

    pub fn full(quality: f32) -> Self {
        Self {
            quality,
            include_image: true,
        }
    }
}

/// Result of a capture.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Size of the encoded frame in bytes.
    pub size_bytes: u64,
    /// Encoded image, present when requested.
    pub image: Option<ImageData>,
}

// ---------------------------------------------------------------------------
// FrameSource trait
// ---------------------------------------------------------------------------

/// Object-safe camera seam.
///
/// Capture is expected to complete quickly, so it takes no cancellation
/// signal; callers check their own token around it.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture(&self, request: CaptureRequest) -> Result<CapturedFrame, CaptureError>;
}

// ---------------------------------------------------------------------------
// SnapshotDirSource
// ---------------------------------------------------------------------------

/// Reads the most recently modified `.jpg` / `.jpeg` in a directory.
///
/// Samples only `stat` the file; full captures read it.  The quality knob is
/// up to whatever writes the snapshots, so it is ignored here.
#[derive(Debug, Clone)]
pub struct SnapshotDirSource {
    dir: PathBuf,
}

impl SnapshotDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn newest_frame(&self) -> Result<(PathBuf, u64), CaptureError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut newest: Option<(std::time::SystemTime, PathBuf, u64)> = None;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_jpeg(&path) {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified()?;
            if newest.as_ref().map_or(true, |(t, _, _)| modified > *t) {
                newest = Some((modified, path, meta.len()));
            }
        }

        newest
            .map(|(_, path, len)| (path, len))
            .ok_or(CaptureError::NoFrame)
    }
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
}

#[async_trait]
impl FrameSource for SnapshotDirSource {
    async fn capture(&self, request: CaptureRequest) -> Result<CapturedFrame, CaptureError> {
        let (path, size_bytes) = self.newest_frame().await?;

        if !request.include_image {
            return Ok(CapturedFrame {
                size_bytes,
                image: None,
            });
        }

        let bytes = tokio::fs::read(&path).await?;
        log::debug!(
            "camera: read {} ({} bytes, quality {:.2})",
            path.display(),
            bytes.len(),
            request.quality
        );
        Ok(CapturedFrame {
            size_bytes: bytes.len() as u64,
            image: Some(ImageData::new(bytes)),
        })
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

/// Scripted frame source: hands out queued sizes in order, then repeats the
/// last one.  An entry of `None` yields [`CaptureError::PermissionDenied`].
#[cfg(test)]
pub struct MockFrameSource {
    sizes: std::sync::Mutex<std::collections::VecDeque<Option<u64>>>,
    last: std::sync::Mutex<Option<u64>>,
    pub captures: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockFrameSource {
    pub fn new(sizes: impl IntoIterator<Item = Option<u64>>) -> Self {
        Self {
            sizes: std::sync::Mutex::new(sizes.into_iter().collect()),
            last: std::sync::Mutex::new(None),
            captures: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn steady(size: u64) -> Self {
        Self::new([Some(size)])
    }

    pub fn push(&self, size: Option<u64>) {
        self.sizes.lock().unwrap().push_back(size);
    }

    pub fn capture_count(&self) -> usize {
        self.captures.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl FrameSource for MockFrameSource {
    async fn capture(&self, request: CaptureRequest) -> Result<CapturedFrame, CaptureError> {
        self.captures
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let next = self.sizes.lock().unwrap().pop_front();
        let size = match next {
            Some(entry) => {
                *self.last.lock().unwrap() = entry;
                entry
            }
            None => *self.last.lock().unwrap(),
        };
        let size = size.ok_or(CaptureError::PermissionDenied)?;
        Ok(CapturedFrame {
            size_bytes: size,
            image: request
                .include_image
                .then(|| ImageData::new(vec![0xFF, 0xD8, 0xFF, 0xD9])),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
