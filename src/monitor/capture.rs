//! Capture stream ownership
//!
//! A capture stream is a live audio/video handle obtained from the host. The
//! monitoring view owns at most one for its whole lifetime through a
//! [`CaptureHandle`], whose release is idempotent so every teardown path
//! (unmount, leave, unload) can call it unconditionally.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use crate::config::CaptureConstraints;

/// Media kind carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Why a capture request failed.
///
/// The variants are kept apart for logging; the view shows the same message
/// for all of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("Permission to capture was denied")]
    PermissionDenied,

    #[error("No capture device is available")]
    DeviceUnavailable,

    #[error("Capture failed: {0}")]
    Other(String),
}

/// A live capture stream
pub trait CaptureStream {
    /// Stop every track. Stopping an already stopped stream is a no-op.
    fn stop_all_tracks(&mut self);

    /// Number of tracks that are still live
    fn live_tracks(&self) -> usize;
}

/// Something that can be asked for a capture stream
pub trait CaptureDevice {
    fn request(
        &mut self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// Exclusive owner of at most one capture stream
#[derive(Default)]
pub struct CaptureHandle {
    stream: Option<Box<dyn CaptureStream>>,
    acquired: bool,
}

impl CaptureHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a stream.
    ///
    /// A handle accepts one stream per lifetime. A second stream is stopped
    /// and dropped, and `false` is returned.
    pub fn acquire(&mut self, mut stream: Box<dyn CaptureStream>) -> bool {
        if self.acquired {
            debug!("capture handle already used; stopping extra stream");
            stream.stop_all_tracks();
            return false;
        }
        self.acquired = true;
        self.stream = Some(stream);
        true
    }

    /// Stop and drop the owned stream. Returns whether a stream was released.
    pub fn release(&mut self) -> bool {
        match self.stream.take() {
            Some(mut stream) => {
                stream.stop_all_tracks();
                debug!("capture stream released");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|stream| stream.live_tracks() > 0)
    }

    pub fn was_acquired(&self) -> bool {
        self.acquired
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("active", &self.is_active())
            .field("acquired", &self.acquired)
            .finish()
    }
}

/// A track whose liveness is shared with whoever issued it
#[derive(Debug, Clone)]
pub struct SharedTrack {
    kind: TrackKind,
    live: Rc<Cell<bool>>,
}

impl SharedTrack {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            kind,
            live: Rc::new(Cell::new(true)),
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_live(&self) -> bool {
        self.live.get()
    }

    pub fn stop(&self) {
        self.live.set(false);
    }
}

/// Stream made of [`SharedTrack`]s.
///
/// Used for hosts that manage the real device themselves and only need to
/// observe whether the view has let go of it.
#[derive(Debug, Clone, Default)]
pub struct SharedStream {
    tracks: Vec<SharedTrack>,
}

impl SharedStream {
    pub fn for_constraints(constraints: &CaptureConstraints) -> Self {
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(SharedTrack::new(TrackKind::Audio));
        }
        if constraints.video {
            tracks.push(SharedTrack::new(TrackKind::Video));
        }
        Self { tracks }
    }

    pub fn tracks(&self) -> &[SharedTrack] {
        &self.tracks
    }
}

impl CaptureStream for SharedStream {
    fn stop_all_tracks(&mut self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    fn live_tracks(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count()
    }
}

/// Capture device with a scripted outcome
#[derive(Debug, Clone)]
pub struct ScriptedCamera {
    outcome: Result<(), CaptureError>,
    issued: Vec<SharedStream>,
}

impl ScriptedCamera {
    /// A device that grants every request
    pub fn granting() -> Self {
        Self {
            outcome: Ok(()),
            issued: Vec::new(),
        }
    }

    /// A device that fails every request with `error`
    pub fn failing(error: CaptureError) -> Self {
        Self {
            outcome: Err(error),
            issued: Vec::new(),
        }
    }

    /// Streams handed out so far
    pub fn issued(&self) -> usize {
        self.issued.len()
    }

    /// Live tracks across every issued stream
    pub fn live_tracks(&self) -> usize {
        self.issued.iter().map(|s| s.live_tracks()).sum()
    }
}

impl CaptureDevice for ScriptedCamera {
    fn request(
        &mut self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        self.outcome.clone()?;
        let stream = SharedStream::for_constraints(constraints);
        self.issued.push(stream.clone());
        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_is_idempotent() {
        let mut camera = ScriptedCamera::granting();
        let stream = camera.request(&CaptureConstraints::default()).unwrap();

        let mut handle = CaptureHandle::new();
        assert!(handle.acquire(stream));
        assert!(handle.is_active());
        assert_eq!(camera.live_tracks(), 2);

        assert!(handle.release());
        assert!(!handle.release());
        assert!(!handle.is_active());
        assert_eq!(camera.live_tracks(), 0);
    }

    #[test]
    fn test_second_stream_is_rejected_and_stopped() {
        let mut camera = ScriptedCamera::granting();
        let constraints = CaptureConstraints::default();

        let mut handle = CaptureHandle::new();
        assert!(handle.acquire(camera.request(&constraints).unwrap()));
        handle.release();

        assert!(!handle.acquire(camera.request(&constraints).unwrap()));
        assert_eq!(camera.issued(), 2);
        assert_eq!(camera.live_tracks(), 0);
    }

    #[test]
    fn test_drop_releases_stream() {
        let mut camera = ScriptedCamera::granting();
        {
            let mut handle = CaptureHandle::new();
            handle.acquire(camera.request(&CaptureConstraints::default()).unwrap());
        }
        assert_eq!(camera.live_tracks(), 0);
    }

    #[test]
    fn test_constraints_select_tracks() {
        let stream = SharedStream::for_constraints(&CaptureConstraints {
            audio: false,
            video: true,
        });
        assert_eq!(stream.tracks().len(), 1);
        assert_eq!(stream.tracks()[0].kind(), TrackKind::Video);
    }

    #[test]
    fn test_failing_device() {
        let mut camera = ScriptedCamera::failing(CaptureError::PermissionDenied);
        let result = camera.request(&CaptureConstraints::default());

        assert!(matches!(result, Err(CaptureError::PermissionDenied)));
        assert_eq!(camera.issued(), 0);
    }
}
