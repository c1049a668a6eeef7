//! Permission Gate: camera/microphone and fullscreen must both be granted
//! before a session may start. Denials are recoverable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use proctor_core::error::{ProctorError, Result};
use proctor_core::{Capability, SessionStatus};

use crate::lock;
use crate::ports::{Fullscreen, MediaDevices, MediaStream};

/// Per-capability grant status shown next to the start button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PermissionStatus {
    pub camera: bool,
    pub microphone: bool,
    pub fullscreen: bool,
}

impl PermissionStatus {
    pub fn is_ready(&self) -> bool {
        self.camera && self.microphone && self.fullscreen
    }
}

/// Owns the media stream for the whole attempt. The stream is released
/// exactly once via [`PermissionGate::release_media`].
pub struct PermissionGate {
    media: Arc<dyn MediaDevices>,
    fullscreen: Arc<dyn Fullscreen>,
    stream: Mutex<Option<Arc<dyn MediaStream>>>,
    fullscreen_granted: Mutex<bool>,
    /// Set once a session starts; the monitors hold the current stream.
    locked: AtomicBool,
}

impl PermissionGate {
    pub fn new(media: Arc<dyn MediaDevices>, fullscreen: Arc<dyn Fullscreen>) -> Self {
        Self {
            media,
            fullscreen,
            stream: Mutex::new(None),
            fullscreen_granted: Mutex::new(false),
            locked: AtomicBool::new(false),
        }
    }

    fn locked_error() -> ProctorError {
        ProctorError::InvalidTransition {
            from: SessionStatus::Active,
            to: SessionStatus::NotStarted,
        }
    }

    /// Freeze the current stream. Later camera requests are rejected.
    pub fn lock_media(&self) {
        let _stream = lock(&self.stream);
        self.locked.store(true, Ordering::SeqCst);
    }

    /// Undo [`PermissionGate::lock_media`] after a start that did not happen.
    pub fn unlock_media(&self) {
        let _stream = lock(&self.stream);
        self.locked.store(false, Ordering::SeqCst);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    pub async fn request_camera_and_mic(&self) -> Result<Arc<dyn MediaStream>> {
        if self.is_locked() {
            return Err(Self::locked_error());
        }
        let stream = self.media.request_camera_and_mic().await?;
        if !stream.has_video() || !stream.has_audio() {
            stream.stop_tracks();
            let missing = if stream.has_video() { "microphone" } else { "camera" };
            return Err(ProctorError::PermissionDenied {
                capability: Capability::CameraAndMicrophone,
                reason: format!("{missing} track missing"),
            });
        }

        let previous = {
            let mut slot = lock(&self.stream);
            if self.is_locked() {
                drop(slot);
                stream.stop_tracks();
                return Err(Self::locked_error());
            }
            slot.replace(Arc::clone(&stream))
        };
        if let Some(previous) = previous {
            previous.stop_tracks();
        }
        tracing::info!(stream = stream.id(), "camera and microphone granted");
        Ok(stream)
    }

    pub async fn request_fullscreen(&self) -> Result<()> {
        match self.fullscreen.request().await {
            Ok(()) => {
                *lock(&self.fullscreen_granted) = true;
                tracing::info!("fullscreen granted");
                Ok(())
            }
            Err(err) => {
                *lock(&self.fullscreen_granted) = false;
                Err(err)
            }
        }
    }

    pub fn status(&self) -> PermissionStatus {
        let stream = lock(&self.stream);
        PermissionStatus {
            camera: stream.as_ref().is_some_and(|s| s.has_video()),
            microphone: stream.as_ref().is_some_and(|s| s.has_audio()),
            fullscreen: *lock(&self.fullscreen_granted),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status().is_ready()
    }

    /// First capability still missing, in request order.
    pub fn missing(&self) -> Option<Capability> {
        let status = self.status();
        if !(status.camera && status.microphone) {
            Some(Capability::CameraAndMicrophone)
        } else if !status.fullscreen {
            Some(Capability::Fullscreen)
        } else {
            None
        }
    }

    pub fn stream(&self) -> Option<Arc<dyn MediaStream>> {
        lock(&self.stream).clone()
    }

    /// Stop all tracks. Returns false when there was nothing to release.
    pub fn release_media(&self) -> bool {
        let taken = lock(&self.stream).take();
        match taken {
            Some(stream) => {
                stream.stop_tracks();
                tracing::info!(stream = stream.id(), "media released");
                true
            }
            None => false,
        }
    }

    pub async fn exit_fullscreen(&self) {
        let was_granted = std::mem::replace(&mut *lock(&self.fullscreen_granted), false);
        if was_granted || self.fullscreen.is_active() {
            self.fullscreen.exit().await;
        }
    }
}
