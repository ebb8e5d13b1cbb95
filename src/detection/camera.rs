//! Camera frame sources.
//!
//! The detector never looks at pixels, so frames are opaque handles carrying
//! only a sequence number, a capture time and the resolution. Real capture
//! happens in the browser; [`SyntheticCamera`] stands in for it here.

use crate::clock::SharedClock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Errors surfaced when opening a capture device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    #[error("Camera access denied. Please allow camera permissions and try again.")]
    PermissionDenied,
    #[error("No camera found. Please ensure your device has a camera.")]
    DeviceNotFound,
    #[error("Camera is already in use by another application.")]
    DeviceBusy,
    #[error("Camera error: {0}")]
    Other(String),
}

impl CameraError {
    /// Map a browser media error name (`DOMException.name`) to an error kind.
    pub fn from_media_error(name: &str, message: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" => CameraError::PermissionDenied,
            "NotFoundError" | "DevicesNotFoundError" => CameraError::DeviceNotFound,
            "NotReadableError" | "TrackStartError" => CameraError::DeviceBusy,
            _ => CameraError::Other(message.to_string()),
        }
    }

    /// Whether the user refused access (as opposed to a hardware problem).
    pub fn is_permission_error(&self) -> bool {
        matches!(self, CameraError::PermissionDenied)
    }
}

/// Capture settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// An opaque captured frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// A default-resolution frame.
    pub fn blank(sequence: u64, captured_at: DateTime<Utc>) -> Self {
        let config = CameraConfig::default();
        Self {
            sequence,
            captured_at,
            width: config.width,
            height: config.height,
        }
    }
}

/// Something frames can be pulled from.
pub trait FrameSource: Send {
    fn start(&mut self) -> Result<(), CameraError>;
    fn stop(&mut self);
    fn is_active(&self) -> bool;
    /// Grab the current frame, or `None` while stopped.
    fn capture_frame(&mut self) -> Option<Frame>;
}

/// A camera that produces numbered blank frames.
pub struct SyntheticCamera {
    config: CameraConfig,
    clock: SharedClock,
    active: bool,
    next_sequence: u64,
}

impl SyntheticCamera {
    pub fn new(config: CameraConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            active: false,
            next_sequence: 0,
        }
    }

    /// Number of frames captured so far.
    pub fn frames_captured(&self) -> u64 {
        self.next_sequence
    }
}

impl FrameSource for SyntheticCamera {
    fn start(&mut self) -> Result<(), CameraError> {
        if self.active {
            return Err(CameraError::DeviceBusy);
        }
        self.active = true;
        tracing::debug!(
            width = self.config.width,
            height = self.config.height,
            "synthetic camera started"
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn capture_frame(&mut self) -> Option<Frame> {
        if !self.active {
            return None;
        }
        let frame = Frame {
            sequence: self.next_sequence,
            captured_at: self.clock.now(),
            width: self.config.width,
            height: self.config.height,
        };
        self.next_sequence += 1;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::system_clock;

    #[test]
    fn test_media_error_mapping() {
        assert_eq!(
            CameraError::from_media_error("NotAllowedError", ""),
            CameraError::PermissionDenied
        );
        assert_eq!(
            CameraError::from_media_error("DevicesNotFoundError", ""),
            CameraError::DeviceNotFound
        );
        assert_eq!(
            CameraError::from_media_error("TrackStartError", ""),
            CameraError::DeviceBusy
        );
        let other = CameraError::from_media_error("OverconstrainedError", "bad constraints");
        assert_eq!(other, CameraError::Other("bad constraints".to_string()));
        assert_eq!(other.to_string(), "Camera error: bad constraints");
        assert!(CameraError::PermissionDenied.is_permission_error());
    }

    #[test]
    fn test_synthetic_camera_lifecycle() {
        let mut camera = SyntheticCamera::new(CameraConfig::default(), system_clock());
        assert!(camera.capture_frame().is_none());

        camera.start().unwrap();
        assert_eq!(camera.start(), Err(CameraError::DeviceBusy));

        let first = camera.capture_frame().unwrap();
        let second = camera.capture_frame().unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert_eq!((first.width, first.height), (1280, 720));

        camera.stop();
        assert!(!camera.is_active());
        assert!(camera.capture_frame().is_none());
        assert_eq!(camera.frames_captured(), 2);
    }
}
