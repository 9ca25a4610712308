// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │   CaptureSession    │  ← start/stop, capture thread
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraBackend Trait│  ← enumeration + opening frame streams
//! └──────────┬──────────┘
//!            │
//!       ┌────┴──────┐
//!       ▼           ▼
//!   ┌──────┐  ┌───────────┐
//!   │ V4L2 │  │Image files│
//!   └──────┘  └───────────┘
//! ```

pub mod authorization;
pub mod file_source;
pub mod format_converters;
pub mod frame_loop;
pub mod types;
pub mod v4l2;

pub use authorization::{AlwaysGranted, AuthorizationProvider, AuthorizationStatus};
pub use types::*;

use crate::config::Config;
use tracing::{debug, info};

/// A camera backend
///
/// Backends are shared between the controller thread (enumeration) and the
/// capture thread (streaming), so they must be `Send + Sync`.
pub trait CameraBackend: Send + Sync {
    /// Enumerate available cameras on this backend
    fn enumerate_cameras(&self) -> Vec<CameraDevice>;

    /// Open a frame stream for `device`
    ///
    /// Called on the capture thread; the returned stream never leaves it.
    fn open_stream(&self, device: &CameraDevice) -> BackendResult<Box<dyn FrameStream>>;

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;
}

/// A stream of frames from an opened device
pub trait FrameStream {
    /// Block until the next frame is available
    ///
    /// Returns `Ok(None)` when a finite source is exhausted.
    fn next_frame(&mut self) -> BackendResult<Option<CameraFrame>>;

    /// Live sources drop frames under load; recorded ones wait for a worker
    fn is_live(&self) -> bool {
        true
    }
}

/// Build the backend selected in the configuration
pub fn get_backend(config: &Config) -> Box<dyn CameraBackend> {
    match config.backend {
        CameraBackendType::V4l2 => Box::new(v4l2::V4l2Backend::new(config)),
        CameraBackendType::ImageFiles => Box::new(file_source::ImageFileBackend::new(
            config.image_files.clone(),
        )),
    }
}

/// Pick the camera to scan with
///
/// An explicit device path wins. Otherwise the preferred position is used,
/// falling back from `Back` to `External` since desktop webcams report no
/// facing. Front cameras are only chosen when asked for.
pub fn select_device(
    cameras: &[CameraDevice],
    device_path: Option<&str>,
    preferred: CameraPosition,
) -> Option<CameraDevice> {
    if let Some(path) = device_path {
        let found = cameras.iter().find(|c| c.path == path).cloned();
        debug!(path, found = found.is_some(), "Looking up configured camera");
        return found;
    }

    let by_position = |position: CameraPosition| cameras.iter().find(|c| c.position == position);

    let selected = match preferred {
        CameraPosition::Back => by_position(CameraPosition::Back)
            .or_else(|| by_position(CameraPosition::External)),
        CameraPosition::Front => by_position(CameraPosition::Front),
        CameraPosition::External => by_position(CameraPosition::External),
    };

    if let Some(camera) = selected {
        info!(name = %camera.name, path = %camera.path, position = %camera.position, "Selected camera");
    }
    selected.cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(path: &str, position: CameraPosition) -> CameraDevice {
        CameraDevice {
            name: path.to_string(),
            path: path.to_string(),
            position,
            device_info: None,
        }
    }

    #[test]
    fn test_select_prefers_back_camera() {
        let cameras = vec![
            camera("/dev/video0", CameraPosition::Front),
            camera("/dev/video2", CameraPosition::External),
            camera("/dev/video4", CameraPosition::Back),
        ];
        let selected = select_device(&cameras, None, CameraPosition::Back).unwrap();
        assert_eq!(selected.path, "/dev/video4");
    }

    #[test]
    fn test_select_falls_back_to_external() {
        let cameras = vec![
            camera("/dev/video0", CameraPosition::Front),
            camera("/dev/video2", CameraPosition::External),
        ];
        let selected = select_device(&cameras, None, CameraPosition::Back).unwrap();
        assert_eq!(selected.path, "/dev/video2");
    }

    #[test]
    fn test_select_never_picks_front_for_back() {
        let cameras = vec![camera("/dev/video0", CameraPosition::Front)];
        assert!(select_device(&cameras, None, CameraPosition::Back).is_none());
    }

    #[test]
    fn test_select_explicit_path() {
        let cameras = vec![
            camera("/dev/video0", CameraPosition::Front),
            camera("/dev/video4", CameraPosition::Back),
        ];
        let selected = select_device(&cameras, Some("/dev/video0"), CameraPosition::Back).unwrap();
        assert_eq!(selected.position, CameraPosition::Front);
        assert!(select_device(&cameras, Some("/dev/video9"), CameraPosition::Back).is_none());
    }
}
