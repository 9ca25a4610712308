// SPDX-License-Identifier: GPL-3.0-only

//! Still images as a camera
//!
//! Replays a list of image files as a finite frame stream. Used by the
//! `scan-image` command and anywhere a deterministic source is wanted.

use super::types::{
    BackendError, BackendResult, CameraBackendType, CameraDevice, CameraFrame, CameraPosition,
    PixelFormat,
};
use super::{CameraBackend, FrameStream};
use crate::constants::file_formats;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Identifier of the single device this backend exposes
pub const IMAGE_DEVICE_PATH: &str = "image-files";

/// Backend replaying still images
#[derive(Debug, Clone)]
pub struct ImageFileBackend {
    paths: Vec<PathBuf>,
}

impl ImageFileBackend {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl CameraBackend for ImageFileBackend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        if self.paths.is_empty() {
            return Vec::new();
        }
        // The files stand in for the rear camera a scanner would use
        vec![CameraDevice {
            name: format!("{} image file(s)", self.paths.len()),
            path: IMAGE_DEVICE_PATH.to_string(),
            position: CameraPosition::Back,
            device_info: None,
        }]
    }

    fn open_stream(&self, device: &CameraDevice) -> BackendResult<Box<dyn FrameStream>> {
        if device.path != IMAGE_DEVICE_PATH {
            return Err(BackendError::DeviceNotFound(device.path.clone()));
        }

        for path in &self.paths {
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            if !file_formats::is_image_extension(extension) {
                return Err(BackendError::FormatNotSupported(format!(
                    "Unsupported file format: {}",
                    path.display()
                )));
            }
        }

        info!(count = self.paths.len(), "Opened image file stream");
        Ok(Box::new(ImageFileStream {
            paths: self.paths.clone(),
            next: 0,
        }))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::ImageFiles
    }
}

struct ImageFileStream {
    paths: Vec<PathBuf>,
    next: usize,
}

impl FrameStream for ImageFileStream {
    fn next_frame(&mut self) -> BackendResult<Option<CameraFrame>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        let mut frame = load_image_as_frame(path)?;
        frame.sequence = Some(self.next as u32 - 1);
        Ok(Some(frame))
    }

    fn is_live(&self) -> bool {
        false
    }
}

/// Load an image file as a single RGBA frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<CameraFrame> {
    let img = image::open(path).map_err(|e| {
        BackendError::Other(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    debug!(path = %path.display(), width, height, "Loaded image frame");

    Ok(CameraFrame::packed(
        width,
        height,
        PixelFormat::Rgba,
        rgba.into_raw(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_files_no_camera() {
        assert!(ImageFileBackend::new(Vec::new()).enumerate_cameras().is_empty());
    }

    #[test]
    fn test_stream_replays_files_then_ends() {
        let dir = std::env::temp_dir().join(format!("scanner-files-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("frame.png");
        image::GrayImage::from_pixel(8, 6, image::Luma([200])).save(&path).unwrap();

        let backend = ImageFileBackend::new(vec![path.clone(), path]);
        let device = backend.enumerate_cameras().remove(0);
        assert_eq!(device.position, CameraPosition::Back);

        let mut stream = backend.open_stream(&device).unwrap();
        let first = stream.next_frame().unwrap().unwrap();
        assert_eq!((first.width, first.height), (8, 6));
        assert_eq!(first.format, PixelFormat::Rgba);
        assert_eq!(first.sequence, Some(0));
        assert!(stream.next_frame().unwrap().is_some());
        assert!(stream.next_frame().unwrap().is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let backend = ImageFileBackend::new(vec![PathBuf::from("clip.mp4")]);
        let device = backend.enumerate_cameras().remove(0);
        assert!(matches!(
            backend.open_stream(&device),
            Err(BackendError::FormatNotSupported(_))
        ));
    }
}
