// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CameraBackendType {
    /// Video4Linux2 capture devices (`/dev/video*`)
    #[default]
    V4l2,
    /// Still images replayed as a frame stream
    ImageFiles,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::V4l2 => write!(f, "V4L2"),
            CameraBackendType::ImageFiles => write!(f, "image files"),
        }
    }
}

/// Device information from V4L2 capability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Name of the device (V4L2 card)
    pub card: String,
    /// Driver name (V4L2 driver)
    pub driver: String,
    /// Bus the device is attached to
    pub bus: String,
}

/// Which way a camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CameraPosition {
    /// Faces away from the user; preferred for scanning
    #[default]
    Back,
    /// Faces the user
    Front,
    /// Facing unknown (USB webcams, virtual sources)
    External,
}

impl std::fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraPosition::Back => write!(f, "back"),
            CameraPosition::Front => write!(f, "front"),
            CameraPosition::External => write!(f, "external"),
        }
    }
}

impl CameraPosition {
    /// Guess a position from a device label.
    ///
    /// V4L2 exposes no facing information, but phone sensors are usually
    /// labelled ("rear camera", "user-facing", ...).
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("back") || label.contains("rear") || label.contains("world") {
            CameraPosition::Back
        } else if label.contains("front") || label.contains("user") || label.contains("selfie")
        {
            CameraPosition::Front
        } else {
            CameraPosition::External
        }
    }
}

/// Sensor rotation in degrees (clockwise)
///
/// Phone sensors are commonly mounted at 90° or 270° relative to the
/// display, so detector coordinates must be rotated before they are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensorRotation {
    #[default]
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => SensorRotation::Rotate90,
            180 => SensorRotation::Rotate180,
            270 => SensorRotation::Rotate270,
            _ => SensorRotation::None,
        }
    }

    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }

    /// Map a top-left-origin normalized sensor point into the upright image.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        match self {
            SensorRotation::None => (x, y),
            SensorRotation::Rotate90 => (1.0 - y, x),
            SensorRotation::Rotate180 => (1.0 - x, 1.0 - y),
            SensorRotation::Rotate270 => (y, 1.0 - x),
        }
    }
}

/// Pinhole intrinsics of the camera that produced a frame, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    /// Device node (`/dev/video0`) or source identifier
    pub path: String,
    pub position: CameraPosition,
    pub device_info: Option<DeviceInfo>,
}

/// Pixel format for camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    Rgba,
    /// BGRA - 32-bit with alpha (B G R A byte order)
    Bgra,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    Rgb24,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    Yuyv,
    /// NV12 - Semi-planar 4:2:0 (Y plane + interleaved UV plane)
    Nv12,
    /// Motion JPEG, one compressed image per frame
    Mjpeg,
}

impl PixelFormat {
    /// Parse a V4L2 FourCC
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB4" | b"AB24" | b"XB24" => Some(Self::Rgba),
            b"BGR4" | b"AR24" | b"XR24" => Some(Self::Bgra),
            b"RGB3" => Some(Self::Rgb24),
            b"GREY" | b"Y800" => Some(Self::Gray8),
            b"YUYV" | b"YUY2" => Some(Self::Yuyv),
            b"NV12" => Some(Self::Nv12),
            b"MJPG" | b"JPEG" => Some(Self::Mjpeg),
            _ => None,
        }
    }

    /// Bytes per pixel of the first plane (0 for compressed formats)
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::Rgba | Self::Bgra => 4,
            Self::Rgb24 => 3,
            Self::Yuyv => 2,
            Self::Gray8 | Self::Nv12 => 1,
            Self::Mjpeg => 0,
        }
    }
}

/// A single frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride of the first plane (bytes per row, may include padding)
    pub stride: u32,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
    /// Driver sequence number, if the backend reports one
    pub sequence: Option<u32>,
    pub rotation: SensorRotation,
    pub intrinsics: Option<CameraIntrinsics>,
}

impl CameraFrame {
    /// Frame with tightly packed rows and no metadata
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format,
            stride: width * format.bytes_per_pixel(),
            captured_at: Instant::now(),
            sequence: None,
            rotation: SensorRotation::None,
            intrinsics: None,
        }
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to initialize backend
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Access to the device was refused
    PermissionDenied(String),
    /// Format not supported
    FormatNotSupported(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => BackendError::PermissionDenied(err.to_string()),
            std::io::ErrorKind::NotFound => BackendError::DeviceNotFound(err.to_string()),
            _ => BackendError::IoError(err.to_string()),
        }
    }
}
