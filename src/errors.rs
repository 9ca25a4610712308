// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner
//!
//! Backend errors live next to the backend types in
//! [`crate::backends::camera::types`]; this module holds everything else and
//! the top-level [`AppError`] they all convert into.

use crate::backends::camera::types::BackendError;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera backend errors
    Backend(BackendError),
    /// Torch control errors
    Torch(TorchError),
    /// Detector invocation errors
    Detector(DetectorError),
    /// Frame conversion errors
    Frame(FrameError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
}

/// Torch control errors
///
/// None of these are fatal: the scanner logs them and keeps the torch state
/// it had before the failed toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorchError {
    /// The active device has no controllable torch
    Unavailable,
    /// Exclusive configuration access could not be acquired
    Busy,
    /// Setting the torch mode failed
    ConfigurationFailed(String),
}

/// Detector errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    /// The request carried an image the detector cannot process
    InvalidImage(String),
    /// The detector itself failed
    Failed(String),
}

/// Errors while extracting a luma buffer from a camera frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer is smaller than its dimensions require
    Truncated { expected: usize, actual: usize },
    /// Compressed frame failed to decode
    DecodeFailed(String),
    /// Zero width or height
    Empty,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Backend(e) => write!(f, "Camera error: {}", e),
            AppError::Torch(e) => write!(f, "Torch error: {}", e),
            AppError::Detector(e) => write!(f, "Detector error: {}", e),
            AppError::Frame(e) => write!(f, "Frame error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl fmt::Display for TorchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TorchError::Unavailable => write!(f, "Torch is not available"),
            TorchError::Busy => write!(f, "Torch device is busy"),
            TorchError::ConfigurationFailed(msg) => write!(f, "Torch could not be used: {}", msg),
        }
    }
}

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorError::InvalidImage(msg) => write!(f, "Invalid image: {}", msg),
            DetectorError::Failed(msg) => write!(f, "Detection failed: {}", msg),
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Truncated { expected, actual } => write!(
                f,
                "Frame buffer truncated: expected {} bytes, got {}",
                expected, actual
            ),
            FrameError::DecodeFailed(msg) => write!(f, "Frame decode failed: {}", msg),
            FrameError::Empty => write!(f, "Frame has no pixels"),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for TorchError {}
impl std::error::Error for DetectorError {}
impl std::error::Error for FrameError {}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Backend(err)
    }
}

impl From<TorchError> for AppError {
    fn from(err: TorchError) -> Self {
        AppError::Torch(err)
    }
}

impl From<DetectorError> for AppError {
    fn from(err: DetectorError) -> Self {
        AppError::Detector(err)
    }
}

impl From<FrameError> for AppError {
    fn from(err: FrameError) -> Self {
        AppError::Frame(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<std::io::Error> for TorchError {
    fn from(err: std::io::Error) -> Self {
        TorchError::ConfigurationFailed(err.to_string())
    }
}
