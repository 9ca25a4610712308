// SPDX-License-Identifier: GPL-3.0-only

//! Camera access authorization
//!
//! Platforms with a permission prompt report `NotDetermined` until the user
//! answered it. On Linux access is decided by the device node's permissions,
//! so [`DeviceNodeAuthorization`] never reports `NotDetermined`.

use super::types::CameraDevice;
use std::ffi::CString;
use tracing::{debug, warn};

/// Authorization state for camera access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    /// The user has not been asked yet
    NotDetermined,
    /// Access granted
    Granted,
    /// Access refused by the user
    Denied,
    /// Access refused by policy
    Restricted,
}

impl AuthorizationStatus {
    /// Whether setup may continue (possibly optimistically)
    pub fn allows_setup(&self) -> bool {
        matches!(self, Self::NotDetermined | Self::Granted)
    }
}

/// Source of camera authorization decisions
pub trait AuthorizationProvider: Send + Sync {
    /// Current status for `device`
    fn status(&self, device: &CameraDevice) -> AuthorizationStatus;

    /// Ask for access and block until answered
    ///
    /// Only called when [`status`](Self::status) returned `NotDetermined`,
    /// always from a helper thread.
    fn request_access(&self, device: &CameraDevice) -> bool;
}

/// Authorization from read/write access to the device node
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceNodeAuthorization;

impl AuthorizationProvider for DeviceNodeAuthorization {
    fn status(&self, device: &CameraDevice) -> AuthorizationStatus {
        let Ok(path) = CString::new(device.path.as_str()) else {
            warn!(path = %device.path, "Device path contains NUL byte");
            return AuthorizationStatus::Restricted;
        };

        let result = unsafe { libc::access(path.as_ptr(), libc::R_OK | libc::W_OK) };
        if result == 0 {
            return AuthorizationStatus::Granted;
        }

        let err = std::io::Error::last_os_error();
        debug!(path = %device.path, error = %err, "Camera device not accessible");
        match err.raw_os_error() {
            Some(libc::EACCES) => AuthorizationStatus::Denied,
            _ => AuthorizationStatus::Restricted,
        }
    }

    fn request_access(&self, device: &CameraDevice) -> bool {
        self.status(device) == AuthorizationStatus::Granted
    }
}

/// Provider for sources that need no permission (image files, tests)
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

impl AuthorizationProvider for AlwaysGranted {
    fn status(&self, _device: &CameraDevice) -> AuthorizationStatus {
        AuthorizationStatus::Granted
    }

    fn request_access(&self, _device: &CameraDevice) -> bool {
        true
    }
}
