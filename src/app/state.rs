// SPDX-License-Identifier: GPL-3.0-only

//! Scanner state

use super::main_context::MainContextHandle;
use super::observer::ScanObserver;
use super::overlay::{OverlayPath, OverlayRenderer};
use crate::torch::TorchControl;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Lifecycle of a scanner controller
///
/// `Stopped` is terminal: a stopped scanner is never restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Idle,
    /// Resolving device, authorization and starting the session
    SettingUp,
    Running,
    Stopped,
}

impl ControllerState {
    pub fn is_stopped(&self) -> bool {
        *self == ControllerState::Stopped
    }
}

/// Whether a capture session is delivering frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    Running,
    #[default]
    Stopped,
}

/// Why a scan ended without a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFailure {
    /// No suitable capture device
    NoCamera,
    /// Camera access refused by the user or the system
    PermissionDenied,
    /// The device could not be opened or kept failing
    DeviceUnavailable(String),
    /// A finite source ran out of frames
    StreamEnded,
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanFailure::NoCamera => write!(f, "No camera available"),
            ScanFailure::PermissionDenied => write!(f, "Camera access denied"),
            ScanFailure::DeviceUnavailable(msg) => write!(f, "Camera unavailable: {}", msg),
            ScanFailure::StreamEnded => write!(f, "No more frames"),
        }
    }
}

/// Observer notification as a value, for channel-based hosts
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Detected(String),
    Failed(ScanFailure),
    OverlayUpdated(OverlayPath),
    Dismissed,
}

/// State shared between the controller, the dispatcher and the reporter
pub(crate) struct ScanContext {
    pub(crate) main: MainContextHandle,
    pub(crate) observer: Arc<dyn ScanObserver>,
    pub(crate) overlay: Mutex<OverlayRenderer>,
    pub(crate) torch: Arc<TorchControl>,
    state: Mutex<ControllerState>,
}

impl ScanContext {
    pub(crate) fn new(
        main: MainContextHandle,
        observer: Arc<dyn ScanObserver>,
        overlay: OverlayRenderer,
        torch: Arc<TorchControl>,
    ) -> Self {
        Self {
            main,
            observer,
            overlay: Mutex::new(overlay),
            torch,
            state: Mutex::new(ControllerState::Idle),
        }
    }

    pub(crate) fn state(&self) -> ControllerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next`; nothing leaves `Stopped`
    pub(crate) fn set_state(&self, next: ControllerState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.is_stopped() && !next.is_stopped() {
            debug!(?next, "Ignoring transition out of Stopped");
            return false;
        }
        if *state != next {
            info!(from = ?*state, to = ?next, "Scanner state changed");
            *state = next;
        }
        true
    }
}
