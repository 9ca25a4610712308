// SPDX-License-Identifier: GPL-3.0-only

//! Host notifications
//!
//! All observer methods are called on the scanner's main context thread,
//! one at a time.

use super::overlay::OverlayPath;
use super::state::{ScanEvent, ScanFailure};
use tokio::sync::mpsc;
use tracing::trace;

/// Receiver of scan results
pub trait ScanObserver: Send + Sync {
    /// A payload was decoded; called at most once per scanner
    fn detected_string(&self, payload: &str);

    /// The scan ended without a payload
    fn scan_failed(&self, _failure: &ScanFailure) {}

    /// The outline of the latest frame's observations changed
    fn overlay_updated(&self, _path: &OverlayPath) {}

    /// The host should dismiss the scanner view
    fn dismiss(&self) {}
}

/// Observer forwarding every notification as a [`ScanEvent`]
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<ScanEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, event: ScanEvent) {
        if self.sender.send(event).is_err() {
            trace!("Scan event receiver dropped");
        }
    }
}

impl ScanObserver for ChannelObserver {
    fn detected_string(&self, payload: &str) {
        self.send(ScanEvent::Detected(payload.to_string()));
    }

    fn scan_failed(&self, failure: &ScanFailure) {
        self.send(ScanEvent::Failed(failure.clone()));
    }

    fn overlay_updated(&self, path: &OverlayPath) {
        self.send(ScanEvent::OverlayUpdated(path.clone()));
    }

    fn dismiss(&self) {
        self.send(ScanEvent::Dismissed);
    }
}
