// SPDX-License-Identifier: GPL-3.0-only

//! One-shot result reporting
//!
//! The first non-empty payload wins. Frames are processed concurrently, so
//! several workers may decode a payload at nearly the same time; an atomic
//! gate lets exactly one of them through. The winner's follow-up (notify,
//! stop the session, stop the controller, torch off, dismiss) runs as a
//! single task on the main context.

use super::capture_session::CaptureSession;
use super::state::{ControllerState, ScanContext, ScanFailure};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::{debug, info, warn};

pub struct ResultReporter {
    finished: AtomicBool,
    context: Arc<ScanContext>,
    session: Weak<Mutex<CaptureSession>>,
}

impl ResultReporter {
    pub(crate) fn new(context: Arc<ScanContext>, session: Weak<Mutex<CaptureSession>>) -> Self {
        Self {
            finished: AtomicBool::new(false),
            context,
            session,
        }
    }

    /// Whether a result (or teardown) has already closed the gate
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Close the gate without reporting anything
    pub fn close(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    fn claim(&self) -> bool {
        self.finished
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Offer a decoded payload; returns true if it was the first
    pub fn report(&self, payload: &str) -> bool {
        if payload.is_empty() {
            debug!("Ignoring empty payload");
            return false;
        }
        if !self.claim() {
            debug!("Result already reported, ignoring payload");
            return false;
        }

        info!(len = payload.len(), "Barcode decoded");
        debug!(payload, "Decoded payload");

        let payload = payload.to_string();
        let context = Arc::clone(&self.context);
        let session = self.session.clone();
        self.context.main.post(move || {
            context.observer.detected_string(&payload);
            stop_session(&session);
            context.set_state(ControllerState::Stopped);
            context.torch.force_off();
            context.observer.dismiss();
        });
        true
    }

    /// Report a terminal failure unless a result was already reported
    pub fn fail(&self, failure: ScanFailure) -> bool {
        if !self.claim() {
            debug!(%failure, "Result already reported, ignoring failure");
            return false;
        }

        warn!(%failure, "Scan failed");
        let context = Arc::clone(&self.context);
        let session = self.session.clone();
        self.context.main.post(move || {
            stop_session(&session);
            context.set_state(ControllerState::Stopped);
            context.torch.force_off();
            context.observer.scan_failed(&failure);
        });
        true
    }
}

fn stop_session(session: &Weak<Mutex<CaptureSession>>) {
    if let Some(session) = session.upgrade() {
        session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop();
    }
}
