// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame processing
//!
//! Runs on the buffer queue workers: luma extraction, detection, then an
//! overlay update and the payloads are handed to the main context and the
//! reporter. A frame that cannot be converted or analysed is dropped; the
//! next one will do.

use super::frame_processor::{DetectionRequest, Detector, Observation, Symbology};
use super::reporter::ResultReporter;
use super::state::ScanContext;
use crate::backends::camera::format_converters::frame_to_luma;
use crate::backends::camera::types::CameraFrame;
use crate::constants::capture::FRAME_LOG_INTERVAL;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

pub struct FrameDispatcher {
    detector: Arc<dyn Detector>,
    symbologies: Vec<Symbology>,
    context: Arc<ScanContext>,
    reporter: Arc<ResultReporter>,
    min_interval: Option<Duration>,
    last_accepted: Mutex<Option<Instant>>,
    processed: AtomicU64,
}

impl FrameDispatcher {
    pub(crate) fn new(
        detector: Arc<dyn Detector>,
        symbologies: Vec<Symbology>,
        context: Arc<ScanContext>,
        reporter: Arc<ResultReporter>,
    ) -> Self {
        Self {
            detector,
            symbologies,
            context,
            reporter,
            min_interval: None,
            last_accepted: Mutex::new(None),
            processed: AtomicU64::new(0),
        }
    }

    /// Skip frames arriving sooner than `interval` after the last accepted one
    pub fn with_min_interval(mut self, interval: Option<Duration>) -> Self {
        self.min_interval = interval.filter(|i| !i.is_zero());
        self
    }

    pub fn reporter(&self) -> &Arc<ResultReporter> {
        &self.reporter
    }

    fn accept(&self, now: Instant) -> bool {
        let Some(interval) = self.min_interval else {
            return true;
        };
        let mut last = self
            .last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match *last {
            Some(previous) if now.duration_since(previous) < interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Analyse one frame
    pub fn process(&self, frame: CameraFrame) {
        if self.reporter.is_finished() {
            trace!("Result already reported, skipping frame");
            return;
        }
        if !self.accept(Instant::now()) {
            trace!("Frame inside minimum interval, skipping");
            return;
        }

        let start = Instant::now();
        let luma = match frame_to_luma(&frame) {
            Ok(luma) => luma,
            Err(e) => {
                trace!(error = %e, format = ?frame.format, "Dropping frame without pixel data");
                return;
            }
        };

        let request = DetectionRequest {
            image: &luma,
            symbologies: &self.symbologies,
            rotation: frame.rotation,
            intrinsics: frame.intrinsics,
        };
        let observations = match self.detector.detect(&request) {
            Ok(observations) => observations,
            Err(e) => {
                warn!(error = %e, "Detector failed, dropping frame");
                return;
            }
        };

        let count = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if count % FRAME_LOG_INTERVAL == 0 {
            debug!(frames = count, "Frames processed");
        }
        trace!(
            sequence = ?frame.sequence,
            observations = observations.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Frame processed"
        );

        let payloads: Vec<String> = observations
            .iter()
            .filter_map(Observation::text)
            .map(str::to_string)
            .collect();

        self.post_overlay(observations);

        for payload in payloads {
            if self.reporter.report(&payload) {
                break;
            }
        }
    }

    fn post_overlay(&self, observations: Vec<Observation>) {
        let context = Arc::clone(&self.context);
        self.context.main.post(move || {
            // Frames finishing after the scanner stopped must not repaint
            if context.state().is_stopped() {
                return;
            }
            let path = context
                .overlay
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .update(&observations)
                .clone();
            context.observer.overlay_updated(&path);
        });
    }
}
