// SPDX-License-Identifier: GPL-3.0-only

//! Capture session
//!
//! A session owns the capture thread reading frames from one device and the
//! buffer queue analysing them.
//!
//! ```text
//! capture thread ──frame──▶ BufferQueue ──spawn_blocking──▶ FrameDispatcher
//!   (FrameStream)          (N permits, late frames dropped)
//! ```

use super::dispatcher::FrameDispatcher;
use super::state::{ScanFailure, SessionState};
use crate::backends::camera::frame_loop::{CaptureLoopController, LoopAction};
use crate::backends::camera::types::{BackendError, BackendResult, CameraDevice, CameraFrame};
use crate::backends::camera::{CameraBackend, FrameStream};
use crate::constants::capture::{MAX_CONSECUTIVE_ERRORS, RETRY_DELAY};
use crate::constants::dispatch::THREAD_NAME;
use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Semaphore;
use tracing::{debug, info, trace, warn};

/// Concurrent background context frames are analysed on
pub struct BufferQueue {
    runtime: Option<Runtime>,
    submitter: FrameSubmitter,
}

/// Capture-thread side of the buffer queue
#[derive(Clone)]
struct FrameSubmitter {
    handle: Handle,
    permits: Arc<Semaphore>,
    workers: usize,
    dispatcher: Arc<FrameDispatcher>,
}

impl BufferQueue {
    pub fn new(workers: usize, dispatcher: Arc<FrameDispatcher>) -> BackendResult<Self> {
        let workers = workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name(THREAD_NAME)
            .enable_time()
            .build()
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Failed to start buffer queue: {}", e))
            })?;

        debug!(workers, "Buffer queue started");
        let submitter = FrameSubmitter {
            handle: runtime.handle().clone(),
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            dispatcher,
        };
        Ok(Self {
            runtime: Some(runtime),
            submitter,
        })
    }

    /// Stop accepting work without waiting for in-flight detector calls
    pub fn shutdown(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            debug!("Buffer queue shut down");
        }
    }
}

impl Drop for BufferQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl FrameSubmitter {
    fn run(&self, frame: CameraFrame, permit: tokio::sync::OwnedSemaphorePermit) {
        let dispatcher = Arc::clone(&self.dispatcher);
        self.handle.spawn_blocking(move || {
            let _permit = permit;
            dispatcher.process(frame);
        });
    }

    /// Live sources: drop the frame if every worker is busy
    fn try_submit(&self, frame: CameraFrame) -> bool {
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => {
                self.run(frame, permit);
                true
            }
            Err(_) => {
                trace!(sequence = ?frame.sequence, "All workers busy, dropping late frame");
                false
            }
        }
    }

    /// Recorded sources: wait for a worker
    fn submit_blocking(&self, frame: CameraFrame) -> bool {
        match self.handle.block_on(Arc::clone(&self.permits).acquire_owned()) {
            Ok(permit) => {
                self.run(frame, permit);
                true
            }
            Err(_) => false,
        }
    }

    /// Wait until no frame is being analysed
    fn drain(&self) {
        let _ = self
            .handle
            .block_on(self.permits.acquire_many(self.workers as u32));
    }
}

/// Capture lifecycle for one scanner
pub struct CaptureSession {
    backend: Arc<dyn CameraBackend>,
    workers: usize,
    capture: Option<CaptureLoopController>,
    queue: Option<BufferQueue>,
    state: SessionState,
}

impl CaptureSession {
    pub fn new(backend: Arc<dyn CameraBackend>, workers: usize) -> Self {
        Self {
            backend,
            workers,
            capture: None,
            queue: None,
            state: SessionState::Stopped,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Open `device` and start delivering its frames to `dispatcher`
    ///
    /// The stream is opened on the capture thread; this call waits for the
    /// outcome and fails if the device cannot be opened.
    pub fn start(
        &mut self,
        device: &CameraDevice,
        dispatcher: Arc<FrameDispatcher>,
    ) -> BackendResult<()> {
        if self.state == SessionState::Running {
            debug!("Capture session already running");
            return Ok(());
        }

        let queue = BufferQueue::new(self.workers, Arc::clone(&dispatcher))?;
        let submitter = queue.submitter.clone();
        let reporter = Arc::clone(dispatcher.reporter());

        let (opened_tx, opened_rx) = std_mpsc::sync_channel::<BackendResult<()>>(1);
        let backend = Arc::clone(&self.backend);
        let open_device = device.clone();

        let init = move || {
            match backend.open_stream(&open_device) {
                Ok(stream) => {
                    let _ = opened_tx.send(Ok(()));
                    Ok(stream)
                }
                Err(e) => {
                    let message = e.to_string();
                    let _ = opened_tx.send(Err(e));
                    Err(message)
                }
            }
        };

        let mut consecutive_errors = 0u32;
        let capture_loop = move |stream: &mut Box<dyn FrameStream>| {
            if reporter.is_finished() {
                return LoopAction::Stop;
            }

            match stream.next_frame() {
                Ok(Some(frame)) => {
                    consecutive_errors = 0;
                    if stream.is_live() {
                        submitter.try_submit(frame);
                    } else {
                        submitter.submit_blocking(frame);
                    }
                    LoopAction::Continue
                }
                Ok(None) => {
                    info!("Frame stream ended");
                    // Let frames in flight decide the outcome first
                    submitter.drain();
                    reporter.fail(ScanFailure::StreamEnded);
                    LoopAction::Stop
                }
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(error = %e, consecutive_errors, "Failed to read frame");
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        reporter.fail(ScanFailure::DeviceUnavailable(e.to_string()));
                        return LoopAction::Stop;
                    }
                    std::thread::sleep(RETRY_DELAY);
                    LoopAction::Continue
                }
            }
        };

        let mut capture =
            CaptureLoopController::start_with_init("capture-session", init, capture_loop);

        match opened_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                capture.join();
                return Err(e);
            }
            Err(_) => {
                capture.stop();
                return Err(BackendError::InitializationFailed(
                    "Capture thread exited before opening the device".to_string(),
                ));
            }
        }

        info!(name = %device.name, path = %device.path, "Capture session started");
        self.capture = Some(capture);
        self.queue = Some(queue);
        self.state = SessionState::Running;
        Ok(())
    }

    /// Stop delivery; idempotent
    pub fn stop(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        if let Some(mut queue) = self.queue.take() {
            queue.shutdown();
        }
        if self.state == SessionState::Running {
            info!("Capture session stopped");
        }
        self.state = SessionState::Stopped;
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}
