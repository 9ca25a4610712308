// SPDX-License-Identifier: GPL-3.0-only

//! Scanner controller
//!
//! [`Scanner`] ties a camera backend, a detector and a host observer
//! together and drives the scan lifecycle:
//!
//! ```text
//! Idle ──load()──▶ SettingUp ──session started──▶ Running ──first payload──▶ Stopped
//!                      │                              │
//!                      └──no camera / denied──────────┴──disappear() / failure──▶ Stopped
//! ```
//!
//! # Architecture
//!
//! - `capture_session`: capture thread and buffer queue
//! - `dispatcher`: per-frame luma extraction and detection
//! - `frame_processor`: detector trait, rqrr and rxing detectors, observation types
//! - `main_context`: serial task queue for everything the host observes
//! - `observer`: host notification trait
//! - `overlay`: detection outlines in view coordinates
//! - `reporter`: one-shot result gate
//! - `state`: controller and session state, failures

pub mod capture_session;
pub mod dispatcher;
pub mod frame_processor;
pub mod main_context;
pub mod observer;
pub mod overlay;
pub mod reporter;
pub mod state;

pub use capture_session::CaptureSession;
pub use frame_processor::{CompositeDetector, Detector, Observation, Symbology};
pub use observer::{ChannelObserver, ScanObserver};
pub use overlay::{OverlayPath, OverlayRenderer, OverlayStyle, ViewSize};
pub use state::{ControllerState, ScanEvent, ScanFailure, SessionState};

use crate::backends::camera::authorization::DeviceNodeAuthorization;
use crate::backends::camera::{
    AlwaysGranted, AuthorizationProvider, AuthorizationStatus, CameraBackend, CameraBackendType,
    CameraDevice, get_backend, select_device,
};
use crate::config::Config;
use crate::torch::{TorchControl, TorchMode};
use dispatcher::FrameDispatcher;
use main_context::MainContext;
use reporter::ResultReporter;
use state::ScanContext;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Builder for [`Scanner`]
///
/// Collaborators not given explicitly are derived from the configuration.
pub struct ScannerBuilder {
    config: Config,
    backend: Option<Arc<dyn CameraBackend>>,
    detector: Option<Arc<dyn Detector>>,
    authorization: Option<Arc<dyn AuthorizationProvider>>,
    torch: Option<Arc<TorchControl>>,
}

impl ScannerBuilder {
    pub fn backend(mut self, backend: Arc<dyn CameraBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn authorization(mut self, authorization: Arc<dyn AuthorizationProvider>) -> Self {
        self.authorization = Some(authorization);
        self
    }

    pub fn torch(mut self, torch: Arc<TorchControl>) -> Self {
        self.torch = Some(torch);
        self
    }

    pub fn build(self, observer: Arc<dyn ScanObserver>) -> Scanner {
        let config = self.config;
        let live_camera = config.backend == CameraBackendType::V4l2;

        let backend = self
            .backend
            .unwrap_or_else(|| Arc::from(get_backend(&config)));
        let detector = self
            .detector
            .unwrap_or_else(|| Arc::new(CompositeDetector::standard(config.max_dimension)));
        let authorization = self.authorization.unwrap_or_else(|| {
            let provider: Arc<dyn AuthorizationProvider> = if live_camera {
                Arc::new(DeviceNodeAuthorization)
            } else {
                Arc::new(AlwaysGranted)
            };
            provider
        });
        let torch = self.torch.unwrap_or_else(|| {
            if live_camera {
                Arc::new(TorchControl::discover())
            } else {
                Arc::new(TorchControl::unavailable())
            }
        });

        let main = MainContext::new("scanner-main");
        let context = Arc::new(ScanContext::new(
            main.handle(),
            observer,
            OverlayRenderer::new(ViewSize::new(config.view_width, config.view_height)),
            torch,
        ));
        let session = Arc::new(Mutex::new(CaptureSession::new(
            Arc::clone(&backend),
            config.buffer_workers,
        )));
        let reporter = Arc::new(ResultReporter::new(
            Arc::clone(&context),
            Arc::downgrade(&session),
        ));

        Scanner {
            config,
            main,
            context,
            backend,
            detector,
            authorization,
            session,
            reporter,
            symbologies: Mutex::new(Vec::new()),
        }
    }
}

/// A barcode scanner
///
/// Reports at most one payload to its observer, then stops for good.
/// Dropping the scanner tears the session down.
pub struct Scanner {
    config: Config,
    main: MainContext,
    context: Arc<ScanContext>,
    backend: Arc<dyn CameraBackend>,
    detector: Arc<dyn Detector>,
    authorization: Arc<dyn AuthorizationProvider>,
    session: Arc<Mutex<CaptureSession>>,
    reporter: Arc<ResultReporter>,
    symbologies: Mutex<Vec<Symbology>>,
}

impl Scanner {
    pub fn builder(config: Config) -> ScannerBuilder {
        ScannerBuilder {
            config,
            backend: None,
            detector: None,
            authorization: None,
            torch: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.context.state()
    }

    pub fn session_state(&self) -> SessionState {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
    }

    /// Symbologies actually requested from the detector
    pub fn symbologies(&self) -> Vec<Symbology> {
        self.symbologies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current overlay
    pub fn overlay(&self) -> OverlayPath {
        self.overlay_renderer(|renderer| renderer.path().clone())
    }

    pub fn overlay_style(&self) -> OverlayStyle {
        self.overlay_renderer(|renderer| *renderer.style())
    }

    fn overlay_renderer<T>(&self, f: impl FnOnce(&OverlayRenderer) -> T) -> T {
        let renderer = self
            .context
            .overlay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&renderer)
    }

    pub fn torch_mode(&self) -> TorchMode {
        self.context.torch.mode()
    }

    /// Wait until every notification queued so far was delivered
    pub fn flush(&self) {
        self.main.handle().flush();
    }

    /// Set up and start scanning
    ///
    /// Failures never surface here: they end the scan and reach the observer
    /// as [`ScanFailure`]s.
    pub fn load(&self) {
        if self.state() != ControllerState::Idle {
            warn!(state = ?self.state(), "Scanner already loaded");
            return;
        }
        self.context.set_state(ControllerState::SettingUp);

        let symbologies = self.resolve_symbologies();
        *self
            .symbologies
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = symbologies.clone();

        let cameras = self.backend.enumerate_cameras();
        debug!(count = cameras.len(), backend = %self.backend.backend_type(), "Enumerated cameras");
        let Some(device) = select_device(
            &cameras,
            self.config.device_path.as_deref(),
            self.config.camera_position,
        ) else {
            self.abort_setup(ScanFailure::NoCamera);
            return;
        };

        if !self.check_authorization(&device) {
            self.abort_setup(ScanFailure::PermissionDenied);
            return;
        }

        let dispatcher = FrameDispatcher::new(
            Arc::clone(&self.detector),
            symbologies,
            Arc::clone(&self.context),
            Arc::clone(&self.reporter),
        )
        .with_min_interval(self.config.min_frame_interval());

        let started = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .start(&device, Arc::new(dispatcher));
        if let Err(e) = started {
            warn!(error = %e, "Failed to start capture session");
            self.abort_setup(ScanFailure::DeviceUnavailable(e.to_string()));
            return;
        }

        if self.context.set_state(ControllerState::Running) && self.config.torch_on_start {
            // Queued behind any result task, which may already have stopped us
            let context = Arc::clone(&self.context);
            self.context.main.post(move || {
                if context.state().is_stopped() {
                    debug!("Scan already over, leaving torch off");
                    return;
                }
                if let Err(e) = context.torch.toggle(true) {
                    warn!(error = %e, "Torch toggle failed");
                }
            });
        }
    }

    /// Requested symbologies the detector can handle
    fn resolve_symbologies(&self) -> Vec<Symbology> {
        let supported = self.detector.supported_symbologies();
        let (usable, unsupported): (Vec<Symbology>, Vec<Symbology>) = self
            .config
            .symbologies
            .iter()
            .copied()
            .partition(|s| supported.contains(s));

        if !unsupported.is_empty() {
            let names: Vec<&str> = unsupported.iter().map(Symbology::name).collect();
            warn!(unsupported = ?names, "Detector cannot decode some requested symbologies");
        }
        usable
    }

    /// Whether setup may proceed on `device`
    fn check_authorization(&self, device: &CameraDevice) -> bool {
        let status = self.authorization.status(device);
        debug!(?status, path = %device.path, "Camera authorization");

        if !status.allows_setup() {
            info!(?status, "Camera access not authorized");
            return false;
        }
        if status == AuthorizationStatus::Granted {
            return true;
        }

        // Proceed while the user decides; a refusal ends the scan
        let authorization = Arc::clone(&self.authorization);
        let reporter = Arc::clone(&self.reporter);
        let device = device.clone();
        let spawned = std::thread::Builder::new()
            .name("camera-access".to_string())
            .spawn(move || {
                if authorization.request_access(&device) {
                    info!(path = %device.path, "Camera access granted");
                } else {
                    reporter.fail(ScanFailure::PermissionDenied);
                }
            });
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to request camera access");
            return false;
        }
        true
    }

    fn abort_setup(&self, failure: ScanFailure) {
        self.context.set_state(ControllerState::Stopped);
        self.reporter.fail(failure);
    }

    /// Switch the torch; failures are logged and leave the mode unchanged
    pub fn toggle_torch(&self, on: bool) -> TorchMode {
        match self.context.torch.toggle(on) {
            Ok(mode) => mode,
            Err(e) => {
                warn!(error = %e, on, "Torch toggle failed");
                self.context.torch.mode()
            }
        }
    }

    /// Tear down: stop capture, torch off, Stopped
    pub fn disappear(&self) {
        self.reporter.close();
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop();
        self.context.torch.force_off();
        self.context.set_state(ControllerState::Stopped);
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.disappear();
        self.main.shutdown();
    }
}
