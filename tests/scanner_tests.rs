// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end scanner tests with scripted collaborators

use barcode_scanner::app::frame_processor::{DetectionRequest, NormalizedPoint};
use barcode_scanner::app::{
    ChannelObserver, ControllerState, Detector, Observation, ScanEvent, ScanFailure, Scanner,
    SessionState, Symbology,
};
use barcode_scanner::backends::camera::types::{
    BackendError, BackendResult, CameraBackendType, CameraDevice, CameraFrame, CameraPosition,
    PixelFormat,
};
use barcode_scanner::backends::camera::{
    AlwaysGranted, AuthorizationProvider, AuthorizationStatus, CameraBackend, FrameStream,
};
use barcode_scanner::config::Config;
use barcode_scanner::errors::{DetectorError, TorchError};
use barcode_scanner::torch::{TorchBackend, TorchControl, TorchMode};
use image::{GrayImage, Luma};
use rxing::{BarcodeFormat, MultiFormatWriter, Writer};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Endless stream of small grey frames
struct ScriptedBackend {
    cameras: Vec<CameraDevice>,
    fail_open: bool,
    fail_reads: bool,
    opened: AtomicUsize,
}

impl ScriptedBackend {
    fn with_camera() -> Self {
        Self {
            cameras: vec![CameraDevice {
                name: "Scripted camera".to_string(),
                path: "/dev/scripted0".to_string(),
                position: CameraPosition::Back,
                device_info: None,
            }],
            fail_open: false,
            fail_reads: false,
            opened: AtomicUsize::new(0),
        }
    }

    fn without_camera() -> Self {
        Self {
            cameras: Vec::new(),
            ..Self::with_camera()
        }
    }
}

impl CameraBackend for ScriptedBackend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        self.cameras.clone()
    }

    fn open_stream(&self, device: &CameraDevice) -> BackendResult<Box<dyn FrameStream>> {
        if self.fail_open {
            return Err(BackendError::DeviceNotFound(device.path.clone()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedStream {
            sequence: 0,
            fail_reads: self.fail_reads,
        }))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }
}

struct ScriptedStream {
    sequence: u32,
    fail_reads: bool,
}

impl FrameStream for ScriptedStream {
    fn next_frame(&mut self) -> BackendResult<Option<CameraFrame>> {
        thread::sleep(Duration::from_millis(2));
        if self.fail_reads {
            return Err(BackendError::IoError("device unplugged".to_string()));
        }
        let mut frame = CameraFrame::packed(8, 8, PixelFormat::Gray8, vec![200; 64]);
        frame.sequence = Some(self.sequence);
        self.sequence += 1;
        Ok(Some(frame))
    }
}

/// Detector answering from a closure, counting calls
struct ScriptedDetector<F> {
    respond: F,
    calls: AtomicUsize,
}

impl<F> ScriptedDetector<F>
where
    F: Fn(usize) -> Vec<Observation> + Send + Sync,
{
    fn new(respond: F) -> Self {
        Self {
            respond,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> Detector for ScriptedDetector<F>
where
    F: Fn(usize) -> Vec<Observation> + Send + Sync,
{
    fn supported_symbologies(&self) -> &[Symbology] {
        &[Symbology::Qr, Symbology::Code128]
    }

    fn detect(&self, _request: &DetectionRequest<'_>) -> Result<Vec<Observation>, DetectorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.respond)(call))
    }
}

/// Authorization with a fixed status and a scripted answer to the prompt
struct ScriptedAuthorization {
    status: AuthorizationStatus,
    answer: bool,
}

impl AuthorizationProvider for ScriptedAuthorization {
    fn status(&self, _device: &CameraDevice) -> AuthorizationStatus {
        self.status
    }

    fn request_access(&self, _device: &CameraDevice) -> bool {
        thread::sleep(Duration::from_millis(50));
        self.answer
    }
}

/// Torch recording every mode it was set to
#[derive(Clone, Default)]
struct RecordingTorch {
    modes: Arc<Mutex<Vec<TorchMode>>>,
}

impl TorchBackend for RecordingTorch {
    fn has_torch(&self) -> bool {
        true
    }

    fn lock_for_configuration(&mut self) -> Result<(), TorchError> {
        Ok(())
    }

    fn unlock_for_configuration(&mut self) {}

    fn set_torch_mode(&mut self, mode: TorchMode) -> Result<(), TorchError> {
        self.modes.lock().unwrap().push(mode);
        Ok(())
    }
}

fn qr(payload: Option<&str>) -> Observation {
    Observation {
        symbology: Symbology::Qr,
        top_left: NormalizedPoint::new(0.25, 0.75),
        top_right: NormalizedPoint::new(0.75, 0.75),
        bottom_right: NormalizedPoint::new(0.75, 0.25),
        bottom_left: NormalizedPoint::new(0.25, 0.25),
        payload: payload.map(str::to_string),
        descriptor: None,
    }
}

fn config() -> Config {
    Config {
        symbologies: vec![Symbology::Qr],
        view_width: 400.0,
        view_height: 200.0,
        ..Config::default()
    }
}

fn scanner(
    config: Config,
    backend: Arc<ScriptedBackend>,
    detector: Arc<dyn Detector>,
    authorization: Arc<dyn AuthorizationProvider>,
    torch: Arc<TorchControl>,
) -> (Scanner, UnboundedReceiver<ScanEvent>) {
    let (observer, events) = ChannelObserver::new();
    let scanner = Scanner::builder(config)
        .backend(backend)
        .detector(detector)
        .authorization(authorization)
        .torch(torch)
        .build(Arc::new(observer));
    (scanner, events)
}

/// Collect events until one matches `done`
fn wait_for(
    events: &mut UnboundedReceiver<ScanEvent>,
    done: impl Fn(&ScanEvent) -> bool,
) -> Vec<ScanEvent> {
    let deadline = Instant::now() + EVENT_TIMEOUT;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        match events.try_recv() {
            Ok(event) => {
                let finished = done(&event);
                seen.push(event);
                if finished {
                    return seen;
                }
            }
            Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(2)),
            Err(TryRecvError::Disconnected) => break,
        }
    }
    panic!("expected event not received, saw {:?}", seen);
}

fn drain(events: &mut UnboundedReceiver<ScanEvent>) -> Vec<ScanEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

fn count_detected(events: &[ScanEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ScanEvent::Detected(_)))
        .count()
}

#[test]
fn test_hello_reports_once_and_stops() {
    let backend = Arc::new(ScriptedBackend::with_camera());
    let detector = Arc::new(ScriptedDetector::new(|_| vec![qr(Some("HELLO"))]));
    let (scanner, mut events) = scanner(
        config(),
        backend,
        detector,
        Arc::new(AlwaysGranted),
        Arc::new(TorchControl::unavailable()),
    );

    scanner.load();
    let mut seen = wait_for(&mut events, |e| *e == ScanEvent::Dismissed);
    scanner.flush();
    seen.extend(drain(&mut events));

    assert_eq!(count_detected(&seen), 1);
    let detected_at = seen
        .iter()
        .position(|e| *e == ScanEvent::Detected("HELLO".to_string()))
        .unwrap();
    assert!(matches!(seen[detected_at - 1], ScanEvent::OverlayUpdated(_)));
    assert_eq!(seen[detected_at + 1], ScanEvent::Dismissed);

    assert_eq!(scanner.state(), ControllerState::Stopped);
    assert_eq!(scanner.session_state(), SessionState::Stopped);

    let subpaths = scanner.overlay().subpaths();
    assert_eq!(subpaths.len(), 1);
    let outline: Vec<(f32, f32)> = subpaths[0].iter().map(|p| (p.x, p.y)).collect();
    assert_eq!(
        outline,
        vec![(100.0, 50.0), (300.0, 50.0), (300.0, 150.0), (100.0, 150.0), (100.0, 50.0)]
    );

    // Nothing after the scanner stopped
    thread::sleep(Duration::from_millis(30));
    scanner.flush();
    assert_eq!(count_detected(&drain(&mut events)), 0);
}

#[test]
fn test_no_observations_keeps_running() {
    let backend = Arc::new(ScriptedBackend::with_camera());
    let detector = Arc::new(ScriptedDetector::new(|_| Vec::new()));
    let (scanner, mut events) = scanner(
        config(),
        backend,
        Arc::clone(&detector) as Arc<dyn Detector>,
        Arc::new(AlwaysGranted),
        Arc::new(TorchControl::unavailable()),
    );

    scanner.load();
    let seen = wait_for(&mut events, |e| matches!(e, ScanEvent::OverlayUpdated(_)));

    assert!(matches!(seen.last(), Some(ScanEvent::OverlayUpdated(path)) if path.is_empty()));
    assert_eq!(scanner.state(), ControllerState::Running);
    assert_eq!(scanner.session_state(), SessionState::Running);
    assert!(scanner.overlay().is_empty());
    assert!(detector.calls() > 0);

    scanner.disappear();
    scanner.flush();
    assert_eq!(count_detected(&drain(&mut events)), 0);
    assert_eq!(scanner.state(), ControllerState::Stopped);
    assert_eq!(scanner.session_state(), SessionState::Stopped);
}

#[test]
fn test_undecodable_code_is_outlined_only() {
    let backend = Arc::new(ScriptedBackend::with_camera());
    let detector = Arc::new(ScriptedDetector::new(|_| vec![qr(None), qr(Some(""))]));
    let (scanner, mut events) = scanner(
        config(),
        backend,
        detector,
        Arc::new(AlwaysGranted),
        Arc::new(TorchControl::unavailable()),
    );

    scanner.load();
    let seen = wait_for(&mut events, |e| matches!(e, ScanEvent::OverlayUpdated(_)));

    match seen.last() {
        Some(ScanEvent::OverlayUpdated(path)) => assert_eq!(path.subpaths().len(), 2),
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(count_detected(&seen), 0);
    assert_eq!(scanner.state(), ControllerState::Running);
}

#[test]
fn test_denied_authorization_delivers_no_frames() {
    for status in [AuthorizationStatus::Denied, AuthorizationStatus::Restricted] {
        let backend = Arc::new(ScriptedBackend::with_camera());
        let detector = Arc::new(ScriptedDetector::new(|_| vec![qr(Some("HELLO"))]));
        let (scanner, mut events) = scanner(
            config(),
            Arc::clone(&backend),
            Arc::clone(&detector) as Arc<dyn Detector>,
            Arc::new(ScriptedAuthorization {
                status,
                answer: true,
            }),
            Arc::new(TorchControl::unavailable()),
        );

        scanner.load();
        assert_eq!(scanner.state(), ControllerState::Stopped);
        scanner.flush();

        assert_eq!(
            drain(&mut events),
            vec![ScanEvent::Failed(ScanFailure::PermissionDenied)]
        );
        assert_eq!(backend.opened.load(Ordering::SeqCst), 0);
        assert_eq!(detector.calls(), 0);
    }
}

#[test]
fn test_refused_prompt_stops_session() {
    let backend = Arc::new(ScriptedBackend::with_camera());
    let detector = Arc::new(ScriptedDetector::new(|_| Vec::new()));
    let (scanner, mut events) = scanner(
        config(),
        Arc::clone(&backend),
        detector,
        Arc::new(ScriptedAuthorization {
            status: AuthorizationStatus::NotDetermined,
            answer: false,
        }),
        Arc::new(TorchControl::unavailable()),
    );

    scanner.load();
    // Setup proceeds while the prompt is open
    assert_eq!(backend.opened.load(Ordering::SeqCst), 1);

    let seen = wait_for(&mut events, |e| matches!(e, ScanEvent::Failed(_)));
    assert_eq!(
        seen.last(),
        Some(&ScanEvent::Failed(ScanFailure::PermissionDenied))
    );
    assert_eq!(scanner.state(), ControllerState::Stopped);
    assert_eq!(scanner.session_state(), SessionState::Stopped);
}

#[test]
fn test_granted_prompt_keeps_scanning() {
    let backend = Arc::new(ScriptedBackend::with_camera());
    let detector = Arc::new(ScriptedDetector::new(|call| {
        if call > 40 {
            vec![qr(Some("LATE"))]
        } else {
            Vec::new()
        }
    }));
    let (scanner, mut events) = scanner(
        config(),
        backend,
        detector,
        Arc::new(ScriptedAuthorization {
            status: AuthorizationStatus::NotDetermined,
            answer: true,
        }),
        Arc::new(TorchControl::unavailable()),
    );

    scanner.load();
    let seen = wait_for(&mut events, |e| *e == ScanEvent::Dismissed);
    assert!(seen.contains(&ScanEvent::Detected("LATE".to_string())));
}

#[test]
fn test_no_camera_fails_setup() {
    let detector = Arc::new(ScriptedDetector::new(|_| Vec::new()));
    let (scanner, mut events) = scanner(
        config(),
        Arc::new(ScriptedBackend::without_camera()),
        detector,
        Arc::new(AlwaysGranted),
        Arc::new(TorchControl::unavailable()),
    );

    scanner.load();
    scanner.flush();

    assert_eq!(scanner.state(), ControllerState::Stopped);
    assert_eq!(
        drain(&mut events),
        vec![ScanEvent::Failed(ScanFailure::NoCamera)]
    );

    // Stopped is terminal
    scanner.load();
    assert_eq!(scanner.state(), ControllerState::Stopped);
}

#[test]
fn test_configured_device_must_exist() {
    let detector = Arc::new(ScriptedDetector::new(|_| Vec::new()));
    let (scanner, mut events) = scanner(
        Config {
            device_path: Some("/dev/video9".to_string()),
            ..config()
        },
        Arc::new(ScriptedBackend::with_camera()),
        detector,
        Arc::new(AlwaysGranted),
        Arc::new(TorchControl::unavailable()),
    );

    scanner.load();
    scanner.flush();
    assert_eq!(
        drain(&mut events),
        vec![ScanEvent::Failed(ScanFailure::NoCamera)]
    );
}

#[test]
fn test_open_failure_reports_unavailable_device() {
    let backend = ScriptedBackend {
        fail_open: true,
        ..ScriptedBackend::with_camera()
    };
    let detector = Arc::new(ScriptedDetector::new(|_| Vec::new()));
    let (scanner, mut events) = scanner(
        config(),
        Arc::new(backend),
        detector,
        Arc::new(AlwaysGranted),
        Arc::new(TorchControl::unavailable()),
    );

    scanner.load();
    scanner.flush();

    assert_eq!(scanner.state(), ControllerState::Stopped);
    assert!(matches!(
        drain(&mut events).as_slice(),
        [ScanEvent::Failed(ScanFailure::DeviceUnavailable(_))]
    ));
}

#[test]
fn test_persistent_read_errors_give_up() {
    let backend = ScriptedBackend {
        fail_reads: true,
        ..ScriptedBackend::with_camera()
    };
    let detector = Arc::new(ScriptedDetector::new(|_| Vec::new()));
    let (scanner, mut events) = scanner(
        config(),
        Arc::new(backend),
        Arc::clone(&detector) as Arc<dyn Detector>,
        Arc::new(AlwaysGranted),
        Arc::new(TorchControl::unavailable()),
    );

    scanner.load();
    let seen = wait_for(&mut events, |e| matches!(e, ScanEvent::Failed(_)));

    assert!(matches!(
        seen.last(),
        Some(ScanEvent::Failed(ScanFailure::DeviceUnavailable(msg))) if msg.contains("unplugged")
    ));
    assert_eq!(detector.calls(), 0);
    scanner.flush();
    assert_eq!(scanner.state(), ControllerState::Stopped);
}

#[test]
fn test_concurrent_payloads_report_once() {
    let backend = Arc::new(ScriptedBackend::with_camera());
    let detector = Arc::new(ScriptedDetector::new(|call| {
        // Slow enough that several workers decode at once
        thread::sleep(Duration::from_millis(5));
        vec![qr(Some(&format!("code-{}", call)))]
    }));
    let (scanner, mut events) = scanner(
        Config {
            buffer_workers: 4,
            ..config()
        },
        backend,
        detector,
        Arc::new(AlwaysGranted),
        Arc::new(TorchControl::unavailable()),
    );

    scanner.load();
    let mut seen = wait_for(&mut events, |e| *e == ScanEvent::Dismissed);
    thread::sleep(Duration::from_millis(50));
    scanner.flush();
    seen.extend(drain(&mut events));

    assert_eq!(count_detected(&seen), 1);
    assert_eq!(
        seen.iter()
            .filter(|e| **e == ScanEvent::Dismissed)
            .count(),
        1
    );
}

#[test]
fn test_torch_forced_off_on_teardown() {
    let recording = RecordingTorch::default();
    let modes = Arc::clone(&recording.modes);
    let torch = Arc::new(TorchControl::new(Box::new(recording)));
    let detector = Arc::new(ScriptedDetector::new(|_| Vec::new()));
    let (scanner, _events) = scanner(
        Config {
            torch_on_start: true,
            ..config()
        },
        Arc::new(ScriptedBackend::with_camera()),
        detector,
        Arc::new(AlwaysGranted),
        Arc::clone(&torch),
    );

    scanner.load();
    scanner.flush();
    assert_eq!(scanner.torch_mode(), TorchMode::On);

    drop(scanner);
    assert_eq!(torch.mode(), TorchMode::Off);
    assert_eq!(modes.lock().unwrap().last(), Some(&TorchMode::Off));
}

#[test]
fn test_torch_forced_off_after_success() {
    let recording = RecordingTorch::default();
    let torch = Arc::new(TorchControl::new(Box::new(recording)));
    let detector = Arc::new(ScriptedDetector::new(|_| vec![qr(Some("HELLO"))]));
    let (scanner, mut events) = scanner(
        config(),
        Arc::new(ScriptedBackend::with_camera()),
        detector,
        Arc::new(AlwaysGranted),
        Arc::clone(&torch),
    );

    assert_eq!(scanner.toggle_torch(true), TorchMode::On);
    scanner.load();
    wait_for(&mut events, |e| *e == ScanEvent::Dismissed);

    assert_eq!(torch.mode(), TorchMode::Off);
}

#[test]
fn test_torch_on_start_never_outlives_immediate_success() {
    for _ in 0..20 {
        let recording = RecordingTorch::default();
        let modes = Arc::clone(&recording.modes);
        let torch = Arc::new(TorchControl::new(Box::new(recording)));
        let detector = Arc::new(ScriptedDetector::new(|_| vec![qr(Some("HELLO"))]));
        let (scanner, mut events) = scanner(
            Config {
                torch_on_start: true,
                ..config()
            },
            Arc::new(ScriptedBackend::with_camera()),
            detector,
            Arc::new(AlwaysGranted),
            Arc::clone(&torch),
        );

        scanner.load();
        wait_for(&mut events, |e| *e == ScanEvent::Dismissed);
        scanner.flush();

        assert_eq!(scanner.state(), ControllerState::Stopped);
        assert_eq!(torch.mode(), TorchMode::Off);
        assert_ne!(modes.lock().unwrap().last(), Some(&TorchMode::On));
    }
}

#[test]
fn test_missing_torch_leaves_state_unchanged() {
    let detector = Arc::new(ScriptedDetector::new(|_| Vec::new()));
    let (scanner, _events) = scanner(
        config(),
        Arc::new(ScriptedBackend::with_camera()),
        detector,
        Arc::new(AlwaysGranted),
        Arc::new(TorchControl::unavailable()),
    );

    scanner.load();
    assert_eq!(scanner.toggle_torch(true), TorchMode::Off);
    assert_eq!(scanner.torch_mode(), TorchMode::Off);
    assert_eq!(scanner.state(), ControllerState::Running);
}

#[test]
fn test_unsupported_symbologies_are_dropped() {
    let detector = Arc::new(ScriptedDetector::new(|_| Vec::new()));
    let (scanner, _events) = scanner(
        Config {
            symbologies: vec![Symbology::Aztec, Symbology::Qr, Symbology::Code128],
            ..config()
        },
        Arc::new(ScriptedBackend::with_camera()),
        detector,
        Arc::new(AlwaysGranted),
        Arc::new(TorchControl::unavailable()),
    );

    scanner.load();
    assert_eq!(scanner.symbologies(), vec![Symbology::Qr, Symbology::Code128]);
}

#[test]
fn test_blank_images_end_the_scan() {
    let dir = std::env::temp_dir().join(format!("scanner-blank-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let image_path = dir.join("blank.png");
    image::GrayImage::from_pixel(64, 64, image::Luma([255]))
        .save(&image_path)
        .unwrap();

    let config = Config {
        backend: CameraBackendType::ImageFiles,
        image_files: vec![image_path],
        ..config()
    };
    let (observer, mut events) = ChannelObserver::new();
    let scanner = Scanner::builder(config).build(Arc::new(observer));

    scanner.load();
    let seen = wait_for(&mut events, |e| matches!(e, ScanEvent::Failed(_)));

    assert_eq!(seen.last(), Some(&ScanEvent::Failed(ScanFailure::StreamEnded)));
    assert!(
        seen.iter()
            .any(|e| matches!(e, ScanEvent::OverlayUpdated(path) if path.is_empty()))
    );
    scanner.flush();
    assert_eq!(scanner.state(), ControllerState::Stopped);

    let _ = std::fs::remove_dir_all(&dir);
}

/// QR code with a 4 module quiet zone, 4 px per module
fn render_qr(payload: &str) -> GrayImage {
    const MODULE: u32 = 4;
    const QUIET: u32 = 4;
    let code = qrcode::QrCode::new(payload.as_bytes()).unwrap();
    let width = code.width() as u32;
    let colors = code.to_colors();
    let side = (width + 2 * QUIET) * MODULE;

    GrayImage::from_fn(side, side, |x, y| {
        let (mx, my) = (x / MODULE, y / MODULE);
        let inside = (QUIET..width + QUIET).contains(&mx) && (QUIET..width + QUIET).contains(&my);
        if inside && colors[((my - QUIET) * width + (mx - QUIET)) as usize] == qrcode::Color::Dark {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

/// Code128 symbol on a white margin
fn render_code128(payload: &str) -> GrayImage {
    const PADDING: u32 = 20;
    let matrix = MultiFormatWriter::default()
        .encode(payload, &BarcodeFormat::CODE_128, 400, 80)
        .unwrap();
    let (w, h) = (matrix.getWidth(), matrix.getHeight());

    GrayImage::from_fn(w + 2 * PADDING, h + 2 * PADDING, |x, y| {
        let inside = (PADDING..w + PADDING).contains(&x) && (PADDING..h + PADDING).contains(&y);
        if inside && matrix.get(x - PADDING, y - PADDING) {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

fn save_image(tag: &str, image: &GrayImage) -> (PathBuf, PathBuf) {
    let dir = std::env::temp_dir().join(format!("scanner-{}-{}", tag, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{}.png", tag));
    image.save(&path).unwrap();
    (dir, path)
}

/// Image files through the stock detectors, as `scan-image` runs them
fn scan_image_file(image: &GrayImage, tag: &str) -> (Vec<ScanEvent>, Scanner) {
    let (dir, path) = save_image(tag, image);
    let config = Config {
        backend: CameraBackendType::ImageFiles,
        image_files: vec![path],
        view_width: image.width() as f32,
        view_height: image.height() as f32,
        ..Config::default()
    };
    let (observer, mut events) = ChannelObserver::new();
    let scanner = Scanner::builder(config).build(Arc::new(observer));

    scanner.load();
    let seen = wait_for(&mut events, |e| {
        matches!(e, ScanEvent::Dismissed | ScanEvent::Failed(_))
    });
    scanner.flush();

    let _ = std::fs::remove_dir_all(&dir);
    (seen, scanner)
}

#[test]
fn test_qr_image_is_decoded_and_outlined() {
    let (seen, scanner) = scan_image_file(&render_qr("HELLO"), "qr");

    assert_eq!(count_detected(&seen), 1);
    assert!(seen.contains(&ScanEvent::Detected("HELLO".into())));
    assert_eq!(seen.last(), Some(&ScanEvent::Dismissed));
    assert_eq!(scanner.state(), ControllerState::Stopped);
    assert_eq!(scanner.session_state(), SessionState::Stopped);

    // View size equals the image, so the outline lands on the symbol's pixels
    let outline = seen
        .iter()
        .find_map(|e| match e {
            ScanEvent::OverlayUpdated(path) if !path.is_empty() => Some(path.subpaths()),
            _ => None,
        })
        .unwrap();
    assert_eq!(outline.len(), 1);
    let top_left = outline[0][0];
    assert!((top_left.x - 16.0).abs() < 4.0, "{:?}", top_left);
    assert!((top_left.y - 16.0).abs() < 4.0, "{:?}", top_left);
}

#[test]
fn test_code128_image_is_decoded_with_default_symbologies() {
    let (seen, scanner) = scan_image_file(&render_code128("SCAN-128"), "code128");

    assert_eq!(count_detected(&seen), 1);
    assert!(seen.contains(&ScanEvent::Detected("SCAN-128".into())));
    assert_eq!(scanner.state(), ControllerState::Stopped);
    assert!(scanner.symbologies().contains(&Symbology::Code128));
}
