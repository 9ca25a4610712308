// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Scanning from a camera
//! - Scanning image files, optionally saving the annotated image
//! - Listing available cameras
//! - Switching the torch

use barcode_scanner::app::overlay::draw_path;
use barcode_scanner::app::{ChannelObserver, OverlayPath, ScanEvent, ScanFailure, Scanner};
use barcode_scanner::backends::camera::types::CameraBackendType;
use barcode_scanner::backends::camera::{file_source, get_backend};
use barcode_scanner::config::Config;
use barcode_scanner::constants::file_formats;
use barcode_scanner::torch::TorchControl;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

/// How a scan ended
enum Outcome {
    Detected(String),
    Failed(ScanFailure),
    Interrupted,
    TimedOut,
}

/// List all available cameras
pub fn list_cameras(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let backend = get_backend(config);
    let cameras = backend.enumerate_cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for camera in &cameras {
        println!("  {} ({})", camera.name, camera.path);
        println!("      Position: {}", camera.position);
        if let Some(info) = &camera.device_info {
            println!("      Driver: {} on {}", info.driver, info.bus);
        }
        println!();
    }

    Ok(())
}

/// Scan from a camera until a code is read
pub fn scan(config: Config, timeout: Option<Duration>) -> Result<(), Box<dyn std::error::Error>> {
    let (observer, mut events) = ChannelObserver::new();
    let scanner = Scanner::builder(config).build(Arc::new(observer));

    let (interrupt_tx, mut interrupt_rx) = tokio::sync::mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(());
    })?;

    scanner.load();
    let outcome = wait_for_outcome(&mut events, &mut interrupt_rx, timeout, |_| {})?;
    drop(scanner);

    finish(outcome)
}

/// Scan image files through the same pipeline as a camera
pub fn scan_images(
    mut config: Config,
    input: &[PathBuf],
    annotate: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let paths = collect_image_paths(input)?;
    if paths.is_empty() {
        return Err("No supported images found".into());
    }
    if annotate.is_some() && paths.len() > 1 {
        return Err("--annotate takes a single image".into());
    }

    let first = file_source::load_image_as_frame(&paths[0])?;
    // Overlay coordinates then match the image's pixels
    config.view_width = first.width as f32;
    config.view_height = first.height as f32;
    config.backend = CameraBackendType::ImageFiles;
    config.image_files = paths.clone();
    config.device_path = None;

    let (observer, mut events) = ChannelObserver::new();
    let scanner = Scanner::builder(config).build(Arc::new(observer));

    let (_interrupt_tx, mut interrupt_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
    let mut overlay = OverlayPath::default();

    scanner.load();
    let outcome = wait_for_outcome(&mut events, &mut interrupt_rx, None, |path| {
        overlay = path.clone();
    })?;
    let style = scanner.overlay_style();
    drop(scanner);

    if let Some(output) = annotate {
        let mut image = image::open(&paths[0])?.to_rgba8();
        draw_path(&mut image, &overlay, &style);
        image.save(&output)?;
        println!("Annotated image saved to: {}", output.display());
    }

    finish(outcome)
}

/// Switch the torch on or off
pub fn set_torch(on: bool) -> Result<(), Box<dyn std::error::Error>> {
    let torch = TorchControl::discover();
    if !torch.is_available() {
        return Err("No controllable torch found".into());
    }
    let mode = torch.toggle(on)?;
    println!("Torch: {:?}", mode);
    Ok(())
}

/// Drive the event stream until the scan is over
fn wait_for_outcome(
    events: &mut UnboundedReceiver<ScanEvent>,
    interrupt: &mut UnboundedReceiver<()>,
    timeout: Option<Duration>,
    mut on_overlay: impl FnMut(&OverlayPath),
) -> Result<Outcome, Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    let outcome = runtime.block_on(async {
        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        let mut detected = None;
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(ScanEvent::Detected(payload)) => detected = Some(payload),
                    Some(ScanEvent::Dismissed) => {
                        return detected.map(Outcome::Detected).unwrap_or(Outcome::Interrupted);
                    }
                    Some(ScanEvent::Failed(failure)) => return Outcome::Failed(failure),
                    Some(ScanEvent::OverlayUpdated(path)) => {
                        debug!(outlines = path.subpaths().len(), "Overlay updated");
                        on_overlay(&path);
                    }
                    None => {
                        return detected.map(Outcome::Detected).unwrap_or(Outcome::Interrupted);
                    }
                },
                _ = interrupt.recv() => return Outcome::Interrupted,
                _ = &mut deadline => return Outcome::TimedOut,
            }
        }
    });

    Ok(outcome)
}

fn finish(outcome: Outcome) -> Result<(), Box<dyn std::error::Error>> {
    match outcome {
        Outcome::Detected(payload) => {
            println!("{}", payload);
            Ok(())
        }
        Outcome::Failed(ScanFailure::StreamEnded) => Err("No barcode found".into()),
        Outcome::Failed(failure) => Err(failure.to_string().into()),
        Outcome::Interrupted => {
            warn!("Scan interrupted");
            Err("Scan interrupted".into())
        }
        Outcome::TimedOut => Err("Timed out waiting for a barcode".into()),
    }
}

/// Collect all image paths from input (files or directories)
fn collect_image_paths(input: &[PathBuf]) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut paths = Vec::new();

    for path in input {
        if path.is_dir() {
            let mut entries = Vec::new();
            for entry in std::fs::read_dir(path)? {
                let file_path = entry?.path();
                if is_supported_image(&file_path) {
                    entries.push(file_path);
                }
            }
            // Sort by filename for consistent ordering
            entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
            paths.extend(entries);
        } else if is_supported_image(path) {
            paths.push(path.clone());
        } else {
            return Err(format!("Unsupported image: {}", path.display()).into());
        }
    }

    Ok(paths)
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(file_formats::is_image_extension)
        .unwrap_or(false)
}
