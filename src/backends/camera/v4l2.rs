// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera backend
//!
//! Enumerates `/dev/video*` capture nodes and streams frames through
//! memory-mapped buffers. Format negotiation prefers formats whose luma can
//! be read directly (YUYV, GREY, NV12) and falls back to MJPEG.

use super::types::{
    BackendError, BackendResult, CameraBackendType, CameraDevice, CameraFrame, CameraIntrinsics,
    CameraPosition, DeviceInfo, PixelFormat, SensorRotation,
};
use super::{CameraBackend, FrameStream};
use crate::config::Config;
use crate::constants::capture;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// Formats tried in order during negotiation
const PREFERRED_FOURCCS: [&[u8; 4]; 4] = [b"YUYV", b"GREY", b"NV12", b"MJPG"];

/// Video4Linux2 backend
#[derive(Debug, Clone)]
pub struct V4l2Backend {
    width: u32,
    height: u32,
    rotation: SensorRotation,
    intrinsics: Option<CameraIntrinsics>,
}

impl V4l2Backend {
    pub fn new(config: &Config) -> Self {
        Self {
            width: config.capture_width,
            height: config.capture_height,
            rotation: SensorRotation::from_degrees(config.sensor_rotation),
            intrinsics: config.intrinsics,
        }
    }
}

impl CameraBackend for V4l2Backend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        let mut cameras = Vec::new();

        for node in v4l::context::enum_devices() {
            let path = node.path().to_string_lossy().to_string();

            let dev = match Device::with_path(node.path()) {
                Ok(dev) => dev,
                Err(e) => {
                    // Unreadable nodes are still listed so authorization can report them
                    debug!(path = %path, error = %e, "Cannot open V4L2 node");
                    cameras.push(CameraDevice {
                        name: node.name().unwrap_or_else(|| path.clone()),
                        position: CameraPosition::from_label(&node.name().unwrap_or_default()),
                        path,
                        device_info: None,
                    });
                    continue;
                }
            };

            let caps = match dev.query_caps() {
                Ok(caps) => caps,
                Err(e) => {
                    debug!(path = %path, error = %e, "VIDIOC_QUERYCAP failed");
                    continue;
                }
            };

            // UVC cameras expose a metadata node next to the capture node;
            // only the capture node answers a video capture format query.
            if !caps
                .capabilities
                .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                || Capture::format(&dev).is_err()
            {
                debug!(path = %path, card = %caps.card, "Skipping non-capture node");
                continue;
            }

            info!(path = %path, card = %caps.card, driver = %caps.driver, "Found V4L2 camera");
            cameras.push(CameraDevice {
                name: caps.card.clone(),
                position: CameraPosition::from_label(&caps.card),
                path,
                device_info: Some(DeviceInfo {
                    card: caps.card,
                    driver: caps.driver,
                    bus: caps.bus,
                }),
            });
        }

        cameras.sort_by(|a, b| a.path.cmp(&b.path));
        cameras
    }

    fn open_stream(&self, device: &CameraDevice) -> BackendResult<Box<dyn FrameStream>> {
        info!(path = %device.path, "Opening V4L2 device");

        let dev = Device::with_path(&device.path)?;
        let (format, pixel_format) = negotiate_format(&dev, self.width, self.height)?;

        let stream = MmapStream::with_buffers(&dev, Type::VideoCapture, capture::V4L2_BUFFER_COUNT)
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Failed to create buffer stream: {}", e))
            })?;

        info!(
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            "V4L2 capture stream started"
        );

        Ok(Box::new(V4l2Stream {
            stream,
            _device: dev,
            width: format.width,
            height: format.height,
            stride: format.stride,
            pixel_format,
            rotation: self.rotation,
            intrinsics: self.intrinsics,
        }))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }
}

/// Try the preferred formats until the driver accepts one we can read
fn negotiate_format(dev: &Device, width: u32, height: u32) -> BackendResult<(Format, PixelFormat)> {
    for fourcc in PREFERRED_FOURCCS {
        let requested = Format::new(width, height, FourCC::new(fourcc));
        let applied = match dev.set_format(&requested) {
            Ok(applied) => applied,
            Err(e) => {
                debug!(fourcc = %FourCC::new(fourcc), error = %e, "Format rejected");
                continue;
            }
        };

        if let Some(pixel_format) = PixelFormat::from_fourcc(&applied.fourcc.repr) {
            if applied.fourcc.repr != *fourcc {
                debug!(requested = %FourCC::new(fourcc), got = %applied.fourcc, "Driver substituted format");
            }
            return Ok((applied, pixel_format));
        }
    }

    // Last resort: whatever the device is currently configured for
    let current = dev.format()?;
    match PixelFormat::from_fourcc(&current.fourcc.repr) {
        Some(pixel_format) => Ok((current, pixel_format)),
        None => Err(BackendError::FormatNotSupported(format!(
            "No readable capture format (device uses {})",
            current.fourcc
        ))),
    }
}

struct V4l2Stream {
    // Declared before the device so buffers are released first
    stream: MmapStream<'static>,
    _device: Device,
    width: u32,
    height: u32,
    stride: u32,
    pixel_format: PixelFormat,
    rotation: SensorRotation,
    intrinsics: Option<CameraIntrinsics>,
}

impl FrameStream for V4l2Stream {
    fn next_frame(&mut self) -> BackendResult<Option<CameraFrame>> {
        static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

        let captured_at = Instant::now();
        let (buf, meta) = CaptureStream::next(&mut self.stream)?;
        let frame_num = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);

        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };
        if used == 0 {
            warn!(sequence = meta.sequence, "Empty V4L2 buffer");
        }

        if frame_num % capture::FRAME_LOG_INTERVAL == 0 {
            debug!(
                frame = frame_num,
                sequence = meta.sequence,
                size = used,
                "V4L2 frame captured"
            );
        }

        let stride = if self.stride > 0 {
            self.stride
        } else {
            self.width * self.pixel_format.bytes_per_pixel()
        };

        Ok(Some(CameraFrame {
            width: self.width,
            height: self.height,
            data: Arc::from(&buf[..used]),
            format: self.pixel_format,
            stride,
            captured_at,
            sequence: Some(meta.sequence),
            rotation: self.rotation,
            intrinsics: self.intrinsics,
        }))
    }
}
