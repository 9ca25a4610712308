// SPDX-License-Identifier: GPL-3.0-only

//! Luma extraction from camera frames
//!
//! Barcode detection only needs brightness, so every supported pixel format
//! is reduced to an 8-bit [`GrayImage`]. YUV formats already carry luma in
//! their Y samples and are copied without any colour math.

use super::types::{CameraFrame, PixelFormat};
use crate::errors::FrameError;
use image::{GrayImage, ImageFormat};

/// Extract an 8-bit luma image from a frame
pub fn frame_to_luma(frame: &CameraFrame) -> Result<GrayImage, FrameError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(FrameError::Empty);
    }

    match frame.format {
        PixelFormat::Mjpeg => decode_mjpeg(frame),
        PixelFormat::Gray8 | PixelFormat::Nv12 => copy_plane(frame, 1, |px| px[0]),
        PixelFormat::Yuyv => yuyv_to_luma(frame),
        PixelFormat::Rgba => copy_plane(frame, 4, |px| rgb_luma(px[0], px[1], px[2])),
        PixelFormat::Bgra => copy_plane(frame, 4, |px| rgb_luma(px[2], px[1], px[0])),
        PixelFormat::Rgb24 => copy_plane(frame, 3, |px| rgb_luma(px[0], px[1], px[2])),
    }
}

/// BT.601 luma with integer weights
#[inline]
fn rgb_luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

/// Check that `height` rows of `row_bytes` fit the buffer at `stride`
fn check_len(frame: &CameraFrame, row_bytes: usize) -> Result<(), FrameError> {
    let stride = frame.stride as usize;
    let height = frame.height as usize;
    let expected = stride * (height - 1) + row_bytes;
    if stride < row_bytes || frame.data.len() < expected {
        return Err(FrameError::Truncated {
            expected,
            actual: frame.data.len(),
        });
    }
    Ok(())
}

/// Reduce a packed first plane to luma, skipping stride padding
fn copy_plane(
    frame: &CameraFrame,
    bytes_per_pixel: usize,
    luma: impl Fn(&[u8]) -> u8,
) -> Result<GrayImage, FrameError> {
    let width = frame.width as usize;
    let stride = frame.stride as usize;
    check_len(frame, width * bytes_per_pixel)?;

    let mut out = Vec::with_capacity(width * frame.height as usize);
    for y in 0..frame.height as usize {
        let row = &frame.data[y * stride..y * stride + width * bytes_per_pixel];
        out.extend(row.chunks_exact(bytes_per_pixel).map(&luma));
    }

    GrayImage::from_raw(frame.width, frame.height, out).ok_or(FrameError::Empty)
}

/// YUYV carries two pixels per 4 bytes: Y0 U Y1 V
fn yuyv_to_luma(frame: &CameraFrame) -> Result<GrayImage, FrameError> {
    let width = frame.width as usize;
    let stride = frame.stride as usize;
    check_len(frame, width * 2)?;

    let mut out = Vec::with_capacity(width * frame.height as usize);
    for y in 0..frame.height as usize {
        let row = &frame.data[y * stride..y * stride + width * 2];
        out.extend(row.iter().step_by(2).copied());
    }

    GrayImage::from_raw(frame.width, frame.height, out).ok_or(FrameError::Empty)
}

fn decode_mjpeg(frame: &CameraFrame) -> Result<GrayImage, FrameError> {
    image::load_from_memory_with_format(&frame.data, ImageFormat::Jpeg)
        .map(|img| img.to_luma8())
        .map_err(|e| FrameError::DecodeFailed(e.to_string()))
}
