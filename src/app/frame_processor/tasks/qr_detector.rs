// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection task
//!
//! Wraps the rqrr decoder. Frames are downscaled before detection, and the
//! corners rqrr reports are mapped back into normalized upright coordinates.

use super::{DetectionRequest, Detector, downscale};
use crate::app::frame_processor::types::{
    EccLevel, NormalizedPoint, Observation, QrDescriptor, Symbology,
};
use crate::constants::detector::DEFAULT_MAX_DIMENSION;
use crate::errors::DetectorError;
use tracing::{debug, trace};

const SUPPORTED: [Symbology; 1] = [Symbology::Qr];

/// QR code detector
///
/// Optimized for real-time processing with frame downscaling.
#[derive(Debug, Clone)]
pub struct QrDetector {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for QrDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDetector {
    pub fn new() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Create a QR detector with custom max dimension
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }
}

impl Detector for QrDetector {
    fn supported_symbologies(&self) -> &[Symbology] {
        &SUPPORTED
    }

    fn detect(&self, request: &DetectionRequest<'_>) -> Result<Vec<Observation>, DetectorError> {
        if !request.wants_any(&SUPPORTED) {
            return Ok(Vec::new());
        }

        let (width, height) = request.image.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectorError::InvalidImage(format!(
                "{}x{} image",
                width, height
            )));
        }

        let start = std::time::Instant::now();
        let image = downscale(request.image, self.max_dimension);
        let (proc_width, proc_height) = image.dimensions();

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            proc_width as usize,
            proc_height as usize,
            |x, y| image.get_pixel(x as u32, y as u32)[0],
        );
        let grids = prepared.detect_grids();

        trace!(
            proc_width,
            proc_height,
            grids = grids.len(),
            intrinsics = request.intrinsics.is_some(),
            detection_ms = start.elapsed().as_millis(),
            "QR grid detection complete"
        );

        let normalize = |x: i32, y: i32| {
            let nx = (x as f32 / proc_width as f32).clamp(0.0, 1.0);
            let ny = (y as f32 / proc_height as f32).clamp(0.0, 1.0);
            let (ux, uy) = request.rotation.apply(nx, ny);
            NormalizedPoint::from_top_left(ux, uy)
        };

        let mut observations = Vec::with_capacity(grids.len());
        for grid in &grids {
            // rqrr reports corners clockwise from the symbol's top-left
            let [tl, tr, br, bl] = &grid.bounds;

            let (payload, descriptor) = match grid.decode() {
                Ok((meta, content)) => (
                    Some(content),
                    Some(QrDescriptor {
                        version: meta.version.0,
                        ecc_level: EccLevel::from_format_bits(meta.ecc_level),
                        mask: meta.mask,
                    }),
                ),
                Err(e) => {
                    debug!(error = ?e, "QR code located but not decodable");
                    (None, None)
                }
            };

            observations.push(Observation {
                symbology: Symbology::Qr,
                top_left: normalize(tl.x, tl.y),
                top_right: normalize(tr.x, tr.y),
                bottom_right: normalize(br.x, br.y),
                bottom_left: normalize(bl.x, bl.y),
                payload,
                descriptor,
            });
        }

        if !observations.is_empty() {
            debug!(
                count = observations.len(),
                total_ms = start.elapsed().as_millis(),
                "QR detection found codes"
            );
        }

        Ok(observations)
    }
}
