// SPDX-License-Identifier: GPL-3.0-only

//! Detector abstraction and implementations
//!
//! A detector is a black box: one call, one frame, no state carried between
//! frames and no ordering guarantee among the observations it returns.

pub mod multi_format;
pub mod qr_detector;

pub use multi_format::MultiFormatDetector;
pub use qr_detector::QrDetector;

use super::types::{Observation, Symbology};
use crate::backends::camera::types::{CameraIntrinsics, SensorRotation};
use crate::errors::DetectorError;
use image::GrayImage;
use image::imageops::{self, FilterType};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::warn;

/// Everything a detector gets for one frame
#[derive(Debug, Clone, Copy)]
pub struct DetectionRequest<'a> {
    /// Luma of the frame as delivered by the sensor (not rotated)
    pub image: &'a GrayImage,
    /// Symbologies the caller is interested in
    pub symbologies: &'a [Symbology],
    /// Rotation that makes the sensor image upright
    pub rotation: SensorRotation,
    pub intrinsics: Option<CameraIntrinsics>,
}

impl DetectionRequest<'_> {
    /// Whether any symbology in `supported` was asked for
    pub fn wants_any(&self, supported: &[Symbology]) -> bool {
        supported.iter().any(|s| self.symbologies.contains(s))
    }
}

/// Barcode detector
pub trait Detector: Send + Sync {
    /// Symbologies this detector can locate and decode
    fn supported_symbologies(&self) -> &[Symbology];

    /// Locate and decode symbols in one frame
    ///
    /// Corners must be normalized to the upright image with a bottom-left origin.
    fn detect(&self, request: &DetectionRequest<'_>) -> Result<Vec<Observation>, DetectorError>;
}

/// Several detectors run one after the other on the same frame
///
/// Each one is only invoked when the request asks for a symbology it
/// supports. A failing detector is logged and skipped; the frame fails only
/// when every invoked detector failed.
pub struct CompositeDetector {
    detectors: Vec<Arc<dyn Detector>>,
    supported: Vec<Symbology>,
}

impl CompositeDetector {
    pub fn new(detectors: Vec<Arc<dyn Detector>>) -> Self {
        let mut supported: Vec<Symbology> = Vec::new();
        for symbology in detectors.iter().flat_map(|d| d.supported_symbologies()) {
            if !supported.contains(symbology) {
                supported.push(*symbology);
            }
        }
        Self {
            detectors,
            supported,
        }
    }

    /// rqrr for QR codes, rxing for everything else
    pub fn standard(max_dimension: u32) -> Self {
        let qr: Arc<dyn Detector> = Arc::new(QrDetector::with_max_dimension(max_dimension));
        let others: Arc<dyn Detector> =
            Arc::new(MultiFormatDetector::with_max_dimension(max_dimension));
        Self::new(vec![qr, others])
    }
}

impl Detector for CompositeDetector {
    fn supported_symbologies(&self) -> &[Symbology] {
        &self.supported
    }

    fn detect(&self, request: &DetectionRequest<'_>) -> Result<Vec<Observation>, DetectorError> {
        let mut observations = Vec::new();
        let mut first_error = None;
        let mut succeeded = false;

        for detector in &self.detectors {
            if !request.wants_any(detector.supported_symbologies()) {
                continue;
            }
            match detector.detect(request) {
                Ok(found) => {
                    succeeded = true;
                    observations.extend(found);
                }
                Err(e) => {
                    warn!(error = %e, "Detector failed on frame");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if !succeeded => Err(e),
            _ => Ok(observations),
        }
    }
}

/// Downscale so the longest side fits `max_dimension`
pub(crate) fn downscale(image: &GrayImage, max_dimension: u32) -> Cow<'_, GrayImage> {
    let (width, height) = image.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return Cow::Borrowed(image);
    }

    let scale =
        (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
    let new_width = ((width as f32 / scale) as u32).max(1);
    let new_height = ((height as f32 / scale) as u32).max(1);
    Cow::Owned(imageops::resize(
        image,
        new_width,
        new_height,
        FilterType::Triangle,
    ))
}
