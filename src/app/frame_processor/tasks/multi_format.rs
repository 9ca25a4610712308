// SPDX-License-Identifier: GPL-3.0-only

//! Linear and 2D matrix barcode detection task
//!
//! Wraps rxing for Code39, Code128, DataMatrix and Aztec. QR codes are left
//! to [`QrDetector`](super::QrDetector) even though rxing would find them too.
//!
//! rxing reports a single scan line for linear codes. Those outlines are
//! widened into a band so the overlay still draws a box.

use super::{DetectionRequest, Detector, downscale};
use crate::app::frame_processor::types::{NormalizedPoint, Observation, Symbology};
use crate::constants::detector::{DEFAULT_MAX_DIMENSION, LINEAR_BAND_HALF_HEIGHT};
use crate::errors::DetectorError;
use rxing::{BarcodeFormat, Exceptions, RXingResult};
use tracing::{debug, trace};

const SUPPORTED: [Symbology; 4] = [
    Symbology::Code39,
    Symbology::Code128,
    Symbology::DataMatrix,
    Symbology::Aztec,
];

fn symbology_of(format: &BarcodeFormat) -> Option<Symbology> {
    match format {
        BarcodeFormat::CODE_39 => Some(Symbology::Code39),
        BarcodeFormat::CODE_128 => Some(Symbology::Code128),
        BarcodeFormat::DATA_MATRIX => Some(Symbology::DataMatrix),
        BarcodeFormat::AZTEC => Some(Symbology::Aztec),
        _ => None,
    }
}

/// Code39, Code128, DataMatrix and Aztec detector
#[derive(Debug, Clone)]
pub struct MultiFormatDetector {
    max_dimension: u32,
}

impl Default for MultiFormatDetector {
    fn default() -> Self {
        Self::with_max_dimension(DEFAULT_MAX_DIMENSION)
    }
}

impl MultiFormatDetector {
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }
}

impl Detector for MultiFormatDetector {
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

        let results = match rxing::helpers::detect_multiple_in_luma(
            image.into_owned().into_raw(),
            proc_width,
            proc_height,
        ) {
            Ok(results) => results,
            Err(Exceptions::NotFoundException(_)) => Vec::new(),
            Err(e) => return Err(DetectorError::Failed(format!("{:?}", e))),
        };

        trace!(
            proc_width,
            proc_height,
            results = results.len(),
            detection_ms = start.elapsed().as_millis(),
            "Multi-format detection complete"
        );

        let observations: Vec<Observation> = results
            .iter()
            .filter_map(|result| {
                let symbology = symbology_of(result.getBarcodeFormat())?;
                if !request.symbologies.contains(&symbology) {
                    return None;
                }
                Some(observation(result, symbology, proc_width, proc_height, request))
            })
            .collect();

        if !observations.is_empty() {
            debug!(
                count = observations.len(),
                total_ms = start.elapsed().as_millis(),
                "Multi-format detection found codes"
            );
        }

        Ok(observations)
    }
}

/// Axis-aligned outline around the points rxing reported
fn observation(
    result: &RXingResult,
    symbology: Symbology,
    width: u32,
    height: u32,
    request: &DetectionRequest<'_>,
) -> Observation {
    let (width, height) = (width as f32, height as f32);
    let points = result.getPoints();

    let mut min_x = width;
    let mut min_y = height;
    let mut max_x = 0.0f32;
    let mut max_y = 0.0f32;
    for point in points.iter() {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    if points.is_empty() {
        (min_x, min_y, max_x, max_y) = (0.0, 0.0, width, height);
    }

    let band = LINEAR_BAND_HALF_HEIGHT * height;
    if max_y - min_y < band {
        let center = (min_y + max_y) / 2.0;
        min_y = center - band;
        max_y = center + band;
    }

    let normalize = |x: f32, y: f32| {
        let nx = (x / width).clamp(0.0, 1.0);
        let ny = (y / height).clamp(0.0, 1.0);
        let (ux, uy) = request.rotation.apply(nx, ny);
        NormalizedPoint::from_top_left(ux, uy)
    };

    Observation {
        symbology,
        top_left: normalize(min_x, min_y),
        top_right: normalize(max_x, min_y),
        bottom_right: normalize(max_x, max_y),
        bottom_left: normalize(min_x, max_y),
        payload: Some(result.getText().to_string()),
        descriptor: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::SensorRotation;
    use image::{GrayImage, Luma};
    use rxing::{MultiFormatWriter, Writer};

    const PADDING: u32 = 20;

    /// Render `payload` with rxing's own encoder on a white margin
    fn render(payload: &str, format: BarcodeFormat, width: i32, height: i32) -> GrayImage {
        let matrix = MultiFormatWriter::default()
            .encode(payload, &format, width, height)
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

    fn request<'a>(image: &'a GrayImage, symbologies: &'a [Symbology]) -> DetectionRequest<'a> {
        DetectionRequest {
            image,
            symbologies,
            rotation: SensorRotation::None,
            intrinsics: None,
        }
    }

    #[test]
    fn test_supports_everything_but_qr() {
        let supported = MultiFormatDetector::default().supported_symbologies().to_vec();
        assert!(!supported.contains(&Symbology::Qr));
        assert_eq!(supported.len(), 4);
    }

    #[test]
    fn test_blank_frame_has_no_observations() {
        let image = GrayImage::from_pixel(320, 240, Luma([255]));
        let found = MultiFormatDetector::default()
            .detect(&request(&image, &SUPPORTED))
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_decodes_code128() {
        let image = render("SCAN-128", BarcodeFormat::CODE_128, 400, 80);
        let found = MultiFormatDetector::default()
            .detect(&request(&image, &[Symbology::Code128]))
            .unwrap();
        assert_eq!(found.len(), 1);

        let code = &found[0];
        assert_eq!(code.symbology, Symbology::Code128);
        assert_eq!(code.text(), Some("SCAN-128"));
        assert!(code.top_left.x < code.top_right.x);
        // A scan line alone would have no height
        assert!(code.top_left.y - code.bottom_left.y >= LINEAR_BAND_HALF_HEIGHT);
    }

    #[test]
    fn test_unrequested_formats_are_filtered() {
        let image = render("SCAN-128", BarcodeFormat::CODE_128, 400, 80);
        let found = MultiFormatDetector::default()
            .detect(&request(&image, &[Symbology::Aztec, Symbology::Qr]))
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_qr_only_request_is_skipped() {
        let image = GrayImage::new(0, 0);
        // Not even the empty image is looked at
        let found = MultiFormatDetector::default()
            .detect(&request(&image, &[Symbology::Qr]))
            .unwrap();
        assert!(found.is_empty());
    }
}
