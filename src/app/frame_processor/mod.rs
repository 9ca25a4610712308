// SPDX-License-Identifier: GPL-3.0-only

//! Frame analysis
//!
//! Types describing what a detector found in a frame, the [`Detector`]
//! trait, the rqrr-backed QR detector and the rxing-backed detector for
//! the other symbologies.

pub mod tasks;
pub mod types;

pub use tasks::{CompositeDetector, DetectionRequest, Detector, MultiFormatDetector, QrDetector};
pub use types::{EccLevel, NormalizedPoint, Observation, QrDescriptor, Symbology};
