// SPDX-License-Identifier: GPL-3.0-only

//! Core types for frame processing results
//!
//! These types represent the output of detectors and are used throughout
//! the scanner for reporting payloads and rendering overlays.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Barcode standard a detector can be asked to recognise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbology {
    Qr,
    Code39,
    DataMatrix,
    Aztec,
    Code128,
}

impl Symbology {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Qr => "qr",
            Self::Code39 => "code39",
            Self::DataMatrix => "datamatrix",
            Self::Aztec => "aztec",
            Self::Code128 => "code128",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Symbology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "qr" | "qrcode" => Ok(Self::Qr),
            "code39" => Ok(Self::Code39),
            "datamatrix" => Ok(Self::DataMatrix),
            "aztec" => Ok(Self::Aztec),
            "code128" => Ok(Self::Code128),
            other => Err(format!("unknown symbology: {}", other)),
        }
    }
}

/// A point in normalized image coordinates
///
/// Both axes run from 0.0 to 1.0 with the origin at the **bottom-left** of
/// the upright image, so `y` grows upwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Convert from top-left-origin normalized coordinates
    pub fn from_top_left(x: f32, y: f32) -> Self {
        Self { x, y: 1.0 - y }
    }
}

/// Symbol metadata a QR decoder reports next to the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrDescriptor {
    /// Symbol version (1-40)
    pub version: usize,
    /// Error correction level
    pub ecc_level: EccLevel,
    /// Data mask pattern (0-7)
    pub mask: u16,
}

/// QR error correction level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EccLevel {
    L,
    M,
    Q,
    H,
}

impl EccLevel {
    /// Decode the two format-information bits
    pub fn from_format_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0b01 => Self::L,
            0b00 => Self::M,
            0b11 => Self::Q,
            _ => Self::H,
        }
    }
}

/// One located barcode in a single frame
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub symbology: Symbology,
    pub top_left: NormalizedPoint,
    pub top_right: NormalizedPoint,
    pub bottom_right: NormalizedPoint,
    pub bottom_left: NormalizedPoint,
    /// Decoded text, `None` when the symbol was located but not decodable
    pub payload: Option<String>,
    pub descriptor: Option<QrDescriptor>,
}

impl Observation {
    /// Corners in drawing order: TL, TR, BR, BL
    pub fn corners(&self) -> [NormalizedPoint; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Decoded payload, if it carries any text
    pub fn text(&self) -> Option<&str> {
        self.payload.as_deref().filter(|p| !p.is_empty())
    }
}
