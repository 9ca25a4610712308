// SPDX-License-Identifier: GPL-3.0-only

//! Barcode scanner
//!
//! Opens a camera, runs every frame through a barcode detector, outlines
//! what it finds and reports the first decoded payload to its host.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Scanner controller, frame dispatch, detection and overlay
//! - [`backends`]: Camera backend abstraction
//! - [`torch`]: Torch (flash LED) control
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let (observer, mut events) = ChannelObserver::new();
//! let scanner = Scanner::builder(Config::load()?).build(Arc::new(observer));
//! scanner.load();
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod torch;

// Re-export commonly used types
pub use app::{
    ChannelObserver, ControllerState, Observation, ScanEvent, ScanFailure, ScanObserver, Scanner,
    Symbology,
};
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use torch::{TorchControl, TorchMode};
