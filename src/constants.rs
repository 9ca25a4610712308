// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use crate::app::frame_processor::Symbology;
use std::time::Duration;

/// Symbologies requested from the detector unless configured otherwise
pub const DEFAULT_SYMBOLOGIES: [Symbology; 5] = [
    Symbology::Qr,
    Symbology::Code39,
    Symbology::DataMatrix,
    Symbology::Aztec,
    Symbology::Code128,
];

/// Capture loop tuning
pub mod capture {
    use super::Duration;

    /// Pause after a failed frame read before retrying
    pub const RETRY_DELAY: Duration = Duration::from_millis(10);

    /// Consecutive read failures after which the device is given up
    pub const MAX_CONSECUTIVE_ERRORS: u32 = 30;

    /// Log every Nth frame at debug level
    pub const FRAME_LOG_INTERVAL: u64 = 60;

    /// Memory-mapped buffers requested from V4L2
    pub const V4L2_BUFFER_COUNT: u32 = 4;

    /// Requested capture size; drivers pick the closest they support
    pub const DEFAULT_WIDTH: u32 = 1280;
    pub const DEFAULT_HEIGHT: u32 = 720;
}

/// Detector tuning
pub mod detector {
    /// Frames are downscaled so their longest side is at most this
    pub const DEFAULT_MAX_DIMENSION: u32 = 640;

    /// Half height of the band drawn around a linear code's scan line,
    /// as a fraction of the frame height
    pub const LINEAR_BAND_HALF_HEIGHT: f32 = 0.05;
}

/// Buffer queue tuning
pub mod dispatch {
    /// Worker threads running the detector concurrently
    pub const DEFAULT_WORKERS: usize = 2;

    /// Thread name prefix for buffer queue workers
    pub const THREAD_NAME: &str = "buffer-queue";
}

/// Overlay drawing defaults
pub mod overlay {
    /// Stroke colour (RGBA), blue
    pub const STROKE_COLOR: [u8; 4] = [0, 0, 255, 255];

    /// Stroke width in view units
    pub const LINE_WIDTH: f32 = 1.0;

    /// View size used when none is configured
    pub const DEFAULT_VIEW_WIDTH: f32 = 1280.0;
    pub const DEFAULT_VIEW_HEIGHT: f32 = 720.0;
}

/// Torch LED discovery
pub mod torch {
    /// Sysfs class directory holding LED devices
    pub const LEDS_DIR: &str = "/sys/class/leds";

    /// Suffix of flash LED entries, e.g. `white:flash`
    pub const FLASH_SUFFIX: &str = ":flash";

    /// Group that usually owns LED brightness files
    pub const DEFAULT_LED_GROUP: &str = "feedbackd";
}

/// Supported file formats for the image file source
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "pgm"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Application information utilities
pub mod app_info {
    /// Directory name used under the user's config dir
    pub const APP_DIR: &str = "barcode-scanner";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
