// SPDX-License-Identifier: GPL-3.0-only

//! Torch control
//!
//! The scanner can light the scene with the device torch. Access to the
//! torch goes through [`ConfigurationGuard`], which holds the device's
//! exclusive configuration lock for the duration of one change and releases
//! it when dropped, including on error paths.
//!
//! On Linux the torch is a flash LED exposed at `/sys/class/leds/*:flash`.
//! Torch mode uses the brightness file, which is group-writable by
//! `feedbackd`, so no root-only interface is needed.

use crate::constants::torch::{DEFAULT_LED_GROUP, FLASH_SUFFIX, LEDS_DIR};
use crate::errors::TorchError;
use std::fs::File;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Torch state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TorchMode {
    #[default]
    Off,
    On,
}

impl TorchMode {
    pub fn from_on(on: bool) -> Self {
        if on { TorchMode::On } else { TorchMode::Off }
    }

    pub fn is_on(&self) -> bool {
        *self == TorchMode::On
    }
}

/// Hardware side of the torch
pub trait TorchBackend: Send {
    /// Whether this device has a torch at all
    fn has_torch(&self) -> bool;

    /// Take exclusive configuration access; fails with `Busy` if held elsewhere
    fn lock_for_configuration(&mut self) -> Result<(), TorchError>;

    /// Release configuration access
    fn unlock_for_configuration(&mut self);

    /// Only valid while configuration access is held
    fn set_torch_mode(&mut self, mode: TorchMode) -> Result<(), TorchError>;
}

/// Scoped configuration access to a torch backend
pub struct ConfigurationGuard<'a> {
    backend: &'a mut dyn TorchBackend,
}

impl<'a> ConfigurationGuard<'a> {
    pub fn acquire(backend: &'a mut dyn TorchBackend) -> Result<Self, TorchError> {
        backend.lock_for_configuration()?;
        Ok(Self { backend })
    }

    pub fn set_torch_mode(&mut self, mode: TorchMode) -> Result<(), TorchError> {
        self.backend.set_torch_mode(mode)
    }
}

impl Drop for ConfigurationGuard<'_> {
    fn drop(&mut self) {
        self.backend.unlock_for_configuration();
    }
}

/// Torch toggle shared by the controller and its host
pub struct TorchControl {
    backend: Mutex<Box<dyn TorchBackend>>,
    mode: Mutex<TorchMode>,
}

impl TorchControl {
    pub fn new(backend: Box<dyn TorchBackend>) -> Self {
        Self {
            backend: Mutex::new(backend),
            mode: Mutex::new(TorchMode::Off),
        }
    }

    /// Control for a device without torch
    pub fn unavailable() -> Self {
        Self::new(Box::new(NoTorch))
    }

    /// Discover the system torch, falling back to none
    pub fn discover() -> Self {
        let hardware = FlashHardware::detect();
        if let Some(error) = &hardware.permission_error {
            warn!(%error, "Torch present but not controllable");
        }
        if hardware.has_devices() {
            Self::new(Box::new(SysfsTorch::new(hardware.devices)))
        } else {
            Self::unavailable()
        }
    }

    pub fn mode(&self) -> TorchMode {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_available(&self) -> bool {
        self.backend
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .has_torch()
    }

    /// Switch the torch on or off
    ///
    /// On failure the recorded mode is left unchanged.
    pub fn toggle(&self, on: bool) -> Result<TorchMode, TorchError> {
        let mode = TorchMode::from_on(on);
        let mut backend = self.backend.lock().unwrap_or_else(PoisonError::into_inner);

        if !backend.has_torch() {
            return Err(TorchError::Unavailable);
        }

        {
            let mut guard = ConfigurationGuard::acquire(backend.as_mut())?;
            guard.set_torch_mode(mode)?;
        }

        *self.mode.lock().unwrap_or_else(PoisonError::into_inner) = mode;
        debug!(?mode, "Torch mode set");
        Ok(mode)
    }

    /// Turn the torch off whatever the last requested state was
    pub fn force_off(&self) {
        match self.toggle(false) {
            Ok(_) | Err(TorchError::Unavailable) => {}
            Err(e) => warn!(error = %e, "Failed to turn torch off"),
        }
    }
}

impl std::fmt::Debug for TorchControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TorchControl")
            .field("mode", &self.mode())
            .finish()
    }
}

/// Backend for devices without torch
#[derive(Debug, Default)]
pub struct NoTorch;

impl TorchBackend for NoTorch {
    fn has_torch(&self) -> bool {
        false
    }

    fn lock_for_configuration(&mut self) -> Result<(), TorchError> {
        Err(TorchError::Unavailable)
    }

    fn unlock_for_configuration(&mut self) {}

    fn set_torch_mode(&mut self, _mode: TorchMode) -> Result<(), TorchError> {
        Err(TorchError::Unavailable)
    }
}

/// A flash LED device discovered via sysfs
#[derive(Debug, Clone)]
pub struct FlashDevice {
    /// Sysfs path, e.g. `/sys/class/leds/white:flash`
    path: PathBuf,
    /// Maximum brightness value (from `max_brightness` file)
    max_brightness: u32,
    /// Directory basename
    name: String,
}

impl FlashDevice {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn brightness_path(&self) -> PathBuf {
        self.path.join("brightness")
    }

    /// Set raw brightness value (0 = off, max_brightness = full)
    pub fn set_brightness(&self, value: u32) -> io::Result<()> {
        let clamped = value.min(self.max_brightness);
        std::fs::write(self.brightness_path(), clamped.to_string())
    }

    pub fn off(&self) -> io::Result<()> {
        self.set_brightness(0)
    }

    /// Turn on at a fraction of max brightness (0.0 = off, 1.0 = full)
    pub fn torch(&self, intensity: f32) -> io::Result<()> {
        let clamped = intensity.clamp(0.0, 1.0);
        let value = (clamped * self.max_brightness as f32).round() as u32;
        self.set_brightness(value)
    }
}

/// Result of flash LED detection.
///
/// Separates "hardware exists" from "we can control it" so a permission
/// problem can be reported instead of silently treating the torch as absent.
pub struct FlashHardware {
    /// Devices we can actually control (writable)
    pub devices: Vec<FlashDevice>,
    /// User-facing error if hardware was found but not writable
    pub permission_error: Option<String>,
}

impl FlashHardware {
    /// Scan `/sys/class/leds/` for `*:flash` entries
    pub fn detect() -> FlashHardware {
        Self::detect_in(Path::new(LEDS_DIR))
    }

    pub fn detect_in(leds_dir: &Path) -> FlashHardware {
        let Ok(entries) = std::fs::read_dir(leds_dir) else {
            debug!(dir = %leds_dir.display(), "Cannot read LED class directory");
            return FlashHardware {
                devices: Vec::new(),
                permission_error: None,
            };
        };

        let mut devices = Vec::new();
        let mut permission_failures: Vec<PathBuf> = Vec::new();

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name_str) = name.to_str() else {
                continue;
            };

            if !name_str.ends_with(FLASH_SUFFIX) {
                continue;
            }

            let led_path = entry.path();
            let brightness_path = led_path.join("brightness");
            let max_brightness_path = led_path.join("max_brightness");

            let max_brightness = match std::fs::read_to_string(&max_brightness_path) {
                Ok(s) => match s.trim().parse::<u32>() {
                    Ok(v) if v > 0 => v,
                    _ => {
                        warn!(path = %max_brightness_path.display(), "Invalid max_brightness value");
                        continue;
                    }
                },
                Err(e) => {
                    warn!(
                        path = %max_brightness_path.display(),
                        error = %e,
                        "Cannot read max_brightness"
                    );
                    continue;
                }
            };

            match std::fs::OpenOptions::new()
                .write(true)
                .open(&brightness_path)
            {
                Ok(_) => {
                    info!(name = name_str, max_brightness, "Discovered flash LED");
                    devices.push(FlashDevice {
                        path: led_path,
                        max_brightness,
                        name: name_str.to_string(),
                    });
                }
                Err(_) => {
                    warn!(path = %brightness_path.display(), "Flash LED found but not writable");
                    permission_failures.push(brightness_path);
                }
            }
        }

        // Deterministic ordering (white before yellow)
        devices.sort_by(|a, b| a.name.cmp(&b.name));

        let permission_error = if !permission_failures.is_empty() && devices.is_empty() {
            Some(Self::build_permission_error(&permission_failures))
        } else {
            None
        };

        FlashHardware {
            devices,
            permission_error,
        }
    }

    pub fn has_devices(&self) -> bool {
        !self.devices.is_empty()
    }

    /// Tell the user which group to join, resolved from the file's owner gid
    fn build_permission_error(failures: &[PathBuf]) -> String {
        let username = std::env::var("USER").unwrap_or_else(|_| "user".to_string());

        let escalation_tool = if Path::new("/usr/bin/doas").exists() {
            "doas"
        } else {
            "sudo"
        };

        let group = failures
            .first()
            .and_then(|path| {
                let gid = std::fs::metadata(path).ok()?.gid();
                let groups = std::fs::read_to_string("/etc/group").ok()?;
                groups.lines().find_map(|line| {
                    let parts: Vec<&str> = line.split(':').collect();
                    (parts.len() >= 3 && parts[2].parse::<u32>().ok() == Some(gid))
                        .then(|| parts[0].to_string())
                })
            })
            .unwrap_or_else(|| DEFAULT_LED_GROUP.to_string());

        format!(
            "Flash LEDs detected but cannot be controlled.\n\n\
             Run: {escalation_tool} adduser {username} {group}\n\n\
             Then log out and back in."
        )
    }
}

/// Torch made of one or more sysfs flash LEDs
///
/// Configuration access is an exclusive `flock` on every brightness file,
/// so two scanners (or a scanner and a camera app) cannot fight over it.
pub struct SysfsTorch {
    devices: Vec<FlashDevice>,
    locks: Vec<File>,
}

impl SysfsTorch {
    pub fn new(devices: Vec<FlashDevice>) -> Self {
        Self {
            devices,
            locks: Vec::new(),
        }
    }
}

impl TorchBackend for SysfsTorch {
    fn has_torch(&self) -> bool {
        !self.devices.is_empty()
    }

    fn lock_for_configuration(&mut self) -> Result<(), TorchError> {
        let mut locks = Vec::with_capacity(self.devices.len());
        for dev in &self.devices {
            let file = std::fs::OpenOptions::new()
                .write(true)
                .open(dev.brightness_path())?;
            let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
            if result != 0 {
                let err = io::Error::last_os_error();
                // Already-taken locks in `locks` are released when it drops
                return Err(if err.kind() == io::ErrorKind::WouldBlock {
                    TorchError::Busy
                } else {
                    TorchError::ConfigurationFailed(err.to_string())
                });
            }
            locks.push(file);
        }
        self.locks = locks;
        Ok(())
    }

    fn unlock_for_configuration(&mut self) {
        // Closing the descriptors releases the flocks
        self.locks.clear();
    }

    fn set_torch_mode(&mut self, mode: TorchMode) -> Result<(), TorchError> {
        if self.locks.is_empty() {
            return Err(TorchError::ConfigurationFailed(
                "configuration lock not held".to_string(),
            ));
        }
        for dev in &self.devices {
            let result = match mode {
                TorchMode::On => dev.torch(1.0),
                TorchMode::Off => dev.off(),
            };
            if let Err(e) = result {
                warn!(device = %dev.name, error = %e, "Failed to set flash LED");
                return Err(e.into());
            }
        }
        Ok(())
    }
}
