// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{error::Error, fmt, sync::Arc};

use crate::config;
use crate::samples::LoadedSample;

pub mod cpal;
pub mod format;
pub mod gain;
pub mod mixer;
pub mod mock;
mod thread_priority;

pub use format::{SampleFormat, TargetFormat};
pub use gain::{Gain, DEFAULT_RAMP_TIME};
pub use mixer::{SourceError, SourceHandle};

/// The lifecycle state of an audio output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    /// Output is paused. Devices start in this state until a user gesture unlocks them.
    Suspended,
    /// Output is rendering.
    Running,
    /// Output is unavailable and can't be resumed.
    Closed,
}

impl fmt::Display for OutputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            OutputState::Suspended => "suspended",
            OutputState::Running => "running",
            OutputState::Closed => "closed",
        };
        write!(f, "{}", state)
    }
}

/// Errors from the audio output.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("audio output is closed")]
    Closed,

    #[error("audio output stream error: {0}")]
    Stream(String),
}

/// An audio output: the shared destination every drone plays through.
pub trait Device: fmt::Display + Send + Sync {
    /// Returns the current state of the output.
    fn state(&self) -> OutputState;

    /// Resumes a suspended output. Does nothing if the output is already running.
    fn resume(&self) -> Result<(), AudioError>;

    /// Suspends a running output. Does nothing if the output is already suspended.
    fn suspend(&self) -> Result<(), AudioError>;

    /// Starts looping the sample through the shared gain.
    fn start_source(&self, sample: LoadedSample) -> Result<SourceHandle, AudioError>;

    /// Returns the shared gain all sources pass through.
    fn gain(&self) -> Arc<Gain>;

    /// Returns the output sample rate.
    fn sample_rate(&self) -> u32;
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::DeviceInfo>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a device with the given configuration. Device names starting with "mock"
/// produce a mock device that needs no audio hardware.
pub fn get_device(config: Option<config::Audio>) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let config = match config {
        Some(config) => config,
        None => return Err("there must be an audio device specified".into()),
    };

    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::from_config(&config)?));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
