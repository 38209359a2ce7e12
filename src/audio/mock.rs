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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{mixer::AudioMixer, AudioError, Gain, OutputState, SourceHandle, TargetFormat};
use crate::{audio::DEFAULT_RAMP_TIME, config, samples::LoadedSample};

/// A mock device. Doesn't touch any hardware; audio is only rendered when asked for.
pub struct Device {
    name: String,
    mixer: AudioMixer,
    state: Mutex<OutputState>,
    resumes: AtomicUsize,
    suspends: AtomicUsize,
}

impl Device {
    /// Gets the given mock device with the default output format.
    pub fn get(name: &str) -> Device {
        let format = TargetFormat::default();
        Device::new(name, format.channels, format.sample_rate, DEFAULT_RAMP_TIME)
    }

    /// Gets a mock device using the output format from the configuration.
    pub fn from_config(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let format = config.target_format()?;
        Ok(Device::new(
            config.device(),
            format.channels,
            format.sample_rate,
            config.ramp_time()?,
        ))
    }

    fn new(name: &str, channels: u16, sample_rate: u32, ramp_time: std::time::Duration) -> Device {
        Device {
            name: name.to_string(),
            mixer: AudioMixer::new(channels, sample_rate, Arc::new(Gain::new(1.0)), ramp_time),
            state: Mutex::new(OutputState::Suspended),
            resumes: AtomicUsize::new(0),
            suspends: AtomicUsize::new(0),
        }
    }

    /// Renders the given number of frames. A device that isn't running renders silence
    /// and doesn't advance its sources.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        if *self.state.lock() != OutputState::Running {
            return vec![0.0; frames * self.mixer.num_channels() as usize];
        }
        self.mixer.process_frames(frames)
    }

    /// Closes the device. It can't be resumed afterwards.
    pub fn close(&self) {
        *self.state.lock() = OutputState::Closed;
    }

    /// Returns the IDs of the sources that are still playing.
    pub fn active_sources(&self) -> Vec<u64> {
        self.mixer.active_sources()
    }

    /// Returns the level applied to the last rendered frame.
    pub fn current_level(&self) -> f32 {
        self.mixer.current_level()
    }

    /// Number of times the device went from suspended to running.
    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::Relaxed)
    }

    /// Number of times the device went from running to suspended.
    pub fn suspend_count(&self) -> usize {
        self.suspends.load(Ordering::Relaxed)
    }
}

impl super::Device for Device {
    fn state(&self) -> OutputState {
        *self.state.lock()
    }

    fn resume(&self) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        match *state {
            OutputState::Closed => Err(AudioError::Closed),
            OutputState::Running => Ok(()),
            OutputState::Suspended => {
                info!(device = self.name, "Resuming output (mock).");
                *state = OutputState::Running;
                self.resumes.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    fn suspend(&self) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        match *state {
            OutputState::Closed => Err(AudioError::Closed),
            OutputState::Suspended => Ok(()),
            OutputState::Running => {
                info!(device = self.name, "Suspending output (mock).");
                *state = OutputState::Suspended;
                self.suspends.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    fn start_source(&self, sample: LoadedSample) -> Result<SourceHandle, AudioError> {
        if *self.state.lock() == OutputState::Closed {
            return Err(AudioError::Closed);
        }
        let handle = self.mixer.start(sample);
        debug!(device = self.name, source = handle.id(), "Started source (mock).");
        Ok(handle)
    }

    fn gain(&self) -> Arc<Gain> {
        self.mixer.gain()
    }

    fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::Device as _;

    #[test]
    fn test_starts_suspended() {
        let device = Device::get("mock-device");
        assert_eq!(OutputState::Suspended, device.state());
        assert_eq!("mock-device (Mock)", device.to_string());
    }

    #[test]
    fn test_renders_only_while_running() -> Result<(), Box<dyn Error>> {
        let device = Device::get("mock-device");
        device.gain().reset(1.0);
        device.start_source(LoadedSample::new(vec![0.5], 1, 44100))?;

        assert_eq!(vec![0.0; 4], device.render(2));
        device.resume()?;
        assert_eq!(vec![0.5; 4], device.render(2));
        device.suspend()?;
        assert_eq!(vec![0.0; 4], device.render(2));

        assert_eq!(1, device.resume_count());
        assert_eq!(1, device.suspend_count());
        Ok(())
    }

    #[test]
    fn test_redundant_transitions_are_ignored() -> Result<(), Box<dyn Error>> {
        let device = Device::get("mock-device");
        device.suspend()?;
        device.resume()?;
        device.resume()?;
        assert_eq!(1, device.resume_count());
        assert_eq!(0, device.suspend_count());
        Ok(())
    }

    #[test]
    fn test_closed_device() {
        let device = Device::get("mock-device");
        device.close();
        assert_eq!(OutputState::Closed, device.state());
        assert!(matches!(device.resume(), Err(AudioError::Closed)));
        assert!(matches!(device.suspend(), Err(AudioError::Closed)));
        assert!(matches!(
            device.start_source(LoadedSample::new(vec![0.5], 1, 44100)),
            Err(AudioError::Closed)
        ));
    }

    #[test]
    fn test_from_config() -> Result<(), Box<dyn Error>> {
        let device = Device::from_config(&config::Audio::new("mock-config"))?;
        assert_eq!(44100, device.sample_rate());
        assert_eq!(vec![0.0; 4], device.render(2));
        Ok(())
    }
}
