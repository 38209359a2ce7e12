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
use std::{error::Error, str::FromStr, time::Duration};

use duration_string::DurationString;
use serde::Deserialize;

use crate::audio::{SampleFormat, TargetFormat, DEFAULT_RAMP_TIME};

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_BITS_PER_SAMPLE: u16 = 32;
const DEFAULT_CHANNELS: u16 = 2;

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Audio {
    /// The audio device.
    device: String,

    /// Output sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Output sample format (default: "float")
    sample_format: Option<String>,

    /// Output bits per sample (default: 32)
    bits_per_sample: Option<u16>,

    /// Number of output channels (default: 2). Limited to what the device supports.
    channels: Option<u16>,

    /// Time constant of the volume ramp, e.g. "10ms" (default: 10ms)
    ramp_time: Option<String>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            sample_rate: None,
            sample_format: None,
            bits_per_sample: None,
            channels: None,
            ramp_time: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the output sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the output sample format (default: Float)
    pub fn sample_format(&self) -> Result<SampleFormat, Box<dyn Error>> {
        match self.sample_format.as_deref() {
            Some(format) => SampleFormat::from_str(format),
            None => Ok(SampleFormat::Float),
        }
    }

    /// Returns the output bits per sample (default: 32)
    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample.unwrap_or(DEFAULT_BITS_PER_SAMPLE)
    }

    /// Returns the requested number of output channels (default: 2)
    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    /// Returns the volume ramp time constant.
    pub fn ramp_time(&self) -> Result<Duration, Box<dyn Error>> {
        match &self.ramp_time {
            Some(ramp_time) => Ok(DurationString::from_string(ramp_time.clone())?.into()),
            None => Ok(DEFAULT_RAMP_TIME),
        }
    }

    /// Returns the validated output format.
    pub fn target_format(&self) -> Result<TargetFormat, Box<dyn Error>> {
        TargetFormat::new(
            self.sample_rate(),
            self.sample_format()?,
            self.bits_per_sample(),
            self.channels(),
        )
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Audio {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<Audio>()
            .unwrap()
    }

    #[test]
    fn test_defaults() -> Result<(), Box<dyn Error>> {
        let audio = parse("device: default");
        assert_eq!("default", audio.device());
        assert_eq!(TargetFormat::default(), audio.target_format()?);
        assert_eq!(Duration::from_millis(10), audio.ramp_time()?);
        Ok(())
    }

    #[test]
    fn test_explicit_values() -> Result<(), Box<dyn Error>> {
        let audio = parse(
            r#"
            device: UltraLite-mk5
            sample_rate: 48000
            sample_format: int
            bits_per_sample: 16
            channels: 1
            ramp_time: 25ms
            "#,
        );
        let format = audio.target_format()?;
        assert_eq!(48000, format.sample_rate);
        assert_eq!(SampleFormat::Int, format.sample_format);
        assert_eq!(16, format.bits_per_sample);
        assert_eq!(1, format.channels);
        assert_eq!(Duration::from_millis(25), audio.ramp_time()?);
        Ok(())
    }

    #[test]
    fn test_invalid_values() {
        let audio = parse("{device: default, sample_format: double}");
        assert!(audio.target_format().is_err());

        let audio = parse("{device: default, ramp_time: soon}");
        assert!(audio.ramp_time().is_err());
    }
}
