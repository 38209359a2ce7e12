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

use std::{error::Error, fmt, str::FromStr};

/// The sample type written to the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Integer samples (16 or 32 bit).
    Int,
    /// 32-bit floating point samples.
    Float,
}

impl FromStr for SampleFormat {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float" => Ok(SampleFormat::Float),
            "int" => Ok(SampleFormat::Int),
            _ => Err(format!("Unsupported sample format: {}", s).into()),
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleFormat::Float => write!(f, "float"),
            SampleFormat::Int => write!(f, "int"),
        }
    }
}

/// The format the output stream is opened with. Drones are converted to this
/// sample rate when they're loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Sample format (integer or float)
    pub sample_format: SampleFormat,
    /// Bits per sample
    pub bits_per_sample: u16,
    /// Number of output channels
    pub channels: u16,
}

impl TargetFormat {
    /// Creates a new target format, rejecting combinations the output stream can't produce.
    pub fn new(
        sample_rate: u32,
        sample_format: SampleFormat,
        bits_per_sample: u16,
        channels: u16,
    ) -> Result<Self, Box<dyn Error>> {
        if sample_rate == 0 {
            return Err("Sample rate must be greater than 0".into());
        }
        if channels == 0 {
            return Err("Output must have at least one channel".into());
        }
        match (sample_format, bits_per_sample) {
            (SampleFormat::Float, 32) | (SampleFormat::Int, 16) | (SampleFormat::Int, 32) => {}
            _ => {
                return Err(format!(
                    "Unsupported output format: {}-bit {}",
                    bits_per_sample, sample_format
                )
                .into())
            }
        }

        Ok(TargetFormat {
            sample_rate,
            sample_format,
            bits_per_sample,
            channels,
        })
    }
}

impl Default for TargetFormat {
    /// 44.1kHz, 32-bit float, stereo.
    fn default() -> Self {
        TargetFormat {
            sample_rate: 44100,
            sample_format: SampleFormat::Float,
            bits_per_sample: 32,
            channels: 2,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz {}-bit {} x{}",
            self.sample_rate, self.bits_per_sample, self.sample_format, self.channels
        )
    }
}
