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
// Core mixing logic shared by the cpal device and the mock device.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::gain::{Gain, GainSmoother};
use crate::samples::LoadedSample;

/// Global atomic counter for generating unique source IDs
static SOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Errors from controlling a playing source.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("source {0} has already been stopped")]
    AlreadyStopped(u64),
}

/// A handle to a source started in the mixer.
#[derive(Clone, Debug)]
pub struct SourceHandle {
    id: u64,
    stopped: Arc<AtomicBool>,
    /// The owning mixer's change counter.
    changes: Arc<AtomicU64>,
}

impl SourceHandle {
    /// Returns the source ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stops the source. The mixer drops it before rendering the next block.
    /// Stopping a source twice is an error.
    pub fn stop(&self) -> Result<(), SourceError> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Err(SourceError::AlreadyStopped(self.id));
        }
        self.changes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Returns true once the source has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// A sample that restarts from the beginning whenever it reaches the end.
struct LoopingSource {
    id: u64,
    sample: LoadedSample,
    /// The next frame to render.
    position: usize,
    stopped: Arc<AtomicBool>,
}

impl LoopingSource {
    /// Adds the next frame of this source into the output frame. Mono sources are
    /// sent to every output channel and wider sources are averaged down. Otherwise
    /// channels map one to one.
    #[inline]
    fn mix_next_frame(&mut self, output: &mut [f32]) {
        let frames = self.sample.frames();
        if frames == 0 {
            return;
        }
        let channels = self.sample.channel_count() as usize;
        let start = self.position * channels;
        let frame = &self.sample.data()[start..start + channels];

        if channels == 1 {
            for out in output.iter_mut() {
                *out += frame[0];
            }
        } else if channels > output.len() {
            // More source channels than outputs: downmix to the average.
            let mixed = frame.iter().sum::<f32>() / channels as f32;
            for out in output.iter_mut() {
                *out += mixed;
            }
        } else {
            for (out, sample) in output.iter_mut().zip(frame.iter()) {
                *out += *sample;
            }
        }

        self.position += 1;
        if self.position >= frames {
            self.position = 0;
        }
    }
}

/// Core audio mixing logic that's independent of any audio backend. Every source
/// passes through the single shared gain.
#[derive(Clone)]
pub struct AudioMixer {
    /// Sources currently playing.
    sources: Arc<Mutex<Vec<LoopingSource>>>,
    /// Follows the shared gain target.
    smoother: Arc<Mutex<GainSmoother>>,
    /// Bumped whenever a source starts or stops.
    changes: Arc<AtomicU64>,
    /// Number of output channels
    num_channels: u16,
    /// Sample rate
    sample_rate: u32,
}

impl AudioMixer {
    /// Creates a new audio mixer.
    pub fn new(num_channels: u16, sample_rate: u32, gain: Arc<Gain>, ramp_time: Duration) -> Self {
        Self {
            sources: Arc::new(Mutex::new(Vec::new())),
            smoother: Arc::new(Mutex::new(GainSmoother::new(gain, sample_rate, ramp_time))),
            changes: Arc::new(AtomicU64::new(0)),
            num_channels,
            sample_rate,
        }
    }

    /// Starts looping the given sample immediately.
    pub fn start(&self, sample: LoadedSample) -> SourceHandle {
        let id = SOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let stopped = Arc::new(AtomicBool::new(false));
        self.sources.lock().push(LoopingSource {
            id,
            sample,
            position: 0,
            stopped: stopped.clone(),
        });
        self.changes.fetch_add(1, Ordering::AcqRel);
        SourceHandle {
            id,
            stopped,
            changes: self.changes.clone(),
        }
    }

    /// Returns a counter that changes whenever a source starts or stops. Audio mixed
    /// before a change no longer reflects the playing sources.
    pub fn changes(&self) -> u64 {
        self.changes.load(Ordering::Acquire)
    }

    /// Mixes `num_frames` frames of interleaved audio into the output, overwriting it.
    pub fn process_into_output(&self, output: &mut [f32], num_frames: usize) {
        let channels = self.num_channels as usize;
        let len = (num_frames * channels).min(output.len());
        let output = &mut output[..len];
        output.fill(0.0);

        let mut sources = self.sources.lock();
        sources.retain(|source| !source.stopped.load(Ordering::Acquire));

        let mut smoother = self.smoother.lock();
        for frame in output.chunks_exact_mut(channels.max(1)) {
            for source in sources.iter_mut() {
                source.mix_next_frame(frame);
            }
            let level = smoother.next();
            for sample in frame.iter_mut() {
                *sample *= level;
            }
        }
    }

    /// Renders `num_frames` frames into a new buffer.
    pub fn process_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0; num_frames * self.num_channels as usize];
        self.process_into_output(&mut frames, num_frames);
        frames
    }

    /// Returns the IDs of the sources that haven't been stopped.
    pub fn active_sources(&self) -> Vec<u64> {
        self.sources
            .lock()
            .iter()
            .filter(|source| !source.stopped.load(Ordering::Acquire))
            .map(|source| source.id)
            .collect()
    }

    /// Returns the gain every source passes through.
    pub fn gain(&self) -> Arc<Gain> {
        self.smoother.lock().gain()
    }

    /// Returns the level applied to the last rendered frame.
    pub fn current_level(&self) -> f32 {
        self.smoother.lock().current()
    }

    /// Gets the number of output channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
