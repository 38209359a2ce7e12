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

//! Drone loading and caching.
//!
//! Drones are decoded entirely into memory, converted to the output sample rate and
//! cached by resource name, so switching back to a note does not fetch it again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::decoder::{decode, DecodedAudio};
use super::error::LoadError;
use super::store::ResourceStore;
use crate::notes::{Note, CATALOG};

/// A decoded drone that can be played back. The sample data is shared, so
/// cloning is cheap.
#[derive(Clone, Debug)]
pub struct LoadedSample {
    /// The sample data as f32 samples, interleaved if multi-channel.
    data: Arc<Vec<f32>>,
    /// Number of channels in the sample.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl LoadedSample {
    /// Creates a loaded sample from interleaved data.
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> LoadedSample {
        LoadedSample {
            data: Arc::new(data),
            channel_count,
            sample_rate,
        }
    }

    /// Returns the interleaved sample data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channel_count == 0 {
            return 0;
        }
        self.data.len() / self.channel_count as usize
    }

    /// Returns the length of one pass through the loop.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// Fetches, decodes and caches drone resources. Clones share the cache.
#[derive(Clone)]
pub struct SampleLoader {
    /// Where resources come from.
    store: Arc<dyn ResourceStore>,
    /// Cache of loaded samples by resource name.
    cache: Arc<Mutex<HashMap<String, LoadedSample>>>,
    /// Target sample rate for conversion (matches audio output).
    target_sample_rate: u32,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(store: Arc<dyn ResourceStore>, target_sample_rate: u32) -> SampleLoader {
        SampleLoader {
            store,
            cache: Arc::new(Mutex::new(HashMap::new())),
            target_sample_rate,
        }
    }

    /// Loads the named resource. Fetching and decoding run on the blocking pool.
    pub async fn load(&self, resource: &str) -> Result<LoadedSample, LoadError> {
        if let Some(sample) = self.cached(resource) {
            return Ok(sample);
        }

        let store = self.store.clone();
        let cache = self.cache.clone();
        let target_sample_rate = self.target_sample_rate;
        let resource = resource.to_string();
        tokio::task::spawn_blocking(move || {
            Self::fetch_and_decode(store.as_ref(), &cache, &resource, target_sample_rate)
        })
        .await?
    }

    /// Loads the named resource on the current thread.
    pub fn load_blocking(&self, resource: &str) -> Result<LoadedSample, LoadError> {
        if let Some(sample) = self.cached(resource) {
            return Ok(sample);
        }
        Self::fetch_and_decode(
            self.store.as_ref(),
            &self.cache,
            resource,
            self.target_sample_rate,
        )
    }

    /// Loads every note in the catalog and reports the result for each.
    pub fn verify_catalog(&self) -> Vec<(Note, Result<LoadedSample, LoadError>)> {
        CATALOG
            .iter()
            .map(|note| (*note, self.load_blocking(&note.resource_name())))
            .collect()
    }

    /// Runs `verify_catalog` on the blocking pool.
    pub async fn verify(&self) -> Result<Vec<(Note, Result<LoadedSample, LoadError>)>, LoadError> {
        let loader = self.clone();
        Ok(tokio::task::spawn_blocking(move || loader.verify_catalog()).await?)
    }

    /// Returns the total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.lock().values().map(|s| s.memory_size()).sum()
    }

    fn cached(&self, resource: &str) -> Option<LoadedSample> {
        let sample = self.cache.lock().get(resource).cloned();
        if sample.is_some() {
            debug!(resource, "Using cached sample");
        }
        sample
    }

    fn fetch_and_decode(
        store: &dyn ResourceStore,
        cache: &Mutex<HashMap<String, LoadedSample>>,
        resource: &str,
        target_sample_rate: u32,
    ) -> Result<LoadedSample, LoadError> {
        info!(resource, store = %store, "Loading sample into memory");

        let bytes = store.fetch(resource)?;
        let decoded = decode(resource, bytes)?;
        let loaded = Self::convert(decoded, target_sample_rate);

        info!(
            resource,
            channels = loaded.channel_count(),
            sample_rate = loaded.sample_rate(),
            duration_ms = loaded.duration().as_millis(),
            memory_kb = loaded.memory_size() / 1024,
            "Sample loaded"
        );

        cache.lock().insert(resource.to_string(), loaded.clone());
        Ok(loaded)
    }

    /// Converts decoded audio to the target rate if it doesn't match already.
    fn convert(decoded: DecodedAudio, target_sample_rate: u32) -> LoadedSample {
        if decoded.sample_rate == target_sample_rate || target_sample_rate == 0 {
            return LoadedSample::new(decoded.samples, decoded.channel_count, decoded.sample_rate);
        }

        info!(
            source_rate = decoded.sample_rate,
            target_rate = target_sample_rate,
            "Transcoding sample"
        );
        let transcoded = transcode_samples(
            &decoded.samples,
            decoded.channel_count,
            decoded.sample_rate,
            target_sample_rate,
        );
        LoadedSample::new(transcoded, decoded.channel_count, target_sample_rate)
    }
}

impl std::fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLoader")
            .field("store", &self.store.to_string())
            .field("cached_samples", &self.cache.lock().len())
            .field("target_sample_rate", &self.target_sample_rate)
            .finish()
    }
}

/// Converts a looping sample to another rate with linear interpolation. The last
/// frame interpolates towards the first so the loop point stays continuous.
fn transcode_samples(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let channels = channel_count as usize;
    if channels == 0 || source_rate == 0 {
        return Vec::new();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let source_frames = samples.len() / channels;
    if source_frames == 0 {
        return Vec::new();
    }
    let target_frames =
        (source_frames as u64 * target_rate as u64).div_ceil(source_rate as u64) as usize;

    let mut output = Vec::with_capacity(target_frames * channels);

    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = (source_pos.floor() as usize).min(source_frames - 1);
        let next_frame = (source_frame + 1) % source_frames;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let s0 = samples[source_frame * channels + channel];
            let s1 = samples[next_frame * channels + channel];
            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}
