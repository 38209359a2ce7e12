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
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, Level};

use super::{
    mixer::AudioMixer, thread_priority, AudioError, Gain, OutputState, SampleFormat,
    SourceHandle, TargetFormat,
};
use crate::{config, samples::LoadedSample};

/// Frames mixed per block by the producer thread.
const BLOCK_FRAMES: usize = 512;

/// Ring capacity in blocks. Keeps the mixed-ahead audio short.
const RING_BLOCKS: usize = 4;

/// No flush pending.
const NO_FLUSH: usize = usize::MAX;

/// Lock-free single producer, single consumer ring of interleaved samples.
struct CircularBuffer {
    buffer: Vec<f32>,
    /// Always a power of two.
    capacity: usize,
    read_pos: AtomicUsize,
    write_pos: AtomicUsize,
    /// Write position the reader should skip to, or `NO_FLUSH`.
    flush_to: AtomicUsize,
}

impl CircularBuffer {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two();
        Self {
            buffer: vec![0.0; capacity],
            capacity,
            read_pos: AtomicUsize::new(0),
            write_pos: AtomicUsize::new(0),
            flush_to: AtomicUsize::new(NO_FLUSH),
        }
    }

    /// Asks the reader to drop everything written so far. Samples written after
    /// this call are kept.
    fn request_flush(&self) {
        self.flush_to
            .store(self.write_pos.load(Ordering::Acquire), Ordering::Release);
    }

    /// Skips the reader ahead to a requested flush point, unless it has already
    /// read past it.
    #[inline]
    fn apply_flush(&self) {
        let flush_to = self.flush_to.swap(NO_FLUSH, Ordering::AcqRel);
        if flush_to == NO_FLUSH {
            return;
        }
        let read = self.read_pos.load(Ordering::Acquire);
        let skip = flush_to.wrapping_sub(read) & (self.capacity - 1);
        if skip <= self.available() {
            self.read_pos.store(flush_to, Ordering::Release);
        }
    }

    /// Samples waiting to be read.
    #[inline]
    fn available(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read) & (self.capacity - 1)
    }

    /// Samples that can be written without overtaking the reader.
    #[inline]
    fn space(&self) -> usize {
        self.capacity - self.available() - 1
    }

    /// Copies as many samples as fit. Returns the number written.
    fn write(&self, samples: &[f32]) -> usize {
        let to_write = self.space().min(samples.len());
        if to_write == 0 {
            return 0;
        }
        let write = self.write_pos.load(Ordering::Acquire);
        let first = (self.capacity - write).min(to_write);

        // Only the producer writes, and only into the region the consumer has released.
        unsafe {
            let base = self.buffer.as_ptr() as *mut f32;
            std::ptr::copy_nonoverlapping(samples.as_ptr(), base.add(write), first);
            if to_write > first {
                std::ptr::copy_nonoverlapping(samples.as_ptr().add(first), base, to_write - first);
            }
        }

        self.write_pos
            .store((write + to_write) & (self.capacity - 1), Ordering::Release);
        to_write
    }

    /// Copies as many samples as are available. Returns the number read.
    fn read(&self, output: &mut [f32]) -> usize {
        self.apply_flush();
        let to_read = self.available().min(output.len());
        if to_read == 0 {
            return 0;
        }
        let read = self.read_pos.load(Ordering::Acquire);
        let first = (self.capacity - read).min(to_read);

        unsafe {
            let base = self.buffer.as_ptr();
            std::ptr::copy_nonoverlapping(base.add(read), output.as_mut_ptr(), first);
            if to_read > first {
                std::ptr::copy_nonoverlapping(base, output.as_mut_ptr().add(first), to_read - first);
            }
        }

        self.read_pos
            .store((read + to_read) & (self.capacity - 1), Ordering::Release);
        to_read
    }
}

/// One step of the mixing thread. Flushes the ring when sources have started or
/// stopped since the last step, then mixes a block if it fits. Returns true if a
/// block was written.
fn pump(mixer: &AudioMixer, ring: &CircularBuffer, scratch: &mut [f32], seen: &mut u64) -> bool {
    let changes = mixer.changes();
    if changes != *seen {
        *seen = changes;
        ring.request_flush();
    }
    if ring.space() < scratch.len() {
        return false;
    }
    mixer.process_into_output(scratch, BLOCK_FRAMES);
    ring.write(scratch);
    true
}

/// Commands sent to the thread that owns the cpal stream. Each carries a reply channel.
enum StreamCommand {
    Play(Sender<Result<(), String>>),
    Pause(Sender<Result<(), String>>),
}

/// Owns the stream thread and the mixing thread of an opened device.
struct OutputManager {
    mixer: AudioMixer,
    ring: Arc<CircularBuffer>,
    state: Arc<Mutex<OutputState>>,
    /// Mirrors `state == Running` for the mixing thread.
    running: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    control_tx: Option<Sender<StreamCommand>>,
    output_thread: Option<thread::JoinHandle<()>>,
    producer_thread: Option<thread::JoinHandle<()>>,
}

impl OutputManager {
    /// Opens the stream on the device. The stream starts paused.
    fn start(
        device: cpal::Device,
        format: TargetFormat,
        ramp_time: Duration,
    ) -> Result<OutputManager, Box<dyn Error>> {
        let mixer = AudioMixer::new(
            format.channels,
            format.sample_rate,
            Arc::new(Gain::new(1.0)),
            ramp_time,
        );
        let state = Arc::new(Mutex::new(OutputState::Suspended));
        let running = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));

        let ring = Arc::new(CircularBuffer::new(
            BLOCK_FRAMES * format.channels as usize * RING_BLOCKS,
        ));

        let producer_thread = {
            let mixer = mixer.clone();
            let ring = ring.clone();
            let running = running.clone();
            let shutdown = shutdown.clone();
            let priority = thread_priority::audio_thread_priority();
            let rt_audio = thread_priority::rt_audio_enabled();
            thread::Builder::new()
                .name("tanpura-mixer".to_string())
                .spawn(move || {
                    thread_priority::boost_current_thread(priority, rt_audio);
                    let mut scratch = vec![0.0f32; BLOCK_FRAMES * mixer.num_channels() as usize];
                    let mut seen = mixer.changes();

                    while !shutdown.load(Ordering::Acquire) {
                        if !running.load(Ordering::Acquire) {
                            thread::sleep(Duration::from_millis(5));
                            continue;
                        }
                        if !pump(&mixer, &ring, &mut scratch, &mut seen) {
                            thread::sleep(Duration::from_micros(500));
                        }
                    }
                })?
        };

        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let output_thread = {
            let ring = ring.clone();
            let state = state.clone();
            let running = running.clone();
            let shutdown = shutdown.clone();
            thread::Builder::new()
                .name("tanpura-output".to_string())
                .spawn(move || {
                    run_stream(
                        device, format, ring, control_rx, ready_tx, state, running, shutdown,
                    )
                })?
        };

        let manager = OutputManager {
            mixer,
            ring,
            state,
            running,
            shutdown,
            control_tx: Some(control_tx),
            output_thread: Some(output_thread),
            producer_thread: Some(producer_thread),
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(manager),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err("output thread exited before the stream was built".into()),
        }
    }

    /// Sends a command to the stream thread and waits for its reply.
    fn command(
        &self,
        command: fn(Sender<Result<(), String>>) -> StreamCommand,
    ) -> Result<(), AudioError> {
        let control_tx = self.control_tx.as_ref().ok_or(AudioError::Closed)?;
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        control_tx
            .send(command(reply_tx))
            .map_err(|_| AudioError::Closed)?;
        reply_rx
            .recv()
            .map_err(|_| AudioError::Closed)?
            .map_err(AudioError::Stream)
    }
}

impl Drop for OutputManager {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.control_tx = None;

        if let Some(thread) = self.producer_thread.take() {
            let _ = thread.join();
        }
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

/// Body of the output thread. cpal streams aren't Send on every host, so the stream is
/// built, controlled and dropped here.
#[allow(clippy::too_many_arguments)]
fn run_stream(
    device: cpal::Device,
    format: TargetFormat,
    ring: Arc<CircularBuffer>,
    control_rx: Receiver<StreamCommand>,
    ready_tx: Sender<Result<(), String>>,
    state: Arc<Mutex<OutputState>>,
    running: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
) {
    let span = span!(Level::INFO, "cpal output");
    let _enter = span.enter();

    let stream = match build_stream(&device, &format, ring, state.clone(), running.clone()) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e.to_string()));
            return;
        }
    };
    // Some hosts start streams as soon as they're built.
    if let Err(e) = stream.pause() {
        debug!(err = e.to_string(), "Unable to pause new stream");
    }
    info!(format = %format, "Output stream ready (suspended).");
    let _ = ready_tx.send(Ok(()));

    while !shutdown.load(Ordering::Acquire) {
        match control_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(StreamCommand::Play(reply)) => {
                let _ = reply.send(stream.play().map_err(|e| e.to_string()));
            }
            Ok(StreamCommand::Pause(reply)) => {
                let _ = reply.send(stream.pause().map_err(|e| e.to_string()));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("Output stream closed.");
}

fn build_stream(
    device: &cpal::Device,
    format: &TargetFormat,
    ring: Arc<CircularBuffer>,
    state: Arc<Mutex<OutputState>>,
    running: Arc<AtomicBool>,
) -> Result<cpal::Stream, Box<dyn Error>> {
    let config = cpal::StreamConfig {
        channels: format.channels,
        sample_rate: format.sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    let on_error = move |err: cpal::StreamError| {
        error!("CPAL output stream error: {}", err);
        if matches!(err, cpal::StreamError::DeviceNotAvailable) {
            *state.lock() = OutputState::Closed;
            running.store(false, Ordering::Release);
        }
    };

    let stream = match (format.sample_format, format.bits_per_sample) {
        (SampleFormat::Float, _) => {
            device.build_output_stream(&config, float_callback(ring), on_error, None)?
        }
        (SampleFormat::Int, 16) => {
            device.build_output_stream(&config, int_callback::<i16>(ring), on_error, None)?
        }
        (SampleFormat::Int, 32) => {
            device.build_output_stream(&config, int_callback::<i32>(ring), on_error, None)?
        }
        (SampleFormat::Int, bits) => {
            return Err(format!("unsupported integer bit depth: {}", bits).into())
        }
    };
    Ok(stream)
}

/// f32 output reads straight from the ring into the cpal buffer.
fn float_callback(
    ring: Arc<CircularBuffer>,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        let read = ring.read(data);
        data[read..].fill(0.0);
    }
}

/// Integer output reads into a scratch buffer and converts.
fn int_callback<T>(
    ring: Arc<CircularBuffer>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        if scratch.len() < data.len() {
            scratch.resize(data.len(), 0.0);
        }
        let scratch = &mut scratch[..data.len()];
        let read = ring.read(scratch);
        scratch[read..].fill(0.0);
        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

/// An output device found on one of the cpal hosts.
pub struct DeviceInfo {
    name: String,
    max_channels: u16,
    host_id: cpal::HostId,
    device: cpal::Device,
}

impl DeviceInfo {
    /// Returns the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the maximum number of output channels.
    pub fn max_channels(&self) -> u16 {
        self.max_channels
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// An opened cpal output device. Dropping it closes the stream.
pub struct Device {
    info: DeviceInfo,
    format: TargetFormat,
    output: OutputManager,
}

impl Device {
    /// Lists output devices across all cpal hosts.
    pub fn list() -> Result<Vec<DeviceInfo>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<DeviceInfo> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let output_configs = match device.supported_output_configs() {
                    Ok(output_configs) => output_configs,
                    Err(_) => continue,
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(DeviceInfo {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Opens the named device. The output starts suspended.
    pub fn get(config: config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        let info = Device::list()?
            .into_iter()
            .find(|device| device.name.trim() == name)
            .ok_or_else(|| format!("no device found with name {}", name))?;

        let mut format = config.target_format()?;
        format.channels = format.channels.min(info.max_channels);

        let output = OutputManager::start(info.device.clone(), format.clone(), config.ramp_time()?)?;
        info!(device = info.name, format = %format, "Opened audio device.");

        Ok(Device {
            info,
            format,
            output,
        })
    }
}

impl super::Device for Device {
    fn state(&self) -> OutputState {
        *self.output.state.lock()
    }

    fn resume(&self) -> Result<(), AudioError> {
        let mut state = self.output.state.lock();
        match *state {
            OutputState::Closed => Err(AudioError::Closed),
            OutputState::Running => Ok(()),
            OutputState::Suspended => {
                // Audio mixed before the suspend is stale.
                self.output.ring.request_flush();
                // Mix ahead before the stream starts pulling.
                self.output.running.store(true, Ordering::Release);
                if let Err(e) = self.output.command(StreamCommand::Play) {
                    self.output.running.store(false, Ordering::Release);
                    return Err(e);
                }
                *state = OutputState::Running;
                info!(device = self.info.name, "Resumed output.");
                Ok(())
            }
        }
    }

    fn suspend(&self) -> Result<(), AudioError> {
        let mut state = self.output.state.lock();
        match *state {
            OutputState::Closed => Err(AudioError::Closed),
            OutputState::Suspended => Ok(()),
            OutputState::Running => {
                self.output.command(StreamCommand::Pause)?;
                self.output.running.store(false, Ordering::Release);
                *state = OutputState::Suspended;
                info!(device = self.info.name, "Suspended output.");
                Ok(())
            }
        }
    }

    fn start_source(&self, sample: LoadedSample) -> Result<SourceHandle, AudioError> {
        if self.state() == OutputState::Closed {
            return Err(AudioError::Closed);
        }
        let handle = self.output.mixer.start(sample);
        self.output.ring.request_flush();
        debug!(device = self.info.name, source = handle.id(), "Started source.");
        Ok(handle)
    }

    fn gain(&self) -> Arc<Gain> {
        self.output.mixer.gain()
    }

    fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.info, self.format)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ring_wraps_around() {
        let ring = CircularBuffer::new(8);
        assert_eq!(7, ring.space());

        assert_eq!(6, ring.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        let mut out = [0.0; 4];
        assert_eq!(4, ring.read(&mut out));
        assert_eq!([1.0, 2.0, 3.0, 4.0], out);

        // This write crosses the end of the backing buffer.
        assert_eq!(5, ring.write(&[7.0, 8.0, 9.0, 10.0, 11.0]));
        assert_eq!(7, ring.available());
        let mut out = [0.0; 8];
        assert_eq!(7, ring.read(&mut out));
        assert_eq!([5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 0.0], out);
        assert_eq!(0, ring.available());
    }

    #[test]
    fn test_ring_never_overwrites_unread_samples() {
        let ring = CircularBuffer::new(4);
        assert_eq!(3, ring.write(&[1.0, 2.0, 3.0, 4.0, 5.0]));
        assert_eq!(0, ring.write(&[6.0]));
        let mut out = [0.0; 3];
        assert_eq!(3, ring.read(&mut out));
        assert_eq!([1.0, 2.0, 3.0], out);
    }

    #[test]
    fn test_flush_keeps_later_writes() {
        let ring = CircularBuffer::new(8);
        ring.write(&[1.0, 2.0, 3.0]);
        ring.request_flush();
        ring.write(&[4.0, 5.0]);

        let mut out = [0.0; 4];
        assert_eq!(2, ring.read(&mut out));
        assert_eq!([4.0, 5.0], out[..2]);

        // A flush point the reader has already passed is ignored.
        ring.write(&[6.0, 7.0]);
        let mut out = [0.0; 2];
        assert_eq!(2, ring.read(&mut out));
        ring.write(&[8.0]);
        ring.flush_to.store(6, Ordering::Release);
        let mut out = [0.0; 1];
        assert_eq!(1, ring.read(&mut out));
        assert_eq!([8.0], out);
    }

    #[test]
    fn test_new_source_replaces_queued_audio() {
        let mixer = AudioMixer::new(1, 44100, Arc::new(Gain::new(1.0)), Duration::ZERO);
        let ring = CircularBuffer::new(BLOCK_FRAMES * RING_BLOCKS);
        let mut scratch = vec![0.0f32; BLOCK_FRAMES];
        let mut seen = mixer.changes();

        let old = mixer.start(LoadedSample::new(vec![0.5], 1, 44100));
        while pump(&mixer, &ring, &mut scratch, &mut seen) {}
        assert!(ring.available() >= BLOCK_FRAMES);

        old.stop().unwrap();
        mixer.start(LoadedSample::new(vec![-0.25], 1, 44100));
        assert!(!pump(&mixer, &ring, &mut scratch, &mut seen));

        // Nothing from the old source is left for the output.
        let mut out = vec![0.0f32; BLOCK_FRAMES * RING_BLOCKS];
        assert_eq!(0, ring.read(&mut out));

        assert!(pump(&mixer, &ring, &mut scratch, &mut seen));
        let read = ring.read(&mut out);
        assert_eq!(BLOCK_FRAMES, read);
        assert!(out[..read].iter().all(|&sample| sample == -0.25));
    }
}
