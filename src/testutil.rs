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
    f32::consts::PI,
    fs,
    io::Cursor,
    path::Path,
    thread,
    time::{Duration, SystemTime},
};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::notes::Note;

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed();
        if elapsed.is_err() {
            panic!("System time error");
        }
        let elapsed = elapsed.unwrap();

        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Encodes interleaved f32 samples as a 32-bit float WAV file in memory.
pub fn wav_bytes(
    interleaved: &[f32],
    channels: u16,
    sample_rate: u32,
) -> Result<Vec<u8>, Box<dyn Error>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in interleaved {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Frequency of the test tone written for a note, in Hz.
pub fn tone_frequency(note: Note) -> f32 {
    let semitone = crate::notes::CATALOG
        .iter()
        .position(|n| *n == note)
        .unwrap_or(0) as f32;
    130.81 * 2f32.powf(semitone / 12.0)
}

/// Writes a sine drone for the note into the directory under its file name.
pub fn write_drone(
    dir: &Path,
    note: Note,
    sample_rate: u32,
    channels: u16,
    seconds: f64,
) -> Result<(), Box<dyn Error>> {
    let frames = (sample_rate as f64 * seconds).round() as usize;
    let frequency = tone_frequency(note);
    let mut interleaved = Vec::with_capacity(frames * channels as usize);
    for frame in 0..frames {
        let value = 0.5 * (2.0 * PI * frequency * frame as f32 / sample_rate as f32).sin();
        for _ in 0..channels {
            interleaved.push(value);
        }
    }
    fs::write(
        dir.join(note.file_name()),
        wav_bytes(&interleaved, channels, sample_rate)?,
    )?;
    Ok(())
}
