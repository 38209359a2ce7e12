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
use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use super::error::LoadError;
use crate::notes::decode_uri_component;

/// Fully decoded audio, interleaved.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channel_count: u16,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Returns the number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channel_count == 0 {
            return 0;
        }
        self.samples.len() / self.channel_count as usize
    }
}

/// Decodes a complete resource into interleaved f32 samples. Supports every format
/// symphonia knows; the resource name's extension is used as a probe hint.
pub fn decode(resource: &str, bytes: Vec<u8>) -> Result<DecodedAudio, LoadError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    let file_name = decode_uri_component(resource);
    if let Some(extension) = Path::new(&file_name)
        .extension()
        .and_then(|ext| ext.to_str())
    {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| LoadError::undecodable(resource, e))?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LoadError::undecodable(resource, "no audio track found"))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let sample_rate = params
        .sample_rate
        .ok_or_else(|| LoadError::undecodable(resource, "sample rate not specified"))?;
    let mut channel_count = params.channels.map(|c| c.count() as u16).unwrap_or(0);

    let mut decoder = get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| LoadError::undecodable(resource, e))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            // Some readers report the end of the stream as a decode error.
            Err(SymphoniaError::DecodeError(_)) => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(LoadError::undecodable(resource, e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt packet is skipped rather than failing the whole resource.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(LoadError::undecodable(resource, e)),
        };
        let decoded_channels = decoded.spec().channels.count() as u16;
        if channel_count == 0 {
            channel_count = decoded_channels;
        }
        append_interleaved(decoded, &mut samples);
    }

    if channel_count == 0 || samples.is_empty() {
        return Err(LoadError::undecodable(resource, "no audio frames"));
    }

    Ok(DecodedAudio {
        samples,
        channel_count,
        sample_rate,
    })
}

/// Appends a decoded buffer to the output as interleaved f32 samples.
fn append_interleaved(decoded: AudioBufferRef, output: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::F32(buf) => interleave(&buf, output, |sample| sample),
        AudioBufferRef::F64(buf) => interleave(&buf, output, |sample| sample as f32),
        AudioBufferRef::S8(buf) => interleave(&buf, output, scale_s8),
        AudioBufferRef::S16(buf) => interleave(&buf, output, scale_s16),
        AudioBufferRef::S24(buf) => interleave(&buf, output, |sample| scale_s24(sample.inner())),
        AudioBufferRef::S32(buf) => interleave(&buf, output, scale_s32),
        AudioBufferRef::U8(buf) => interleave(&buf, output, scale_u8),
        AudioBufferRef::U16(buf) => interleave(&buf, output, scale_u16),
        AudioBufferRef::U24(buf) => interleave(&buf, output, |sample| scale_u24(sample.inner())),
        AudioBufferRef::U32(buf) => interleave(&buf, output, scale_u32),
    }
}

fn interleave<T, F>(buf: &AudioBuffer<T>, output: &mut Vec<f32>, convert: F)
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let frames = buf.frames();
    let planes = buf.planes();
    let planes = planes.planes();
    output.reserve(frames * planes.len());
    for frame_idx in 0..frames {
        for plane in planes.iter() {
            output.push(convert(plane[frame_idx]));
        }
    }
}

#[inline]
fn scale_s8(sample: i8) -> f32 {
    sample as f32 / (1i64 << 7) as f32
}

#[inline]
fn scale_s16(sample: i16) -> f32 {
    sample as f32 / (1i64 << 15) as f32
}

#[inline]
fn scale_s24(sample: i32) -> f32 {
    sample as f32 / (1i64 << 23) as f32
}

#[inline]
fn scale_s32(sample: i32) -> f32 {
    sample as f32 / (1i64 << 31) as f32
}

#[inline]
fn scale_u8(sample: u8) -> f32 {
    (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u16(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u24(sample: u32) -> f32 {
    let max = (1u32 << 24) - 1;
    (sample as f32 / max as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u32(sample: u32) -> f32 {
    (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;
    use crate::testutil::wav_bytes;

    #[test]
    fn test_decode_stereo_wav() -> Result<(), Box<dyn Error>> {
        let interleaved = vec![0.5f32, -0.5, 0.25, -0.25, 0.0, 0.0];
        let bytes = wav_bytes(&interleaved, 2, 48000)?;

        let decoded = decode("Tanpura C.wav", bytes)?;
        assert_eq!(2, decoded.channel_count);
        assert_eq!(48000, decoded.sample_rate);
        assert_eq!(3, decoded.frames());
        assert_eq!(interleaved, decoded.samples);
        Ok(())
    }

    #[test]
    fn test_decode_escaped_name_hint() -> Result<(), Box<dyn Error>> {
        let bytes = wav_bytes(&[0.1, 0.2, 0.3], 1, 44100)?;
        let decoded = decode("Tanpura C%23.wav", bytes)?;
        assert_eq!(1, decoded.channel_count);
        assert_eq!(3, decoded.frames());
        Ok(())
    }

    #[test]
    fn test_decode_garbage_is_undecodable() {
        let result = decode("Tanpura D.wav", b"this is not audio".to_vec());
        assert!(matches!(result, Err(LoadError::Undecodable { .. })));
    }

    #[test]
    fn test_decode_empty_wav_is_undecodable() -> Result<(), Box<dyn Error>> {
        let bytes = wav_bytes(&[], 2, 44100)?;
        let result = decode("Tanpura E.wav", bytes);
        assert!(matches!(result, Err(LoadError::Undecodable { .. })));
        Ok(())
    }

    #[test]
    fn test_integer_scaling() {
        assert_eq!(-1.0, scale_s16(i16::MIN));
        assert_eq!(0.0, scale_s16(0));
        assert_eq!(-1.0, scale_s8(i8::MIN));
        assert_eq!(-1.0, scale_s24(-(1 << 23)));
        assert_eq!(-1.0, scale_u8(0));
        assert_eq!(1.0, scale_u8(u8::MAX));
        assert_eq!(1.0, scale_u16(u16::MAX));
        assert_eq!(1.0, scale_u24((1 << 24) - 1));
    }
}
