//! Decoding of fetched sample payloads into mono buffers.

use std::io::Cursor;

use hound::{SampleFormat, WavReader};
use minimp3::{Decoder, Error as Mp3Error, Frame};

use crate::dsp::sampler::SampleBuffer;
use crate::error::SampleError;

/// Decode a WAV or MP3 payload, sniffed from its leading bytes, and mix it
/// down to mono.
pub fn decode(bytes: &[u8]) -> Result<SampleBuffer, SampleError> {
    if bytes.starts_with(b"RIFF") {
        decode_wav(bytes)
    } else if bytes.starts_with(b"ID3") || is_mpeg_sync(bytes) {
        decode_mp3(bytes)
    } else {
        Err(SampleError::UnsupportedCodec)
    }
}

fn is_mpeg_sync(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0
}

pub fn decode_wav(bytes: &[u8]) -> Result<SampleBuffer, SampleError> {
    let mut reader =
        WavReader::new(Cursor::new(bytes)).map_err(|e| SampleError::Decode(e.to_string()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| SampleError::Decode(e.to_string()))?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| SampleError::Decode(e.to_string()))?
        }
    };

    Ok(SampleBuffer::from_interleaved(
        &samples,
        spec.channels as usize,
        spec.sample_rate,
    ))
}

pub fn decode_mp3(bytes: &[u8]) -> Result<SampleBuffer, SampleError> {
    let mut decoder = Decoder::new(Cursor::new(bytes));
    let mut mono: Vec<f32> = Vec::new();
    let mut sample_rate = 0;

    loop {
        match decoder.next_frame() {
            Ok(Frame {
                data,
                sample_rate: rate,
                channels,
                ..
            }) => {
                sample_rate = rate as u32;
                let channels = channels.max(1);
                mono.extend(data.chunks(channels).map(|frame| {
                    frame.iter().map(|&s| s as f32 / 32768.0).sum::<f32>() / channels as f32
                }));
            }
            Err(Mp3Error::Eof) => break,
            Err(Mp3Error::SkippedData) => continue,
            Err(e) => return Err(SampleError::Decode(format!("{e:?}"))),
        }
    }

    if mono.is_empty() || sample_rate == 0 {
        return Err(SampleError::Decode("no audio frames".to_string()));
    }
    Ok(SampleBuffer::new(mono, sample_rate))
}
