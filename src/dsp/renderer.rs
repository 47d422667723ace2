//! Offline bounce of a `Renderer` to a 16-bit mono WAV byte buffer.

use super::engine::Renderer;

/// Render `seconds` of output from the current device time and encode it.
pub fn render_wav(renderer: &mut Renderer, seconds: f64) -> Vec<u8> {
    let frames = (seconds * renderer.sample_rate()).round().max(0.0) as usize;
    let mut pcm = vec![0.0; frames];
    renderer.render(&mut pcm);
    encode_wav(&pcm, renderer.sample_rate() as u32)
}

pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    const CHANNELS: u16 = 1;
    const BITS: u16 = 16;
    let block_align = CHANNELS * BITS / 8;
    let byte_rate = sample_rate * block_align as u32;
    let data_size = (samples.len() * block_align as usize) as u32;

    let mut buf = Vec::with_capacity(44 + data_size as usize);
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_size).to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&CHANNELS.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&BITS.to_le_bytes());

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &s in samples {
        let pcm = (s as f64 * 32767.0).round().clamp(-32768.0, 32767.0) as i16;
        buf.extend_from_slice(&pcm.to_le_bytes());
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::dsp::engine::Command;
    use crate::dsp::oscillator::Waveform;
    use crate::dsp::param::AudioParam;
    use crate::dsp::sound::{Sound, Source};

    #[test]
    fn header_fields() {
        let wav = encode_wav(&[0.0; 10], 22050);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 1);
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), 22050);
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 20);
        assert_eq!(wav.len(), 44 + 20);
    }

    #[test]
    fn full_scale_clamps() {
        let wav = encode_wav(&[2.0, -2.0], 8000);
        assert_eq!(i16::from_le_bytes([wav[44], wav[45]]), 32767);
        assert_eq!(i16::from_le_bytes([wav[46], wav[47]]), -32768);
    }

    #[test]
    fn bounce_contains_audio() {
        let sr = 22050.0;
        let mut renderer = Renderer::new(sr, &DeviceConfig::default());
        let sound = Sound::new(1, sr, 0.0)
            .source(Source::oscillator(Waveform::Triangle, AudioParam::new(261.63), sr))
            .gain(AudioParam::new(0.3))
            .stop_at(0.2);
        renderer.enqueue(Command::Start(Box::new(sound)));

        let wav = render_wav(&mut renderer, 0.25);
        assert_eq!(wav.len(), 44 + 2 * 5513);
        let loud = wav[44..]
            .chunks(2)
            .any(|b| i16::from_le_bytes([b[0], b[1]]).abs() > 1000);
        assert!(loud, "Bounced WAV should not be silent");
    }
}
