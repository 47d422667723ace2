//! Piano-like tones for discrete keys, and the UI pop.
//!
//! A tone is one self-terminating `Sound`: three slightly mistuned strings,
//! a few decaying harmonics and a short hammer click, under a fast attack and
//! an exponential decay, through a low-pass that closes from bright to dull.

use crate::config::{PopConfig, ToneConfig};
use crate::device::Device;
use crate::dsp::oscillator::Waveform;
use crate::dsp::param::AudioParam;
use crate::dsp::sound::{Sound, Source};
use crate::notes::PitchClass;

#[derive(Debug, Clone)]
pub struct ToneGenerator {
    config: ToneConfig,
    tuning_pitch: f64,
}

impl ToneGenerator {
    pub fn new(config: ToneConfig, tuning_pitch: f64) -> Self {
        ToneGenerator {
            config,
            tuning_pitch,
        }
    }

    pub fn frequency(&self, pitch: PitchClass, octave: i32) -> f64 {
        pitch.frequency(octave, self.tuning_pitch)
    }

    /// Schedule a tone now. Returns its fundamental.
    pub fn play(&self, device: &mut Device<'_>, pitch: PitchClass, octave: i32) -> f64 {
        let frequency = self.frequency(pitch, octave);
        let now = device.now();
        let sound = self.build(device.create_sound(now), frequency);
        device.play(sound);
        frequency
    }

    /// Fill an empty sound with the tone graph for `frequency`.
    pub fn build(&self, sound: Sound, frequency: f64) -> Sound {
        let c = &self.config;
        let now = sound.start_time();
        let sr = sound.sample_rate();

        let envelope = AudioParam::new(0.0)
            .set_value_at_time(0.0, now)
            .linear_ramp_to_value_at_time(c.peak_gain, now + c.attack)
            .exponential_ramp_to_value_at_time(c.floor, now + c.decay);
        let cutoff = AudioParam::new(frequency * c.filter.start_multiple)
            .set_value_at_time(frequency * c.filter.start_multiple, now)
            .exponential_ramp_to_value_at_time(frequency * c.filter.end_multiple, now + c.duration);

        let mut sound = sound
            .gain(envelope)
            .lowpass(cutoff, c.filter.q)
            .reverb_send(c.reverb_send)
            .stop_at(now + c.duration);

        for &cents in &c.strings.detune_cents {
            sound = sound.source(
                Source::oscillator(c.strings.waveform, AudioParam::new(frequency), sr)
                    .detune(cents)
                    .gain(decay(c.strings.gain, c.floor, now, now + c.strings.decay))
                    .start_at(now)
                    .stop_at(now + c.duration),
            );
        }

        for h in &c.harmonics {
            let multiple = h.multiple.max(1.0);
            sound = sound.source(
                Source::oscillator(Waveform::Sine, AudioParam::new(frequency * multiple), sr)
                    .gain(decay(h.gain, c.floor, now, now + c.harmonic_decay / multiple))
                    .start_at(now)
                    .stop_at(now + c.harmonic_stop),
            );
        }

        let hammer = &c.hammer;
        sound.source(
            Source::oscillator(Waveform::Sine, AudioParam::new(frequency * hammer.multiple), sr)
                .gain(decay(hammer.gain, c.floor, now, now + hammer.decay))
                .start_at(now)
                .stop_at(now + hammer.stop),
        )
    }
}

fn decay(from: f64, to: f64, start: f64, end: f64) -> AudioParam {
    AudioParam::new(from)
        .set_value_at_time(from, start)
        .exponential_ramp_to_value_at_time(to, end)
}

/// Short falling sine chirp for generic UI clicks.
pub fn play_pop(device: &mut Device<'_>, config: &PopConfig) {
    let now = device.now();
    let sr = device.sample_rate();
    let end = now + config.duration;
    let sound = device
        .create_sound(now)
        .source(
            Source::oscillator(
                Waveform::Sine,
                AudioParam::new(config.start_frequency)
                    .set_value_at_time(config.start_frequency, now)
                    .exponential_ramp_to_value_at_time(config.end_frequency, end),
                sr,
            )
            .start_at(now)
            .stop_at(end),
        )
        .gain(
            AudioParam::new(config.start_gain)
                .set_value_at_time(config.start_gain, now)
                .exponential_ramp_to_value_at_time(config.end_gain, end),
        );
    device.play(sound);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceConfig, EngineConfig};
    use crate::device::offline::OfflineOutput;
    use crate::device::AudioContext;

    const SR: f64 = 48000.0;

    fn generator() -> ToneGenerator {
        ToneGenerator::new(ToneConfig::default(), 440.0)
    }

    fn tone_at(start: f64, frequency: f64) -> Sound {
        generator().build(Sound::new(1, SR, start), frequency)
    }

    #[test]
    fn octave_up_doubles_frequency() {
        let g = generator();
        let f0 = g.frequency(PitchClass::Do, 0);
        let f1 = g.frequency(PitchClass::Do, 1);
        assert!((f1 - 2.0 * f0).abs() < 1e-9, "{f1} != 2 * {f0}");
    }

    #[test]
    fn graph_shape() {
        let sound = tone_at(1.0, 261.63);
        // 3 strings + 3 harmonics + hammer.
        assert_eq!(sound.sources().len(), 7);
        assert_eq!(sound.end_time(), Some(3.5));
        assert!((sound.sources()[0].pitch_at(1.0) - 261.63).abs() < 1e-9);
        assert!((sound.sources()[6].pitch_at(1.0) - 5.0 * 261.63).abs() < 1e-9);
    }

    #[test]
    fn envelope_attacks_then_decays() {
        let sound = tone_at(2.0, 440.0);
        assert_eq!(sound.gain_at(2.0), 0.0);
        assert!((sound.gain_at(2.01) - 0.5).abs() < 1e-9);
        assert!(sound.gain_at(3.0) < 0.5 && sound.gain_at(3.0) > 0.001);
        assert!((sound.gain_at(4.2) - 0.001).abs() < 1e-9);
    }

    #[test]
    fn filter_closes_toward_fundamental() {
        let sound = tone_at(0.0, 300.0);
        assert_eq!(sound.filter_frequency_at(0.0), Some(2400.0));
        let end = sound.filter_frequency_at(2.5).unwrap();
        assert!((end - 360.0).abs() < 1e-6, "got {end}");
    }

    #[test]
    fn rendered_tone_decays_and_ends() {
        let output = OfflineOutput::new(SR);
        let config = DeviceConfig {
            reverb: None,
            compressor: None,
            ..EngineConfig::default().device
        };
        let mut ctx = AudioContext::new(config, output.opener());
        let g = generator();
        g.play(&mut ctx.device().unwrap(), PitchClass::La, 0);

        let rms = |buf: &[f32]| (buf.iter().map(|s| s * s).sum::<f32>() / buf.len() as f32).sqrt();
        let early = rms(&output.render_seconds(0.2));
        output.render_seconds(1.3);
        let late = rms(&output.render_seconds(0.2));
        assert!(early > 0.05, "Tone should be audible, rms {early}");
        assert!(late < early * 0.2, "Tone should decay: early {early}, late {late}");

        output.render_seconds(1.0);
        assert_eq!(output.active_sounds(), 0, "Tone should tear itself down");
    }

    #[test]
    fn pop_is_short() {
        let output = OfflineOutput::new(SR);
        let mut ctx = AudioContext::new(DeviceConfig::default(), output.opener());
        play_pop(&mut ctx.device().unwrap(), &PopConfig::default());
        assert_eq!(output.active_sounds(), 0);
        output.render_seconds(0.05);
        assert_eq!(output.active_sounds(), 1);
        output.render_seconds(0.06);
        assert_eq!(output.active_sounds(), 0);
    }
}
