//! Sustained choir voices.
//!
//! Each voice is one open-ended `Sound` that fades in when the voice is
//! engaged and is released with a linear fade when it is let go. A voice id
//! has at most one sounding handle; engaging it again is a no-op.

use std::collections::BTreeMap;

use log::{debug, trace, warn};

use crate::config::{ChoirConfig, ChoirSynthesis};
use crate::device::{AudioContext, Device};
use crate::dsp::param::{AudioParam, ParamEvent};
use crate::dsp::sound::{ParamTarget, Sound, SoundId, Source, Vibrato};
use crate::notes::PitchClass;
use crate::samples::SampleSlot;

pub type VoiceId = usize;

/// Extra time after the release ramp before the sound is stopped.
const STOP_MARGIN: f64 = 0.02;

/// A voice that is currently sounding.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceHandle {
    pub voice: VoiceId,
    pub sound: SoundId,
    pub started_at: f64,
    /// Oscillator frequency, or playback rate for the sampled choir.
    pub pitch: f64,
}

#[derive(Debug)]
pub struct ChoirGenerator {
    config: ChoirConfig,
    frequencies: Vec<Option<f64>>,
    sample: SampleSlot,
    active: BTreeMap<VoiceId, VoiceHandle>,
}

impl ChoirGenerator {
    pub fn new(config: ChoirConfig, tuning_pitch: f64, sample: SampleSlot) -> Self {
        let frequencies = config
            .voices
            .iter()
            .map(|v| match PitchClass::parse_spelled(&v.pitch) {
                Ok((pitch, shift)) => Some(pitch.frequency(v.octave + shift, tuning_pitch)),
                Err(e) => {
                    warn!(target: "audio", "choir voice ignored: {e}");
                    None
                }
            })
            .collect();
        ChoirGenerator {
            config,
            frequencies,
            sample,
            active: BTreeMap::new(),
        }
    }

    pub fn voice_count(&self) -> usize {
        self.frequencies.len()
    }

    pub fn frequency(&self, voice: VoiceId) -> Option<f64> {
        self.frequencies.get(voice).copied().flatten()
    }

    pub fn is_active(&self, voice: VoiceId) -> bool {
        self.active.contains_key(&voice)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn handle(&self, voice: VoiceId) -> Option<&VoiceHandle> {
        self.active.get(&voice)
    }

    pub fn sample(&self) -> &SampleSlot {
        &self.sample
    }

    /// Engage `voice`. Returns true if a new sound was started.
    pub fn start(&mut self, voice: VoiceId, ctx: &mut AudioContext) -> bool {
        if self.active.contains_key(&voice) {
            trace!(target: "audio", "voice {voice} already sounding");
            return false;
        }
        let Some(frequency) = self.frequency(voice) else {
            debug!(target: "audio", "unknown voice {voice}");
            return false;
        };
        let sample = match self.config.synthesis {
            ChoirSynthesis::Ensemble => None,
            ChoirSynthesis::Sample => match self.sample.get() {
                Some(buffer) => Some(buffer),
                None => {
                    debug!(target: "audio", "vocal sample not loaded, voice {voice} dropped");
                    return false;
                }
            },
        };
        let Some(mut device) = ctx.device() else {
            return false;
        };

        let now = device.now();
        let sound = self.voice_sound(&mut device, now);
        let (sound, pitch) = match sample {
            Some(buffer) => {
                let rate = frequency / self.config.sample_reference_frequency;
                let sr = sound.sample_rate();
                let source = Source::sample(buffer, AudioParam::new(rate), true, sr).start_at(now);
                (sound.source(source), rate)
            }
            None => (self.ensemble(sound, frequency, now), frequency),
        };

        let id = device.play(sound);
        debug!(target: "audio", "voice {voice} on at {frequency:.2} Hz");
        self.active.insert(
            voice,
            VoiceHandle {
                voice,
                sound: id,
                started_at: now,
                pitch,
            },
        );
        true
    }

    /// The shared stage every voice goes through: attack gate, low-pass,
    /// vibrato and reverb send.
    fn voice_sound(&self, device: &mut Device<'_>, now: f64) -> Sound {
        let c = &self.config;
        let gate = AudioParam::new(0.0)
            .set_value_at_time(0.0, now)
            .linear_ramp_to_value_at_time(c.peak_gain, now + c.attack);
        device
            .create_sound(now)
            .gain(gate)
            .lowpass(AudioParam::new(c.cutoff), c.q)
            .vibrato(Vibrato {
                rate_hz: c.vibrato_rate,
                depth_cents: c.vibrato_depth_cents,
            })
            .reverb_send(c.reverb_send)
    }

    fn ensemble(&self, mut sound: Sound, frequency: f64, now: f64) -> Sound {
        let c = &self.config;
        let sr = sound.sample_rate();
        let level = 1.0 / c.detune_cents.len().max(1) as f64;
        for &cents in &c.detune_cents {
            sound = sound.source(
                Source::oscillator(c.waveform, AudioParam::new(frequency), sr)
                    .detune(cents)
                    .gain(AudioParam::new(level))
                    .start_at(now),
            );
        }
        sound
    }

    /// Release `voice`. Returns false if it was not sounding.
    ///
    /// The gain is frozen where it is, ramped linearly to zero over the
    /// release time, and only then is the sound stopped.
    pub fn stop(&mut self, voice: VoiceId, ctx: &mut AudioContext) -> bool {
        let Some(handle) = self.active.remove(&voice) else {
            trace!(target: "audio", "voice {voice} not sounding");
            return false;
        };
        let Some(mut device) = ctx.device() else {
            return true;
        };
        let now = device.now();
        let silent_at = now + self.config.release;
        device.automate(
            handle.sound,
            ParamTarget::Gain,
            ParamEvent::CancelAndHold { time: now },
        );
        device.automate(
            handle.sound,
            ParamTarget::Gain,
            ParamEvent::LinearRamp {
                value: 0.0,
                time: silent_at,
            },
        );
        device.stop(handle.sound, silent_at + STOP_MARGIN);
        debug!(target: "audio", "voice {voice} released");
        true
    }

    /// Release every sounding voice.
    pub fn stop_all(&mut self, ctx: &mut AudioContext) {
        let voices: Vec<VoiceId> = self.active.keys().copied().collect();
        for voice in voices {
            self.stop(voice, ctx);
        }
    }
}
