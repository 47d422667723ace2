//! A scheduled sound: a handful of sources summed through one gain stage and
//! an optional low-pass, with start and stop times on the device clock.
//!
//! Sounds are assembled on the control side and handed to the renderer whole;
//! after that they are only reachable through `Command`s addressed by id.

use std::f64::consts::TAU;
use std::sync::Arc;

use super::filter::BiquadFilter;
use super::oscillator::{Oscillator, Waveform};
use super::param::{AudioParam, ParamEvent};
use super::sampler::{SampleBuffer, SamplePlayer};

pub type SoundId = u64;

/// Parameters reachable by automation after a sound has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamTarget {
    Gain,
    FilterFrequency,
}

#[derive(Debug, Clone)]
enum Generator {
    Oscillator { osc: Oscillator, frequency: AudioParam },
    Sample { player: SamplePlayer, playback_rate: AudioParam },
}

#[derive(Debug, Clone)]
pub struct Source {
    generator: Generator,
    detune: f64,
    gain: AudioParam,
    start: f64,
    stop: f64,
}

impl Source {
    pub fn oscillator(waveform: Waveform, frequency: AudioParam, sample_rate: f64) -> Self {
        Source::with_generator(Generator::Oscillator {
            osc: Oscillator::new(waveform, sample_rate),
            frequency,
        })
    }

    pub fn sample(
        buffer: Arc<SampleBuffer>,
        playback_rate: AudioParam,
        looped: bool,
        sample_rate: f64,
    ) -> Self {
        Source::with_generator(Generator::Sample {
            player: SamplePlayer::new(buffer, looped, sample_rate),
            playback_rate,
        })
    }

    fn with_generator(generator: Generator) -> Self {
        Source {
            generator,
            detune: 0.0,
            gain: AudioParam::new(1.0),
            start: f64::NEG_INFINITY,
            stop: f64::INFINITY,
        }
    }

    pub fn detune(mut self, cents: f64) -> Self {
        self.detune = cents;
        self
    }

    pub fn gain(mut self, gain: AudioParam) -> Self {
        self.gain = gain;
        self
    }

    pub fn start_at(mut self, time: f64) -> Self {
        self.start = time;
        self
    }

    pub fn stop_at(mut self, time: f64) -> Self {
        self.stop = time;
        self
    }

    fn next_sample(&mut self, t: f64, vibrato_cents: f64) -> f64 {
        if t < self.start || t >= self.stop {
            return 0.0;
        }
        let cents = self.detune + vibrato_cents;
        let raw = match &mut self.generator {
            Generator::Oscillator { osc, frequency } => {
                osc.frequency = frequency.value_at(t);
                osc.detune = cents;
                osc.next_sample()
            }
            Generator::Sample {
                player,
                playback_rate,
            } => {
                let rate = playback_rate.value_at(t) * 2f64.powf(cents / 1200.0);
                player.next_sample(rate)
            }
        };
        raw * self.gain.value_at(t)
    }

    /// Frequency (or playback rate) the source is scheduled at, at time `t`.
    pub fn pitch_at(&self, t: f64) -> f64 {
        match &self.generator {
            Generator::Oscillator { frequency, .. } => frequency.value_at(t),
            Generator::Sample { playback_rate, .. } => playback_rate.value_at(t),
        }
    }
}

/// Slow pitch wobble shared by every source of a sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vibrato {
    pub rate_hz: f64,
    pub depth_cents: f64,
}

#[derive(Debug, Clone)]
struct Lowpass {
    filter: BiquadFilter,
    frequency: AudioParam,
}

#[derive(Debug, Clone)]
pub struct Sound {
    id: SoundId,
    sources: Vec<Source>,
    gain: AudioParam,
    lowpass: Option<Lowpass>,
    vibrato: Option<Vibrato>,
    vibrato_phase: f64,
    reverb_send: f64,
    start: f64,
    stop: Option<f64>,
    sample_rate: f64,
}

impl Sound {
    pub fn new(id: SoundId, sample_rate: f64, start: f64) -> Self {
        Sound {
            id,
            sources: Vec::new(),
            gain: AudioParam::new(1.0),
            lowpass: None,
            vibrato: None,
            vibrato_phase: 0.0,
            reverb_send: 0.0,
            start,
            stop: None,
            sample_rate,
        }
    }

    pub fn source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    pub fn gain(mut self, gain: AudioParam) -> Self {
        self.gain = gain;
        self
    }

    pub fn lowpass(mut self, frequency: AudioParam, q: f64) -> Self {
        let initial = frequency.value_at(self.start);
        self.lowpass = Some(Lowpass {
            filter: BiquadFilter::lowpass(initial, q, self.sample_rate),
            frequency,
        });
        self
    }

    pub fn vibrato(mut self, vibrato: Vibrato) -> Self {
        self.vibrato = Some(vibrato);
        self
    }

    pub fn reverb_send(mut self, level: f64) -> Self {
        self.reverb_send = level.max(0.0);
        self
    }

    pub fn stop_at(mut self, time: f64) -> Self {
        self.set_stop(time);
        self
    }

    pub fn id(&self) -> SoundId {
        self.id
    }

    pub fn start_time(&self) -> f64 {
        self.start
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn send_level(&self) -> f64 {
        self.reverb_send
    }

    pub fn gain_at(&self, t: f64) -> f64 {
        self.gain.value_at(t)
    }

    pub fn filter_frequency_at(&self, t: f64) -> Option<f64> {
        self.lowpass.as_ref().map(|lp| lp.frequency.value_at(t))
    }

    pub fn automate(&mut self, target: ParamTarget, event: ParamEvent) {
        match target {
            ParamTarget::Gain => self.gain.schedule(event),
            ParamTarget::FilterFrequency => {
                if let Some(lp) = &mut self.lowpass {
                    lp.frequency.schedule(event);
                }
            }
        }
    }

    /// Schedule the end of the sound. An earlier stop wins.
    pub fn set_stop(&mut self, time: f64) {
        self.stop = Some(self.stop.map_or(time, |s| s.min(time)));
    }

    /// When the sound stops producing output, if that is known yet.
    pub fn end_time(&self) -> Option<f64> {
        let sources_end = self
            .sources
            .iter()
            .map(|s| s.stop)
            .fold(f64::NEG_INFINITY, f64::max);
        match self.stop {
            Some(stop) => Some(stop.min(sources_end)),
            None if sources_end.is_finite() => Some(sources_end),
            None if self.sources.is_empty() => Some(self.start),
            None => None,
        }
    }

    pub fn is_finished(&self, t: f64) -> bool {
        self.end_time().is_some_and(|end| t >= end)
    }

    /// Render `out.len()` frames starting at device time `t0`.
    pub fn render(&mut self, t0: f64, out: &mut [f64]) {
        let dt = 1.0 / self.sample_rate;
        let end = self.end_time().unwrap_or(f64::INFINITY);

        for (i, frame) in out.iter_mut().enumerate() {
            let t = t0 + i as f64 * dt;
            if t < self.start || t >= end {
                *frame = 0.0;
                continue;
            }

            let vibrato_cents = match self.vibrato {
                Some(v) => {
                    let cents = v.depth_cents * (TAU * self.vibrato_phase).sin();
                    self.vibrato_phase = (self.vibrato_phase + v.rate_hz * dt).fract();
                    cents
                }
                None => 0.0,
            };

            let mut sum = 0.0;
            for source in &mut self.sources {
                sum += source.next_sample(t, vibrato_cents);
            }

            let mut y = sum * self.gain.value_at(t);
            if let Some(lp) = &mut self.lowpass {
                let cutoff = lp.frequency.value_at(t);
                if (cutoff - lp.filter.frequency()).abs() > lp.filter.frequency() * 1e-3 {
                    lp.filter.set_frequency(cutoff);
                }
                y = lp.filter.process(y);
            }
            *frame = y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 48000.0;

    fn sine(frequency: f64) -> Source {
        Source::oscillator(Waveform::Sine, AudioParam::new(frequency), SR)
    }

    fn peak(buf: &[f64]) -> f64 {
        buf.iter().fold(0.0_f64, |m, s| m.max(s.abs()))
    }

    #[test]
    fn silent_before_start_and_after_stop() {
        let mut sound = Sound::new(1, SR, 0.01).source(sine(440.0)).stop_at(0.02);
        let mut buf = vec![0.0; 1440];
        sound.render(0.0, &mut buf);
        assert_eq!(peak(&buf[..470]), 0.0, "Sound should be silent before its start");
        assert_eq!(peak(&buf[970..]), 0.0, "Sound should be silent after its stop");
        assert!(peak(&buf[500..900]) > 0.5);
    }

    #[test]
    fn end_time_follows_sources() {
        let sound = Sound::new(1, SR, 0.0)
            .source(sine(440.0).stop_at(1.0))
            .source(sine(880.0).stop_at(2.5));
        assert_eq!(sound.end_time(), Some(2.5));

        let sustained = Sound::new(2, SR, 0.0).source(sine(440.0));
        assert_eq!(sustained.end_time(), None);
        assert!(!sustained.is_finished(1e6));
    }

    #[test]
    fn earlier_stop_wins() {
        let mut sound = Sound::new(1, SR, 0.0).source(sine(440.0)).stop_at(3.0);
        sound.set_stop(1.0);
        sound.set_stop(2.0);
        assert_eq!(sound.end_time(), Some(1.0));
    }

    #[test]
    fn gain_automation_fades_out() {
        let mut sound = Sound::new(1, SR, 0.0)
            .source(sine(440.0))
            .gain(AudioParam::new(1.0));
        sound.automate(ParamTarget::Gain, ParamEvent::CancelAndHold { time: 0.0 });
        sound.automate(
            ParamTarget::Gain,
            ParamEvent::LinearRamp { value: 0.0, time: 0.01 },
        );
        let mut buf = vec![0.0; 960];
        sound.render(0.0, &mut buf);
        assert!(peak(&buf[..240]) > 0.4);
        assert!(peak(&buf[480..]) < 1e-9, "Gain should reach zero after the ramp");
    }

    #[test]
    fn filter_automation_requires_filter() {
        let mut sound = Sound::new(1, SR, 0.0).source(sine(440.0));
        sound.automate(
            ParamTarget::FilterFrequency,
            ParamEvent::SetValue { value: 100.0, time: 0.0 },
        );
        assert_eq!(sound.filter_frequency_at(1.0), None);
    }
}
