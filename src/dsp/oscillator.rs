//! Band-limited oscillators (PolyBLEP).

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Phase-accumulating oscillator. Frequency and detune are set by the caller
/// every sample so automation can drive them.
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f64,
    /// Cents.
    pub detune: f64,
    phase: f64,
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, sample_rate: f64) -> Self {
        Oscillator {
            waveform,
            frequency: 440.0,
            detune: 0.0,
            phase: 0.0,
            sample_rate,
        }
    }

    fn increment(&self) -> f64 {
        let hz = self.frequency * 2f64.powf(self.detune / 1200.0);
        (hz / self.sample_rate).clamp(0.0, 0.5)
    }

    pub fn next_sample(&mut self) -> f64 {
        let dt = self.increment();
        let p = self.phase;
        let out = match self.waveform {
            Waveform::Sine => (TAU * p).sin(),
            Waveform::Sawtooth => 2.0 * p - 1.0 - poly_blep(p, dt),
            Waveform::Square => {
                let naive = if p < 0.5 { 1.0 } else { -1.0 };
                naive + poly_blep(p, dt) - poly_blep((p + 0.5).fract(), dt)
            }
            // Continuous, so the corner harmonics fall off fast enough unaided.
            Waveform::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
        };

        self.phase = (p + dt).fract();
        out
    }
}

/// Two-sample polynomial residual smoothing a unit step at phase wrap.
fn poly_blep(t: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        let x = t / dt;
        2.0 * x - x * x - 1.0
    } else if t > 1.0 - dt {
        let x = (t - 1.0) / dt;
        x * x + 2.0 * x + 1.0
    } else {
        0.0
    }
}
