//! Low-pass biquad, same coefficients as WebAudio's `BiquadFilterNode`.

use std::f64::consts::PI;

/// Second-order low-pass (RBJ cookbook), Direct Form II Transposed.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    frequency: f64,
    q: f64,
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
    sample_rate: f64,
}

impl BiquadFilter {
    pub fn lowpass(frequency: f64, q: f64, sample_rate: f64) -> Self {
        let mut f = BiquadFilter {
            frequency,
            q,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
        };
        f.update_coefficients();
        f
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
        self.update_coefficients();
    }

    fn update_coefficients(&mut self) {
        let nyquist = self.sample_rate / 2.0;
        let cutoff = self.frequency.clamp(10.0, nyquist * 0.99);
        let w0 = 2.0 * PI * cutoff / self.sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * self.q.max(1e-4));

        let a0 = 1.0 + alpha;
        self.b1 = (1.0 - cos_w0) / a0;
        self.b0 = self.b1 / 2.0;
        self.b2 = self.b0;
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak_after_settle(f: &mut BiquadFilter, hz: f64) -> f64 {
        let sr = 48000.0;
        (0..4800)
            .map(|i| f.process((2.0 * PI * hz * i as f64 / sr).sin()))
            .skip(2400)
            .fold(0.0_f64, |m, s| m.max(s.abs()))
    }

    #[test]
    fn passes_dc() {
        let mut f = BiquadFilter::lowpass(1400.0, 1.2, 48000.0);
        let mut out = 0.0;
        for _ in 0..2000 {
            out = f.process(1.0);
        }
        assert!((out - 1.0).abs() < 1e-3, "Lowpass should pass DC, got {out}");
    }

    #[test]
    fn attenuates_above_cutoff() {
        let mut f = BiquadFilter::lowpass(300.0, 0.5, 48000.0);
        let high = peak_after_settle(&mut f, 8000.0);
        assert!(high < 0.01, "8 kHz should be strongly attenuated, got {high}");
    }

    #[test]
    fn cutoff_above_nyquist_stays_stable() {
        let mut f = BiquadFilter::lowpass(40000.0, 0.5, 48000.0);
        for i in 0..10000 {
            let out = f.process(if i % 64 == 0 { 1.0 } else { 0.0 });
            assert!(out.is_finite(), "Filter blew up at sample {i}");
        }
    }
}
