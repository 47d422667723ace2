//! Master bus compressor, DynamicsCompressorNode-style soft-knee curve.

/// Feed-forward peak compressor for the mono master bus.
#[derive(Debug, Clone)]
pub struct Compressor {
    /// dB
    pub threshold: f64,
    pub ratio: f64,
    /// Knee width in dB; 0 is a hard knee.
    pub knee: f64,
    attack_coef: f64,
    release_coef: f64,
    envelope: f64,
}

impl Compressor {
    pub fn new(
        sample_rate: f64,
        threshold: f64,
        knee: f64,
        ratio: f64,
        attack: f64,
        release: f64,
    ) -> Self {
        let coef = |seconds: f64| (-1.0 / (seconds * sample_rate)).exp();
        Compressor {
            threshold: threshold.clamp(-100.0, 0.0),
            ratio: ratio.clamp(1.0, 20.0),
            knee: knee.clamp(0.0, 40.0),
            attack_coef: coef(attack.clamp(1e-4, 1.0)),
            release_coef: coef(release.clamp(1e-3, 5.0)),
            envelope: 0.0,
        }
    }

    /// Gain change in dB (zero or negative) for a detector level in dB.
    fn gain_reduction(&self, level_db: f64) -> f64 {
        let slope = 1.0 - 1.0 / self.ratio;
        let half = self.knee / 2.0;
        let over = level_db - self.threshold;

        if over <= -half {
            0.0
        } else if over >= half {
            -over * slope
        } else {
            let x = over + half;
            -slope * x * x / (2.0 * self.knee)
        }
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let level = input.abs() as f64;
        let coef = if level > self.envelope {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.envelope = coef * self.envelope + (1.0 - coef) * level;

        let level_db = if self.envelope <= 1e-6 {
            -120.0
        } else {
            20.0 * self.envelope.log10()
        };
        let gain = 10f64.powf(self.gain_reduction(level_db) / 20.0);
        input * gain as f32
    }

    pub fn process_block(&mut self, block: &mut [f32]) {
        for s in block {
            *s = self.process(*s);
        }
    }

    /// Current gain reduction in dB, positive.
    pub fn reduction_db(&self) -> f64 {
        let level_db = if self.envelope <= 1e-6 {
            -120.0
        } else {
            20.0 * self.envelope.log10()
        };
        -self.gain_reduction(level_db)
    }
}
