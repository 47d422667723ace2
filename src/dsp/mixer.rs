//! Dry bus and reverb send bus for one render quantum.

#[derive(Debug, Clone)]
pub struct Mixer {
    pub master_gain: f32,
    dry: Vec<f32>,
    send: Vec<f32>,
}

impl Mixer {
    pub fn new(master_gain: f32, frames: usize) -> Self {
        Mixer {
            master_gain,
            dry: vec![0.0; frames],
            send: vec![0.0; frames],
        }
    }

    pub fn clear(&mut self) {
        self.dry.fill(0.0);
        self.send.fill(0.0);
    }

    /// Add a rendered sound to the dry bus and `send_level` of it to the send bus.
    pub fn add(&mut self, block: &[f64], send_level: f64) {
        for (d, &s) in self.dry.iter_mut().zip(block) {
            *d += s as f32;
        }
        if send_level > 0.0 {
            for (w, &s) in self.send.iter_mut().zip(block) {
                *w += (s * send_level) as f32;
            }
        }
    }

    pub fn send(&self) -> &[f32] {
        &self.send
    }

    pub fn dry_mut(&mut self) -> &mut [f32] {
        &mut self.dry
    }

    /// Master gain and soft clip into `out`.
    pub fn finish(&self, out: &mut [f32]) {
        for (o, &d) in out.iter_mut().zip(&self.dry) {
            *o = soft_clip(d * self.master_gain);
        }
    }
}

fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_and_sends() {
        let mut m = Mixer::new(1.0, 4);
        m.add(&[0.5, 0.0, 0.0, 0.0], 0.0);
        m.add(&[0.3, 1.0, 0.0, 0.0], 0.5);
        assert!((m.dry_mut()[0] - 0.8).abs() < 1e-6);
        let expected: [f32; 4] = [0.15, 0.5, 0.0, 0.0];
        for (got, want) in m.send().iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "send {got} != {want}");
        }

        let mut out = [0.0; 4];
        m.finish(&mut out);
        assert!((out[1] - 1.0_f32.tanh()).abs() < 1e-6);

        m.clear();
        assert!(m.send().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn soft_clip_bounds_output() {
        let mut m = Mixer::new(1.0, 1);
        m.add(&[100.0], 0.0);
        let mut out = [0.0];
        m.finish(&mut out);
        assert!(out[0] <= 1.0, "Soft clip should keep output <= 1.0, got {}", out[0]);
    }
}
