//! Recorded-sample playback with rate-based pitch shifting.
//!
//! A `SamplePlayer` reads a shared `SampleBuffer` at a fractional position,
//! advancing by `playback_rate * buffer_rate / engine_rate` per output frame
//! and interpolating linearly between neighbours.

use std::sync::Arc;

/// Mono PCM held in memory, shared between every voice that plays it.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    pub data: Vec<f32>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(data: Vec<f32>, sample_rate: u32) -> Self {
        SampleBuffer { data, sample_rate }
    }

    /// Average interleaved frames down to one channel.
    pub fn from_interleaved(samples: &[f32], channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let data = samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();
        SampleBuffer { data, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.sample_rate.max(1) as f64
    }

    pub fn read_interpolated(&self, position: f64) -> f64 {
        if position < 0.0 {
            return 0.0;
        }
        let idx = position as usize;
        match (self.data.get(idx), self.data.get(idx + 1)) {
            (Some(&a), Some(&b)) => {
                let frac = position - idx as f64;
                a as f64 * (1.0 - frac) + b as f64 * frac
            }
            (Some(&a), None) => a as f64,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SamplePlayer {
    buffer: Arc<SampleBuffer>,
    position: f64,
    rate_ratio: f64,
    looped: bool,
    finished: bool,
}

impl SamplePlayer {
    pub fn new(buffer: Arc<SampleBuffer>, looped: bool, engine_sample_rate: f64) -> Self {
        let rate_ratio = buffer.sample_rate as f64 / engine_sample_rate;
        SamplePlayer {
            buffer,
            position: 0.0,
            rate_ratio,
            looped,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next output frame at the given playback rate (1.0 = recorded pitch).
    pub fn next_sample(&mut self, playback_rate: f64) -> f64 {
        if self.finished {
            return 0.0;
        }
        let out = self.buffer.read_interpolated(self.position);
        self.position += playback_rate.max(0.0) * self.rate_ratio;

        let len = self.buffer.len() as f64;
        if self.position >= len {
            if self.looped && len > 0.0 {
                self.position %= len;
            } else {
                self.finished = true;
            }
        }
        out
    }
}
