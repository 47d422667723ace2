//! Convolution reverb.
//!
//! The impulse response is synthesized (decaying noise) rather than loaded,
//! and convolved with uniformly partitioned overlap-save FFT convolution:
//! one partition per render block, so the latency is zero and the cost per
//! block is one forward FFT, one inverse FFT and a multiply-add per partition.

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Loudness calibration applied when normalizing an impulse response.
const GAIN_CALIBRATION: f32 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44100.0;
const MIN_POWER: f32 = 0.000125;

#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    data: Vec<f32>,
}

impl ImpulseResponse {
    /// White noise shaped by `(1 - t/len)^decay`.
    pub fn synthesize(sample_rate: f64, duration: f64, decay: f64, seed: u64) -> Self {
        let len = ((sample_rate * duration) as usize).max(1);
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..len)
            .map(|i| {
                let noise: f32 = rng.gen_range(-1.0..1.0);
                let envelope = (1.0 - i as f64 / len as f64).powf(decay);
                noise * envelope as f32
            })
            .collect();
        ImpulseResponse { data }
    }

    pub fn from_samples(data: Vec<f32>) -> Self {
        ImpulseResponse { data }
    }

    /// Scale to a consistent perceived loudness regardless of length.
    pub fn normalized(mut self, sample_rate: f64) -> Self {
        let n = self.data.len().max(1) as f32;
        let power = (self.data.iter().map(|s| s * s).sum::<f32>() / n).sqrt();
        let mut scale = GAIN_CALIBRATION / power.max(MIN_POWER);
        scale *= GAIN_CALIBRATION_SAMPLE_RATE / sample_rate as f32;
        for s in &mut self.data {
            *s *= scale;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn samples(&self) -> &[f32] {
        &self.data
    }
}

pub struct ConvolutionReverb {
    block: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    /// Spectra of the zero-padded impulse partitions.
    partitions: Vec<Vec<Complex<f32>>>,
    /// Input spectra, newest at `head`.
    history: Vec<Vec<Complex<f32>>>,
    head: usize,
    /// Previous and current input block, time domain.
    window: Vec<f32>,
    accum: Vec<Complex<f32>>,
}

impl fmt::Debug for ConvolutionReverb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvolutionReverb")
            .field("block", &self.block)
            .field("partitions", &self.partitions.len())
            .finish()
    }
}

impl ConvolutionReverb {
    pub fn new(ir: &ImpulseResponse, block: usize) -> Self {
        let block = block.max(1);
        let fft_len = block * 2;
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);

        let partitions: Vec<Vec<Complex<f32>>> = ir
            .samples()
            .chunks(block)
            .map(|chunk| {
                let mut spectrum = vec![Complex::new(0.0, 0.0); fft_len];
                for (bin, &s) in spectrum.iter_mut().zip(chunk) {
                    bin.re = s;
                }
                forward.process(&mut spectrum);
                spectrum
            })
            .collect();
        let count = partitions.len().max(1);

        ConvolutionReverb {
            block,
            forward,
            inverse,
            partitions,
            history: vec![vec![Complex::new(0.0, 0.0); fft_len]; count],
            head: 0,
            window: vec![0.0; fft_len],
            accum: vec![Complex::new(0.0, 0.0); fft_len],
        }
    }

    pub fn block_size(&self) -> usize {
        self.block
    }

    /// Convolve one block. `input` and `output` must be `block_size()` long.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        let b = self.block;
        debug_assert_eq!(input.len(), b);
        debug_assert_eq!(output.len(), b);

        if self.partitions.is_empty() {
            output.fill(0.0);
            return;
        }

        self.window.copy_within(b.., 0);
        self.window[b..].copy_from_slice(&input[..b]);

        let spectrum = &mut self.history[self.head];
        for (bin, &s) in spectrum.iter_mut().zip(&self.window) {
            *bin = Complex::new(s, 0.0);
        }
        self.forward.process(spectrum);

        let count = self.history.len();
        self.accum.fill(Complex::new(0.0, 0.0));
        for (k, partition) in self.partitions.iter().enumerate() {
            let x = &self.history[(self.head + count - k) % count];
            for ((acc, &xv), &hv) in self.accum.iter_mut().zip(x).zip(partition) {
                *acc += xv * hv;
            }
        }
        self.head = (self.head + 1) % count;

        self.inverse.process(&mut self.accum);
        let scale = 1.0 / (2 * b) as f32;
        for (out, bin) in output.iter_mut().zip(&self.accum[b..]) {
            *out = bin.re * scale;
        }
    }
}
