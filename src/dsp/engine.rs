//! Realtime renderer.
//!
//! Owns every sounding `Sound` plus the shared effects, and produces mono
//! output in fixed render quanta. The control side never touches a sound
//! after handing it over; it talks to the renderer only through `Command`s,
//! which are applied in arrival order at the next quantum boundary.

use log::{debug, trace};

use crate::config::DeviceConfig;

use super::compressor::Compressor;
use super::mixer::Mixer;
use super::param::ParamEvent;
use super::reverb::{ConvolutionReverb, ImpulseResponse};
use super::sound::{ParamTarget, Sound, SoundId};

/// Frames per render quantum, as in WebAudio.
pub const RENDER_QUANTUM: usize = 128;

#[derive(Debug, Clone)]
pub enum Command {
    Start(Box<Sound>),
    Automate {
        id: SoundId,
        param: ParamTarget,
        event: ParamEvent,
    },
    Stop { id: SoundId, at: f64 },
}

#[derive(Debug)]
struct SharedReverb {
    convolver: ConvolutionReverb,
    wet: f32,
}

#[derive(Debug)]
pub struct Renderer {
    sample_rate: f64,
    frames: u64,
    max_sounds: usize,
    sounds: Vec<Sound>,
    pending: Vec<Command>,
    mixer: Mixer,
    reverb: Option<SharedReverb>,
    compressor: Option<Compressor>,
    voice_buf: Vec<f64>,
    wet_buf: Vec<f32>,
    quantum: Vec<f32>,
    /// Read position into `quantum`; `RENDER_QUANTUM` when drained.
    cursor: usize,
}

impl Renderer {
    pub fn new(sample_rate: f64, config: &DeviceConfig) -> Self {
        let reverb = config.reverb.as_ref().map(|r| {
            let ir = ImpulseResponse::synthesize(sample_rate, r.duration, r.decay, r.seed)
                .normalized(sample_rate);
            debug!(target: "audio", "reverb impulse: {} frames", ir.len());
            SharedReverb {
                convolver: ConvolutionReverb::new(&ir, RENDER_QUANTUM),
                wet: r.wet,
            }
        });
        let compressor = config.compressor.as_ref().map(|c| {
            Compressor::new(sample_rate, c.threshold, c.knee, c.ratio, c.attack, c.release)
        });

        Renderer {
            sample_rate,
            frames: 0,
            max_sounds: config.max_sounds,
            sounds: Vec::new(),
            pending: Vec::new(),
            mixer: Mixer::new(config.master_gain, RENDER_QUANTUM),
            reverb,
            compressor,
            voice_buf: vec![0.0; RENDER_QUANTUM],
            wet_buf: vec![0.0; RENDER_QUANTUM],
            quantum: vec![0.0; RENDER_QUANTUM],
            cursor: RENDER_QUANTUM,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Device clock: seconds of audio rendered so far.
    pub fn current_time(&self) -> f64 {
        self.frames as f64 / self.sample_rate
    }

    pub fn active_sounds(&self) -> usize {
        self.sounds.len()
    }

    pub fn enqueue(&mut self, command: Command) {
        self.pending.push(command);
    }

    /// Fill `out` with mono samples, rendering new quanta as needed.
    pub fn render(&mut self, out: &mut [f32]) {
        let mut written = 0;
        while written < out.len() {
            if self.cursor == RENDER_QUANTUM {
                self.render_quantum();
            }
            let n = (RENDER_QUANTUM - self.cursor).min(out.len() - written);
            out[written..written + n]
                .copy_from_slice(&self.quantum[self.cursor..self.cursor + n]);
            self.cursor += n;
            written += n;
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Start(sound) => {
                if self.sounds.len() >= self.max_sounds {
                    debug!(
                        target: "audio",
                        "sound limit {} reached, dropping sound {}",
                        self.max_sounds,
                        sound.id()
                    );
                    return;
                }
                trace!(target: "audio", "start sound {} at {:.3}", sound.id(), sound.start_time());
                self.sounds.push(*sound);
            }
            Command::Automate { id, param, event } => {
                if let Some(sound) = self.sounds.iter_mut().find(|s| s.id() == id) {
                    sound.automate(param, event);
                }
            }
            Command::Stop { id, at } => {
                if let Some(sound) = self.sounds.iter_mut().find(|s| s.id() == id) {
                    sound.set_stop(at);
                }
            }
        }
    }

    fn render_quantum(&mut self) {
        for command in std::mem::take(&mut self.pending) {
            self.apply(command);
        }

        let t0 = self.current_time();
        self.mixer.clear();
        for sound in &mut self.sounds {
            sound.render(t0, &mut self.voice_buf);
            self.mixer.add(&self.voice_buf, sound.send_level());
        }

        if let Some(reverb) = &mut self.reverb {
            reverb
                .convolver
                .process_block(self.mixer.send(), &mut self.wet_buf);
            for (d, &w) in self.mixer.dry_mut().iter_mut().zip(&self.wet_buf) {
                *d += w * reverb.wet;
            }
        }
        if let Some(compressor) = &mut self.compressor {
            compressor.process_block(self.mixer.dry_mut());
        }
        self.mixer.finish(&mut self.quantum);

        self.frames += RENDER_QUANTUM as u64;
        self.cursor = 0;

        let now = self.current_time();
        let before = self.sounds.len();
        self.sounds.retain(|s| !s.is_finished(now));
        if self.sounds.len() != before {
            trace!(target: "audio", "{} sounds finished", before - self.sounds.len());
        }
    }
}
