//! In-memory output rendered on demand.
//!
//! `OfflineOutput` is the caller's handle: it hands out a `DriverOpener` for
//! an `AudioContext` and pulls rendered audio afterwards. Useful for
//! bouncing to WAV and for asserting on real rendered output in tests.

use std::sync::{Arc, Mutex};

use log::debug;

use crate::config::DeviceConfig;
use crate::dsp::engine::{Command, Renderer};
use crate::dsp::renderer::render_wav;
use crate::error::DeviceError;

use super::{lock, Driver, DriverOpener};

#[derive(Debug, Default)]
struct Shared {
    renderer: Option<Renderer>,
    running: bool,
    closed: bool,
    opens: usize,
}

#[derive(Debug, Clone)]
pub struct OfflineOutput {
    default_sample_rate: f64,
    shared: Arc<Mutex<Shared>>,
}

impl OfflineOutput {
    pub fn new(default_sample_rate: f64) -> Self {
        OfflineOutput {
            default_sample_rate,
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    pub fn opener(&self) -> DriverOpener {
        let shared = Arc::clone(&self.shared);
        let fallback = self.default_sample_rate;
        Box::new(move |config: &DeviceConfig| {
            let sample_rate = config.sample_rate.map_or(fallback, f64::from);
            let mut state = lock(&shared);
            state.opens += 1;
            state.renderer = Some(Renderer::new(sample_rate, config));
            state.running = !config.start_suspended;
            state.closed = false;
            debug!(target: "audio", "offline output at {sample_rate} Hz");
            Ok(Box::new(OfflineDriver {
                shared: Arc::clone(&shared),
                sample_rate,
            }) as Box<dyn Driver>)
        })
    }

    /// Render `frames` frames. A device that is unopened, suspended or closed
    /// yields silence and its clock does not advance.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        let mut state = lock(&self.shared);
        if state.running && !state.closed {
            if let Some(renderer) = state.renderer.as_mut() {
                renderer.render(&mut out);
            }
        }
        out
    }

    pub fn render_seconds(&self, seconds: f64) -> Vec<f32> {
        let frames = (seconds * self.sample_rate()).round().max(0.0) as usize;
        self.render(frames)
    }

    /// Render `seconds` more output as a mono 16-bit WAV.
    pub fn bounce_wav(&self, seconds: f64) -> Option<Vec<u8>> {
        let mut state = lock(&self.shared);
        if !state.running || state.closed {
            return None;
        }
        state.renderer.as_mut().map(|r| render_wav(r, seconds))
    }

    pub fn sample_rate(&self) -> f64 {
        lock(&self.shared)
            .renderer
            .as_ref()
            .map_or(self.default_sample_rate, Renderer::sample_rate)
    }

    pub fn current_time(&self) -> f64 {
        lock(&self.shared)
            .renderer
            .as_ref()
            .map_or(0.0, Renderer::current_time)
    }

    pub fn active_sounds(&self) -> usize {
        lock(&self.shared)
            .renderer
            .as_ref()
            .map_or(0, Renderer::active_sounds)
    }

    pub fn is_running(&self) -> bool {
        let state = lock(&self.shared);
        state.running && !state.closed
    }

    pub fn opens(&self) -> usize {
        lock(&self.shared).opens
    }
}

struct OfflineDriver {
    shared: Arc<Mutex<Shared>>,
    sample_rate: f64,
}

impl Driver for OfflineDriver {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        lock(&self.shared)
            .renderer
            .as_ref()
            .map_or(0.0, Renderer::current_time)
    }

    fn is_running(&self) -> bool {
        lock(&self.shared).running
    }

    fn resume(&mut self) -> Result<(), DeviceError> {
        let mut state = lock(&self.shared);
        if state.closed {
            return Err(DeviceError::Closed);
        }
        state.running = true;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), DeviceError> {
        lock(&self.shared).running = false;
        Ok(())
    }

    fn send(&mut self, command: Command) {
        if let Some(renderer) = lock(&self.shared).renderer.as_mut() {
            renderer.enqueue(command);
        }
    }

    fn close(&mut self) {
        let mut state = lock(&self.shared);
        state.closed = true;
        state.running = false;
    }
}
