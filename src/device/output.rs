//! Default output device through `cpal`.
//!
//! The renderer lives behind a mutex shared with the audio callback. The
//! control side only ever takes the lock to enqueue a command or read the
//! clock, so the callback never waits on anything slow.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use log::{error, info};

use crate::config::DeviceConfig;
use crate::dsp::engine::{Command, Renderer};
use crate::error::DeviceError;

use super::{lock, Driver, DriverOpener};

pub struct CpalDriver {
    stream: Option<cpal::Stream>,
    renderer: Arc<Mutex<Renderer>>,
    sample_rate: f64,
    running: bool,
}

impl CpalDriver {
    pub fn open(config: &DeviceConfig) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(DeviceError::NoOutputDevice)?;
        if let Ok(name) = device.name() {
            info!(target: "audio", "cpal device: {name}");
        }

        let supported = device
            .default_output_config()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;
        let format = supported.sample_format();
        let mut stream_config: StreamConfig = supported.into();
        if let Some(rate) = config.sample_rate {
            stream_config.sample_rate = cpal::SampleRate(rate);
        }
        let sample_rate = stream_config.sample_rate.0 as f64;
        let renderer = Arc::new(Mutex::new(Renderer::new(sample_rate, config)));

        let stream = match format {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, &renderer),
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, &renderer),
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, &renderer),
            other => return Err(DeviceError::UnsupportedFormat(format!("{other:?}"))),
        }?;

        let mut driver = CpalDriver {
            stream: Some(stream),
            renderer,
            sample_rate,
            running: false,
        };
        if !config.start_suspended {
            driver.resume()?;
        }
        Ok(driver)
    }

    pub fn opener() -> DriverOpener {
        Box::new(|config: &DeviceConfig| {
            CpalDriver::open(config).map(|d| Box::new(d) as Box<dyn Driver>)
        })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    renderer: &Arc<Mutex<Renderer>>,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let renderer = Arc::clone(renderer);
    let mut mono: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                mono.resize(frames, 0.0);
                lock(&renderer).render(&mut mono);
                for (frame, &s) in data.chunks_mut(channels).zip(&mono) {
                    for out in frame {
                        *out = T::from_sample(s);
                    }
                }
            },
            |err| error!(target: "audio", "output stream error: {err}"),
            None,
        )
        .map_err(|e| DeviceError::Stream(e.to_string()))
}

impl Driver for CpalDriver {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        lock(&self.renderer).current_time()
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn resume(&mut self) -> Result<(), DeviceError> {
        let stream = self.stream.as_ref().ok_or(DeviceError::Closed)?;
        stream
            .play()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;
        self.running = true;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), DeviceError> {
        let stream = self.stream.as_ref().ok_or(DeviceError::Closed)?;
        stream
            .pause()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;
        self.running = false;
        Ok(())
    }

    fn send(&mut self, command: Command) {
        lock(&self.renderer).enqueue(command);
    }

    fn close(&mut self) {
        self.stream = None;
        self.running = false;
    }
}
