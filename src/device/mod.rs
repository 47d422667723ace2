//! The shared audio device context.
//!
//! `AudioContext` is created once at application start and owned by the
//! facade. It opens its `Driver` lazily on the first trigger (browsers only
//! allow audio after a user gesture), resumes it when suspended, and turns a
//! failed open into permanent silence rather than an error.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::dsp::engine::Command;
use crate::dsp::param::ParamEvent;
use crate::dsp::sound::{ParamTarget, Sound, SoundId};
use crate::error::DeviceError;

pub mod offline;
#[cfg(feature = "cpal-output")]
pub mod output;
#[cfg(test)]
pub mod testing;

/// A running output: something that renders `Command`s on its own clock.
pub trait Driver {
    fn sample_rate(&self) -> f64;
    /// Device clock in seconds.
    fn current_time(&self) -> f64;
    fn is_running(&self) -> bool;
    fn resume(&mut self) -> Result<(), DeviceError>;
    fn suspend(&mut self) -> Result<(), DeviceError>;
    fn send(&mut self, command: Command);
    fn close(&mut self);
}

pub type DriverOpener = Box<dyn FnMut(&DeviceConfig) -> Result<Box<dyn Driver>, DeviceError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Uninitialized,
    Suspended,
    Running,
    Closed,
    /// Opening failed; stays silent for the rest of the session.
    Unavailable,
}

pub struct AudioContext {
    config: DeviceConfig,
    opener: DriverOpener,
    driver: Option<Box<dyn Driver>>,
    state: DeviceState,
    /// Why the open failed, once it has.
    failure: Option<DeviceError>,
    next_id: SoundId,
}

impl fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioContext")
            .field("state", &self.state)
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl AudioContext {
    pub fn new(config: DeviceConfig, opener: DriverOpener) -> Self {
        AudioContext {
            config,
            opener,
            driver: None,
            state: DeviceState::Uninitialized,
            failure: None,
            next_id: 1,
        }
    }

    /// A context whose device can never be opened.
    pub fn silent(config: DeviceConfig) -> Self {
        AudioContext::new(config, Box::new(|_| Err(DeviceError::NoOutputDevice)))
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// The device, opened on first use and resumed if suspended. `None` when
    /// the device is unavailable or closed.
    pub fn device(&mut self) -> Option<Device<'_>> {
        match self.state {
            DeviceState::Closed | DeviceState::Unavailable => return None,
            DeviceState::Uninitialized => self.open(),
            DeviceState::Suspended => self.resume(),
            DeviceState::Running => {}
        }
        let driver = self.driver.as_mut()?;
        Some(Device {
            driver,
            next_id: &mut self.next_id,
        })
    }

    fn open(&mut self) {
        match (self.opener)(&self.config) {
            Ok(driver) => {
                info!(target: "audio", "output opened at {} Hz", driver.sample_rate());
                self.state = if driver.is_running() {
                    DeviceState::Running
                } else {
                    DeviceState::Suspended
                };
                self.driver = Some(driver);
                if self.state == DeviceState::Suspended {
                    self.resume();
                }
            }
            Err(e) => {
                warn!(target: "audio", "audio unavailable, continuing silently: {e}");
                self.state = DeviceState::Unavailable;
                self.failure = Some(e);
            }
        }
    }

    /// Open or resume the device now, reporting why it cannot be used.
    /// Triggers do the same thing silently.
    pub fn open_now(&mut self) -> Result<(), DeviceError> {
        if self.device().is_some() {
            return Ok(());
        }
        Err(match self.state {
            DeviceState::Closed => DeviceError::Closed,
            _ => self.failure.clone().unwrap_or(DeviceError::NoOutputDevice),
        })
    }

    /// Fire-and-forget: a failed resume leaves the device suspended and the
    /// next trigger tries again.
    fn resume(&mut self) {
        let Some(driver) = self.driver.as_mut() else {
            return;
        };
        match driver.resume() {
            Ok(()) => self.state = DeviceState::Running,
            Err(e) => warn!(target: "audio", "resume failed: {e}"),
        }
    }

    /// Pause output, e.g. while the page is hidden. Sounds keep their
    /// schedule on the device clock.
    pub fn suspend(&mut self) {
        if self.state != DeviceState::Running {
            return;
        }
        if let Some(driver) = self.driver.as_mut() {
            match driver.suspend() {
                Ok(()) => self.state = DeviceState::Suspended,
                Err(e) => warn!(target: "audio", "suspend failed: {e}"),
            }
        }
    }

    /// Release the device. Later calls and later triggers are no-ops.
    pub fn close(&mut self) {
        if self.state == DeviceState::Closed {
            return;
        }
        if let Some(mut driver) = self.driver.take() {
            driver.close();
            debug!(target: "audio", "output closed");
        }
        self.state = DeviceState::Closed;
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.close();
    }
}

/// Borrowed access to an open device for scheduling one trigger's sounds.
pub struct Device<'a> {
    driver: &'a mut Box<dyn Driver>,
    next_id: &'a mut SoundId,
}

impl Device<'_> {
    pub fn now(&self) -> f64 {
        self.driver.current_time()
    }

    pub fn sample_rate(&self) -> f64 {
        self.driver.sample_rate()
    }

    /// An empty sound with a fresh id, starting at `start`.
    pub fn create_sound(&mut self, start: f64) -> Sound {
        let id = *self.next_id;
        *self.next_id += 1;
        Sound::new(id, self.sample_rate(), start)
    }

    pub fn play(&mut self, sound: Sound) -> SoundId {
        let id = sound.id();
        self.driver.send(Command::Start(Box::new(sound)));
        id
    }

    pub fn automate(&mut self, id: SoundId, param: ParamTarget, event: ParamEvent) {
        self.driver.send(Command::Automate { id, param, event });
    }

    pub fn stop(&mut self, id: SoundId, at: f64) {
        self.driver.send(Command::Stop { id, at });
    }
}

/// Lock that survives a panicked holder; the renderer state stays usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::testing::Recorder;
    use super::*;

    #[test]
    fn opens_lazily_once() {
        let recorder = Recorder::new();
        let mut ctx = AudioContext::new(DeviceConfig::default(), recorder.opener());
        assert_eq!(ctx.state(), DeviceState::Uninitialized);
        assert_eq!(recorder.opens(), 0);

        assert!(ctx.device().is_some());
        assert!(ctx.device().is_some());
        assert_eq!(recorder.opens(), 1);
        assert_eq!(ctx.state(), DeviceState::Running);
    }

    #[test]
    fn failed_open_is_silent_forever() {
        let recorder = Recorder::failing();
        let mut ctx = AudioContext::new(DeviceConfig::default(), recorder.opener());
        assert!(ctx.device().is_none());
        assert!(ctx.device().is_none());
        assert_eq!(ctx.state(), DeviceState::Unavailable);
        assert_eq!(recorder.opens(), 1, "No retry after a failed open");
    }

    #[test]
    fn suspended_device_resumes_on_use() {
        let recorder = Recorder::new();
        let config = DeviceConfig {
            start_suspended: true,
            ..DeviceConfig::default()
        };
        let mut ctx = AudioContext::new(config, recorder.opener());
        assert!(ctx.device().is_some());
        assert_eq!(ctx.state(), DeviceState::Running);
        assert_eq!(recorder.resumes(), 1);

        ctx.suspend();
        assert_eq!(ctx.state(), DeviceState::Suspended);
        assert!(ctx.device().is_some());
        assert_eq!(recorder.resumes(), 2);
    }

    #[test]
    fn close_is_idempotent() {
        let recorder = Recorder::new();
        let mut ctx = AudioContext::new(DeviceConfig::default(), recorder.opener());
        ctx.device();
        ctx.close();
        ctx.close();
        assert_eq!(ctx.state(), DeviceState::Closed);
        assert_eq!(recorder.closes(), 1);
        assert!(ctx.device().is_none());
    }

    #[test]
    fn open_now_reports_failures() {
        let mut ctx = AudioContext::new(DeviceConfig::default(), Recorder::failing().opener());
        assert_eq!(ctx.open_now(), Err(DeviceError::NoOutputDevice));

        let recorder = Recorder::new();
        let mut ctx = AudioContext::new(DeviceConfig::default(), recorder.opener());
        assert_eq!(ctx.open_now(), Ok(()));
        assert_eq!(ctx.state(), DeviceState::Running);
        ctx.close();
        assert_eq!(ctx.open_now(), Err(DeviceError::Closed));
        assert_eq!(recorder.opens(), 1);
    }

    #[test]
    fn close_before_open_never_opens() {
        let recorder = Recorder::new();
        let mut ctx = AudioContext::new(DeviceConfig::default(), recorder.opener());
        ctx.close();
        assert!(ctx.device().is_none());
        assert_eq!(recorder.opens(), 0);
    }

    #[test]
    fn sound_ids_are_fresh() {
        let recorder = Recorder::new();
        let mut ctx = AudioContext::new(DeviceConfig::default(), recorder.opener());
        let mut device = ctx.device().unwrap();
        let a = device.create_sound(0.0);
        let b = device.create_sound(0.0);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn silent_context_never_yields_device() {
        let mut ctx = AudioContext::silent(DeviceConfig::default());
        assert!(ctx.device().is_none());
        assert_eq!(ctx.state(), DeviceState::Unavailable);
    }
}
