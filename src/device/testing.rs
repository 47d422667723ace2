//! Test double that records everything sent to the device.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::DeviceConfig;
use crate::dsp::engine::Command;
use crate::dsp::sound::Sound;
use crate::error::DeviceError;

use super::{Driver, DriverOpener};

pub const SAMPLE_RATE: f64 = 48000.0;

#[derive(Debug, Default)]
struct Log {
    fail_open: bool,
    opens: usize,
    resumes: usize,
    closes: usize,
    running: bool,
    now: f64,
    commands: Vec<Command>,
}

/// Shared view of a recording driver. Counts opens, resumes and closes, and
/// keeps every command in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    log: Rc<RefCell<Log>>,
}

impl Recorder {
    pub fn new() -> Self {
        Recorder::default()
    }

    /// Every open attempt fails with `NoOutputDevice`.
    pub fn failing() -> Self {
        let recorder = Recorder::default();
        recorder.log.borrow_mut().fail_open = true;
        recorder
    }

    pub fn opener(&self) -> DriverOpener {
        let log = Rc::clone(&self.log);
        Box::new(move |config: &DeviceConfig| {
            let mut state = log.borrow_mut();
            state.opens += 1;
            if state.fail_open {
                return Err(DeviceError::NoOutputDevice);
            }
            state.running = !config.start_suspended;
            Ok(Box::new(RecordingDriver {
                log: Rc::clone(&log),
            }) as Box<dyn Driver>)
        })
    }

    pub fn opens(&self) -> usize {
        self.log.borrow().opens
    }

    pub fn resumes(&self) -> usize {
        self.log.borrow().resumes
    }

    pub fn closes(&self) -> usize {
        self.log.borrow().closes
    }

    pub fn set_time(&self, now: f64) {
        self.log.borrow_mut().now = now;
    }

    pub fn commands(&self) -> Vec<Command> {
        self.log.borrow().commands.clone()
    }

    /// Sounds started so far, in order.
    pub fn started(&self) -> Vec<Sound> {
        self.log
            .borrow()
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::Start(sound) => Some((**sound).clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().commands.clear();
    }
}

struct RecordingDriver {
    log: Rc<RefCell<Log>>,
}

impl Driver for RecordingDriver {
    fn sample_rate(&self) -> f64 {
        SAMPLE_RATE
    }

    fn current_time(&self) -> f64 {
        self.log.borrow().now
    }

    fn is_running(&self) -> bool {
        self.log.borrow().running
    }

    fn resume(&mut self) -> Result<(), DeviceError> {
        let mut log = self.log.borrow_mut();
        log.resumes += 1;
        log.running = true;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), DeviceError> {
        self.log.borrow_mut().running = false;
        Ok(())
    }

    fn send(&mut self, command: Command) {
        self.log.borrow_mut().commands.push(command);
    }

    fn close(&mut self) {
        let mut log = self.log.borrow_mut();
        log.closes += 1;
        log.running = false;
    }
}
