//! Automation timelines for sound parameters.
//!
//! Mirrors the scheduling model of a WebAudio `AudioParam`: events are kept
//! sorted by time, a ramp interpolates from the previous event's value and
//! time up to its own, and the value holds flat after the last event.

/// One scheduled change on a parameter timeline. Times are device seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamEvent {
    SetValue { value: f64, time: f64 },
    LinearRamp { value: f64, time: f64 },
    ExponentialRamp { value: f64, time: f64 },
    /// Freezes the value reached at `time` and drops every later event.
    CancelAndHold { time: f64 },
}

impl ParamEvent {
    pub fn time(&self) -> f64 {
        match *self {
            ParamEvent::SetValue { time, .. }
            | ParamEvent::LinearRamp { time, .. }
            | ParamEvent::ExponentialRamp { time, .. }
            | ParamEvent::CancelAndHold { time } => time,
        }
    }

    fn value(&self) -> Option<f64> {
        match *self {
            ParamEvent::SetValue { value, .. }
            | ParamEvent::LinearRamp { value, .. }
            | ParamEvent::ExponentialRamp { value, .. } => Some(value),
            ParamEvent::CancelAndHold { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioParam {
    default: f64,
    /// Sorted by time; never holds a `CancelAndHold`.
    events: Vec<ParamEvent>,
}

impl AudioParam {
    pub fn new(default: f64) -> Self {
        AudioParam {
            default,
            events: Vec::new(),
        }
    }

    pub fn set_value_at_time(mut self, value: f64, time: f64) -> Self {
        self.schedule(ParamEvent::SetValue { value, time });
        self
    }

    pub fn linear_ramp_to_value_at_time(mut self, value: f64, time: f64) -> Self {
        self.schedule(ParamEvent::LinearRamp { value, time });
        self
    }

    pub fn exponential_ramp_to_value_at_time(mut self, value: f64, time: f64) -> Self {
        self.schedule(ParamEvent::ExponentialRamp { value, time });
        self
    }

    /// Insert an event. Events sharing a time keep their arrival order.
    pub fn schedule(&mut self, event: ParamEvent) {
        if let ParamEvent::CancelAndHold { time } = event {
            self.cancel_and_hold(time);
            return;
        }
        let at = event.time();
        let idx = self.events.partition_point(|e| e.time() <= at);
        self.events.insert(idx, event);
    }

    fn cancel_and_hold(&mut self, time: f64) {
        let held = self.value_at(time);
        self.events.retain(|e| e.time() <= time);
        self.events.push(ParamEvent::SetValue { value: held, time });
    }

    pub fn events(&self) -> &[ParamEvent] {
        &self.events
    }

    /// Value of the parameter at device time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        let idx = self.events.partition_point(|e| e.time() <= t);
        if idx == 0 {
            return self.default;
        }

        let prev = &self.events[idx - 1];
        let (t0, v0) = (prev.time(), prev.value().unwrap_or(self.default));

        match self.events.get(idx) {
            Some(&ParamEvent::LinearRamp { value: v1, time: t1 }) => {
                let frac = (t - t0) / (t1 - t0);
                v0 + (v1 - v0) * frac
            }
            Some(&ParamEvent::ExponentialRamp { value: v1, time: t1 }) => {
                // Exponential curves are undefined through or from zero; hold instead.
                if v0 * v1 <= 0.0 {
                    return v0;
                }
                let frac = (t - t0) / (t1 - t0);
                v0 * (v1 / v0).powf(frac)
            }
            _ => v0,
        }
    }
}
