//! Sample-accurate parameter automation.
//!
//! An `AudioParam` holds a value plus a timeline of scheduled changes, in
//! seconds on the audio clock. The voice pool schedules gain and frequency
//! changes through `ParamEvent`s and the synth evaluates them per sample.

/// A scheduled change to a voice parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamEvent {
    /// Jump to `value` at `time`.
    SetValueAtTime { value: f32, time: f64 },
    /// Ramp linearly from the previous event's value to reach `value` at `time`.
    LinearRampToValueAtTime { value: f32, time: f64 },
    /// Drop every event at or after `time`.
    CancelScheduledValues { time: f64 },
    /// Drop every event at or after `time`, pinning the value it had there.
    CancelAndHoldAtTime { time: f64 },
}

impl ParamEvent {
    pub fn time(&self) -> f64 {
        match *self {
            ParamEvent::SetValueAtTime { time, .. }
            | ParamEvent::LinearRampToValueAtTime { time, .. }
            | ParamEvent::CancelScheduledValues { time }
            | ParamEvent::CancelAndHoldAtTime { time } => time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Automation {
    Set { value: f32, time: f64 },
    Ramp { value: f32, time: f64 },
}

impl Automation {
    fn time(&self) -> f64 {
        match *self {
            Automation::Set { time, .. } | Automation::Ramp { time, .. } => time,
        }
    }

    fn value(&self) -> f32 {
        match *self {
            Automation::Set { value, .. } | Automation::Ramp { value, .. } => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioParam {
    initial: f32,
    events: Vec<Automation>,
}

impl AudioParam {
    pub fn new(value: f32) -> Self {
        Self {
            initial: value,
            events: Vec::new(),
        }
    }

    pub fn apply(&mut self, event: ParamEvent) {
        match event {
            ParamEvent::SetValueAtTime { value, time } => self.set_value_at_time(value, time),
            ParamEvent::LinearRampToValueAtTime { value, time } => {
                self.linear_ramp_to_value_at_time(value, time)
            }
            ParamEvent::CancelScheduledValues { time } => self.cancel_scheduled_values(time),
            ParamEvent::CancelAndHoldAtTime { time } => self.cancel_and_hold_at_time(time),
        }
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(Automation::Set { value, time });
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(Automation::Ramp { value, time });
    }

    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time() < time);
    }

    pub fn cancel_and_hold_at_time(&mut self, time: f64) {
        let held = self.value_at(time);
        self.cancel_scheduled_values(time);
        self.set_value_at_time(held, time);
    }

    /// Number of events still on the timeline.
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    /// Value of the parameter at `time`.
    ///
    /// A ramp interpolates from the event before it. A ramp with nothing
    /// before it starts from the initial value at time zero.
    pub fn value_at(&self, time: f64) -> f32 {
        let mut anchor_time = 0.0;
        let mut anchor_value = self.initial;
        for event in &self.events {
            if event.time() <= time {
                anchor_time = event.time();
                anchor_value = event.value();
                continue;
            }
            return match *event {
                Automation::Set { .. } => anchor_value,
                Automation::Ramp { value, time: end } => {
                    let span = end - anchor_time;
                    if span <= 0.0 {
                        return value;
                    }
                    let progress = ((time - anchor_time) / span).clamp(0.0, 1.0) as f32;
                    anchor_value + (value - anchor_value) * progress
                }
            };
        }
        anchor_value
    }

    /// Forget events that can no longer influence values at or after `time`.
    /// The last settled event stays as the anchor for anything scheduled later.
    pub fn prune(&mut self, time: f64) {
        let settled = self.events.partition_point(|e| e.time() <= time);
        if settled > 1 {
            self.events.drain(..settled - 1);
        }
    }

    fn insert(&mut self, automation: Automation) {
        let at = self.events.partition_point(|e| e.time() <= automation.time());
        self.events.insert(at, automation);
    }
}
