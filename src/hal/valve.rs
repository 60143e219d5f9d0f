//! H-bridge valve channels.
//!
//! Each channel owns an IN1/IN2 output pair of a DRV8871-style driver. A
//! pulse drives one line for a bounded duration with the other held low,
//! then leaves both low (coast). Pulses block the main cycle and run to
//! completion; there is no abort path.

use log::info;
use std::thread;
use std::time::Duration;

use crate::hal::gpio::DigitalOutput;

/// Default drive time for one open/close pulse.
pub const VALVE_PULSE_MS: u64 = 100;

pub struct ValveChannel {
    name: String,
    in1: Box<dyn DigitalOutput>,
    in2: Box<dyn DigitalOutput>,
    pulse_duration: Duration,
}

impl ValveChannel {
    pub fn new(
        name: impl Into<String>,
        in1: Box<dyn DigitalOutput>,
        in2: Box<dyn DigitalOutput>,
        pulse_duration: Duration,
    ) -> Self {
        let mut channel = Self {
            name: name.into(),
            in1,
            in2,
            pulse_duration,
        };
        // start from a known de-energized state
        channel.in1.set_low();
        channel.in2.set_low();
        channel
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pulse_open(&mut self) {
        info!("⚡ Pulse open {} for {:?}", self.name, self.pulse_duration);
        Self::drive(self.in1.as_mut(), self.in2.as_mut(), self.pulse_duration);
    }

    pub fn pulse_close(&mut self) {
        info!("⚡ Pulse close {} for {:?}", self.name, self.pulse_duration);
        Self::drive(self.in2.as_mut(), self.in1.as_mut(), self.pulse_duration);
    }

    fn drive(active: &mut dyn DigitalOutput, idle: &mut dyn DigitalOutput, hold: Duration) {
        active.set_high();
        idle.set_low();
        thread::sleep(hold);
        active.set_low();
        idle.set_low();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingPin {
        label: &'static str,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl DigitalOutput for RecordingPin {
        fn set_high(&mut self) {
            self.events.lock().unwrap().push(format!("{}+", self.label));
        }

        fn set_low(&mut self) {
            self.events.lock().unwrap().push(format!("{}-", self.label));
        }
    }

    fn channel_with_log() -> (ValveChannel, Arc<Mutex<Vec<String>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let channel = ValveChannel::new(
            "EV0",
            Box::new(RecordingPin {
                label: "in1",
                events: Arc::clone(&events),
            }),
            Box::new(RecordingPin {
                label: "in2",
                events: Arc::clone(&events),
            }),
            Duration::from_millis(1),
        );
        events.lock().unwrap().clear(); // drop the init lows
        (channel, events)
    }

    #[test]
    fn test_pulse_open_sequence() {
        let (mut channel, events) = channel_with_log();
        channel.pulse_open();
        assert_eq!(
            events.lock().unwrap().clone(),
            vec!["in1+", "in2-", "in1-", "in2-"]
        );
    }

    #[test]
    fn test_pulse_close_reverses_pair() {
        let (mut channel, events) = channel_with_log();
        channel.pulse_close();
        assert_eq!(
            events.lock().unwrap().clone(),
            vec!["in2+", "in1-", "in2-", "in1-"]
        );
    }
}
