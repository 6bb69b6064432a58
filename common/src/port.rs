use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::DeviceIoError;

/// Discrete access to the controller board.
///
/// `Ok(None)` means the line exists but has no value right now; `Err` means the
/// call itself failed.
pub trait PhysicalPort: Send {
    fn read_digital(&mut self, pin: u8) -> Result<Option<bool>, DeviceIoError>;

    fn write_digital(&mut self, pin: u8, level: bool) -> Result<(), DeviceIoError>;

    /// Normalized to `0.0..=1.0`.
    fn read_analog(&mut self, channel: u8) -> Result<Option<f32>, DeviceIoError>;
}

/// Writes kept by [`SimulatedPort::writes`]; older ones are dropped.
const WRITE_HISTORY: usize = 64;

/// In-memory board. Written pins read back their last level.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPort {
    digital: HashMap<u8, bool>,
    analog: HashMap<u8, f32>,
    failing_pins: HashSet<u8>,
    failing_channels: HashSet<u8>,
    writes: VecDeque<(u8, bool)>,
}

impl SimulatedPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_digital(mut self, pin: u8, level: bool) -> Self {
        self.set_digital(pin, Some(level));
        self
    }

    pub fn with_analog(mut self, channel: u8, value: f32) -> Self {
        self.set_analog(channel, Some(value));
        self
    }

    pub fn set_digital(&mut self, pin: u8, level: Option<bool>) {
        match level {
            Some(level) => self.digital.insert(pin, level),
            None => self.digital.remove(&pin),
        };
    }

    pub fn set_analog(&mut self, channel: u8, value: Option<f32>) {
        match value {
            Some(value) => self.analog.insert(channel, value.clamp(0.0, 1.0)),
            None => self.analog.remove(&channel),
        };
    }

    pub fn fail_pin(&mut self, pin: u8, failing: bool) {
        if failing {
            self.failing_pins.insert(pin);
        } else {
            self.failing_pins.remove(&pin);
        }
    }

    pub fn fail_channel(&mut self, channel: u8, failing: bool) {
        if failing {
            self.failing_channels.insert(channel);
        } else {
            self.failing_channels.remove(&channel);
        }
    }

    pub fn level(&self, pin: u8) -> Option<bool> {
        self.digital.get(&pin).copied()
    }

    /// Most recent writes, oldest first.
    pub fn writes(&self) -> Vec<(u8, bool)> {
        self.writes.iter().copied().collect()
    }
}

impl PhysicalPort for SimulatedPort {
    fn read_digital(&mut self, pin: u8) -> Result<Option<bool>, DeviceIoError> {
        if self.failing_pins.contains(&pin) {
            return Err(DeviceIoError::DigitalRead {
                pin,
                reason: "simulated fault".to_string(),
            });
        }
        Ok(self.digital.get(&pin).copied())
    }

    fn write_digital(&mut self, pin: u8, level: bool) -> Result<(), DeviceIoError> {
        if self.failing_pins.contains(&pin) {
            return Err(DeviceIoError::DigitalWrite {
                pin,
                reason: "simulated fault".to_string(),
            });
        }
        self.digital.insert(pin, level);
        if self.writes.len() == WRITE_HISTORY {
            self.writes.pop_front();
        }
        self.writes.push_back((pin, level));
        Ok(())
    }

    fn read_analog(&mut self, channel: u8) -> Result<Option<f32>, DeviceIoError> {
        if self.failing_channels.contains(&channel) {
            return Err(DeviceIoError::AnalogRead {
                channel,
                reason: "simulated fault".to_string(),
            });
        }
        Ok(self.analog.get(&channel).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_history_is_bounded() {
        let mut port = SimulatedPort::new();
        for index in 0..WRITE_HISTORY + 10 {
            port.write_digital(7, index % 2 == 0).unwrap();
        }
        port.write_digital(8, true).unwrap();

        let writes = port.writes();
        assert_eq!(writes.len(), WRITE_HISTORY);
        assert_eq!(writes.last(), Some(&(8, true)));
        assert_eq!(port.level(7), Some(false));
    }
}
