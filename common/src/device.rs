use crate::{
    config::BoardConfig,
    error::{DeviceIoError, SetError, ValidationError},
    port::PhysicalPort,
    types::{DeviceState, MotionState, Property, Reading, SensorTuple, SwitchState},
};

/// Result of one sensor sweep. Fields whose read failed keep their cached value.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    pub tuple: SensorTuple,
    pub errors: Vec<DeviceIoError>,
}

/// Cached device state plus the port that backs it.
///
/// Outlet writes go to hardware first and only reach the cache once the write
/// succeeded, so the cache never holds a value the board did not accept.
#[derive(Debug)]
pub struct DeviceModel<P> {
    port: P,
    board: BoardConfig,
    state: DeviceState,
}

impl<P: PhysicalPort> DeviceModel<P> {
    pub fn new(port: P, board: BoardConfig) -> Self {
        Self {
            port,
            board,
            state: DeviceState::default(),
        }
    }

    /// Drives every outlet to the cached default so hardware and cache agree.
    pub fn initialize(&mut self) -> Result<(), DeviceIoError> {
        for property in Property::ACTUATORS {
            let current = self.state.switch(property).unwrap_or_default();
            self.write_outlet(property, current)?;
        }
        Ok(())
    }

    pub fn get(&self, property: Property) -> String {
        self.state.value(property)
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Validates `value` against the outlet domain, writes the line, then
    /// updates the cache. Returns the canonical state that was applied.
    pub fn set(&mut self, property: Property, value: &str) -> Result<SwitchState, SetError> {
        if !property.is_actuator() {
            return Err(ValidationError::ReadOnly(property).into());
        }
        let requested = SwitchState::parse(value).ok_or_else(|| ValidationError::InvalidValue {
            property,
            value: value.to_string(),
        })?;

        self.write_outlet(property, requested)?;
        match property {
            Property::Outlet1 => self.state.outlet1 = requested,
            Property::Outlet2 => self.state.outlet2 = requested,
            _ => {}
        }
        Ok(requested)
    }

    pub fn sample_sensors(&mut self) -> SensorSample {
        let cached = self.state.sensors;
        let mut errors = Vec::new();

        let temperature = match self.port.read_analog(self.board.temperature_channel) {
            Ok(raw) => Reading::from_normalized(raw, self.board.temperature_scale),
            Err(err) => {
                errors.push(err);
                cached.temperature
            }
        };
        let relative_humidity = match self.port.read_analog(self.board.humidity_channel) {
            Ok(raw) => Reading::from_normalized(raw, self.board.humidity_scale),
            Err(err) => {
                errors.push(err);
                cached.relative_humidity
            }
        };
        let motion = match self.port.read_digital(self.board.motion_pin) {
            Ok(level) => MotionState::from_level(level),
            Err(err) => {
                errors.push(err);
                cached.motion
            }
        };

        let tuple = SensorTuple::new(temperature, relative_humidity, motion);
        self.state.sensors = tuple;
        SensorSample { tuple, errors }
    }

    fn write_outlet(&mut self, property: Property, state: SwitchState) -> Result<(), DeviceIoError> {
        let pin = match property {
            Property::Outlet1 => self.board.outlet1_pin,
            Property::Outlet2 => self.board.outlet2_pin,
            _ => return Ok(()),
        };
        let level = state.is_on() != self.board.active_low_outlets;
        self.port.write_digital(pin, level)
    }
}
