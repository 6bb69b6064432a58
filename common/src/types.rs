use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    Outlet1,
    Outlet2,
    Temperature,
    RelativeHumidity,
    Motion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Actuator,
    Sensor,
}

impl Property {
    pub const ACTUATORS: [Property; 2] = [Self::Outlet1, Self::Outlet2];
    pub const SENSORS: [Property; 3] = [Self::Temperature, Self::RelativeHumidity, Self::Motion];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Outlet1 => "outlet1",
            Self::Outlet2 => "outlet2",
            Self::Temperature => "temperature",
            Self::RelativeHumidity => "relative_humidity",
            Self::Motion => "motion",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "outlet1" => Some(Self::Outlet1),
            "outlet2" => Some(Self::Outlet2),
            "temperature" => Some(Self::Temperature),
            "relative_humidity" => Some(Self::RelativeHumidity),
            "motion" => Some(Self::Motion),
            _ => None,
        }
    }

    pub fn kind(self) -> PropertyKind {
        match self {
            Self::Outlet1 | Self::Outlet2 => PropertyKind::Actuator,
            Self::Temperature | Self::RelativeHumidity | Self::Motion => PropertyKind::Sensor,
        }
    }

    pub fn is_actuator(self) -> bool {
        self.kind() == PropertyKind::Actuator
    }
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical state of an outlet. The wire form is `"on"` / `"off"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchState {
    On,
    #[default]
    Off,
}

impl SwitchState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }

    /// Exact lowercase match only.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            _ => None,
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MotionState {
    #[serde(rename = "true")]
    Detected,
    #[default]
    #[serde(rename = "false")]
    Clear,
    #[serde(rename = "na")]
    Unavailable,
}

impl MotionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detected => "true",
            Self::Clear => "false",
            Self::Unavailable => "na",
        }
    }

    pub fn from_level(level: Option<bool>) -> Self {
        match level {
            Some(true) => Self::Detected,
            Some(false) => Self::Clear,
            None => Self::Unavailable,
        }
    }
}

/// A scaled analog reading, rounded to one decimal so that comparisons follow
/// what is actually reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Value(f32),
    Unavailable,
}

impl Default for Reading {
    fn default() -> Self {
        Self::Value(0.0)
    }
}

impl Reading {
    pub fn from_scaled(value: f32) -> Self {
        if value.is_finite() {
            Self::Value((value * 10.0).round() / 10.0)
        } else {
            Self::Unavailable
        }
    }

    pub fn from_normalized(analog: Option<f32>, scale: f32) -> Self {
        match analog {
            Some(raw) => Self::from_scaled(raw * scale),
            None => Self::Unavailable,
        }
    }

    pub fn to_wire(self) -> String {
        match self {
            Self::Value(value) => format!("{value:.1}"),
            Self::Unavailable => "na".to_string(),
        }
    }
}

/// One full sample of the sensor set, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorTuple {
    pub temperature: Reading,
    pub relative_humidity: Reading,
    pub motion: MotionState,
}

impl SensorTuple {
    pub fn new(temperature: Reading, relative_humidity: Reading, motion: MotionState) -> Self {
        Self {
            temperature,
            relative_humidity,
            motion,
        }
    }

    pub fn to_change_set(&self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        changes.push(Property::Temperature, self.temperature.to_wire());
        changes.push(Property::RelativeHumidity, self.relative_humidity.to_wire());
        changes.push(Property::Motion, self.motion.as_str());
        changes
    }
}

/// Ordered property/value pairs submitted as one shadow update.
///
/// Pushing a property that is already present replaces its value in place, so
/// a change set never carries the same property twice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeSet {
    entries: Vec<(Property, String)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, property: Property, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == property) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((property, value)),
        }
    }

    pub fn get(&self, property: Property) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| *name == property)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Property, &str)> {
        self.entries
            .iter()
            .map(|(property, value)| (*property, value.as_str()))
    }

    pub fn properties(&self) -> Vec<Property> {
        self.entries.iter().map(|(property, _)| *property).collect()
    }

    pub fn to_json_map(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(property, value)| (property.as_str().to_string(), Value::String(value.clone())))
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(Property, S)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (Property, S)>>(iter: I) -> Self {
        let mut changes = Self::new();
        for (property, value) in iter {
            changes.push(property, value);
        }
        changes
    }
}

/// What the agent believes the physical state is.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeviceState {
    pub outlet1: SwitchState,
    pub outlet2: SwitchState,
    pub sensors: SensorTuple,
}

impl DeviceState {
    pub fn value(&self, property: Property) -> String {
        match property {
            Property::Outlet1 => self.outlet1.as_str().to_string(),
            Property::Outlet2 => self.outlet2.as_str().to_string(),
            Property::Temperature => self.sensors.temperature.to_wire(),
            Property::RelativeHumidity => self.sensors.relative_humidity.to_wire(),
            Property::Motion => self.sensors.motion.as_str().to_string(),
        }
    }

    pub fn switch(&self, property: Property) -> Option<SwitchState> {
        match property {
            Property::Outlet1 => Some(self.outlet1),
            Property::Outlet2 => Some(self.outlet2),
            _ => None,
        }
    }

    pub fn actuators(&self) -> ChangeSet {
        Property::ACTUATORS
            .into_iter()
            .map(|property| (property, self.value(property)))
            .collect()
    }

    pub fn to_change_set(&self) -> ChangeSet {
        Property::ACTUATORS
            .into_iter()
            .chain(Property::SENSORS)
            .map(|property| (property, self.value(property)))
            .collect()
    }
}
