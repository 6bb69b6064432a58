use thiserror::Error;

use crate::types::Property;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown property '{0}'")]
    UnknownProperty(String),
    #[error("property '{0}' is read-only")]
    ReadOnly(Property),
    #[error("value '{value}' is outside the domain of '{property}'")]
    InvalidValue { property: Property, value: String },
    #[error("value for '{0}' must be a string")]
    NotAString(Property),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceIoError {
    #[error("board unavailable: {0}")]
    BoardUnavailable(String),
    #[error("digital read on pin {pin} failed: {reason}")]
    DigitalRead { pin: u8, reason: String },
    #[error("digital write on pin {pin} failed: {reason}")]
    DigitalWrite { pin: u8, reason: String },
    #[error("analog read on channel {channel} failed: {reason}")]
    AnalogRead { channel: u8, reason: String },
}

/// Why a single `DeviceModel::set` call left the cache untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Io(#[from] DeviceIoError),
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document has no 'state' object")]
    MissingState,
    #[error("'{0}' is not an object")]
    NotAnObject(&'static str),
}
