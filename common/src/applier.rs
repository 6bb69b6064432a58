use serde_json::Value;

use crate::{
    device::DeviceModel,
    error::{SetError, ValidationError},
    port::PhysicalPort,
    shadow::DeltaRequest,
    types::{ChangeSet, Property},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    pub property: Property,
    pub error: SetError,
}

/// What happened to each entry of one delta.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeltaOutcome {
    /// Exactly the entries that reached hardware, in delta order.
    pub applied: ChangeSet,
    pub rejected: Vec<Rejected>,
    /// Keys that are not outlets. Never an error.
    pub ignored: Vec<String>,
}

impl DeltaOutcome {
    pub fn into_change_set(self) -> ChangeSet {
        self.applied
    }
}

/// Applies each outlet entry of `delta` in order.
///
/// Unknown and read-only keys are skipped. A rejected entry is dropped and
/// does not stop the entries after it.
pub fn apply_delta<P: PhysicalPort>(device: &mut DeviceModel<P>, delta: &DeltaRequest) -> DeltaOutcome {
    let mut outcome = DeltaOutcome::default();

    for (key, value) in delta.iter() {
        let Some(property) = Property::parse(key).filter(|property| property.is_actuator()) else {
            outcome.ignored.push(key.to_string());
            continue;
        };

        let Value::String(value) = value else {
            outcome.rejected.push(Rejected {
                property,
                error: ValidationError::NotAString(property).into(),
            });
            continue;
        };

        match device.set(property, value) {
            Ok(applied) => outcome.applied.push(property, applied.as_str()),
            Err(error) => outcome.rejected.push(Rejected { property, error }),
        }
    }

    outcome
}
