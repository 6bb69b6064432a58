use crate::{
    error::ValidationError,
    types::{ChangeSet, Property, SwitchState},
};

/// Builds the one-entry desired change set for an operator command such as
/// `outlet1 on`.
pub fn desired_command(property: &str, value: &str) -> Result<ChangeSet, ValidationError> {
    let property =
        Property::parse(property).ok_or_else(|| ValidationError::UnknownProperty(property.to_string()))?;
    if !property.is_actuator() {
        return Err(ValidationError::ReadOnly(property));
    }
    let state = SwitchState::parse(value).ok_or_else(|| ValidationError::InvalidValue {
        property,
        value: value.to_string(),
    })?;

    Ok([(property, state.as_str())].into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_outlet_commands() {
        let changes = desired_command("outlet1", "on").unwrap();
        assert_eq!(changes.get(Property::Outlet1), Some("on"));
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn rejects_values_outside_the_outlet_domain() {
        assert_eq!(
            desired_command("outlet1", "On"),
            Err(ValidationError::InvalidValue {
                property: Property::Outlet1,
                value: "On".to_string(),
            })
        );
    }

    #[test]
    fn rejects_sensors_and_unknown_names() {
        assert_eq!(
            desired_command("motion", "true"),
            Err(ValidationError::ReadOnly(Property::Motion))
        );
        assert_eq!(
            desired_command("brightness", "50"),
            Err(ValidationError::UnknownProperty("brightness".to_string()))
        );
        assert!(matches!(
            desired_command("outlet2", "dim"),
            Err(ValidationError::InvalidValue { .. })
        ));
    }
}
