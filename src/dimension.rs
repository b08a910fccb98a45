//! Custom dimension definitions managed through the Admin API.
//!
//! A [`CustomDimension`] is validated when it is built; an invalid definition
//! cannot be constructed. `parameter_name` and `scope` are fixed once the
//! dimension exists remotely, only `display_name` and `description` can be
//! updated later.

use crate::api::admin::CustomDimensionResource;
use crate::error::ValidationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

pub const MAX_DISPLAY_NAME_LENGTH: usize = 82;
pub const MAX_PARAMETER_NAME_LENGTH: usize = 24;
pub const MAX_DESCRIPTION_LENGTH: usize = 150;
pub const PARAMETER_NAME_PATTERN: &str = "^[A-Za-z][A-Za-z0-9_]*$";

fn is_valid_parameter_name(name: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(PARAMETER_NAME_PATTERN).ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(name))
}

/// Level at which a custom dimension is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DimensionScope {
    /// Captured with each event (e.g. `button_name`)
    Event,
    /// Persists across sessions for a user (e.g. `membership_tier`)
    User,
    /// E-commerce item property (e.g. `item_brand`)
    Item,
}

impl DimensionScope {
    pub const ALL: [DimensionScope; 3] = [DimensionScope::Event, DimensionScope::User, DimensionScope::Item];

    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionScope::Event => "EVENT",
            DimensionScope::User => "USER",
            DimensionScope::Item => "ITEM",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DimensionScope::Event => "Event-level dimension, captured with each event",
            DimensionScope::User => "User-level dimension, persists across sessions",
            DimensionScope::Item => "Item-level dimension for e-commerce items",
        }
    }

    /// All scope names as the API spells them.
    pub fn values() -> Vec<&'static str> {
        Self::ALL.iter().map(DimensionScope::as_str).collect()
    }

    /// Exact, case-sensitive check against [`DimensionScope::values`].
    pub fn is_valid(value: &str) -> bool {
        Self::ALL.iter().any(|scope| scope.as_str() == value)
    }
}

impl fmt::Display for DimensionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DimensionScope {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|scope| scope.as_str() == value)
            .ok_or_else(|| {
                let message = format!(
                    "Invalid scope \"{}\". Valid values: {}",
                    value,
                    Self::values().join(", ")
                );
                ValidationError::new(message.clone(), vec![message])
            })
    }
}

/// A validated custom dimension definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDimension {
    parameter_name: String,
    display_name: String,
    scope: DimensionScope,
    description: Option<String>,
    disallow_ads_personalization: bool,
}

impl CustomDimension {
    /// Builds a definition after validating every field.
    ///
    /// # Errors
    /// Returns `ValidationError` listing every violated constraint.
    pub fn create(
        parameter_name: impl Into<String>,
        display_name: impl Into<String>,
        scope: DimensionScope,
        description: Option<String>,
        disallow_ads_personalization: bool,
    ) -> Result<Self, ValidationError> {
        let parameter_name = parameter_name.into();
        let display_name = display_name.into();

        let errors = Self::validate(&parameter_name, &display_name, description.as_deref());
        if !errors.is_empty() {
            return Err(ValidationError::new(
                format!("Custom dimension validation failed: {}", errors.join("; ")),
                errors,
            ));
        }

        Ok(CustomDimension {
            parameter_name,
            display_name,
            scope,
            description,
            disallow_ads_personalization,
        })
    }

    /// Event-scoped definition without description.
    pub fn event(
        parameter_name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Self::create(parameter_name, display_name, DimensionScope::Event, None, false)
    }

    /// Builds a definition from a loosely typed object such as a bulk import
    /// entry: `parameterName`, `displayName` and `scope` are required,
    /// `description` and `disallowAdsPersonalization` optional.
    pub fn from_definition(definition: &Value) -> Result<Self, ValidationError> {
        let required = |field: &str| -> Result<String, ValidationError> {
            definition
                .get(field)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    let message = format!("{} is required", field);
                    ValidationError::new(message.clone(), vec![message])
                })
        };

        let parameter_name = required("parameterName")?;
        let display_name = required("displayName")?;
        let scope: DimensionScope = required("scope")?.parse()?;
        let description = definition
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        let disallow_ads_personalization = definition
            .get("disallowAdsPersonalization")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Self::create(
            parameter_name,
            display_name,
            scope,
            description,
            disallow_ads_personalization,
        )
    }

    /// Checks the fields without constructing anything. Returns one message
    /// per violation, empty when valid.
    pub fn validate(parameter_name: &str, display_name: &str, description: Option<&str>) -> Vec<String> {
        let mut errors = Vec::new();

        let parameter_length = parameter_name.chars().count();
        if parameter_name.is_empty() {
            errors.push("parameterName is required".to_string());
        } else if parameter_length > MAX_PARAMETER_NAME_LENGTH {
            errors.push(format!(
                "parameterName exceeds maximum length of {} characters (got {})",
                MAX_PARAMETER_NAME_LENGTH, parameter_length
            ));
        } else if !is_valid_parameter_name(parameter_name) {
            errors.push(format!(
                "parameterName \"{}\" is invalid. Must start with a letter and contain only letters, numbers, and underscores",
                parameter_name
            ));
        }

        let display_length = display_name.chars().count();
        if display_name.is_empty() {
            errors.push("displayName is required".to_string());
        } else if display_length > MAX_DISPLAY_NAME_LENGTH {
            errors.push(format!(
                "displayName exceeds maximum length of {} characters (got {})",
                MAX_DISPLAY_NAME_LENGTH, display_length
            ));
        }

        if let Some(description) = description {
            let description_length = description.chars().count();
            if description_length > MAX_DESCRIPTION_LENGTH {
                errors.push(format!(
                    "description exceeds maximum length of {} characters (got {})",
                    MAX_DESCRIPTION_LENGTH, description_length
                ));
            }
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        Self::validate(&self.parameter_name, &self.display_name, self.description.as_deref()).is_empty()
    }

    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn scope(&self) -> DimensionScope {
        self.scope
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn disallow_ads_personalization(&self) -> bool {
        self.disallow_ads_personalization
    }

    /// Name to send from tracking code. For `USER` scope it is set as a user
    /// property rather than an event parameter.
    pub fn tracking_parameter(&self) -> &str {
        &self.parameter_name
    }

    pub fn matches_parameter_name(&self, parameter_name: &str) -> bool {
        self.parameter_name == parameter_name
    }

    /// Create-request body for the Admin API.
    pub fn to_resource(&self) -> CustomDimensionResource {
        CustomDimensionResource {
            name: String::new(),
            parameter_name: self.parameter_name.clone(),
            display_name: self.display_name.clone(),
            description: self.description.clone().unwrap_or_default(),
            scope: self.scope.as_str().to_string(),
            disallow_ads_personalization: self.disallow_ads_personalization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_dimension() {
        let dimension = CustomDimension::create(
            "button_name",
            "Button Name",
            DimensionScope::Event,
            Some("Name of the clicked button".to_string()),
            false,
        )
        .unwrap();
        assert!(dimension.is_valid());
        assert_eq!(dimension.tracking_parameter(), "button_name");
        assert!(dimension.matches_parameter_name("button_name"));
        assert!(!dimension.matches_parameter_name("Button_Name"));
    }

    #[test]
    fn test_parameter_name_violations() {
        let too_long = "a".repeat(25);
        for name in [too_long.as_str(), "1button", "button name", "button-name", ""] {
            let err = CustomDimension::event(name, "Display").unwrap_err();
            assert_eq!(err.errors().len(), 1, "{}", name);
        }
        assert!(CustomDimension::event("a".repeat(24), "Display").is_ok());
    }

    #[test]
    fn test_display_name_and_description_limits() {
        assert!(CustomDimension::event("name", "d".repeat(82)).is_ok());
        assert!(CustomDimension::event("name", "d".repeat(83)).is_err());
        assert!(CustomDimension::event("name", "").is_err());

        let long_description = Some("x".repeat(151));
        let err = CustomDimension::create("name", "Name", DimensionScope::User, long_description, false)
            .unwrap_err();
        assert!(err.errors()[0].contains("description exceeds maximum length of 150"));
    }

    #[test]
    fn test_all_violations_are_reported() {
        let errors = CustomDimension::validate("9lives", "", Some(&"x".repeat(200)));
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("\"9lives\" is invalid"));
        assert_eq!(errors[1], "displayName is required");
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("USER".parse::<DimensionScope>().unwrap(), DimensionScope::User);
        assert!(DimensionScope::is_valid("ITEM"));
        assert!(!DimensionScope::is_valid("item"));
        assert_eq!(DimensionScope::values(), vec!["EVENT", "USER", "ITEM"]);

        let err = "SESSION".parse::<DimensionScope>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid scope \"SESSION\". Valid values: EVENT, USER, ITEM"
        );
    }

    #[test]
    fn test_from_definition() {
        let dimension = CustomDimension::from_definition(&json!({
            "parameterName": "membership_tier",
            "displayName": "Membership Tier",
            "scope": "USER",
            "disallowAdsPersonalization": true
        }))
        .unwrap();
        assert_eq!(dimension.scope(), DimensionScope::User);
        assert!(dimension.disallow_ads_personalization());
        assert_eq!(dimension.description(), None);

        assert!(CustomDimension::from_definition(&json!({"parameterName": "x"})).is_err());
        assert!(CustomDimension::from_definition(&json!({
            "parameterName": "x", "displayName": "X", "scope": "GLOBAL"
        }))
        .is_err());
    }

    #[test]
    fn test_to_resource() {
        let resource = CustomDimension::event("button_name", "Button Name").unwrap().to_resource();
        assert_eq!(resource.scope, "EVENT");
        assert!(resource.name.is_empty());
        assert!(resource.description.is_empty());
    }
}
