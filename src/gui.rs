//! Boundary with the host's GUI data-binding layer.
//!
//! The core only ever announces legal values and ranges during setup, and
//! re-asserts a property's value after a GUI-triggered write fails. All of it
//! is best-effort: registration failures are logged by the caller, never
//! turned into operational errors.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuiError {
    #[error("GUI rejected registration for '{property}': {message}")]
    Rejected { property: String, message: String },
}

/// What the host application must provide to display properties.
#[cfg_attr(test, mockall::automock)]
pub trait GuiEnvironment {
    /// Add one entry to a property's closed choice list.
    fn register_allowed_value(&mut self, property: &str, value: &str) -> Result<(), GuiError>;

    /// Declare a numeric property's bounds.
    fn register_allowed_range(&mut self, property: &str, min: f64, max: f64)
        -> Result<(), GuiError>;

    /// Show `value` as the property's current value.
    fn publish_value(&mut self, property: &str, value: &str);
}

/// `GuiEnvironment` that just remembers what it was told.
///
/// Used by the CLI to print choice lists and by tests to inspect registration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllowedValuesRegistry {
    values: BTreeMap<String, Vec<String>>,
    ranges: BTreeMap<String, (f64, f64)>,
    published: BTreeMap<String, String>,
}

impl AllowedValuesRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allowed_values(&self, property: &str) -> Option<&[String]> {
        self.values.get(property).map(Vec::as_slice)
    }

    pub fn allowed_range(&self, property: &str) -> Option<(f64, f64)> {
        self.ranges.get(property).copied()
    }

    pub fn published_value(&self, property: &str) -> Option<&str> {
        self.published.get(property).map(String::as_str)
    }
}

impl GuiEnvironment for AllowedValuesRegistry {
    fn register_allowed_value(&mut self, property: &str, value: &str) -> Result<(), GuiError> {
        let values = self.values.entry(property.to_string()).or_default();
        if values.iter().any(|v| v == value) {
            return Err(GuiError::Rejected {
                property: property.to_string(),
                message: format!("value '{value}' already registered"),
            });
        }
        values.push(value.to_string());
        Ok(())
    }

    fn register_allowed_range(
        &mut self,
        property: &str,
        min: f64,
        max: f64,
    ) -> Result<(), GuiError> {
        self.ranges.insert(property.to_string(), (min, max));
        Ok(())
    }

    fn publish_value(&mut self, property: &str, value: &str) {
        self.published
            .insert(property.to_string(), value.to_string());
    }
}
