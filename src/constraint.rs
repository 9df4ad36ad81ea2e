//! Validators consulted before a mutation is sent.
//!
//! A property holds at most one constraint; attaching another replaces it.
//! Constraints are never consulted for reads.

use crate::error::{LaserError, LaserResult};
use crate::gui::GuiEnvironment;
use std::collections::BTreeSet;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Inclusive numeric bounds.
    Range { min: f64, max: f64 },
    /// Closed set of accepted tokens.
    EnumMembership(BTreeSet<String>),
}

impl Constraint {
    pub fn range(min: f64, max: f64) -> LaserResult<Self> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(LaserError::configuration(format!(
                "invalid range [{min}, {max}]"
            )));
        }
        Ok(Self::Range { min, max })
    }

    pub fn membership<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::EnumMembership(values.into_iter().map(Into::into).collect())
    }

    /// Check `value`, returning the reason it is rejected.
    pub fn check(&self, value: &str) -> Result<(), String> {
        match self {
            Self::Range { min, max } => {
                let number: f64 = value
                    .trim()
                    .parse()
                    .map_err(|_| format!("'{value}' is not a number"))?;
                if number.is_nan() || number < *min || number > *max {
                    return Err(format!("must be between {min} and {max}"));
                }
                Ok(())
            }
            Self::EnumMembership(allowed) => {
                if allowed.contains(value) {
                    Ok(())
                } else {
                    let choices: Vec<&str> = allowed.iter().map(String::as_str).collect();
                    Err(format!("must be one of: {}", choices.join(", ")))
                }
            }
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range { .. })
    }

    /// Announce this constraint to the GUI. Failures are logged.
    pub fn describe_to(&self, property: &str, gui: &mut dyn GuiEnvironment) {
        match self {
            Self::Range { min, max } => {
                if let Err(e) = gui.register_allowed_range(property, *min, *max) {
                    warn!(property, error = %e, "range registration failed");
                }
            }
            Self::EnumMembership(allowed) => {
                for value in allowed {
                    if let Err(e) = gui.register_allowed_value(property, value) {
                        warn!(property, value = value.as_str(), error = %e, "value registration failed");
                    }
                }
            }
        }
    }
}

/// A constraint as written in a model table.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintSpec {
    Fixed(Constraint),
    /// `min ..= <current value of max_property>`.
    ///
    /// The maximum is read once when the constraint is attached and never
    /// refreshed, so it goes stale if the device's maximum changes later.
    RangeUpToProperty { min: f64, max_property: String },
}

impl ConstraintSpec {
    pub fn up_to(min: f64, max_property: impl Into<String>) -> Self {
        Self::RangeUpToProperty {
            min,
            max_property: max_property.into(),
        }
    }
}

impl From<Constraint> for ConstraintSpec {
    fn from(constraint: Constraint) -> Self {
        Self::Fixed(constraint)
    }
}
