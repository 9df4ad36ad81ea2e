//! Remote properties: named, typed, cacheable views of instrument attributes.
//!
//! Every property kind shares one contract (`get`, `set`, accessors,
//! `describe_to`); the kinds differ only in where a value comes from and how
//! a write is turned into commands. They are a closed set, matched in one
//! place below.
//!
//! # Caching
//!
//! A property with caching enabled keeps the first successfully read wire
//! value and serves it until it is invalidated. Reads only need `&self`, so the
//! cache is interior-mutable state owned by the property. A failed read clears
//! it; a successful write clears it too, because the device, not this layer,
//! decides what the value became.

use crate::constraint::Constraint;
use crate::dispatcher::CommandDispatcher;
use crate::enumeration::{EnumerationTable, StateTable};
use crate::error::{LaserError, LaserResult};
use crate::gui::GuiEnvironment;
use crate::shutter::{ShutterEmulation, ShutterState};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use tracing::{debug, warn};

/// Value kind of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stereotype {
    Text,
    Real,
    Integer,
}

impl Stereotype {
    /// Shown when nothing better is known.
    pub fn default_value(self) -> &'static str {
        match self {
            Self::Text => "",
            Self::Real => "0.0",
            Self::Integer => "0",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Text)
    }

    /// Check that `value` parses as this stereotype's kind.
    pub fn validate(self, value: &str) -> Result<(), String> {
        let value = value.trim();
        match self {
            Self::Text => Ok(()),
            Self::Real => match value.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(()),
                _ => Err(format!("'{value}' is not a real number")),
            },
            Self::Integer => value
                .parse::<i64>()
                .map(|_| ())
                .map_err(|_| format!("'{value}' is not an integer")),
        }
    }
}

impl fmt::Display for Stereotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Real => "real",
            Self::Integer => "integer",
        })
    }
}

/// Last-known-good wire value, reused while caching is enabled.
#[derive(Debug, Default)]
pub struct PropertyCache {
    enabled: bool,
    value: RefCell<Option<String>>,
}

impl PropertyCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            value: RefCell::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        self.value.borrow().clone()
    }

    fn store(&self, value: &str) {
        if self.enabled {
            *self.value.borrow_mut() = Some(value.to_string());
        }
    }

    pub fn invalidate(&self) {
        self.value.borrow_mut().take();
    }
}

/// Where a property's value comes from and how writes reach the device.
#[derive(Debug)]
pub enum PropertyKind {
    /// Fixed at construction.
    Static { value: String },
    /// Read from the device; optionally decoded through a state table.
    DeviceReadable {
        get_command: String,
        states: Option<StateTable>,
    },
    /// Numeric setpoint; writes are `<set_command> <value>`.
    DeviceNumeric {
        get_command: String,
        set_command: String,
    },
    /// Wire tokens shown as GUI labels.
    DeviceEnum {
        get_command: String,
        set_command: Option<String>,
        table: EnumerationTable,
    },
    /// Emulated shutter; reads and writes go through the state machine.
    Shutter(ShutterEmulation),
}

#[derive(Debug)]
pub struct Property {
    name: String,
    stereotype: Stereotype,
    kind: PropertyKind,
    cache: PropertyCache,
    constraint: Option<Constraint>,
    last_known: RefCell<Option<String>>,
}

impl Property {
    fn with_kind(name: impl Into<String>, stereotype: Stereotype, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            stereotype,
            kind,
            cache: PropertyCache::default(),
            constraint: None,
            last_known: RefCell::new(None),
        }
    }

    pub fn fixed(name: impl Into<String>, stereotype: Stereotype, value: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            stereotype,
            PropertyKind::Static {
                value: value.into(),
            },
        )
    }

    pub fn readable(
        name: impl Into<String>,
        stereotype: Stereotype,
        get_command: impl Into<String>,
    ) -> Self {
        Self::with_kind(
            name,
            stereotype,
            PropertyKind::DeviceReadable {
                get_command: get_command.into(),
                states: None,
            },
        )
    }

    /// Read-only status whose codes are shown as labels.
    pub fn status(name: impl Into<String>, get_command: impl Into<String>, states: StateTable) -> Self {
        Self::with_kind(
            name,
            Stereotype::Text,
            PropertyKind::DeviceReadable {
                get_command: get_command.into(),
                states: Some(states),
            },
        )
    }

    pub fn numeric(
        name: impl Into<String>,
        stereotype: Stereotype,
        get_command: impl Into<String>,
        set_command: impl Into<String>,
    ) -> LaserResult<Self> {
        let name = name.into();
        if !stereotype.is_numeric() {
            return Err(LaserError::configuration(format!(
                "numeric property '{name}' needs a real or integer stereotype"
            )));
        }
        Ok(Self::with_kind(
            name,
            stereotype,
            PropertyKind::DeviceNumeric {
                get_command: get_command.into(),
                set_command: set_command.into(),
            },
        ))
    }

    /// Enumeration property. Without a default `set_command` only items that
    /// carry their own command can be selected.
    pub fn enumeration(
        name: impl Into<String>,
        get_command: impl Into<String>,
        set_command: Option<String>,
        table: EnumerationTable,
    ) -> LaserResult<Self> {
        let name = name.into();
        if table.is_empty() {
            return Err(LaserError::configuration(format!(
                "enumeration property '{name}' has no items"
            )));
        }
        Ok(Self::with_kind(
            name,
            Stereotype::Text,
            PropertyKind::DeviceEnum {
                get_command: get_command.into(),
                set_command,
                table,
            },
        ))
    }

    pub fn shutter(name: impl Into<String>, emulation: ShutterEmulation) -> Self {
        Self::with_kind(name, Stereotype::Text, PropertyKind::Shutter(emulation))
    }

    /// Enable or disable caching. The shutter never caches.
    pub fn cached(mut self, enabled: bool) -> Self {
        let enabled = enabled && !matches!(self.kind, PropertyKind::Shutter(_));
        self.cache = PropertyCache::new(enabled);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stereotype(&self) -> Stereotype {
        self.stereotype
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn constraint(&self) -> Option<&Constraint> {
        self.constraint.as_ref()
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.cache.is_enabled()
    }

    pub fn is_mutable(&self) -> bool {
        match &self.kind {
            PropertyKind::Static { .. } | PropertyKind::DeviceReadable { .. } => false,
            PropertyKind::DeviceNumeric { .. } | PropertyKind::Shutter(_) => true,
            PropertyKind::DeviceEnum {
                set_command, table, ..
            } => set_command.is_some() || table.items().iter().any(|i| i.set_command.is_some()),
        }
    }

    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    /// The value last read or successfully written, if any.
    pub fn last_known_value(&self) -> Option<String> {
        self.last_known.borrow().clone()
    }

    /// Last known value, or the stereotype default.
    pub fn fallback_value(&self) -> String {
        self.last_known_value()
            .unwrap_or_else(|| self.stereotype.default_value().to_string())
    }

    /// Replace the attached constraint.
    pub fn attach_constraint(&mut self, constraint: Constraint) -> LaserResult<()> {
        if !self.is_mutable() {
            return Err(LaserError::configuration(format!(
                "cannot constrain read-only property '{}'",
                self.name
            )));
        }
        if constraint.is_range() && !self.stereotype.is_numeric() {
            return Err(LaserError::configuration(format!(
                "range constraint on non-numeric property '{}'",
                self.name
            )));
        }
        if self.constraint.replace(constraint).is_some() {
            debug!(property = %self.name, "replaced existing constraint");
        }
        Ok(())
    }

    /// Current value: the GUI label for enumerations and status tables, the
    /// wire value otherwise.
    pub fn get(&self, dispatcher: &mut CommandDispatcher) -> LaserResult<String> {
        let value = match &self.kind {
            PropertyKind::Static { value } => value.clone(),
            PropertyKind::Shutter(emulation) => emulation.report(dispatcher)?.to_string(),
            PropertyKind::DeviceReadable { get_command, states } => {
                let raw = self.fetch(dispatcher, get_command)?;
                match states {
                    Some(states) => self.translate(&raw, states.label(&raw))?,
                    None => raw,
                }
            }
            PropertyKind::DeviceNumeric { get_command, .. } => {
                self.fetch(dispatcher, get_command)?
            }
            PropertyKind::DeviceEnum {
                get_command, table, ..
            } => {
                let raw = self.fetch(dispatcher, get_command)?;
                let label = table.decode(&raw).map(|i| i.gui_name.as_str());
                self.translate(&raw, label)?
            }
        };

        *self.last_known.borrow_mut() = Some(value.clone());
        Ok(value)
    }

    /// Write `value`. Constraint and format checks run before anything is sent.
    pub fn set(&mut self, dispatcher: &mut CommandDispatcher, value: &str) -> LaserResult<()> {
        if !self.is_mutable() {
            return Err(LaserError::ReadOnly(self.name.clone()));
        }
        if let Some(constraint) = &self.constraint {
            constraint
                .check(value)
                .map_err(|reason| LaserError::invalid(&self.name, value, reason))?;
        }

        let mut accepted = value.trim().to_string();
        match &mut self.kind {
            PropertyKind::Static { .. } | PropertyKind::DeviceReadable { .. } => {
                return Err(LaserError::ReadOnly(self.name.clone()));
            }
            PropertyKind::DeviceNumeric { set_command, .. } => {
                self.stereotype
                    .validate(value)
                    .map_err(|reason| LaserError::invalid(&self.name, value, reason))?;
                dispatcher.send_with_argument(set_command, value.trim())?;
            }
            PropertyKind::DeviceEnum {
                set_command, table, ..
            } => {
                let item = table.encode(value).ok_or_else(|| {
                    let choices: Vec<&str> = table.gui_names().collect();
                    LaserError::invalid(
                        &self.name,
                        value,
                        format!("must be one of: {}", choices.join(", ")),
                    )
                })?;
                match (&item.set_command, set_command.as_deref()) {
                    (Some(own), _) => dispatcher.send(own)?,
                    (None, Some(default)) => {
                        dispatcher.send_with_argument(default, &item.device_value)?
                    }
                    (None, None) => return Err(LaserError::ReadOnly(self.name.clone())),
                };
            }
            PropertyKind::Shutter(emulation) => {
                let target: ShutterState = value
                    .parse()
                    .map_err(|reason: String| LaserError::invalid(&self.name, value, reason))?;
                emulation.request(&self.name, dispatcher, target)?;
                accepted = target.as_str().to_string();
            }
        }

        self.cache.invalidate();
        *self.last_known.borrow_mut() = Some(accepted);
        Ok(())
    }

    /// Announce legal values or numeric range to the GUI. Failures are logged.
    pub fn describe_to(&self, gui: &mut dyn GuiEnvironment) {
        let labels: Vec<&str> = match &self.kind {
            PropertyKind::DeviceEnum { table, .. } => table.gui_names().collect(),
            PropertyKind::DeviceReadable {
                states: Some(states),
                ..
            } => states.entries().iter().map(|e| e.label.as_str()).collect(),
            PropertyKind::Shutter(_) => ShutterState::ALL.iter().map(|s| s.as_str()).collect(),
            _ => Vec::new(),
        };
        for label in labels {
            if let Err(e) = gui.register_allowed_value(&self.name, label) {
                warn!(property = %self.name, value = label, error = %e, "value registration failed");
            }
        }

        if let Some(constraint) = &self.constraint {
            constraint.describe_to(&self.name, gui);
        }
    }

    /// Re-derive the shutter state from the device; no-op for other kinds.
    pub fn resync(&mut self, dispatcher: &mut CommandDispatcher) -> LaserResult<()> {
        if let PropertyKind::Shutter(emulation) = &mut self.kind {
            emulation.resync(dispatcher)?;
        }
        Ok(())
    }

    fn fetch(&self, dispatcher: &mut CommandDispatcher, get_command: &str) -> LaserResult<String> {
        if let Some(cached) = self.cache.get() {
            return Ok(cached);
        }
        match dispatcher.send(get_command) {
            Ok(raw) => {
                self.cache.store(&raw);
                Ok(raw)
            }
            Err(e) => {
                self.cache.invalidate();
                Err(e)
            }
        }
    }

    /// A raw value the table does not know is a failed read.
    fn translate(&self, raw: &str, label: Option<&str>) -> LaserResult<String> {
        match label {
            Some(label) => Ok(label.to_string()),
            None => {
                self.cache.invalidate();
                Err(LaserError::mismatch(&self.name, raw))
            }
        }
    }
}
