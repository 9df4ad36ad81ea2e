//! Per-model property tables.
//!
//! Each laser family is described by a static table of [`PropertySpec`]s and a
//! [`ShutterSpec`]. One generic routine (`Laser::incarnate`) turns a table into
//! live properties, so adding a model means adding data, not code.

use crate::constraint::{Constraint, ConstraintSpec};
use crate::enumeration::{EnumerationItem, EnumerationTable, StateEntry, StateTable};
use crate::error::{LaserError, LaserResult};
use crate::persisted::DeviceSlot;
use crate::property::{Property, Stereotype};
use crate::shutter::{ShutterCommands, StatusGate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Property names shared by all models.
pub const VENDOR: &str = "Vendor";
pub const MODEL: &str = "Model";
pub const SERIAL_NUMBER: &str = "Serial Number";
pub const FIRMWARE_VERSION: &str = "Firmware Version";
pub const OPERATING_HOURS: &str = "Operating Hours";
pub const OPERATING_STATUS: &str = "Operating Status";
pub const FAULT: &str = "Fault";
pub const EMISSION: &str = "Emission";
pub const RUN_MODE: &str = "Run Mode";
pub const CURRENT_SETPOINT: &str = "Current Setpoint [mA]";
pub const MAXIMUM_CURRENT: &str = "Maximum Current [mA]";
pub const MEASURED_CURRENT: &str = "Measured Current [mA]";
pub const POWER_SETPOINT: &str = "Power Setpoint [W]";
pub const MAXIMUM_POWER: &str = "Maximum Power [W]";
pub const MEASURED_POWER: &str = "Measured Power [W]";
pub const DIGITAL_MODULATION: &str = "Digital Modulation";
pub const ANALOG_MODULATION: &str = "Analog Modulation";
pub const ANALOG_IMPEDANCE: &str = "Analog Impedance";
pub const AUTOSTART: &str = "Autostart";
pub const SHUTTER: &str = "Shutter";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LaserModel {
    #[default]
    #[serde(rename = "06-series")]
    Series06,
    #[serde(rename = "08-series")]
    Series08,
    #[serde(rename = "skyra")]
    Skyra,
}

impl LaserModel {
    pub const ALL: [LaserModel; 3] = [Self::Series06, Self::Series08, Self::Skyra];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Series06 => "06-series",
            Self::Series08 => "08-series",
            Self::Skyra => "skyra",
        }
    }

    pub fn properties(self) -> &'static [PropertySpec] {
        match self {
            Self::Series06 => SERIES_06,
            Self::Series08 => SERIES_08,
            Self::Skyra => SKYRA,
        }
    }

    pub fn shutter(self) -> &'static ShutterSpec {
        match self {
            Self::Series06 => &MODULATED_SHUTTER,
            Self::Series08 => &CW_SHUTTER,
            Self::Skyra => &SKYRA_SHUTTER,
        }
    }
}

impl fmt::Display for LaserModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LaserModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "06-series" | "06" => Ok(Self::Series06),
            "08-series" | "08" => Ok(Self::Series08),
            "skyra" => Ok(Self::Skyra),
            other => Err(format!(
                "unknown laser model '{other}' (expected 06-series, 08-series or skyra)"
            )),
        }
    }
}

/// Where the shutter keeps its restore point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutterPersistence {
    /// Device slot; survives restarts.
    Device,
    /// Process memory only.
    Volatile,
    /// Device slot when the firmware supports it, volatile otherwise.
    #[default]
    Auto,
}

impl fmt::Display for ShutterPersistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Device => "device",
            Self::Volatile => "volatile",
            Self::Auto => "auto",
        })
    }
}

impl FromStr for ShutterPersistence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "device" => Ok(Self::Device),
            "volatile" => Ok(Self::Volatile),
            "auto" => Ok(Self::Auto),
            other => Err(format!(
                "unknown shutter persistence '{other}' (expected device, volatile or auto)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemSpec {
    pub device_value: &'static str,
    pub gui_name: &'static str,
    pub set_command: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSpec {
    pub code: &'static str,
    pub label: &'static str,
    pub shutter_permitting: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Source {
    Fixed(&'static str),
    Query(&'static str),
    Status {
        query: &'static str,
        states: &'static [StateSpec],
    },
    Numeric {
        query: &'static str,
        command: &'static str,
    },
    Choice {
        query: &'static str,
        command: Option<&'static str>,
        items: &'static [ItemSpec],
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Limit {
    Range { min: f64, max: f64 },
    UpTo { min: f64, max_property: &'static str },
}

impl Limit {
    pub fn to_constraint(self) -> LaserResult<ConstraintSpec> {
        match self {
            Self::Range { min, max } => Constraint::range(min, max).map(ConstraintSpec::Fixed),
            Self::UpTo { min, max_property } => Ok(ConstraintSpec::up_to(min, max_property)),
        }
    }
}

/// One row of a model table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertySpec {
    pub name: &'static str,
    pub stereotype: Stereotype,
    pub source: Source,
    pub cached: bool,
    pub limit: Option<Limit>,
}

impl PropertySpec {
    /// Build the property this row describes. Constraints are attached later,
    /// once every property exists.
    pub fn build(&self) -> LaserResult<Property> {
        let property = match self.source {
            Source::Fixed(value) => Property::fixed(self.name, self.stereotype, value),
            Source::Query(query) => Property::readable(self.name, self.stereotype, query),
            Source::Status { query, states } => {
                Property::status(self.name, query, state_table(states)?)
            }
            Source::Numeric { query, command } => {
                Property::numeric(self.name, self.stereotype, query, command)?
            }
            Source::Choice {
                query,
                command,
                items,
            } => Property::enumeration(
                self.name,
                query,
                command.map(str::to_string),
                enumeration_table(items)?,
            )?,
        };
        Ok(property.cached(self.cached))
    }
}

/// Commands the shutter emulation uses on a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShutterSpec {
    pub run_mode_query: &'static str,
    pub run_modes: &'static [ItemSpec],
    pub setpoint_query: &'static str,
    pub setpoint_command: &'static str,
    pub zero_setpoint: &'static str,
    pub safe_mode_command: &'static str,
    pub emission_query: Option<&'static str>,
    pub status_query: Option<&'static str>,
    pub states: &'static [StateSpec],
    pub slot_read: &'static str,
    pub slot_write: &'static str,
}

impl ShutterSpec {
    pub fn commands(&self) -> LaserResult<ShutterCommands> {
        let status_gate = match self.status_query {
            Some(query) => Some(StatusGate {
                query: query.to_string(),
                states: state_table(self.states)?,
            }),
            None => None,
        };
        Ok(ShutterCommands {
            run_mode_query: self.run_mode_query.to_string(),
            run_modes: enumeration_table(self.run_modes)?,
            setpoint_query: self.setpoint_query.to_string(),
            setpoint_command: self.setpoint_command.to_string(),
            zero_setpoint: self.zero_setpoint.to_string(),
            safe_mode_command: self.safe_mode_command.to_string(),
            emission_query: self.emission_query.map(str::to_string),
            status_gate,
        })
    }

    pub fn slot(&self) -> DeviceSlot {
        DeviceSlot::new(self.slot_read, self.slot_write)
    }
}

fn enumeration_table(items: &[ItemSpec]) -> LaserResult<EnumerationTable> {
    EnumerationTable::new(items.iter().map(|item| {
        let entry = EnumerationItem::new(item.device_value, item.gui_name);
        match item.set_command {
            Some(command) => entry.with_set_command(command),
            None => entry,
        }
    }))
}

fn state_table(states: &[StateSpec]) -> LaserResult<StateTable> {
    StateTable::new(
        states
            .iter()
            .map(|s| StateEntry::new(s.code, s.label, s.shutter_permitting)),
    )
}

/// Look up a row by property name.
pub fn find(model: LaserModel, name: &str) -> LaserResult<&'static PropertySpec> {
    model
        .properties()
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| LaserError::UnknownProperty(name.to_string()))
}

const fn item(
    device_value: &'static str,
    gui_name: &'static str,
    set_command: Option<&'static str>,
) -> ItemSpec {
    ItemSpec {
        device_value,
        gui_name,
        set_command,
    }
}

const fn state(code: &'static str, label: &'static str, shutter_permitting: bool) -> StateSpec {
    StateSpec {
        code,
        label,
        shutter_permitting,
    }
}

const fn row(name: &'static str, stereotype: Stereotype, source: Source) -> PropertySpec {
    PropertySpec {
        name,
        stereotype,
        source,
        cached: false,
        limit: None,
    }
}

const fn cached_row(name: &'static str, stereotype: Stereotype, source: Source) -> PropertySpec {
    PropertySpec {
        cached: true,
        ..row(name, stereotype, source)
    }
}

const fn limited_row(
    name: &'static str,
    stereotype: Stereotype,
    source: Source,
    limit: Limit,
) -> PropertySpec {
    PropertySpec {
        limit: Some(limit),
        ..row(name, stereotype, source)
    }
}

const MODULATED_RUN_MODES: &[ItemSpec] = &[
    item("0", "Constant Current", Some("ci")),
    item("1", "Constant Power", Some("cp")),
    item("2", "Modulation", Some("em")),
];

const CW_RUN_MODES: &[ItemSpec] = &[
    item("0", "Constant Current", Some("ci")),
    item("1", "Constant Power", Some("cp")),
];

const EMISSION_ITEMS: &[ItemSpec] = &[item("0", "Off", Some("l0")), item("1", "On", Some("l1"))];

const ENABLE_ITEMS: &[ItemSpec] = &[item("0", "Disabled", None), item("1", "Enabled", None)];

const IMPEDANCE_ITEMS: &[ItemSpec] = &[item("0", "1 kOhm", None), item("1", "50 Ohm", None)];

const OPERATING_STATES: &[StateSpec] = &[
    state("0", "Off", false),
    state("1", "Waiting for Key", false),
    state("2", "Continuous", true),
    state("3", "On/Off Modulation", true),
    state("4", "Modulation", true),
    state("5", "Fault", false),
    state("6", "Aborted", false),
];

const SKYRA_OPERATING_STATES: &[StateSpec] = &[
    state("0", "Off", false),
    state("1", "Waiting for Key", false),
    state("2", "Continuous", true),
    state("3", "On/Off Modulation", true),
    state("4", "Modulation", true),
    state("5", "Fault", false),
    state("6", "Aborted", false),
    state("7", "Warming Up", false),
];

const FAULTS: &[StateSpec] = &[
    state("0", "No Fault", true),
    state("1", "Temperature Error", false),
    state("3", "Interlock Open", false),
    state("4", "Constant Power Timeout", false),
];

const fn choice(query: &'static str, command: Option<&'static str>, items: &'static [ItemSpec]) -> Source {
    Source::Choice {
        query,
        command,
        items,
    }
}

const fn numeric(query: &'static str, command: &'static str) -> Source {
    Source::Numeric { query, command }
}

const fn status(query: &'static str, states: &'static [StateSpec]) -> Source {
    Source::Status { query, states }
}

const CURRENT_UP_TO_MAX: Limit = Limit::UpTo {
    min: 0.0,
    max_property: MAXIMUM_CURRENT,
};

const POWER_UP_TO_MAX: Limit = Limit::UpTo {
    min: 0.0,
    max_property: MAXIMUM_POWER,
};

const SERIES_06: &[PropertySpec] = &[
    row(VENDOR, Stereotype::Text, Source::Fixed("Cobolt")),
    cached_row(MODEL, Stereotype::Text, Source::Query("glm?")),
    cached_row(SERIAL_NUMBER, Stereotype::Integer, Source::Query("gsn?")),
    cached_row(FIRMWARE_VERSION, Stereotype::Text, Source::Query("gfv?")),
    row(OPERATING_HOURS, Stereotype::Real, Source::Query("hrs?")),
    row(OPERATING_STATUS, Stereotype::Text, status("gom?", OPERATING_STATES)),
    row(FAULT, Stereotype::Text, status("f?", FAULTS)),
    row(EMISSION, Stereotype::Text, choice("l?", None, EMISSION_ITEMS)),
    row(RUN_MODE, Stereotype::Text, choice("gam?", None, MODULATED_RUN_MODES)),
    limited_row(CURRENT_SETPOINT, Stereotype::Real, numeric("glc?", "slc"), CURRENT_UP_TO_MAX),
    cached_row(MAXIMUM_CURRENT, Stereotype::Real, Source::Query("gmlc?")),
    row(MEASURED_CURRENT, Stereotype::Real, Source::Query("i?")),
    limited_row(POWER_SETPOINT, Stereotype::Real, numeric("p?", "p"), POWER_UP_TO_MAX),
    cached_row(MAXIMUM_POWER, Stereotype::Real, Source::Query("gmlp?")),
    row(MEASURED_POWER, Stereotype::Real, Source::Query("pa?")),
    row(DIGITAL_MODULATION, Stereotype::Text, choice("gdmes?", Some("sdmes"), ENABLE_ITEMS)),
    row(ANALOG_MODULATION, Stereotype::Text, choice("games?", Some("sames"), ENABLE_ITEMS)),
    row(ANALOG_IMPEDANCE, Stereotype::Text, choice("galis?", Some("salis"), IMPEDANCE_ITEMS)),
];

const SERIES_08: &[PropertySpec] = &[
    row(VENDOR, Stereotype::Text, Source::Fixed("Cobolt")),
    cached_row(MODEL, Stereotype::Text, Source::Query("glm?")),
    cached_row(SERIAL_NUMBER, Stereotype::Integer, Source::Query("gsn?")),
    cached_row(FIRMWARE_VERSION, Stereotype::Text, Source::Query("gfv?")),
    row(OPERATING_HOURS, Stereotype::Real, Source::Query("hrs?")),
    row(OPERATING_STATUS, Stereotype::Text, status("gom?", OPERATING_STATES)),
    row(FAULT, Stereotype::Text, status("f?", FAULTS)),
    row(EMISSION, Stereotype::Text, choice("l?", None, EMISSION_ITEMS)),
    row(RUN_MODE, Stereotype::Text, choice("gam?", None, CW_RUN_MODES)),
    limited_row(
        CURRENT_SETPOINT,
        Stereotype::Real,
        numeric("glc?", "slc"),
        Limit::Range {
            min: 0.0,
            max: 3000.0,
        },
    ),
    row(MEASURED_CURRENT, Stereotype::Real, Source::Query("i?")),
    limited_row(POWER_SETPOINT, Stereotype::Real, numeric("p?", "p"), POWER_UP_TO_MAX),
    cached_row(MAXIMUM_POWER, Stereotype::Real, Source::Query("gmlp?")),
    row(MEASURED_POWER, Stereotype::Real, Source::Query("pa?")),
];

const SKYRA: &[PropertySpec] = &[
    row(VENDOR, Stereotype::Text, Source::Fixed("Cobolt")),
    cached_row(MODEL, Stereotype::Text, Source::Query("glm?")),
    cached_row(SERIAL_NUMBER, Stereotype::Integer, Source::Query("gsn?")),
    cached_row(FIRMWARE_VERSION, Stereotype::Text, Source::Query("gfv?")),
    row(OPERATING_HOURS, Stereotype::Real, Source::Query("hrs?")),
    row(OPERATING_STATUS, Stereotype::Text, status("gom?", SKYRA_OPERATING_STATES)),
    row(FAULT, Stereotype::Text, status("f?", FAULTS)),
    row(EMISSION, Stereotype::Text, choice("l?", None, EMISSION_ITEMS)),
    row(AUTOSTART, Stereotype::Text, choice("gas?", Some("sas"), ENABLE_ITEMS)),
    row(RUN_MODE, Stereotype::Text, choice("gam?", None, MODULATED_RUN_MODES)),
    limited_row(CURRENT_SETPOINT, Stereotype::Real, numeric("glc?", "slc"), CURRENT_UP_TO_MAX),
    cached_row(MAXIMUM_CURRENT, Stereotype::Real, Source::Query("gmlc?")),
    row(MEASURED_CURRENT, Stereotype::Real, Source::Query("i?")),
    limited_row(POWER_SETPOINT, Stereotype::Real, numeric("p?", "p"), POWER_UP_TO_MAX),
    cached_row(MAXIMUM_POWER, Stereotype::Real, Source::Query("gmlp?")),
    row(MEASURED_POWER, Stereotype::Real, Source::Query("pa?")),
    row(DIGITAL_MODULATION, Stereotype::Text, choice("gdmes?", Some("sdmes"), ENABLE_ITEMS)),
    row(ANALOG_MODULATION, Stereotype::Text, choice("games?", Some("sames"), ENABLE_ITEMS)),
];

const MODULATED_SHUTTER: ShutterSpec = ShutterSpec {
    run_mode_query: "gam?",
    run_modes: MODULATED_RUN_MODES,
    setpoint_query: "glc?",
    setpoint_command: "slc",
    zero_setpoint: "0",
    safe_mode_command: "ci",
    emission_query: Some("l?"),
    status_query: Some("gom?"),
    states: OPERATING_STATES,
    slot_read: "guv?",
    slot_write: "suv",
};

const CW_SHUTTER: ShutterSpec = ShutterSpec {
    run_modes: CW_RUN_MODES,
    ..MODULATED_SHUTTER
};

const SKYRA_SHUTTER: ShutterSpec = ShutterSpec {
    states: SKYRA_OPERATING_STATES,
    ..MODULATED_SHUTTER
};
