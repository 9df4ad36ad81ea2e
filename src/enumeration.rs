//! Wire token <-> GUI label tables.
//!
//! Lookups scan the ordered list and return the first match in either
//! direction, so a duplicated device value or label would make later entries
//! unreachable. Construction rejects duplicates instead of tolerating them.

use crate::error::{LaserError, LaserResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One selectable value of an enumeration property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationItem {
    /// Token exchanged on the wire.
    pub device_value: String,
    /// Label shown to the user.
    pub gui_name: String,
    /// Command that selects this item, when selection is not `<set> <value>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_command: Option<String>,
}

impl EnumerationItem {
    pub fn new(device_value: impl Into<String>, gui_name: impl Into<String>) -> Self {
        Self {
            device_value: device_value.into(),
            gui_name: gui_name.into(),
            set_command: None,
        }
    }

    pub fn with_set_command(mut self, command: impl Into<String>) -> Self {
        self.set_command = Some(command.into());
        self
    }
}

/// Ordered, duplicate-free list of enumeration items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerationTable {
    items: Vec<EnumerationItem>,
}

impl EnumerationTable {
    /// Build a table, rejecting duplicate device values or GUI names.
    pub fn new(items: impl IntoIterator<Item = EnumerationItem>) -> LaserResult<Self> {
        let mut table = Self::default();
        for item in items {
            table.push(item)?;
        }
        Ok(table)
    }

    pub fn push(&mut self, item: EnumerationItem) -> LaserResult<()> {
        if self.decode(&item.device_value).is_some() {
            return Err(LaserError::configuration(format!(
                "duplicate device value '{}' in enumeration",
                item.device_value
            )));
        }
        if self.encode(&item.gui_name).is_some() {
            return Err(LaserError::configuration(format!(
                "duplicate GUI name '{}' in enumeration",
                item.gui_name
            )));
        }
        self.items.push(item);
        Ok(())
    }

    /// Item for a wire token.
    pub fn decode(&self, device_value: &str) -> Option<&EnumerationItem> {
        self.items.iter().find(|i| i.device_value == device_value)
    }

    /// Item for a GUI label.
    pub fn encode(&self, gui_name: &str) -> Option<&EnumerationItem> {
        self.items.iter().find(|i| i.gui_name == gui_name)
    }

    pub fn items(&self) -> &[EnumerationItem] {
        &self.items
    }

    pub fn gui_names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.gui_name.as_str())
    }

    /// Whether every item carries its own selection command.
    pub fn all_have_set_commands(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| i.set_command.is_some())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One instrument operating state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub code: String,
    pub label: String,
    /// Whether the emulated shutter may be open while the laser is in this state.
    pub shutter_permitting: bool,
}

impl StateEntry {
    pub fn new(code: impl Into<String>, label: impl Into<String>, shutter_permitting: bool) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
            shutter_permitting,
        }
    }
}

/// Status code table for read-only status properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateTable {
    entries: Vec<StateEntry>,
}

impl StateTable {
    pub fn new(entries: impl IntoIterator<Item = StateEntry>) -> LaserResult<Self> {
        let entries: Vec<StateEntry> = entries.into_iter().collect();

        let mut codes = HashSet::new();
        let mut labels = HashSet::new();
        for entry in &entries {
            if !codes.insert(entry.code.as_str()) {
                return Err(LaserError::configuration(format!(
                    "duplicate state code '{}'",
                    entry.code
                )));
            }
            if !labels.insert(entry.label.as_str()) {
                return Err(LaserError::configuration(format!(
                    "duplicate state label '{}'",
                    entry.label
                )));
            }
        }

        Ok(Self { entries })
    }

    pub fn entry(&self, code: &str) -> Option<&StateEntry> {
        self.entries.iter().find(|e| e.code == code)
    }

    pub fn label(&self, code: &str) -> Option<&str> {
        self.entry(code).map(|e| e.label.as_str())
    }

    /// Unknown codes never permit the shutter.
    pub fn permits_shutter(&self, code: &str) -> bool {
        self.entry(code).is_some_and(|e| e.shutter_permitting)
    }

    pub fn entries(&self) -> &[StateEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn run_modes() -> EnumerationTable {
        EnumerationTable::new([
            EnumerationItem::new("0", "Constant Current").with_set_command("ci"),
            EnumerationItem::new("1", "Constant Power").with_set_command("cp"),
            EnumerationItem::new("2", "Modulation").with_set_command("em"),
        ])
        .unwrap()
    }

    #[test]
    fn test_lookup_both_directions() {
        let table = run_modes();
        for item in table.items() {
            let by_label = table.encode(&item.gui_name).unwrap();
            assert_eq!(table.decode(&by_label.device_value), Some(item));
        }
        assert!(table.decode("7").is_none());
        assert!(table.encode("Burst").is_none());
    }

    #[test]
    fn test_duplicate_device_value_rejected() {
        let err = EnumerationTable::new([
            EnumerationItem::new("0", "Off"),
            EnumerationItem::new("0", "Disabled"),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_duplicate_gui_name_rejected() {
        let mut table = EnumerationTable::new([EnumerationItem::new("0", "Off")]).unwrap();
        assert!(table.push(EnumerationItem::new("1", "Off")).is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_all_have_set_commands() {
        assert!(run_modes().all_have_set_commands());
        let plain = EnumerationTable::new([EnumerationItem::new("0", "Disabled")]).unwrap();
        assert!(!plain.all_have_set_commands());
        assert!(!EnumerationTable::default().all_have_set_commands());
    }

    #[test]
    fn test_state_table() {
        let states = StateTable::new([
            StateEntry::new("0", "Off", false),
            StateEntry::new("2", "Continuous", true),
            StateEntry::new("5", "Fault", false),
        ])
        .unwrap();

        assert_eq!(states.label("2"), Some("Continuous"));
        assert!(states.permits_shutter("2"));
        assert!(!states.permits_shutter("5"));
        assert!(!states.permits_shutter("99"));
    }

    #[test]
    fn test_state_table_duplicates_rejected() {
        assert!(StateTable::new([
            StateEntry::new("0", "Off", false),
            StateEntry::new("0", "Standby", false),
        ])
        .is_err());
        assert!(StateTable::new([
            StateEntry::new("0", "Off", false),
            StateEntry::new("1", "Off", false),
        ])
        .is_err());
    }
}
