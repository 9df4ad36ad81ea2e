//! The laser aggregate: every property of one instrument behind one dispatcher.

use crate::constraint::{Constraint, ConstraintSpec};
use crate::dispatcher::CommandDispatcher;
use crate::error::{LaserError, LaserResult};
use crate::gui::GuiEnvironment;
use crate::models::{self, LaserModel, ShutterPersistence};
use crate::property::{Property, PropertyKind};
use crate::shutter::{self, RestorePoint, ShutterEmulation, ShutterState};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Span};

/// A laser shared between threads. All commands to one instrument are
/// serialized by holding the lock for the whole operation.
pub type SharedLaser = Arc<Mutex<Laser>>;

#[derive(Debug)]
pub struct Laser {
    model: LaserModel,
    dispatcher: CommandDispatcher,
    properties: BTreeMap<String, Property>,
    span: Span,
}

impl Laser {
    /// An empty aggregate; properties are added with [`Laser::register`].
    pub fn new(model: LaserModel, dispatcher: CommandDispatcher) -> Self {
        let span = info_span!("laser", model = %model, port = %dispatcher.port_name());
        Self {
            model,
            dispatcher,
            properties: BTreeMap::new(),
            span,
        }
    }

    /// Build every property of `model`, attach its constraints and bring up
    /// the shutter emulation.
    pub fn incarnate(
        model: LaserModel,
        dispatcher: CommandDispatcher,
        persistence: ShutterPersistence,
    ) -> LaserResult<Self> {
        let mut laser = Self::new(model, dispatcher);
        let span = laser.span.clone();
        let _enter = span.enter();

        for spec in model.properties() {
            laser.register(spec.build()?)?;
        }
        for spec in model.properties() {
            if let Some(limit) = spec.limit {
                laser.attach_constraint(spec.name, limit.to_constraint()?)?;
            }
        }

        let emulation = laser.incarnate_shutter(persistence)?;
        laser.register(Property::shutter(models::SHUTTER, emulation))?;

        info!(
            properties = laser.properties.len(),
            commands = laser.dispatcher.commands_sent(),
            "laser incarnated"
        );
        Ok(laser)
    }

    fn incarnate_shutter(&mut self, persistence: ShutterPersistence) -> LaserResult<ShutterEmulation> {
        let spec = self.model.shutter();
        let slot = spec.slot();

        let restore = match persistence {
            ShutterPersistence::Volatile => RestorePoint::volatile(),
            ShutterPersistence::Device => RestorePoint::Device(slot),
            // Only the slot read decides the fallback; later failures are real errors.
            ShutterPersistence::Auto => match slot.load(&mut self.dispatcher) {
                Ok(_) => RestorePoint::Device(slot),
                Err(e) if shutter::is_unsupported(&e) => {
                    warn!(error = %e, "device slot unsupported, shutter state will not survive a restart");
                    RestorePoint::volatile()
                }
                Err(e) => return Err(e),
            },
        };
        ShutterEmulation::incarnate(&mut self.dispatcher, spec.commands()?, restore)
    }

    /// Add a property. Names are unique.
    pub fn register(&mut self, property: Property) -> LaserResult<()> {
        if self.properties.contains_key(property.name()) {
            return Err(LaserError::configuration(format!(
                "property '{}' registered twice",
                property.name()
            )));
        }
        debug!(parent: &self.span, property = property.name(), "registered property");
        self.properties.insert(property.name().to_string(), property);
        Ok(())
    }

    /// Attach a constraint, resolving a range maximum from another property now.
    pub fn attach_constraint(&mut self, name: &str, spec: ConstraintSpec) -> LaserResult<()> {
        let constraint = match spec {
            ConstraintSpec::Fixed(constraint) => constraint,
            ConstraintSpec::RangeUpToProperty { min, max_property } => {
                let raw = self.get(&max_property)?;
                let max: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| LaserError::mismatch(&max_property, raw.as_str()))?;
                Constraint::range(min, max)?
            }
        };
        self.property_mut(name)?.attach_constraint(constraint)
    }

    pub fn get(&mut self, name: &str) -> LaserResult<String> {
        let _enter = self.span.enter();
        let property = self
            .properties
            .get(name)
            .ok_or_else(|| LaserError::UnknownProperty(name.to_string()))?;
        property.get(&mut self.dispatcher)
    }

    pub fn set(&mut self, name: &str, value: &str) -> LaserResult<()> {
        let _enter = self.span.enter();
        let property = self
            .properties
            .get_mut(name)
            .ok_or_else(|| LaserError::UnknownProperty(name.to_string()))?;
        let result = property.set(&mut self.dispatcher, value);
        let is_shutter = matches!(property.kind(), PropertyKind::Shutter(_));

        match &result {
            Ok(()) => info!(property = name, value, "property set"),
            Err(e) => warn!(property = name, value, error = %e, "property set failed"),
        }
        // Shutter transitions rewrite run mode and setpoint behind the other
        // properties' caches.
        if is_shutter {
            self.invalidate_all();
        }
        result
    }

    /// Set from the GUI, then show what the device now holds. On failure the
    /// last known-good value (or the stereotype default) is shown instead.
    pub fn set_from_gui(
        &mut self,
        name: &str,
        value: &str,
        gui: &mut dyn GuiEnvironment,
    ) -> LaserResult<()> {
        let result = self.set(name, value);
        let shown = match &result {
            Ok(()) => match self.get(name) {
                Ok(current) => current,
                Err(e) => {
                    debug!(property = name, error = %e, "re-read after set failed");
                    self.property(name)?.fallback_value()
                }
            },
            Err(_) => self.property(name)?.fallback_value(),
        };
        gui.publish_value(name, &shown);
        result
    }

    /// Announce every property's legal values and ranges.
    pub fn describe_to(&self, gui: &mut dyn GuiEnvironment) {
        let _enter = self.span.enter();
        for property in self.properties.values() {
            property.describe_to(gui);
        }
    }

    pub fn property(&self, name: &str) -> LaserResult<&Property> {
        self.properties
            .get(name)
            .ok_or_else(|| LaserError::UnknownProperty(name.to_string()))
    }

    fn property_mut(&mut self, name: &str) -> LaserResult<&mut Property> {
        self.properties
            .get_mut(name)
            .ok_or_else(|| LaserError::UnknownProperty(name.to_string()))
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn invalidate(&self, name: &str) -> LaserResult<()> {
        self.property(name)?.invalidate_cache();
        Ok(())
    }

    pub fn invalidate_all(&self) {
        for property in self.properties.values() {
            property.invalidate_cache();
        }
    }

    /// Local shutter state, without consulting the device.
    pub fn shutter_state(&self) -> Option<ShutterState> {
        match self.properties.get(models::SHUTTER)?.kind() {
            PropertyKind::Shutter(emulation) => Some(emulation.state()),
            _ => None,
        }
    }

    /// Re-read the shutter state from its restore point.
    pub fn resync_shutter(&mut self) -> LaserResult<()> {
        let _enter = self.span.enter();
        let property = self
            .properties
            .get_mut(models::SHUTTER)
            .ok_or_else(|| LaserError::UnknownProperty(models::SHUTTER.to_string()))?;
        property.resync(&mut self.dispatcher)
    }

    pub fn model(&self) -> LaserModel {
        self.model
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn into_shared(self) -> SharedLaser {
        Arc::new(Mutex::new(self))
    }
}
