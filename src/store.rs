use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::AnnotationMode;
use crate::error::{EngineError, EngineResult};
use crate::property::{Lattice, Property, Value, Violation};

/// Kind of program entity a store is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Type,
    Method,
    Field,
    Parameter,
    /// Statement-scoped analysis object; never derives markers.
    Local,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EntityKind::Type => "type",
            EntityKind::Method => "method",
            EntityKind::Field => "field",
            EntityKind::Parameter => "parameter",
            EntityKind::Local => "local",
        };
        f.write_str(text)
    }
}

/// Monotonic property store of one entity.
///
/// Written across fixpoint passes by the pass that owns the entity, then
/// frozen; every write goes through the property's [`Lattice`] declaration.
#[derive(Clone, Debug)]
pub struct PropertyStore<P = Property> {
    entity: String,
    kind: EntityKind,
    has_been_defined: bool,
    annotation_mode: AnnotationMode,
    values: BTreeMap<P, Value>,
    frozen: bool,
}

impl<P: Lattice> PropertyStore<P> {
    /// `has_been_defined` is true when the entity's source is analysed;
    /// otherwise absent properties fall back to their annotation-mode default.
    pub fn new(
        entity: impl Into<String>,
        kind: EntityKind,
        has_been_defined: bool,
        annotation_mode: AnnotationMode,
    ) -> Self {
        Self {
            entity: entity.into(),
            kind,
            has_been_defined,
            annotation_mode,
            values: BTreeMap::new(),
            frozen: false,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn has_been_defined(&self) -> bool {
        self.has_been_defined
    }

    pub fn annotation_mode(&self) -> AnnotationMode {
        self.annotation_mode
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Stored value; when absent, delayed for a defined entity and the
    /// declared default for an opaque one.
    pub fn get(&self, property: P) -> Value {
        match self.values.get(&property) {
            Some(value) => *value,
            None if self.has_been_defined => Value::Delayed,
            None => property.value_when_absent(self.annotation_mode),
        }
    }

    /// Stored value without defaulting.
    pub fn get_as_is(&self, property: P) -> Value {
        self.values.get(&property).copied().unwrap_or(Value::Delayed)
    }

    pub fn set(&mut self, property: P, value: Value) -> EngineResult<()> {
        self.ensure_writable(property)?;
        let old = self.get_as_is(property);
        let joined = property
            .join(old, value)
            .map_err(|violation| self.violation(property, old, value, violation))?;
        self.store(property, old, joined);
        Ok(())
    }

    /// Keep the better of the stored and the proposed value.
    pub fn improve(&mut self, property: P, value: Value) -> EngineResult<()> {
        self.ensure_writable(property)?;
        let old = self.get_as_is(property);
        let joined = property
            .improve(old, value)
            .map_err(|violation| self.violation(property, old, value, violation))?;
        self.store(property, old, joined);
        Ok(())
    }

    pub fn freeze(&mut self) {
        if !self.frozen {
            debug!(entity = %self.entity, kind = %self.kind, "froze property store");
        }
        self.frozen = true;
    }

    /// Properties among `required` that still read as delayed.
    pub fn delayed_among(&self, required: &[P]) -> Vec<P> {
        required
            .iter()
            .copied()
            .filter(|property| self.get(*property).is_delayed())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (P, Value)> + '_ {
        self.values.iter().map(|(property, value)| (*property, *value))
    }

    fn store(&mut self, property: P, old: Value, new: Value) {
        if old == new {
            return;
        }
        trace!(entity = %self.entity, %property, %old, %new, "property updated");
        self.values.insert(property, new);
    }

    fn ensure_writable(&self, property: P) -> EngineResult<()> {
        if self.frozen {
            return Err(EngineError::FrozenStore {
                entity: self.entity.clone(),
                property: property.to_string(),
            });
        }
        Ok(())
    }

    fn violation(&self, property: P, old: Value, new: Value, violation: Violation) -> EngineError {
        match violation {
            Violation::Downgrade => EngineError::LatticeViolation {
                entity: self.entity.clone(),
                property: property.to_string(),
                old,
                new,
            },
            Violation::WrongFamily(expected) => EngineError::FamilyMismatch {
                entity: self.entity.clone(),
                property: property.to_string(),
                expected,
                value: new,
            },
        }
    }
}
