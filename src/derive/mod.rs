//! Marker derivation: pure functions from a frozen property store to the
//! markers that express its resolved values.

mod contract;
mod immutable;
mod independent;
mod not_null;
mod size;

use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::eventual::Eventual;
use crate::marker::{Marker, MarkerKind, MarkerSet};
use crate::multi_level::{E1, E2, MultiLevel};
use crate::property::{Property, Value};
use crate::store::{EntityKind, PropertyStore};
use crate::telemetry::{Phase, Telemetry, entity_attributes, in_phase};

pub use contract::{ContractMarker, import_contract_markers};

use immutable::{ImmutableInput, immutability_markers};
use independent::independence_markers;
use not_null::not_null_markers;
use size::size_markers;

/// Facts about a type that are not stored as properties.
#[derive(Clone, Copy, Debug)]
pub struct TypeFacts<'a> {
    pub is_interface: bool,
    /// Fields whose precondition makes the type eventually immutable.
    pub eventual: &'a Eventual,
}

/// Facts about a method that are not stored as properties.
#[derive(Clone, Copy, Debug)]
pub struct MethodFacts<'a> {
    pub is_constructor: bool,
    pub returns_void: bool,
    pub returns_primitive: bool,
    /// The declared return type is at least eventually E2 immutable.
    pub return_type_eventually_e2: bool,
    pub owner_is_interface: bool,
    /// Mark/only/test role of the method, from analysis or contracts.
    pub eventual: &'a Eventual,
    /// The inferred immutability beats what the return type already implies.
    pub better_than_formal: bool,
}

/// Facts about a field that are not stored as properties.
#[derive(Clone, Copy, Debug)]
pub struct FieldFacts<'a> {
    pub is_primitive: bool,
    pub is_explicitly_final: bool,
    /// Immutability of the owning type.
    pub owner_immutable: MultiLevel,
    pub owner_eventual: &'a Eventual,
    pub better_than_formal: bool,
}

/// Facts about a parameter that are not stored as properties.
#[derive(Clone, Copy, Debug)]
pub struct ParameterFacts {
    pub is_primitive: bool,
    pub owner_is_interface: bool,
    pub better_than_formal: bool,
}

/// Kind-specific facts, for callers that dispatch over mixed entities.
#[derive(Clone, Copy, Debug)]
pub enum EntityFacts<'a> {
    Type(TypeFacts<'a>),
    Method(MethodFacts<'a>),
    Field(FieldFacts<'a>),
    Parameter(ParameterFacts),
}

/// Derive the markers of one entity inside an optional telemetry span.
pub fn derive_markers(
    store: &PropertyStore,
    facts: EntityFacts<'_>,
    telemetry: Option<&Telemetry>,
) -> EngineResult<MarkerSet> {
    let attributes = entity_attributes(store.entity(), store.kind());
    in_phase(telemetry, Phase::Derive, &attributes, || match facts {
        EntityFacts::Type(facts) => derive_type_markers(store, &facts),
        EntityFacts::Method(facts) => derive_method_markers(store, &facts),
        EntityFacts::Field(facts) => derive_field_markers(store, &facts),
        EntityFacts::Parameter(facts) => derive_parameter_markers(store, &facts),
    })
}

pub fn derive_type_markers(store: &PropertyStore, facts: &TypeFacts<'_>) -> EngineResult<MarkerSet> {
    ensure_derivable(store, EntityKind::Type)?;
    let mut markers = immutability_markers(&ImmutableInput {
        entity: store.entity(),
        kind: EntityKind::Type,
        immutable: store.get(Property::Immutable).multi(),
        container: store.get(Property::Container).level(),
        is_interface: facts.is_interface,
        eventual: facts.eventual,
    })?;
    markers.extend(independence_markers(
        store.entity(),
        EntityKind::Type,
        store.get(Property::Independent),
        facts.is_interface,
        facts.eventual,
    )?);
    for (property, kind) in [
        (Property::Singleton, MarkerKind::Singleton),
        (Property::UtilityClass, MarkerKind::UtilityClass),
        (Property::ExtensionClass, MarkerKind::ExtensionClass),
    ] {
        level_flag(&mut markers, store.get(property), kind);
    }
    log_derived(store, &markers);
    Ok(markers)
}

pub fn derive_method_markers(
    store: &PropertyStore,
    facts: &MethodFacts<'_>,
) -> EngineResult<MarkerSet> {
    ensure_derivable(store, EntityKind::Method)?;
    let mut markers = MarkerSet::new();
    let modified = store.get(Property::Modified);

    let independence_applies = facts.is_constructor
        || (modified == Value::FALSE && !facts.returns_void && !facts.return_type_eventually_e2);
    if independence_applies {
        markers.extend(independence_markers(
            store.entity(),
            EntityKind::Method,
            store.get(Property::Independent),
            facts.owner_is_interface,
            &Eventual::not_eventual(),
        )?);
    }
    if facts.is_constructor {
        log_derived(store, &markers);
        return Ok(markers);
    }

    modification_markers(&mut markers, modified);
    if store.get(Property::Finalizer).is_true() {
        markers.present(Marker::new(MarkerKind::Finalizer));
    }
    eventual_method_markers(&mut markers, facts.eventual);
    if facts.returns_void {
        log_derived(store, &markers);
        return Ok(markers);
    }

    level_flag(&mut markers, store.get(Property::Identity), MarkerKind::Identity);
    if facts.returns_primitive {
        log_derived(store, &markers);
        return Ok(markers);
    }

    level_flag(&mut markers, store.get(Property::Fluent), MarkerKind::Fluent);
    markers.extend(not_null_markers(store.get(Property::NotNull), true));
    markers.extend(size_markers(
        store.get(Property::SizeCopy),
        store.get(Property::Size),
        store.get(Property::SizeOut),
    ));
    level_flag(&mut markers, store.get(Property::NotModified1), MarkerKind::NotModified1);
    if facts.better_than_formal {
        markers.extend(immutability_markers(&ImmutableInput {
            entity: store.entity(),
            kind: EntityKind::Method,
            immutable: store.get(Property::Immutable).multi(),
            container: store.get(Property::Container).level(),
            is_interface: false,
            eventual: facts.eventual,
        })?);
    }
    log_derived(store, &markers);
    Ok(markers)
}

pub fn derive_field_markers(
    store: &PropertyStore,
    facts: &FieldFacts<'_>,
) -> EngineResult<MarkerSet> {
    ensure_derivable(store, EntityKind::Field)?;
    let mut markers = MarkerSet::new();
    let is_final = store.get(Property::Final);

    if is_final == Value::FALSE && facts.owner_immutable.read_at(E1).is_eventual() {
        markers.present(Marker::new(MarkerKind::Final).with("after", owner_label(store, facts)?));
    } else if is_final == Value::TRUE {
        if !facts.is_explicitly_final {
            markers.present(Marker::new(MarkerKind::Final));
        }
    } else if is_final == Value::FALSE {
        markers.present(Marker::new(MarkerKind::Variable));
    }
    if facts.is_primitive {
        log_derived(store, &markers);
        return Ok(markers);
    }

    let modified = store.get(Property::Modified);
    if modified == Value::TRUE && facts.owner_immutable.read_at(E2).is_eventual() {
        markers.present(
            Marker::new(MarkerKind::NotModified).with("after", owner_label(store, facts)?),
        );
    } else if is_final == Value::TRUE {
        modification_markers(&mut markers, modified);
    }

    level_flag(&mut markers, store.get(Property::NotModified1), MarkerKind::NotModified1);
    markers.extend(not_null_markers(store.get(Property::NotNull), true));
    markers.extend(size_markers(
        store.get(Property::SizeCopy),
        store.get(Property::Size),
        store.get(Property::SizeOut),
    ));
    if facts.better_than_formal {
        markers.extend(immutability_markers(&ImmutableInput {
            entity: store.entity(),
            kind: EntityKind::Field,
            immutable: store.get(Property::Immutable).multi(),
            container: store.get(Property::Container).level(),
            is_interface: false,
            eventual: facts.owner_eventual,
        })?);
    }
    log_derived(store, &markers);
    Ok(markers)
}

pub fn derive_parameter_markers(
    store: &PropertyStore,
    facts: &ParameterFacts,
) -> EngineResult<MarkerSet> {
    ensure_derivable(store, EntityKind::Parameter)?;
    let mut markers = MarkerSet::new();
    modification_markers(&mut markers, store.get(Property::Modified));
    if facts.is_primitive {
        log_derived(store, &markers);
        return Ok(markers);
    }

    let not_eventual = Eventual::not_eventual();
    level_flag(&mut markers, store.get(Property::NotModified1), MarkerKind::NotModified1);
    markers.extend(not_null_markers(store.get(Property::NotNull), true));
    markers.extend(size_markers(
        store.get(Property::SizeCopy),
        store.get(Property::Size),
        store.get(Property::SizeOut),
    ));
    markers.extend(independence_markers(
        store.entity(),
        EntityKind::Parameter,
        store.get(Property::Independent),
        facts.owner_is_interface,
        &not_eventual,
    )?);
    if facts.better_than_formal {
        markers.extend(immutability_markers(&ImmutableInput {
            entity: store.entity(),
            kind: EntityKind::Parameter,
            immutable: store.get(Property::Immutable).multi(),
            container: store.get(Property::Container).level(),
            is_interface: false,
            eventual: &not_eventual,
        })?);
    }
    log_derived(store, &markers);
    Ok(markers)
}

fn ensure_derivable(store: &PropertyStore, expected: EntityKind) -> EngineResult<()> {
    if store.kind() != expected {
        return Err(EngineError::WrongEntityKind {
            entity: store.entity().to_string(),
            expected,
            actual: store.kind(),
        });
    }
    if !store.is_frozen() {
        return Err(EngineError::NotFrozen {
            entity: store.entity().to_string(),
        });
    }
    Ok(())
}

/// Present on true, absent on false, nothing while delayed.
fn level_flag(markers: &mut MarkerSet, value: Value, kind: MarkerKind) {
    if let Value::Bool(present) = value {
        markers.put(Marker::new(kind), present);
    }
}

fn modification_markers(markers: &mut MarkerSet, modified: Value) {
    if let Value::Bool(modified) = modified {
        markers.put(Marker::new(MarkerKind::Modified), modified);
        markers.put(Marker::new(MarkerKind::NotModified), !modified);
    }
}

/// @Mark, @Only and @TestMark for a method that takes part in a precondition.
fn eventual_method_markers(markers: &mut MarkerSet, eventual: &Eventual) {
    if !eventual.is_eventual() {
        return;
    }
    let label = eventual.label();
    if eventual.mark() {
        markers.present(Marker::new(MarkerKind::Mark).with("value", label.as_str()));
    }
    match eventual.after() {
        Some(true) => markers.present(Marker::new(MarkerKind::Only).with("after", label.as_str())),
        Some(false) => markers.present(Marker::new(MarkerKind::Only).with("before", label.as_str())),
        None => {}
    }
    match eventual.test() {
        Some(true) => markers.present(Marker::new(MarkerKind::TestMark).with("value", label.as_str())),
        Some(false) => markers.present(
            Marker::new(MarkerKind::TestMark)
                .with("value", label.as_str())
                .with("before", true),
        ),
        None => {}
    }
}

fn owner_label(store: &PropertyStore, facts: &FieldFacts<'_>) -> EngineResult<String> {
    if !facts.owner_eventual.is_eventual() {
        return Err(EngineError::NotEventual {
            entity: store.entity().to_string(),
        });
    }
    Ok(facts.owner_eventual.label())
}

fn log_derived(store: &PropertyStore, markers: &MarkerSet) {
    debug!(
        entity = store.entity(),
        kind = %store.kind(),
        present = markers.present_markers().count(),
        total = markers.len(),
        "derived markers"
    );
}
