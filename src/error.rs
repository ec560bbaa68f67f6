use thiserror::Error;

use crate::multi_level::Effective;
use crate::property::{Family, Value};
use crate::store::EntityKind;

/// Errors raised by the lattice, the stores, marker derivation and the type engine.
///
/// A legitimate "not assignable" answer is not an error; see [`crate::types::Distance`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("lattice violation on {entity}: {property} cannot move from {old} to {new}")]
    LatticeViolation {
        entity: String,
        property: String,
        old: Value,
        new: Value,
    },

    #[error("{entity}: {property} holds {expected} values, got {value}")]
    FamilyMismatch {
        entity: String,
        property: String,
        expected: Family,
        value: Value,
    },

    #[error("{entity}: store is frozen, cannot write {property}")]
    FrozenStore { entity: String, property: String },

    #[error("illegal eventual marker placement on {kind} {entity}: {detail}")]
    IllegalEventualPlacement {
        entity: String,
        kind: EntityKind,
        detail: &'static str,
    },

    #[error("{entity} is not an eventually immutable type, cannot emit a marker after a mark")]
    NotEventual { entity: String },

    #[error("{entity} is a {actual}, expected a {expected}")]
    WrongEntityKind {
        entity: String,
        expected: EntityKind,
        actual: EntityKind,
    },

    #[error("{entity}: markers are derived from a frozen store only")]
    NotFrozen { entity: String },

    #[error("component at depth {depth} was already promoted to {state}")]
    DoublePromotion { depth: usize, state: Effective },

    #[error("eventual descriptor without responsible fields cannot carry {flag}")]
    EmptyEventual { flag: &'static str },

    #[error("invalid packed lattice value {value}")]
    InvalidPacked { value: i32 },

    #[error("marker {marker} has no parameter {parameter}")]
    MissingParameter { marker: String, parameter: String },

    #[error("unresolvable type: {0}")]
    UnresolvableType(String),
}

/// Result alias for the core operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
