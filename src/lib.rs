//! Property lattice, marker derivation and generics-aware assignability for
//! immutability inference over a Java-like type system.
//!
//! Analyses write per-entity [`PropertyStore`]s across [`FixpointDriver`]
//! passes; once frozen, [`derive_markers`] turns a store into the markers an
//! annotation layer shows. The [`types`] module answers assignability and
//! type parameter substitution queries against a [`types::TypeHierarchy`].

pub mod config;
pub mod derive;
pub mod error;
pub mod eventual;
pub mod fixpoint;
pub mod level;
pub mod marker;
pub mod multi_level;
pub mod property;
pub mod store;
pub mod telemetry;
pub mod types;

pub use config::{AnnotationMode, EngineConfig};
pub use derive::{ContractMarker, EntityFacts, derive_markers, import_contract_markers};
pub use error::{EngineError, EngineResult};
pub use eventual::Eventual;
pub use fixpoint::{EntityAnalysis, FixpointDriver, FixpointOutcome, PassStep};
pub use level::Level;
pub use marker::{Marker, MarkerKind, MarkerSet};
pub use multi_level::{Effective, MultiLevel};
pub use property::{Lattice, Property, Value};
pub use store::{EntityKind, PropertyStore};
pub use telemetry::{Phase, Telemetry, init_logging};
