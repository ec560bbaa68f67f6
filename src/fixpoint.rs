use std::collections::BTreeMap;

use anyhow::{Context, Result};
use opentelemetry::{Context as OtelContext, KeyValue};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::property::Property;
use crate::store::PropertyStore;
use crate::telemetry::{
    Phase, Telemetry, entity_attributes, in_child_phase, in_phase, pass_attribute, record_event,
};

/// Per-entity analysis run once per fixpoint pass.
///
/// An implementation only writes the store it is handed; stores of other
/// entities are read through whatever shared state the implementation holds.
pub trait EntityAnalysis: Sync {
    fn analyse(&self, entity: &str, store: &mut PropertyStore, pass: usize) -> Result<PassStep>;
}

/// What one entity's analysis did during a pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassStep {
    pub changed: bool,
    /// Properties that were read as delayed.
    pub delayed: Vec<Property>,
}

impl PassStep {
    /// Nothing changed and nothing is waiting.
    pub fn stable() -> Self {
        Self::default()
    }

    pub fn progressed() -> Self {
        Self {
            changed: true,
            delayed: Vec::new(),
        }
    }

    pub fn waiting_on(delayed: Vec<Property>) -> Self {
        Self {
            changed: false,
            delayed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum FixpointOutcome {
    /// Every store is frozen.
    Converged { passes: usize },
    /// Still delayed after `passes`; stores stay writable.
    Delayed {
        passes: usize,
        pending: BTreeMap<String, Vec<Property>>,
    },
}

impl FixpointOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, FixpointOutcome::Converged { .. })
    }
}

/// Runs [`EntityAnalysis`] passes until no store changes and nothing is
/// delayed, or until the pass budget is spent.
pub struct FixpointDriver<'t> {
    max_passes: usize,
    parallel: bool,
    telemetry: Option<&'t Telemetry>,
}

impl<'t> FixpointDriver<'t> {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_passes: config.max_passes,
            parallel: config.parallel,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: &'t Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Entities are visited in sorted order; results are merged in that order
    /// whether or not the pass runs on the rayon pool.
    pub fn run<A: EntityAnalysis + ?Sized>(
        &self,
        analysis: &A,
        stores: &mut BTreeMap<String, PropertyStore>,
    ) -> Result<FixpointOutcome> {
        let attributes = [
            KeyValue::new("engine.entities", stores.len() as i64),
            KeyValue::new("engine.parallel", self.parallel),
        ];
        in_phase(self.telemetry, Phase::Fixpoint, &attributes, || {
            self.run_passes(analysis, stores)
        })
    }

    fn run_passes<A: EntityAnalysis + ?Sized>(
        &self,
        analysis: &A,
        stores: &mut BTreeMap<String, PropertyStore>,
    ) -> Result<FixpointOutcome> {
        info!(
            entities = stores.len(),
            max_passes = self.max_passes,
            parallel = self.parallel,
            "starting fixpoint"
        );
        let mut passes = 0;
        let mut pending = BTreeMap::new();
        while passes < self.max_passes {
            let pass = passes;
            passes += 1;
            let steps = in_phase(self.telemetry, Phase::Pass, &[pass_attribute(pass)], || {
                self.run_pass(analysis, stores, pass)
            })?;
            let changed = steps.iter().any(|(_, step)| step.changed);
            pending = steps
                .into_iter()
                .filter(|(_, step)| !step.delayed.is_empty())
                .map(|(entity, step)| (entity, step.delayed))
                .collect();
            debug!(pass, changed, delayed = pending.len(), "fixpoint pass finished");

            if !changed && pending.is_empty() {
                for store in stores.values_mut() {
                    store.freeze();
                }
                info!(passes, "fixpoint converged");
                return Ok(FixpointOutcome::Converged { passes });
            }
            if !changed {
                // a pass without change cannot resolve the remaining delays
                break;
            }
        }

        warn!(
            passes,
            delayed_entities = pending.len(),
            "fixpoint stopped with delayed properties"
        );
        record_event(
            "engine.fixpoint.delayed",
            &[
                KeyValue::new("engine.passes", passes as i64),
                KeyValue::new("engine.delayed_entities", pending.len() as i64),
            ],
        );
        Ok(FixpointOutcome::Delayed { passes, pending })
    }

    fn run_pass<A: EntityAnalysis + ?Sized>(
        &self,
        analysis: &A,
        stores: &mut BTreeMap<String, PropertyStore>,
        pass: usize,
    ) -> Result<Vec<(String, PassStep)>> {
        let parent = OtelContext::current();
        let analyse_one = |(entity, store): (&String, &mut PropertyStore)| -> Result<(String, PassStep)> {
            let attributes = entity_attributes(entity, store.kind());
            let step = in_child_phase(
                self.telemetry,
                Phase::Analyse,
                &attributes,
                &parent,
                || analysis.analyse(entity, store, pass),
            )
            .with_context(|| format!("analyse {entity} in pass {pass}"))?;
            Ok((entity.clone(), step))
        };
        if self.parallel {
            stores.par_iter_mut().map(analyse_one).collect()
        } else {
            stores.iter_mut().map(analyse_one).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnnotationMode;
    use crate::error::EngineError;
    use crate::property::Value;
    use crate::store::EntityKind;
    use crate::telemetry::tests::RecordingExporter;

    /// Entity `n` becomes final in pass `n`; until then it reports `Final` as delayed.
    struct Staggered;

    impl EntityAnalysis for Staggered {
        fn analyse(&self, entity: &str, store: &mut PropertyStore, pass: usize) -> Result<PassStep> {
            let ready_at: usize = entity.trim_start_matches("e").parse()?;
            if store.get(Property::Final).is_delayed() {
                if pass >= ready_at {
                    store.set(Property::Final, Value::TRUE)?;
                    return Ok(PassStep::progressed());
                }
                return Ok(PassStep::waiting_on(vec![Property::Final]));
            }
            Ok(PassStep::stable())
        }
    }

    struct Downgrading;

    impl EntityAnalysis for Downgrading {
        fn analyse(&self, _entity: &str, store: &mut PropertyStore, pass: usize) -> Result<PassStep> {
            store.set(Property::Final, Value::Bool(pass == 0))?;
            Ok(PassStep::progressed())
        }
    }

    fn stores(count: usize) -> BTreeMap<String, PropertyStore> {
        (0..count)
            .map(|index| {
                let entity = format!("e{index}");
                let store = PropertyStore::new(
                    entity.clone(),
                    EntityKind::Field,
                    true,
                    AnnotationMode::Defensive,
                );
                (entity, store)
            })
            .collect()
    }

    fn config(max_passes: usize, parallel: bool) -> EngineConfig {
        EngineConfig {
            max_passes,
            parallel,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn converges_and_freezes_every_store() {
        for parallel in [false, true] {
            let mut stores = stores(3);
            let outcome = FixpointDriver::new(&config(10, parallel))
                .run(&Staggered, &mut stores)
                .expect("fixpoint");
            assert_eq!(outcome, FixpointOutcome::Converged { passes: 4 });
            assert!(stores.values().all(PropertyStore::is_frozen));
            assert!(stores.values().all(|store| store.get(Property::Final) == Value::TRUE));
        }
    }

    #[test]
    fn running_out_of_passes_reports_pending_properties() {
        let mut stores = stores(4);
        let outcome = FixpointDriver::new(&config(2, true))
            .run(&Staggered, &mut stores)
            .expect("fixpoint");
        let expected: BTreeMap<String, Vec<Property>> = [
            ("e2".to_string(), vec![Property::Final]),
            ("e3".to_string(), vec![Property::Final]),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            outcome,
            FixpointOutcome::Delayed {
                passes: 2,
                pending: expected
            }
        );
        assert!(stores.values().all(|store| !store.is_frozen()));
    }

    #[test]
    fn lattice_violation_aborts_the_run() {
        let mut stores = stores(2);
        let error = FixpointDriver::new(&config(5, false))
            .run(&Downgrading, &mut stores)
            .expect_err("downgrade");
        assert!(format!("{error:#}").contains("analyse e0 in pass 1"));
        assert!(matches!(
            error.downcast_ref::<EngineError>(),
            Some(EngineError::LatticeViolation { .. })
        ));
    }

    #[test]
    fn spans_wrap_passes_and_entities() {
        let exporter = RecordingExporter::default();
        let telemetry = Telemetry::from_exporter(exporter.clone()).expect("telemetry");
        let mut stores = stores(2);
        let outcome = FixpointDriver::new(&config(10, true))
            .with_telemetry(&telemetry)
            .run(&Staggered, &mut stores)
            .expect("fixpoint");
        assert_eq!(outcome, FixpointOutcome::Converged { passes: 3 });
        telemetry.shutdown().expect("shutdown");

        let names = exporter.span_names();
        let count = |phase: Phase| names.iter().filter(|name| *name == phase.span_name()).count();
        assert_eq!(count(Phase::Fixpoint), 1);
        assert_eq!(count(Phase::Pass), 3);
        assert_eq!(count(Phase::Analyse), 6);
        assert!(exporter.events_of(Phase::Fixpoint.span_name()).is_empty());
    }

    #[test]
    fn delayed_run_is_recorded_on_the_fixpoint_span() {
        let exporter = RecordingExporter::default();
        let telemetry = Telemetry::from_exporter(exporter.clone()).expect("telemetry");
        let mut stores = stores(4);
        let outcome = FixpointDriver::new(&config(2, false))
            .with_telemetry(&telemetry)
            .run(&Staggered, &mut stores)
            .expect("fixpoint");
        assert!(!outcome.is_converged());
        telemetry.shutdown().expect("shutdown");
        assert_eq!(
            exporter.events_of(Phase::Fixpoint.span_name()),
            vec!["engine.fixpoint.delayed"]
        );
    }
}
