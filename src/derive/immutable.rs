use tracing::trace;

use crate::error::{EngineError, EngineResult};
use crate::eventual::Eventual;
use crate::level::Level;
use crate::marker::{Marker, MarkerKind, MarkerSet};
use crate::multi_level::{E1, Effective, MultiLevel};
use crate::store::EntityKind;

/// Immutability and container-ness of one entity, folded into one marker.
pub(crate) struct ImmutableInput<'a> {
    pub(crate) entity: &'a str,
    pub(crate) kind: EntityKind,
    pub(crate) immutable: MultiLevel,
    pub(crate) container: Level,
    pub(crate) is_interface: bool,
    pub(crate) eventual: &'a Eventual,
}

/// Emit exactly one of: nothing, the mutable/container base marker, an
/// eventual marker (types), a before/after marker (everything else) or an
/// effective marker.
pub(crate) fn immutability_markers(input: &ImmutableInput<'_>) -> EngineResult<MarkerSet> {
    let mut markers = MarkerSet::new();
    let is_type = input.kind == EntityKind::Type;
    let container = input.container.is_true();

    match (input.immutable.best_depth_with_true(), is_type) {
        (None | Some((_, Effective::Delay | Effective::False)), _) => {
            if let Some(marker) = base_marker(input, container) {
                markers.present(marker);
            }
        }
        (Some((depth, Effective::Effective)), _) => {
            markers.present(Marker::new(level_marker(depth, container)));
        }
        (Some((depth, Effective::Eventual)), true) => {
            if !input.eventual.is_eventual() {
                return Err(EngineError::NotEventual {
                    entity: input.entity.to_string(),
                });
            }
            let marker =
                Marker::new(level_marker(depth, container)).with("after", input.eventual.label());
            markers.present(marker);
        }
        (Some((_, Effective::Eventual)), false) => {
            return Err(illegal_placement(
                input,
                "eventual immutability is only expressed on types",
            ));
        }
        (Some((_, Effective::EventualBefore)), false) => {
            markers.present(Marker::new(MarkerKind::BeforeMark));
        }
        (Some((depth, Effective::EventualAfter)), false) => {
            markers.present(Marker::new(level_marker(depth, container)));
        }
        (Some((_, Effective::EventualBefore | Effective::EventualAfter)), true) => {
            return Err(illegal_placement(
                input,
                "before and after mark states are not expressed on types",
            ));
        }
    }

    trace!(entity = input.entity, immutable = %input.immutable, count = markers.len(), "immutability markers");
    Ok(markers)
}

fn level_marker(depth: usize, container: bool) -> MarkerKind {
    match (depth == E1, container) {
        (true, false) => MarkerKind::E1Immutable,
        (true, true) => MarkerKind::E1Container,
        (false, false) => MarkerKind::E2Immutable,
        (false, true) => MarkerKind::E2Container,
    }
}

fn base_marker(input: &ImmutableInput<'_>, container: bool) -> Option<Marker> {
    if input.immutable.read_at(E1) != Effective::False {
        return None;
    }
    if container {
        return Some(Marker::new(MarkerKind::Container));
    }
    let is_class = input.kind == EntityKind::Type && !input.is_interface;
    is_class.then(|| Marker::new(MarkerKind::MutableModifiesArguments))
}

fn illegal_placement(input: &ImmutableInput<'_>, detail: &'static str) -> EngineError {
    EngineError::IllegalEventualPlacement {
        entity: input.entity.to_string(),
        kind: input.kind,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(
        kind: EntityKind,
        immutable: MultiLevel,
        container: Level,
        eventual: &'a Eventual,
    ) -> ImmutableInput<'a> {
        ImmutableInput {
            entity: "com.example.Set",
            kind,
            immutable,
            container,
            is_interface: false,
            eventual,
        }
    }

    fn rendered(markers: &MarkerSet) -> Vec<String> {
        markers.present_markers().map(ToString::to_string).collect()
    }

    #[test]
    fn effective_levels_choose_marker_by_depth_and_container() {
        let eventual = Eventual::not_eventual();
        let cases = [
            (MultiLevel::EFFECTIVELY_E1IMMUTABLE, Level::False, "@E1Immutable"),
            (MultiLevel::EFFECTIVELY_E1IMMUTABLE, Level::True, "@E1Container"),
            (MultiLevel::EFFECTIVELY_E2IMMUTABLE, Level::False, "@E2Immutable"),
            (MultiLevel::EFFECTIVELY_E2IMMUTABLE, Level::True, "@E2Container"),
        ];
        for (immutable, container, expected) in cases {
            for kind in [EntityKind::Type, EntityKind::Field, EntityKind::Parameter] {
                let markers =
                    immutability_markers(&input(kind, immutable, container, &eventual))
                        .expect("markers");
                assert_eq!(rendered(&markers), vec![expected.to_string()]);
            }
        }
    }

    #[test]
    fn eventual_type_gets_after_label() {
        let eventual = Eventual::of_fields(["frozen"]);
        let markers = immutability_markers(&input(
            EntityKind::Type,
            MultiLevel::EFFECTIVELY_E1_EVENTUALLY_E2IMMUTABLE,
            Level::True,
            &eventual,
        ))
        .expect("markers");
        assert_eq!(rendered(&markers), vec!["@E2Container(after = \"frozen\")"]);
    }

    #[test]
    fn eventual_value_on_a_parameter_is_illegal() {
        let eventual = Eventual::not_eventual();
        let error = immutability_markers(&input(
            EntityKind::Parameter,
            MultiLevel::EVENTUALLY_E2IMMUTABLE,
            Level::False,
            &eventual,
        ))
        .expect_err("illegal placement");
        assert!(matches!(
            error,
            EngineError::IllegalEventualPlacement {
                kind: EntityKind::Parameter,
                ..
            }
        ));
    }

    #[test]
    fn eventual_type_without_fields_is_rejected() {
        let eventual = Eventual::not_eventual();
        let error = immutability_markers(&input(
            EntityKind::Type,
            MultiLevel::EVENTUALLY_E1IMMUTABLE,
            Level::False,
            &eventual,
        ))
        .expect_err("not eventual");
        assert!(matches!(error, EngineError::NotEventual { .. }));
    }

    #[test]
    fn before_and_after_states_on_fields() {
        let eventual = Eventual::not_eventual();
        let before = MultiLevel::EVENTUALLY_E1IMMUTABLE
            .promote_eventual(false)
            .expect("promote");
        let markers = immutability_markers(&input(EntityKind::Field, before, Level::False, &eventual))
            .expect("markers");
        assert_eq!(rendered(&markers), vec!["@BeforeMark"]);

        let after = MultiLevel::EVENTUALLY_E2IMMUTABLE
            .promote_eventual(true)
            .expect("promote");
        let markers = immutability_markers(&input(EntityKind::Field, after, Level::True, &eventual))
            .expect("markers");
        assert_eq!(rendered(&markers), vec!["@E2Container"]);
    }

    #[test]
    fn before_state_on_a_type_is_illegal() {
        let eventual = Eventual::of_fields(["frozen"]);
        let before = MultiLevel::EVENTUALLY_E1IMMUTABLE
            .promote_eventual(false)
            .expect("promote");
        let error = immutability_markers(&input(EntityKind::Type, before, Level::False, &eventual))
            .expect_err("illegal placement");
        assert!(matches!(error, EngineError::IllegalEventualPlacement { .. }));
    }

    #[test]
    fn mutable_values_fall_back_to_base_markers() {
        let eventual = Eventual::not_eventual();
        let container = immutability_markers(&input(
            EntityKind::Type,
            MultiLevel::MUTABLE,
            Level::True,
            &eventual,
        ))
        .expect("markers");
        assert_eq!(rendered(&container), vec!["@Container"]);

        let mutable = immutability_markers(&input(
            EntityKind::Type,
            MultiLevel::MUTABLE,
            Level::False,
            &eventual,
        ))
        .expect("markers");
        assert_eq!(rendered(&mutable), vec!["@MutableModifiesArguments"]);

        let field = immutability_markers(&input(
            EntityKind::Field,
            MultiLevel::MUTABLE,
            Level::False,
            &eventual,
        ))
        .expect("markers");
        assert!(field.is_empty());
    }

    #[test]
    fn delayed_immutability_emits_nothing() {
        let eventual = Eventual::not_eventual();
        let markers = immutability_markers(&input(
            EntityKind::Type,
            MultiLevel::DELAYED,
            Level::True,
            &eventual,
        ))
        .expect("markers");
        assert!(markers.is_empty());
    }
}
