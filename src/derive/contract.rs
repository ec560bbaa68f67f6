use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use crate::eventual::{Eventual, split_labels};
use crate::marker::{Marker, MarkerKind, ParameterValue};
use crate::multi_level::MultiLevel;
use crate::property::{Property, Size, SizeCopy, Value};
use crate::store::PropertyStore;

/// A marker written by the user in source, read back as a contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractMarker {
    pub marker: Marker,
    /// `absent = true` asserts the opposite of the marker.
    pub absent: bool,
}

impl ContractMarker {
    pub fn present(marker: Marker) -> Self {
        Self {
            marker,
            absent: false,
        }
    }

    pub fn absent(marker: Marker) -> Self {
        Self {
            marker,
            absent: true,
        }
    }
}

/// Immutability level named by a contract, before it becomes a property value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ContractImmutable {
    E1,
    E2,
}

/// Write the property values implied by contract markers into `store` and
/// return the method's eventual descriptor from @Mark, @Only and @TestMark.
pub fn import_contract_markers(
    store: &mut PropertyStore,
    markers: &[ContractMarker],
) -> EngineResult<Eventual> {
    let mut immutable: Option<ContractImmutable> = None;
    let mut not_null: Option<MultiLevel> = None;
    let mut container = false;
    let mut mark: Option<&Marker> = None;
    let mut only: Option<&Marker> = None;
    let mut test_mark: Option<&Marker> = None;

    for contract in markers {
        let true_false = Value::Bool(!contract.absent);
        let false_true = Value::Bool(contract.absent);
        let marker = &contract.marker;
        match marker.kind() {
            MarkerKind::E1Immutable => immutable = immutable.max(Some(ContractImmutable::E1)),
            MarkerKind::E1Container => {
                immutable = immutable.max(Some(ContractImmutable::E1));
                container = true;
            }
            MarkerKind::E2Immutable => immutable = Some(ContractImmutable::E2),
            MarkerKind::E2Container => {
                immutable = Some(ContractImmutable::E2);
                container = true;
            }
            MarkerKind::MutableModifiesArguments => {
                immutable = None;
                container = false;
            }
            MarkerKind::Container => container = true,
            MarkerKind::Nullable => not_null = Some(MultiLevel::NULLABLE),
            MarkerKind::NotNull => not_null = Some(MultiLevel::EFFECTIVELY_NOT_NULL),
            MarkerKind::NotNull1 => not_null = Some(MultiLevel::EFFECTIVELY_CONTENT_NOT_NULL),
            MarkerKind::NotNull2 => not_null = Some(MultiLevel::EFFECTIVELY_CONTENT2_NOT_NULL),
            MarkerKind::NotModified => store.set(Property::Modified, false_true)?,
            MarkerKind::Modified => store.set(Property::Modified, true_false)?,
            MarkerKind::Final => store.set(Property::Final, true_false)?,
            MarkerKind::Variable => store.set(Property::Final, false_true)?,
            MarkerKind::Independent => {
                store.set(Property::Independent, MultiLevel::INDEPENDENT.into())?
            }
            MarkerKind::Dependent => store.set(Property::Independent, MultiLevel::DEPENDENT.into())?,
            MarkerKind::Size => import_size(store, marker)?,
            MarkerKind::Mark => mark = Some(marker),
            MarkerKind::Only => only = Some(marker),
            MarkerKind::TestMark => test_mark = Some(marker),
            kind => {
                if let Some(property) = level_property(kind) {
                    store.set(property, true_false)?;
                }
            }
        }
    }

    if container {
        store.set(Property::Container, Value::TRUE)?;
    }
    if let Some(level) = immutable {
        let value = match level {
            ContractImmutable::E1 => MultiLevel::EFFECTIVELY_E1IMMUTABLE,
            ContractImmutable::E2 => MultiLevel::EFFECTIVELY_E2IMMUTABLE,
        };
        store.set(Property::Immutable, value.into())?;
    }
    if let Some(value) = not_null {
        store.set(Property::NotNull, value.into())?;
    }

    let eventual = eventual_from_marks(mark, only, test_mark)?;
    debug!(
        entity = store.entity(),
        contracts = markers.len(),
        eventual = eventual.is_eventual(),
        "imported contract markers"
    );
    Ok(eventual)
}

/// Single-axis properties whose marker maps one to one.
fn level_property(kind: MarkerKind) -> Option<Property> {
    match kind {
        MarkerKind::Constant => Some(Property::Constant),
        MarkerKind::ExtensionClass => Some(Property::ExtensionClass),
        MarkerKind::Fluent => Some(Property::Fluent),
        MarkerKind::Identity => Some(Property::Identity),
        MarkerKind::IgnoreModifications => Some(Property::IgnoreModifications),
        MarkerKind::Singleton => Some(Property::Singleton),
        MarkerKind::UtilityClass => Some(Property::UtilityClass),
        MarkerKind::NotModified1 => Some(Property::NotModified1),
        MarkerKind::Finalizer => Some(Property::Finalizer),
        MarkerKind::BeforeMark => Some(Property::BeforeMark),
        _ => None,
    }
}

fn import_size(store: &mut PropertyStore, marker: &Marker) -> EngineResult<()> {
    if let Some(n) = int_parameter(marker, "equals") {
        store.set(Property::Size, Size::Equals(n).into())?;
    } else if let Some(n) = int_parameter(marker, "min") {
        store.set(Property::Size, Size::Min(n).into())?;
    }
    if let Some(n) = int_parameter(marker, "equalsOut") {
        store.set(Property::SizeOut, Size::Equals(n).into())?;
    } else if let Some(n) = int_parameter(marker, "minOut") {
        store.set(Property::SizeOut, Size::Min(n).into())?;
    }
    if marker.parameter("copy") == Some(&ParameterValue::Bool(true)) {
        store.set(Property::SizeCopy, SizeCopy::Copy.into())?;
    } else if marker.parameter("copyMin") == Some(&ParameterValue::Bool(true)) {
        store.set(Property::SizeCopy, SizeCopy::CopyMin.into())?;
    }
    Ok(())
}

fn int_parameter(marker: &Marker, key: &str) -> Option<u32> {
    match marker.parameter(key) {
        Some(ParameterValue::Int(value)) => u32::try_from(*value).ok(),
        _ => None,
    }
}

fn eventual_from_marks(
    mark: Option<&Marker>,
    only: Option<&Marker>,
    test_mark: Option<&Marker>,
) -> EngineResult<Eventual> {
    if let Some(only) = only {
        let before = only.string_parameter("before");
        let after = only.string_parameter("after");
        let is_after = before.is_empty();
        let label = if is_after { after } else { before };
        if label.is_empty() {
            return Err(EngineError::MissingParameter {
                marker: only.to_string(),
                parameter: "before or after".to_string(),
            });
        }
        if let Some(mark) = mark {
            let mark_label = mark.string_parameter("value");
            if mark_label != label {
                warn!(mark = mark_label, only = label, "@Only and @Mark name different labels");
            }
        }
        return Eventual::new(split_labels(label), mark.is_some(), Some(is_after), None);
    }
    if let Some(mark) = mark {
        return Eventual::new(split_labels(mark.string_parameter("value")), true, None, None);
    }
    if let Some(test_mark) = test_mark {
        let before = test_mark.parameter("before") == Some(&ParameterValue::Bool(true));
        return Eventual::new(
            split_labels(test_mark.string_parameter("value")),
            false,
            None,
            Some(!before),
        );
    }
    Ok(Eventual::not_eventual())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnnotationMode;
    use crate::store::EntityKind;

    fn store() -> PropertyStore {
        PropertyStore::new("com.example.Freezable", EntityKind::Method, false, AnnotationMode::Defensive)
    }

    #[test]
    fn container_and_immutability_fold_together() {
        let mut store = store();
        let contracts = [
            ContractMarker::present(Marker::new(MarkerKind::E1Immutable)),
            ContractMarker::present(Marker::new(MarkerKind::E2Container)),
            ContractMarker::present(Marker::new(MarkerKind::NotNull1)),
        ];
        let eventual = import_contract_markers(&mut store, &contracts).expect("import");
        assert!(!eventual.is_eventual());
        assert_eq!(
            store.get(Property::Immutable),
            Value::Multi(MultiLevel::EFFECTIVELY_E2IMMUTABLE)
        );
        assert_eq!(store.get(Property::Container), Value::TRUE);
        assert_eq!(
            store.get(Property::NotNull),
            Value::Multi(MultiLevel::EFFECTIVELY_CONTENT_NOT_NULL)
        );
    }

    #[test]
    fn absent_flag_inverts_level_markers() {
        let mut store = store();
        let contracts = [
            ContractMarker::absent(Marker::new(MarkerKind::Fluent)),
            ContractMarker::present(Marker::new(MarkerKind::NotModified)),
        ];
        import_contract_markers(&mut store, &contracts).expect("import");
        assert_eq!(store.get_as_is(Property::Fluent), Value::FALSE);
        assert_eq!(store.get_as_is(Property::Modified), Value::FALSE);
    }

    #[test]
    fn only_after_becomes_an_after_descriptor() {
        let mut store = store();
        let contracts = [
            ContractMarker::present(Marker::new(MarkerKind::Mark).with("value", "frozen")),
            ContractMarker::present(Marker::new(MarkerKind::Only).with("after", "frozen")),
        ];
        let eventual = import_contract_markers(&mut store, &contracts).expect("import");
        assert_eq!(eventual.label(), "frozen");
        assert!(eventual.mark());
        assert_eq!(eventual.after(), Some(true));
    }

    #[test]
    fn mark_splits_labels() {
        let mut store = store();
        let contracts = [ContractMarker::present(
            Marker::new(MarkerKind::Mark).with("value", "set, frozen"),
        )];
        let eventual = import_contract_markers(&mut store, &contracts).expect("import");
        assert_eq!(eventual.label(), "frozen,set");
        assert_eq!(eventual.after(), None);
    }

    #[test]
    fn only_without_label_is_rejected() {
        let mut store = store();
        let contracts = [ContractMarker::present(Marker::new(MarkerKind::Only))];
        let error = import_contract_markers(&mut store, &contracts).expect_err("no label");
        assert!(matches!(error, EngineError::MissingParameter { .. }));
    }

    #[test]
    fn size_contract_sets_size_axes() {
        let mut store = store();
        let contracts = [ContractMarker::present(
            Marker::new(MarkerKind::Size)
                .with("equals", 2_u32)
                .with("copy", true),
        )];
        import_contract_markers(&mut store, &contracts).expect("import");
        assert_eq!(store.get_as_is(Property::Size), Value::Size(Size::Equals(2)));
        assert_eq!(
            store.get_as_is(Property::SizeCopy),
            Value::SizeCopy(SizeCopy::Copy)
        );
    }
}
