use crate::error::{EngineError, EngineResult};
use crate::eventual::Eventual;
use crate::marker::{Marker, MarkerKind, MarkerSet};
use crate::multi_level::Effective;
use crate::property::Value;
use crate::store::EntityKind;

/// @Dependent / @Independent / @Independent(after = label).
pub(crate) fn independence_markers(
    entity: &str,
    kind: EntityKind,
    independent: Value,
    is_interface: bool,
    eventual: &Eventual,
) -> EngineResult<MarkerSet> {
    let mut markers = MarkerSet::new();
    match independent.multi().read_at(0) {
        Effective::Delay if is_interface => {}
        Effective::Delay | Effective::False => {
            markers.absent(Marker::new(MarkerKind::Independent));
            markers.present(Marker::new(MarkerKind::Dependent));
        }
        Effective::Effective => {
            markers.absent(Marker::new(MarkerKind::Dependent));
            markers.present(Marker::new(MarkerKind::Independent));
        }
        Effective::Eventual | Effective::EventualBefore | Effective::EventualAfter => {
            if kind != EntityKind::Type || !eventual.is_eventual() {
                return Err(EngineError::NotEventual {
                    entity: entity.to_string(),
                });
            }
            markers.absent(Marker::new(MarkerKind::Dependent));
            markers.present(Marker::new(MarkerKind::Independent).with("after", eventual.label()));
        }
    }
    Ok(markers)
}
