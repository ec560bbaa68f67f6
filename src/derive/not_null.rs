use crate::marker::{Marker, MarkerKind, MarkerSet};
use crate::multi_level::{CONTENT_NOT_NULL, CONTENT2_NOT_NULL, NOT_NULL};
use crate::property::Value;

/// @NotNull2, @NotNull1, @NotNull and @Nullable.
///
/// A delayed value suppresses the negative forms but still allows
/// @Nullable, because the base depth has not reached eventual.
pub(crate) fn not_null_markers(not_null: Value, nullable_allowed: bool) -> MarkerSet {
    let mut markers = MarkerSet::new();
    let value = not_null.multi();
    let delayed = not_null.is_delayed();

    if value.read_at(CONTENT2_NOT_NULL).is_true_equivalent() {
        markers.present(Marker::new(MarkerKind::NotNull2));
        if nullable_allowed {
            markers.absent(Marker::new(MarkerKind::Nullable));
        }
        return markers;
    }
    if !delayed {
        markers.absent(Marker::new(MarkerKind::NotNull2));
    }

    if value.read_at(CONTENT_NOT_NULL).is_true_equivalent() {
        markers.present(Marker::new(MarkerKind::NotNull1));
        if nullable_allowed {
            markers.absent(Marker::new(MarkerKind::Nullable));
        }
        return markers;
    }
    if !delayed {
        markers.absent(Marker::new(MarkerKind::NotNull1));
    }

    let base_is_true = value.read_at(NOT_NULL).is_true_equivalent();
    if base_is_true {
        markers.present(Marker::new(MarkerKind::NotNull));
    } else if !delayed {
        markers.absent(Marker::new(MarkerKind::NotNull));
    }
    if nullable_allowed {
        markers.put(Marker::new(MarkerKind::Nullable), !base_is_true);
    }
    markers
}
