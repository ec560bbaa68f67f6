use crate::marker::{Marker, MarkerKind, MarkerSet};
use crate::property::{Size, SizeCopy, Value};

/// One @Size marker combining the copy mode, the value's size and the
/// outgoing size, with only the parameters that carry information.
pub(crate) fn size_markers(copy: Value, size: Value, size_out: Value) -> MarkerSet {
    let mut marker = Marker::new(MarkerKind::Size);
    match copy.size_copy() {
        Some(SizeCopy::CopyMin) => marker = marker.with("copyMin", true),
        Some(SizeCopy::Copy) => marker = marker.with("copy", true),
        Some(SizeCopy::NoCopy) | None => {}
    }
    marker = size_axis(marker, size.size(), "min", "equals");
    marker = size_axis(marker, size_out.size(), "minOut", "equalsOut");

    let mut markers = MarkerSet::new();
    if !marker.parameters().is_empty() {
        markers.present(marker);
    }
    markers
}

fn size_axis(marker: Marker, size: Option<Size>, min_key: &str, equals_key: &str) -> Marker {
    match size {
        Some(size) if size < Size::IS_A_SIZE => marker,
        Some(Size::Min(n)) => marker.with(min_key, n),
        Some(Size::Equals(n)) => marker.with(equals_key, n),
        Some(Size::NotASize) | None => marker,
    }
}
