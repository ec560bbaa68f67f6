use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Names of the markers the engine emits or reads back as contracts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MarkerKind {
    NotNull,
    NotNull1,
    NotNull2,
    Nullable,
    Size,
    E1Immutable,
    E1Container,
    E2Immutable,
    E2Container,
    MutableModifiesArguments,
    Container,
    BeforeMark,
    Independent,
    Dependent,
    Modified,
    NotModified,
    NotModified1,
    Final,
    Variable,
    Fluent,
    Identity,
    Constant,
    Singleton,
    UtilityClass,
    ExtensionClass,
    Finalizer,
    IgnoreModifications,
    Mark,
    Only,
    TestMark,
}

impl MarkerKind {
    pub fn name(self) -> &'static str {
        match self {
            MarkerKind::NotNull => "NotNull",
            MarkerKind::NotNull1 => "NotNull1",
            MarkerKind::NotNull2 => "NotNull2",
            MarkerKind::Nullable => "Nullable",
            MarkerKind::Size => "Size",
            MarkerKind::E1Immutable => "E1Immutable",
            MarkerKind::E1Container => "E1Container",
            MarkerKind::E2Immutable => "E2Immutable",
            MarkerKind::E2Container => "E2Container",
            MarkerKind::MutableModifiesArguments => "MutableModifiesArguments",
            MarkerKind::Container => "Container",
            MarkerKind::BeforeMark => "BeforeMark",
            MarkerKind::Independent => "Independent",
            MarkerKind::Dependent => "Dependent",
            MarkerKind::Modified => "Modified",
            MarkerKind::NotModified => "NotModified",
            MarkerKind::NotModified1 => "NotModified1",
            MarkerKind::Final => "Final",
            MarkerKind::Variable => "Variable",
            MarkerKind::Fluent => "Fluent",
            MarkerKind::Identity => "Identity",
            MarkerKind::Constant => "Constant",
            MarkerKind::Singleton => "Singleton",
            MarkerKind::UtilityClass => "UtilityClass",
            MarkerKind::ExtensionClass => "ExtensionClass",
            MarkerKind::Finalizer => "Finalizer",
            MarkerKind::IgnoreModifications => "IgnoreModifications",
            MarkerKind::Mark => "Mark",
            MarkerKind::Only => "Only",
            MarkerKind::TestMark => "TestMark",
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of a marker parameter.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<u32> for ParameterValue {
    fn from(value: u32) -> Self {
        ParameterValue::Int(i64::from(value))
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Int(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Str(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::Str(value)
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(value) => write!(f, "{value}"),
            ParameterValue::Int(value) => write!(f, "{value}"),
            ParameterValue::Str(value) => write!(f, "\"{value}\""),
        }
    }
}

/// Marker expression: a name and ordered key/value parameters.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Marker {
    kind: MarkerKind,
    parameters: Vec<(String, ParameterValue)>,
}

impl Marker {
    pub fn new(kind: MarkerKind) -> Self {
        Self {
            kind,
            parameters: Vec::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<ParameterValue>) -> Self {
        self.parameters.push((key.to_string(), value.into()));
        self
    }

    pub fn kind(&self) -> MarkerKind {
        self.kind
    }

    pub fn parameters(&self) -> &[(String, ParameterValue)] {
        &self.parameters
    }

    pub fn parameter(&self, key: &str) -> Option<&ParameterValue> {
        self.parameters
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// String parameter, empty when missing or not a string.
    pub fn string_parameter(&self, key: &str) -> &str {
        match self.parameter(key) {
            Some(ParameterValue::Str(value)) => value,
            _ => "",
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.kind)?;
        if self.parameters.is_empty() {
            return Ok(());
        }
        let rendered: Vec<String> = self
            .parameters
            .iter()
            .map(|(key, value)| format!("{key} = {value}"))
            .collect();
        write!(f, "({})", rendered.join(", "))
    }
}

/// Derived markers of one entity: present (`true`) or explicitly absent (`false`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MarkerSet {
    entries: BTreeMap<Marker, bool>,
}

impl MarkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, marker: Marker, present: bool) {
        self.entries.insert(marker, present);
    }

    pub fn present(&mut self, marker: Marker) {
        self.put(marker, true);
    }

    pub fn absent(&mut self, marker: Marker) {
        self.put(marker, false);
    }

    pub fn extend(&mut self, other: MarkerSet) {
        self.entries.extend(other.entries);
    }

    /// First present marker of `kind`.
    pub fn find(&self, kind: MarkerKind) -> Option<&Marker> {
        self.present_markers().find(|marker| marker.kind() == kind)
    }

    pub fn contains(&self, kind: MarkerKind) -> bool {
        self.find(kind).is_some()
    }

    /// Whether a marker of `kind` was explicitly recorded as absent.
    pub fn is_absent(&self, kind: MarkerKind) -> bool {
        self.entries
            .iter()
            .any(|(marker, present)| !present && marker.kind() == kind)
    }

    pub fn present_markers(&self) -> impl Iterator<Item = &Marker> {
        self.entries
            .iter()
            .filter(|(_, present)| **present)
            .map(|(marker, _)| marker)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Marker, bool)> {
        self.entries.iter().map(|(marker, present)| (marker, *present))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON view with rendered markers grouped by presence.
    pub fn to_json(&self) -> serde_json::Value {
        let mut present = Vec::new();
        let mut absent = Vec::new();
        for (marker, is_present) in &self.entries {
            if *is_present {
                present.push(marker.to_string());
            } else {
                absent.push(marker.to_string());
            }
        }
        json!({ "present": present, "absent": absent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_renders_parameters_in_order() {
        let marker = Marker::new(MarkerKind::Size)
            .with("min", 1_u32)
            .with("copy", true);
        assert_eq!(marker.to_string(), "@Size(min = 1, copy = true)");
        assert_eq!(marker.parameter("copy"), Some(&ParameterValue::Bool(true)));
        assert_eq!(marker.parameter("equals"), None);
    }

    #[test]
    fn marker_set_tracks_presence() {
        let mut markers = MarkerSet::new();
        markers.present(Marker::new(MarkerKind::NotNull1));
        markers.absent(Marker::new(MarkerKind::Nullable));
        assert!(markers.contains(MarkerKind::NotNull1));
        assert!(!markers.contains(MarkerKind::Nullable));
        assert!(markers.is_absent(MarkerKind::Nullable));
        assert_eq!(markers.len(), 2);
    }

    #[test]
    fn json_view_groups_markers() {
        let mut markers = MarkerSet::new();
        markers.present(Marker::new(MarkerKind::E2Container).with("after", "frozen"));
        markers.absent(Marker::new(MarkerKind::Dependent));
        assert_eq!(
            markers.to_json(),
            json!({
                "present": ["@E2Container(after = \"frozen\")"],
                "absent": ["@Dependent"],
            })
        );
    }
}
