use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::AnnotationMode;
use crate::level::{Level, monotonic_accepts};
use crate::multi_level::MultiLevel;

/// Shape of the values a property holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Level,
    MultiLevel,
    Size,
    SizeCopy,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Family::Level => "level",
            Family::MultiLevel => "multi-level",
            Family::Size => "size",
            Family::SizeCopy => "size-copy",
        };
        f.write_str(text)
    }
}

/// How a stored value may be replaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdatePolicy {
    /// Only moves up the lattice; a downgrade is a violation.
    Upgrade,
    /// Replaced unconditionally, e.g. statement-scoped context values.
    Overwrite,
}

/// Role of a property in the analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Value,
    Context,
    Other,
}

/// Size of a collection-like value.
///
/// Packed as `0` not a size, `2n + 1` at least `n`, `2n + 2` exactly `n`;
/// the ordering follows the packed integers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Size {
    NotASize,
    Min(u32),
    Equals(u32),
}

impl Size {
    /// Threshold below which no size marker is emitted.
    pub const IS_A_SIZE: Size = Size::Min(0);

    pub fn encode(self) -> i64 {
        match self {
            Size::NotASize => 0,
            Size::Min(n) => 2 * i64::from(n) + 1,
            Size::Equals(n) => 2 * i64::from(n) + 2,
        }
    }

    /// Inverse of [`Size::encode`]; `-1` and other negatives are not sizes.
    pub fn decode(encoded: i64) -> Option<Size> {
        match encoded {
            i64::MIN..=-1 => None,
            0 => Some(Size::NotASize),
            odd if odd % 2 == 1 => u32::try_from((odd - 1) / 2).ok().map(Size::Min),
            even => u32::try_from((even - 2) / 2).ok().map(Size::Equals),
        }
    }
}

impl Ord for Size {
    fn cmp(&self, other: &Self) -> Ordering {
        self.encode().cmp(&other.encode())
    }
}

impl PartialOrd for Size {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::NotASize => f.write_str("not a size"),
            Size::Min(n) => write!(f, "min {n}"),
            Size::Equals(n) => write!(f, "equals {n}"),
        }
    }
}

/// Whether a value's size is copied from its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeCopy {
    NoCopy,
    CopyMin,
    Copy,
}

impl fmt::Display for SizeCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SizeCopy::NoCopy => "no copy",
            SizeCopy::CopyMin => "copy min",
            SizeCopy::Copy => "copy",
        };
        f.write_str(text)
    }
}

/// Lattice value stored per property. `Delayed` is the bottom of every family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Delayed,
    Bool(bool),
    Multi(MultiLevel),
    Size(Size),
    SizeCopy(SizeCopy),
}

impl Value {
    pub const TRUE: Value = Value::Bool(true);
    pub const FALSE: Value = Value::Bool(false);

    pub fn family(self) -> Option<Family> {
        match self {
            Value::Delayed => None,
            Value::Bool(_) => Some(Family::Level),
            Value::Multi(_) => Some(Family::MultiLevel),
            Value::Size(_) => Some(Family::Size),
            Value::SizeCopy(_) => Some(Family::SizeCopy),
        }
    }

    pub fn is_delayed(self) -> bool {
        match self {
            Value::Delayed => true,
            Value::Multi(multi) => multi.is_delayed(),
            Value::Bool(_) | Value::Size(_) | Value::SizeCopy(_) => false,
        }
    }

    /// Level view of a single-axis value; other families read as delayed.
    pub fn level(self) -> Level {
        match self {
            Value::Bool(value) => Level::from_bool(value),
            _ => Level::Delay,
        }
    }

    pub fn is_true(self) -> bool {
        self == Value::TRUE
    }

    /// Multi-level view; other families read as [`MultiLevel::DELAYED`].
    pub fn multi(self) -> MultiLevel {
        match self {
            Value::Multi(multi) => multi,
            _ => MultiLevel::DELAYED,
        }
    }

    pub fn size(self) -> Option<Size> {
        match self {
            Value::Size(size) => Some(size),
            _ => None,
        }
    }

    pub fn size_copy(self) -> Option<SizeCopy> {
        match self {
            Value::SizeCopy(copy) => Some(copy),
            _ => None,
        }
    }

    /// Packed integer form, `-1` for delayed.
    pub fn to_raw(self) -> i64 {
        match self {
            Value::Delayed => -1,
            Value::Bool(value) => i64::from(value),
            Value::Multi(multi) => i64::from(multi.packed()),
            Value::Size(size) => size.encode(),
            Value::SizeCopy(copy) => copy as i64,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Delayed, Value::Delayed) => Some(Ordering::Equal),
            (Value::Delayed, _) => Some(Ordering::Less),
            (_, Value::Delayed) => Some(Ordering::Greater),
            (Value::Bool(left), Value::Bool(right)) => left.partial_cmp(right),
            (Value::Multi(left), Value::Multi(right)) => left.partial_cmp(right),
            (Value::Size(left), Value::Size(right)) => left.partial_cmp(right),
            (Value::SizeCopy(left), Value::SizeCopy(right)) => left.partial_cmp(right),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<MultiLevel> for Value {
    fn from(value: MultiLevel) -> Self {
        Value::Multi(value)
    }
}

impl From<Size> for Value {
    fn from(value: Size) -> Self {
        Value::Size(value)
    }
}

impl From<SizeCopy> for Value {
    fn from(value: SizeCopy) -> Self {
        Value::SizeCopy(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Delayed => f.write_str("delayed"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Multi(multi) => write!(f, "{multi}"),
            Value::Size(size) => write!(f, "{size}"),
            Value::SizeCopy(copy) => write!(f, "{copy}"),
        }
    }
}

/// Reason a lattice join refused a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Violation {
    /// The new value is below the stored one.
    Downgrade,
    /// The value belongs to another family than the property's.
    WrongFamily(Family),
}

/// Per-property lattice declaration.
///
/// Implementors declare the family, the update policy and the absent value
/// once; `join` and `improve` are derived from them.
pub trait Lattice: Copy + Ord + fmt::Display {
    fn family(self) -> Family;

    fn policy(self) -> UpdatePolicy;

    fn value_when_absent(self, mode: AnnotationMode) -> Value;

    /// Value to store when `new` is written over `old` with `set`.
    fn join(self, old: Value, new: Value) -> Result<Value, Violation> {
        check_family(self.family(), new)?;
        match self.policy() {
            UpdatePolicy::Overwrite => Ok(new),
            UpdatePolicy::Upgrade if monotonic_accepts(old, new) => Ok(new),
            UpdatePolicy::Upgrade => Err(Violation::Downgrade),
        }
    }

    /// Lattice maximum of `old` and `new`.
    fn improve(self, old: Value, new: Value) -> Result<Value, Violation> {
        check_family(self.family(), new)?;
        if new > old { Ok(new) } else { Ok(old) }
    }
}

fn check_family(expected: Family, value: Value) -> Result<(), Violation> {
    match value.family() {
        Some(family) if family != expected => Err(Violation::WrongFamily(expected)),
        _ => Ok(()),
    }
}

/// Property identifiers tracked per entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Property {
    NotNull,
    ContextNotNull,
    Immutable,
    ContextImmutable,
    Container,
    Independent,
    Modified,
    ContextModified,
    Final,
    Finalizer,
    Constant,
    Fluent,
    Identity,
    Singleton,
    UtilityClass,
    ExtensionClass,
    IgnoreModifications,
    NotModified1,
    BeforeMark,
    Size,
    SizeOut,
    SizeCopy,
}

impl Property {
    pub const ALL: [Property; 22] = [
        Property::NotNull,
        Property::ContextNotNull,
        Property::Immutable,
        Property::ContextImmutable,
        Property::Container,
        Property::Independent,
        Property::Modified,
        Property::ContextModified,
        Property::Final,
        Property::Finalizer,
        Property::Constant,
        Property::Fluent,
        Property::Identity,
        Property::Singleton,
        Property::UtilityClass,
        Property::ExtensionClass,
        Property::IgnoreModifications,
        Property::NotModified1,
        Property::BeforeMark,
        Property::Size,
        Property::SizeOut,
        Property::SizeCopy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Property::NotNull => "@NotNull",
            Property::ContextNotNull => "not null in context",
            Property::Immutable => "@Immutable",
            Property::ContextImmutable => "context @Immutable",
            Property::Container => "@Container",
            Property::Independent => "@Independent",
            Property::Modified => "@Modified",
            Property::ContextModified => "modified in context",
            Property::Final => "@Final",
            Property::Finalizer => "@Finalizer",
            Property::Constant => "@Constant",
            Property::Fluent => "@Fluent",
            Property::Identity => "@Identity",
            Property::Singleton => "@Singleton",
            Property::UtilityClass => "@UtilityClass",
            Property::ExtensionClass => "@ExtensionClass",
            Property::IgnoreModifications => "@IgnoreModifications",
            Property::NotModified1 => "@NotModified1",
            Property::BeforeMark => "@BeforeMark",
            Property::Size => "@Size",
            Property::SizeOut => "@Size out",
            Property::SizeCopy => "@Size copy",
        }
    }

    pub fn kind(self) -> PropertyKind {
        match self {
            Property::ContextNotNull | Property::ContextImmutable | Property::ContextModified => {
                PropertyKind::Context
            }
            Property::NotNull
            | Property::Immutable
            | Property::Container
            | Property::Independent
            | Property::Identity
            | Property::IgnoreModifications => PropertyKind::Value,
            _ => PropertyKind::Other,
        }
    }

    /// Weakest value of the property's family.
    pub fn false_value(self) -> Value {
        match self.family() {
            Family::Level => Value::FALSE,
            Family::MultiLevel => Value::Multi(MultiLevel::MUTABLE),
            Family::Size => Value::Size(Size::NotASize),
            Family::SizeCopy => Value::SizeCopy(SizeCopy::NoCopy),
        }
    }
}

impl Lattice for Property {
    fn family(self) -> Family {
        match self {
            Property::NotNull
            | Property::ContextNotNull
            | Property::Immutable
            | Property::ContextImmutable
            | Property::Independent => Family::MultiLevel,
            Property::Size | Property::SizeOut => Family::Size,
            Property::SizeCopy => Family::SizeCopy,
            _ => Family::Level,
        }
    }

    fn policy(self) -> UpdatePolicy {
        match self.kind() {
            PropertyKind::Context => UpdatePolicy::Overwrite,
            PropertyKind::Value | PropertyKind::Other => UpdatePolicy::Upgrade,
        }
    }

    fn value_when_absent(self, mode: AnnotationMode) -> Value {
        match (mode, self) {
            (AnnotationMode::Offensive, Property::Final | Property::Container) => Value::TRUE,
            (AnnotationMode::Offensive, Property::Independent) => {
                Value::Multi(MultiLevel::INDEPENDENT)
            }
            (AnnotationMode::Offensive, Property::Modified) => Value::FALSE,
            (AnnotationMode::Defensive, Property::Modified) => Value::TRUE,
            _ => self.false_value(),
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
