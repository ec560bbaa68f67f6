use serde::{Deserialize, Serialize};

use super::Mode;
use super::distance::Distance;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Float,
    Long,
    Double,
    Void,
}

impl Primitive {
    pub const ALL: [Primitive; 9] = [
        Primitive::Boolean,
        Primitive::Byte,
        Primitive::Char,
        Primitive::Short,
        Primitive::Int,
        Primitive::Float,
        Primitive::Long,
        Primitive::Double,
        Primitive::Void,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Boolean => "boolean",
            Primitive::Byte => "byte",
            Primitive::Char => "char",
            Primitive::Short => "short",
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::Long => "long",
            Primitive::Double => "double",
            Primitive::Void => "void",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Primitive::ALL.into_iter().find(|primitive| primitive.name() == name)
    }

    pub fn boxed_name(self) -> &'static str {
        match self {
            Primitive::Boolean => "java.lang.Boolean",
            Primitive::Byte => "java.lang.Byte",
            Primitive::Char => "java.lang.Character",
            Primitive::Short => "java.lang.Short",
            Primitive::Int => "java.lang.Integer",
            Primitive::Float => "java.lang.Float",
            Primitive::Long => "java.lang.Long",
            Primitive::Double => "java.lang.Double",
            Primitive::Void => "java.lang.Void",
        }
    }

    /// Position in the widening order; boolean and void take no part in widening.
    pub fn order(self) -> u32 {
        match self {
            Primitive::Boolean => 1,
            Primitive::Byte => 2,
            Primitive::Char => 3,
            Primitive::Short => 4,
            Primitive::Int => 5,
            Primitive::Float => 6,
            Primitive::Long => 7,
            Primitive::Double => 8,
            Primitive::Void => 9,
        }
    }

    fn widens(self) -> bool {
        (2..=8).contains(&self.order())
    }
}

/// Distance between two distinct primitives under `mode`.
pub(super) fn widening(target: Primitive, from: Primitive, mode: Mode) -> Distance {
    if !target.widens() || !from.widens() {
        return Distance::NotAssignable;
    }
    let (to, from) = (i64::from(target.order()), i64::from(from.order()));
    let difference = match mode {
        Mode::Covariant | Mode::CovariantErasure => to - from,
        Mode::Contravariant => from - to,
        Mode::Any => (to - from).abs(),
        Mode::Invariant => return Distance::NotAssignable,
    };
    match u32::try_from(difference) {
        Ok(cost) => Distance::Cost(cost),
        Err(_) => Distance::NotAssignable,
    }
}

/// Boxing or unboxing between `primitive` and the nominal type `boxed`.
pub(super) fn boxing(primitive: Primitive, boxed: &str) -> Distance {
    if primitive != Primitive::Void && primitive.boxed_name() == boxed {
        Distance::BOXING
    } else {
        Distance::NotAssignable
    }
}
