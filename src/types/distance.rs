use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of an assignability query: smaller costs are more specific.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    NotAssignable,
    Cost(u32),
}

impl Distance {
    pub const EQUALS: Distance = Distance::Cost(0);
    pub const ASSIGN_TO_NULL: Distance = Distance::Cost(0);
    pub const SAME_UNDERLYING_TYPE: Distance = Distance::Cost(1);
    pub const BOXING: Distance = Distance::Cost(1);
    pub const IN_HIERARCHY: Distance = Distance::Cost(100);
    pub const UNBOUND_WILDCARD: Distance = Distance::Cost(1000);

    pub fn is_assignable(self) -> bool {
        matches!(self, Distance::Cost(_))
    }

    pub fn cost(self) -> Option<u32> {
        match self {
            Distance::NotAssignable => None,
            Distance::Cost(cost) => Some(cost),
        }
    }

    /// Sum of two distances; not assignable absorbs.
    pub fn plus(self, other: Distance) -> Distance {
        match (self, other) {
            (Distance::Cost(left), Distance::Cost(right)) => {
                Distance::Cost(left.saturating_add(right))
            }
            _ => Distance::NotAssignable,
        }
    }

    /// The more specific of two distances; not assignable only if both are.
    pub fn better(self, other: Distance) -> Distance {
        match (self, other) {
            (Distance::Cost(left), Distance::Cost(right)) => Distance::Cost(left.min(right)),
            (Distance::Cost(_), Distance::NotAssignable) => self,
            (Distance::NotAssignable, _) => other,
        }
    }

    /// Integer form with `-1` for not assignable.
    pub fn to_raw(self) -> i64 {
        match self {
            Distance::NotAssignable => -1,
            Distance::Cost(cost) => i64::from(cost),
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::NotAssignable => f.write_str("not assignable"),
            Distance::Cost(cost) => write!(f, "{cost}"),
        }
    }
}
