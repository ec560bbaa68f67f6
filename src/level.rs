use std::fmt;

use serde::{Deserialize, Serialize};

/// Single-axis property value with an explicit delay.
///
/// Ordering is `Delay < False < True`, which is also the only direction an
/// upgradeable property may move in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Delay,
    False,
    True,
}

impl Level {
    pub const fn from_bool(value: bool) -> Self {
        if value { Level::True } else { Level::False }
    }

    pub fn is_delayed(self) -> bool {
        self == Level::Delay
    }

    pub fn is_true(self) -> bool {
        self == Level::True
    }

    /// Conjunction; a delayed operand makes the result delayed.
    pub fn and(self, other: Level) -> Level {
        if self.is_delayed() || other.is_delayed() {
            return Level::Delay;
        }
        self.min(other)
    }

    /// Disjunction; a delayed operand makes the result delayed.
    pub fn or(self, other: Level) -> Level {
        if self.is_delayed() || other.is_delayed() {
            return Level::Delay;
        }
        self.max(other)
    }

    /// Packed form: `-1` delay, `0` false, `1` true.
    pub fn to_raw(self) -> i32 {
        match self {
            Level::Delay => -1,
            Level::False => 0,
            Level::True => 1,
        }
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            -1 => Some(Level::Delay),
            0 => Some(Level::False),
            1 => Some(Level::True),
            _ => None,
        }
    }
}

impl From<bool> for Level {
    fn from(value: bool) -> Self {
        Level::from_bool(value)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Level::Delay => "delay",
            Level::False => "false",
            Level::True => "true",
        };
        f.write_str(text)
    }
}

/// Whether an upgrade-only property may move from `from` to `to`.
pub fn monotonic_accepts<T: PartialOrd>(from: T, to: T) -> bool {
    from <= to
}
