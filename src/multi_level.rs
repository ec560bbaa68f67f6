use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{EngineError, EngineResult};

/// Number of depths a multi-level property carries.
pub const DEPTHS: usize = 3;

/// Immutability depth of first-level (shallow) immutability.
pub const E1: usize = 0;
/// Immutability depth of second-level (deep) immutability.
pub const E2: usize = 1;

/// Not-null depth of the value itself.
pub const NOT_NULL: usize = 0;
/// Not-null depth of the content (elements) of the value.
pub const CONTENT_NOT_NULL: usize = 1;
/// Not-null depth of the content of the content.
pub const CONTENT2_NOT_NULL: usize = 2;

/// Value of one depth of a multi-level property.
///
/// The discriminants are the 3-bit codes of the packed representation and
/// the derived ordering is the lattice order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Effective {
    Delay = 0,
    False = 1,
    Eventual = 2,
    EventualBefore = 3,
    EventualAfter = 4,
    Effective = 5,
}

impl Effective {
    pub const ALL: [Effective; 6] = [
        Effective::Delay,
        Effective::False,
        Effective::Eventual,
        Effective::EventualBefore,
        Effective::EventualAfter,
        Effective::Effective,
    ];

    /// Eventual in any phase, or effective.
    pub fn is_true_equivalent(self) -> bool {
        self >= Effective::Eventual
    }

    /// One of the three eventual phases.
    pub fn is_eventual(self) -> bool {
        matches!(
            self,
            Effective::Eventual | Effective::EventualBefore | Effective::EventualAfter
        )
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Effective::ALL.get(usize::try_from(code).ok()?).copied()
    }
}

impl fmt::Display for Effective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Effective::Delay => "delay",
            Effective::False => "false",
            Effective::Eventual => "eventual",
            Effective::EventualBefore => "eventual-before",
            Effective::EventualAfter => "eventual-after",
            Effective::Effective => "effective",
        };
        f.write_str(text)
    }
}

/// Multi-depth property value: one [`Effective`] per depth.
///
/// The ordering compares the highest depth first, which is the ordering of
/// the packed base-8 integers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MultiLevel([Effective; DEPTHS]);

impl MultiLevel {
    pub const DELAYED: MultiLevel = MultiLevel([Effective::Delay; DEPTHS]);

    pub const NULLABLE: MultiLevel = MultiLevel::base(Effective::False);
    pub const EVENTUALLY_NOT_NULL: MultiLevel = MultiLevel::base(Effective::Eventual);
    pub const EFFECTIVELY_NOT_NULL: MultiLevel = MultiLevel::base(Effective::Effective);
    pub const EFFECTIVELY_CONTENT_NOT_NULL: MultiLevel = MultiLevel::new([
        Effective::Effective,
        Effective::Effective,
        Effective::False,
    ]);
    pub const EFFECTIVELY_CONTENT2_NOT_NULL: MultiLevel = MultiLevel::new([
        Effective::Effective,
        Effective::Effective,
        Effective::Effective,
    ]);

    pub const MUTABLE: MultiLevel = MultiLevel::base(Effective::False);
    pub const EVENTUALLY_E1IMMUTABLE: MultiLevel = MultiLevel::base(Effective::Eventual);
    pub const EFFECTIVELY_E1IMMUTABLE: MultiLevel = MultiLevel::base(Effective::Effective);
    pub const EVENTUALLY_E2IMMUTABLE: MultiLevel = MultiLevel::new([
        Effective::Eventual,
        Effective::Eventual,
        Effective::False,
    ]);
    pub const EFFECTIVELY_E1_EVENTUALLY_E2IMMUTABLE: MultiLevel = MultiLevel::new([
        Effective::Effective,
        Effective::Eventual,
        Effective::False,
    ]);
    pub const EFFECTIVELY_E2IMMUTABLE: MultiLevel = MultiLevel::new([
        Effective::Effective,
        Effective::Effective,
        Effective::False,
    ]);

    pub const DEPENDENT: MultiLevel = MultiLevel::base(Effective::False);
    pub const EVENTUALLY_INDEPENDENT: MultiLevel = MultiLevel::base(Effective::Eventual);
    pub const INDEPENDENT: MultiLevel = MultiLevel::base(Effective::Effective);

    pub const fn new(components: [Effective; DEPTHS]) -> Self {
        MultiLevel(components)
    }

    /// `value` at depth 0, every higher depth false.
    const fn base(value: Effective) -> Self {
        MultiLevel([value, Effective::False, Effective::False])
    }

    /// Value holding only `value` at `depth`, delay everywhere else.
    pub fn compose(value: Effective, depth: usize) -> Self {
        MultiLevel::DELAYED.with(depth, value)
    }

    /// Copy with the component at `depth` replaced; out-of-range depths are ignored.
    pub fn with(self, depth: usize, value: Effective) -> Self {
        let mut components = self.0;
        if let Some(component) = components.get_mut(depth) {
            *component = value;
        }
        MultiLevel(components)
    }

    pub fn components(self) -> [Effective; DEPTHS] {
        self.0
    }

    /// Component at `depth` without the lower-depth check.
    pub fn raw_at(self, depth: usize) -> Effective {
        self.0.get(depth).copied().unwrap_or(Effective::False)
    }

    /// Component at `depth`, reported as false unless every lower depth is
    /// true-equivalent: content-level facts presuppose the base level.
    pub fn read_at(self, depth: usize) -> Effective {
        if depth >= DEPTHS {
            return Effective::False;
        }
        if self.0[..depth].iter().any(|lower| !lower.is_true_equivalent()) {
            return Effective::False;
        }
        self.0[depth]
    }

    /// Highest depth that reads as true-equivalent, with its value.
    pub fn best_depth_with_true(self) -> Option<(usize, Effective)> {
        (0..DEPTHS)
            .rev()
            .map(|depth| (depth, self.read_at(depth)))
            .find(|(_, value)| value.is_true_equivalent())
    }

    /// Base depth delayed: nothing is known yet.
    pub fn is_delayed(self) -> bool {
        self.0[0] == Effective::Delay
    }

    /// Resolve every eventual component once the precondition's truth is known.
    pub fn promote_eventual(self, condition_holds: bool) -> EngineResult<Self> {
        let target = if condition_holds {
            Effective::EventualAfter
        } else {
            Effective::EventualBefore
        };
        let mut components = self.0;
        for (depth, component) in components.iter_mut().enumerate() {
            match *component {
                Effective::Eventual => *component = target,
                Effective::EventualBefore | Effective::EventualAfter => {
                    return Err(EngineError::DoublePromotion {
                        depth,
                        state: *component,
                    });
                }
                Effective::Delay | Effective::False | Effective::Effective => {}
            }
        }
        let promoted = MultiLevel(components);
        trace!(from = %self, to = %promoted, condition_holds, "promoted eventual value");
        Ok(promoted)
    }

    /// Packed base-8 representation, three bits per depth.
    pub fn packed(self) -> i32 {
        self.0
            .iter()
            .enumerate()
            .map(|(depth, component)| compose_at(*component, depth))
            .sum()
    }

    pub fn from_packed(value: i32) -> EngineResult<Self> {
        let invalid = || EngineError::InvalidPacked { value };
        if value < 0 || value >= 8_i32.pow(DEPTHS as u32) {
            return Err(invalid());
        }
        let mut components = [Effective::Delay; DEPTHS];
        let mut rest = value;
        for component in &mut components {
            *component = Effective::from_code(rest % 8).ok_or_else(invalid)?;
            rest /= 8;
        }
        Ok(MultiLevel(components))
    }
}

impl Default for MultiLevel {
    fn default() -> Self {
        MultiLevel::DELAYED
    }
}

impl Ord for MultiLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

impl PartialOrd for MultiLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MultiLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [d0, d1, d2] = self.0;
        write!(f, "{d0}/{d1}/{d2}")
    }
}

/// Packed contribution of `value` at `depth`: `value * 8^depth`.
pub fn compose_at(value: Effective, depth: usize) -> i32 {
    value.code() * 8_i32.pow(depth as u32)
}
