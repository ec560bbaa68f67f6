use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::distance::Distance;
use super::hierarchy::TypeHierarchy;
use super::primitives::{boxing, widening};
use super::substitution::{concrete_direct_super_type, concrete_sam};
use super::{ParameterizedType, TypeBase, TypeParameterRef, WildCard};
use crate::error::EngineResult;

/// Direction in which an assignability query compares two types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Both types must be the same.
    Invariant,
    /// A value of the source type can be stored in the target type.
    Covariant,
    /// The target type can be stored in the source type.
    Contravariant,
    /// Either direction, whichever is closer.
    Any,
    /// Covariant, ignoring type arguments.
    CovariantErasure,
}

impl Mode {
    fn reversed(self) -> Mode {
        match self {
            Mode::Covariant => Mode::Contravariant,
            Mode::Contravariant => Mode::Covariant,
            other => other,
        }
    }

    /// Mode for comparing a type argument whose target carries `wildcard`.
    fn for_argument(self, wildcard: WildCard) -> Mode {
        if self == Mode::Invariant {
            return Mode::Invariant;
        }
        match wildcard {
            WildCard::None => Mode::Invariant,
            WildCard::Unbound => Mode::Any,
            WildCard::Extends => self,
            WildCard::Super => self.reversed(),
        }
    }
}

/// Assignability queries against a type hierarchy.
///
/// Type parameters in `reverse` are compared the other way around when they
/// appear as the source type.
pub struct Assignability<'a, H: TypeHierarchy + ?Sized> {
    hierarchy: &'a H,
    reverse: BTreeSet<TypeParameterRef>,
}

impl<'a, H: TypeHierarchy + ?Sized> Assignability<'a, H> {
    pub fn new(hierarchy: &'a H) -> Self {
        Self {
            hierarchy,
            reverse: BTreeSet::new(),
        }
    }

    pub fn with_reverse(mut self, reverse: impl IntoIterator<Item = TypeParameterRef>) -> Self {
        self.reverse.extend(reverse);
        self
    }

    /// Distance from `from` to `target` under `mode`; lower is more specific.
    pub fn distance(
        &self,
        target: &ParameterizedType,
        from: &ParameterizedType,
        mode: Mode,
    ) -> EngineResult<Distance> {
        let mut search = Search {
            engine: self,
            in_progress: Vec::new(),
        };
        let distance = search.execute(target, from, false, mode)?;
        trace!(%target, %from, ?mode, %distance, "assignability");
        Ok(distance)
    }

    /// Covariant assignability: can a `from` value be stored in a `target`?
    pub fn is_assignable(&self, target: &ParameterizedType, from: &ParameterizedType) -> EngineResult<bool> {
        Ok(self.distance(target, from, Mode::Covariant)?.is_assignable())
    }
}

pub fn is_assignable_from<H: TypeHierarchy + ?Sized>(
    hierarchy: &H,
    target: &ParameterizedType,
    from: &ParameterizedType,
    mode: Mode,
) -> EngineResult<Distance> {
    Assignability::new(hierarchy).distance(target, from, mode)
}

pub fn is_assignable<H: TypeHierarchy + ?Sized>(
    hierarchy: &H,
    target: &ParameterizedType,
    from: &ParameterizedType,
) -> EngineResult<bool> {
    Assignability::new(hierarchy).is_assignable(target, from)
}

/// A comparison that expands bounds or supertypes and may come back to itself.
type Visit = (ParameterizedType, ParameterizedType, Mode);

/// State of one query. `in_progress` holds the expanding comparisons on the
/// current path; re-entering one answers not assignable, so recursive bounds
/// and cyclic hierarchies terminate.
struct Search<'s, 'a, H: TypeHierarchy + ?Sized> {
    engine: &'s Assignability<'a, H>,
    in_progress: Vec<Visit>,
}

impl<H: TypeHierarchy + ?Sized> Search<'_, '_, H> {
    fn guarded(
        &mut self,
        visit: Visit,
        expand: impl FnOnce(&mut Self) -> EngineResult<Distance>,
    ) -> EngineResult<Distance> {
        if self.in_progress.contains(&visit) {
            trace!(to = %visit.0, from = %visit.1, mode = ?visit.2, "comparison re-entered");
            return Ok(Distance::NotAssignable);
        }
        self.in_progress.push(visit);
        let result = expand(self);
        self.in_progress.pop();
        result
    }

    fn execute(
        &mut self,
        target: &ParameterizedType,
        from: &ParameterizedType,
        ignore_arrays: bool,
        mode: Mode,
    ) -> EngineResult<Distance> {
        if target == from || (ignore_arrays && target.equals_ignoring_arrays(from)) {
            return Ok(Distance::EQUALS);
        }
        if from.is_null() {
            return Ok(if target.is_primitive() {
                Distance::NotAssignable
            } else {
                Distance::ASSIGN_TO_NULL
            });
        }
        match mode {
            Mode::Contravariant => return self.execute(from, target, ignore_arrays, Mode::Covariant),
            Mode::Any => {
                let forward = self.execute(target, from, ignore_arrays, Mode::Covariant)?;
                let backward = self.execute(from, target, ignore_arrays, Mode::Covariant)?;
                return Ok(forward.better(backward));
            }
            _ => {}
        }
        if mode != Mode::Invariant
            && target.is_object()
            && (ignore_arrays || target.arrays() == 0 || target.arrays() < from.arrays())
        {
            return Ok(Distance::IN_HIERARCHY);
        }
        if target.is_unbound_wildcard() {
            return Ok(Distance::UNBOUND_WILDCARD);
        }

        match (target.base(), from.base()) {
            (
                TypeBase::Nominal(_) | TypeBase::Primitive(_),
                TypeBase::Nominal(_) | TypeBase::Primitive(_),
            ) => self.both_concrete(target, from, ignore_arrays, mode),
            (TypeBase::Nominal(_) | TypeBase::Primitive(_), TypeBase::Parameter(parameter)) => {
                self.from_type_parameter(target, parameter, from, ignore_arrays, mode)
            }
            (TypeBase::Parameter(parameter), _) => self.target_type_parameter(parameter, from, mode),
            _ => Ok(Distance::NotAssignable),
        }
    }

    fn both_concrete(
        &mut self,
        target: &ParameterizedType,
        from: &ParameterizedType,
        ignore_arrays: bool,
        mode: Mode,
    ) -> EngineResult<Distance> {
        if !ignore_arrays {
            if target.arrays() != from.arrays() {
                return Ok(Distance::NotAssignable);
            }
            if target.arrays() > 0 {
                return self.execute(&target.without_arrays(), &from.without_arrays(), false, mode);
            }
        }
        match (target.base(), from.base()) {
            (TypeBase::Primitive(to), TypeBase::Primitive(source)) => Ok(widening(*to, *source, mode)),
            (TypeBase::Primitive(primitive), TypeBase::Nominal(name))
            | (TypeBase::Nominal(name), TypeBase::Primitive(primitive)) => Ok(boxing(*primitive, name)),
            (TypeBase::Nominal(to), TypeBase::Nominal(source)) if to == source => {
                self.same_type(target, from, mode)
            }
            (TypeBase::Nominal(_), TypeBase::Nominal(_)) => self.different_types(target, from, mode),
            _ => Ok(Distance::NotAssignable),
        }
    }

    fn same_type(
        &mut self,
        target: &ParameterizedType,
        from: &ParameterizedType,
        mode: Mode,
    ) -> EngineResult<Distance> {
        if mode == Mode::CovariantErasure {
            return Ok(Distance::SAME_UNDERLYING_TYPE);
        }
        let (targets, froms) = (target.parameters(), from.parameters());
        if targets.is_empty() && froms.is_empty() {
            let (left, right) = (target.wildcard(), from.wildcard());
            let compatible = left == right
                || mode != Mode::Invariant
                || (left != WildCard::None && right != WildCard::None);
            return Ok(if compatible {
                Distance::SAME_UNDERLYING_TYPE
            } else {
                Distance::NotAssignable
            });
        }
        // raw on either side
        if targets.is_empty() || froms.is_empty() || targets.len() != froms.len() {
            return Ok(Distance::SAME_UNDERLYING_TYPE);
        }
        let mut sum = Distance::EQUALS;
        for (target_argument, from_argument) in targets.iter().zip(froms) {
            let argument_mode = mode.for_argument(target_argument.wildcard());
            sum = sum.plus(self.execute(target_argument, from_argument, true, argument_mode)?);
            if !sum.is_assignable() {
                break;
            }
        }
        Ok(sum)
    }

    fn different_types(
        &mut self,
        target: &ParameterizedType,
        from: &ParameterizedType,
        mode: Mode,
    ) -> EngineResult<Distance> {
        let hierarchy = self.engine.hierarchy;
        if let (Some(to), Some(source)) = (target.type_name(), from.type_name()) {
            if hierarchy.is_functional_interface(to) && hierarchy.is_functional_interface(source) {
                return self.functional(target, from, mode);
            }
        }
        match mode {
            Mode::Covariant | Mode::CovariantErasure => self.walk_hierarchy(target, from, mode),
            _ => Ok(Distance::NotAssignable),
        }
    }

    /// Structural comparison of two functional interfaces through their
    /// single abstract methods.
    fn functional(
        &mut self,
        target: &ParameterizedType,
        from: &ParameterizedType,
        mode: Mode,
    ) -> EngineResult<Distance> {
        let hierarchy = self.engine.hierarchy;
        let (Some(target_sam), Some(from_sam)) =
            (concrete_sam(hierarchy, target)?, concrete_sam(hierarchy, from)?)
        else {
            return Ok(Distance::NotAssignable);
        };
        if target_sam.parameters().len() != from_sam.parameters().len() {
            return Ok(Distance::NotAssignable);
        }
        if !target_sam.returns_void() && from_sam.returns_void() {
            return Ok(Distance::NotAssignable);
        }
        if mode == Mode::CovariantErasure {
            return Ok(Distance::SAME_UNDERLYING_TYPE);
        }
        let returns_match =
            target_sam.returns_void() || target_sam.return_type() == from_sam.return_type();
        if returns_match && target_sam.parameters() == from_sam.parameters() {
            Ok(Distance::EQUALS)
        } else {
            Ok(Distance::NotAssignable)
        }
    }

    /// Look for `target` among the supertypes of `from`, one hop at a time.
    fn walk_hierarchy(
        &mut self,
        target: &ParameterizedType,
        from: &ParameterizedType,
        mode: Mode,
    ) -> EngineResult<Distance> {
        let hierarchy = self.engine.hierarchy;
        let Some(name) = from.type_name() else {
            return Ok(Distance::NotAssignable);
        };
        let declaration = hierarchy.require(name)?;
        let visit = (target.clone(), from.clone(), mode);
        self.guarded(visit, |search| {
            let candidates = declaration
                .interfaces()
                .iter()
                .chain(declaration.parent().filter(|parent| !parent.is_object()));
            for super_formal in candidates {
                let concrete = concrete_direct_super_type(hierarchy, from, super_formal)?;
                let distance = search.execute(target, &concrete, true, mode)?;
                if distance.is_assignable() {
                    return Ok(Distance::IN_HIERARCHY.plus(distance));
                }
            }
            Ok(Distance::NotAssignable)
        })
    }

    fn from_type_parameter(
        &mut self,
        target: &ParameterizedType,
        parameter: &TypeParameterRef,
        from: &ParameterizedType,
        ignore_arrays: bool,
        mode: Mode,
    ) -> EngineResult<Distance> {
        if self.engine.reverse.contains(parameter) {
            return self.execute(from, target, ignore_arrays, mode);
        }
        let hierarchy = self.engine.hierarchy;
        let bounds = hierarchy.bounds(parameter)?;
        let visit = (target.clone(), ParameterizedType::type_parameter(parameter.clone()), mode);
        self.guarded(visit, |search| {
            let mut best = Distance::NotAssignable;
            for bound in bounds {
                best = best.better(search.execute(target, bound, true, mode)?);
            }
            Ok(best)
        })
    }

    fn target_type_parameter(
        &mut self,
        parameter: &TypeParameterRef,
        from: &ParameterizedType,
        mode: Mode,
    ) -> EngineResult<Distance> {
        let hierarchy = self.engine.hierarchy;
        let bounds = hierarchy.bounds(parameter)?;
        if bounds.is_empty() {
            return Ok(Distance::IN_HIERARCHY);
        }
        let from_bounds = match from.base() {
            TypeBase::Nominal(_) | TypeBase::Primitive(_) => None,
            TypeBase::Parameter(from_parameter) => {
                let from_bounds = hierarchy.bounds(from_parameter)?;
                if from_bounds.is_empty() {
                    return Ok(Distance::IN_HIERARCHY);
                }
                Some(from_bounds)
            }
            _ => return Ok(Distance::NotAssignable),
        };
        let visit = (
            ParameterizedType::type_parameter(parameter.clone()),
            from.clone().with_wildcard(WildCard::None),
            mode,
        );
        self.guarded(visit, |search| {
            let mut best = Distance::NotAssignable;
            for bound in bounds {
                match from_bounds {
                    None => best = best.better(search.execute(bound, from, true, mode)?),
                    Some(from_bounds) => {
                        for from_bound in from_bounds {
                            best = best.better(search.execute(bound, from_bound, true, mode)?);
                        }
                    }
                }
            }
            Ok(best)
        })
    }
}
