//! Parameterized types, the hierarchy they live in, assignability distances
//! and type parameter substitution.

mod assignable;
mod distance;
mod hierarchy;
mod primitives;
mod substitution;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use assignable::{Assignability, Mode, is_assignable, is_assignable_from};
pub use distance::Distance;
pub use hierarchy::{SamSignature, TypeDecl, TypeHierarchy, TypeKind, TypeParameterDecl, TypeStore};
pub use primitives::Primitive;
pub use substitution::{
    TranslationMap, apply_translation, concrete_direct_super_type, concrete_sam,
    concrete_super_type, fill_type_parameters, forward_type_parameter_map,
    initial_type_parameter_map, translate_map,
};

/// Fully qualified name of the top type.
pub const OBJECT: &str = "java.lang.Object";

/// Wildcard of a type used as a type argument.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WildCard {
    #[default]
    None,
    /// `?`
    Unbound,
    /// `? super X`
    Super,
    /// `? extends X`
    Extends,
}

/// Declaration site of a type parameter.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeParameterOwner {
    Type(String),
    Method(String),
}

/// Reference to the `index`-th type parameter of its owner.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeParameterRef {
    owner: Option<TypeParameterOwner>,
    index: usize,
    name: String,
}

impl TypeParameterRef {
    pub fn of_type(owner: impl Into<String>, index: usize, name: impl Into<String>) -> Self {
        Self {
            owner: Some(TypeParameterOwner::Type(owner.into())),
            index,
            name: name.into(),
        }
    }

    pub fn of_method(method: impl Into<String>, index: usize, name: impl Into<String>) -> Self {
        Self {
            owner: Some(TypeParameterOwner::Method(method.into())),
            index,
            name: name.into(),
        }
    }

    /// A parameter whose declaration is not known; its bounds cannot be resolved.
    pub fn detached(index: usize, name: impl Into<String>) -> Self {
        Self {
            owner: None,
            index,
            name: name.into(),
        }
    }

    pub fn owner(&self) -> Option<&TypeParameterOwner> {
        self.owner.as_ref()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// What a parameterized type is built on.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeBase {
    Nominal(String),
    Primitive(Primitive),
    Parameter(TypeParameterRef),
    /// Type of the `null` literal.
    Null,
    /// The bare `?` argument.
    Wildcard,
}

/// A type as used in code: base, type arguments, array depth and wildcard.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParameterizedType {
    base: TypeBase,
    parameters: Vec<ParameterizedType>,
    arrays: usize,
    wildcard: WildCard,
}

impl ParameterizedType {
    fn of(base: TypeBase) -> Self {
        Self {
            base,
            parameters: Vec::new(),
            arrays: 0,
            wildcard: WildCard::None,
        }
    }

    pub fn nominal(name: impl Into<String>) -> Self {
        Self::of(TypeBase::Nominal(name.into()))
    }

    pub fn object() -> Self {
        Self::nominal(OBJECT)
    }

    pub fn primitive(primitive: Primitive) -> Self {
        Self::of(TypeBase::Primitive(primitive))
    }

    pub fn type_parameter(parameter: TypeParameterRef) -> Self {
        Self::of(TypeBase::Parameter(parameter))
    }

    pub fn null() -> Self {
        Self::of(TypeBase::Null)
    }

    pub fn unbound_wildcard() -> Self {
        Self {
            wildcard: WildCard::Unbound,
            ..Self::of(TypeBase::Wildcard)
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<ParameterizedType>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_arrays(mut self, arrays: usize) -> Self {
        self.arrays = arrays;
        self
    }

    pub fn with_wildcard(mut self, wildcard: WildCard) -> Self {
        self.wildcard = wildcard;
        self
    }

    /// `? extends self`
    pub fn extends(self) -> Self {
        self.with_wildcard(WildCard::Extends)
    }

    /// `? super self`
    pub fn super_of(self) -> Self {
        self.with_wildcard(WildCard::Super)
    }

    pub fn base(&self) -> &TypeBase {
        &self.base
    }

    pub fn parameters(&self) -> &[ParameterizedType] {
        &self.parameters
    }

    pub fn arrays(&self) -> usize {
        self.arrays
    }

    pub fn wildcard(&self) -> WildCard {
        self.wildcard
    }

    /// Name of the nominal base type, if any.
    pub fn type_name(&self) -> Option<&str> {
        match &self.base {
            TypeBase::Nominal(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match self.base {
            TypeBase::Primitive(primitive) => Some(primitive),
            _ => None,
        }
    }

    /// A primitive value, not an array of primitives.
    pub fn is_primitive(&self) -> bool {
        self.arrays == 0 && matches!(self.base, TypeBase::Primitive(_))
    }

    pub fn is_void(&self) -> bool {
        self.arrays == 0 && self.base == TypeBase::Primitive(Primitive::Void)
    }

    pub fn is_null(&self) -> bool {
        self.base == TypeBase::Null
    }

    pub fn is_object(&self) -> bool {
        self.type_name() == Some(OBJECT)
    }

    pub fn is_unbound_wildcard(&self) -> bool {
        self.base == TypeBase::Wildcard && self.wildcard == WildCard::Unbound
    }

    pub fn as_type_parameter(&self) -> Option<&TypeParameterRef> {
        match &self.base {
            TypeBase::Parameter(parameter) => Some(parameter),
            _ => None,
        }
    }

    pub fn without_arrays(&self) -> Self {
        self.clone().with_arrays(0)
    }

    /// The raw type: same base, arrays and wildcard, no type arguments.
    pub fn erased(&self) -> Self {
        self.clone().with_parameters(Vec::new())
    }

    pub fn equals_ignoring_arrays(&self, other: &ParameterizedType) -> bool {
        self.base == other.base
            && self.wildcard == other.wildcard
            && self.parameters == other.parameters
    }
}

impl fmt::Display for ParameterizedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.wildcard {
            WildCard::None | WildCard::Unbound => {}
            WildCard::Extends => f.write_str("? extends ")?,
            WildCard::Super => f.write_str("? super ")?,
        }
        match &self.base {
            TypeBase::Nominal(name) => f.write_str(name)?,
            TypeBase::Primitive(primitive) => f.write_str(primitive.name())?,
            TypeBase::Parameter(parameter) => f.write_str(parameter.name())?,
            TypeBase::Null => f.write_str("null")?,
            TypeBase::Wildcard => f.write_str("?")?,
        }
        if !self.parameters.is_empty() {
            let rendered: Vec<String> = self.parameters.iter().map(ToString::to_string).collect();
            write!(f, "<{}>", rendered.join(", "))?;
        }
        for _ in 0..self.arrays {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_wildcards_arguments_and_arrays() {
        let number = ParameterizedType::nominal("java.lang.Number").extends();
        let list = ParameterizedType::nominal("java.util.List")
            .with_parameters(vec![number])
            .with_arrays(2);
        assert_eq!(list.to_string(), "java.util.List<? extends java.lang.Number>[][]");
        let map = ParameterizedType::nominal("java.util.Map").with_parameters(vec![
            ParameterizedType::type_parameter(TypeParameterRef::of_type("Box", 0, "T")).super_of(),
            ParameterizedType::unbound_wildcard(),
        ]);
        assert_eq!(map.to_string(), "java.util.Map<? super T, ?>");
        assert_eq!(
            ParameterizedType::primitive(Primitive::Int).with_arrays(1).to_string(),
            "int[]"
        );
    }

    #[test]
    fn primitive_arrays_are_not_primitive() {
        let int = ParameterizedType::primitive(Primitive::Int);
        assert!(int.is_primitive());
        assert!(!int.clone().with_arrays(1).is_primitive());
        assert!(int.equals_ignoring_arrays(&int.clone().with_arrays(3)));
    }

    #[test]
    fn erased_type_keeps_base_and_arrays() {
        let list = ParameterizedType::nominal("java.util.List")
            .with_parameters(vec![ParameterizedType::nominal("java.lang.String")])
            .with_arrays(1);
        let raw = list.erased();
        assert!(raw.parameters().is_empty());
        assert_eq!(raw.arrays(), 1);
        assert_eq!(raw.type_name(), Some("java.util.List"));
    }
}
