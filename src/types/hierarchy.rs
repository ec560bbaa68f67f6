use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{OBJECT, ParameterizedType, Primitive, TypeParameterOwner, TypeParameterRef};
use crate::error::{EngineError, EngineResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Interface,
}

/// Formal type parameter with its declared bounds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParameterDecl {
    name: String,
    bounds: Vec<ParameterizedType>,
}

impl TypeParameterDecl {
    pub fn new(name: impl Into<String>, bounds: Vec<ParameterizedType>) -> Self {
        Self {
            name: name.into(),
            bounds,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounds(&self) -> &[ParameterizedType] {
        &self.bounds
    }
}

/// Single abstract method of a functional interface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamSignature {
    parameters: Vec<ParameterizedType>,
    return_type: ParameterizedType,
}

impl SamSignature {
    pub fn new(parameters: Vec<ParameterizedType>, return_type: ParameterizedType) -> Self {
        Self {
            parameters,
            return_type,
        }
    }

    pub fn parameters(&self) -> &[ParameterizedType] {
        &self.parameters
    }

    pub fn return_type(&self) -> &ParameterizedType {
        &self.return_type
    }

    pub fn returns_void(&self) -> bool {
        self.return_type.is_void()
    }
}

/// Declaration of a nominal type as far as assignability needs it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    name: String,
    kind: TypeKind,
    type_parameters: Vec<TypeParameterDecl>,
    parent: Option<ParameterizedType>,
    interfaces: Vec<ParameterizedType>,
    functional: Option<SamSignature>,
}

impl TypeDecl {
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name.into(), TypeKind::Class)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name.into(), TypeKind::Interface)
    }

    fn new(name: String, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            type_parameters: Vec::new(),
            parent: None,
            interfaces: Vec::new(),
            functional: None,
        }
    }

    pub fn with_type_parameter(mut self, name: impl Into<String>, bounds: Vec<ParameterizedType>) -> Self {
        self.type_parameters.push(TypeParameterDecl::new(name, bounds));
        self
    }

    /// Superclass; absent means the top type.
    pub fn extends(mut self, parent: ParameterizedType) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn implements(mut self, interface: ParameterizedType) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn with_functional(mut self, sam: SamSignature) -> Self {
        self.functional = Some(sam);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn type_parameters(&self) -> &[TypeParameterDecl] {
        &self.type_parameters
    }

    pub fn parent(&self) -> Option<&ParameterizedType> {
        self.parent.as_ref()
    }

    pub fn interfaces(&self) -> &[ParameterizedType] {
        &self.interfaces
    }

    pub fn functional(&self) -> Option<&SamSignature> {
        self.functional.as_ref()
    }

    /// Reference to this type's `index`-th formal parameter.
    pub fn type_parameter_ref(&self, index: usize) -> Option<TypeParameterRef> {
        self.type_parameters
            .get(index)
            .map(|parameter| TypeParameterRef::of_type(self.name.clone(), index, parameter.name()))
    }

    /// The type applied to its own formal parameters, e.g. `List<E>`.
    pub fn formal_type(&self) -> ParameterizedType {
        let parameters = (0..self.type_parameters.len())
            .filter_map(|index| self.type_parameter_ref(index))
            .map(ParameterizedType::type_parameter)
            .collect();
        ParameterizedType::nominal(self.name.clone()).with_parameters(parameters)
    }

    /// Interfaces first, then the superclass, as formally declared.
    pub fn direct_super_types(&self) -> impl Iterator<Item = &ParameterizedType> {
        self.interfaces.iter().chain(self.parent.iter())
    }
}

/// Read access to type declarations for the assignability and substitution
/// algorithms.
pub trait TypeHierarchy {
    fn declaration(&self, name: &str) -> Option<&TypeDecl>;

    fn method_type_parameters(&self, method: &str) -> Option<&[TypeParameterDecl]>;

    /// Declaration that must be known for the algorithm to proceed.
    fn require(&self, name: &str) -> EngineResult<&TypeDecl> {
        self.declaration(name)
            .ok_or_else(|| EngineError::UnresolvableType(format!("unknown type {name}")))
    }

    fn bounds(&self, parameter: &TypeParameterRef) -> EngineResult<&[ParameterizedType]> {
        let declared = match parameter.owner() {
            None => {
                return Err(EngineError::UnresolvableType(format!(
                    "type parameter {} has no owner",
                    parameter.name()
                )));
            }
            Some(TypeParameterOwner::Type(owner)) => self.require(owner)?.type_parameters(),
            Some(TypeParameterOwner::Method(method)) => {
                self.method_type_parameters(method).ok_or_else(|| {
                    EngineError::UnresolvableType(format!("unknown method {method}"))
                })?
            }
        };
        declared
            .get(parameter.index())
            .map(TypeParameterDecl::bounds)
            .ok_or_else(|| {
                EngineError::UnresolvableType(format!(
                    "type parameter {} at index {} is not declared",
                    parameter.name(),
                    parameter.index()
                ))
            })
    }

    fn is_functional_interface(&self, name: &str) -> bool {
        self.declaration(name)
            .is_some_and(|declaration| declaration.functional().is_some())
    }
}

/// In-memory type hierarchy keyed by fully qualified name.
#[derive(Clone, Debug, Default)]
pub struct TypeStore {
    types: BTreeMap<String, TypeDecl>,
    methods: BTreeMap<String, Vec<TypeParameterDecl>>,
}

impl TypeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_declarations(declarations: impl IntoIterator<Item = TypeDecl>) -> Result<Self> {
        let mut store = Self::new();
        store.add_declarations(declarations)?;
        Ok(store)
    }

    /// Store preloaded with the platform types used by most programs:
    /// `Object`, the boxes, `String`, the core collections and the common
    /// functional interfaces.
    pub fn with_platform_types() -> Self {
        let mut store = Self::new();
        for declaration in platform_declarations() {
            store.types.insert(declaration.name().to_string(), declaration);
        }
        store
    }

    /// Add declarations; nothing is added when any name is already known,
    /// repeated within the batch, or its own supertype.
    pub fn add_declarations(&mut self, declarations: impl IntoIterator<Item = TypeDecl>) -> Result<()> {
        let mut batch: BTreeMap<String, Vec<TypeDecl>> = BTreeMap::new();
        for declaration in declarations {
            batch
                .entry(declaration.name().to_string())
                .or_default()
                .push(declaration);
        }

        let mut duplicates = Vec::new();
        for (name, declarations) in &batch {
            let known = usize::from(self.types.contains_key(name));
            if declarations.len() + known > 1 {
                duplicates.push(format!("{name}: {}", declarations.len() + known));
            }
        }
        if !duplicates.is_empty() {
            anyhow::bail!("duplicate types found: {}", duplicates.join(", "));
        }

        let cyclic: Vec<&str> = batch
            .keys()
            .map(String::as_str)
            .filter(|name| self.is_own_supertype(name, &batch))
            .collect();
        if !cyclic.is_empty() {
            anyhow::bail!("cyclic type hierarchy through: {}", cyclic.join(", "));
        }

        let count = batch.len();
        for (name, mut declarations) in batch {
            if let Some(declaration) = declarations.pop() {
                self.types.insert(name, declaration);
            }
        }
        debug!(added = count, total = self.types.len(), "registered type declarations");
        Ok(())
    }

    fn is_own_supertype(&self, start: &str, batch: &BTreeMap<String, Vec<TypeDecl>>) -> bool {
        let lookup = |name: &str| {
            batch
                .get(name)
                .and_then(|declarations| declarations.last())
                .or_else(|| self.types.get(name))
        };
        let mut visited = BTreeSet::new();
        let mut pending = vec![start];
        while let Some(name) = pending.pop() {
            let Some(declaration) = lookup(name) else {
                continue;
            };
            for super_type in declaration.direct_super_types() {
                let Some(super_name) = super_type.type_name() else {
                    continue;
                };
                if super_name == start {
                    return true;
                }
                if visited.insert(super_name) {
                    pending.push(super_name);
                }
            }
        }
        false
    }

    pub fn add_method_type_parameters(
        &mut self,
        method: impl Into<String>,
        parameters: Vec<TypeParameterDecl>,
    ) {
        self.methods.insert(method.into(), parameters);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

impl TypeHierarchy for TypeStore {
    fn declaration(&self, name: &str) -> Option<&TypeDecl> {
        self.types.get(name)
    }

    fn method_type_parameters(&self, method: &str) -> Option<&[TypeParameterDecl]> {
        self.methods.get(method).map(Vec::as_slice)
    }
}

fn nominal(name: &str) -> ParameterizedType {
    ParameterizedType::nominal(name)
}

fn formal(owner: &str, index: usize, name: &str) -> ParameterizedType {
    ParameterizedType::type_parameter(TypeParameterRef::of_type(owner, index, name))
}

fn generic(name: &str, arguments: Vec<ParameterizedType>) -> ParameterizedType {
    nominal(name).with_parameters(arguments)
}

fn platform_declarations() -> Vec<TypeDecl> {
    const NUMBER: &str = "java.lang.Number";
    const COMPARABLE: &str = "java.lang.Comparable";
    const CHAR_SEQUENCE: &str = "java.lang.CharSequence";
    const STRING: &str = "java.lang.String";
    const ITERABLE: &str = "java.lang.Iterable";
    const COLLECTION: &str = "java.util.Collection";
    const LIST: &str = "java.util.List";
    const ARRAY_LIST: &str = "java.util.ArrayList";
    const SET: &str = "java.util.Set";
    const HASH_SET: &str = "java.util.HashSet";
    const MAP: &str = "java.util.Map";
    const HASH_MAP: &str = "java.util.HashMap";
    const FUNCTION: &str = "java.util.function.Function";
    const SUPPLIER: &str = "java.util.function.Supplier";
    const CONSUMER: &str = "java.util.function.Consumer";
    const PREDICATE: &str = "java.util.function.Predicate";
    const RUNNABLE: &str = "java.lang.Runnable";

    let comparable_of = |name: &str| generic(COMPARABLE, vec![nominal(name)]);
    let void = ParameterizedType::primitive(Primitive::Void);

    let mut declarations = vec![
        TypeDecl::class(OBJECT),
        TypeDecl::class(NUMBER),
        TypeDecl::interface(COMPARABLE).with_type_parameter("T", Vec::new()),
        TypeDecl::interface(CHAR_SEQUENCE),
        TypeDecl::class(STRING)
            .implements(nominal(CHAR_SEQUENCE))
            .implements(comparable_of(STRING)),
        TypeDecl::interface(ITERABLE).with_type_parameter("T", Vec::new()),
        TypeDecl::interface(COLLECTION)
            .with_type_parameter("E", Vec::new())
            .implements(generic(ITERABLE, vec![formal(COLLECTION, 0, "E")])),
        TypeDecl::interface(LIST)
            .with_type_parameter("E", Vec::new())
            .implements(generic(COLLECTION, vec![formal(LIST, 0, "E")])),
        TypeDecl::class(ARRAY_LIST)
            .with_type_parameter("E", Vec::new())
            .implements(generic(LIST, vec![formal(ARRAY_LIST, 0, "E")])),
        TypeDecl::interface(SET)
            .with_type_parameter("E", Vec::new())
            .implements(generic(COLLECTION, vec![formal(SET, 0, "E")])),
        TypeDecl::class(HASH_SET)
            .with_type_parameter("E", Vec::new())
            .implements(generic(SET, vec![formal(HASH_SET, 0, "E")])),
        TypeDecl::interface(MAP)
            .with_type_parameter("K", Vec::new())
            .with_type_parameter("V", Vec::new()),
        TypeDecl::class(HASH_MAP)
            .with_type_parameter("K", Vec::new())
            .with_type_parameter("V", Vec::new())
            .implements(generic(
                MAP,
                vec![formal(HASH_MAP, 0, "K"), formal(HASH_MAP, 1, "V")],
            )),
        TypeDecl::interface(FUNCTION)
            .with_type_parameter("T", Vec::new())
            .with_type_parameter("R", Vec::new())
            .with_functional(SamSignature::new(
                vec![formal(FUNCTION, 0, "T")],
                formal(FUNCTION, 1, "R"),
            )),
        TypeDecl::interface(SUPPLIER)
            .with_type_parameter("T", Vec::new())
            .with_functional(SamSignature::new(Vec::new(), formal(SUPPLIER, 0, "T"))),
        TypeDecl::interface(CONSUMER)
            .with_type_parameter("T", Vec::new())
            .with_functional(SamSignature::new(vec![formal(CONSUMER, 0, "T")], void.clone())),
        TypeDecl::interface(PREDICATE)
            .with_type_parameter("T", Vec::new())
            .with_functional(SamSignature::new(
                vec![formal(PREDICATE, 0, "T")],
                ParameterizedType::primitive(Primitive::Boolean),
            )),
        TypeDecl::interface(RUNNABLE).with_functional(SamSignature::new(Vec::new(), void)),
    ];

    for primitive in Primitive::ALL {
        let boxed = primitive.boxed_name();
        let declaration = match primitive {
            Primitive::Void => TypeDecl::class(boxed),
            Primitive::Boolean | Primitive::Char => {
                TypeDecl::class(boxed).implements(comparable_of(boxed))
            }
            _ => TypeDecl::class(boxed)
                .extends(nominal(NUMBER))
                .implements(comparable_of(boxed)),
        };
        declarations.push(declaration);
    }
    declarations
}
