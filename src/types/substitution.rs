use std::collections::{BTreeMap, BTreeSet};

use super::hierarchy::{SamSignature, TypeHierarchy};
use super::{ParameterizedType, TypeBase, TypeParameterOwner, TypeParameterRef, WildCard};
use crate::error::EngineResult;

/// Binding of formal type parameters to the types that replace them.
pub type TranslationMap = BTreeMap<TypeParameterRef, ParameterizedType>;

/// Bind the formal parameters of `concrete`'s declaration to its arguments,
/// recursing into the arguments. `Box<String>` gives `T -> String`.
pub fn initial_type_parameter_map<H: TypeHierarchy + ?Sized>(
    hierarchy: &H,
    concrete: &ParameterizedType,
) -> EngineResult<TranslationMap> {
    let mut map = TranslationMap::new();
    let mut visited = BTreeSet::new();
    collect_initial(hierarchy, concrete, &mut map, &mut visited)?;
    Ok(map)
}

fn collect_initial<H: TypeHierarchy + ?Sized>(
    hierarchy: &H,
    concrete: &ParameterizedType,
    map: &mut TranslationMap,
    visited: &mut BTreeSet<String>,
) -> EngineResult<()> {
    let Some(name) = concrete.type_name() else {
        return Ok(());
    };
    if concrete.parameters().is_empty() || !visited.insert(name.to_string()) {
        return Ok(());
    }
    let declaration = hierarchy.require(name)?;
    if declaration.type_parameters().len() != concrete.parameters().len() {
        return Ok(());
    }
    for (index, argument) in concrete.parameters().iter().enumerate() {
        if let Some(formal) = declaration.type_parameter_ref(index) {
            map.entry(formal).or_insert_with(|| argument.clone());
        }
        collect_initial(hierarchy, argument, map, visited)?;
    }
    Ok(())
}

/// `super_formal`, a direct supertype as declared on `sub`'s type, seen from
/// the concrete `sub`. A raw `sub` of a generic type yields a raw supertype.
pub fn concrete_direct_super_type<H: TypeHierarchy + ?Sized>(
    hierarchy: &H,
    sub: &ParameterizedType,
    super_formal: &ParameterizedType,
) -> EngineResult<ParameterizedType> {
    let Some(name) = sub.type_name() else {
        return Ok(super_formal.clone());
    };
    let declaration = hierarchy.require(name)?;
    if sub.parameters().is_empty() && !declaration.type_parameters().is_empty() {
        return Ok(super_formal.erased());
    }
    let map = initial_type_parameter_map(hierarchy, sub)?;
    Ok(apply_translation(super_formal, &map))
}

/// The supertype named `super_name` of `sub`, with `sub`'s arguments
/// substituted along the path, or `None` if `super_name` is not a supertype.
pub fn concrete_super_type<H: TypeHierarchy + ?Sized>(
    hierarchy: &H,
    sub: &ParameterizedType,
    super_name: &str,
) -> EngineResult<Option<ParameterizedType>> {
    let mut visited = BTreeSet::new();
    find_super_type(hierarchy, &sub.without_arrays(), super_name, &mut visited)
}

fn find_super_type<H: TypeHierarchy + ?Sized>(
    hierarchy: &H,
    sub: &ParameterizedType,
    super_name: &str,
    visited: &mut BTreeSet<String>,
) -> EngineResult<Option<ParameterizedType>> {
    let Some(name) = sub.type_name() else {
        return Ok(None);
    };
    if name == super_name {
        return Ok(Some(sub.clone()));
    }
    if !visited.insert(name.to_string()) {
        return Ok(None);
    }
    let declaration = hierarchy.require(name)?;
    for super_formal in declaration.direct_super_types() {
        let concrete = concrete_direct_super_type(hierarchy, sub, super_formal)?;
        if let Some(found) = find_super_type(hierarchy, &concrete, super_name, visited)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Bind the formal parameters of the supertype `super_name` to what they are
/// in `sub`, one hierarchy hop at a time. Empty when `super_name` is not a
/// supertype; the identity map for `Box<T>` against `Box`.
pub fn forward_type_parameter_map<H: TypeHierarchy + ?Sized>(
    hierarchy: &H,
    sub: &ParameterizedType,
    super_name: &str,
) -> EngineResult<TranslationMap> {
    match concrete_super_type(hierarchy, sub, super_name)? {
        Some(concrete) => initial_type_parameter_map(hierarchy, &concrete),
        None => Ok(TranslationMap::new()),
    }
}

/// Replace type parameters in `ty` through `map` until a fixed point.
///
/// Self-mappings and cycles stop the resolution; primitives that end up as
/// type arguments are boxed.
pub fn apply_translation(ty: &ParameterizedType, map: &TranslationMap) -> ParameterizedType {
    if map.is_empty() {
        return ty.clone();
    }
    let mut expanding = Vec::new();
    translate(ty, map, &mut expanding)
}

fn translate(
    ty: &ParameterizedType,
    map: &TranslationMap,
    expanding: &mut Vec<TypeParameterRef>,
) -> ParameterizedType {
    let mut current = ty.clone();
    let mut resolved: Vec<TypeParameterRef> = Vec::new();
    while let TypeBase::Parameter(parameter) = current.base() {
        if expanding.contains(parameter) || resolved.contains(parameter) {
            break;
        }
        let Some(next) = map.get(parameter) else {
            break;
        };
        if next.base() == current.base() {
            break;
        }
        resolved.push(parameter.clone());
        let arrays = next.arrays() + current.arrays();
        let wildcard = match current.wildcard() {
            WildCard::None => next.wildcard(),
            kept => kept,
        };
        current = next.clone().with_arrays(arrays).with_wildcard(wildcard);
    }

    if current.parameters().is_empty() {
        return current;
    }
    let depth = expanding.len();
    expanding.extend(resolved);
    let parameters = current
        .parameters()
        .iter()
        .map(|parameter| box_argument(translate(parameter, map, expanding)))
        .collect();
    expanding.truncate(depth);
    current.with_parameters(parameters)
}

fn box_argument(argument: ParameterizedType) -> ParameterizedType {
    match argument.as_primitive() {
        Some(primitive) if argument.arrays() == 0 => {
            ParameterizedType::nominal(primitive.boxed_name()).with_wildcard(argument.wildcard())
        }
        _ => argument,
    }
}

/// Infer bindings for the type parameters in `formal` by matching it
/// against a concrete usage. Two different functional interfaces are matched
/// through their single abstract methods.
pub fn translate_map<H: TypeHierarchy + ?Sized>(
    hierarchy: &H,
    formal: &ParameterizedType,
    concrete: &ParameterizedType,
) -> EngineResult<TranslationMap> {
    let mut map = TranslationMap::new();
    collect_translation(hierarchy, formal, concrete, &mut map)?;
    Ok(map)
}

fn collect_translation<H: TypeHierarchy + ?Sized>(
    hierarchy: &H,
    formal: &ParameterizedType,
    concrete: &ParameterizedType,
    map: &mut TranslationMap,
) -> EngineResult<()> {
    match formal.base() {
        TypeBase::Parameter(parameter) => {
            let arrays = concrete.arrays().saturating_sub(formal.arrays());
            map.entry(parameter.clone())
                .or_insert_with(|| concrete.clone().with_arrays(arrays));
            Ok(())
        }
        TypeBase::Nominal(formal_name) => {
            let Some(concrete_name) = concrete.type_name() else {
                return Ok(());
            };
            if formal_name != concrete_name
                && hierarchy.is_functional_interface(formal_name)
                && hierarchy.is_functional_interface(concrete_name)
            {
                return collect_sam_translation(hierarchy, formal, concrete, map);
            }
            let aligned = if formal_name == concrete_name {
                Some(concrete.clone())
            } else {
                concrete_super_type(hierarchy, concrete, formal_name)?
            };
            if let Some(aligned) = aligned {
                if aligned.parameters().len() == formal.parameters().len() {
                    for (formal_argument, argument) in formal.parameters().iter().zip(aligned.parameters()) {
                        collect_translation(hierarchy, formal_argument, argument, map)?;
                    }
                }
            }
            Ok(())
        }
        TypeBase::Primitive(_) | TypeBase::Null | TypeBase::Wildcard => Ok(()),
    }
}

fn collect_sam_translation<H: TypeHierarchy + ?Sized>(
    hierarchy: &H,
    formal: &ParameterizedType,
    concrete: &ParameterizedType,
    map: &mut TranslationMap,
) -> EngineResult<()> {
    let (Some(formal_sam), Some(concrete_sam)) =
        (concrete_sam(hierarchy, formal)?, concrete_sam(hierarchy, concrete)?)
    else {
        return Ok(());
    };
    if formal_sam.parameters().len() != concrete_sam.parameters().len() {
        return Ok(());
    }
    for (formal_parameter, parameter) in formal_sam.parameters().iter().zip(concrete_sam.parameters()) {
        collect_translation(hierarchy, formal_parameter, parameter, map)?;
    }
    collect_translation(hierarchy, formal_sam.return_type(), concrete_sam.return_type(), map)
}

/// The single abstract method of `functional` with its arguments substituted,
/// or `None` when the type is not a functional interface.
pub fn concrete_sam<H: TypeHierarchy + ?Sized>(
    hierarchy: &H,
    functional: &ParameterizedType,
) -> EngineResult<Option<SamSignature>> {
    let Some(name) = functional.type_name() else {
        return Ok(None);
    };
    let Some(sam) = hierarchy.require(name)?.functional() else {
        return Ok(None);
    };
    let map = initial_type_parameter_map(hierarchy, functional)?;
    let parameters = sam
        .parameters()
        .iter()
        .map(|parameter| apply_translation(parameter, &map))
        .collect();
    Ok(Some(SamSignature::new(
        parameters,
        apply_translation(sam.return_type(), &map),
    )))
}

/// Concrete type of a member declared with type `formal` when accessed
/// through `concrete_owner`, e.g. `E` of `List` through `ArrayList<String>`.
pub fn fill_type_parameters<H: TypeHierarchy + ?Sized>(
    hierarchy: &H,
    formal: &ParameterizedType,
    concrete_owner: &ParameterizedType,
) -> EngineResult<ParameterizedType> {
    let mut owners = BTreeSet::new();
    collect_type_owners(formal, &mut owners);
    let mut map = TranslationMap::new();
    for owner in owners {
        for (parameter, bound) in forward_type_parameter_map(hierarchy, concrete_owner, owner)? {
            map.entry(parameter).or_insert(bound);
        }
    }
    Ok(apply_translation(formal, &map))
}

fn collect_type_owners<'a>(ty: &'a ParameterizedType, owners: &mut BTreeSet<&'a str>) {
    if let Some(TypeParameterOwner::Type(owner)) = ty.as_type_parameter().and_then(TypeParameterRef::owner) {
        owners.insert(owner.as_str());
    }
    for parameter in ty.parameters() {
        collect_type_owners(parameter, owners);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Primitive, TypeDecl, TypeStore};

    const BOX: &str = "com.example.Box";
    const STRING: &str = "java.lang.String";

    fn t() -> ParameterizedType {
        ParameterizedType::type_parameter(TypeParameterRef::of_type(BOX, 0, "T"))
    }

    fn store() -> TypeStore {
        let mut store = TypeStore::with_platform_types();
        store
            .add_declarations([TypeDecl::class(BOX).with_type_parameter("T", Vec::new())])
            .expect("box");
        store
    }

    fn boxed(argument: ParameterizedType) -> ParameterizedType {
        ParameterizedType::nominal(BOX).with_parameters(vec![argument])
    }

    fn string() -> ParameterizedType {
        ParameterizedType::nominal(STRING)
    }

    #[test]
    fn initial_map_binds_formal_to_argument() {
        let store = store();
        let map = initial_type_parameter_map(&store, &boxed(string())).expect("map");
        assert_eq!(apply_translation(&t(), &map), string());
        assert_eq!(apply_translation(&t().with_arrays(1), &map), string().with_arrays(1));
    }

    #[test]
    fn initial_map_recurses_into_arguments() {
        let store = store();
        let list = ParameterizedType::nominal("java.util.List").with_parameters(vec![string()]);
        let map = initial_type_parameter_map(&store, &boxed(list.clone())).expect("map");
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&TypeParameterRef::of_type(BOX, 0, "T")), Some(&list));
        assert_eq!(
            map.get(&TypeParameterRef::of_type("java.util.List", 0, "E")),
            Some(&string())
        );
    }

    #[test]
    fn forward_map_of_own_declaration_is_identity() {
        let store = store();
        let map = forward_type_parameter_map(&store, &boxed(t()), BOX).expect("map");
        assert_eq!(map.len(), 1);
        for (parameter, bound) in &map {
            assert_eq!(bound.as_type_parameter(), Some(parameter));
        }
        assert_eq!(apply_translation(&t(), &map), t());
    }

    #[test]
    fn forward_map_walks_the_hierarchy() {
        let store = TypeStore::with_platform_types();
        let array_list =
            ParameterizedType::nominal("java.util.ArrayList").with_parameters(vec![string()]);
        let map = forward_type_parameter_map(&store, &array_list, "java.lang.Iterable").expect("map");
        assert_eq!(
            map.get(&TypeParameterRef::of_type("java.lang.Iterable", 0, "T")),
            Some(&string())
        );
        let none = forward_type_parameter_map(&store, &array_list, "java.util.Map").expect("map");
        assert!(none.is_empty());
    }

    #[test]
    fn raw_sub_type_gives_raw_super_type() {
        let store = TypeStore::with_platform_types();
        let raw = ParameterizedType::nominal("java.util.ArrayList");
        let declaration = store.require("java.util.ArrayList").expect("declared");
        let super_formal = &declaration.interfaces()[0];
        let concrete = concrete_direct_super_type(&store, &raw, super_formal).expect("super");
        assert_eq!(concrete, ParameterizedType::nominal("java.util.List"));
    }

    #[test]
    fn cycles_and_self_mappings_stop_translation() {
        let u = ParameterizedType::type_parameter(TypeParameterRef::of_type(BOX, 1, "U"));
        let mut map = TranslationMap::new();
        map.insert(TypeParameterRef::of_type(BOX, 0, "T"), u.clone());
        map.insert(TypeParameterRef::of_type(BOX, 1, "U"), t());
        let translated = apply_translation(&t(), &map);
        assert!(translated.as_type_parameter().is_some());

        let mut recursive = TranslationMap::new();
        recursive.insert(TypeParameterRef::of_type(BOX, 0, "T"), boxed(t()));
        assert_eq!(apply_translation(&t(), &recursive), boxed(t()));
    }

    #[test]
    fn primitive_arguments_are_boxed() {
        let mut map = TranslationMap::new();
        map.insert(
            TypeParameterRef::of_type(BOX, 0, "T"),
            ParameterizedType::primitive(Primitive::Int),
        );
        assert_eq!(
            apply_translation(&boxed(t()), &map),
            boxed(ParameterizedType::nominal("java.lang.Integer"))
        );
        assert_eq!(
            apply_translation(&t(), &map),
            ParameterizedType::primitive(Primitive::Int)
        );
    }

    #[test]
    fn translate_map_through_super_type_and_functional_interfaces() {
        let store = TypeStore::with_platform_types();
        let e = ParameterizedType::type_parameter(TypeParameterRef::of_type("java.util.Collection", 0, "E"));
        let formal = ParameterizedType::nominal("java.util.Collection").with_parameters(vec![e.clone()]);
        let concrete = ParameterizedType::nominal("java.util.ArrayList").with_parameters(vec![string()]);
        let map = translate_map(&store, &formal, &concrete).expect("map");
        assert_eq!(apply_translation(&e, &map), string());

        let function_t = ParameterizedType::type_parameter(TypeParameterRef::of_type(
            "java.util.function.Function",
            0,
            "T",
        ));
        let function = ParameterizedType::nominal("java.util.function.Function")
            .with_parameters(vec![function_t.clone(), ParameterizedType::nominal("java.lang.Boolean")]);
        let predicate =
            ParameterizedType::nominal("java.util.function.Predicate").with_parameters(vec![string()]);
        let map = translate_map(&store, &function, &predicate).expect("map");
        assert_eq!(apply_translation(&function_t, &map), string());
    }

    #[test]
    fn fill_type_parameters_resolves_inherited_members() {
        let store = TypeStore::with_platform_types();
        let e = ParameterizedType::type_parameter(TypeParameterRef::of_type("java.util.List", 0, "E"));
        let owner = ParameterizedType::nominal("java.util.ArrayList").with_parameters(vec![string()]);
        let filled = fill_type_parameters(&store, &e, &owner).expect("filled");
        assert_eq!(filled, string());
    }

    #[test]
    fn concrete_sam_substitutes_arguments() {
        let store = TypeStore::with_platform_types();
        let function = ParameterizedType::nominal("java.util.function.Function")
            .with_parameters(vec![string(), ParameterizedType::nominal("java.lang.Integer")]);
        let sam = concrete_sam(&store, &function).expect("sam").expect("functional");
        assert_eq!(sam.parameters(), &[string()]);
        assert_eq!(sam.return_type(), &ParameterizedType::nominal("java.lang.Integer"));
        assert!(concrete_sam(&store, &string()).expect("sam").is_none());
    }
}
