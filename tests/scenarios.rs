use immutability_engine::derive::{ParameterFacts, TypeFacts, derive_parameter_markers, derive_type_markers};
use immutability_engine::types::{
    Distance, Mode, ParameterizedType, Primitive, TypeDecl, TypeParameterRef, TypeStore,
    apply_translation, forward_type_parameter_map, initial_type_parameter_map, is_assignable_from,
};
use immutability_engine::{
    AnnotationMode, EngineError, EntityKind, Eventual, MarkerKind, MultiLevel, Property,
    PropertyStore, Value,
};

fn frozen(entity: &str, kind: EntityKind, values: &[(Property, Value)]) -> PropertyStore {
    let mut store = PropertyStore::new(entity, kind, true, AnnotationMode::Defensive);
    for (property, value) in values {
        store.set(*property, *value).expect("set");
    }
    store.freeze();
    store
}

fn parameter_facts() -> ParameterFacts {
    ParameterFacts {
        is_primitive: false,
        owner_is_interface: false,
        better_than_formal: true,
    }
}

#[test]
fn content_not_null_suppresses_nullable() {
    let store = frozen(
        "com.example.Box.put(java.util.List)#0",
        EntityKind::Parameter,
        &[
            (Property::NotNull, MultiLevel::EFFECTIVELY_CONTENT_NOT_NULL.into()),
            (Property::Modified, Value::FALSE),
            (Property::Independent, MultiLevel::INDEPENDENT.into()),
        ],
    );
    let markers = derive_parameter_markers(&store, &parameter_facts()).expect("markers");
    assert!(markers.contains(MarkerKind::NotNull1));
    assert!(markers.is_absent(MarkerKind::Nullable));
    assert!(!markers.contains(MarkerKind::NotNull));
}

#[test]
fn eventually_immutable_type_carries_its_precondition() {
    let store = frozen(
        "com.example.Freezable",
        EntityKind::Type,
        &[
            (Property::Immutable, MultiLevel::EVENTUALLY_E2IMMUTABLE.into()),
            (Property::Container, Value::FALSE),
            (Property::Independent, MultiLevel::INDEPENDENT.into()),
        ],
    );
    let eventual = Eventual::of_fields(["frozen"]);
    let markers = derive_type_markers(
        &store,
        &TypeFacts {
            is_interface: false,
            eventual: &eventual,
        },
    )
    .expect("markers");
    assert_eq!(
        markers.find(MarkerKind::E2Immutable).map(ToString::to_string),
        Some("@E2Immutable(after = \"frozen\")".to_string())
    );
}

#[test]
fn eventual_immutability_on_a_parameter_is_rejected() {
    let store = frozen(
        "com.example.Freezable.copy(com.example.Freezable)#0",
        EntityKind::Parameter,
        &[
            (Property::Immutable, MultiLevel::EVENTUALLY_E2IMMUTABLE.into()),
            (Property::Modified, Value::FALSE),
            (Property::Independent, MultiLevel::INDEPENDENT.into()),
        ],
    );
    let error = derive_parameter_markers(&store, &parameter_facts()).expect_err("placement");
    assert!(matches!(
        error,
        EngineError::IllegalEventualPlacement {
            kind: EntityKind::Parameter,
            ..
        }
    ));
}

#[test]
fn generic_parameters_are_invariant_without_wildcards() {
    let store = TypeStore::with_platform_types();
    let target = ParameterizedType::nominal("java.util.List")
        .with_parameters(vec![ParameterizedType::nominal("java.lang.Number")]);
    let source = ParameterizedType::nominal("java.util.ArrayList")
        .with_parameters(vec![ParameterizedType::nominal("java.lang.Integer")]);
    let distance = is_assignable_from(&store, &target, &source, Mode::Covariant).expect("distance");
    assert_eq!(distance, Distance::NotAssignable);

    let strings = ParameterizedType::nominal("java.util.List")
        .with_parameters(vec![ParameterizedType::nominal("java.lang.String")]);
    let objects = ParameterizedType::nominal("java.util.List").with_parameters(vec![ParameterizedType::object()]);
    for (target, source) in [(&strings, &objects), (&objects, &strings)] {
        let distance = is_assignable_from(&store, target, source, Mode::Covariant).expect("distance");
        assert_eq!(distance, Distance::NotAssignable);
    }
}

#[test]
fn primitive_array_to_top_type() {
    let store = TypeStore::with_platform_types();
    let source = ParameterizedType::primitive(Primitive::Int).with_arrays(1);
    let distance =
        is_assignable_from(&store, &ParameterizedType::object(), &source, Mode::Any).expect("distance");
    assert_eq!(distance, Distance::IN_HIERARCHY);
}

#[test]
fn independent_proposals_keep_the_best_evidence() {
    let mut store = PropertyStore::new("com.example.Bag", EntityKind::Type, true, AnnotationMode::Defensive);
    store.improve(Property::Container, Value::Delayed).expect("delayed proposal");
    store.improve(Property::Container, Value::TRUE).expect("true proposal");
    assert_eq!(store.get(Property::Container), Value::TRUE);
    store.improve(Property::Container, Value::Delayed).expect("late delayed proposal");
    assert_eq!(store.get(Property::Container), Value::TRUE);
}

#[test]
fn box_of_string_substitutes_its_field_type() {
    let mut store = TypeStore::with_platform_types();
    store
        .add_declarations([TypeDecl::class("com.example.Box").with_type_parameter("T", Vec::new())])
        .expect("box");
    let formal_field = ParameterizedType::type_parameter(TypeParameterRef::of_type("com.example.Box", 0, "T"));
    let string = ParameterizedType::nominal("java.lang.String");
    let concrete = ParameterizedType::nominal("com.example.Box").with_parameters(vec![string.clone()]);

    let initial = initial_type_parameter_map(&store, &concrete).expect("initial map");
    assert_eq!(apply_translation(&formal_field, &initial), string);

    let formal_box = ParameterizedType::nominal("com.example.Box").with_parameters(vec![formal_field.clone()]);
    let forward = forward_type_parameter_map(&store, &formal_box, "com.example.Box").expect("forward map");
    assert_eq!(apply_translation(&formal_field, &forward), formal_field);
}
