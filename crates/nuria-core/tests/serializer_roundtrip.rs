//! Round trips through the serializer with derived meta objects.

use std::sync::Arc;

use nuria_core::meta::{MetaRegistry, MetaType};
use nuria_core::serializer::{RecursionDepth, Serializer};
use nuria_core::{Variant, VariantMap};
use nuria_macros::MetaType;

#[derive(MetaType, Debug, Default, Clone, PartialEq)]
struct Simple {
    digit: i32,
    string: String,
    number: f32,
    boolean: bool,
}

#[derive(MetaType, Debug, Default, Clone, PartialEq)]
struct Link {
    label: String,

    #[meta(object, pointer)]
    next: Option<Box<Link>>,
}

#[derive(MetaType, Debug, Default, Clone, PartialEq)]
struct Document {
    title: String,

    #[meta(object)]
    author: Simple,

    #[meta(read_only)]
    revision: u32,

    attachments: Vec<u8>,
}

fn simple() -> Simple {
    Simple {
        digit: 123,
        string: "hello".to_string(),
        number: 12.34,
        boolean: true,
    }
}

fn chain(labels: &[&str]) -> Option<Box<Link>> {
    let (first, rest) = labels.split_first()?;
    Some(Box::new(Link {
        label: first.to_string(),
        next: chain(rest),
    }))
}

fn registry() -> Arc<MetaRegistry> {
    let registry = Arc::new(MetaRegistry::new());
    Simple::register_meta(&registry).unwrap();
    Link::register_meta(&registry).unwrap();
    Document::register_meta(&registry).unwrap();
    registry
}

fn with_depth(registry: &Arc<MetaRegistry>, depth: RecursionDepth) -> Serializer {
    Serializer::builder()
        .registry(registry.clone())
        .recursion_depth(depth)
        .build()
}

#[test]
fn test_simple_serialize() {
    let registry = registry();
    let mut serializer = with_depth(&registry, RecursionDepth::None);

    let map = serializer.serialize_value(&simple()).unwrap();

    let mut expected = VariantMap::new();
    expected.insert("digit".to_string(), Variant::Int(123));
    expected.insert("string".to_string(), Variant::from("hello"));
    expected.insert("number".to_string(), Variant::Float(12.34));
    expected.insert("boolean".to_string(), Variant::Bool(true));
    assert_eq!(map, expected);
}

#[test]
fn test_simple_populate() {
    let registry = registry();
    let meta = registry.by_name("Simple").unwrap();
    let mut serializer = with_depth(&registry, RecursionDepth::None);

    let map = serializer.serialize_value(&simple()).unwrap();
    let mut restored = Simple::default();
    assert!(serializer.populate(&mut restored, meta.as_ref(), &map));
    assert_eq!(restored, simple());
}

#[test]
fn test_excluded_fields_keep_defaults() {
    let registry = registry();
    let mut serializer = Serializer::builder()
        .registry(registry.clone())
        .exclude(["number", "boolean"])
        .build();

    let map = serializer.serialize_value(&simple()).unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["digit"], Variant::Int(123));
    assert_eq!(map["string"], Variant::from("hello"));

    let restored: Simple = serializer.deserialize_value(&map).unwrap();
    assert_eq!(restored.digit, 123);
    assert_eq!(restored.string, "hello");
    assert_eq!(restored.number, 0.0);
    assert!(!restored.boolean);
}

#[test]
fn test_recursion_depth_is_exact() {
    let registry = registry();
    let root = chain(&["a", "b", "c", "d"]).unwrap();

    for levels in 0..4 {
        let depth = if levels == 0 {
            RecursionDepth::None
        } else {
            RecursionDepth::Limited(levels)
        };
        let mut serializer = with_depth(&registry, depth);
        let map = serializer.serialize_value(&*root).unwrap();
        assert!(serializer.failed_fields().is_empty());

        let mut nested = 0;
        let mut current = &map;
        while let Some(next) = current.get("next").and_then(Variant::as_map) {
            nested += 1;
            current = next;
        }
        assert_eq!(nested, levels, "depth {depth:?}");
    }
}

#[test]
fn test_depth_limited_round_trip() {
    let registry = registry();
    let root = chain(&["a", "b", "c", "d"]).unwrap();

    let mut serializer = with_depth(&registry, RecursionDepth::Limited(2));
    let map = serializer.serialize_value(&*root).unwrap();
    let restored: Link = serializer.deserialize_value(&map).unwrap();

    assert_eq!(Some(Box::new(restored)), chain(&["a", "b", "c"]));
}

#[test]
fn test_infinite_round_trip() {
    let registry = registry();
    let labels: Vec<String> = (0..50).map(|i| format!("link-{i}")).collect();
    let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
    let root = chain(&labels).unwrap();

    let mut serializer = with_depth(&registry, RecursionDepth::Infinite);
    let map = serializer.serialize_value(&*root).unwrap();
    let restored: Link = serializer.deserialize_value(&map).unwrap();
    assert_eq!(restored, *root);
}

#[test]
fn test_allowed_pointer_objects_round_trip() {
    let registry = registry();
    let root = chain(&["a", "b"]).unwrap();

    let mut serializer = Serializer::builder()
        .registry(registry.clone())
        .allow_types(["Link"])
        .build();
    let map = serializer.serialize_value(&*root).unwrap();
    assert_eq!(map["next"].type_name(), "Link");

    let restored: Link = serializer.deserialize_value(&map).unwrap();
    assert!(serializer.failed_fields().is_empty());
    assert_eq!(restored, *root);
}

#[test]
fn test_value_object_fields() {
    let registry = registry();
    let document = Document {
        title: "Report".to_string(),
        author: simple(),
        revision: 7,
        attachments: vec![1, 2, 3],
    };

    let mut serializer = with_depth(&registry, RecursionDepth::Limited(1));
    let map = serializer.serialize_value(&document).unwrap();
    assert_eq!(map["revision"], Variant::UInt(7));
    assert_eq!(map["attachments"], Variant::Bytes(vec![1, 2, 3]));
    assert_eq!(map["author"].as_map().map(|m| m["digit"].clone()), Some(Variant::Int(123)));

    let restored: Document = serializer.deserialize_value(&map).unwrap();
    assert_eq!(restored.title, "Report");
    assert_eq!(restored.author, simple());
    assert_eq!(restored.attachments, vec![1, 2, 3]);
    // Read-only fields are not written back.
    assert_eq!(restored.revision, 0);
    assert!(serializer.failed_fields().is_empty());

    // Without recursion the nested object is left out entirely.
    let mut serializer = with_depth(&registry, RecursionDepth::None);
    let map = serializer.serialize_value(&document).unwrap();
    assert!(!map.contains_key("author"));
}

#[test]
fn test_partial_failure_still_populates() {
    let registry = registry();
    let meta = registry.by_name("Simple").unwrap();

    let mut data = VariantMap::new();
    data.insert("digit".to_string(), Variant::List(vec![Variant::Int(1)]));
    data.insert("string".to_string(), Variant::from("kept"));
    data.insert("number".to_string(), Variant::Int(4));

    let mut serializer = with_depth(&registry, RecursionDepth::None);
    let mut target = Simple::default();
    assert!(!serializer.populate(&mut target, meta.as_ref(), &data));
    assert_eq!(serializer.failed_fields(), vec!["digit"]);
    assert_eq!(target.string, "kept");
    assert_eq!(target.number, 4.0);
}
