//! Integration tests for the #[derive(MetaType)] macro.

use std::any::TypeId;

use nuria_core::meta::{FieldAccess, MetaObject, MetaRegistry, MetaType, MethodKind};
use nuria_core::{MetaError, NuriaError, ObjectValue, Variant};
use nuria_macros::MetaType;

#[derive(MetaType, Debug, Default, Clone, PartialEq)]
struct Simple {
    digit: i32,
    string: String,
    number: f32,
    boolean: bool,
}

#[derive(MetaType, Debug, Default, Clone, PartialEq)]
#[meta(name = "Profile", base = "Entity", base = "Auditable")]
#[meta(annotate(key = "table", value = "profiles"), annotate(key = "version", value = 2))]
struct UserProfile {
    #[meta(rename = "id")]
    identifier: u64,

    #[meta(read_only)]
    created: String,

    #[meta(annotate(key = "max_length", value = 64))]
    nickname: String,

    #[meta(skip)]
    #[allow(dead_code)]
    cache: Vec<u8>,

    tags: Vec<String>,
}

#[derive(MetaType, Debug, Default, Clone, PartialEq)]
struct Style {
    color: String,
}

#[derive(MetaType, Debug, Default, Clone, PartialEq)]
struct Widget {
    width: i32,

    #[meta(object)]
    style: Style,

    #[meta(object, pointer)]
    next: Option<Box<Widget>>,
}

#[derive(MetaType, Debug, Clone, PartialEq)]
#[meta(no_constructor)]
struct Handle {
    raw: i64,
}

#[test]
fn test_class_name_and_type() {
    assert_eq!(Simple::CLASS_NAME, "Simple");
    assert_eq!(UserProfile::CLASS_NAME, "Profile");

    let meta = Simple::meta_object();
    let meta = meta.as_meta();
    assert_eq!(meta.class_name(), "Simple");
    assert_eq!(meta.value_type_id(), Some(TypeId::of::<Simple>()));
    assert!(meta.is_finalized());
}

#[test]
fn test_fields_are_sorted_and_typed() {
    let meta = Simple::meta_object();
    let meta = meta.as_meta();

    let fields: Vec<(&str, &str)> = (0..meta.field_count())
        .map(|i| (meta.field(i).name(), meta.field(i).type_name()))
        .collect();
    assert_eq!(
        fields,
        vec![("boolean", "bool"), ("digit", "i32"), ("number", "f32"), ("string", "String")]
    );
    assert!(
        (0..meta.field_count()).all(|i| meta.field(i).access() == FieldAccess::ReadWrite)
    );
}

#[test]
fn test_field_read_write() {
    let meta = Simple::meta_object();
    let meta = meta.as_meta();
    let mut value = Simple::default();

    let digit = meta.field_by_name("digit");
    assert!(digit.write(&mut value, Variant::Int(42)));
    assert_eq!(digit.read(&value), Variant::Int(42));

    // Values are converted to the field type.
    assert!(digit.write(&mut value, Variant::from("17")));
    assert_eq!(value.digit, 17);

    assert!(!digit.write(&mut value, Variant::from("seventeen")));
    assert_eq!(value.digit, 17);

    // Reading from the wrong type yields an invalid variant.
    assert_eq!(digit.read(&Style::default()), Variant::Invalid);
}

#[test]
fn test_struct_attributes() {
    let meta = UserProfile::meta_object();
    let meta = meta.as_meta();

    assert_eq!(meta.base_classes(), &["Auditable".to_string(), "Entity".to_string()]);
    assert!(meta.inherits("Entity"));
    assert_eq!(meta.annotation_by_name("table").value(), Variant::from("profiles"));
    assert_eq!(meta.annotation_by_name("version").value(), Variant::Int(2));
}

#[test]
fn test_field_attributes() {
    let meta = UserProfile::meta_object();
    let meta = meta.as_meta();

    assert!(meta.field_by_name("id").is_valid());
    assert!(!meta.field_by_name("identifier").is_valid());
    assert!(!meta.field_by_name("cache").is_valid());
    assert_eq!(meta.field_by_name("tags").type_name(), "StringList");

    let created = meta.field_by_name("created");
    assert_eq!(created.access(), FieldAccess::ReadOnly);
    let mut profile = UserProfile::default();
    assert!(!created.write(&mut profile, Variant::from("today")));

    let nickname = meta.field_by_name("nickname");
    assert_eq!(nickname.annotation_by_name("max_length").value(), Variant::Int(64));
}

#[test]
fn test_object_and_pointer_fields() {
    let meta = Widget::meta_object();
    let meta = meta.as_meta();

    let style = meta.field_by_name("style");
    assert_eq!(style.type_name(), "Style");
    assert!(!style.is_pointer());

    let next = meta.field_by_name("next");
    assert_eq!(next.type_name(), "Widget*");
    assert!(next.is_pointer());
    assert_eq!(next.pointee_type(), "Widget");

    let mut widget = Widget::default();
    assert_eq!(next.read(&widget), Variant::Invalid);

    let child = Widget {
        width: 3,
        ..Default::default()
    };
    assert!(next.write(&mut widget, Variant::Object(ObjectValue::new("Widget", child.clone()))));
    assert_eq!(widget.next.as_deref(), Some(&child));

    let read = next.read(&widget);
    assert_eq!(read.as_object().and_then(|o| o.downcast_clone::<Widget>()), Some(child));

    assert!(next.write(&mut widget, Variant::Invalid));
    assert!(widget.next.is_none());

    let red = Style {
        color: "red".to_string(),
    };
    assert!(style.write(&mut widget, Variant::Object(ObjectValue::new("Style", red.clone()))));
    assert_eq!(widget.style, red);
    assert!(!style.write(&mut widget, Variant::Int(1)));
}

#[test]
fn test_constructor() {
    let meta = Simple::meta_object();
    let meta = meta.as_meta();

    let constructors = meta.constructors();
    assert_eq!(constructors.len(), 1);
    assert_eq!(constructors[0].kind(), MethodKind::Constructor);
    assert_eq!(constructors[0].return_type(), "Simple");

    let object = meta.create_instance(vec![]).unwrap();
    assert_eq!(object.take_as::<Simple>(), Some(Simple::default()));

    let handle = Handle::meta_object();
    assert!(handle.as_meta().constructors().is_empty());
    assert!(handle.as_meta().create_instance(vec![]).is_none());
    assert_eq!(Handle { raw: 1 }.raw, 1);
}

#[test]
fn test_register_meta() {
    let registry = MetaRegistry::new();
    let meta = Widget::register_meta(&registry).unwrap();
    assert_eq!(meta.class_name(), "Widget");
    assert!(registry.by_type::<Widget>().is_some());

    assert_eq!(
        Widget::register_meta(&registry).unwrap_err(),
        NuriaError::Meta(MetaError::AlreadyRegistered {
            class_name: "Widget".to_string()
        })
    );

    let object = registry.create_instance("Widget", vec![]).unwrap();
    assert_eq!(object.take_as::<Widget>(), Some(Widget::default()));
}
