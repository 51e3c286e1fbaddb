//! Run-time reflection.
//!
//! A [`MetaObject`] describes a type: its class name, base classes,
//! annotations, methods, fields and enums. All tables are sorted by name, so
//! every lookup is a binary search.
//!
//! The trait itself only exposes the raw descriptor tables. The public API
//! lives on `dyn MetaObject` and hands out lightweight index handles
//! ([`MetaMethod`], [`MetaField`], [`MetaEnum`], [`MetaAnnotation`]). A
//! handle that points nowhere is *invalid*: every accessor on it returns a
//! default value.
//!
//! Meta objects are built with [`RuntimeMetaObject`] (or
//! `#[derive(MetaType)]`) and published through a [`MetaRegistry`].
//!
//! # Example
//!
//! ```
//! use nuria_core::meta::{FieldDescriptor, MetaObject, RuntimeMetaObject};
//! use nuria_core::variant::Variant;
//!
//! struct Point { x: i32 }
//!
//! let mut meta = RuntimeMetaObject::for_type::<Point>("Point");
//! meta.add_field(
//!     FieldDescriptor::new("x", "i32", |obj| {
//!         obj.downcast_ref::<Point>().map_or(Variant::Invalid, |p| Variant::Int(p.x))
//!     }),
//! );
//! meta.finalize();
//!
//! let meta: &dyn MetaObject = &meta;
//! let field = meta.field_by_name("x");
//! assert_eq!(field.read(&Point { x: 3 }), Variant::Int(3));
//! assert!(!meta.field_by_name("y").is_valid());
//! ```

mod registry;
mod runtime;

pub use registry::{MetaObjectMap, MetaRegistry, global_meta_registry};
pub use runtime::RuntimeMetaObject;

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::callback::{Callback, CallbackKind, marshal_arguments};
use crate::error::Result;
use crate::variant::{ObjectValue, Variant, type_names};

/// The kind of a reflected method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// Called on an instance.
    #[default]
    Method,
    /// Called without an instance.
    Static,
    /// Creates a new instance, returned as [`Variant::Object`].
    Constructor,
}

/// Whether a field can be written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FieldAccess {
    /// Only a getter exists.
    #[default]
    ReadOnly,
    /// Getter and setter exist.
    ReadWrite,
}

/// Calls a reflected method. The instance is `None` for static methods and
/// constructors. Arguments are already converted to the declared types.
pub type MethodInvoker = Arc<dyn Fn(Option<&mut dyn Any>, Vec<Variant>) -> Variant + Send + Sync>;

/// Reads a field from an instance.
pub type FieldGetter = Arc<dyn Fn(&dyn Any) -> Variant + Send + Sync>;

/// Writes a field on an instance, returning `false` if the value was refused.
pub type FieldSetter = Arc<dyn Fn(&mut dyn Any, Variant) -> bool + Send + Sync>;

/// A key/value annotation attached to a class or member.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationDescriptor {
    /// Annotation key.
    pub name: String,
    /// Annotation value.
    pub value: Variant,
}

impl AnnotationDescriptor {
    /// Create an annotation.
    pub fn new(name: impl Into<String>, value: impl Into<Variant>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Describes a method.
#[derive(Clone)]
pub struct MethodDescriptor {
    /// Method name.
    pub name: String,
    /// Return type name.
    pub return_type: String,
    /// Argument type names.
    pub argument_types: Vec<String>,
    /// Argument names, parallel to `argument_types`.
    pub argument_names: Vec<String>,
    /// Method kind.
    pub kind: MethodKind,
    /// Annotations, sorted by name once finalized.
    pub annotations: Vec<AnnotationDescriptor>,
    /// The call.
    pub invoker: MethodInvoker,
    /// Optional precondition returning a `bool` variant.
    pub test: Option<MethodInvoker>,
}

impl MethodDescriptor {
    /// Create a method without arguments returning `"()"`.
    pub fn new<F>(name: impl Into<String>, kind: MethodKind, invoker: F) -> Self
    where
        F: Fn(Option<&mut dyn Any>, Vec<Variant>) -> Variant + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            return_type: type_names::VOID.to_string(),
            argument_types: Vec::new(),
            argument_names: Vec::new(),
            kind,
            annotations: Vec::new(),
            invoker: Arc::new(invoker),
            test: None,
        }
    }

    /// Set the return type.
    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.return_type = type_name.into();
        self
    }

    /// Append an argument.
    pub fn argument(mut self, type_name: impl Into<String>, name: impl Into<String>) -> Self {
        self.argument_types.push(type_name.into());
        self.argument_names.push(name.into());
        self
    }

    /// Attach an annotation.
    pub fn annotate(mut self, name: impl Into<String>, value: impl Into<Variant>) -> Self {
        self.annotations.push(AnnotationDescriptor::new(name, value));
        self
    }

    /// Attach a precondition.
    pub fn with_test<F>(mut self, test: F) -> Self
    where
        F: Fn(Option<&mut dyn Any>, Vec<Variant>) -> Variant + Send + Sync + 'static,
    {
        self.test = Some(Arc::new(test));
        self
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("return_type", &self.return_type)
            .field("argument_types", &self.argument_types)
            .field("kind", &self.kind)
            .field("has_test", &self.test.is_some())
            .finish_non_exhaustive()
    }
}

/// Describes a field.
#[derive(Clone)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: String,
    /// Declared type name. A trailing `*` marks an optional owned object.
    pub type_name: String,
    /// Annotations, sorted by name once finalized.
    pub annotations: Vec<AnnotationDescriptor>,
    /// Getter.
    pub getter: FieldGetter,
    /// Setter; `None` for read-only fields.
    pub setter: Option<FieldSetter>,
}

impl FieldDescriptor {
    /// Create a read-only field.
    pub fn new<G>(name: impl Into<String>, type_name: impl Into<String>, getter: G) -> Self
    where
        G: Fn(&dyn Any) -> Variant + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            annotations: Vec::new(),
            getter: Arc::new(getter),
            setter: None,
        }
    }

    /// Make the field writable.
    pub fn with_setter<S>(mut self, setter: S) -> Self
    where
        S: Fn(&mut dyn Any, Variant) -> bool + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    /// Attach an annotation.
    pub fn annotate(mut self, name: impl Into<String>, value: impl Into<Variant>) -> Self {
        self.annotations.push(AnnotationDescriptor::new(name, value));
        self
    }

    /// The access mode implied by the setter.
    pub fn access(&self) -> FieldAccess {
        if self.setter.is_some() {
            FieldAccess::ReadWrite
        } else {
            FieldAccess::ReadOnly
        }
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("access", &self.access())
            .finish_non_exhaustive()
    }
}

/// Describes an enum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumDescriptor {
    /// Enum name.
    pub name: String,
    /// Key/value pairs, sorted by key once finalized.
    pub elements: Vec<(String, i64)>,
    /// Annotations, sorted by name once finalized.
    pub annotations: Vec<AnnotationDescriptor>,
}

impl EnumDescriptor {
    /// Create an enum without elements.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append an element.
    pub fn element(mut self, key: impl Into<String>, value: i64) -> Self {
        self.elements.push((key.into(), value));
        self
    }

    /// Attach an annotation.
    pub fn annotate(mut self, name: impl Into<String>, value: impl Into<Variant>) -> Self {
        self.annotations.push(AnnotationDescriptor::new(name, value));
        self
    }
}

/// The reflection data of one type.
///
/// Implementations expose sorted descriptor tables; the lookup API is
/// provided on `dyn MetaObject`.
pub trait MetaObject: Send + Sync {
    /// The registered class name.
    fn class_name(&self) -> &str;

    /// The Rust type described, if any.
    fn value_type_id(&self) -> Option<TypeId>;

    /// Direct base classes, sorted.
    fn base_classes(&self) -> &[String];

    /// Class annotations, sorted by name.
    fn annotation_table(&self) -> &[AnnotationDescriptor];

    /// Methods, sorted by name and then argument count.
    fn method_table(&self) -> &[MethodDescriptor];

    /// Fields, sorted by name.
    fn field_table(&self) -> &[FieldDescriptor];

    /// Enums, sorted by name.
    fn enum_table(&self) -> &[EnumDescriptor];

    /// Whether the tables are sorted and frozen.
    fn is_finalized(&self) -> bool {
        true
    }
}

/// A Rust type with a statically known meta object.
///
/// Usually implemented with `#[derive(MetaType)]` from `nuria-macros`.
pub trait MetaType: Any + Send + Sync {
    /// The class name the type is registered under.
    const CLASS_NAME: &'static str;

    /// Build the finalized meta object of the type.
    fn meta_object() -> RuntimeMetaObject;

    /// Publish the meta object on `registry`.
    fn register_meta(registry: &MetaRegistry) -> Result<Arc<dyn MetaObject>> {
        registry.register(Self::meta_object())
    }
}

fn lower_bound<T>(table: &[T], name: &str, key: impl Fn(&T) -> &str) -> Option<usize> {
    let index = table.partition_point(|entry| key(entry) < name);
    (index < table.len() && key(&table[index]) == name).then_some(index)
}

fn upper_bound<T>(table: &[T], name: &str, key: impl Fn(&T) -> &str) -> Option<usize> {
    let end = table.partition_point(|entry| key(entry) <= name);
    (end > 0 && key(&table[end - 1]) == name).then(|| end - 1)
}

impl<'m> dyn MetaObject + 'm {
    /// Whether `name` is one of the direct base classes.
    pub fn inherits(&self, name: &str) -> bool {
        self.base_classes()
            .binary_search_by(|base| base.as_str().cmp(name))
            .is_ok()
    }

    /// Number of class annotations.
    pub fn annotation_count(&self) -> usize {
        self.annotation_table().len()
    }

    /// The class annotation at `index`.
    pub fn annotation(&self, index: usize) -> MetaAnnotation<'_> {
        MetaAnnotation::new(self.annotation_table(), index)
    }

    /// First class annotation index named `name`.
    pub fn annotation_lower_bound(&self, name: &str) -> Option<usize> {
        lower_bound(self.annotation_table(), name, |a| a.name.as_str())
    }

    /// Last class annotation index named `name`.
    pub fn annotation_upper_bound(&self, name: &str) -> Option<usize> {
        upper_bound(self.annotation_table(), name, |a| a.name.as_str())
    }

    /// The first class annotation named `name`.
    pub fn annotation_by_name(&self, name: &str) -> MetaAnnotation<'_> {
        match self.annotation_lower_bound(name) {
            Some(index) => self.annotation(index),
            None => MetaAnnotation::invalid(),
        }
    }

    /// Number of methods.
    pub fn method_count(&self) -> usize {
        self.method_table().len()
    }

    /// The method at `index`.
    pub fn method(&self, index: usize) -> MetaMethod<'_> {
        MetaMethod {
            meta: Some(self),
            index,
        }
    }

    /// First method index named `name`.
    pub fn method_lower_bound(&self, name: &str) -> Option<usize> {
        lower_bound(self.method_table(), name, |m| m.name.as_str())
    }

    /// Last method index named `name`.
    pub fn method_upper_bound(&self, name: &str) -> Option<usize> {
        upper_bound(self.method_table(), name, |m| m.name.as_str())
    }

    /// Resolve an overload.
    ///
    /// `prototype` is the method name followed by the argument type names. An
    /// overload with exactly these argument types wins; otherwise the first
    /// overload whose argument count is nearest to the prototype's.
    pub fn find_method(&self, prototype: &[&str]) -> MetaMethod<'_> {
        let Some((name, wanted)) = prototype.split_first() else {
            return MetaMethod::invalid();
        };
        let (Some(lower), Some(upper)) = (self.method_lower_bound(name), self.method_upper_bound(name))
        else {
            return MetaMethod::invalid();
        };

        let table = self.method_table();
        let exact = (lower..=upper).find(|&index| {
            let types = &table[index].argument_types;
            types.len() == wanted.len() && types.iter().zip(wanted).all(|(a, b)| a == b)
        });

        let index = exact.or_else(|| {
            (lower..=upper).min_by_key(|&index| table[index].argument_types.len().abs_diff(wanted.len()))
        });

        match index {
            Some(index) => self.method(index),
            None => MetaMethod::invalid(),
        }
    }

    /// All constructors.
    pub fn constructors(&self) -> Vec<MetaMethod<'_>> {
        (0..self.method_count())
            .map(|index| self.method(index))
            .filter(|method| method.kind() == MethodKind::Constructor)
            .collect()
    }

    /// Construct an instance with the constructor taking `args.len()`
    /// arguments (the first one, if overloaded).
    pub fn create_instance(&self, args: Vec<Variant>) -> Option<ObjectValue> {
        let constructor = self
            .constructors()
            .into_iter()
            .find(|ctor| ctor.argument_types().len() == args.len())?;
        match constructor.invoke(None, args) {
            Variant::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Number of fields.
    pub fn field_count(&self) -> usize {
        self.field_table().len()
    }

    /// The field at `index`.
    pub fn field(&self, index: usize) -> MetaField<'_> {
        MetaField {
            meta: Some(self),
            index,
        }
    }

    /// The field named `name`.
    pub fn field_by_name(&self, name: &str) -> MetaField<'_> {
        match lower_bound(self.field_table(), name, |f| f.name.as_str()) {
            Some(index) => self.field(index),
            None => MetaField::invalid(),
        }
    }

    /// Number of enums.
    pub fn enum_count(&self) -> usize {
        self.enum_table().len()
    }

    /// The enum at `index`.
    pub fn enum_at(&self, index: usize) -> MetaEnum<'_> {
        MetaEnum {
            meta: Some(self),
            index,
        }
    }

    /// The enum named `name`.
    pub fn enum_by_name(&self, name: &str) -> MetaEnum<'_> {
        match lower_bound(self.enum_table(), name, |e| e.name.as_str()) {
            Some(index) => self.enum_at(index),
            None => MetaEnum::invalid(),
        }
    }
}

impl fmt::Debug for dyn MetaObject + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaObject")
            .field("class_name", &self.class_name())
            .field("base_classes", &self.base_classes())
            .field("methods", &self.method_count())
            .field("fields", &self.field_count())
            .field("enums", &self.enum_count())
            .finish()
    }
}

/// A view of one annotation in an annotation table.
#[derive(Clone, Copy)]
pub struct MetaAnnotation<'a> {
    table: Option<&'a [AnnotationDescriptor]>,
    index: usize,
}

impl<'a> MetaAnnotation<'a> {
    fn new(table: &'a [AnnotationDescriptor], index: usize) -> Self {
        Self {
            table: Some(table),
            index,
        }
    }

    /// A handle pointing nowhere.
    pub fn invalid() -> Self {
        Self {
            table: None,
            index: 0,
        }
    }

    fn descriptor(&self) -> Option<&'a AnnotationDescriptor> {
        self.table?.get(self.index)
    }

    /// Whether the handle points to an annotation.
    pub fn is_valid(&self) -> bool {
        self.descriptor().is_some()
    }

    /// The annotation key.
    pub fn name(&self) -> &'a str {
        self.descriptor().map_or("", |a| a.name.as_str())
    }

    /// The annotation value.
    pub fn value(&self) -> Variant {
        self.descriptor().map(|a| a.value.clone()).unwrap_or_default()
    }
}

impl fmt::Debug for MetaAnnotation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaAnnotation")
            .field("name", &self.name())
            .field("value", &self.value())
            .finish()
    }
}

fn annotation_by_name<'a>(table: &'a [AnnotationDescriptor], name: &str) -> MetaAnnotation<'a> {
    match lower_bound(table, name, |a| a.name.as_str()) {
        Some(index) => MetaAnnotation::new(table, index),
        None => MetaAnnotation::invalid(),
    }
}

/// A view of one method of a [`MetaObject`].
#[derive(Clone, Copy)]
pub struct MetaMethod<'a> {
    meta: Option<&'a dyn MetaObject>,
    index: usize,
}

impl<'a> MetaMethod<'a> {
    /// A handle pointing nowhere.
    pub fn invalid() -> Self {
        Self {
            meta: None,
            index: 0,
        }
    }

    fn descriptor(&self) -> Option<&'a MethodDescriptor> {
        self.meta?.method_table().get(self.index)
    }

    /// Whether the handle points to a method.
    pub fn is_valid(&self) -> bool {
        self.descriptor().is_some()
    }

    /// The owning meta object.
    pub fn meta_object(&self) -> Option<&'a dyn MetaObject> {
        self.meta
    }

    /// Index in the method table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Method name.
    pub fn name(&self) -> &'a str {
        self.descriptor().map_or("", |m| m.name.as_str())
    }

    /// Return type name.
    pub fn return_type(&self) -> &'a str {
        self.descriptor().map_or("", |m| m.return_type.as_str())
    }

    /// Argument type names.
    pub fn argument_types(&self) -> &'a [String] {
        self.descriptor().map(|m| m.argument_types.as_slice()).unwrap_or(&[])
    }

    /// Argument names.
    pub fn argument_names(&self) -> &'a [String] {
        self.descriptor().map(|m| m.argument_names.as_slice()).unwrap_or(&[])
    }

    /// Method kind.
    pub fn kind(&self) -> MethodKind {
        self.descriptor().map(|m| m.kind).unwrap_or_default()
    }

    /// Whether a precondition is attached.
    pub fn has_test(&self) -> bool {
        self.descriptor().is_some_and(|m| m.test.is_some())
    }

    /// Number of annotations.
    pub fn annotation_count(&self) -> usize {
        self.descriptor().map_or(0, |m| m.annotations.len())
    }

    /// The annotation at `index`.
    pub fn annotation(&self, index: usize) -> MetaAnnotation<'a> {
        match self.descriptor() {
            Some(m) => MetaAnnotation::new(&m.annotations, index),
            None => MetaAnnotation::invalid(),
        }
    }

    /// The first annotation named `name`.
    pub fn annotation_by_name(&self, name: &str) -> MetaAnnotation<'a> {
        match self.descriptor() {
            Some(m) => annotation_by_name(&m.annotations, name),
            None => MetaAnnotation::invalid(),
        }
    }

    /// Invoke on `instance` (`None` for static methods and constructors).
    ///
    /// Arguments are converted to the declared types like
    /// [`Callback::invoke`] does.
    pub fn invoke(&self, instance: Option<&mut dyn Any>, args: Vec<Variant>) -> Variant {
        let Some(method) = self.descriptor() else {
            return Variant::Invalid;
        };
        if method.kind == MethodKind::Method && instance.is_none() {
            return Variant::Invalid;
        }
        let args = marshal_arguments(&method.argument_types, args);
        (method.invoker)(instance, args)
    }

    /// A callback calling this method.
    ///
    /// Instance methods need `instance` and keep it shared; static methods and
    /// constructors ignore it.
    pub fn callback(&self, instance: Option<&ObjectValue>) -> Callback {
        match self.descriptor() {
            Some(method) => make_callback(method, &method.invoker, &method.return_type, instance),
            None => Callback::invalid(),
        }
    }

    /// A callback calling this method's precondition, or an invalid callback
    /// if there is none.
    pub fn test_callback(&self, instance: Option<&ObjectValue>) -> Callback {
        match self.descriptor() {
            Some(method) => match &method.test {
                Some(test) => make_callback(method, test, type_names::BOOL, instance),
                None => Callback::invalid(),
            },
            None => Callback::invalid(),
        }
    }
}

fn make_callback(
    method: &MethodDescriptor,
    invoker: &MethodInvoker,
    return_type: &str,
    instance: Option<&ObjectValue>,
) -> Callback {
    let argument_types: Vec<&str> = method.argument_types.iter().map(String::as_str).collect();
    let invoker = invoker.clone();
    match (method.kind, instance) {
        (MethodKind::Method, Some(object)) => {
            let object = object.clone();
            Callback::dynamic(CallbackKind::MemberMethod, return_type, &argument_types, move |args| {
                object
                    .with_mut(|target| invoker(Some(target as &mut dyn Any), args))
                    .unwrap_or_default()
            })
        }
        (MethodKind::Method, None) => Callback::invalid(),
        (MethodKind::Static | MethodKind::Constructor, _) => {
            Callback::dynamic(CallbackKind::StaticMethod, return_type, &argument_types, move |args| {
                invoker(None, args)
            })
        }
    }
}

impl fmt::Debug for MetaMethod<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaMethod")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("argument_types", &self.argument_types())
            .field("return_type", &self.return_type())
            .finish()
    }
}

/// A view of one field of a [`MetaObject`].
#[derive(Clone, Copy)]
pub struct MetaField<'a> {
    meta: Option<&'a dyn MetaObject>,
    index: usize,
}

impl<'a> MetaField<'a> {
    /// A handle pointing nowhere.
    pub fn invalid() -> Self {
        Self {
            meta: None,
            index: 0,
        }
    }

    fn descriptor(&self) -> Option<&'a FieldDescriptor> {
        self.meta?.field_table().get(self.index)
    }

    /// Whether the handle points to a field.
    pub fn is_valid(&self) -> bool {
        self.descriptor().is_some()
    }

    /// The owning meta object.
    pub fn meta_object(&self) -> Option<&'a dyn MetaObject> {
        self.meta
    }

    /// Field name.
    pub fn name(&self) -> &'a str {
        self.descriptor().map_or("", |f| f.name.as_str())
    }

    /// Declared type name.
    pub fn type_name(&self) -> &'a str {
        self.descriptor().map_or("", |f| f.type_name.as_str())
    }

    /// Whether the declared type is an optional owned object (`T*`).
    pub fn is_pointer(&self) -> bool {
        self.type_name().ends_with('*')
    }

    /// The declared type with a trailing `*` removed.
    pub fn pointee_type(&self) -> &'a str {
        let type_name = self.type_name();
        type_name.strip_suffix('*').unwrap_or(type_name)
    }

    /// Access mode.
    pub fn access(&self) -> FieldAccess {
        self.descriptor().map(FieldDescriptor::access).unwrap_or_default()
    }

    /// Number of annotations.
    pub fn annotation_count(&self) -> usize {
        self.descriptor().map_or(0, |f| f.annotations.len())
    }

    /// The annotation at `index`.
    pub fn annotation(&self, index: usize) -> MetaAnnotation<'a> {
        match self.descriptor() {
            Some(f) => MetaAnnotation::new(&f.annotations, index),
            None => MetaAnnotation::invalid(),
        }
    }

    /// The first annotation named `name`.
    pub fn annotation_by_name(&self, name: &str) -> MetaAnnotation<'a> {
        match self.descriptor() {
            Some(f) => annotation_by_name(&f.annotations, name),
            None => MetaAnnotation::invalid(),
        }
    }

    /// Read the field from `instance`.
    pub fn read(&self, instance: &dyn Any) -> Variant {
        match self.descriptor() {
            Some(field) => (field.getter)(instance),
            None => Variant::Invalid,
        }
    }

    /// Write the field on `instance`. Returns `false` for read-only fields
    /// and refused values.
    pub fn write(&self, instance: &mut dyn Any, value: Variant) -> bool {
        match self.descriptor().and_then(|f| f.setter.as_ref()) {
            Some(setter) => setter(instance, value),
            None => false,
        }
    }
}

impl fmt::Debug for MetaField<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaField")
            .field("name", &self.name())
            .field("type_name", &self.type_name())
            .field("access", &self.access())
            .finish()
    }
}

/// A view of one enum of a [`MetaObject`].
#[derive(Clone, Copy)]
pub struct MetaEnum<'a> {
    meta: Option<&'a dyn MetaObject>,
    index: usize,
}

impl<'a> MetaEnum<'a> {
    /// A handle pointing nowhere.
    pub fn invalid() -> Self {
        Self {
            meta: None,
            index: 0,
        }
    }

    fn descriptor(&self) -> Option<&'a EnumDescriptor> {
        self.meta?.enum_table().get(self.index)
    }

    /// Whether the handle points to an enum.
    pub fn is_valid(&self) -> bool {
        self.descriptor().is_some()
    }

    /// Enum name.
    pub fn name(&self) -> &'a str {
        self.descriptor().map_or("", |e| e.name.as_str())
    }

    /// Number of elements.
    pub fn element_count(&self) -> usize {
        self.descriptor().map_or(0, |e| e.elements.len())
    }

    /// Key of the element at `index`.
    pub fn key(&self, index: usize) -> &'a str {
        self.descriptor()
            .and_then(|e| e.elements.get(index))
            .map_or("", |(key, _)| key.as_str())
    }

    /// Value of the element at `index`.
    pub fn value(&self, index: usize) -> i64 {
        self.descriptor()
            .and_then(|e| e.elements.get(index))
            .map_or(0, |(_, value)| *value)
    }

    /// The value of `key`.
    pub fn key_to_value(&self, key: &str) -> Option<i64> {
        let elements = &self.descriptor()?.elements;
        let index = lower_bound(elements, key, |(k, _)| k.as_str())?;
        Some(elements[index].1)
    }

    /// The first key with `value`.
    pub fn value_to_key(&self, value: i64) -> Option<&'a str> {
        self.descriptor()?
            .elements
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(key, _)| key.as_str())
    }

    /// Number of annotations.
    pub fn annotation_count(&self) -> usize {
        self.descriptor().map_or(0, |e| e.annotations.len())
    }

    /// The annotation at `index`.
    pub fn annotation(&self, index: usize) -> MetaAnnotation<'a> {
        match self.descriptor() {
            Some(e) => MetaAnnotation::new(&e.annotations, index),
            None => MetaAnnotation::invalid(),
        }
    }

    /// The first annotation named `name`.
    pub fn annotation_by_name(&self, name: &str) -> MetaAnnotation<'a> {
        match self.descriptor() {
            Some(e) => annotation_by_name(&e.annotations, name),
            None => MetaAnnotation::invalid(),
        }
    }
}

impl fmt::Debug for MetaEnum<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaEnum")
            .field("name", &self.name())
            .field("elements", &self.element_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Calculator {
        total: i64,
        label: String,
    }

    fn calculator_meta() -> RuntimeMetaObject {
        let mut meta = RuntimeMetaObject::for_type::<Calculator>("Calculator");
        meta.add_base_class("QObject")
            .add_base_class("Accumulator")
            .add_annotation("version", 2)
            .add_annotation("author", "nuria")
            .add_annotation("tag", "b")
            .add_annotation("tag", "a");

        meta.add_method(
            MethodDescriptor::new("add", MethodKind::Method, |obj, args| {
                let Some(calc) = obj.and_then(|o| o.downcast_mut::<Calculator>()) else {
                    return Variant::Invalid;
                };
                calc.total += args[0].to_i64().unwrap_or_default();
                Variant::LongLong(calc.total)
            })
            .returns("i64")
            .argument("i64", "amount"),
        );
        meta.add_method(
            MethodDescriptor::new("add", MethodKind::Method, |obj, args| {
                let Some(calc) = obj.and_then(|o| o.downcast_mut::<Calculator>()) else {
                    return Variant::Invalid;
                };
                calc.label.push_str(args[0].as_str().unwrap_or_default());
                Variant::String(calc.label.clone())
            })
            .returns("String")
            .argument("String", "text")
            .annotate("overload", true),
        );
        meta.add_method(
            MethodDescriptor::new("add", MethodKind::Static, |_, args| {
                Variant::LongLong(args.iter().filter_map(Variant::to_i64).sum())
            })
            .returns("i64")
            .argument("i64", "a")
            .argument("i64", "b"),
        );
        meta.add_method(
            MethodDescriptor::new("Calculator", MethodKind::Constructor, |_, args| {
                let calc = Calculator {
                    total: args[0].to_i64().unwrap_or_default(),
                    label: String::new(),
                };
                Variant::Object(ObjectValue::new("Calculator", calc))
            })
            .returns("Calculator")
            .argument("i64", "total"),
        );
        meta.add_method(
            MethodDescriptor::new("reset", MethodKind::Method, |obj, _| {
                if let Some(calc) = obj.and_then(|o| o.downcast_mut::<Calculator>()) {
                    calc.total = 0;
                }
                Variant::Invalid
            })
            .with_test(|obj, _| {
                let positive = obj
                    .and_then(|o| o.downcast_mut::<Calculator>())
                    .is_some_and(|c| c.total > 0);
                Variant::Bool(positive)
            }),
        );

        meta.add_field(
            FieldDescriptor::new("total", "i64", |obj| {
                obj.downcast_ref::<Calculator>()
                    .map_or(Variant::Invalid, |c| Variant::LongLong(c.total))
            })
            .with_setter(|obj, value| match (obj.downcast_mut::<Calculator>(), value.to_i64()) {
                (Some(c), Some(v)) => {
                    c.total = v;
                    true
                }
                _ => false,
            }),
        );
        meta.add_field(
            FieldDescriptor::new("label", "String", |obj| {
                obj.downcast_ref::<Calculator>()
                    .map_or(Variant::Invalid, |c| Variant::String(c.label.clone()))
            })
            .annotate("display", "Label"),
        );

        meta.add_enum(
            EnumDescriptor::new("Mode")
                .element("Sum", 1)
                .element("Product", 2)
                .element("Average", 3)
                .annotate("flags", false),
        );
        meta.finalize();
        meta
    }

    #[test]
    fn test_bounds() {
        let runtime = calculator_meta();
        let meta: &dyn MetaObject = &runtime;

        let lower = meta.method_lower_bound("add").unwrap();
        let upper = meta.method_upper_bound("add").unwrap();
        assert!(lower <= upper);
        assert_eq!(upper - lower + 1, 3);
        for index in lower..=upper {
            assert_eq!(meta.method(index).name(), "add");
        }
        assert_eq!(meta.method_lower_bound("missing"), None);
        assert_eq!(meta.method_upper_bound("missing"), None);

        let lower = meta.annotation_lower_bound("tag").unwrap();
        let upper = meta.annotation_upper_bound("tag").unwrap();
        assert_eq!(upper, lower + 1);
        assert_eq!(meta.annotation(lower).name(), "tag");
        assert_eq!(meta.annotation_lower_bound("nothing"), None);
    }

    #[test]
    fn test_tables_are_sorted() {
        let runtime = calculator_meta();
        let meta: &dyn MetaObject = &runtime;

        assert_eq!(meta.base_classes(), &["Accumulator".to_string(), "QObject".to_string()]);
        let names: Vec<&str> = (0..meta.method_count()).map(|i| meta.method(i).name()).collect();
        assert_eq!(names, vec!["Calculator", "add", "add", "add", "reset"]);

        let mode = meta.enum_by_name("Mode");
        assert_eq!(mode.key(0), "Average");
        assert_eq!(mode.key(2), "Sum");
    }

    #[test]
    fn test_find_method() {
        let runtime = calculator_meta();
        let meta: &dyn MetaObject = &runtime;

        let by_string = meta.find_method(&["add", "String"]);
        assert_eq!(by_string.return_type(), "String");
        assert!(by_string.annotation_by_name("overload").value().truthiness());

        let by_int = meta.find_method(&["add", "i64"]);
        assert_eq!(by_int.return_type(), "i64");
        assert_eq!(by_int.argument_names(), &["amount".to_string()]);

        let nearest = meta.find_method(&["add", "f64", "f64", "f64"]);
        assert_eq!(nearest.kind(), MethodKind::Static);

        assert!(!meta.find_method(&["sub"]).is_valid());
        assert!(!meta.find_method(&[]).is_valid());
    }

    #[test]
    fn test_invoke_methods() {
        let runtime = calculator_meta();
        let meta: &dyn MetaObject = &runtime;
        let mut calc = Calculator::default();

        let add = meta.find_method(&["add", "i64"]);
        assert_eq!(add.invoke(Some(&mut calc), vec![Variant::from("5")]), Variant::LongLong(5));
        assert_eq!(calc.total, 5);
        assert_eq!(add.invoke(None, vec![Variant::Int(1)]), Variant::Invalid);

        let sum = meta.find_method(&["add", "i64", "i64"]);
        assert_eq!(sum.invoke(None, vec![Variant::Int(2), Variant::Int(3)]), Variant::LongLong(5));
    }

    #[test]
    fn test_method_callbacks() {
        let runtime = calculator_meta();
        let meta: &dyn MetaObject = &runtime;
        let object = ObjectValue::new("Calculator", Calculator::default());

        let add = meta.find_method(&["add", "i64"]).callback(Some(&object));
        assert_eq!(add.kind(), CallbackKind::MemberMethod);
        add.invoke(vec![Variant::Int(4)]);
        add.invoke(vec![Variant::Int(4)]);
        assert_eq!(object.downcast_clone::<Calculator>().map(|c| c.total), Some(8));

        let reset = meta.find_method(&["reset"]);
        assert!(reset.has_test());
        let test = reset.test_callback(Some(&object));
        assert_eq!(test.invoke(vec![]), Variant::Bool(true));
        reset.callback(Some(&object)).invoke(vec![]);
        assert_eq!(test.invoke(vec![]), Variant::Bool(false));

        assert!(!meta.find_method(&["add", "i64"]).callback(None).is_valid());
        assert!(!meta.find_method(&["add", "i64"]).test_callback(Some(&object)).is_valid());
    }

    #[test]
    fn test_constructor() {
        let runtime = calculator_meta();
        let meta: &dyn MetaObject = &runtime;

        let constructors = meta.constructors();
        assert_eq!(constructors.len(), 1);
        assert_eq!(constructors[0].argument_names(), &["total".to_string()]);

        let object = meta.create_instance(vec![Variant::Int(9)]).unwrap();
        assert_eq!(object.type_name(), "Calculator");
        assert_eq!(object.take_as::<Calculator>().map(|c| c.total), Some(9));
        assert!(meta.create_instance(vec![]).is_none());
    }

    #[test]
    fn test_fields() {
        let runtime = calculator_meta();
        let meta: &dyn MetaObject = &runtime;
        let mut calc = Calculator {
            total: 3,
            label: "x".to_string(),
        };

        let total = meta.field_by_name("total");
        assert_eq!(total.access(), FieldAccess::ReadWrite);
        assert_eq!(total.read(&calc), Variant::LongLong(3));
        assert!(total.write(&mut calc, Variant::from("12")));
        assert_eq!(calc.total, 12);
        assert!(!total.write(&mut calc, Variant::from("twelve")));

        let label = meta.field_by_name("label");
        assert_eq!(label.access(), FieldAccess::ReadOnly);
        assert!(!label.write(&mut calc, Variant::from("y")));
        assert_eq!(label.annotation_by_name("display").value(), Variant::from("Label"));
        assert!(!label.is_pointer());
    }

    #[test]
    fn test_enum_lookup() {
        let runtime = calculator_meta();
        let meta: &dyn MetaObject = &runtime;

        let mode = meta.enum_by_name("Mode");
        assert_eq!(mode.element_count(), 3);
        assert_eq!(mode.key_to_value("Product"), Some(2));
        assert_eq!(mode.value_to_key(3), Some("Average"));
        assert_eq!(mode.key_to_value("Nope"), None);
        assert_eq!(mode.annotation(0).name(), "flags");
    }

    #[test]
    fn test_invalid_handles_return_defaults() {
        let method = MetaMethod::invalid();
        assert!(!method.is_valid());
        assert_eq!(method.name(), "");
        assert!(method.argument_types().is_empty());
        assert_eq!(method.invoke(None, vec![]), Variant::Invalid);
        assert!(!method.annotation(0).is_valid());

        let field = MetaField::invalid();
        assert_eq!(field.type_name(), "");
        assert_eq!(field.read(&0i32), Variant::Invalid);
        assert!(!field.write(&mut 0i32, Variant::Int(1)));

        let enumeration = MetaEnum::invalid();
        assert_eq!(enumeration.element_count(), 0);
        assert_eq!(enumeration.value(0), 0);
        assert_eq!(enumeration.key_to_value("a"), None);

        let runtime = calculator_meta();
        let meta: &dyn MetaObject = &runtime;
        assert!(!meta.method(99).is_valid());
        assert_eq!(meta.field(99).name(), "");
        assert!(!meta.annotation_by_name("missing").is_valid());
    }

    #[test]
    fn test_pointer_fields() {
        let mut runtime = RuntimeMetaObject::new("Holder");
        runtime.add_field(FieldDescriptor::new("child", "Node*", |_| Variant::Invalid));
        runtime.finalize();
        let meta: &dyn MetaObject = &runtime;

        let child = meta.field_by_name("child");
        assert!(child.is_pointer());
        assert_eq!(child.pointee_type(), "Node");
    }

    #[test]
    fn test_inherits() {
        let runtime = calculator_meta();
        let meta: &dyn MetaObject = &runtime;
        assert!(meta.inherits("QObject"));
        assert!(!meta.inherits("Calculator"));
    }
}
