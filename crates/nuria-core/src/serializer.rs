//! Conversion between reflected objects and [`VariantMap`]s.
//!
//! The [`Serializer`] walks the fields of a [`MetaObject`]. Values of a
//! whitelisted type are stored as they are, fields whose declared type is a
//! registered meta type are recursed into (within the configured
//! [`RecursionDepth`]), and everything else goes through the
//! [`ValueConverter`]. [`Serializer::populate`] runs the same walk backwards.
//!
//! Nothing fails as a whole. Every field ends up [`Written`], [`Skipped`] or
//! [`Failed`]; failed fields are collected and can be inspected with
//! [`Serializer::failed_fields`] after each call. Nested fields are reported
//! by their dotted path, e.g. `"child.value"`.
//!
//! [`Written`]: FieldOutcome::Written
//! [`Skipped`]: FieldOutcome::Skipped
//! [`Failed`]: FieldOutcome::Failed
//!
//! # Example
//!
//! ```
//! use nuria_core::meta::{FieldDescriptor, MetaObject, RuntimeMetaObject};
//! use nuria_core::serializer::Serializer;
//! use nuria_core::variant::Variant;
//!
//! struct Point { x: i32 }
//!
//! let mut meta = RuntimeMetaObject::for_type::<Point>("Point");
//! meta.add_field(
//!     FieldDescriptor::new("x", "i32", |obj| {
//!         obj.downcast_ref::<Point>().map_or(Variant::Invalid, |p| Variant::Int(p.x))
//!     })
//!     .with_setter(|obj, value| match (obj.downcast_mut::<Point>(), value) {
//!         (Some(p), Variant::Int(x)) => {
//!             p.x = x;
//!             true
//!         }
//!         _ => false,
//!     }),
//! );
//! meta.finalize();
//!
//! let mut serializer = Serializer::new();
//! let map = serializer.serialize(&Point { x: 7 }, meta.as_meta());
//! assert_eq!(map["x"], Variant::Int(7));
//!
//! let mut point = Point { x: 0 };
//! assert!(serializer.populate(&mut point, meta.as_meta(), &map));
//! assert_eq!(point.x, 7);
//! ```

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::logging::{PerfSpan, targets};
use crate::meta::{FieldAccess, MetaField, MetaObject, MetaRegistry, global_meta_registry};
use crate::variant::{ObjectValue, Variant, VariantMap, type_names};

/// Value types stored as they are without any configuration.
pub const DEFAULT_ALLOWED_TYPES: &[&str] = &[
    type_names::BOOL,
    type_names::I32,
    type_names::U32,
    type_names::I64,
    type_names::U64,
    type_names::F32,
    type_names::F64,
    type_names::STRING,
    type_names::BYTES,
    type_names::STRING_LIST,
    type_names::LIST,
    type_names::MAP,
];

/// How deep the serializer descends into nested reflected objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RecursionDepth {
    /// Only the top-level object; nested objects are skipped.
    #[default]
    None,
    /// At most this many levels of nested objects.
    Limited(usize),
    /// No limit.
    Infinite,
}

impl RecursionDepth {
    fn budget(self) -> usize {
        match self {
            Self::None => 0,
            Self::Limited(levels) => levels,
            Self::Infinite => usize::MAX,
        }
    }
}

/// Converts values the serializer cannot store or write directly.
pub trait ValueConverter: Send + Sync {
    /// Convert `value` to the type named `target`.
    fn convert(&self, value: &Variant, target: &str) -> Option<Variant>;
}

/// The default converter, deferring to [`Variant::convert`] and therefore to
/// the converters registered on the global
/// [`ConverterRegistry`](crate::convert::ConverterRegistry).
#[derive(Debug, Clone, Copy, Default)]
pub struct VariantConverter;

impl ValueConverter for VariantConverter {
    fn convert(&self, value: &Variant, target: &str) -> Option<Variant> {
        value.convert(target)
    }
}

/// Creates the instances filled by [`Serializer::deserialize`].
pub trait InstanceCreator: Send + Sync {
    /// Create an instance of `meta`.
    ///
    /// Keys used up during construction should be removed from `data`; the
    /// remaining ones are populated afterwards.
    fn create(&self, meta: &dyn MetaObject, data: &mut VariantMap) -> Option<Box<dyn Any + Send + Sync>>;
}

/// Picks the constructor with the most arguments whose names are all keys of
/// the data, and passes it those values.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstructorInstanceCreator;

impl InstanceCreator for ConstructorInstanceCreator {
    fn create(&self, meta: &dyn MetaObject, data: &mut VariantMap) -> Option<Box<dyn Any + Send + Sync>> {
        // Reversed so that ties go to the first declared overload.
        let constructor = meta
            .constructors()
            .into_iter()
            .rev()
            .filter(|ctor| ctor.argument_names().iter().all(|name| data.contains_key(name)))
            .max_by_key(|ctor| ctor.argument_names().len())?;

        let args = constructor
            .argument_names()
            .iter()
            .filter_map(|name| data.remove(name))
            .collect();
        match constructor.invoke(None, args) {
            Variant::Object(object) => object.take(),
            _ => None,
        }
    }
}

/// Result of handling a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    /// The value was stored or written.
    Written,
    /// Nothing to do: excluded, absent, read-only, null, or out of depth.
    Skipped,
    /// The value could not be converted or was refused.
    Failed(String),
}

/// A field that failed during the last call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFailure {
    /// Dotted path of the field.
    pub field: String,
    /// What went wrong.
    pub reason: String,
}

/// Configuration for a [`Serializer`].
#[derive(Clone)]
pub struct SerializerConfig {
    /// Field names never read or written, at any depth.
    pub exclude: BTreeSet<String>,
    /// Value types stored as they are in addition to [`DEFAULT_ALLOWED_TYPES`].
    pub allowed_types: BTreeSet<String>,
    /// How deep to descend into nested objects.
    pub recursion_depth: RecursionDepth,
    /// Fallback conversion.
    pub converter: Arc<dyn ValueConverter>,
    /// Instance creation for [`Serializer::deserialize`] and nested objects.
    pub instance_creator: Arc<dyn InstanceCreator>,
    /// Where nested meta types are looked up. `None` uses the global registry.
    pub registry: Option<Arc<MetaRegistry>>,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            exclude: BTreeSet::new(),
            allowed_types: BTreeSet::new(),
            recursion_depth: RecursionDepth::default(),
            converter: Arc::new(VariantConverter),
            instance_creator: Arc::new(ConstructorInstanceCreator),
            registry: None,
        }
    }
}

impl fmt::Debug for SerializerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerConfig")
            .field("exclude", &self.exclude)
            .field("allowed_types", &self.allowed_types)
            .field("recursion_depth", &self.recursion_depth)
            .field("custom_registry", &self.registry.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Serializer`]s.
#[derive(Debug, Default)]
pub struct SerializerBuilder {
    config: SerializerConfig,
}

impl SerializerBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude the given field names.
    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    /// Store values of the given types as they are.
    pub fn allow_types<I, S>(mut self, type_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_types.extend(type_names.into_iter().map(Into::into));
        self
    }

    /// Set the recursion depth.
    pub fn recursion_depth(mut self, depth: RecursionDepth) -> Self {
        self.config.recursion_depth = depth;
        self
    }

    /// Set the fallback converter.
    pub fn converter(mut self, converter: impl ValueConverter + 'static) -> Self {
        self.config.converter = Arc::new(converter);
        self
    }

    /// Set the instance creator.
    pub fn instance_creator(mut self, creator: impl InstanceCreator + 'static) -> Self {
        self.config.instance_creator = Arc::new(creator);
        self
    }

    /// Look nested meta types up in `registry` instead of the global one.
    pub fn registry(mut self, registry: Arc<MetaRegistry>) -> Self {
        self.config.registry = Some(registry);
        self
    }

    /// Build the serializer.
    pub fn build(self) -> Serializer {
        Serializer::with_config(self.config)
    }
}

/// Converts objects to and from variant maps.
///
/// A serializer keeps the failures of its last call, so it is used through
/// `&mut self`; give each thread its own instance.
#[derive(Debug, Default)]
pub struct Serializer {
    config: SerializerConfig,
    failures: Vec<FieldFailure>,
}

impl Serializer {
    /// A serializer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// A serializer with the given configuration.
    pub fn with_config(config: SerializerConfig) -> Self {
        Self {
            config,
            failures: Vec::new(),
        }
    }

    /// Start building a serializer.
    pub fn builder() -> SerializerBuilder {
        SerializerBuilder::new()
    }

    /// The active configuration.
    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    /// Paths of the fields that failed during the last call.
    pub fn failed_fields(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.field.as_str()).collect()
    }

    /// Failures of the last call, with reasons.
    pub fn failures(&self) -> &[FieldFailure] {
        &self.failures
    }

    fn registry(&self) -> &MetaRegistry {
        self.config.registry.as_deref().unwrap_or_else(|| global_meta_registry())
    }

    /// Read every field of `object` into a map.
    #[tracing::instrument(skip_all, target = "nuria_core::serializer", level = "debug", fields(class_name = meta.class_name()))]
    pub fn serialize(&mut self, object: &dyn Any, meta: &dyn MetaObject) -> VariantMap {
        let _perf = PerfSpan::new("serialize");
        self.failures.clear();
        let map = self.serialize_at(object, meta, self.config.recursion_depth.budget(), "");
        self.report("serialize", meta);
        map
    }

    /// Write the values of `data` into the fields of `object`.
    ///
    /// Returns `false` if any field failed; all other fields are still written.
    #[tracing::instrument(skip_all, target = "nuria_core::serializer", level = "debug", fields(class_name = meta.class_name()))]
    pub fn populate(&mut self, object: &mut dyn Any, meta: &dyn MetaObject, data: &VariantMap) -> bool {
        self.failures.clear();
        self.populate_at(object, meta, data, self.config.recursion_depth.budget(), "");
        self.report("populate", meta);
        self.failures.is_empty()
    }

    /// Create an instance of `meta` and populate it from `data`.
    ///
    /// Returns `None` only if no instance could be created; field failures
    /// are reported through [`failed_fields`](Self::failed_fields).
    #[tracing::instrument(skip_all, target = "nuria_core::serializer", level = "debug", fields(class_name = meta.class_name()))]
    pub fn deserialize(&mut self, data: &VariantMap, meta: &dyn MetaObject) -> Option<Box<dyn Any + Send + Sync>> {
        let _perf = PerfSpan::new("deserialize");
        self.failures.clear();
        let instance = self.deserialize_at(data, meta, self.config.recursion_depth.budget(), "");
        if instance.is_none() {
            tracing::debug!(target: targets::SERIALIZER, class_name = meta.class_name(), "no instance created");
        }
        self.report("deserialize", meta);
        instance
    }

    /// Serialize a value whose type is registered with the serializer's registry.
    pub fn serialize_value<T: Any>(&mut self, value: &T) -> Option<VariantMap> {
        let meta = self.registry().by_type::<T>()?;
        Some(self.serialize(value, meta.as_ref()))
    }

    /// Deserialize a value whose type is registered with the serializer's registry.
    pub fn deserialize_value<T: Any>(&mut self, data: &VariantMap) -> Option<T> {
        let meta = self.registry().by_type::<T>()?;
        let instance = self.deserialize(data, meta.as_ref())?;
        let instance: Box<dyn Any> = instance;
        instance.downcast::<T>().ok().map(|value| *value)
    }

    fn report(&self, operation: &str, meta: &dyn MetaObject) {
        if !self.failures.is_empty() {
            tracing::debug!(
                target: targets::SERIALIZER,
                operation,
                class_name = meta.class_name(),
                failed = ?self.failed_fields(),
                "fields failed"
            );
        }
    }

    fn is_excluded(&self, field: &MetaField<'_>) -> bool {
        self.config.exclude.contains(field.name())
    }

    fn is_storable(&self, value: &Variant) -> bool {
        let type_name = value.type_name();
        DEFAULT_ALLOWED_TYPES.contains(&type_name) || self.config.allowed_types.contains(type_name)
    }

    fn record(&mut self, path: String, outcome: FieldOutcome) {
        match outcome {
            FieldOutcome::Written => {
                tracing::trace!(target: targets::SERIALIZER, field = %path, "written");
            }
            FieldOutcome::Skipped => {
                tracing::trace!(target: targets::SERIALIZER, field = %path, "skipped");
            }
            FieldOutcome::Failed(reason) => {
                tracing::trace!(target: targets::SERIALIZER, field = %path, %reason, "failed");
                self.failures.push(FieldFailure { field: path, reason });
            }
        }
    }

    fn serialize_at(&mut self, object: &dyn Any, meta: &dyn MetaObject, depth: usize, prefix: &str) -> VariantMap {
        let mut map = VariantMap::new();
        for index in 0..meta.field_count() {
            let field = meta.field(index);
            if self.is_excluded(&field) {
                continue;
            }
            let path = join_path(prefix, field.name());
            let outcome = match self.serialize_field(object, &field, depth, &path) {
                Ok(value) => {
                    map.insert(field.name().to_string(), value);
                    FieldOutcome::Written
                }
                Err(outcome) => outcome,
            };
            self.record(path, outcome);
        }
        map
    }

    /// The value to store for `field`, or why there is none.
    fn serialize_field(
        &mut self,
        object: &dyn Any,
        field: &MetaField<'_>,
        depth: usize,
        path: &str,
    ) -> Result<Variant, FieldOutcome> {
        let value = field.read(object);
        if self.is_storable(&value) {
            return Ok(value);
        }

        if let Some(nested_meta) = self.registry().by_name(field.pointee_type()) {
            let nested = match &value {
                Variant::Object(nested) => nested,
                Variant::Invalid => return Err(FieldOutcome::Skipped),
                other => {
                    return Err(FieldOutcome::Failed(format!(
                        "expected a {} object, found {}",
                        nested_meta.class_name(),
                        other.type_name()
                    )));
                }
            };
            if depth == 0 {
                return Err(FieldOutcome::Skipped);
            }
            // Moved out for the recursion so the slot is not locked while
            // nested getters run.
            let Some(inner) = nested.take() else {
                return Err(FieldOutcome::Failed("object was moved out".to_string()));
            };
            let map = self.serialize_at(&*inner as &dyn Any, nested_meta.as_ref(), depth - 1, path);
            nested.restore(inner);
            return Ok(Variant::Map(map));
        }

        self.config
            .converter
            .convert(&value, type_names::STRING)
            .ok_or_else(|| FieldOutcome::Failed(format!("cannot convert {} to String", value.type_name())))
    }

    fn populate_at(&mut self, object: &mut dyn Any, meta: &dyn MetaObject, data: &VariantMap, depth: usize, prefix: &str) {
        for index in 0..meta.field_count() {
            let field = meta.field(index);
            if self.is_excluded(&field) {
                continue;
            }
            let path = join_path(prefix, field.name());
            let outcome = self.populate_field(object, &field, data, depth, &path);
            self.record(path, outcome);
        }
    }

    fn populate_field(
        &mut self,
        object: &mut dyn Any,
        field: &MetaField<'_>,
        data: &VariantMap,
        depth: usize,
        path: &str,
    ) -> FieldOutcome {
        let Some(value) = data.get(field.name()) else {
            return FieldOutcome::Skipped;
        };
        if field.access() == FieldAccess::ReadOnly {
            return FieldOutcome::Skipped;
        }
        let same_type = match value {
            Variant::Object(nested) if field.is_pointer() => nested.type_name() == field.pointee_type(),
            other => other.type_name() == field.type_name(),
        };
        if same_type {
            return write_field(field, object, value.clone());
        }

        if let Variant::Map(nested_data) = value {
            if let Some(nested_meta) = self.registry().by_name(field.pointee_type()) {
                if depth == 0 {
                    return FieldOutcome::Skipped;
                }
                let Some(instance) = self.deserialize_at(nested_data, nested_meta.as_ref(), depth - 1, path) else {
                    return FieldOutcome::Failed(format!("cannot create an instance of {}", nested_meta.class_name()));
                };
                let nested = ObjectValue::from_boxed(nested_meta.class_name(), instance);
                return write_field(field, object, Variant::Object(nested));
            }
        }

        match self.config.converter.convert(value, field.type_name()) {
            Some(converted) => write_field(field, object, converted),
            None => FieldOutcome::Failed(format!(
                "cannot convert {} to {}",
                value.type_name(),
                field.type_name()
            )),
        }
    }

    fn deserialize_at(
        &mut self,
        data: &VariantMap,
        meta: &dyn MetaObject,
        depth: usize,
        prefix: &str,
    ) -> Option<Box<dyn Any + Send + Sync>> {
        let mut remaining = data.clone();
        let creator = self.config.instance_creator.clone();
        let mut instance = creator.create(meta, &mut remaining)?;
        self.populate_at(instance.as_mut() as &mut dyn Any, meta, &remaining, depth, prefix);
        Some(instance)
    }
}

fn write_field(field: &MetaField<'_>, object: &mut dyn Any, value: Variant) -> FieldOutcome {
    if field.write(object, value) {
        FieldOutcome::Written
    } else {
        FieldOutcome::Failed("value refused by setter".to_string())
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{FieldDescriptor, MethodDescriptor, MethodKind, RuntimeMetaObject};
    use crate::variant::VariantValue;

    fn scalar<T: Any, V: VariantValue + Clone>(name: &str, get: fn(&T) -> &V, get_mut: fn(&mut T) -> &mut V) -> FieldDescriptor {
        FieldDescriptor::new(name, V::TYPE_NAME, move |obj| {
            obj.downcast_ref::<T>()
                .map_or(Variant::Invalid, |o| get(o).clone().into_variant())
        })
        .with_setter(move |obj, value| match (obj.downcast_mut::<T>(), V::from_variant(&value)) {
            (Some(o), Some(v)) => {
                *get_mut(o) = v;
                true
            }
            _ => false,
        })
    }

    fn default_constructor<T: Any + Default + Send + Sync>(name: &'static str) -> MethodDescriptor {
        MethodDescriptor::new(name, MethodKind::Constructor, move |_, _| {
            Variant::Object(ObjectValue::new(name, T::default()))
        })
        .returns(name)
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Simple {
        digit: i32,
        string: String,
        number: f32,
        boolean: bool,
    }

    fn simple_meta() -> RuntimeMetaObject {
        let mut meta = RuntimeMetaObject::for_type::<Simple>("Simple");
        meta.add_method(default_constructor::<Simple>("Simple"))
            .add_field(scalar::<Simple, _>("digit", |s| &s.digit, |s| &mut s.digit))
            .add_field(scalar::<Simple, _>("string", |s| &s.string, |s| &mut s.string))
            .add_field(scalar::<Simple, _>("number", |s| &s.number, |s| &mut s.number))
            .add_field(scalar::<Simple, _>("boolean", |s| &s.boolean, |s| &mut s.boolean));
        meta.finalize();
        meta
    }

    fn sample() -> Simple {
        Simple {
            digit: 123,
            string: "hello".to_string(),
            number: 12.34,
            boolean: true,
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Node {
        value: i32,
        child: Option<Box<Node>>,
    }

    impl Node {
        fn chain(values: &[i32]) -> Option<Box<Node>> {
            let (first, rest) = values.split_first()?;
            Some(Box::new(Node {
                value: *first,
                child: Node::chain(rest),
            }))
        }

        fn depth(&self) -> usize {
            1 + self.child.as_ref().map_or(0, |c| c.depth())
        }
    }

    fn node_registry() -> Arc<MetaRegistry> {
        let mut meta = RuntimeMetaObject::for_type::<Node>("Node");
        meta.add_method(default_constructor::<Node>("Node"))
            .add_field(scalar::<Node, _>("value", |n| &n.value, |n| &mut n.value))
            .add_field(
                FieldDescriptor::new("child", "Node*", |obj| {
                    match obj.downcast_ref::<Node>().and_then(|n| n.child.as_deref()) {
                        Some(child) => Variant::Object(ObjectValue::new("Node", child.clone())),
                        None => Variant::Invalid,
                    }
                })
                .with_setter(|obj, value| {
                    let Some(node) = obj.downcast_mut::<Node>() else {
                        return false;
                    };
                    match value {
                        Variant::Object(object) => match object.take_as::<Node>() {
                            Some(child) => {
                                node.child = Some(Box::new(child));
                                true
                            }
                            None => false,
                        },
                        Variant::Invalid => {
                            node.child = None;
                            true
                        }
                        _ => false,
                    }
                }),
            );
        meta.finalize();

        let registry = Arc::new(MetaRegistry::new());
        registry.register(meta).unwrap();
        registry
    }

    fn node_serializer(registry: &Arc<MetaRegistry>, depth: RecursionDepth) -> Serializer {
        Serializer::builder()
            .registry(registry.clone())
            .recursion_depth(depth)
            .build()
    }

    #[test]
    fn test_serialize_simple() {
        let meta = simple_meta();
        let mut serializer = Serializer::new();
        let map = serializer.serialize(&sample(), meta.as_meta());

        let mut expected = VariantMap::new();
        expected.insert("digit".into(), Variant::Int(123));
        expected.insert("string".into(), Variant::from("hello"));
        expected.insert("number".into(), Variant::Float(12.34));
        expected.insert("boolean".into(), Variant::Bool(true));
        assert_eq!(map, expected);
        assert!(serializer.failed_fields().is_empty());
    }

    #[test]
    fn test_populate_simple() {
        let meta = simple_meta();
        let mut serializer = Serializer::new();
        let map = serializer.serialize(&sample(), meta.as_meta());

        let mut target = Simple::default();
        assert!(serializer.populate(&mut target, meta.as_meta(), &map));
        assert_eq!(target, sample());
    }

    #[test]
    fn test_exclude() {
        let meta = simple_meta();
        let mut serializer = Serializer::builder().exclude(["number", "boolean"]).build();
        let map = serializer.serialize(&sample(), meta.as_meta());
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["digit", "string"]);

        let restored = serializer.deserialize(&map, meta.as_meta()).unwrap();
        let restored = (restored as Box<dyn Any>).downcast::<Simple>().unwrap();
        assert_eq!(restored.digit, 123);
        assert_eq!(restored.string, "hello");
        assert_eq!(restored.number, 0.0);
        assert!(!restored.boolean);
    }

    #[test]
    fn test_populate_converts_and_reports_failures() {
        let meta = simple_meta();
        let mut data = VariantMap::new();
        data.insert("digit".into(), Variant::from("not a number"));
        data.insert("string".into(), Variant::Int(5));
        data.insert("number".into(), Variant::from("2.5"));

        let mut serializer = Serializer::new();
        let mut target = Simple::default();
        assert!(!serializer.populate(&mut target, meta.as_meta(), &data));
        assert_eq!(serializer.failed_fields(), vec!["digit"]);
        assert_eq!(target.digit, 0);
        assert_eq!(target.string, "5");
        assert_eq!(target.number, 2.5);

        // Failures are reset on every call.
        assert!(serializer.populate(&mut target, meta.as_meta(), &VariantMap::new()));
        assert!(serializer.failed_fields().is_empty());
    }

    #[test]
    fn test_read_only_fields_are_skipped_on_populate() {
        let mut meta = RuntimeMetaObject::for_type::<Simple>("Simple");
        meta.add_field(FieldDescriptor::new("digit", "i32", |obj| {
            obj.downcast_ref::<Simple>().map_or(Variant::Invalid, |s| Variant::Int(s.digit))
        }));
        meta.finalize();

        let mut data = VariantMap::new();
        data.insert("digit".into(), Variant::Int(9));

        let mut serializer = Serializer::new();
        let mut target = Simple::default();
        assert!(serializer.populate(&mut target, meta.as_meta(), &data));
        assert_eq!(target.digit, 0);
        assert_eq!(serializer.serialize(&target, meta.as_meta())["digit"], Variant::Int(0));
    }

    #[test]
    fn test_recursion_depth_none_skips_nested() {
        let registry = node_registry();
        let meta = registry.by_name("Node").unwrap();
        let root = Node::chain(&[1, 2, 3]).unwrap();

        let mut serializer = node_serializer(&registry, RecursionDepth::None);
        let map = serializer.serialize(&*root, meta.as_ref());
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["value"]);
        assert!(serializer.failed_fields().is_empty());
    }

    #[test]
    fn test_recursion_depth_limited() {
        let registry = node_registry();
        let meta = registry.by_name("Node").unwrap();
        let root = Node::chain(&[1, 2, 3, 4]).unwrap();

        let mut serializer = node_serializer(&registry, RecursionDepth::Limited(2));
        let map = serializer.serialize(&*root, meta.as_ref());

        let level1 = map["child"].as_map().unwrap();
        let level2 = level1["child"].as_map().unwrap();
        assert_eq!(level1["value"], Variant::Int(2));
        assert_eq!(level2["value"], Variant::Int(3));
        assert!(!level2.contains_key("child"));

        let mut restored = Node::default();
        assert!(serializer.populate(&mut restored, meta.as_ref(), &map));
        assert_eq!(restored.depth(), 3);
        assert_eq!(Some(Box::new(restored)), Node::chain(&[1, 2, 3]));
    }

    #[test]
    fn test_recursion_infinite_round_trip() {
        let registry = node_registry();
        let root = Node::chain(&[5, 6, 7, 8, 9]).unwrap();

        let mut serializer = node_serializer(&registry, RecursionDepth::Infinite);
        let map = serializer.serialize_value(&*root).unwrap();
        let restored: Node = serializer.deserialize_value(&map).unwrap();
        assert_eq!(restored, *root);
    }

    #[test]
    fn test_null_pointer_is_skipped() {
        let registry = node_registry();
        let mut serializer = node_serializer(&registry, RecursionDepth::Infinite);
        let map = serializer.serialize_value(&Node { value: 1, child: None }).unwrap();
        assert!(!map.contains_key("child"));
        assert!(serializer.failed_fields().is_empty());
    }

    #[test]
    fn test_nested_failures_use_dotted_paths() {
        let registry = node_registry();
        let mut child = VariantMap::new();
        child.insert("value".into(), Variant::from("x"));
        let mut data = VariantMap::new();
        data.insert("value".into(), Variant::Int(1));
        data.insert("child".into(), Variant::Map(child));

        let mut serializer = node_serializer(&registry, RecursionDepth::Infinite);
        let node: Node = serializer.deserialize_value(&data).unwrap();
        assert_eq!(serializer.failed_fields(), vec!["child.value"]);
        assert_eq!(node.value, 1);
        assert_eq!(node.child.map(|c| c.value), Some(0));
    }

    #[derive(Debug, Default)]
    struct Pair {
        left: i32,
        right: i32,
    }

    #[test]
    fn test_constructor_consumes_keys() {
        let mut meta = RuntimeMetaObject::for_type::<Pair>("Pair");
        meta.add_method(default_constructor::<Pair>("Pair"))
            .add_method(
                MethodDescriptor::new("Pair", MethodKind::Constructor, |_, args| {
                    let left = args.first().and_then(Variant::to_i64).unwrap_or_default() as i32;
                    Variant::Object(ObjectValue::new("Pair", Pair { left: left * 10, right: 0 }))
                })
                .returns("Pair")
                .argument("i32", "left"),
            )
            .add_field(scalar::<Pair, _>("left", |p| &p.left, |p| &mut p.left))
            .add_field(scalar::<Pair, _>("right", |p| &p.right, |p| &mut p.right));
        meta.finalize();

        let mut data = VariantMap::new();
        data.insert("left".into(), Variant::Int(5));
        data.insert("right".into(), Variant::Int(7));

        let mut serializer = Serializer::new();
        let pair = serializer.deserialize(&data, meta.as_meta()).unwrap();
        let pair = (pair as Box<dyn Any>).downcast::<Pair>().unwrap();
        assert_eq!(pair.left, 50);
        assert_eq!(pair.right, 7);

        data.remove("left");
        let pair = serializer.deserialize(&data, meta.as_meta()).unwrap();
        let pair = (pair as Box<dyn Any>).downcast::<Pair>().unwrap();
        assert_eq!(pair.left, 0);
        assert_eq!(pair.right, 7);
    }

    #[test]
    fn test_deserialize_without_constructor() {
        let mut meta = RuntimeMetaObject::new("Abstract");
        meta.finalize();
        let mut serializer = Serializer::new();
        assert!(serializer.deserialize(&VariantMap::new(), meta.as_meta()).is_none());
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Tag(String);

    #[derive(Debug, Default)]
    struct Tagged {
        tag: Option<Tag>,
    }

    struct TagConverter;

    impl ValueConverter for TagConverter {
        fn convert(&self, value: &Variant, target: &str) -> Option<Variant> {
            match value.as_object().and_then(|obj| obj.downcast_clone::<Tag>()) {
                Some(tag) if target == type_names::STRING => Some(Variant::String(tag.0)),
                _ => value.convert(target),
            }
        }
    }

    fn tagged_meta() -> RuntimeMetaObject {
        let mut meta = RuntimeMetaObject::for_type::<Tagged>("Tagged");
        meta.add_field(FieldDescriptor::new("tag", "Tag", |obj| {
            match obj.downcast_ref::<Tagged>().and_then(|t| t.tag.clone()) {
                Some(tag) => Variant::Object(ObjectValue::new("Tag", tag)),
                None => Variant::Invalid,
            }
        }));
        meta.finalize();
        meta
    }

    #[test]
    fn test_unknown_types_need_a_converter() {
        let meta = tagged_meta();
        let value = Tagged {
            tag: Some(Tag("red".to_string())),
        };

        let mut serializer = Serializer::new();
        let map = serializer.serialize(&value, meta.as_meta());
        assert!(map.is_empty());
        assert_eq!(serializer.failed_fields(), vec!["tag"]);
        assert_eq!(serializer.failures()[0].reason, "cannot convert Tag to String");

        let mut serializer = Serializer::builder().converter(TagConverter).build();
        let map = serializer.serialize(&value, meta.as_meta());
        assert_eq!(map["tag"], Variant::from("red"));

        let mut serializer = Serializer::builder().allow_types(["Tag"]).build();
        let map = serializer.serialize(&value, meta.as_meta());
        assert_eq!(map["tag"].as_object().and_then(|o| o.downcast_clone::<Tag>()), Some(Tag("red".to_string())));
    }

    #[test]
    fn test_allowed_pointer_type_round_trip() {
        let registry = node_registry();
        let meta = registry.by_name("Node").unwrap();
        let root = Node::chain(&[1, 2]).unwrap();

        let mut serializer = Serializer::builder()
            .registry(registry.clone())
            .allow_types(["Node"])
            .build();
        let map = serializer.serialize(&*root, meta.as_ref());
        assert_eq!(map["child"].type_name(), "Node");

        let mut restored = Node::default();
        assert!(serializer.populate(&mut restored, meta.as_ref(), &map));
        assert!(serializer.failures().is_empty());
        assert_eq!(Some(Box::new(restored)), Node::chain(&[1, 2]));

        // An object of another class is still refused.
        let mut data = VariantMap::new();
        data.insert("child".into(), Variant::Object(ObjectValue::new("Other", 5)));
        assert!(!serializer.populate(&mut Node::default(), meta.as_ref(), &data));
        assert_eq!(serializer.failed_fields(), vec!["child"]);
    }

    struct Holder {
        leaf: ObjectValue,
    }

    struct Leaf {
        n: i32,
        this: Option<ObjectValue>,
    }

    #[test]
    fn test_nested_getter_can_reach_shared_object() {
        let mut holder_meta = RuntimeMetaObject::for_type::<Holder>("Holder");
        holder_meta.add_field(FieldDescriptor::new("leaf", "Leaf", |obj| {
            obj.downcast_ref::<Holder>()
                .map_or(Variant::Invalid, |h| Variant::Object(h.leaf.clone()))
        }));
        holder_meta.finalize();

        let mut leaf_meta = RuntimeMetaObject::for_type::<Leaf>("Leaf");
        leaf_meta
            .add_field(FieldDescriptor::new("n", "i32", |obj| {
                obj.downcast_ref::<Leaf>().map_or(Variant::Invalid, |l| Variant::Int(l.n))
            }))
            .add_field(FieldDescriptor::new("present", "bool", |obj| {
                let leaf = obj.downcast_ref::<Leaf>();
                match leaf.and_then(|l| l.this.as_ref()) {
                    Some(this) => Variant::Bool(!this.is_taken()),
                    None => Variant::Invalid,
                }
            }));
        leaf_meta.finalize();

        let registry = Arc::new(MetaRegistry::new());
        registry.register(holder_meta).unwrap();
        registry.register(leaf_meta).unwrap();

        let leaf = ObjectValue::new("Leaf", Leaf { n: 4, this: None });
        let this = leaf.clone();
        leaf.with_mut(|obj| {
            if let Some(l) = obj.downcast_mut::<Leaf>() {
                l.this = Some(this);
            }
        });
        let holder = Holder { leaf: leaf.clone() };

        let mut serializer = Serializer::builder()
            .registry(registry.clone())
            .recursion_depth(RecursionDepth::Limited(1))
            .build();
        let meta = registry.by_name("Holder").unwrap();
        let map = serializer.serialize(&holder, meta.as_ref());

        let nested = map["leaf"].as_map().unwrap();
        assert_eq!(nested["n"], Variant::Int(4));
        assert!(nested.contains_key("present"));
        assert!(!leaf.is_taken());

        leaf.with_mut(|obj| {
            if let Some(l) = obj.downcast_mut::<Leaf>() {
                l.this = None;
            }
        });
    }
}
