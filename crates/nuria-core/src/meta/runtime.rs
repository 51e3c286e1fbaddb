//! A [`MetaObject`] assembled at run time.

use std::any::{Any, TypeId};

use super::{AnnotationDescriptor, EnumDescriptor, FieldDescriptor, MetaObject, MethodDescriptor};
use crate::logging::targets;
use crate::variant::Variant;

/// A meta object built through builder calls and then frozen.
///
/// The lifecycle is: construct, populate with the `add_*` methods,
/// [`finalize`](Self::finalize), register. `finalize` sorts every table; once
/// finalized, further `add_*` calls are ignored with a warning.
#[derive(Debug, Clone)]
pub struct RuntimeMetaObject {
    class_name: String,
    type_id: Option<TypeId>,
    base_classes: Vec<String>,
    annotations: Vec<AnnotationDescriptor>,
    methods: Vec<MethodDescriptor>,
    fields: Vec<FieldDescriptor>,
    enums: Vec<EnumDescriptor>,
    finalized: bool,
}

impl RuntimeMetaObject {
    /// An empty meta object not tied to a Rust type.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            type_id: None,
            base_classes: Vec::new(),
            annotations: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            enums: Vec::new(),
            finalized: false,
        }
    }

    /// An empty meta object describing `T`.
    pub fn for_type<T: Any>(class_name: impl Into<String>) -> Self {
        let mut meta = Self::new(class_name);
        meta.type_id = Some(TypeId::of::<T>());
        meta
    }

    fn accepts_changes(&self, what: &str) -> bool {
        if self.finalized {
            tracing::warn!(
                target: targets::META,
                class_name = %self.class_name,
                what,
                "meta object is finalized, ignoring change"
            );
        }
        !self.finalized
    }

    /// Add a direct base class.
    pub fn add_base_class(&mut self, name: impl Into<String>) -> &mut Self {
        if self.accepts_changes("base class") {
            self.base_classes.push(name.into());
        }
        self
    }

    /// Add a class annotation.
    pub fn add_annotation(&mut self, name: impl Into<String>, value: impl Into<Variant>) -> &mut Self {
        if self.accepts_changes("annotation") {
            self.annotations.push(AnnotationDescriptor::new(name, value));
        }
        self
    }

    /// Add a method.
    pub fn add_method(&mut self, method: MethodDescriptor) -> &mut Self {
        if self.accepts_changes("method") {
            self.methods.push(method);
        }
        self
    }

    /// Add a field.
    pub fn add_field(&mut self, field: FieldDescriptor) -> &mut Self {
        if self.accepts_changes("field") {
            self.fields.push(field);
        }
        self
    }

    /// Add an enum.
    pub fn add_enum(&mut self, enumeration: EnumDescriptor) -> &mut Self {
        if self.accepts_changes("enum") {
            self.enums.push(enumeration);
        }
        self
    }

    /// Sort every table and freeze the object. Calling it again is a no-op.
    pub fn finalize(&mut self) -> &mut Self {
        if self.finalized {
            return self;
        }

        self.base_classes.sort();
        self.base_classes.dedup();
        sort_annotations(&mut self.annotations);

        // Stable, so overloads of equal arity keep their insertion order.
        self.methods
            .sort_by(|a, b| a.name.cmp(&b.name).then(a.argument_types.len().cmp(&b.argument_types.len())));
        for method in &mut self.methods {
            sort_annotations(&mut method.annotations);
        }

        self.fields.sort_by(|a, b| a.name.cmp(&b.name));
        for field in &mut self.fields {
            sort_annotations(&mut field.annotations);
        }

        self.enums.sort_by(|a, b| a.name.cmp(&b.name));
        for enumeration in &mut self.enums {
            enumeration.elements.sort_by(|a, b| a.0.cmp(&b.0));
            sort_annotations(&mut enumeration.annotations);
        }

        self.finalized = true;
        tracing::debug!(
            target: targets::META,
            class_name = %self.class_name,
            methods = self.methods.len(),
            fields = self.fields.len(),
            enums = self.enums.len(),
            "finalized meta object"
        );
        self
    }

    /// View as a `dyn MetaObject` to reach the lookup API.
    pub fn as_meta(&self) -> &dyn MetaObject {
        self
    }
}

fn sort_annotations(annotations: &mut [AnnotationDescriptor]) {
    annotations.sort_by(|a, b| a.name.cmp(&b.name));
}

impl MetaObject for RuntimeMetaObject {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn value_type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    fn base_classes(&self) -> &[String] {
        &self.base_classes
    }

    fn annotation_table(&self) -> &[AnnotationDescriptor] {
        &self.annotations
    }

    fn method_table(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    fn field_table(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    fn enum_table(&self) -> &[EnumDescriptor] {
        &self.enums
    }

    fn is_finalized(&self) -> bool {
        self.finalized
    }
}
