//! The registry of published meta objects.

use std::any::{Any, TypeId};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use super::MetaObject;
use crate::error::{MetaError, Result};
use crate::logging::targets;
use crate::variant::{ObjectValue, Variant};

/// Map of class name to meta object, as returned by reverse queries.
pub type MetaObjectMap = BTreeMap<String, Arc<dyn MetaObject>>;

#[derive(Default)]
struct RegistryInner {
    by_name: MetaObjectMap,
    by_type: HashMap<TypeId, String>,
}

/// A name-indexed set of meta objects.
///
/// Registration is expected to happen once at startup; lookups can then run
/// concurrently from any thread. Create one per application and pass it
/// around, or use [`global_meta_registry`].
#[derive(Default)]
pub struct MetaRegistry {
    inner: RwLock<RegistryInner>,
}

static_assertions::assert_impl_all!(MetaRegistry: Send, Sync);

impl MetaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a finalized meta object.
    pub fn register<M: MetaObject + 'static>(&self, meta: M) -> Result<Arc<dyn MetaObject>> {
        self.register_shared(Arc::new(meta))
    }

    /// Publish a finalized, already shared meta object.
    pub fn register_shared(&self, meta: Arc<dyn MetaObject>) -> Result<Arc<dyn MetaObject>> {
        let class_name = meta.class_name().to_string();
        if !meta.is_finalized() {
            return Err(MetaError::NotFinalized { class_name }.into());
        }

        let mut inner = self.inner.write();
        if inner.by_name.contains_key(&class_name) {
            return Err(MetaError::AlreadyRegistered { class_name }.into());
        }

        if let Some(type_id) = meta.value_type_id() {
            match inner.by_type.entry(type_id) {
                Entry::Occupied(existing) => {
                    tracing::warn!(
                        target: targets::META,
                        %class_name,
                        existing = %existing.get(),
                        "value type already has a meta object, keeping the existing type mapping"
                    );
                }
                Entry::Vacant(slot) => {
                    slot.insert(class_name.clone());
                }
            }
        }
        inner.by_name.insert(class_name.clone(), meta.clone());
        tracing::debug!(target: targets::META, %class_name, "registered meta object");
        Ok(meta)
    }

    /// Remove a meta object. Returns `false` if it was not registered.
    pub fn unregister(&self, class_name: &str) -> bool {
        let mut inner = self.inner.write();
        let Some(meta) = inner.by_name.remove(class_name) else {
            return false;
        };
        if let Some(type_id) = meta.value_type_id() {
            if inner.by_type.get(&type_id).is_some_and(|name| name == class_name) {
                inner.by_type.remove(&type_id);
            }
        }
        true
    }

    /// Remove every meta object.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.by_name.clear();
        inner.by_type.clear();
    }

    /// Look up by class name.
    pub fn by_name(&self, class_name: &str) -> Option<Arc<dyn MetaObject>> {
        self.inner.read().by_name.get(class_name).cloned()
    }

    /// Look up by Rust type id.
    pub fn by_type_id(&self, type_id: TypeId) -> Option<Arc<dyn MetaObject>> {
        let inner = self.inner.read();
        let class_name = inner.by_type.get(&type_id)?;
        inner.by_name.get(class_name).cloned()
    }

    /// Look up by Rust type.
    pub fn by_type<T: Any>(&self) -> Option<Arc<dyn MetaObject>> {
        self.by_type_id(TypeId::of::<T>())
    }

    /// Whether a class name is registered.
    pub fn contains(&self, class_name: &str) -> bool {
        self.inner.read().by_name.contains_key(class_name)
    }

    /// Number of registered meta objects.
    pub fn len(&self) -> usize {
        self.inner.read().by_name.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().by_name.is_empty()
    }

    /// Every registered meta object, ordered by class name.
    pub fn all(&self) -> Vec<Arc<dyn MetaObject>> {
        self.inner.read().by_name.values().cloned().collect()
    }

    /// Every type listing `class_name` among its direct base classes.
    ///
    /// The type named `class_name` itself is never part of the result.
    pub fn types_inheriting(&self, class_name: &str) -> MetaObjectMap {
        self.filter(|meta| meta.class_name() != class_name && meta.inherits(class_name))
    }

    /// Every type carrying a class annotation named `annotation`.
    pub fn types_with_annotation(&self, annotation: &str) -> MetaObjectMap {
        self.filter(|meta| meta.annotation_lower_bound(annotation).is_some())
    }

    fn filter(&self, predicate: impl Fn(&dyn MetaObject) -> bool) -> MetaObjectMap {
        self.inner
            .read()
            .by_name
            .iter()
            .filter(|(_, meta)| predicate(meta.as_ref()))
            .map(|(name, meta)| (name.clone(), meta.clone()))
            .collect()
    }

    /// Construct an instance of `class_name` with the constructor taking
    /// `args.len()` arguments.
    pub fn create_instance(&self, class_name: &str, args: Vec<Variant>) -> Result<ObjectValue> {
        let meta = self.by_name(class_name).ok_or_else(|| MetaError::UnknownType {
            class_name: class_name.to_string(),
        })?;
        let object = meta.as_ref().create_instance(args).ok_or_else(|| MetaError::NoConstructor {
            class_name: class_name.to_string(),
        })?;
        Ok(object)
    }
}

impl std::fmt::Debug for MetaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaRegistry")
            .field("types", &self.inner.read().by_name.keys().collect::<Vec<_>>())
            .finish()
    }
}

static GLOBAL_META_REGISTRY: OnceLock<MetaRegistry> = OnceLock::new();

/// The process-wide registry.
pub fn global_meta_registry() -> &'static MetaRegistry {
    GLOBAL_META_REGISTRY.get_or_init(MetaRegistry::new)
}
