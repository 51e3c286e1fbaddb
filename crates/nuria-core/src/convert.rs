//! Process-wide registry of user-defined conversions, comparators and default
//! constructors.
//!
//! Builtin variant types convert among themselves without any registration.
//! Everything involving a reflected class (or another user type name) goes
//! through the [`ConverterRegistry`] returned by [`converters`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::logging::targets;
use crate::variant::Variant;

type ConverterFn = Arc<dyn Fn(&Variant) -> Option<Variant> + Send + Sync>;
type ComparatorFn = Arc<dyn Fn(&Variant, &Variant) -> Option<Ordering> + Send + Sync>;
type DefaultFn = Arc<dyn Fn() -> Variant + Send + Sync>;

/// Registry of conversions between named types.
///
/// Registered functions are cloned out of the registry before they run, so a
/// converter may itself convert other values.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: RwLock<HashMap<(String, String), ConverterFn>>,
    comparators: RwLock<HashMap<(String, String), ComparatorFn>>,
    defaults: RwLock<HashMap<String, DefaultFn>>,
}

impl ConverterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a conversion from `from` to `to`, replacing any previous one.
    pub fn register_converter<F>(&self, from: &str, to: &str, converter: F)
    where
        F: Fn(&Variant) -> Option<Variant> + Send + Sync + 'static,
    {
        tracing::debug!(target: targets::VARIANT, from, to, "registered converter");
        self.converters
            .write()
            .insert((from.to_string(), to.to_string()), Arc::new(converter));
    }

    /// Whether a conversion from `from` to `to` is registered.
    pub fn has_converter(&self, from: &str, to: &str) -> bool {
        self.converters
            .read()
            .contains_key(&(from.to_string(), to.to_string()))
    }

    /// Convert `value` to `to` using a registered converter.
    pub fn convert(&self, value: &Variant, to: &str) -> Option<Variant> {
        let converter = self
            .converters
            .read()
            .get(&(value.type_name().to_string(), to.to_string()))
            .cloned()?;
        converter(value)
    }

    /// Register an ordering between values of type `a` and type `b`.
    ///
    /// The reverse direction is derived automatically.
    pub fn register_comparator<F>(&self, a: &str, b: &str, comparator: F)
    where
        F: Fn(&Variant, &Variant) -> Option<Ordering> + Send + Sync + 'static,
    {
        tracing::debug!(target: targets::VARIANT, a, b, "registered comparator");
        self.comparators
            .write()
            .insert((a.to_string(), b.to_string()), Arc::new(comparator));
    }

    /// Compare two values using a registered comparator.
    pub fn compare(&self, left: &Variant, right: &Variant) -> Option<Ordering> {
        let (a, b) = (left.type_name().to_string(), right.type_name().to_string());
        let (comparator, flipped) = {
            let comparators = self.comparators.read();
            match comparators.get(&(a.clone(), b.clone())) {
                Some(c) => (c.clone(), false),
                None => (comparators.get(&(b, a))?.clone(), true),
            }
        };
        if flipped {
            comparator(right, left).map(Ordering::reverse)
        } else {
            comparator(left, right)
        }
    }

    /// Register the default value of a named type.
    pub fn register_default<F>(&self, type_name: &str, constructor: F)
    where
        F: Fn() -> Variant + Send + Sync + 'static,
    {
        self.defaults
            .write()
            .insert(type_name.to_string(), Arc::new(constructor));
    }

    /// The registered default value of a named type.
    pub fn default_for(&self, type_name: &str) -> Option<Variant> {
        let constructor = self.defaults.read().get(type_name).cloned()?;
        Some(constructor())
    }
}

static CONVERTERS: OnceLock<ConverterRegistry> = OnceLock::new();

/// The process-wide converter registry.
pub fn converters() -> &'static ConverterRegistry {
    CONVERTERS.get_or_init(ConverterRegistry::new)
}
