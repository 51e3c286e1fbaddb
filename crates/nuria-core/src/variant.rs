//! Dynamically-typed values.
//!
//! [`Variant`] is the value currency of the whole crate: callbacks take and
//! return variants, meta-object fields are read and written as variants, the
//! serializer produces maps of variants and lazy conditions compare them.
//!
//! # Type names
//!
//! Every variant carries a type name. Builtin types use the names in
//! [`type_names`]; reflected objects use the class name they were registered
//! under. Declared parameter and field types are plain strings, so a field of
//! type `"i32"` accepts a [`Variant::Int`] as-is and anything else only after
//! a conversion.
//!
//! # Example
//!
//! ```
//! use nuria_core::variant::{type_names, Variant};
//!
//! let value = Variant::from("42");
//! assert_eq!(value.convert(type_names::I32), Some(Variant::Int(42)));
//! assert!(Variant::Int(1).equals(&Variant::Double(1.0)));
//! ```

use std::any::Any;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::convert::converters;

/// An ordered string-keyed map of variants.
pub type VariantMap = BTreeMap<String, Variant>;

/// A list of variants.
pub type VariantList = Vec<Variant>;

/// Canonical names of the builtin variant types.
pub mod type_names {
    /// The invalid (empty) variant.
    pub const INVALID: &str = "Invalid";
    /// Accepts a value of any type without conversion.
    pub const VARIANT: &str = "Variant";
    /// The unit type, used as the return type of callbacks returning nothing.
    pub const VOID: &str = "()";
    /// `bool`.
    pub const BOOL: &str = "bool";
    /// `i32`.
    pub const I32: &str = "i32";
    /// `u32`.
    pub const U32: &str = "u32";
    /// `i64`.
    pub const I64: &str = "i64";
    /// `u64`.
    pub const U64: &str = "u64";
    /// `f32`.
    pub const F32: &str = "f32";
    /// `f64`.
    pub const F64: &str = "f64";
    /// `String`.
    pub const STRING: &str = "String";
    /// Raw bytes.
    pub const BYTES: &str = "Bytes";
    /// A list of strings.
    pub const STRING_LIST: &str = "StringList";
    /// A list of variants.
    pub const LIST: &str = "List";
    /// A string-keyed map of variants.
    pub const MAP: &str = "Map";
}

/// The type tag of a [`Variant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantType {
    /// No value.
    Invalid,
    /// `bool`.
    Bool,
    /// `i32`.
    Int,
    /// `u32`.
    UInt,
    /// `i64`.
    LongLong,
    /// `u64`.
    ULongLong,
    /// `f32`.
    Float,
    /// `f64`.
    Double,
    /// `String`.
    String,
    /// Raw bytes.
    Bytes,
    /// A list of strings.
    StringList,
    /// A list of variants.
    List,
    /// A map of variants.
    Map,
    /// A reflected object.
    Object,
}

impl VariantType {
    /// The canonical type name. Objects report `"Object"`; use
    /// [`Variant::type_name`] to get the class name of a concrete object.
    pub fn name(self) -> &'static str {
        match self {
            Self::Invalid => type_names::INVALID,
            Self::Bool => type_names::BOOL,
            Self::Int => type_names::I32,
            Self::UInt => type_names::U32,
            Self::LongLong => type_names::I64,
            Self::ULongLong => type_names::U64,
            Self::Float => type_names::F32,
            Self::Double => type_names::F64,
            Self::String => type_names::STRING,
            Self::Bytes => type_names::BYTES,
            Self::StringList => type_names::STRING_LIST,
            Self::List => type_names::LIST,
            Self::Map => type_names::MAP,
            Self::Object => "Object",
        }
    }

    /// Look up a builtin type by name.
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name {
            type_names::BOOL => Self::Bool,
            type_names::I32 => Self::Int,
            type_names::U32 => Self::UInt,
            type_names::I64 => Self::LongLong,
            type_names::U64 => Self::ULongLong,
            type_names::F32 => Self::Float,
            type_names::F64 => Self::Double,
            type_names::STRING => Self::String,
            type_names::BYTES => Self::Bytes,
            type_names::STRING_LIST => Self::StringList,
            type_names::LIST => Self::List,
            type_names::MAP => Self::Map,
            _ => return None,
        };
        Some(ty)
    }

    /// Whether this is one of the numeric types (including `bool`).
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::Int
                | Self::UInt
                | Self::LongLong
                | Self::ULongLong
                | Self::Float
                | Self::Double
        )
    }
}

type ObjectSlot = Arc<Mutex<Option<Box<dyn Any + Send + Sync>>>>;

/// A reflected object stored inside a [`Variant`].
///
/// Clones share the same slot. The object can be borrowed with
/// [`with`](Self::with) or moved out exactly once with
/// [`take`](Self::take); after that every clone reports
/// [`is_taken`](Self::is_taken).
#[derive(Clone)]
pub struct ObjectValue {
    type_name: Arc<str>,
    slot: ObjectSlot,
}

impl ObjectValue {
    /// Wrap an owned object under the given class name.
    pub fn new<T: Any + Send + Sync>(type_name: &str, value: T) -> Self {
        Self::from_boxed(type_name, Box::new(value))
    }

    /// Wrap an already boxed object.
    pub fn from_boxed(type_name: &str, value: Box<dyn Any + Send + Sync>) -> Self {
        Self {
            type_name: Arc::from(type_name),
            slot: Arc::new(Mutex::new(Some(value))),
        }
    }

    /// The class name of the wrapped object.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Whether the object has been moved out.
    pub fn is_taken(&self) -> bool {
        self.slot.lock().is_none()
    }

    /// Borrow the object. Returns `None` if it was taken.
    pub fn with<R>(&self, f: impl FnOnce(&(dyn Any + Send + Sync)) -> R) -> Option<R> {
        let guard = self.slot.lock();
        match guard.as_deref() {
            Some(obj) => Some(f(obj)),
            None => None,
        }
    }

    /// Mutably borrow the object. Returns `None` if it was taken.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut (dyn Any + Send + Sync)) -> R) -> Option<R> {
        let mut guard = self.slot.lock();
        match guard.as_deref_mut() {
            Some(obj) => Some(f(obj)),
            None => None,
        }
    }

    /// Clone the object out as a `T`.
    pub fn downcast_clone<T: Clone + 'static>(&self) -> Option<T> {
        self.with(|obj| (obj as &dyn Any).downcast_ref::<T>().cloned())
            .flatten()
    }

    /// Move the object out, leaving the slot empty.
    pub fn take(&self) -> Option<Box<dyn Any + Send + Sync>> {
        self.slot.lock().take()
    }

    /// Move the object out as a `T`.
    ///
    /// If the object is not a `T` it stays in place and `None` is returned.
    pub fn take_as<T: Any>(&self) -> Option<T> {
        let mut guard = self.slot.lock();
        let boxed = guard.take()?;
        match boxed.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(boxed) => {
                *guard = Some(boxed);
                None
            }
        }
    }

    /// Put a taken object back. Does nothing if the slot is occupied.
    pub(crate) fn restore(&self, value: Box<dyn Any + Send + Sync>) {
        let mut guard = self.slot.lock();
        if guard.is_none() {
            *guard = Some(value);
        }
    }

    /// Whether both values share the same slot.
    pub fn ptr_eq(&self, other: &ObjectValue) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl fmt::Debug for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectValue")
            .field("type_name", &self.type_name)
            .field("taken", &self.is_taken())
            .finish()
    }
}

/// A dynamically-typed value.
#[derive(Debug, Clone, Default)]
pub enum Variant {
    /// No value.
    #[default]
    Invalid,
    /// A boolean.
    Bool(bool),
    /// A 32-bit signed integer.
    Int(i32),
    /// A 32-bit unsigned integer.
    UInt(u32),
    /// A 64-bit signed integer.
    LongLong(i64),
    /// A 64-bit unsigned integer.
    ULongLong(u64),
    /// A 32-bit float.
    Float(f32),
    /// A 64-bit float.
    Double(f64),
    /// A string.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// A list of strings.
    StringList(Vec<String>),
    /// A list of variants.
    List(VariantList),
    /// A map of variants.
    Map(VariantMap),
    /// A reflected object.
    Object(ObjectValue),
}

/// Numeric view used for cross-type conversion and comparison.
#[derive(Clone, Copy)]
enum Number {
    Signed(i64),
    Unsigned(u64),
    Real(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Signed(v) => v as f64,
            Number::Unsigned(v) => v as f64,
            Number::Real(v) => v,
        }
    }

    fn as_i128(self) -> Option<i128> {
        match self {
            Number::Signed(v) => Some(v as i128),
            Number::Unsigned(v) => Some(v as i128),
            Number::Real(v) if v.is_finite() => Some(v.round() as i128),
            Number::Real(_) => None,
        }
    }

    fn is_real(self) -> bool {
        matches!(self, Number::Real(_))
    }
}

impl Variant {
    /// The type tag of this value.
    pub fn variant_type(&self) -> VariantType {
        match self {
            Self::Invalid => VariantType::Invalid,
            Self::Bool(_) => VariantType::Bool,
            Self::Int(_) => VariantType::Int,
            Self::UInt(_) => VariantType::UInt,
            Self::LongLong(_) => VariantType::LongLong,
            Self::ULongLong(_) => VariantType::ULongLong,
            Self::Float(_) => VariantType::Float,
            Self::Double(_) => VariantType::Double,
            Self::String(_) => VariantType::String,
            Self::Bytes(_) => VariantType::Bytes,
            Self::StringList(_) => VariantType::StringList,
            Self::List(_) => VariantType::List,
            Self::Map(_) => VariantType::Map,
            Self::Object(_) => VariantType::Object,
        }
    }

    /// The type name of this value; the class name for objects.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Object(obj) => obj.type_name(),
            other => other.variant_type().name(),
        }
    }

    /// Returns `false` only for [`Variant::Invalid`].
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid)
    }

    /// Whether this value is invalid or an object that has been taken.
    pub fn is_null(&self) -> bool {
        match self {
            Self::Invalid => true,
            Self::Object(obj) => obj.is_taken(),
            _ => false,
        }
    }

    /// Returns the string slice if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list if this is a list.
    pub fn as_list(&self) -> Option<&VariantList> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    /// Returns the map if this is a map.
    pub fn as_map(&self) -> Option<&VariantMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the object if this is an object.
    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Convert to `bool`.
    pub fn to_bool(&self) -> Option<bool> {
        match self.convert(type_names::BOOL)? {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Convert to `i64`.
    pub fn to_i64(&self) -> Option<i64> {
        match self.convert(type_names::I64)? {
            Self::LongLong(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to `f64`.
    pub fn to_f64(&self) -> Option<f64> {
        match self.convert(type_names::F64)? {
            Self::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to a `String`.
    pub fn to_string_value(&self) -> Option<String> {
        match self.convert(type_names::STRING)? {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    fn number(&self) -> Option<Number> {
        match self {
            Self::Bool(b) => Some(Number::Signed(*b as i64)),
            Self::Int(v) => Some(Number::Signed(*v as i64)),
            Self::UInt(v) => Some(Number::Unsigned(*v as u64)),
            Self::LongLong(v) => Some(Number::Signed(*v)),
            Self::ULongLong(v) => Some(Number::Unsigned(*v)),
            Self::Float(v) => Some(Number::Real(*v as f64)),
            Self::Double(v) => Some(Number::Real(*v)),
            _ => None,
        }
    }

    /// The default value of a named type.
    ///
    /// Builtin types yield their zero value, `"Variant"` and `"()"` yield
    /// [`Variant::Invalid`]. Other names consult the defaults registered on
    /// the [`ConverterRegistry`](crate::convert::ConverterRegistry).
    pub fn default_for(type_name: &str) -> Variant {
        match VariantType::from_name(type_name) {
            Some(VariantType::Bool) => Self::Bool(false),
            Some(VariantType::Int) => Self::Int(0),
            Some(VariantType::UInt) => Self::UInt(0),
            Some(VariantType::LongLong) => Self::LongLong(0),
            Some(VariantType::ULongLong) => Self::ULongLong(0),
            Some(VariantType::Float) => Self::Float(0.0),
            Some(VariantType::Double) => Self::Double(0.0),
            Some(VariantType::String) => Self::String(String::new()),
            Some(VariantType::Bytes) => Self::Bytes(Vec::new()),
            Some(VariantType::StringList) => Self::StringList(Vec::new()),
            Some(VariantType::List) => Self::List(Vec::new()),
            Some(VariantType::Map) => Self::Map(VariantMap::new()),
            Some(VariantType::Invalid) | Some(VariantType::Object) | None => {
                converters().default_for(type_name).unwrap_or_default()
            }
        }
    }

    /// Convert this value to the named type.
    ///
    /// Values already of the target type are cloned. Builtin conversions cover
    /// the numeric types, `bool`, strings, bytes and lists; anything else is
    /// delegated to the process-wide
    /// [`ConverterRegistry`](crate::convert::ConverterRegistry).
    pub fn convert(&self, target: &str) -> Option<Variant> {
        if target == type_names::VARIANT || self.type_name() == target {
            return Some(self.clone());
        }
        if !self.is_valid() {
            return None;
        }
        if let Some(ty) = VariantType::from_name(target) {
            if let Some(converted) = self.convert_builtin(ty) {
                return Some(converted);
            }
        }
        converters().convert(self, target)
    }

    fn convert_builtin(&self, target: VariantType) -> Option<Variant> {
        let number = self.number();
        match target {
            VariantType::Bool => match (self, number) {
                (Self::String(s), _) => {
                    let s = s.trim();
                    Some(Self::Bool(
                        !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
                    ))
                }
                (_, Some(Number::Real(v))) => Some(Self::Bool(v != 0.0)),
                (_, Some(n)) => Some(Self::Bool(n.as_i128()? != 0)),
                _ => None,
            },
            VariantType::Int => self.integer_like().and_then(|v| i32::try_from(v).ok()).map(Self::Int),
            VariantType::UInt => self.integer_like().and_then(|v| u32::try_from(v).ok()).map(Self::UInt),
            VariantType::LongLong => self
                .integer_like()
                .and_then(|v| i64::try_from(v).ok())
                .map(Self::LongLong),
            VariantType::ULongLong => self
                .integer_like()
                .and_then(|v| u64::try_from(v).ok())
                .map(Self::ULongLong),
            VariantType::Float => self.real_like().map(|v| Self::Float(v as f32)),
            VariantType::Double => self.real_like().map(Self::Double),
            VariantType::String => match self {
                Self::Bool(b) => Some(Self::String(b.to_string())),
                Self::Int(v) => Some(Self::String(v.to_string())),
                Self::UInt(v) => Some(Self::String(v.to_string())),
                Self::LongLong(v) => Some(Self::String(v.to_string())),
                Self::ULongLong(v) => Some(Self::String(v.to_string())),
                Self::Float(v) => Some(Self::String(v.to_string())),
                Self::Double(v) => Some(Self::String(v.to_string())),
                Self::Bytes(bytes) => String::from_utf8(bytes.clone()).ok().map(Self::String),
                Self::StringList(list) if list.len() == 1 => Some(Self::String(list[0].clone())),
                _ => None,
            },
            VariantType::Bytes => match self {
                Self::String(s) => Some(Self::Bytes(s.clone().into_bytes())),
                _ => None,
            },
            VariantType::StringList => match self {
                Self::String(s) => Some(Self::StringList(vec![s.clone()])),
                Self::List(list) => list
                    .iter()
                    .map(Variant::to_string_value)
                    .collect::<Option<Vec<_>>>()
                    .map(Self::StringList),
                _ => None,
            },
            VariantType::List => match self {
                Self::StringList(list) => Some(Self::List(
                    list.iter().cloned().map(Self::String).collect(),
                )),
                _ => None,
            },
            VariantType::Map | VariantType::Object | VariantType::Invalid => None,
        }
    }

    fn integer_like(&self) -> Option<i128> {
        match self {
            Self::String(s) => s.trim().parse::<i128>().ok(),
            _ => self.number()?.as_i128(),
        }
    }

    fn real_like(&self) -> Option<f64> {
        match self {
            Self::String(s) => s.trim().parse::<f64>().ok(),
            _ => self.number().map(Number::as_f64),
        }
    }

    /// Loose equality.
    ///
    /// Numbers compare by value across types, registered comparators are
    /// consulted, and otherwise `other` is converted to this value's type
    /// (or the reverse) before comparing strictly.
    pub fn equals(&self, other: &Variant) -> bool {
        if self == other {
            return true;
        }
        if !self.is_valid() || !other.is_valid() {
            return false;
        }
        if let (Some(a), Some(b)) = (self.number(), other.number()) {
            return compare_numbers(a, b) == Some(Ordering::Equal);
        }
        if let Some(ordering) = converters().compare(self, other) {
            return ordering == Ordering::Equal;
        }
        if let Some(converted) = other.convert(self.type_name()) {
            if *self == converted {
                return true;
            }
        }
        match self.convert(other.type_name()) {
            Some(converted) => converted == *other,
            None => false,
        }
    }

    /// Ordering between two values, if one exists.
    ///
    /// Numbers order by value, strings lexicographically, registered
    /// comparators extend the relation. Mixed string/number pairs are
    /// compared numerically when the string parses.
    pub fn compare(&self, other: &Variant) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.number(), other.number()) {
            return compare_numbers(a, b);
        }
        match (self, other) {
            (Self::String(a), Self::String(b)) => return Some(a.cmp(b)),
            (Self::Bytes(a), Self::Bytes(b)) => return Some(a.cmp(b)),
            _ => {}
        }
        if let Some(ordering) = converters().compare(self, other) {
            return Some(ordering);
        }
        match (self.real_like(), other.real_like()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        }
    }

    /// Truthiness used by conditions.
    ///
    /// `Bool` is itself, `Invalid` is false, everything else is converted to
    /// `bool`; values without a bool conversion are true unless they are an
    /// empty container or a taken object.
    pub fn truthiness(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Invalid => false,
            Self::Object(obj) => !obj.is_taken(),
            Self::List(list) => !list.is_empty(),
            Self::StringList(list) => !list.is_empty(),
            Self::Map(map) => !map.is_empty(),
            Self::Bytes(bytes) => !bytes.is_empty(),
            other => other.to_bool().unwrap_or(true),
        }
    }
}

fn compare_numbers(a: Number, b: Number) -> Option<Ordering> {
    if a.is_real() || b.is_real() {
        a.as_f64().partial_cmp(&b.as_f64())
    } else {
        Some(a.as_i128()?.cmp(&b.as_i128()?))
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Invalid, Self::Invalid) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::LongLong(a), Self::LongLong(b)) => a == b,
            (Self::ULongLong(a), Self::ULongLong(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::StringList(a), Self::StringList(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::Int(v)
    }
}

impl From<u32> for Variant {
    fn from(v: u32) -> Self {
        Variant::UInt(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::LongLong(v)
    }
}

impl From<u64> for Variant {
    fn from(v: u64) -> Self {
        Variant::ULongLong(v)
    }
}

impl From<f32> for Variant {
    fn from(v: f32) -> Self {
        Variant::Float(v)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Double(v)
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_string())
    }
}

impl From<Vec<u8>> for Variant {
    fn from(v: Vec<u8>) -> Self {
        Variant::Bytes(v)
    }
}

impl From<Vec<String>> for Variant {
    fn from(v: Vec<String>) -> Self {
        Variant::StringList(v)
    }
}

impl From<VariantList> for Variant {
    fn from(v: VariantList) -> Self {
        Variant::List(v)
    }
}

impl From<VariantMap> for Variant {
    fn from(v: VariantMap) -> Self {
        Variant::Map(v)
    }
}

impl From<ObjectValue> for Variant {
    fn from(v: ObjectValue) -> Self {
        Variant::Object(v)
    }
}

/// Types that can travel inside a [`Variant`].
///
/// This is what lets typed closures become [`Callback`](crate::Callback)s
/// and what the derive macro uses for primitive fields.
pub trait VariantValue: Sized + Default + Send + 'static {
    /// The declared type name.
    const TYPE_NAME: &'static str;

    /// Extract a value, converting if needed.
    fn from_variant(value: &Variant) -> Option<Self>;

    /// Wrap the value.
    fn into_variant(self) -> Variant;

    /// The default value of this type as a variant.
    fn default_variant() -> Variant {
        Variant::default_for(Self::TYPE_NAME)
    }
}

macro_rules! impl_variant_value {
    ($ty:ty, $name:expr, $variant:ident) => {
        impl VariantValue for $ty {
            const TYPE_NAME: &'static str = $name;

            fn from_variant(value: &Variant) -> Option<Self> {
                match value {
                    Variant::$variant(v) => Some(v.clone()),
                    other => match other.convert($name)? {
                        Variant::$variant(v) => Some(v),
                        _ => None,
                    },
                }
            }

            fn into_variant(self) -> Variant {
                Variant::$variant(self)
            }
        }
    };
}

impl_variant_value!(bool, type_names::BOOL, Bool);
impl_variant_value!(i32, type_names::I32, Int);
impl_variant_value!(u32, type_names::U32, UInt);
impl_variant_value!(i64, type_names::I64, LongLong);
impl_variant_value!(u64, type_names::U64, ULongLong);
impl_variant_value!(f32, type_names::F32, Float);
impl_variant_value!(f64, type_names::F64, Double);
impl_variant_value!(String, type_names::STRING, String);
impl_variant_value!(Vec<u8>, type_names::BYTES, Bytes);
impl_variant_value!(Vec<String>, type_names::STRING_LIST, StringList);
impl_variant_value!(VariantList, type_names::LIST, List);
impl_variant_value!(VariantMap, type_names::MAP, Map);

impl VariantValue for Variant {
    const TYPE_NAME: &'static str = type_names::VARIANT;

    fn from_variant(value: &Variant) -> Option<Self> {
        Some(value.clone())
    }

    fn into_variant(self) -> Variant {
        self
    }
}

impl VariantValue for () {
    const TYPE_NAME: &'static str = type_names::VOID;

    fn from_variant(_value: &Variant) -> Option<Self> {
        Some(())
    }

    fn into_variant(self) -> Variant {
        Variant::Invalid
    }
}
