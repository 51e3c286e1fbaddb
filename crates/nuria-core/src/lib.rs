//! Core systems for Nuria.
//!
//! This crate provides the reflection and dynamic invocation core of the Nuria
//! framework:
//!
//! - **Variant**: A dynamically-typed value with pluggable conversions and comparisons
//! - **Meta Objects**: Run-time reflection of methods, fields, enums and annotations
//! - **Callbacks**: Type-erased invocables with partial application and cross-thread slots
//! - **Event Loops**: Execution contexts that run queued slot invocations
//! - **Lazy Conditions**: Deferred boolean expressions over arguments and test methods
//! - **Serializer**: Recursive conversion between reflected objects and variant maps
//!
//! # Callback Example
//!
//! ```
//! use nuria_core::{placeholder, BoundArgument, Callback, Variant};
//!
//! let greet = Callback::new(|greeting: String, name: String| format!("{greeting}, {name}!"));
//!
//! // Fix the second argument, take the first one from the caller.
//! let hello_world = greet.bind([placeholder(0), BoundArgument::value("world")]);
//!
//! assert_eq!(hello_world.invoke(vec!["Hello".into()]), Variant::from("Hello, world!"));
//! ```
//!
//! # Reflection Example
//!
//! ```
//! use nuria_core::meta::{MetaRegistry, MethodDescriptor, MethodKind, RuntimeMetaObject};
//! use nuria_core::Variant;
//!
//! let registry = MetaRegistry::new();
//!
//! let mut meta = RuntimeMetaObject::new("Math");
//! meta.add_method(
//!     MethodDescriptor::new("square", MethodKind::Static, |_, args| {
//!         let x = args[0].to_i64().unwrap_or_default();
//!         Variant::LongLong(x * x)
//!     })
//!     .returns("i64")
//!     .argument("i64", "x"),
//! );
//! meta.finalize();
//! registry.register(meta).unwrap();
//!
//! let math = registry.by_name("Math").unwrap();
//! let square = math.find_method(&["square", "i64"]).callback(None);
//! assert_eq!(square.invoke(vec![Variant::Int(7)]), Variant::LongLong(49));
//! ```
//!
//! # Condition Example
//!
//! ```
//! use nuria_core::condition::arg;
//! use nuria_core::Variant;
//!
//! let in_range = arg(0).ge(10) & arg(0).lt(20);
//! assert!(in_range.evaluate(&[Variant::Int(15)]));
//! assert!(!in_range.evaluate(&[Variant::Int(25)]));
//! ```

pub mod callback;
pub mod condition;
pub mod convert;
mod error;
pub mod event_loop;
pub mod invocation;
pub mod logging;
pub mod meta;
pub mod serializer;
pub mod variant;

pub use callback::{BoundArgument, Callback, CallbackKind, ConnectionType, placeholder};
pub use condition::{ConditionEvaluator, ConditionKind, Field, LazyCondition, TestCall};
pub use convert::{ConverterRegistry, converters};
pub use error::{ConditionError, EventLoopError, MetaError, NuriaError, Result};
pub use event_loop::{ContextHandle, EventLoop, EventLoopBuilder, EventLoopConfig};
pub use logging::{MetaTreeDebug, PerfSpan, TreeFormatOptions, TreeStyle};
pub use meta::{MetaObject, MetaRegistry, MetaType, RuntimeMetaObject, global_meta_registry};
pub use serializer::{FieldOutcome, RecursionDepth, Serializer, SerializerBuilder, SerializerConfig};
pub use variant::{ObjectValue, Variant, VariantList, VariantMap, VariantValue};
