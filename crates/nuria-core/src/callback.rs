//! Type-erased invocable callbacks.
//!
//! A [`Callback`] wraps a free function, a closure, a method on a shared
//! object or a thread-affine slot behind a single
//! `invoke(Vec<Variant>) -> Variant` interface.
//!
//! # Kinds
//!
//! - [`CallbackKind::StaticMethod`]: a plain function, see [`Callback::function`].
//! - [`CallbackKind::Lambda`]: a closure, see [`Callback::new`].
//! - [`CallbackKind::MemberMethod`]: a method on an `Arc<T>` kept alive by the
//!   callback, see [`Callback::member`].
//! - [`CallbackKind::Slot`]: a method on an `Arc<T>` held weakly and executed
//!   in an [`EventLoop`](crate::event_loop::EventLoop) context, see
//!   [`Callback::slot`].
//!
//! # Arguments
//!
//! Callbacks declare their argument types by name. On invocation each
//! argument is converted to the declared type; when a conversion fails the
//! default value of that type is passed instead and a warning is logged.
//! Missing arguments become defaults and surplus arguments are dropped.
//!
//! Variadic callbacks receive every argument collapsed into a single
//! [`Variant::List`].
//!
//! # Binding
//!
//! [`Callback::bind`] returns a new callback with a fixed argument list:
//!
//! - Without placeholders the bound values are prepended to the call
//!   arguments.
//! - With at least one [`placeholder`] the bound list is the complete argument
//!   list. Placeholders pick call arguments by index, remaining call arguments
//!   are ignored and an out-of-range placeholder yields the default value of
//!   the parameter at that position.
//!
//! # Example
//!
//! ```
//! use nuria_core::callback::{placeholder, BoundArgument, Callback};
//! use nuria_core::variant::Variant;
//!
//! let sub = Callback::new(|a: i32, b: i32| a - b);
//! assert_eq!(sub.invoke(vec![10.into(), 4.into()]), Variant::Int(6));
//!
//! let swapped = sub.bind([placeholder(1), placeholder(0)]);
//! assert_eq!(swapped.invoke(vec![10.into(), 4.into()]), Variant::Int(-6));
//!
//! let from_hundred = sub.bind([BoundArgument::value(100)]);
//! assert_eq!(from_hundred.invoke(vec![1.into()]), Variant::Int(99));
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use crate::event_loop::ContextHandle;
use crate::invocation::QueuedInvocation;
use crate::logging::targets;
use crate::variant::{Variant, VariantValue, type_names};

/// Describes how a slot callback is invoked relative to its context thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionType {
    /// Invoke immediately in the calling thread.
    Direct,

    /// Always queue the invocation to the context's event loop and return
    /// immediately with [`Variant::Invalid`].
    Queued,

    /// Direct when called on the context thread. Otherwise queued when the
    /// callback returns nothing, and blocking queued when it returns a value.
    #[default]
    Auto,

    /// Queue the invocation and block until the context thread has produced
    /// the result.
    BlockingQueued,
}

/// What a [`Callback`] wraps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    /// Nothing; invoking returns [`Variant::Invalid`].
    #[default]
    Invalid,
    /// A free function.
    StaticMethod,
    /// A method on a shared object.
    MemberMethod,
    /// A method on a weakly held object, executed in an event loop context.
    Slot,
    /// A closure.
    Lambda,
}

/// One entry of a bound argument list.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundArgument {
    /// A fixed value.
    Value(Variant),
    /// The call argument at the given index.
    FromCaller(usize),
}

impl BoundArgument {
    /// A fixed value.
    pub fn value(value: impl Into<Variant>) -> Self {
        Self::Value(value.into())
    }

    /// Whether this is a placeholder.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::FromCaller(_))
    }
}

impl From<Variant> for BoundArgument {
    fn from(value: Variant) -> Self {
        Self::Value(value)
    }
}

/// A placeholder for the call argument at `index` (zero-based).
pub fn placeholder(index: usize) -> BoundArgument {
    BoundArgument::FromCaller(index)
}

/// The erased call. `None` means the target object no longer exists.
type Invoker = Arc<dyn Fn(Vec<Variant>) -> Option<Variant> + Send + Sync>;

struct SlotTarget {
    context: ContextHandle,
    connection: ConnectionType,
    alive: Box<dyn Fn() -> bool + Send + Sync>,
}

/// The immutable description of the wrapped function, shared by all
/// callbacks derived from it through `bind`.
struct CallbackTarget {
    kind: CallbackKind,
    return_type: String,
    argument_types: Vec<String>,
    invoker: Invoker,
    slot: Option<SlotTarget>,
}

struct CallbackInner {
    target: Arc<CallbackTarget>,
    bound: Vec<BoundArgument>,
    variadic: bool,
}

/// A type-erased, cheaply cloneable invocable.
///
/// Callbacks are immutable: [`bind`](Self::bind) and
/// [`with_variadic`](Self::with_variadic) return new callbacks. Two callbacks
/// compare equal only if one is a clone of the other.
#[derive(Clone, Default)]
pub struct Callback {
    inner: Option<Arc<CallbackInner>>,
}

static_assertions::assert_impl_all!(Callback: Send, Sync);

fn take_argument<A: VariantValue>(args: &mut std::vec::IntoIter<Variant>) -> A {
    args.next()
        .and_then(|value| A::from_variant(&value))
        .unwrap_or_default()
}

/// Functions and closures that can become a [`Callback`].
///
/// Implemented for every `Fn` of up to six arguments whose argument and return
/// types implement [`VariantValue`].
pub trait IntoCallback<Args>: Send + Sync + 'static {
    /// Declared return type.
    fn return_type() -> &'static str;
    /// Declared argument types.
    fn argument_types() -> Vec<&'static str>;
    /// Call with already marshalled arguments.
    fn call(&self, args: Vec<Variant>) -> Variant;
}

/// Methods that can become a member or slot [`Callback`] on a `T`.
///
/// Implemented for every `Fn(&T, ...)` of up to six further arguments whose
/// argument and return types implement [`VariantValue`].
pub trait MethodFn<T, Args>: Send + Sync + 'static {
    /// Declared return type.
    fn return_type() -> &'static str;
    /// Declared argument types, excluding the receiver.
    fn argument_types() -> Vec<&'static str>;
    /// Call on `target` with already marshalled arguments.
    fn call(&self, target: &T, args: Vec<Variant>) -> Variant;
}

macro_rules! impl_callback_arity {
    ($(($arg:ident, $var:ident)),*) => {
        impl<Func, Ret, $($arg,)*> IntoCallback<($($arg,)*)> for Func
        where
            Func: Fn($($arg),*) -> Ret + Send + Sync + 'static,
            Ret: VariantValue,
            $($arg: VariantValue,)*
        {
            fn return_type() -> &'static str {
                Ret::TYPE_NAME
            }

            fn argument_types() -> Vec<&'static str> {
                vec![$($arg::TYPE_NAME),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn call(&self, args: Vec<Variant>) -> Variant {
                let mut args = args.into_iter();
                $(let $var: $arg = take_argument(&mut args);)*
                (self)($($var),*).into_variant()
            }
        }

        impl<Func, T, Ret, $($arg,)*> MethodFn<T, ($($arg,)*)> for Func
        where
            Func: Fn(&T, $($arg),*) -> Ret + Send + Sync + 'static,
            Ret: VariantValue,
            $($arg: VariantValue,)*
        {
            fn return_type() -> &'static str {
                Ret::TYPE_NAME
            }

            fn argument_types() -> Vec<&'static str> {
                vec![$($arg::TYPE_NAME),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn call(&self, target: &T, args: Vec<Variant>) -> Variant {
                let mut args = args.into_iter();
                $(let $var: $arg = take_argument(&mut args);)*
                (self)(target, $($var),*).into_variant()
            }
        }
    };
}

impl_callback_arity!();
impl_callback_arity!((A1, a1));
impl_callback_arity!((A1, a1), (A2, a2));
impl_callback_arity!((A1, a1), (A2, a2), (A3, a3));
impl_callback_arity!((A1, a1), (A2, a2), (A3, a3), (A4, a4));
impl_callback_arity!((A1, a1), (A2, a2), (A3, a3), (A4, a4), (A5, a5));
impl_callback_arity!((A1, a1), (A2, a2), (A3, a3), (A4, a4), (A5, a5), (A6, a6));

fn owned_names(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

impl Callback {
    fn from_target(target: CallbackTarget) -> Self {
        Self {
            inner: Some(Arc::new(CallbackInner {
                target: Arc::new(target),
                bound: Vec::new(),
                variadic: false,
            })),
        }
    }

    fn from_fn<Args, F: IntoCallback<Args>>(kind: CallbackKind, f: F) -> Self {
        Self::from_target(CallbackTarget {
            kind,
            return_type: F::return_type().to_string(),
            argument_types: owned_names(&F::argument_types()),
            invoker: Arc::new(move |args| Some(f.call(args))),
            slot: None,
        })
    }

    /// An invalid callback.
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Wrap a closure.
    pub fn new<Args, F: IntoCallback<Args>>(f: F) -> Self {
        Self::from_fn(CallbackKind::Lambda, f)
    }

    /// Wrap a free function.
    pub fn function<Args, F: IntoCallback<Args>>(f: F) -> Self {
        Self::from_fn(CallbackKind::StaticMethod, f)
    }

    /// Wrap a method on a shared object. The callback keeps `target` alive.
    pub fn member<T, Args, F>(target: &Arc<T>, method: F) -> Self
    where
        T: Send + Sync + 'static,
        F: MethodFn<T, Args>,
    {
        let target = target.clone();
        Self::from_target(CallbackTarget {
            kind: CallbackKind::MemberMethod,
            return_type: F::return_type().to_string(),
            argument_types: owned_names(&F::argument_types()),
            invoker: Arc::new(move |args| Some(method.call(&target, args))),
            slot: None,
        })
    }

    /// Wrap a method on a weakly held object that lives in `context`.
    ///
    /// Once `target` has been dropped, invoking the callback returns
    /// [`Variant::Invalid`] without calling anything.
    pub fn slot<T, Args, F>(
        target: &Arc<T>,
        context: &ContextHandle,
        connection: ConnectionType,
        method: F,
    ) -> Self
    where
        T: Send + Sync + 'static,
        F: MethodFn<T, Args>,
    {
        let weak: Weak<T> = Arc::downgrade(target);
        let probe = weak.clone();
        Self::from_target(CallbackTarget {
            kind: CallbackKind::Slot,
            return_type: F::return_type().to_string(),
            argument_types: owned_names(&F::argument_types()),
            invoker: Arc::new(move |args| {
                let target = weak.upgrade()?;
                Some(method.call(&target, args))
            }),
            slot: Some(SlotTarget {
                context: context.clone(),
                connection,
                alive: Box::new(move || probe.strong_count() > 0),
            }),
        })
    }

    /// Wrap an already type-erased function.
    ///
    /// `f` receives its arguments converted to `argument_types`. Slots need an
    /// execution context and cannot be created this way; passing
    /// [`CallbackKind::Slot`] or [`CallbackKind::Invalid`] yields an invalid
    /// callback.
    pub fn dynamic<F>(kind: CallbackKind, return_type: &str, argument_types: &[&str], f: F) -> Self
    where
        F: Fn(Vec<Variant>) -> Variant + Send + Sync + 'static,
    {
        if matches!(kind, CallbackKind::Invalid | CallbackKind::Slot) {
            tracing::warn!(target: targets::CALLBACK, ?kind, "cannot create dynamic callback of this kind");
            return Self::invalid();
        }

        Self::from_target(CallbackTarget {
            kind,
            return_type: return_type.to_string(),
            argument_types: owned_names(argument_types),
            invoker: Arc::new(move |args| Some(f(args))),
            slot: None,
        })
    }

    /// Whether this callback wraps anything.
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// What this callback wraps.
    pub fn kind(&self) -> CallbackKind {
        self.inner
            .as_ref()
            .map_or(CallbackKind::Invalid, |inner| inner.target.kind)
    }

    /// The declared return type name, `"()"` for callbacks returning nothing.
    pub fn return_type(&self) -> &str {
        self.inner
            .as_ref()
            .map_or(type_names::INVALID, |inner| inner.target.return_type.as_str())
    }

    /// The declared argument type names.
    pub fn argument_types(&self) -> &[String] {
        self.inner
            .as_ref()
            .map(|inner| inner.target.argument_types.as_slice())
            .unwrap_or(&[])
    }

    /// Whether call arguments are collapsed into a single list.
    pub fn is_variadic(&self) -> bool {
        self.inner.as_ref().is_some_and(|inner| inner.variadic)
    }

    /// The current bound argument list.
    pub fn bound_arguments(&self) -> &[BoundArgument] {
        self.inner
            .as_ref()
            .map(|inner| inner.bound.as_slice())
            .unwrap_or(&[])
    }

    /// The connection type of a slot callback.
    pub fn connection_type(&self) -> Option<ConnectionType> {
        let slot = self.inner.as_ref()?.target.slot.as_ref()?;
        Some(slot.connection)
    }

    /// The execution context of a slot callback.
    pub fn context(&self) -> Option<&ContextHandle> {
        let slot = self.inner.as_ref()?.target.slot.as_ref()?;
        Some(&slot.context)
    }

    /// A copy of this callback with the variadic flag set to `variadic`.
    pub fn with_variadic(&self, variadic: bool) -> Callback {
        match &self.inner {
            Some(inner) => Self {
                inner: Some(Arc::new(CallbackInner {
                    target: inner.target.clone(),
                    bound: inner.bound.clone(),
                    variadic,
                })),
            },
            None => Self::invalid(),
        }
    }

    /// A copy of this callback with `arguments` bound, replacing any earlier
    /// binding. An empty list removes the binding.
    pub fn bind<I>(&self, arguments: I) -> Callback
    where
        I: IntoIterator<Item = BoundArgument>,
    {
        match &self.inner {
            Some(inner) => Self {
                inner: Some(Arc::new(CallbackInner {
                    target: inner.target.clone(),
                    bound: arguments.into_iter().collect(),
                    variadic: inner.variadic,
                })),
            },
            None => Self::invalid(),
        }
    }

    /// Invoke the callback.
    ///
    /// Returns [`Variant::Invalid`] for invalid callbacks, for slots whose
    /// target is gone, for fire-and-forget slot dispatch and when a slot's
    /// event loop no longer accepts invocations.
    #[tracing::instrument(skip_all, target = "nuria_core::callback", level = "trace")]
    pub fn invoke(&self, args: Vec<Variant>) -> Variant {
        let Some(inner) = &self.inner else {
            tracing::trace!(target: targets::CALLBACK, "invoking invalid callback");
            return Variant::Invalid;
        };

        let args = inner.apply_bindings(args);
        let args = if inner.variadic {
            vec![Variant::List(args)]
        } else {
            marshal_arguments(&inner.target.argument_types, args)
        };

        let result = inner.target.dispatch(args);
        inner.target.convert_result(result)
    }
}

impl CallbackInner {
    fn apply_bindings(&self, args: Vec<Variant>) -> Vec<Variant> {
        if self.bound.is_empty() {
            return args;
        }

        if !self.bound.iter().any(BoundArgument::is_placeholder) {
            let mut effective: Vec<Variant> = self
                .bound
                .iter()
                .filter_map(|bound| match bound {
                    BoundArgument::Value(value) => Some(value.clone()),
                    BoundArgument::FromCaller(_) => None,
                })
                .collect();
            effective.extend(args);
            return effective;
        }

        self.bound
            .iter()
            .enumerate()
            .map(|(position, bound)| match bound {
                BoundArgument::Value(value) => value.clone(),
                BoundArgument::FromCaller(index) => match args.get(*index) {
                    Some(value) => value.clone(),
                    None => {
                        tracing::debug!(
                            target: targets::CALLBACK,
                            index,
                            given = args.len(),
                            "placeholder out of range, passing default"
                        );
                        self.default_at(position)
                    }
                },
            })
            .collect()
    }

    fn default_at(&self, position: usize) -> Variant {
        if self.variadic {
            return Variant::Invalid;
        }
        self.target
            .argument_types
            .get(position)
            .map_or(Variant::Invalid, |ty| Variant::default_for(ty))
    }
}

impl CallbackTarget {
    fn convert_result(&self, result: Variant) -> Variant {
        match self.return_type.as_str() {
            type_names::VOID => Variant::Invalid,
            type_names::VARIANT => result,
            ty => match result.convert(ty) {
                Some(converted) => converted,
                None => result,
            },
        }
    }

    fn call_direct(&self, args: Vec<Variant>) -> Variant {
        match (self.invoker)(args) {
            Some(result) => result,
            None => {
                tracing::debug!(target: targets::CALLBACK, "slot target destroyed during call");
                Variant::Invalid
            }
        }
    }

    fn dispatch(&self, args: Vec<Variant>) -> Variant {
        let Some(slot) = &self.slot else {
            return self.call_direct(args);
        };

        if !(slot.alive)() {
            tracing::debug!(target: targets::CALLBACK, "slot target destroyed, skipping invocation");
            return Variant::Invalid;
        }

        let blocking = match slot.connection {
            ConnectionType::Direct => return self.call_direct(args),
            ConnectionType::Auto if slot.context.is_current() => return self.call_direct(args),
            ConnectionType::Auto => self.return_type != type_names::VOID,
            ConnectionType::Queued => false,
            ConnectionType::BlockingQueued => true,
        };

        let invoker = self.invoker.clone();
        if blocking {
            match slot
                .context
                .post_blocking(move || invoker(args).unwrap_or_default())
            {
                Ok(result) => result,
                Err(err) => {
                    tracing::error!(
                        target: targets::CALLBACK,
                        context = slot.context.name(),
                        %err,
                        "failed to dispatch blocking slot invocation"
                    );
                    Variant::Invalid
                }
            }
        } else {
            let invocation = QueuedInvocation::new(move || invoker(args).unwrap_or_default());
            if let Err(err) = slot.context.post(invocation) {
                tracing::error!(
                    target: targets::CALLBACK,
                    context = slot.context.name(),
                    %err,
                    "failed to dispatch queued slot invocation"
                );
            }
            Variant::Invalid
        }
    }
}

/// Convert `args` to the declared `types`.
///
/// Failed conversions and missing arguments become the default value of the
/// declared type; surplus arguments are dropped.
pub(crate) fn marshal_arguments(types: &[String], args: Vec<Variant>) -> Vec<Variant> {
    let mut args = args.into_iter();
    types
        .iter()
        .enumerate()
        .map(|(position, ty)| match args.next() {
            Some(value) => match value.convert(ty) {
                Some(converted) => converted,
                None => {
                    tracing::warn!(
                        target: targets::CALLBACK,
                        position,
                        expected = %ty,
                        given = value.type_name(),
                        "argument conversion failed, passing default"
                    );
                    Variant::default_for(ty)
                }
            },
            None => Variant::default_for(ty),
        })
        .collect()
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("kind", &self.kind())
            .field("return_type", &self.return_type())
            .field("argument_types", &self.argument_types())
            .field("variadic", &self.is_variadic())
            .field("bound", &self.bound_arguments())
            .finish()
    }
}
