//! Lazily evaluated conditions.
//!
//! A [`LazyCondition`] is an expression tree built from [`Field`] operands.
//! Nothing is evaluated when the tree is built; [`LazyCondition::evaluate`]
//! runs it later against an argument list, calling test methods registered
//! on a [`ConditionEvaluator`] or embedded as native callbacks along the way.
//!
//! Logical operators short-circuit: the right operand of `&` is never resolved
//! when the left one is false, nor the right operand of `|` when the left one
//! is true.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use nuria_core::callback::Callback;
//! use nuria_core::condition::{arg, test, ConditionEvaluator};
//! use nuria_core::variant::Variant;
//!
//! let evaluator = Arc::new(ConditionEvaluator::new());
//! evaluator.register_method("is_admin", Callback::new(|user: String| user == "root"));
//!
//! let condition = (arg(0).gt(17) & test("is_admin", vec![arg(1)])).compile(evaluator);
//!
//! assert!(condition.evaluate(&[Variant::Int(30), Variant::from("root")]));
//! assert!(!condition.evaluate(&[Variant::Int(30), Variant::from("guest")]));
//! assert!(!condition.evaluate(&[Variant::Int(12)]));
//! ```

mod evaluator;

pub use evaluator::ConditionEvaluator;

use std::fmt;
use std::ops::{BitAnd, BitOr};
use std::sync::{Arc, OnceLock};

use crate::callback::Callback;
use crate::error::ConditionError;
use crate::variant::Variant;

/// The operation of a [`LazyCondition`] node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    /// Always false.
    #[default]
    Empty,
    /// The truthiness of a single operand.
    Single,
    /// `left == right` (loose equality).
    Equal,
    /// `left != right`.
    NonEqual,
    /// `left > right`.
    Greater,
    /// `left >= right`.
    GreaterEqual,
    /// `left < right`.
    Less,
    /// `left <= right`.
    LessEqual,
    /// Short-circuiting `left && right`.
    LogicAnd,
    /// Short-circuiting `left || right`.
    LogicOr,
}

impl ConditionKind {
    fn symbol(self) -> &'static str {
        match self {
            Self::Empty | Self::Single => "",
            Self::Equal => "==",
            Self::NonEqual => "!=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::LogicAnd => "&&",
            Self::LogicOr => "||",
        }
    }
}

/// What a [`TestCall`] invokes.
#[derive(Debug, Clone, PartialEq)]
pub enum TestTarget {
    /// A method registered on the evaluator under this name.
    Named(String),
    /// A callback embedded in the condition.
    Native(Callback),
}

/// A method invocation used as an operand.
#[derive(Debug, Clone)]
pub struct TestCall {
    target: TestTarget,
    arguments: Vec<Field>,
}

impl TestCall {
    /// Call the evaluator method `name`.
    pub fn named(name: impl Into<String>, arguments: Vec<Field>) -> Self {
        Self {
            target: TestTarget::Named(name.into()),
            arguments,
        }
    }

    /// Call `callback` directly.
    pub fn native(callback: Callback, arguments: Vec<Field>) -> Self {
        Self {
            target: TestTarget::Native(callback),
            arguments,
        }
    }

    /// The invoked target.
    pub fn target(&self) -> &TestTarget {
        &self.target
    }

    /// The argument operands, resolved before the call.
    pub fn arguments(&self) -> &[Field] {
        &self.arguments
    }
}

/// An operand of a [`LazyCondition`].
#[derive(Debug, Clone)]
pub enum Field {
    /// A literal.
    Value(Variant),
    /// The evaluation argument at this index.
    Argument(usize),
    /// The result of a test method.
    TestCall(TestCall),
    /// The result of a nested condition.
    Condition(LazyCondition),
}

/// The evaluation argument at `index`.
pub fn arg(index: usize) -> Field {
    Field::Argument(index)
}

/// The result of the evaluator method `name` called with `arguments`.
pub fn test(name: impl Into<String>, arguments: Vec<Field>) -> Field {
    Field::TestCall(TestCall::named(name, arguments))
}

/// The result of `callback` called with `arguments`.
pub fn test_native(callback: Callback, arguments: Vec<Field>) -> Field {
    Field::TestCall(TestCall::native(callback, arguments))
}

impl Field {
    /// A literal operand.
    pub fn value(value: impl Into<Variant>) -> Self {
        Self::Value(value.into())
    }

    /// `self == other`.
    pub fn eq(self, other: impl Into<Field>) -> LazyCondition {
        LazyCondition::new(self, ConditionKind::Equal, other)
    }

    /// `self != other`.
    pub fn ne(self, other: impl Into<Field>) -> LazyCondition {
        LazyCondition::new(self, ConditionKind::NonEqual, other)
    }

    /// `self > other`.
    pub fn gt(self, other: impl Into<Field>) -> LazyCondition {
        LazyCondition::new(self, ConditionKind::Greater, other)
    }

    /// `self >= other`.
    pub fn ge(self, other: impl Into<Field>) -> LazyCondition {
        LazyCondition::new(self, ConditionKind::GreaterEqual, other)
    }

    /// `self < other`.
    pub fn lt(self, other: impl Into<Field>) -> LazyCondition {
        LazyCondition::new(self, ConditionKind::Less, other)
    }

    /// `self <= other`.
    pub fn le(self, other: impl Into<Field>) -> LazyCondition {
        LazyCondition::new(self, ConditionKind::LessEqual, other)
    }
}

macro_rules! impl_field_from_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Field {
                fn from(value: $ty) -> Self {
                    Field::Value(value.into())
                }
            }
        )*
    };
}

impl_field_from_value!(Variant, bool, i32, u32, i64, u64, f32, f64, String, &str);

impl From<TestCall> for Field {
    fn from(call: TestCall) -> Self {
        Field::TestCall(call)
    }
}

impl From<LazyCondition> for Field {
    fn from(condition: LazyCondition) -> Self {
        Field::Condition(condition)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value(Variant::String(s)) => write!(f, "{s:?}"),
            Field::Value(Variant::Invalid) => write!(f, "invalid"),
            Field::Value(value) => match value.to_string_value() {
                Some(s) => write!(f, "{s}"),
                None => write!(f, "<{}>", value.type_name()),
            },
            Field::Argument(index) => write!(f, "arg({index})"),
            Field::TestCall(call) => {
                match &call.target {
                    TestTarget::Named(name) => write!(f, "{name}(")?,
                    TestTarget::Native(_) => write!(f, "<native>(")?,
                }
                for (i, argument) in call.arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                write!(f, ")")
            }
            Field::Condition(condition) => write!(f, "({condition})"),
        }
    }
}

#[derive(Debug, Default)]
struct ConditionNode {
    kind: ConditionKind,
    left: Option<Field>,
    right: Option<Field>,
}

/// An immutable, cheaply cloneable condition tree.
#[derive(Clone, Default)]
pub struct LazyCondition {
    node: Arc<ConditionNode>,
    evaluator: Option<Arc<ConditionEvaluator>>,
}

static DEFAULT_EVALUATOR: OnceLock<Arc<ConditionEvaluator>> = OnceLock::new();

fn default_evaluator() -> &'static Arc<ConditionEvaluator> {
    DEFAULT_EVALUATOR.get_or_init(|| Arc::new(ConditionEvaluator::new()))
}

impl LazyCondition {
    fn from_node(kind: ConditionKind, left: Option<Field>, right: Option<Field>) -> Self {
        Self {
            node: Arc::new(ConditionNode { kind, left, right }),
            evaluator: None,
        }
    }

    /// A condition that is always false.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The truthiness of `field`.
    pub fn single(field: impl Into<Field>) -> Self {
        Self::from_node(ConditionKind::Single, Some(field.into()), None)
    }

    /// `left <kind> right`.
    ///
    /// `Empty` and `Single` ignore `right`.
    pub fn new(left: impl Into<Field>, kind: ConditionKind, right: impl Into<Field>) -> Self {
        match kind {
            ConditionKind::Empty => Self::empty(),
            ConditionKind::Single => Self::single(left),
            _ => Self::from_node(kind, Some(left.into()), Some(right.into())),
        }
    }

    /// Node kind.
    pub fn kind(&self) -> ConditionKind {
        self.node.kind
    }

    /// Whether this is the empty condition.
    pub fn is_empty(&self) -> bool {
        self.node.kind == ConditionKind::Empty
    }

    /// Left operand (the only one for `Single`).
    pub fn left(&self) -> Option<&Field> {
        self.node.left.as_ref()
    }

    /// Right operand.
    pub fn right(&self) -> Option<&Field> {
        self.node.right.as_ref()
    }

    /// `self && other`.
    pub fn and(self, other: impl Into<Field>) -> LazyCondition {
        LazyCondition::new(self, ConditionKind::LogicAnd, other)
    }

    /// `self || other`.
    pub fn or(self, other: impl Into<Field>) -> LazyCondition {
        LazyCondition::new(self, ConditionKind::LogicOr, other)
    }

    /// A copy of this condition evaluated by `evaluator`.
    pub fn compile(&self, evaluator: Arc<ConditionEvaluator>) -> LazyCondition {
        Self {
            node: self.node.clone(),
            evaluator: Some(evaluator),
        }
    }

    /// Whether an evaluator was bound through [`compile`](Self::compile).
    pub fn is_compiled(&self) -> bool {
        self.evaluator.is_some()
    }

    /// The evaluator used by [`evaluate`](Self::evaluate).
    pub fn evaluator(&self) -> &Arc<ConditionEvaluator> {
        self.evaluator.as_ref().unwrap_or_else(|| default_evaluator())
    }

    /// Evaluate against `args`. Resolution errors yield `false`.
    pub fn evaluate(&self, args: &[Variant]) -> bool {
        self.try_evaluate(args).unwrap_or(false)
    }

    /// Evaluate against `args`, reporting resolution errors.
    pub fn try_evaluate(&self, args: &[Variant]) -> Result<bool, ConditionError> {
        self.evaluator().evaluate(self, args)
    }
}

impl fmt::Display for LazyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.node.kind, &self.node.left, &self.node.right) {
            (ConditionKind::Empty, _, _) => write!(f, "<empty>"),
            (ConditionKind::Single, Some(left), _) => write!(f, "{left}"),
            (kind, Some(left), Some(right)) => write!(f, "{left} {} {right}", kind.symbol()),
            _ => write!(f, "<invalid>"),
        }
    }
}

impl fmt::Debug for LazyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyCondition")
            .field("kind", &self.node.kind)
            .field("left", &self.node.left)
            .field("right", &self.node.right)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

impl<R: Into<Field>> BitAnd<R> for LazyCondition {
    type Output = LazyCondition;

    fn bitand(self, rhs: R) -> LazyCondition {
        self.and(rhs)
    }
}

impl<R: Into<Field>> BitOr<R> for LazyCondition {
    type Output = LazyCondition;

    fn bitor(self, rhs: R) -> LazyCondition {
        self.or(rhs)
    }
}

impl<R: Into<Field>> BitAnd<R> for Field {
    type Output = LazyCondition;

    fn bitand(self, rhs: R) -> LazyCondition {
        LazyCondition::new(self, ConditionKind::LogicAnd, rhs)
    }
}

impl<R: Into<Field>> BitOr<R> for Field {
    type Output = LazyCondition;

    fn bitor(self, rhs: R) -> LazyCondition {
        LazyCondition::new(self, ConditionKind::LogicOr, rhs)
    }
}
