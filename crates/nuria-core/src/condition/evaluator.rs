//! Evaluation of condition trees.
//!
//! A [`ConditionEvaluator`] maps test method names to callbacks and walks a
//! [`LazyCondition`] against an argument list.

use std::cmp::Ordering;
use std::collections::HashMap;

use parking_lot::RwLock;

use super::{ConditionKind, ConditionNode, Field, LazyCondition, TestTarget};
use crate::callback::Callback;
use crate::error::ConditionError;
use crate::logging::targets;
use crate::variant::Variant;

/// Resolves named test methods and evaluates condition trees.
///
/// Methods can be registered at any time, also while conditions compiled
/// against this evaluator are being evaluated on other threads.
#[derive(Default)]
pub struct ConditionEvaluator {
    methods: RwLock<HashMap<String, Callback>>,
}

static_assertions::assert_impl_all!(ConditionEvaluator: Send, Sync);

impl ConditionEvaluator {
    /// An evaluator without methods.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` as the test method `name`, replacing any previous one.
    pub fn register_method(&self, name: impl Into<String>, callback: Callback) {
        let name = name.into();
        tracing::debug!(target: targets::CONDITION, %name, "registered test method");
        self.methods.write().insert(name, callback);
    }

    /// Remove the test method `name`. Returns `false` if it was unknown.
    pub fn unregister_method(&self, name: &str) -> bool {
        self.methods.write().remove(name).is_some()
    }

    /// Whether a test method `name` is registered.
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.read().contains_key(name)
    }

    /// The test method registered as `name`.
    pub fn method(&self, name: &str) -> Option<Callback> {
        self.methods.read().get(name).cloned()
    }

    /// Evaluate `condition` against `args`.
    #[tracing::instrument(skip_all, target = "nuria_core::condition", level = "trace")]
    pub fn evaluate(&self, condition: &LazyCondition, args: &[Variant]) -> Result<bool, ConditionError> {
        let result = self.run(&condition.node, args);
        match &result {
            Ok(value) => tracing::trace!(target: targets::CONDITION, %condition, result = value, "evaluated"),
            Err(err) => tracing::debug!(target: targets::CONDITION, %condition, %err, "evaluation failed"),
        }
        result
    }

    fn run(&self, node: &ConditionNode, args: &[Variant]) -> Result<bool, ConditionError> {
        let (left, right) = match (node.kind, &node.left, &node.right) {
            (ConditionKind::Empty, _, _) => return Ok(false),
            (ConditionKind::Single, Some(left), _) => {
                return Ok(self.resolve(left, args)?.truthiness());
            }
            (_, Some(left), Some(right)) => (left, right),
            _ => return Ok(false),
        };

        let left = self.resolve(left, args)?;
        match node.kind {
            ConditionKind::LogicAnd => {
                if !left.truthiness() {
                    return Ok(false);
                }
                Ok(self.resolve(right, args)?.truthiness())
            }
            ConditionKind::LogicOr => {
                if left.truthiness() {
                    return Ok(true);
                }
                Ok(self.resolve(right, args)?.truthiness())
            }
            kind => {
                let right = self.resolve(right, args)?;
                Ok(compare(kind, &left, &right))
            }
        }
    }

    fn resolve(&self, field: &Field, args: &[Variant]) -> Result<Variant, ConditionError> {
        match field {
            Field::Value(value) => Ok(value.clone()),
            Field::Argument(index) => args.get(*index).cloned().ok_or(ConditionError::ArgumentOutOfRange {
                index: *index,
                len: args.len(),
            }),
            Field::Condition(condition) => self.run(&condition.node, args).map(Variant::Bool),
            Field::TestCall(call) => {
                let callback = match call.target() {
                    TestTarget::Native(callback) if callback.is_valid() => callback.clone(),
                    TestTarget::Native(_) => return Err(ConditionError::InvalidCallback),
                    TestTarget::Named(name) => self
                        .method(name)
                        .ok_or_else(|| ConditionError::UnknownMethod { name: name.clone() })?,
                };
                let arguments = call
                    .arguments()
                    .iter()
                    .map(|argument| self.resolve(argument, args))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(callback.invoke(arguments))
            }
        }
    }
}

fn compare(kind: ConditionKind, left: &Variant, right: &Variant) -> bool {
    match kind {
        ConditionKind::Equal => left.equals(right),
        ConditionKind::NonEqual => !left.equals(right),
        ConditionKind::Greater => left.compare(right) == Some(Ordering::Greater),
        ConditionKind::GreaterEqual => matches!(left.compare(right), Some(Ordering::Greater | Ordering::Equal)),
        ConditionKind::Less => left.compare(right) == Some(Ordering::Less),
        ConditionKind::LessEqual => matches!(left.compare(right), Some(Ordering::Less | Ordering::Equal)),
        _ => false,
    }
}

impl std::fmt::Debug for ConditionEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let methods = self.methods.read();
        let mut names: Vec<&String> = methods.keys().collect();
        names.sort();
        f.debug_struct("ConditionEvaluator").field("methods", &names).finish()
    }
}
