//! Error types for Nuria.
//!
//! Most of the core reports failure through invalid handles, default values or
//! accumulated failure lists. The types here cover the few operations that do
//! return a `Result`: meta-object registration, posting to an event loop, and
//! condition evaluation.

use std::fmt;

/// The main error type for Nuria operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NuriaError {
    /// Reflection-related error.
    Meta(MetaError),
    /// Condition evaluation error.
    Condition(ConditionError),
    /// Event loop error.
    EventLoop(EventLoopError),
}

impl fmt::Display for NuriaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Meta(err) => write!(f, "Meta error: {err}"),
            Self::Condition(err) => write!(f, "Condition error: {err}"),
            Self::EventLoop(err) => write!(f, "Event loop error: {err}"),
        }
    }
}

impl std::error::Error for NuriaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Meta(err) => Some(err),
            Self::Condition(err) => Some(err),
            Self::EventLoop(err) => Some(err),
        }
    }
}

/// Errors raised while building or registering meta-objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaError {
    /// A type with this class name is already registered.
    AlreadyRegistered {
        /// The class name.
        class_name: String,
    },
    /// The meta-object was not finalized before registration.
    NotFinalized {
        /// The class name.
        class_name: String,
    },
    /// No type with this class name is registered.
    UnknownType {
        /// The class name.
        class_name: String,
    },
    /// The type has no constructor matching the given arguments.
    NoConstructor {
        /// The class name.
        class_name: String,
    },
}

impl fmt::Display for MetaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRegistered { class_name } => {
                write!(f, "Type '{class_name}' is already registered")
            }
            Self::NotFinalized { class_name } => {
                write!(f, "Meta-object '{class_name}' must be finalized before registration")
            }
            Self::UnknownType { class_name } => write!(f, "Unknown type '{class_name}'"),
            Self::NoConstructor { class_name } => {
                write!(f, "Type '{class_name}' has no matching constructor")
            }
        }
    }
}

impl std::error::Error for MetaError {}

/// Errors that abort the evaluation of a lazy condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    /// An argument reference points past the end of the argument list.
    ArgumentOutOfRange {
        /// The referenced index.
        index: usize,
        /// The number of arguments supplied.
        len: usize,
    },
    /// A named test method is not registered on the evaluator.
    UnknownMethod {
        /// The method name.
        name: String,
    },
    /// A native test callback is invalid.
    InvalidCallback,
}

impl fmt::Display for ConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArgumentOutOfRange { index, len } => {
                write!(f, "Argument index {index} out of range ({len} arguments given)")
            }
            Self::UnknownMethod { name } => write!(f, "Unknown test method '{name}'"),
            Self::InvalidCallback => write!(f, "Test callback is invalid"),
        }
    }
}

impl std::error::Error for ConditionError {}

/// Event loop errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventLoopError {
    /// The event loop has stopped and no longer accepts invocations.
    Stopped,
    /// The invocation queue is full.
    QueueFull,
}

impl fmt::Display for EventLoopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "Event loop has stopped"),
            Self::QueueFull => write!(f, "Event loop queue is full"),
        }
    }
}

impl std::error::Error for EventLoopError {}

impl From<MetaError> for NuriaError {
    fn from(err: MetaError) -> Self {
        Self::Meta(err)
    }
}

impl From<ConditionError> for NuriaError {
    fn from(err: ConditionError) -> Self {
        Self::Condition(err)
    }
}

impl From<EventLoopError> for NuriaError {
    fn from(err: EventLoopError) -> Self {
        Self::EventLoop(err)
    }
}

/// A specialized Result type for Nuria operations.
pub type Result<T> = std::result::Result<T, NuriaError>;
